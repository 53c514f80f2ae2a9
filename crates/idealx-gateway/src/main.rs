use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use serenity::http::Http;
use serenity::model::id::ApplicationId;
use tracing::{info, warn};

use idealx_agent::prompt::load_system_prompt;
use idealx_agent::{AnthropicProvider, ModelResponder};
use idealx_core::{IdealxConfig, MemoryState};
use idealx_discord::webhook::parse_public_key;
use idealx_discord::{
    DiscordBridge, DiscordError, DiscordGateway, EventRouter, GatewaySupervisor, WebhookDispatcher,
};

mod app;
mod http;

#[derive(Debug, Parser)]
#[command(name = "idealx-gateway", version, about = "IdealX Discord bot")]
struct Cli {
    /// Config file path (TOML). Environment values override it.
    #[arg(long, env = "IDEALX_CONFIG")]
    config: Option<String>,

    /// Push the slash-command definitions as global commands and exit.
    #[arg(long)]
    register_commands: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // a missing .env is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "idealx_gateway=info,idealx_discord=info,idealx_agent=info,tower_http=info".into()
            }),
        )
        .init();

    let cli = Cli::parse();
    let config = IdealxConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        IdealxConfig::default()
    });

    let http = discord_http(&config).await;

    if cli.register_commands {
        if config.discord_bot_token.trim().is_empty() {
            anyhow::bail!("DISCORD_BOT_TOKEN is required to register commands");
        }
        let count = idealx_discord::commands::register_global(&http).await?;
        info!(count, "slash commands registered");
        return Ok(());
    }

    if config.anthropic_api_key.trim().is_empty() {
        warn!("ANTHROPIC_API_KEY not set, model calls will fail");
    }
    let provider = AnthropicProvider::new(
        config.anthropic_api_key.clone(),
        Some(config.anthropic_base_url.clone()),
    );
    let system_prompt = load_system_prompt(Path::new(&config.system_prompt_path));
    let responder = Arc::new(ModelResponder::new(
        Arc::new(provider),
        config.idealx_model.clone(),
        system_prompt,
    ));
    info!(model = %config.idealx_model, provider = responder.provider_name(), "model responder ready");

    let scope = config.target_scope();
    if scope.is_empty() {
        info!("no forum scope configured, forum auto-response disabled");
    }
    let router = Arc::new(EventRouter::new(responder, Arc::new(MemoryState::new()), scope));
    let bridge = Arc::new(DiscordBridge::new(
        Arc::clone(&http),
        router,
        &config.discord_mention_role_ids,
    ));

    let public_key = match config.discord_public_key.trim() {
        "" => {
            warn!("DISCORD_PUBLIC_KEY not set, HTTP interactions will be rejected");
            None
        }
        key => match parse_public_key(key) {
            Ok(k) => Some(k),
            Err(e) => {
                warn!(error = %e, "DISCORD_PUBLIC_KEY unusable, HTTP interactions will be rejected");
                None
            }
        },
    };
    let dispatcher = WebhookDispatcher::new(config.discord_bot_token.clone(), public_key, bridge);

    match DiscordGateway::new(&config.discord_bot_token, config.local_webhook_url()) {
        Ok(gateway) => {
            tokio::spawn(GatewaySupervisor::new(gateway).run());
            info!("Discord gateway supervisor started");
        }
        Err(DiscordError::NoToken) => {
            warn!("DISCORD_BOT_TOKEN not set, gateway listener not started");
        }
        Err(e) => return Err(e.into()),
    }

    let state = Arc::new(app::AppState::new(dispatcher));
    let router = app::build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("IdealX gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

/// REST client for the bot, with the application id set when it can be known.
///
/// Interaction follow-ups need the application id; it comes from config or,
/// failing that, from the application info endpoint.
async fn discord_http(config: &IdealxConfig) -> Arc<Http> {
    let http = Arc::new(Http::new(&config.discord_bot_token));

    let configured = config
        .discord_application_id
        .as_deref()
        .and_then(|id| id.parse::<u64>().ok())
        .filter(|id| *id != 0);

    match configured {
        Some(id) => http.set_application_id(ApplicationId::new(id)),
        None if !config.discord_bot_token.trim().is_empty() => {
            match http.get_current_application_info().await {
                Ok(info) => http.set_application_id(info.id),
                Err(e) => warn!(error = %e, "could not resolve Discord application id"),
            }
        }
        None => {}
    }
    http
}
