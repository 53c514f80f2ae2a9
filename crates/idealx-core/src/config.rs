use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{de, Deserialize, Deserializer, Serialize};

use crate::types::TargetScope;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-6";
pub const DEFAULT_CONFIG_PATH: &str = "idealx.toml";

/// Environment keys read from the process environment (case-insensitive).
const ENV_KEYS: &[&str] = &[
    "port",
    "target_server_ids",
    "target_forum_channel_ids",
    "discord_bot_token",
    "discord_public_key",
    "discord_application_id",
    "discord_mention_role_ids",
    "anthropic_api_key",
    "anthropic_base_url",
    "idealx_model",
    "system_prompt_path",
];

/// Top-level config (idealx.toml + environment overrides).
///
/// Field names match the environment variable names so a plain `.env`
/// file is enough to run the bot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdealxConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default, deserialize_with = "id_list")]
    pub target_server_ids: Vec<String>,
    #[serde(default, deserialize_with = "id_list")]
    pub target_forum_channel_ids: Vec<String>,
    #[serde(default)]
    pub discord_bot_token: String,
    #[serde(default)]
    pub discord_public_key: String,
    #[serde(default, deserialize_with = "opt_id")]
    pub discord_application_id: Option<String>,
    #[serde(default, deserialize_with = "id_list")]
    pub discord_mention_role_ids: Vec<String>,
    #[serde(default)]
    pub anthropic_api_key: String,
    #[serde(default = "default_anthropic_base_url")]
    pub anthropic_base_url: String,
    #[serde(default = "default_model")]
    pub idealx_model: String,
    #[serde(default = "default_system_prompt_path")]
    pub system_prompt_path: String,
}

impl Default for IdealxConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            target_server_ids: Vec::new(),
            target_forum_channel_ids: Vec::new(),
            discord_bot_token: String::new(),
            discord_public_key: String::new(),
            discord_application_id: None,
            discord_mention_role_ids: Vec::new(),
            anthropic_api_key: String::new(),
            anthropic_base_url: default_anthropic_base_url(),
            idealx_model: default_model(),
            system_prompt_path: default_system_prompt_path(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_system_prompt_path() -> String {
    "system_prompt.md".to_string()
}

impl IdealxConfig {
    /// Load config from defaults, an optional TOML file, then the environment.
    ///
    /// A missing TOML file is not an error; environment values always win.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path.unwrap_or(DEFAULT_CONFIG_PATH);
        Self::from_figment(
            Figment::new()
                .merge(Serialized::defaults(IdealxConfig::default()))
                .merge(Toml::file(path))
                .merge(Env::raw().only(ENV_KEYS)),
        )
    }

    pub fn from_figment(figment: Figment) -> crate::error::Result<Self> {
        figment
            .extract()
            .map_err(|e| crate::error::IdealxError::Config(e.to_string()))
    }

    pub fn target_scope(&self) -> TargetScope {
        TargetScope::new(
            self.target_server_ids.iter().cloned(),
            self.target_forum_channel_ids.iter().cloned(),
        )
    }

    /// URL of this process's own webhook endpoint, used by the gateway forwarder.
    pub fn local_webhook_url(&self) -> String {
        format!("http://localhost:{}/api/webhooks/discord", self.port)
    }
}

/// Split a comma-separated id list, dropping blanks.
pub fn parse_id_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Accepts `"1,2,3"`, a bare number (the env provider parses `"123"` as an
/// integer), or a sequence of strings/numbers.
fn id_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct IdListVisitor;

    impl<'de> de::Visitor<'de> for IdListVisitor {
        type Value = Vec<String>;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("a comma-separated string or a list of ids")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(parse_id_list(v))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(vec![v.to_string()])
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(vec![v.to_string()])
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut ids = Vec::new();
            while let Some(item) = seq.next_element::<IdItem>()? {
                let id = item.0.trim().to_string();
                if !id.is_empty() {
                    ids.push(id);
                }
            }
            Ok(ids)
        }
    }

    deserializer.deserialize_any(IdListVisitor)
}

fn opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let ids = id_list(deserializer)?;
    Ok(ids.into_iter().next())
}

/// One id inside a list: string or integer.
struct IdItem(String);

impl<'de> Deserialize<'de> for IdItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ItemVisitor;

        impl de::Visitor<'_> for ItemVisitor {
            type Value = IdItem;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("an id string or integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(IdItem(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(IdItem(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(IdItem(v.to_string()))
            }
        }

        deserializer.deserialize_any(ItemVisitor)
    }
}
