//! Slash commands: `/help`, `/clear`, `/summarize`, `/translate`, `/age`.
//!
//! Definitions live beside the dispatcher so registration and handling stay
//! in step. Every handler failure is logged and answered with that
//! command's apology; nothing propagates.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serenity::builder::{CreateCommand, CreateCommandOption};
use serenity::http::Http;
use serenity::model::application::{
    Command, CommandDataOption, CommandDataOptionValue, CommandOptionType,
};
use tracing::{error, info, warn};

use idealx_agent::ModelResponder;
use idealx_core::MemoryState;

use crate::card::Card;
use crate::context::build_turns;
use crate::error::DiscordError;
use crate::event::SlashCommand;
use crate::snowflake;
use crate::thread::ChatThread;

pub const DEFAULT_SUMMARY_COUNT: usize = 10;
pub const MAX_SUMMARY_COUNT: usize = 50;
/// Characters of the original text shown on a translation card.
pub const ORIGINAL_PREVIEW_CHARS: usize = 500;

pub const GENERIC_APOLOGY: &str = "申し訳ありません。エラーが発生しました。";
pub const SUMMARY_APOLOGY: &str = "要約の生成中にエラーが発生しました。";
const TRANSLATE_APOLOGY: &str = "翻訳中にエラーが発生しました。";
const AGE_APOLOGY: &str = "アカウント情報の取得中にエラーが発生しました。";

const NOTHING_TO_SUMMARIZE: &str = "要約するメッセージが見つかりませんでした。";
const TRANSLATE_NEEDS_TEXT: &str = "翻訳するテキストを入力してください。";
const AGE_NEEDS_USER: &str = "ユーザーを指定してください。";

/// Supported translation targets: option value → display name.
pub const LANGUAGES: &[(&str, &str)] = &[
    ("japanese", "日本語"),
    ("english", "英語"),
    ("chinese_simplified", "中国語（簡体字）"),
    ("chinese_traditional", "中国語（繁体字）"),
    ("korean", "韓国語"),
    ("french", "フランス語"),
    ("german", "ドイツ語"),
    ("spanish", "スペイン語"),
    ("portuguese", "ポルトガル語"),
    ("italian", "イタリア語"),
    ("russian", "ロシア語"),
    ("arabic", "アラビア語"),
];

/// Display name for a language key; unknown keys are shown as-is.
pub fn language_name(key: &str) -> &str {
    LANGUAGES
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, name)| *name)
        .unwrap_or(key)
}

/// Message count for `/summarize`.
///
/// Missing, zero or non-numeric input gives the default; anything else is
/// truncated and clamped to `1..=50`.
pub fn parse_count(text: &str) -> usize {
    let raw = text
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite() && *n != 0.0)
        .unwrap_or(DEFAULT_SUMMARY_COUNT as f64);
    raw.clamp(1.0, MAX_SUMMARY_COUNT as f64) as usize
}

/// Split `/translate` input into a lower-cased language key and the text.
pub fn parse_translate(text: &str) -> (String, String) {
    let mut parts = text.split_whitespace();
    let key = parts.next().unwrap_or_default().to_lowercase();
    let body = parts.collect::<Vec<_>>().join(" ");
    (key, body)
}

/// First 500 characters of `text`, with `…` appended when cut.
pub fn preview_original(text: &str) -> String {
    if text.chars().count() > ORIGINAL_PREVIEW_CHARS {
        let mut out: String = text.chars().take(ORIGINAL_PREVIEW_CHARS).collect();
        out.push('…');
        out
    } else {
        text.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountAge {
    pub created_at_ms: u64,
    pub total_days: i64,
    pub years: i64,
    pub remaining_days: i64,
}

impl AccountAge {
    pub fn from_snowflake(id: u64, now: DateTime<Utc>) -> Self {
        let created_at_ms = snowflake::created_at_ms(id);
        let elapsed_ms = now.timestamp_millis() - created_at_ms as i64;
        let total_days = elapsed_ms.div_euclid(86_400_000);
        Self {
            created_at_ms,
            total_days,
            years: total_days.div_euclid(365),
            remaining_days: total_days.rem_euclid(365),
        }
    }

    pub fn created_at_secs(&self) -> u64 {
        self.created_at_ms / 1000
    }
}

pub fn help_card() -> Card {
    Card::new("IdealX ヘルプ")
        .text("💬 **メンション機能**\nIdealXにメンションすると、Claude AIが直近の会話を読み取り回答します。")
        .divider()
        .text(
            [
                "📋 **スラッシュコマンド**",
                "`/help` - このヘルプを表示",
                "`/age [ユーザー]` - Discordアカウント作成日と経過日数を表示",
                "`/summarize [件数]` - 直近メッセージをAI要約（デフォルト10件、最大50件）",
                "`/translate [言語] [テキスト]` - テキストを指定言語に翻訳",
                "`/clear` - 会話コンテキストをリセット",
            ]
            .join("\n"),
        )
        .divider()
        .text("⚡ **リアクション機能**\n📝リアクションでメッセージを要約してチャンネルに投稿")
        .muted("Powered by Claude claude-sonnet-4-6")
}

fn apology_for(command: &str) -> &'static str {
    match command {
        "summarize" => SUMMARY_APOLOGY,
        "translate" => TRANSLATE_APOLOGY,
        "age" => AGE_APOLOGY,
        _ => GENERIC_APOLOGY,
    }
}

pub struct CommandDispatcher {
    responder: Arc<ModelResponder>,
    state: Arc<MemoryState>,
}

impl CommandDispatcher {
    pub fn new(responder: Arc<ModelResponder>, state: Arc<MemoryState>) -> Self {
        Self { responder, state }
    }

    /// Run one command to completion. Never fails; errors become an apology post.
    pub async fn dispatch(&self, thread: &dyn ChatThread, command: &SlashCommand) {
        self.dispatch_at(thread, command, Utc::now()).await
    }

    /// [`dispatch`](Self::dispatch) with an explicit clock.
    pub async fn dispatch_at(&self, thread: &dyn ChatThread, command: &SlashCommand, now: DateTime<Utc>) {
        info!(command = %command.name, user = %command.user_id, thread = %thread.identity(), "slash command");

        let result = match command.name.as_str() {
            "help" => thread.post(help_card().into()).await,
            "clear" => self.clear(thread, now).await,
            "summarize" => self.summarize(thread, &command.text).await,
            "translate" => self.translate(thread, &command.text).await,
            "age" => self.age(thread, &command.text, now).await,
            other => {
                warn!(command = other, "unknown slash command");
                return;
            }
        };

        if let Err(e) = result {
            error!(command = %command.name, error = %e, "slash command failed");
            if let Err(e) = thread.post(apology_for(&command.name).into()).await {
                warn!(command = %command.name, error = %e, "failed to post apology");
            }
        }
    }

    async fn clear(&self, thread: &dyn ChatThread, now: DateTime<Utc>) -> Result<(), DiscordError> {
        self.state.set_reset_marker(thread.identity(), now);
        info!(thread = %thread.identity(), at = %now, "conversation context reset");
        thread
            .post(
                Card::new("コンテキストリセット")
                    .text("会話コンテキストをリセットしました。これ以降のメッセージのみがAIへの入力として使用されます。")
                    .into(),
            )
            .await
    }

    async fn summarize(&self, thread: &dyn ChatThread, text: &str) -> Result<(), DiscordError> {
        let count = parse_count(text);
        let messages: Vec<_> = thread
            .history(count)
            .await?
            .into_iter()
            .filter(|m| !m.author.is_bot_or_me())
            .collect();
        let messages = self.state.retain_after_reset(thread.identity(), messages);
        let turns = build_turns(&messages);

        if turns.is_empty() {
            return thread.post(NOTHING_TO_SUMMARIZE.into()).await;
        }

        let summary = self.responder.summarize(&turns).await?;
        thread
            .post(
                Card::new("会話の要約")
                    .text(summary)
                    .divider()
                    .muted(format!("{}件のメッセージを要約", turns.len()))
                    .into(),
            )
            .await
    }

    async fn translate(&self, thread: &dyn ChatThread, text: &str) -> Result<(), DiscordError> {
        let (key, body) = parse_translate(text);
        if body.is_empty() {
            return thread.post(TRANSLATE_NEEDS_TEXT.into()).await;
        }

        let language = language_name(&key);
        let translation = self.responder.translate(&body, language).await?;
        thread
            .post(
                Card::new(format!("{}への翻訳", language))
                    .field("原文", preview_original(&body))
                    .field("翻訳", translation)
                    .into(),
            )
            .await
    }

    async fn age(&self, thread: &dyn ChatThread, text: &str, now: DateTime<Utc>) -> Result<(), DiscordError> {
        let user = text.trim();
        if user.is_empty() {
            return thread.post(AGE_NEEDS_USER.into()).await;
        }

        let id: u64 = user
            .parse()
            .map_err(|_| DiscordError::InvalidInput(format!("not a user id: {user}")))?;
        let age = AccountAge::from_snowflake(id, now);
        thread
            .post(
                Card::new("アカウント情報")
                    .text(format!("<@{}>", id))
                    .field("作成日", format!("<t:{}:R>", age.created_at_secs()))
                    .field(
                        "経過日数",
                        format!("{}日（{}年{}日）", age.total_days, age.years, age.remaining_days),
                    )
                    .into(),
            )
            .await
    }
}

// ── Registration ─────────────────────────────────────────────────────────────

/// Option names per command, in the order their values are joined.
pub fn option_order(command: &str) -> &'static [&'static str] {
    match command {
        "age" => &["user"],
        "summarize" => &["count"],
        "translate" => &["language", "text"],
        _ => &[],
    }
}

fn option_value_text(value: &CommandDataOptionValue) -> Option<String> {
    match value {
        CommandDataOptionValue::String(s) => Some(s.clone()),
        CommandDataOptionValue::Integer(i) => Some(i.to_string()),
        CommandDataOptionValue::Number(n) => Some(n.to_string()),
        CommandDataOptionValue::Boolean(b) => Some(b.to_string()),
        CommandDataOptionValue::User(id) => Some(id.to_string()),
        CommandDataOptionValue::Channel(id) => Some(id.to_string()),
        CommandDataOptionValue::Role(id) => Some(id.to_string()),
        _ => None,
    }
}

/// Join option values into the command text, in declaration order.
pub fn command_text(command: &str, options: &[CommandDataOption]) -> String {
    option_order(command)
        .iter()
        .filter_map(|name| options.iter().find(|o| o.name == *name))
        .filter_map(|o| option_value_text(&o.value))
        .collect::<Vec<_>>()
        .join(" ")
}

/// The global command set.
pub fn definitions() -> Vec<CreateCommand> {
    let language = LANGUAGES.iter().fold(
        CreateCommandOption::new(CommandOptionType::String, "language", "翻訳先の言語")
            .required(true),
        |option, (key, name)| option.add_string_choice(*name, *key),
    );

    vec![
        CreateCommand::new("help").description("IdealXの使い方を表示します"),
        CreateCommand::new("age")
            .description("Discordアカウントの作成日と経過日数を表示します")
            .add_option(
                CreateCommandOption::new(CommandOptionType::User, "user", "ユーザーを選択してください")
                    .required(false),
            ),
        CreateCommand::new("summarize")
            .description("直近のメッセージをAIで要約します")
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::Integer,
                    "count",
                    "要約するメッセージ数（1〜50、デフォルト: 10）",
                )
                .required(false)
                .min_int_value(1)
                .max_int_value(MAX_SUMMARY_COUNT as u64),
            ),
        CreateCommand::new("translate")
            .description("テキストを指定した言語に翻訳します")
            .add_option(language)
            .add_option(
                CreateCommandOption::new(CommandOptionType::String, "text", "翻訳するテキスト")
                    .required(true),
            ),
        CreateCommand::new("clear").description("チャンネルの会話コンテキストをリセットします"),
    ]
}

/// Replace the global command set. Returns how many commands Discord accepted.
pub async fn register_global(http: &Http) -> Result<usize, DiscordError> {
    let commands = Command::set_global_commands(http, definitions()).await?;
    info!(count = commands.len(), "registered global slash commands");
    Ok(commands.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_defaults_and_clamps() {
        assert_eq!(parse_count(""), 10);
        assert_eq!(parse_count("0"), 10);
        assert_eq!(parse_count("abc"), 10);
        assert_eq!(parse_count("200"), 50);
        assert_eq!(parse_count("-5"), 1);
        assert_eq!(parse_count(" 25 "), 25);
        assert_eq!(parse_count("7.9"), 7);
    }

    #[test]
    fn translate_splits_key_and_text() {
        assert_eq!(
            parse_translate("French  Hello   world"),
            ("french".to_string(), "Hello world".to_string())
        );
        assert_eq!(parse_translate("english"), ("english".to_string(), String::new()));
        assert_eq!(parse_translate("   "), (String::new(), String::new()));
    }

    #[test]
    fn unknown_language_uses_key() {
        assert_eq!(language_name("french"), "フランス語");
        assert_eq!(language_name("klingon"), "klingon");
        assert_eq!(LANGUAGES.len(), 12);
    }

    #[test]
    fn original_preview_is_cut_at_500_chars() {
        let long = "あ".repeat(501);
        let preview = preview_original(&long);
        assert_eq!(preview.chars().count(), 501);
        assert!(preview.ends_with('…'));
        assert_eq!(preview_original("short"), "short");
    }

    #[test]
    fn account_age_is_reproducible() {
        let id = 80_351_110_224_678_912;
        let created = snowflake::created_at_ms(id) as i64;
        let now = DateTime::from_timestamp_millis(created + 800 * 86_400_000 + 1234).unwrap();
        let age = AccountAge::from_snowflake(id, now);
        assert_eq!(age.created_at_ms, (id >> 22) + 1_420_070_400_000);
        assert_eq!(age.total_days, 800);
        assert_eq!(age.years, 2);
        assert_eq!(age.remaining_days, 70);

        let later = AccountAge::from_snowflake(id, now + chrono::Duration::days(3));
        assert!(later.total_days > age.total_days);
    }

    #[test]
    fn apologies_by_command() {
        assert_eq!(apology_for("summarize"), SUMMARY_APOLOGY);
        assert_eq!(apology_for("help"), GENERIC_APOLOGY);
    }

    #[test]
    fn definitions_match_dispatcher() {
        let names: Vec<String> = definitions()
            .iter()
            .map(|c| serde_json::to_value(c).unwrap()["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["help", "age", "summarize", "translate", "clear"]);

        let translate = serde_json::to_value(&definitions()[3]).unwrap();
        assert_eq!(translate["options"][0]["choices"].as_array().unwrap().len(), 12);
        assert_eq!(translate["options"][0]["choices"][5]["value"], "french");
    }
}
