use std::path::Path;

use tracing::{info, warn};

/// Used when no system prompt file is present.
pub const FALLBACK_SYSTEM_PROMPT: &str = "あなたはDiscordサーバーで活動するアシスタント「IdealX」です。\
会話の流れを踏まえ、簡潔かつ正確に日本語で回答してください。\
必要に応じてウェブ検索を使い、最新の情報を確認してください。";

/// Load the base system prompt from `path`.
///
/// A missing or empty file falls back to [`FALLBACK_SYSTEM_PROMPT`].
pub fn load_system_prompt(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(content) if !content.trim().is_empty() => {
            info!(path = %path.display(), chars = content.len(), "loaded system prompt");
            content
        }
        Ok(_) => {
            warn!(path = %path.display(), "system prompt file is empty, using built-in prompt");
            FALLBACK_SYSTEM_PROMPT.to_string()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "system prompt not readable, using built-in prompt");
            FALLBACK_SYSTEM_PROMPT.to_string()
        }
    }
}

/// Append the forum section to a base prompt.
///
/// Returns `base` unchanged when neither title nor description is set.
pub fn with_forum_context(base: &str, title: Option<&str>, description: Option<&str>) -> String {
    let title = title.filter(|t| !t.trim().is_empty());
    let description = description.filter(|d| !d.trim().is_empty());

    if title.is_none() && description.is_none() {
        return base.to_string();
    }

    let mut system = base.to_string();
    system.push_str("\n\n--- フォーラム情報 ---");
    if let Some(title) = title {
        system.push_str("\nタイトル: ");
        system.push_str(title);
    }
    if let Some(description) = description {
        system.push_str("\n説明: ");
        system.push_str(description);
    }
    system
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let prompt = load_system_prompt(&dir.path().join("nope.md"));
        assert_eq!(prompt, FALLBACK_SYSTEM_PROMPT);
    }

    #[test]
    fn file_content_is_used_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("system_prompt.md");
        std::fs::write(&path, "You are IdealX.\n").unwrap();
        assert_eq!(load_system_prompt(&path), "You are IdealX.\n");
    }

    #[test]
    fn forum_section_lists_only_present_fields() {
        let prompt = with_forum_context("base", Some("質問スレ"), None);
        assert_eq!(prompt, "base\n\n--- フォーラム情報 ---\nタイトル: 質問スレ");

        let prompt = with_forum_context("base", None, Some("説明文"));
        assert!(prompt.ends_with("\n説明: 説明文"));
        assert!(!prompt.contains("タイトル"));
    }

    #[test]
    fn blank_forum_context_keeps_base() {
        assert_eq!(with_forum_context("base", Some("  "), None), "base");
    }
}
