//! Rich message cards, rendered as Discord embeds.
//!
//! A card is a title followed by blocks:
//!
//! ```text
//! Card::new("会話の要約")
//!     .text("summary...")
//!     .divider()
//!     .muted("10件のメッセージを要約")
//! ```
//!
//! Text blocks and dividers form the embed description, fields become embed
//! fields, and muted text becomes the footer.

use serenity::builder::{CreateEmbed, CreateEmbedFooter};

/// Embed accent colour.
const CARD_COLOUR: u32 = 0x5865F2;

/// Embed description limit.
const DESCRIPTION_MAX: usize = 4096;
/// Embed field value limit.
const FIELD_VALUE_MAX: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Text(String),
    Muted(String),
    Divider,
    Field { label: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub title: String,
    pub blocks: Vec<Block>,
}

impl Card {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            blocks: Vec::new(),
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.blocks.push(Block::Text(text.into()));
        self
    }

    pub fn muted(mut self, text: impl Into<String>) -> Self {
        self.blocks.push(Block::Muted(text.into()));
        self
    }

    pub fn divider(mut self) -> Self {
        self.blocks.push(Block::Divider);
        self
    }

    pub fn field(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.blocks.push(Block::Field {
            label: label.into(),
            value: value.into(),
        });
        self
    }

    /// Label/value pairs in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Field { label, value } => Some((label.as_str(), value.as_str())),
            _ => None,
        })
    }

    fn description(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        for block in &self.blocks {
            match block {
                Block::Text(t) => parts.push(t),
                Block::Divider => parts.push("───────────"),
                _ => {}
            }
        }
        parts.join("\n\n")
    }

    fn footer(&self) -> Option<String> {
        let muted: Vec<&str> = self
            .blocks
            .iter()
            .filter_map(|b| match b {
                Block::Muted(t) => Some(t.as_str()),
                _ => None,
            })
            .collect();
        if muted.is_empty() {
            None
        } else {
            Some(muted.join(" · "))
        }
    }

    /// Convert to a serenity `CreateEmbed` builder.
    pub fn to_create_embed(&self) -> CreateEmbed {
        let mut e = CreateEmbed::new().title(&self.title).colour(CARD_COLOUR);
        let description = self.description();
        if !description.is_empty() {
            e = e.description(truncate_chars(&description, DESCRIPTION_MAX));
        }
        for (label, value) in self.fields() {
            e = e.field(label, truncate_chars(value, FIELD_VALUE_MAX), false);
        }
        if let Some(footer) = self.footer() {
            e = e.footer(CreateEmbedFooter::new(footer));
        }
        e
    }

    /// Markdown rendering, used for logs and as a text fallback.
    pub fn to_plain_text(&self) -> String {
        let mut out = format!("**{}**", self.title);
        for block in &self.blocks {
            out.push_str("\n\n");
            match block {
                Block::Text(t) => out.push_str(t),
                Block::Muted(t) => {
                    out.push('*');
                    out.push_str(t);
                    out.push('*');
                }
                Block::Divider => out.push_str("---"),
                Block::Field { label, value } => {
                    out.push_str(&format!("**{}**\n{}", label, value));
                }
            }
        }
        out
    }
}

/// Cut `text` to at most `max` characters, marking the cut with `…`.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_keeps_block_order() {
        let card = Card::new("会話の要約")
            .text("まとめ")
            .divider()
            .muted("3件のメッセージを要約");
        assert_eq!(
            card.to_plain_text(),
            "**会話の要約**\n\nまとめ\n\n---\n\n*3件のメッセージを要約*"
        );
    }

    #[test]
    fn description_skips_fields_and_muted() {
        let card = Card::new("t").text("a").field("原文", "x").muted("m").text("b");
        assert_eq!(card.description(), "a\n\nb");
        assert_eq!(card.footer().as_deref(), Some("m"));
        assert_eq!(card.fields().collect::<Vec<_>>(), vec![("原文", "x")]);
    }

    #[test]
    fn truncation_counts_characters() {
        assert_eq!(truncate_chars("あいうえお", 5), "あいうえお");
        assert_eq!(truncate_chars("あいうえおか", 5), "あいうえ…");
    }
}
