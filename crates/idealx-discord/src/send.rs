/// Maximum characters per Discord message (2000 is the limit; we use 1950 for safety).
pub const CHUNK_MAX: usize = 1950;

/// Split `text` into chunks of at most [`CHUNK_MAX`] characters, preferring
/// splits on newline/space boundaries to avoid cutting words mid-way.
///
/// Boundaries are computed on characters, never on bytes, so multi-byte
/// text is safe. Once a chunk boundary is fixed, appending more text never
/// moves it; streamed replies rely on that.
pub fn split_chunks(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut remaining = text;

    loop {
        let Some((window_end, _)) = remaining.char_indices().nth(CHUNK_MAX) else {
            break;
        };

        // Try to split on the last newline within the window.
        let window = &remaining[..window_end];
        let split_at = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(window_end);

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    if !remaining.is_empty() || chunks.is_empty() {
        chunks.push(remaining.to_string());
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_single_chunk() {
        let chunks = split_chunks("Hello, world!");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], "Hello, world!");
    }

    #[test]
    fn long_text_splits_on_newline() {
        let line = "a".repeat(1000);
        let text = format!("{}\n{}", line, line);
        let chunks = split_chunks(&text);
        // Both halves fit inside CHUNK_MAX, so should be 2 chunks.
        assert_eq!(chunks.len(), 2);
        for c in &chunks {
            assert!(c.chars().count() <= CHUNK_MAX, "chunk too large: {}", c.len());
        }
    }

    #[test]
    fn very_long_word_still_splits() {
        let text = "x".repeat(4000);
        let chunks = split_chunks(&text);
        assert_eq!(chunks.len(), 3);
        for c in &chunks {
            assert!(c.chars().count() <= CHUNK_MAX);
        }
    }

    #[test]
    fn japanese_text_splits_on_characters() {
        let text = "日本語".repeat(1000);
        let chunks = split_chunks(&text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), CHUNK_MAX);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn earlier_boundaries_survive_appends() {
        let mut text = format!("{}\n{}", "a".repeat(1500), "b".repeat(1000));
        let first = split_chunks(&text)[0].clone();
        text.push_str(&"c".repeat(3000));
        assert_eq!(split_chunks(&text)[0], first);
    }
}
