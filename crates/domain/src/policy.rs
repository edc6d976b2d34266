//! Length and format constraints for published posts

use crate::model::MAX_POST_CHARS;

const ELLIPSIS: &str = "...";
const QUOTES: [char; 2] = ['"', '\''];

/// Output policy for generated posts
#[derive(Debug, Clone)]
pub struct PostPolicy {
    max_chars: usize,
}

impl PostPolicy {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Turn raw model output into publishable text.
    ///
    /// Strips one layer of surrounding quotes, then hard-truncates to
    /// `max_chars` characters with a trailing ellipsis. No other editing.
    pub fn normalize(&self, raw: &str) -> String {
        let stripped = strip_quotes(raw);
        self.truncate(stripped)
    }

    fn truncate(&self, text: &str) -> String {
        if text.chars().count() <= self.max_chars {
            return text.to_string();
        }

        if self.max_chars <= ELLIPSIS.len() {
            return text.chars().take(self.max_chars).collect();
        }

        let keep = self.max_chars - ELLIPSIS.len();
        let mut truncated: String = text.chars().take(keep).collect();
        truncated.push_str(ELLIPSIS);
        truncated
    }

    /// Numbered requirement lines included in every prompt
    pub fn requirements(&self) -> Vec<String> {
        vec![
            "1. Fits your persona perfectly".to_string(),
            format!("2. Is under {} characters", self.max_chars),
            "3. Is relevant and interesting".to_string(),
            "4. Uses appropriate hashtags if relevant".to_string(),
            "5. Could spark conversation or provide value".to_string(),
        ]
    }
}

impl Default for PostPolicy {
    fn default() -> Self {
        Self::new(MAX_POST_CHARS)
    }
}

fn strip_quotes(raw: &str) -> &str {
    let text = raw.strip_prefix(QUOTES).unwrap_or(raw);
    text.strip_suffix(QUOTES).unwrap_or(text)
}
