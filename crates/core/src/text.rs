//! Text statistics shown next to extracted text in the editor.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextStats {
    pub word_count: usize,
    pub char_count: usize,
    pub line_count: usize,
}

impl TextStats {
    /// Words are whitespace-separated, chars are Unicode scalar values and
    /// lines are `\n`-separated (empty text counts as one line).
    pub fn from_text(text: &str) -> Self {
        Self {
            word_count: text.split_whitespace().count(),
            char_count: text.chars().count(),
            line_count: text.split('\n').count(),
        }
    }
}
