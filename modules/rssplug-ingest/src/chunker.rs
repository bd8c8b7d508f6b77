//! Line-boundary chunking of text that exceeds the entry ceiling.
//!
//! Lengths are UTF-8 bytes. Each chunk ends just after the last `\n` that
//! fits within the ceiling. When the first `ceiling` bytes hold no line
//! break, the chunk is hard-cut at the last character boundary that fits.
//! Concatenating the chunks always reproduces the input.

use rssplug_common::config::MIN_CEILING;

#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    ceiling: usize,
}

impl Chunker {
    /// Panics if `ceiling` is below [`MIN_CEILING`]; config validation
    /// rejects such values before they get here.
    pub fn new(ceiling: usize) -> Self {
        assert!(
            ceiling >= MIN_CEILING,
            "ceiling {ceiling} is below the minimum of {MIN_CEILING}"
        );
        Self { ceiling }
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    pub fn fits(&self, text: &str) -> bool {
        text.len() <= self.ceiling
    }

    pub fn chunk<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut chunks = Vec::new();
        let mut rest = text;

        while rest.len() > self.ceiling {
            let cut = self.boundary(rest);
            let (chunk, tail) = rest.split_at(cut);
            chunks.push(chunk);
            rest = tail;
        }

        if !rest.is_empty() || chunks.is_empty() {
            chunks.push(rest);
        }
        chunks
    }

    /// Byte offset where the next chunk of `text` ends. Always in
    /// `1..=ceiling`.
    fn boundary(&self, text: &str) -> usize {
        let window = &text.as_bytes()[..self.ceiling];
        if let Some(newline) = window.iter().rposition(|&b| b == b'\n') {
            return newline + 1;
        }

        let mut cut = self.ceiling;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        cut
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(rssplug_common::config::DEFAULT_CEILING)
    }
}
