//! Utility functions for HTML message splitting and retries.

use anyhow::Result;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::warn;
use unicode_segmentation::UnicodeSegmentation;

/// Longest HTML character reference treated as one unit, e.g. `&quot;`.
const MAX_ENTITY_LEN: usize = 10;

/// Splits an HTML message into parts of at most `limit` characters.
///
/// Parts break on line boundaries where possible. A line that does not fit
/// on its own is cut between tags, character references and grapheme
/// clusters, never inside one. Tags still open at a cut are closed at the end
/// of the part and reopened at the start of the next. Empty input yields no
/// parts.
///
/// # Examples
///
/// ```
/// use reclaim_core::utils::split_long_message;
/// let parts = split_long_message("aaa\nbbb\nccc", 7);
/// assert_eq!(parts, vec!["aaa\nbbb".to_string(), "ccc".to_string()]);
///
/// let parts = split_long_message("<b>abcdefgh</b>", 12);
/// assert_eq!(parts, vec!["<b>abcde</b>".to_string(), "<b>fgh</b>".to_string()]);
/// ```
#[must_use]
pub fn split_long_message(text: &str, limit: usize) -> Vec<String> {
    let mut splitter = HtmlSplitter::new(limit);
    for (i, line) in text.split('\n').enumerate() {
        splitter.push_line(line, i > 0);
    }
    splitter.finish()
}

struct HtmlSplitter<'a> {
    limit: usize,
    parts: Vec<String>,
    current: String,
    current_len: usize,
    /// Length of the reopened tags a fresh part starts with
    fresh_len: usize,
    /// Opening tags not yet closed, outermost first
    open: Vec<&'a str>,
}

impl<'a> HtmlSplitter<'a> {
    const fn new(limit: usize) -> Self {
        Self {
            limit,
            parts: Vec::new(),
            current: String::new(),
            current_len: 0,
            fresh_len: 0,
            open: Vec::new(),
        }
    }

    const fn is_fresh(&self) -> bool {
        self.current_len == self.fresh_len
    }

    fn push_line(&mut self, line: &'a str, after_newline: bool) {
        let tokens = html_tokens(line);
        let mut open = self.open.clone();
        for &token in &tokens {
            track_tag(&mut open, token);
        }

        let separator = usize::from(after_newline && !self.is_fresh());
        let line_len = line.chars().count();
        if self.current_len + separator + line_len + closing_len(&open) <= self.limit {
            if separator == 1 {
                self.current.push('\n');
            }
            self.current.push_str(line);
            self.current_len += separator + line_len;
            self.open = open;
            return;
        }

        // The newline becomes the part boundary
        if !self.is_fresh() {
            self.flush();
        }
        for token in tokens {
            self.push_token(token);
        }
    }

    fn push_token(&mut self, token: &'a str) {
        let mut open = self.open.clone();
        track_tag(&mut open, token);

        let token_len = token.chars().count();
        if !self.is_fresh() && self.current_len + token_len + closing_len(&open) > self.limit {
            self.flush();
        }
        self.current.push_str(token);
        self.current_len += token_len;
        self.open = open;
    }

    fn flush(&mut self) {
        let mut part = std::mem::take(&mut self.current);
        for tag in self.open.iter().rev() {
            part.push_str("</");
            part.push_str(tag_name(tag));
            part.push('>');
        }
        self.parts.push(part);

        self.current = self.open.concat();
        self.current_len = self.current.chars().count();
        self.fresh_len = self.current_len;
    }

    fn finish(mut self) -> Vec<String> {
        if !self.is_fresh() {
            self.flush();
        }
        self.parts.retain(|part| !part.trim().is_empty());
        self.parts
    }
}

/// Splits a line into tags, character references and grapheme clusters.
fn html_tokens(line: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut rest = line;

    while !rest.is_empty() {
        let len = if rest.starts_with('<') {
            rest.find('>').map(|end| end + 1)
        } else if rest.starts_with('&') {
            rest.char_indices()
                .take(MAX_ENTITY_LEN)
                .find(|&(_, c)| c == ';')
                .map(|(end, _)| end + 1)
        } else {
            None
        };
        let len = len
            .or_else(|| rest.graphemes(true).next().map(str::len))
            .unwrap_or(rest.len());

        let (token, tail) = rest.split_at(len);
        tokens.push(token);
        rest = tail;
    }

    tokens
}

fn track_tag<'a>(open: &mut Vec<&'a str>, token: &'a str) {
    if !(token.starts_with('<') && token.ends_with('>')) || token.ends_with("/>") {
        return;
    }
    if token.starts_with("</") {
        open.pop();
    } else {
        open.push(token);
    }
}

fn tag_name(tag: &str) -> &str {
    tag.trim_start_matches(['<', '/'])
        .trim_end_matches('>')
        .split_whitespace()
        .next()
        .unwrap_or_default()
}

fn closing_len(open: &[&str]) -> usize {
    open.iter().map(|tag| tag_name(tag).len() + 3).sum()
}

/// Retries an async chat API operation with exponential backoff.
///
/// The retry strategy uses exponential backoff with jitter:
/// - Initial delay: 500ms
/// - Max delay: 4s
/// - Max retries: 3 (constants in `config.rs`)
///
/// # Errors
///
/// Returns the last error if every attempt fails.
///
/// # Examples
///
/// ```no_run
/// use reclaim_core::utils::retry_chat_operation;
/// use anyhow::Result;
///
/// async fn send() -> Result<()> {
///     Ok(())
/// }
///
/// # async fn example() -> Result<()> {
/// retry_chat_operation(|| async { send().await }).await?;
/// # Ok(())
/// # }
/// ```
pub async fn retry_chat_operation<F, Fut, T>(operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    use crate::config::{
        CHAT_API_INITIAL_BACKOFF_MS, CHAT_API_MAX_BACKOFF_MS, CHAT_API_MAX_RETRIES,
    };

    let retry_strategy = ExponentialBackoff::from_millis(CHAT_API_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(CHAT_API_MAX_BACKOFF_MS))
        .map(jitter)
        .take(CHAT_API_MAX_RETRIES);

    Retry::spawn(retry_strategy, operation).await.map_err(|e| {
        warn!(
            "Chat API operation failed after {} attempts: {}",
            CHAT_API_MAX_RETRIES, e
        );
        e
    })
}
