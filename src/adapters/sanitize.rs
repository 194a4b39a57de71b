//! Log sanitization for account and credential data.
//!
//! Identities reach this crate as opaque strings chosen upstream, and those
//! are often email addresses or phone numbers. This module redacts such
//! values, plus credentials that may leak in through error messages, from
//! formatted log lines before they reach the sink.
//!
//! Input is capped (`MEDIPULSE_SANITIZE_MAX_BYTES`, default 16 KiB) so a
//! single oversized line cannot stall the writer.

use std::sync::OnceLock;

use regex::{Regex, RegexSet};
use tracing_subscriber::fmt::MakeWriter;

const DEFAULT_SANITIZE_MAX_BYTES: usize = 16 * 1024;

struct Rule {
    regex: Regex,
    replacement: &'static str,
}

struct Rules {
    set: RegexSet,
    rules: Vec<Rule>,
}

static RULES: OnceLock<Rules> = OnceLock::new();

fn rules() -> &'static Rules {
    RULES.get_or_init(|| {
        // Order matters: credentials before the generic patterns they contain.
        let table: [(&str, &'static str); 5] = [
            (
                r"(?i)\b(?:password|passwd|pwd|secret|token|api[_-]?key)\b\s*[:=]\s*\S+",
                "[REDACTED-SECRET]",
            ),
            (r"(?i)\bbearer\s+[A-Za-z0-9._~+/-]{8,}=*", "[REDACTED-BEARER]"),
            (
                r"(?i)\b[a-z0-9](?:[a-z0-9._%+-]{0,62}[a-z0-9])?@(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,}\b",
                "[REDACTED-EMAIL]",
            ),
            (
                r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
                "[REDACTED-UUID]",
            ),
            (
                r"\b(?:\+?1[-.\s]?)?\(?[0-9]{3}\)?[-.\s][0-9]{3}[-.\s][0-9]{4}\b",
                "[REDACTED-PHONE]",
            ),
        ];

        let set = RegexSet::new(table.iter().map(|(p, _)| *p)).expect("static patterns compile");
        let rules = table
            .iter()
            .map(|(pattern, replacement)| Rule {
                regex: Regex::new(pattern).expect("static patterns compile"),
                replacement,
            })
            .collect();
        Rules { set, rules }
    })
}

fn max_sanitize_bytes() -> usize {
    std::env::var("MEDIPULSE_SANITIZE_MAX_BYTES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&v| v > 0)
        .unwrap_or(DEFAULT_SANITIZE_MAX_BYTES)
}

fn truncate_to_char_boundary(input: &str, max_bytes: usize) -> (&str, bool) {
    if input.len() <= max_bytes {
        return (input, false);
    }
    let mut end = max_bytes;
    while end > 0 && !input.is_char_boundary(end) {
        end -= 1;
    }
    (&input[..end], true)
}

/// Redact sensitive values from `input`.
#[must_use]
pub fn sanitize(input: &str) -> String {
    sanitize_with_limit(input, max_sanitize_bytes())
}

fn sanitize_with_limit(input: &str, max_bytes: usize) -> String {
    let rules = rules();
    let (prefix, truncated) = truncate_to_char_boundary(input, max_bytes);

    let mut out = prefix.to_string();
    for idx in rules.set.matches(prefix).into_iter() {
        let rule = &rules.rules[idx];
        out = rule.regex.replace_all(&out, rule.replacement).into_owned();
    }

    if truncated {
        out.push_str(" [TRUNCATED]");
        // Keep the line terminator the writer split on.
        if input.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

/// A `tracing_subscriber` writer that sanitizes each formatted line before
/// passing it to the wrapped writer.
#[derive(Debug, Clone)]
pub struct SanitizingMakeWriter<M> {
    inner: M,
}

impl<M> SanitizingMakeWriter<M> {
    #[must_use]
    pub fn new(inner: M) -> Self {
        Self { inner }
    }
}

/// Line-buffering writer produced by [`SanitizingMakeWriter`].
pub struct SanitizingWriter<W: std::io::Write> {
    inner: W,
    buffer: Vec<u8>,
}

impl<W: std::io::Write> SanitizingWriter<W> {
    fn write_sanitized(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        let text = String::from_utf8_lossy(bytes);
        self.inner.write_all(sanitize(&text).as_bytes())
    }

    fn flush_lines(&mut self) -> std::io::Result<()> {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.write_sanitized(&line)?;
        }
        Ok(())
    }
}

impl<W: std::io::Write> std::io::Write for SanitizingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);

        // A line with no newline in sight: emit what we have instead of
        // buffering without bound.
        if self.buffer.len() > max_sanitize_bytes().saturating_mul(2) {
            let pending = std::mem::take(&mut self.buffer);
            self.write_sanitized(&pending)?;
            self.inner.write_all(b"\n")?;
            return Ok(buf.len());
        }

        self.flush_lines()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_lines()?;
        if !self.buffer.is_empty() {
            let pending = std::mem::take(&mut self.buffer);
            self.write_sanitized(&pending)?;
        }
        self.inner.flush()
    }
}

impl<W: std::io::Write> Drop for SanitizingWriter<W> {
    fn drop(&mut self) {
        let _ = std::io::Write::flush(self);
    }
}

impl<'a, M> MakeWriter<'a> for SanitizingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = SanitizingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        SanitizingWriter {
            inner: self.inner.make_writer(),
            buffer: Vec::new(),
        }
    }
}
