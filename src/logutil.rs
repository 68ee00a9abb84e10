//! Log-safe rendering of raw command input so each log record stays on one line.

use std::borrow::Cow;

/// Longest input preview written to the log.
const MAX_PREVIEW: usize = 120;

/// Render `s` for a single log line: control characters become escapes and
/// input past [`MAX_PREVIEW`] characters is replaced by an ellipsis.
pub fn escape_log(s: &str) -> String {
    let mut chars = s.chars();
    let mut out: String = chars.by_ref().take(MAX_PREVIEW).map(escape_char).collect();
    if chars.next().is_some() {
        out.push('…');
    }
    out
}

fn escape_char(c: char) -> Cow<'static, str> {
    match c {
        '\\' => Cow::Borrowed("\\\\"),
        '\n' => Cow::Borrowed("\\n"),
        '\r' => Cow::Borrowed("\\r"),
        '\t' => Cow::Borrowed("\\t"),
        c if c.is_control() => Cow::Owned(format!("\\x{:02X}", c as u32)),
        c => Cow::Owned(c.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pasted_input_stays_on_one_line() {
        assert_eq!(escape_log("trade lunch\r\n"), "trade lunch\\r\\n");
        assert_eq!(escape_log("sell\tx\u{1b}"), "sell\\tx\\x1B");
        assert_eq!(escape_log("a\\b"), "a\\\\b");
    }

    #[test]
    fn long_input_is_truncated() {
        let long = "c".repeat(MAX_PREVIEW + 50);
        let escaped = escape_log(&long);
        assert_eq!(escaped.chars().count(), MAX_PREVIEW + 1);
        assert!(escaped.ends_with('…'));

        let exact = "c".repeat(MAX_PREVIEW);
        assert_eq!(escape_log(&exact), exact);
    }
}
