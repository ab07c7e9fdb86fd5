//! Helpers for keeping log records on one line and free of secrets.
//!
//! Controller replies arrive with `\r\n` terminators and occasionally with
//! stray control bytes after a restart; audit messages and caller ids come
//! straight from RPC clients. Everything untrusted goes through
//! [`escape_log`] before it reaches a log macro.

use std::fmt::Write;

const MAX_PREVIEW: usize = 200;

/// Escape control characters so the string renders on a single log line.
///
/// `\r`, `\n` and `\t` get their usual escapes, other control characters
/// become `\xNN`. Anything past `MAX_PREVIEW` characters is cut with an
/// ellipsis.
pub fn escape_log(s: &str) -> String {
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Describe an `Authorization` header without revealing the credential.
///
/// Only the scheme survives, e.g. `Basic <redacted>`.
pub fn redact_authorization(header: Option<&str>) -> String {
    match header.map(str::trim) {
        None | Some("") => "<none>".to_string(),
        Some(value) => match value.split_once(' ') {
            Some((scheme, _)) => format!("{} <redacted>", escape_log(scheme)),
            None => "<redacted>".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_reply_terminators() {
        assert_eq!(escape_log("+1*4321\r\n"), "+1*4321\\r\\n");
        assert_eq!(escape_log("a\x07b"), "a\\x07b");
    }

    #[test]
    fn truncates_long_input() {
        let long = "x".repeat(500);
        let esc = escape_log(&long);
        assert!(esc.ends_with('…'));
        assert_eq!(esc.chars().count(), MAX_PREVIEW + 1);
    }

    #[test]
    fn redaction_keeps_only_scheme() {
        assert_eq!(
            redact_authorization(Some("Basic TjBDQUxMOmh1bnRlcjI=")),
            "Basic <redacted>"
        );
        assert_eq!(redact_authorization(None), "<none>");
        assert_eq!(redact_authorization(Some("garbage")), "<redacted>");
    }
}
