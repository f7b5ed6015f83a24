//! Text shaping for the speech channel.
//!
//! Everything the gateway sends downstream is read aloud by the relay
//! provider's TTS, so raw web artifacts have to become speakable words.
//! `sanitize_for_speech` runs on every outbound path, model-generated or
//! local.

use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9][A-Za-z0-9.-]*\.[A-Za-z]{2,}").unwrap());

static SCHEME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(?:https?|wss?)://").unwrap());

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

static REPEAT_PUNCT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.]{2,}|[,]{2,}|[!]{2,}|[?]{2,}|[;]{2,}|[:]{2,}").unwrap());

/// Rewrite a reply so TTS reads it naturally.
///
/// The store's own domain and any email addresses become spoken-word
/// equivalents, other URL schemes are stripped, and repeated
/// whitespace/punctuation artifacts are collapsed.
pub fn sanitize_for_speech(text: &str, own_domain: &str) -> String {
    // Emails first, while the "@" and dots are still intact
    let text = EMAIL_RE.replace_all(text, |caps: &regex::Captures| {
        let email = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        match email.split_once('@') {
            Some((user, domain)) => format!("{} at {}", user, speak_dots(domain)),
            None => email.to_string(),
        }
    });

    // Drop raw scheme prefixes, then spell out the store's own domain
    let text = SCHEME_RE.replace_all(&text, "");
    let text = if own_domain.is_empty() {
        text.into_owned()
    } else {
        replace_case_insensitive(&text, own_domain, &speak_dots(own_domain))
    };

    // Edges are left alone: streamed partial tokens rely on their
    // leading/trailing spaces to join into words downstream
    let text = REPEAT_PUNCT_RE.replace_all(&text, |caps: &regex::Captures| {
        caps.get(0)
            .and_then(|m| m.as_str().chars().next())
            .map(|c| c.to_string())
            .unwrap_or_default()
    });
    WHITESPACE_RE.replace_all(&text, " ").into_owned()
}

/// "storelinemarket.com" -> "storelinemarket dot com"
fn speak_dots(domain: &str) -> String {
    domain.split('.').collect::<Vec<_>>().join(" dot ")
}

/// Case-insensitive literal replacement.
fn replace_case_insensitive(haystack: &str, needle: &str, replacement: &str) -> String {
    if needle.is_empty() {
        return haystack.to_string();
    }
    let lower_haystack = haystack.to_lowercase();
    let lower_needle = needle.to_lowercase();
    let mut result = String::with_capacity(haystack.len());
    let mut cursor = 0;
    while let Some(pos) = lower_haystack[cursor..].find(&lower_needle) {
        let start = cursor + pos;
        result.push_str(&haystack[cursor..start]);
        result.push_str(replacement);
        cursor = start + needle.len();
    }
    result.push_str(&haystack[cursor..]);
    result
}

/// Spell a postal code digit by digit: "95816" -> "9-5-8-1-6".
pub fn spoken_digits(code: &str) -> String {
    code.chars()
        .filter(|c| c.is_ascii_digit())
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join("-")
}

/// Format an order minimum, dropping a trailing ".00": 40.0 -> "$40".
pub fn format_minimum(amount: f64) -> String {
    if (amount - amount.round()).abs() < 0.005 {
        format!("${}", amount.round() as i64)
    } else {
        format!("${amount:.2}")
    }
}

/// Format a delivery fee, always two decimals: 1.99 -> "$1.99".
pub fn format_fee(amount: f64) -> String {
    format!("${amount:.2}")
}
