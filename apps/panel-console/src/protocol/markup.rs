//! Extraction of the few values the panel only exposes inside HTML.

use super::PlayerRecord;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;
use tracing::debug;

static ERROR_MESSAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<div\b[^>]*\bclass\s*=\s*["']errorMessage["'][^>]*>(.*?)</div>"#)
        .expect("valid regex")
});

static ANCHOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*?\bhref\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a\s*>"#)
        .expect("valid regex")
});

static TRAILING_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-9]+)$").expect("valid regex"));

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));

static ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").expect("valid regex"));

/// First non-empty error message rendered by the login form.
///
/// The form always carries one (usually hidden, empty) error slot per field,
/// so empty slots are skipped rather than treated as "no error".
pub fn login_error(html: &str) -> Option<String> {
    ERROR_MESSAGE
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|inner| text_content(inner.as_str()))
        .find(|text| !text.is_empty())
}

/// Players listed in the status fragment. Anchors whose link does not end in
/// a numeric id are skipped.
pub fn player_records(fragment: &str) -> Vec<PlayerRecord> {
    let mut players = Vec::new();
    for caps in ANCHOR.captures_iter(fragment) {
        let href = decode_entities(caps[1].trim());
        let name = text_content(&caps[2]);
        let Some(id) = trailing_id(&href) else {
            debug!(target: "panel::protocol", href = %href, name = %name, "skipping player link without id");
            continue;
        };
        players.push(PlayerRecord { name, id });
    }
    players
}

fn trailing_id(href: &str) -> Option<u64> {
    TRAILING_ID
        .captures(href)
        .and_then(|caps| caps[1].parse().ok())
}

/// Tag-stripped, entity-decoded, trimmed text of a markup fragment.
pub fn text_content(fragment: &str) -> String {
    let stripped = TAG.replace_all(fragment, "");
    decode_entities(&stripped).trim().to_string()
}

pub fn decode_entities(text: &str) -> Cow<'_, str> {
    ENTITY.replace_all(text, |caps: &Captures<'_>| {
        let entity = &caps[1];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some('\u{a0}'),
            _ => numeric_entity(entity),
        };
        match decoded {
            Some(ch) => ch.to_string(),
            None => caps[0].to_string(),
        }
    })
}

fn numeric_entity(entity: &str) -> Option<char> {
    let digits = entity.strip_prefix('#')?;
    let code = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse().ok()?,
    };
    char::from_u32(code)
}
