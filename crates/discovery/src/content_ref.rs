//! Content references given by operators
//!
//! A tracked item can be named by its media id or by a post URL such as
//! `https://www.instagram.com/p/B1LbfVPlwIA/`. URLs are resolved offline: the
//! shortcode in the path is the media id written in base64 digits.

use url::Url;

const SHORTCODE_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Trailing characters that private-post shortcodes carry beyond the id.
const PRIVATE_SUFFIX_LEN: usize = 28;

const POST_HOSTS: [&str; 2] = ["instagram.com", "www.instagram.com"];
const POST_KINDS: [&str; 3] = ["p", "reel", "tv"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentRefError {
    #[error("empty content reference")]
    Empty,

    #[error("invalid content URL {input}: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("not a post URL: {0}")]
    NotAPost(String),

    #[error("invalid shortcode: {0}")]
    InvalidShortcode(String),
}

/// Resolve an operator-supplied reference to a content id.
///
/// Anything without a `/` is taken as an id verbatim. Everything else must be
/// a post URL; the scheme may be omitted.
pub fn resolve_content_id(input: &str) -> Result<String, ContentRefError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ContentRefError::Empty);
    }
    if !input.contains('/') {
        return Ok(input.to_string());
    }

    let with_scheme = if input.contains("://") {
        input.to_string()
    } else {
        format!("https://{input}")
    };
    let url = Url::parse(&with_scheme).map_err(|e| ContentRefError::InvalidUrl {
        input: input.to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https")
        || !url.host_str().is_some_and(|h| POST_HOSTS.contains(&h))
    {
        return Err(ContentRefError::NotAPost(input.to_string()));
    }

    let mut segments = url.path_segments().into_iter().flatten();
    match (segments.next(), segments.next()) {
        (Some(kind), Some(code)) if POST_KINDS.contains(&kind) && !code.is_empty() => {
            media_id_from_shortcode(code).map(|id| id.to_string())
        }
        _ => Err(ContentRefError::NotAPost(input.to_string())),
    }
}

/// Decode a post shortcode into its numeric media id.
pub fn media_id_from_shortcode(code: &str) -> Result<u128, ContentRefError> {
    let invalid = || ContentRefError::InvalidShortcode(code.to_string());
    let digits = if code.len() > PRIVATE_SUFFIX_LEN {
        code.get(..code.len() - PRIVATE_SUFFIX_LEN).ok_or_else(invalid)?
    } else {
        code
    };
    if digits.is_empty() {
        return Err(invalid());
    }

    digits.bytes().try_fold(0u128, |acc, byte| {
        let digit = SHORTCODE_ALPHABET
            .iter()
            .position(|&c| c == byte)
            .ok_or_else(invalid)?;
        acc.checked_mul(64)
            .and_then(|acc| acc.checked_add(digit as u128))
            .ok_or_else(invalid)
    })
}
