//! Key prefix grammar
//!
//! Prefixes have the form `{pk|sk}_{env}_{slice}` and allow O(1) detection of
//! the key type and environment without hashing the presented secret. The
//! prefix is never sufficient for lookup; records are resolved by key hash.

use once_cell::sync::Lazy;
use regex::Regex;

use super::entity::KeyType;
use crate::domain::environment::Environment;
use crate::domain::DomainError;

/// Number of random characters carried in the stored, human-visible prefix
pub const PREFIX_SLICE_LEN: usize = 8;

static PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(pk|sk)_(prod|stg|dev|test|prev)_").expect("valid prefix regex"));

/// Type and environment parsed from a presented key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedPrefix {
    pub key_type: KeyType,
    pub environment: Environment,
}

/// Parses the prefix of a presented key
///
/// Fails with [`DomainError::MalformedKey`] when the string does not match
/// the `{pk|sk}_{env}_` pattern.
pub fn parse_key_prefix(presented: &str) -> Result<ParsedPrefix, DomainError> {
    let captures = PREFIX_RE.captures(presented).ok_or(DomainError::MalformedKey)?;

    let key_type =
        KeyType::from_token(&captures[1]).expect("regex alternation matches known tokens");
    let environment =
        Environment::parse(&captures[2]).expect("regex alternation matches known codes");

    Ok(ParsedPrefix {
        key_type,
        environment,
    })
}

/// Builds the stored prefix from type, environment, and a random slice
pub fn format_prefix(key_type: KeyType, environment: Environment, slice: &str) -> String {
    format!("{}_{}_{}", key_type.token(), environment.code(), slice)
}

/// Human-visible prefix of a full key, safe to log
pub fn visible_prefix(presented: &str) -> &str {
    match PREFIX_RE.find(presented) {
        Some(m) => {
            let end = (m.end() + PREFIX_SLICE_LEN).min(presented.len());
            &presented[..end]
        }
        None => "",
    }
}
