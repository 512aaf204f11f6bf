//! Normalisation rules for dictionary terms and their attributes.
//!
//! Terms are stored and cached under their normalised form, so every entry
//! point (HTTP, warmer, repositories) funnels user input through
//! [`normalize_term`] before touching the cache or the store.

use super::error::DomainError;

/// Trim and lowercase a term. Empty terms are rejected.
pub fn normalize_term(raw: &str) -> Result<String, DomainError> {
    let term = raw.trim();
    if term.is_empty() {
        return Err(DomainError::validation("term must not be empty"));
    }
    Ok(term.to_lowercase())
}

/// Trim and lowercase tags, dropping blanks and repeats while keeping order.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim().to_lowercase();
        if !tag.is_empty() && !normalized.contains(&tag) {
            normalized.push(tag);
        }
    }
    normalized
}

/// Trim definitions and require at least one non-blank entry.
pub fn normalize_definitions(definitions: Vec<String>) -> Result<Vec<String>, DomainError> {
    let definitions: Vec<String> = definitions
        .into_iter()
        .map(|definition| definition.trim().to_string())
        .filter(|definition| !definition.is_empty())
        .collect();

    if definitions.is_empty() {
        return Err(DomainError::validation(
            "at least one non-empty definition is required",
        ));
    }
    Ok(definitions)
}
