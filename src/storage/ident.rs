//! # Container Identifiers
//!
//! Container names are paths of `[a-z0-9_]` segments separated by `/`.
//! Mixed-case input is accepted and lowercased; everything else is
//! rejected before it can reach the filesystem. In particular `.` is not
//! allowed, keeping suffixes free for the storage layer to choose.
//!
//! The same identifier is normalized twice by the store: once with `/` as
//! the canonical open-set key, and once with the platform separator for
//! the on-disk path.

use eyre::{ensure, Result};

/// Returns true for characters an identifier may contain before
/// normalization.
pub fn is_allowed(character: char) -> bool {
    character.is_ascii_alphanumeric() || character == '_' || character == '/'
}

/// Lowercases `id` and maps `/` to `separator`.
///
/// Fails on empty input, on any disallowed character, and on two
/// consecutive separators.
pub fn normalize(id: &str, separator: char) -> Result<String> {
    ensure!(!id.is_empty(), "identifier must not be empty");

    let mut normalized = String::with_capacity(id.len());
    let mut previous_was_separator = false;
    for character in id.chars() {
        ensure!(
            is_allowed(character),
            "character {character:?} is not allowed in identifier {id:?}"
        );
        if character == '/' {
            ensure!(
                !previous_was_separator,
                "consecutive separators in identifier {id:?}"
            );
            previous_was_separator = true;
            normalized.push(separator);
        } else {
            previous_was_separator = false;
            normalized.push(character.to_ascii_lowercase());
        }
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_lowercases_and_remaps_separators() {
        assert_eq!(
            normalize("/Users/Johnny/123_hello", '\\').unwrap(),
            "\\users\\johnny\\123_hello"
        );
        assert_eq!(normalize("Data/Main", '/').unwrap(), "data/main");
    }

    #[test]
    fn normalize_is_idempotent_for_the_canonical_separator() {
        let once = normalize("Logs/Events_2024", '/').unwrap();
        let twice = normalize(&once, '/').unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn disallowed_characters_are_rejected() {
        assert!(normalize("C:/Users/johnny", '/').is_err());
        assert!(normalize("white space", '/').is_err());
        assert!(normalize("dotted.name", '/').is_err());
        assert!(normalize("", '/').is_err());
    }

    #[test]
    fn consecutive_separators_are_rejected() {
        assert!(normalize("a//b", '/').is_err());
        assert!(normalize("a/b", '/').is_ok());
    }
}
