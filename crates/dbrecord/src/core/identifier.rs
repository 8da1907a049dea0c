//! Identifier validation and quoting.
//!
//! SQL identifiers (schema, table and column names) cannot be bound as
//! statement parameters, so every identifier that reaches generated SQL is
//! validated and then quoted with the dialect's delimiters:
//!
//! - ANSI (PostgreSQL, Oracle, DB2): `"name"`, embedded `"` doubled
//! - MySQL: `` `name` ``, embedded `` ` `` doubled
//! - SQL Server: `[name]`, embedded `]` doubled
//!
//! Quoting is idempotent: an identifier that is already a well-formed quoted
//! identifier for the same delimiters is returned unchanged.

use crate::error::{RecordError, Result};

/// Maximum identifier length (conservative limit across databases).
/// - PostgreSQL: 63 bytes
/// - SQL Server: 128 characters
/// - MySQL: 64 characters
/// - Oracle: 128 bytes
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier for security issues.
///
/// Rejects:
/// - Empty identifiers
/// - Identifiers containing null bytes (injection vector)
/// - Identifiers exceeding maximum length
///
/// # Errors
///
/// Returns `RecordError::Config` for invalid identifiers with a descriptive message.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(RecordError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(RecordError::Config(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(RecordError::Config(format!(
            "SECURITY: Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Whether `name` is already a quoted identifier for the given delimiters.
///
/// The body between the delimiters must have every `close` character doubled,
/// otherwise the string is an unquoted name that merely looks quoted.
pub fn is_quoted(name: &str, open: char, close: char) -> bool {
    let Some(inner) = name
        .strip_prefix(open)
        .and_then(|rest| rest.strip_suffix(close))
    else {
        return false;
    };

    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == close && chars.next() != Some(close) {
            return false;
        }
    }
    true
}

/// Quote `name` with the given delimiters, doubling embedded `close` characters.
///
/// Already-quoted identifiers are returned unchanged. No validation is done;
/// use [`validate_identifier`] first for names that come from user input.
pub fn escape_with(name: &str, open: char, close: char) -> String {
    if is_quoted(name, open, close) {
        return name.to_string();
    }
    let doubled: String = [close, close].iter().collect();
    format!("{}{}{}", open, name.replace(close, &doubled), close)
}
