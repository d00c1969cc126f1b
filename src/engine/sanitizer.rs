//! Identifier validation for every name that ends up inside statement text.
//!
//! Names are validated, never rewritten: anything outside `[A-Za-z0-9_]` is
//! rejected with `InvalidIdentifier` so the caller sees exactly which catalog
//! entry is wrong.

use std::collections::HashSet;
use std::fmt;

use crate::engine::catalog::FieldDefinition;
use crate::engine::error::{EngineError, EngineResult};

/// Identity column added to every materialized table
pub const IDENTITY_COLUMN: &str = "id";

/// PostgreSQL truncates identifiers beyond NAMEDATALEN - 1 bytes
const MAX_IDENTIFIER_LEN: usize = 63;

/// A validated identifier. Only constructible through [`quote`] or [`column`],
/// renders double-quoted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident(String);

impl Ident {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn identity() -> Self {
        Ident(IDENTITY_COLUMN.to_string())
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0)
    }
}

/// Validate any catalog-supplied name (table or column)
pub fn quote(name: &str) -> EngineResult<Ident> {
    let mut chars = name.chars();
    let first = chars
        .next()
        .ok_or_else(|| EngineError::invalid_identifier(name, "identifier cannot be empty"))?;

    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(EngineError::invalid_identifier(
            name,
            "identifier must start with a letter or underscore",
        ));
    }
    if let Some(bad) = name.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
        return Err(EngineError::invalid_identifier(
            name,
            format!("character {:?} is not allowed", bad),
        ));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(EngineError::invalid_identifier(
            name,
            format!("identifier exceeds {} characters", MAX_IDENTIFIER_LEN),
        ));
    }

    Ok(Ident(name.to_string()))
}

/// Validate a field name as a data column, which also excludes the identity column
pub fn column(name: &str) -> EngineResult<Ident> {
    let ident = quote(name)?;
    if name.eq_ignore_ascii_case(IDENTITY_COLUMN) {
        return Err(EngineError::invalid_identifier(
            name,
            "conflicts with the reserved identity column",
        ));
    }
    Ok(ident)
}

/// Payload key for a display key: spaces become underscores
pub fn payload_key(display_key: &str) -> String {
    display_key.trim().replace(' ', "_")
}

/// Check the per-document invariants: valid column names, unique field names,
/// unique payload keys.
pub fn validate_fields(fields: &[FieldDefinition]) -> EngineResult<Vec<Ident>> {
    let mut names = HashSet::new();
    let mut keys = HashSet::new();
    let mut idents = Vec::with_capacity(fields.len());

    for field in fields {
        let ident = column(&field.name)?;
        if !names.insert(field.name.as_str()) {
            return Err(EngineError::invalid_identifier(
                &field.name,
                "field name is declared more than once",
            ));
        }

        let key = payload_key(&field.display_key);
        if key.is_empty() {
            return Err(EngineError::invalid_identifier(
                &field.name,
                "display key cannot be empty",
            ));
        }
        if !keys.insert(key.clone()) {
            return Err(EngineError::invalid_identifier(
                &field.display_key,
                format!("payload key '{}' is used by more than one field", key),
            ));
        }
        idents.push(ident);
    }

    Ok(idents)
}
