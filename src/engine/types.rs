//! Declared field types and how they map onto columns, render hints and
//! payload validation.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::catalog::FieldDefinition;
use crate::engine::error::{EngineError, EngineResult};

/// Rendering alignment for a projected column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Start,
    End,
    None,
}

/// Which JSON values a payload may carry for a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Integer,
    Decimal,
    Text,
    DateTime,
    Date,
    Boolean,
}

/// Column type text as it appears in DDL and casts. Built-in names are
/// static; runtime names go through [`SqlType::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SqlType(Cow<'static, str>);

impl SqlType {
    pub(crate) const fn from_static(name: &'static str) -> Self {
        SqlType(Cow::Borrowed(name))
    }

    /// Accept a type name such as `UUID`, `DOUBLE PRECISION` or
    /// `NUMERIC(12, 4)`: letters, digits, underscores, spaces, commas and one
    /// balanced argument list.
    pub fn parse(name: impl Into<String>) -> EngineResult<Self> {
        let name = name.into();
        let invalid = |reason: &str| EngineError::invalid_identifier(name.clone(), reason);

        let trimmed = name.trim();
        if !trimmed.starts_with(|c: char| c.is_ascii_alphabetic()) {
            return Err(invalid("type name must start with a letter"));
        }
        if let Some(bad) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | ' ' | ',' | '(' | ')')))
        {
            return Err(invalid(&format!("character {:?} is not allowed in a type name", bad)));
        }

        let (open, close) = (trimmed.matches('(').count(), trimmed.matches(')').count());
        let balanced = match (open, close) {
            (0, 0) => true,
            (1, 1) => trimmed.ends_with(')') && trimmed.find('(') < trimmed.find(')'),
            _ => false,
        };
        if !balanced {
            return Err(invalid("type arguments must be a single trailing (...) list"));
        }

        Ok(SqlType(Cow::Owned(trimmed.to_string())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMapping {
    /// Physical column type, embedded in DDL and casts
    pub sql_type: SqlType,
    pub align: Align,
    pub kind: ValueKind,
}

impl TypeMapping {
    pub const fn new(sql_type: SqlType, align: Align, kind: ValueKind) -> Self {
        Self { sql_type, align, kind }
    }

    /// Whether projections should read the column back as text. NUMERIC keeps
    /// its declared scale only in its text form.
    pub fn projects_as_text(&self) -> bool {
        matches!(self.kind, ValueKind::Decimal | ValueKind::Text)
    }
}

const INTEGER: TypeMapping = TypeMapping::new(SqlType::from_static("BIGINT"), Align::End, ValueKind::Integer);
const DECIMAL: TypeMapping =
    TypeMapping::new(SqlType::from_static("NUMERIC(10, 2)"), Align::End, ValueKind::Decimal);
const TEXT: TypeMapping = TypeMapping::new(SqlType::from_static("TEXT"), Align::Start, ValueKind::Text);
const DATETIME: TypeMapping =
    TypeMapping::new(SqlType::from_static("TIMESTAMP"), Align::Start, ValueKind::DateTime);
const DATE: TypeMapping = TypeMapping::new(SqlType::from_static("DATE"), Align::Start, ValueKind::Date);
const BOOLEAN: TypeMapping = TypeMapping::new(SqlType::from_static("BOOLEAN"), Align::Start, ValueKind::Boolean);

/// Largest precision PostgreSQL accepts for NUMERIC
const MAX_NUMERIC_PRECISION: u32 = 1000;

const DEFAULT_TYPES: &[(&str, TypeMapping)] = &[
    ("integer", INTEGER),
    ("int", INTEGER),
    ("bigint", INTEGER),
    ("decimal", DECIMAL),
    ("numeric", DECIMAL),
    ("money", DECIMAL),
    ("text", TEXT),
    ("string", TEXT),
    ("varchar", TEXT),
    ("nvarchar", TEXT),
    ("datetime", DATETIME),
    ("timestamp", DATETIME),
    ("date", DATE),
    ("boolean", BOOLEAN),
    ("bool", BOOLEAN),
    ("bit", BOOLEAN),
];

/// Lookup table from declared type name to [`TypeMapping`]
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: HashMap<String, TypeMapping>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        let mut registry = Self { types: HashMap::new() };
        for (name, mapping) in DEFAULT_TYPES {
            registry.register(name, mapping.clone());
        }
        registry
    }
}

impl TypeRegistry {
    pub fn register(&mut self, declared: &str, mapping: TypeMapping) -> &mut Self {
        self.types.insert(Self::normalize(declared), mapping);
        self
    }

    /// Exact match first, then `base(args)` forms:
    /// - `varchar(300)` / `nvarchar(max)`: the length does not change the mapping
    /// - `decimal(p, s)` / `numeric(p)`: precision and scale carry into the column type
    pub fn lookup(&self, declared: &str) -> Option<TypeMapping> {
        let key = Self::normalize(declared);
        if let Some(mapping) = self.types.get(&key) {
            return Some(mapping.clone());
        }

        let (base, args) = key.strip_suffix(')')?.split_once('(')?;
        let mapping = self.types.get(base)?;
        match base {
            "varchar" | "nvarchar" => Some(mapping.clone()),
            "decimal" | "numeric" => {
                let (precision, scale) = parse_precision(args)?;
                Some(TypeMapping {
                    sql_type: SqlType(Cow::Owned(format!("NUMERIC({}, {})", precision, scale))),
                    ..mapping.clone()
                })
            }
            _ => None,
        }
    }

    /// Mapping for a field, or `UnsupportedType`
    pub fn resolve(&self, field: &FieldDefinition) -> EngineResult<TypeMapping> {
        self.lookup(&field.declared_type).ok_or_else(|| EngineError::UnsupportedType {
            field: field.name.clone(),
            declared: field.declared_type.clone(),
        })
    }

    pub fn resolve_all(&self, fields: &[FieldDefinition]) -> EngineResult<Vec<TypeMapping>> {
        fields.iter().map(|f| self.resolve(f)).collect()
    }

    fn normalize(declared: &str) -> String {
        declared
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase()
    }
}

/// `p` or `p,s` with 1 <= p <= 1000 and 0 <= s <= p
fn parse_precision(args: &str) -> Option<(u32, u32)> {
    let (precision, scale) = match args.split_once(',') {
        Some((p, s)) => (p.parse::<u32>().ok()?, s.parse::<u32>().ok()?),
        None => (args.parse::<u32>().ok()?, 0),
    };
    if precision == 0 || precision > MAX_NUMERIC_PRECISION || scale > precision {
        return None;
    }
    Some((precision, scale))
}
