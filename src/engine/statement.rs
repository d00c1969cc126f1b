//! Statement assembly.
//!
//! `SqlBuilder` only takes static SQL fragments, validated [`Ident`]s and
//! [`SqlType`]s, and bind parameters. There is no way to append a runtime
//! `String` as SQL text.

use serde_json::Value;

use crate::engine::catalog::DocumentId;
use crate::engine::sanitizer::Ident;
use crate::engine::types::SqlType;

/// What a statement does, used for logging and by test stores
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    CreateTable { table: String },
    CreateFunction { name: String },
    Select { table: String },
    Insert { table: String },
    Lock { document_id: DocumentId },
}

impl StatementKind {
    pub fn label(&self) -> &'static str {
        match self {
            StatementKind::CreateTable { .. } => "create_table",
            StatementKind::CreateFunction { .. } => "create_function",
            StatementKind::Select { .. } => "select",
            StatementKind::Insert { .. } => "insert",
            StatementKind::Lock { .. } => "lock",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
    pub kind: StatementKind,
}

impl Statement {
    /// Fixed statement text with no identifiers from the catalog
    pub(crate) fn fixed(sql: &'static str, kind: StatementKind) -> Self {
        Self { sql: sql.to_string(), params: vec![], kind }
    }

    /// Transaction-scoped advisory lock serializing work on one document
    pub fn document_lock(document_id: DocumentId) -> Self {
        let mut builder = SqlBuilder::new();
        builder.push("SELECT pg_advisory_xact_lock(doctable_lock_key(");
        builder.param(Value::from(document_id));
        builder.push("))");
        builder.build(StatementKind::Lock { document_id })
    }
}

#[derive(Debug, Default)]
pub struct SqlBuilder {
    sql: String,
    params: Vec<Value>,
}

impl SqlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: &'static str) -> &mut Self {
        self.sql.push_str(fragment);
        self
    }

    pub fn ident(&mut self, ident: &Ident) -> &mut Self {
        self.sql.push_str(&ident.to_string());
        self
    }

    /// Column type from the type registry
    pub fn sql_type(&mut self, sql_type: &SqlType) -> &mut Self {
        self.sql.push_str(sql_type.as_str());
        self
    }

    /// `alias."column"`
    pub fn qualified(&mut self, alias: &'static str, ident: &Ident) -> &mut Self {
        self.sql.push_str(alias);
        self.sql.push('.');
        self.ident(ident)
    }

    /// Bind a value without emitting anything; returns its placeholder number
    pub fn bind(&mut self, value: Value) -> usize {
        self.params.push(value);
        self.params.len()
    }

    /// Emit `$n` for a value bound earlier
    pub fn placeholder(&mut self, n: usize) -> &mut Self {
        self.sql.push('$');
        self.sql.push_str(&n.to_string());
        self
    }

    /// Bind a value and emit its `$n` placeholder
    pub fn param(&mut self, value: Value) -> &mut Self {
        let n = self.bind(value);
        self.placeholder(n)
    }

    /// Emit `f(item)` for each item, separated by `sep`
    pub fn join<T>(
        &mut self,
        items: impl IntoIterator<Item = T>,
        sep: &'static str,
        mut f: impl FnMut(&mut Self, T),
    ) -> &mut Self {
        for (i, item) in items.into_iter().enumerate() {
            if i > 0 {
                self.sql.push_str(sep);
            }
            f(self, item);
        }
        self
    }

    pub fn build(self, kind: StatementKind) -> Statement {
        Statement { sql: self.sql, params: self.params, kind }
    }
}
