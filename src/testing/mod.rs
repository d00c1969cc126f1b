//! Test doubles shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::database::store::{ObjectKind, Row, Store, StoreError};
use crate::engine::catalog::{Document, DocumentId, FieldDefinition, MemoryCatalog};
use crate::engine::statement::{Statement, StatementKind};

pub const SALES: DocumentId = 1;
pub const PAIRS: DocumentId = 2;

/// Document 1: {amount: decimal, qty: integer, label: text}
/// Document 2: {a: integer, b: text}
pub fn sales_catalog() -> MemoryCatalog {
    let mut catalog = MemoryCatalog::new();
    catalog.insert(
        Document::new(SALES, "Sales", "sales"),
        vec![
            FieldDefinition::new("amount", "Unit Price", "DECIMAL(10, 2)", 1),
            FieldDefinition::new("qty", "Quantity", "INT", 2),
            FieldDefinition::new("label", "Label", "NVARCHAR(300)", 3),
        ],
    );
    catalog.insert(
        Document::new(PAIRS, "Pairs", "pairs"),
        vec![
            FieldDefinition::new("a", "a", "integer", 1),
            FieldDefinition::new("b", "b", "text", 2),
        ],
    );
    catalog
}

#[derive(Default, Clone)]
struct State {
    objects: HashSet<(ObjectKind, String)>,
    rows: HashMap<String, Vec<Row>>,
    batches: Vec<Vec<Statement>>,
    calls: usize,
}

/// In-memory [`Store`]: tracks created objects and records every statement.
/// SQL text is not interpreted; inserts are applied from their bound
/// parameters (`$1` payload, `$2..` keys), skipping rows equal under every key.
/// Inserted rows are stored keyed by payload key.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    stale_probe: bool,
    failure: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table probes always answer "absent", as if another caller raced us
    pub fn with_stale_probe(mut self) -> Self {
        self.stale_probe = true;
        self
    }

    /// Every call fails with an opaque driver error
    pub fn failing_with(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    pub fn with_table(self, table: &str, rows: Vec<Row>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.objects.insert((ObjectKind::Table, table.to_string()));
            state.rows.insert(table.to_string(), rows);
        }
        self
    }

    pub fn with_object(self, kind: ObjectKind, name: &str) -> Self {
        self.state.lock().unwrap().objects.insert((kind, name.to_string()));
        self
    }

    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().calls
    }

    pub fn batches(&self) -> Vec<Vec<Statement>> {
        self.state.lock().unwrap().batches.clone()
    }

    pub fn statements(&self) -> Vec<Statement> {
        self.batches().into_iter().flatten().collect()
    }

    pub fn count_kind(&self, label: &str) -> usize {
        self.statements().iter().filter(|s| s.kind.label() == label).count()
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .objects
            .contains(&(ObjectKind::Table, table.to_string()))
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.state.lock().unwrap().rows.get(table).map_or(0, Vec::len)
    }

    pub fn table_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .objects
            .iter()
            .filter(|(kind, _)| *kind == ObjectKind::Table)
            .count()
    }

    fn begin_call(&self) -> Result<(), StoreError> {
        self.state.lock().unwrap().calls += 1;
        match &self.failure {
            Some(message) => Err(StoreError::Sqlx(sqlx::Error::Protocol(message.clone()))),
            None => Ok(()),
        }
    }

    fn apply(&self, state: &mut State, statement: &Statement) -> Result<u64, StoreError> {
        match &statement.kind {
            StatementKind::CreateTable { table } => {
                if !state.objects.insert((ObjectKind::Table, table.clone())) {
                    return Err(StoreError::DuplicateObject(format!(
                        "relation \"{}\" already exists",
                        table
                    )));
                }
                state.rows.insert(table.clone(), vec![]);
                Ok(0)
            }
            StatementKind::CreateFunction { name } => {
                if !state.objects.insert((ObjectKind::Function, name.clone())) {
                    return Err(StoreError::DuplicateObject(format!(
                        "function {} already exists",
                        name
                    )));
                }
                Ok(0)
            }
            StatementKind::Insert { table } | StatementKind::Select { table } => {
                if !state.objects.contains(&(ObjectKind::Table, table.clone())) {
                    return Err(StoreError::UndefinedObject(format!(
                        "relation \"{}\" does not exist",
                        table
                    )));
                }
                match statement.kind {
                    StatementKind::Insert { .. } => {
                        let rows = state.rows.entry(table.clone()).or_default();
                        Ok(insert_missing(rows, &statement.params))
                    }
                    _ => Ok(0),
                }
            }
            StatementKind::Lock { .. } => Ok(1),
        }
    }
}

fn insert_missing(rows: &mut Vec<Row>, params: &[Value]) -> u64 {
    let Some(Value::Array(items)) = params.first() else { return 0 };
    let keys: Vec<&str> = params.get(1..).unwrap_or(&[]).iter().filter_map(Value::as_str).collect();

    let mut inserted = 0;
    for item in items {
        let row: Row = keys
            .iter()
            .map(|key| (key.to_string(), item.get(*key).cloned().unwrap_or(Value::Null)))
            .collect();
        if !rows.contains(&row) {
            rows.push(row);
            inserted += 1;
        }
    }
    inserted
}

#[async_trait]
impl Store for MemoryStore {
    async fn execute(&self, statement: &Statement) -> Result<u64, StoreError> {
        self.execute_atomic(std::slice::from_ref(statement))
            .await
            .map(|affected| affected[0])
    }

    async fn query(&self, statement: &Statement) -> Result<Vec<Row>, StoreError> {
        self.begin_call()?;
        let mut state = self.state.lock().unwrap();
        state.batches.push(vec![statement.clone()]);
        match &statement.kind {
            StatementKind::Select { table } => state.rows.get(table).cloned().ok_or_else(|| {
                StoreError::UndefinedObject(format!("relation \"{}\" does not exist", table))
            }),
            _ => Ok(vec![]),
        }
    }

    async fn execute_atomic(&self, statements: &[Statement]) -> Result<Vec<u64>, StoreError> {
        self.begin_call()?;
        let mut state = self.state.lock().unwrap();
        state.batches.push(statements.to_vec());

        // Work on a copy so a failure leaves nothing behind
        let mut working = state.clone();
        let affected = statements
            .iter()
            .map(|s| self.apply(&mut working, s))
            .collect::<Result<Vec<_>, _>>()?;

        working.batches = std::mem::take(&mut state.batches);
        working.calls = state.calls;
        *state = working;
        Ok(affected)
    }

    async fn exists_object(&self, kind: ObjectKind, name: &str) -> Result<bool, StoreError> {
        self.begin_call()?;
        if self.stale_probe && kind == ObjectKind::Table {
            return Ok(false);
        }
        Ok(self
            .state
            .lock()
            .unwrap()
            .objects
            .contains(&(kind, name.to_string())))
    }
}
