//! Generic CRUD over the introspected catalog table.
//!
//! All SQL is built from the discovered [`TableSchema`]: identifiers come from
//! the store's own metadata and are quoted, every data value is bound.

use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use tally_core::{
    quote_identifier, NewRecord, Record, RowId, TableSchema, TallyConfig, TallyResult,
};

use crate::error::sqlite;
use crate::introspect::SchemaIntrospector;
use crate::session::SessionFactory;

/// Record operations against a store whose schema is discovered at runtime.
pub trait RecordStore {
    /// Every row, in the store's default order.
    fn list_all(&self) -> TallyResult<Vec<Record>>;

    /// Rows whose ordering value is strictly greater than `threshold`. A NULL
    /// ordering never matches.
    fn find_by_ordering_greater_than(&self, threshold: i64) -> TallyResult<Vec<Record>>;

    /// Number of rows in the table.
    fn count(&self) -> TallyResult<u64>;

    /// Secondary text of the first row whose primary text equals `value`.
    fn find_attribute_by_primary_text(&self, value: &str) -> TallyResult<Option<String>>;

    /// Point lookup by identity.
    fn find_by_id(&self, id: RowId) -> TallyResult<Option<Record>>;

    /// Set the quantity of row `id`. Returns the number of rows changed, which
    /// is zero when `id` does not exist.
    fn update_quantity(&self, id: RowId, quantity: i64) -> TallyResult<usize>;

    /// Append a row and return its identity.
    fn insert(&self, record: &NewRecord) -> TallyResult<RowId>;

    /// Delete row `id`. Returns the number of rows removed.
    fn delete_by_id(&self, id: RowId) -> TallyResult<usize>;

    /// Mean of the non-NULL ordering values, `0.0` when there are none.
    fn average_ordering(&self) -> TallyResult<f64>;
}

/// SQL text derived once from a discovered schema.
#[derive(Debug, Clone)]
struct Statements {
    select_all: String,
    select_after: String,
    select_by_id: String,
    count: String,
    attribute_by_primary: String,
    update_quantity: String,
    insert: String,
    delete_by_id: String,
    average_ordering: String,
}

impl Statements {
    fn build(schema: &TableSchema) -> Self {
        let roles = &schema.roles;
        let table = quote_identifier(&schema.table);
        let id = quote_identifier(&roles.identity);
        let primary = quote_identifier(&roles.primary_text);
        let secondary = quote_identifier(&roles.secondary_text);
        let ordering = quote_identifier(&roles.ordering);
        let quantity = quote_identifier(&roles.quantity);
        let projection = format!("{id}, {primary}, {secondary}, {ordering}, {quantity}");

        Self {
            select_all: format!("SELECT {projection} FROM {table}"),
            select_after: format!("SELECT {projection} FROM {table} WHERE {ordering} > ?1"),
            select_by_id: format!("SELECT {projection} FROM {table} WHERE {id} = ?1"),
            count: format!("SELECT COUNT(*) FROM {table}"),
            attribute_by_primary: format!(
                "SELECT {secondary} FROM {table} WHERE {primary} = ?1 ORDER BY {id} LIMIT 1"
            ),
            update_quantity: format!("UPDATE {table} SET {quantity} = ?1 WHERE {id} = ?2"),
            insert: format!(
                "INSERT INTO {table} ({primary}, {secondary}, {ordering}, {quantity})
                 VALUES (?1, ?2, ?3, ?4) RETURNING {id}"
            ),
            delete_by_id: format!("DELETE FROM {table} WHERE {id} = ?1"),
            average_ordering: format!("SELECT AVG({ordering}) FROM {table}"),
        }
    }
}

fn map_record(row: &Row<'_>) -> rusqlite::Result<Record> {
    Ok(Record {
        id: row.get(0)?,
        primary_text: row.get(1)?,
        secondary_text: row.get(2)?,
        ordering: row.get(3)?,
        quantity: row.get(4)?,
    })
}

/// [`RecordStore`] over a SQLite file.
///
/// The schema is discovered when the repository is opened and reused for every
/// call; [`SqliteRecordRepository::refresh_schema`] re-runs discovery if the
/// table may have changed shape.
#[derive(Debug, Clone)]
pub struct SqliteRecordRepository {
    sessions: SessionFactory,
    introspector: SchemaIntrospector,
    schema: TableSchema,
    statements: Statements,
}

impl SqliteRecordRepository {
    /// Open the catalog store and discover its schema.
    ///
    /// # Errors
    ///
    /// Fails if the store cannot be opened or its schema cannot be classified;
    /// no repository is returned in either case.
    pub fn open(sessions: SessionFactory, introspector: SchemaIntrospector) -> TallyResult<Self> {
        let conn = sessions.open()?;
        let schema = introspector.introspect(&conn)?;
        let statements = Statements::build(&schema);
        Ok(Self {
            sessions,
            introspector,
            schema,
            statements,
        })
    }

    pub fn from_config(config: &TallyConfig) -> TallyResult<Self> {
        Self::open(
            SessionFactory::catalog(config),
            SchemaIntrospector::new(config.roles.clone()),
        )
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Re-discover the table and its roles.
    pub fn refresh_schema(&mut self) -> TallyResult<&TableSchema> {
        let conn = self.sessions.open()?;
        self.schema = self.introspector.introspect(&conn)?;
        self.statements = Statements::build(&self.schema);
        Ok(&self.schema)
    }

    fn query_records<P: rusqlite::Params>(
        conn: &Connection,
        sql: &str,
        params: P,
    ) -> TallyResult<Vec<Record>> {
        let mut stmt = conn.prepare(sql).map_err(sqlite)?;
        let records = stmt
            .query_map(params, map_record)
            .map_err(sqlite)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(sqlite)?;
        Ok(records)
    }
}

impl RecordStore for SqliteRecordRepository {
    fn list_all(&self) -> TallyResult<Vec<Record>> {
        let conn = self.sessions.open()?;
        Self::query_records(&conn, &self.statements.select_all, [])
    }

    fn find_by_ordering_greater_than(&self, threshold: i64) -> TallyResult<Vec<Record>> {
        let conn = self.sessions.open()?;
        Self::query_records(&conn, &self.statements.select_after, params![threshold])
    }

    fn count(&self) -> TallyResult<u64> {
        let conn = self.sessions.open()?;
        let count: i64 = conn
            .query_row(&self.statements.count, [], |row| row.get(0))
            .map_err(sqlite)?;
        Ok(count.max(0) as u64)
    }

    fn find_attribute_by_primary_text(&self, value: &str) -> TallyResult<Option<String>> {
        let conn = self.sessions.open()?;
        // A matching row with a NULL secondary text reads the same as no match.
        let attribute: Option<Option<String>> = conn
            .query_row(
                &self.statements.attribute_by_primary,
                params![value],
                |row| row.get(0),
            )
            .optional()
            .map_err(sqlite)?;
        Ok(attribute.flatten())
    }

    fn find_by_id(&self, id: RowId) -> TallyResult<Option<Record>> {
        let conn = self.sessions.open()?;
        let record = conn
            .query_row(&self.statements.select_by_id, params![id], map_record)
            .optional()
            .map_err(sqlite)?;
        Ok(record)
    }

    fn update_quantity(&self, id: RowId, quantity: i64) -> TallyResult<usize> {
        let conn = self.sessions.open()?;
        let changed = conn
            .execute(&self.statements.update_quantity, params![quantity, id])
            .map_err(sqlite)?;
        if changed == 0 {
            tracing::warn!(id, quantity, table = %self.schema.table, "Quantity update matched no row");
        } else {
            tracing::info!(id, quantity, table = %self.schema.table, "Quantity updated");
        }
        Ok(changed)
    }

    fn insert(&self, record: &NewRecord) -> TallyResult<RowId> {
        let mut conn = self.sessions.open()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(sqlite)?;
        let id: RowId = tx.query_row(
            &self.statements.insert,
            params![
                record.primary_text,
                record.secondary_text,
                record.ordering,
                record.quantity,
            ],
            |row| row.get(0),
        )
        .map_err(sqlite)?;
        tx.commit().map_err(sqlite)?;
        tracing::info!(id, table = %self.schema.table, "Record inserted");
        Ok(id)
    }

    fn delete_by_id(&self, id: RowId) -> TallyResult<usize> {
        let conn = self.sessions.open()?;
        let removed = conn
            .execute(&self.statements.delete_by_id, params![id])
            .map_err(sqlite)?;
        tracing::info!(id, removed, table = %self.schema.table, "Record delete applied");
        Ok(removed)
    }

    fn average_ordering(&self) -> TallyResult<f64> {
        let conn = self.sessions.open()?;
        let average: Option<f64> = conn
            .query_row(&self.statements.average_ordering, [], |row| row.get(0))
            .map_err(sqlite)?;
        Ok(average.unwrap_or(0.0))
    }
}

// =============================================================================
// TESTS
// =============================================================================
