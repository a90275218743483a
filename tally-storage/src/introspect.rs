//! Runtime schema discovery for the catalog store.
//!
//! Reads only store metadata. The store must hold exactly one user table;
//! SQLite's internal `sqlite_*` tables are ignored.

use rusqlite::Connection;
use tally_core::{
    classify_roles, ColumnDescriptor, RoleMap, RoleVocabulary, SchemaError, TableSchema,
    TallyResult,
};

use crate::error::sqlite;

const USER_TABLES_SQL: &str = "SELECT name FROM sqlite_master
     WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\'
     ORDER BY name";

const TABLE_COLUMNS_SQL: &str = "SELECT name, type FROM pragma_table_info(?1) ORDER BY cid";

/// Discovers the sole user table and resolves its column roles.
#[derive(Debug, Clone, Default)]
pub struct SchemaIntrospector {
    vocabulary: RoleVocabulary,
}

impl SchemaIntrospector {
    pub fn new(vocabulary: RoleVocabulary) -> Self {
        Self { vocabulary }
    }

    pub fn vocabulary(&self) -> &RoleVocabulary {
        &self.vocabulary
    }

    /// Name of the store's only user table.
    ///
    /// # Errors
    ///
    /// `NoUserTable` when the store is empty, `MultipleUserTables` when the
    /// single-table precondition does not hold.
    pub fn discover_table(&self, conn: &Connection) -> TallyResult<String> {
        let mut stmt = conn.prepare(USER_TABLES_SQL).map_err(sqlite)?;
        let mut tables = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(sqlite)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(sqlite)?;

        match tables.len() {
            0 => Err(SchemaError::NoUserTable.into()),
            1 => Ok(tables.remove(0)),
            _ => Err(SchemaError::MultipleUserTables { tables }.into()),
        }
    }

    /// Columns of `table` in declared order.
    pub fn discover_columns(
        &self,
        conn: &Connection,
        table: &str,
    ) -> TallyResult<Vec<ColumnDescriptor>> {
        let mut stmt = conn.prepare(TABLE_COLUMNS_SQL).map_err(sqlite)?;
        let columns = stmt
            .query_map([table], |row| {
                Ok(ColumnDescriptor {
                    name: row.get(0)?,
                    declared_type: row.get(1)?,
                })
            })
            .map_err(sqlite)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(sqlite)?;
        Ok(columns)
    }

    /// Assign roles with this introspector's vocabulary.
    pub fn classify_roles(
        &self,
        table: &str,
        columns: &[ColumnDescriptor],
    ) -> TallyResult<RoleMap> {
        Ok(classify_roles(table, columns, &self.vocabulary)?)
    }

    /// Discover table, columns, and roles in one pass.
    pub fn introspect(&self, conn: &Connection) -> TallyResult<TableSchema> {
        let table = self.discover_table(conn)?;
        let columns = self.discover_columns(conn, &table)?;
        let roles = self.classify_roles(&table, &columns)?;

        tracing::debug!(
            table = %table,
            columns = columns.len(),
            ordering = %roles.ordering,
            quantity = %roles.quantity,
            "Discovered catalog schema"
        );

        Ok(TableSchema {
            table,
            columns,
            roles,
        })
    }
}
