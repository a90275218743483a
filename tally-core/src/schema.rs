//! Column roles and the pure role classifier.
//!
//! The introspected store's schema is not known at build time. Its columns are
//! discovered at runtime and mapped onto a fixed set of logical roles by
//! [`classify_roles`]. Identity, primary text and secondary text are matched by
//! exact (case-insensitive) name; quantity and ordering are resolved by
//! exclusion over whatever is left.

use crate::SchemaError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A physical column as reported by the store's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Declared SQL type, empty when the column was declared without one.
    pub declared_type: String,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
        }
    }
}

/// Logical meaning assigned to a physical column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnRole {
    Identity,
    PrimaryText,
    SecondaryText,
    Ordering,
    Quantity,
}

impl ColumnRole {
    pub const ALL: [ColumnRole; 5] = [
        ColumnRole::Identity,
        ColumnRole::PrimaryText,
        ColumnRole::SecondaryText,
        ColumnRole::Ordering,
        ColumnRole::Quantity,
    ];
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnRole::Identity => "Identity",
            ColumnRole::PrimaryText => "PrimaryText",
            ColumnRole::SecondaryText => "SecondaryText",
            ColumnRole::Ordering => "Ordering",
            ColumnRole::Quantity => "Quantity",
        };
        f.write_str(name)
    }
}

/// How to resolve a role when more than one column qualifies for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityPolicy {
    /// More than one candidate is a [`SchemaError::AmbiguousRole`].
    #[default]
    Strict,
    /// Take the first candidate in declared column order.
    FirstMatch,
}

/// Column names and markers used to recognise each role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RoleVocabulary {
    pub identity: String,
    pub primary_text: Vec<String>,
    pub secondary_text: Vec<String>,
    /// Substrings that mark a column as a stock level.
    pub quantity_markers: Vec<String>,
    pub ambiguity: AmbiguityPolicy,
}

impl Default for RoleVocabulary {
    fn default() -> Self {
        Self {
            identity: "id".to_string(),
            primary_text: vec!["title".to_string(), "owner".to_string()],
            secondary_text: vec!["author".to_string()],
            quantity_markers: vec![
                "stock".to_string(),
                "qty".to_string(),
                "quantity".to_string(),
            ],
            ambiguity: AmbiguityPolicy::Strict,
        }
    }
}

impl RoleVocabulary {
    fn is_quantity_like(&self, name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        self.quantity_markers
            .iter()
            .any(|marker| lower.contains(&marker.to_ascii_lowercase()))
    }
}

/// Physical column name for each role. Every role is always resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMap {
    pub identity: String,
    pub primary_text: String,
    pub secondary_text: String,
    pub ordering: String,
    pub quantity: String,
}

impl RoleMap {
    /// Physical column holding `role`.
    pub fn column(&self, role: ColumnRole) -> &str {
        match role {
            ColumnRole::Identity => &self.identity,
            ColumnRole::PrimaryText => &self.primary_text,
            ColumnRole::SecondaryText => &self.secondary_text,
            ColumnRole::Ordering => &self.ordering,
            ColumnRole::Quantity => &self.quantity,
        }
    }
}

/// Everything discovered about the introspected table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub table: String,
    pub columns: Vec<ColumnDescriptor>,
    pub roles: RoleMap,
}

/// Assign a role to the columns of `table`.
///
/// Columns are scanned in declared order. Identity, primary text and secondary
/// text are taken by exact name; the quantity column is the remaining column
/// whose name contains a quantity marker; the ordering column is the remaining
/// column that is neither classified nor quantity-like.
pub fn classify_roles(
    table: &str,
    columns: &[ColumnDescriptor],
    vocabulary: &RoleVocabulary,
) -> Result<RoleMap, SchemaError> {
    if columns.is_empty() {
        return Err(SchemaError::NoColumns {
            table: table.to_string(),
        });
    }

    let mut identity = None;
    let mut primary_text = None;
    let mut secondary_text = None;
    let mut remaining: Vec<&ColumnDescriptor> = Vec::new();

    for column in columns {
        let name = column.name.as_str();
        if identity.is_none() && name.eq_ignore_ascii_case(&vocabulary.identity) {
            identity = Some(name);
        } else if primary_text.is_none() && matches_any(name, &vocabulary.primary_text) {
            primary_text = Some(name);
        } else if secondary_text.is_none() && matches_any(name, &vocabulary.secondary_text) {
            secondary_text = Some(name);
        } else {
            remaining.push(column);
        }
    }

    let (quantity_like, others): (Vec<&ColumnDescriptor>, Vec<&ColumnDescriptor>) = remaining
        .into_iter()
        .partition(|c| vocabulary.is_quantity_like(&c.name));

    let quantity = pick(
        ColumnRole::Quantity,
        table,
        &quantity_like,
        vocabulary.ambiguity,
    )?;
    let ordering = pick(ColumnRole::Ordering, table, &others, vocabulary.ambiguity)?;

    Ok(RoleMap {
        identity: require(ColumnRole::Identity, table, identity)?,
        primary_text: require(ColumnRole::PrimaryText, table, primary_text)?,
        secondary_text: require(ColumnRole::SecondaryText, table, secondary_text)?,
        ordering,
        quantity,
    })
}

/// Quote a discovered identifier for interpolation into SQL text.
///
/// Only ever applied to names read back from the store's own metadata.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn matches_any(name: &str, names: &[String]) -> bool {
    names.iter().any(|n| name.eq_ignore_ascii_case(n))
}

fn require(role: ColumnRole, table: &str, found: Option<&str>) -> Result<String, SchemaError> {
    found
        .map(str::to_string)
        .ok_or_else(|| SchemaError::MissingRole {
            role,
            table: table.to_string(),
        })
}

fn pick(
    role: ColumnRole,
    table: &str,
    candidates: &[&ColumnDescriptor],
    policy: AmbiguityPolicy,
) -> Result<String, SchemaError> {
    match (candidates, policy) {
        ([], _) => Err(SchemaError::MissingRole {
            role,
            table: table.to_string(),
        }),
        ([only], _) => Ok(only.name.clone()),
        ([first, ..], AmbiguityPolicy::FirstMatch) => Ok(first.name.clone()),
        (_, AmbiguityPolicy::Strict) => Err(SchemaError::AmbiguousRole {
            role,
            candidates: candidates.iter().map(|c| c.name.clone()).collect(),
        }),
    }
}

// =============================================================================
// TESTS
// =============================================================================
