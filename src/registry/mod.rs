//! Schema Registry
//!
//! The declarative description of how relational tables fold into the
//! denormalized document shape: which table projects to the document root,
//! which project to nested collections, and which "special" tables live in
//! their own top-level indices keyed by a correlation value.
//!
//! The registry is pure data, validated once at startup and read-only
//! afterwards. It is passed explicitly into fetchers and the engine; there
//! is no process-wide mutable configuration.

mod workorder;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no root mapping (empty document path) is defined")]
    NoRootMapping,

    #[error("multiple root mappings defined: {0} and {1}")]
    MultipleRootMappings(String, String),

    #[error("duplicate document path '{0}'")]
    DuplicateDocumentPath(String),

    #[error("duplicate document collection key '{0}'")]
    DuplicateCollectionKey(String),

    #[error("duplicate source table '{0}'")]
    DuplicateSourceTable(String),
}

/// One (source column, document field) comparison pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPair {
    pub source: String,
    pub document: String,
}

impl FieldPair {
    pub fn new(source: impl Into<String>, document: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            document: document.into(),
        }
    }
}

/// Mapping of one relational table into the document shape
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableMapping {
    /// Relational table name
    pub source_table: String,
    /// Dotted path locating this table's rows inside the document;
    /// empty string means the document root
    pub document_path: String,
    /// Column whose string form correlates a row with its document-side
    /// counterpart. Not necessarily the primary key: a one-row-per-order
    /// child table is correlated by its parent's `WorkOrderId`, while
    /// tables with several rows per order must use their own `Id`.
    pub identity_field: String,
    /// Column the source fetcher filters on when loading this table's rows
    /// (`Id` for the root table, the parent link column for child tables)
    pub fetch_key: String,
    /// Every field to be compared, in report order
    pub field_pairs: Vec<FieldPair>,
}

impl TableMapping {
    pub fn is_root(&self) -> bool {
        self.document_path.is_empty()
    }
}

/// A table reconciled outside the path/field-pair mechanism: its document
/// representation is a separate top-level index, located by a correlation
/// value rather than the entity's own ID, and every field present on a
/// source row is compared directly against the same-named document field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialCollection {
    /// Relational table name
    pub source_table: String,
    /// Search index holding the document-side rows
    pub document_index: String,
    /// Column on the special table (and field in its index) matched
    /// against the correlation value
    pub correlation_field: String,
    /// Root-entity field supplying the correlation value; `None` means the
    /// entity ID itself
    pub root_source_field: Option<String>,
    /// Key under which the fetched collection is attached to the document
    /// record
    pub document_collection_key: String,
    /// Column correlating a row with its document-side counterpart
    pub identity_field: String,
    /// Filter out soft-deleted rows when fetching the source side
    pub exclude_deleted: bool,
}

/// Validated, read-only set of table mappings and special collections
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    mappings: Vec<TableMapping>,
    specials: Vec<SpecialCollection>,
    root_index: usize,
}

impl SchemaRegistry {
    /// Build a registry, failing fast on structural problems: zero or
    /// multiple root mappings, or duplicated paths / collection keys.
    pub fn new(
        mappings: Vec<TableMapping>,
        specials: Vec<SpecialCollection>,
    ) -> Result<Self, RegistryError> {
        let mut root_index = None;
        let mut paths = HashSet::new();
        let mut tables = HashSet::new();

        for (idx, mapping) in mappings.iter().enumerate() {
            if !tables.insert(mapping.source_table.clone()) {
                return Err(RegistryError::DuplicateSourceTable(
                    mapping.source_table.clone(),
                ));
            }
            if mapping.is_root() {
                match root_index {
                    None => root_index = Some(idx),
                    Some(first) => {
                        return Err(RegistryError::MultipleRootMappings(
                            mappings[first].source_table.clone(),
                            mapping.source_table.clone(),
                        ));
                    }
                }
            } else if !paths.insert(mapping.document_path.clone()) {
                return Err(RegistryError::DuplicateDocumentPath(
                    mapping.document_path.clone(),
                ));
            }
        }

        let root_index = root_index.ok_or(RegistryError::NoRootMapping)?;

        let mut collection_keys = HashSet::new();
        for special in &specials {
            if !tables.insert(special.source_table.clone()) {
                return Err(RegistryError::DuplicateSourceTable(
                    special.source_table.clone(),
                ));
            }
            if !collection_keys.insert(special.document_collection_key.clone()) {
                return Err(RegistryError::DuplicateCollectionKey(
                    special.document_collection_key.clone(),
                ));
            }
        }

        Ok(Self {
            mappings,
            specials,
            root_index,
        })
    }

    /// The built-in work-order mapping set
    pub fn work_order() -> Self {
        workorder::build()
    }

    /// The root (main entity) mapping
    pub fn root(&self) -> &TableMapping {
        &self.mappings[self.root_index]
    }

    /// Nested-collection mappings in declaration order. Special tables
    /// never appear here; they are reconciled through [`Self::specials`].
    pub fn nested(&self) -> impl Iterator<Item = &TableMapping> {
        self.mappings.iter().filter(|m| !m.is_root())
    }

    /// Special collections in declaration order
    pub fn specials(&self) -> &[SpecialCollection] {
        &self.specials
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn mapping(table: &str, path: &str) -> TableMapping {
        TableMapping {
            source_table: table.to_string(),
            document_path: path.to_string(),
            identity_field: "Id".to_string(),
            fetch_key: "WorkOrderId".to_string(),
            field_pairs: vec![FieldPair::new("Id", "Id")],
        }
    }

    #[test]
    fn test_valid_registry() {
        let registry = SchemaRegistry::new(
            vec![mapping("main", ""), mapping("child", "Child")],
            vec![],
        )
        .unwrap();
        assert_eq!(registry.root().source_table, "main");
        assert_eq!(registry.nested().count(), 1);
    }

    #[test]
    fn test_missing_root_rejected() {
        let err = SchemaRegistry::new(vec![mapping("child", "Child")], vec![]).unwrap_err();
        assert_eq!(err, RegistryError::NoRootMapping);
    }

    #[test]
    fn test_multiple_roots_rejected() {
        let err =
            SchemaRegistry::new(vec![mapping("a", ""), mapping("b", "")], vec![]).unwrap_err();
        assert_eq!(
            err,
            RegistryError::MultipleRootMappings("a".to_string(), "b".to_string())
        );
    }

    #[test]
    fn test_duplicate_path_rejected() {
        let err = SchemaRegistry::new(
            vec![mapping("main", ""), mapping("a", "Info"), mapping("b", "Info")],
            vec![],
        )
        .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateDocumentPath("Info".to_string()));
    }

    #[test]
    fn test_duplicate_collection_key_rejected() {
        let special = |table: &str| SpecialCollection {
            source_table: table.to_string(),
            document_index: "aux".to_string(),
            correlation_field: "WorkOrderId".to_string(),
            root_source_field: None,
            document_collection_key: "aux_data".to_string(),
            identity_field: "Id".to_string(),
            exclude_deleted: false,
        };
        let err = SchemaRegistry::new(vec![mapping("main", "")], vec![special("x"), special("y")])
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateCollectionKey("aux_data".to_string())
        );
    }

    #[test]
    fn test_builtin_work_order_registry_is_valid() {
        let registry = SchemaRegistry::work_order();
        assert_eq!(registry.root().source_table, "tb_workorderinfo");
        assert_eq!(registry.nested().count(), 9);
        assert_eq!(registry.specials().len(), 2);
    }
}
