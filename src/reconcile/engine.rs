//! Reconciliation Engine
//!
//! Walks the schema registry over one entity's two record graphs and
//! produces an ordered list of typed discrepancies: root fields first,
//! then nested collections in registry declaration order, then special
//! collections. Within a table the count check comes first, then missing
//! rows (source side, then document side), then field-level differences,
//! rows ascending by identity string. The output is a pure function of the
//! inputs; data-shape anomalies become discrepancies, never errors.

use crate::reconcile::compare::fields_equal;
use crate::reconcile::value::{doc_get, doc_lookup_path, doc_render, Record, SourceValue};
use crate::registry::{FieldPair, SchemaRegistry};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Full relational record graph for one entity, constructed once per check
#[derive(Debug, Clone, Default)]
pub struct SourceRecordGraph {
    /// Main-table row
    pub root: Record,
    /// Nested-table rows keyed by source table name
    pub nested: HashMap<String, Vec<Record>>,
    /// Special-table rows keyed by source table name
    pub special: HashMap<String, Vec<Record>>,
}

/// One detected unit of divergence between the two stores
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Discrepancy {
    CountMismatch {
        table: String,
        source_count: usize,
        document_count: usize,
    },
    MissingInDocument {
        table: String,
        id: String,
    },
    MissingInSource {
        table: String,
        id: String,
    },
    FieldMismatch {
        table: String,
        /// Absent for root-level mismatches
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        field: String,
        source_value: String,
        document_value: String,
    },
}

/// Which side could not be fetched when a comparison was impossible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingSide {
    Source,
    Document,
    Both,
}

/// Outcome of one entity check. Callers can distinguish "compared and
/// found equal", "compared and found differences", and "could not compare".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckOutcome {
    Consistent,
    Inconsistent { discrepancies: Vec<Discrepancy> },
    Incomparable { missing: MissingSide },
}

impl CheckOutcome {
    pub fn is_consistent(&self) -> bool {
        matches!(self, CheckOutcome::Consistent)
    }

    pub fn discrepancies(&self) -> &[Discrepancy] {
        match self {
            CheckOutcome::Inconsistent { discrepancies } => discrepancies,
            _ => &[],
        }
    }
}

/// Which fields of a row pair get compared
enum FieldSelection<'a> {
    /// The statically declared (source, document) pairs of a table mapping
    Declared(&'a [FieldPair]),
    /// Every field present on the source row against the same-named
    /// document field (special collections)
    Passthrough,
}

/// The comparison engine. Holds only the registry; every invocation is
/// side-effect-free, so one engine is safely shared across concurrent
/// checks of different entities.
pub struct ReconcileEngine {
    registry: Arc<SchemaRegistry>,
}

impl ReconcileEngine {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self { registry }
    }

    /// Compare one entity's source graph against its document record.
    /// An entirely absent side yields `Incomparable` instead of an error.
    pub fn reconcile(
        &self,
        source: Option<&SourceRecordGraph>,
        document: Option<&Value>,
    ) -> CheckOutcome {
        let (source, document) = match (source, document) {
            (Some(s), Some(d)) => (s, d),
            (None, Some(_)) => return CheckOutcome::Incomparable { missing: MissingSide::Source },
            (Some(_), None) => {
                return CheckOutcome::Incomparable { missing: MissingSide::Document }
            }
            (None, None) => return CheckOutcome::Incomparable { missing: MissingSide::Both },
        };

        let mut discrepancies = Vec::new();

        self.compare_root(source, document, &mut discrepancies);

        for mapping in self.registry.nested() {
            let source_rows = source
                .nested
                .get(&mapping.source_table)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            let document_rows = doc_lookup_path(document, &mapping.document_path)
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            Self::compare_collection(
                &mapping.source_table,
                &mapping.identity_field,
                FieldSelection::Declared(&mapping.field_pairs),
                source_rows,
                document_rows,
                &mut discrepancies,
            );
        }

        for special in self.registry.specials() {
            let source_rows = source
                .special
                .get(&special.source_table)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            let document_rows = doc_get(document, &special.document_collection_key)
                .as_array()
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            Self::compare_collection(
                &special.source_table,
                &special.identity_field,
                FieldSelection::Passthrough,
                source_rows,
                document_rows,
                &mut discrepancies,
            );
        }

        if discrepancies.is_empty() {
            CheckOutcome::Consistent
        } else {
            CheckOutcome::Inconsistent { discrepancies }
        }
    }

    fn compare_root(
        &self,
        source: &SourceRecordGraph,
        document: &Value,
        discrepancies: &mut Vec<Discrepancy>,
    ) {
        let root = self.registry.root();
        for pair in &root.field_pairs {
            let source_value = source.root.get(&pair.source).unwrap_or(&SourceValue::Null);
            let document_value = doc_get(document, &pair.document);
            if !fields_equal(source_value, document_value, &pair.source) {
                discrepancies.push(Discrepancy::FieldMismatch {
                    table: root.source_table.clone(),
                    id: None,
                    field: pair.source.clone(),
                    source_value: source_value.render(),
                    document_value: doc_render(document_value),
                });
            }
        }
    }

    fn compare_collection(
        table: &str,
        identity_field: &str,
        fields: FieldSelection<'_>,
        source_rows: &[Record],
        document_rows: &[Value],
        discrepancies: &mut Vec<Discrepancy>,
    ) {
        if source_rows.len() != document_rows.len() {
            discrepancies.push(Discrepancy::CountMismatch {
                table: table.to_string(),
                source_count: source_rows.len(),
                document_count: document_rows.len(),
            });
        }

        // Identity-keyed maps; BTreeMap gives ascending identity order
        let source_by_id: BTreeMap<String, &Record> = source_rows
            .iter()
            .map(|row| {
                let id = row
                    .get(identity_field)
                    .unwrap_or(&SourceValue::Null)
                    .render();
                (id, row)
            })
            .collect();
        let document_by_id: BTreeMap<String, &Value> = document_rows
            .iter()
            .map(|row| (doc_render(doc_get(row, identity_field)), row))
            .collect();

        for id in source_by_id.keys() {
            if !document_by_id.contains_key(id) {
                discrepancies.push(Discrepancy::MissingInDocument {
                    table: table.to_string(),
                    id: id.clone(),
                });
            }
        }
        for id in document_by_id.keys() {
            if !source_by_id.contains_key(id) {
                discrepancies.push(Discrepancy::MissingInSource {
                    table: table.to_string(),
                    id: id.clone(),
                });
            }
        }

        for (id, source_row) in &source_by_id {
            let Some(document_row) = document_by_id.get(id) else {
                continue;
            };
            match &fields {
                FieldSelection::Declared(pairs) => {
                    for pair in pairs.iter() {
                        let source_value =
                            source_row.get(&pair.source).unwrap_or(&SourceValue::Null);
                        let document_value = doc_get(document_row, &pair.document);
                        if !fields_equal(source_value, document_value, &pair.source) {
                            discrepancies.push(Discrepancy::FieldMismatch {
                                table: table.to_string(),
                                id: Some(id.clone()),
                                field: pair.source.clone(),
                                source_value: source_value.render(),
                                document_value: doc_render(document_value),
                            });
                        }
                    }
                }
                FieldSelection::Passthrough => {
                    for (field, source_value) in source_row.iter() {
                        let document_value = doc_get(document_row, field);
                        if !fields_equal(source_value, document_value, field) {
                            discrepancies.push(Discrepancy::FieldMismatch {
                                table: table.to_string(),
                                id: Some(id.clone()),
                                field: field.clone(),
                                source_value: source_value.render(),
                                document_value: doc_render(document_value),
                            });
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{FieldPair, SpecialCollection, TableMapping};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn test_registry() -> Arc<SchemaRegistry> {
        let mappings = vec![
            TableMapping {
                source_table: "tb_workorderinfo".to_string(),
                document_path: String::new(),
                identity_field: "Id".to_string(),
                fetch_key: "Id".to_string(),
                field_pairs: vec![
                    FieldPair::new("Id", "Id"),
                    FieldPair::new("WorkStatus", "WorkStatus"),
                    FieldPair::new("CustomerId", "CustomerId"),
                ],
            },
            TableMapping {
                source_table: "tb_workcarinfo".to_string(),
                document_path: "CarInfo".to_string(),
                identity_field: "Id".to_string(),
                fetch_key: "WorkOrderId".to_string(),
                field_pairs: vec![
                    FieldPair::new("Id", "Id"),
                    FieldPair::new("PlateNumber", "PlateNumber"),
                ],
            },
        ];
        let specials = vec![SpecialCollection {
            source_table: "tb_operatinginfo".to_string(),
            document_index: "operating".to_string(),
            correlation_field: "WorkOrderId".to_string(),
            root_source_field: None,
            document_collection_key: "operating_data".to_string(),
            identity_field: "Id".to_string(),
            exclude_deleted: false,
        }];
        Arc::new(SchemaRegistry::new(mappings, specials).unwrap())
    }

    fn engine() -> ReconcileEngine {
        ReconcileEngine::new(test_registry())
    }

    fn root_record(status: &str) -> Record {
        Record::from([
            ("Id".to_string(), SourceValue::Int(7)),
            ("WorkStatus".to_string(), SourceValue::Text(status.to_string())),
            ("CustomerId".to_string(), SourceValue::Int(99)),
        ])
    }

    fn car_row(id: i64, plate: &str) -> Record {
        Record::from([
            ("Id".to_string(), SourceValue::Int(id)),
            ("PlateNumber".to_string(), SourceValue::Text(plate.to_string())),
        ])
    }

    fn matching_document(status: &str) -> Value {
        json!({
            "Id": 7,
            "WorkStatus": status,
            "CustomerId": 99,
            "CarInfo": [],
        })
    }

    #[test]
    fn test_consistent_when_everything_matches() {
        let graph = SourceRecordGraph {
            root: root_record("Closed"),
            ..Default::default()
        };
        let doc = matching_document("Closed");
        let outcome = engine().reconcile(Some(&graph), Some(&doc));
        assert_eq!(outcome, CheckOutcome::Consistent);
    }

    #[test]
    fn test_root_field_mismatch() {
        let graph = SourceRecordGraph {
            root: root_record("Closed"),
            ..Default::default()
        };
        let doc = matching_document("Completed");
        let outcome = engine().reconcile(Some(&graph), Some(&doc));
        assert_eq!(
            outcome.discrepancies(),
            &[Discrepancy::FieldMismatch {
                table: "tb_workorderinfo".to_string(),
                id: None,
                field: "WorkStatus".to_string(),
                source_value: "Closed".to_string(),
                document_value: "Completed".to_string(),
            }]
        );
    }

    #[test]
    fn test_row_missing_in_document() {
        let graph = SourceRecordGraph {
            root: root_record("Closed"),
            nested: HashMap::from([(
                "tb_workcarinfo".to_string(),
                vec![car_row(42, "WX-1001")],
            )]),
            ..Default::default()
        };
        let doc = matching_document("Closed");
        let outcome = engine().reconcile(Some(&graph), Some(&doc));
        assert_eq!(
            outcome.discrepancies(),
            &[
                Discrepancy::CountMismatch {
                    table: "tb_workcarinfo".to_string(),
                    source_count: 1,
                    document_count: 0,
                },
                Discrepancy::MissingInDocument {
                    table: "tb_workcarinfo".to_string(),
                    id: "42".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_detection_symmetry() {
        // A row present only on the document side is the mirror image
        let graph = SourceRecordGraph {
            root: root_record("Closed"),
            ..Default::default()
        };
        let mut doc = matching_document("Closed");
        doc["CarInfo"] = json!([{"Id": 42, "PlateNumber": "WX-1001"}]);
        let outcome = engine().reconcile(Some(&graph), Some(&doc));
        assert_eq!(
            outcome.discrepancies(),
            &[
                Discrepancy::CountMismatch {
                    table: "tb_workcarinfo".to_string(),
                    source_count: 0,
                    document_count: 1,
                },
                Discrepancy::MissingInSource {
                    table: "tb_workcarinfo".to_string(),
                    id: "42".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_count_mismatch_precedes_field_mismatch() {
        // Two source rows, one document row sharing an identity with a
        // differing field: one CountMismatch, then the missing row, then
        // the field difference for the shared identity
        let graph = SourceRecordGraph {
            root: root_record("Closed"),
            nested: HashMap::from([(
                "tb_workcarinfo".to_string(),
                vec![car_row(1, "WX-1001"), car_row(2, "WX-2002")],
            )]),
            ..Default::default()
        };
        let mut doc = matching_document("Closed");
        doc["CarInfo"] = json!([{"Id": 1, "PlateNumber": "WX-9999"}]);
        let outcome = engine().reconcile(Some(&graph), Some(&doc));
        assert_eq!(
            outcome.discrepancies(),
            &[
                Discrepancy::CountMismatch {
                    table: "tb_workcarinfo".to_string(),
                    source_count: 2,
                    document_count: 1,
                },
                Discrepancy::MissingInDocument {
                    table: "tb_workcarinfo".to_string(),
                    id: "2".to_string(),
                },
                Discrepancy::FieldMismatch {
                    table: "tb_workcarinfo".to_string(),
                    id: Some("1".to_string()),
                    field: "PlateNumber".to_string(),
                    source_value: "WX-1001".to_string(),
                    document_value: "WX-9999".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_special_collection_passthrough() {
        // Every source-row field is compared, no declared pair list
        let graph = SourceRecordGraph {
            root: root_record("Closed"),
            special: HashMap::from([(
                "tb_operatinginfo".to_string(),
                vec![Record::from([
                    ("Id".to_string(), SourceValue::Int(5)),
                    ("OperName".to_string(), SourceValue::Text("alice".to_string())),
                    ("TagType".to_string(), SourceValue::Int(2)),
                ])],
            )]),
            ..Default::default()
        };
        let mut doc = matching_document("Closed");
        doc["operating_data"] = json!([{"Id": 5, "OperName": "bob", "TagType": 2}]);
        let outcome = engine().reconcile(Some(&graph), Some(&doc));
        assert_eq!(
            outcome.discrepancies(),
            &[Discrepancy::FieldMismatch {
                table: "tb_operatinginfo".to_string(),
                id: Some("5".to_string()),
                field: "OperName".to_string(),
                source_value: "alice".to_string(),
                document_value: "bob".to_string(),
            }]
        );
    }

    #[test]
    fn test_special_collection_consistent() {
        let graph = SourceRecordGraph {
            root: root_record("Closed"),
            special: HashMap::from([(
                "tb_operatinginfo".to_string(),
                vec![Record::from([
                    ("Id".to_string(), SourceValue::Int(5)),
                    ("OperName".to_string(), SourceValue::Text("alice".to_string())),
                ])],
            )]),
            ..Default::default()
        };
        let mut doc = matching_document("Closed");
        doc["operating_data"] = json!([{"Id": 5, "OperName": "alice"}]);
        let outcome = engine().reconcile(Some(&graph), Some(&doc));
        assert_eq!(outcome, CheckOutcome::Consistent);
    }

    #[test]
    fn test_incomparable_outcomes() {
        let graph = SourceRecordGraph {
            root: root_record("Closed"),
            ..Default::default()
        };
        let doc = matching_document("Closed");
        let e = engine();
        assert_eq!(
            e.reconcile(None, Some(&doc)),
            CheckOutcome::Incomparable { missing: MissingSide::Source }
        );
        assert_eq!(
            e.reconcile(Some(&graph), None),
            CheckOutcome::Incomparable { missing: MissingSide::Document }
        );
        assert_eq!(
            e.reconcile(None, None),
            CheckOutcome::Incomparable { missing: MissingSide::Both }
        );
    }

    #[test]
    fn test_idempotence() {
        let graph = SourceRecordGraph {
            root: root_record("Closed"),
            nested: HashMap::from([(
                "tb_workcarinfo".to_string(),
                vec![car_row(1, "WX-1001"), car_row(2, "WX-2002")],
            )]),
            ..Default::default()
        };
        let mut doc = matching_document("Completed");
        doc["CarInfo"] = json!([{"Id": 2, "PlateNumber": "WX-0000"}]);
        let e = engine();
        let first = e.reconcile(Some(&graph), Some(&doc));
        let second = e.reconcile(Some(&graph), Some(&doc));
        assert_eq!(first, second);
    }

    #[test]
    fn test_rows_processed_in_ascending_identity_order() {
        let graph = SourceRecordGraph {
            root: root_record("Closed"),
            nested: HashMap::from([(
                "tb_workcarinfo".to_string(),
                vec![car_row(9, "A"), car_row(10, "B"), car_row(2, "C")],
            )]),
            ..Default::default()
        };
        let mut doc = matching_document("Closed");
        doc["CarInfo"] = json!([]);
        let outcome = engine().reconcile(Some(&graph), Some(&doc));
        let ids: Vec<&str> = outcome
            .discrepancies()
            .iter()
            .filter_map(|d| match d {
                Discrepancy::MissingInDocument { id, .. } => Some(id.as_str()),
                _ => None,
            })
            .collect();
        // String ordering of identity keys: "10" < "2" < "9"
        assert_eq!(ids, vec!["10", "2", "9"]);
    }
}
