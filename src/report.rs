//! Report Formatter
//!
//! Renders a discrepancy list into the bounded, human-readable summary
//! delivered through the notifier. Shows at most the first ten
//! discrepancies in engine order, truncates long values, and appends the
//! remainder count plus a generation timestamp.

use crate::reconcile::Discrepancy;
use chrono::Local;

/// Discrepancies shown before the report is cut off
const MAX_SHOWN: usize = 10;
/// Longest rendered value before truncation
const MAX_VALUE_CHARS: usize = 50;

/// Render the report body for one entity
pub fn format_report(entity_id: i64, discrepancies: &[Discrepancy]) -> String {
    let mut message = format!("Work order ID: {}\n\n", entity_id);

    for discrepancy in discrepancies.iter().take(MAX_SHOWN) {
        match discrepancy {
            Discrepancy::CountMismatch {
                table,
                source_count,
                document_count,
            } => {
                message.push_str(&format!(
                    "Table **{}** row count differs: source {} vs document {}\n\n",
                    table, source_count, document_count
                ));
            }
            Discrepancy::MissingInDocument { table, id } => {
                message.push_str(&format!(
                    "Table **{}** row {} is missing from the document store\n\n",
                    table, id
                ));
            }
            Discrepancy::MissingInSource { table, id } => {
                message.push_str(&format!(
                    "Table **{}** row {} is missing from the source database\n\n",
                    table, id
                ));
            }
            Discrepancy::FieldMismatch {
                table,
                id,
                field,
                source_value,
                document_value,
            } => {
                let row = id
                    .as_ref()
                    .map(|id| format!(" row {}", id))
                    .unwrap_or_default();
                message.push_str(&format!(
                    "Table **{}**{} field **{}** differs:\nsource: {}\ndocument: {}\n\n",
                    table,
                    row,
                    field,
                    truncate_value(source_value),
                    truncate_value(document_value)
                ));
            }
        }
    }

    if discrepancies.len() > MAX_SHOWN {
        message.push_str(&format!(
            "{} more discrepancies not shown...\n",
            discrepancies.len() - MAX_SHOWN
        ));
    }

    message.push_str(&format!(
        "\nChecked at: {}",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    message
}

fn truncate_value(value: &str) -> String {
    if value.chars().count() > MAX_VALUE_CHARS {
        let truncated: String = value.chars().take(MAX_VALUE_CHARS).collect();
        format!("{}...", truncated)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn field_mismatch(field: &str, source: &str, document: &str) -> Discrepancy {
        Discrepancy::FieldMismatch {
            table: "tb_workorderinfo".to_string(),
            id: None,
            field: field.to_string(),
            source_value: source.to_string(),
            document_value: document.to_string(),
        }
    }

    #[test]
    fn test_report_contains_each_variant_template() {
        let discrepancies = vec![
            Discrepancy::CountMismatch {
                table: "tb_workcarinfo".to_string(),
                source_count: 2,
                document_count: 1,
            },
            Discrepancy::MissingInDocument {
                table: "tb_workcarinfo".to_string(),
                id: "42".to_string(),
            },
            Discrepancy::MissingInSource {
                table: "tb_workcarinfo".to_string(),
                id: "7".to_string(),
            },
            field_mismatch("WorkStatus", "Closed", "Completed"),
        ];
        let report = format_report(1001, &discrepancies);
        assert!(report.starts_with("Work order ID: 1001\n"));
        assert!(report.contains("row count differs: source 2 vs document 1"));
        assert!(report.contains("row 42 is missing from the document store"));
        assert!(report.contains("row 7 is missing from the source database"));
        assert!(report.contains("field **WorkStatus** differs:\nsource: Closed\ndocument: Completed"));
        assert!(report.contains("\nChecked at: "));
        assert!(!report.contains("more discrepancies not shown"));
    }

    #[test]
    fn test_report_caps_at_ten_with_remainder() {
        let discrepancies: Vec<Discrepancy> = (0..14)
            .map(|i| field_mismatch(&format!("Field{}", i), "a", "b"))
            .collect();
        let report = format_report(1, &discrepancies);
        assert!(report.contains("Field9"));
        assert!(!report.contains("Field10"));
        assert!(report.contains("4 more discrepancies not shown..."));
    }

    #[test]
    fn test_long_values_truncated() {
        let long = "x".repeat(80);
        let report = format_report(1, &[field_mismatch("Remark", &long, "short")]);
        let expected = format!("{}...", "x".repeat(50));
        assert!(report.contains(&expected));
        assert!(!report.contains(&"x".repeat(51)));
    }

    #[test]
    fn test_truncate_value_at_boundary() {
        assert_eq!(truncate_value(&"y".repeat(50)), "y".repeat(50));
    }

    #[test]
    fn test_nested_row_id_included() {
        let discrepancy = Discrepancy::FieldMismatch {
            table: "tb_workcarinfo".to_string(),
            id: Some("42".to_string()),
            field: "PlateNumber".to_string(),
            source_value: "WX-1001".to_string(),
            document_value: "WX-9999".to_string(),
        };
        let report = format_report(1, &[discrepancy]);
        assert!(report.contains("Table **tb_workcarinfo** row 42 field **PlateNumber**"));
    }
}
