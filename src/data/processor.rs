//! Data Processor Module
//! Reshapes wide score tables into long (label, area, value) records.

use super::SchemaError;
use crate::stats::GroupSummary;
use polars::prelude::*;
use serde::Serialize;

/// Header of the label column in [`summary_table`].
const SCHOOL_TYPE_HEADER: &str = "School Type";

/// One (school type, knowledge area, value) triple.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LongRecord {
    pub label: String,
    pub area: String,
    pub value: f64,
}

/// Display name of a score column. Unknown names are returned unchanged.
pub fn area_display_name(column: &str) -> &str {
    match column {
        "NU_NOTA_CN" => "Natural Sciences",
        "NU_NOTA_CH" => "Human Sciences",
        "NU_NOTA_LC" => "Languages and Codes",
        "NU_NOTA_MT" => "Mathematics",
        "NU_NOTA_REDACAO" => "Essay",
        other => other,
    }
}

/// Unpivot group means into long format.
///
/// Records are ordered by score column, then by summary order within a column.
pub fn summaries_to_long(summaries: &[GroupSummary]) -> Vec<LongRecord> {
    let Some(first) = summaries.first() else {
        return Vec::new();
    };

    let mut records = Vec::with_capacity(summaries.len() * first.means.len());
    for (column, _) in &first.means {
        for summary in summaries {
            if let Some(value) = summary.mean(column) {
                records.push(LongRecord {
                    label: summary.label.clone(),
                    area: area_display_name(column).to_string(),
                    value,
                });
            }
        }
    }
    records
}

/// Unpivot per-row scores into long format (stack operation).
///
/// Records are ordered by score column, then by row. Rows with a null label
/// or a null score are skipped.
pub fn table_to_long(
    df: &DataFrame,
    label_col: &str,
    score_cols: &[&str],
) -> Result<Vec<LongRecord>, SchemaError> {
    let label_series = df
        .column(label_col)
        .map_err(|_| SchemaError::MissingColumn(label_col.to_string()))?
        .cast(&DataType::String)?;
    let labels = label_series.str()?;

    let mut records = Vec::with_capacity(df.height() * score_cols.len());
    for score_col in score_cols {
        let value_series = df
            .column(score_col)
            .map_err(|_| SchemaError::MissingColumn(score_col.to_string()))?;
        let value_f64 = value_series.cast(&DataType::Float64)?;
        let value_ca = value_f64.f64()?;
        let area = area_display_name(score_col);

        for (label, value) in labels.into_iter().zip(value_ca.into_iter()) {
            if let (Some(label), Some(value)) = (label, value) {
                if !value.is_nan() {
                    records.push(LongRecord {
                        label: label.to_string(),
                        area: area.to_string(),
                        value,
                    });
                }
            }
        }
    }

    Ok(records)
}

/// Wide table of group means with display headers, one row per school type.
pub fn summary_table(summaries: &[GroupSummary]) -> PolarsResult<DataFrame> {
    let labels: Vec<&str> = summaries.iter().map(|s| s.label.as_str()).collect();
    let mut columns = vec![Column::new(SCHOOL_TYPE_HEADER.into(), labels)];

    if let Some(first) = summaries.first() {
        for (column, _) in &first.means {
            let values: Vec<Option<f64>> = summaries.iter().map(|s| s.mean(column)).collect();
            let header = format!("Mean {}", area_display_name(column));
            columns.push(Column::new(header.into(), values));
        }
    }

    DataFrame::new(columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(label: &str, count: usize, cn: f64, mt: f64) -> GroupSummary {
        GroupSummary {
            label: label.to_string(),
            count,
            means: vec![
                ("NU_NOTA_CN".to_string(), cn),
                ("NU_NOTA_MT".to_string(), mt),
            ],
        }
    }

    #[test]
    fn test_area_display_names() {
        assert_eq!(area_display_name("NU_NOTA_LC"), "Languages and Codes");
        assert_eq!(area_display_name("NU_NOTA_REDACAO"), "Essay");
        assert_eq!(area_display_name("NU_NOTA_XX"), "NU_NOTA_XX");
    }

    #[test]
    fn test_summaries_to_long_orders_by_column_then_label() {
        let summaries = vec![
            summary("private", 1, 650.0, 700.0),
            summary("public", 2, 600.0, 600.0),
        ];
        let records = summaries_to_long(&summaries);

        let keys: Vec<(&str, &str)> = records
            .iter()
            .map(|r| (r.area.as_str(), r.label.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("Natural Sciences", "private"),
                ("Natural Sciences", "public"),
                ("Mathematics", "private"),
                ("Mathematics", "public"),
            ]
        );
        assert_eq!(records[3].value, 600.0);
    }

    #[test]
    fn test_summaries_to_long_empty() {
        assert!(summaries_to_long(&[]).is_empty());
    }

    #[test]
    fn test_table_to_long_skips_nulls() {
        let df = df!(
            "TP_ESCOLA" => [Some("public"), None, Some("private")],
            "NU_NOTA_CN" => [Some(500.0), Some(510.0), None],
            "NU_NOTA_MT" => [520.0, 530.0, 540.0]
        )
        .unwrap();
        let records = table_to_long(&df, "TP_ESCOLA", &["NU_NOTA_CN", "NU_NOTA_MT"]).unwrap();

        assert_eq!(
            records,
            vec![
                LongRecord {
                    label: "public".into(),
                    area: "Natural Sciences".into(),
                    value: 500.0
                },
                LongRecord {
                    label: "public".into(),
                    area: "Mathematics".into(),
                    value: 520.0
                },
                LongRecord {
                    label: "private".into(),
                    area: "Mathematics".into(),
                    value: 540.0
                },
            ]
        );
    }

    #[test]
    fn test_table_to_long_missing_column() {
        let df = df!("TP_ESCOLA" => ["public"]).unwrap();
        let err = table_to_long(&df, "TP_ESCOLA", &["NU_NOTA_CN"]).unwrap_err();
        assert!(matches!(err, SchemaError::MissingColumn(_)));
    }

    #[test]
    fn test_summary_table_headers() {
        let table = summary_table(&[summary("public", 2, 600.0, 600.0)]).unwrap();
        let headers: Vec<String> = table
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            headers,
            vec!["School Type", "Mean Natural Sciences", "Mean Mathematics"]
        );
        assert_eq!(table.height(), 1);
    }
}
