//! Data module - CSV loading, filtering and reshaping

mod filter;
mod loader;
mod processor;

pub use filter::{
    drop_missing, map_school_types, municipality_scores, project, restrict_to_municipality,
    scores_as_float, SchemaError, SchoolTypeMapping,
};
pub use loader::{load_table, CsvSource, ReadError, TextEncoding};
pub use processor::{
    area_display_name, summaries_to_long, summary_table, table_to_long, LongRecord,
};

/// Municipality where the exam was taken.
pub const MUNICIPALITY_COLUMN: &str = "NO_MUNICIPIO_PROVA";
/// School-type code (1 no response, 2 public, 3 private).
pub const SCHOOL_TYPE_COLUMN: &str = "TP_ESCOLA";

/// Score columns, one per knowledge area.
pub const SCORE_COLUMNS: [&str; 5] = [
    "NU_NOTA_CN",
    "NU_NOTA_CH",
    "NU_NOTA_LC",
    "NU_NOTA_MT",
    "NU_NOTA_REDACAO",
];

/// Columns kept by the analysis filters.
pub const SELECTED_COLUMNS: [&str; 7] = [
    MUNICIPALITY_COLUMN,
    SCHOOL_TYPE_COLUMN,
    "NU_NOTA_CN",
    "NU_NOTA_CH",
    "NU_NOTA_LC",
    "NU_NOTA_MT",
    "NU_NOTA_REDACAO",
];
