//! Stats module - group-by aggregation and descriptive statistics

mod calculator;

pub use calculator::{
    area_distributions, count_by_label, describe, normalize_rows_by_group_count, summarize,
    AreaDistribution, GroupSummary, MeanMode, StudentCount, COUNT_COLUMN,
};
