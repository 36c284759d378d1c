//! Financial periods: the unified record model and its validation rules.

pub mod model;
pub mod validate;

pub use model::{
    Breakdown, DataSource, DateRange, FinancialPeriod, LoadReport, PeriodRecord,
    SummaryStatistics,
};
