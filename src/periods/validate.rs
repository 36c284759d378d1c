//! Validation for parsed records and caller-supplied date ranges.

use chrono::NaiveDate;

use super::model::PeriodRecord;
use crate::error::ValidationError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` string.
pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| ValidationError::InvalidDate {
        field: field.to_string(),
        value: value.to_string(),
    })
}

/// Check a parsed record before it is written.
///
/// The period must be non-empty and every amount finite.
pub fn validate_record(record: &PeriodRecord) -> Result<(), ValidationError> {
    if record.period_start >= record.period_end {
        return Err(ValidationError::InvertedRange {
            start_field: "period_start".into(),
            end_field: "period_end".into(),
        });
    }

    for (name, value) in record.amounts() {
        if !value.is_finite() {
            return Err(ValidationError::InvalidAmount(name.to_string()));
        }
    }

    let breakdowns = [
        ("revenue_breakdown", &record.revenue_breakdown),
        ("expense_breakdown", &record.expense_breakdown),
    ];
    for (field, breakdown) in breakdowns {
        let Some(breakdown) = breakdown else {
            continue;
        };
        if let Some((item, _)) = breakdown.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ValidationError::InvalidAmount(format!("{field}.{item}")));
        }
    }

    Ok(())
}

/// Parse and check a `start_date`/`end_date` pair.
pub fn validate_date_range(
    start_date: &str,
    end_date: &str,
) -> Result<(NaiveDate, NaiveDate), ValidationError> {
    let start = parse_date("start_date", start_date)?;
    let end = parse_date("end_date", end_date)?;

    if start >= end {
        return Err(ValidationError::InvertedRange {
            start_field: "start_date".into(),
            end_field: "end_date".into(),
        });
    }

    Ok((start, end))
}
