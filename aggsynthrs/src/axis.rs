//! Calendar axis descriptor for time-bucketed aggregates.

use std::fmt;

use chrono::{Datelike, Months, NaiveDate, NaiveDateTime};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{AggsynthError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisIncrement {
    Day = 1,
    Month = 2,
    Year = 3,
    Quarter = 4,
}

impl AxisIncrement {
    pub fn code(self) -> i64 {
        self as i64
    }

    /// Number of calendar months per step, `None` for `Day`.
    pub fn months(self) -> Option<u32> {
        match self {
            AxisIncrement::Day => None,
            AxisIncrement::Month => Some(1),
            AxisIncrement::Quarter => Some(3),
            AxisIncrement::Year => Some(12),
        }
    }

    /// Label of the bucket containing `date`, formatted the way the generated
    /// date-part expressions format it.
    pub fn bucket_label(self, date: NaiveDate) -> String {
        match self {
            AxisIncrement::Day => date.format("%Y-%m-%d").to_string(),
            AxisIncrement::Month => date.format("%Y-%m").to_string(),
            AxisIncrement::Year => date.format("%Y").to_string(),
            AxisIncrement::Quarter => format!("{}Q{}", date.year(), date.month0() / 3 + 1),
        }
    }
}

impl TryFrom<i64> for AxisIncrement {
    type Error = AggsynthError;

    fn try_from(code: i64) -> Result<Self> {
        match code {
            1 => Ok(AxisIncrement::Day),
            2 => Ok(AxisIncrement::Month),
            3 => Ok(AxisIncrement::Year),
            4 => Ok(AxisIncrement::Quarter),
            other => Err(AggsynthError::AxisIncrementOutOfRange(other)),
        }
    }
}

impl fmt::Display for AxisIncrement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AxisIncrement::Day => "day",
            AxisIncrement::Month => "month",
            AxisIncrement::Year => "year",
            AxisIncrement::Quarter => "quarter",
        };
        f.write_str(name)
    }
}

impl<'de> Deserialize<'de> for AxisIncrement {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => {
                let code = n
                    .as_i64()
                    .ok_or_else(|| de::Error::custom(format!("invalid axis increment {n}")))?;
                AxisIncrement::try_from(code).map_err(de::Error::custom)
            }
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "day" => Ok(AxisIncrement::Day),
                "month" => Ok(AxisIncrement::Month),
                "year" => Ok(AxisIncrement::Year),
                "quarter" => Ok(AxisIncrement::Quarter),
                other => Err(de::Error::custom(format!("unknown axis increment {other}"))),
            },
            other => Err(de::Error::custom(format!(
                "axis increment must be a name or a number, got {other}"
            ))),
        }
    }
}

/// Calendar bounds and step for an axis aggregate.
///
/// `start_date` and `end_date` are SQL: either quoted literals such as
/// `'2001-01-01'` or expressions the target engine evaluates to a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryAxis {
    pub start_date: String,
    pub end_date: String,
    pub increment: AxisIncrement,
}

impl QueryAxis {
    pub fn new(
        start_date: impl Into<String>,
        end_date: impl Into<String>,
        increment: AxisIncrement,
    ) -> Self {
        Self {
            start_date: start_date.into(),
            end_date: end_date.into(),
            increment,
        }
    }

    /// Best-effort parse of a quoted date literal. Returns `None` for anything
    /// that looks like an engine expression (`GETDATE()`, `CURRENT_DATE`, ...).
    pub fn parse_literal(sql: &str) -> Option<NaiveDate> {
        let trimmed = sql.trim();
        let unquoted = trimmed
            .strip_prefix('\'')
            .and_then(|s| s.strip_suffix('\''))
            .or_else(|| trimmed.strip_prefix('"').and_then(|s| s.strip_suffix('"')))?
            .trim();

        NaiveDate::parse_from_str(unquoted, "%Y-%m-%d")
            .ok()
            .or_else(|| {
                ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"]
                    .iter()
                    .find_map(|fmt| NaiveDateTime::parse_from_str(unquoted, fmt).ok())
                    .map(|dt| dt.date())
            })
            .or_else(|| NaiveDate::parse_from_str(unquoted, "%Y%m%d").ok())
    }

    /// Both bounds as dates, when both are literals.
    pub fn literal_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((
            Self::parse_literal(&self.start_date)?,
            Self::parse_literal(&self.end_date)?,
        ))
    }

    /// Every bucket label the generated calendar covers, start to end inclusive.
    pub fn buckets(&self) -> Result<Vec<String>> {
        let (start, end) = self.literal_bounds().ok_or_else(|| {
            AggsynthError::Validation(format!(
                "axis bounds {} and {} are not date literals",
                self.start_date, self.end_date
            ))
        })?;

        let mut labels = Vec::new();
        let mut step: u32 = 0;
        loop {
            let current = match self.increment.months() {
                None => start.checked_add_days(chrono::Days::new(u64::from(step))),
                Some(months) => start.checked_add_months(Months::new(months * step)),
            };
            let Some(current) = current else { break };
            if current > end {
                break;
            }
            let label = self.increment.bucket_label(current);
            if labels.last() != Some(&label) {
                labels.push(label);
            }
            step += 1;
        }
        Ok(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_axis_covers_every_year_inclusive() {
        let axis = QueryAxis::new("'2001-01-01'", "'2010-01-01'", AxisIncrement::Year);
        let buckets = axis.buckets().unwrap();
        assert_eq!(buckets.len(), 10);
        assert_eq!(buckets.first().map(String::as_str), Some("2001"));
        assert_eq!(buckets.last().map(String::as_str), Some("2010"));
    }

    #[test]
    fn quarter_and_month_labels() {
        let axis = QueryAxis::new("'2015-01-01'", "'2015-12-31'", AxisIncrement::Quarter);
        assert_eq!(axis.buckets().unwrap(), vec!["2015Q1", "2015Q2", "2015Q3", "2015Q4"]);

        let axis = QueryAxis::new("'2015-01-31'", "'2015-03-31'", AxisIncrement::Month);
        assert_eq!(axis.buckets().unwrap(), vec!["2015-01", "2015-02", "2015-03"]);
    }

    #[test]
    fn day_axis_includes_both_ends() {
        let axis = QueryAxis::new("'2020-02-27 00:00:00'", "'2020-03-01'", AxisIncrement::Day);
        assert_eq!(
            axis.buckets().unwrap(),
            vec!["2020-02-27", "2020-02-28", "2020-02-29", "2020-03-01"]
        );
    }

    #[test]
    fn expression_bounds_are_not_literals() {
        assert!(QueryAxis::parse_literal("GETDATE()").is_none());
        assert!(QueryAxis::parse_literal("'2001-01-01'").is_some());
        let axis = QueryAxis::new("'2001-01-01'", "CURRENT_TIMESTAMP", AxisIncrement::Year);
        assert!(matches!(axis.buckets(), Err(AggsynthError::Validation(_))));
    }

    #[test]
    fn increment_codes() {
        assert_eq!(AxisIncrement::try_from(4).unwrap(), AxisIncrement::Quarter);
        assert_eq!(AxisIncrement::Month.code(), 2);
        assert!(matches!(
            AxisIncrement::try_from(7),
            Err(AggsynthError::AxisIncrementOutOfRange(7))
        ));
    }

    #[test]
    fn increment_deserializes_from_name_or_code() {
        let by_name: AxisIncrement = serde_json::from_str("\"Quarter\"").unwrap();
        let by_code: AxisIncrement = serde_json::from_str("3").unwrap();
        assert_eq!(by_name, AxisIncrement::Quarter);
        assert_eq!(by_code, AxisIncrement::Year);
        assert!(serde_json::from_str::<AxisIncrement>("9").is_err());
    }
}
