use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::core::primitives::datetime_to_unix_seconds;
use crate::error::{ChartError, ChartResult};

/// Dense zero-based ordinal of a point on the shared timeline.
pub type TimePointIndex = i64;

/// Unix timestamp in seconds, UTC.
pub type UtcTimestamp = i64;

/// Comparable key of an [`InternalHorzScaleItem`].
pub type HorzScaleItemKey = OrderedFloat<f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BusinessDay {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl BusinessDay {
    #[must_use]
    pub const fn new(year: i32, month: u32, day: u32) -> Self {
        Self { year, month, day }
    }

    /// Parses the `YYYY-MM-DD` form accepted for date strings.
    pub fn parse(value: &str) -> ChartResult<Self> {
        let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|err| {
            ChartError::InvalidData(format!("invalid date string `{value}`: {err}"))
        })?;
        Ok(Self::new(date.year(), date.month(), date.day()))
    }

    /// Returns the UTC midnight timestamp of this day.
    pub fn to_timestamp(self) -> ChartResult<UtcTimestamp> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|datetime| datetime.and_utc().timestamp())
            .ok_or_else(|| {
                ChartError::InvalidData(format!(
                    "invalid business day {}-{:02}-{:02}",
                    self.year, self.month, self.day
                ))
            })
    }
}

/// Which representation a series uses for its time values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeKind {
    Timestamp,
    BusinessDay,
    Custom,
}

/// Time value as supplied by the caller.
///
/// Date strings are treated as business days, so a series may freely mix
/// `BusinessDay` and `DateString` values but never those with timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Time {
    Timestamp(UtcTimestamp),
    Custom(f64),
    BusinessDay(BusinessDay),
    DateString(String),
}

impl Time {
    #[must_use]
    pub fn kind(&self) -> TimeKind {
        match self {
            Self::Timestamp(_) => TimeKind::Timestamp,
            Self::BusinessDay(_) | Self::DateString(_) => TimeKind::BusinessDay,
            Self::Custom(_) => TimeKind::Custom,
        }
    }

    #[must_use]
    pub fn from_datetime(time: DateTime<Utc>) -> Self {
        Self::Timestamp(datetime_to_unix_seconds(time).floor() as UtcTimestamp)
    }
}

impl From<UtcTimestamp> for Time {
    fn from(value: UtcTimestamp) -> Self {
        Self::Timestamp(value)
    }
}

impl From<BusinessDay> for Time {
    fn from(value: BusinessDay) -> Self {
        Self::BusinessDay(value)
    }
}

impl From<&str> for Time {
    fn from(value: &str) -> Self {
        Self::DateString(value.to_owned())
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timestamp(ts) => write!(f, "{ts}"),
            Self::Custom(value) => write!(f, "{value}"),
            Self::BusinessDay(day) => write!(f, "{}-{:02}-{:02}", day.year, day.month, day.day),
            Self::DateString(value) => f.write_str(value),
        }
    }
}

/// Canonical horizontal-scale item produced by a [`HorzScaleBehavior`].
///
/// [`HorzScaleBehavior`]: crate::core::HorzScaleBehavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InternalHorzScaleItem(OrderedFloat<f64>);

impl InternalHorzScaleItem {
    pub fn new(value: f64) -> ChartResult<Self> {
        if !value.is_finite() {
            return Err(ChartError::InvalidData(
                "horizontal scale item must be finite".to_owned(),
            ));
        }
        Ok(Self(OrderedFloat(value)))
    }

    #[must_use]
    pub fn value(self) -> f64 {
        self.0.into_inner()
    }

    #[must_use]
    pub fn key(self) -> HorzScaleItemKey {
        self.0
    }
}

/// Tick-mark coarseness class of a timeline point.
///
/// Larger weights win when labels compete for space.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct TickMarkWeight(pub u8);

impl TickMarkWeight {
    pub const LESS_THAN_SECOND: Self = Self(0);
    pub const SECOND: Self = Self(10);
    pub const MINUTE1: Self = Self(20);
    pub const MINUTE5: Self = Self(21);
    pub const MINUTE30: Self = Self(22);
    pub const HOUR1: Self = Self(30);
    pub const HOUR3: Self = Self(31);
    pub const HOUR6: Self = Self(32);
    pub const HOUR12: Self = Self(33);
    pub const DAY: Self = Self(50);
    pub const MONTH: Self = Self(60);
    pub const YEAR: Self = Self(70);
}

/// One distinct point of the shared timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeScalePoint {
    pub time: InternalHorzScaleItem,
    pub original_time: Time,
    pub time_weight: TickMarkWeight,
}

impl TimeScalePoint {
    #[must_use]
    pub fn new(time: InternalHorzScaleItem, original_time: Time) -> Self {
        Self {
            time,
            original_time,
            time_weight: TickMarkWeight::default(),
        }
    }
}
