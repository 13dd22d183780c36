use std::fmt;

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::core::primitives::unix_seconds_to_datetime;
use crate::core::tick_marks::TickMark;
use crate::core::time::{
    HorzScaleItemKey, InternalHorzScaleItem, TickMarkWeight, Time, TimeKind, TimeScalePoint,
};
use crate::error::{ChartError, ChartResult};

/// Converts caller-facing time values into the canonical timeline key and
/// classifies timeline points for tick-mark selection.
pub trait HorzScaleBehavior: fmt::Debug + Send + Sync {
    fn convert_horz_item(&self, time: &Time) -> ChartResult<InternalHorzScaleItem>;

    fn key(&self, item: InternalHorzScaleItem) -> HorzScaleItemKey {
        item.key()
    }

    /// Representation class used for the per-series consistency check.
    fn time_kind(&self, time: &Time) -> TimeKind {
        time.kind()
    }

    /// Recomputes `time_weight` for `points[start_index..]`.
    fn fill_weights_for_points(&self, points: &mut [TimeScalePoint], start_index: usize);

    fn format_horz_item(&self, item: InternalHorzScaleItem) -> String;

    fn format_tick_mark(&self, mark: &TickMark) -> String;
}

const INTRADAY_WEIGHT_DIVISORS: [(i64, TickMarkWeight); 8] = [
    (1_000, TickMarkWeight::SECOND),
    (60_000, TickMarkWeight::MINUTE1),
    (5 * 60_000, TickMarkWeight::MINUTE5),
    (30 * 60_000, TickMarkWeight::MINUTE30),
    (3_600_000, TickMarkWeight::HOUR1),
    (3 * 3_600_000, TickMarkWeight::HOUR3),
    (6 * 3_600_000, TickMarkWeight::HOUR6),
    (12 * 3_600_000, TickMarkWeight::HOUR12),
];

/// Calendar-aware behavior for timestamp and business-day series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeHorzScaleBehavior {
    seconds_visible: bool,
}

impl Default for TimeHorzScaleBehavior {
    fn default() -> Self {
        Self {
            seconds_visible: true,
        }
    }
}

impl TimeHorzScaleBehavior {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_seconds_visible(mut self, seconds_visible: bool) -> Self {
        self.seconds_visible = seconds_visible;
        self
    }
}

impl HorzScaleBehavior for TimeHorzScaleBehavior {
    fn convert_horz_item(&self, time: &Time) -> ChartResult<InternalHorzScaleItem> {
        match time {
            Time::Timestamp(ts) => InternalHorzScaleItem::new(*ts as f64),
            Time::BusinessDay(day) => InternalHorzScaleItem::new(day.to_timestamp()? as f64),
            Time::DateString(value) => {
                let day = crate::core::time::BusinessDay::parse(value)?;
                InternalHorzScaleItem::new(day.to_timestamp()? as f64)
            }
            Time::Custom(_) => Err(ChartError::InvalidData(
                "time scale expects timestamps, business days or date strings".to_owned(),
            )),
        }
    }

    fn fill_weights_for_points(&self, points: &mut [TimeScalePoint], start_index: usize) {
        if points.is_empty() || start_index > points.len() {
            return;
        }

        let mut prev_time = if start_index == 0 {
            None
        } else {
            Some(points[start_index - 1].time.value())
        };
        let mut total_time_diff = 0.0;
        for point in &mut points[start_index..] {
            let current = point.time.value();
            if let Some(prev) = prev_time {
                point.time_weight = weight_by_time(current, prev);
            }
            total_time_diff += current - prev_time.unwrap_or(current);
            prev_time = Some(current);
        }

        if start_index == 0 && points.len() > 1 {
            // guess a weight for the first point from the average step
            let average_time_diff = (total_time_diff / (points.len() - 1) as f64).ceil();
            let first = points[0].time.value();
            points[0].time_weight = weight_by_time(first, first - average_time_diff);
        }
    }

    fn format_horz_item(&self, item: InternalHorzScaleItem) -> String {
        let Some(datetime) = unix_seconds_to_datetime(item.value()) else {
            return String::new();
        };
        let is_midnight = datetime.num_seconds_from_midnight() == 0;
        let pattern = if is_midnight {
            "%d %b '%y"
        } else if self.seconds_visible && datetime.second() != 0 {
            "%d %b '%y %H:%M:%S"
        } else {
            "%d %b '%y %H:%M"
        };
        datetime.format(pattern).to_string()
    }

    fn format_tick_mark(&self, mark: &TickMark) -> String {
        let Some(datetime) = unix_seconds_to_datetime(mark.time.value()) else {
            return String::new();
        };
        let pattern = match mark.weight {
            weight if weight >= TickMarkWeight::YEAR => "%Y",
            weight if weight >= TickMarkWeight::MONTH => "%b",
            weight if weight >= TickMarkWeight::DAY => "%-d",
            weight if weight >= TickMarkWeight::MINUTE1 => "%H:%M",
            _ if self.seconds_visible => "%H:%M:%S",
            _ => "%H:%M",
        };
        datetime.format(pattern).to_string()
    }
}

fn weight_by_time(current: f64, previous: f64) -> TickMarkWeight {
    let (Some(current), Some(previous)) = (
        unix_seconds_to_datetime(current),
        unix_seconds_to_datetime(previous),
    ) else {
        return TickMarkWeight::LESS_THAN_SECOND;
    };
    calendar_weight(current, previous)
}

fn calendar_weight(current: DateTime<Utc>, previous: DateTime<Utc>) -> TickMarkWeight {
    if current.year() != previous.year() {
        return TickMarkWeight::YEAR;
    }
    if current.month() != previous.month() {
        return TickMarkWeight::MONTH;
    }
    if current.day() != previous.day() {
        return TickMarkWeight::DAY;
    }

    let current_ms = current.timestamp_millis();
    let previous_ms = previous.timestamp_millis();
    for (divisor, weight) in INTRADAY_WEIGHT_DIVISORS.iter().rev() {
        if current_ms.div_euclid(*divisor) != previous_ms.div_euclid(*divisor) {
            return *weight;
        }
    }
    TickMarkWeight::LESS_THAN_SECOND
}

const MAX_NUMERIC_MAGNITUDE: u8 = 6;

/// Behavior for plain numeric horizontal axes (strikes, tenors, sequence numbers).
///
/// Weights follow the number of trailing decimal zeros, so `100` outranks `20`
/// which outranks `3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NumericHorzScaleBehavior;

impl HorzScaleBehavior for NumericHorzScaleBehavior {
    fn convert_horz_item(&self, time: &Time) -> ChartResult<InternalHorzScaleItem> {
        match time {
            Time::Timestamp(value) => InternalHorzScaleItem::new(*value as f64),
            Time::Custom(value) => InternalHorzScaleItem::new(*value),
            Time::BusinessDay(_) | Time::DateString(_) => Err(ChartError::InvalidData(
                "numeric horizontal scale accepts numeric items only".to_owned(),
            )),
        }
    }

    /// Integral and fractional values are one numeric representation here.
    fn time_kind(&self, time: &Time) -> TimeKind {
        match time {
            Time::Timestamp(_) | Time::Custom(_) => TimeKind::Custom,
            other => other.kind(),
        }
    }

    fn fill_weights_for_points(&self, points: &mut [TimeScalePoint], start_index: usize) {
        if start_index >= points.len() {
            return;
        }
        for point in &mut points[start_index..] {
            point.time_weight = numeric_weight(point.time.value());
        }
    }

    fn format_horz_item(&self, item: InternalHorzScaleItem) -> String {
        format!("{}", item.value())
    }

    fn format_tick_mark(&self, mark: &TickMark) -> String {
        format!("{}", mark.time.value())
    }
}

fn numeric_weight(value: f64) -> TickMarkWeight {
    if value == 0.0 {
        return TickMarkWeight(MAX_NUMERIC_MAGNITUDE * 10);
    }
    let mut magnitude = 0_u8;
    let mut step = 1.0_f64;
    while magnitude < MAX_NUMERIC_MAGNITUDE {
        let ratio = value / (step * 10.0);
        if (ratio - ratio.round()).abs() > 1e-9 {
            break;
        }
        step *= 10.0;
        magnitude += 1;
    }
    TickMarkWeight(magnitude * 10)
}
