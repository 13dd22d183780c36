use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::primitives::{decimal_to_f64, ensure_finite};
use crate::core::time::{InternalHorzScaleItem, Time, TimePointIndex};
use crate::error::{ChartError, ChartResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeriesId(u32);

impl SeriesId {
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeriesKind {
    Bar,
    Candlestick,
    Line,
    Area,
    Baseline,
    Histogram,
    Custom,
}

impl SeriesKind {
    #[must_use]
    pub fn is_ohlc(self) -> bool {
        matches!(self, Self::Bar | Self::Candlestick)
    }
}

pub const PLOT_OPEN: usize = 0;
pub const PLOT_HIGH: usize = 1;
pub const PLOT_LOW: usize = 2;
pub const PLOT_CLOSE: usize = 3;

/// `[open, high, low, close]`; single-value rows repeat their value.
pub type PlotRowValue = [f64; 4];

pub type ColorValue = Arc<str>;

fn color(value: &Option<String>) -> Option<ColorValue> {
    value.as_deref().map(Arc::from)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcData {
    pub time: Time,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wick_color: Option<String>,
}

impl OhlcData {
    #[must_use]
    pub fn new(time: impl Into<Time>, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            time: time.into(),
            open,
            high,
            low,
            close,
            color: None,
            border_color: None,
            wick_color: None,
        }
    }

    /// Converts strongly-typed temporal/decimal input into an OHLC item.
    pub fn from_decimal_time(
        time: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
    ) -> ChartResult<Self> {
        Ok(Self::new(
            Time::from_datetime(time),
            decimal_to_f64(open, "open")?,
            decimal_to_f64(high, "high")?,
            decimal_to_f64(low, "low")?,
            decimal_to_f64(close, "close")?,
        ))
    }

    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

/// Item for line, area, baseline and histogram series.
///
/// Only the cosmetic overrides relevant to the target kind are kept.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleValueStyle {
    pub color: Option<String>,
    pub line_color: Option<String>,
    pub top_color: Option<String>,
    pub bottom_color: Option<String>,
    pub top_fill_color1: Option<String>,
    pub top_fill_color2: Option<String>,
    pub top_line_color: Option<String>,
    pub bottom_fill_color1: Option<String>,
    pub bottom_fill_color2: Option<String>,
    pub bottom_line_color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleValueData {
    pub time: Time,
    pub value: f64,
    #[serde(flatten)]
    pub style: SingleValueStyle,
}

impl SingleValueData {
    #[must_use]
    pub fn new(time: impl Into<Time>, value: f64) -> Self {
        Self {
            time: time.into(),
            value,
            style: SingleValueStyle::default(),
        }
    }

    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.style.color = Some(color.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomData {
    pub time: Time,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SeriesDataItem {
    Whitespace(Time),
    Ohlc(OhlcData),
    SingleValue(SingleValueData),
    Custom(CustomData),
}

impl SeriesDataItem {
    #[must_use]
    pub fn time(&self) -> &Time {
        match self {
            Self::Whitespace(time) => time,
            Self::Ohlc(item) => &item.time,
            Self::SingleValue(item) => &item.time,
            Self::Custom(item) => &item.time,
        }
    }

    /// Parses one JSON object into the item shape expected by `kind`.
    ///
    /// Objects without the kind's value fields become whitespace; custom
    /// objects keep the whole object as payload.
    pub fn from_json(kind: SeriesKind, value: serde_json::Value) -> ChartResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| ChartError::InvalidData("series item must be an object".to_owned()))?;
        let time_value = object
            .get("time")
            .cloned()
            .ok_or_else(|| ChartError::InvalidData("series item requires `time`".to_owned()))?;
        let invalid = |err: serde_json::Error| ChartError::InvalidData(err.to_string());

        match kind {
            SeriesKind::Custom => Ok(Self::Custom(CustomData {
                time: serde_json::from_value(time_value).map_err(invalid)?,
                payload: value,
            })),
            SeriesKind::Bar | SeriesKind::Candlestick if object.contains_key("open") => {
                serde_json::from_value(value).map(Self::Ohlc).map_err(invalid)
            }
            SeriesKind::Line | SeriesKind::Area | SeriesKind::Baseline | SeriesKind::Histogram
                if object.contains_key("value") =>
            {
                serde_json::from_value(value)
                    .map(Self::SingleValue)
                    .map_err(invalid)
            }
            _ => Ok(Self::Whitespace(
                serde_json::from_value(time_value).map_err(invalid)?,
            )),
        }
    }
}

impl From<OhlcData> for SeriesDataItem {
    fn from(value: OhlcData) -> Self {
        Self::Ohlc(value)
    }
}

impl From<SingleValueData> for SeriesDataItem {
    fn from(value: SingleValueData) -> Self {
        Self::SingleValue(value)
    }
}

/// Cosmetic per-row fields, one variant per series kind.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub enum RowStyle {
    #[default]
    Plain,
    Bar {
        color: Option<ColorValue>,
    },
    Candlestick {
        color: Option<ColorValue>,
        border_color: Option<ColorValue>,
        wick_color: Option<ColorValue>,
    },
    Line {
        color: Option<ColorValue>,
    },
    Area {
        line_color: Option<ColorValue>,
        top_color: Option<ColorValue>,
        bottom_color: Option<ColorValue>,
    },
    Baseline {
        top_fill_color1: Option<ColorValue>,
        top_fill_color2: Option<ColorValue>,
        top_line_color: Option<ColorValue>,
        bottom_fill_color1: Option<ColorValue>,
        bottom_fill_color2: Option<ColorValue>,
        bottom_line_color: Option<ColorValue>,
    },
    Histogram {
        color: Option<ColorValue>,
    },
}

/// A series' value at one timeline index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotRow {
    pub index: TimePointIndex,
    pub time: InternalHorzScaleItem,
    pub original_time: Time,
    pub value: PlotRowValue,
    pub style: RowStyle,
    pub custom_values: Option<Arc<serde_json::Value>>,
}

impl PlotRow {
    #[must_use]
    pub fn open(&self) -> f64 {
        self.value[PLOT_OPEN]
    }

    #[must_use]
    pub fn high(&self) -> f64 {
        self.value[PLOT_HIGH]
    }

    #[must_use]
    pub fn low(&self) -> f64 {
        self.value[PLOT_LOW]
    }

    #[must_use]
    pub fn close(&self) -> f64 {
        self.value[PLOT_CLOSE]
    }
}

pub type WhitespacePredicate = Arc<dyn Fn(&serde_json::Value) -> bool + Send + Sync>;
pub type PriceValueBuilder = Arc<dyn Fn(&serde_json::Value) -> Vec<f64> + Send + Sync>;
pub type CustomConflationReducer =
    Arc<dyn Fn(&[&serde_json::Value]) -> serde_json::Value + Send + Sync>;

/// Caller-supplied hooks for custom series.
#[derive(Clone)]
pub struct CustomSeriesHooks {
    pub whitespace: Option<WhitespacePredicate>,
    pub price_values: PriceValueBuilder,
    pub conflation_reducer: Option<CustomConflationReducer>,
}

impl CustomSeriesHooks {
    #[must_use]
    pub fn new(price_values: PriceValueBuilder) -> Self {
        Self {
            whitespace: None,
            price_values,
            conflation_reducer: None,
        }
    }

    #[must_use]
    pub fn with_whitespace(mut self, predicate: WhitespacePredicate) -> Self {
        self.whitespace = Some(predicate);
        self
    }

    #[must_use]
    pub fn with_conflation_reducer(mut self, reducer: CustomConflationReducer) -> Self {
        self.conflation_reducer = Some(reducer);
        self
    }

    #[must_use]
    pub fn is_whitespace(&self, payload: &serde_json::Value) -> bool {
        self.whitespace
            .as_ref()
            .is_some_and(|predicate| predicate(payload))
    }

    /// Builds the `[first, max, min, last]` value of a custom payload.
    #[must_use]
    pub fn plot_value(&self, payload: &serde_json::Value) -> Option<PlotRowValue> {
        let values: Vec<f64> = (self.price_values)(payload)
            .into_iter()
            .filter(|v| v.is_finite())
            .collect();
        let first = *values.first()?;
        let last = *values.last()?;
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        Some([first, max, min, last])
    }
}

impl fmt::Debug for CustomSeriesHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomSeriesHooks")
            .field("whitespace", &self.whitespace.is_some())
            .field("conflation_reducer", &self.conflation_reducer.is_some())
            .finish_non_exhaustive()
    }
}

/// Creates the plot row for `item`, or `None` for whitespace.
///
/// One arm per series kind; an item shape that the kind cannot hold is an error.
pub fn create_plot_row(
    kind: SeriesKind,
    time: InternalHorzScaleItem,
    index: TimePointIndex,
    item: &SeriesDataItem,
    hooks: Option<&CustomSeriesHooks>,
) -> ChartResult<Option<PlotRow>> {
    let original_time = item.time().clone();
    let row = |value: PlotRowValue, style: RowStyle| PlotRow {
        index,
        time,
        original_time: original_time.clone(),
        value,
        style,
        custom_values: None,
    };

    match (kind, item) {
        (_, SeriesDataItem::Whitespace(_)) => Ok(None),
        (SeriesKind::Bar | SeriesKind::Candlestick, SeriesDataItem::Ohlc(data)) => {
            ensure_finite(&[
                ("open", data.open),
                ("high", data.high),
                ("low", data.low),
                ("close", data.close),
            ])?;
            let value = [data.open, data.high, data.low, data.close];
            let style = if kind == SeriesKind::Bar {
                RowStyle::Bar {
                    color: color(&data.color),
                }
            } else {
                RowStyle::Candlestick {
                    color: color(&data.color),
                    border_color: color(&data.border_color),
                    wick_color: color(&data.wick_color),
                }
            };
            Ok(Some(row(value, style)))
        }
        (
            SeriesKind::Line | SeriesKind::Area | SeriesKind::Baseline | SeriesKind::Histogram,
            SeriesDataItem::SingleValue(data),
        ) => {
            ensure_finite(&[("value", data.value)])?;
            let value = [data.value; 4];
            let s = &data.style;
            let style = match kind {
                SeriesKind::Line => RowStyle::Line {
                    color: color(&s.color),
                },
                SeriesKind::Area => RowStyle::Area {
                    line_color: color(&s.line_color),
                    top_color: color(&s.top_color),
                    bottom_color: color(&s.bottom_color),
                },
                SeriesKind::Baseline => RowStyle::Baseline {
                    top_fill_color1: color(&s.top_fill_color1),
                    top_fill_color2: color(&s.top_fill_color2),
                    top_line_color: color(&s.top_line_color),
                    bottom_fill_color1: color(&s.bottom_fill_color1),
                    bottom_fill_color2: color(&s.bottom_fill_color2),
                    bottom_line_color: color(&s.bottom_line_color),
                },
                _ => RowStyle::Histogram {
                    color: color(&s.color),
                },
            };
            Ok(Some(row(value, style)))
        }
        (SeriesKind::Custom, SeriesDataItem::Custom(data)) => {
            let hooks = hooks.ok_or_else(|| {
                ChartError::InvalidConfiguration(
                    "custom series requires a price value builder".to_owned(),
                )
            })?;
            if hooks.is_whitespace(&data.payload) {
                return Ok(None);
            }
            let Some(value) = hooks.plot_value(&data.payload) else {
                return Ok(None);
            };
            let mut plot_row = row(value, RowStyle::Plain);
            plot_row.custom_values = Some(Arc::new(data.payload.clone()));
            Ok(Some(plot_row))
        }
        (kind, item) => Err(ChartError::InvalidData(format!(
            "{kind:?} series cannot hold item at time {}",
            item.time()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::{
        CustomSeriesHooks, OhlcData, RowStyle, SeriesDataItem, SeriesKind, SingleValueData,
        create_plot_row,
    };
    use crate::core::time::{InternalHorzScaleItem, Time};

    fn item_time() -> InternalHorzScaleItem {
        InternalHorzScaleItem::new(1_000.0).expect("finite")
    }

    #[test]
    fn candlestick_rows_keep_ohlc_and_cosmetics() {
        let item: SeriesDataItem = OhlcData::new(1_000, 1.0, 3.0, 0.5, 2.0)
            .with_color("#f00")
            .into();
        let row = create_plot_row(SeriesKind::Candlestick, item_time(), 7, &item, None)
            .expect("row")
            .expect("not whitespace");
        assert_eq!(row.index, 7);
        assert_eq!(row.value, [1.0, 3.0, 0.5, 2.0]);
        assert!(matches!(row.style, RowStyle::Candlestick { color: Some(ref c), .. } if &**c == "#f00"));
    }

    #[test]
    fn single_value_row_repeats_value_and_rejects_nan() {
        let item: SeriesDataItem = SingleValueData::new(1_000, 4.5).into();
        let row = create_plot_row(SeriesKind::Area, item_time(), 0, &item, None)
            .expect("row")
            .expect("not whitespace");
        assert_eq!(row.value, [4.5; 4]);

        let bad: SeriesDataItem = SingleValueData::new(1_000, f64::NAN).into();
        assert!(create_plot_row(SeriesKind::Line, item_time(), 0, &bad, None).is_err());
    }

    #[test]
    fn mismatched_item_shape_is_rejected() {
        let item: SeriesDataItem = SingleValueData::new(1_000, 4.5).into();
        assert!(create_plot_row(SeriesKind::Bar, item_time(), 0, &item, None).is_err());
    }

    #[test]
    fn custom_rows_use_price_value_builder_and_whitespace_predicate() {
        let hooks = CustomSeriesHooks::new(Arc::new(|payload: &serde_json::Value| {
            payload["values"]
                .as_array()
                .map(|values| values.iter().filter_map(|v| v.as_f64()).collect())
                .unwrap_or_default()
        }))
        .with_whitespace(Arc::new(|payload: &serde_json::Value| payload.get("values").is_none()));

        let item = SeriesDataItem::from_json(
            SeriesKind::Custom,
            json!({ "time": 1000, "values": [3.0, 9.0, 1.0, 4.0] }),
        )
        .expect("parse");
        let row = create_plot_row(SeriesKind::Custom, item_time(), 2, &item, Some(&hooks))
            .expect("row")
            .expect("not whitespace");
        assert_eq!(row.value, [3.0, 9.0, 1.0, 4.0]);
        assert!(row.custom_values.is_some());

        let blank = SeriesDataItem::from_json(SeriesKind::Custom, json!({ "time": 1000 }))
            .expect("parse");
        assert!(
            create_plot_row(SeriesKind::Custom, item_time(), 2, &blank, Some(&hooks))
                .expect("row")
                .is_none()
        );
    }

    #[test]
    fn json_items_without_values_are_whitespace() {
        let item = SeriesDataItem::from_json(SeriesKind::Line, json!({ "time": "2020-01-02" }))
            .expect("parse");
        assert_eq!(item, SeriesDataItem::Whitespace(Time::from("2020-01-02")));

        let bar = SeriesDataItem::from_json(
            SeriesKind::Bar,
            json!({ "time": 5, "open": 1.0, "high": 2.0, "low": 0.5, "close": 1.5 }),
        )
        .expect("parse");
        assert!(matches!(bar, SeriesDataItem::Ohlc(_)));
    }
}
