use std::fmt;
use std::sync::Arc;

use crate::core::{
    CustomConflationReducer, CustomSeriesHooks, PLOT_CLOSE, PLOT_HIGH, PLOT_LOW, PLOT_OPEN,
    PlotRow, PlotRowValue, SeriesKind,
};
use crate::error::{ChartError, ChartResult};

/// How one group of consecutive rows collapses into a single row.
///
/// Every variant keeps the last row's `index`, `time` and `original_time`,
/// so a conflated row sits where its group ends on the timeline.
#[derive(Clone)]
pub enum ConflationReducer {
    /// First open, max high, min low, last close, last row's colors.
    Ohlc,
    /// Last value and style.
    Line,
    /// Last close plus the group's close extremes in `high`/`low`.
    FillExtents,
    /// Largest value together with the style of the row holding it.
    Histogram,
    Custom {
        reducer: CustomConflationReducer,
        hooks: CustomSeriesHooks,
    },
}

impl ConflationReducer {
    /// Picks the reducer for a series kind.
    ///
    /// Custom series must bring their own reducer.
    pub fn for_series(kind: SeriesKind, hooks: Option<&CustomSeriesHooks>) -> ChartResult<Self> {
        Ok(match kind {
            SeriesKind::Bar | SeriesKind::Candlestick => Self::Ohlc,
            SeriesKind::Line => Self::Line,
            SeriesKind::Area | SeriesKind::Baseline => Self::FillExtents,
            SeriesKind::Histogram => Self::Histogram,
            SeriesKind::Custom => {
                let hooks = hooks.ok_or(ChartError::MissingConflationReducer)?;
                let reducer = hooks
                    .conflation_reducer
                    .clone()
                    .ok_or(ChartError::MissingConflationReducer)?;
                Self::Custom {
                    reducer,
                    hooks: hooks.clone(),
                }
            }
        })
    }

    pub fn reduce(&self, group: &[PlotRow]) -> ChartResult<PlotRow> {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            return Err(ChartError::EmptyReducerInput);
        };
        if group.len() == 1 {
            return Ok(first.clone());
        }

        match self {
            Self::Ohlc | Self::FillExtents => {
                let mut row = last.clone();
                row.value = ohlc_value(group, first, last);
                Ok(row)
            }
            Self::Line => Ok(last.clone()),
            Self::Histogram => {
                let peak = group
                    .iter()
                    .reduce(|best, row| if row.close() > best.close() { row } else { best })
                    .unwrap_or(last);
                let mut row = last.clone();
                row.value = peak.value;
                row.style = peak.style.clone();
                Ok(row)
            }
            Self::Custom { reducer, hooks } => {
                let payloads: Vec<&serde_json::Value> = group
                    .iter()
                    .filter_map(|row| row.custom_values.as_deref())
                    .collect();
                if payloads.is_empty() {
                    return Err(ChartError::EmptyReducerInput);
                }
                let payload = reducer(&payloads);
                let mut row = last.clone();
                row.value = hooks
                    .plot_value(&payload)
                    .unwrap_or_else(|| ohlc_value(group, first, last));
                row.custom_values = Some(Arc::new(payload));
                Ok(row)
            }
        }
    }
}

impl fmt::Debug for ConflationReducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ohlc => f.write_str("Ohlc"),
            Self::Line => f.write_str("Line"),
            Self::FillExtents => f.write_str("FillExtents"),
            Self::Histogram => f.write_str("Histogram"),
            Self::Custom { .. } => f.write_str("Custom"),
        }
    }
}

fn ohlc_value(group: &[PlotRow], first: &PlotRow, last: &PlotRow) -> PlotRowValue {
    let mut value = [0.0; 4];
    value[PLOT_OPEN] = first.open();
    value[PLOT_HIGH] = group
        .iter()
        .map(PlotRow::high)
        .fold(f64::NEG_INFINITY, f64::max);
    value[PLOT_LOW] = group.iter().map(PlotRow::low).fold(f64::INFINITY, f64::min);
    value[PLOT_CLOSE] = last.close();
    value
}
