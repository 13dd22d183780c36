use thiserror::Error;

use crate::core::{SeriesId, TimeKind};

pub type ChartResult<T> = Result<T, ChartError>;

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("time representation mismatch: series uses {expected:?}, got {actual:?}")]
    TimeTypeMismatch { expected: TimeKind, actual: TimeKind },

    #[error("cannot update oldest data, last time={last}, new time={new}")]
    OutdatedUpdate { last: f64, new: f64 },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("conflation is enabled for a custom series without a reducer")]
    MissingConflationReducer,

    #[error("conflation reducer invoked with an empty group")]
    EmptyReducerInput,

    #[error("historical updates are not supported while conflation is enabled")]
    HistoricalUpdateWithConflation,

    #[error("unknown series: {0:?}")]
    UnknownSeries(SeriesId),

    #[error("unknown price scale: {0}")]
    UnknownPriceScale(String),
}
