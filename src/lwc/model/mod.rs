mod chart_model;
mod coordinates;
mod data_layer;
mod pane;
mod price_scale;
mod series;
mod time_scale;
mod validity;

pub use chart_model::{ChartModel, ChartModelOptions};
pub use coordinates::{BarPoint, LinePoint, TimedCoordinate};
pub use data_layer::{
    DataLayer, DataUpdateResponse, SeriesChanges, SeriesDescriptor, SeriesUpdateInfo,
    TimePointData, TimeScaleChanges,
};
pub use pane::{LEFT_PRICE_SCALE_ID, Pane, PaneId, RIGHT_PRICE_SCALE_ID};
pub use price_scale::{
    AutoScaleInfo, AutoScaleMargins, AutoScaleSource, PriceRange, PriceScale, PriceScaleGesture,
    PriceScaleMargins, PriceScaleMode, PriceScaleOptions, PriceScaleState, PriceScaleStateChange,
};
pub use series::{Series, SeriesOptions};
pub use time_scale::{
    LogicalRange, StrictRange, TimeMark, TimeScale, TimeScaleGesture, TimeScaleOptions,
    TransitionState, VisibleTimeRange,
};
pub use validity::{InvalidationReason, Validity};
