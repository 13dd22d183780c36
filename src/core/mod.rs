pub mod horz_scale;
pub mod plot_list;
pub mod primitives;
pub mod series;
pub mod tick_marks;
pub mod time;

pub use horz_scale::{HorzScaleBehavior, NumericHorzScaleBehavior, TimeHorzScaleBehavior};
pub use plot_list::{MinMax, MismatchDirection, PlotList};
pub use series::{
    ColorValue, CustomConflationReducer, CustomData, CustomSeriesHooks, OhlcData, PLOT_CLOSE,
    PLOT_HIGH, PLOT_LOW, PLOT_OPEN, PlotRow, PlotRowValue, PriceValueBuilder, RowStyle,
    SeriesDataItem, SeriesId, SeriesKind, SingleValueData, SingleValueStyle, WhitespacePredicate,
    create_plot_row,
};
pub use tick_marks::{TickMark, TickMarks};
pub use time::{
    BusinessDay, HorzScaleItemKey, InternalHorzScaleItem, TickMarkWeight, Time, TimeKind,
    TimePointIndex, TimeScalePoint, UtcTimestamp,
};
