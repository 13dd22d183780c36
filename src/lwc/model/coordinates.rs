use crate::core::{PlotRow, TimePointIndex};

/// Renderer-owned item that receives its horizontal coordinate in place.
pub trait TimedCoordinate {
    fn time_index(&self) -> TimePointIndex;
    fn set_x(&mut self, x: f64);
}

/// Single-price item (line, area, histogram) awaiting `x`/`y`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LinePoint {
    pub time: TimePointIndex,
    pub price: f64,
    pub x: f64,
    pub y: f64,
}

/// OHLC item awaiting `x` and one `y` per price.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BarPoint {
    pub time: TimePointIndex,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub x: f64,
    pub open_y: f64,
    pub high_y: f64,
    pub low_y: f64,
    pub close_y: f64,
}

impl TimedCoordinate for LinePoint {
    fn time_index(&self) -> TimePointIndex {
        self.time
    }

    fn set_x(&mut self, x: f64) {
        self.x = x;
    }
}

impl TimedCoordinate for BarPoint {
    fn time_index(&self) -> TimePointIndex {
        self.time
    }

    fn set_x(&mut self, x: f64) {
        self.x = x;
    }
}

impl From<&PlotRow> for LinePoint {
    fn from(row: &PlotRow) -> Self {
        Self {
            time: row.index,
            price: row.close(),
            ..Self::default()
        }
    }
}

impl From<&PlotRow> for BarPoint {
    fn from(row: &PlotRow) -> Self {
        Self {
            time: row.index,
            open: row.open(),
            high: row.high(),
            low: row.low(),
            close: row.close(),
            ..Self::default()
        }
    }
}
