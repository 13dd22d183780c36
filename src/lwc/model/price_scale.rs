use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::core::SeriesId;
use crate::error::{ChartError, ChartResult};
use crate::lwc::model::coordinates::{BarPoint, LinePoint};
use crate::lwc::model::time_scale::StrictRange;
use crate::lwc::model::validity::{InvalidationReason, Validity};

const EDGE_MARKS_PADDING: f64 = 6.0;
const DEFAULT_MIN_MOVE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PriceScaleMode {
    #[default]
    Normal,
    Logarithmic,
    Percentage,
    IndexedTo100,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceScaleState {
    pub auto_scale: bool,
    pub is_inverted: bool,
    pub mode: PriceScaleMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PriceScaleStateChange {
    pub auto_scale: Option<bool>,
    pub is_inverted: Option<bool>,
    pub mode: Option<PriceScaleMode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceScaleMargins {
    pub top: f64,
    pub bottom: f64,
}

impl PriceScaleMargins {
    pub fn validate(self) -> ChartResult<()> {
        if !(0.0..=1.0).contains(&self.top) {
            return Err(ChartError::InvalidConfiguration(
                "price scale top margin must be in [0,1]".to_owned(),
            ));
        }
        if !(0.0..=1.0).contains(&self.bottom) {
            return Err(ChartError::InvalidConfiguration(
                "price scale bottom margin must be in [0,1]".to_owned(),
            ));
        }
        if self.top + self.bottom > 1.0 {
            return Err(ChartError::InvalidConfiguration(
                "sum of price scale margins must be <= 1".to_owned(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceScaleOptions {
    pub auto_scale: bool,
    pub mode: PriceScaleMode,
    pub invert_scale: bool,
    pub scale_margins: PriceScaleMargins,
    pub ensure_edge_tick_marks_visible: bool,
}

impl Default for PriceScaleOptions {
    fn default() -> Self {
        Self {
            auto_scale: true,
            mode: PriceScaleMode::Normal,
            invert_scale: false,
            scale_margins: PriceScaleMargins {
                top: 0.2,
                bottom: 0.1,
            },
            ensure_edge_tick_marks_visible: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    min: f64,
    max: f64,
}

impl PriceRange {
    /// Builds a range, swapping bounds given in the wrong order.
    #[must_use]
    pub fn new(min: f64, max: f64) -> Self {
        if min > max {
            Self { min: max, max: min }
        } else {
            Self { min, max }
        }
    }

    #[must_use]
    pub fn min(self) -> f64 {
        self.min
    }

    #[must_use]
    pub fn max(self) -> f64 {
        self.max
    }

    #[must_use]
    pub fn length(self) -> f64 {
        self.max - self.min
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.min == self.max || self.min.is_nan() || self.max.is_nan()
    }

    #[must_use]
    pub fn merge(self, other: PriceRange) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn scale_around_center(&mut self, coeff: f64) {
        if !coeff.is_finite() || self.length() == 0.0 {
            return;
        }
        let center = (self.max + self.min) * 0.5;
        let max_delta = (self.max - center) * coeff;
        let min_delta = (self.min - center) * coeff;
        self.max = center + max_delta;
        self.min = center + min_delta;
    }

    pub fn shift(&mut self, delta: f64) {
        if !delta.is_finite() {
            return;
        }
        self.max += delta;
        self.min += delta;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AutoScaleMargins {
    pub above: f64,
    pub below: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoScaleInfo {
    pub price_range: Option<PriceRange>,
    pub margins: Option<AutoScaleMargins>,
}

/// Anything a price scale can autoscale over.
pub trait AutoScaleSource {
    fn visible(&self) -> bool;

    /// Base value for percentage modes: the first value at or after the
    /// left edge of `visible_bars`.
    fn first_value(&self, visible_bars: StrictRange) -> Option<f64>;

    fn autoscale_info(&mut self, visible_bars: StrictRange) -> Option<AutoScaleInfo>;

    fn min_move(&self) -> f64 {
        DEFAULT_MIN_MOVE
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct LogFormula {
    logical_offset: f64,
    coord_offset: f64,
}

impl Default for LogFormula {
    fn default() -> Self {
        Self {
            logical_offset: 4.0,
            coord_offset: 0.0001,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PriceScaleGesture {
    #[default]
    Idle,
    Scaling {
        start_point: f64,
        snapshot: PriceRange,
    },
    Scrolling {
        start_point: f64,
        snapshot: PriceRange,
    },
}

/// Price to vertical pixel transform of one scale (left, right or overlay).
///
/// The autoscaled range is dirty until the next validation with the scale's
/// sources, so coordinate reads after [`PriceScale::recalculate_price_range`]
/// must go through [`PriceScale::make_sure_valid`] first.
#[derive(Debug, Clone)]
pub struct PriceScale {
    id: String,
    options: PriceScaleOptions,
    height: f64,
    price_range: Option<PriceRange>,
    gesture: PriceScaleGesture,
    visible_bars: Option<StrictRange>,
    range_validity: Validity<StrictRange>,
    is_custom_price_range: bool,
    margin_above: f64,
    margin_below: f64,
    log_formula: LogFormula,
    min_move_override: Option<f64>,
    source_ids: Vec<SeriesId>,
}

impl PriceScale {
    pub fn new(id: impl Into<String>, options: PriceScaleOptions) -> ChartResult<Self> {
        options.scale_margins.validate()?;
        Ok(Self {
            id: id.into(),
            options,
            height: 0.0,
            price_range: None,
            gesture: PriceScaleGesture::Idle,
            visible_bars: None,
            range_validity: Validity::default(),
            is_custom_price_range: false,
            margin_above: 0.0,
            margin_below: 0.0,
            log_formula: LogFormula::default(),
            min_move_override: None,
            source_ids: Vec::new(),
        })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn options(&self) -> PriceScaleOptions {
        self.options
    }

    pub fn apply_options(&mut self, options: PriceScaleOptions) -> ChartResult<()> {
        options.scale_margins.validate()?;
        let change = PriceScaleStateChange {
            auto_scale: Some(options.auto_scale),
            is_inverted: Some(options.invert_scale),
            mode: Some(options.mode),
        };
        self.options.scale_margins = options.scale_margins;
        self.options.ensure_edge_tick_marks_visible = options.ensure_edge_tick_marks_visible;
        self.set_mode(change);
        self.invalidate_range(InvalidationReason::Options);
        Ok(())
    }

    #[must_use]
    pub fn mode(&self) -> PriceScaleState {
        PriceScaleState {
            auto_scale: self.options.auto_scale,
            is_inverted: self.options.invert_scale,
            mode: self.options.mode,
        }
    }

    /// Switches mode, autoscale and inversion.
    ///
    /// Leaving or entering logarithmic mode converts the current range and
    /// any in-flight gesture snapshot so both stay on the same prices.
    pub fn set_mode(&mut self, change: PriceScaleStateChange) {
        let old_mode = self.options.mode;
        if let Some(auto_scale) = change.auto_scale {
            self.options.auto_scale = auto_scale;
            if auto_scale {
                self.is_custom_price_range = false;
            }
        }
        if let Some(mode) = change.mode {
            self.options.mode = mode;
            if matches!(
                mode,
                PriceScaleMode::Percentage | PriceScaleMode::IndexedTo100
            ) {
                self.options.auto_scale = true;
            }
            self.invalidate_range(InvalidationReason::Mode);
        }
        let new_mode = self.options.mode;

        if old_mode == PriceScaleMode::Logarithmic && new_mode != old_mode {
            match self.price_range.and_then(|range| self.range_from_log(range)) {
                Some(raw) => self.price_range = Some(raw),
                None => self.options.auto_scale = true,
            }
            self.map_gesture_snapshot(|scale, snapshot| scale.range_from_log(snapshot));
        }
        if new_mode == PriceScaleMode::Logarithmic && new_mode != old_mode {
            self.price_range = self.price_range.map(|range| self.range_to_log(range));
            self.map_gesture_snapshot(|scale, snapshot| Some(scale.range_to_log(snapshot)));
        }

        if let Some(inverted) = change.is_inverted {
            self.options.invert_scale = inverted;
        }
        if new_mode != old_mode {
            debug!(scale = %self.id, ?old_mode, ?new_mode, "price scale mode changed");
        }
    }

    #[must_use]
    pub fn is_auto_scale(&self) -> bool {
        self.options.auto_scale
    }

    pub fn set_auto_scale(&mut self, auto_scale: bool) {
        self.set_mode(PriceScaleStateChange {
            auto_scale: Some(auto_scale),
            ..PriceScaleStateChange::default()
        });
    }

    #[must_use]
    pub fn is_custom_price_range(&self) -> bool {
        self.is_custom_price_range
    }

    #[must_use]
    pub fn is_log(&self) -> bool {
        self.options.mode == PriceScaleMode::Logarithmic
    }

    #[must_use]
    pub fn is_percentage(&self) -> bool {
        self.options.mode == PriceScaleMode::Percentage
    }

    #[must_use]
    pub fn is_indexed_to_100(&self) -> bool {
        self.options.mode == PriceScaleMode::IndexedTo100
    }

    #[must_use]
    pub fn is_inverted(&self) -> bool {
        self.options.invert_scale
    }

    pub fn set_height(&mut self, value: f64) {
        if (self.height - value).abs() <= f64::EPSILON {
            return;
        }
        self.height = value;
        self.invalidate_range(InvalidationReason::Height);
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.height
    }

    #[must_use]
    pub fn internal_height(&self) -> f64 {
        self.height - self.top_margin_px() - self.bottom_margin_px()
    }

    #[must_use]
    pub fn source_ids(&self) -> &[SeriesId] {
        &self.source_ids
    }

    pub fn add_source(&mut self, series: SeriesId) {
        if self.source_ids.contains(&series) {
            return;
        }
        self.source_ids.push(series);
        self.invalidate_range(InvalidationReason::Sources);
    }

    /// Detaches a source; the last one leaving resets the scale to autoscale
    /// with no range.
    pub fn remove_source(&mut self, series: SeriesId) {
        let before = self.source_ids.len();
        self.source_ids.retain(|id| *id != series);
        if self.source_ids.len() == before {
            return;
        }
        if self.source_ids.is_empty() {
            self.set_auto_scale(true);
            self.set_price_range(None);
            debug!(scale = %self.id, "last source removed, price scale reset");
        }
        self.invalidate_range(InvalidationReason::Sources);
    }

    /// Current range in the scale's internal space (log space in log mode).
    #[must_use]
    pub fn price_range(&self) -> Option<PriceRange> {
        self.price_range
    }

    /// Current range in price units whatever the mode.
    #[must_use]
    pub fn raw_price_range(&self) -> Option<PriceRange> {
        let range = self.price_range?;
        if self.is_log() {
            self.range_from_log(range)
        } else {
            Some(range)
        }
    }

    pub fn set_price_range(&mut self, range: Option<PriceRange>) {
        if self.price_range == range {
            return;
        }
        self.price_range = range;
    }

    /// Pins the range to `range` (price units) and turns autoscale off.
    pub fn set_custom_price_range(&mut self, range: Option<PriceRange>) {
        let internal = range.map(|range| {
            if self.is_log() {
                self.range_to_log(range)
            } else {
                range
            }
        });
        self.set_price_range(internal);
        self.is_custom_price_range = range.is_some();
        if range.is_some() {
            self.options.auto_scale = false;
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.height == 0.0 || self.price_range.is_none_or(PriceRange::is_empty)
    }

    pub fn set_min_move_override(&mut self, min_move: Option<f64>) {
        self.min_move_override = min_move;
        self.invalidate_range(InvalidationReason::Options);
    }

    /// Requests an autoscale pass over `visible_bars` on the next validation.
    pub fn recalculate_price_range(&mut self, visible_bars: StrictRange) {
        self.visible_bars = Some(visible_bars);
        self.range_validity.invalidate(InvalidationReason::Sources);
    }

    #[must_use]
    pub fn needs_validation(&self) -> bool {
        self.range_validity.is_dirty() && self.visible_bars.is_some()
    }

    /// Runs the pending autoscale pass, if any.
    pub fn make_sure_valid(&mut self, sources: &mut [&mut dyn AutoScaleSource]) {
        let Some(visible_bars) = self.visible_bars else {
            return;
        };
        if let Some(reason) = self.range_validity.dirty_reason() {
            self.range_validity.set(visible_bars);
            trace!(scale = %self.id, ?reason, sources = sources.len(), "autoscale pass");
            self.recalculate_price_range_impl(visible_bars, sources);
        }
    }

    pub fn price_to_coordinate(&self, price: f64, base_value: f64) -> f64 {
        let logical = if self.is_percentage() {
            to_percent(price, base_value)
        } else if self.is_indexed_to_100() {
            to_indexed_to_100(price, base_value)
        } else {
            price
        };
        self.logical_to_coordinate(logical)
    }

    pub fn coordinate_to_price(&self, coordinate: f64, base_value: f64) -> ChartResult<f64> {
        let logical = self.coordinate_to_logical(coordinate)?;
        Ok(self.logical_to_price(logical, base_value))
    }

    #[must_use]
    pub fn logical_to_price(&self, logical: f64, base_value: f64) -> f64 {
        if self.is_percentage() {
            from_percent(logical, base_value)
        } else if self.is_indexed_to_100() {
            from_indexed_to_100(logical, base_value)
        } else {
            logical
        }
    }

    #[must_use]
    pub fn logical_to_coordinate(&self, mut logical: f64) -> f64 {
        let Some(range) = self.price_range.filter(|_| !self.is_empty()) else {
            return 0.0;
        };
        if self.is_log() && logical != 0.0 {
            logical = to_log(logical, self.log_formula);
        }
        let inv_coordinate = self.bottom_margin_px()
            + (self.internal_height() - 1.0) * (logical - range.min()) / range.length();
        self.inverted_coordinate(inv_coordinate)
    }

    pub fn coordinate_to_logical(&self, coordinate: f64) -> ChartResult<f64> {
        if !coordinate.is_finite() {
            return Err(ChartError::InvalidData(
                "coordinate must be finite".to_owned(),
            ));
        }
        let Some(range) = self.price_range.filter(|_| !self.is_empty()) else {
            return Ok(0.0);
        };
        let inv_coordinate = self.inverted_coordinate(coordinate);
        let logical = range.min()
            + range.length()
                * ((inv_coordinate - self.bottom_margin_px()) / (self.internal_height() - 1.0));
        if self.is_log() {
            Ok(from_log(logical, self.log_formula))
        } else {
            Ok(logical)
        }
    }

    /// Writes `y` of `points[range]`; NaN prices are skipped.
    pub fn points_to_coordinates(
        &self,
        points: &mut [LinePoint],
        base_value: f64,
        range: Option<Range<usize>>,
    ) {
        let Some(transform) = self.coordinate_transform() else {
            return;
        };
        let range = clamp_range(range, points.len());
        for point in &mut points[range] {
            if point.price.is_nan() {
                continue;
            }
            point.y = transform.apply(self.logical_for_price(point.price, base_value));
        }
    }

    /// Writes `open_y`..`close_y` of `bars[range]`.
    pub fn bar_prices_to_coordinates(
        &self,
        bars: &mut [BarPoint],
        base_value: f64,
        range: Option<Range<usize>>,
    ) {
        let Some(transform) = self.coordinate_transform() else {
            return;
        };
        let range = clamp_range(range, bars.len());
        for bar in &mut bars[range] {
            bar.open_y = transform.apply(self.logical_for_price(bar.open, base_value));
            bar.high_y = transform.apply(self.logical_for_price(bar.high, base_value));
            bar.low_y = transform.apply(self.logical_for_price(bar.low, base_value));
            bar.close_y = transform.apply(self.logical_for_price(bar.close, base_value));
        }
    }

    #[must_use]
    pub fn gesture(&self) -> PriceScaleGesture {
        self.gesture
    }

    pub fn start_scale(&mut self, x: f64) {
        if self.is_percentage() || self.is_indexed_to_100() {
            return;
        }
        match self.gesture {
            PriceScaleGesture::Scaling { .. } => return,
            PriceScaleGesture::Scrolling { .. } => self.end_scroll(),
            PriceScaleGesture::Idle => {}
        }
        let Some(snapshot) = self.price_range.filter(|_| !self.is_empty()) else {
            return;
        };
        self.gesture = PriceScaleGesture::Scaling {
            start_point: self.height - x,
            snapshot,
        };
        trace!(scale = %self.id, x, "price scale scale started");
    }

    pub fn scale_to(&mut self, x: f64) {
        if self.is_percentage() || self.is_indexed_to_100() {
            return;
        }
        let PriceScaleGesture::Scaling {
            start_point,
            snapshot,
        } = self.gesture
        else {
            return;
        };
        self.options.auto_scale = false;
        let x = (self.height - x).max(0.0);
        let coeff = ((start_point + (self.height - 1.0) * 0.2) / (x + (self.height - 1.0) * 0.2))
            .max(0.1);
        let mut range = snapshot;
        range.scale_around_center(coeff);
        self.set_price_range(Some(range));
    }

    pub fn end_scale(&mut self) {
        if let PriceScaleGesture::Scaling { .. } = self.gesture {
            self.gesture = PriceScaleGesture::Idle;
        }
    }

    pub fn start_scroll(&mut self, x: f64) {
        if self.options.auto_scale {
            return;
        }
        match self.gesture {
            PriceScaleGesture::Scrolling { .. } => return,
            PriceScaleGesture::Scaling { .. } => self.end_scale(),
            PriceScaleGesture::Idle => {}
        }
        let Some(snapshot) = self.price_range.filter(|_| !self.is_empty()) else {
            return;
        };
        self.gesture = PriceScaleGesture::Scrolling {
            start_point: x,
            snapshot,
        };
        trace!(scale = %self.id, x, "price scale scroll started");
    }

    pub fn scroll_to(&mut self, x: f64) {
        if self.options.auto_scale {
            return;
        }
        let PriceScaleGesture::Scrolling {
            start_point,
            snapshot,
        } = self.gesture
        else {
            return;
        };
        let Some(current_range) = self.price_range else {
            return;
        };
        let mut pixel_delta = x - start_point;
        if self.is_inverted() {
            pixel_delta *= -1.0;
        }
        let price_units_per_pixel = current_range.length() / (self.internal_height() - 1.0);
        let mut range = snapshot;
        range.shift(pixel_delta * price_units_per_pixel);
        self.set_price_range(Some(range));
    }

    pub fn end_scroll(&mut self) {
        if let PriceScaleGesture::Scrolling { .. } = self.gesture {
            self.gesture = PriceScaleGesture::Idle;
        }
    }

    #[must_use]
    pub fn has_visible_edge_marks(&self) -> bool {
        self.options.ensure_edge_tick_marks_visible && self.options.auto_scale
    }

    #[must_use]
    pub fn edge_marks_padding(&self) -> f64 {
        EDGE_MARKS_PADDING
    }

    fn invalidate_range(&mut self, reason: InvalidationReason) {
        self.range_validity.invalidate(reason);
    }

    fn map_gesture_snapshot(
        &mut self,
        convert: impl Fn(&Self, PriceRange) -> Option<PriceRange>,
    ) {
        self.gesture = match self.gesture {
            PriceScaleGesture::Scaling {
                start_point,
                snapshot,
            } => match convert(self, snapshot) {
                Some(snapshot) => PriceScaleGesture::Scaling {
                    start_point,
                    snapshot,
                },
                None => PriceScaleGesture::Idle,
            },
            PriceScaleGesture::Scrolling {
                start_point,
                snapshot,
            } => match convert(self, snapshot) {
                Some(snapshot) => PriceScaleGesture::Scrolling {
                    start_point,
                    snapshot,
                },
                None => PriceScaleGesture::Idle,
            },
            PriceScaleGesture::Idle => PriceScaleGesture::Idle,
        };
    }

    fn range_to_log(&self, range: PriceRange) -> PriceRange {
        PriceRange::new(
            to_log(range.min(), self.log_formula),
            to_log(range.max(), self.log_formula),
        )
    }

    fn range_from_log(&self, range: PriceRange) -> Option<PriceRange> {
        let min = from_log(range.min(), self.log_formula);
        let max = from_log(range.max(), self.log_formula);
        (min.is_finite() && max.is_finite()).then(|| PriceRange::new(min, max))
    }

    fn min_move(&self, sources: &[&mut dyn AutoScaleSource]) -> f64 {
        if self.is_percentage() || self.is_indexed_to_100() {
            return DEFAULT_MIN_MOVE;
        }
        self.min_move_override
            .or_else(|| {
                sources
                    .iter()
                    .find(|source| source.visible())
                    .map(|source| source.min_move())
            })
            .unwrap_or(DEFAULT_MIN_MOVE)
    }

    fn recalculate_price_range_impl(
        &mut self,
        visible_bars: StrictRange,
        sources: &mut [&mut dyn AutoScaleSource],
    ) {
        if !self.options.auto_scale {
            return;
        }
        let mut price_range: Option<PriceRange> = None;
        let mut margin_above: f64 = 0.0;
        let mut margin_below: f64 = 0.0;

        for source in sources.iter_mut() {
            if !source.visible() {
                continue;
            }
            let Some(first_value) = source.first_value(visible_bars) else {
                continue;
            };
            let Some(info) = source.autoscale_info(visible_bars) else {
                continue;
            };
            let Some(source_range) = info.price_range else {
                continue;
            };
            let source_range = match self.options.mode {
                PriceScaleMode::Logarithmic => self.range_to_log(source_range),
                PriceScaleMode::Percentage => to_percent_range(source_range, first_value),
                PriceScaleMode::IndexedTo100 => to_indexed_to_100_range(source_range, first_value),
                PriceScaleMode::Normal => source_range,
            };
            price_range = Some(match price_range {
                Some(acc) => acc.merge(source_range),
                None => source_range,
            });
            if let Some(margins) = info.margins {
                margin_above = margin_above.max(margins.above);
                margin_below = margin_below.max(margins.below);
            }
        }

        if self.has_visible_edge_marks() {
            margin_above = margin_above.max(self.edge_marks_padding());
            margin_below = margin_below.max(self.edge_marks_padding());
        }
        self.margin_above = margin_above;
        self.margin_below = margin_below;

        let Some(mut range) = price_range else {
            if self.price_range.is_none() {
                self.price_range = Some(PriceRange::new(-0.5, 0.5));
                self.log_formula = log_formula_for_price_range(None);
                debug!(scale = %self.id, "no autoscale data, default range applied");
            }
            return;
        };

        if range.is_empty() {
            let extend = 5.0 * self.min_move(sources);
            let raw = if self.is_log() {
                self.range_from_log(range).unwrap_or(range)
            } else {
                range
            };
            range = PriceRange::new(raw.min() - extend, raw.max() + extend);
            if self.is_log() {
                range = self.range_to_log(range);
            }
        }

        if let Some(raw) = self.range_from_log(range).filter(|_| self.is_log()) {
            let new_formula = log_formula_for_price_range(Some(raw));
            if !log_formulas_are_same(new_formula, self.log_formula) {
                // snapshots are stored in the old log space
                let raw_snapshot = match self.gesture {
                    PriceScaleGesture::Scaling { snapshot, .. }
                    | PriceScaleGesture::Scrolling { snapshot, .. } => {
                        self.range_from_log(snapshot)
                    }
                    PriceScaleGesture::Idle => None,
                };
                self.log_formula = new_formula;
                range = self.range_to_log(raw);
                if let Some(raw_snapshot) = raw_snapshot {
                    self.map_gesture_snapshot(|scale, _| Some(scale.range_to_log(raw_snapshot)));
                }
                debug!(
                    scale = %self.id,
                    logical_offset = new_formula.logical_offset,
                    "log formula updated"
                );
            }
        }

        if !range.min().is_finite() || !range.max().is_finite() {
            warn!(scale = %self.id, "autoscale produced a non-finite range, keeping previous");
            return;
        }
        self.set_price_range(Some(range));
    }

    fn coordinate_transform(&self) -> Option<CoordinateTransform> {
        let range = self.price_range.filter(|_| !self.is_empty())?;
        Some(CoordinateTransform {
            bottom_margin: self.bottom_margin_px(),
            min: range.min(),
            pixels_per_unit: (self.internal_height() - 1.0) / range.length(),
            inverted: self.is_inverted(),
            height: self.height,
        })
    }

    fn logical_for_price(&self, price: f64, base_value: f64) -> f64 {
        match self.options.mode {
            PriceScaleMode::Percentage => to_percent(price, base_value),
            PriceScaleMode::IndexedTo100 => to_indexed_to_100(price, base_value),
            PriceScaleMode::Logarithmic => to_log(price, self.log_formula),
            PriceScaleMode::Normal => price,
        }
    }

    fn inverted_coordinate(&self, coordinate: f64) -> f64 {
        if self.is_inverted() {
            coordinate
        } else {
            self.height - 1.0 - coordinate
        }
    }

    fn top_margin_px(&self) -> f64 {
        if self.is_inverted() {
            self.options.scale_margins.bottom * self.height + self.margin_below
        } else {
            self.options.scale_margins.top * self.height + self.margin_above
        }
    }

    fn bottom_margin_px(&self) -> f64 {
        if self.is_inverted() {
            self.options.scale_margins.top * self.height + self.margin_above
        } else {
            self.options.scale_margins.bottom * self.height + self.margin_below
        }
    }
}

/// Affine logical-to-pixel map frozen for one batch of points.
struct CoordinateTransform {
    bottom_margin: f64,
    min: f64,
    pixels_per_unit: f64,
    inverted: bool,
    height: f64,
}

impl CoordinateTransform {
    fn apply(&self, logical: f64) -> f64 {
        let inv_coordinate = self.bottom_margin + self.pixels_per_unit * (logical - self.min);
        if self.inverted {
            inv_coordinate
        } else {
            self.height - 1.0 - inv_coordinate
        }
    }
}

fn clamp_range(range: Option<Range<usize>>, len: usize) -> Range<usize> {
    let range = range.unwrap_or(0..len);
    let end = range.end.min(len);
    range.start.min(end)..end
}

fn from_percent(value: f64, base_value: f64) -> f64 {
    let value = if base_value < 0.0 { -value } else { value };
    (value / 100.0) * base_value + base_value
}

fn to_percent(value: f64, base_value: f64) -> f64 {
    let result = 100.0 * (value - base_value) / base_value;
    if base_value < 0.0 { -result } else { result }
}

fn to_percent_range(range: PriceRange, base_value: f64) -> PriceRange {
    PriceRange::new(
        to_percent(range.min(), base_value),
        to_percent(range.max(), base_value),
    )
}

fn from_indexed_to_100(value: f64, base_value: f64) -> f64 {
    let mut value = value - 100.0;
    if base_value < 0.0 {
        value = -value;
    }
    (value / 100.0) * base_value + base_value
}

fn to_indexed_to_100(value: f64, base_value: f64) -> f64 {
    let result = 100.0 * (value - base_value) / base_value + 100.0;
    if base_value < 0.0 { -result } else { result }
}

fn to_indexed_to_100_range(range: PriceRange, base_value: f64) -> PriceRange {
    PriceRange::new(
        to_indexed_to_100(range.min(), base_value),
        to_indexed_to_100(range.max(), base_value),
    )
}

fn to_log(price: f64, log_formula: LogFormula) -> f64 {
    let magnitude = price.abs();
    if magnitude < 1e-15 {
        return 0.0;
    }
    let value = (magnitude + log_formula.coord_offset).log10() + log_formula.logical_offset;
    if price < 0.0 { -value } else { value }
}

fn from_log(logical: f64, log_formula: LogFormula) -> f64 {
    let magnitude = logical.abs();
    if magnitude < 1e-15 {
        return 0.0;
    }
    let value = 10f64.powf(magnitude - log_formula.logical_offset) - log_formula.coord_offset;
    if logical < 0.0 { -value } else { value }
}

fn log_formula_for_price_range(range: Option<PriceRange>) -> LogFormula {
    let default = LogFormula::default();
    let Some(range) = range else {
        return default;
    };
    let diff = (range.max() - range.min()).abs();
    if !(1e-15..1.0).contains(&diff) {
        return default;
    }
    let digits = diff.log10().abs().ceil();
    let logical_offset = default.logical_offset + digits;
    let coord_offset = 1.0 / 10f64.powf(logical_offset);
    LogFormula {
        logical_offset,
        coord_offset,
    }
}

fn log_formulas_are_same(left: LogFormula, right: LogFormula) -> bool {
    (left.logical_offset - right.logical_offset).abs() <= f64::EPSILON
        && (left.coord_offset - right.coord_offset).abs() <= f64::EPSILON
}
