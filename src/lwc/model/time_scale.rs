use std::ops::Range;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::core::{
    HorzScaleBehavior, TickMarkWeight, TickMarks, Time, TimePointIndex, TimeScalePoint,
};
use crate::error::{ChartError, ChartResult};
use crate::lwc::model::coordinates::TimedCoordinate;
use crate::lwc::model::validity::{InvalidationReason, Validity};

const MIN_VISIBLE_BARS_COUNT: f64 = 2.0;
const DEFAULT_TICK_MARK_CHARACTERS: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogicalRange {
    pub from: f64,
    pub to: f64,
}

impl LogicalRange {
    #[must_use]
    pub fn new(from: f64, to: f64) -> Self {
        Self { from, to }
    }

    #[must_use]
    pub fn left(self) -> f64 {
        self.from
    }

    #[must_use]
    pub fn right(self) -> f64 {
        self.to
    }

    #[must_use]
    pub fn count(self) -> f64 {
        self.to - self.from + 1.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrictRange {
    left: TimePointIndex,
    right: TimePointIndex,
}

impl StrictRange {
    #[must_use]
    pub fn new(left: TimePointIndex, right: TimePointIndex) -> Self {
        Self { left, right }
    }

    #[must_use]
    pub fn left(self) -> TimePointIndex {
        self.left
    }

    #[must_use]
    pub fn right(self) -> TimePointIndex {
        self.right
    }

    #[must_use]
    pub fn count(self) -> f64 {
        (self.right - self.left + 1) as f64
    }

    #[must_use]
    pub fn contains(self, index: TimePointIndex) -> bool {
        self.left <= index && index <= self.right
    }
}

/// First and last timeline points inside the visible strict range.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleTimeRange {
    pub from: TimeScalePoint,
    pub to: TimeScalePoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeScaleOptions {
    pub right_offset: f64,
    pub right_offset_pixels: Option<f64>,
    pub bar_spacing: f64,
    pub min_bar_spacing: f64,
    /// Upper clamp for bar spacing; `0` means half the width.
    pub max_bar_spacing: f64,
    pub fix_left_edge: bool,
    pub fix_right_edge: bool,
    pub lock_visible_time_range_on_resize: bool,
    pub right_bar_stays_on_scroll: bool,
    pub shift_visible_range_on_new_bar: bool,
    pub allow_shift_visible_range_on_whitespace_replacement: bool,
    pub uniform_distribution: bool,
    pub tick_mark_max_character_length: Option<u32>,
    pub font_size: f64,
    /// Set when the host disables every scroll and scale gesture.
    pub scaling_and_scrolling_disabled: bool,
}

impl Default for TimeScaleOptions {
    fn default() -> Self {
        Self {
            right_offset: 0.0,
            right_offset_pixels: None,
            bar_spacing: 6.0,
            min_bar_spacing: 0.5,
            max_bar_spacing: 0.0,
            fix_left_edge: false,
            fix_right_edge: false,
            lock_visible_time_range_on_resize: false,
            right_bar_stays_on_scroll: false,
            shift_visible_range_on_new_bar: true,
            allow_shift_visible_range_on_whitespace_replacement: false,
            uniform_distribution: false,
            tick_mark_max_character_length: None,
            font_size: 12.0,
            scaling_and_scrolling_disabled: false,
        }
    }
}

impl TimeScaleOptions {
    pub fn validate(&self) -> ChartResult<()> {
        let positive = [
            ("bar_spacing", self.bar_spacing),
            ("min_bar_spacing", self.min_bar_spacing),
            ("font_size", self.font_size),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ChartError::InvalidConfiguration(format!(
                    "time scale {name} must be finite and > 0"
                )));
            }
        }
        if !self.max_bar_spacing.is_finite() || self.max_bar_spacing < 0.0 {
            return Err(ChartError::InvalidConfiguration(
                "time scale max_bar_spacing must be finite and >= 0".to_owned(),
            ));
        }
        if !self.right_offset.is_finite()
            || self.right_offset_pixels.is_some_and(|px| !px.is_finite())
        {
            return Err(ChartError::InvalidConfiguration(
                "time scale right offset must be finite".to_owned(),
            ));
        }
        Ok(())
    }
}

/// `{bar_spacing, right_offset}` captured when a gesture starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionState {
    pub bar_spacing: f64,
    pub right_offset: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum TimeScaleGesture {
    #[default]
    Idle,
    Scaling {
        start_x: f64,
        snapshot: TransitionState,
    },
    Scrolling {
        start_x: f64,
        snapshot: TransitionState,
    },
}

/// Axis label produced by [`TimeScale::marks`].
#[derive(Debug, Clone, PartialEq)]
pub struct TimeMark {
    pub coord: f64,
    pub label: String,
    pub weight: TickMarkWeight,
    pub need_align_coordinate: bool,
}

/// Logical index to horizontal pixel transform of the shared timeline.
#[derive(Debug, Clone)]
pub struct TimeScale {
    options: TimeScaleOptions,
    behavior: Arc<dyn HorzScaleBehavior>,
    width: f64,
    base_index_or_null: Option<TimePointIndex>,
    right_offset: f64,
    points: Arc<Vec<TimeScalePoint>>,
    bar_spacing: f64,
    gesture: TimeScaleGesture,
    tick_marks: TickMarks,
    visible_range: Validity<Option<LogicalRange>>,
    time_marks: Validity<Vec<TimeMark>>,
}

impl TimeScale {
    #[must_use]
    pub fn new(options: TimeScaleOptions, behavior: Arc<dyn HorzScaleBehavior>) -> Self {
        let mut tick_marks = TickMarks::new();
        tick_marks.set_uniform_distribution(options.uniform_distribution);
        Self {
            width: 0.0,
            base_index_or_null: None,
            right_offset: options.right_offset,
            points: Arc::new(Vec::new()),
            bar_spacing: options.bar_spacing,
            gesture: TimeScaleGesture::Idle,
            tick_marks,
            visible_range: Validity::default(),
            time_marks: Validity::default(),
            behavior,
            options,
        }
    }

    #[must_use]
    pub fn options(&self) -> TimeScaleOptions {
        self.options
    }

    pub fn apply_options(&mut self, options: TimeScaleOptions) -> ChartResult<()> {
        options.validate()?;
        self.options = options;
        self.tick_marks
            .set_uniform_distribution(options.uniform_distribution);
        self.invalidate(InvalidationReason::Options);
        if self.options.fix_left_edge {
            self.do_fix_left_edge();
        }
        if self.options.fix_right_edge {
            self.do_fix_right_edge();
        }
        self.set_bar_spacing(self.options.bar_spacing)?;
        if let Some(pixels) = self.options.right_offset_pixels {
            self.set_right_offset(pixels / self.bar_spacing)?;
        } else {
            self.set_right_offset(self.options.right_offset)?;
        }
        debug!(
            bar_spacing = self.bar_spacing,
            right_offset = self.right_offset,
            "time scale options applied"
        );
        Ok(())
    }

    #[must_use]
    pub fn behavior(&self) -> &Arc<dyn HorzScaleBehavior> {
        &self.behavior
    }

    pub fn set_width(&mut self, new_width: f64) -> ChartResult<()> {
        if !new_width.is_finite() || new_width <= 0.0 {
            return Err(ChartError::InvalidData(
                "time scale width must be finite and > 0".to_owned(),
            ));
        }
        if (self.width - new_width).abs() <= f64::EPSILON {
            return Ok(());
        }

        let previous_visible_range = self.visible_logical_range();
        let old_width = self.width;
        self.width = new_width;
        self.invalidate(InvalidationReason::Width);

        if self.options.lock_visible_time_range_on_resize && old_width > 0.0 {
            self.bar_spacing = self.bar_spacing * new_width / old_width;
        }

        if self.options.fix_left_edge
            && let Some(range) = previous_visible_range
            && range.left() <= 0.0
        {
            let delta = old_width - new_width;
            self.right_offset -= (delta / self.bar_spacing).round() + 1.0;
        }

        self.correct_bar_spacing();
        self.correct_offset();
        Ok(())
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.width
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width == 0.0 || self.points.is_empty() || self.base_index_or_null.is_none()
    }

    #[must_use]
    pub fn has_points(&self) -> bool {
        !self.points.is_empty()
    }

    #[must_use]
    pub fn points(&self) -> &Arc<Vec<TimeScalePoint>> {
        &self.points
    }

    /// Takes the timeline rebuilt by the data layer.
    pub fn update(&mut self, points: Arc<Vec<TimeScalePoint>>, first_changed_point_index: usize) {
        self.tick_marks
            .set_time_scale_points(&points, first_changed_point_index);
        self.points = points;
        self.invalidate(InvalidationReason::Points);
        self.correct_offset();
        trace!(
            points = self.points.len(),
            first_changed_point_index, "time scale points updated"
        );
    }

    pub fn set_base_index(&mut self, base_index: Option<TimePointIndex>) {
        self.base_index_or_null = base_index;
        self.invalidate(InvalidationReason::BaseIndex);
        self.correct_offset();
        self.do_fix_left_edge();
    }

    #[must_use]
    pub fn base_index(&self) -> TimePointIndex {
        self.base_index_or_null.unwrap_or(0)
    }

    #[must_use]
    pub fn right_offset(&self) -> f64 {
        self.right_offset
    }

    pub fn set_right_offset(&mut self, offset: f64) -> ChartResult<()> {
        if !offset.is_finite() {
            return Err(ChartError::InvalidData(
                "time scale right offset must be finite".to_owned(),
            ));
        }
        self.right_offset = offset;
        self.invalidate(InvalidationReason::RightOffset);
        self.correct_offset();
        Ok(())
    }

    /// Right offset, in bars, that would put `x` at the last bar.
    #[must_use]
    pub fn right_offset_for_coordinate(&self, x: f64) -> f64 {
        (self.width - 1.0 - x) / self.bar_spacing
    }

    #[must_use]
    pub fn bar_spacing(&self) -> f64 {
        self.bar_spacing
    }

    pub fn set_bar_spacing(&mut self, new_bar_spacing: f64) -> ChartResult<()> {
        if !new_bar_spacing.is_finite() || new_bar_spacing <= 0.0 {
            return Err(ChartError::InvalidData(
                "time scale bar spacing must be finite and > 0".to_owned(),
            ));
        }
        let old_bar_spacing = self.bar_spacing;
        self.bar_spacing = new_bar_spacing;
        self.correct_bar_spacing();

        if self.options.right_offset_pixels.is_some() && old_bar_spacing > 0.0 {
            self.right_offset = self.right_offset * old_bar_spacing / self.bar_spacing;
        }

        self.invalidate(InvalidationReason::BarSpacing);
        self.correct_offset();
        Ok(())
    }

    pub fn restore_default(&mut self) -> ChartResult<()> {
        self.set_bar_spacing(self.options.bar_spacing)?;
        self.set_right_offset(self.default_right_offset())
    }

    pub fn scroll_to_position(&mut self, position: f64) -> ChartResult<()> {
        self.set_right_offset(position)
    }

    /// Brings the latest bar back to its default place at the right edge.
    pub fn scroll_to_realtime(&mut self) -> ChartResult<()> {
        self.set_right_offset(self.default_right_offset())
    }

    /// Fits `range` into the width; with `apply_default_offset` the configured
    /// right offset is kept on the right side of the range.
    pub fn set_visible_range(
        &mut self,
        range: LogicalRange,
        apply_default_offset: bool,
    ) -> ChartResult<()> {
        if self.width <= 0.0 {
            return Err(ChartError::InvalidData(
                "cannot set visible range before width".to_owned(),
            ));
        }
        let length = range.count();
        if !length.is_finite() || length <= 0.0 {
            return Err(ChartError::InvalidData(
                "visible range must be non-empty".to_owned(),
            ));
        }
        let pixel_offset = if apply_default_offset {
            self.options.right_offset_pixels.unwrap_or(0.0)
        } else {
            0.0
        };
        self.set_bar_spacing((self.width - pixel_offset) / length)?;
        self.right_offset = range.right() - self.base_index() as f64;
        if apply_default_offset {
            self.right_offset = if pixel_offset > 0.0 {
                pixel_offset / self.bar_spacing
            } else {
                self.options.right_offset
            };
        }
        self.invalidate(InvalidationReason::RightOffset);
        self.correct_offset();
        Ok(())
    }

    pub fn set_logical_range(&mut self, range: LogicalRange) -> ChartResult<()> {
        self.set_visible_range(range, false)
    }

    pub fn fit_content(&mut self) -> ChartResult<()> {
        let (Some(first), Some(last)) = (self.first_index(), self.last_index()) else {
            return Ok(());
        };
        let right_offset_bars = if self.options.right_offset_pixels.is_none() {
            self.options.right_offset
        } else {
            0.0
        };
        self.set_visible_range(
            LogicalRange::new(first as f64, last as f64 + right_offset_bars),
            true,
        )
    }

    #[must_use]
    pub fn index_to_coordinate(&self, index: TimePointIndex) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let delta_from_right = self.base_index() as f64 + self.right_offset - index as f64;
        self.width - (delta_from_right + 0.5) * self.bar_spacing - 1.0
    }

    /// Writes `x` of `points[range]` (all points when `None`).
    pub fn indexes_to_coordinates<P: TimedCoordinate>(
        &self,
        points: &mut [P],
        range: Option<Range<usize>>,
    ) {
        let range = range.unwrap_or(0..points.len());
        let end = range.end.min(points.len());
        let start = range.start.min(end);
        let base_index = self.base_index() as f64;
        for point in &mut points[start..end] {
            let delta_from_right = base_index + self.right_offset - point.time_index() as f64;
            point.set_x(self.width - (delta_from_right + 0.5) * self.bar_spacing - 1.0);
        }
    }

    pub fn coordinate_to_index(&self, x: f64) -> ChartResult<TimePointIndex> {
        Ok(self.coordinate_to_float_index(x)?.ceil() as TimePointIndex)
    }

    pub fn coordinate_to_float_index(&self, x: f64) -> ChartResult<f64> {
        if !x.is_finite() {
            return Err(ChartError::InvalidData(
                "coordinate must be finite".to_owned(),
            ));
        }
        if self.bar_spacing <= 0.0 {
            return Err(ChartError::InvalidData(
                "bar spacing must be > 0".to_owned(),
            ));
        }
        let delta_from_right = (self.width - 1.0 - x) / self.bar_spacing;
        let index = self.base_index() as f64 + self.right_offset - delta_from_right;
        Ok((index * 1_000_000.0).round() / 1_000_000.0)
    }

    #[must_use]
    pub fn index_to_time(&self, index: TimePointIndex) -> Option<&TimeScalePoint> {
        self.points.get(usize::try_from(index).ok()?)
    }

    /// Exact index of `time`, or with `find_nearest` the first point at or
    /// after it (the last point when `time` is past the end).
    pub fn time_to_index(
        &self,
        time: &Time,
        find_nearest: bool,
    ) -> ChartResult<Option<TimePointIndex>> {
        let key = self.behavior.convert_horz_item(time)?.key();
        let Some(last) = self.points.last() else {
            return Ok(None);
        };
        if key > last.time.key() {
            return Ok(find_nearest.then(|| self.points.len() as TimePointIndex - 1));
        }
        let index = self.points.partition_point(|point| point.time.key() < key);
        let exact = self.points[index].time.key() == key;
        Ok((exact || find_nearest).then_some(index as TimePointIndex))
    }

    pub fn zoom(&mut self, zoom_point: f64, scale: f64) -> ChartResult<()> {
        if self.is_empty() || !scale.is_finite() || scale == 0.0 {
            return Ok(());
        }
        let zoom_point = zoom_point.max(1.0).min(self.width);
        let float_index_at_zoom_point = self.coordinate_to_float_index(zoom_point)?;
        let bar_spacing = self.bar_spacing;
        self.set_bar_spacing(bar_spacing + scale * (bar_spacing / 10.0))?;
        if !self.options.right_bar_stays_on_scroll {
            let corrected = self.right_offset
                + (float_index_at_zoom_point - self.coordinate_to_float_index(zoom_point)?);
            self.set_right_offset(corrected)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn gesture(&self) -> TimeScaleGesture {
        self.gesture
    }

    pub fn start_scale(&mut self, x: f64) {
        match self.gesture {
            TimeScaleGesture::Scaling { .. } => return,
            TimeScaleGesture::Scrolling { .. } => self.end_scroll(),
            TimeScaleGesture::Idle => {}
        }
        if self.is_empty() {
            return;
        }
        self.gesture = TimeScaleGesture::Scaling {
            start_x: x,
            snapshot: self.transition_state(),
        };
        trace!(x, "time scale scale started");
    }

    pub fn scale_to(&mut self, x: f64) -> ChartResult<()> {
        let TimeScaleGesture::Scaling { start_x, snapshot } = self.gesture else {
            return Ok(());
        };
        let start_length_from_right = (self.width - x).max(0.0).min(self.width);
        let current_length_from_right = (self.width - start_x).max(0.0).min(self.width);
        if start_length_from_right == 0.0 || current_length_from_right == 0.0 {
            return Ok(());
        }
        self.set_bar_spacing(
            snapshot.bar_spacing * start_length_from_right / current_length_from_right,
        )
    }

    pub fn end_scale(&mut self) {
        if let TimeScaleGesture::Scaling { .. } = self.gesture {
            self.gesture = TimeScaleGesture::Idle;
            trace!("time scale scale ended");
        }
    }

    pub fn start_scroll(&mut self, x: f64) {
        match self.gesture {
            TimeScaleGesture::Scrolling { .. } => return,
            TimeScaleGesture::Scaling { .. } => self.end_scale(),
            TimeScaleGesture::Idle => {}
        }
        if self.is_empty() {
            return;
        }
        self.gesture = TimeScaleGesture::Scrolling {
            start_x: x,
            snapshot: self.transition_state(),
        };
        trace!(x, "time scale scroll started");
    }

    pub fn scroll_to(&mut self, x: f64) {
        let TimeScaleGesture::Scrolling { start_x, snapshot } = self.gesture else {
            return;
        };
        let shift_in_logical = (start_x - x) / self.bar_spacing;
        self.right_offset = snapshot.right_offset + shift_in_logical;
        self.invalidate(InvalidationReason::Gesture);
        self.correct_offset();
    }

    pub fn end_scroll(&mut self) {
        if let TimeScaleGesture::Scrolling { .. } = self.gesture {
            self.gesture = TimeScaleGesture::Idle;
            trace!("time scale scroll ended");
        }
    }

    pub fn visible_logical_range(&mut self) -> Option<LogicalRange> {
        self.update_visible_range();
        self.visible_range.clean().copied().flatten()
    }

    pub fn visible_strict_range(&mut self) -> Option<StrictRange> {
        self.visible_logical_range().map(|range| {
            StrictRange::new(
                range.left().floor() as TimePointIndex,
                range.right().ceil() as TimePointIndex,
            )
        })
    }

    pub fn visible_time_range(&mut self) -> Option<VisibleTimeRange> {
        let visible = self.visible_strict_range()?;
        let first = self.first_index()?;
        let last = self.last_index()?;
        let from = self.index_to_time(visible.left().max(first))?.clone();
        let to = self.index_to_time(visible.right().min(last))?.clone();
        Some(VisibleTimeRange { from, to })
    }

    #[must_use]
    pub fn first_index(&self) -> Option<TimePointIndex> {
        (!self.points.is_empty()).then_some(0)
    }

    #[must_use]
    pub fn last_index(&self) -> Option<TimePointIndex> {
        self.points
            .len()
            .checked_sub(1)
            .map(|last| last as TimePointIndex)
    }

    /// Decluttered axis labels for the current view, rebuilt only after a
    /// change of points, width, spacing or offset.
    pub fn marks(&mut self) -> Option<&[TimeMark]> {
        if self.is_empty() {
            return None;
        }
        if let Some(reason) = self.time_marks.dirty_reason() {
            let marks = self.build_time_marks();
            trace!(?reason, marks = marks.len(), "time marks rebuilt");
            self.time_marks.set(marks);
        }
        self.time_marks.clean().map(Vec::as_slice)
    }

    fn build_time_marks(&mut self) -> Vec<TimeMark> {
        let spacing = self.bar_spacing;
        let pixels_per_8_characters = (self.options.font_size + 4.0) * 5.0;
        let characters = self
            .options
            .tick_mark_max_character_length
            .unwrap_or(DEFAULT_TICK_MARK_CHARACTERS);
        let max_label_width = (pixels_per_8_characters / f64::from(DEFAULT_TICK_MARK_CHARACTERS)
            * f64::from(characters))
        .round();
        let index_per_label = (max_label_width / spacing).round() as TimePointIndex;

        let (Some(visible), Some(first_index), Some(last_index)) = (
            self.visible_strict_range(),
            self.first_index(),
            self.last_index(),
        ) else {
            return Vec::new();
        };
        let first_bar = visible.left() - index_per_label;
        let last_bar = visible.right() + index_per_label;
        let earliest_index_of_second_label = first_index + index_per_label;
        let index_of_second_last_label = last_index - index_per_label;

        let all_disabled = self.options.scaling_and_scrolling_disabled;
        let left_edge_fixed = self.options.fix_left_edge || all_disabled;
        let right_edge_fixed = self.options.fix_right_edge || all_disabled;
        let spacious = spacing > max_label_width / 2.0 && !all_disabled;

        let candidates: Vec<_> = self
            .tick_marks
            .build(spacing, max_label_width)
            .iter()
            .filter(|mark| first_bar <= mark.index && mark.index <= last_bar)
            .cloned()
            .collect();

        candidates
            .into_iter()
            .map(|mark| TimeMark {
                coord: self.index_to_coordinate(mark.index),
                label: self.behavior.format_tick_mark(&mark),
                weight: mark.weight,
                // labels next to a fixed edge may need pulling inside the pane
                need_align_coordinate: !spacious
                    && ((left_edge_fixed && mark.index <= earliest_index_of_second_label)
                        || (right_edge_fixed && mark.index >= index_of_second_last_label)),
            })
            .collect()
    }

    fn default_right_offset(&self) -> f64 {
        match self.options.right_offset_pixels {
            Some(pixels) => pixels / self.bar_spacing,
            None => self.options.right_offset,
        }
    }

    fn transition_state(&self) -> TransitionState {
        TransitionState {
            bar_spacing: self.bar_spacing,
            right_offset: self.right_offset,
        }
    }

    fn invalidate(&mut self, reason: InvalidationReason) {
        self.visible_range.invalidate(reason);
        self.time_marks.invalidate(reason);
    }

    fn update_visible_range(&mut self) {
        if !self.visible_range.is_dirty() {
            return;
        }
        let range = if self.is_empty() {
            None
        } else {
            let new_bars_length = self.width / self.bar_spacing;
            let right_border = self.right_offset + self.base_index() as f64;
            Some(LogicalRange::new(
                right_border - new_bars_length + 1.0,
                right_border,
            ))
        };
        self.visible_range.set(range);
    }

    fn correct_bar_spacing(&mut self) {
        let corrected = self
            .bar_spacing
            .max(self.min_bar_spacing())
            .min(self.max_bar_spacing());
        if (corrected - self.bar_spacing).abs() > f64::EPSILON {
            self.bar_spacing = corrected;
            self.invalidate(InvalidationReason::BarSpacing);
        }
    }

    fn min_bar_spacing(&self) -> f64 {
        if self.options.fix_left_edge && self.options.fix_right_edge && !self.points.is_empty() {
            return self.width / self.points.len() as f64;
        }
        self.options.min_bar_spacing
    }

    fn max_bar_spacing(&self) -> f64 {
        if self.options.max_bar_spacing > 0.0 {
            self.options.max_bar_spacing
        } else {
            self.width * 0.5
        }
    }

    fn min_right_offset(&self) -> Option<f64> {
        let first = self.first_index()?;
        let base = self.base_index_or_null?;
        let bars_estimation = if self.options.fix_left_edge {
            self.width / self.bar_spacing
        } else {
            MIN_VISIBLE_BARS_COUNT.min(self.points.len() as f64)
        };
        Some(first as f64 - base as f64 - 1.0 + bars_estimation)
    }

    fn max_right_offset(&self) -> f64 {
        if self.options.fix_right_edge {
            0.0
        } else {
            self.width / self.bar_spacing - MIN_VISIBLE_BARS_COUNT.min(self.points.len() as f64)
        }
    }

    fn correct_offset(&mut self) {
        if let Some(min_right_offset) = self.min_right_offset()
            && self.right_offset < min_right_offset
        {
            self.right_offset = min_right_offset;
            self.invalidate(InvalidationReason::RightOffset);
        }
        let max_right_offset = self.max_right_offset();
        if self.right_offset > max_right_offset {
            self.right_offset = max_right_offset;
            self.invalidate(InvalidationReason::RightOffset);
        }
    }

    fn do_fix_left_edge(&mut self) {
        if !self.options.fix_left_edge {
            return;
        }
        let Some(first) = self.first_index() else {
            return;
        };
        let Some(visible) = self.visible_strict_range() else {
            return;
        };
        let delta = visible.left() - first;
        if delta < 0 {
            self.right_offset -= delta as f64 + 1.0;
            self.invalidate(InvalidationReason::RightOffset);
            self.correct_offset();
        }
        self.correct_bar_spacing();
    }

    fn do_fix_right_edge(&mut self) {
        self.correct_offset();
        self.correct_bar_spacing();
    }
}
