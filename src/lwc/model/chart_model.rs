use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::conflation::ConflationOptions;
use crate::core::{
    CustomSeriesHooks, HorzScaleBehavior, PlotRow, SeriesDataItem, SeriesId, SeriesKind,
    TimeHorzScaleBehavior, TimePointIndex,
};
use crate::error::{ChartError, ChartResult};

use super::coordinates::{BarPoint, LinePoint};
use super::data_layer::{DataLayer, DataUpdateResponse, SeriesDescriptor, TimeScaleChanges};
use super::pane::{Pane, PaneId};
use super::price_scale::{
    AutoScaleSource, PriceRange, PriceScale, PriceScaleOptions, PriceScaleStateChange,
};
use super::series::{Series, SeriesOptions};
use super::time_scale::{LogicalRange, StrictRange, TimeScale, TimeScaleOptions};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartModelOptions {
    pub time_scale: TimeScaleOptions,
    pub left_price_scale: PriceScaleOptions,
    pub right_price_scale: PriceScaleOptions,
    /// Options for overlay scales created on demand by series.
    pub overlay_price_scale: PriceScaleOptions,
    pub conflation: ConflationOptions,
}

/// Chart state without drawing: the shared timeline, the time scale, panes
/// with their price scales, and the attached series.
///
/// Every data or viewport change re-derives conflation factors and marks
/// autoscaled price scales dirty; price reads validate them on demand.
#[derive(Debug)]
pub struct ChartModel {
    options: ChartModelOptions,
    data_layer: DataLayer,
    time_scale: TimeScale,
    panes: Vec<Pane>,
    series: IndexMap<SeriesId, Series>,
    next_series_id: u32,
    next_pane_id: u32,
}

impl ChartModel {
    pub fn new(
        options: ChartModelOptions,
        behavior: Arc<dyn HorzScaleBehavior>,
    ) -> ChartResult<Self> {
        options.time_scale.validate()?;
        let conflation = options.conflation.clone().normalized()?;
        let pane = Pane::new(
            PaneId::new(0),
            options.left_price_scale,
            options.right_price_scale,
        )?;
        Ok(Self {
            time_scale: TimeScale::new(options.time_scale, Arc::clone(&behavior)),
            data_layer: DataLayer::new(behavior),
            panes: vec![pane],
            series: IndexMap::new(),
            next_series_id: 0,
            next_pane_id: 1,
            options: ChartModelOptions {
                conflation,
                ..options
            },
        })
    }

    /// Model over calendar time with default options.
    pub fn with_time_axis() -> ChartResult<Self> {
        Self::new(
            ChartModelOptions::default(),
            Arc::new(TimeHorzScaleBehavior::new()),
        )
    }

    #[must_use]
    pub fn options(&self) -> &ChartModelOptions {
        &self.options
    }

    #[must_use]
    pub fn data_layer(&self) -> &DataLayer {
        &self.data_layer
    }

    #[must_use]
    pub fn time_scale(&self) -> &TimeScale {
        &self.time_scale
    }

    #[must_use]
    pub fn panes(&self) -> &[Pane] {
        &self.panes
    }

    #[must_use]
    pub fn pane(&self, pane: PaneId) -> Option<&Pane> {
        self.panes.iter().find(|candidate| candidate.id() == pane)
    }

    #[must_use]
    pub fn series(&self, series: SeriesId) -> Option<&Series> {
        self.series.get(&series)
    }

    pub fn series_ids(&self) -> impl Iterator<Item = SeriesId> + '_ {
        self.series.keys().copied()
    }

    pub fn set_width(&mut self, width: f64) -> ChartResult<()> {
        self.time_scale.set_width(width)?;
        self.after_viewport_change()
    }

    pub fn set_pane_height(&mut self, pane: PaneId, height: f64) -> ChartResult<()> {
        if !height.is_finite() || height < 0.0 {
            return Err(ChartError::InvalidData(
                "pane height must be finite and >= 0".to_owned(),
            ));
        }
        self.pane_mut(pane)?.set_height(height);
        self.recalculate_all_price_scales();
        Ok(())
    }

    pub fn add_pane(&mut self) -> ChartResult<PaneId> {
        let id = PaneId::new(self.next_pane_id);
        self.panes.push(Pane::new(
            id,
            self.options.left_price_scale,
            self.options.right_price_scale,
        )?);
        self.next_pane_id += 1;
        Ok(id)
    }

    pub fn apply_time_scale_options(&mut self, options: TimeScaleOptions) -> ChartResult<()> {
        self.time_scale.apply_options(options)?;
        self.options.time_scale = options;
        self.after_viewport_change()
    }

    /// Replaces the conflation settings; a custom series without reducer
    /// rejects the whole change.
    pub fn apply_conflation_options(&mut self, options: ConflationOptions) -> ChartResult<()> {
        let options = options.normalized()?;
        if options.enabled {
            for series in self.series.values() {
                if series.kind() == SeriesKind::Custom
                    && series.options().conflation_enabled
                    && series
                        .custom_hooks()
                        .is_none_or(|hooks| hooks.conflation_reducer.is_none())
                {
                    return Err(ChartError::MissingConflationReducer);
                }
            }
        }
        for series in self.series.values_mut() {
            series.set_conflation_enabled(options.enabled)?;
        }
        debug!(enabled = options.enabled, rules = options.rules.len(), "conflation options applied");
        self.options.conflation = options;
        self.after_viewport_change()
    }

    pub fn apply_price_scale_options(
        &mut self,
        pane: PaneId,
        price_scale_id: &str,
        options: PriceScaleOptions,
    ) -> ChartResult<()> {
        self.price_scale_mut(pane, price_scale_id)?
            .apply_options(options)?;
        self.recalculate_all_price_scales();
        Ok(())
    }

    pub fn add_series(&mut self, kind: SeriesKind, options: SeriesOptions) -> ChartResult<SeriesId> {
        self.insert_series(kind, options, None)
    }

    pub fn add_custom_series(
        &mut self,
        options: SeriesOptions,
        hooks: CustomSeriesHooks,
    ) -> ChartResult<SeriesId> {
        self.insert_series(SeriesKind::Custom, options, Some(hooks))
    }

    pub fn remove_series(&mut self, series: SeriesId) -> ChartResult<()> {
        let removed = self
            .series
            .shift_remove(&series)
            .ok_or(ChartError::UnknownSeries(series))?;
        if let Ok(pane) = self.pane_mut(removed.options().pane) {
            pane.remove_source(series);
        }
        let response = self.data_layer.remove_series(series);
        debug!(series = series.raw(), "series removed from chart");
        self.apply_update(response)
    }

    pub fn set_series_data(
        &mut self,
        series: SeriesId,
        items: &[SeriesDataItem],
    ) -> ChartResult<()> {
        let target = self.series.get(&series).ok_or(ChartError::UnknownSeries(series))?;
        let descriptor = descriptor(target);
        let response = self.data_layer.set_series_data(descriptor, items)?;
        self.apply_update(response)
    }

    /// Applies one streaming update; `historical` backfills are refused while
    /// the series is conflated.
    pub fn update_series_data(
        &mut self,
        series: SeriesId,
        item: &SeriesDataItem,
        historical: bool,
    ) -> ChartResult<()> {
        let target = self.series.get(&series).ok_or(ChartError::UnknownSeries(series))?;
        if historical && target.is_conflation_active() {
            return Err(ChartError::HistoricalUpdateWithConflation);
        }
        let descriptor = descriptor(target);
        let response = self
            .data_layer
            .update_series_data(descriptor, item, historical)?;
        self.apply_update(response)
    }

    pub fn zoom(&mut self, zoom_point: f64, scale: f64) -> ChartResult<()> {
        self.time_scale.zoom(zoom_point, scale)?;
        self.after_viewport_change()
    }

    pub fn start_scale_time(&mut self, x: f64) {
        self.time_scale.start_scale(x);
    }

    pub fn scale_time_to(&mut self, x: f64) -> ChartResult<()> {
        self.time_scale.scale_to(x)?;
        self.after_viewport_change()
    }

    pub fn end_scale_time(&mut self) {
        self.time_scale.end_scale();
    }

    pub fn start_scroll_time(&mut self, x: f64) {
        self.time_scale.start_scroll(x);
    }

    pub fn scroll_time_to(&mut self, x: f64) -> ChartResult<()> {
        self.time_scale.scroll_to(x);
        self.after_viewport_change()
    }

    pub fn end_scroll_time(&mut self) {
        self.time_scale.end_scroll();
    }

    pub fn set_bar_spacing(&mut self, bar_spacing: f64) -> ChartResult<()> {
        self.time_scale.set_bar_spacing(bar_spacing)?;
        self.after_viewport_change()
    }

    pub fn set_right_offset(&mut self, right_offset: f64) -> ChartResult<()> {
        self.time_scale.set_right_offset(right_offset)?;
        self.after_viewport_change()
    }

    pub fn set_visible_logical_range(&mut self, range: LogicalRange) -> ChartResult<()> {
        self.time_scale.set_logical_range(range)?;
        self.after_viewport_change()
    }

    pub fn fit_content(&mut self) -> ChartResult<()> {
        self.time_scale.fit_content()?;
        self.after_viewport_change()
    }

    pub fn reset_time_scale(&mut self) -> ChartResult<()> {
        self.time_scale.restore_default()?;
        self.after_viewport_change()
    }

    pub fn scroll_to_realtime(&mut self) -> ChartResult<()> {
        self.time_scale.scroll_to_realtime()?;
        self.after_viewport_change()
    }

    #[must_use]
    pub fn visible_strict_range(&mut self) -> Option<StrictRange> {
        self.time_scale.visible_strict_range()
    }

    #[must_use]
    pub fn index_to_coordinate(&self, index: TimePointIndex) -> f64 {
        self.time_scale.index_to_coordinate(index)
    }

    pub fn coordinate_to_index(&self, x: f64) -> ChartResult<TimePointIndex> {
        self.time_scale.coordinate_to_index(x)
    }

    pub fn set_price_scale_mode(
        &mut self,
        pane: PaneId,
        price_scale_id: &str,
        change: PriceScaleStateChange,
    ) -> ChartResult<()> {
        self.price_scale_mut(pane, price_scale_id)?.set_mode(change);
        self.recalculate_all_price_scales();
        Ok(())
    }

    pub fn start_scale_price(&mut self, pane: PaneId, price_scale_id: &str, y: f64) -> ChartResult<()> {
        self.validate_price_scale(pane, price_scale_id)?;
        self.price_scale_mut(pane, price_scale_id)?.start_scale(y);
        Ok(())
    }

    pub fn scale_price_to(&mut self, pane: PaneId, price_scale_id: &str, y: f64) -> ChartResult<()> {
        self.price_scale_mut(pane, price_scale_id)?.scale_to(y);
        Ok(())
    }

    pub fn end_scale_price(&mut self, pane: PaneId, price_scale_id: &str) -> ChartResult<()> {
        self.price_scale_mut(pane, price_scale_id)?.end_scale();
        Ok(())
    }

    pub fn start_scroll_price(&mut self, pane: PaneId, price_scale_id: &str, y: f64) -> ChartResult<()> {
        self.validate_price_scale(pane, price_scale_id)?;
        self.price_scale_mut(pane, price_scale_id)?.start_scroll(y);
        Ok(())
    }

    pub fn scroll_price_to(&mut self, pane: PaneId, price_scale_id: &str, y: f64) -> ChartResult<()> {
        self.price_scale_mut(pane, price_scale_id)?.scroll_to(y);
        Ok(())
    }

    pub fn end_scroll_price(&mut self, pane: PaneId, price_scale_id: &str) -> ChartResult<()> {
        self.price_scale_mut(pane, price_scale_id)?.end_scroll();
        Ok(())
    }

    /// Price range of a scale after any pending autoscale pass.
    pub fn price_range(&mut self, pane: PaneId, price_scale_id: &str) -> ChartResult<Option<PriceRange>> {
        Ok(self.validated_price_scale(pane, price_scale_id)?.price_range())
    }

    /// Validated scale of a pane.
    pub fn price_scale(&mut self, pane: PaneId, price_scale_id: &str) -> ChartResult<&PriceScale> {
        self.validated_price_scale(pane, price_scale_id)
    }

    /// `None` while the series has no value in the visible range.
    pub fn price_to_coordinate(&mut self, series: SeriesId, price: f64) -> ChartResult<Option<f64>> {
        let Some((scale, base_value)) = self.series_scale_and_base(series)? else {
            return Ok(None);
        };
        Ok(Some(scale.price_to_coordinate(price, base_value)))
    }

    pub fn coordinate_to_price(&mut self, series: SeriesId, y: f64) -> ChartResult<Option<f64>> {
        let Some((scale, base_value)) = self.series_scale_and_base(series)? else {
            return Ok(None);
        };
        scale.coordinate_to_price(y, base_value).map(Some)
    }

    /// Visible rows of a single-value series with `x`/`y` filled in.
    pub fn visible_line_points(&mut self, series: SeriesId) -> ChartResult<Vec<LinePoint>> {
        let mut points: Vec<LinePoint> = self.visible_rows(series, |row| LinePoint::from(row))?;
        self.time_scale.indexes_to_coordinates(&mut points, None);
        if let Some((scale, base_value)) = self.series_scale_and_base(series)? {
            scale.points_to_coordinates(&mut points, base_value, None);
        }
        Ok(points)
    }

    /// Visible rows of an OHLC series with `x` and the four `y`s filled in.
    pub fn visible_bar_points(&mut self, series: SeriesId) -> ChartResult<Vec<BarPoint>> {
        let mut bars: Vec<BarPoint> = self.visible_rows(series, |row| BarPoint::from(row))?;
        self.time_scale.indexes_to_coordinates(&mut bars, None);
        if let Some((scale, base_value)) = self.series_scale_and_base(series)? {
            scale.bar_prices_to_coordinates(&mut bars, base_value, None);
        }
        Ok(bars)
    }

    fn insert_series(
        &mut self,
        kind: SeriesKind,
        options: SeriesOptions,
        hooks: Option<CustomSeriesHooks>,
    ) -> ChartResult<SeriesId> {
        if !options.min_move.is_finite() || options.min_move <= 0.0 {
            return Err(ChartError::InvalidConfiguration(
                "series min_move must be finite and > 0".to_owned(),
            ));
        }
        let id = SeriesId::new(self.next_series_id);
        let mut series = Series::new(id, kind, options.clone(), hooks);
        series.set_conflation_enabled(self.options.conflation.enabled)?;
        series.set_conflation_factor(self.current_conflation_factor())?;

        let overlay_options = self.options.overlay_price_scale;
        self.pane_mut(options.pane)?
            .ensure_price_scale(&options.price_scale_id, overlay_options)?
            .add_source(id);
        self.series.insert(id, series);
        self.next_series_id += 1;
        debug!(series = id.raw(), ?kind, scale = %options.price_scale_id, "series added");
        Ok(id)
    }

    /// Pushes a data layer diff to the time scale and every series.
    ///
    /// The data layer has already changed, so every series receives its rows
    /// even if an earlier one fails to conflate. A failing series shows its
    /// raw rows and the first error is returned.
    fn apply_update(&mut self, response: DataUpdateResponse) -> ChartResult<()> {
        self.update_time_scale(response.time_scale);
        let mut first_error = None;
        for (id, changes) in response.series {
            let Some(series) = self.series.get_mut(&id) else {
                continue;
            };
            if let Err(err) = series.set_data(changes.data, changes.info) {
                warn!(series = id.raw(), %err, "series refresh failed, showing raw rows");
                first_error.get_or_insert(err);
            }
        }
        let viewport = self.after_viewport_change();
        match first_error {
            Some(err) => Err(err),
            None => viewport,
        }
    }

    /// Moves the timeline to the new points and base index.
    ///
    /// Bars appended on the right keep the viewport anchored unless the last
    /// bar was visible and shifting on new bars is enabled.
    fn update_time_scale(&mut self, changes: TimeScaleChanges) {
        let old_first_key = self.time_scale.index_to_time(0).map(|point| point.time.key());
        if let Some(points) = changes.points {
            self.time_scale
                .update(points, changes.first_changed_point_index.unwrap_or(0));
        }
        let new_first_key = self.time_scale.index_to_time(0).map(|point| point.time.key());
        let current_base_index = self.time_scale.base_index();
        let visible_range = self.time_scale.visible_logical_range();

        if let (Some(range), Some(old_first), Some(new_first)) =
            (visible_range, old_first_key, new_first_key)
        {
            let options = self.time_scale.options();
            let base = current_base_index as f64;
            let last_bar_visible = range.left() <= base && base <= range.right();
            let left_bar_shifted_left = old_first > new_first;
            let points_added = changes
                .base_index
                .is_some_and(|new_base| new_base > current_base_index);
            let added_to_the_right = points_added && !left_bar_shifted_left;
            let replaced_whitespace = changes.first_changed_point_index.is_none();
            let shift_on_new_bar = last_bar_visible
                && (!replaced_whitespace || options.allow_shift_visible_range_on_whitespace_replacement)
                && options.shift_visible_range_on_new_bar;

            if added_to_the_right
                && !shift_on_new_bar
                && let Some(new_base) = changes.base_index
            {
                let compensation = (new_base - current_base_index) as f64;
                let offset = self.time_scale.right_offset() - compensation;
                if self.time_scale.set_right_offset(offset).is_err() {
                    debug!(offset, "right offset compensation skipped");
                }
            }
        }
        self.time_scale.set_base_index(changes.base_index);
    }

    fn current_conflation_factor(&self) -> usize {
        self.options
            .conflation
            .factor_for_bar_spacing(self.time_scale.bar_spacing())
    }

    fn after_viewport_change(&mut self) -> ChartResult<()> {
        let factor = self.current_conflation_factor();
        let mut first_error = None;
        for series in self.series.values_mut() {
            if let Err(err) = series.set_conflation_factor(factor) {
                warn!(series = series.id().raw(), factor, %err, "conflation factor change failed");
                first_error.get_or_insert(err);
            }
        }
        self.recalculate_all_price_scales();
        first_error.map_or(Ok(()), Err)
    }

    fn recalculate_all_price_scales(&mut self) {
        if self.time_scale.is_empty() {
            return;
        }
        let Some(visible_bars) = self.time_scale.visible_strict_range() else {
            return;
        };
        for pane in &mut self.panes {
            for scale in pane.price_scales_mut() {
                if scale.is_auto_scale() && !scale.source_ids().is_empty() {
                    scale.recalculate_price_range(visible_bars);
                }
            }
        }
    }

    fn pane_mut(&mut self, pane: PaneId) -> ChartResult<&mut Pane> {
        self.panes
            .iter_mut()
            .find(|candidate| candidate.id() == pane)
            .ok_or_else(|| ChartError::InvalidConfiguration(format!("unknown pane {}", pane.raw())))
    }

    fn price_scale_mut(&mut self, pane: PaneId, price_scale_id: &str) -> ChartResult<&mut PriceScale> {
        self.pane_mut(pane)?
            .price_scale_mut(price_scale_id)
            .ok_or_else(|| ChartError::UnknownPriceScale(price_scale_id.to_owned()))
    }

    fn validate_price_scale(&mut self, pane: PaneId, price_scale_id: &str) -> ChartResult<()> {
        let series = &mut self.series;
        let scale = self
            .panes
            .iter_mut()
            .find(|candidate| candidate.id() == pane)
            .ok_or_else(|| ChartError::InvalidConfiguration(format!("unknown pane {}", pane.raw())))?
            .price_scale_mut(price_scale_id)
            .ok_or_else(|| ChartError::UnknownPriceScale(price_scale_id.to_owned()))?;
        if !scale.needs_validation() {
            return Ok(());
        }
        let source_ids = scale.source_ids().to_vec();
        let mut sources: SmallVec<[&mut dyn AutoScaleSource; 4]> = series
            .values_mut()
            .filter(|candidate| source_ids.contains(&candidate.id()))
            .map(|candidate| candidate as &mut dyn AutoScaleSource)
            .collect();
        scale.make_sure_valid(&mut sources);
        Ok(())
    }

    fn validated_price_scale(&mut self, pane: PaneId, price_scale_id: &str) -> ChartResult<&PriceScale> {
        self.validate_price_scale(pane, price_scale_id)?;
        self.pane(pane)
            .and_then(|candidate| candidate.price_scale(price_scale_id))
            .ok_or_else(|| ChartError::UnknownPriceScale(price_scale_id.to_owned()))
    }

    /// The series' validated scale and its percentage base value.
    fn series_scale_and_base(&mut self, series: SeriesId) -> ChartResult<Option<(&PriceScale, f64)>> {
        let target = self.series.get(&series).ok_or(ChartError::UnknownSeries(series))?;
        let pane = target.options().pane;
        let scale_id = target.options().price_scale_id.clone();
        let Some(visible_bars) = self.time_scale.visible_strict_range() else {
            return Ok(None);
        };
        let Some(base_value) = self
            .series
            .get(&series)
            .and_then(|target| target.first_value(visible_bars))
        else {
            return Ok(None);
        };
        let scale = self.validated_price_scale(pane, &scale_id)?;
        if scale.is_empty() {
            return Ok(None);
        }
        Ok(Some((scale, base_value)))
    }

    fn visible_rows<P>(
        &mut self,
        series: SeriesId,
        convert: impl Fn(&PlotRow) -> P,
    ) -> ChartResult<Vec<P>> {
        let Some(visible_bars) = self.time_scale.visible_strict_range() else {
            return Ok(Vec::new());
        };
        let target = self.series.get(&series).ok_or(ChartError::UnknownSeries(series))?;
        let rows = target.visible_data().rows();
        let from = rows.partition_point(|row| row.index < visible_bars.left());
        let to = rows.partition_point(|row| row.index <= visible_bars.right());
        Ok(rows[from..to.max(from)].iter().map(convert).collect())
    }
}

fn descriptor(series: &Series) -> SeriesDescriptor<'_> {
    let descriptor = SeriesDescriptor::new(series.id(), series.kind());
    match series.custom_hooks() {
        Some(hooks) => descriptor.with_custom_hooks(hooks),
        None => descriptor,
    }
}

#[cfg(test)]
mod tests {
    use super::{ChartModel, ChartModelOptions};
    use crate::conflation::ConflationOptions;
    use crate::core::{OhlcData, SeriesDataItem, SeriesKind, SingleValueData};
    use crate::error::ChartError;
    use crate::lwc::model::pane::PaneId;
    use crate::lwc::model::series::SeriesOptions;

    fn model() -> ChartModel {
        let mut model = ChartModel::with_time_axis().expect("model");
        model.set_width(600.0).expect("width");
        model.set_pane_height(PaneId::new(0), 400.0).expect("height");
        model
    }

    fn line_items(count: i64) -> Vec<SeriesDataItem> {
        (0..count)
            .map(|i| SingleValueData::new(1_000 + i * 60, 10.0 + i as f64).into())
            .collect()
    }

    #[test]
    fn appended_bar_shifts_the_viewport_when_last_bar_visible() {
        let mut model = model();
        let series = model
            .add_series(SeriesKind::Line, SeriesOptions::default())
            .expect("series");
        model.set_series_data(series, &line_items(3)).expect("data");
        assert_eq!(model.time_scale().base_index(), 2);
        let offset = model.time_scale().right_offset();

        model
            .update_series_data(series, &SingleValueData::new(1_180, 20.0).into(), false)
            .expect("update");
        assert_eq!(model.time_scale().base_index(), 3);
        assert_eq!(model.time_scale().right_offset(), offset);
    }

    #[test]
    fn appended_bar_keeps_viewport_when_shifting_is_off() {
        let mut model = model();
        let mut options = model.options().time_scale;
        options.shift_visible_range_on_new_bar = false;
        model.apply_time_scale_options(options).expect("options");
        let series = model
            .add_series(SeriesKind::Line, SeriesOptions::default())
            .expect("series");
        model.set_series_data(series, &line_items(3)).expect("data");
        let offset = model.time_scale().right_offset();

        model
            .update_series_data(series, &SingleValueData::new(1_180, 20.0).into(), false)
            .expect("update");
        assert_eq!(model.time_scale().right_offset(), offset - 1.0);
    }

    #[test]
    fn autoscale_follows_visible_data() {
        let mut model = model();
        let series = model
            .add_series(SeriesKind::Line, SeriesOptions::default())
            .expect("series");
        model.set_series_data(series, &line_items(5)).expect("data");
        let range = model
            .price_range(PaneId::new(0), "right")
            .expect("scale")
            .expect("range");
        assert_eq!(range.min(), 10.0);
        assert_eq!(range.max(), 14.0);
        let y_low = model.price_to_coordinate(series, 10.0).expect("y").expect("visible");
        let y_high = model.price_to_coordinate(series, 14.0).expect("y").expect("visible");
        assert!(y_high < y_low);
    }

    #[test]
    fn historical_updates_are_refused_while_conflated() {
        let mut model = model();
        model
            .apply_conflation_options(ConflationOptions::enabled())
            .expect("conflation");
        let series = model
            .add_series(SeriesKind::Candlestick, SeriesOptions::default())
            .expect("series");
        let items: Vec<SeriesDataItem> = (0..4)
            .map(|i| OhlcData::new(1_000 + i * 60, 1.0, 2.0, 0.5, 1.5).into())
            .collect();
        model.set_series_data(series, &items).expect("data");
        let backfill = OhlcData::new(900, 1.0, 2.0, 0.5, 1.5).into();
        assert!(matches!(
            model.update_series_data(series, &backfill, true),
            Err(ChartError::HistoricalUpdateWithConflation)
        ));
    }

    #[test]
    fn custom_series_needs_reducer_when_conflation_is_on() {
        let mut model = ChartModel::new(
            ChartModelOptions {
                conflation: ConflationOptions::enabled(),
                ..ChartModelOptions::default()
            },
            std::sync::Arc::new(crate::core::TimeHorzScaleBehavior::new()),
        )
        .expect("model");
        let hooks = crate::core::CustomSeriesHooks::new(std::sync::Arc::new(
            |_: &serde_json::Value| Vec::<f64>::new(),
        ));
        assert!(matches!(
            model.add_custom_series(SeriesOptions::default(), hooks),
            Err(ChartError::MissingConflationReducer)
        ));
    }

    #[test]
    fn unknown_series_is_reported() {
        let mut model = model();
        let missing = crate::core::SeriesId::new(42);
        assert!(matches!(
            model.set_series_data(missing, &[]),
            Err(ChartError::UnknownSeries(id)) if id == missing
        ));
    }
}
