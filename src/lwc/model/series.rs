use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::conflation::{ConflationReducer, DataConflater};
use crate::core::{
    CustomSeriesHooks, MismatchDirection, PLOT_HIGH, PLOT_LOW, PlotList, PlotRow, SeriesId,
    SeriesKind,
};
use crate::error::ChartResult;
use crate::lwc::model::data_layer::SeriesUpdateInfo;
use crate::lwc::model::pane::{PaneId, RIGHT_PRICE_SCALE_ID};
use crate::lwc::model::price_scale::{AutoScaleInfo, AutoScaleSource, PriceRange};
use crate::lwc::model::time_scale::StrictRange;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesOptions {
    pub visible: bool,
    pub pane: PaneId,
    pub price_scale_id: String,
    /// Smallest price step; widens flat autoscale ranges.
    pub min_move: f64,
    /// Opt-out from chart-wide conflation.
    pub conflation_enabled: bool,
    /// Histogram base line, always kept inside the autoscale range.
    pub base: f64,
}

impl Default for SeriesOptions {
    fn default() -> Self {
        Self {
            visible: true,
            pane: PaneId::new(0),
            price_scale_id: RIGHT_PRICE_SCALE_ID.to_owned(),
            min_move: 0.01,
            conflation_enabled: true,
            base: 0.0,
        }
    }
}

impl SeriesOptions {
    #[must_use]
    pub fn with_price_scale_id(mut self, id: impl Into<String>) -> Self {
        self.price_scale_id = id.into();
        self
    }

    #[must_use]
    pub fn with_pane(mut self, pane: PaneId) -> Self {
        self.pane = pane;
        self
    }

    #[must_use]
    pub fn with_min_move(mut self, min_move: f64) -> Self {
        self.min_move = min_move;
        self
    }

    #[must_use]
    pub fn without_conflation(mut self) -> Self {
        self.conflation_enabled = false;
        self
    }
}

/// A series attached to the chart: its rows and its conflated view.
#[derive(Debug, Clone)]
pub struct Series {
    id: SeriesId,
    kind: SeriesKind,
    options: SeriesOptions,
    hooks: Option<CustomSeriesHooks>,
    data: PlotList,
    conflater: Option<DataConflater>,
    conflated: Option<PlotList>,
    conflation_factor: usize,
}

impl Series {
    pub(crate) fn new(
        id: SeriesId,
        kind: SeriesKind,
        options: SeriesOptions,
        hooks: Option<CustomSeriesHooks>,
    ) -> Self {
        Self {
            id,
            kind,
            options,
            hooks,
            data: PlotList::new(),
            conflater: None,
            conflated: None,
            conflation_factor: 1,
        }
    }

    #[must_use]
    pub fn id(&self) -> SeriesId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> SeriesKind {
        self.kind
    }

    #[must_use]
    pub fn options(&self) -> &SeriesOptions {
        &self.options
    }

    #[must_use]
    pub fn custom_hooks(&self) -> Option<&CustomSeriesHooks> {
        self.hooks.as_ref()
    }

    /// Rows as set by the data layer.
    #[must_use]
    pub fn data(&self) -> &PlotList {
        &self.data
    }

    /// Rows to draw: conflated when a merge factor is active.
    #[must_use]
    pub fn visible_data(&self) -> &PlotList {
        self.conflated.as_ref().unwrap_or(&self.data)
    }

    #[must_use]
    pub fn conflation_factor(&self) -> usize {
        self.conflation_factor
    }

    #[must_use]
    pub fn is_conflation_active(&self) -> bool {
        self.conflater.is_some()
    }

    /// Builds or drops the conflater; a custom series without reducer fails.
    pub(crate) fn set_conflation_enabled(&mut self, enabled: bool) -> ChartResult<()> {
        let enabled = enabled && self.options.conflation_enabled;
        match (enabled, self.conflater.is_some()) {
            (true, false) => {
                let reducer = ConflationReducer::for_series(self.kind, self.hooks.as_ref())?;
                self.conflater = Some(DataConflater::new(reducer));
            }
            (false, true) => {
                self.conflater = None;
                self.conflated = None;
                self.conflation_factor = 1;
            }
            _ => {}
        }
        Ok(())
    }

    pub(crate) fn set_data(
        &mut self,
        rows: Arc<Vec<PlotRow>>,
        info: Option<SeriesUpdateInfo>,
    ) -> ChartResult<()> {
        self.data.set_data(rows);
        let refreshed = self.refresh_after_data_change(info);
        if refreshed.is_err() {
            // fall back to the raw rows until the next successful rebuild
            if let Some(conflater) = &mut self.conflater {
                conflater.clear();
            }
            self.conflated = None;
        }
        refreshed
    }

    fn refresh_after_data_change(&mut self, info: Option<SeriesUpdateInfo>) -> ChartResult<()> {
        if let Some(conflater) = &mut self.conflater {
            let tail_only = info.is_some_and(|info| info.last_bar_updated_or_new_bars_added_to_the_right);
            if tail_only {
                conflater.update_last_chunk(&self.data.shared_rows())?;
            } else {
                conflater.clear();
            }
        }
        self.refresh_conflated(true)
    }

    pub(crate) fn set_conflation_factor(&mut self, factor: usize) -> ChartResult<()> {
        if self.conflater.is_none() || factor == self.conflation_factor {
            return Ok(());
        }
        self.conflation_factor = factor;
        trace!(series = self.id.raw(), factor, "series conflation factor changed");
        let refreshed = self.refresh_conflated(false);
        if refreshed.is_err() {
            self.conflated = None;
        }
        refreshed
    }

    fn refresh_conflated(&mut self, data_changed: bool) -> ChartResult<()> {
        let Some(conflater) = &mut self.conflater else {
            return Ok(());
        };
        if self.conflation_factor <= 1 {
            self.conflated = None;
            return Ok(());
        }
        let rows = conflater.conflate(&self.data.shared_rows(), self.conflation_factor)?;
        let unchanged = !data_changed
            && self
                .conflated
                .as_ref()
                .is_some_and(|list| Arc::ptr_eq(&list.shared_rows(), &rows));
        if !unchanged {
            let mut list = PlotList::new();
            list.set_data(rows);
            self.conflated = Some(list);
        }
        Ok(())
    }
}

impl AutoScaleSource for Series {
    fn visible(&self) -> bool {
        self.options.visible
    }

    fn first_value(&self, visible_bars: StrictRange) -> Option<f64> {
        self.visible_data()
            .search(visible_bars.left(), MismatchDirection::NearestRight)
            .map(PlotRow::close)
    }

    fn autoscale_info(&mut self, visible_bars: StrictRange) -> Option<AutoScaleInfo> {
        let list = self.conflated.as_mut().unwrap_or(&mut self.data);
        let min_max =
            list.min_max_on_range_cached(visible_bars.left(), visible_bars.right(), &[PLOT_HIGH, PLOT_LOW]);
        let mut range = min_max.map(|mm| PriceRange::new(mm.min, mm.max));
        if self.kind == SeriesKind::Histogram {
            let base = PriceRange::new(self.options.base, self.options.base);
            range = Some(range.map_or(base, |range| range.merge(base)));
        }
        Some(AutoScaleInfo {
            price_range: range,
            margins: None,
        })
    }

    fn min_move(&self) -> f64 {
        self.options.min_move
    }
}
