use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::core::{
    CustomSeriesHooks, HorzScaleBehavior, HorzScaleItemKey, InternalHorzScaleItem, PlotRow,
    SeriesDataItem, SeriesId, SeriesKind, Time, TimeKind, TimePointIndex, TimeScalePoint,
    create_plot_row,
};
use crate::error::{ChartError, ChartResult};

/// Opaque handle of a [`TimePointData`] inside the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PointSlot(u32);

/// Row-per-series fan-out at one timeline point.
///
/// `None` in the mapping marks a whitespace item: the series touches the
/// point but has no value there.
#[derive(Debug, Clone)]
pub struct TimePointData {
    index: TimePointIndex,
    time: InternalHorzScaleItem,
    original_time: Time,
    mapping: IndexMap<SeriesId, Option<PlotRow>>,
}

impl TimePointData {
    fn new(time: InternalHorzScaleItem, original_time: Time) -> Self {
        Self {
            index: 0,
            time,
            original_time,
            mapping: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn index(&self) -> TimePointIndex {
        self.index
    }

    #[must_use]
    pub fn time(&self) -> InternalHorzScaleItem {
        self.time
    }

    #[must_use]
    pub fn original_time(&self) -> &Time {
        &self.original_time
    }

    #[must_use]
    pub fn mapping(&self) -> &IndexMap<SeriesId, Option<PlotRow>> {
        &self.mapping
    }
}

#[derive(Debug, Clone, Default)]
struct PointArena {
    slots: Vec<Option<TimePointData>>,
    free: Vec<PointSlot>,
}

impl PointArena {
    fn insert(&mut self, data: TimePointData) -> PointSlot {
        if let Some(slot) = self.free.pop() {
            self.slots[slot.0 as usize] = Some(data);
            return slot;
        }
        self.slots.push(Some(data));
        PointSlot((self.slots.len() - 1) as u32)
    }

    fn remove(&mut self, slot: PointSlot) -> Option<TimePointData> {
        let removed = self.slots.get_mut(slot.0 as usize)?.take();
        if removed.is_some() {
            self.free.push(slot);
        }
        removed
    }

    fn get(&self, slot: PointSlot) -> Option<&TimePointData> {
        self.slots.get(slot.0 as usize)?.as_ref()
    }

    fn get_mut(&mut self, slot: PointSlot) -> Option<&mut TimePointData> {
        self.slots.get_mut(slot.0 as usize)?.as_mut()
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }
}

/// What the data layer needs to know about a series to build its rows.
#[derive(Debug, Clone, Copy)]
pub struct SeriesDescriptor<'a> {
    pub id: SeriesId,
    pub kind: SeriesKind,
    pub custom_hooks: Option<&'a CustomSeriesHooks>,
}

impl<'a> SeriesDescriptor<'a> {
    #[must_use]
    pub fn new(id: SeriesId, kind: SeriesKind) -> Self {
        Self {
            id,
            kind,
            custom_hooks: None,
        }
    }

    #[must_use]
    pub fn with_custom_hooks(mut self, hooks: &'a CustomSeriesHooks) -> Self {
        self.custom_hooks = Some(hooks);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeriesUpdateInfo {
    pub last_bar_updated_or_new_bars_added_to_the_right: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesChanges {
    pub data: Arc<Vec<PlotRow>>,
    pub info: Option<SeriesUpdateInfo>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeScaleChanges {
    pub base_index: Option<TimePointIndex>,
    pub points: Option<Arc<Vec<TimeScalePoint>>>,
    pub first_changed_point_index: Option<usize>,
}

/// Diff produced by every data layer mutation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataUpdateResponse {
    pub series: IndexMap<SeriesId, SeriesChanges>,
    pub time_scale: TimeScaleChanges,
}

/// Owner of the shared timeline across all attached series.
#[derive(Debug, Clone)]
pub struct DataLayer {
    behavior: Arc<dyn HorzScaleBehavior>,
    arena: PointArena,
    point_by_key: HashMap<HorzScaleItemKey, PointSlot>,
    sorted_points: Arc<Vec<TimeScalePoint>>,
    sorted_slots: Vec<PointSlot>,
    series_rows: IndexMap<SeriesId, Arc<Vec<PlotRow>>>,
    series_last_time: HashMap<SeriesId, InternalHorzScaleItem>,
    series_time_kind: HashMap<SeriesId, TimeKind>,
}

struct PreparedItem {
    time: InternalHorzScaleItem,
    original_time: Time,
    row: Option<PlotRow>,
}

impl DataLayer {
    #[must_use]
    pub fn new(behavior: Arc<dyn HorzScaleBehavior>) -> Self {
        Self {
            behavior,
            arena: PointArena::default(),
            point_by_key: HashMap::new(),
            sorted_points: Arc::new(Vec::new()),
            sorted_slots: Vec::new(),
            series_rows: IndexMap::new(),
            series_last_time: HashMap::new(),
            series_time_kind: HashMap::new(),
        }
    }

    #[must_use]
    pub fn behavior(&self) -> &Arc<dyn HorzScaleBehavior> {
        &self.behavior
    }

    #[must_use]
    pub fn time_points(&self) -> &Arc<Vec<TimeScalePoint>> {
        &self.sorted_points
    }

    #[must_use]
    pub fn point_data_at(&self, index: TimePointIndex) -> Option<&TimePointData> {
        let slot = *self.sorted_slots.get(usize::try_from(index).ok()?)?;
        self.arena.get(slot)
    }

    #[must_use]
    pub fn series_rows(&self, series: SeriesId) -> Option<&Arc<Vec<PlotRow>>> {
        self.series_rows.get(&series)
    }

    #[must_use]
    pub fn series_time_kind(&self, series: SeriesId) -> Option<TimeKind> {
        self.series_time_kind.get(&series).copied()
    }

    pub fn destroy(&mut self) {
        self.arena.clear();
        self.point_by_key.clear();
        self.sorted_points = Arc::new(Vec::new());
        self.sorted_slots.clear();
        self.series_rows.clear();
        self.series_last_time.clear();
        self.series_time_kind.clear();
    }

    /// Replaces the full data of a series.
    ///
    /// Items must be strictly ascending by time and share one time
    /// representation. Nothing is mutated when validation fails.
    pub fn set_series_data(
        &mut self,
        series: SeriesDescriptor<'_>,
        items: &[SeriesDataItem],
    ) -> ChartResult<DataUpdateResponse> {
        let prepared = self.prepare_items(series, items)?;
        let time_kind = items.first().map(|item| self.behavior.time_kind(item.time()));
        debug!(
            series = series.id.raw(),
            items = items.len(),
            "set series data"
        );
        Ok(self.apply_series_items(series.id, prepared, time_kind))
    }

    pub fn remove_series(&mut self, series: SeriesId) -> DataUpdateResponse {
        debug!(series = series.raw(), "remove series");
        self.apply_series_items(series, Vec::new(), None)
    }

    /// Appends or overwrites one time point of a series.
    ///
    /// With `historical` set the item may land anywhere in the series
    /// (backfill); otherwise it must not be older than the series' latest time.
    pub fn update_series_data(
        &mut self,
        series: SeriesDescriptor<'_>,
        item: &SeriesDataItem,
        historical: bool,
    ) -> ChartResult<DataUpdateResponse> {
        let time = self.behavior.convert_horz_item(item.time())?;
        let time_kind = self.behavior.time_kind(item.time());
        if let Some(expected) = self.series_time_kind.get(&series.id)
            && *expected != time_kind
        {
            return Err(ChartError::TimeTypeMismatch {
                expected: *expected,
                actual: time_kind,
            });
        }
        if !historical
            && let Some(last) = self.series_last_time.get(&series.id)
            && time.key() < last.key()
        {
            return Err(ChartError::OutdatedUpdate {
                last: last.value(),
                new: time.value(),
            });
        }

        let existing_slot = self.point_by_key.get(&time.key()).copied();
        let insert_index = match existing_slot {
            Some(_) => None,
            None => Some(
                self.sorted_points
                    .partition_point(|point| point.time.key() < time.key()),
            ),
        };
        let index = match (existing_slot, insert_index) {
            (Some(slot), _) => self.arena.get(slot).map_or(0, TimePointData::index),
            (None, Some(position)) => position as TimePointIndex,
            (None, None) => 0,
        };
        let row = create_plot_row(series.kind, time, index, item, series.custom_hooks)?;

        let slot = match existing_slot {
            Some(slot) => slot,
            None => {
                let slot = self
                    .arena
                    .insert(TimePointData::new(time, item.time().clone()));
                self.point_by_key.insert(time.key(), slot);
                slot
            }
        };
        if let Some(point) = self.arena.get_mut(slot) {
            point.mapping.insert(series.id, row.clone());
        }
        self.series_time_kind.insert(series.id, time_kind);

        let info = SeriesUpdateInfo {
            last_bar_updated_or_new_bars_added_to_the_right: row.is_some() && !historical,
        };
        if historical {
            self.update_series_rows_historical(series.id, row, time);
        } else {
            self.update_last_series_row(series.id, row, time);
        }

        let Some(insert_index) = insert_index else {
            trace!(series = series.id.raw(), index, "update series data in place");
            return Ok(self.update_response(series.id, None, Some(info)));
        };

        let points = Arc::make_mut(&mut self.sorted_points);
        points.insert(insert_index, TimeScalePoint::new(time, item.time().clone()));
        self.sorted_slots.insert(insert_index, slot);
        for position in insert_index..self.sorted_slots.len() {
            let slot = self.sorted_slots[position];
            self.assign_index(slot, position as TimePointIndex);
        }
        self.behavior.fill_weights_for_points(
            Arc::make_mut(&mut self.sorted_points).as_mut_slice(),
            insert_index,
        );
        self.sync_series_row_indices(insert_index);
        trace!(
            series = series.id.raw(),
            insert_index,
            points = self.sorted_points.len(),
            "update series data inserted time point"
        );
        Ok(self.update_response(series.id, Some(insert_index), Some(info)))
    }

    fn prepare_items(
        &self,
        series: SeriesDescriptor<'_>,
        items: &[SeriesDataItem],
    ) -> ChartResult<Vec<PreparedItem>> {
        let Some(first) = items.first() else {
            return Ok(Vec::new());
        };
        let expected_kind = self.behavior.time_kind(first.time());
        let mut prepared: Vec<PreparedItem> = Vec::with_capacity(items.len());
        for (position, item) in items.iter().enumerate() {
            let kind = self.behavior.time_kind(item.time());
            if kind != expected_kind {
                return Err(ChartError::TimeTypeMismatch {
                    expected: expected_kind,
                    actual: kind,
                });
            }
            let time = self.behavior.convert_horz_item(item.time())?;
            if let Some(prev) = prepared.last()
                && prev.time.key() >= time.key()
            {
                return Err(ChartError::InvalidData(format!(
                    "data must be asc ordered by time, index={position}, time={}, prev time={}",
                    time.value(),
                    prev.time.value()
                )));
            }
            let row = create_plot_row(series.kind, time, 0, item, series.custom_hooks)?;
            prepared.push(PreparedItem {
                time,
                original_time: item.time().clone(),
                row,
            });
        }
        Ok(prepared)
    }

    fn apply_series_items(
        &mut self,
        series: SeriesId,
        prepared: Vec<PreparedItem>,
        time_kind: Option<TimeKind>,
    ) -> DataUpdateResponse {
        let mut need_cleanup_points = !self.point_by_key.is_empty();
        let mut time_scale_affected = false;

        if self.series_rows.contains_key(&series) {
            if self.series_rows.len() == 1 {
                need_cleanup_points = false;
                time_scale_affected = true;
                self.arena.clear();
                self.point_by_key.clear();
            } else {
                for slot in &self.sorted_slots {
                    if let Some(point) = self.arena.get_mut(*slot)
                        && point.mapping.shift_remove(&series).is_some()
                    {
                        time_scale_affected = true;
                    }
                }
            }
        }

        let last_time = prepared.last().map(|item| item.time);
        let mut rows = Vec::with_capacity(prepared.len());
        for item in prepared {
            let slot = match self.point_by_key.get(&item.time.key()) {
                Some(slot) => *slot,
                None => {
                    let slot = self
                        .arena
                        .insert(TimePointData::new(item.time, item.original_time));
                    self.point_by_key.insert(item.time.key(), slot);
                    time_scale_affected = true;
                    slot
                }
            };
            let Some(point) = self.arena.get_mut(slot) else {
                continue;
            };
            let row = item.row.map(|mut row| {
                row.index = point.index;
                row
            });
            point.mapping.insert(series, row.clone());
            rows.extend(row);
        }

        if need_cleanup_points {
            self.cleanup_points_data();
        }

        match last_time {
            Some(last_time) => {
                self.series_rows.insert(series, Arc::new(rows));
                self.series_last_time.insert(series, last_time);
                if let Some(kind) = time_kind {
                    self.series_time_kind.insert(series, kind);
                }
            }
            None => {
                self.series_rows.shift_remove(&series);
                self.series_last_time.remove(&series);
                self.series_time_kind.remove(&series);
            }
        }

        let first_changed = if time_scale_affected {
            self.rebuild_time_scale_points()
        } else {
            None
        };
        self.update_response(series, first_changed, None)
    }

    fn cleanup_points_data(&mut self) {
        for slot in &self.sorted_slots {
            let empty = self
                .arena
                .get(*slot)
                .is_some_and(|point| point.mapping.is_empty());
            if empty && let Some(point) = self.arena.remove(*slot) {
                self.point_by_key.remove(&point.time.key());
            }
        }
    }

    fn rebuild_time_scale_points(&mut self) -> Option<usize> {
        let mut entries: Vec<(HorzScaleItemKey, PointSlot)> = self
            .point_by_key
            .iter()
            .map(|(key, slot)| (*key, *slot))
            .collect();
        entries.sort_unstable_by_key(|(key, _)| *key);

        let mut new_points = Vec::with_capacity(entries.len());
        let mut new_slots = Vec::with_capacity(entries.len());
        for (_, slot) in entries {
            if let Some(point) = self.arena.get(slot) {
                new_points.push(TimeScalePoint::new(point.time, point.original_time.clone()));
                new_slots.push(slot);
            }
        }
        self.replace_time_scale_points(new_points, new_slots)
    }

    fn replace_time_scale_points(
        &mut self,
        mut new_points: Vec<TimeScalePoint>,
        new_slots: Vec<PointSlot>,
    ) -> Option<usize> {
        let common = self.sorted_points.len().min(new_points.len());
        let mut first_changed = None;
        for index in 0..common {
            let old_point = &self.sorted_points[index];
            if old_point.time.key() != new_points[index].time.key() {
                first_changed = Some(index);
                break;
            }
            new_points[index].time_weight = old_point.time_weight;
            self.assign_index(new_slots[index], index as TimePointIndex);
        }
        if first_changed.is_none() && self.sorted_points.len() != new_points.len() {
            first_changed = Some(common);
        }
        // slots may be renumbered even when the keys are not
        self.sorted_slots = new_slots;
        let Some(first_changed) = first_changed else {
            self.sync_series_row_indices(0);
            return None;
        };

        for position in first_changed..self.sorted_slots.len() {
            let slot = self.sorted_slots[position];
            self.assign_index(slot, position as TimePointIndex);
        }
        self.behavior
            .fill_weights_for_points(&mut new_points, first_changed);
        self.sorted_points = Arc::new(new_points);
        self.sync_series_row_indices(first_changed);
        debug!(
            first_changed,
            points = self.sorted_points.len(),
            "time scale points replaced"
        );
        Some(first_changed)
    }

    fn assign_index(&mut self, slot: PointSlot, index: TimePointIndex) {
        if let Some(point) = self.arena.get_mut(slot) {
            point.index = index;
            for row in point.mapping.values_mut().flatten() {
                row.index = index;
            }
        }
    }

    /// Refreshes `index` of every series row at or after `first_changed`.
    fn sync_series_row_indices(&mut self, first_changed: usize) {
        let Some(threshold) = self
            .sorted_points
            .get(first_changed)
            .map(|point| point.time.key())
        else {
            return;
        };
        for rows in self.series_rows.values_mut() {
            let start = rows.partition_point(|row| row.time.key() < threshold);
            if start == rows.len() {
                continue;
            }
            for row in &mut Arc::make_mut(rows)[start..] {
                if let Some(point) = self
                    .point_by_key
                    .get(&row.time.key())
                    .and_then(|slot| self.arena.get(*slot))
                {
                    row.index = point.index;
                }
            }
        }
    }

    fn update_last_series_row(
        &mut self,
        series: SeriesId,
        row: Option<PlotRow>,
        time: InternalHorzScaleItem,
    ) {
        let rows = Arc::make_mut(self.series_rows.entry(series).or_default());
        let is_newer = rows.last().is_none_or(|last| time.key() > last.time.key());
        match (is_newer, row) {
            (true, Some(row)) => rows.push(row),
            (true, None) => {}
            (false, Some(row)) => {
                if let Some(last) = rows.last_mut() {
                    *last = row;
                }
            }
            (false, None) => {
                rows.pop();
            }
        }
        self.series_last_time.insert(series, time);
    }

    fn update_series_rows_historical(
        &mut self,
        series: SeriesId,
        row: Option<PlotRow>,
        time: InternalHorzScaleItem,
    ) {
        let rows = Arc::make_mut(self.series_rows.entry(series).or_default());
        let position = rows.partition_point(|existing| existing.time.key() < time.key());
        let exists = rows
            .get(position)
            .is_some_and(|existing| existing.time.key() == time.key());
        match (exists, row) {
            (true, Some(row)) => rows[position] = row,
            (true, None) => {
                rows.remove(position);
            }
            (false, Some(row)) => rows.insert(position, row),
            (false, None) => {}
        }
        let latest = self
            .series_last_time
            .get(&series)
            .map_or(time, |last| (*last).max(time));
        self.series_last_time.insert(series, latest);
    }

    fn base_index(&self) -> Option<TimePointIndex> {
        if self.series_rows.is_empty() {
            return None;
        }
        Some(
            self.series_rows
                .values()
                .filter_map(|rows| rows.last().map(|row| row.index))
                .fold(0, TimePointIndex::max),
        )
    }

    fn update_response(
        &self,
        updated: SeriesId,
        first_changed: Option<usize>,
        info: Option<SeriesUpdateInfo>,
    ) -> DataUpdateResponse {
        let mut response = DataUpdateResponse {
            series: IndexMap::new(),
            time_scale: TimeScaleChanges {
                base_index: self.base_index(),
                points: None,
                first_changed_point_index: None,
            },
        };

        if let Some(first_changed) = first_changed {
            for (series, rows) in &self.series_rows {
                response.series.insert(
                    *series,
                    SeriesChanges {
                        data: Arc::clone(rows),
                        info: if *series == updated { info } else { None },
                    },
                );
            }
            response
                .series
                .entry(updated)
                .or_insert_with(|| SeriesChanges {
                    data: Arc::new(Vec::new()),
                    info,
                });
            response.time_scale.points = Some(Arc::clone(&self.sorted_points));
            response.time_scale.first_changed_point_index = Some(first_changed);
        } else {
            let data = self
                .series_rows
                .get(&updated)
                .map_or_else(|| Arc::new(Vec::new()), Arc::clone);
            response.series.insert(updated, SeriesChanges { data, info });
        }
        response
    }
}
