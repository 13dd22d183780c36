use std::collections::HashMap;
use std::sync::Arc;

use crate::core::series::PlotRow;
use crate::core::time::TimePointIndex;

const CHUNK_SIZE: TimePointIndex = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MismatchDirection {
    None,
    NearestLeft,
    NearestRight,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMax {
    pub min: f64,
    pub max: f64,
}

impl MinMax {
    #[must_use]
    pub fn merge(self, other: MinMax) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

fn merge_min_max(left: Option<MinMax>, right: Option<MinMax>) -> Option<MinMax> {
    match (left, right) {
        (Some(l), Some(r)) => Some(l.merge(r)),
        (l, r) => l.or(r),
    }
}

/// Ordered rows of one series keyed by timeline index.
///
/// Min/max queries are answered from per-chunk caches of `CHUNK_SIZE`
/// indexes, rebuilt lazily after `set_data`.
#[derive(Debug, Clone, Default)]
pub struct PlotList {
    items: Arc<Vec<PlotRow>>,
    min_max_cache: HashMap<(usize, TimePointIndex), Option<MinMax>>,
}

impl PlotList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_data(&mut self, rows: Arc<Vec<PlotRow>>) {
        self.min_max_cache.clear();
        self.items = rows;
    }

    #[must_use]
    pub fn rows(&self) -> &[PlotRow] {
        &self.items
    }

    #[must_use]
    pub fn shared_rows(&self) -> Arc<Vec<PlotRow>> {
        Arc::clone(&self.items)
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn first_index(&self) -> Option<TimePointIndex> {
        self.items.first().map(|row| row.index)
    }

    #[must_use]
    pub fn last_index(&self) -> Option<TimePointIndex> {
        self.items.last().map(|row| row.index)
    }

    #[must_use]
    pub fn first(&self) -> Option<&PlotRow> {
        self.items.first()
    }

    #[must_use]
    pub fn last(&self) -> Option<&PlotRow> {
        self.items.last()
    }

    #[must_use]
    pub fn contains(&self, index: TimePointIndex) -> bool {
        self.search_position(index, MismatchDirection::None).is_some()
    }

    #[must_use]
    pub fn value_at(&self, index: TimePointIndex) -> Option<&PlotRow> {
        self.search(index, MismatchDirection::None)
    }

    #[must_use]
    pub fn search(&self, index: TimePointIndex, mode: MismatchDirection) -> Option<&PlotRow> {
        self.search_position(index, mode).map(|pos| &self.items[pos])
    }

    /// Min/max of the given plot values over rows with `start <= index <= end`.
    pub fn min_max_on_range_cached(
        &mut self,
        start: TimePointIndex,
        end: TimePointIndex,
        plots: &[usize],
    ) -> Option<MinMax> {
        if self.is_empty() {
            return None;
        }
        plots.iter().fold(None, |acc, plot| {
            merge_min_max(acc, self.min_max_on_range_cached_impl(start, end, *plot))
        })
    }

    fn search_position(&self, index: TimePointIndex, mode: MismatchDirection) -> Option<usize> {
        let lower = self.lower_bound(index);
        if lower < self.items.len() && self.items[lower].index == index {
            return Some(lower);
        }
        match mode {
            MismatchDirection::None => None,
            MismatchDirection::NearestLeft => {
                let pos = lower.checked_sub(1)?;
                (self.items[pos].index < index).then_some(pos)
            }
            MismatchDirection::NearestRight => {
                let pos = self.upper_bound(index);
                (pos < self.items.len() && index < self.items[pos].index).then_some(pos)
            }
        }
    }

    fn lower_bound(&self, index: TimePointIndex) -> usize {
        self.items.partition_point(|row| row.index < index)
    }

    fn upper_bound(&self, index: TimePointIndex) -> usize {
        self.items.partition_point(|row| row.index <= index)
    }

    fn plot_min_max(&self, start_index: TimePointIndex, end_index: TimePointIndex, plot: usize) -> Option<MinMax> {
        if start_index > end_index {
            return None;
        }
        let from = self.lower_bound(start_index);
        let to = self.upper_bound(end_index);
        self.items[from..to.max(from)]
            .iter()
            .map(|row| row.value[plot])
            .filter(|v| !v.is_nan())
            .fold(None, |acc, v| merge_min_max(acc, Some(MinMax { min: v, max: v })))
    }

    fn min_max_on_range_cached_impl(
        &mut self,
        start: TimePointIndex,
        end: TimePointIndex,
        plot: usize,
    ) -> Option<MinMax> {
        let (Some(first_index), Some(last_index)) = (self.first_index(), self.last_index()) else {
            return None;
        };
        let s = start.max(first_index);
        let e = end.min(last_index);
        if s > e {
            return None;
        }

        let first_chunk = s.div_euclid(CHUNK_SIZE) + TimePointIndex::from(s.rem_euclid(CHUNK_SIZE) != 0);
        let end_chunk = (e + 1).div_euclid(CHUNK_SIZE);

        // head: indexes before the first whole chunk
        let head_end = e.min(first_chunk * CHUNK_SIZE - 1);
        let mut result = self.plot_min_max(s, head_end, plot);

        for chunk in first_chunk..end_chunk {
            let chunk_min_max = match self.min_max_cache.get(&(plot, chunk)) {
                Some(cached) => *cached,
                None => {
                    let computed =
                        self.plot_min_max(chunk * CHUNK_SIZE, (chunk + 1) * CHUNK_SIZE - 1, plot);
                    self.min_max_cache.insert((plot, chunk), computed);
                    computed
                }
            };
            result = merge_min_max(result, chunk_min_max);
        }

        // tail: indexes after the last whole chunk
        let tail_start = first_chunk.max(end_chunk) * CHUNK_SIZE;
        if tail_start > head_end {
            result = merge_min_max(result, self.plot_min_max(tail_start.max(s), e, plot));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{MismatchDirection, PlotList};
    use crate::core::series::{PLOT_HIGH, PLOT_LOW, PlotRow, RowStyle};
    use crate::core::time::{InternalHorzScaleItem, Time};

    fn row(index: i64, value: f64) -> PlotRow {
        PlotRow {
            index,
            time: InternalHorzScaleItem::new(index as f64).expect("finite"),
            original_time: Time::Timestamp(index),
            value: [value, value + 1.0, value - 1.0, value],
            style: RowStyle::Plain,
            custom_values: None,
        }
    }

    fn list(indices: &[i64]) -> PlotList {
        let mut list = PlotList::new();
        list.set_data(Arc::new(indices.iter().map(|i| row(*i, *i as f64)).collect()));
        list
    }

    #[test]
    fn search_modes_find_exact_and_nearest_rows() {
        let list = list(&[2, 5, 9]);
        assert_eq!(list.search(5, MismatchDirection::None).map(|r| r.index), Some(5));
        assert!(list.search(6, MismatchDirection::None).is_none());
        assert_eq!(list.search(6, MismatchDirection::NearestLeft).map(|r| r.index), Some(5));
        assert_eq!(list.search(6, MismatchDirection::NearestRight).map(|r| r.index), Some(9));
        assert!(list.search(1, MismatchDirection::NearestLeft).is_none());
        assert!(list.search(10, MismatchDirection::NearestRight).is_none());
    }

    #[test]
    fn cached_min_max_matches_linear_scan_across_chunk_edges() {
        let indices: Vec<i64> = (0..200).filter(|i| i % 7 != 3).collect();
        let mut list = list(&indices);
        for (start, end) in [(0, 199), (5, 10), (25, 65), (29, 30), (31, 89), (60, 60), (-10, 500)] {
            let expected = indices
                .iter()
                .filter(|i| **i >= start && **i <= end)
                .fold(None::<(f64, f64)>, |acc, i| {
                    let (lo, hi) = (*i as f64 - 1.0, *i as f64 + 1.0);
                    Some(acc.map_or((lo, hi), |(a, b)| (a.min(lo), b.max(hi))))
                });
            let actual = list
                .min_max_on_range_cached(start, end, &[PLOT_HIGH, PLOT_LOW])
                .map(|mm| (mm.min, mm.max));
            assert_eq!(actual, expected, "range {start}..={end}");
            // second query is served from the chunk cache
            let again = list
                .min_max_on_range_cached(start, end, &[PLOT_HIGH, PLOT_LOW])
                .map(|mm| (mm.min, mm.max));
            assert_eq!(again, expected);
        }
    }

    #[test]
    fn set_data_drops_cached_chunks() {
        let mut list = list(&(0..90).collect::<Vec<_>>());
        let before = list.min_max_on_range_cached(0, 89, &[PLOT_HIGH]).expect("range");
        assert!((before.max - 90.0).abs() <= 1e-9);
        list.set_data(Arc::new((0..90).map(|i| row(i, 1.0)).collect()));
        let after = list.min_max_on_range_cached(0, 89, &[PLOT_HIGH]).expect("range");
        assert!((after.max - 2.0).abs() <= 1e-9);
    }
}
