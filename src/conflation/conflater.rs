use std::collections::HashMap;
use std::sync::Arc;

#[cfg(feature = "parallel-conflation")]
use rayon::prelude::*;
use tracing::{debug, trace};

use crate::conflation::batch::BatchConflation;
use crate::conflation::reducers::ConflationReducer;
use crate::core::{PlotRow, TimePointIndex};
use crate::error::{ChartError, ChartResult};

#[cfg(feature = "parallel-conflation")]
const PARALLEL_MIN_GROUPS: usize = 1024;

/// Cheap fingerprint of a row set: any reindex or length change moves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataVersion {
    pub len: usize,
    pub first_index: Option<TimePointIndex>,
    pub last_index: Option<TimePointIndex>,
}

impl DataVersion {
    #[must_use]
    pub fn of(rows: &[PlotRow]) -> Self {
        Self {
            len: rows.len(),
            first_index: rows.first().map(|row| row.index),
            last_index: rows.last().map(|row| row.index),
        }
    }
}

/// One aggregated row and how many source rows went into it.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflatedChunk {
    pub row: PlotRow,
    pub original_data_count: usize,
}

/// Groups `rows` by `bars_to_merge`, the trailing remainder forming a
/// shorter last group.
pub fn conflate_chunks(
    rows: &[PlotRow],
    bars_to_merge: usize,
    reducer: &ConflationReducer,
) -> ChartResult<Vec<ConflatedChunk>> {
    if bars_to_merge == 0 {
        return Err(ChartError::InvalidConfiguration(
            "bars_to_merge must be > 0".to_owned(),
        ));
    }

    #[cfg(feature = "parallel-conflation")]
    {
        if rows.len() / bars_to_merge >= PARALLEL_MIN_GROUPS {
            return rows
                .par_chunks(bars_to_merge)
                .map(|group| reduce_group(group, reducer))
                .collect();
        }
    }

    rows.chunks(bars_to_merge)
        .map(|group| reduce_group(group, reducer))
        .collect()
}

/// Row-shaped result of [`conflate_chunks`]; a factor of one returns `rows`.
pub fn conflate_by_factor(
    rows: &[PlotRow],
    bars_to_merge: usize,
    reducer: &ConflationReducer,
) -> ChartResult<Vec<PlotRow>> {
    if bars_to_merge == 1 {
        return Ok(rows.to_vec());
    }
    Ok(conflate_chunks(rows, bars_to_merge, reducer)?
        .into_iter()
        .map(|chunk| chunk.row)
        .collect())
}

pub(crate) fn reduce_group(
    group: &[PlotRow],
    reducer: &ConflationReducer,
) -> ChartResult<ConflatedChunk> {
    Ok(ConflatedChunk {
        row: reducer.reduce(group)?,
        original_data_count: group.len(),
    })
}

#[derive(Debug, Clone)]
struct CachedConflation {
    version: DataVersion,
    chunks: Vec<ConflatedChunk>,
    rows: Arc<Vec<PlotRow>>,
}

impl CachedConflation {
    fn new(version: DataVersion, chunks: Vec<ConflatedChunk>) -> Self {
        let rows = Arc::new(chunks.iter().map(|chunk| chunk.row.clone()).collect());
        Self {
            version,
            chunks,
            rows,
        }
    }
}

/// Per-series conflation results, one cached entry per merge factor.
#[derive(Debug, Clone)]
pub struct DataConflater {
    reducer: ConflationReducer,
    cache: HashMap<usize, CachedConflation>,
}

impl DataConflater {
    #[must_use]
    pub fn new(reducer: ConflationReducer) -> Self {
        Self {
            reducer,
            cache: HashMap::new(),
        }
    }

    #[must_use]
    pub fn reducer(&self) -> &ConflationReducer {
        &self.reducer
    }

    /// Conflated rows for `bars_to_merge`, rebuilt only when the data version
    /// differs from the cached one.
    pub fn conflate(
        &mut self,
        rows: &Arc<Vec<PlotRow>>,
        bars_to_merge: usize,
    ) -> ChartResult<Arc<Vec<PlotRow>>> {
        if bars_to_merge <= 1 {
            return Ok(Arc::clone(rows));
        }
        let version = DataVersion::of(rows);
        if let Some(cached) = self
            .cache
            .get(&bars_to_merge)
            .filter(|cached| cached.version == version)
        {
            trace!(bars_to_merge, len = version.len, "conflation cache hit");
            return Ok(Arc::clone(&cached.rows));
        }

        let chunks = conflate_chunks(rows, bars_to_merge, &self.reducer)?;
        debug!(
            bars_to_merge,
            source_rows = rows.len(),
            conflated_rows = chunks.len(),
            "conflation rebuilt"
        );
        let cached = CachedConflation::new(version, chunks);
        let result = Arc::clone(&cached.rows);
        self.cache.insert(bars_to_merge, cached);
        Ok(result)
    }

    /// Refreshes every cached factor after the last row changed or rows were
    /// appended, recomputing only the groups from the one holding the
    /// previous last row.
    ///
    /// Every row before the previous last row must be unchanged.
    pub fn update_last_chunk(&mut self, rows: &Arc<Vec<PlotRow>>) -> ChartResult<()> {
        let version = DataVersion::of(rows);
        for (&bars_to_merge, cached) in &mut self.cache {
            let previous_len = cached.version.len;
            let stable_rows = previous_len.min(rows.len()).saturating_sub(1);
            let first_group = stable_rows / bars_to_merge;
            cached.chunks.truncate(first_group);
            let tail = conflate_chunks(&rows[first_group * bars_to_merge..], bars_to_merge, &self.reducer)?;
            cached.chunks.extend(tail);
            *cached = CachedConflation::new(version, std::mem::take(&mut cached.chunks));
            trace!(bars_to_merge, first_group, "conflation tail refreshed");
        }
        Ok(())
    }

    /// Number of source rows behind each conflated row of a cached factor.
    #[must_use]
    pub fn original_data_counts(&self, bars_to_merge: usize) -> Option<Vec<usize>> {
        self.cache.get(&bars_to_merge).map(|cached| {
            cached
                .chunks
                .iter()
                .map(|chunk| chunk.original_data_count)
                .collect()
        })
    }

    /// Starts a sliced rebuild of `rows`; see [`BatchConflation`].
    pub fn begin_batch(
        &self,
        rows: &Arc<Vec<PlotRow>>,
        bars_to_merge: usize,
        batch_size: usize,
    ) -> ChartResult<BatchConflation> {
        BatchConflation::new(
            self.reducer.clone(),
            Arc::clone(rows),
            bars_to_merge,
            batch_size,
        )
    }

    /// Stores a finished batch run as if [`Self::conflate`] had built it.
    pub fn finish_batch(&mut self, batch: BatchConflation) -> ChartResult<Arc<Vec<PlotRow>>> {
        let bars_to_merge = batch.bars_to_merge();
        let (version, chunks) = batch.into_parts()?;
        let cached = CachedConflation::new(version, chunks);
        let rows = Arc::clone(&cached.rows);
        self.cache.insert(bars_to_merge, cached);
        Ok(rows)
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}
