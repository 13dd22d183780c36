use std::sync::Arc;

use tracing::{debug, trace};

use crate::conflation::conflater::{ConflatedChunk, DataVersion, reduce_group};
use crate::conflation::reducers::ConflationReducer;
use crate::core::PlotRow;
use crate::error::{ChartError, ChartResult};

#[derive(Debug, Clone, PartialEq)]
pub enum BatchProgress {
    Pending { processed: usize, total: usize },
    Complete(Arc<Vec<PlotRow>>),
}

/// Stepwise conflation of a large backlog.
///
/// Each [`Self::process_batch`] call reduces whole groups covering about
/// `batch_size` source rows and returns, so the host can yield between
/// steps. Output equals [`super::conflate_by_factor`] over the same rows.
/// Dropping the driver abandons the run.
#[derive(Debug, Clone)]
pub struct BatchConflation {
    reducer: ConflationReducer,
    rows: Arc<Vec<PlotRow>>,
    bars_to_merge: usize,
    rows_per_step: usize,
    next_row: usize,
    chunks: Vec<ConflatedChunk>,
    completed: Option<Arc<Vec<PlotRow>>>,
}

impl BatchConflation {
    pub fn new(
        reducer: ConflationReducer,
        rows: Arc<Vec<PlotRow>>,
        bars_to_merge: usize,
        batch_size: usize,
    ) -> ChartResult<Self> {
        if bars_to_merge == 0 {
            return Err(ChartError::InvalidConfiguration(
                "bars_to_merge must be > 0".to_owned(),
            ));
        }
        if batch_size == 0 {
            return Err(ChartError::InvalidConfiguration(
                "conflation batch size must be > 0".to_owned(),
            ));
        }
        let groups_per_step = (batch_size / bars_to_merge).max(1);
        debug!(
            rows = rows.len(),
            bars_to_merge, batch_size, "batch conflation started"
        );
        Ok(Self {
            reducer,
            chunks: Vec::with_capacity(rows.len().div_ceil(bars_to_merge)),
            rows,
            bars_to_merge,
            rows_per_step: groups_per_step * bars_to_merge,
            next_row: 0,
            completed: None,
        })
    }

    #[must_use]
    pub fn bars_to_merge(&self) -> usize {
        self.bars_to_merge
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed.is_some()
    }

    /// Runs one step; once complete, every later call returns the same rows.
    pub fn process_batch(&mut self) -> ChartResult<BatchProgress> {
        if let Some(rows) = &self.completed {
            return Ok(BatchProgress::Complete(Arc::clone(rows)));
        }

        let total = self.rows.len();
        let end = (self.next_row + self.rows_per_step).min(total);
        for group in self.rows[self.next_row..end].chunks(self.bars_to_merge) {
            self.chunks.push(reduce_group(group, &self.reducer)?);
        }
        self.next_row = end;
        trace!(processed = end, total, "batch conflation step");

        if end < total {
            return Ok(BatchProgress::Pending {
                processed: end,
                total,
            });
        }
        let rows = Arc::new(
            self.chunks
                .iter()
                .map(|chunk| chunk.row.clone())
                .collect::<Vec<_>>(),
        );
        self.completed = Some(Arc::clone(&rows));
        debug!(conflated_rows = rows.len(), "batch conflation complete");
        Ok(BatchProgress::Complete(rows))
    }

    /// Finishes any remaining steps and hands back the version and chunks.
    pub(crate) fn into_parts(mut self) -> ChartResult<(DataVersion, Vec<ConflatedChunk>)> {
        while let BatchProgress::Pending { .. } = self.process_batch()? {}
        Ok((DataVersion::of(&self.rows), self.chunks))
    }
}
