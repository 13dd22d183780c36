//! Level-of-detail aggregation of plot rows.
//!
//! Rows are merged in fixed groups whose size comes from the rule table and
//! the current bar spacing. Aggregated rows have the same shape as source
//! rows, so consumers do not need to know whether a series is conflated.

mod batch;
mod conflater;
mod reducers;
mod rules;

pub use batch::{BatchConflation, BatchProgress};
pub use conflater::{ConflatedChunk, DataConflater, DataVersion, conflate_by_factor, conflate_chunks};
pub use reducers::ConflationReducer;
pub use rules::{ConflationOptions, ConflationRule, default_rules};
