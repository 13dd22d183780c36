use std::sync::Arc;

use chart_timeline::conflation::{
    BatchConflation, BatchProgress, ConflationReducer, DataConflater, conflate_by_factor,
};
use chart_timeline::core::{InternalHorzScaleItem, PlotRow, RowStyle, Time};
use proptest::prelude::*;

fn bar(index: usize, open: f64, spread: f64, close: f64) -> PlotRow {
    let high = open.max(close) + spread;
    let low = open.min(close) - spread;
    PlotRow {
        index: index as i64,
        time: InternalHorzScaleItem::new(index as f64).expect("time"),
        original_time: Time::Custom(index as f64),
        value: [open, high, low, close],
        style: RowStyle::Histogram { color: None },
        custom_values: None,
    }
}

fn rows_strategy(max_len: usize) -> impl Strategy<Value = Vec<PlotRow>> {
    prop::collection::vec((-1_000.0f64..1_000.0, 0.0f64..50.0, -1_000.0f64..1_000.0), 1..max_len)
        .prop_map(|values| {
            values
                .into_iter()
                .enumerate()
                .map(|(index, (open, spread, close))| bar(index, open, spread, close))
                .collect()
        })
}

fn reducers() -> [ConflationReducer; 4] {
    [
        ConflationReducer::Ohlc,
        ConflationReducer::Line,
        ConflationReducer::FillExtents,
        ConflationReducer::Histogram,
    ]
}

proptest! {
    #[test]
    fn factor_one_is_identity(rows in rows_strategy(200)) {
        for reducer in reducers() {
            let merged = conflate_by_factor(&rows, 1, &reducer).expect("merge");
            prop_assert_eq!(&merged, &rows);
        }
    }

    #[test]
    fn merging_four_equals_merging_two_twice(rows in rows_strategy(300)) {
        for reducer in reducers() {
            let direct = conflate_by_factor(&rows, 4, &reducer).expect("direct");
            let halves = conflate_by_factor(&rows, 2, &reducer).expect("halves");
            let nested = conflate_by_factor(&halves, 2, &reducer).expect("nested");
            prop_assert_eq!(&direct, &nested, "reducer {:?}", reducer);
        }
    }

    #[test]
    fn ohlc_rows_stay_consistent(rows in rows_strategy(300), factor in 2usize..40) {
        let merged = conflate_by_factor(&rows, factor, &ConflationReducer::Ohlc).expect("merge");
        prop_assert_eq!(merged.len(), rows.len().div_ceil(factor));
        for (group, row) in rows.chunks(factor).zip(&merged) {
            prop_assert!(row.low() <= row.open().min(row.close()));
            prop_assert!(row.high() >= row.open().max(row.close()));
            prop_assert_eq!(row.open(), group[0].open());
            prop_assert_eq!(row.close(), group[group.len() - 1].close());
            prop_assert_eq!(row.index, group[group.len() - 1].index);
        }
    }

    #[test]
    fn tail_updates_match_full_rebuilds(
        rows in rows_strategy(200),
        appended in 0usize..20,
        factor in 2usize..16,
        revised_close in -1_000.0f64..1_000.0,
    ) {
        let mut conflater = DataConflater::new(ConflationReducer::Ohlc);
        conflater.conflate(&Arc::new(rows.clone()), factor).expect("initial");

        let mut next = rows;
        let last = next.len() - 1;
        let open = next[last].open();
        next[last] = bar(last, open, 1.0, revised_close);
        for offset in 1..=appended {
            next.push(bar(last + offset, revised_close, 2.0, revised_close + offset as f64));
        }
        let next = Arc::new(next);
        conflater.update_last_chunk(&next).expect("tail");

        let cached = conflater.conflate(&next, factor).expect("cached");
        let full = conflate_by_factor(&next, factor, &ConflationReducer::Ohlc).expect("full");
        prop_assert_eq!(cached.as_ref(), &full);
    }

    #[test]
    fn batched_runs_match_synchronous_runs(
        rows in rows_strategy(400),
        factor in 1usize..32,
        batch_size in 1usize..128,
    ) {
        let rows = Arc::new(rows);
        let mut batch = BatchConflation::new(
            ConflationReducer::FillExtents,
            Arc::clone(&rows),
            factor,
            batch_size,
        )
        .expect("batch");
        let result = loop {
            if let BatchProgress::Complete(result) = batch.process_batch().expect("step") {
                break result;
            }
        };
        let expected =
            conflate_by_factor(&rows, factor, &ConflationReducer::FillExtents).expect("sync");
        prop_assert_eq!(result.as_ref(), &expected);
    }
}
