use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chart_timeline::core::{
    SeriesDataItem, SeriesId, SeriesKind, SingleValueData, TimeHorzScaleBehavior,
};
use chart_timeline::lwc::model::{DataLayer, SeriesDescriptor};
use proptest::prelude::*;

fn items(times: &BTreeSet<i64>) -> Vec<SeriesDataItem> {
    times
        .iter()
        .map(|&time| SingleValueData::new(time, time as f64 * 0.5).into())
        .collect()
}

fn series(id: u32) -> SeriesDescriptor<'static> {
    SeriesDescriptor::new(SeriesId::new(id), SeriesKind::Line)
}

#[derive(Debug, Clone)]
enum Step {
    Set(u32, BTreeSet<i64>),
    Reset(u32),
    Backfill(u32, i64),
    Append(u32, i64),
    Remove(u32),
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        (1u32..4, prop::collection::btree_set(0i64..300, 1..25))
            .prop_map(|(id, times)| Step::Set(id, times)),
        (1u32..4).prop_map(Step::Reset),
        (1u32..4, 0i64..300).prop_map(|(id, time)| Step::Backfill(id, time)),
        (1u32..4, 1i64..40).prop_map(|(id, step)| Step::Append(id, step)),
        (1u32..4).prop_map(Step::Remove),
    ]
}

fn apply_step(
    layer: &mut DataLayer,
    expected: &mut BTreeMap<u32, BTreeSet<i64>>,
    step: Step,
) {
    match step {
        Step::Set(id, times) => {
            layer.set_series_data(series(id), &items(&times)).expect("set");
            expected.insert(id, times);
        }
        Step::Reset(id) => {
            if let Some(times) = expected.get(&id) {
                layer.set_series_data(series(id), &items(times)).expect("reset");
            }
        }
        Step::Backfill(id, time) => {
            if let Some(times) = expected.get_mut(&id) {
                let item: SeriesDataItem = SingleValueData::new(time, 2.0).into();
                layer
                    .update_series_data(series(id), &item, true)
                    .expect("backfill");
                times.insert(time);
            }
        }
        Step::Append(id, step) => {
            if let Some(times) = expected.get_mut(&id) {
                let time = times.iter().next_back().copied().unwrap_or_default() + step;
                let item: SeriesDataItem = SingleValueData::new(time, 3.0).into();
                layer
                    .update_series_data(series(id), &item, false)
                    .expect("append");
                times.insert(time);
            }
        }
        Step::Remove(id) => {
            if expected.remove(&id).is_some() {
                layer.remove_series(SeriesId::new(id));
            }
        }
    }
}

fn check_timeline(layer: &DataLayer, expected: &BTreeSet<i64>) -> Result<(), TestCaseError> {
    let points = layer.time_points();
    prop_assert_eq!(points.len(), expected.len());
    for (position, (point, &time)) in points.iter().zip(expected).enumerate() {
        prop_assert_eq!(point.time.value(), time as f64);
        let data = layer.point_data_at(position as i64).expect("point");
        prop_assert_eq!(data.index(), position as i64);
        for row in data.mapping().values().flatten() {
            prop_assert_eq!(row.index, position as i64);
        }
    }
    for pair in points.windows(2) {
        prop_assert!(pair[0].time.value() < pair[1].time.value());
    }
    Ok(())
}

proptest! {
    #[test]
    fn timeline_is_the_sorted_union_of_series_times(
        first in prop::collection::btree_set(0i64..500, 1..40),
        second in prop::collection::btree_set(0i64..500, 1..40),
    ) {
        let mut layer = DataLayer::new(Arc::new(TimeHorzScaleBehavior::new()));
        layer.set_series_data(series(1), &items(&first)).expect("first");
        layer.set_series_data(series(2), &items(&second)).expect("second");

        let union: BTreeSet<i64> = first.union(&second).copied().collect();
        check_timeline(&layer, &union)?;

        let rows = layer.series_rows(SeriesId::new(2)).expect("rows");
        prop_assert_eq!(rows.len(), second.len());
    }

    #[test]
    fn appends_keep_indices_in_step(
        first in prop::collection::btree_set(0i64..500, 1..40),
        second in prop::collection::btree_set(0i64..500, 1..40),
        steps in prop::collection::vec(1i64..30, 1..20),
    ) {
        let mut layer = DataLayer::new(Arc::new(TimeHorzScaleBehavior::new()));
        layer.set_series_data(series(1), &items(&first)).expect("first");
        layer.set_series_data(series(2), &items(&second)).expect("second");

        let mut union: BTreeSet<i64> = first.union(&second).copied().collect();
        let mut time = first.iter().next_back().copied().unwrap_or_default();
        for step in steps {
            time += step;
            let item: SeriesDataItem = SingleValueData::new(time, 1.0).into();
            let response = layer
                .update_series_data(series(1), &item, false)
                .expect("append");
            let info = response.series[&SeriesId::new(1)].info.expect("info");
            prop_assert!(info.last_bar_updated_or_new_bars_added_to_the_right);
            union.insert(time);
            check_timeline(&layer, &union)?;
        }

        let removed = layer.remove_series(SeriesId::new(1));
        prop_assert!(removed.series.contains_key(&SeriesId::new(1)));
        check_timeline(&layer, &second)?;
    }

    #[test]
    fn timeline_stays_consistent_across_mixed_mutations(
        steps in prop::collection::vec(step_strategy(), 1..30),
    ) {
        let mut layer = DataLayer::new(Arc::new(TimeHorzScaleBehavior::new()));
        let mut expected: BTreeMap<u32, BTreeSet<i64>> = BTreeMap::new();
        for step in steps {
            apply_step(&mut layer, &mut expected, step);
            let union: BTreeSet<i64> = expected.values().flatten().copied().collect();
            check_timeline(&layer, &union)?;
            for (id, times) in &expected {
                let rows = layer.series_rows(SeriesId::new(*id)).expect("rows");
                prop_assert_eq!(rows.len(), times.len());
                for row in rows.iter() {
                    let point = layer.point_data_at(row.index).expect("row point");
                    prop_assert_eq!(point.time(), row.time);
                }
            }
        }
    }
}
