use std::sync::Arc;

use approx::assert_abs_diff_eq;
use chart_timeline::conflation::{ConflationOptions, ConflationReducer, conflate_by_factor};
use chart_timeline::core::{
    CustomData, CustomSeriesHooks, OhlcData, SeriesDataItem, SeriesKind, SingleValueData, Time,
    TimeHorzScaleBehavior,
};
use chart_timeline::lwc::model::{
    PaneId, PriceScaleMode, PriceScaleStateChange, SeriesOptions, TimeScaleOptions,
};
use chart_timeline::{ChartError, ChartModel, ChartModelOptions};
use serde_json::json;

const MAIN: PaneId = PaneId::new(0);

fn sized(mut model: ChartModel) -> ChartModel {
    model.set_width(600.0).expect("width");
    model.set_pane_height(MAIN, 400.0).expect("height");
    model
}

fn model() -> ChartModel {
    sized(ChartModel::with_time_axis().expect("model"))
}

fn conflating_model() -> ChartModel {
    let options = ChartModelOptions {
        time_scale: TimeScaleOptions {
            min_bar_spacing: 0.1,
            ..TimeScaleOptions::default()
        },
        conflation: ConflationOptions::enabled(),
        ..ChartModelOptions::default()
    };
    sized(ChartModel::new(options, Arc::new(TimeHorzScaleBehavior::new())).expect("model"))
}

fn line_items(values: &[f64]) -> Vec<SeriesDataItem> {
    values
        .iter()
        .enumerate()
        .map(|(i, value)| SingleValueData::new(1_000 + i as i64 * 60, *value).into())
        .collect()
}

fn candles(count: i64) -> Vec<SeriesDataItem> {
    (0..count)
        .map(|i| {
            let open = 100.0 + (i % 11) as f64;
            OhlcData::new(1_000 + i * 60, open, open + 3.0, open - 2.0, open + 1.0).into()
        })
        .collect()
}

#[test]
fn line_points_carry_both_coordinates() {
    let mut model = model();
    let series = model
        .add_series(SeriesKind::Line, SeriesOptions::default())
        .expect("series");
    model
        .set_series_data(series, &line_items(&[10.0, 11.0, 14.0, 12.0, 13.0]))
        .expect("data");

    let points = model.visible_line_points(series).expect("points");
    assert_eq!(points.len(), 5);
    for pair in points.windows(2) {
        assert!(pair[0].x < pair[1].x);
    }
    assert_abs_diff_eq!(points[4].x, 596.0, epsilon = 1e-9);
    // 20% top margin of 400px, 10% bottom margin
    assert_abs_diff_eq!(points[2].y, 80.0, epsilon = 1e-9);
    assert_abs_diff_eq!(points[0].y, 359.0, epsilon = 1e-9);
}

#[test]
fn overlay_scale_autoscales_on_its_own_sources() {
    let mut model = model();
    let price = model
        .add_series(SeriesKind::Candlestick, SeriesOptions::default())
        .expect("price");
    let volume = model
        .add_series(
            SeriesKind::Histogram,
            SeriesOptions::default().with_price_scale_id("volume"),
        )
        .expect("volume");
    model.set_series_data(price, &candles(20)).expect("candles");
    model
        .set_series_data(volume, &line_items(&[500.0, 800.0, 650.0]))
        .expect("volume data");

    let right = model.price_range(MAIN, "right").expect("right").expect("range");
    assert_eq!((right.min(), right.max()), (98.0, 113.0));
    let overlay = model.price_range(MAIN, "volume").expect("volume").expect("range");
    assert_eq!((overlay.min(), overlay.max()), (0.0, 800.0));
    assert_eq!(
        model.pane(MAIN).expect("pane").price_scale("volume").expect("scale").height(),
        400.0
    );
}

#[test]
fn series_on_a_second_pane_use_that_pane_scales() {
    let mut model = model();
    let lower = model.add_pane().expect("pane");
    model.set_pane_height(lower, 150.0).expect("height");
    let top = model
        .add_series(SeriesKind::Line, SeriesOptions::default())
        .expect("top");
    let bottom = model
        .add_series(SeriesKind::Line, SeriesOptions::default().with_pane(lower))
        .expect("bottom");
    model.set_series_data(top, &line_items(&[1.0, 2.0])).expect("top data");
    model
        .set_series_data(bottom, &line_items(&[50.0, 70.0, 60.0]))
        .expect("bottom data");

    let range = model.price_range(lower, "right").expect("scale").expect("range");
    assert_eq!((range.min(), range.max()), (50.0, 70.0));
    let range = model.price_range(MAIN, "right").expect("scale").expect("range");
    assert_eq!((range.min(), range.max()), (1.0, 2.0));
    assert!(matches!(
        model.set_pane_height(PaneId::new(9), 100.0),
        Err(ChartError::InvalidConfiguration(_))
    ));
}

#[test]
fn percentage_mode_is_relative_to_the_first_visible_value() {
    let mut model = model();
    let series = model
        .add_series(SeriesKind::Line, SeriesOptions::default())
        .expect("series");
    model
        .set_series_data(series, &line_items(&[10.0, 12.0, 14.0]))
        .expect("data");
    model
        .set_price_scale_mode(
            MAIN,
            "right",
            PriceScaleStateChange {
                mode: Some(PriceScaleMode::Percentage),
                ..PriceScaleStateChange::default()
            },
        )
        .expect("mode");

    let range = model.price_range(MAIN, "right").expect("scale").expect("range");
    assert_abs_diff_eq!(range.min(), 0.0, epsilon = 1e-9);
    assert_abs_diff_eq!(range.max(), 40.0, epsilon = 1e-9);
    let y = model.price_to_coordinate(series, 12.0).expect("y").expect("visible");
    let price = model.coordinate_to_price(series, y).expect("price").expect("visible");
    assert_abs_diff_eq!(price, 12.0, epsilon = 1e-9);
}

#[test]
fn manual_scroll_pins_the_price_range() {
    let mut model = model();
    let series = model
        .add_series(SeriesKind::Line, SeriesOptions::default())
        .expect("series");
    model
        .set_series_data(series, &line_items(&[10.0, 14.0]))
        .expect("data");
    let range = model.price_range(MAIN, "right").expect("scale").expect("range");
    assert_eq!((range.min(), range.max()), (10.0, 14.0));
    model
        .set_price_scale_mode(
            MAIN,
            "right",
            PriceScaleStateChange {
                auto_scale: Some(false),
                ..PriceScaleStateChange::default()
            },
        )
        .expect("manual");

    // 400px pane minus 30% margins leaves 280px, so 279px span the range
    model.start_scroll_price(MAIN, "right", 0.0).expect("start");
    model.scroll_price_to(MAIN, "right", 279.0).expect("scroll");
    model.end_scroll_price(MAIN, "right").expect("end");
    let range = model.price_range(MAIN, "right").expect("scale").expect("range");
    assert_abs_diff_eq!(range.min(), 14.0, epsilon = 1e-9);
    assert_abs_diff_eq!(range.max(), 18.0, epsilon = 1e-9);

    model
        .update_series_data(series, &SingleValueData::new(1_120, 40.0).into(), false)
        .expect("update");
    let range = model.price_range(MAIN, "right").expect("scale").expect("range");
    assert_abs_diff_eq!(range.max(), 18.0, epsilon = 1e-9);
}

#[test]
fn zooming_out_switches_to_conflated_rows_and_back() {
    let mut model = conflating_model();
    let series = model
        .add_series(SeriesKind::Candlestick, SeriesOptions::default())
        .expect("series");
    model.set_series_data(series, &candles(2_000)).expect("data");
    assert_eq!(model.series(series).expect("series").conflation_factor(), 1);

    model.set_bar_spacing(0.3).expect("zoom out");
    let target = model.series(series).expect("series");
    assert_eq!(target.conflation_factor(), 4);
    assert_eq!(target.visible_data().size(), 500);
    assert_eq!(target.data().size(), 2_000);

    let bars = model.visible_bar_points(series).expect("bars");
    assert!(!bars.is_empty());
    assert!(bars.iter().all(|bar| bar.time % 4 == 3));

    model.set_bar_spacing(6.0).expect("zoom in");
    let target = model.series(series).expect("series");
    assert_eq!(target.conflation_factor(), 1);
    assert_eq!(target.visible_data().size(), 2_000);
}

#[test]
fn streaming_while_conflated_matches_a_full_rebuild() {
    let mut model = conflating_model();
    let series = model
        .add_series(SeriesKind::Candlestick, SeriesOptions::default())
        .expect("series");
    model.set_series_data(series, &candles(1_001)).expect("data");
    model.set_bar_spacing(0.3).expect("zoom out");

    let last_time: i64 = 1_000 + 1_000 * 60;
    model
        .update_series_data(
            series,
            &OhlcData::new(last_time, 90.0, 130.0, 80.0, 125.0).into(),
            false,
        )
        .expect("revise last");
    model
        .update_series_data(
            series,
            &OhlcData::new(last_time + 60, 125.0, 126.0, 120.0, 121.0).into(),
            false,
        )
        .expect("append");

    let target = model.series(series).expect("series");
    let expected =
        conflate_by_factor(target.data().rows(), 4, &ConflationReducer::Ohlc).expect("full");
    assert_eq!(target.visible_data().rows(), expected.as_slice());
    assert_eq!(target.visible_data().size(), 251);
}

#[test]
fn opting_out_keeps_raw_rows() {
    let mut model = conflating_model();
    let series = model
        .add_series(
            SeriesKind::Line,
            SeriesOptions::default().without_conflation(),
        )
        .expect("series");
    let values: Vec<f64> = (0..400).map(f64::from).collect();
    model.set_series_data(series, &line_items(&values)).expect("data");
    model.set_bar_spacing(0.2).expect("zoom out");
    let target = model.series(series).expect("series");
    assert!(!target.is_conflation_active());
    assert_eq!(target.visible_data().size(), 400);
}

#[test]
fn custom_series_conflate_through_their_reducer() {
    let mut model = conflating_model();
    let hooks = CustomSeriesHooks::new(Arc::new(|payload: &serde_json::Value| {
        vec![payload["v"].as_f64().unwrap_or(f64::NAN)]
    }))
    .with_conflation_reducer(Arc::new(|payloads: &[&serde_json::Value]| {
        let peak = payloads
            .iter()
            .filter_map(|payload| payload["v"].as_f64())
            .fold(f64::NEG_INFINITY, f64::max);
        json!({ "v": peak })
    }));
    let series = model
        .add_custom_series(SeriesOptions::default(), hooks)
        .expect("series");
    let items: Vec<SeriesDataItem> = (0..8_i64)
        .map(|i| {
            SeriesDataItem::Custom(CustomData {
                time: Time::Timestamp(1_000 + i * 60),
                payload: json!({ "v": (i * 10) as f64 }),
            })
        })
        .collect();
    model.set_series_data(series, &items).expect("data");
    model.set_bar_spacing(0.3).expect("zoom out");

    let rows = model.series(series).expect("series").visible_data().rows().to_vec();
    let closes: Vec<f64> = rows.iter().map(|row| row.close()).collect();
    assert_eq!(closes, vec![30.0, 70.0]);
}

#[test]
fn enabling_conflation_later_applies_the_current_spacing() {
    let mut model = sized(
        ChartModel::new(
            ChartModelOptions {
                time_scale: TimeScaleOptions {
                    min_bar_spacing: 0.1,
                    ..TimeScaleOptions::default()
                },
                ..ChartModelOptions::default()
            },
            Arc::new(TimeHorzScaleBehavior::new()),
        )
        .expect("model"),
    );
    let series = model
        .add_series(SeriesKind::Area, SeriesOptions::default())
        .expect("series");
    let values: Vec<f64> = (0..100).map(f64::from).collect();
    model.set_series_data(series, &line_items(&values)).expect("data");
    model.set_bar_spacing(0.15).expect("zoom out");
    assert_eq!(model.series(series).expect("series").conflation_factor(), 1);

    model
        .apply_conflation_options(ConflationOptions::enabled())
        .expect("enable");
    let target = model.series(series).expect("series");
    assert_eq!(target.conflation_factor(), 8);
    assert_eq!(target.visible_data().size(), 13);
}

#[test]
fn removing_the_only_series_clears_the_timeline() {
    let mut model = model();
    let series = model
        .add_series(SeriesKind::Line, SeriesOptions::default())
        .expect("series");
    model
        .set_series_data(series, &line_items(&[1.0, 2.0, 3.0]))
        .expect("data");
    model.remove_series(series).expect("remove");

    assert!(model.series(series).is_none());
    assert_eq!(model.series_ids().count(), 0);
    assert!(model.data_layer().time_points().is_empty());
    assert!(
        model
            .pane(MAIN)
            .expect("pane")
            .right_price_scale()
            .source_ids()
            .is_empty()
    );
    assert!(matches!(
        model.remove_series(series),
        Err(ChartError::UnknownSeries(_))
    ));
}

#[test]
fn fit_content_shows_the_whole_history() {
    let mut model = model();
    let series = model
        .add_series(SeriesKind::Candlestick, SeriesOptions::default())
        .expect("series");
    model.set_series_data(series, &candles(300)).expect("data");
    model.fit_content().expect("fit");
    let visible = model.visible_strict_range().expect("visible");
    assert_eq!((visible.left(), visible.right()), (0, 299));
    assert_abs_diff_eq!(model.time_scale().bar_spacing(), 2.0, epsilon = 1e-9);

    model.reset_time_scale().expect("reset");
    assert_abs_diff_eq!(model.time_scale().bar_spacing(), 6.0, epsilon = 1e-9);
}
