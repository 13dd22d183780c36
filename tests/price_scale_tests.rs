use approx::assert_abs_diff_eq;
use chart_timeline::lwc::model::{
    AutoScaleInfo, AutoScaleMargins, AutoScaleSource, PriceRange, PriceScale, PriceScaleMode,
    PriceScaleOptions, PriceScaleStateChange, StrictRange,
};

struct Source {
    visible: bool,
    range: PriceRange,
    first: f64,
    margins: Option<AutoScaleMargins>,
}

impl Source {
    fn new(min: f64, max: f64, first: f64) -> Self {
        Self {
            visible: true,
            range: PriceRange::new(min, max),
            first,
            margins: None,
        }
    }
}

impl AutoScaleSource for Source {
    fn visible(&self) -> bool {
        self.visible
    }

    fn first_value(&self, _visible_bars: StrictRange) -> Option<f64> {
        Some(self.first)
    }

    fn autoscale_info(&mut self, _visible_bars: StrictRange) -> Option<AutoScaleInfo> {
        Some(AutoScaleInfo {
            price_range: Some(self.range),
            margins: self.margins,
        })
    }
}

fn scale_with(options: PriceScaleOptions) -> PriceScale {
    let mut scale = PriceScale::new("right", options).expect("scale");
    scale.set_height(500.0);
    scale
}

fn validate(scale: &mut PriceScale, sources: &mut [Source]) {
    scale.recalculate_price_range(StrictRange::new(0, 99));
    let mut sources: Vec<&mut dyn AutoScaleSource> = sources
        .iter_mut()
        .map(|source| source as &mut dyn AutoScaleSource)
        .collect();
    scale.make_sure_valid(&mut sources);
}

#[test]
fn percentage_mode_scales_relative_to_the_first_value() {
    let mut scale = scale_with(PriceScaleOptions {
        mode: PriceScaleMode::Percentage,
        ..PriceScaleOptions::default()
    });
    validate(&mut scale, &mut [Source::new(90.0, 110.0, 100.0)]);
    let range = scale.price_range().expect("range");
    assert_abs_diff_eq!(range.min(), -10.0, epsilon = 1e-9);
    assert_abs_diff_eq!(range.max(), 10.0, epsilon = 1e-9);

    let y = scale.price_to_coordinate(105.0, 100.0);
    let price = scale.coordinate_to_price(y, 100.0).expect("price");
    assert_abs_diff_eq!(price, 105.0, epsilon = 1e-9);
}

#[test]
fn indexed_mode_anchors_the_first_value_at_one_hundred() {
    let mut scale = scale_with(PriceScaleOptions {
        mode: PriceScaleMode::IndexedTo100,
        ..PriceScaleOptions::default()
    });
    validate(&mut scale, &mut [Source::new(45.0, 60.0, 50.0)]);
    let range = scale.price_range().expect("range");
    assert_abs_diff_eq!(range.min(), 90.0, epsilon = 1e-9);
    assert_abs_diff_eq!(range.max(), 120.0, epsilon = 1e-9);
}

#[test]
fn hidden_sources_do_not_contribute() {
    let mut scale = scale_with(PriceScaleOptions::default());
    let mut hidden = Source::new(-1_000.0, 1_000.0, 0.0);
    hidden.visible = false;
    validate(&mut scale, &mut [Source::new(10.0, 20.0, 10.0), hidden]);
    let range = scale.price_range().expect("range");
    assert_eq!((range.min(), range.max()), (10.0, 20.0));
}

#[test]
fn source_margins_push_the_extremes_inwards() {
    let mut scale = scale_with(PriceScaleOptions::default());
    let mut source = Source::new(10.0, 20.0, 10.0);
    source.margins = Some(AutoScaleMargins {
        above: 10.0,
        below: 5.0,
    });
    validate(&mut scale, &mut [source]);
    // 20% of 500 plus 10px on top, 10% of 500 plus 5px at the bottom
    assert_abs_diff_eq!(scale.price_to_coordinate(20.0, 10.0), 110.0, epsilon = 1e-9);
    assert_abs_diff_eq!(scale.price_to_coordinate(10.0, 10.0), 444.0, epsilon = 1e-9);
}

#[test]
fn edge_marks_reserve_padding_while_autoscaling() {
    let mut scale = scale_with(PriceScaleOptions {
        ensure_edge_tick_marks_visible: true,
        ..PriceScaleOptions::default()
    });
    assert!(scale.has_visible_edge_marks());
    validate(&mut scale, &mut [Source::new(10.0, 20.0, 10.0)]);
    let top = 0.2 * 500.0 + scale.edge_marks_padding();
    assert_abs_diff_eq!(scale.price_to_coordinate(20.0, 10.0), top, epsilon = 1e-9);

    scale.set_auto_scale(false);
    assert!(!scale.has_visible_edge_marks());
}

#[test]
fn custom_range_holds_until_autoscale_is_restored() {
    let mut scale = scale_with(PriceScaleOptions::default());
    scale.set_custom_price_range(Some(PriceRange::new(0.0, 1_000.0)));
    assert!(scale.is_custom_price_range());
    assert!(!scale.is_auto_scale());

    validate(&mut scale, &mut [Source::new(10.0, 20.0, 10.0)]);
    assert_eq!(scale.price_range(), Some(PriceRange::new(0.0, 1_000.0)));

    scale.set_mode(PriceScaleStateChange {
        auto_scale: Some(true),
        ..PriceScaleStateChange::default()
    });
    assert!(!scale.is_custom_price_range());
    validate(&mut scale, &mut [Source::new(10.0, 20.0, 10.0)]);
    assert_eq!(scale.price_range(), Some(PriceRange::new(10.0, 20.0)));
}

#[test]
fn custom_range_in_log_mode_is_stored_in_log_space() {
    let mut scale = scale_with(PriceScaleOptions {
        mode: PriceScaleMode::Logarithmic,
        ..PriceScaleOptions::default()
    });
    scale.set_custom_price_range(Some(PriceRange::new(10.0, 1_000.0)));
    let internal = scale.price_range().expect("internal");
    assert!(internal.max() < 10.0);
    let raw = scale.raw_price_range().expect("raw");
    assert_abs_diff_eq!(raw.min(), 10.0, epsilon = 1e-6);
    assert_abs_diff_eq!(raw.max(), 1_000.0, epsilon = 1e-6);
}

#[test]
fn narrow_log_ranges_keep_their_precision() {
    let mut scale = scale_with(PriceScaleOptions {
        mode: PriceScaleMode::Logarithmic,
        ..PriceScaleOptions::default()
    });
    validate(&mut scale, &mut [Source::new(1.0001, 1.0002, 1.0001)]);
    let raw = scale.raw_price_range().expect("raw");
    assert_abs_diff_eq!(raw.min(), 1.0001, epsilon = 1e-9);
    assert_abs_diff_eq!(raw.max(), 1.0002, epsilon = 1e-9);

    let low = scale.price_to_coordinate(1.0001, 1.0001);
    let high = scale.price_to_coordinate(1.0002, 1.0001);
    assert!(low - high > 300.0);
}

#[test]
fn switching_to_percentage_forces_autoscale() {
    let mut scale = scale_with(PriceScaleOptions::default());
    scale.set_auto_scale(false);
    scale.set_mode(PriceScaleStateChange {
        mode: Some(PriceScaleMode::Percentage),
        ..PriceScaleStateChange::default()
    });
    let state = scale.mode();
    assert!(state.auto_scale);
    assert_eq!(state.mode, PriceScaleMode::Percentage);
}

#[test]
fn apply_options_validates_margins_before_changing_anything() {
    let mut scale = scale_with(PriceScaleOptions::default());
    let mut options = PriceScaleOptions {
        invert_scale: true,
        ..PriceScaleOptions::default()
    };
    options.scale_margins.top = 0.8;
    options.scale_margins.bottom = 0.5;
    assert!(scale.apply_options(options).is_err());
    assert!(!scale.is_inverted());

    options.scale_margins.bottom = 0.1;
    scale.apply_options(options).expect("options");
    assert!(scale.is_inverted());
}

#[test]
fn empty_scale_maps_to_zero() {
    let scale = scale_with(PriceScaleOptions::default());
    assert!(scale.is_empty());
    assert_eq!(scale.price_to_coordinate(42.0, 42.0), 0.0);
    assert_eq!(scale.coordinate_to_logical(10.0).expect("logical"), 0.0);
    assert!(scale.coordinate_to_logical(f64::NAN).is_err());
}
