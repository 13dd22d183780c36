use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::SeriesId;
use crate::error::{ChartError, ChartResult};

use super::price_scale::{PriceScale, PriceScaleOptions};

pub const LEFT_PRICE_SCALE_ID: &str = "left";
pub const RIGHT_PRICE_SCALE_ID: &str = "right";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PaneId(u32);

impl PaneId {
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Vertical strip of the chart with its left, right and overlay price scales.
#[derive(Debug, Clone)]
pub struct Pane {
    id: PaneId,
    height: f64,
    stretch_factor: f64,
    left_price_scale: PriceScale,
    right_price_scale: PriceScale,
    overlay_price_scales: BTreeMap<String, PriceScale>,
}

impl Pane {
    pub fn new(
        id: PaneId,
        left_options: PriceScaleOptions,
        right_options: PriceScaleOptions,
    ) -> ChartResult<Self> {
        Ok(Self {
            id,
            height: 0.0,
            stretch_factor: 1.0,
            left_price_scale: PriceScale::new(LEFT_PRICE_SCALE_ID, left_options)?,
            right_price_scale: PriceScale::new(RIGHT_PRICE_SCALE_ID, right_options)?,
            overlay_price_scales: BTreeMap::new(),
        })
    }

    #[must_use]
    pub fn id(&self) -> PaneId {
        self.id
    }

    #[must_use]
    pub fn stretch_factor(&self) -> f64 {
        self.stretch_factor
    }

    pub fn set_stretch_factor(&mut self, stretch_factor: f64) -> ChartResult<()> {
        if !stretch_factor.is_finite() || stretch_factor <= 0.0 {
            return Err(ChartError::InvalidConfiguration(
                "pane stretch factor must be finite and > 0".to_owned(),
            ));
        }
        self.stretch_factor = stretch_factor;
        Ok(())
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Propagates the pane height to every price scale, overlays included.
    pub fn set_height(&mut self, height: f64) {
        self.height = height;
        for scale in self.price_scales_mut() {
            scale.set_height(height);
        }
    }

    #[must_use]
    pub fn left_price_scale(&self) -> &PriceScale {
        &self.left_price_scale
    }

    #[must_use]
    pub fn right_price_scale(&self) -> &PriceScale {
        &self.right_price_scale
    }

    #[must_use]
    pub fn price_scale(&self, id: &str) -> Option<&PriceScale> {
        match id {
            LEFT_PRICE_SCALE_ID => Some(&self.left_price_scale),
            RIGHT_PRICE_SCALE_ID => Some(&self.right_price_scale),
            _ => self.overlay_price_scales.get(id),
        }
    }

    pub fn price_scale_mut(&mut self, id: &str) -> Option<&mut PriceScale> {
        match id {
            LEFT_PRICE_SCALE_ID => Some(&mut self.left_price_scale),
            RIGHT_PRICE_SCALE_ID => Some(&mut self.right_price_scale),
            _ => self.overlay_price_scales.get_mut(id),
        }
    }

    /// Returns the scale `id`, creating an overlay scale with `options` and
    /// the pane's height when it does not exist yet.
    pub fn ensure_price_scale(
        &mut self,
        id: &str,
        options: PriceScaleOptions,
    ) -> ChartResult<&mut PriceScale> {
        if self.price_scale(id).is_none() {
            let mut scale = PriceScale::new(id, options)?;
            scale.set_height(self.height);
            self.overlay_price_scales.insert(id.to_owned(), scale);
        }
        self.price_scale_mut(id)
            .ok_or_else(|| ChartError::UnknownPriceScale(id.to_owned()))
    }

    pub fn price_scales_mut(&mut self) -> impl Iterator<Item = &mut PriceScale> {
        [&mut self.left_price_scale, &mut self.right_price_scale]
            .into_iter()
            .chain(self.overlay_price_scales.values_mut())
    }

    pub fn price_scales(&self) -> impl Iterator<Item = &PriceScale> {
        [&self.left_price_scale, &self.right_price_scale]
            .into_iter()
            .chain(self.overlay_price_scales.values())
    }

    /// Detaches `series` from whichever scale holds it; empty overlay scales
    /// are dropped.
    pub fn remove_source(&mut self, series: SeriesId) {
        for scale in self.price_scales_mut() {
            scale.remove_source(series);
        }
        self.overlay_price_scales
            .retain(|_, scale| !scale.source_ids().is_empty());
    }
}
