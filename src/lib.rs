//! chart-timeline: timeline, coordinate and conflation core for financial
//! time-series charts.
//!
//! Series data is merged onto one shared timeline by
//! [`lwc::model::DataLayer`], mapped to pixels by [`lwc::model::TimeScale`]
//! and [`lwc::model::PriceScale`], and reduced for low zoom levels by the
//! [`conflation`] engine. [`lwc::model::ChartModel`] ties them together
//! without drawing anything.

pub mod conflation;
pub mod core;
pub mod error;
pub mod lwc;
pub mod telemetry;

pub use error::{ChartError, ChartResult};
pub use lwc::model::{ChartModel, ChartModelOptions};
