//! Stateful models following the Lightweight Charts v5.1 layout.

pub mod model;
