//! Korobu: human fall-detection experiments over body-pose landmark streams.
//!
//! The crate turns per-frame pose landmarks into fixed-size, overlapping
//! training samples and runs them through a small ensemble of trainable
//! classifiers:
//!
//! * frame sources ([`video`]) yield image sequences,
//! * a pose extractor ([`pose`]) turns frames into landmark sets,
//! * dataset buffers ([`dataset`]) pre-scan whole sequences with labels
//!   aligned by processed-frame index,
//! * the windowing pipeline ([`window`]) aggregates retained frames into
//!   sliding windows and derives motion features ([`feature`]),
//! * the classifier ensemble ([`classifier`]) trains and predicts on the
//!   emitted samples, and the sweep driver ([`sweep`]) iterates
//!   configurations, reporting per-class recall ([`metrics`], [`report`]).
//!
//! # Coordinates & units
//!
//! Landmark coordinates are normalized to the detection region. Derived
//! velocities assume the fixed 30 fps frame rate ([`feature::FRAME_RATE`])
//! and are reported in cm/s; neither is detected at runtime.

use log::LevelFilter;

pub mod classifier;
pub mod config;
pub mod dataset;
pub mod detect;
pub mod feature;
pub mod landmark;
pub mod metrics;
pub mod nn;
pub mod pose;
pub mod report;
pub mod sweep;
pub mod timer;
pub mod video;
pub mod window;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = if cfg!(debug_assertions) {
        LevelFilter::Trace
    } else {
        LevelFilter::Debug
    };
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_PKG_NAME")), log_level)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// If `cfg!(debug_assertions)` is enabled, the calling crate and Korobu will
/// log at *trace* level. Otherwise, they will log at *debug* level.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
