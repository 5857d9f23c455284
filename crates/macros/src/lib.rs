//! Macros for recording metrics across the Kanvas node.
//!
//! All macros compile to nothing unless the `metrics` feature is enabled,
//! so call sites do not need their own feature gates.

#![cfg_attr(not(feature = "metrics"), allow(unused))]

/// Sets a gauge metric, optionally with a `label => value` pair.
#[macro_export]
macro_rules! set {
    (gauge, $metric:expr, $label:expr, $label_value:expr, $value:expr) => {
        #[cfg(feature = "metrics")]
        metrics::gauge!($metric, $label => $label_value).set($value);
    };
    (gauge, $metric:expr, $value:expr) => {
        #[cfg(feature = "metrics")]
        metrics::gauge!($metric).set($value as f64);
    };
    (counter, $metric:expr, $value:expr) => {
        #[cfg(feature = "metrics")]
        metrics::counter!($metric).absolute($value);
    };
}

/// Increments a counter or gauge metric, optionally with a `label => value` pair.
#[macro_export]
macro_rules! inc {
    (counter, $metric:expr) => {
        #[cfg(feature = "metrics")]
        metrics::counter!($metric).increment(1);
    };
    (counter, $metric:expr, $label:expr => $label_value:expr) => {
        #[cfg(feature = "metrics")]
        metrics::counter!($metric, $label => $label_value).increment(1);
    };
    (gauge, $metric:expr) => {
        #[cfg(feature = "metrics")]
        metrics::gauge!($metric).increment(1);
    };
    (gauge, $metric:expr, $label:expr => $label_value:expr) => {
        #[cfg(feature = "metrics")]
        metrics::gauge!($metric, $label => $label_value).increment(1);
    };
}

/// Records a duration gauge metric from an [`std::time::Instant`] start.
#[macro_export]
macro_rules! record {
    ($metric:expr, $start:expr) => {
        #[cfg(feature = "metrics")]
        metrics::gauge!($metric).set($start.elapsed().as_secs_f64());
    };
}
