//! Observability: metric definitions recorded through the `metrics` facade.

pub mod metrics;
