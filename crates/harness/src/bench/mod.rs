//! Benchmark driver
//!
//! Repeats invocations across the configuration matrix under a
//! warmup/measurement schedule and summarizes dispatch latency.

mod metrics;
mod runner;

pub use metrics::{LatencyHistogram, LatencySummary};
pub use runner::{
    default_matrix, matrix, IterationReport, MatrixRunner, MeasurementPlan, Phase, Scenario,
    ScenarioReport,
};
