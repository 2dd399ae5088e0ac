//! Warmup/measurement driver
//!
//! Repeats invocations of one scenario in timed iterations. Each
//! iteration keeps invoking until its time budget is spent; warmup
//! iterations are discarded, measurement iterations feed a histogram of
//! dispatch windows.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info};

use super::metrics::{LatencyHistogram, LatencySummary};
use crate::config::{HarnessConfig, Strategy};
use crate::error::HarnessError;
use crate::lifecycle::InvocationLifecycle;

/// Warmup and measurement schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasurementPlan {
    /// Iterations whose samples are discarded
    pub warmup_iterations: u32,
    /// Iterations whose samples are kept
    pub measurement_iterations: u32,
    /// Time budget per iteration
    pub iteration_time: Duration,
}

impl Default for MeasurementPlan {
    fn default() -> Self {
        Self {
            warmup_iterations: 3,
            measurement_iterations: 5,
            iteration_time: Duration::from_secs(1),
        }
    }
}

impl MeasurementPlan {
    /// Total iterations per scenario
    pub fn total_iterations(&self) -> u32 {
        self.warmup_iterations + self.measurement_iterations
    }
}

/// One cell of the configuration matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Scenario {
    pub strategy: Strategy,
    pub request_count: usize,
    pub worker_count: usize,
}

impl Scenario {
    /// Human-readable scenario name
    pub fn label(&self) -> String {
        format!(
            "{}/requests={}/workers={}",
            self.strategy, self.request_count, self.worker_count
        )
    }
}

/// Cartesian product of the given axes, strategy-major
pub fn matrix(strategies: &[Strategy], request_counts: &[usize], worker_counts: &[usize]) -> Vec<Scenario> {
    let mut scenarios = Vec::new();
    for &strategy in strategies {
        for &request_count in request_counts {
            for &worker_count in worker_counts {
                scenarios.push(Scenario {
                    strategy,
                    request_count,
                    worker_count,
                });
            }
        }
    }
    scenarios
}

/// The benchmark matrix: both strategies, 100 requests, 1000/100/10 workers
pub fn default_matrix() -> Vec<Scenario> {
    matrix(&Strategy::ALL, &[100], &[1000, 100, 10])
}

/// Which part of the schedule an iteration belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Warmup,
    Measurement,
}

/// Progress of one finished iteration
#[derive(Debug, Clone)]
pub struct IterationReport {
    pub phase: Phase,
    /// 1-based within its phase
    pub index: u32,
    pub invocations: u64,
    pub mean: Duration,
}

/// Measured outcome of one scenario
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub scenario: Scenario,
    /// Measured invocations (warmup excluded)
    pub invocations: u64,
    /// Failed tasks across measured invocations
    pub failed_tasks: u64,
    /// Dispatch window distribution
    pub latency: LatencySummary,
}

/// Runs scenarios of the matrix against one base configuration
pub struct MatrixRunner {
    plan: MeasurementPlan,
    base: HarnessConfig,
}

impl MatrixRunner {
    /// `base` supplies the target and pool settings; each scenario
    /// overrides strategy, request count and worker count.
    pub fn new(plan: MeasurementPlan, base: HarnessConfig) -> Self {
        Self { plan, base }
    }

    pub fn plan(&self) -> &MeasurementPlan {
        &self.plan
    }

    /// Run one scenario under the plan
    pub fn run_scenario(&self, scenario: Scenario) -> Result<ScenarioReport, HarnessError> {
        self.run_scenario_with(scenario, |_| {})
    }

    /// Run one scenario, reporting each finished iteration
    ///
    /// The first failing invocation aborts the scenario.
    pub fn run_scenario_with<P>(
        &self,
        scenario: Scenario,
        mut progress: P,
    ) -> Result<ScenarioReport, HarnessError>
    where
        P: FnMut(&IterationReport),
    {
        let config = self
            .base
            .clone()
            .with_strategy(scenario.strategy)
            .with_request_count(scenario.request_count)
            .with_worker_count(scenario.worker_count);

        info!(scenario = %scenario.label(), "running scenario");

        let measured = LatencyHistogram::new();
        let mut failed_tasks = 0u64;

        let phases = [
            (Phase::Warmup, self.plan.warmup_iterations),
            (Phase::Measurement, self.plan.measurement_iterations),
        ];

        for (phase, iterations) in phases {
            for index in 1..=iterations {
                let iteration = LatencyHistogram::new();
                let deadline = Instant::now() + self.plan.iteration_time;

                loop {
                    let batch = InvocationLifecycle::run(&config)?;
                    iteration.record(batch.elapsed);
                    if phase == Phase::Measurement {
                        measured.record(batch.elapsed);
                        failed_tasks += batch.failed as u64;
                    }
                    if Instant::now() >= deadline {
                        break;
                    }
                }

                let report = IterationReport {
                    phase,
                    index,
                    invocations: iteration.count(),
                    mean: iteration.mean(),
                };
                debug!(
                    ?phase,
                    index,
                    invocations = report.invocations,
                    mean_us = report.mean.as_micros() as u64,
                    "iteration complete"
                );
                progress(&report);
            }
        }

        let latency = measured.summary();
        info!(
            scenario = %scenario.label(),
            invocations = latency.count,
            mean_us = latency.mean.as_micros() as u64,
            "scenario complete"
        );

        Ok(ScenarioReport {
            scenario,
            invocations: latency.count,
            failed_tasks,
            latency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionTarget;

    #[test]
    fn test_default_plan() {
        let plan = MeasurementPlan::default();
        assert_eq!(plan.warmup_iterations, 3);
        assert_eq!(plan.measurement_iterations, 5);
        assert_eq!(plan.iteration_time, Duration::from_secs(1));
        assert_eq!(plan.total_iterations(), 8);
    }

    #[test]
    fn test_default_matrix() {
        let scenarios = default_matrix();
        assert_eq!(scenarios.len(), 6);
        assert!(scenarios.iter().all(|s| s.request_count == 100));
        assert_eq!(
            scenarios
                .iter()
                .filter(|s| s.strategy == Strategy::WorkStealing)
                .count(),
            3
        );
        assert_eq!(scenarios[0].worker_count, 1000);
        assert_eq!(scenarios[0].strategy, Strategy::FixedPool);
    }

    #[test]
    fn test_scenario_label() {
        let scenario = Scenario {
            strategy: Strategy::WorkStealing,
            request_count: 100,
            worker_count: 10,
        };
        assert_eq!(scenario.label(), "work-stealing/requests=100/workers=10");
    }

    #[test]
    fn test_invocation_error_aborts_scenario() {
        let base = HarnessConfig::new(ConnectionTarget::new("sqlite:///nonexistent/users.db"));
        let runner = MatrixRunner::new(MeasurementPlan::default(), base);
        let mut iterations = 0;

        let result = runner.run_scenario_with(
            Scenario {
                strategy: Strategy::FixedPool,
                request_count: 10,
                worker_count: 0,
            },
            |_| iterations += 1,
        );

        assert!(matches!(result, Err(HarnessError::SchedulerInit(_))));
        assert_eq!(iterations, 0);
    }
}
