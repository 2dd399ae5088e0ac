// Matrix benchmark command

use std::time::Duration;

use crate::output::{micros, print_table_header, print_table_row, OutputFormat};
use anyhow::{Context, Result};
use clap::Args;
use dispatchbench_harness::bench::{matrix, MatrixRunner, MeasurementPlan, Phase, ScenarioReport};
use dispatchbench_harness::{HarnessConfig, Strategy};
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Args)]
pub struct MatrixArgs {
    /// Strategies to measure (repeatable; default: all)
    #[arg(long = "strategy")]
    pub strategies: Vec<Strategy>,

    /// Query tasks per invocation
    #[arg(long, default_value_t = 100)]
    pub requests: usize,

    /// Worker counts to measure (comma-separated)
    #[arg(long, value_delimiter = ',', default_values_t = [1000, 100, 10])]
    pub workers: Vec<usize>,

    /// Warmup iterations per scenario
    #[arg(long, default_value_t = 3)]
    pub warmup: u32,

    /// Measurement iterations per scenario
    #[arg(long, default_value_t = 5)]
    pub iterations: u32,

    /// Time budget per iteration in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub iteration_ms: u64,
}

impl MatrixArgs {
    fn plan(&self) -> MeasurementPlan {
        MeasurementPlan {
            warmup_iterations: self.warmup,
            measurement_iterations: self.iterations,
            iteration_time: Duration::from_millis(self.iteration_ms),
        }
    }
}

pub fn run(args: MatrixArgs, base: HarnessConfig, output: OutputFormat, quiet: bool) -> Result<()> {
    let strategies = if args.strategies.is_empty() {
        Strategy::ALL.to_vec()
    } else {
        args.strategies.clone()
    };
    let scenarios = matrix(&strategies, &[args.requests], &args.workers);
    let runner = MatrixRunner::new(args.plan(), base);

    let mut reports = Vec::with_capacity(scenarios.len());
    for scenario in scenarios {
        let pb = if output.is_text() && !quiet {
            ProgressBar::new(runner.plan().total_iterations() as u64)
        } else {
            ProgressBar::hidden()
        };
        pb.set_style(
            ProgressStyle::default_bar()
                .template("   {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("=>-"),
        );
        pb.set_message(scenario.label());

        let report = runner
            .run_scenario_with(scenario, |iteration| {
                if iteration.phase == Phase::Measurement && iteration.index == 1 {
                    pb.set_message(format!("{} (measuring)", scenario.label()));
                }
                pb.inc(1);
            })
            .with_context(|| format!("Scenario {} failed", scenario.label()))?;

        pb.finish_and_clear();
        reports.push(report);
    }

    if output.is_text() {
        print_reports(&reports);
        Ok(())
    } else {
        output.print_value(&reports)
    }
}

fn print_reports(reports: &[ScenarioReport]) {
    print_table_header(&[
        ("STRATEGY", 14),
        ("REQUESTS", 8),
        ("WORKERS", 7),
        ("INVOCATIONS", 11),
        ("MEAN us", 12),
        ("P50 us", 12),
        ("P99 us", 12),
        ("FAILED", 6),
    ]);

    for report in reports {
        let scenario = &report.scenario;
        print_table_row(&[
            (&scenario.strategy.to_string(), 14),
            (&scenario.request_count.to_string(), 8),
            (&scenario.worker_count.to_string(), 7),
            (&report.invocations.to_string(), 11),
            (&micros(report.latency.mean), 12),
            (&micros(report.latency.p50), 12),
            (&micros(report.latency.p99), 12),
            (&report.failed_tasks.to_string(), 6),
        ]);
    }
}
