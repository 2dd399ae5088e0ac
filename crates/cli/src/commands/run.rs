// Single invocation command

use crate::output::{micros, print_field, OutputFormat};
use anyhow::{Context, Result};
use clap::Args;
use dispatchbench_harness::{BatchResult, HarnessConfig, InvocationLifecycle, LifecycleState, Strategy};
use serde::Serialize;

#[derive(Args)]
pub struct RunArgs {
    /// Scheduling strategy (fixed-pool, work-stealing)
    #[arg(long)]
    pub strategy: Option<Strategy>,

    /// Query tasks to dispatch
    #[arg(long)]
    pub requests: Option<usize>,

    /// Carrier threads in the scheduler
    #[arg(long)]
    pub workers: Option<usize>,
}

/// JSON shape of a finished run
#[derive(Serialize)]
struct RunReport<'a> {
    config: &'a HarnessConfig,
    trail: &'a [LifecycleState],
    batch: &'a BatchResult,
}

pub fn run(args: RunArgs, base: HarnessConfig, output: OutputFormat, quiet: bool) -> Result<()> {
    let mut config = base;
    if let Some(strategy) = args.strategy {
        config = config.with_strategy(strategy);
    }
    if let Some(requests) = args.requests {
        config = config.with_request_count(requests);
    }
    if let Some(workers) = args.workers {
        config = config.with_worker_count(workers);
    }

    let mut lifecycle = InvocationLifecycle::new(config.clone());
    let batch = lifecycle
        .execute()
        .with_context(|| format!("Invocation against {} failed", config.target.redacted()))?;

    if !output.is_text() {
        return output.print_value(&RunReport {
            config: &config,
            trail: lifecycle.trail(),
            batch: &batch,
        });
    }

    if quiet {
        println!("{}", micros(batch.elapsed));
        return Ok(());
    }

    print_field("Strategy", &config.strategy.to_string());
    print_field("Target", &config.target.redacted());
    print_field("Requests", &config.request_count.to_string());
    print_field("Workers", &config.worker_count.to_string());
    print_field("Succeeded", &batch.succeeded.to_string());
    print_field("Failed", &batch.failed.to_string());
    print_field("Elapsed (us)", &micros(batch.elapsed));
    if let Some(user) = &batch.sample {
        print_field(
            "Sample",
            &format!("{} {} <{}>", user.id, user.username, user.email),
        );
    }
    if let Some(error) = &batch.teardown_error {
        print_field("Teardown", error);
    }
    for failure in batch.failures.iter().take(5) {
        print_field("Failure", &failure.to_string());
    }
    if batch.failures.len() > 5 {
        println!("... and {} more failures", batch.failures.len() - 5);
    }

    Ok(())
}
