use crate::cli::RunArgs;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use eqsweep::engine::config::{SchedulingMode, SweepConfigBuilder};
use eqsweep::engine::progress::ProgressReporter;
use eqsweep::workflows::{aggregate, sweep};
use tracing::info;

pub fn run(args: RunArgs) -> Result<()> {
    let scheduling = if args.workers > 1 {
        SchedulingMode::Parallel {
            workers: args.workers,
        }
    } else {
        SchedulingMode::Sequential
    };

    let mut builder = SweepConfigBuilder::new()
        .work_dir(args.work_dir.clone())
        .timeout_secs(args.timeout)
        .scheduling(scheduling)
        .skip_existing(!args.no_skip_existing)
        .retry_rounds(args.retry_rounds)
        .discover(!args.no_discover);
    if let Some(executable) = args.executable {
        builder = builder.executable(executable);
    }
    if let Some(database) = args.database {
        builder = builder.database(database);
    }
    let config = builder.build()?;

    info!(
        points = config.design.len(),
        workers = args.workers,
        timeout_secs = args.timeout,
        "Starting sweep."
    );

    let handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(handler.get_callback());
    let outcome = sweep::run(&config, &reporter)?;

    let summary = &outcome.summary;
    println!("\nBatch summary");
    println!("  strategy:        {}", outcome.strategy_name);
    println!("  total:           {}", summary.total);
    println!(
        "  completed:       {} ({:.1}%)",
        summary.completed,
        summary.success_rate * 100.0
    );
    println!("  failed:          {}", summary.failed);
    println!("  timeouts:        {}", summary.timeout);
    println!(
        "  converged:       {:.1}%",
        summary.convergence_rate * 100.0
    );
    println!(
        "  mean task time:  {:.3}s (min {:.3}s, max {:.3}s)",
        summary.mean_task_time_s, summary.min_task_time_s, summary.max_task_time_s
    );
    if !summary.failure_breakdown.is_empty() {
        println!("  failures by kind:");
        for (kind, count) in &summary.failure_breakdown {
            println!("    {kind}: {count}");
        }
    }

    if let Some(export_dir) = args.export_dir {
        info!(out_dir = %export_dir.display(), "Exporting aggregated tables.");
        let exported = aggregate::export_outcome(
            &outcome.points,
            &outcome.results,
            Some(&outcome.compositions),
            &export_dir,
        )?;
        println!("\nExports");
        println!("  wide table:  {}", exported.wide_csv.display());
        println!("  long table:  {}", exported.long_csv.display());
        println!("  summary:     {}", exported.summary_json.display());
        if !exported.validation_warnings.is_empty() {
            println!(
                "  ⚠ {} result(s) failed plausibility validation (see log)",
                exported.validation_warnings.len()
            );
        }
    }

    Ok(())
}
