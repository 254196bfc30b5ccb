use crate::cli::AggregateArgs;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use eqsweep::core::design::DesignSpace;
use eqsweep::engine::progress::ProgressReporter;
use eqsweep::workflows::aggregate::{self, AggregateConfig};
use tracing::warn;

pub fn run(args: AggregateArgs) -> Result<()> {
    let config = AggregateConfig {
        design: DesignSpace::default(),
        results_dir: args.results_dir,
        out_dir: args.out_dir,
    };

    let handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(handler.get_callback());
    let outcome = aggregate::run(&config, None, &reporter)?;

    let summary = &outcome.summary;
    println!("\nAggregation summary");
    println!("  design points:   {}", summary.total_points);
    println!("  with results:    {}", summary.with_result);
    println!(
        "  converged:       {} ({:.1}%)",
        summary.converged,
        summary.convergence_rate * 100.0
    );
    println!("  unique phases:   {}", summary.unique_phases);
    println!("  wide table:      {}", outcome.wide_csv.display());
    println!("  long table:      {}", outcome.long_csv.display());
    println!("  summary:         {}", outcome.summary_json.display());

    for (id, warnings) in &outcome.validation_warnings {
        warn!(id = %id, warnings = ?warnings, "Implausible result kept with warnings.");
    }
    if !outcome.validation_warnings.is_empty() {
        println!(
            "  ⚠ {} result(s) failed plausibility validation (kept, flagged in log)",
            outcome.validation_warnings.len()
        );
    }

    Ok(())
}
