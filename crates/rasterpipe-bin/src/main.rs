//! `rasterpipe` entrypoint: `rasterpipe <input_path> <output_path> [--kernel <path>]`.

use anyhow::Result;
use clap::Parser;
use core_config::Args;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = core_config::configure_logging()?;

    tracing::info!(target: "runtime", input = %args.input_path.display(), output = %args.output_path.display(), "startup");

    let kernel = core_config::load_kernel(args.kernel.as_deref())?;

    println!("rasterpipe: reading {}", args.input_path.display());
    let report = match core_pipeline::run_pipeline_from_paths(&args.input_path, &args.output_path, kernel).await {
        Ok(report) => report,
        Err(err) => {
            tracing::error!(target: "runtime", %err, "pipeline_failed");
            eprintln!("rasterpipe: {err:#}");
            std::process::exit(1);
        }
    };

    for band in &report.bands {
        println!(
            "rasterpipe: band {} done (read high-water {}, write high-water {})",
            band.band, band.read_buffer_max_size, band.write_buffer_max_size
        );
    }
    println!(
        "rasterpipe: wrote {} in {:.3}s",
        args.output_path.display(),
        report.elapsed.as_secs_f64()
    );
    tracing::info!(target: "runtime", elapsed_ms = report.elapsed.as_millis() as u64, "shutdown");

    Ok(())
}
