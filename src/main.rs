use anyhow::Result;
use billtimer::{cli::run_cli, cli::Args, utils::runtime::single_thread_runtime};
use clap::Parser;
use tracing::error;

fn main() -> Result<()> {
    let args = Args::parse();

    single_thread_runtime()?
        .block_on(run_cli(args))
        .inspect_err(|e| {
            error!("Error running cli {e:?}");
        })?;
    Ok(())
}
