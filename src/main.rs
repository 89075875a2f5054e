use anyhow::Context;
use clap::Parser;
use sinca_harvester::cli::{run, Cli};
use sinca_harvester::settings::Settings;
use sinca_harvester::utils::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_file.as_deref()).context("failed to initialize logging")?;
    let settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;

    run(cli, settings).await?;
    Ok(())
}
