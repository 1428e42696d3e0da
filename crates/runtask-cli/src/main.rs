//! runtask CLI
//!
//! Renders Step Functions ECS RunTask task states from YAML task files.

use clap::Parser;

use runtask_cli::{Cli, Result};
use runtask_common::telemetry::init_telemetry;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_telemetry(cli.telemetry_config())?;
    cli.run()
}
