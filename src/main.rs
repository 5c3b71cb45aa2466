use std::process::ExitCode;

use clap::Parser;

use pixelai::cli::{self, CliArgs};
use pixelai::logger;
use pixelai::settings::Settings;

fn main() -> ExitCode {
    // Initialize session log (overwrites previous session log)
    logger::init();

    let args = CliArgs::parse();
    let settings = Settings::load();
    cli::run(args, settings)
}
