mod cli;
mod export;
mod paths;
mod run;

use anyhow::Result;
use cli::{Command, ConfigAction};

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Params(args)) => run::print_params(&args),
        Some(Command::Config(config_cmd)) => match config_cmd.action {
            ConfigAction::Where => run::print_config_location(),
        },
        None => run::run(cli.run),
    }
}
