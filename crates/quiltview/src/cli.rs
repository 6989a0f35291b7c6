use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use quiltconfig::{parse_assignment, ParamId};

#[derive(Parser, Debug)]
#[command(
    name = "quiltview",
    author,
    version,
    about = "Depth-map parallax viewer",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Color image to synthesize views of.
    #[arg(long, value_name = "IMAGE")]
    pub color: Option<PathBuf>,

    /// Depth map matching the color image; brighter is nearer.
    #[arg(long, value_name = "IMAGE")]
    pub depth: Option<PathBuf>,

    #[command(flatten)]
    pub params: ParamArgs,

    /// Render one frame to the given PNG path and exit instead of opening a window.
    #[arg(long, value_name = "PATH")]
    pub export: Option<PathBuf>,

    /// Drive the gyroscope from the arrow keys (`L` rotates to landscape).
    #[arg(long)]
    pub simulate_tilt: bool,

    /// Gyroscope sensitivity, clamped to the configured range.
    #[arg(long, value_name = "SENSITIVITY")]
    pub gyro_sensitivity: Option<f32>,

    /// Window size before an image is loaded (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,
}

/// Options that decide the parameter set, shared by the viewer and `params`.
#[derive(Args, Debug, Default)]
pub struct ParamArgs {
    /// Configuration file; overrides `$QUILTVIEW_CONFIG` and the user config.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Override a parameter after the config is applied (repeatable).
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_set)]
    pub set: Vec<(ParamId, f32)>,

    /// Border color as `#RRGGBB`.
    #[arg(long, value_name = "HEX")]
    pub border_color: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the resolved parameters and control ranges as JSON.
    Params(ParamArgs),
    /// Inspect configuration discovery.
    Config(ConfigCommand),
}

#[derive(Args, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print which configuration file would be loaded.
    Where,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_set(value: &str) -> Result<(ParamId, f32), String> {
    parse_assignment(value).map_err(|err| err.to_string())
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT, e.g. 1280x720".to_string())?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width '{width}'"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height '{height}'"))?;
    if width == 0 || height == 0 {
        return Err("window dimensions must be greater than zero".to_string());
    }
    Ok((width, height))
}
