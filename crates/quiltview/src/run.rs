use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use controls::{ParamEvent, ParameterStore};
use quiltconfig::{BorderColor, ControlSurface, QuiltConfig, RenderParameters};
use renderer::{Renderer, RendererConfig, TiltSource};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::cli::{ParamArgs, RunArgs};
use crate::export::export_frame;
use crate::paths::{discover_config, ConfigSource};

pub fn run(args: RunArgs) -> Result<()> {
    let store = build_store(&args.params)?;

    if let Some(output) = args.export.as_deref() {
        export_frame(
            &store,
            args.color.as_deref(),
            args.depth.as_deref(),
            output,
        )?;
        return Ok(());
    }

    let mut config = RendererConfig {
        store,
        color_image: args.color,
        depth_image: args.depth,
        tilt: if args.simulate_tilt {
            TiltSource::Simulated
        } else {
            TiltSource::Unavailable
        },
        gyro_sensitivity: args.gyro_sensitivity,
        ..RendererConfig::default()
    };
    if let Some(size) = args.size {
        config.surface_size = size;
    }

    tracing::info!(
        color = ?config.color_image,
        depth = ?config.depth_image,
        tilt = ?config.tilt,
        "opening quiltview preview"
    );
    Renderer::new(config).run()
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout carries `params` output.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Config first, then `--set` overrides, then `--border-color`. Overrides go
/// through the store so they are clamped like any other input.
pub fn build_store(args: &ParamArgs) -> Result<ParameterStore> {
    let surface = load_control_surface(args.config.as_deref())?;
    let mut store = ParameterStore::new(surface);

    for &(id, value) in &args.set {
        if !store.apply(ParamEvent::Set { id, value }) {
            tracing::warn!(param = %id, "override ignored; control is not present");
        }
    }

    if let Some(raw) = &args.border_color {
        let color = BorderColor::try_from_hex(raw).unwrap_or_else(|| {
            tracing::debug!(color = %raw, "malformed border colour; using black");
            BorderColor::BLACK
        });
        store.apply(ParamEvent::SetBorderColor(color));
    }

    Ok(store)
}

fn load_control_surface(explicit: Option<&Path>) -> Result<ControlSurface> {
    let source = discover_config(explicit)?;
    let Some(path) = source.path() else {
        tracing::debug!("no configuration file found; using built-in controls");
        return Ok(ControlSurface::default());
    };

    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config = QuiltConfig::from_toml_str(&contents)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    let surface = config.control_surface()?;
    tracing::info!(config = %source, "loaded configuration");
    Ok(surface)
}

#[derive(Serialize)]
struct ParamsReport<'a> {
    parameters: &'a RenderParameters,
    border_color_hex: String,
    controls: &'a ControlSurface,
}

pub fn print_params(args: &ParamArgs) -> Result<()> {
    let store = build_store(args)?;
    let report = ParamsReport {
        parameters: store.params(),
        border_color_hex: store.params().border_color.to_hex(),
        controls: store.surface(),
    };
    let json = serde_json::to_string_pretty(&report).context("failed to encode parameters")?;
    println!("{json}");
    Ok(())
}

pub fn print_config_location() -> Result<()> {
    let source = discover_config(None)?;
    println!("Configuration: {source}");
    if let ConfigSource::BuiltIn = source {
        println!(
            "  create {} to customise the controls",
            crate::paths::user_config_file()?.display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiltconfig::ParamId;
    use tempfile::TempDir;

    #[test]
    fn overrides_apply_after_config_and_clamp() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("quilt.toml");
        fs::write(
            &config,
            "version = 1\n[sliders.x_diff]\nmin = -4.0\nmax = 4.0\nvalue = 1.0\n",
        )
        .unwrap();

        let args = ParamArgs {
            config: Some(config),
            set: vec![(ParamId::XDiff, 9.0), (ParamId::Threshold, 40.0)],
            border_color: Some("00ff00".into()),
        };
        let store = build_store(&args).unwrap();
        assert_eq!(store.params().x_diff, 4.0);
        assert_eq!(store.params().threshold, 40.0);
        assert_eq!(store.params().border_color.to_hex(), "#00ff00");
    }

    #[test]
    fn malformed_border_color_is_black() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("quilt.toml");
        fs::write(&config, "version = 1\n[border]\ncolor = \"#123456\"\n").unwrap();
        let args = ParamArgs {
            config: Some(config),
            set: Vec::new(),
            border_color: Some("teal".into()),
        };
        let store = build_store(&args).unwrap();
        assert_eq!(store.params().border_color, BorderColor::BLACK);
    }

    #[test]
    fn overrides_for_absent_controls_are_ignored() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("quilt.toml");
        fs::write(&config, "version = 1\n[sliders]\nmax_scale = false\n").unwrap();
        let args = ParamArgs {
            config: Some(config),
            set: vec![(ParamId::MaxScale, 2.0)],
            border_color: None,
        };
        let store = build_store(&args).unwrap();
        assert_eq!(store.params().max_scale, None);
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        let args = ParamArgs {
            config: Some(dir.path().join("absent.toml")),
            ..ParamArgs::default()
        };
        let err = build_store(&args).unwrap_err();
        assert!(format!("{err:#}").contains("absent.toml"));
    }
}
