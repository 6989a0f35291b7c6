use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use image::{Rgba, RgbaImage};
use tempfile::TempDir;

fn quiltview(home: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_quiltview"));
    command
        .env("XDG_CONFIG_HOME", home.join("xdg"))
        .env_remove("QUILTVIEW_CONFIG")
        .env("RUST_LOG", "warn");
    command
}

fn write_color(dir: &Path) -> (PathBuf, RgbaImage) {
    let image = RgbaImage::from_fn(4, 3, |x, y| {
        Rgba([(x * 60) as u8, (y * 100) as u8, 200 - (x * 40) as u8, 255])
    });
    let path = dir.join("color.png");
    image.save(&path).unwrap();
    (path, image)
}

fn write_depth(dir: &Path, value: u8) -> PathBuf {
    let image = RgbaImage::from_pixel(4, 3, Rgba([value, value, value, 255]));
    let path = dir.join(format!("depth-{value}.png"));
    image.save(&path).unwrap();
    path
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "quiltview failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn export_with_mid_depth_reproduces_the_photo() {
    let root = TempDir::new().unwrap();
    let (color, expected) = write_color(root.path());
    let depth = write_depth(root.path(), 128);
    let out = root.path().join("out.png");

    let output = quiltview(root.path())
        .arg("--color")
        .arg(&color)
        .arg("--depth")
        .arg(&depth)
        .arg("--export")
        .arg(&out)
        .output()
        .expect("failed to run quiltview --export");
    assert_success(&output);

    let rendered = image::open(&out).unwrap().to_rgba8();
    assert_eq!(rendered.dimensions(), (4, 3));
    assert_eq!(rendered, expected);
}

#[test]
fn receding_edges_take_the_border_color() {
    let root = TempDir::new().unwrap();
    let (color, expected) = write_color(root.path());
    let depth = write_depth(root.path(), 0);
    let out = root.path().join("framed.png");

    let output = quiltview(root.path())
        .arg("--color")
        .arg(&color)
        .arg("--depth")
        .arg(&depth)
        .args(["--set", "border_size_x=0.2", "--border-color", "#ff0000"])
        .arg("--export")
        .arg(&out)
        .output()
        .expect("failed to run quiltview --export");
    assert_success(&output);

    let rendered = image::open(&out).unwrap().to_rgba8();
    for y in 0..3 {
        assert_eq!(rendered.get_pixel(0, y), &Rgba([255, 0, 0, 255]));
        assert_eq!(rendered.get_pixel(3, y), &Rgba([255, 0, 0, 255]));
        for x in 1..3 {
            assert_eq!(rendered.get_pixel(x, y), expected.get_pixel(x, y));
        }
    }
}

#[test]
fn export_without_images_fails() {
    let root = TempDir::new().unwrap();
    let output = quiltview(root.path())
        .arg("--export")
        .arg(root.path().join("nothing.png"))
        .output()
        .expect("failed to run quiltview --export");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--color"));
}

#[test]
fn params_reports_clamped_overrides_as_json() {
    let root = TempDir::new().unwrap();
    let output = quiltview(root.path())
        .args(["params", "--set", "x_diff=50", "--set", "protrude=-0.25"])
        .output()
        .expect("failed to run quiltview params");
    assert_success(&output);

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["parameters"]["x_diff"], 10.0);
    assert_eq!(report["parameters"]["protrude"], -0.25);
    assert_eq!(report["border_color_hex"], "#000000");
}

#[test]
fn params_reads_config_from_environment() {
    let root = TempDir::new().unwrap();
    let config = root.path().join("quilt.toml");
    fs::write(
        &config,
        "version = 1\n[sliders.threshold]\nvalue = 50.0\n[border]\ncolor = \"#00FF00\"\n",
    )
    .unwrap();

    let output = quiltview(root.path())
        .env("QUILTVIEW_CONFIG", &config)
        .arg("params")
        .output()
        .expect("failed to run quiltview params");
    assert_success(&output);

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["parameters"]["threshold"], 50.0);
    assert_eq!(report["border_color_hex"], "#00ff00");
}

#[test]
fn invalid_config_is_rejected() {
    let root = TempDir::new().unwrap();
    let config = root.path().join("broken.toml");
    fs::write(&config, "version = 1\n[sliders.wobble]\nvalue = 1.0\n").unwrap();

    let output = quiltview(root.path())
        .arg("params")
        .arg("--config")
        .arg(&config)
        .output()
        .expect("failed to run quiltview params");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("wobble"));
}

#[test]
fn config_where_falls_back_to_defaults() {
    let root = TempDir::new().unwrap();
    let output = quiltview(root.path())
        .args(["config", "where"])
        .output()
        .expect("failed to run quiltview config where");
    assert_success(&output);
    assert!(String::from_utf8_lossy(&output.stdout).contains("built-in defaults"));
}
