use assert_cmd::Command;
use image::{GrayImage, ImageBuffer, Luma, Rgb};
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn tagscan() -> Command {
    Command::cargo_bin("tagscan").expect("tagscan binary")
}

fn write_gray(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    GrayImage::from_pixel(32, 24, Luma([255u8]))
        .save(&path)
        .expect("write gray png");
    path
}

#[test]
fn config_prints_defaults() {
    let output = tagscan().arg("config").assert().success().get_output().stdout.clone();
    let cfg: serde_json::Value = serde_json::from_slice(&output).expect("json");
    assert_eq!(cfg["nthreads"], 4);
    assert_eq!(cfg["family"], "tag36h11");
    assert_eq!(cfg["refine_edges"], true);
    assert_eq!(cfg["quad_decimate"], 1.0);
}

#[test]
fn color_image_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rgb.png");
    let rgb: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(16, 16, Rgb([10, 20, 30]));
    rgb.save(&path).unwrap();

    tagscan()
        .arg("detect")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("tagscan:inputsize"));
}

#[test]
fn sixteen_bit_image_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gray16.png");
    let img: ImageBuffer<Luma<u16>, Vec<u16>> = ImageBuffer::from_pixel(16, 16, Luma([1000]));
    img.save(&path).unwrap();

    tagscan()
        .arg("detect")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("tagscan:inputtype"));
}

#[test]
fn seven_outputs_are_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_gray(dir.path(), "blank.png");

    tagscan()
        .args(["detect", "--outputs", "7"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("tagscan:output"));
}

#[test]
fn bad_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let image = write_gray(dir.path(), "blank.png");
    let config = dir.path().join("cfg.json");
    std::fs::write(&config, r#"{ "quad_decimate": 0.25 }"#).unwrap();

    tagscan()
        .arg("detect")
        .arg(&image)
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("tagscan:config"));
}

#[test]
fn unknown_log_level_is_rejected() {
    tagscan()
        .args(["--log-level", "chatty", "config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid log level 'chatty'"));
}

#[test]
fn missing_image_fails() {
    tagscan()
        .args(["detect", "does-not-exist.png"])
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("error:"));
}

#[cfg(not(feature = "apriltag"))]
#[test]
fn detect_without_backend_reports_it() {
    let dir = TempDir::new().unwrap();
    let path = write_gray(dir.path(), "blank.png");

    tagscan()
        .arg("detect")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("apriltag"));
}

#[cfg(feature = "apriltag")]
#[test]
fn blank_image_reports_no_tags() {
    let dir = TempDir::new().unwrap();
    let path = write_gray(dir.path(), "blank.png");

    let output = tagscan()
        .args(["detect", "--outputs", "3"])
        .arg(&path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let report: serde_json::Value = serde_json::from_slice(&output).expect("json");
    assert_eq!(report["count"], 0);
    let outputs = report["outputs"].as_object().expect("outputs");
    let mut names: Vec<_> = outputs.keys().cloned().collect();
    names.sort();
    assert_eq!(names, ["center", "corner_1", "id"]);
}
