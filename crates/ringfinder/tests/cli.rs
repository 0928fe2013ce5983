#![cfg(feature = "cli")]

use assert_cmd::Command;
use image::{GrayImage, Luma};
use predicates::prelude::*;
use tempfile::tempdir;

fn write_ring_png(path: &std::path::Path) {
    let mut img = GrayImage::new(80, 80);
    for (x, y, px) in img.enumerate_pixels_mut() {
        let d = ((x as f64 - 40.0).powi(2) + (y as f64 - 38.0).powi(2)).sqrt();
        if (d - 20.0).abs() <= 2.5 {
            *px = Luma([220]);
        }
    }
    img.save(path).unwrap();
}

#[test]
fn detects_a_ring_and_prints_json() {
    let dir = tempdir().unwrap();
    let png = dir.path().join("ring.png");
    write_ring_png(&png);

    let output = Command::cargo_bin("ringfinder")
        .unwrap()
        .arg(&png)
        .args(["--min-radius", "14", "--max-radius", "26", "--step-radius", "2"])
        .args(["--thickness", "5", "--sensitivity", "150"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let channels = json.as_array().unwrap();
    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0]["cancelled"], false);
    let best = &channels[0]["rings"][0];
    let radius = best["radius"].as_f64().unwrap();
    let cx = best["center"][0].as_f64().unwrap();
    let cy = best["center"][1].as_f64().unwrap();
    assert!((radius - 20.0).abs() <= 2.0, "{best}");
    assert!((cx - 40.0).abs() <= 1.0 && (cy - 38.0).abs() <= 1.0, "{best}");
    assert_eq!(best["statistics"]["status"], "measured");
}

#[test]
fn config_file_and_output_path() {
    let dir = tempdir().unwrap();
    let png = dir.path().join("ring.png");
    write_ring_png(&png);
    let cfg = dir.path().join("params.json");
    std::fs::write(
        &cfg,
        r#"{ "radii": { "min": 14, "max": 26, "step": 2 }, "circle_thickness": 5.0, "max_detections": 1 }"#,
    )
    .unwrap();
    let out = dir.path().join("rings.json");

    Command::cargo_bin("ringfinder")
        .unwrap()
        .arg(&png)
        .arg("--config")
        .arg(&cfg)
        .arg("--out")
        .arg(&out)
        .assert()
        .success();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert!(json[0]["rings"].as_array().unwrap().len() <= 1);
}

#[test]
fn print_params_reflects_overrides() {
    let dir = tempdir().unwrap();
    let png = dir.path().join("unused.png");
    Command::cargo_bin("ringfinder")
        .unwrap()
        .arg(&png)
        .args(["--detector", "local-max", "--max-detections", "4", "--print-params"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"detector\": \"local_max\""))
        .stdout(predicate::str::contains("\"max_detections\": 4"));
}

#[test]
fn rejects_invalid_parameters() {
    let dir = tempdir().unwrap();
    let png = dir.path().join("ring.png");
    write_ring_png(&png);
    Command::cargo_bin("ringfinder")
        .unwrap()
        .arg(&png)
        .args(["--step-radius", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("radius step"));
}

#[test]
fn missing_image_fails() {
    Command::cargo_bin("ringfinder")
        .unwrap()
        .arg("/definitely/not/here.png")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to open image"));
}

#[test]
fn verbose_flag_logs_to_stderr() {
    let dir = tempdir().unwrap();
    let png = dir.path().join("ring.png");
    write_ring_png(&png);
    let output = Command::cargo_bin("ringfinder")
        .unwrap()
        .arg(&png)
        .args(["--min-radius", "16", "--max-radius", "24", "--step-radius", "2"])
        .arg("-vv")
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("loading image"), "{stderr}");
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json.as_array().unwrap().len(), 1);
}
