use std::fs;

use lopdf::Document;
use siteplan_config::AppConfig;
use siteplan_core::site::{GeoPoint, Side};
use siteplan_frontend::cli::run_generate;
use siteplan_frontend::loader::FormSource;
use siteplan_frontend::{GenerateRequest, RoadOverride};

fn offline_config(dir: &std::path::Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.tiles.offline = true;
    config.output.directory = dir.to_path_buf();
    config
}

#[test]
fn form_file_produces_named_pdf_and_preview() {
    let dir = tempfile::tempdir().expect("tempdir");
    let form_path = dir.path().join("site.toml");
    fs::write(
        &form_path,
        r#"
        [site]
        survey_no = "42/1"
        village = "Hebbal"
        length_m = 15.0
        width_m = 12.0

        [roads.north]
        present = true
        width_m = 6.0
        "#,
    )
    .expect("write form");

    let request = GenerateRequest {
        form_path: Some(form_path.clone()),
        picks: vec![GeoPoint::new(12.9716, 77.5946)],
        road_overrides: vec![RoadOverride::Set {
            side: Side::East,
            width_m: 9.0,
        }],
        ..GenerateRequest::default()
    };
    let report = run_generate(&request, &offline_config(dir.path())).expect("generate");

    assert_eq!(report.form_source, FormSource::File(form_path));
    assert_eq!(report.location, Some(GeoPoint::new(12.9716, 77.5946)));
    assert_eq!(report.pdf_path, dir.path().join("Single_Site_42_1.pdf"));
    let bytes = fs::read(&report.pdf_path).expect("pdf on disk");
    assert_eq!(bytes.len(), report.pdf_bytes);
    let doc = Document::load_mem(&bytes).expect("parse pdf");
    assert_eq!(doc.get_pages().len(), 1);

    let preview = report.preview_path.expect("preview written");
    assert_eq!(preview, dir.path().join("Single_Site_42_1.svg"));
    assert!(fs::read_to_string(preview).expect("svg").contains("East (9.0 m ROAD)"));
}

#[test]
fn blank_survey_falls_back_to_site_token() {
    let dir = tempfile::tempdir().expect("tempdir");
    let form_path = dir.path().join("blank.toml");
    fs::write(
        &form_path,
        "[site]\nsurvey_no = \"   \"\nlength_m = 10.0\nwidth_m = 10.0\n",
    )
    .expect("write form");

    let request = GenerateRequest {
        form_path: Some(form_path),
        write_preview: Some(false),
        ..GenerateRequest::default()
    };
    let report = run_generate(&request, &offline_config(dir.path())).expect("generate");
    assert_eq!(
        report.pdf_path.file_name().and_then(|name| name.to_str()),
        Some("Single_Site_site.pdf")
    );
    assert!(report.preview_path.is_none());
    assert!(report.location.is_none());
}

#[test]
fn sketch_next_to_form_is_embedded() {
    let dir = tempfile::tempdir().expect("tempdir");
    image::RgbaImage::from_pixel(300, 200, image::Rgba([20, 20, 200, 255]))
        .save(dir.path().join("adlr.png"))
        .expect("write sketch");
    let form_path = dir.path().join("site.toml");
    fs::write(
        &form_path,
        "sketch = \"adlr.png\"\n[site]\nsurvey_no = \"7\"\nlength_m = 15.0\nwidth_m = 12.0\n",
    )
    .expect("write form");

    let request = GenerateRequest {
        form_path: Some(form_path),
        ..GenerateRequest::default()
    };
    let report = run_generate(&request, &offline_config(dir.path())).expect("generate");
    assert!(report.sketch_loaded);
}

#[test]
fn unusable_sketch_falls_back_to_placeholder() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("adlr.png"), b"not an image").expect("write sketch");
    let form_path = dir.path().join("site.toml");
    fs::write(
        &form_path,
        "sketch = \"adlr.png\"\n[site]\nsurvey_no = \"8\"\nlength_m = 15.0\nwidth_m = 12.0\n",
    )
    .expect("write form");

    let request = GenerateRequest {
        form_path: Some(form_path),
        ..GenerateRequest::default()
    };
    let report = run_generate(&request, &offline_config(dir.path())).expect("generate");
    assert!(!report.sketch_loaded);
    assert!(report.pdf_path.exists());
    let preview = fs::read_to_string(report.preview_path.expect("preview")).expect("svg");
    assert!(preview.contains("ADLR SKETCH (To be inserted here)"));
}

#[test]
fn missing_sketch_still_writes_document() {
    let dir = tempfile::tempdir().expect("tempdir");
    let form_path = dir.path().join("site.toml");
    fs::write(&form_path, "[site]\nsurvey_no = \"8\"\nlength_m = 15.0\nwidth_m = 12.0\n")
        .expect("write form");

    let request = GenerateRequest {
        form_path: Some(form_path),
        sketch: Some(dir.path().join("absent.jpg")),
        ..GenerateRequest::default()
    };
    let report = run_generate(&request, &offline_config(dir.path())).expect("generate");
    assert!(!report.sketch_loaded);
    let bytes = fs::read(&report.pdf_path).expect("pdf on disk");
    assert_eq!(Document::load_mem(&bytes).expect("parse pdf").get_pages().len(), 1);
}

#[test]
fn invalid_dimensions_stop_before_export() {
    let dir = tempfile::tempdir().expect("tempdir");
    let form_path = dir.path().join("bad.toml");
    fs::write(&form_path, "[site]\nsurvey_no = \"9\"\nlength_m = 0.0\nwidth_m = 12.0\n")
        .expect("write form");
    let out = dir.path().join("out");
    let request = GenerateRequest {
        form_path: Some(form_path),
        output_dir: Some(out.clone()),
        ..GenerateRequest::default()
    };
    assert!(run_generate(&request, &offline_config(dir.path())).is_err());
    assert!(!out.join("Single_Site_9.pdf").exists());
}
