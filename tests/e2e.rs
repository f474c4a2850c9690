//! End-to-end integration tests for scan2sheet.
//!
//! Most tests exercise the deterministic pipeline tail through
//! `fill_from_response`: a template workbook is built on the fly in a temp
//! directory, a canned model response is replayed through isolation,
//! normalization, and the workbook fill, and the saved copy is re-read to
//! verify cell placement. No network, no API key.
//!
//! The live vision test at the bottom is gated behind `E2E_ENABLED` plus a
//! real scan file so it does not run in CI unless explicitly requested.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture

use rust_xlsxwriter::{Format, Workbook};
use scan2sheet::{
    fill_from_response, CellValue, FillConfig, FillProgressCallback, Scan2SheetError, SheetGrid,
    Stage,
};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Build a minimal report template: a title in A1 and, optionally, a
/// banner merged across A2:C2 (the header row the fill pass targets).
fn make_template(dir: &Path, name: &str, merged_banner: bool) -> PathBuf {
    let mut workbook = Workbook::new();
    let ws = workbook.add_worksheet();
    ws.set_name("Report").unwrap();
    ws.write_string(0, 0, "UNIT 2 — DAILY REPORT").unwrap();
    if merged_banner {
        ws.merge_range(1, 0, 1, 2, "SECTION", &Format::new()).unwrap();
    }
    let path = dir.join(name);
    workbook.save(&path).unwrap();
    path
}

fn test_config(templates: &Path, outputs: &Path) -> FillConfig {
    FillConfig::builder()
        .template_dir(templates)
        .output_dir(outputs)
        .build()
        .expect("valid config")
}

fn xlsx_files(dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|x| x == "xlsx"))
            .collect(),
        Err(_) => Vec::new(),
    }
}

fn text(cell: Option<&CellValue>) -> &str {
    match cell {
        Some(CellValue::Text(s)) => s,
        other => panic!("expected a text cell, got {other:?}"),
    }
}

// ── Replay fill: the happy path ──────────────────────────────────────────────

/// A clean grinding-style response wrapped in prose and a code fence, the
/// way vision models actually answer.
#[test]
fn fill_grinding_response_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let templates = tmp.path().join("formats");
    let outputs = tmp.path().join("outputs");
    std::fs::create_dir_all(&templates).unwrap();
    make_template(&templates, "GRINDING.xlsx", false);

    let response = "Here is the extracted data:\n```json\n[\n  {\"DATE\": \"12/07\", \"SHIFT\": \"A\", \"DIE NO\": \"5196\", \"GRINDING QTY\": \"190\"},\n  {\"DATE\": \"12/07\", \"SHIFT\": \"B\", \"DIE NO\": \"5197\", \"GRINDING QTY\": \"60\"}\n]\n```\nLet me know if you need anything else.";

    let config = test_config(&templates, &outputs);
    let output = fill_from_response("GRINDING.xlsx", response, &config).expect("fill succeeds");

    assert_eq!(output.stats.rows_written, 2);
    assert_eq!(output.stats.columns, 4);
    assert_eq!(output.stats.skipped_merged_cells, 0);
    assert_eq!(output.table.columns[0], "DATE");

    // The copy exists under a fresh name; the template is untouched.
    assert!(output.output_path.exists());
    let name = output.output_path.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("filled_GRINDING_"), "got: {name}");
    assert!(name.ends_with(".xlsx"));

    // Re-read the copy and check cell placement: headers on row 2,
    // data from row 3, template title preserved on row 1.
    let grid = SheetGrid::load(&output.output_path).expect("output readable");
    assert_eq!(text(grid.get(0, 0)), "UNIT 2 — DAILY REPORT");
    assert_eq!(text(grid.get(1, 0)), "DATE");
    assert_eq!(text(grid.get(1, 3)), "GRINDING QTY");
    assert_eq!(text(grid.get(2, 0)), "12/07");
    assert_eq!(text(grid.get(2, 2)), "5196");
    assert_eq!(text(grid.get(3, 3)), "60");
}

/// Ragged records: a late-appearing key grows the column set, earlier
/// rows are padded with empty cells.
#[test]
fn fill_ragged_records_pads_missing_columns() {
    let tmp = TempDir::new().unwrap();
    let templates = tmp.path().join("formats");
    let outputs = tmp.path().join("outputs");
    std::fs::create_dir_all(&templates).unwrap();
    make_template(&templates, "MPI.xlsx", false);

    let response = r#"[
        {"Die No.": "5196", "OK": "180"},
        {"Die No.": "5197", "OK": "55", "Remark": "rust marks"}
    ]"#;

    let config = test_config(&templates, &outputs);
    let output = fill_from_response("MPI.xlsx", response, &config).unwrap();

    assert_eq!(output.table.columns, vec!["Die No.", "OK", "Remark"]);
    assert_eq!(output.table.rows[0], vec!["5196", "180", ""]);

    let grid = SheetGrid::load(&output.output_path).unwrap();
    assert_eq!(text(grid.get(1, 2)), "Remark");
    // The padded cell reads back blank (empty string or absent cell).
    let padded = grid.get(2, 2);
    assert!(
        padded.is_none() || padded == Some(&CellValue::Text(String::new())),
        "got {padded:?}"
    );
    assert_eq!(text(grid.get(3, 2)), "rust marks");
}

/// A refusal reply carries no JSON array: the request fails in isolation
/// and no workbook copy is created.
#[test]
fn refusal_response_creates_no_workbook() {
    let tmp = TempDir::new().unwrap();
    let templates = tmp.path().join("formats");
    let outputs = tmp.path().join("outputs");
    std::fs::create_dir_all(&templates).unwrap();
    make_template(&templates, "GRINDING.xlsx", false);

    let config = test_config(&templates, &outputs);
    let err = fill_from_response("GRINDING.xlsx", "I cannot read this image clearly.", &config)
        .unwrap_err();

    assert!(matches!(err, Scan2SheetError::NoJsonArray { .. }));
    assert_eq!(err.stage(), Stage::JsonIsolation);
    assert!(
        xlsx_files(&outputs).is_empty(),
        "a failed request must not leave a workbook behind"
    );
}

// ── Merged-cell behaviour ────────────────────────────────────────────────────

/// Header labels aimed at a merged banner: the anchor takes the first
/// label, the covered cells are skipped and counted, data rows below are
/// unaffected, and the merge itself survives into the copy.
#[test]
fn merged_banner_is_skipped_not_overwritten() {
    let tmp = TempDir::new().unwrap();
    let templates = tmp.path().join("formats");
    let outputs = tmp.path().join("outputs");
    std::fs::create_dir_all(&templates).unwrap();
    make_template(&templates, "GRINDING.xlsx", true);

    let response = r#"[{"DATE": "12/07", "SHIFT": "A", "QTY": "190"}]"#;
    let config = test_config(&templates, &outputs);
    let output = fill_from_response("GRINDING.xlsx", response, &config).unwrap();

    // 3 header labels target A2:C2; the banner covers all of it, so only
    // the anchor write lands.
    assert_eq!(output.stats.skipped_merged_cells, 2);
    assert_eq!(output.stats.rows_written, 1);

    let grid = SheetGrid::load(&output.output_path).unwrap();
    assert_eq!(text(grid.get(1, 0)), "DATE");
    assert_eq!(grid.get(1, 1), None);
    assert_eq!(grid.get(1, 2), None);
    assert_eq!(text(grid.get(2, 1)), "A");

    // Merge geometry carried over.
    assert_eq!(grid.merges().len(), 1);
    let m = grid.merges()[0];
    assert_eq!((m.first_row, m.first_col, m.last_row, m.last_col), (1, 0, 1, 2));
}

// ── Artifacts and naming ─────────────────────────────────────────────────────

/// The isolated JSON is persisted under outputs/debug/, named after the
/// workbook copy, and parses back to the records that were written.
#[test]
fn debug_artifact_is_persisted_and_parseable() {
    let tmp = TempDir::new().unwrap();
    let templates = tmp.path().join("formats");
    let outputs = tmp.path().join("outputs");
    std::fs::create_dir_all(&templates).unwrap();
    make_template(&templates, "GRINDING.xlsx", false);

    let config = test_config(&templates, &outputs);
    let output =
        fill_from_response("GRINDING.xlsx", r#"junk before [{"a": "1"}] junk after"#, &config)
            .unwrap();

    let stem = output.output_path.file_stem().unwrap().to_str().unwrap();
    let artifact = outputs.join("debug").join(format!("{stem}.json"));
    assert!(artifact.exists(), "missing {}", artifact.display());

    let saved = std::fs::read_to_string(&artifact).unwrap();
    let v: serde_json::Value = serde_json::from_str(&saved).unwrap();
    assert_eq!(v[0]["a"], "1");
}

/// A normalization failure still leaves the artifact behind; that is the
/// whole point of persisting before parsing.
#[test]
fn artifact_survives_normalization_failure() {
    let tmp = TempDir::new().unwrap();
    let templates = tmp.path().join("formats");
    let outputs = tmp.path().join("outputs");
    std::fs::create_dir_all(&templates).unwrap();
    make_template(&templates, "GRINDING.xlsx", false);

    let config = test_config(&templates, &outputs);
    // Nested value: isolates fine, refuses to normalize.
    let err = fill_from_response(
        "GRINDING.xlsx",
        r#"[{"DATE": "12/07", "ITEMS": ["a", "b"]}]"#,
        &config,
    )
    .unwrap_err();

    assert!(matches!(err, Scan2SheetError::MalformedRecords { .. }));
    assert_eq!(err.stage(), Stage::Normalization);

    let debug_dir = outputs.join("debug");
    let artifacts: Vec<_> = std::fs::read_dir(&debug_dir).unwrap().collect();
    assert_eq!(artifacts.len(), 1, "exactly one artifact expected");
    assert!(xlsx_files(&outputs).is_empty());
}

#[test]
fn no_debug_artifacts_flag_is_honoured() {
    let tmp = TempDir::new().unwrap();
    let templates = tmp.path().join("formats");
    let outputs = tmp.path().join("outputs");
    std::fs::create_dir_all(&templates).unwrap();
    make_template(&templates, "GRINDING.xlsx", false);

    let config = FillConfig::builder()
        .template_dir(&templates)
        .output_dir(&outputs)
        .debug_artifacts(false)
        .build()
        .unwrap();

    fill_from_response("GRINDING.xlsx", r#"[{"a": "1"}]"#, &config).unwrap();
    assert!(!outputs.join("debug").exists());
}

/// Two requests in the same second must not collide on the output name.
#[test]
fn repeated_requests_get_distinct_output_paths() {
    let tmp = TempDir::new().unwrap();
    let templates = tmp.path().join("formats");
    let outputs = tmp.path().join("outputs");
    std::fs::create_dir_all(&templates).unwrap();
    make_template(&templates, "GRINDING.xlsx", false);

    let config = test_config(&templates, &outputs);
    let response = r#"[{"a": "1"}]"#;
    let a = fill_from_response("GRINDING.xlsx", response, &config).unwrap();
    let b = fill_from_response("GRINDING.xlsx", response, &config).unwrap();

    assert_ne!(a.output_path, b.output_path);
    assert_eq!(xlsx_files(&outputs).len(), 2);
}

// ── Progress events ──────────────────────────────────────────────────────────

/// A replay request walks exactly the deterministic stages, in order.
#[test]
fn replay_fires_stage_events_in_order() {
    struct Recorder {
        events: Mutex<Vec<(Stage, bool)>>,
    }

    impl FillProgressCallback for Recorder {
        fn on_stage_start(&self, stage: Stage) {
            self.events.lock().unwrap().push((stage, false));
        }
        fn on_stage_complete(&self, stage: Stage) {
            self.events.lock().unwrap().push((stage, true));
        }
    }

    let tmp = TempDir::new().unwrap();
    let templates = tmp.path().join("formats");
    let outputs = tmp.path().join("outputs");
    std::fs::create_dir_all(&templates).unwrap();
    make_template(&templates, "GRINDING.xlsx", false);

    let recorder = std::sync::Arc::new(Recorder {
        events: Mutex::new(Vec::new()),
    });
    let config = FillConfig::builder()
        .template_dir(&templates)
        .output_dir(&outputs)
        .progress_callback(std::sync::Arc::clone(&recorder) as _)
        .build()
        .unwrap();

    fill_from_response("GRINDING.xlsx", r#"[{"a": "1"}]"#, &config).unwrap();

    let events = recorder.events.lock().unwrap().clone();
    let expected = [
        (Stage::TemplateResolution, false),
        (Stage::TemplateResolution, true),
        (Stage::JsonIsolation, false),
        (Stage::JsonIsolation, true),
        (Stage::Normalization, false),
        (Stage::Normalization, true),
        (Stage::WorkbookFill, false),
        (Stage::WorkbookFill, true),
    ];
    assert_eq!(events, expected);
}

// ── Error ordering ───────────────────────────────────────────────────────────

/// A missing template fails before anything else happens: no artifact,
/// no output directory, stage is TemplateResolution.
#[test]
fn missing_template_fails_first() {
    let tmp = TempDir::new().unwrap();
    let templates = tmp.path().join("formats");
    let outputs = tmp.path().join("outputs");
    std::fs::create_dir_all(&templates).unwrap();

    let config = test_config(&templates, &outputs);
    let err = fill_from_response("NOPE.xlsx", r#"[{"a": "1"}]"#, &config).unwrap_err();

    assert!(matches!(err, Scan2SheetError::TemplateNotFound { .. }));
    assert_eq!(err.stage(), Stage::TemplateResolution);
    assert!(!outputs.exists());
}

/// An empty record array is a success with zero rows: the copy is still
/// produced so the operator gets a file either way.
#[test]
fn empty_record_array_produces_an_untouched_copy() {
    let tmp = TempDir::new().unwrap();
    let templates = tmp.path().join("formats");
    let outputs = tmp.path().join("outputs");
    std::fs::create_dir_all(&templates).unwrap();
    make_template(&templates, "GRINDING.xlsx", false);

    let config = test_config(&templates, &outputs);
    let output = fill_from_response("GRINDING.xlsx", "No legible rows.\n[]", &config).unwrap();

    assert_eq!(output.stats.rows_written, 0);
    assert_eq!(output.stats.cells_written, 0);

    let grid = SheetGrid::load(&output.output_path).unwrap();
    assert_eq!(text(grid.get(0, 0)), "UNIT 2 — DAILY REPORT");
    assert_eq!(grid.get(1, 0), None);
}

// ── Live vision test (needs API key, gated) ──────────────────────────────────

/// Gated e2e: full pipeline against a real vision provider.
///
/// Requirements:
/// - `E2E_ENABLED=1`
/// - `OPENAI_API_KEY` (or another provider key) set
/// - A scan at `test_cases/grinding_scan.jpg`
///
/// Run:
///   E2E_ENABLED=1 cargo test --test e2e live_grinding_scan -- --nocapture
#[tokio::test]
async fn live_grinding_scan() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP — set E2E_ENABLED=1 to run live e2e tests");
        return;
    }
    let scan = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("test_cases")
        .join("grinding_scan.jpg");
    if !scan.exists() {
        println!("SKIP — test scan not found: {}", scan.display());
        return;
    }

    let tmp = TempDir::new().unwrap();
    let templates = tmp.path().join("formats");
    let outputs = tmp.path().join("outputs");
    std::fs::create_dir_all(&templates).unwrap();
    make_template(&templates, "GRINDING.xlsx", true);

    let config = test_config(&templates, &outputs);
    let output = scan2sheet::transcribe("GRINDING.xlsx", scan.to_str().unwrap(), &config)
        .await
        .expect("live transcription should succeed");

    assert!(output.stats.rows_written > 0, "scan should yield rows");
    assert!(output.stats.input_tokens > 0, "tokens should be counted");
    assert!(output.output_path.exists());

    println!(
        "[live] {} rows, {} in / {} out tokens, {}ms → {}",
        output.stats.rows_written,
        output.stats.input_tokens,
        output.stats.output_tokens,
        output.stats.total_duration_ms,
        output.output_path.display()
    );
}
