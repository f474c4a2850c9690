//! Request orchestration: one scan in, one filled workbook copy out.
//!
//! [`transcribe`] walks the full pipeline; [`fill_from_response`] replays
//! everything after the vision call from a saved response, which is how
//! the deterministic half of the pipeline gets exercised without a
//! network (and how a debug artifact from a failed run is re-processed
//! after a parser fix).

use crate::config::FillConfig;
use crate::error::{Scan2SheetError, Stage};
use crate::output::{FillOutput, FillStats};
use crate::pipeline::{encode, extract, fill, input, normalize, ocr};
use crate::workbook::SheetGrid;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Model used when neither the config nor the environment names one.
const DEFAULT_MODEL: &str = "gpt-4o";

/// Transcribe a scanned register into a filled copy of its template.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `template_id` — File name of a template in `config.template_dir`
/// * `image_input` — Local file path or HTTP/HTTPS URL to a JPEG/PNG scan
/// * `config` — Fill configuration
///
/// # Errors
/// Every error is terminal for the request; `err.stage()` names the
/// pipeline stage that failed.
pub async fn transcribe(
    template_id: impl AsRef<str>,
    image_input: impl AsRef<str>,
    config: &FillConfig,
) -> Result<FillOutput, Scan2SheetError> {
    let total_start = Instant::now();
    let template_id = template_id.as_ref();
    let image_input = image_input.as_ref();
    info!("Starting fill request: template={}, input={}", template_id, image_input);

    // ── Step 1: Resolve template ─────────────────────────────────────────
    stage_start(config, Stage::TemplateResolution);
    let template_path = resolve_template(template_id, config)?;
    let descriptor = config.registry.resolve(template_id);
    debug!(
        "Template '{}' resolved to schema '{}' ({} fields)",
        template_id,
        descriptor.name,
        descriptor.fields.len()
    );
    stage_complete(config, Stage::TemplateResolution);

    // ── Step 2: Get/create provider ──────────────────────────────────────
    let provider = resolve_provider(config)?;

    // ── Step 3: Resolve and encode the scan ──────────────────────────────
    stage_start(config, Stage::InputResolution);
    let resolved = input::resolve_input(image_input, config.download_timeout_secs).await?;
    let image_data = encode::encode_image(resolved.path())?;
    stage_complete(config, Stage::InputResolution);

    // ── Step 4: The vision call ──────────────────────────────────────────
    stage_start(config, Stage::OcrCall);
    let prompt = config
        .prompt_override
        .as_deref()
        .unwrap_or(&descriptor.prompt);
    let response = ocr::transcribe_image(&provider, prompt, image_data, config).await?;
    stage_complete(config, Stage::OcrCall);

    // ── Step 5: Deterministic tail (isolate → normalize → fill) ──────────
    let mut output = run_fill_stages(&template_path, template_id, &response.content, config)?;

    output.stats.input_tokens = response.input_tokens;
    output.stats.output_tokens = response.output_tokens;
    output.stats.ocr_duration_ms = response.duration_ms;
    output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Fill complete: {} rows, {} cells, {} merged skips, {}ms total → {}",
        output.stats.rows_written,
        output.stats.cells_written,
        output.stats.skipped_merged_cells,
        output.stats.total_duration_ms,
        output.output_path.display()
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_request_complete(output.stats.rows_written, output.stats.skipped_merged_cells);
    }

    Ok(output)
}

/// Synchronous wrapper around [`transcribe`].
///
/// Creates a temporary tokio runtime internally.
pub fn transcribe_sync(
    template_id: impl AsRef<str>,
    image_input: impl AsRef<str>,
    config: &FillConfig,
) -> Result<FillOutput, Scan2SheetError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Scan2SheetError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(transcribe(template_id, image_input, config))
}

/// Replay the deterministic pipeline tail from a saved model response.
///
/// Takes everything after the vision call as-is: isolation, artifact
/// persistence, normalization, and the workbook fill all behave exactly
/// as they do inside [`transcribe`]. Token and OCR-duration stats are
/// zero in the result.
pub fn fill_from_response(
    template_id: impl AsRef<str>,
    response_text: &str,
    config: &FillConfig,
) -> Result<FillOutput, Scan2SheetError> {
    let total_start = Instant::now();
    let template_id = template_id.as_ref();

    stage_start(config, Stage::TemplateResolution);
    let template_path = resolve_template(template_id, config)?;
    stage_complete(config, Stage::TemplateResolution);

    let mut output = run_fill_stages(&template_path, template_id, response_text, config)?;
    output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    if let Some(ref cb) = config.progress_callback {
        cb.on_request_complete(output.stats.rows_written, output.stats.skipped_merged_cells);
    }

    Ok(output)
}

/// List the template workbooks available in the configured directory.
pub fn list_templates(config: &FillConfig) -> Result<Vec<String>, Scan2SheetError> {
    let entries = std::fs::read_dir(&config.template_dir).map_err(|e| {
        Scan2SheetError::TemplateNotFound {
            id: format!("<any> ({e})"),
            dir: config.template_dir.clone(),
        }
    })?;

    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.to_lowercase().ends_with(".xlsx") && !n.starts_with('~'))
        .collect();
    names.sort();
    Ok(names)
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Validate that the template file exists before any network call is made.
fn resolve_template(template_id: &str, config: &FillConfig) -> Result<PathBuf, Scan2SheetError> {
    let path = config.template_dir.join(template_id);
    if !path.is_file() {
        return Err(Scan2SheetError::TemplateNotFound {
            id: template_id.to_string(),
            dir: config.template_dir.clone(),
        });
    }
    Ok(path)
}

/// The synchronous pipeline tail shared by live and replay requests.
///
/// Order matters: the isolated JSON is persisted *before* parsing so the
/// artifact survives a normalization failure, and the output path is
/// reserved up front so the artifact and the workbook copy share a stem.
fn run_fill_stages(
    template_path: &Path,
    template_id: &str,
    response_text: &str,
    config: &FillConfig,
) -> Result<FillOutput, Scan2SheetError> {
    // ── Isolate the JSON array ───────────────────────────────────────────
    stage_start(config, Stage::JsonIsolation);
    let json_text = extract::isolate_json_array(response_text)?;

    let output_path = fill::unique_output_path(&config.output_dir, template_id);
    if config.debug_artifacts {
        persist_debug_artifact(&output_path, config, &json_text)?;
    }
    stage_complete(config, Stage::JsonIsolation);

    // ── Normalize records into a table ───────────────────────────────────
    stage_start(config, Stage::Normalization);
    let table = normalize::normalize(&json_text)?;
    debug!(
        "Normalized {} records into {} columns",
        table.rows.len(),
        table.columns.len()
    );
    stage_complete(config, Stage::Normalization);

    // ── Fill the workbook copy ───────────────────────────────────────────
    stage_start(config, Stage::WorkbookFill);
    let fill_start = Instant::now();

    let mut grid = SheetGrid::load(template_path)?;
    let report = fill::populate(&mut grid, &table, config.header_row, config.first_data_row)?;

    std::fs::create_dir_all(&config.output_dir).map_err(|e| {
        Scan2SheetError::OutputWriteFailed {
            path: config.output_dir.clone(),
            source: e,
        }
    })?;
    grid.save(&output_path)?;

    let fill_duration_ms = fill_start.elapsed().as_millis() as u64;
    stage_complete(config, Stage::WorkbookFill);

    Ok(FillOutput {
        output_path,
        stats: FillStats {
            rows_written: report.rows_written,
            columns: table.columns.len(),
            cells_written: report.cells_written,
            skipped_merged_cells: report.skipped_merged_cells,
            fill_duration_ms,
            ..Default::default()
        },
        table,
    })
}

/// Save the isolated JSON under `<output_dir>/debug/`, named after the
/// request's output file so the pair is easy to match up later.
fn persist_debug_artifact(
    output_path: &Path,
    config: &FillConfig,
    json_text: &str,
) -> Result<(), Scan2SheetError> {
    let debug_dir = config.output_dir.join("debug");
    std::fs::create_dir_all(&debug_dir).map_err(|e| Scan2SheetError::OutputWriteFailed {
        path: debug_dir.clone(),
        source: e,
    })?;

    let stem = output_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("request");
    let artifact = debug_dir.join(format!("{stem}.json"));
    std::fs::write(&artifact, json_text).map_err(|e| Scan2SheetError::OutputWriteFailed {
        path: artifact.clone(),
        source: e,
    })?;
    debug!("Debug artifact: {}", artifact.display());
    Ok(())
}

fn stage_start(config: &FillConfig, stage: Stage) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(stage);
    }
}

fn stage_complete(config: &FillConfig, stage: Stage) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_complete(stage);
    }
}

/// Instantiate a named provider with the given model.
fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, Scan2SheetError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Scan2SheetError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// The four-level fallback chain lets library users and CLI users each set
/// exactly as much or as little as they need:
///
/// 1. **Pre-built provider** (`config.provider`) — the caller constructed
///    and configured the provider entirely; used as-is. Useful in tests or
///    when the caller needs custom middleware.
///
/// 2. **Named provider + model** (`config.provider_name`) — the factory
///    reads the corresponding API key (`OPENAI_API_KEY`, etc.) from the
///    environment.
///
/// 3. **Environment pair** (`SCAN2SHEET_PROVIDER` + `SCAN2SHEET_MODEL`) —
///    both set means the deployment chose a provider and model at the
///    environment level. Checked before full auto-detection so the model
///    choice is honoured even when multiple API keys are present.
///
/// 4. **Full auto-detection** (`ProviderFactory::from_env`) — the factory
///    scans all known API key variables and picks the first available
///    provider, preferring OpenAI when its key is set.
fn resolve_provider(config: &FillConfig) -> Result<Arc<dyn LLMProvider>, Scan2SheetError> {
    // 1) User-provided provider takes priority
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    // 2) Provider name + model
    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_vision_provider(name, model);
    }

    // 3) Environment pair
    if let (Ok(prov), Ok(model)) = (
        std::env::var("SCAN2SHEET_PROVIDER"),
        std::env::var("SCAN2SHEET_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    // Prefer OpenAI explicitly when an OpenAI API key is present, so users
    // with multiple provider keys get a deterministic default.
    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_vision_provider("openai", model);
        }
    }

    // 4) Full auto-detection
    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Scan2SheetError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No vision provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
