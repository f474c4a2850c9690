//! CLI binary for scan2sheet.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `FillConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use scan2sheet::{
    fill_from_response, list_templates, transcribe, FillConfig, FillProgressCallback, FillStats,
    ProgressCallback, Stage,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a single spinner whose message tracks the
/// pipeline stage. A fill request has one long suspension point (the
/// vision call), so a spinner beats a bar here.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Filling");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn stage_label(stage: Stage) -> &'static str {
        match stage {
            Stage::TemplateResolution => "resolving template…",
            Stage::InputResolution => "reading scan…",
            Stage::OcrCall => "waiting for the vision model…",
            Stage::JsonIsolation => "isolating JSON…",
            Stage::Normalization => "normalizing records…",
            Stage::WorkbookFill => "writing workbook…",
        }
    }
}

impl FillProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_message(Self::stage_label(stage));
    }

    fn on_stage_complete(&self, stage: Stage) {
        self.bar
            .println(format!("  {} {}", green("✓"), stage.as_str()));
    }

    fn on_request_complete(&self, rows_written: usize, skipped_merged_cells: usize) {
        self.bar.finish_and_clear();
        if skipped_merged_cells == 0 {
            eprintln!(
                "{} {} rows written",
                green("✔"),
                bold(&rows_written.to_string())
            );
        } else {
            eprintln!(
                "{} {} rows written  ({} merged-cell writes skipped)",
                yellow("⚠"),
                bold(&rows_written.to_string()),
                yellow(&skipped_merged_cells.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Fill the grinding template from a photographed register
  scan2sheet GRINDING.xlsx scan.jpg

  # Scan hosted on an internal server
  scan2sheet MPI.xlsx https://files.example.com/scans/mpi-0712.png

  # Use a specific model
  scan2sheet --model gpt-4o --provider openai GRINDING.xlsx scan.jpg

  # See which templates are installed (no API key needed)
  scan2sheet --list-templates

  # Re-run the deterministic half from a saved model response
  scan2sheet --from-response outputs/debug/filled_GRINDING_20250712_101500_ab12cd34.json GRINDING.xlsx

  # Machine-readable result
  scan2sheet --json GRINDING.xlsx scan.jpg > result.json

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY        OpenAI API key
  ANTHROPIC_API_KEY     Anthropic API key
  GEMINI_API_KEY        Google Gemini API key
  SCAN2SHEET_PROVIDER   Override provider (openai, anthropic, gemini, ollama)
  SCAN2SHEET_MODEL      Override model ID

SETUP:
  1. Set API key:       export OPENAI_API_KEY=sk-...
  2. Drop templates in: ./formats/   (one .xlsx per report type)
  3. Fill:              scan2sheet GRINDING.xlsx scan.jpg

  Filled copies land in ./outputs/ under a fresh name per request; the
  template file itself is never modified. The isolated JSON from each
  request is kept in ./outputs/debug/ unless --no-debug-artifacts is set.
"#;

/// Fill Excel report templates from photographed registers using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "scan2sheet",
    version,
    about = "Fill Excel report templates from photographed registers using Vision LLMs",
    long_about = "Transcribe a photographed shop-floor register (JPEG/PNG, local file or URL) \
with a Vision Language Model and write the extracted table into a fresh copy of the matching \
Excel template. Supports OpenAI, Anthropic, Google Gemini, and any OpenAI-compatible endpoint.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Template file name inside the template directory (e.g. GRINDING.xlsx).
    template: Option<String>,

    /// Local scan path or HTTP/HTTPS URL (JPEG or PNG).
    image: Option<String>,

    /// Directory holding the template workbooks.
    #[arg(long, env = "SCAN2SHEET_TEMPLATE_DIR", default_value = "formats")]
    template_dir: PathBuf,

    /// Directory filled copies are written to.
    #[arg(short, long, env = "SCAN2SHEET_OUTPUT_DIR", default_value = "outputs")]
    output_dir: PathBuf,

    /// Vision model ID (e.g. gpt-4o, claude-sonnet-4-20250514).
    #[arg(long, env = "SCAN2SHEET_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama.
    #[arg(
        long,
        env = "SCAN2SHEET_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, ollama, or any OpenAI-compatible endpoint."
    )]
    provider: Option<String>,

    /// 1-based worksheet row for the extracted column labels.
    #[arg(long, env = "SCAN2SHEET_HEADER_ROW", default_value_t = 2)]
    header_row: u32,

    /// 1-based worksheet row for the first data record.
    #[arg(long, env = "SCAN2SHEET_DATA_ROW", default_value_t = 3)]
    data_row: u32,

    /// Max tokens the model may generate.
    #[arg(long, env = "SCAN2SHEET_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "SCAN2SHEET_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Path to a text file containing a custom extraction prompt.
    #[arg(long, env = "SCAN2SHEET_PROMPT")]
    prompt: Option<PathBuf>,

    /// Vision call timeout in seconds.
    #[arg(long, env = "SCAN2SHEET_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "SCAN2SHEET_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Do not keep the isolated JSON under <output-dir>/debug/.
    #[arg(long, env = "SCAN2SHEET_NO_DEBUG_ARTIFACTS")]
    no_debug_artifacts: bool,

    /// List installed templates and exit (no API key needed).
    #[arg(long)]
    list_templates: bool,

    /// Replay the fill from a saved model response instead of calling the API.
    #[arg(long, value_name = "FILE")]
    from_response: Option<PathBuf>,

    /// Output structured JSON (FillOutput) instead of a summary.
    #[arg(long, env = "SCAN2SHEET_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "SCAN2SHEET_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SCAN2SHEET_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the result.
    #[arg(short, long, env = "SCAN2SHEET_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the spinner is active; the
    // spinner provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── List-templates mode ──────────────────────────────────────────────
    if cli.list_templates {
        let config = build_config(&cli, None).await?;
        let names = list_templates(&config).context("Failed to read template directory")?;
        if names.is_empty() {
            eprintln!(
                "No templates found in {}",
                config.template_dir.display()
            );
        } else {
            for name in names {
                println!("{name}");
            }
        }
        return Ok(());
    }

    let template = cli
        .template
        .clone()
        .context("A template name is required (see --list-templates)")?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn FillProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    // ── Replay mode ──────────────────────────────────────────────────────
    if let Some(ref response_path) = cli.from_response {
        let response = tokio::fs::read_to_string(response_path)
            .await
            .with_context(|| format!("Failed to read {}", response_path.display()))?;
        let output = fill_from_response(&template, &response, &config)
            .context("Replay fill failed")?;
        print_result(&cli, &output)?;
        return Ok(());
    }

    // ── Live mode ────────────────────────────────────────────────────────
    let image = cli
        .image
        .clone()
        .context("A scan path or URL is required")?;

    let output = transcribe(&template, &image, &config)
        .await
        .context("Fill request failed")?;
    print_result(&cli, &output)?;

    Ok(())
}

fn print_result(cli: &Cli, output: &scan2sheet::FillOutput) -> Result<()> {
    if cli.json {
        let json = serde_json::to_string_pretty(output).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }

    let stats: &FillStats = &output.stats;
    println!("{}", output.output_path.display());

    if !cli.quiet {
        eprintln!(
            "   {} rows × {} columns  —  {}ms total",
            stats.rows_written, stats.columns, stats.total_duration_ms
        );
        if stats.input_tokens > 0 || stats.output_tokens > 0 {
            eprintln!(
                "   {} tokens in  /  {} tokens out",
                dim(&stats.input_tokens.to_string()),
                dim(&stats.output_tokens.to_string()),
            );
        }
        if stats.skipped_merged_cells > 0 {
            eprintln!(
                "   {} {} writes hit merged cells and were skipped",
                yellow("⚠"),
                stats.skipped_merged_cells
            );
        }
    }
    Ok(())
}

/// Map CLI args to `FillConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<FillConfig> {
    let prompt_override = if let Some(ref path) = cli.prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let mut builder = FillConfig::builder()
        .template_dir(cli.template_dir.clone())
        .output_dir(cli.output_dir.clone())
        .debug_artifacts(!cli.no_debug_artifacts)
        .header_row(cli.header_row)
        .first_data_row(cli.data_row)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(prompt) = prompt_override {
        builder = builder.prompt_override(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
