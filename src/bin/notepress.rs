//! CLI binary for notepress.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExportConfig` and writes or prints results.

use anyhow::{Context, Result};
use clap::Parser;
use notepress::{
    export_docx, export_html, read_note, theme, Collaborators, DirectoryStore, ExportConfig,
    ExportProgressCallback, ImageMode, OutputFormat, ProgressCallback, SourceContext,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per image.
/// Images in a batch finish out of order, so every line carries its index.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Exporting");
        bar.set_message("Rendering note…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} images  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Images");
    }
}

impl ExportProgressCallback for CliProgressCallback {
    fn on_export_start(&self, total_images: usize) {
        if total_images > 0 {
            self.activate_bar(total_images);
        }
    }

    fn on_image_start(&self, _index: usize, _total: usize, path: &str) {
        self.bar.set_message(path.to_string());
    }

    fn on_image_complete(&self, index: usize, total: usize, path: &str) {
        self.bar.println(format!(
            "  {} Image {:>3}/{:<3}  {}",
            green("✓"),
            index,
            total,
            dim(path)
        ));
        self.bar.inc(1);
    }

    fn on_image_error(&self, index: usize, total: usize, path: &str, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Image {:>3}/{:<3}  {}  {}",
            red("✗"),
            index,
            total,
            dim(path),
            red(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_export_complete(&self, total_images: usize, success_count: usize) {
        self.bar.finish_and_clear();
        if total_images == 0 {
            return;
        }
        let failed = total_images.saturating_sub(success_count);
        if failed == 0 {
            eprintln!("{} {} images embedded", green("✔"), bold(&success_count.to_string()));
        } else {
            eprintln!(
                "{} {}/{} images embedded  ({} marked as missing)",
                cyan("⚠"),
                bold(&success_count.to_string()),
                total_images,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # HTML to stdout, images inlined as data: URIs
  notepress notes/physics.md

  # Themed HTML with a table of contents
  notepress notes/physics.md --theme academic --toc -o physics.html

  # Word document
  notepress notes/physics.md -o physics.docx --header "Draft" --footer "ACME Corp"

  # Upload mode: images copied into ./public/img and referenced by URL
  notepress notes/physics.md -o site/physics.html \
      --image-mode upload --assets-dir site/img --asset-prefix /img

  # Note outside the vault root
  notepress --vault ~/vault ~/vault/projects/plan.md -o plan.html

  # Document model as JSON (images base64-encoded)
  notepress --json notes/physics.md > physics.json

THEMES:
  default, github, academic, sepia

ENVIRONMENT VARIABLES:
  NOTEPRESS_VAULT         Vault root (default: the note's directory)
  NOTEPRESS_THEME         Theme name
  NOTEPRESS_IMAGE_MODE    embed | upload
  RUST_LOG                Override log filter (e.g. notepress=debug)
"#;

/// Export vault notes to self-contained HTML and Word documents.
#[derive(Parser, Debug)]
#[command(
    name = "notepress",
    version,
    about = "Export vault notes to self-contained HTML and Word documents",
    long_about = "Export Markdown notes (LaTeX math, ![[embeds]], callouts, tables, code) to a \
single self-contained HTML file with inline styles, or to a .docx document with rendered \
formulas and embedded images.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Markdown note to export.
    input: PathBuf,

    /// Write to this file (.html or .docx) instead of printing HTML to stdout.
    #[arg(short, long, env = "NOTEPRESS_OUTPUT")]
    output: Option<PathBuf>,

    /// Vault root used to resolve embeds. Default: the note's directory.
    #[arg(long, env = "NOTEPRESS_VAULT")]
    vault: Option<PathBuf>,

    /// How images are referenced: embed (data: URIs) or upload (asset store).
    #[arg(long, env = "NOTEPRESS_IMAGE_MODE", value_enum, default_value = "embed")]
    image_mode: ImageModeArg,

    /// Directory uploaded images are written to (upload mode).
    #[arg(long, env = "NOTEPRESS_ASSETS_DIR")]
    assets_dir: Option<PathBuf>,

    /// URL prefix for uploaded images (upload mode).
    #[arg(long, env = "NOTEPRESS_ASSET_PREFIX", default_value = "assets")]
    asset_prefix: String,

    /// Theme: default, github, academic, sepia.
    #[arg(long, env = "NOTEPRESS_THEME", default_value = "default")]
    theme: String,

    /// Insert a table of contents after the first heading.
    #[arg(long, env = "NOTEPRESS_TOC")]
    toc: bool,

    /// Header text (HTML header / DOCX page header).
    #[arg(long, env = "NOTEPRESS_HEADER")]
    header: Option<String>,

    /// Footer text (HTML footer / DOCX page footer).
    #[arg(long, env = "NOTEPRESS_FOOTER")]
    footer: Option<String>,

    /// Document title. Default: frontmatter title, first heading, file name.
    #[arg(long, env = "NOTEPRESS_TITLE")]
    title: Option<String>,

    /// Max image width in the Word document, in pixels.
    #[arg(long, env = "NOTEPRESS_MAX_IMAGE_WIDTH", default_value_t = 600)]
    max_image_width: u32,

    /// Timeout for remote image downloads, in seconds.
    #[arg(long, env = "NOTEPRESS_FETCH_TIMEOUT", default_value_t = 30)]
    fetch_timeout: u64,

    /// Print the document model as JSON instead of writing output.
    #[arg(long, env = "NOTEPRESS_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "NOTEPRESS_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "NOTEPRESS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "NOTEPRESS_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ImageModeArg {
    Embed,
    Upload,
}

impl From<ImageModeArg> for ImageMode {
    fn from(v: ImageModeArg) -> Self {
        match v {
            ImageModeArg::Embed => ImageMode::Embed,
            ImageModeArg::Upload => ImageMode::Upload,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar is the feedback while it is active; library INFO
    // lines would tear it.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && cli.output.is_some();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if !theme::theme_names().any(|t| t == cli.theme) && !cli.quiet {
        eprintln!("{} unknown theme '{}', using default", cyan("⚠"), cli.theme);
    }

    // ── Resolve the note inside its vault ────────────────────────────────
    let markdown = read_note(&cli.input).await.context("Failed to read note")?;
    let vault_root = match &cli.vault {
        Some(v) => v.clone(),
        None => cli
            .input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    let source = SourceContext::new(note_path_in_vault(&cli.input, &vault_root));

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExportProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    let mut collab = Collaborators::for_vault(vault_root.clone());
    if config.image_mode == ImageMode::Upload {
        let dir = match (&cli.assets_dir, &cli.output) {
            (Some(dir), _) => dir.clone(),
            (None, Some(out)) => out.parent().unwrap_or(Path::new(".")).join(&cli.asset_prefix),
            (None, None) => PathBuf::from(&cli.asset_prefix),
        };
        collab = collab.with_store(Arc::new(DirectoryStore::new(dir, cli.asset_prefix.clone())));
    }

    // ── JSON mode ────────────────────────────────────────────────────────
    if cli.json {
        let output = export_docx(&markdown, &source, &collab, &config)
            .await
            .context("Export failed")?;
        let json = serde_json::to_string_pretty(&output.document).context("Failed to serialise document")?;
        println!("{json}");
        return Ok(());
    }

    // ── Run export ───────────────────────────────────────────────────────
    match cli.output {
        Some(ref output_path) => {
            let format = OutputFormat::from_path(output_path)?;
            let stats = notepress::export_to_file(&markdown, &source, &collab, &config, output_path)
                .await
                .context("Export failed")?;
            if !cli.quiet {
                eprintln!(
                    "{}  {} {}  {}/{} images  {}ms  →  {}",
                    if stats.images_failed == 0 {
                        green("✔")
                    } else {
                        cyan("⚠")
                    },
                    match format {
                        OutputFormat::Html => "HTML",
                        OutputFormat::Docx => "DOCX",
                    },
                    dim(&format!("{} formulas", stats.math_count)),
                    stats.images_ok(),
                    stats.images_total,
                    stats.total_duration_ms,
                    bold(&output_path.display().to_string()),
                );
            }
        }
        None => {
            let output = export_html(&markdown, &source, &collab, &config)
                .await
                .context("Export failed")?;
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(output.html.as_bytes())
                .context("Failed to write to stdout")?;
            if !cli.quiet {
                eprintln!(
                    "Exported '{}': {}/{} images, {} formulas in {}ms",
                    output.title,
                    output.stats.images_ok(),
                    output.stats.images_total,
                    output.stats.math_count,
                    output.stats.total_duration_ms
                );
                for err in &output.asset_errors {
                    eprintln!("  {} {}", red("✗"), err);
                }
            }
        }
    }

    Ok(())
}

/// Vault-relative path of the note with `/` separators; the bare file name
/// when the note lies outside the vault.
fn note_path_in_vault(note: &Path, vault: &Path) -> String {
    let canonical = |p: &Path| std::fs::canonicalize(p).unwrap_or_else(|_| p.to_path_buf());
    let (note_abs, vault_abs) = (canonical(note), canonical(vault));
    let rel = note_abs
        .strip_prefix(&vault_abs)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| PathBuf::from(note.file_name().unwrap_or(note.as_os_str())));
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Map CLI args to `ExportConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExportConfig> {
    let mut builder = ExportConfig::builder()
        .image_mode(cli.image_mode.into())
        .theme(cli.theme.clone())
        .include_toc(cli.toc)
        .max_image_width(cli.max_image_width)
        .fetch_timeout_secs(cli.fetch_timeout);
    if let Some(ref h) = cli.header {
        builder = builder.header_text(h.clone());
    }
    if let Some(ref f) = cli.footer {
        builder = builder.footer_text(f.clone());
    }
    if let Some(ref t) = cli.title {
        builder = builder.title(t.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    Ok(builder.build()?)
}
