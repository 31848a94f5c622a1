//! CLI binary for doc2pub.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `BatchConfig` and prints results. The default mode is a dry run that
//! prints the conversion plan; `--execute` runs the batch with the
//! built-in passthrough converter (format converters plug in via the
//! library API).

use anyhow::{Context, Result};
use clap::Parser;
use doc2pub::{
    progress_channel, run_batch_with_progress, BatchConfig, PassthroughConverter, Phase,
    TargetFormat,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
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
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

const AFTER_HELP: &str = r#"EXAMPLES:
  # Show the conversion plan (dry run, default)
  doc2pub export/Content out/docs

  # Convert to AsciiDoc with heading-derived filenames
  doc2pub export/Content out/docs --execute --rename-from-headings

  # Markdown, flat output, only the user guide
  doc2pub export out/md --execute --format markdown --flat --include guide

  # Exclude internal-only topics by condition marker
  doc2pub export out --execute --exclude-condition InternalOnly

  # Structured JSON result for scripting
  doc2pub export out --execute --json > result.json

FORMATS:
  asciidoc             .adoc   (default)
  markdown             .md
  writerside-markdown  .md
  zendesk              .html
  plain-text           .txt

EXIT STATUS:
  0  the batch ran; inspect the result for per-file errors
  1  fatal error (unusable config, output root not creatable)
"#;

/// Batch-convert documentation export trees to publishing formats.
#[derive(Parser, Debug)]
#[command(
    name = "doc2pub",
    version,
    about = "Batch-convert documentation export trees to publishing formats",
    long_about = "Discover convertible topic files under an export tree, plan their output \
paths (mirroring the tree or following a TOC plan), convert them in throttled chunks with \
per-file failure isolation, and repair cross-document links after renames.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input root: the export tree to convert.
    input: PathBuf,

    /// Output root for converted files.
    output: PathBuf,

    /// Target format: asciidoc, markdown, writerside-markdown, zendesk, plain-text.
    #[arg(short, long, env = "DOC2PUB_FORMAT", value_enum, default_value = "asciidoc")]
    format: FormatArg,

    /// Run the conversion (default is a dry-run plan listing).
    #[arg(long)]
    execute: bool,

    /// Derive output filenames from each document's first heading.
    #[arg(long, env = "DOC2PUB_RENAME")]
    rename_from_headings: bool,

    /// Do not descend into subdirectories.
    #[arg(long)]
    no_recursive: bool,

    /// Flatten output: ignore the input directory structure.
    #[arg(long)]
    flat: bool,

    /// Skip the directory-level image copy.
    #[arg(long)]
    no_images: bool,

    /// Only convert files whose basename matches (substring or *.suffix).
    #[arg(long = "include", value_name = "PATTERN")]
    include_patterns: Vec<String>,

    /// Exclude files whose basename matches (substring or *.suffix).
    #[arg(long = "exclude", value_name = "PATTERN")]
    exclude_patterns: Vec<String>,

    /// Exclude files carrying this condition-marker value.
    #[arg(long = "exclude-condition", value_name = "CONDITION")]
    exclude_conditions: Vec<String>,

    /// Tasks per chunk.
    #[arg(long, env = "DOC2PUB_CHUNK_SIZE", default_value_t = 50)]
    chunk_size: usize,

    /// Delay between chunks in milliseconds.
    #[arg(long, env = "DOC2PUB_CHUNK_DELAY", default_value_t = 1000)]
    chunk_delay: u64,

    /// Per-file conversion timeout in milliseconds.
    #[arg(long, env = "DOC2PUB_TIMEOUT", default_value_t = 30_000)]
    timeout: u64,

    /// Heartbeat period in milliseconds.
    #[arg(long, env = "DOC2PUB_HEARTBEAT", default_value_t = 5_000)]
    heartbeat: u64,

    /// Output the structured BatchResult as JSON.
    #[arg(long, env = "DOC2PUB_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "DOC2PUB_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOC2PUB_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOC2PUB_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum FormatArg {
    Asciidoc,
    Markdown,
    WritersideMarkdown,
    Zendesk,
    PlainText,
}

impl From<FormatArg> for TargetFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Asciidoc => TargetFormat::Asciidoc,
            FormatArg::Markdown => TargetFormat::Markdown,
            FormatArg::WritersideMarkdown => TargetFormat::WritersideMarkdown,
            FormatArg::Zendesk => TargetFormat::Zendesk,
            FormatArg::PlainText => TargetFormat::PlainText,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && cli.execute;
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
        .with_writer(std::io::stderr)
        .init();

    let config = build_config(&cli)?;

    if !cli.execute {
        return print_plan(&cli, &config).await;
    }

    // ── Progress bar fed by the event channel ────────────────────────────
    let (tx, mut rx) = progress_channel();
    let progress_task = if show_progress {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>4}/{len} files  ⏱ {elapsed_precise}  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Some(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event.phase {
                    Phase::Discovery => {
                        bar.set_length(event.total as u64);
                        bar.println(format!(
                            "{} {}",
                            cyan("◆"),
                            bold(&format!("Discovered {} files", event.total))
                        ));
                    }
                    Phase::Converting => {
                        bar.set_position(event.index as u64);
                        if let Some(file) = &event.current_file {
                            let name = file
                                .file_name()
                                .map(|n| n.to_string_lossy().into_owned())
                                .unwrap_or_default();
                            bar.set_message(name);
                        }
                    }
                    Phase::Completed => {
                        bar.finish_and_clear();
                    }
                }
            }
        }))
    } else {
        // Events still drain so the sender never observes backpressure.
        Some(tokio::spawn(async move { while rx.recv().await.is_some() {} }))
    };

    let result = run_batch_with_progress(&cli.input, &cli.output, &config, tx)
        .await
        .context("batch conversion failed")?;
    if let Some(task) = progress_task {
        task.await.ok();
    }

    // ── Report ───────────────────────────────────────────────────────────
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("failed to serialise result")?
        );
        return Ok(());
    }

    if !cli.quiet {
        let tick = if result.errors.is_empty() {
            green("✔")
        } else {
            yellow("⚠")
        };
        eprintln!(
            "{tick} {} converted, {} skipped, {} errors  →  {}",
            bold(&result.converted.to_string()),
            result.skipped,
            result.errors.len(),
            bold(&cli.output.display().to_string()),
        );
        for entry in &result.errors {
            eprintln!(
                "  {} [{}/{}] {}  {}",
                red("✗"),
                entry.index,
                entry.total,
                entry.file.display(),
                dim(&entry.detail),
            );
        }
        if cli.verbose {
            for entry in &result.skipped_list {
                eprintln!(
                    "  {} {}  {}",
                    dim("-"),
                    entry.file.display(),
                    dim(&entry.reason)
                );
            }
        }
        if let Some(quality) = &result.quality {
            eprintln!(
                "   quality: mean {:.1}, {} issues, {} below threshold",
                quality.mean_score,
                quality.total_issues,
                quality.below_threshold.len()
            );
        }
    }

    Ok(())
}

/// Dry run: print the discovered → planned table without converting.
async fn print_plan(cli: &Cli, config: &BatchConfig) -> Result<()> {
    use doc2pub::pipeline::{discover, plan};

    let candidates = discover::discover(&cli.input, config);
    let (tasks, mapping) =
        plan::plan_outputs(candidates, &cli.input, &cli.output, config).await;

    let mut planned = 0usize;
    let mut skipped = 0usize;
    for task in &tasks {
        match (&task.output, &task.skip) {
            (Some(output), None) => {
                planned += 1;
                println!(
                    "{}  {}  {}",
                    green("→"),
                    task.relative_input,
                    dim(&output.display().to_string())
                );
            }
            (_, Some(reason)) => {
                skipped += 1;
                println!("{}  {}  {}", yellow("-"), task.relative_input, dim(&reason.to_string()));
            }
            _ => {}
        }
    }

    eprintln!(
        "\n{} {planned} to convert, {skipped} to skip{}",
        bold("plan:"),
        if mapping.is_empty() {
            String::new()
        } else {
            format!(", {} heading renames", mapping.len())
        }
    );
    eprintln!("{}", dim("run again with --execute to convert"));
    Ok(())
}

/// Map CLI args to `BatchConfig`.
fn build_config(cli: &Cli) -> Result<BatchConfig> {
    let config = BatchConfig::builder()
        .recursive(!cli.no_recursive)
        .preserve_structure(!cli.flat)
        .copy_images(!cli.no_images)
        .rename_from_headings(cli.rename_from_headings)
        .include_patterns(cli.include_patterns.clone())
        .exclude_patterns(cli.exclude_patterns.clone())
        .exclude_conditions(cli.exclude_conditions.clone())
        .chunk_size(cli.chunk_size)
        .chunk_delay_ms(cli.chunk_delay)
        .per_file_timeout_ms(cli.timeout)
        .heartbeat_interval_ms(cli.heartbeat)
        .format(cli.format.clone().into())
        .converter(Arc::new(PassthroughConverter))
        .build()
        .context("invalid configuration")?;
    Ok(config)
}
