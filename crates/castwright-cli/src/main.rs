//! `castwright` command-line front end.
//!
//! Reads a narration script and its content items from disk, runs the
//! episode pipeline and prints the produced files, timestamps and issues.

use anyhow::{Context, Result};
use castwright_core::{ContentItem, EngineConfig, EpisodePipeline, RunContext, Severity};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Turn a marker-delimited narration script into a transition-cued episode
#[derive(Debug, Parser)]
#[command(name = "castwright", version, about)]
struct Args {
    /// Narration script with segments separated by the segment marker
    #[arg(long)]
    script: PathBuf,

    /// JSON array of content items ({title, url, source, segment_index})
    #[arg(long)]
    items: Option<PathBuf>,

    /// TOML engine configuration; defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output directory for the run
    #[arg(long)]
    out: PathBuf,

    /// File stem of the produced episode
    #[arg(long, default_value = "episode")]
    name: String,

    /// Keep synthesized units and the cue after assembly
    #[arg(long)]
    keep_intermediate: bool,

    /// Log debug output (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose {
        "castwright=debug,castwright_core=debug"
    } else {
        "castwright=info,castwright_core=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_items(path: Option<&Path>) -> Result<Vec<ContentItem>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read items file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid items JSON in {}", path.display()))
}

fn load_config(args: &Args) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if args.keep_intermediate {
        config.keep_intermediate = true;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = load_config(&args)?;
    let script = std::fs::read_to_string(&args.script)
        .with_context(|| format!("Failed to read script {}", args.script.display()))?;
    let items = load_items(args.items.as_deref())?;

    let ctx = RunContext::create(&args.out, &args.name).context("Failed to prepare output directory")?;
    info!(run_id = %ctx.run_id(), items = items.len(), "Loaded inputs");

    let pipeline = EpisodePipeline::from_config(config).context("Failed to set up engines")?;
    let episode = pipeline
        .run(&script, &items, &ctx)
        .await
        .context("Episode production failed")?;

    println!("Episode: {}", episode.stream_path.display());
    if episode.parts.len() > 1 {
        for part in &episode.parts {
            println!("  part: {}", part.display());
        }
    }
    println!(
        "Duration: {:.1}s at tempo {} ({} group(s), {} unit(s))",
        episode.report.playback_duration_secs,
        pipeline.config().tempo,
        episode.report.groups_produced,
        episode.report.units_produced
    );

    if !episode.timestamps.is_empty() {
        println!("Timestamps:");
        for entry in &episode.timestamps {
            println!("  {} {}", entry.label(), entry.title);
        }
    }

    let errors = episode.report.issues_with(Severity::Error).count();
    let warnings = episode.report.issues_with(Severity::Warning).count();
    if errors + warnings > 0 {
        println!("Issues: {errors} error(s), {warnings} warning(s)");
        for issue in &episode.report.issues {
            println!("  - {}", issue.summary());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "castwright", "--script", "script.txt", "--out", "out", "--verbose",
        ])
        .unwrap();
        assert_eq!(args.name, "episode");
        assert!(args.verbose);
        assert!(args.items.is_none());
    }

    #[test]
    fn test_script_is_required() {
        assert!(Args::try_parse_from(["castwright", "--out", "out"]).is_err());
    }

    #[test]
    fn test_load_items() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("items.json");
        std::fs::write(
            &path,
            r#"[{"title": "Protein Folding Breakthrough", "url": "https://example.org/a", "source": "Nature", "segment_index": 1}]"#,
        )
        .unwrap();

        let items = load_items(Some(&path)).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].segment_index, 1);
        assert!(load_items(None).unwrap().is_empty());
    }

    #[test]
    fn test_keep_intermediate_flag_overrides_config() {
        let args = Args::try_parse_from([
            "castwright", "--script", "s.txt", "--out", "o", "--keep-intermediate",
        ])
        .unwrap();
        assert!(load_config(&args).unwrap().keep_intermediate);
    }
}
