//! Mixtape command line
//!
//! Runs the mixing engine over a session file:
//!
//! ```json
//! {
//!   "pools":   [{ "id": "rock", "name": "Rock", "items": [{ "id": "r1", "duration_ms": 215000 }] }],
//!   "ratios":  { "rock": { "weight": 3, "min_group": 1, "max_group": 2 } },
//!   "options": { "target_count": 20, "shape_strategy": "front-loaded" }
//! }
//! ```
//!
//! Logs go to stderr so `--format json` output can be piped.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mixtape_engine::human_time::{format_duration_ms, format_duration_ms_opt};
use mixtape_engine::{
    config::CONFIG_ENV_VAR, ContentShortfall, ExhaustionProjection, MixEngine, MixOptions,
    MixResult, RatioConfig, SourcePool, SourceShare, StopReason, TargetUnit, TomlConfig,
};

/// Command-line arguments for mixtape
#[derive(Parser, Debug)]
#[command(name = "mixtape")]
#[command(about = "Blend weighted playlists into a single mix")]
#[command(version)]
struct Cli {
    /// Settings file (TOML)
    #[arg(short, long, global = true, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Run a mix and print the sequence
    Mix {
        /// Session file (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Random seed; the configured default seed when omitted
        #[arg(short, long)]
        seed: Option<u64>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Print advisories and proportions without mixing
    Check {
        /// Session file (JSON)
        #[arg(short, long)]
        input: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

/// Everything one mix call needs
#[derive(Debug, Deserialize)]
struct Session {
    pools: Vec<SourcePool>,
    #[serde(default)]
    ratios: RatioConfig,
    #[serde(default)]
    options: MixOptions,
}

impl Session {
    fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read session file {}", path.display()))?;
        let session = Self::parse(&content)
            .with_context(|| format!("Invalid session file {}", path.display()))?;
        info!(
            "Session {}: {} pools, {} items",
            path.display(),
            session.pools.len(),
            session.pools.iter().map(|p| p.items.len()).sum::<usize>()
        );
        Ok(session)
    }

    fn parse(content: &str) -> Result<Self> {
        let mut session: Session = serde_json::from_str(content)?;
        // Items in a session file do not repeat their pool id
        session.pools = session
            .pools
            .into_iter()
            .map(|pool| {
                let average = pool.average_duration_ms;
                let mut stamped = SourcePool::new(pool.id, pool.name, pool.items);
                stamped.average_duration_ms = average;
                stamped
            })
            .collect();
        Ok(session)
    }
}

fn init_tracing(default_level: &str) {
    let fallback = format!("mixtape={0},mixtape_engine={0}", default_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, origin) =
        TomlConfig::load(cli.config.as_deref()).context("Failed to load settings")?;
    init_tracing(&config.logging.level);
    origin.log();

    let engine = MixEngine::new(config.mixer);

    match cli.command {
        Command::Mix {
            input,
            seed,
            format,
        } => {
            let session = Session::load(&input)?;
            let result = engine
                .mix(&session.pools, &session.ratios, &session.options, seed)
                .context("Mix failed")?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
                OutputFormat::Text => print!("{}", render_mix(&session.pools, &result)),
            }
        }
        Command::Check { input } => {
            let session = Session::load(&input)?;
            let shares = engine
                .proportions(&session.pools, &session.ratios, &session.options)
                .context("Invalid mix configuration")?;
            let projection =
                engine.project_exhaustion(&session.pools, &session.ratios, &session.options)?;
            let shortfall = engine.check_sufficient_content(
                &session.pools,
                &session.ratios,
                &session.options,
            )?;
            print!(
                "{}",
                render_check(&shares, projection.as_ref(), shortfall.as_ref())
            );
        }
    }

    Ok(())
}

fn format_amount(unit: TargetUnit, value: u64) -> String {
    match unit {
        TargetUnit::Count => format!("{} items", value),
        TargetUnit::Duration => format_duration_ms(value),
    }
}

fn render_projection(projection: &ExhaustionProjection) -> String {
    format!(
        "Advisory: '{}' runs dry at {}\n",
        projection.limiting_source_id,
        format_amount(projection.unit, projection.projected_at)
    )
}

fn render_shortfall(shortfall: &ContentShortfall) -> String {
    format!(
        "Advisory: {} requested, only {} available\n",
        format_amount(shortfall.unit, shortfall.requested),
        format_amount(shortfall.unit, shortfall.available)
    )
}

fn render_mix(pools: &[SourcePool], result: &MixResult) -> String {
    let status = match result.stop {
        StopReason::Complete => "complete",
        StopReason::Exhausted => "incomplete",
        StopReason::AllExhausted => "all sources used",
    };
    let mut out = format!(
        "Mix: {} items, {}, seed {} ({})\n",
        result.len(),
        format_duration_ms(result.total_duration_ms),
        result.seed,
        status
    );
    if let Some(id) = &result.limiting_source_id {
        out.push_str(&format!("First source to run dry: '{}'\n", id));
    }
    if let Some(projection) = &result.projection {
        out.push_str(&render_projection(projection));
    }

    out.push('\n');
    for mixed in &result.items {
        let name = pools
            .iter()
            .find(|p| p.id == mixed.source_id)
            .map(|p| p.name.as_str())
            .unwrap_or(mixed.source_id.as_str());
        let quadrant = mixed
            .quadrant
            .map(|q| q.to_string())
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "{:>4}  {:<16} {:<24} {:>8}  {}\n",
            mixed.index + 1,
            name,
            mixed.item.id,
            format_duration_ms_opt(mixed.item.duration_ms),
            quadrant
        ));
    }

    out.push('\n');
    for stats in &result.per_source {
        out.push_str(&format!(
            "{:<16} {:>4} items  {:>9}\n",
            stats.name,
            stats.count,
            format_duration_ms(stats.total_duration_ms)
        ));
    }
    out
}

fn render_check(
    shares: &[SourceShare],
    projection: Option<&ExhaustionProjection>,
    shortfall: Option<&ContentShortfall>,
) -> String {
    let mut out = String::new();
    for share in shares {
        out.push_str(&format!(
            "{:<16} {:>6.1}%  avg {}\n",
            share.source_id,
            share.percent(),
            format_duration_ms(share.average_duration_ms)
        ));
    }
    if let Some(projection) = projection {
        out.push_str(&render_projection(projection));
    }
    if let Some(shortfall) = shortfall {
        out.push_str(&render_shortfall(shortfall));
    }
    if projection.is_none() && shortfall.is_none() {
        out.push_str("No advisories\n");
    }
    out
}
