//! Short Decision - A-share short-term decision tools.
//!
//! Each subcommand runs one tool and prints its result as JSON on stdout.
//! Logs go to stderr.

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use short_common::config::{resolve_debug, Config};
use short_common::logging::init_logging_with_exclusions;
use short_common::{Error, Validate};
use short_decision::data::MarketData;
use short_decision::engine::{fetch_debug_info, with_debug, SignalEngine};
use short_decision::fusion::{FusionConfig, SubScores};
use short_decision::report::{DailyReport, ReportFormat};
use short_decision::risk::{parse_score, RiskPolicy};
use std::path::PathBuf;
use std::process::ExitCode;

/// A-share short-term decision tools.
#[derive(Parser, Debug)]
#[command(name = "short-decision")]
#[command(version)]
#[command(about = "A-share short-term decision tools", long_about = None)]
struct Cli {
    /// Attach debug_info to tool outputs
    #[arg(long, global = true)]
    debug: bool,

    /// Config file (default: ~/.short-decision/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Market snapshot JSON to compute from
    #[arg(long, global = true, env = "SHORT_DECISION_SNAPSHOT")]
    snapshot: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Limit-up/limit-down statistics and sentiment score
    MarketSentiment,

    /// Strongest sectors of the day
    SectorRotation {
        #[arg(long, default_value_t = 5)]
        top_n: usize,
    },

    /// Scan for strong stocks
    ScanStrongStocks {
        /// Restrict to these sectors (comma separated)
        #[arg(long, value_delimiter = ',')]
        sectors: Vec<String>,

        #[arg(long, default_value_t = 10)]
        top_n: usize,
    },

    /// Main-force and northbound capital flow
    CapitalFlow {
        /// Stock code (default: whole market)
        #[arg(long)]
        symbol: Option<String>,
    },

    /// Run the full signal engine
    Signal,

    /// Risk control for a sentiment score
    RiskControl {
        #[arg(long, default_value = "50")]
        score: String,
    },

    /// Fuse five sub-scores given as a JSON object
    Fuse {
        /// e.g. '{"sentiment":72,"sector_strength":80,...}'
        #[arg(long)]
        scores: String,
    },

    /// Daily report
    DailyReport {
        /// text or json
        #[arg(long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "Command failed");
            eprintln!("Error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

/// Map an error onto the process exit code.
fn exit_code(err: &anyhow::Error) -> u8 {
    let code = err.downcast_ref::<Error>().map_or(1, Error::exit_code);
    u8::try_from(code).unwrap_or(1)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn market_data(config: &Config) -> Result<MarketData> {
    Ok(MarketData::from_config(&config.data)
        .await
        .map_err(Error::from)?)
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load_with_env(cli.config.as_deref())
        .map_err(|e| Error::Config(format!("{e:#}")))?;
    if let Some(path) = &cli.snapshot {
        config.data.snapshot_path = Some(path.display().to_string());
    }
    config.decision.debug = resolve_debug(cli.debug || config.decision.debug);
    config
        .validate()
        .map_err(|e| Error::Config(e.to_string()))?;

    init_logging_with_exclusions(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );
    tracing::debug!("Short Decision v{}", env!("CARGO_PKG_VERSION"));

    let debug = config.decision.debug;

    match cli.command {
        Commands::MarketSentiment => {
            let data = market_data(&config).await?;
            let fetched = data.market_sentiment().await.map_err(Error::from)?;
            let info = debug.then(|| fetch_debug_info("get_market_sentiment", &fetched));
            print_json(&with_debug(&fetched.data, info)?)
        }
        Commands::SectorRotation { top_n } => {
            let data = market_data(&config).await?;
            let fetched = data.sector_rotation(top_n).await.map_err(Error::from)?;
            let info = debug.then(|| fetch_debug_info("get_sector_rotation", &fetched));
            print_json(&with_debug(&fetched.data, info)?)
        }
        Commands::ScanStrongStocks { sectors, top_n } => {
            let data = market_data(&config).await?;
            let fetched = data
                .scan_strong_stocks(&sectors, top_n)
                .await
                .map_err(Error::from)?;
            let info = debug.then(|| fetch_debug_info("scan_strong_stocks", &fetched));
            print_json(&with_debug(&fetched.data, info)?)
        }
        Commands::CapitalFlow { symbol } => {
            let data = market_data(&config).await?;
            let fetched = data
                .capital_flow(symbol.as_deref())
                .await
                .map_err(Error::from)?;
            let info = debug.then(|| fetch_debug_info("analyze_capital_flow", &fetched));
            print_json(&with_debug(&fetched.data, info)?)
        }
        Commands::Signal => {
            let data = market_data(&config).await?;
            let engine = SignalEngine::from_config(&config)?;
            print_json(&engine.run(&data).await?)
        }
        Commands::RiskControl { score } => {
            let score = parse_score(&score)?;
            let policy = RiskPolicy::from_decision_config(&config.decision);
            print_json(&policy.control(score))
        }
        Commands::Fuse { scores } => {
            let scores = SubScores::from_json_str(&scores)?;
            let fusion = FusionConfig::from_decision_config(&config.decision)?;
            print_json(&fusion.fuse(&scores))
        }
        Commands::DailyReport { format } => {
            let format: ReportFormat = format.parse()?;
            let data = market_data(&config).await?;
            let engine = SignalEngine::from_config(&config)?;
            let report = DailyReport::new(engine.run(&data).await?);
            match format {
                ReportFormat::Text => {
                    println!("{}", report.render(format)?);
                    Ok(())
                }
                ReportFormat::Json => print_json(&report),
            }
        }
    }
}
