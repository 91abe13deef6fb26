//! Market data layer.
//!
//! Tool results (sentiment, sector rotation, strong stocks, capital flow) come
//! from a [`MarketDataProvider`]. [`MarketData`] pairs the configured primary
//! provider with the built-in [`FallbackProvider`] and switches to the
//! fallback whenever the primary fails.

pub mod fallback;
pub mod scan;
pub mod snapshot;

pub use fallback::FallbackProvider;
pub use scan::{analyze_capital_flow, scan_candidates, ScanRules};
pub use snapshot::{MarketSnapshot, SnapshotProvider};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use short_common::config::DataConfig;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// Tool result types
// ============================================================================

/// Where a tool result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// Computed from a market snapshot file
    Snapshot,
    /// Built-in reference values
    Fallback,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Snapshot => write!(f, "snapshot"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// Limit-up/limit-down statistics and the derived sentiment score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSentiment {
    /// Trade date (YYYY-MM-DD)
    pub date: String,
    pub limit_up: u32,
    pub limit_down: u32,
    /// Highest consecutive limit-up streak
    pub max_height: u32,
    /// Share of limit-up attempts that failed to hold
    pub break_rate: f64,
    /// Total market turnover (yuan)
    pub turnover: i64,
    pub market_sentiment_score: f64,
    pub data_source: DataSource,
}

/// One sector board with its short-term strength.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorStrength {
    pub name: String,
    pub change_pct: f64,
    pub turnover: i64,
    pub limit_up_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board_code: Option<String>,
    pub strength: f64,
}

/// Strongest sectors of the day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorRotation {
    pub date: String,
    pub top_sectors: Vec<SectorStrength>,
    pub data_source: DataSource,
}

impl SectorRotation {
    pub fn sector_names(&self) -> Vec<String> {
        self.top_sectors.iter().map(|s| s.name.clone()).collect()
    }
}

/// A stock that passed the strong-stock scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockCandidate {
    pub code: String,
    pub name: String,
    pub change_pct: f64,
    pub volume_ratio: f64,
    /// 1-based rank within the scan result
    pub strength_rank: u32,
    pub sector: String,
}

/// Main-force and northbound capital flow for a symbol or the whole market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapitalFlow {
    /// Stock code, or `market`
    pub symbol: String,
    pub main_flow: i64,
    pub northbound_net: i64,
    pub northbound_inflow_days: u32,
    pub flow_trend: String,
    pub strength_rank: u32,
    pub data_source: DataSource,
}

// ============================================================================
// Provider Error
// ============================================================================

/// Errors specific to data providers.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The snapshot could not be read
    #[error("Snapshot read failed: {0}")]
    Io(String),
    /// The snapshot could not be parsed
    #[error("Snapshot parse failed: {0}")]
    Parse(String),
    /// The provider has no data for the request
    #[error("Data not available: {0}")]
    DataNotAvailable(String),
    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// Whether switching to the fallback provider can help.
    pub fn should_fallback(&self) -> bool {
        !matches!(self, Self::InvalidRequest(_))
    }
}

impl From<ProviderError> for short_common::Error {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::InvalidRequest(msg) => Self::InvalidInput(msg),
            other => Self::DataSource(other.to_string()),
        }
    }
}

// ============================================================================
// Provider trait
// ============================================================================

/// Trait for market data providers.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Provider name (e.g. "snapshot", "fallback")
    fn name(&self) -> &'static str;

    /// Limit-up/down statistics and the sentiment score.
    async fn market_sentiment(&self) -> Result<MarketSentiment, ProviderError>;

    /// Top `top_n` sectors by strength.
    async fn sector_rotation(&self, top_n: usize) -> Result<SectorRotation, ProviderError>;

    /// Strong stocks, restricted to `sectors` when non-empty.
    async fn scan_strong_stocks(
        &self,
        sectors: &[String],
        top_n: usize,
    ) -> Result<Vec<StockCandidate>, ProviderError>;

    /// Capital flow for `symbol`, or the market-level proxy when `None`.
    async fn capital_flow(&self, symbol: Option<&str>) -> Result<CapitalFlow, ProviderError>;
}

// ============================================================================
// Primary + fallback
// ============================================================================

/// A tool result together with how it was obtained.
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    pub data: T,
    pub provider: &'static str,
    /// Why the fallback was used, if it was
    pub fallback_reason: Option<String>,
}

/// Primary provider with automatic fallback to built-in data.
pub struct MarketData {
    primary: Option<Arc<dyn MarketDataProvider>>,
    fallback: Option<FallbackProvider>,
    /// Reason the primary is absent
    primary_unavailable: Option<String>,
}

impl MarketData {
    /// Only the built-in fallback data.
    pub fn fallback_only() -> Self {
        Self {
            primary: None,
            fallback: Some(FallbackProvider::new()),
            primary_unavailable: Some("no snapshot configured".into()),
        }
    }

    /// A primary provider, optionally backed by the fallback.
    pub fn with_primary(primary: Arc<dyn MarketDataProvider>, fallback_enabled: bool) -> Self {
        Self {
            primary: Some(primary),
            fallback: fallback_enabled.then(FallbackProvider::new),
            primary_unavailable: None,
        }
    }

    /// Build from configuration, loading the snapshot file if one is set.
    ///
    /// A snapshot that fails to load is tolerated when the fallback is enabled.
    pub async fn from_config(config: &DataConfig) -> Result<Self, ProviderError> {
        let Some(path) = config.snapshot_path.as_deref() else {
            if !config.fallback_enabled {
                return Err(ProviderError::DataNotAvailable(
                    "no snapshot configured and fallback disabled".into(),
                ));
            }
            return Ok(Self::fallback_only());
        };

        match SnapshotProvider::load(Path::new(path)).await {
            Ok(provider) => Ok(Self::with_primary(
                Arc::new(provider),
                config.fallback_enabled,
            )),
            Err(e) if config.fallback_enabled => {
                tracing::warn!(path, error = %e, "Snapshot unavailable, using fallback data");
                Ok(Self {
                    primary: None,
                    fallback: Some(FallbackProvider::new()),
                    primary_unavailable: Some(e.to_string()),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Decide whether a primary failure may be covered by the fallback.
    fn on_primary_error(
        &self,
        op: &'static str,
        provider: &'static str,
        err: ProviderError,
    ) -> Result<String, ProviderError> {
        if self.fallback.is_none() || !err.should_fallback() {
            return Err(err);
        }
        tracing::warn!(op, provider, error = %err, "Primary provider failed, using fallback data");
        Ok(err.to_string())
    }

    fn fallback(&self, reason: &str) -> Result<&FallbackProvider, ProviderError> {
        self.fallback.as_ref().ok_or_else(|| {
            ProviderError::DataNotAvailable(format!("{reason}; fallback disabled"))
        })
    }

    fn unavailable_reason(&self) -> String {
        self.primary_unavailable
            .clone()
            .unwrap_or_else(|| "no primary provider".into())
    }

    pub async fn market_sentiment(&self) -> Result<Fetched<MarketSentiment>, ProviderError> {
        let reason = match &self.primary {
            Some(p) => match p.market_sentiment().await {
                Ok(data) => return Ok(fetched(p.name(), data, None)),
                Err(e) => self.on_primary_error("market_sentiment", p.name(), e)?,
            },
            None => self.unavailable_reason(),
        };
        let fb = self.fallback(&reason)?;
        Ok(fetched(fb.name(), fb.market_sentiment().await?, Some(reason)))
    }

    pub async fn sector_rotation(
        &self,
        top_n: usize,
    ) -> Result<Fetched<SectorRotation>, ProviderError> {
        let reason = match &self.primary {
            Some(p) => match p.sector_rotation(top_n).await {
                Ok(data) => return Ok(fetched(p.name(), data, None)),
                Err(e) => self.on_primary_error("sector_rotation", p.name(), e)?,
            },
            None => self.unavailable_reason(),
        };
        let fb = self.fallback(&reason)?;
        Ok(fetched(fb.name(), fb.sector_rotation(top_n).await?, Some(reason)))
    }

    pub async fn scan_strong_stocks(
        &self,
        sectors: &[String],
        top_n: usize,
    ) -> Result<Fetched<Vec<StockCandidate>>, ProviderError> {
        let reason = match &self.primary {
            Some(p) => match p.scan_strong_stocks(sectors, top_n).await {
                Ok(data) => return Ok(fetched(p.name(), data, None)),
                Err(e) => self.on_primary_error("scan_strong_stocks", p.name(), e)?,
            },
            None => self.unavailable_reason(),
        };
        let fb = self.fallback(&reason)?;
        Ok(fetched(
            fb.name(),
            fb.scan_strong_stocks(sectors, top_n).await?,
            Some(reason),
        ))
    }

    pub async fn capital_flow(
        &self,
        symbol: Option<&str>,
    ) -> Result<Fetched<CapitalFlow>, ProviderError> {
        let reason = match &self.primary {
            Some(p) => match p.capital_flow(symbol).await {
                Ok(data) => return Ok(fetched(p.name(), data, None)),
                Err(e) => self.on_primary_error("capital_flow", p.name(), e)?,
            },
            None => self.unavailable_reason(),
        };
        let fb = self.fallback(&reason)?;
        Ok(fetched(fb.name(), fb.capital_flow(symbol).await?, Some(reason)))
    }
}

fn fetched<T>(provider: &'static str, data: T, fallback_reason: Option<String>) -> Fetched<T> {
    Fetched {
        data,
        provider,
        fallback_reason,
    }
}
