//! Market snapshot provider.
//!
//! A snapshot is one JSON document holding the raw tables of a trading day:
//!
//! ```json
//! {
//!   "date": "2026-10-14",
//!   "limit_up_pool": [{"code": "600001", "name": "...", "board_height": "3连板", "state": "封板"}],
//!   "limit_down_pool": [{"code": "600002"}],
//!   "broken_pool": [],
//!   "spot": [{"code": "300001", "change_pct": 8.1, "volume_ratio": 2.4, "amount": "12.5亿", "sector": "AI-Compute"}],
//!   "sectors": [{"name": "AI-Compute", "change_pct": 4.2, "turnover": "620亿", "up_count": 80, "limit_up_count": 7}],
//!   "constituents": {"AI-Compute": ["300001"]},
//!   "history": {"300001": [{"open": 10.0, "close": 10.4, "volume": 120000}]},
//!   "northbound": [1.2e8, "3.5亿"],
//!   "main_flows": {"300001": "2.1亿"}
//! }
//! ```
//!
//! Amounts accept plain numbers or `亿`/`万` strings. Other numeric cells may
//! also be strings; unreadable cells read as 0 rather than rejecting the
//! document. Missing tables are empty.

use super::fallback::today;
use super::scan::{analyze_capital_flow, scan_candidates, ScanRules};
use super::{
    CapitalFlow, DataSource, MarketDataProvider, MarketSentiment, ProviderError, SectorRotation,
    SectorStrength, StockCandidate,
};
use crate::factors::{
    break_rate, effective_limit_up_count, is_broken_state, sector_strength, sentiment_score,
    LimitStats,
};
use async_trait::async_trait;
use serde::de::IgnoredAny;
use serde::Deserialize;
use short_common::numeric::{de_amount, de_count, de_number, parse_board_height, round_to};
use std::collections::{HashMap, HashSet};
use std::path::Path;

// ============================================================================
// Snapshot rows
// ============================================================================

/// Board height as reported: a number or a label such as `3连板`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum BoardHeight {
    Count(f64),
    Label(String),
    Unreadable(IgnoredAny),
}

impl BoardHeight {
    /// Fractions truncate; negative or unreadable heights are 0.
    pub fn value(&self) -> u32 {
        match self {
            Self::Count(n) if n.is_finite() => n.max(0.0).min(f64::from(u32::MAX)) as u32,
            Self::Label(text) => parse_board_height(text),
            _ => 0,
        }
    }
}

/// Row of the limit-up pool.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LimitUpRow {
    pub code: String,
    #[serde(default)]
    pub name: String,
    /// Missing heights count as a first board
    #[serde(default)]
    pub board_height: Option<BoardHeight>,
    #[serde(default)]
    pub state: Option<String>,
}

/// Row of the limit-down or broken-board pool.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PoolRow {
    pub code: String,
    #[serde(default)]
    pub name: String,
}

/// Real-time quote.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SpotQuote {
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "de_number")]
    pub change_pct: f64,
    #[serde(default, deserialize_with = "de_number")]
    pub volume_ratio: f64,
    /// Traded amount (yuan)
    #[serde(default, deserialize_with = "de_amount")]
    pub amount: f64,
    #[serde(default)]
    pub sector: Option<String>,
}

/// Sector board summary.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SectorBoard {
    pub name: String,
    #[serde(default)]
    pub board_code: Option<String>,
    #[serde(default, deserialize_with = "de_number")]
    pub change_pct: f64,
    #[serde(default, deserialize_with = "de_amount")]
    pub turnover: f64,
    #[serde(default, deserialize_with = "de_count")]
    pub up_count: u32,
    #[serde(default, deserialize_with = "de_count")]
    pub limit_up_count: u32,
}

/// Daily bar, oldest first within a history.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DailyBar {
    #[serde(deserialize_with = "de_number")]
    pub open: f64,
    #[serde(deserialize_with = "de_number")]
    pub close: f64,
    #[serde(default, deserialize_with = "de_amount")]
    pub volume: f64,
}

/// Amount that may be written as a unit string.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Amount(#[serde(deserialize_with = "de_amount")] pub f64);

/// Raw tables of one trading day.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarketSnapshot {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub limit_up_pool: Vec<LimitUpRow>,
    #[serde(default)]
    pub limit_down_pool: Vec<PoolRow>,
    #[serde(default)]
    pub broken_pool: Vec<PoolRow>,
    #[serde(default)]
    pub spot: Vec<SpotQuote>,
    #[serde(default)]
    pub sectors: Vec<SectorBoard>,
    #[serde(default)]
    pub constituents: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub history: HashMap<String, Vec<DailyBar>>,
    #[serde(default)]
    pub northbound: Vec<Amount>,
    #[serde(default)]
    pub main_flows: HashMap<String, Amount>,
}

impl MarketSnapshot {
    /// Trade date as `YYYY-MM-DD`; compact `YYYYMMDD` is expanded, missing means today.
    pub fn trade_date(&self) -> String {
        match self.date.as_deref().map(str::trim) {
            Some(d) if d.len() == 8 && d.chars().all(|c| c.is_ascii_digit()) => {
                format!("{}-{}-{}", &d[..4], &d[4..6], &d[6..])
            }
            Some(d) if !d.is_empty() => d.to_string(),
            _ => today(),
        }
    }

    /// Codes belonging to any of `sectors`, or `None` when nothing is known.
    fn allowed_codes(&self, sectors: &[String]) -> Option<HashSet<String>> {
        let codes: HashSet<String> = sectors
            .iter()
            .filter_map(|name| self.constituents.get(name))
            .flatten()
            .filter(|code| !code.trim().is_empty())
            .cloned()
            .collect();
        (!codes.is_empty()).then_some(codes)
    }
}

// ============================================================================
// Provider
// ============================================================================

/// Provider computing tool results from a [`MarketSnapshot`].
#[derive(Debug, Clone)]
pub struct SnapshotProvider {
    snapshot: MarketSnapshot,
    rules: ScanRules,
}

impl SnapshotProvider {
    pub fn new(snapshot: MarketSnapshot) -> Self {
        Self {
            snapshot,
            rules: ScanRules::default(),
        }
    }

    pub fn with_rules(mut self, rules: ScanRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ProviderError> {
        let snapshot: MarketSnapshot =
            serde_json::from_str(raw).map_err(|e| ProviderError::Parse(e.to_string()))?;
        Ok(Self::new(snapshot))
    }

    /// Read and parse a snapshot file.
    pub async fn load(path: &Path) -> Result<Self, ProviderError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ProviderError::Io(format!("{}: {e}", path.display())))?;
        let provider = Self::from_json_str(&raw)?;
        tracing::info!(
            path = %path.display(),
            date = %provider.snapshot.trade_date(),
            quotes = provider.snapshot.spot.len(),
            "Loaded market snapshot"
        );
        Ok(provider)
    }

    pub fn snapshot(&self) -> &MarketSnapshot {
        &self.snapshot
    }
}

#[async_trait]
impl MarketDataProvider for SnapshotProvider {
    fn name(&self) -> &'static str {
        "snapshot"
    }

    async fn market_sentiment(&self) -> Result<MarketSentiment, ProviderError> {
        let snap = &self.snapshot;
        if snap.limit_up_pool.is_empty() {
            return Err(ProviderError::DataNotAvailable("empty limit-up pool".into()));
        }

        let limit_up = snap.limit_up_pool.len() as u32;
        let limit_down = snap.limit_down_pool.len() as u32;
        let max_height = snap
            .limit_up_pool
            .iter()
            .map(|row| row.board_height.as_ref().map_or(1, BoardHeight::value))
            .max()
            .unwrap_or(0);

        let broken = if snap.broken_pool.is_empty() {
            snap.limit_up_pool
                .iter()
                .filter(|row| row.state.as_deref().is_some_and(is_broken_state))
                .count() as u32
        } else {
            snap.broken_pool.len() as u32
        };

        let stats = LimitStats {
            limit_up,
            limit_down,
            max_height,
            break_rate: break_rate(limit_up, broken),
        };
        let turnover: f64 = snap.spot.iter().map(|q| q.amount).sum();

        Ok(MarketSentiment {
            date: snap.trade_date(),
            limit_up,
            limit_down,
            max_height,
            break_rate: round_to(stats.break_rate, 4),
            turnover: turnover as i64,
            market_sentiment_score: round_to(sentiment_score(&stats), 2),
            data_source: DataSource::Snapshot,
        })
    }

    async fn sector_rotation(&self, top_n: usize) -> Result<SectorRotation, ProviderError> {
        let boards = &self.snapshot.sectors;
        if boards.is_empty() {
            return Err(ProviderError::DataNotAvailable("no sector rows".into()));
        }

        let max_turnover = boards.iter().map(|b| b.turnover).fold(0.0, f64::max);
        let mut top_sectors: Vec<SectorStrength> = boards
            .iter()
            .map(|board| {
                let limit_up_count =
                    effective_limit_up_count(board.limit_up_count, board.up_count);
                SectorStrength {
                    name: board.name.clone(),
                    change_pct: round_to(board.change_pct, 2),
                    turnover: board.turnover as i64,
                    limit_up_count,
                    board_code: board.board_code.clone().filter(|c| !c.is_empty()),
                    strength: round_to(
                        sector_strength(
                            board.change_pct,
                            board.turnover,
                            max_turnover,
                            limit_up_count,
                        ),
                        2,
                    ),
                }
            })
            .collect();

        top_sectors.sort_by(|a, b| b.strength.total_cmp(&a.strength));
        top_sectors.truncate(top_n);

        Ok(SectorRotation {
            date: self.snapshot.trade_date(),
            top_sectors,
            data_source: DataSource::Snapshot,
        })
    }

    async fn scan_strong_stocks(
        &self,
        sectors: &[String],
        top_n: usize,
    ) -> Result<Vec<StockCandidate>, ProviderError> {
        let snap = &self.snapshot;
        if snap.spot.is_empty() {
            return Err(ProviderError::DataNotAvailable("spot rows empty".into()));
        }

        let allowed = snap.allowed_codes(sectors);
        Ok(scan_candidates(
            &self.rules,
            &snap.spot,
            allowed.as_ref(),
            &snap.history,
            top_n,
        ))
    }

    async fn capital_flow(&self, symbol: Option<&str>) -> Result<CapitalFlow, ProviderError> {
        if symbol.is_some_and(|s| s.trim().is_empty()) {
            return Err(ProviderError::InvalidRequest("symbol must not be empty".into()));
        }

        let northbound: Vec<f64> = self.snapshot.northbound.iter().map(|a| a.0).collect();
        let main_flow = symbol.and_then(|s| self.snapshot.main_flows.get(s).map(|a| a.0));
        analyze_capital_flow(symbol, &northbound, main_flow)
    }
}
