//! Built-in reference data used when no market snapshot is available.

use super::{
    CapitalFlow, DataSource, MarketDataProvider, MarketSentiment, ProviderError, SectorRotation,
    SectorStrength, StockCandidate,
};
use crate::factors::{sentiment_score, LimitStats};
use async_trait::async_trait;
use short_common::numeric::round_to;

const LIMIT_STATS: LimitStats = LimitStats {
    limit_up: 42,
    limit_down: 9,
    max_height: 3,
    break_rate: 0.21,
};
const TURNOVER: i64 = 980_000_000_000;

/// Today's date in the report format.
pub(crate) fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

/// Provider returning fixed demo values.
#[derive(Debug, Clone, Default)]
pub struct FallbackProvider;

impl FallbackProvider {
    pub fn new() -> Self {
        Self
    }

    fn sectors() -> Vec<SectorStrength> {
        [
            ("AI-Compute", 4.2, 62_000_000_000, 7, 85.2),
            ("Semiconductor", 3.6, 58_000_000_000, 5, 79.8),
            ("Robotics", 2.9, 44_000_000_000, 4, 72.3),
        ]
        .into_iter()
        .map(
            |(name, change_pct, turnover, limit_up_count, strength)| SectorStrength {
                name: name.to_string(),
                change_pct,
                turnover,
                limit_up_count,
                board_code: None,
                strength,
            },
        )
        .collect()
    }

    fn candidates() -> Vec<StockCandidate> {
        [
            ("300001", "DemoTech", 8.1, 2.4, 1, "AI-Compute"),
            ("002345", "ChipStar", 6.8, 1.9, 2, "Semiconductor"),
            ("688888", "RoboCore", 5.5, 1.7, 3, "Robotics"),
        ]
        .into_iter()
        .map(
            |(code, name, change_pct, volume_ratio, strength_rank, sector)| StockCandidate {
                code: code.to_string(),
                name: name.to_string(),
                change_pct,
                volume_ratio,
                strength_rank,
                sector: sector.to_string(),
            },
        )
        .collect()
    }
}

#[async_trait]
impl MarketDataProvider for FallbackProvider {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn market_sentiment(&self) -> Result<MarketSentiment, ProviderError> {
        Ok(MarketSentiment {
            date: today(),
            limit_up: LIMIT_STATS.limit_up,
            limit_down: LIMIT_STATS.limit_down,
            max_height: LIMIT_STATS.max_height,
            break_rate: round_to(LIMIT_STATS.break_rate, 4),
            turnover: TURNOVER,
            market_sentiment_score: round_to(sentiment_score(&LIMIT_STATS), 2),
            data_source: DataSource::Fallback,
        })
    }

    async fn sector_rotation(&self, top_n: usize) -> Result<SectorRotation, ProviderError> {
        let mut top_sectors = Self::sectors();
        top_sectors.truncate(top_n);
        Ok(SectorRotation {
            date: today(),
            top_sectors,
            data_source: DataSource::Fallback,
        })
    }

    async fn scan_strong_stocks(
        &self,
        sectors: &[String],
        top_n: usize,
    ) -> Result<Vec<StockCandidate>, ProviderError> {
        let base = Self::candidates();
        let filtered: Vec<StockCandidate> = base
            .iter()
            .filter(|c| sectors.contains(&c.sector))
            .cloned()
            .collect();

        // An empty or non-matching filter returns the whole demo list.
        let mut out = if filtered.is_empty() { base } else { filtered };
        out.truncate(top_n);
        Ok(out)
    }

    async fn capital_flow(&self, symbol: Option<&str>) -> Result<CapitalFlow, ProviderError> {
        Ok(CapitalFlow {
            symbol: symbol.unwrap_or("market").to_string(),
            main_flow: 180_000_000,
            northbound_net: 530_000_000,
            northbound_inflow_days: 3,
            flow_trend: "3-day-inflow".to_string(),
            strength_rank: 12,
            data_source: DataSource::Fallback,
        })
    }
}
