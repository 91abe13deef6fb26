//! Sub-score calculators.
//!
//! Each rule maps raw market statistics onto a 0-100 sub-score. The five
//! sub-scores feed [`crate::fusion`].

use crate::data::{CapitalFlow, MarketSentiment, SectorStrength, StockCandidate};
use crate::fusion::SubScores;
use short_common::numeric::clamp;

/// Limit-up statistics behind the sentiment score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimitStats {
    pub limit_up: u32,
    pub limit_down: u32,
    pub max_height: u32,
    pub break_rate: f64,
}

/// Market sentiment score (0-100) from limit-up/limit-down behaviour.
///
/// | Component   | Full marks at          | Max |
/// |-------------|------------------------|-----|
/// | limit-up    | 70 stocks              | 45  |
/// | limit-down  | 0 stocks (0 at 12+)    | 20  |
/// | max height  | 6 boards               | 20  |
/// | break rate  | 0 (0 at 35%+)          | 15  |
pub fn sentiment_score(stats: &LimitStats) -> f64 {
    clamp(f64::from(stats.limit_up) / 70.0 * 45.0, 0.0, 45.0)
        + clamp((12.0 - f64::from(stats.limit_down)) / 12.0 * 20.0, 0.0, 20.0)
        + clamp(f64::from(stats.max_height) / 6.0 * 20.0, 0.0, 20.0)
        + clamp((0.35 - stats.break_rate) / 0.35 * 15.0, 0.0, 15.0)
}

/// Share of limit-up attempts that broke, 0 when there were none.
pub fn break_rate(limit_up: u32, broken: u32) -> f64 {
    let total = limit_up + broken;
    if total == 0 {
        return 0.0;
    }
    f64::from(broken) / f64::from(total)
}

/// Whether a limit-up pool state label means the board did not hold.
pub fn is_broken_state(state: &str) -> bool {
    let state = state.trim();
    !state.is_empty() && state != "封板" && state != "涨停"
}

/// Limit-up count for a sector, estimated from advancers when not reported.
pub fn effective_limit_up_count(limit_up_count: u32, up_count: u32) -> u32 {
    if limit_up_count == 0 && up_count > 0 {
        (f64::from(up_count) * 0.08).floor() as u32
    } else {
        limit_up_count
    }
}

/// Sector strength (0-100): change, relative turnover and limit-up count.
pub fn sector_strength(change_pct: f64, turnover: f64, max_turnover: f64, limit_up_count: u32) -> f64 {
    let max_turnover = if max_turnover == 0.0 { 1.0 } else { max_turnover };
    clamp(change_pct / 7.0 * 45.0, 0.0, 45.0)
        + clamp(turnover / max_turnover * 25.0, 0.0, 25.0)
        + clamp(f64::from(limit_up_count) / 12.0 * 30.0, 0.0, 30.0)
}

/// Mean strength of the top three sectors.
pub fn sector_score(top_sectors: &[SectorStrength]) -> f64 {
    let top: Vec<f64> = top_sectors.iter().take(3).map(|s| s.strength).collect();
    if top.is_empty() {
        return 0.0;
    }
    top.iter().sum::<f64>() / top.len() as f64
}

/// Volume/strength score of the leading candidate.
pub fn volume_strength_score(candidates: &[StockCandidate]) -> f64 {
    candidates.first().map_or(0.0, |top| {
        clamp(
            top.volume_ratio / 3.0 * 60.0 + top.change_pct / 10.0 * 40.0,
            0.0,
            100.0,
        )
    })
}

/// Capital score: main-force flow plus the northbound inflow streak.
pub fn capital_score(flow: &CapitalFlow) -> f64 {
    let score = clamp(flow.main_flow as f64 / 300_000_000.0 * 70.0, 0.0, 70.0)
        + clamp(f64::from(flow.northbound_inflow_days) / 5.0 * 30.0, 0.0, 30.0);
    clamp(score, 0.0, 100.0)
}

/// Technical structure score of the leading candidate.
pub fn technical_score(candidates: &[StockCandidate]) -> f64 {
    candidates
        .first()
        .map_or(0.0, |top| clamp(55.0 + top.volume_ratio * 10.0, 0.0, 100.0))
}

/// Build all five sub-scores from the tool results.
pub fn build_sub_scores(
    sentiment: &MarketSentiment,
    top_sectors: &[SectorStrength],
    candidates: &[StockCandidate],
    capital: &CapitalFlow,
) -> SubScores {
    SubScores {
        sentiment: sentiment.market_sentiment_score,
        sector_strength: sector_score(top_sectors),
        volume_strength: volume_strength_score(candidates),
        capital_inflow: capital_score(capital),
        technical_structure: technical_score(candidates),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataSource;

    fn candidate(change_pct: f64, volume_ratio: f64) -> StockCandidate {
        StockCandidate {
            code: "300001".into(),
            name: "DemoTech".into(),
            change_pct,
            volume_ratio,
            strength_rank: 1,
            sector: "AI-Compute".into(),
        }
    }

    fn sector(strength: f64) -> SectorStrength {
        SectorStrength {
            name: "AI-Compute".into(),
            change_pct: 4.2,
            turnover: 62_000_000_000,
            limit_up_count: 7,
            board_code: None,
            strength,
        }
    }

    fn flow(main_flow: i64, inflow_days: u32) -> CapitalFlow {
        CapitalFlow {
            symbol: "market".into(),
            main_flow,
            northbound_net: 0,
            northbound_inflow_days: inflow_days,
            flow_trend: "outflow".into(),
            strength_rank: 30,
            data_source: DataSource::Fallback,
        }
    }

    #[test]
    fn test_sentiment_score_reference_values() {
        let stats = LimitStats {
            limit_up: 42,
            limit_down: 9,
            max_height: 3,
            break_rate: 0.21,
        };
        // 27 + 5 + 10 + 6
        assert!((sentiment_score(&stats) - 48.0).abs() < 1e-9);
    }

    #[test]
    fn test_sentiment_score_saturates() {
        let hot = LimitStats {
            limit_up: 200,
            limit_down: 0,
            max_height: 12,
            break_rate: 0.0,
        };
        assert!((sentiment_score(&hot) - 100.0).abs() < 1e-9);

        let cold = LimitStats {
            limit_up: 0,
            limit_down: 40,
            max_height: 0,
            break_rate: 0.8,
        };
        assert_eq!(sentiment_score(&cold), 0.0);
    }

    #[test]
    fn test_break_rate() {
        assert_eq!(break_rate(0, 0), 0.0);
        assert_eq!(break_rate(30, 10), 0.25);
        assert_eq!(break_rate(0, 4), 1.0);
    }

    #[test]
    fn test_is_broken_state() {
        let cases = vec![
            ("封板", false),
            ("涨停", false),
            ("", false),
            ("  ", false),
            ("炸板", true),
            ("开板", true),
        ];
        for (state, expected) in cases {
            assert_eq!(is_broken_state(state), expected, "state {state:?}");
        }
    }

    #[test]
    fn test_effective_limit_up_count() {
        assert_eq!(effective_limit_up_count(3, 80), 3);
        assert_eq!(effective_limit_up_count(0, 80), 6);
        assert_eq!(effective_limit_up_count(0, 12), 0);
        assert_eq!(effective_limit_up_count(0, 0), 0);
    }

    #[test]
    fn test_sector_strength() {
        // 7% change, top turnover, 12 limit-ups -> full marks
        assert!((sector_strength(7.0, 5e10, 5e10, 12) - 100.0).abs() < 1e-9);
        // Falling sector only scores on turnover
        assert!((sector_strength(-3.0, 2.5e10, 5e10, 0) - 12.5).abs() < 1e-9);
        // Zero max turnover is treated as 1
        assert!((sector_strength(0.0, 0.0, 0.0, 0) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_sector_score_uses_top_three() {
        assert_eq!(sector_score(&[]), 0.0);
        let sectors = vec![sector(90.0), sector(80.0), sector(70.0), sector(10.0)];
        assert!((sector_score(&sectors) - 80.0).abs() < 1e-9);
        assert!((sector_score(&sectors[..1]) - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_candidate_scores() {
        assert_eq!(volume_strength_score(&[]), 0.0);
        assert_eq!(technical_score(&[]), 0.0);

        let top = vec![candidate(8.1, 2.4), candidate(20.0, 9.0)];
        // 2.4/3*60 + 8.1/10*40 = 48 + 32.4
        assert!((volume_strength_score(&top) - 80.4).abs() < 1e-9);
        assert!((technical_score(&top) - 79.0).abs() < 1e-9);

        let extreme = vec![candidate(20.0, 9.0)];
        assert_eq!(volume_strength_score(&extreme), 100.0);
        assert_eq!(technical_score(&extreme), 100.0);
    }

    #[test]
    fn test_capital_score() {
        // 1.8e8/3e8*70 = 42, 3/5*30 = 18
        assert!((capital_score(&flow(180_000_000, 3)) - 60.0).abs() < 1e-9);
        assert_eq!(capital_score(&flow(-500_000_000, 0)), 0.0);
        assert_eq!(capital_score(&flow(900_000_000, 9)), 100.0);
    }
}
