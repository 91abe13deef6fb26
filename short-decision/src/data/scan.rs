//! Strong-stock scan and capital-flow rules.
//!
//! Both work on raw snapshot rows and produce the tool result types.

use super::snapshot::{DailyBar, SpotQuote};
use super::{CapitalFlow, DataSource, ProviderError, StockCandidate};
use short_common::numeric::{count_consecutive_inflow, round_to, trend_up, volume_ratio};
use std::collections::{HashMap, HashSet};

/// Thresholds of the strong-stock scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanRules {
    /// Quotes at or below this change never enter the universe
    pub pre_filter_change_pct: f64,
    /// Number of quotes kept after the pre-filter
    pub universe_size: usize,
    pub min_change_pct: f64,
    pub min_volume_ratio: f64,
    pub min_history_bars: usize,
    pub trend_lookback: usize,
    /// A bearish day below this change with heavy volume is rejected
    pub bearish_day_change_pct: f64,
    pub bearish_volume_ratio: f64,
}

impl Default for ScanRules {
    fn default() -> Self {
        Self {
            pre_filter_change_pct: 4.5,
            universe_size: 120,
            min_change_pct: 5.0,
            min_volume_ratio: 1.5,
            min_history_bars: 5,
            trend_lookback: 3,
            bearish_day_change_pct: -2.0,
            bearish_volume_ratio: 2.2,
        }
    }
}

impl ScanRules {
    /// Volume ratio of the last bar against the mean of up to five bars before it.
    fn history_volume_ratio(bars: &[DailyBar]) -> f64 {
        let Some((last, earlier)) = bars.split_last() else {
            return 0.0;
        };
        let window = &earlier[earlier.len().saturating_sub(5)..];
        let baseline = window.iter().map(|b| b.volume).sum::<f64>() / window.len().max(1) as f64;
        volume_ratio(last.volume, baseline)
    }

    /// History check for one quote; returns the history volume ratio when it passes.
    fn check_history(&self, bars: &[DailyBar]) -> Option<f64> {
        if bars.len() < self.min_history_bars || bars.len() < 2 {
            return None;
        }

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        if !trend_up(&closes, self.trend_lookback) {
            return None;
        }

        let ratio = Self::history_volume_ratio(bars);
        if ratio <= self.min_volume_ratio {
            return None;
        }

        let last = &bars[bars.len() - 1];
        let prev_close = bars[bars.len() - 2].close;
        let day_change = if prev_close != 0.0 {
            (last.close - prev_close) / prev_close * 100.0
        } else {
            0.0
        };
        let heavy_bearish = last.open > last.close
            && day_change < self.bearish_day_change_pct
            && ratio > self.bearish_volume_ratio;
        if heavy_bearish {
            return None;
        }

        Some(ratio)
    }
}

/// Run the strong-stock scan over spot quotes.
///
/// `allowed_codes` restricts the universe to sector constituents when set.
/// Quotes without history are skipped.
pub fn scan_candidates(
    rules: &ScanRules,
    spot: &[SpotQuote],
    allowed_codes: Option<&HashSet<String>>,
    history: &HashMap<String, Vec<DailyBar>>,
    top_n: usize,
) -> Vec<StockCandidate> {
    let allowed = |code: &str| allowed_codes.map_or(true, |codes| codes.contains(code));

    let mut universe: Vec<&SpotQuote> = spot
        .iter()
        .filter(|q| q.change_pct > rules.pre_filter_change_pct && allowed(&q.code))
        .collect();
    universe.sort_by(|a, b| b.change_pct.total_cmp(&a.change_pct));
    universe.truncate(rules.universe_size);

    let mut candidates: Vec<StockCandidate> = universe
        .into_iter()
        .filter(|q| q.change_pct > rules.min_change_pct && q.volume_ratio > rules.min_volume_ratio)
        .filter_map(|q| {
            let bars = history.get(&q.code)?;
            let ratio = rules.check_history(bars)?;
            Some(StockCandidate {
                code: q.code.clone(),
                name: q.name.clone(),
                change_pct: q.change_pct,
                volume_ratio: ratio,
                strength_rank: 0,
                sector: q.sector.clone().unwrap_or_else(|| "UNKNOWN".to_string()),
            })
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.change_pct
            .total_cmp(&a.change_pct)
            .then(b.volume_ratio.total_cmp(&a.volume_ratio))
    });
    candidates.truncate(top_n);

    for (idx, c) in candidates.iter_mut().enumerate() {
        c.strength_rank = idx as u32 + 1;
        c.change_pct = round_to(c.change_pct, 2);
        c.volume_ratio = round_to(c.volume_ratio, 2);
    }

    tracing::debug!(
        spot_rows = spot.len(),
        candidates = candidates.len(),
        "Strong-stock scan complete"
    );
    candidates
}

/// Strength rank bucket for a main-force flow.
pub fn flow_strength_rank(main_flow: f64) -> u32 {
    if main_flow >= 300_000_000.0 {
        5
    } else if main_flow >= 150_000_000.0 {
        12
    } else if main_flow >= 0.0 {
        30
    } else {
        70
    }
}

/// Derive capital flow from the northbound series.
///
/// With a symbol, `symbol_main_flow` is that stock's main-force flow (0 when
/// unknown); without one, the market proxy is 55% of the latest northbound net.
pub fn analyze_capital_flow(
    symbol: Option<&str>,
    northbound: &[f64],
    symbol_main_flow: Option<f64>,
) -> Result<CapitalFlow, ProviderError> {
    let series: Vec<f64> = northbound.iter().copied().filter(|v| *v != 0.0).collect();
    let series = &series[series.len().saturating_sub(20)..];
    let Some(&net) = series.last() else {
        return Err(ProviderError::DataNotAvailable(
            "northbound series empty".into(),
        ));
    };

    let inflow_days = count_consecutive_inflow(series);
    let main_flow = match symbol {
        Some(_) => symbol_main_flow.unwrap_or(0.0),
        None => net * 0.55,
    };
    let flow_trend = if inflow_days > 0 {
        format!("{inflow_days}-day-inflow")
    } else {
        "outflow".to_string()
    };

    Ok(CapitalFlow {
        symbol: symbol.unwrap_or("market").to_string(),
        main_flow: main_flow as i64,
        northbound_net: net as i64,
        northbound_inflow_days: inflow_days,
        flow_trend,
        strength_rank: flow_strength_rank(main_flow),
        data_source: DataSource::Snapshot,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(code: &str, change_pct: f64, volume_ratio: f64) -> SpotQuote {
        SpotQuote {
            code: code.to_string(),
            name: format!("S{code}"),
            change_pct,
            volume_ratio,
            amount: 0.0,
            sector: Some("Semiconductor".into()),
        }
    }

    fn bar(open: f64, close: f64, volume: f64) -> DailyBar {
        DailyBar {
            open,
            close,
            volume,
        }
    }

    /// Five quiet days then a rising close on `last_volume`.
    fn rising_history(last_volume: f64) -> Vec<DailyBar> {
        vec![
            bar(10.0, 10.0, 100.0),
            bar(10.0, 10.0, 100.0),
            bar(10.0, 10.2, 100.0),
            bar(10.2, 10.5, 100.0),
            bar(10.5, 10.8, 100.0),
            bar(10.8, 11.6, last_volume),
        ]
    }

    #[test]
    fn test_scan_accepts_rising_volume_breakout() {
        let spot = vec![quote("000001", 7.4, 2.0)];
        let history = HashMap::from([("000001".to_string(), rising_history(250.0))]);

        let picked = scan_candidates(&ScanRules::default(), &spot, None, &history, 10);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].strength_rank, 1);
        assert_eq!(picked[0].volume_ratio, 2.5);
        assert_eq!(picked[0].sector, "Semiconductor");
    }

    #[test]
    fn test_scan_threshold_rejections() {
        let history = HashMap::from([
            ("A".to_string(), rising_history(250.0)),
            ("B".to_string(), rising_history(250.0)),
            ("C".to_string(), rising_history(140.0)),
        ]);
        let spot = vec![
            // Change exactly 5 is not strong enough
            quote("A", 5.0, 3.0),
            // Spot volume ratio exactly 1.5
            quote("B", 8.0, 1.5),
            // History volume ratio 1.4
            quote("C", 8.0, 3.0),
            // No history at all
            quote("D", 9.0, 3.0),
        ];

        let picked = scan_candidates(&ScanRules::default(), &spot, None, &history, 10);
        assert!(picked.is_empty(), "{picked:?}");
    }

    #[test]
    fn test_scan_requires_trend_and_history_depth() {
        // Last close 11.6 is below the close three bars earlier
        let mut falling = rising_history(250.0);
        falling[2] = bar(12.0, 12.0, 100.0);
        let short = rising_history(250.0)[2..].to_vec();
        let history = HashMap::from([
            ("FALL".to_string(), falling),
            ("SHORT".to_string(), short),
        ]);
        let spot = vec![quote("FALL", 8.0, 3.0), quote("SHORT", 8.0, 3.0)];

        let picked = scan_candidates(&ScanRules::default(), &spot, None, &history, 10);
        assert!(picked.is_empty());
    }

    /// Up over three bars, but the last bar drops 2.5% from an open above its close.
    fn pullback_history(last_volume: f64) -> Vec<DailyBar> {
        vec![
            bar(10.0, 10.0, 100.0),
            bar(10.0, 10.0, 100.0),
            bar(10.0, 10.0, 100.0),
            bar(10.0, 11.0, 100.0),
            bar(11.0, 12.0, 100.0),
            bar(12.2, 11.7, last_volume),
        ]
    }

    #[test]
    fn test_scan_rejects_heavy_bearish_day() {
        let history = HashMap::from([
            ("HEAVY".to_string(), pullback_history(300.0)),
            ("LIGHT".to_string(), pullback_history(200.0)),
        ]);
        let spot = vec![quote("HEAVY", 8.0, 3.0), quote("LIGHT", 7.0, 3.0)];

        let picked = scan_candidates(&ScanRules::default(), &spot, None, &history, 10);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].code, "LIGHT");
        assert_eq!(picked[0].volume_ratio, 2.0);
    }

    #[test]
    fn test_scan_orders_and_limits() {
        let history = HashMap::from([
            ("A".to_string(), rising_history(200.0)),
            ("B".to_string(), rising_history(300.0)),
            ("C".to_string(), rising_history(250.0)),
        ]);
        let spot = vec![quote("A", 8.0, 2.0), quote("B", 8.0, 2.0), quote("C", 9.5, 2.0)];

        let picked = scan_candidates(&ScanRules::default(), &spot, None, &history, 2);
        let codes: Vec<&str> = picked.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, vec!["C", "B"]);
        assert_eq!(picked[1].strength_rank, 2);
    }

    #[test]
    fn test_scan_respects_allowed_codes() {
        let history = HashMap::from([
            ("A".to_string(), rising_history(250.0)),
            ("B".to_string(), rising_history(250.0)),
        ]);
        let spot = vec![quote("A", 8.0, 2.0), quote("B", 9.0, 2.0)];
        let allowed = HashSet::from(["A".to_string()]);

        let picked = scan_candidates(&ScanRules::default(), &spot, Some(&allowed), &history, 10);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].code, "A");
    }

    #[test]
    fn test_flow_strength_rank() {
        let cases = vec![
            (3e8, 5),
            (2.99e8, 12),
            (1.5e8, 12),
            (0.0, 30),
            (-1.0, 70),
        ];
        for (flow, expected) in cases {
            assert_eq!(flow_strength_rank(flow), expected, "flow {flow}");
        }
    }

    #[test]
    fn test_capital_flow_market_proxy() {
        let series = [-2e8, 0.0, 1e8, 2e8, 4e8];
        let flow = analyze_capital_flow(None, &series, None).unwrap();
        assert_eq!(flow.symbol, "market");
        assert_eq!(flow.northbound_net, 400_000_000);
        assert_eq!(flow.main_flow, 220_000_000);
        assert_eq!(flow.northbound_inflow_days, 3);
        assert_eq!(flow.flow_trend, "3-day-inflow");
        assert_eq!(flow.strength_rank, 12);
    }

    #[test]
    fn test_capital_flow_symbol() {
        let series = [1e8, -3e8];
        let flow = analyze_capital_flow(Some("300001"), &series, Some(3.5e8)).unwrap();
        assert_eq!(flow.symbol, "300001");
        assert_eq!(flow.flow_trend, "outflow");
        assert_eq!(flow.strength_rank, 5);

        let unknown = analyze_capital_flow(Some("600000"), &series, None).unwrap();
        assert_eq!(unknown.main_flow, 0);
        assert_eq!(unknown.strength_rank, 30);
    }

    #[test]
    fn test_capital_flow_empty_series() {
        let err = analyze_capital_flow(None, &[0.0, 0.0], None).unwrap_err();
        assert!(err.should_fallback());
    }
}
