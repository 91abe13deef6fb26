//! Short-term signal engine.
//!
//! Gathers the tool results, builds the five sub-scores, fuses them and
//! applies the risk gate:
//!
//! ```text
//! sentiment ─┐
//! sectors ───┼─> candidates ─> capital flow
//!            │
//!            └─> SubScores ─> fuse ─> (composite, action)
//!                    │                      │
//!                    └─> assess_risk ───────┴─> final signal
//! ```

use crate::data::{
    CapitalFlow, DataSource, Fetched, MarketData, MarketSentiment, SectorStrength, StockCandidate,
};
use crate::factors::build_sub_scores;
use crate::fusion::{ActionSignal, FusionConfig, SubScores};
use crate::risk::{RiskControl, RiskPolicy};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use short_common::logging::generate_run_id;
use short_common::numeric::{clamp, round_to};
use short_common::{Config, Result};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

const DEFAULT_SECTOR_TOP_N: usize = 5;
const DEFAULT_CANDIDATE_TOP_N: usize = 5;

// ============================================================================
// Output types
// ============================================================================

/// Sub-scores as reported, rounded to 2 decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorBreakdown {
    pub market_sentiment: f64,
    pub sector_strength: f64,
    pub stock_volume_strength: f64,
    pub capital_inflow: f64,
    pub technical_structure: f64,
}

impl From<&SubScores> for FactorBreakdown {
    fn from(scores: &SubScores) -> Self {
        Self {
            market_sentiment: round_to(scores.sentiment, 2),
            sector_strength: round_to(scores.sector_strength, 2),
            stock_volume_strength: round_to(scores.volume_strength, 2),
            capital_inflow: round_to(scores.capital_inflow, 2),
            technical_structure: round_to(scores.technical_structure, 2),
        }
    }
}

/// Diagnostics attached when debug output is on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugInfo {
    pub module: String,
    pub run_id: String,
    pub selected_symbol: Option<String>,
    /// Data source per tool
    pub sources: BTreeMap<String, DataSource>,
    /// Why a tool fell back, keyed by tool
    pub fallback_reasons: BTreeMap<String, String>,
    /// Composite before clamping and rounding
    pub raw_composite: f64,
    /// Action chosen by fusion before the risk gate
    pub fused_action: ActionSignal,
}

/// Full output of one engine run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalReport {
    /// Display value only. `signal` is classified on the unrounded composite
    /// (`debug_info.raw_composite`), so 74.996 reports as 75.0 with WATCHLIST.
    pub score: f64,
    pub signal: ActionSignal,
    pub holding_days: String,
    pub confidence: f64,
    pub risk_control: RiskControl,
    pub market_sentiment: MarketSentiment,
    pub top_sectors: Vec<SectorStrength>,
    pub candidates: Vec<StockCandidate>,
    pub capital_flow: CapitalFlow,
    pub factor_breakdown: FactorBreakdown,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_info: Option<DebugInfo>,
}

// ============================================================================
// Decision
// ============================================================================

/// Fusion and risk gate combined.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// Composite as returned by fusion
    pub composite: f64,
    /// Reported score: composite clamped to 0-100, 2 decimals. Display only;
    /// the actions come from `composite`.
    pub score: f64,
    pub fused_action: ActionSignal,
    /// Fused action, or NO_TRADE when new entries are not allowed
    pub action: ActionSignal,
    pub confidence: f64,
    pub risk: RiskControl,
}

/// Confidence for an action at a reported score.
pub fn confidence(action: ActionSignal, score: f64) -> f64 {
    let (scale, cap) = match action {
        ActionSignal::ShortBuy => (0.9, 0.95),
        ActionSignal::Watchlist => (0.75, 0.85),
        ActionSignal::NoTrade => (0.6, 0.7),
    };
    round_to(clamp(score / 100.0 * scale, 0.0, cap), 2)
}

/// Fuse sub-scores and gate the action on the sentiment sub-score.
pub fn decide(fusion: &FusionConfig, policy: &RiskPolicy, scores: &SubScores) -> Decision {
    let fused = fusion.fuse(scores);
    let risk = policy.control(scores.sentiment);

    let action = if risk.decision.allow_new_entries {
        fused.action
    } else {
        ActionSignal::NoTrade
    };
    let score = round_to(clamp(fused.composite, 0.0, 100.0), 2);

    Decision {
        composite: fused.composite,
        score,
        fused_action: fused.action,
        action,
        confidence: confidence(action, score),
        risk,
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Runs the full signal pipeline against a [`MarketData`] source.
#[derive(Debug, Clone)]
pub struct SignalEngine {
    fusion: FusionConfig,
    policy: RiskPolicy,
    sector_top_n: usize,
    candidate_top_n: usize,
    debug: bool,
}

impl Default for SignalEngine {
    fn default() -> Self {
        Self::new(FusionConfig::default(), RiskPolicy::DEFAULT)
    }
}

impl SignalEngine {
    pub fn new(fusion: FusionConfig, policy: RiskPolicy) -> Self {
        Self {
            fusion,
            policy,
            sector_top_n: DEFAULT_SECTOR_TOP_N,
            candidate_top_n: DEFAULT_CANDIDATE_TOP_N,
            debug: false,
        }
    }

    /// Build from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let decision = &config.decision;
        let mut engine = Self::new(
            FusionConfig::from_decision_config(decision)?,
            RiskPolicy::from_decision_config(decision),
        );
        engine.sector_top_n = decision.sector_top_n.unwrap_or(DEFAULT_SECTOR_TOP_N);
        engine.candidate_top_n = decision.candidate_top_n.unwrap_or(DEFAULT_CANDIDATE_TOP_N);
        engine.debug = decision.debug;
        Ok(engine)
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn policy(&self) -> &RiskPolicy {
        &self.policy
    }

    /// Run the pipeline once.
    #[instrument(skip_all)]
    pub async fn run(&self, data: &MarketData) -> Result<SignalReport> {
        let run_id = generate_run_id();
        debug!(run_id = %run_id, "Starting signal run");

        let (sentiment, rotation) = tokio::join!(
            data.market_sentiment(),
            data.sector_rotation(self.sector_top_n)
        );
        let sentiment = sentiment?;
        let rotation = rotation?;

        let sector_names = rotation.data.sector_names();
        let candidates = data
            .scan_strong_stocks(&sector_names, self.candidate_top_n)
            .await?;

        let selected_symbol = candidates.data.first().map(|c| c.code.clone());
        let capital = data.capital_flow(selected_symbol.as_deref()).await?;

        let scores = build_sub_scores(
            &sentiment.data,
            &rotation.data.top_sectors,
            &candidates.data,
            &capital.data,
        );
        let decision = decide(&self.fusion, &self.policy, &scores);

        info!(
            run_id = %run_id,
            score = decision.score,
            signal = %decision.action,
            fused = %decision.fused_action,
            allow_new_entries = decision.risk.decision.allow_new_entries,
            "Signal computed"
        );

        let debug_info = self.debug.then(|| {
            let mut sources = BTreeMap::new();
            sources.insert("market_sentiment".to_string(), sentiment.data.data_source);
            sources.insert("sector_rotation".to_string(), rotation.data.data_source);
            sources.insert("capital_flow".to_string(), capital.data.data_source);

            let mut fallback_reasons = BTreeMap::new();
            collect_reason(&mut fallback_reasons, "market_sentiment", &sentiment);
            collect_reason(&mut fallback_reasons, "sector_rotation", &rotation);
            collect_reason(&mut fallback_reasons, "scan_strong_stocks", &candidates);
            collect_reason(&mut fallback_reasons, "capital_flow", &capital);

            DebugInfo {
                module: "short_term_signal_engine".to_string(),
                run_id: run_id.clone(),
                selected_symbol: selected_symbol.clone(),
                sources,
                fallback_reasons,
                raw_composite: decision.composite,
                fused_action: decision.fused_action,
            }
        });

        Ok(SignalReport {
            score: decision.score,
            signal: decision.action,
            holding_days: decision.action.holding_days().to_string(),
            confidence: decision.confidence,
            risk_control: decision.risk,
            market_sentiment: sentiment.data,
            top_sectors: rotation.data.top_sectors,
            candidates: candidates.data,
            capital_flow: capital.data,
            factor_breakdown: FactorBreakdown::from(&scores),
            debug_info,
        })
    }
}

fn collect_reason<T>(reasons: &mut BTreeMap<String, String>, tool: &str, fetched: &Fetched<T>) {
    if let Some(reason) = &fetched.fallback_reason {
        reasons.insert(tool.to_string(), reason.clone());
    }
}

// ============================================================================
// Tool output
// ============================================================================

/// Diagnostics for a single tool call.
pub fn fetch_debug_info<T>(module: &str, fetched: &Fetched<T>) -> Value {
    serde_json::json!({
        "module": module,
        "provider": fetched.provider,
        "fallback_reason": fetched.fallback_reason,
    })
}

/// Serialize a tool result, attaching `debug_info` when given.
///
/// Arrays get the diagnostics on every object element.
pub fn with_debug<T: Serialize>(payload: &T, debug_info: Option<Value>) -> Result<Value> {
    let mut value = serde_json::to_value(payload)?;
    let Some(info) = debug_info else {
        return Ok(value);
    };

    match &mut value {
        Value::Object(map) => {
            map.insert("debug_info".to_string(), info);
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                if let Value::Object(map) = item {
                    map.insert("debug_info".to_string(), info.clone());
                }
            }
        }
        _ => {}
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scores(values: [f64; 5]) -> SubScores {
        SubScores {
            sentiment: values[0],
            sector_strength: values[1],
            volume_strength: values[2],
            capital_inflow: values[3],
            technical_structure: values[4],
        }
    }

    #[test]
    fn test_decide_reference_scenario() {
        let decision = decide(
            &FusionConfig::default(),
            &RiskPolicy::DEFAULT,
            &scores([72.0, 85.0, 60.0, 70.0, 50.0]),
        );
        assert!((decision.composite - 70.25).abs() < 1e-9);
        assert_eq!(decision.score, 70.25);
        assert_eq!(decision.action, ActionSignal::Watchlist);
        assert!(decision.risk.decision.allow_new_entries);
        // 0.7025 * 0.75
        assert_eq!(decision.confidence, 0.53);
    }

    #[test]
    fn test_decide_gates_on_sentiment_not_composite() {
        // Composite 77.5 but sentiment below the entry threshold
        let decision = decide(
            &FusionConfig::default(),
            &RiskPolicy::DEFAULT,
            &scores([30.0, 100.0, 100.0, 100.0, 50.0]),
        );
        assert_eq!(decision.fused_action, ActionSignal::ShortBuy);
        assert_eq!(decision.action, ActionSignal::NoTrade);
        assert!(!decision.risk.market_filter);
        assert_eq!(decision.confidence, confidence(ActionSignal::NoTrade, decision.score));
    }

    #[test]
    fn test_decide_reports_clamped_score() {
        let decision = decide(
            &FusionConfig::default(),
            &RiskPolicy::DEFAULT,
            &scores([150.0, 150.0, 150.0, 150.0, 150.0]),
        );
        assert!((decision.composite - 150.0).abs() < 1e-9);
        assert_eq!(decision.score, 100.0);
        assert_eq!(decision.action, ActionSignal::ShortBuy);
        assert_eq!(decision.confidence, 0.9);
    }

    #[test]
    fn test_decide_classifies_on_unrounded_composite() {
        let decision = decide(
            &FusionConfig::default(),
            &RiskPolicy::DEFAULT,
            &scores([74.996; 5]),
        );
        assert!(decision.composite < 75.0);
        assert_eq!(decision.score, 75.0);
        assert_eq!(decision.action, ActionSignal::Watchlist);
    }

    #[test]
    fn test_confidence_caps() {
        let cases = vec![
            (ActionSignal::ShortBuy, 80.0, 0.72),
            (ActionSignal::ShortBuy, 100.0, 0.9),
            (ActionSignal::Watchlist, 60.0, 0.45),
            (ActionSignal::NoTrade, 50.0, 0.3),
            (ActionSignal::NoTrade, 0.0, 0.0),
        ];
        for (action, score, expected) in cases {
            assert_eq!(confidence(action, score), expected, "{action} at {score}");
        }
    }

    #[tokio::test]
    async fn test_run_on_fallback_data() {
        let report = SignalEngine::default()
            .run(&MarketData::fallback_only())
            .await
            .unwrap();

        assert_eq!(report.market_sentiment.market_sentiment_score, 48.0);
        assert_eq!(report.top_sectors.len(), 3);
        assert_eq!(report.candidates.len(), 3);
        assert_eq!(report.capital_flow.symbol, "300001");
        assert_eq!(report.factor_breakdown.capital_inflow, 60.0);
        assert_eq!(report.signal, ActionSignal::Watchlist);
        assert_eq!(report.holding_days, "1-2");
        assert!(report.debug_info.is_none());
    }

    #[tokio::test]
    async fn test_run_debug_info() {
        let report = SignalEngine::default()
            .with_debug(true)
            .run(&MarketData::fallback_only())
            .await
            .unwrap();

        let info = report.debug_info.unwrap();
        assert_eq!(info.selected_symbol.as_deref(), Some("300001"));
        assert_eq!(info.sources["capital_flow"], DataSource::Fallback);
        assert_eq!(info.fallback_reasons.len(), 4);
        assert!(!info.run_id.is_empty());
    }

    #[test]
    fn test_with_debug_object_and_array() {
        let plain = with_debug(&json!({"a": 1}), None).unwrap();
        assert!(plain.get("debug_info").is_none());

        let object = with_debug(&json!({"a": 1}), Some(json!({"module": "m"}))).unwrap();
        assert_eq!(object["debug_info"]["module"], "m");

        let array = with_debug(&json!([{"a": 1}, {"a": 2}]), Some(json!("x"))).unwrap();
        assert_eq!(array[1]["debug_info"], "x");
    }
}
