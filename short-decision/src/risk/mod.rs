//! Short-term risk control.
//!
//! Position cap and stop loss are fixed policy; only the entry gate depends
//! on the market sentiment sub-score (never on the composite score).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use short_common::config::DecisionConfig;
use short_common::{Error, Result};

/// Risk policy constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskPolicy {
    /// Maximum capital per position (percentage)
    pub max_position_pct: f64,
    /// Stop loss (percentage, negative)
    pub stop_loss_pct: f64,
    /// Take profit (percentage)
    pub take_profit_pct: f64,
    /// New entries are allowed at or above this sentiment score
    pub min_entry_sentiment: f64,
}

impl RiskPolicy {
    pub const DEFAULT: Self = Self {
        max_position_pct: 15.0,
        stop_loss_pct: -6.0,
        take_profit_pct: 12.0,
        min_entry_sentiment: 40.0,
    };

    /// Build from the decision section of the config file.
    pub fn from_decision_config(config: &DecisionConfig) -> Self {
        Self {
            max_position_pct: config
                .max_position_pct
                .unwrap_or(Self::DEFAULT.max_position_pct),
            stop_loss_pct: config.stop_loss_pct.unwrap_or(Self::DEFAULT.stop_loss_pct),
            take_profit_pct: config
                .take_profit_pct
                .unwrap_or(Self::DEFAULT.take_profit_pct),
            min_entry_sentiment: config
                .min_entry_sentiment
                .unwrap_or(Self::DEFAULT.min_entry_sentiment),
        }
    }

    /// Assess risk for a market sentiment score.
    pub fn assess(&self, sentiment_score: f64) -> RiskDecision {
        RiskDecision {
            max_position_pct: self.max_position_pct,
            stop_loss_pct: self.stop_loss_pct,
            allow_new_entries: sentiment_score >= self.min_entry_sentiment,
        }
    }

    /// Assess risk and attach the presentation fields used by reports.
    pub fn control(&self, sentiment_score: f64) -> RiskControl {
        let decision = self.assess(sentiment_score);
        let risk_note = if decision.allow_new_entries {
            format!(
                "情绪正常，单票仓位不超过{}%，跌破{}%无条件止损",
                self.max_position_pct, self.stop_loss_pct
            )
        } else {
            format!(
                "市场情绪偏弱(score {:.2} < {})，暂停新开仓，只处理存量持仓",
                sentiment_score, self.min_entry_sentiment
            )
        };

        RiskControl {
            decision,
            take_profit_pct: self.take_profit_pct,
            market_filter: decision.allow_new_entries,
            sentiment_score,
            risk_note,
        }
    }
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Position sizing, stop loss and entry gate for one sentiment reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskDecision {
    pub max_position_pct: f64,
    pub stop_loss_pct: f64,
    pub allow_new_entries: bool,
}

/// Risk decision plus presentation fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskControl {
    #[serde(flatten)]
    pub decision: RiskDecision,
    pub take_profit_pct: f64,
    /// Same value as `allow_new_entries`; kept under the report's name.
    pub market_filter: bool,
    pub sentiment_score: f64,
    pub risk_note: String,
}

/// Assess risk with the built-in policy.
pub fn assess_risk(sentiment_score: f64) -> RiskDecision {
    RiskPolicy::DEFAULT.assess(sentiment_score)
}

/// Read a sentiment score from untyped JSON.
pub fn sentiment_from_value(value: &Value) -> Result<f64> {
    value.as_f64().ok_or_else(|| {
        Error::input_type(
            "sentiment_score",
            match value {
                Value::Null => "missing".to_string(),
                other => format!("expected a number, got {other}"),
            },
        )
    })
}

/// Parse a sentiment score from text (e.g. a command-line argument).
pub fn parse_score(raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| Error::input_type("sentiment_score", format!("expected a number, got {raw:?}")))
}
