//! Signal fusion: five sub-scores in, one composite score and action out.
//!
//! ```text
//! composite = 0.25·sentiment + 0.25·sector_strength + 0.20·volume_strength
//!           + 0.20·capital_inflow + 0.10·technical_structure
//!
//! composite ≥ 75        → SHORT_BUY
//! 60 ≤ composite < 75   → WATCHLIST
//! composite < 60        → NO_TRADE
//! ```
//!
//! Inputs are not clamped: out-of-range sub-scores flow straight into the
//! composite and its classification.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use short_common::config::{DecisionConfig, WeightsConfig};
use short_common::validation::WEIGHT_SUM_TOLERANCE;
use short_common::{Error, Result};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Sub-scores
// ============================================================================

/// The five independently computed inputs, each conventionally on a 0-100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    pub sentiment: f64,
    pub sector_strength: f64,
    pub volume_strength: f64,
    pub capital_inflow: f64,
    pub technical_structure: f64,
}

impl SubScores {
    /// Field names in weight-table order.
    pub const FIELDS: [&'static str; 5] = [
        "sentiment",
        "sector_strength",
        "volume_strength",
        "capital_inflow",
        "technical_structure",
    ];

    /// Read sub-scores from untyped JSON.
    ///
    /// Every field must be present and numeric; anything else is an
    /// [`Error::InputType`] and no partial result is produced.
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value.as_object().ok_or_else(|| {
            Error::input_type("subscores", format!("expected an object, got {}", kind(value)))
        })?;

        let field = |name: &str| -> Result<f64> {
            match obj.get(name) {
                None | Some(Value::Null) => Err(Error::input_type(name, "missing")),
                Some(v) => v.as_f64().ok_or_else(|| {
                    Error::input_type(name, format!("expected a number, got {}", kind(v)))
                }),
            }
        };

        Ok(Self {
            sentiment: field("sentiment")?,
            sector_strength: field("sector_strength")?,
            volume_strength: field("volume_strength")?,
            capital_inflow: field("capital_inflow")?,
            technical_structure: field("technical_structure")?,
        })
    }

    /// Parse sub-scores from a JSON document.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| Error::input_type("subscores", format!("not valid JSON: {e}")))?;
        Self::from_value(&value)
    }

    fn values(&self) -> [f64; 5] {
        [
            self.sentiment,
            self.sector_strength,
            self.volume_strength,
            self.capital_inflow,
            self.technical_structure,
        ]
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Weights and thresholds
// ============================================================================

/// Weight per sub-score. The weights sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightTable {
    pub sentiment: f64,
    pub sector_strength: f64,
    pub volume_strength: f64,
    pub capital_inflow: f64,
    pub technical_structure: f64,
}

impl WeightTable {
    /// Built-in weights, shared with the config defaults.
    pub const DEFAULT: Self = Self {
        sentiment: WeightsConfig::DEFAULT.sentiment,
        sector_strength: WeightsConfig::DEFAULT.sector_strength,
        volume_strength: WeightsConfig::DEFAULT.volume_strength,
        capital_inflow: WeightsConfig::DEFAULT.capital_inflow,
        technical_structure: WeightsConfig::DEFAULT.technical_structure,
    };

    /// Build a weight table, rejecting negative weights or a sum other than 1.0.
    pub fn new(
        sentiment: f64,
        sector_strength: f64,
        volume_strength: f64,
        capital_inflow: f64,
        technical_structure: f64,
    ) -> Result<Self> {
        let table = Self {
            sentiment,
            sector_strength,
            volume_strength,
            capital_inflow,
            technical_structure,
        };

        if let Some((name, w)) = SubScores::FIELDS
            .iter()
            .zip(table.values())
            .find(|(_, w)| !w.is_finite() || *w < 0.0)
        {
            return Err(Error::Config(format!(
                "weight for {name} must be a non-negative number, got {w}"
            )));
        }

        let total = table.total();
        if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(Error::Config(format!("weights must sum to 1.0, got {total}")));
        }

        Ok(table)
    }

    /// Sum of the weights.
    pub fn total(&self) -> f64 {
        self.values().iter().sum()
    }

    fn values(&self) -> [f64; 5] {
        [
            self.sentiment,
            self.sector_strength,
            self.volume_strength,
            self.capital_inflow,
            self.technical_structure,
        ]
    }

    /// Weighted sum of the sub-scores.
    pub fn composite(&self, scores: &SubScores) -> f64 {
        self.sentiment * scores.sentiment
            + self.sector_strength * scores.sector_strength
            + self.volume_strength * scores.volume_strength
            + self.capital_inflow * scores.capital_inflow
            + self.technical_structure * scores.technical_structure
    }

    /// Per-factor contributions in field order.
    pub fn contributions(&self, scores: &SubScores) -> [(&'static str, f64); 5] {
        let w = self.values();
        let s = scores.values();
        let mut out = [("", 0.0); 5];
        for (i, name) in SubScores::FIELDS.iter().enumerate() {
            out[i] = (*name, w[i] * s[i]);
        }
        out
    }
}

impl Default for WeightTable {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Lower bounds of the two upper action buckets. Each bound is inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionThresholds {
    pub short_buy: f64,
    pub watchlist: f64,
}

impl ActionThresholds {
    pub const DEFAULT: Self = Self {
        short_buy: DecisionConfig::DEFAULT_SHORT_BUY_THRESHOLD,
        watchlist: DecisionConfig::DEFAULT_WATCHLIST_THRESHOLD,
    };

    pub fn new(short_buy: f64, watchlist: f64) -> Result<Self> {
        if watchlist.is_nan() || short_buy.is_nan() || watchlist >= short_buy {
            return Err(Error::Config(format!(
                "watchlist threshold ({watchlist}) must be below short-buy threshold ({short_buy})"
            )));
        }
        Ok(Self {
            short_buy,
            watchlist,
        })
    }

    /// Map a composite score to an action.
    pub fn classify(&self, composite: f64) -> ActionSignal {
        if composite >= self.short_buy {
            ActionSignal::ShortBuy
        } else if composite >= self.watchlist {
            ActionSignal::Watchlist
        } else {
            ActionSignal::NoTrade
        }
    }
}

impl Default for ActionThresholds {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ============================================================================
// Action signal
// ============================================================================

/// Discrete trading stance derived from the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionSignal {
    ShortBuy,
    Watchlist,
    NoTrade,
}

impl ActionSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ShortBuy => "SHORT_BUY",
            Self::Watchlist => "WATCHLIST",
            Self::NoTrade => "NO_TRADE",
        }
    }

    /// Suggested holding period in trading days.
    pub fn holding_days(&self) -> &'static str {
        match self {
            Self::ShortBuy => "1-3",
            Self::Watchlist => "1-2",
            Self::NoTrade => "0",
        }
    }
}

impl fmt::Display for ActionSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionSignal {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "SHORT_BUY" => Ok(Self::ShortBuy),
            "WATCHLIST" => Ok(Self::Watchlist),
            "NO_TRADE" => Ok(Self::NoTrade),
            other => Err(Error::InvalidInput(format!("unknown action signal: {other}"))),
        }
    }
}

// ============================================================================
// Fusion
// ============================================================================

/// Weights and thresholds used by [`FusionConfig::fuse`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FusionConfig {
    pub weights: WeightTable,
    pub thresholds: ActionThresholds,
}

impl FusionConfig {
    /// Build from the decision section of the config file, falling back to
    /// the built-in policy for anything unset.
    pub fn from_decision_config(config: &DecisionConfig) -> Result<Self> {
        let weights = match &config.weights {
            Some(w) => WeightTable::new(
                w.sentiment,
                w.sector_strength,
                w.volume_strength,
                w.capital_inflow,
                w.technical_structure,
            )?,
            None => WeightTable::DEFAULT,
        };

        let (short_buy, watchlist) = config.thresholds();
        let thresholds = ActionThresholds::new(short_buy, watchlist)?;

        Ok(Self {
            weights,
            thresholds,
        })
    }

    /// Fuse sub-scores into a composite score and action.
    pub fn fuse(&self, scores: &SubScores) -> Fusion {
        let composite = self.weights.composite(scores);
        Fusion {
            composite,
            action: self.thresholds.classify(composite),
        }
    }
}

/// Outcome of a fusion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fusion {
    pub composite: f64,
    pub action: ActionSignal,
}

/// Fuse with the built-in weights and thresholds.
pub fn fuse(scores: &SubScores) -> (f64, ActionSignal) {
    let fusion = FusionConfig::default().fuse(scores);
    (fusion.composite, fusion.action)
}
