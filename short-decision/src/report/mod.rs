//! Daily report generation.
//!
//! Renders a [`SignalReport`] as the Chinese short-term daily report:
//!
//! ```text
//! 【A股短线日报】
//!
//! 市场情绪：score=48 (涨停42 跌停9 炸板率0.21)
//! 最高连板：3
//!
//! 强势板块：
//! 1. AI-Compute (strength 85.2)
//!
//! 短线关注：
//! 300001 DemoTech | chg 8.1% | vol 2.4x
//!
//! 建议：
//! 轻仓试错(<= 15%)
//! 止损 -6%
//! 止盈 12%
//!
//! 风险：
//! 情绪正常，单票仓位不超过15%，跌破-6%无条件止损
//! ```

use crate::data::{SectorStrength, StockCandidate};
use crate::engine::SignalReport;
use serde::{Deserialize, Serialize};
use short_common::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Lines shown per list section.
const SECTION_LIMIT: usize = 3;

/// Output format of the daily report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Plain report text
    #[default]
    Text,
    /// Report text plus the full signal as JSON
    Json,
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl FromStr for ReportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "text" | "txt" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(Error::InvalidInput(format!(
                "unknown report format '{other}' (expected text or json)"
            ))),
        }
    }
}

/// Report text together with the signal it was rendered from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    pub report: String,
    pub signal: SignalReport,
}

impl DailyReport {
    pub fn new(signal: SignalReport) -> Self {
        Self {
            report: render_text(&signal),
            signal,
        }
    }

    /// Render in the requested format.
    pub fn render(&self, format: ReportFormat) -> Result<String> {
        match format {
            ReportFormat::Text => Ok(self.report.clone()),
            ReportFormat::Json => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}

fn format_sectors(sectors: &[SectorStrength]) -> String {
    if sectors.is_empty() {
        return "无".to_string();
    }
    sectors
        .iter()
        .take(SECTION_LIMIT)
        .enumerate()
        .map(|(idx, s)| format!("{}. {} (strength {})", idx + 1, s.name, s.strength))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_candidates(candidates: &[StockCandidate]) -> String {
    if candidates.is_empty() {
        return "暂无".to_string();
    }
    candidates
        .iter()
        .take(SECTION_LIMIT)
        .map(|c| {
            format!(
                "{} {} | chg {}% | vol {}x",
                c.code, c.name, c.change_pct, c.volume_ratio
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the report text.
pub fn render_text(signal: &SignalReport) -> String {
    let m = &signal.market_sentiment;
    let risk = &signal.risk_control;

    format!(
        "【A股短线日报】\n\n\
         市场情绪：score={} (涨停{} 跌停{} 炸板率{})\n\
         最高连板：{}\n\n\
         强势板块：\n{}\n\n\
         短线关注：\n{}\n\n\
         建议：\n\
         轻仓试错(<= {}%)\n\
         止损 {}%\n\
         止盈 {}%\n\n\
         风险：\n{}",
        m.market_sentiment_score,
        m.limit_up,
        m.limit_down,
        m.break_rate,
        m.max_height,
        format_sectors(&signal.top_sectors),
        format_candidates(&signal.candidates),
        risk.decision.max_position_pct,
        risk.decision.stop_loss_pct,
        risk.take_profit_pct,
        risk.risk_note,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MarketData;
    use crate::engine::SignalEngine;

    async fn fallback_signal() -> SignalReport {
        SignalEngine::default()
            .run(&MarketData::fallback_only())
            .await
            .unwrap()
    }

    #[test]
    fn test_report_format_parse() {
        assert_eq!("text".parse::<ReportFormat>().unwrap(), ReportFormat::Text);
        assert_eq!(" JSON ".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert!("yaml".parse::<ReportFormat>().is_err());
        assert_eq!(ReportFormat::Json.to_string(), "json");
        assert_eq!(ReportFormat::default(), ReportFormat::Text);
    }

    #[tokio::test]
    async fn test_render_text_sections() {
        let report = DailyReport::new(fallback_signal().await);
        let text = &report.report;

        assert!(text.starts_with("【A股短线日报】\n\n"));
        assert!(text.contains("市场情绪：score=48 (涨停42 跌停9 炸板率0.21)"));
        assert!(text.contains("最高连板：3"));
        assert!(text.contains("1. AI-Compute (strength 85.2)"));
        assert!(text.contains("3. Robotics (strength 72.3)"));
        assert!(text.contains("300001 DemoTech | chg 8.1% | vol 2.4x"));
        assert!(text.contains("轻仓试错(<= 15%)"));
        assert!(text.contains("止损 -6%"));
        assert!(text.contains("止盈 12%"));
        assert!(text.ends_with(&report.signal.risk_control.risk_note));
    }

    #[tokio::test]
    async fn test_render_empty_sections() {
        let mut signal = fallback_signal().await;
        signal.top_sectors.clear();
        signal.candidates.clear();

        let text = render_text(&signal);
        assert!(text.contains("强势板块：\n无\n"));
        assert!(text.contains("短线关注：\n暂无\n"));
    }

    #[tokio::test]
    async fn test_render_json() {
        let report = DailyReport::new(fallback_signal().await);
        let out = report.render(ReportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["signal"]["signal"], "WATCHLIST");
        assert!(value["report"].as_str().unwrap().contains("短线关注"));

        assert_eq!(report.render(ReportFormat::Text).unwrap(), report.report);
    }
}
