//! End-to-end tests for the signal pipeline.
//!
//! Runs the engine against the built-in fallback data and against a recorded
//! weak-breadth snapshot: data layer → sub-scores → fusion → risk gate → report.

use std::path::PathBuf;

use short_common::config::{Config, DataConfig};
use short_decision::data::{DataSource, MarketData};
use short_decision::engine::SignalEngine;
use short_decision::report::{DailyReport, ReportFormat};
use short_decision::ActionSignal;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(name)
}

fn snapshot_config() -> DataConfig {
    DataConfig {
        snapshot_path: Some(fixture("snapshot_weak_breadth.json").display().to_string()),
        fallback_enabled: false,
    }
}

// ============================================================================
// Fallback data
// ============================================================================

#[tokio::test]
async fn test_fallback_pipeline_produces_watchlist() {
    let data = MarketData::from_config(&DataConfig::default()).await.unwrap();
    let report = SignalEngine::default().run(&data).await.unwrap();

    // 0.25·48 + 0.25·79.1 + 0.2·80.4 + 0.2·60 + 0.1·79
    assert!(
        (67.75..=67.76).contains(&report.score),
        "score {}",
        report.score
    );
    assert_eq!(report.signal, ActionSignal::Watchlist);
    assert_eq!(report.holding_days, "1-2");
    assert_eq!(report.confidence, 0.51);
    assert!(report.risk_control.decision.allow_new_entries);
    assert_eq!(report.factor_breakdown.sector_strength, 79.1);
    assert_eq!(report.factor_breakdown.stock_volume_strength, 80.4);
    assert_eq!(report.factor_breakdown.technical_structure, 79.0);
}

#[tokio::test]
async fn test_missing_snapshot_falls_back_with_reason() {
    let config = DataConfig {
        snapshot_path: Some("/nonexistent/snapshot.json".into()),
        fallback_enabled: true,
    };
    let data = MarketData::from_config(&config).await.unwrap();
    let report = SignalEngine::default()
        .with_debug(true)
        .run(&data)
        .await
        .unwrap();

    assert_eq!(report.market_sentiment.data_source, DataSource::Fallback);
    let info = report.debug_info.unwrap();
    assert!(info.fallback_reasons["market_sentiment"].contains("Snapshot read failed"));
}

#[tokio::test]
async fn test_missing_snapshot_without_fallback_fails() {
    let config = DataConfig {
        snapshot_path: Some("/nonexistent/snapshot.json".into()),
        fallback_enabled: false,
    };
    assert!(MarketData::from_config(&config).await.is_err());
}

// ============================================================================
// Snapshot data
// ============================================================================

#[tokio::test]
async fn test_snapshot_tool_results() {
    let data = MarketData::from_config(&snapshot_config()).await.unwrap();

    let sentiment = data.market_sentiment().await.unwrap().data;
    assert_eq!(sentiment.date, "2026-10-14");
    assert_eq!(sentiment.limit_up, 6);
    assert_eq!(sentiment.limit_down, 4);
    assert_eq!(sentiment.max_height, 4);
    assert_eq!(sentiment.break_rate, 0.25);
    assert_eq!(sentiment.turnover, 52_150_000_000);
    assert_eq!(sentiment.market_sentiment_score, 34.81);

    let rotation = data.sector_rotation(5).await.unwrap().data;
    assert_eq!(
        rotation.sector_names(),
        vec!["半导体", "通信设备", "光伏设备", "银行"]
    );
    let strengths: Vec<f64> = rotation.top_sectors.iter().map(|s| s.strength).collect();
    assert_eq!(strengths, vec![80.5, 46.21, 40.95, 8.82]);
    // 90 advancers estimate 7 limit-ups
    assert_eq!(rotation.top_sectors[2].limit_up_count, 7);

    let candidates = data
        .scan_strong_stocks(&rotation.sector_names(), 5)
        .await
        .unwrap()
        .data;
    let codes: Vec<&str> = candidates.iter().map(|c| c.code.as_str()).collect();
    assert_eq!(codes, vec!["603986", "688981"]);
    assert_eq!(candidates[0].volume_ratio, 2.8);
    assert_eq!(candidates[1].volume_ratio, 2.4);
    assert_eq!(candidates[1].strength_rank, 2);

    let flow = data.capital_flow(Some("603986")).await.unwrap().data;
    assert_eq!(flow.main_flow, 450_000_000);
    assert_eq!(flow.northbound_net, 950_000_000);
    assert_eq!(flow.flow_trend, "3-day-inflow");
    assert_eq!(flow.strength_rank, 5);
}

#[tokio::test]
async fn test_snapshot_scan_without_sector_filter() {
    let data = MarketData::from_config(&snapshot_config()).await.unwrap();
    let candidates = data.scan_strong_stocks(&[], 10).await.unwrap().data;

    // 601012 has no history so it still drops out
    let codes: Vec<&str> = candidates.iter().map(|c| c.code.as_str()).collect();
    assert_eq!(codes, vec!["603986", "688981"]);
}

#[tokio::test]
async fn test_weak_sentiment_blocks_entries() {
    let data = MarketData::from_config(&snapshot_config()).await.unwrap();
    let report = SignalEngine::default()
        .with_debug(true)
        .run(&data)
        .await
        .unwrap();

    assert_eq!(report.score, 67.77);
    assert_eq!(report.signal, ActionSignal::NoTrade);
    assert_eq!(report.holding_days, "0");
    assert_eq!(report.confidence, 0.41);
    assert!(!report.risk_control.market_filter);
    assert_eq!(report.capital_flow.symbol, "603986");
    assert_eq!(report.factor_breakdown.capital_inflow, 88.0);

    let info = report.debug_info.unwrap();
    assert_eq!(info.fused_action, ActionSignal::Watchlist);
    assert_eq!(info.selected_symbol.as_deref(), Some("603986"));
    assert!(info.fallback_reasons.is_empty());
    assert!(info.sources.values().all(|s| *s == DataSource::Snapshot));
}

#[tokio::test]
async fn test_engine_honours_configured_entry_threshold() {
    let mut config = Config::default();
    config.data = snapshot_config();
    config.decision.min_entry_sentiment = Some(30.0);

    let data = MarketData::from_config(&config.data).await.unwrap();
    let report = SignalEngine::from_config(&config)
        .unwrap()
        .run(&data)
        .await
        .unwrap();

    assert_eq!(report.signal, ActionSignal::Watchlist);
    assert_eq!(report.holding_days, "1-2");
}

#[tokio::test]
async fn test_daily_report_from_snapshot() {
    let data = MarketData::from_config(&snapshot_config()).await.unwrap();
    let signal = SignalEngine::default().run(&data).await.unwrap();
    let report = DailyReport::new(signal);

    let text = report.render(ReportFormat::Text).unwrap();
    assert!(text.contains("市场情绪：score=34.81 (涨停6 跌停4 炸板率0.25)"));
    assert!(text.contains("最高连板：4"));
    assert!(text.contains("1. 半导体 (strength 80.5)"));
    assert!(text.contains("3. 光伏设备 (strength 40.95)"));
    assert!(!text.contains("银行 (strength"));
    assert!(text.contains("603986 兆易创新 | chg 10% | vol 2.8x"));
    assert!(text.contains("暂停新开仓"));

    let json = report.render(ReportFormat::Json).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["signal"]["signal"], "NO_TRADE");
}
