//! Short Decision Library
//!
//! Short-term decision tools for A-share trading: market sentiment, sector
//! rotation, strong-stock scanning and capital flow feed a weighted signal
//! fusion, gated by a sentiment-based risk filter.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     short-decision (CLI tools)                      │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────┐      │
//! │  │  Market Data    │  │  Factors        │  │  Fusion         │      │
//! │  │  snapshot/      │─>│  sub-scores     │─>│  composite +    │      │
//! │  │  fallback       │  │  0-100          │  │  action         │      │
//! │  └─────────────────┘  └─────────────────┘  └────────┬────────┘      │
//! │                                                     │               │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌────────▼────────┐      │
//! │  │  Daily Report   │<─│  Signal Engine  │<─│  Risk Control   │      │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────┘      │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Concepts
//!
//! ## Signal fusion
//! - Five sub-scores: sentiment, sector strength, volume strength, capital
//!   inflow, technical structure
//! - Weighted 0.25 / 0.25 / 0.20 / 0.20 / 0.10
//! - SHORT_BUY at 75, WATCHLIST at 60, otherwise NO_TRADE
//!
//! ## Risk filter
//! - 15% position cap, -6% stop loss
//! - New entries only while market sentiment is at least 40

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod data;
pub mod engine;
pub mod factors;
pub mod fusion;
pub mod report;
pub mod risk;

pub use data::{MarketData, MarketDataProvider};
pub use engine::{SignalEngine, SignalReport};
pub use fusion::{fuse, ActionSignal, FusionConfig, SubScores};
pub use report::{DailyReport, ReportFormat};
pub use risk::{assess_risk, RiskDecision, RiskPolicy};
