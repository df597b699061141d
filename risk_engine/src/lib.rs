//! Volatility, trend and momentum analysis for a basket of crypto assets.
//!
//! For every configured asset the engine fetches daily bars, forecasts
//! next-day volatility with GARCH(1,1), computes SMA trend, RSI, ATR and pivot
//! levels, and fuses them into a risk score, a trading signal, a position size
//! and stop-loss/take-profit levels. Assets whose data cannot be fetched or
//! modelled get a clearly marked fallback report instead. The result is
//! written as one JSON snapshot per run.
//!
//! Entry points are [`pipeline::analyze_market`] and [`pipeline::run`].

pub mod config;
pub mod errors;
pub mod fallback;
pub mod indicators;
pub mod levels;
pub mod pipeline;
pub mod report;
pub mod series;
pub mod signal;
pub mod snapshot;
pub mod volatility;
