//! Market data acquisition: canonical bar models and provider adapters.

pub mod models;
pub mod providers;
