//! DataDabble
//!
//! Custom database builder: user-defined schemas with typed fields, entries
//! validated and coerced against them, and chart data aggregated over entries.

pub mod api;
pub mod config;
pub mod error;
pub mod registry;
pub mod schema;
pub mod store;
pub mod visualization;
