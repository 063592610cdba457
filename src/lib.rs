//! CHUNITHM catalog reconciliation: builds and refreshes a SQLite catalog of
//! songs, charts, aliases and chart-view links from several upstream sources.

pub mod aliases;
pub mod catalog;
pub mod charts;
pub mod config;
pub mod dump;
pub mod error;
pub mod mappings;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod resolver;
pub mod sdvxin;
pub mod sources;
pub mod sync;

pub use error::{Error, Result};
