//! Layered, typed configuration for the Lodestone retrieval pipeline.

pub mod config;
pub mod error;
pub mod merge;

pub use config::{
    ChunkerConfig, Config, DistanceMetric, EmbedderConfig, QueryConfig, RetrieverConfig,
};
pub use error::ConfigError;
pub use merge::{ReinitPlan, merge_patch};
