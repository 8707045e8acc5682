//! Configuration system for crossvote.
//! TOML-based, layered resolution: CLI > env > project > user > defaults.

pub mod category_config;
pub mod crossvote_config;
pub mod diagnostics_config;
pub mod filter_config;
pub mod model_config;
pub mod sampler_config;
pub mod summary_config;

pub use category_config::CategoryConfig;
pub use crossvote_config::{CliOverrides, CrossvoteConfig};
pub use diagnostics_config::DiagnosticsConfig;
pub use filter_config::{DegeneratePolicy, FilterConfig};
pub use model_config::ModelConfig;
pub use sampler_config::SamplerConfig;
pub use summary_config::{EstimateLevel, SummaryConfig};
