pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use crate::adapters::storage::LocalStorage;
pub use crate::config::TenderWatchConfig;
pub use crate::core::{
    alert_pipeline::{AlertPipeline, RunSummary},
    engine::AlertEngine,
    fetcher::{FetcherSettings, TenderFetcher},
    matcher::TenderMatcher,
    progress::FetchProgress,
};
pub use crate::domain::model::{Alert, AlertKind, FetchMode, FetchReport, SearchCriteria, Tender};
pub use crate::utils::error::{Result, TenderError};
