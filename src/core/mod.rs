pub mod alert_pipeline;
pub mod engine;
pub mod fetcher;
pub mod matcher;
pub mod progress;
pub mod report;
pub mod retry;
pub mod sample;

pub use crate::domain::model::{FetchReport, SearchCriteria, Tender};
pub use crate::domain::ports::{Pipeline, Storage, TenderSource};
pub use crate::utils::error::Result;
