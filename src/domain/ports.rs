use crate::domain::model::FetchReport;
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// 標案來源；正式環境由 `TenderFetcher` 實作
#[async_trait]
pub trait TenderSource: Send + Sync {
    async fn fetch(&self) -> Result<FetchReport>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    type Matched: Send;
    type Summary: Send;

    async fn extract(&self) -> Result<FetchReport>;
    async fn transform(&self, fetched: FetchReport) -> Result<Self::Matched>;
    async fn load(&self, matched: Self::Matched) -> Result<Self::Summary>;
}
