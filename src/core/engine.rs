use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use std::time::Instant;

pub struct AlertEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> AlertEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self) -> Result<P::Summary> {
        let started = Instant::now();
        tracing::info!("🚀 Starting tender alert run");
        self.monitor.log_stats("Start");

        // Fetch
        let fetched = self.pipeline.extract().await?;
        tracing::info!(
            tenders = fetched.tenders.len(),
            pages = fetched.pages_fetched,
            degraded = fetched.mode.is_degraded(),
            "📥 Fetched tenders"
        );
        self.monitor.log_stats("Fetch Tenders");

        // Match
        let matched = self.pipeline.transform(fetched).await?;
        self.monitor.log_stats("Filter Tenders");

        // Deliver
        let summary = self.pipeline.load(matched).await?;
        self.monitor.log_final_stats();

        tracing::info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "✅ Tender alert run finished"
        );
        Ok(summary)
    }
}
