use crate::core::matcher::TenderMatcher;
use crate::core::report::{report_file_name, DigestRow, OutputFormat, ReceiverDigest};
use crate::domain::model::{Alert, FetchMode, FetchReport, SearchCriteria, Tender};
use crate::domain::ports::{Pipeline, Storage, TenderSource};
use crate::utils::error::Result;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

pub const SUMMARY_FILE: &str = "summary.json";

#[derive(Debug, Clone)]
pub struct AlertMatch {
    pub alert: Alert,
    pub criteria: SearchCriteria,
    pub tenders: Vec<Tender>,
}

#[derive(Debug, Clone)]
pub struct MatchBatch {
    pub mode: FetchMode,
    pub fetched: usize,
    pub pages_fetched: u32,
    pub matches: Vec<AlertMatch>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertOutcome {
    pub alert_id: String,
    pub criteria: String,
    pub matched: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReceiverOutcome {
    pub receiver: String,
    pub tenders: usize,
    pub files: Vec<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub mode: FetchMode,
    pub fetched: usize,
    pub pages_fetched: u32,
    pub alerts: Vec<AlertOutcome>,
    pub receivers: Vec<ReceiverOutcome>,
}

impl RunSummary {
    pub fn failed_receivers(&self) -> usize {
        self.receivers.iter().filter(|r| r.error.is_some()).count()
    }
}

/// 抓一次、對每個通知條件各自比對，再依收件者彙整輸出
pub struct AlertPipeline<S: Storage, T: TenderSource> {
    storage: S,
    source: T,
    matcher: TenderMatcher,
    alerts: Vec<Alert>,
    formats: Vec<OutputFormat>,
    detail_base_url: String,
}

impl<S: Storage, T: TenderSource> AlertPipeline<S, T> {
    pub fn new(storage: S, source: T, matcher: TenderMatcher, alerts: Vec<Alert>) -> Self {
        Self {
            storage,
            source,
            matcher,
            alerts,
            formats: vec![OutputFormat::Json, OutputFormat::Csv],
            detail_base_url: crate::core::fetcher::DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_formats(mut self, formats: Vec<OutputFormat>) -> Self {
        self.formats = formats;
        self
    }

    pub fn with_detail_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.detail_base_url = base_url.into();
        self
    }

    async fn write_digest(&self, digest: &ReceiverDigest) -> Result<Vec<String>> {
        let mut files = Vec::with_capacity(self.formats.len());
        for format in &self.formats {
            let path = report_file_name(&digest.receiver, *format);
            let content = digest.render(*format)?;
            self.storage.write_file(&path, content.as_bytes()).await?;
            files.push(path);
        }
        Ok(files)
    }
}

/// 依收件者分組，同一收件者重複的標案只保留一次，保持出現順序
fn group_by_receiver(matches: &[AlertMatch]) -> BTreeMap<String, (Vec<String>, Vec<Tender>)> {
    let mut grouped: BTreeMap<String, (Vec<String>, Vec<Tender>)> = BTreeMap::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for matched in matches.iter().filter(|m| !m.tenders.is_empty()) {
        for receiver in matched.alert.receivers() {
            let receiver = receiver.to_lowercase();
            let entry = grouped.entry(receiver.clone()).or_default();
            entry.0.push(matched.alert.id.clone());
            for tender in &matched.tenders {
                let key = match &tender.id {
                    Some(id) => id.to_string(),
                    None => format!("{}|{}", tender.name_or_empty(), tender.display_submission_date()),
                };
                if seen.insert((receiver.clone(), key)) {
                    entry.1.push(tender.clone());
                }
            }
        }
    }

    grouped
}

#[async_trait::async_trait]
impl<S: Storage, T: TenderSource> Pipeline for AlertPipeline<S, T> {
    type Matched = MatchBatch;
    type Summary = RunSummary;

    async fn extract(&self) -> Result<FetchReport> {
        tracing::info!("🚀 Fetching tenders for {} alerts", self.alerts.len());
        let report = self.source.fetch().await?;

        if let FetchMode::Degraded { reason } = &report.mode {
            tracing::warn!(reason = %reason, "🧪 Running alerts against SYNTHETIC data");
        }
        Ok(report)
    }

    async fn transform(&self, fetched: FetchReport) -> Result<MatchBatch> {
        let matches: Vec<AlertMatch> = self
            .alerts
            .iter()
            .map(|alert| {
                let criteria = alert.criteria();
                let tenders = self.matcher.filter(&fetched.tenders, &criteria);
                tracing::info!(
                    alert_id = %alert.id,
                    criteria = %criteria,
                    matched = tenders.len(),
                    "🎯 Alert processed"
                );
                AlertMatch {
                    alert: alert.clone(),
                    criteria,
                    tenders,
                }
            })
            .collect();

        Ok(MatchBatch {
            mode: fetched.mode,
            fetched: fetched.tenders.len(),
            pages_fetched: fetched.pages_fetched,
            matches,
        })
    }

    async fn load(&self, batch: MatchBatch) -> Result<RunSummary> {
        let mut receivers = Vec::new();

        for (receiver, (alert_ids, tenders)) in group_by_receiver(&batch.matches) {
            let digest = ReceiverDigest {
                receiver: receiver.clone(),
                alert_ids,
                mode: batch.mode.clone(),
                tenders: tenders
                    .iter()
                    .map(|t| DigestRow::from_tender(t, &self.detail_base_url))
                    .collect(),
            };

            // 單一收件者失敗不影響其他收件者
            let outcome = match self.write_digest(&digest).await {
                Ok(files) => {
                    tracing::info!(receiver = %receiver, tenders = tenders.len(), "📨 Digest written");
                    ReceiverOutcome {
                        receiver,
                        tenders: tenders.len(),
                        files,
                        error: None,
                    }
                }
                Err(e) => {
                    tracing::error!(receiver = %receiver, error = %e, "❌ Failed to write digest");
                    ReceiverOutcome {
                        receiver,
                        tenders: tenders.len(),
                        files: Vec::new(),
                        error: Some(e.to_string()),
                    }
                }
            };
            receivers.push(outcome);
        }

        let summary = RunSummary {
            mode: batch.mode,
            fetched: batch.fetched,
            pages_fetched: batch.pages_fetched,
            alerts: batch
                .matches
                .iter()
                .map(|m| AlertOutcome {
                    alert_id: m.alert.id.clone(),
                    criteria: m.criteria.to_string(),
                    matched: m.tenders.len(),
                })
                .collect(),
            receivers,
        };

        let json = serde_json::to_string_pretty(&summary)?;
        self.storage.write_file(SUMMARY_FILE, json.as_bytes()).await?;
        Ok(summary)
    }
}
