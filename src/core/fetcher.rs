//! 從上游分頁 API 抓取目前所有有效標案
//!
//! 流程：先開啟列表頁取得 cookie，等待片刻，接著從第 1 頁開始逐頁請求。
//! 每頁有獨立的重試次數；空頁代表資料結束；遇到早於抓取視窗的標案即整個停止
//! (上游依提交日期由新到舊排序)。所有等待都可被 [`CancellationToken`] 中斷。

use crate::adapters::http::{build_session_client, HeaderProfile};
use crate::core::progress::FetchProgress;
use crate::core::retry::{FailureKind, RetryPolicy};
use crate::core::sample;
use crate::domain::model::{window_cutoff, FetchMode, FetchReport, Tender};
use crate::domain::ports::TenderSource;
use crate::utils::error::{Result, TenderError};
use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_BASE_URL: &str = "https://tenders.etimad.sa";
pub const DEFAULT_LANDING_PATH: &str = "/Tender/AllTendersForVisitor?PageNumber=1";
pub const DEFAULT_API_PATH: &str = "/Tender/AllSupplierTendersForVisitorAsync";
pub const DEFAULT_FETCH_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone)]
pub struct FetcherSettings {
    pub base_url: String,
    pub landing_path: String,
    pub api_path: String,
    pub publish_date_id: u32,
    pub page_size: u32,
    /// 單頁瀏覽時依頁碼推算 PublishDateId
    pub browse_by_page_bucket: bool,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub landing_headers: HeaderProfile,
    pub api_headers: HeaderProfile,
    pub window_days: i64,
    pub session_delay: Duration,
    pub page_delay: Duration,
    pub max_pages: Option<u32>,
    pub allow_synthetic_fallback: bool,
    pub retry: RetryPolicy,
}

impl Default for FetcherSettings {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl FetcherSettings {
    pub fn new(base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        let landing_url = format!("{}{}", base_url, DEFAULT_LANDING_PATH);
        Self {
            base_url,
            landing_path: DEFAULT_LANDING_PATH.to_string(),
            api_path: DEFAULT_API_PATH.to_string(),
            publish_date_id: 5,
            page_size: 24,
            browse_by_page_bucket: true,
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(15),
            landing_headers: HeaderProfile::landing_default(),
            api_headers: HeaderProfile::api_default(&landing_url),
            window_days: DEFAULT_FETCH_WINDOW_DAYS,
            session_delay: Duration::from_secs(5),
            page_delay: Duration::from_secs(10),
            max_pages: None,
            allow_synthetic_fallback: false,
            retry: RetryPolicy::default(),
        }
    }

    /// 移除所有刻意的等待，測試用
    pub fn without_delays(mut self) -> Self {
        self.session_delay = Duration::ZERO;
        self.page_delay = Duration::ZERO;
        self.retry = RetryPolicy::immediate(self.retry.max_attempts);
        self
    }

    pub fn landing_url(&self) -> String {
        format!("{}{}", self.base_url, self.landing_path)
    }

    pub fn api_url(&self) -> String {
        format!("{}{}", self.base_url, self.api_path)
    }

    /// 單頁瀏覽使用的日期區間：1-10 頁 -> 1，11-20 -> 2，21-30 -> 3，之後每 10 頁加 1，最多 10
    pub fn browse_publish_date_id(&self, page: u32) -> u32 {
        if !self.browse_by_page_bucket {
            return self.publish_date_id;
        }
        match page {
            0..=10 => 1,
            11..=20 => 2,
            21..=30 => 3,
            _ => ((page - 1) / 10 + 1).min(10),
        }
    }
}

/// 單次嘗試失敗的細節
#[derive(Debug)]
struct AttemptFailure {
    kind: FailureKind,
    message: String,
    /// 軟封鎖時使用固定冷卻時間，不走一般退避
    cooldown: Option<Duration>,
}

impl AttemptFailure {
    fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cooldown: None,
        }
    }

    fn as_error(&self) -> TenderError {
        let message = self.message.clone();
        match self.kind {
            FailureKind::RateLimited | FailureKind::ServerError => {
                TenderError::RateLimited { message }
            }
            FailureKind::Forbidden => TenderError::AccessForbidden { message },
            FailureKind::Timeout | FailureKind::Connection | FailureKind::Generic => {
                TenderError::TransientNetwork { message }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct PageEnvelope {
    #[serde(default)]
    data: Option<serde_json::Value>,
}

enum PageData {
    Items(Vec<serde_json::Value>),
    NotAList,
}

fn parse_page(body: &str) -> std::result::Result<PageData, serde_json::Error> {
    let envelope: PageEnvelope = serde_json::from_str(body)?;
    Ok(match envelope.data {
        None | Some(serde_json::Value::Null) => PageData::Items(Vec::new()),
        Some(serde_json::Value::Array(items)) => PageData::Items(items),
        Some(_) => PageData::NotAList,
    })
}

pub struct TenderFetcher {
    settings: FetcherSettings,
    progress: FetchProgress,
    cancel: CancellationToken,
    reference_time: Option<NaiveDateTime>,
}

impl TenderFetcher {
    pub fn new(settings: FetcherSettings) -> Self {
        Self {
            settings,
            progress: FetchProgress::new(),
            cancel: CancellationToken::new(),
            reference_time: None,
        }
    }

    pub fn with_progress(mut self, progress: FetchProgress) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_reference_time(mut self, now: NaiveDateTime) -> Self {
        self.reference_time = Some(now);
        self
    }

    pub fn settings(&self) -> &FetcherSettings {
        &self.settings
    }

    /// 目前頁碼的唯讀 handle，可交給另一個 task 查詢狀態
    pub fn progress(&self) -> FetchProgress {
        self.progress.clone()
    }

    pub async fn fetch_all_tenders(&self) -> Result<Vec<Tender>> {
        self.collect().await.map(|(tenders, _)| tenders)
    }

    /// 同 [`fetch_all_tenders`](Self::fetch_all_tenders)，但在允許降級時以示範資料代替失敗
    pub async fn fetch_report(&self) -> Result<FetchReport> {
        match self.collect().await {
            Ok((tenders, pages)) => Ok(FetchReport::live(tenders, pages)),
            Err(err @ TenderError::SourceUnavailable { .. })
                if self.settings.allow_synthetic_fallback =>
            {
                tracing::warn!(
                    error = %err,
                    "🧪 DEGRADED MODE: upstream unavailable, returning synthetic sample tenders"
                );
                Ok(FetchReport {
                    tenders: sample::sample_tenders_at(1, self.now()),
                    mode: FetchMode::Degraded {
                        reason: err.to_string(),
                    },
                    pages_fetched: 0,
                })
            }
            Err(err) => Err(err),
        }
    }

    /// 只抓單一頁，不套用時間視窗也不翻頁
    pub async fn fetch_page(&self, page_number: u32) -> Result<Vec<Tender>> {
        let page = page_number.max(1);
        let guard = self.progress.track();
        self.ensure_active(page)?;
        guard.set_page(page);

        let client = build_session_client(self.settings.timeout, self.settings.connect_timeout)?;
        self.establish_session(&client, page).await?;

        let publish_date_id = self.settings.browse_publish_date_id(page);
        tracing::info!(page, publish_date_id, "📄 Fetching single page");
        let items = self.request_page(&client, page, publish_date_id).await?;

        let total = items.len();
        let tenders: Vec<Tender> = items
            .into_iter()
            .filter_map(|item| decode_item(item, page))
            .collect();
        tracing::info!(page, total, valid = tenders.len(), "✅ Page fetched");
        Ok(tenders)
    }

    async fn collect(&self) -> Result<(Vec<Tender>, u32)> {
        let guard = self.progress.track();
        self.ensure_active(0)?;

        let started = Instant::now();
        let cutoff = window_cutoff(self.now(), self.settings.window_days);
        let client = build_session_client(self.settings.timeout, self.settings.connect_timeout)?;

        self.establish_session(&client, 0).await?;

        let mut accepted = Vec::new();
        let mut pages_fetched = 0;
        let mut page = 1;

        loop {
            if let Some(max_pages) = self.settings.max_pages {
                if page > max_pages {
                    tracing::warn!(max_pages, "⚠️ Reached page limit, stopping fetch early");
                    break;
                }
            }

            guard.set_page(page);
            let page_started = Instant::now();
            let items = self
                .request_page(&client, page, self.settings.publish_date_id)
                .await?;

            if items.is_empty() {
                tracing::info!(page, "🏁 No more tenders found");
                break;
            }

            pages_fetched += 1;
            let total = items.len();
            let (batch, reached_cutoff) = accept_items(items, cutoff, page);
            tracing::info!(
                page,
                total,
                valid = batch.len(),
                elapsed_ms = page_started.elapsed().as_millis() as u64,
                "📥 Page processed"
            );
            accepted.extend(batch);

            if reached_cutoff {
                tracing::info!(page, "🛑 Reached tenders older than the fetch window");
                break;
            }

            page += 1;
            tracing::debug!(delay = ?self.settings.page_delay, "⏳ Waiting before next page");
            self.pause(self.settings.page_delay, page).await?;
        }

        tracing::info!(
            tenders = accepted.len(),
            pages = pages_fetched,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "✅ Fetch finished"
        );
        Ok((accepted, pages_fetched))
    }

    /// 開啟列表頁取得 cookie；失敗只記警告，仍繼續呼叫 API
    async fn establish_session(&self, client: &Client, page: u32) -> Result<()> {
        let url = self.settings.landing_url();
        let headers = self.settings.landing_headers.to_header_map()?;
        tracing::info!(url = %url, "🔐 Establishing session");

        match client.get(&url).headers(headers).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::info!(status = %response.status(), "✅ Session established");
            }
            Ok(response) => {
                tracing::warn!(
                    status = %response.status(),
                    "⚠️ Could not establish session, continuing without it"
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, "⚠️ Could not establish session, continuing without it");
            }
        }

        tracing::debug!(delay = ?self.settings.session_delay, "⏳ Waiting after session bootstrap");
        self.pause(self.settings.session_delay, page).await
    }

    /// 請求一頁，依重試策略處理失敗；回傳原始項目，空陣列代表沒有更多資料
    async fn request_page(
        &self,
        client: &Client,
        page: u32,
        publish_date_id: u32,
    ) -> Result<Vec<serde_json::Value>> {
        let url = self.settings.api_url();
        let headers = self.settings.api_headers.to_header_map()?;
        let policy = &self.settings.retry;
        let mut attempt = 0;

        loop {
            self.ensure_active(page)?;
            attempt += 1;
            tracing::debug!(page, attempt, url = %url, "📡 Requesting page");

            let request = client
                .get(&url)
                .headers(headers.clone())
                .query(&[
                    ("PublishDateId", publish_date_id),
                    ("PageSize", self.settings.page_size),
                    ("PageNumber", page),
                ]);

            let failure = match request.send().await {
                Ok(response) => match read_page(response, policy).await {
                    Ok(items) => return Ok(items),
                    Err(failure) => failure,
                },
                Err(e) => AttemptFailure::new(FailureKind::from_transport(&e), e.to_string()),
            };

            if !policy.should_retry(attempt) {
                tracing::error!(
                    page,
                    attempts = attempt,
                    cause = %failure.kind,
                    "❌ Retries exhausted"
                );
                return Err(TenderError::SourceUnavailable {
                    cause: failure.kind,
                    page,
                    attempts: attempt,
                    message: failure.message,
                });
            }

            let delay = failure
                .cooldown
                .unwrap_or_else(|| policy.delay_for(failure.kind, attempt));
            tracing::warn!(
                page,
                attempt,
                max_attempts = policy.max_attempts,
                cause = %failure.kind,
                error = %failure.as_error(),
                delay = ?delay,
                "🔁 Page request failed, retrying"
            );
            self.pause(delay, page).await?;
        }
    }

    async fn pause(&self, delay: Duration, page: u32) -> Result<()> {
        self.ensure_active(page)?;
        if delay.is_zero() {
            return Ok(());
        }
        tokio::select! {
            _ = self.cancel.cancelled() => {
                tracing::warn!(page, "🛑 Fetch cancelled while waiting");
                Err(TenderError::Cancelled { page })
            }
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    fn ensure_active(&self, page: u32) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(TenderError::Cancelled { page });
        }
        Ok(())
    }

    fn now(&self) -> NaiveDateTime {
        self.reference_time
            .unwrap_or_else(|| Local::now().naive_local())
    }
}

#[async_trait]
impl TenderSource for TenderFetcher {
    async fn fetch(&self) -> Result<FetchReport> {
        self.fetch_report().await
    }
}

/// 解讀一次成功送出的回應；HTML 代替 JSON 視為軟封鎖
async fn read_page(
    response: reqwest::Response,
    policy: &RetryPolicy,
) -> std::result::Result<Vec<serde_json::Value>, AttemptFailure> {
    let status = response.status();
    if !status.is_success() {
        return Err(AttemptFailure::new(
            FailureKind::from_status(status),
            format!("HTTP {}", status),
        ));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let body = response
        .text()
        .await
        .map_err(|e| AttemptFailure::new(FailureKind::from_transport(&e), e.to_string()))?;
    tracing::debug!(bytes = body.len(), "Response body received");

    classify_body(content_type.as_deref(), &body, policy)
}

/// 2xx 回應本體的判讀：JSON 清單、非清單、HTML 軟封鎖或其他解析錯誤
fn classify_body(
    content_type: Option<&str>,
    body: &str,
    policy: &RetryPolicy,
) -> std::result::Result<Vec<serde_json::Value>, AttemptFailure> {
    let is_html = content_type
        .map(|v| v.to_ascii_lowercase().contains("text/html"))
        .unwrap_or(false);

    match parse_page(body) {
        Ok(PageData::Items(items)) => Ok(items),
        Ok(PageData::NotAList) => Err(AttemptFailure::new(
            FailureKind::Generic,
            "expected `data` to be a list of tenders",
        )),
        Err(e) if is_html => {
            let preview: String = body.chars().take(200).collect();
            tracing::warn!(preview = %preview, "⚠️ Received HTML instead of JSON, possible bot detection");
            Err(AttemptFailure {
                kind: FailureKind::RateLimited,
                message: format!("HTML soft-block instead of JSON: {}", e),
                cooldown: Some(policy.soft_block_cooldown),
            })
        }
        Err(e) => Err(AttemptFailure::new(
            FailureKind::Generic,
            format!("JSON decode error: {}", e),
        )),
    }
}

fn decode_item(item: serde_json::Value, page: u32) -> Option<Tender> {
    if !item.is_object() {
        let err = TenderError::MalformedRecord {
            tender_id: "unknown".to_string(),
            reason: format!("expected an object, got {}", item),
        };
        tracing::warn!(page, error = %err, "Skipping malformed record");
        return None;
    }

    let tender_id = item
        .get("tenderId")
        .map(|v| v.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    match serde_json::from_value::<Tender>(item) {
        Ok(tender) => Some(tender),
        Err(e) => {
            let err = TenderError::MalformedRecord {
                tender_id,
                reason: e.to_string(),
            };
            tracing::warn!(page, error = %err, "Skipping malformed record");
            None
        }
    }
}

/// 收下視窗內的標案；第一筆過期的標案出現時回傳 `true` 表示應停止抓取。
/// 日期缺漏或無法解析的標案仍收下，只記錄警告。
fn accept_items(
    items: Vec<serde_json::Value>,
    cutoff: NaiveDateTime,
    page: u32,
) -> (Vec<Tender>, bool) {
    let mut accepted = Vec::with_capacity(items.len());

    for tender in items.into_iter().filter_map(|item| decode_item(item, page)) {
        match tender.submission_date.as_deref() {
            None => {
                tracing::warn!(page, tender_id = %tender.display_id(), "⚠️ Tender has no submission date, keeping it");
                accepted.push(tender);
            }
            Some(raw) => match crate::domain::model::parse_submission_date(raw) {
                Ok(submitted) if submitted >= cutoff => accepted.push(tender),
                Ok(submitted) => {
                    tracing::info!(
                        page,
                        tender = %tender.display_name(),
                        submitted = %submitted,
                        "Stopping at older tender"
                    );
                    return (accepted, true);
                }
                Err(e) => {
                    tracing::warn!(
                        page,
                        tender_id = %tender.display_id(),
                        raw = %raw,
                        error = %e,
                        "⚠️ Could not parse submission date, keeping it"
                    );
                    accepted.push(tender);
                }
            },
        }
    }

    (accepted, false)
}
