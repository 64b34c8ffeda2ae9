use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// 欄位缺值時顯示的預設字串
pub const NOT_AVAILABLE: &str = "N/A";

const SUBMISSION_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// 上游的 tenderId 可能是數字也可能是字串
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TenderId {
    Number(i64),
    Text(String),
}

impl fmt::Display for TenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TenderId::Number(n) => write!(f, "{}", n),
            TenderId::Text(s) => f.write_str(s),
        }
    }
}

/// 單筆標案，欄位名稱沿用上游 JSON (包含 `submitionDate` 的拼法)
///
/// 上游偶爾會把文字欄位送成數字；這類值轉成字串保留，不讓整筆資料失效。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tender {
    #[serde(rename = "tenderId", default, deserialize_with = "lenient::id")]
    pub id: Option<TenderId>,
    #[serde(rename = "tenderName", default, deserialize_with = "lenient::text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub agency_name: Option<String>,
    #[serde(rename = "tenderActivityName", default, deserialize_with = "lenient::text")]
    pub activity_name: Option<String>,
    #[serde(rename = "submitionDate", default, deserialize_with = "lenient::text")]
    pub submission_date: Option<String>,
    #[serde(rename = "lastEnqueriesDate", default, deserialize_with = "lenient::text")]
    pub last_enquiries_date: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub last_offer_presentation_date: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub reference_number: Option<String>,
    #[serde(rename = "tenderIdString", default, deserialize_with = "lenient::text")]
    pub detail_url_token: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

mod lenient {
    use super::TenderId;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// 字串原樣保留，數字與布林轉成字串，其他型別視為缺值
    pub fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
    }

    /// 整數用 `Number`，小數或超出 i64 的數字轉成 `Text`
    pub fn id<'de, D>(deserializer: D) -> Result<Option<TenderId>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Number(n) => Some(match n.as_i64() {
                Some(i) => TenderId::Number(i),
                None => TenderId::Text(n.to_string()),
            }),
            Value::String(s) => Some(TenderId::Text(s)),
            _ => None,
        })
    }
}

impl Tender {
    pub fn name_or_empty(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    pub fn agency_or_empty(&self) -> &str {
        self.agency_name.as_deref().unwrap_or("")
    }

    pub fn activity_or_empty(&self) -> &str {
        self.activity_name.as_deref().unwrap_or("")
    }

    pub fn display_id(&self) -> String {
        self.id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    }

    pub fn display_name(&self) -> &str {
        or_sentinel(&self.name)
    }

    pub fn display_agency(&self) -> &str {
        or_sentinel(&self.agency_name)
    }

    pub fn display_activity(&self) -> &str {
        or_sentinel(&self.activity_name)
    }

    pub fn display_reference_number(&self) -> &str {
        or_sentinel(&self.reference_number)
    }

    pub fn display_submission_date(&self) -> &str {
        display_date(&self.submission_date)
    }

    pub fn display_last_enquiries_date(&self) -> &str {
        display_date(&self.last_enquiries_date)
    }

    pub fn display_last_offer_date(&self) -> &str {
        display_date(&self.last_offer_presentation_date)
    }

    /// 解析提交日期；缺值或格式錯誤時回傳 `None`
    pub fn submission_datetime(&self) -> Option<NaiveDateTime> {
        self.submission_date
            .as_deref()
            .and_then(|raw| parse_submission_date(raw).ok())
    }

    /// 標案詳細頁連結
    pub fn detail_url(&self, base_url: &str) -> Option<String> {
        self.detail_url_token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
            .map(|token| {
                format!(
                    "{}/Tender/DetailsForVisitor?STenderId={}",
                    base_url.trim_end_matches('/'),
                    token
                )
            })
    }
}

fn or_sentinel(value: &Option<String>) -> &str {
    match value.as_deref() {
        Some(v) if !v.is_empty() => v,
        _ => NOT_AVAILABLE,
    }
}

fn display_date(value: &Option<String>) -> &str {
    match value.as_deref() {
        Some(v) if !v.is_empty() => truncate_fraction(v),
        _ => NOT_AVAILABLE,
    }
}

/// 去掉小數秒，例如 `2025-08-24T10:00:00.1234567` -> `2025-08-24T10:00:00`
pub fn truncate_fraction(raw: &str) -> &str {
    raw.split('.').next().unwrap_or(raw)
}

pub fn parse_submission_date(raw: &str) -> chrono::ParseResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(truncate_fraction(raw.trim()), SUBMISSION_DATE_FORMAT)
}

/// `now` 往前推 `window_days` 天；超出可表示範圍時回傳最早時間，等於不設下限
pub fn window_cutoff(now: NaiveDateTime, window_days: i64) -> NaiveDateTime {
    chrono::Duration::try_days(window_days)
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(NaiveDateTime::MIN)
}

/// 四個獨立的比對條件，空值代表不限制
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchCriteria {
    #[serde(default)]
    pub agency_names: Vec<String>,
    #[serde(default)]
    pub activity_names: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub tender_name: Option<String>,
}

impl SearchCriteria {
    pub fn with_agencies<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.agency_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_activities<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.activity_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tender_name(mut self, name: impl Into<String>) -> Self {
        self.tender_name = Some(name.into());
        self
    }

    /// 所有欄位都沒有有效值時，等同「全部標案」
    pub fn is_empty(&self) -> bool {
        !has_entries(&self.agency_names)
            && !has_entries(&self.activity_names)
            && !has_entries(&self.keywords)
            && self
                .tender_name
                .as_deref()
                .map_or(true, |name| name.trim().is_empty())
    }
}

fn has_entries(values: &[String]) -> bool {
    values.iter().any(|v| !v.trim().is_empty())
}

impl fmt::Display for SearchCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("all tenders");
        }

        let mut parts = Vec::new();
        if has_entries(&self.agency_names) {
            parts.push(format!("agency: {}", self.agency_names.join(", ")));
        }
        if has_entries(&self.activity_names) {
            parts.push(format!("activity: {}", self.activity_names.join(", ")));
        }
        if has_entries(&self.keywords) {
            parts.push(format!("keywords: {}", self.keywords.join(", ")));
        }
        if let Some(name) = self.tender_name.as_deref().filter(|n| !n.trim().is_empty()) {
            parts.push(format!("tender: {}", name));
        }
        f.write_str(&parts.join("; "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchMode {
    Live,
    /// 上游無法使用，回傳的是合成的示範資料
    Degraded { reason: String },
}

impl FetchMode {
    pub fn is_degraded(&self) -> bool {
        matches!(self, FetchMode::Degraded { .. })
    }
}

#[derive(Debug, Clone)]
pub struct FetchReport {
    pub tenders: Vec<Tender>,
    pub mode: FetchMode,
    pub pages_fetched: u32,
}

impl FetchReport {
    pub fn live(tenders: Vec<Tender>, pages_fetched: u32) -> Self {
        Self {
            tenders,
            mode: FetchMode::Live,
            pages_fetched,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Agency,
    Activity,
    Tender,
    Keyword,
    /// 不設條件的一般通知
    All,
}

/// 訂閱者設定的通知條件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    #[serde(default)]
    pub keyword: String,
    pub keyword_type: AlertKind,
    pub emails: Vec<String>,
}

impl Alert {
    pub fn criteria(&self) -> SearchCriteria {
        let keyword = self.keyword.trim();
        match self.keyword_type {
            AlertKind::Agency => SearchCriteria::default().with_agencies([keyword]),
            AlertKind::Activity => SearchCriteria::default().with_activities([keyword]),
            AlertKind::Tender => SearchCriteria::default().with_tender_name(keyword),
            AlertKind::Keyword => SearchCriteria::default().with_keywords(
                keyword
                    .split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty()),
            ),
            AlertKind::All => SearchCriteria::default(),
        }
    }

    pub fn receivers(&self) -> impl Iterator<Item = &str> {
        self.emails
            .iter()
            .map(|e| e.trim())
            .filter(|e| !e.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_upstream_tender() {
        let json = serde_json::json!({
            "tenderId": 123456,
            "tenderName": "Supply of Medical Equipment",
            "agencyName": "Ministry of Health",
            "tenderActivityName": "Medical Equipment",
            "submitionDate": "2025-08-24T10:00:00.1234567",
            "referenceNumber": "REF-1",
            "tenderIdString": "abc%3D%3D",
            "branchName": "Riyadh"
        });

        let tender: Tender = serde_json::from_value(json).unwrap();

        assert_eq!(tender.id, Some(TenderId::Number(123456)));
        assert_eq!(tender.agency_or_empty(), "Ministry of Health");
        assert_eq!(tender.display_submission_date(), "2025-08-24T10:00:00");
        assert_eq!(tender.display_last_offer_date(), NOT_AVAILABLE);
        assert_eq!(tender.display_last_enquiries_date(), NOT_AVAILABLE);
        assert_eq!(tender.extra.get("branchName").unwrap(), "Riyadh");
        assert_eq!(
            tender.detail_url("https://tenders.etimad.sa/").unwrap(),
            "https://tenders.etimad.sa/Tender/DetailsForVisitor?STenderId=abc%3D%3D"
        );
    }

    #[test]
    fn test_string_tender_id_and_missing_fields() {
        let tender: Tender = serde_json::from_value(serde_json::json!({
            "tenderId": "000042"
        }))
        .unwrap();

        assert_eq!(tender.display_id(), "000042");
        assert_eq!(tender.display_name(), NOT_AVAILABLE);
        assert_eq!(tender.name_or_empty(), "");
        assert!(tender.submission_datetime().is_none());
        assert!(tender.detail_url("https://tenders.etimad.sa").is_none());
    }

    #[test]
    fn test_wrong_typed_fields_do_not_reject_record() {
        let tender: Tender = serde_json::from_value(serde_json::json!({
            "tenderId": 3.5,
            "tenderName": 17,
            "agencyName": ["not", "text"],
            "submitionDate": 20250830,
            "referenceNumber": null
        }))
        .unwrap();

        assert_eq!(tender.id, Some(TenderId::Text("3.5".to_string())));
        assert_eq!(tender.name_or_empty(), "17");
        assert_eq!(tender.agency_name, None);
        assert_eq!(tender.submission_date.as_deref(), Some("20250830"));
        assert!(tender.submission_datetime().is_none());
        assert_eq!(tender.display_reference_number(), NOT_AVAILABLE);
    }

    #[test]
    fn test_window_cutoff_saturates() {
        let now = parse_submission_date("2025-09-01T12:00:00").unwrap();
        assert_eq!(
            window_cutoff(now, 30),
            parse_submission_date("2025-08-02T12:00:00").unwrap()
        );
        assert_eq!(window_cutoff(now, 1_000_000_000), NaiveDateTime::MIN);
        assert_eq!(window_cutoff(now, i64::MAX), NaiveDateTime::MIN);
    }

    #[test]
    fn test_fractional_seconds_are_truncated() {
        let with_fraction = parse_submission_date("2025-08-24T10:00:00.1234567").unwrap();
        let plain = parse_submission_date("2025-08-24T10:00:00").unwrap();
        assert_eq!(with_fraction, plain);
        assert!(parse_submission_date("2025-08-24").is_err());
        assert!(parse_submission_date("not a date").is_err());
    }

    #[test]
    fn test_alert_to_criteria() {
        let alert = Alert {
            id: "1".to_string(),
            keyword: "medical, cleaning,,".to_string(),
            keyword_type: AlertKind::Keyword,
            emails: vec!["a@example.com".to_string(), " ".to_string()],
        };
        let criteria = alert.criteria();
        assert_eq!(criteria.keywords, vec!["medical", "cleaning"]);
        assert!(criteria.agency_names.is_empty());
        assert_eq!(alert.receivers().collect::<Vec<_>>(), vec!["a@example.com"]);

        let agency = Alert {
            keyword_type: AlertKind::Agency,
            keyword: "Ministry of Health".to_string(),
            ..alert.clone()
        };
        assert_eq!(agency.criteria().agency_names, vec!["Ministry of Health"]);

        let general = Alert {
            keyword_type: AlertKind::All,
            ..alert
        };
        assert!(general.criteria().is_empty());
    }

    #[test]
    fn test_blank_criteria_are_empty() {
        let criteria = SearchCriteria::default()
            .with_keywords([" ", ""])
            .with_tender_name("  ");
        assert!(criteria.is_empty());
        assert_eq!(criteria.to_string(), "all tenders");

        let criteria = SearchCriteria::default().with_agencies(["Health"]);
        assert!(!criteria.is_empty());
        assert_eq!(criteria.to_string(), "agency: Health");
    }
}
