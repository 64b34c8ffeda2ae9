use crate::domain::model::{FetchMode, Tender, NOT_AVAILABLE};
use crate::utils::error::{Result, TenderError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Csv,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = TenderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(TenderError::InvalidConfigValueError {
                field: "output.formats".to_string(),
                value: other.to_string(),
                reason: "Unsupported format. Valid formats: json, csv".to_string(),
            }),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// 通知內容中的一列，缺值一律顯示 N/A
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DigestRow {
    pub id: String,
    pub name: String,
    pub agency: String,
    pub activity: String,
    pub submission_date: String,
    pub last_enquiries_date: String,
    pub last_offer_date: String,
    pub reference_number: String,
    pub detail_url: String,
}

impl DigestRow {
    pub fn from_tender(tender: &Tender, detail_base_url: &str) -> Self {
        Self {
            id: tender.display_id(),
            name: tender.display_name().to_string(),
            agency: tender.display_agency().to_string(),
            activity: tender.display_activity().to_string(),
            submission_date: tender.display_submission_date().to_string(),
            last_enquiries_date: tender.display_last_enquiries_date().to_string(),
            last_offer_date: tender.display_last_offer_date().to_string(),
            reference_number: tender.display_reference_number().to_string(),
            detail_url: tender
                .detail_url(detail_base_url)
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        }
    }
}

/// 單一收件者的彙整結果
#[derive(Debug, Clone, Serialize)]
pub struct ReceiverDigest {
    pub receiver: String,
    pub alert_ids: Vec<String>,
    pub mode: FetchMode,
    pub tenders: Vec<DigestRow>,
}

impl ReceiverDigest {
    pub fn render(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(self)?),
            OutputFormat::Csv => render_csv(&self.tenders),
        }
    }
}

pub fn render_csv(rows: &[DigestRow]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    let data = writer
        .into_inner()
        .map_err(|e| TenderError::IoError(e.into_error()))?;
    String::from_utf8(data).map_err(|e| TenderError::ValidationError {
        message: format!("CSV output is not valid UTF-8: {}", e),
    })
}

/// 收件者 email 轉成安全的檔名
pub fn report_file_name(receiver: &str, format: OutputFormat) -> String {
    let stem: String = receiver
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '-' | '_' | '+') {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("reports/{}.{}", stem, format.extension())
}
