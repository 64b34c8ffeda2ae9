use crate::adapters::http::HeaderProfile;
use crate::core::fetcher::{
    FetcherSettings, DEFAULT_API_PATH, DEFAULT_BASE_URL, DEFAULT_FETCH_WINDOW_DAYS,
    DEFAULT_LANDING_PATH,
};
use crate::core::matcher::{TenderMatcher, DEFAULT_MATCH_WINDOW_DAYS};
use crate::core::report::OutputFormat;
use crate::core::retry::RetryPolicy;
use crate::domain::model::{Alert, AlertKind};
use crate::utils::error::{Result, TenderError};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TenderWatchConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub output: OutputConfig,
    pub monitoring: Option<MonitoringConfig>,
    #[serde(default)]
    pub alerts: Vec<Alert>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    pub base_url: Option<String>,
    pub landing_path: Option<String>,
    pub api_path: Option<String>,
    pub publish_date_id: Option<u32>,
    pub page_size: Option<u32>,
    pub browse_by_page_bucket: Option<bool>,
    pub timeout_seconds: Option<u64>,
    pub connect_timeout_seconds: Option<u64>,
    pub landing_headers: Option<BTreeMap<String, String>>,
    pub api_headers: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchConfig {
    pub window_days: Option<i64>,
    pub session_delay_seconds: Option<u64>,
    pub page_delay_seconds: Option<u64>,
    pub max_pages: Option<u32>,
    pub allow_synthetic_fallback: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: Option<u32>,
    pub base_delay_seconds: Option<u64>,
    pub throttle_delay_seconds: Option<u64>,
    pub forbidden_delay_seconds: Option<u64>,
    pub soft_block_cooldown_seconds: Option<u64>,
    pub max_delay_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchingConfig {
    pub window_days: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    pub path: Option<String>,
    pub formats: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub json_logs: Option<bool>,
}

impl TenderWatchConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(TenderError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| TenderError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${ALERT_EMAIL})，找不到時保留原字串
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| TenderError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn base_url(&self) -> &str {
        self.source
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn landing_path(&self) -> &str {
        self.source
            .landing_path
            .as_deref()
            .unwrap_or(DEFAULT_LANDING_PATH)
    }

    pub fn api_path(&self) -> &str {
        self.source.api_path.as_deref().unwrap_or(DEFAULT_API_PATH)
    }

    pub fn fetch_window_days(&self) -> i64 {
        self.fetch.window_days.unwrap_or(DEFAULT_FETCH_WINDOW_DAYS)
    }

    pub fn match_window_days(&self) -> i64 {
        self.matching.window_days.unwrap_or(DEFAULT_MATCH_WINDOW_DAYS)
    }

    pub fn output_path(&self) -> &str {
        self.output.path.as_deref().unwrap_or("./output")
    }

    pub fn output_formats(&self) -> Result<Vec<OutputFormat>> {
        match &self.output.formats {
            Some(formats) => formats.iter().map(|f| f.parse()).collect(),
            None => Ok(vec![OutputFormat::Json, OutputFormat::Csv]),
        }
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn json_logs(&self) -> bool {
        self.monitoring
            .as_ref()
            .and_then(|m| m.json_logs)
            .unwrap_or(false)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        let secs = |value: Option<u64>, fallback: Duration| {
            value.map(Duration::from_secs).unwrap_or(fallback)
        };
        RetryPolicy {
            max_attempts: self.retry.max_attempts.unwrap_or(defaults.max_attempts),
            base_delay: secs(self.retry.base_delay_seconds, defaults.base_delay),
            throttle_delay: secs(self.retry.throttle_delay_seconds, defaults.throttle_delay),
            forbidden_delay: secs(self.retry.forbidden_delay_seconds, defaults.forbidden_delay),
            soft_block_cooldown: secs(
                self.retry.soft_block_cooldown_seconds,
                defaults.soft_block_cooldown,
            ),
            max_delay: secs(self.retry.max_delay_seconds, defaults.max_delay),
        }
    }

    /// 組合 fetcher 設定；標頭以預設值為底，設定檔中的值覆蓋之
    pub fn fetcher_settings(&self) -> FetcherSettings {
        let mut settings = FetcherSettings::new(self.base_url());
        settings.landing_path = self.landing_path().to_string();
        settings.api_path = self.api_path().to_string();

        let empty = BTreeMap::new();
        settings.landing_headers = HeaderProfile::landing_default()
            .merged_with(self.source.landing_headers.as_ref().unwrap_or(&empty));
        settings.api_headers = HeaderProfile::api_default(&settings.landing_url())
            .merged_with(self.source.api_headers.as_ref().unwrap_or(&empty));

        if let Some(id) = self.source.publish_date_id {
            settings.publish_date_id = id;
        }
        if let Some(size) = self.source.page_size {
            settings.page_size = size;
        }
        if let Some(bucket) = self.source.browse_by_page_bucket {
            settings.browse_by_page_bucket = bucket;
        }
        if let Some(timeout) = self.source.timeout_seconds {
            settings.timeout = Duration::from_secs(timeout);
        }
        if let Some(timeout) = self.source.connect_timeout_seconds {
            settings.connect_timeout = Duration::from_secs(timeout);
        }
        if let Some(delay) = self.fetch.session_delay_seconds {
            settings.session_delay = Duration::from_secs(delay);
        }
        if let Some(delay) = self.fetch.page_delay_seconds {
            settings.page_delay = Duration::from_secs(delay);
        }

        settings.window_days = self.fetch_window_days();
        settings.max_pages = self.fetch.max_pages;
        settings.allow_synthetic_fallback = self.fetch.allow_synthetic_fallback.unwrap_or(false);
        settings.retry = self.retry_policy();
        settings
    }

    pub fn matcher(&self) -> TenderMatcher {
        TenderMatcher::new(self.match_window_days())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_url("source.base_url", self.base_url())?;
        validation::validate_url_path("source.landing_path", self.landing_path())?;
        validation::validate_url_path("source.api_path", self.api_path())?;

        if let Some(size) = self.source.page_size {
            validation::validate_range("source.page_size", size, 1, 100)?;
        }
        if let Some(timeout) = self.source.timeout_seconds {
            validation::validate_positive_number("source.timeout_seconds", timeout, 1)?;
        }
        if let Some(max_pages) = self.fetch.max_pages {
            validation::validate_positive_number("fetch.max_pages", u64::from(max_pages), 1)?;
        }
        if let Some(attempts) = self.retry.max_attempts {
            validation::validate_range("retry.max_attempts", attempts, 1, 20)?;
        }

        validation::validate_range("fetch.window_days", self.fetch_window_days(), 1, 3650)?;
        validation::validate_range("matching.window_days", self.match_window_days(), 1, 3650)?;
        validation::validate_path("output.path", self.output_path())?;
        self.output_formats()?;

        // 標頭必須是合法的 HTTP 標頭
        let settings = self.fetcher_settings();
        settings.landing_headers.to_header_map()?;
        settings.api_headers.to_header_map()?;

        self.validate_alerts()
    }

    fn validate_alerts(&self) -> Result<()> {
        let mut ids = HashSet::new();
        for (index, alert) in self.alerts.iter().enumerate() {
            let field = format!("alerts[{}]", index);
            validation::validate_non_empty_string(&format!("{}.id", field), &alert.id)?;
            if !ids.insert(alert.id.as_str()) {
                return Err(TenderError::InvalidConfigValueError {
                    field: format!("{}.id", field),
                    value: alert.id.clone(),
                    reason: "Duplicate alert id".to_string(),
                });
            }
            if alert.keyword_type != AlertKind::All {
                validation::validate_non_empty_string(&format!("{}.keyword", field), &alert.keyword)?;
            }
            if alert.receivers().next().is_none() {
                return Err(TenderError::MissingConfigError {
                    field: format!("{}.emails", field),
                });
            }
            for email in alert.receivers() {
                validation::validate_email(&format!("{}.emails", field), email)?;
            }
        }
        Ok(())
    }
}

impl Validate for TenderWatchConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
