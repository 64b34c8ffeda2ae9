use crate::core::retry::FailureKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TenderError {
    #[error("Transient network error: {message}")]
    TransientNetwork { message: String },

    #[error("Rate limited by upstream: {message}")]
    RateLimited { message: String },

    #[error("Access forbidden by upstream: {message}")]
    AccessForbidden { message: String },

    #[error("Tender source unavailable on page {page} after {attempts} attempts ({cause}): {message}")]
    SourceUnavailable {
        cause: FailureKind,
        page: u32,
        attempts: u32,
        message: String,
    },

    #[error("Malformed tender record {tender_id}: {reason}")]
    MalformedRecord { tender_id: String, reason: String },

    #[error("Fetch cancelled at page {page}")]
    Cancelled { page: u32 },

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Upstream,
    Data,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl TenderError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            TenderError::TransientNetwork { .. } | TenderError::ApiError(_) => ErrorCategory::Network,
            TenderError::RateLimited { .. }
            | TenderError::AccessForbidden { .. }
            | TenderError::SourceUnavailable { .. }
            | TenderError::Cancelled { .. } => ErrorCategory::Upstream,
            TenderError::MalformedRecord { .. }
            | TenderError::SerializationError(_)
            | TenderError::CsvError(_)
            | TenderError::ValidationError { .. } => ErrorCategory::Data,
            TenderError::ConfigError { .. }
            | TenderError::ConfigValidationError { .. }
            | TenderError::InvalidConfigValueError { .. }
            | TenderError::MissingConfigError { .. } => ErrorCategory::Configuration,
            TenderError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TenderError::MalformedRecord { .. } | TenderError::Cancelled { .. } => {
                ErrorSeverity::Low
            }
            TenderError::TransientNetwork { .. }
            | TenderError::RateLimited { .. }
            | TenderError::AccessForbidden { .. }
            | TenderError::ApiError(_) => ErrorSeverity::Medium,
            TenderError::SourceUnavailable { cause, .. } => match cause {
                // 被限流通常等一等就好
                FailureKind::RateLimited => ErrorSeverity::Medium,
                _ => ErrorSeverity::High,
            },
            TenderError::SerializationError(_)
            | TenderError::CsvError(_)
            | TenderError::ValidationError { .. } => ErrorSeverity::High,
            TenderError::ConfigError { .. }
            | TenderError::ConfigValidationError { .. }
            | TenderError::InvalidConfigValueError { .. }
            | TenderError::MissingConfigError { .. }
            | TenderError::IoError(_) => ErrorSeverity::Critical,
        }
    }

    /// 給維運人員看的訊息：區分被限流、被封鎖、上游掛掉與未知錯誤
    pub fn operator_message(&self) -> String {
        match self {
            TenderError::SourceUnavailable { cause, page, .. } => match cause {
                FailureKind::RateLimited => format!(
                    "Upstream is rate-limiting us (page {}). Wait longer before the next run.",
                    page
                ),
                FailureKind::Forbidden => format!(
                    "Upstream is blocking our requests (page {}). Check the header profile or source IP.",
                    page
                ),
                FailureKind::Timeout | FailureKind::Connection | FailureKind::ServerError => {
                    format!(
                        "Upstream appears to be down (page {}). Alert an operator if this persists.",
                        page
                    )
                }
                FailureKind::Generic => format!(
                    "Unknown error while fetching page {}. Investigate the upstream response.",
                    page
                ),
            },
            TenderError::RateLimited { .. } => "Upstream is rate-limiting us.".to_string(),
            TenderError::AccessForbidden { .. } => "Upstream is blocking our requests.".to_string(),
            TenderError::TransientNetwork { .. } | TenderError::ApiError(_) => {
                "Upstream appears to be down.".to_string()
            }
            other => format!("Unknown error: {}", other),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            TenderError::SourceUnavailable { cause, .. } => match cause {
                FailureKind::RateLimited => "Increase retry.throttle_delay_seconds or fetch.page_delay_seconds",
                FailureKind::Forbidden => "Refresh source.api_headers and confirm the landing page still sets cookies",
                FailureKind::Timeout => "Raise source.timeout_seconds or retry later",
                FailureKind::Connection | FailureKind::ServerError => {
                    "Check that the upstream host is reachable, then retry"
                }
                FailureKind::Generic => "Run fetch-page with --verbose to inspect the raw response",
            },
            TenderError::RateLimited { .. } | TenderError::AccessForbidden { .. } => {
                "Wait before retrying; the upstream is throttling requests"
            }
            TenderError::TransientNetwork { .. } | TenderError::ApiError(_) => {
                "Check network connectivity and retry"
            }
            TenderError::Cancelled { .. } => "The run was cancelled; start it again when ready",
            TenderError::MalformedRecord { .. } => "No action needed; the record was skipped",
            TenderError::ConfigError { .. }
            | TenderError::ConfigValidationError { .. }
            | TenderError::InvalidConfigValueError { .. }
            | TenderError::MissingConfigError { .. } => "Fix the configuration file and run again",
            TenderError::IoError(_) => "Check file permissions and available disk space",
            TenderError::SerializationError(_)
            | TenderError::CsvError(_)
            | TenderError::ValidationError { .. } => "Inspect the input data for unexpected values",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Upstream | ErrorCategory::Network => self.operator_message(),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Data => format!("Data problem: {}", self),
            ErrorCategory::System => format!("System problem: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, TenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn unavailable(cause: FailureKind) -> TenderError {
        TenderError::SourceUnavailable {
            cause,
            page: 3,
            attempts: 5,
            message: "boom".to_string(),
        }
    }

    #[test]
    fn test_operator_message_distinguishes_causes() {
        assert!(unavailable(FailureKind::RateLimited)
            .operator_message()
            .contains("rate-limiting"));
        assert!(unavailable(FailureKind::Forbidden)
            .operator_message()
            .contains("blocking"));
        assert!(unavailable(FailureKind::Timeout)
            .operator_message()
            .contains("down"));
        assert!(unavailable(FailureKind::Generic)
            .operator_message()
            .contains("Unknown error"));
    }

    #[test]
    fn test_severity_and_category() {
        assert_eq!(unavailable(FailureKind::RateLimited).severity(), ErrorSeverity::Medium);
        assert_eq!(unavailable(FailureKind::ServerError).severity(), ErrorSeverity::High);
        assert_eq!(
            unavailable(FailureKind::Forbidden).category(),
            ErrorCategory::Upstream
        );

        let config_err = TenderError::MissingConfigError {
            field: "source.base_url".to_string(),
        };
        assert_eq!(config_err.category(), ErrorCategory::Configuration);
        assert_eq!(config_err.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_display_includes_page_and_cause() {
        let msg = unavailable(FailureKind::Forbidden).to_string();
        assert!(msg.contains("page 3"));
        assert!(msg.contains("forbidden"));
    }
}
