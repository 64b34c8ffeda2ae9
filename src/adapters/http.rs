use crate::utils::error::{Result, TenderError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use std::collections::BTreeMap;
use std::time::Duration;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/139.0.0.0 Safari/537.36";

/// 一組請求標頭設定，放在設定檔中方便調整而不需改程式
///
/// Host 由 client 依 URL 自動帶入；Accept-Encoding 交給 reqwest 處理解壓縮。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderProfile {
    headers: BTreeMap<String, String>,
}

impl HeaderProfile {
    pub fn new(headers: BTreeMap<String, String>) -> Self {
        Self { headers }
    }

    /// 瀏覽器開啟列表頁時的標頭
    pub fn landing_default() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("User-Agent".to_string(), BROWSER_USER_AGENT.to_string());
        headers.insert(
            "Accept".to_string(),
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8".to_string(),
        );
        headers.insert("Accept-Language".to_string(), "en-US,en;q=0.9".to_string());
        headers.insert("Upgrade-Insecure-Requests".to_string(), "1".to_string());
        Self { headers }
    }

    /// 模擬頁面內 AJAX 呼叫的標頭
    pub fn api_default(referer: &str) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("User-Agent".to_string(), BROWSER_USER_AGENT.to_string());
        headers.insert(
            "Accept".to_string(),
            "application/json, text/javascript, */*; q=0.01".to_string(),
        );
        headers.insert("Accept-Language".to_string(), "en-US,en;q=0.9".to_string());
        headers.insert("Referer".to_string(), referer.to_string());
        headers.insert("X-Requested-With".to_string(), "XMLHttpRequest".to_string());
        headers.insert("Sec-Fetch-Dest".to_string(), "empty".to_string());
        headers.insert("Sec-Fetch-Mode".to_string(), "cors".to_string());
        headers.insert("Sec-Fetch-Site".to_string(), "same-origin".to_string());
        Self { headers }
    }

    /// 以設定檔中的值覆蓋預設值，標頭名稱不分大小寫
    pub fn merged_with(mut self, overrides: &BTreeMap<String, String>) -> Self {
        for (key, value) in overrides {
            self.headers
                .retain(|existing, _| !existing.eq_ignore_ascii_case(key));
            self.headers.insert(key.clone(), value.clone());
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn to_header_map(&self) -> Result<HeaderMap> {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (key, value) in &self.headers {
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                TenderError::InvalidConfigValueError {
                    field: "headers".to_string(),
                    value: key.clone(),
                    reason: format!("Invalid header name: {}", e),
                }
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                TenderError::InvalidConfigValueError {
                    field: format!("headers.{}", key),
                    value: value.clone(),
                    reason: format!("Invalid header value: {}", e),
                }
            })?;
            map.insert(name, value);
        }
        Ok(map)
    }
}

/// 建立帶 cookie jar 與逾時的 client，每次抓取使用新的 client 以取得新的 session
pub fn build_session_client(timeout: Duration, connect_timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .cookie_store(true)
        .timeout(timeout)
        .connect_timeout(connect_timeout)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_profile_mimics_xhr() {
        let profile = HeaderProfile::api_default("https://tenders.etimad.sa/Tender/AllTendersForVisitor");
        assert_eq!(profile.get("x-requested-with"), Some("XMLHttpRequest"));
        assert_eq!(
            profile.get("Referer"),
            Some("https://tenders.etimad.sa/Tender/AllTendersForVisitor")
        );
        assert!(profile.get("Host").is_none());
        assert!(profile.to_header_map().is_ok());
    }

    #[test]
    fn test_overrides_replace_defaults() {
        let mut overrides = BTreeMap::new();
        overrides.insert("User-Agent".to_string(), "tender-watch/0.1".to_string());
        overrides.insert("X-Debug".to_string(), "1".to_string());

        let profile = HeaderProfile::landing_default().merged_with(&overrides);
        assert_eq!(profile.get("user-agent"), Some("tender-watch/0.1"));
        assert_eq!(profile.get("X-Debug"), Some("1"));

        let mut lowercase = BTreeMap::new();
        lowercase.insert("accept-language".to_string(), "ar".to_string());
        let profile = HeaderProfile::landing_default().merged_with(&lowercase);
        assert_eq!(profile.len(), HeaderProfile::landing_default().len());
        assert_eq!(profile.get("Accept-Language"), Some("ar"));
    }

    #[test]
    fn test_invalid_header_value_is_config_error() {
        let mut headers = BTreeMap::new();
        headers.insert("Referer".to_string(), "bad\nvalue".to_string());
        let err = HeaderProfile::new(headers).to_header_map().unwrap_err();
        assert!(matches!(err, TenderError::InvalidConfigValueError { .. }));
    }
}
