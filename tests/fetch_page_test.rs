use httpmock::prelude::*;
use serde_json::json;
use tender_watch::{TenderError, TenderFetcher, TenderWatchConfig};
use tokio_util::sync::CancellationToken;

const API_PATH: &str = "/Tender/AllSupplierTendersForVisitorAsync";

fn config_for(server: &MockServer) -> anyhow::Result<TenderWatchConfig> {
    let config = TenderWatchConfig::from_toml_str(&format!(
        r#"
[source]
base_url = "{}"
page_size = 12

[source.api_headers]
"X-Diagnostic" = "fetch-page"

[fetch]
session_delay_seconds = 0
page_delay_seconds = 0
"#,
        server.base_url()
    ))?;
    Ok(config)
}

#[tokio::test]
async fn test_single_page_uses_publish_date_bucket() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;

    let landing = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/Tender/AllTendersForVisitor")
                .query_param("PageNumber", "1");
            then.status(200).body("<html>landing</html>");
        })
        .await;

    let page = server
        .mock_async(|when, then| {
            when.method(GET)
                .path(API_PATH)
                .query_param("PageNumber", "12")
                .query_param("PageSize", "12")
                .query_param("PublishDateId", "2")
                .header("X-Diagnostic", "fetch-page")
                .header("X-Requested-With", "XMLHttpRequest");
            then.status(200).json_body(json!({
                "data": [
                    {
                        "tenderId": "A-1",
                        "tenderName": "Old but listed",
                        "submitionDate": "2019-01-01T00:00:00"
                    },
                    "not an object",
                    {
                        "tenderId": 2,
                        "tenderName": "Cleaning Services"
                    }
                ]
            }));
        })
        .await;

    let fetcher = TenderFetcher::new(config_for(&server)?.fetcher_settings());
    let progress = fetcher.progress();
    let tenders = fetcher.fetch_page(12).await?;

    landing.assert_hits_async(1).await;
    page.assert_hits_async(1).await;

    // 單頁瀏覽不套用時間視窗
    assert_eq!(tenders.len(), 2);
    assert_eq!(tenders[0].display_id(), "A-1");
    assert_eq!(tenders[1].display_submission_date(), "N/A");
    assert!(progress.is_idle());
    Ok(())
}

#[tokio::test]
async fn test_cancelled_token_stops_before_any_request() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;

    let any_request = server
        .mock_async(|when, then| {
            when.method(GET);
            then.status(200).json_body(json!({ "data": [] }));
        })
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let fetcher =
        TenderFetcher::new(config_for(&server)?.fetcher_settings()).with_cancellation(cancel);
    let err = fetcher
        .fetch_all_tenders()
        .await
        .expect_err("cancelled fetch must fail");

    assert!(matches!(err, TenderError::Cancelled { .. }));
    any_request.assert_hits_async(0).await;
    assert!(fetcher.progress().is_idle());
    Ok(())
}
