use clap::Parser;
use tender_watch::utils::error::ErrorSeverity;
use tender_watch::utils::{logger, validation::Validate};
use tender_watch::{
    AlertEngine, AlertPipeline, LocalStorage, RunSummary, TenderFetcher, TenderWatchConfig,
};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "tender-watch")]
#[command(about = "Fetch current tenders and write per-receiver alert digests")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "tender-watch.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Emit JSON logs instead of the compact console format
    #[arg(long)]
    json_logs: bool,

    /// Dry run - show the alerts and source settings without fetching
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // 載入 TOML 配置 (日誌格式可能由設定檔決定，所以先載入)
    let config = match TenderWatchConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 初始化日誌
    if args.json_logs || config.json_logs() {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("🚀 Starting tender-watch");
    tracing::info!("📁 Configuration loaded from: {}", args.config);

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Configuration loaded and validated successfully");
    display_config_summary(&config, &args);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No requests will be sent");
        perform_dry_run(&config);
        return Ok(());
    }

    if config.alerts.is_empty() {
        tracing::warn!("⚠️ No [[alerts]] configured, nothing to do");
        return Ok(());
    }

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    // Ctrl+C 取消抓取，等待中的延遲會立即結束
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("🛑 Interrupt received, cancelling fetch");
            signal_token.cancel();
        }
    });

    let settings = config.fetcher_settings();
    let detail_base_url = settings.base_url.clone();
    let fetcher = TenderFetcher::new(settings).with_cancellation(cancel);

    let output_formats = config.output_formats()?;
    let storage = LocalStorage::new(config.output_path().to_string());
    let pipeline = AlertPipeline::new(storage, fetcher, config.matcher(), config.alerts.clone())
        .with_formats(output_formats)
        .with_detail_base_url(detail_base_url);

    let engine = AlertEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(summary) => {
            print_run_summary(&summary, config.output_path());
            if summary.failed_receivers() > 0 {
                tracing::warn!(
                    "⚠️ {} receiver digest(s) could not be written",
                    summary.failed_receivers()
                );
                std::process::exit(2);
            }
        }
        Err(e) => {
            // 記錄詳細錯誤信息
            tracing::error!(
                "❌ Tender alert run failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,      // 取消或可略過的資料問題
                ErrorSeverity::Medium => 2,   // 稍後重試
                ErrorSeverity::High => 1,     // 上游或資料錯誤
                ErrorSeverity::Critical => 3, // 設定或系統錯誤
            };

            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn display_config_summary(config: &TenderWatchConfig, args: &Args) {
    let settings = config.fetcher_settings();

    println!("📋 Configuration Summary:");
    println!("  Source: {}", settings.api_url());
    println!("  Fetch Window: {} days", settings.window_days);
    println!("  Match Window: {} days", config.match_window_days());
    println!("  Alerts: {}", config.alerts.len());
    println!("  Output: {}", config.output_path());

    if let Some(max_pages) = settings.max_pages {
        println!("  Max Pages: {}", max_pages);
    }
    if settings.allow_synthetic_fallback {
        println!("  ⚠️ Synthetic fallback ENABLED");
    }
    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}

fn perform_dry_run(config: &TenderWatchConfig) {
    let settings = config.fetcher_settings();

    println!("🔍 Dry Run Analysis:");
    println!();

    println!("📡 Data Source Analysis:");
    println!("  Landing: {}", settings.landing_url());
    println!("  API: {}", settings.api_url());
    println!(
        "  PublishDateId: {}, PageSize: {}",
        settings.publish_date_id, settings.page_size
    );
    println!(
        "  Headers: {} landing, {} api",
        settings.landing_headers.len(),
        settings.api_headers.len()
    );
    println!(
        "  Delays: session {:?}, page {:?}, max attempts {}",
        settings.session_delay, settings.page_delay, settings.retry.max_attempts
    );

    println!();
    println!("🎯 Alerts:");
    for alert in &config.alerts {
        let receivers: Vec<&str> = alert.receivers().collect();
        println!(
            "  [{}] {} -> {}",
            alert.id,
            alert.criteria(),
            receivers.join(", ")
        );
    }

    println!();
    println!("💾 Output Configuration:");
    println!("  Path: {}", config.output_path());
    if let Ok(formats) = config.output_formats() {
        let formats: Vec<String> = formats.iter().map(|f| f.to_string()).collect();
        println!("  Formats: {}", formats.join(", "));
    }

    println!();
    println!("✅ Dry run analysis complete. Use --verbose for more details during actual run.");
}

fn print_run_summary(summary: &RunSummary, output_path: &str) {
    println!("✅ Tender alert run completed");
    if summary.mode.is_degraded() {
        println!("🧪 WARNING: results are based on SYNTHETIC sample data");
    }
    println!(
        "📥 Fetched {} tenders from {} page(s)",
        summary.fetched, summary.pages_fetched
    );
    for alert in &summary.alerts {
        println!("  🎯 {} ({}): {} match(es)", alert.alert_id, alert.criteria, alert.matched);
    }
    for receiver in &summary.receivers {
        match &receiver.error {
            None => println!(
                "  📨 {}: {} tender(s) -> {}",
                receiver.receiver,
                receiver.tenders,
                receiver.files.join(", ")
            ),
            Some(error) => println!("  ❌ {}: {}", receiver.receiver, error),
        }
    }
    println!("📁 Output saved to: {}", output_path);
}
