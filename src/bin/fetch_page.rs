use anyhow::Context;
use clap::Parser;
use tender_watch::utils::{logger, validation::Validate};
use tender_watch::{Tender, TenderFetcher, TenderWatchConfig};

#[derive(Parser)]
#[command(name = "fetch-page")]
#[command(about = "Fetch a single page of tenders and print it as a table")]
struct Args {
    /// Page number to fetch (1-based)
    #[arg(short, long, default_value_t = 1)]
    page: u32,

    /// Optional TOML configuration file; defaults are used when omitted
    #[arg(short, long)]
    config: Option<String>,

    /// Override source.base_url
    #[arg(long)]
    base_url: Option<String>,

    /// Skip the session and retry delays
    #[arg(long)]
    no_delay: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    let mut config = match &args.config {
        Some(path) => TenderWatchConfig::from_file(path)
            .with_context(|| format!("Failed to load config file '{}'", path))?,
        None => TenderWatchConfig::default(),
    };
    if let Some(base_url) = args.base_url {
        config.source.base_url = Some(base_url);
    }
    config.validate().context("Configuration validation failed")?;

    let mut settings = config.fetcher_settings();
    if args.no_delay {
        settings = settings.without_delays();
    }

    let fetcher = TenderFetcher::new(settings);
    let tenders = fetcher
        .fetch_page(args.page)
        .await
        .with_context(|| format!("Failed to fetch page {}", args.page))?;

    print_table(args.page, &tenders);
    Ok(())
}

fn print_table(page: u32, tenders: &[Tender]) {
    println!("📄 Page {}: {} tender(s)", page, tenders.len());
    println!();
    println!(
        "{:<10} {:<20} {:<40} {:<30} {:<30}",
        "ID", "Submitted", "Name", "Agency", "Activity"
    );
    println!("{}", "-".repeat(134));

    for tender in tenders {
        println!(
            "{:<10} {:<20} {:<40} {:<30} {:<30}",
            clip(&tender.display_id(), 10),
            clip(tender.display_submission_date(), 20),
            clip(tender.display_name(), 40),
            clip(tender.display_agency(), 30),
            clip(tender.display_activity(), 30),
        );
    }
}

/// 依字元數截斷 (名稱多為阿拉伯文，不能用 byte 切)
fn clip(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        value.to_string()
    } else {
        let mut clipped: String = value.chars().take(width.saturating_sub(1)).collect();
        clipped.push('…');
        clipped
    }
}
