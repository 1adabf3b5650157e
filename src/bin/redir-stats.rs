use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use redir_stats::analytics::models::DAY_FORMAT;
use redir_stats::analytics::{
    parse_day, Classification, DateRange, RankedEntry, SeriesCategory, UserAgentClassifier,
};
use redir_stats::config::Config;
use redir_stats::controller::{ControllerOptions, StatsController, StatsSnapshot};
use redir_stats::source::{HttpStatsSource, StatsSource};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "redir-stats")]
#[command(about = "Visit statistics for short-link aliases", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the visit report of an alias
    Report {
        /// Short-link alias
        alias: String,
        /// First day of the range (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,
        /// Last day of the range (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,
        /// Print the chart data as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show how a user-agent string is classified
    Classify {
        /// Raw user-agent string
        ua: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Report {
            alias,
            from,
            to,
            json,
        } => {
            let config = Config::from_env()?;
            let range = resolve_range(from.as_deref(), to.as_deref(), config.stats.range_days)?;

            let source: Arc<dyn StatsSource> =
                Arc::new(HttpStatsSource::new(&config.stats.endpoint)?);
            let options = ControllerOptions {
                classifier: UserAgentClassifier::default(),
                tie_break: config.stats.tie_break,
            };

            let controller = StatsController::spawn(alias, source, options, range);
            let snapshot = controller.settled().await;
            controller.shutdown();

            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                print_report(&snapshot);
            }
        }
        Commands::Classify { ua } => match UserAgentClassifier::default().classify(&ua) {
            Classification::Excluded => println!("⚠ Excluded (bot or unknown agent)"),
            Classification::Agent(agent) => {
                println!("Browser: {}", agent.browser);
                println!("OS:      {}", agent.os);
            }
        },
    }

    Ok(())
}

fn resolve_range(from: Option<&str>, to: Option<&str>, range_days: u32) -> Result<DateRange> {
    let default = DateRange::trailing(range_days, Local::now().date_naive());

    let start = match from {
        Some(day) => parse_day(day).context("invalid --from date")?,
        None => default.start,
    };
    let end = match to {
        Some(day) => parse_day(day).context("invalid --to date")?,
        None => default.end,
    };

    Ok(DateRange::new(start, end))
}

fn print_report(snapshot: &StatsSnapshot) {
    println!("Visitors of '{}' ({})", snapshot.alias, snapshot.range);
    println!("{:<12} {:>10} {:>10}", "Day", "PV", "UV");
    println!("{}", "-".repeat(34));

    let pv = snapshot
        .timeline
        .iter()
        .filter(|p| p.category == SeriesCategory::Pv);
    let uv = snapshot
        .timeline
        .iter()
        .filter(|p| p.category == SeriesCategory::Uv);
    for (pv, uv) in pv.zip(uv) {
        println!(
            "{:<12} {:>10} {:>10}",
            pv.time.format(DAY_FORMAT).to_string(),
            pv.value,
            uv.value
        );
    }

    print_ranking("Referrers", &snapshot.referrers);
    print_ranking("Browsers", &snapshot.browsers);
    print_ranking("Devices", &snapshot.devices);
}

fn print_ranking(title: &str, entries: &[RankedEntry]) {
    println!();
    println!("{}:", title);
    if entries.is_empty() {
        println!("  No data.");
        return;
    }
    for entry in entries {
        println!("  {:<60} {:>10}", entry.name, entry.value);
    }
}
