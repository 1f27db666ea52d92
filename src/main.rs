use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod analytics;
mod cache;
mod config;
mod dashboard;
mod db;
mod error;
mod geo;
mod models;
mod report;
mod session;
mod trends;
mod upstream;

use analytics::AnalyticsEngine;
use config::Config;
use dashboard::{Dashboard, Source};
use db::{KeyValueStore, MemoryStore, SqliteStore};
use models::{MatchCandidate, ProducerRecord};
use session::{SessionFlags, SessionRestorer, Watchlist};
use trends::TimeRange;
use upstream::LocalBackend;

#[derive(Parser)]
#[command(name = "carbonflow-analytics")]
#[command(about = "Analytics and cached match reports for the carbon marketplace", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the local cache store
    InitDb,
    /// Compute the analytics snapshot
    Analytics {
        #[arg(long, default_value = "7d")]
        range: TimeRange,
        /// Write the JSON export document, to carbon-analytics-<date>.json unless a path is given
        #[arg(long, num_args = 0..=1, value_name = "PATH")]
        export: Option<Option<PathBuf>>,
        /// Write a markdown report here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Rank matches for a producer
    Matches {
        #[arg(long)]
        producer: String,
    },
    /// Impact report for a producer and one of its matches
    Report {
        #[arg(long)]
        producer: String,
        #[arg(long)]
        counterpart: String,
    },
    /// Show the last analysis without contacting the backend
    Restore,
    /// Add a match to the watchlist
    Watch {
        #[arg(long)]
        producer: String,
        #[arg(long)]
        counterpart: String,
    },
    /// Remove a match from the watchlist
    Unwatch {
        #[arg(long)]
        counterpart: String,
    },
    /// List the watchlist
    Watchlist,
    /// Drop cached reports and analyses
    ClearCache {
        /// Only drop the report for this producer/counterpart pair
        #[arg(long, num_args = 2, value_names = ["PRODUCER", "COUNTERPART"])]
        pair: Option<Vec<String>>,
        /// Only drop the analysis for this producer
        #[arg(long)]
        producer: Option<String>,
    },
}

fn source_label(source: Source) -> &'static str {
    match source {
        Source::Cache => "cached",
        Source::Upstream => "fresh",
        Source::Fallback => "offline estimate",
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "carbonflow_analytics=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let store: Arc<dyn KeyValueStore> = Arc::new(
        SqliteStore::open(&config.store_path)
            .await
            .with_context(|| format!("failed to open store at {}", config.store_path.display()))?,
    );
    let session_store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());

    let (reports, analyses) = dashboard::caches(store.clone());
    let dashboard = Dashboard::new(
        LocalBackend::new(&config.data_path),
        reports,
        analyses,
        config.upstream_timeout,
    );

    if let Some(hint) = SessionFlags::new(session_store).welcome().await? {
        eprintln!("{hint}");
    }

    match cli.command {
        Commands::InitDb => {
            println!("Store ready at {}.", config.store_path.display());
        }
        Commands::Analytics { range, export, out } => {
            let mut engine: AnalyticsEngine = AnalyticsEngine::default();
            let (_, snapshot) = dashboard.load_analytics(&mut engine, range).await;

            if let Some(path) = export {
                let now = chrono::Utc::now();
                let path = path.unwrap_or_else(|| PathBuf::from(report::export_file_name(now)));
                let doc = report::export_document(&snapshot, range, now);
                let body = serde_json::to_string_pretty(&doc)?;
                std::fs::write(&path, body)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("Export written to {}.", path.display());
            }

            let rendered = report::build_report(&snapshot, range);
            match out {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Report written to {}.", path.display());
                }
                None => print!("{rendered}"),
            }
        }
        Commands::Matches { producer } => {
            let served = dashboard
                .matches_for(&producer)
                .await?
                .with_context(|| format!("unknown producer '{producer}'"))?;

            println!(
                "{} ({})",
                served.value.overall_summary,
                source_label(served.source)
            );
            for ranked in &served.value.ranked_matches {
                println!(
                    "- #{} {} ({} km)",
                    ranked["analysis"]["rank"],
                    ranked["name"].as_str().unwrap_or("unnamed"),
                    ranked["distance_km"]
                );
            }
        }
        Commands::Report {
            producer,
            counterpart,
        } => {
            let served = dashboard
                .report_for(&producer, &counterpart)
                .await?
                .with_context(|| format!("'{counterpart}' is not a match for '{producer}'"))?;

            println!("Impact report ({}):", source_label(served.source));
            println!("{}", serde_json::to_string_pretty(&served.value)?);
        }
        Commands::Restore => {
            let restorer = SessionRestorer::new(dashboard.analyses().clone());
            match restorer.restore_session().await? {
                Some(session) => {
                    println!(
                        "Last analysis for {}: {}",
                        session.producer.name, session.analysis.overall_summary
                    );
                    for ranked in &session.analysis.ranked_matches {
                        println!("- {}", ranked["name"].as_str().unwrap_or("unnamed"));
                    }
                }
                None => println!("No previous analysis to restore."),
            }
        }
        Commands::Watch {
            producer,
            counterpart,
        } => {
            let candidate = dashboard
                .counterpart(&producer, &counterpart)
                .await?
                .with_context(|| format!("'{counterpart}' is not a match for '{producer}'"))?;
            let name = candidate.consumer.name.clone();
            if Watchlist::new(store.clone()).add(&candidate).await? {
                println!("{name} has been added to your watchlist.");
            } else {
                println!("{name} is already in your watchlist.");
            }
        }
        Commands::Unwatch { counterpart } => {
            if Watchlist::new(store.clone()).remove(&counterpart).await? {
                println!("{counterpart} removed from your watchlist.");
            } else {
                println!("{counterpart} was not on your watchlist.");
            }
        }
        Commands::Watchlist => {
            let items = Watchlist::new(store.clone()).list().await;
            if items.is_empty() {
                println!("Watchlist is empty.");
            }
            for item in items {
                println!(
                    "- {} ({}, {:.1} km)",
                    item.consumer.name,
                    item.consumer.industry(),
                    item.distance_km
                );
            }
        }
        Commands::ClearCache { pair, producer } => {
            if let Some(ids) = pair.as_deref() {
                let (producer_id, counterpart_id) = (&ids[0], &ids[1]);
                let removed = dashboard
                    .reports()
                    .invalidate(
                        &ProducerRecord::from_id(producer_id),
                        &MatchCandidate::from_id(counterpart_id),
                    )
                    .await?;
                println!("Report for {producer_id}/{counterpart_id} removed: {removed}.");
            }
            if let Some(id) = producer.as_deref() {
                let removed = dashboard
                    .analyses()
                    .invalidate(&ProducerRecord::from_id(id))
                    .await?;
                println!("Analysis for {id} removed: {removed}.");
            }
            if pair.is_none() && producer.is_none() {
                dashboard.reports().clear().await?;
                dashboard.analyses().clear().await?;
                println!("All cached reports and analyses cleared.");
            }
        }
    }

    Ok(())
}
