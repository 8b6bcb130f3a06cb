use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use eventfeed_calendar::{FeedCache, FeedService, QueryParams};
use eventfeed_core::{AppError, Config, Credentials};

#[derive(Debug, Parser)]
#[command(name = "eventfeed", version, about = "Cached feed of upcoming Planning Center events")]
struct Cli {
    /// Path to config.toml (defaults to the user config directory)
    #[arg(long, global = true, env = "EVENTFEED_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the feed envelope as JSON
    Feed {
        /// Number of upcoming occurrences (ignored with --id)
        #[arg(long)]
        limit: Option<String>,

        /// Fetch a single occurrence by id
        #[arg(long)]
        id: Option<String>,

        /// Extra query parameter, as key=value (repeatable)
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// Skip the tag taxonomy fetch
        #[arg(long)]
        no_tags: bool,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Verify credentials and connectivity with a small fetch
    Check,
    /// List tag groups and their member tag ids
    TagGroups,
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {:?}", raw))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let dotenv = dotenvy::dotenv().ok();
    eventfeed_core::init()?;
    if let Some(path) = dotenv {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    let cli = Cli::parse();
    let (config, _) = Config::load_validated(cli.config.as_deref())?;

    let credentials = match Credentials::from_env() {
        Ok(creds) => Some(creds),
        Err(e) => {
            tracing::error!("{}", e);
            None
        }
    };

    let cache = Arc::new(FeedCache::with_capacity(
        Duration::from_secs(config.cache.ttl_secs),
        config.cache.max_entries,
    ));
    let service = FeedService::from_config(&config, credentials, cache)
        .context("Failed to build feed service")?;

    match cli.command {
        Command::Feed {
            limit,
            id,
            params,
            no_tags,
            pretty,
        } => {
            let mut query = QueryParams::from_pairs(params);
            if let Some(limit) = limit {
                query.insert("limit", &limit);
            }
            if let Some(id) = id {
                query.insert("id", &id);
            }
            let service = if no_tags {
                service.with_tag_enrichment(false)
            } else {
                service
            };
            feed(&service, &query, pretty).await
        }
        Command::Check => check(&service).await,
        Command::TagGroups => tag_groups(&service).await,
    }
}

async fn feed(service: &FeedService, query: &QueryParams, pretty: bool) -> Result<ExitCode> {
    let (body, code) = match service.get_feed(query, chrono::Utc::now()).await {
        Ok(response) => (serde_json::to_value(&response)?, ExitCode::SUCCESS),
        Err(e) => {
            tracing::error!("Error fetching feed: {}", e);
            (serde_json::to_value(e.error_body())?, ExitCode::FAILURE)
        }
    };

    let output = if pretty {
        serde_json::to_string_pretty(&body)?
    } else {
        serde_json::to_string(&body)?
    };
    println!("{}", output);
    Ok(code)
}

async fn check(service: &FeedService) -> Result<ExitCode> {
    println!("Testing connection to Planning Center...");

    let query = QueryParams::new().with("limit", "2");
    match service.get_feed(&query, chrono::Utc::now()).await {
        Ok(response) => {
            println!("SUCCESS: Fetched {} events.", response.events.len());
            match response.events.first() {
                Some(event) => println!("Sample event: {}", event.title),
                None => println!("No upcoming events found (but connection worked)."),
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            let err = AppError::from(e);
            if err.is_config() {
                println!("FAIL: Missing credentials. Set PC_APP_ID and PC_SECRET (or a .env file).");
            } else {
                println!("FAIL: Planning Center error: {}", err);
            }
            println!("{}", err.user_message());
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn tag_groups(service: &FeedService) -> Result<ExitCode> {
    let Some(client) = service.client() else {
        println!("Missing credentials");
        return Ok(ExitCode::FAILURE);
    };

    let groups = client
        .fetch_tag_taxonomy()
        .await
        .context("Failed to fetch tag groups")?;

    println!("Found {} tag groups.", groups.len());
    for group in &groups {
        println!(
            "Group: {} (ID: {}) tags: [{}]",
            group.name,
            group.id,
            group.tag_ids.join(", ")
        );
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param() {
        assert_eq!(
            parse_param("campus=north").unwrap(),
            ("campus".to_string(), "north".to_string())
        );
        assert!(parse_param("campus").is_err());
    }

    #[test]
    fn test_cli_parses_feed_flags() {
        let cli = Cli::try_parse_from([
            "eventfeed", "feed", "--limit", "5", "--no-tags", "--param", "campus=north",
        ])
        .unwrap();

        match cli.command {
            Command::Feed {
                limit,
                no_tags,
                params,
                ..
            } => {
                assert_eq!(limit.as_deref(), Some("5"));
                assert!(no_tags);
                assert_eq!(params, vec![("campus".to_string(), "north".to_string())]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
