use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use civic_common::{parse_datetime, Address, Config, EventRange, Locality, Proposal};
use civic_scout::{refresh_all, CivicEngine, ScoutDeps};
use civic_store::PgStore;

#[derive(Parser)]
#[command(name = "civic-scout", about = "Aggregate local civic events, bills and representatives")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest events and bills for an address from every source
    Ingest(AddressArgs),
    /// Representatives for an address, served from cache when fresh
    Reps {
        #[command(flatten)]
        address: AddressArgs,
        /// Skip the cache and synthesize from live sources
        #[arg(long)]
        live: bool,
    },
    /// Stored events within a date range
    Events {
        /// Defaults to today 00:00 UTC
        #[arg(long, value_parser = parse_date)]
        start: Option<DateTime<Utc>>,
        #[arg(long, value_parser = parse_date)]
        end: Option<DateTime<Utc>>,
    },
    /// One stored event by unique id
    Event { id: String },
    /// Find and store community events for a city from web search only
    Discover {
        #[arg(long)]
        city: String,
        #[arg(long)]
        state: String,
    },
    /// Add a locality to the refresh list
    Register(AddressArgs),
    /// Refresh every registered locality
    Refresh {
        /// Keep running, refreshing on this interval
        #[arg(long)]
        every_hours: Option<u64>,
    },
    /// Record a community proposal
    Propose {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        creator: String,
    },
    /// List proposals, most supported first
    Proposals,
}

#[derive(Args)]
struct AddressArgs {
    #[arg(long, default_value = "")]
    street: String,
    #[arg(long)]
    city: String,
    #[arg(long)]
    state: String,
    #[arg(long, default_value = "")]
    zip: String,
}

impl AddressArgs {
    fn address(&self) -> Address {
        Address::new(&self.street, &self.city, &self.state, &self.zip)
    }

    fn locality(&self) -> Locality {
        let optional = |s: &str| {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        };
        Locality {
            city: self.city.trim().to_string(),
            state: self.state.trim().to_string(),
            zip: optional(&self.zip),
            street: optional(&self.street),
        }
    }
}

fn parse_date(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    parse_datetime(raw).ok_or_else(|| format!("not a date: {raw}"))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("civic_scout=info".parse()?))
        .init();

    let cli = Cli::parse();

    let config = Config::from_env()?;
    config.log_redacted();

    let store = Arc::new(
        PgStore::connect(&config.database_url)
            .await
            .context("Failed to connect to Postgres")?,
    );
    store.migrate().await?;

    let engine = CivicEngine::new(ScoutDeps::from_config(&config, store.clone()));

    match cli.command {
        Command::Ingest(args) => {
            let stats = engine.ingest_all_sources(&args.address()).await?;
            print_json(&stats)?;
        }
        Command::Reps { address, live } => {
            let address = address.address();
            let reps = if live {
                engine.fetch_and_synthesize_reps(&address).await?
            } else {
                engine.reps_for_address(&address).await?
            };
            print_json(&reps)?;
        }
        Command::Events { start, end } => {
            let events = engine.list_events(&EventRange { start, end }).await?;
            print_json(&events)?;
        }
        Command::Event { id } => match engine.event_detail(&id).await? {
            Some(event) => print_json(&event)?,
            None => anyhow::bail!("Event not found: {id}"),
        },
        Command::Discover { city, state } => {
            let entries = engine.ingest_community_events(&city, &state).await?;
            let events: Vec<_> = entries.iter().map(civic_scout::format_event).collect();
            print_json(&events)?;
        }
        Command::Register(args) => {
            let locality = args.locality();
            if store.register_locality(&locality).await? {
                info!(city = locality.city.as_str(), state = locality.state.as_str(), "Registered locality");
            } else {
                info!(city = locality.city.as_str(), state = locality.state.as_str(), "Locality already registered");
            }
        }
        Command::Refresh { every_hours: None } => {
            let report = refresh_all(&engine, store.as_ref()).await?;
            print_json(&report)?;
        }
        Command::Refresh {
            every_hours: Some(hours),
        } => {
            let period = Duration::from_secs(hours.max(1) * 3600);
            info!(every_hours = hours.max(1), "Starting scheduled refresh");
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                if let Err(e) = refresh_all(&engine, store.as_ref()).await {
                    warn!(error = %e, "Scheduled refresh failed");
                }
            }
        }
        Command::Propose {
            title,
            description,
            category,
            creator,
        } => {
            let proposal = Proposal::new(title, description, category, creator);
            store.append_proposal(&proposal).await?;
            print_json(&proposal)?;
        }
        Command::Proposals => {
            print_json(&store.list_proposals().await?)?;
        }
    }

    Ok(())
}
