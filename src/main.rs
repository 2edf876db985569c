//! Diagnostic CLI: resolve one IP address from the command line.
//!
//! This is a thin wrapper around the `geolocate` library, standing in for
//! the CMS host: it assembles a [`GeoConfig`] from flags, builds the shared
//! HTTP client, and prints the lookup outcome as JSON.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};

use geolocate::config::HTTP_TIMEOUT;
use geolocate::{GeoConfig, GeoService, LookupOutcome, MemoryStore, Resolver, ServiceConfig};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ServiceArg {
    None,
    Ipstack,
    MaxmindLite,
    Maxmind,
}

#[derive(Debug, Parser)]
#[command(name = "geolocate", about = "Resolve an IP address to a location")]
struct Cli {
    /// IP address to resolve.
    #[arg(required_unless_present = "list_services")]
    ip: Option<String>,

    /// Geolocation service to use.
    #[arg(long, value_enum, default_value_t = ServiceArg::None)]
    service: ServiceArg,

    /// ipstack API access key (service: ipstack).
    #[arg(long)]
    access_key: Option<String>,

    /// MaxMind account id (service: maxmind).
    #[arg(long)]
    account_id: Option<String>,

    /// MaxMind license key (service: maxmind, or maxmind-lite downloads).
    #[arg(long)]
    license_key: Option<String>,

    /// Preferred language for place names.
    #[arg(long, default_value = "en")]
    locale: String,

    /// Directory holding the local geo database (service: maxmind-lite).
    #[arg(long, default_value = "./storage")]
    storage_dir: PathBuf,

    /// List the selectable service modes and exit.
    #[arg(long)]
    list_services: bool,
}

fn service_config(cli: &Cli) -> Result<ServiceConfig> {
    Ok(match cli.service {
        ServiceArg::None => ServiceConfig::None,
        ServiceArg::Ipstack => ServiceConfig::IpStack {
            access_key: cli
                .access_key
                .clone()
                .context("--access-key is required for the ipstack service")?,
        },
        ServiceArg::Maxmind => match (&cli.account_id, &cli.license_key) {
            (Some(account_id), Some(license_key)) => ServiceConfig::MaxMind {
                account_id: account_id.clone(),
                license_key: license_key.clone(),
            },
            _ => bail!("--account-id and --license-key are required for the maxmind service"),
        },
        ServiceArg::MaxmindLite => ServiceConfig::MaxMindLite {
            license_key: cli.license_key.clone(),
        },
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if cli.list_services {
        for (service, label) in GeoService::options() {
            println!("{:<13} {}", service.as_ref(), label);
        }
        return Ok(());
    }

    let ip = cli.ip.clone().context("an IP address is required")?;

    let config = GeoConfig {
        service: service_config(&cli)?,
        locale: cli.locale.clone(),
        storage_dir: cli.storage_dir.clone(),
        edition_has_geolocation: true,
    };

    let client = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .context("failed to build HTTP client")?;

    let resolver = Resolver::from_config(&config, client, Arc::new(MemoryStore::new()));

    match resolver.lookup(&ip).await? {
        LookupOutcome::Found(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
            println!("address: {}", record.address());
            Ok(())
        }
        LookupOutcome::Absent => {
            println!("no location available for {}", ip);
            Ok(())
        }
        LookupOutcome::NotReady => {
            eprintln!("geo database is downloading; try again shortly");
            process::exit(2);
        }
    }
}
