// covid_dashboard - Interactive COVID-19 situation report dashboard
//
// Copyright 2022 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use clap::Parser;
use covid_dashboard::client::{TimeSeriesClient, DEFAULT_DATA_URL};
use covid_dashboard::http::{Page, RequestContext};
use covid_dashboard::ingest::Ingestor;
use covid_dashboard::metrics::DashboardMetrics;
use covid_dashboard::report;
use prometheus_client::registry::Registry;
use reqwest::Client;
use std::error::Error;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{self, SignalKind};
use tracing::{Instrument, Level};

const DEFAULT_LOG_LEVEL: Level = Level::INFO;
const DEFAULT_BIND_ADDR: ([u8; 4], u16) = ([0, 0, 0, 0], 8050);
const DEFAULT_TIMEOUT_MILLIS: u64 = 30000;
const DEFAULT_DATA_DIR: &str = ".";
const DEFAULT_COUNTRY: &str = "Australia";
const DEFAULT_REGION: &str = "South Australia";
const DEFAULT_TITLE: &str = "How each Australian State are winning Covid-19";

#[derive(Debug, Parser)]
#[clap(name = "covid_dashboard", version = clap::crate_version!())]
struct CovidDashboardApplication {
    /// Base URL of the directory containing the CSSE global time series CSV files
    #[clap(long, default_value_t = DEFAULT_DATA_URL.into())]
    data_url: String,

    /// Directory to write the reshaped time series to. Existing files are overwritten
    /// on every start.
    #[clap(long, default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Country whose provinces or states are offered in the region selector
    #[clap(long, default_value_t = DEFAULT_COUNTRY.into())]
    country: String,

    /// Province or state selected when the page is first loaded
    #[clap(long, default_value_t = DEFAULT_REGION.into())]
    default_region: String,

    /// Heading displayed above the chart
    #[clap(long, default_value_t = DEFAULT_TITLE.into())]
    title: String,

    /// Logging verbosity. Allowed values are 'trace', 'debug', 'info', 'warn', and 'error'
    /// (case insensitive)
    #[clap(long, default_value_t = DEFAULT_LOG_LEVEL)]
    log_level: Level,

    /// Timeout for fetching each time series, in milliseconds.
    #[clap(long, default_value_t = DEFAULT_TIMEOUT_MILLIS)]
    timeout_millis: u64,

    /// Address to bind to. By default, covid_dashboard will bind to public address so
    /// the dashboard can be viewed from other machines.
    #[clap(long, default_value_t = DEFAULT_BIND_ADDR.into())]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let opts = CovidDashboardApplication::parse();
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(opts.log_level)
            .finish(),
    )
    .expect("failed to set tracing subscriber");

    let timeout = Duration::from_millis(opts.timeout_millis);
    let http_client = Client::builder().timeout(timeout).build().unwrap_or_else(|e| {
        tracing::error!(message = "unable to initialize HTTP client", error = %e);
        process::exit(1)
    });

    let client = TimeSeriesClient::new(http_client, &opts.data_url).unwrap_or_else(|e| {
        tracing::error!(message = "invalid data URL", data_url = %opts.data_url, error = %e);
        process::exit(1)
    });

    let mut registry = Registry::default();
    let metrics = DashboardMetrics::new(&mut registry);

    // Fresh data is fetched on every start and there is nothing sensible to serve without
    // it so any failure here is fatal.
    let ingestor = Ingestor::new(client, &opts.data_dir);
    match ingestor
        .ingest_all()
        .instrument(tracing::span!(Level::DEBUG, "ingest_all"))
        .await
    {
        Ok(counts) => {
            metrics.ingested(&counts);
            tracing::info!(message = "ingested time series", data_url = %opts.data_url, data_dir = %opts.data_dir.display());
        }
        Err(e) => {
            tracing::error!(message = "failed to ingest time series", error = %e);
            process::exit(1)
        }
    }

    let regions = report::region_options(&opts.data_dir, &opts.country).unwrap_or_else(|e| {
        tracing::error!(message = "unable to load region options", country = %opts.country, error = %e);
        process::exit(1)
    });

    if !regions.contains(&opts.default_region) {
        tracing::warn!(message = "default region not found", region = %opts.default_region, country = %opts.country);
    }

    let page = Page {
        title: opts.title.clone(),
        regions,
        default_region: opts.default_region.clone(),
    };

    let context = Arc::new(RequestContext::new(&opts.data_dir, page, registry, metrics));
    let app = covid_dashboard::http::app(context);
    let server = axum::Server::try_bind(&opts.bind)
        .unwrap_or_else(|e| {
            tracing::error!(message = "error binding to address", address = %opts.bind, error = %e);
            process::exit(1)
        })
        .serve(app.into_make_service());

    tracing::info!(message = "server started", address = %server.local_addr());

    server
        .with_graceful_shutdown(async {
            // Wait for either SIGTERM or SIGINT to shutdown
            tokio::select! {
                _ = sigterm() => {}
                _ = sigint() => {}
            }
        })
        .await?;

    tracing::info!("server shutdown");
    Ok(())
}

/// Return after the first SIGTERM signal received by this process
async fn sigterm() -> io::Result<()> {
    unix::signal(SignalKind::terminate())?.recv().await;
    Ok(())
}

/// Return after the first SIGINT signal received by this process
async fn sigint() -> io::Result<()> {
    unix::signal(SignalKind::interrupt())?.recv().await;
    Ok(())
}
