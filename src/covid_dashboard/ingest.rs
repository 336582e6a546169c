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

use crate::client::{ClientError, Series, TimeSeriesClient};
use crate::table::{self, TableError, WideTable};
use std::error;
use std::fmt;
use std::path::PathBuf;
use tracing::{Instrument, Level};

#[derive(Debug)]
pub enum IngestError {
    Fetch(Series, ClientError),
    Table(Series, TableError),
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch(s, e) => write!(f, "unable to fetch {} series: {}", s, e),
            Self::Table(s, e) => write!(f, "unable to reshape {} series: {}", s, e),
        }
    }
}

impl error::Error for IngestError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Fetch(_, e) => Some(e),
            Self::Table(_, e) => Some(e),
        }
    }
}

/// Fetches raw wide time series and persists them as long form flat files.
///
/// Files are named after the series (`confirmed.csv`, etc.) in the data directory and are
/// overwritten on every run.
#[derive(Debug)]
pub struct Ingestor {
    client: TimeSeriesClient,
    data_dir: PathBuf,
}

impl Ingestor {
    pub fn new<P: Into<PathBuf>>(client: TimeSeriesClient, data_dir: P) -> Self {
        Ingestor {
            client,
            data_dir: data_dir.into(),
        }
    }

    /// Ingest every series in order, stopping at the first failure. Returns the number of
    /// long rows written per series.
    pub async fn ingest_all(&self) -> Result<Vec<(Series, usize)>, IngestError> {
        let mut out = Vec::with_capacity(Series::ALL.len());
        for series in Series::ALL {
            let rows = self
                .ingest(series)
                .instrument(tracing::span!(Level::DEBUG, "ingest", series = %series))
                .await?;
            out.push((series, rows));
        }

        Ok(out)
    }

    /// Fetch, reshape, and write a single series, returning the number of long rows written.
    pub async fn ingest(&self, series: Series) -> Result<usize, IngestError> {
        let text = self
            .client
            .fetch(series)
            .await
            .map_err(|e| IngestError::Fetch(series, e))?;

        let wide = WideTable::parse(&text).map_err(|e| IngestError::Table(series, e))?;
        let records = wide.melt();
        tracing::debug!(
            message = "reshaped time series",
            series = %series,
            locations = wide.rows.len(),
            dates = wide.dates.len(),
            rows = records.len(),
        );

        let mut buf = Vec::new();
        table::write_long(series, &records, &mut buf).map_err(|e| IngestError::Table(series, e))?;

        let path = self.data_dir.join(series.file_name());
        tokio::fs::write(&path, buf)
            .await
            .map_err(|e| IngestError::Table(series, TableError::Io(e)))?;

        tracing::info!(message = "wrote time series", series = %series, path = %path.display(), rows = records.len());
        Ok(records.len())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{IngestError, Ingestor};
    use crate::client::tests::serve;
    use crate::client::{ClientError, Series, TimeSeriesClient};
    use crate::table::{self, TableError};
    use axum::routing::get;
    use axum::Router;
    use reqwest::Client;
    use std::fs::File;

    pub(crate) const CONFIRMED: &str = "\
Province/State,Country/Region,Lat,Long,3/14/20,3/15/20,3/16/20
South Australia,Australia,-34.9285,138.6007,5,12,20
Victoria,Australia,-37.8136,144.9631,49,57,71
,Afghanistan,33.93911,67.709953,11,16,21
";

    pub(crate) const DEATHS: &str = "\
Province/State,Country/Region,Lat,Long,3/14/20,3/15/20,3/16/20
South Australia,Australia,-34.9285,138.6007,0,1,1
Victoria,Australia,-37.8136,144.9631,0,0,1
,Afghanistan,33.93911,67.709953,0,0,0
";

    pub(crate) const RECOVERED: &str = "\
Province/State,Country/Region,Lat,Long,3/14/20,3/15/20,3/16/20
South Australia,Australia,-34.9285,138.6007,0,2,5
Victoria,Australia,-37.8136,144.9631,8,8,10
,Afghanistan,33.93911,67.709953,0,0,1
";

    pub(crate) fn source_router() -> Router {
        Router::new()
            .route("/time_series_covid19_confirmed_global.csv", get(|| async { CONFIRMED }))
            .route("/time_series_covid19_deaths_global.csv", get(|| async { DEATHS }))
            .route("/time_series_covid19_recovered_global.csv", get(|| async { RECOVERED }))
    }

    /// Ingest the sample series above into the given directory.
    pub(crate) async fn ingest_samples(dir: &std::path::Path) {
        let addr = serve(source_router()).await;
        let client = TimeSeriesClient::new(Client::new(), &format!("http://{}/", addr)).unwrap();
        Ingestor::new(client, dir).ingest_all().await.unwrap();
    }

    #[tokio::test]
    async fn test_ingest_all_writes_files() {
        let addr = serve(source_router()).await;
        let dir = tempfile::tempdir().unwrap();
        let client = TimeSeriesClient::new(Client::new(), &format!("http://{}/", addr)).unwrap();
        let ingestor = Ingestor::new(client, dir.path());

        let counts = ingestor.ingest_all().await.unwrap();
        assert_eq!(
            vec![(Series::Confirmed, 9), (Series::Deaths, 9), (Series::Recovered, 9)],
            counts
        );

        for series in Series::ALL {
            let file = File::open(dir.path().join(series.file_name())).unwrap();
            let records = table::read_long(series, file).unwrap();
            assert_eq!(9, records.len());
        }
    }

    #[tokio::test]
    async fn test_ingest_overwrites_existing_file() {
        let addr = serve(source_router()).await;
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("confirmed.csv"), "stale").unwrap();

        let client = TimeSeriesClient::new(Client::new(), &format!("http://{}/", addr)).unwrap();
        Ingestor::new(client, dir.path()).ingest(Series::Confirmed).await.unwrap();

        let contents = std::fs::read_to_string(dir.path().join("confirmed.csv")).unwrap();
        assert!(contents.starts_with("Province/State,Country/Region,Lat,Long,date,confirmed"));
    }

    #[tokio::test]
    async fn test_ingest_all_stops_at_missing_series() {
        let router = Router::new().route("/time_series_covid19_confirmed_global.csv", get(|| async { CONFIRMED }));
        let addr = serve(router).await;
        let dir = tempfile::tempdir().unwrap();

        let client = TimeSeriesClient::new(Client::new(), &format!("http://{}/", addr)).unwrap();
        let res = Ingestor::new(client, dir.path()).ingest_all().await;

        assert!(matches!(res, Err(IngestError::Fetch(Series::Deaths, ClientError::NotFound(_)))));
        assert!(!dir.path().join("deaths.csv").exists());
        assert!(!dir.path().join("recovered.csv").exists());
    }

    #[tokio::test]
    async fn test_ingest_malformed_date_writes_nothing() {
        let router = Router::new().route(
            "/time_series_covid19_confirmed_global.csv",
            get(|| async { "Province/State,Country/Region,Lat,Long,13/45/20\nA,B,1,2,3\n" }),
        );
        let addr = serve(router).await;
        let dir = tempfile::tempdir().unwrap();

        let client = TimeSeriesClient::new(Client::new(), &format!("http://{}/", addr)).unwrap();
        let res = Ingestor::new(client, dir.path()).ingest(Series::Confirmed).await;

        assert!(matches!(res, Err(IngestError::Table(_, TableError::InvalidDate(_)))));
        assert!(!dir.path().join("confirmed.csv").exists());
    }
}
