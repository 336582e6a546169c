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

use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, Response, StatusCode, Url};
use std::error;
use std::fmt;

/// Location of the CSSE global time series CSV files.
pub const DEFAULT_DATA_URL: &str =
    "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/";

/// One of the three cumulative time series published by CSSE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Series {
    Confirmed,
    Deaths,
    Recovered,
}

impl Series {
    /// All series, in the order they are ingested.
    pub const ALL: [Series; 3] = [Series::Confirmed, Series::Deaths, Series::Recovered];

    /// Name of the series, also used as the value column name in flat files.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Deaths => "deaths",
            Self::Recovered => "recovered",
        }
    }

    /// Name of the remote CSV resource for this series
    pub fn resource(&self) -> String {
        format!("time_series_covid19_{}_global.csv", self.name())
    }

    /// Name of the local flat file this series is persisted to
    pub fn file_name(&self) -> String {
        format!("{}.csv", self.name())
    }
}

impl fmt::Display for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug)]
pub enum ClientError {
    Internal(reqwest::Error),
    InvalidUrl(String),
    NotFound(Url),
    Unexpected(StatusCode, Url),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal(e) => write!(f, "{}", e),
            Self::InvalidUrl(msg) => write!(f, "invalid data URL: {}", msg),
            Self::NotFound(url) => write!(f, "no time series at {}", url),
            Self::Unexpected(status, url) => write!(f, "unexpected status {} for {}", status, url),
        }
    }
}

impl error::Error for ClientError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Internal(e) => Some(e),
            _ => None,
        }
    }
}

/// Client for fetching raw wide-format time series CSV files over HTTP.
#[derive(Debug)]
pub struct TimeSeriesClient {
    client: Client,
    base_url: Url,
}

impl TimeSeriesClient {
    const USER_AGENT: &'static str = "COVID-19 Dashboard (https://github.com/56quarters/covid_dashboard)";
    const CSV_RESPONSE: &'static str = "text/csv, text/plain";

    pub fn new(client: Client, base_url: &str) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }

        Ok(TimeSeriesClient { client, base_url })
    }

    /// Fetch the full wide-format CSV text of a series.
    pub async fn fetch(&self, series: Series) -> Result<String, ClientError> {
        let request_url = self.url(series);
        tracing::debug!(message = "making time series request", series = %series, url = %request_url);

        let res = self.make_request(request_url).await?;
        res.text().await.map_err(ClientError::Internal)
    }

    async fn make_request(&self, url: Url) -> Result<Response, ClientError> {
        let res = self
            .client
            .get(url.clone())
            .header(USER_AGENT, Self::USER_AGENT)
            .header(ACCEPT, Self::CSV_RESPONSE)
            .send()
            .await
            .map_err(ClientError::Internal)?;

        let status = res.status();
        if status == StatusCode::OK {
            Ok(res)
        } else if status == StatusCode::NOT_FOUND {
            Err(ClientError::NotFound(url))
        } else {
            Err(ClientError::Unexpected(status, url))
        }
    }

    /// URL of the remote resource for a series, relative to the base URL.
    pub fn url(&self, series: Series) -> Url {
        let mut url = self.base_url.clone();
        // Only fails for cannot-be-a-base URLs which are rejected in `new`
        if let Ok(mut p) = url.path_segments_mut() {
            p.pop_if_empty().push(&series.resource());
        }

        url
    }
}
