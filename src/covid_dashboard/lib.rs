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

//! Interactive COVID-19 situation report dashboard
//!
//! ## Features
//!
//! `covid_dashboard` fetches the [CSSE COVID-19] global time series for confirmed cases, deaths,
//! and recoveries, reshapes them from one column per date into one row per date, and persists
//! them as flat CSV files. It then serves a single page with a region selector. Each selection
//! recomputes the following metrics for the chosen province or state and draws them as a two
//! panel chart.
//!
//! * `active` - Confirmed cases minus recoveries and deaths.
//! * `new_cases` - Confirmed cases minus the confirmed cases of the previous date.
//! * `growth` - Confirmed cases divided by the confirmed cases of the previous date.
//! * `growth_factor` - New cases divided by the new cases of the previous date.
//! * `death_rate` - Deaths divided by recoveries plus deaths.
//! * `recovery_rate` - Recoveries divided by recoveries plus deaths.
//!
//! Metrics that have no previous date, or dates missing from one of the series, are left
//! undefined and show up as gaps in the chart.
//!
//! [CSSE COVID-19]: https://github.com/CSSEGISandData/COVID-19
//!
//! ## Build
//!
//! `covid_dashboard` is a Rust program and must be built from source using a
//! [Rust toolchain](https://rustup.rs/).
//!
//! ```text
//! git clone git@github.com:56quarters/covid_dashboard.git && cd covid_dashboard
//! cargo build --release
//! ```
//!
//! ## Usage
//!
//! On startup all three series are downloaded and written to `confirmed.csv`, `deaths.csv`,
//! and `recovered.csv` in the data directory, overwriting any existing files. Any failure to
//! download or parse a series aborts startup. By default the selector lists the states of
//! Australia with South Australia selected.
//!
//! ```text
//! ./covid_dashboard --data-dir /var/lib/covid_dashboard
//! ```
//!
//! The dashboard is served on port `8050` at `/`. Metrics about the dashboard itself are
//! available at `/metrics`.
//!

pub mod client;
pub mod derive;
pub mod http;
pub mod ingest;
pub mod metrics;
pub mod report;
pub mod table;
