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

use crate::client::Series;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
struct SeriesLabels {
    series: String,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
struct RegionLabels {
    region: String,
}

/// Metrics about ingestion and figure rendering of the dashboard itself.
///
/// All metrics are created and registered upon call to `DashboardMetrics::new()` and share
/// the prefix "covid_".
#[derive(Debug)]
pub struct DashboardMetrics {
    ingested_rows: Family<SeriesLabels, Gauge>,
    ingest_timestamp: Gauge,
    figure_renders: Family<RegionLabels, Counter>,
    figure_errors: Counter,
}

impl DashboardMetrics {
    pub fn new(reg: &mut Registry) -> Self {
        let ingested_rows = Family::<SeriesLabels, Gauge>::default();
        let ingest_timestamp = Gauge::default();
        let figure_renders = Family::<RegionLabels, Counter>::default();
        let figure_errors = Counter::default();

        reg.register(
            "covid_ingested_rows",
            "Long form rows written per series at startup",
            ingested_rows.clone(),
        );
        reg.register(
            "covid_ingest_timestamp_seconds",
            "UNIX timestamp of the last successful ingest",
            ingest_timestamp.clone(),
        );
        reg.register(
            "covid_figure_renders",
            "Situation report figures rendered per region",
            figure_renders.clone(),
        );
        reg.register(
            "covid_figure_errors",
            "Situation report figures that could not be rendered",
            figure_errors.clone(),
        );

        Self {
            ingested_rows,
            ingest_timestamp,
            figure_renders,
            figure_errors,
        }
    }

    /// Record the row counts of a successful ingest of all series.
    pub fn ingested(&self, counts: &[(Series, usize)]) {
        for (series, rows) in counts {
            self.ingested_rows
                .get_or_create(&SeriesLabels {
                    series: series.name().to_owned(),
                })
                .set(*rows as i64);
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        self.ingest_timestamp.set(now);
    }

    pub fn rendered(&self, region: &str) {
        self.figure_renders
            .get_or_create(&RegionLabels {
                region: region.to_owned(),
            })
            .inc();
    }

    pub fn render_failed(&self) {
        self.figure_errors.inc();
    }
}
