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

//! Situation report figure and region selector options.
//!
//! Figures are serialized in the JSON figure format understood by plotly.js so the page
//! served by `http` can draw them without further transformation.

use crate::client::Series;
use crate::derive::{self, DeriveError, RegionSeries};
use chrono::NaiveDate;
use serde::Serialize;
use std::path::Path;

/// Rows with this many confirmed cases or fewer are left out of the report.
pub const MIN_CONFIRMED: f64 = 10.0;

const WIDTH: u32 = 900;
const HEIGHT: u32 = 650;
const RECOVERY_RATE_RANGE: [f64; 2] = [0.0, 1.1];
const TOP_DOMAIN: [f64; 2] = [0.575, 1.0];
const BOTTOM_DOMAIN: [f64; 2] = [0.0, 0.425];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceKind {
    Scatter,
    Bar,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trace {
    #[serde(rename = "type")]
    pub kind: TraceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<&'static str>,
    pub name: String,
    pub x: Vec<NaiveDate>,
    /// Undefined and non-finite values are serialized as `null` and drawn as gaps
    pub y: Vec<Option<f64>>,
    pub xaxis: &'static str,
    pub yaxis: &'static str,
}

impl Trace {
    fn line(name: &str, x: &[NaiveDate], y: Vec<Option<f64>>, xaxis: &'static str, yaxis: &'static str) -> Self {
        Trace {
            kind: TraceKind::Scatter,
            mode: Some("lines"),
            name: name.to_owned(),
            x: x.to_vec(),
            y,
            xaxis,
            yaxis,
        }
    }

    fn bar(name: &str, x: &[NaiveDate], y: Vec<Option<f64>>, xaxis: &'static str, yaxis: &'static str) -> Self {
        Trace {
            kind: TraceKind::Bar,
            mode: None,
            name: name.to_owned(),
            x: x.to_vec(),
            y,
            xaxis,
            yaxis,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Axis {
    pub anchor: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matches: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub showticklabels: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlaying: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<[f64; 2]>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Title {
    pub text: String,
}

/// Subplot title, positioned in paper coordinates above its panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    pub text: &'static str,
    pub x: f64,
    pub y: f64,
    pub xref: &'static str,
    pub yref: &'static str,
    pub xanchor: &'static str,
    pub yanchor: &'static str,
    pub showarrow: bool,
}

impl Annotation {
    fn subplot_title(text: &'static str, y: f64) -> Self {
        Annotation {
            text,
            x: 0.5,
            y,
            xref: "paper",
            yref: "paper",
            xanchor: "center",
            yanchor: "bottom",
            showarrow: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub title: Title,
    pub width: u32,
    pub height: u32,
    pub xaxis: Axis,
    pub yaxis: Axis,
    pub xaxis2: Axis,
    pub yaxis2: Axis,
    pub yaxis3: Axis,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Figure {
    pub data: Vec<Trace>,
    pub layout: Layout,
}

impl Figure {
    /// Two panel report sharing the date axis.
    ///
    /// The top panel has lines for active and confirmed cases. The bottom panel has bars for
    /// recovered cases and deaths along with the recovery rate as a line against a secondary
    /// axis fixed to `[0, 1.1]`. Only rows with more than `MIN_CONFIRMED` confirmed cases
    /// are included.
    pub fn situation_report(series: &RegionSeries) -> Self {
        let series = series.above_threshold(MIN_CONFIRMED);
        let x: Vec<NaiveDate> = series.rows.iter().map(|r| r.date).collect();
        let column = |f: fn(&derive::RegionRow) -> Option<f64>| series.rows.iter().map(f).collect::<Vec<_>>();

        let data = vec![
            Trace::line("active cases", &x, column(|r| r.active), "x", "y"),
            Trace::line("confirmed cases", &x, column(|r| r.confirmed), "x", "y"),
            Trace::bar("Recovered cases", &x, column(|r| r.recovered), "x2", "y2"),
            Trace::bar("Deaths", &x, column(|r| r.deaths), "x2", "y2"),
            Trace::line("recovery rate", &x, column(|r| r.recovery_rate), "x2", "y3"),
        ];

        let layout = Layout {
            title: Title {
                text: format!("COVID-19 Situation Status Report for {} ", series.region),
            },
            width: WIDTH,
            height: HEIGHT,
            xaxis: Axis {
                anchor: "y",
                domain: Some([0.0, 1.0]),
                matches: Some("x2"),
                showticklabels: Some(false),
                ..Axis::default()
            },
            yaxis: Axis {
                anchor: "x",
                domain: Some(TOP_DOMAIN),
                ..Axis::default()
            },
            xaxis2: Axis {
                anchor: "y2",
                domain: Some([0.0, 1.0]),
                ..Axis::default()
            },
            yaxis2: Axis {
                anchor: "x2",
                domain: Some(BOTTOM_DOMAIN),
                ..Axis::default()
            },
            yaxis3: Axis {
                anchor: "x2",
                overlaying: Some("y2"),
                side: Some("right"),
                range: Some(RECOVERY_RATE_RANGE),
                ..Axis::default()
            },
            annotations: vec![
                Annotation::subplot_title("Active and Confirmed Cases", TOP_DOMAIN[1]),
                Annotation::subplot_title("Recovered Cases and Deaths", BOTTOM_DOMAIN[1]),
            ],
        };

        Figure { data, layout }
    }
}

/// Distinct, non-empty sub-regions of `country` in the confirmed series, in the order
/// they first appear.
pub fn region_options(data_dir: &Path, country: &str) -> Result<Vec<String>, DeriveError> {
    let records = derive::load_series(data_dir, Series::Confirmed)?;
    let mut out: Vec<String> = Vec::new();

    for r in records.iter() {
        let sub_region = &r.location.sub_region;
        if r.location.region == country && !sub_region.is_empty() && !out.contains(sub_region) {
            out.push(sub_region.clone());
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{region_options, Figure, TraceKind};
    use crate::derive::{RegionRow, RegionSeries};
    use crate::ingest::tests::ingest_samples;
    use chrono::NaiveDate;
    use serde_json::json;

    fn row(day: u32, confirmed: f64, deaths: f64, recovered: f64, recovery_rate: f64) -> RegionRow {
        RegionRow {
            date: NaiveDate::from_ymd_opt(2020, 3, day).unwrap(),
            confirmed: Some(confirmed),
            deaths: Some(deaths),
            recovered: Some(recovered),
            active: Some(confirmed - deaths - recovered),
            new_cases: None,
            growth: None,
            growth_factor: None,
            death_rate: None,
            recovery_rate: Some(recovery_rate),
        }
    }

    fn sample() -> RegionSeries {
        RegionSeries {
            region: "South Australia".to_owned(),
            rows: vec![
                row(14, 5.0, 0.0, 0.0, f64::NAN),
                row(15, 12.0, 1.0, 2.0, 2.0 / 3.0),
                row(16, 20.0, 1.0, 5.0, 5.0 / 6.0),
            ],
        }
    }

    #[test]
    fn test_situation_report_traces() {
        let fig = Figure::situation_report(&sample());

        let names: Vec<&str> = fig.data.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            vec!["active cases", "confirmed cases", "Recovered cases", "Deaths", "recovery rate"],
            names
        );

        let kinds: Vec<TraceKind> = fig.data.iter().map(|t| t.kind).collect();
        assert_eq!(
            vec![
                TraceKind::Scatter,
                TraceKind::Scatter,
                TraceKind::Bar,
                TraceKind::Bar,
                TraceKind::Scatter
            ],
            kinds
        );

        let axes: Vec<(&str, &str)> = fig.data.iter().map(|t| (t.xaxis, t.yaxis)).collect();
        assert_eq!(
            vec![("x", "y"), ("x", "y"), ("x2", "y2"), ("x2", "y2"), ("x2", "y3")],
            axes
        );
    }

    #[test]
    fn test_situation_report_filters_small_counts() {
        let fig = Figure::situation_report(&sample());
        for trace in fig.data.iter() {
            assert_eq!(2, trace.x.len());
            assert_eq!(2, trace.y.len());
        }

        assert_eq!(vec![Some(9.0), Some(14.0)], fig.data[0].y);
        assert_eq!(NaiveDate::from_ymd_opt(2020, 3, 15).unwrap(), fig.data[0].x[0]);
    }

    #[test]
    fn test_situation_report_json() {
        let fig = Figure::situation_report(&sample());
        let value = serde_json::to_value(&fig).unwrap();

        assert_eq!(
            json!("COVID-19 Situation Status Report for South Australia "),
            value["layout"]["title"]["text"]
        );
        assert_eq!(json!(900), value["layout"]["width"]);
        assert_eq!(json!(650), value["layout"]["height"]);
        assert_eq!(json!([0.0, 1.1]), value["layout"]["yaxis3"]["range"]);
        assert_eq!(json!("y2"), value["layout"]["yaxis3"]["overlaying"]);
        assert_eq!(json!("x2"), value["layout"]["xaxis"]["matches"]);
        assert_eq!(json!("lines"), value["data"][0]["mode"]);
        assert_eq!(json!("bar"), value["data"][2]["type"]);
        assert!(value["data"][2].get("mode").is_none());
        assert_eq!(json!(["2020-03-15", "2020-03-16"]), value["data"][0]["x"]);
    }

    #[test]
    fn test_situation_report_non_finite_as_null() {
        let mut series = sample();
        series.rows[1].recovery_rate = Some(f64::INFINITY);
        series.rows[2].recovered = None;

        let value = serde_json::to_value(Figure::situation_report(&series)).unwrap();
        assert_eq!(json!([null, 0.8333333333333334]), value["data"][4]["y"]);
        assert_eq!(json!([2.0, null]), value["data"][2]["y"]);
    }

    #[test]
    fn test_situation_report_empty_series() {
        let fig = Figure::situation_report(&RegionSeries {
            region: "Nowhere".to_owned(),
            rows: Vec::new(),
        });

        assert_eq!(5, fig.data.len());
        assert!(fig.data.iter().all(|t| t.x.is_empty()));
    }

    #[tokio::test]
    async fn test_region_options() {
        let dir = tempfile::tempdir().unwrap();
        ingest_samples(dir.path()).await;

        let options = region_options(dir.path(), "Australia").unwrap();
        assert_eq!(vec!["South Australia".to_owned(), "Victoria".to_owned()], options);

        let none = region_options(dir.path(), "Afghanistan").unwrap();
        assert!(none.is_empty());
    }
}
