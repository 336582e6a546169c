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

//! Per-region epidemiological metrics derived from the persisted long form series.

use crate::client::Series;
use crate::table::{self, LongRecord, TableError};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use std::error;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[derive(Debug)]
pub enum DeriveError {
    Load(Series, TableError),
}

impl fmt::Display for DeriveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load(s, e) => write!(f, "unable to load {} series: {}", s, e),
        }
    }
}

impl error::Error for DeriveError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Load(_, e) => Some(e),
        }
    }
}

/// Values for a single date of a region.
///
/// `None` means the value is undefined: the first row has no previous row to compare
/// against, a date may be missing from the deaths or recovered series, or the source value
/// itself was blank. Division by zero is not guarded and produces infinite or NaN values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionRow {
    pub date: NaiveDate,
    pub confirmed: Option<f64>,
    pub deaths: Option<f64>,
    pub recovered: Option<f64>,
    pub active: Option<f64>,
    pub new_cases: Option<f64>,
    pub growth: Option<f64>,
    pub growth_factor: Option<f64>,
    pub death_rate: Option<f64>,
    pub recovery_rate: Option<f64>,
}

/// Date ordered metrics for a single sub-region (province or state).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionSeries {
    pub region: String,
    pub rows: Vec<RegionRow>,
}

impl RegionSeries {
    /// Join deaths and recovered onto confirmed by date for the given sub-region and compute
    /// derived metrics. A sub-region with no confirmed rows results in an empty series.
    pub fn from_records(
        region: &str,
        confirmed: &[LongRecord],
        deaths: &[LongRecord],
        recovered: &[LongRecord],
    ) -> Self {
        let mut base: Vec<&LongRecord> = confirmed.iter().filter(|r| in_region(r, region)).collect();
        base.sort_by_key(|r| r.date);

        let deaths_by_date = index_by_date(region, deaths);
        let recovered_by_date = index_by_date(region, recovered);

        let mut rows = Vec::with_capacity(base.len());
        let mut prev_confirmed: Option<f64> = None;
        let mut prev_new_cases: Option<f64> = None;

        for (i, r) in base.iter().enumerate() {
            let confirmed = r.value;
            let deaths = deaths_by_date.get(&r.date).copied().flatten();
            let recovered = recovered_by_date.get(&r.date).copied().flatten();
            let closed = add(recovered, deaths);

            let new_cases = if i == 0 { None } else { sub(confirmed, prev_confirmed) };
            let growth = if i == 0 { None } else { div(confirmed, prev_confirmed) };
            let growth_factor = if i == 0 { None } else { div(new_cases, prev_new_cases) };

            rows.push(RegionRow {
                date: r.date,
                confirmed,
                deaths,
                recovered,
                active: sub(sub(confirmed, recovered), deaths),
                new_cases,
                growth,
                growth_factor,
                death_rate: div(deaths, closed),
                recovery_rate: div(recovered, closed),
            });

            prev_confirmed = confirmed;
            prev_new_cases = new_cases;
        }

        RegionSeries {
            region: region.to_owned(),
            rows,
        }
    }

    /// Rows with more than `min` confirmed cases, in their original order.
    pub fn above_threshold(&self, min: f64) -> RegionSeries {
        RegionSeries {
            region: self.region.clone(),
            rows: self
                .rows
                .iter()
                .filter(|r| r.confirmed.map(|c| c > min).unwrap_or(false))
                .cloned()
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Load the three persisted series from `data_dir` and derive metrics for a sub-region.
pub fn load_region(data_dir: &Path, region: &str) -> Result<RegionSeries, DeriveError> {
    let confirmed = load_series(data_dir, Series::Confirmed)?;
    let deaths = load_series(data_dir, Series::Deaths)?;
    let recovered = load_series(data_dir, Series::Recovered)?;

    let series = RegionSeries::from_records(region, &confirmed, &deaths, &recovered);
    tracing::debug!(message = "derived region metrics", region = %region, rows = series.rows.len());
    Ok(series)
}

pub(crate) fn load_series(data_dir: &Path, series: Series) -> Result<Vec<LongRecord>, DeriveError> {
    let path = data_dir.join(series.file_name());
    let file = File::open(&path).map_err(|e| DeriveError::Load(series, TableError::Io(e)))?;
    table::read_long(series, BufReader::new(file)).map_err(|e| DeriveError::Load(series, e))
}

fn index_by_date(region: &str, records: &[LongRecord]) -> HashMap<NaiveDate, Option<f64>> {
    let mut out = HashMap::new();
    for r in records.iter().filter(|r| in_region(r, region)) {
        // First value wins when a date repeats
        out.entry(r.date).or_insert(r.value);
    }

    out
}

/// Country level rows have a blank sub-region and never match, even an empty selection.
fn in_region(r: &LongRecord, region: &str) -> bool {
    !r.location.sub_region.is_empty() && r.location.sub_region == region
}

fn add(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    Some(a? + b?)
}

fn sub(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    Some(a? - b?)
}

fn div(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    Some(a? / b?)
}

#[cfg(test)]
mod tests {
    use super::{load_region, DeriveError, RegionSeries};
    use crate::ingest::tests::ingest_samples;
    use crate::table::{LongRecord, Location, TableError};
    use chrono::NaiveDate;

    fn records(region: &str, start: NaiveDate, values: &[Option<f64>]) -> Vec<LongRecord> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| LongRecord {
                location: Location {
                    sub_region: region.to_owned(),
                    region: "Australia".to_owned(),
                    lat: Some(-34.9),
                    long: Some(138.6),
                },
                date: start + chrono::Duration::days(i as i64),
                value: *v,
            })
            .collect()
    }

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 3, 14).unwrap()
    }

    fn series(confirmed: &[f64], deaths: &[f64], recovered: &[f64]) -> RegionSeries {
        let some = |v: &[f64]| v.iter().map(|x| Some(*x)).collect::<Vec<_>>();
        RegionSeries::from_records(
            "X",
            &records("X", start(), &some(confirmed)),
            &records("X", start(), &some(deaths)),
            &records("X", start(), &some(recovered)),
        )
    }

    #[test]
    fn test_scenario_after_threshold() {
        let s = series(&[5.0, 12.0, 20.0], &[0.0, 1.0, 1.0], &[0.0, 2.0, 5.0]).above_threshold(10.0);

        assert_eq!(2, s.rows.len());
        let active: Vec<Option<f64>> = s.rows.iter().map(|r| r.active).collect();
        assert_eq!(vec![Some(9.0), Some(14.0)], active);
        assert_eq!(Some(8.0), s.rows[1].new_cases);
        assert_eq!(Some(2.0 / 3.0), s.rows[0].recovery_rate);
        assert_eq!(Some(5.0 / 6.0), s.rows[1].recovery_rate);
    }

    #[test]
    fn test_first_row_undefined() {
        let s = series(&[5.0, 12.0, 20.0], &[0.0, 1.0, 1.0], &[0.0, 2.0, 5.0]);
        let first = &s.rows[0];
        assert_eq!(None, first.new_cases);
        assert_eq!(None, first.growth);
        assert_eq!(None, first.growth_factor);

        // Growth factor needs two previous rows
        assert_eq!(Some(7.0), s.rows[1].new_cases);
        assert_eq!(None, s.rows[1].growth_factor);
        assert_eq!(Some(8.0 / 7.0), s.rows[2].growth_factor);
        assert_eq!(Some(20.0 / 12.0), s.rows[2].growth);
    }

    #[test]
    fn test_new_cases_consecutive_difference() {
        let confirmed = [3.0, 3.0, 10.0, 25.0, 24.0];
        let s = series(&confirmed, &[0.0; 5], &[0.0; 5]);
        for t in 1..confirmed.len() {
            assert_eq!(Some(confirmed[t] - confirmed[t - 1]), s.rows[t].new_cases);
        }
    }

    #[test]
    fn test_active_not_clamped() {
        let s = series(&[10.0, 11.0], &[4.0, 4.0], &[8.0, 9.0]);
        assert_eq!(Some(-2.0), s.rows[0].active);
        assert_eq!(Some(-2.0), s.rows[1].active);
    }

    #[test]
    fn test_rates_sum_to_one() {
        let s = series(&[10.0, 20.0, 30.0], &[1.0, 3.0, 7.0], &[2.0, 5.0, 11.0]);
        for r in s.rows.iter() {
            let total = r.death_rate.unwrap() + r.recovery_rate.unwrap();
            assert!((total - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_division_by_zero_unguarded() {
        let s = series(&[0.0, 4.0, 4.0], &[0.0, 0.0, 0.0], &[0.0, 0.0, 0.0]);
        assert!(s.rows[0].recovery_rate.unwrap().is_nan());
        assert!(s.rows[0].death_rate.unwrap().is_nan());
        assert!(s.rows[1].growth.unwrap().is_infinite());
        assert_eq!(Some(0.0), s.rows[2].new_cases);
        assert_eq!(Some(0.0), s.rows[2].growth_factor);
    }

    #[test]
    fn test_missing_join_date_propagates() {
        let confirmed = records("X", start(), &[Some(20.0), Some(30.0)]);
        let deaths = records("X", start(), &[Some(1.0)]);
        let recovered = records("X", start(), &[Some(2.0), Some(4.0)]);

        let s = RegionSeries::from_records("X", &confirmed, &deaths, &recovered);
        assert_eq!(Some(17.0), s.rows[0].active);
        assert_eq!(None, s.rows[1].deaths);
        assert_eq!(None, s.rows[1].active);
        assert_eq!(None, s.rows[1].recovery_rate);
        assert_eq!(Some(10.0), s.rows[1].new_cases);
    }

    #[test]
    fn test_rows_ordered_by_date() {
        let mut confirmed = records("X", start(), &[Some(1.0), Some(2.0), Some(3.0)]);
        confirmed.reverse();
        let s = RegionSeries::from_records("X", &confirmed, &[], &[]);

        let dates: Vec<NaiveDate> = s.rows.iter().map(|r| r.date).collect();
        let mut sorted = dates.clone();
        sorted.sort();
        assert_eq!(sorted, dates);
        assert_eq!(Some(1.0), s.rows[1].new_cases);
    }

    #[test]
    fn test_unknown_region_empty() {
        let confirmed = records("X", start(), &[Some(20.0)]);
        let s = RegionSeries::from_records("Y", &confirmed, &confirmed, &confirmed);
        assert!(s.is_empty());
        assert_eq!("Y", s.region);
    }

    #[test]
    fn test_empty_region_matches_nothing() {
        let afghanistan = records("", start(), &[Some(11.0), Some(16.0)]);
        let mut albania = records("", start(), &[Some(100.0), Some(200.0)]);
        for r in albania.iter_mut() {
            r.location.region = "Albania".to_owned();
        }

        let all: Vec<LongRecord> = afghanistan.into_iter().chain(albania).collect();
        let s = RegionSeries::from_records("", &all, &all, &all);
        assert!(s.is_empty());
        assert_eq!("", s.region);
    }

    #[test]
    fn test_threshold_preserves_order() {
        let s = series(&[11.0, 4.0, 15.0, 10.0, 30.0], &[0.0; 5], &[0.0; 5]).above_threshold(10.0);
        let confirmed: Vec<Option<f64>> = s.rows.iter().map(|r| r.confirmed).collect();
        assert_eq!(vec![Some(11.0), Some(15.0), Some(30.0)], confirmed);
        assert!(s.rows.windows(2).all(|w| w[0].date < w[1].date));
    }

    #[tokio::test]
    async fn test_load_region_from_files() {
        let dir = tempfile::tempdir().unwrap();
        ingest_samples(dir.path()).await;

        let s = load_region(dir.path(), "Victoria").unwrap();
        assert_eq!(3, s.rows.len());
        assert_eq!(Some(41.0), s.rows[0].active);
        assert_eq!(Some(14.0), s.rows[2].new_cases);

        let empty = load_region(dir.path(), "Tasmania").unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_load_region_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let res = load_region(dir.path(), "Victoria");
        assert!(matches!(res, Err(DeriveError::Load(_, TableError::Io(_)))));
    }
}
