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

//! Wide and long representations of a CSSE time series along with the flat file format
//! the long form is persisted as.
//!
//! Raw CSSE files have one row per location and one column per date ("wide"). Long form
//! has one row per location and date, the only shape the rest of the crate works with.

use chrono::NaiveDate;
use csv::StringRecord;
use std::error;
use std::fmt;
use std::io;

use crate::client::Series;

pub const SUB_REGION_COLUMN: &str = "Province/State";
pub const REGION_COLUMN: &str = "Country/Region";
pub const LAT_COLUMN: &str = "Lat";
pub const LONG_COLUMN: &str = "Long";
pub const DATE_COLUMN: &str = "date";

/// Format of date column headers in the raw wide files, e.g. `3/15/20`.
pub const WIDE_DATE_FORMAT: &str = "%m/%d/%y";
const LONG_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug)]
pub enum TableError {
    Csv(csv::Error),
    Io(io::Error),
    MissingColumn(String),
    InvalidDate(String),
    InvalidNumber { column: String, value: String },
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csv(e) => write!(f, "{}", e),
            Self::Io(e) => write!(f, "{}", e),
            Self::MissingColumn(c) => write!(f, "missing column {}", c),
            Self::InvalidDate(d) => write!(f, "invalid date {}", d),
            Self::InvalidNumber { column, value } => write!(f, "invalid number {:?} in column {}", value, column),
        }
    }
}

impl error::Error for TableError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Csv(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<csv::Error> for TableError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e)
    }
}

impl From<io::Error> for TableError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Identifying columns of a row: the unpivot key when reshaping.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    /// Province or state, empty for country level rows
    pub sub_region: String,
    pub region: String,
    pub lat: Option<f64>,
    pub long: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WideRow {
    pub location: Location,
    /// One value per date of the owning table, in the same order
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WideTable {
    pub dates: Vec<NaiveDate>,
    pub rows: Vec<WideRow>,
}

/// A single value of a series for a location on a date.
#[derive(Debug, Clone, PartialEq)]
pub struct LongRecord {
    pub location: Location,
    pub date: NaiveDate,
    pub value: Option<f64>,
}

impl WideTable {
    /// Parse raw CSV text with one column per date.
    ///
    /// Identifying columns are located by name, every other column must have a date as its
    /// header. Blank cells are treated as missing values.
    pub fn parse(text: &str) -> Result<Self, TableError> {
        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let headers = reader.headers()?.clone();

        let ids = IdColumns::find(&headers)?;
        let mut date_columns = Vec::new();
        for (i, header) in headers.iter().enumerate() {
            if ids.contains(i) {
                continue;
            }

            let date = NaiveDate::parse_from_str(header.trim(), WIDE_DATE_FORMAT)
                .map_err(|_| TableError::InvalidDate(header.to_owned()))?;
            date_columns.push((i, date));
        }

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            let location = ids.location(&headers, &record)?;
            let values = date_columns
                .iter()
                .map(|(i, _)| parse_number(&headers[*i], record.get(*i).unwrap_or("")))
                .collect::<Result<Vec<_>, _>>()?;

            rows.push(WideRow { location, values });
        }

        Ok(WideTable {
            dates: date_columns.into_iter().map(|(_, d)| d).collect(),
            rows,
        })
    }

    /// Reshape to one record per (location, date), date major: every location for the first
    /// date followed by every location for the next date.
    pub fn melt(&self) -> Vec<LongRecord> {
        let mut out = Vec::with_capacity(self.dates.len() * self.rows.len());
        for (j, date) in self.dates.iter().enumerate() {
            for row in self.rows.iter() {
                out.push(LongRecord {
                    location: row.location.clone(),
                    date: *date,
                    value: row.values.get(j).copied().flatten(),
                });
            }
        }

        out
    }
}

/// Write long records as CSV with the series name as the value column header.
pub fn write_long<W: io::Write>(series: Series, records: &[LongRecord], writer: W) -> Result<(), TableError> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record([
        SUB_REGION_COLUMN,
        REGION_COLUMN,
        LAT_COLUMN,
        LONG_COLUMN,
        DATE_COLUMN,
        series.name(),
    ])?;

    for r in records {
        let lat = format_number(r.location.lat);
        let long = format_number(r.location.long);
        let date = r.date.format(LONG_DATE_FORMAT).to_string();
        let value = format_number(r.value);

        writer.write_record([
            r.location.sub_region.as_str(),
            r.location.region.as_str(),
            lat.as_str(),
            long.as_str(),
            date.as_str(),
            value.as_str(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Read long records written by `write_long` for the same series.
pub fn read_long<R: io::Read>(series: Series, reader: R) -> Result<Vec<LongRecord>, TableError> {
    let mut reader = csv::Reader::from_reader(reader);
    let headers = reader.headers()?.clone();

    let ids = IdColumns::find(&headers)?;
    let date_idx = column_index(&headers, DATE_COLUMN)?;
    let value_idx = column_index(&headers, series.name())?;

    let mut out = Vec::new();
    for result in reader.records() {
        let record = result?;
        let raw_date = record.get(date_idx).unwrap_or("");
        let date = NaiveDate::parse_from_str(raw_date, LONG_DATE_FORMAT)
            .map_err(|_| TableError::InvalidDate(raw_date.to_owned()))?;

        out.push(LongRecord {
            location: ids.location(&headers, &record)?,
            date,
            value: parse_number(series.name(), record.get(value_idx).unwrap_or(""))?,
        });
    }

    Ok(out)
}

struct IdColumns {
    sub_region: usize,
    region: usize,
    lat: usize,
    long: usize,
}

impl IdColumns {
    fn find(headers: &StringRecord) -> Result<Self, TableError> {
        Ok(IdColumns {
            sub_region: column_index(headers, SUB_REGION_COLUMN)?,
            region: column_index(headers, REGION_COLUMN)?,
            lat: column_index(headers, LAT_COLUMN)?,
            long: column_index(headers, LONG_COLUMN)?,
        })
    }

    fn contains(&self, i: usize) -> bool {
        i == self.sub_region || i == self.region || i == self.lat || i == self.long
    }

    fn location(&self, headers: &StringRecord, record: &StringRecord) -> Result<Location, TableError> {
        let field = |i: usize| record.get(i).unwrap_or("");
        Ok(Location {
            sub_region: field(self.sub_region).to_owned(),
            region: field(self.region).to_owned(),
            lat: parse_number(&headers[self.lat], field(self.lat))?,
            long: parse_number(&headers[self.long], field(self.long))?,
        })
    }
}

fn column_index(headers: &StringRecord, name: &str) -> Result<usize, TableError> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| TableError::MissingColumn(name.to_owned()))
}

fn parse_number(column: &str, value: &str) -> Result<Option<f64>, TableError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    trimmed.parse::<f64>().map(Some).map_err(|_| TableError::InvalidNumber {
        column: column.to_owned(),
        value: value.to_owned(),
    })
}

fn format_number(v: Option<f64>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}
