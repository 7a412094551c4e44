use std::fs;
use std::io::Read;
use std::path::Path;

use chrono::{Duration, NaiveDateTime};
use log::{debug, info};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{Error, ParseError};
use crate::window::TimeWindow;
use crate::Result;

/// Header of the column holding the sample timestamps
pub const TIMESTAMP_COLUMN: &str = "date-time";
/// Textual format of every entry in [`TIMESTAMP_COLUMN`]
pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// A single row of a sensor log
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    pub timestamp: NaiveDateTime,
    /// One reading per channel of the owning series, `NaN` where the log had no reading
    pub values: Vec<f64>,
}

/// Timestamped readings for a set of named channels.
///
/// Readings are stored as a (samples x channels) matrix so that a single channel can be viewed as
/// a column without copying.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeSeries {
    channels: Vec<String>,
    timestamps: Vec<NaiveDateTime>,
    values: Array2<f64>,
}

impl TimeSeries {
    /// Assemble a series from rows. Rows with fewer values than `channels` are padded as missing.
    #[must_use]
    pub fn from_samples(channels: Vec<String>, samples: &[Sample]) -> Self {
        let values = Array2::from_shape_fn((samples.len(), channels.len()), |(ii, jj)| {
            samples[ii].values.get(jj).copied().unwrap_or(f64::NAN)
        });
        Self {
            channels,
            timestamps: samples.iter().map(|sample| sample.timestamp).collect(),
            values,
        }
    }

    /// Load a delimited sensor log from disk
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or any row is malformed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = fs::File::open(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let series = Self::from_reader(file)?;
        info!(
            "loaded {} rows across {} channels from {path:?}",
            series.len(),
            series.channels.len()
        );
        Ok(series)
    }

    /// Parse a delimited sensor log.
    ///
    /// The header must contain [`TIMESTAMP_COLUMN`]; every other column is treated as a numeric
    /// channel. Empty or non-numeric readings are kept as missing values, and a column without a
    /// single numeric reading is dropped entirely.
    ///
    /// # Errors
    /// Fails with a [`ParseError`] naming the first malformed row.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr.headers().map_err(ParseError::Header)?.clone();
        let time_column = headers
            .iter()
            .position(|header| header == TIMESTAMP_COLUMN)
            .ok_or(ParseError::MissingTimestampColumn)?;
        let channel_columns = (0..headers.len())
            .filter(|&column| column != time_column)
            .collect::<Vec<_>>();

        let mut samples = vec![];
        for (row, record) in (1u64..).zip(rdr.records()) {
            let record = record.map_err(|source| ParseError::Record { row, source })?;
            let raw = record.get(time_column).unwrap_or_default();
            let timestamp = NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).map_err(
                |source| ParseError::Timestamp {
                    row,
                    value: raw.to_owned(),
                    source,
                },
            )?;
            let values = channel_columns
                .iter()
                .map(|&column| parse_reading(record.get(column)))
                .collect();
            samples.push(Sample { timestamp, values });
        }

        let channels = channel_columns
            .iter()
            .map(|&column| headers[column].to_owned())
            .collect();

        Ok(Self::from_samples(channels, &samples).without_empty_channels())
    }

    fn without_empty_channels(self) -> Self {
        let keep = self
            .values
            .axis_iter(Axis(1))
            .map(|column| column.iter().any(|value| !value.is_nan()))
            .collect::<Vec<_>>();
        if keep.iter().all(|&kept| kept) {
            return self;
        }

        let columns = keep
            .iter()
            .enumerate()
            .filter_map(|(ii, &kept)| kept.then_some(ii))
            .collect::<Vec<_>>();
        for (name, _) in self.channels.iter().zip(&keep).filter(|(_, &kept)| !kept) {
            debug!("dropping channel `{name}` with no numeric readings");
        }

        Self {
            channels: columns.iter().map(|&ii| self.channels[ii].clone()).collect(),
            values: self.values.select(Axis(1), &columns),
            timestamps: self.timestamps,
        }
    }

    #[must_use]
    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    #[must_use]
    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    /// The full (samples x channels) reading matrix
    #[must_use]
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    #[must_use]
    pub fn channel(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.channels
            .iter()
            .position(|channel| channel == name)
            .map(|column| self.values.column(column))
    }

    /// As [`TimeSeries::channel`], failing for an unknown name
    ///
    /// # Errors
    /// Returns [`Error::UnknownChannel`] if the series has no such channel.
    pub fn require_channel(&self, name: &str) -> Result<ArrayView1<'_, f64>> {
        self.channel(name)
            .ok_or_else(|| Error::UnknownChannel(name.to_owned()))
    }

    /// First and last timestamps, or `None` for an empty series
    #[must_use]
    pub fn span(&self) -> Option<TimeWindow> {
        Some(TimeWindow::new(
            *self.timestamps.first()?,
            *self.timestamps.last()?,
        ))
    }

    /// Elapsed seconds of every sample since the first one
    #[must_use]
    pub fn seconds_since_start(&self) -> Vec<f64> {
        let Some(&origin) = self.timestamps.first() else {
            return vec![];
        };
        self.timestamps
            .iter()
            .map(|&timestamp| seconds(timestamp - origin))
            .collect()
    }
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn seconds(duration: Duration) -> f64 {
    duration.num_milliseconds() as f64 / 1000.
}

fn parse_reading(field: Option<&str>) -> f64 {
    field
        .and_then(|field| field.parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}
