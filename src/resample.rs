use std::collections::BTreeMap;

use chrono::{Duration, NaiveTime};
use log::debug;

use crate::error::Error;
use crate::series::{Sample, TimeSeries};
use crate::Result;

/// Operational bucket width for sensor logs
pub const DEFAULT_BUCKET_MINUTES: i64 = 10;

/// Average readings into fixed-width time buckets.
///
/// Buckets are half-open `[origin + k * width, origin + (k + 1) * width)` where the origin is
/// midnight of the first sample's day. Every channel is averaged over its non-missing readings;
/// a bucket in which any channel has no reading is dropped. The result is labelled by bucket
/// start, so timestamps are strictly increasing and resampling the output again with the same
/// width leaves it unchanged.
///
/// # Errors
/// Returns [`Error::InvalidBucketWidth`] for a zero or negative width.
#[allow(clippy::cast_precision_loss)]
pub fn resample(series: &TimeSeries, width: Duration) -> Result<TimeSeries> {
    let width = width.num_milliseconds();
    if width <= 0 {
        return Err(Error::InvalidBucketWidth);
    }
    let Some(first) = series.timestamps().first() else {
        return Ok(series.clone());
    };
    let origin = first.date().and_time(NaiveTime::MIN);
    let num_channels = series.channels().len();

    // bucket index -> (per-channel sum, per-channel count)
    let mut buckets: BTreeMap<i64, (Vec<f64>, Vec<usize>)> = BTreeMap::new();
    for (timestamp, row) in series.timestamps().iter().zip(series.values().outer_iter()) {
        let key = (*timestamp - origin).num_milliseconds().div_euclid(width);
        let (sums, counts) = buckets
            .entry(key)
            .or_insert_with(|| (vec![0.; num_channels], vec![0; num_channels]));
        for (jj, value) in row.iter().enumerate().filter(|(_, value)| !value.is_nan()) {
            sums[jj] += value;
            counts[jj] += 1;
        }
    }

    let num_buckets = buckets.len();
    let samples = buckets
        .into_iter()
        .filter(|(_, (_, counts))| !counts.contains(&0))
        .map(|(key, (sums, counts))| Sample {
            timestamp: origin + Duration::milliseconds(key * width),
            values: sums
                .iter()
                .zip(&counts)
                .map(|(sum, &count)| sum / count as f64)
                .collect(),
        })
        .collect::<Vec<_>>();

    debug!(
        "resampled {} rows into {} buckets ({} incomplete buckets dropped)",
        series.len(),
        samples.len(),
        num_buckets - samples.len()
    );

    Ok(TimeSeries::from_samples(series.channels().to_vec(), &samples))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use proptest::prelude::*;

    use super::{resample, DEFAULT_BUCKET_MINUTES};
    use crate::error::Error;
    use crate::series::tests::at;
    use crate::series::{Sample, TimeSeries};

    fn series_from(rows: &[(&str, f64, f64)]) -> TimeSeries {
        let samples = rows
            .iter()
            .map(|&(timestamp, a, b)| Sample {
                timestamp: at(timestamp),
                values: vec![a, b],
            })
            .collect::<Vec<_>>();
        TimeSeries::from_samples(vec!["a".into(), "b".into()], &samples)
    }

    #[test]
    fn readings_within_a_bucket_are_averaged() {
        let series = series_from(&[
            ("2021/03/05 10:01:00", 1., 10.),
            ("2021/03/05 10:04:00", 3., f64::NAN),
            ("2021/03/05 10:09:59", 5., 20.),
            ("2021/03/05 10:10:00", 7., 30.),
        ]);
        let resampled = resample(&series, Duration::minutes(DEFAULT_BUCKET_MINUTES)).unwrap();

        assert_eq!(
            resampled.timestamps(),
            [at("2021/03/05 10:00:00"), at("2021/03/05 10:10:00")]
        );
        approx::assert_relative_eq!(resampled.channel("a").unwrap()[0], 3.);
        approx::assert_relative_eq!(resampled.channel("b").unwrap()[0], 15.);
        approx::assert_relative_eq!(resampled.channel("a").unwrap()[1], 7.);
    }

    #[test]
    fn buckets_missing_a_channel_are_dropped() {
        let series = series_from(&[
            ("2021/03/05 10:00:00", 1., 10.),
            ("2021/03/05 10:20:00", 2., f64::NAN),
            ("2021/03/05 10:40:00", 3., 30.),
        ]);
        let resampled = resample(&series, Duration::minutes(10)).unwrap();
        assert_eq!(
            resampled.timestamps(),
            [at("2021/03/05 10:00:00"), at("2021/03/05 10:40:00")]
        );
    }

    #[test]
    fn unsorted_input_comes_out_ordered() {
        let series = series_from(&[
            ("2021/03/05 10:30:00", 3., 3.),
            ("2021/03/05 10:00:00", 1., 1.),
        ]);
        let resampled = resample(&series, Duration::minutes(10)).unwrap();
        assert_eq!(
            resampled.timestamps(),
            [at("2021/03/05 10:00:00"), at("2021/03/05 10:30:00")]
        );
    }

    #[test]
    fn non_positive_widths_are_rejected() {
        let series = series_from(&[("2021/03/05 10:00:00", 1., 1.)]);
        assert!(matches!(
            resample(&series, Duration::zero()),
            Err(Error::InvalidBucketWidth)
        ));
    }

    proptest! {
        #[test]
        fn resampling_is_idempotent(
            offsets in prop::collection::vec(0i64..3 * 86_400, 1..200),
            readings in prop::collection::vec(-500f64..500., 200),
            width in 1i64..120,
        ) {
            let origin = at("2021/03/05 17:23:11");
            let samples = offsets
                .iter()
                .zip(&readings)
                .map(|(&offset, &value)| Sample {
                    timestamp: origin + Duration::seconds(offset),
                    values: vec![value],
                })
                .collect::<Vec<_>>();
            let series = TimeSeries::from_samples(vec!["a".into()], &samples);

            let once = resample(&series, Duration::minutes(width)).unwrap();
            let twice = resample(&once, Duration::minutes(width)).unwrap();

            prop_assert!(once.timestamps().windows(2).all(|pair| pair[0] < pair[1]));
            prop_assert_eq!(once, twice);
        }
    }
}
