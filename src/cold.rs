use std::collections::BTreeSet;

use chrono::{Duration, NaiveDateTime};
use itertools::Itertools;
use log::{debug, warn};

use crate::series::TimeSeries;
use crate::window::TimeWindow;
use crate::Result;

/// Below this reference temperature (K) the target counts as cold
pub const DEFAULT_COLD_THRESHOLD: f64 = 4.5;
/// Threshold crossings closer together than this are treated as spikes
pub const DEFAULT_MIN_GAP_MINUTES: i64 = 20;
/// Reference thermometer of the target cell
pub const DEFAULT_REFERENCE_CHANNEL: &str = "PtCo1(K)";

/// A span during which the reference channel stayed below the cold threshold
pub type ColdInterval = TimeWindow;

#[derive(Clone, Debug, PartialEq)]
pub struct ColdCriteria {
    pub reference_channel: String,
    pub threshold: f64,
    pub min_gap: Duration,
}

impl Default for ColdCriteria {
    fn default() -> Self {
        Self {
            reference_channel: DEFAULT_REFERENCE_CHANNEL.to_owned(),
            threshold: DEFAULT_COLD_THRESHOLD,
            min_gap: Duration::minutes(DEFAULT_MIN_GAP_MINUTES),
        }
    }
}

/// Find the chronologically ordered cold intervals of a resampled series.
///
/// # Errors
/// Returns [`crate::Error::UnknownChannel`] if the reference channel is missing.
pub fn find_cold_intervals(
    series: &TimeSeries,
    criteria: &ColdCriteria,
) -> Result<Vec<ColdInterval>> {
    let reference = series.require_channel(&criteria.reference_channel)?;
    let cold = reference
        .iter()
        .map(|&value| value < criteria.threshold)
        .collect::<Vec<_>>();
    Ok(cold_intervals(series.timestamps(), &cold, criteria.min_gap))
}

/// Pair up the threshold crossings of `cold`.
///
/// An edge sits at the last sample before the condition flips. A series that starts (ends) cold
/// gets its first (last) sample as an extra edge so every interval is closed. Any two consecutive
/// edges less than `min_gap` apart are both discarded: a short warm spike between two cold
/// stretches fuses them, while a short cold blip vanishes.
fn cold_intervals(
    timestamps: &[NaiveDateTime],
    cold: &[bool],
    min_gap: Duration,
) -> Vec<ColdInterval> {
    let (Some(&starts_cold), Some(&ends_cold)) = (cold.first(), cold.last()) else {
        return vec![];
    };

    let mut edges = cold
        .iter()
        .tuple_windows()
        .positions(|(before, after)| before != after)
        .collect::<Vec<_>>();
    if starts_cold {
        edges.insert(0, 0);
    }
    if ends_cold {
        edges.push(cold.len() - 1);
    }

    let bookends = edges.iter().map(|&ii| timestamps[ii]).collect::<Vec<_>>();
    let spurious = bookends
        .iter()
        .tuple_windows()
        .positions(|(&earlier, &later)| {
            let gap = later - earlier;
            gap < min_gap || gap <= Duration::zero()
        })
        .flat_map(|ii| [ii, ii + 1])
        .collect::<BTreeSet<_>>();
    if !spurious.is_empty() {
        debug!(
            "discarding {} of {} cold bookends closer than {} minutes",
            spurious.len(),
            bookends.len(),
            min_gap.num_minutes()
        );
    }

    let kept = bookends
        .into_iter()
        .enumerate()
        .filter(|(ii, _)| !spurious.contains(ii))
        .map(|(_, timestamp)| timestamp)
        .collect::<Vec<_>>();
    if kept.len() % 2 == 1 {
        warn!(
            "unpaired cold bookend at {} dropped",
            kept[kept.len() - 1]
        );
    }

    kept.into_iter()
        .tuples()
        .map(|(start, end)| TimeWindow::new(start, end))
        .collect()
}
