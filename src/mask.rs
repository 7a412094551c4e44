use chrono::NaiveDateTime;
use log::debug;
use ndarray::{Array1, ArrayView1};

use crate::window::TimeWindow;

/// Inclusion flags aligned one-to-one with the samples of a series
pub type Mask = Array1<bool>;

/// Readings at or above this are sensor faults, whatever the window
pub const DEFAULT_TEMPERATURE_CEILING: f64 = 300.;
/// Measurement uncertainty of the platinum-cobalt thermometers (K)
pub const DEFAULT_TEMPERATURE_UNCERTAINTY: f64 = 0.1;
pub const DEFAULT_ZSCORE: f64 = 2.;
pub const DEFAULT_UNCERTAINTY: f64 = 1.;

/// How readings of a temperature channel are screened before fitting
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OutlierPolicy {
    /// Readings further than this many standard deviations from the window mean are rejected
    pub zscore: f64,
    pub temperature_ceiling: f64,
    pub temperature_uncertainty: f64,
}

impl Default for OutlierPolicy {
    fn default() -> Self {
        Self {
            zscore: DEFAULT_ZSCORE,
            temperature_ceiling: DEFAULT_TEMPERATURE_CEILING,
            temperature_uncertainty: DEFAULT_TEMPERATURE_UNCERTAINTY,
        }
    }
}

/// Everything needed to select the readings of one channel inside one window.
///
/// `base`, `timestamps` and `data` must all have the length of the series.
pub struct MaskInput<'a> {
    pub window: TimeWindow,
    pub base: Mask,
    pub timestamps: &'a [NaiveDateTime],
    pub data: ArrayView1<'a, f64>,
    /// Display label of the channel, e.g. "Temperature [K]"
    pub label: &'a str,
    pub policy: OutlierPolicy,
    /// Uncertainty of a single reading for channels the policy does not cover
    pub uncertainty: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MaskedChannel {
    /// The selected readings in series order
    pub values: Vec<f64>,
    pub mask: Mask,
    /// Uncertainty of each selected reading
    pub uncertainty: f64,
}

#[must_use]
pub fn is_temperature(label: &str) -> bool {
    label.to_lowercase().contains("temperature")
}

/// Refine a window mask and select the readings it keeps.
///
/// A base mask selecting nothing means the window lies outside the data, in which case every
/// sample is selected instead. Temperature channels then lose readings at or above the fault
/// ceiling and, for windows strictly inside the series, readings more than `zscore` standard
/// deviations from the mean of what remains. All other channels pass through unfiltered.
///
/// # Panics
/// Panics if `base` and `data` differ in length.
#[must_use]
pub fn apply_mask(input: MaskInput<'_>) -> MaskedChannel {
    let MaskInput {
        window,
        base: mut mask,
        timestamps,
        data,
        label,
        policy,
        mut uncertainty,
    } = input;

    if !mask.iter().any(|&selected| selected) {
        debug!("window {window:?} selects no samples, falling back to the full series");
        mask.fill(true);
    }

    if is_temperature(label) {
        mask.zip_mut_with(&data, |keep, &value| {
            *keep &= value < policy.temperature_ceiling;
        });

        let interior = match (timestamps.first(), timestamps.last()) {
            (Some(&first), Some(&last)) => window.is_interior_to(&TimeWindow::new(first, last)),
            _ => false,
        };
        if interior {
            reject_outliers(&mut mask, data, policy.zscore);
        }
        uncertainty = policy.temperature_uncertainty;
    }

    MaskedChannel {
        values: select(&mask, data),
        mask,
        uncertainty,
    }
}

fn reject_outliers(mask: &mut Mask, data: ArrayView1<'_, f64>, zscore: f64) {
    let kept = Array1::from(select(mask, data));
    let Some(mean) = kept.mean() else {
        return;
    };
    let standard_deviation = kept.std(0.);
    // A flat window has no outliers
    if standard_deviation <= 0. || !standard_deviation.is_finite() {
        return;
    }
    mask.zip_mut_with(&data, |keep, &value| {
        *keep &= (value - mean).abs() < zscore * standard_deviation;
    });
}

fn select(mask: &Mask, data: ArrayView1<'_, f64>) -> Vec<f64> {
    mask.iter()
        .zip(data.iter())
        .filter_map(|(&keep, &value)| keep.then_some(value))
        .collect()
}
