use std::path::Path;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use log::{debug, info};
use ndarray::ArrayView1;

use crate::cold::{find_cold_intervals, ColdInterval};
use crate::config::AnalysisConfig;
use crate::duration::parse_duration;
use crate::error::{Error, FitError};
use crate::fit::{linear_fit, LinearFit, SECONDS_PER_DAY};
use crate::mask::{apply_mask, Mask, MaskInput};
use crate::resample::resample;
use crate::series::TimeSeries;
use crate::window::TimeWindow;
use crate::Result;

/// What to analyse in one [`AnalysisSession::process`] call
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessRequest {
    pub channel: String,
    /// Display label; labels mentioning "temperature" switch on temperature screening
    pub label: String,
    /// Analyse only this window instead of every detected cold interval
    pub window: Option<TimeWindow>,
    /// Windows no longer than this after trimming are skipped; `None` defers to
    /// [`AnalysisConfig::min_duration`]
    pub min_duration: Option<Duration>,
    /// Whether the caller wants the fitted line drawn
    pub with_fit: bool,
}

impl ProcessRequest {
    #[must_use]
    pub fn new(channel: &str, label: &str) -> Self {
        Self {
            channel: channel.to_owned(),
            label: label.to_owned(),
            window: None,
            min_duration: None,
            with_fit: true,
        }
    }

    #[must_use]
    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = Some(window);
        self
    }

    /// Set the minimum window length from text such as `"24h"`; see [`parse_duration`]
    #[must_use]
    pub fn with_min_duration(mut self, text: &str) -> Self {
        self.min_duration = Some(parse_duration(text));
        self
    }

    #[must_use]
    pub fn with_fit(mut self, with_fit: bool) -> Self {
        self.with_fit = with_fit;
        self
    }
}

/// A straight line fitted to one channel over one window, with the data behind it
#[derive(Clone, Debug, PartialEq)]
pub struct FitResult {
    pub channel: String,
    pub label: String,
    /// The trimmed window the line was fitted over
    pub window: TimeWindow,
    /// Selected samples, aligned with the resampled series
    pub mask: Mask,
    pub timestamps: Vec<NaiveDateTime>,
    /// Seconds since the start of the series, the abscissae of the fit
    pub elapsed: Vec<f64>,
    pub values: Vec<f64>,
    pub uncertainty: f64,
    pub fit: LinearFit,
    pub with_fit: bool,
}

impl FitResult {
    #[must_use]
    pub fn midpoint(&self) -> NaiveDateTime {
        self.window.midpoint()
    }

    /// The day a cold period is filed under
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.window.date()
    }

    /// e.g. "05 March 2021"
    #[must_use]
    pub fn date_label(&self) -> String {
        self.date().format("%d %B %Y").to_string()
    }

    #[must_use]
    pub const fn slope(&self) -> f64 {
        self.fit.slope
    }

    #[must_use]
    pub const fn slope_err(&self) -> f64 {
        self.fit.slope_err
    }

    /// Slope in units per day rather than per second
    #[must_use]
    pub fn rate_per_day(&self) -> f64 {
        self.fit.slope * SECONDS_PER_DAY
    }

    /// The fitted line at every selected sample, if the request asked for it
    #[must_use]
    pub fn fit_line(&self) -> Option<Vec<f64>> {
        self.with_fit
            .then(|| self.elapsed.iter().map(|&t| self.fit.at(t)).collect())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SkipReason {
    /// The trimmed window was not longer than the requested minimum
    TooShort { duration: Duration, minimum: Duration },
    Fit(FitError),
}

/// The fate of a single window in a [`AnalysisSession::process`] call
#[derive(Clone, Debug, PartialEq)]
pub enum WindowOutcome {
    Fitted(FitResult),
    Skipped { window: TimeWindow, reason: SkipReason },
}

impl WindowOutcome {
    #[must_use]
    pub const fn fitted(&self) -> Option<&FitResult> {
        match self {
            Self::Fitted(result) => Some(result),
            Self::Skipped { .. } => None,
        }
    }
}

/// Analysis state for one sensor log.
///
/// Construction loads, resamples and finds the cold intervals once; each call to
/// [`AnalysisSession::process`] then replaces the previous outcomes.
pub struct AnalysisSession {
    config: AnalysisConfig,
    series: TimeSeries,
    elapsed: Vec<f64>,
    cold_intervals: Vec<ColdInterval>,
    span: TimeWindow,
    outcomes: Vec<WindowOutcome>,
}

impl AnalysisSession {
    /// Load and prepare a sensor log
    ///
    /// # Errors
    /// Returns an error if the log cannot be read or parsed, has no complete samples, or lacks
    /// the reference channel.
    pub fn open(path: &Path, config: AnalysisConfig) -> Result<Self> {
        let raw = TimeSeries::from_file(path)?;
        Self::from_series(&raw, config)
    }

    /// Prepare an already loaded series
    ///
    /// # Errors
    /// As [`AnalysisSession::open`], minus the file handling.
    pub fn from_series(raw: &TimeSeries, config: AnalysisConfig) -> Result<Self> {
        let series = resample(raw, config.bucket_width())?;
        let span = series.span().ok_or(Error::EmptySeries)?;
        let cold_intervals = find_cold_intervals(&series, &config.cold_criteria())?;
        info!(
            "{} samples between {} and {}, {} cold intervals",
            series.len(),
            span.start,
            span.end,
            cold_intervals.len()
        );

        Ok(Self {
            elapsed: series.seconds_since_start(),
            config,
            series,
            cold_intervals,
            span,
            outcomes: vec![],
        })
    }

    #[must_use]
    pub const fn abs_start(&self) -> NaiveDateTime {
        self.span.start
    }

    #[must_use]
    pub const fn abs_end(&self) -> NaiveDateTime {
        self.span.end
    }

    #[must_use]
    pub const fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// The resampled series
    #[must_use]
    pub const fn series(&self) -> &TimeSeries {
        &self.series
    }

    #[must_use]
    pub fn cold_intervals(&self) -> &[ColdInterval] {
        &self.cold_intervals
    }

    /// Fit `request.channel` over the requested window, or over every cold interval in turn.
    ///
    /// Windows are trimmed by the configured lead and tail first. Windows that end up too short
    /// or cannot be fitted are reported as [`WindowOutcome::Skipped`] rather than failing the
    /// call. Outcomes of earlier calls are discarded.
    ///
    /// # Errors
    /// Returns [`Error::UnknownChannel`] if the series has no such channel.
    pub fn process(&mut self, request: &ProcessRequest) -> Result<&[WindowOutcome]> {
        let data = self.series.require_channel(&request.channel)?;
        let windows = request
            .window
            .map_or_else(|| self.cold_intervals.clone(), |window| vec![window]);

        let outcomes = windows
            .into_iter()
            .map(|window| self.analyze_window(window, data, request))
            .collect::<Vec<_>>();
        debug!(
            "{} of {} windows fitted for `{}`",
            outcomes.iter().filter_map(WindowOutcome::fitted).count(),
            outcomes.len(),
            request.channel
        );

        self.outcomes = outcomes;
        Ok(&self.outcomes)
    }

    fn analyze_window<'a>(
        &'a self,
        window: TimeWindow,
        data: ArrayView1<'a, f64>,
        request: &'a ProcessRequest,
    ) -> WindowOutcome {
        let window = window.truncated(self.config.lead_trim(), self.config.tail_trim());
        let duration = window.duration();
        let minimum = request
            .min_duration
            .unwrap_or_else(|| self.config.min_duration());
        if duration <= minimum {
            debug!("skipping {window:?}: {duration} is not longer than the minimum");
            return WindowOutcome::Skipped {
                window,
                reason: SkipReason::TooShort {
                    duration,
                    minimum,
                },
            };
        }

        let timestamps = self.series.timestamps();
        let masked = apply_mask(MaskInput {
            window,
            base: window.mask_between(timestamps),
            timestamps,
            data,
            label: &request.label,
            policy: self.config.outlier_policy(),
            uncertainty: self.config.default_uncertainty,
        });

        let (selected_timestamps, elapsed): (Vec<_>, Vec<_>) = masked
            .mask
            .iter()
            .zip(timestamps.iter().zip(&self.elapsed))
            .filter(|(&keep, _)| keep)
            .map(|(_, (&timestamp, &seconds))| (timestamp, seconds))
            .unzip();

        match linear_fit(&elapsed, &masked.values, masked.uncertainty) {
            Ok(fit) => WindowOutcome::Fitted(FitResult {
                channel: request.channel.clone(),
                label: request.label.clone(),
                window,
                mask: masked.mask,
                timestamps: selected_timestamps,
                elapsed,
                values: masked.values,
                uncertainty: masked.uncertainty,
                fit,
                with_fit: request.with_fit,
            }),
            Err(error) => {
                debug!("skipping {window:?}: {error}");
                WindowOutcome::Skipped {
                    window,
                    reason: SkipReason::Fit(error),
                }
            }
        }
    }

    /// Outcomes of the latest [`AnalysisSession::process`] call, in chronological order
    #[must_use]
    pub fn outcomes(&self) -> &[WindowOutcome] {
        &self.outcomes
    }

    /// The fitted windows of the latest [`AnalysisSession::process`] call
    pub fn fits(&self) -> impl Iterator<Item = &FitResult> {
        self.outcomes.iter().filter_map(WindowOutcome::fitted)
    }
}
