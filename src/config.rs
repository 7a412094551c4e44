use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::cold::{
    ColdCriteria, DEFAULT_COLD_THRESHOLD, DEFAULT_MIN_GAP_MINUTES, DEFAULT_REFERENCE_CHANNEL,
};
use crate::duration::parse_duration;
use crate::error::Error;
use crate::mask::{
    OutlierPolicy, DEFAULT_TEMPERATURE_CEILING, DEFAULT_TEMPERATURE_UNCERTAINTY,
    DEFAULT_UNCERTAINTY, DEFAULT_ZSCORE,
};
use crate::resample::DEFAULT_BUCKET_MINUTES;
use crate::Result;

/// Tunable constants of the analysis.
///
/// Every field has a default matching the target's logger, so a TOML file only needs to name
/// what it changes.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Channel whose readings decide when the target is cold
    pub reference_channel: String,
    pub cold_threshold: f64,
    /// Threshold crossings closer than this are spikes
    pub min_gap_minutes: i64,
    pub bucket_minutes: i64,
    pub zscore: f64,
    /// Per-reading uncertainty of non-temperature channels
    pub default_uncertainty: f64,
    pub temperature_uncertainty: f64,
    pub temperature_ceiling: f64,
    /// Trimmed from the start of every window before fitting
    pub lead_trim_minutes: i64,
    /// Trimmed from the end of every window before fitting
    pub tail_trim_minutes: i64,
    /// Shortest trimmed window worth fitting, e.g. "12h" or "2 days"
    pub min_duration: String,
    /// Display label of each known channel
    pub labels: BTreeMap<String, String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let labels = [
            ("PtCo1(K)", "Temperature [K]"),
            ("PtCo2(K)", "Temperature [K]"),
            ("H2-Press(Torr)", "Pressure [Torr]"),
            ("VAC-PM", "Pressure [mbar]"),
            ("VAC-CC10 (Pa)", "Pressure [Pa]"),
        ]
        .into_iter()
        .map(|(channel, label)| (channel.to_owned(), label.to_owned()))
        .collect();

        Self {
            reference_channel: DEFAULT_REFERENCE_CHANNEL.to_owned(),
            cold_threshold: DEFAULT_COLD_THRESHOLD,
            min_gap_minutes: DEFAULT_MIN_GAP_MINUTES,
            bucket_minutes: DEFAULT_BUCKET_MINUTES,
            zscore: DEFAULT_ZSCORE,
            default_uncertainty: DEFAULT_UNCERTAINTY,
            temperature_uncertainty: DEFAULT_TEMPERATURE_UNCERTAINTY,
            temperature_ceiling: DEFAULT_TEMPERATURE_CEILING,
            lead_trim_minutes: 60,
            tail_trim_minutes: 10,
            min_duration: "12h".to_owned(),
            labels,
        }
    }
}

impl AnalysisConfig {
    /// # Errors
    /// Returns [`Error::Config`] if the text is not valid TOML for this structure.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// # Errors
    /// Returns an error if the file cannot be read or does not parse.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Display label for `channel`, falling back to the channel name itself
    #[must_use]
    pub fn label_for<'a>(&'a self, channel: &'a str) -> &'a str {
        self.labels.get(channel).map_or(channel, String::as_str)
    }

    #[must_use]
    pub fn cold_criteria(&self) -> ColdCriteria {
        ColdCriteria {
            reference_channel: self.reference_channel.clone(),
            threshold: self.cold_threshold,
            min_gap: Duration::minutes(self.min_gap_minutes),
        }
    }

    #[must_use]
    pub const fn outlier_policy(&self) -> OutlierPolicy {
        OutlierPolicy {
            zscore: self.zscore,
            temperature_ceiling: self.temperature_ceiling,
            temperature_uncertainty: self.temperature_uncertainty,
        }
    }

    #[must_use]
    pub fn bucket_width(&self) -> Duration {
        Duration::minutes(self.bucket_minutes)
    }

    #[must_use]
    pub fn lead_trim(&self) -> Duration {
        Duration::minutes(self.lead_trim_minutes)
    }

    #[must_use]
    pub fn tail_trim(&self) -> Duration {
        Duration::minutes(self.tail_trim_minutes)
    }

    #[must_use]
    pub fn min_duration(&self) -> Duration {
        parse_duration(&self.min_duration)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::AnalysisConfig;
    use crate::error::Error;

    #[test]
    fn partial_files_keep_the_remaining_defaults() {
        let config = AnalysisConfig::from_toml_str(
            r#"
            reference_channel = "PtCo2(K)"
            zscore = 3.0
            min_duration = "2 days"

            [labels]
            "T-Cell(K)" = "Cell temperature [K]"
            "#,
        )
        .unwrap();

        assert_eq!(config.reference_channel, "PtCo2(K)");
        approx::assert_relative_eq!(config.outlier_policy().zscore, 3.);
        approx::assert_relative_eq!(config.cold_threshold, 4.5);
        assert_eq!(config.bucket_width(), Duration::minutes(10));
        assert_eq!(config.min_duration(), Duration::days(2));
        assert_eq!(config.label_for("T-Cell(K)"), "Cell temperature [K]");
    }

    #[test]
    fn labels_fall_back_to_the_channel_name() {
        let config = AnalysisConfig::default();
        assert_eq!(config.label_for("PtCo1(K)"), "Temperature [K]");
        assert_eq!(config.label_for("VAC-PM"), "Pressure [mbar]");
        assert_eq!(config.label_for("Flow(slpm)"), "Flow(slpm)");
    }

    #[test]
    fn defaults_match_the_logger() {
        let config = AnalysisConfig::default();
        let criteria = config.cold_criteria();
        assert_eq!(criteria.reference_channel, "PtCo1(K)");
        assert_eq!(criteria.min_gap, Duration::minutes(20));
        assert_eq!(config.lead_trim(), Duration::hours(1));
        assert_eq!(config.tail_trim(), Duration::minutes(10));
        assert_eq!(config.min_duration(), Duration::hours(12));
    }

    #[test]
    fn malformed_files_are_rejected() {
        assert!(matches!(
            AnalysisConfig::from_toml_str("zscore = \"high\""),
            Err(Error::Config(_))
        ));
    }
}
