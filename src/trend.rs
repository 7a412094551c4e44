use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use log::{info, warn};

use crate::config::AnalysisConfig;
use crate::error::Error;
use crate::fit::SECONDS_PER_DAY;
use crate::session::{AnalysisSession, FitResult, ProcessRequest};
use crate::Result;

/// The warming rate of one cold period, for plotting rates across many logs
#[derive(Clone, Debug, PartialEq)]
pub struct TrendPoint {
    /// Log the period was found in
    pub source: PathBuf,
    pub midpoint: NaiveDateTime,
    pub date_label: String,
    pub slope: f64,
    pub slope_err: f64,
}

impl TrendPoint {
    fn from_fit(source: &Path, fit: &FitResult) -> Self {
        Self {
            source: source.to_path_buf(),
            midpoint: fit.midpoint(),
            date_label: fit.date_label(),
            slope: fit.slope(),
            slope_err: fit.slope_err(),
        }
    }

    #[must_use]
    pub fn rate_per_day(&self) -> f64 {
        self.slope * SECONDS_PER_DAY
    }

    #[must_use]
    pub fn rate_err_per_day(&self) -> f64 {
        self.slope_err * SECONDS_PER_DAY
    }
}

/// Run the same request over every `.csv` log in `folder` and gather the fitted periods.
///
/// Logs are visited in file-name order, one independent session each. A log that cannot be
/// loaded or lacks the requested channel is logged and contributes nothing.
///
/// # Errors
/// Returns an error only if the folder itself cannot be listed.
pub fn collect_trends(
    folder: &Path,
    request: &ProcessRequest,
    config: &AnalysisConfig,
) -> Result<Vec<TrendPoint>> {
    let io_error = |source| Error::Io {
        path: folder.to_path_buf(),
        source,
    };
    let mut csv_file_paths = fs::read_dir(folder)
        .map_err(io_error)?
        .filter_map(::std::result::Result::ok)
        .map(|dir_entry| dir_entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect::<Vec<_>>();
    csv_file_paths.sort();

    let mut points = vec![];
    for path in &csv_file_paths {
        let mut session = match AnalysisSession::open(path, config.clone()) {
            Ok(session) => session,
            Err(e) => {
                warn!("skipping {path:?}: {e}");
                continue;
            }
        };
        if let Err(e) = session.process(request) {
            warn!("skipping {path:?}: {e}");
            continue;
        }
        points.extend(session.fits().map(|fit| TrendPoint::from_fit(path, fit)));
    }

    info!(
        "{} warming rates from {} logs in {folder:?}",
        points.len(),
        csv_file_paths.len()
    );
    Ok(points)
}
