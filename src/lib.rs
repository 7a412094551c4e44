#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
// #![warn(clippy::cargo)]

extern crate blas_src;

pub mod cold;
pub mod config;
pub mod duration;
pub mod error;
pub mod fit;
pub mod mask;
pub mod math;
pub mod resample;
pub mod series;
pub mod session;
pub mod trend;
pub mod window;

pub use config::AnalysisConfig;
pub use error::{Error, FitError, ParseError};
pub use session::{AnalysisSession, FitResult, ProcessRequest, SkipReason, WindowOutcome};
pub use window::TimeWindow;

pub type Result<T> = ::std::result::Result<T, Error>;
