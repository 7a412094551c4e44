use chrono::{Duration, NaiveDate, NaiveDateTime};
use ndarray::Array1;

use crate::error::ParseError;
use crate::series::TIMESTAMP_FORMAT;

/// A closed span of time `[start, end]`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    #[must_use]
    pub const fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// Build a window from two timestamps written as `YYYY/MM/DD HH:MM:SS`
    ///
    /// # Errors
    /// Returns [`ParseError::WindowBound`] if either bound is malformed.
    pub fn parse(start: &str, end: &str) -> Result<Self, ParseError> {
        let parse = |raw: &str| {
            NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT).map_err(|source| {
                ParseError::WindowBound {
                    value: raw.to_owned(),
                    source,
                }
            })
        };
        Ok(Self::new(parse(start)?, parse(end)?))
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    #[must_use]
    pub fn midpoint(&self) -> NaiveDateTime {
        self.start + self.duration() / 2
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.midpoint().date()
    }

    /// Shrink the window by `lead` at the start and `tail` at the end.
    ///
    /// The result can be empty or inverted when the window is shorter than `lead + tail`.
    #[must_use]
    pub fn truncated(&self, lead: Duration, tail: Duration) -> Self {
        Self::new(self.start + lead, self.end - tail)
    }

    #[must_use]
    pub fn contains(&self, timestamp: &NaiveDateTime) -> bool {
        (self.start..=self.end).contains(timestamp)
    }

    /// Flag every timestamp falling inside the window (bounds inclusive)
    #[must_use]
    pub fn mask_between(&self, timestamps: &[NaiveDateTime]) -> Array1<bool> {
        timestamps
            .iter()
            .map(|timestamp| self.contains(timestamp))
            .collect()
    }

    /// Whether both bounds lie strictly inside `outer`
    #[must_use]
    pub fn is_interior_to(&self, outer: &Self) -> bool {
        self.start > outer.start && self.end < outer.end
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::TimeWindow;
    use crate::error::ParseError;
    use crate::series::tests::at;

    #[test]
    fn midpoints_split_the_window() {
        let window = TimeWindow::parse("2021/03/05 00:00:00", "2021/03/07 12:00:00").unwrap();
        assert_eq!(window.midpoint(), at("2021/03/06 06:00:00"));
        assert_eq!(window.duration(), Duration::hours(60));
    }

    #[test]
    fn truncation_trims_both_ends() {
        let window = TimeWindow::new(at("2021/03/05 00:00:00"), at("2021/03/06 00:00:00"));
        let inner = window.truncated(Duration::hours(1), Duration::minutes(10));
        assert_eq!(inner.start, at("2021/03/05 01:00:00"));
        assert_eq!(inner.end, at("2021/03/05 23:50:00"));
        assert!(inner.is_interior_to(&window));
        assert!(!window.is_interior_to(&window));
    }

    #[test]
    fn masks_include_both_bounds() {
        let timestamps = [
            at("2021/03/05 00:00:00"),
            at("2021/03/05 00:10:00"),
            at("2021/03/05 00:20:00"),
            at("2021/03/05 00:30:00"),
        ];
        let window = TimeWindow::new(timestamps[1], timestamps[2]);
        assert_eq!(
            window.mask_between(&timestamps).to_vec(),
            vec![false, true, true, false]
        );
    }

    #[test]
    fn malformed_bounds_are_rejected() {
        match TimeWindow::parse("2021/03/05 00:00:00", "yesterday") {
            Err(ParseError::WindowBound { value, .. }) => assert_eq!(value, "yesterday"),
            other => panic!("expected a bound error, got {other:?}"),
        }
    }
}
