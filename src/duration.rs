use chrono::Duration;
use itertools::Itertools;
use log::warn;

#[derive(Clone, Copy, Debug, PartialEq)]
enum Token<'a> {
    Number(f64),
    Word(&'a str),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Unit {
    Days,
    Hours,
    Minutes,
}

impl Unit {
    fn from_alias(alias: &str) -> Option<Self> {
        match alias {
            "d" | "day" | "days" => Some(Self::Days),
            "h" | "hour" | "hours" => Some(Self::Hours),
            "m" | "minute" | "minutes" => Some(Self::Minutes),
            _ => None,
        }
    }

    const fn seconds(self) -> f64 {
        match self {
            Self::Days => 86_400.,
            Self::Hours => 3_600.,
            Self::Minutes => 60.,
        }
    }
}

/// Read a colloquial span such as `"24h"`, `"2 days 3h"` or `"90 minutes"`.
///
/// Each number must be followed by a unit, written as a single letter (`d`, `h`, `m`) or a word
/// (`day(s)`, `hour(s)`, `minute(s)`), with or without a space in between. Every recognised
/// quantity is added up and units that never appear count as zero. Text with no recognised
/// quantity yields a zero duration, which leaves every window long enough to fit.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn parse_duration(text: &str) -> Duration {
    let text = text.to_lowercase();
    let quantities = tokenize(&text)
        .tuple_windows()
        .filter_map(|pair| match pair {
            (Token::Number(value), Token::Word(alias)) => {
                Unit::from_alias(alias).map(|unit| value * unit.seconds())
            }
            _ => None,
        })
        .collect::<Vec<_>>();

    if quantities.is_empty() {
        warn!("no duration recognised in {text:?}, using zero");
        return Duration::zero();
    }
    let seconds = quantities.iter().sum::<f64>();
    Duration::milliseconds((seconds * 1000.).round() as i64)
}

fn tokenize(text: &str) -> impl Iterator<Item = Token<'_>> + '_ {
    let mut rest = text;
    std::iter::from_fn(move || loop {
        rest = rest.trim_start_matches(|c: char| !c.is_alphanumeric() && c != '.');
        let first = rest.chars().next()?;
        let (token, remainder) = if first.is_ascii_digit() || first == '.' {
            let end = rest
                .find(|c: char| !(c.is_ascii_digit() || c == '.'))
                .unwrap_or(rest.len());
            let (number, remainder) = rest.split_at(end);
            (number.parse().ok().map(Token::Number), remainder)
        } else {
            let end = rest
                .find(|c: char| c.is_ascii_digit() || c == '.' || !c.is_alphanumeric())
                .unwrap_or(rest.len());
            let (word, remainder) = rest.split_at(end);
            (Some(Token::Word(word)), remainder)
        };
        rest = remainder;
        // Lone dots and similar fragments are skipped
        if token.is_some() {
            return token;
        }
    })
}
