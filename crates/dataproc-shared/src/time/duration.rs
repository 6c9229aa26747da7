//! This module contains a common [`Duration`] struct which is able to parse
//! human-readable duration formats, like `5s`, `24h`, `500s` or `1h30m`, which
//! covers both the wire format used by the provider API (whole seconds, e.g.
//! `"600s"`) and the general format used in configuration files.
//!
//! It implements [`Deref`], which enables us to use all associated functions
//! of [`std::time::Duration`] without re-implementing the public functions on
//! our own type.

use std::{
    cmp::Ordering,
    fmt::Display,
    num::ParseIntError,
    ops::{Add, AddAssign, Deref, Div, Mul, Sub, SubAssign},
    str::FromStr,
};

use snafu::{OptionExt, ResultExt, Snafu};
use strum::IntoEnumIterator;

#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(module)]
pub enum DurationParseError {
    #[snafu(display("invalid input, either empty or contains non-ascii characters"))]
    InvalidInput,

    #[snafu(display("unexpected character {chr:?}"))]
    UnexpectedCharacter { chr: char },

    #[snafu(display("fragment with value {value:?} has no unit"))]
    NoUnit { value: u64 },

    #[snafu(display("invalid fragment order, {current} must be before {previous}"))]
    InvalidUnitOrdering {
        previous: DurationUnit,
        current: DurationUnit,
    },

    #[snafu(display("fragment unit {unit} was specified multiple times"))]
    DuplicateUnit { unit: DurationUnit },

    #[snafu(display("failed to parse fragment unit {unit:?}"))]
    ParseUnitError { unit: String },

    #[snafu(display("failed to parse fragment value {value:?} as integer"))]
    ParseIntError { source: ParseIntError, value: String },

    #[snafu(display("duration does not fit into the supported range"))]
    Overflow,
}

/// Coarse classification of a [`DurationParseError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DurationErrorKind {
    /// The input is empty or does not consist of `<value><unit>` fragments
    /// with recognized units.
    Format,

    /// The numeric portion of a fragment is not a valid integer.
    Parse,
}

impl DurationParseError {
    pub fn kind(&self) -> DurationErrorKind {
        match self {
            Self::ParseIntError { .. } | Self::Overflow => DurationErrorKind::Parse,
            _ => DurationErrorKind::Format,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Duration(std::time::Duration);

impl FromStr for Duration {
    type Err = DurationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use duration_parse_error::*;
        let input = s.trim();

        // An empty or non-ascii input is invalid
        if input.is_empty() || !input.is_ascii() {
            return InvalidInputSnafu.fail();
        }

        let mut chars = input.char_indices().peekable();
        let mut duration = std::time::Duration::ZERO;
        let mut last_unit: Option<DurationUnit> = None;

        let mut take_group = |f: fn(char) -> bool| {
            let &(from, _) = chars.peek()?;
            let mut to = None;

            while let Some((i, _)) = chars.next_if(|(_, c)| f(*c)) {
                to = Some(i);
            }

            to.map(|to| &input[from..=to])
        };

        while let Some(value) = take_group(is_value_char) {
            let value = value.parse::<u64>().context(ParseIntSnafu { value })?;

            let Some(unit) = take_group(char::is_alphabetic) else {
                return NoUnitSnafu { value }.fail();
            };

            let unit = unit
                .parse::<DurationUnit>()
                .ok()
                .context(ParseUnitSnafu { unit })?;

            // Check that the unit is smaller than the previous one, and that
            // it wasn't specified multiple times
            if let Some(last_unit) = last_unit {
                match unit.cmp(&last_unit) {
                    Ordering::Less => {
                        return InvalidUnitOrderingSnafu {
                            previous: last_unit,
                            current: unit,
                        }
                        .fail();
                    }
                    Ordering::Equal => return DuplicateUnitSnafu { unit }.fail(),
                    Ordering::Greater => (),
                }
            }

            let millis = value.checked_mul(unit.millis()).context(OverflowSnafu)?;
            duration = duration
                .checked_add(std::time::Duration::from_millis(millis))
                .context(OverflowSnafu)?;
            last_unit = Some(unit);
        }

        // Buffer must not contain any remaining data
        if let Some(&(_, chr)) = chars.peek() {
            return UnexpectedCharacterSnafu { chr }.fail();
        }

        Ok(Self(duration))
    }
}

/// Everything up to the next unit letter belongs to the numeric portion of a
/// fragment, so that `1.5s` is reported as a bad number instead of a bad unit.
fn is_value_char(c: char) -> bool {
    !c.is_ascii_alphabetic()
}

impl Display for Duration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_zero() {
            return write!(f, "0{}", DurationUnit::Seconds);
        }

        let mut millis = self.0.as_millis();

        for unit in DurationUnit::iter() {
            let unit_millis = u128::from(unit.millis());
            let whole = millis / unit_millis;
            let rest = millis % unit_millis;

            if whole > 0 {
                write!(f, "{whole}{unit}")?;
            }

            millis = rest;
        }

        Ok(())
    }
}

impl Deref for Duration {
    type Target = std::time::Duration;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<std::time::Duration> for Duration {
    fn from(value: std::time::Duration) -> Self {
        Self(value)
    }
}

impl From<Duration> for std::time::Duration {
    fn from(value: Duration) -> Self {
        value.0
    }
}

impl Add for Duration {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Duration {
    fn add_assign(&mut self, rhs: Self) {
        self.0.add_assign(rhs.0);
    }
}

impl Sub for Duration {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for Duration {
    fn sub_assign(&mut self, rhs: Self) {
        self.0.sub_assign(rhs.0);
    }
}

impl Mul<u32> for Duration {
    type Output = Self;

    fn mul(self, rhs: u32) -> Self {
        Self(self.0 * rhs)
    }
}

impl Div<u32> for Duration {
    type Output = Self;

    fn div(self, rhs: u32) -> Self {
        Self(self.0 / rhs)
    }
}

impl Duration {
    /// Creates a new [`Duration`] from the specified number of whole seconds.
    pub const fn from_secs(secs: u64) -> Self {
        Self(std::time::Duration::from_secs(secs))
    }

    /// Creates a new [`Duration`] from the specified number of whole minutes.
    ///
    /// Panics on overflow, use it for constants only.
    pub const fn from_minutes_unchecked(minutes: u64) -> Self {
        Self::from_secs(minutes * 60)
    }
}

/// Encodes whole seconds into the provider wire format, e.g. `500` becomes
/// `"500s"`.
pub fn encode_seconds(secs: u64) -> String {
    format!("{secs}{}", DurationUnit::Seconds)
}

/// Decodes any supported duration string into whole seconds. Sub-second
/// remainders are truncated.
pub fn decode_seconds(input: &str) -> Result<u64, DurationParseError> {
    input.parse::<Duration>().map(|duration| duration.as_secs())
}

/// Defines supported [`DurationUnit`]s. Each fragment consists of a numeric
/// value followed by a [`DurationUnit`]. The order of variants **MATTERS**.
/// It is the basis for the correct transformation of the
/// [`std::time::Duration`] back to a human-readable format, which is defined
/// in the [`Display`] implementation of [`Duration`].
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    strum::EnumString,
    strum::Display,
    strum::AsRefStr,
    strum::EnumIter,
)]
pub enum DurationUnit {
    #[strum(serialize = "d")]
    Days,

    #[strum(serialize = "h")]
    Hours,

    #[strum(serialize = "m")]
    Minutes,

    #[strum(serialize = "s")]
    Seconds,

    #[strum(serialize = "ms")]
    Milliseconds,
}

impl DurationUnit {
    /// Returns the number of whole milliseconds in each supported
    /// [`DurationUnit`].
    const fn millis(self) -> u64 {
        match self {
            Self::Days => 24 * Self::Hours.millis(),
            Self::Hours => 60 * Self::Minutes.millis(),
            Self::Minutes => 60 * Self::Seconds.millis(),
            Self::Seconds => 1000,
            Self::Milliseconds => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde::{Deserialize, Serialize};

    use super::*;

    #[rstest]
    #[case("15d2m2s1000ms", 1_296_123)]
    #[case("15d2m2s600ms", 1_296_122)]
    #[case("15d2m2s", 1_296_122)]
    #[case("500s", 500)]
    #[case("5m", 300)]
    #[case("70m", 4200)]
    #[case("1h", 3600)]
    #[case("1s", 1)]
    #[case(" 600s ", 600)]
    fn parse_as_secs(#[case] input: &str, #[case] output: u64) {
        assert_eq!(decode_seconds(input).unwrap(), output);
    }

    #[rstest]
    #[case("", DurationParseError::InvalidInput)]
    #[case(" ", DurationParseError::InvalidInput)]
    #[case("1ä", DurationParseError::InvalidInput)]
    #[case("1D", DurationParseError::ParseUnitError { unit: "D".into() })]
    #[case("500", DurationParseError::NoUnit { value: 500 })]
    #[case("2d2", DurationParseError::NoUnit { value: 2 })]
    #[case("s", DurationParseError::UnexpectedCharacter { chr: 's' })]
    #[case("15d2h1d", DurationParseError::InvalidUnitOrdering { previous: DurationUnit::Hours, current: DurationUnit::Days })]
    #[case("15d2d", DurationParseError::DuplicateUnit { unit: DurationUnit::Days })]
    fn parse_format_errors(#[case] input: &str, #[case] expected_err: DurationParseError) {
        let err = Duration::from_str(input).unwrap_err();
        assert_eq!(err.kind(), DurationErrorKind::Format);
        assert_eq!(err, expected_err);
    }

    #[rstest]
    #[case("1.5s")]
    #[case("-5s")]
    #[case("99999999999999999999999s")]
    fn parse_numeric_errors(#[case] input: &str) {
        let err = Duration::from_str(input).unwrap_err();
        assert_eq!(err.kind(), DurationErrorKind::Parse);
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(300)]
    #[case(86_400)]
    #[case(u64::MAX / 1000)]
    fn wire_encoding_round_trips(#[case] secs: u64) {
        assert_eq!(decode_seconds(&encode_seconds(secs)).unwrap(), secs);
    }

    #[rstest]
    #[case("70m", Some("1h10m"))]
    #[case("600s", Some("10m"))]
    #[case("15d2m2s", None)]
    #[case("1h20m", None)]
    #[case("1s", None)]
    fn to_string(#[case] input: &str, #[case] expected: Option<&str>) {
        let dur: Duration = input.parse().unwrap();
        match expected {
            Some(e) => assert_eq!(dur.to_string(), e),
            None => assert_eq!(dur.to_string(), input),
        }
    }

    #[test]
    fn zero_is_displayed_in_seconds() {
        assert_eq!(Duration::default().to_string(), "0s");
    }

    #[test]
    fn deserialize() {
        #[derive(Deserialize)]
        struct S {
            dur: Duration,
        }

        let s: S = serde_yaml::from_str("dur: 10m").unwrap();
        assert_eq!(s.dur, Duration::from_minutes_unchecked(10));
    }

    #[test]
    fn serialize() {
        #[derive(Serialize)]
        struct S {
            dur: Duration,
        }

        let s = S {
            dur: "5m".parse().unwrap(),
        };
        assert_eq!(serde_yaml::to_string(&s).unwrap(), "dur: 5m\n");
    }

    #[test]
    fn ops() {
        let mut dur = Duration::from_str("20s").unwrap();
        assert_eq!((dur + Duration::from_secs(10)).as_secs(), 30);
        assert_eq!((dur - Duration::from_secs(10)).as_secs(), 10);
        assert_eq!((dur * 3).as_secs(), 60);
        assert_eq!((dur / 2).as_secs(), 10);

        dur += Duration::from_secs(10);
        assert_eq!(dur.as_secs(), 30);
        dur -= Duration::from_secs(5);
        assert_eq!(dur.as_secs(), 25);
    }
}
