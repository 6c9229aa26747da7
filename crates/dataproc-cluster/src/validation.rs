//! Validation of declarative cluster specifications.
//!
//! These checks mirror the rules enforced by the provider, which allows us to reject malformed
//! specifications before a single request is sent and an operation has to be waited on.

use std::{fmt::Display, sync::LazyLock};

use regex::Regex;
use snafu::Snafu;

/// Maximum length of a cluster name accepted by the provider.
pub const CLUSTER_NAME_MAX_LENGTH: usize = 55;
const CLUSTER_NAME_FMT: &str = "[a-z]([-a-z0-9]*[a-z0-9])?";
const CLUSTER_NAME_ERROR_MSG: &str = "a cluster name must consist of lower case alphanumeric characters or '-', start with a letter, and end with a letter or a number";

/// Smallest boot disk the provider can attach to a cluster instance.
pub const MIN_BOOT_DISK_SIZE_GB: u32 = 10;

static CLUSTER_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{CLUSTER_NAME_FMT}$")).expect("failed to compile cluster name regex")
});

type Result<T = (), E = Errors> = std::result::Result<T, E>;

/// A collection of errors discovered during validation.
#[derive(Debug)]
pub struct Errors(Vec<Error>);

impl Errors {
    pub fn iter(&self) -> impl Iterator<Item = &Error> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl IntoIterator for Errors {
    type IntoIter = std::vec::IntoIter<Error>;
    type Item = Error;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl Display for Errors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            let prefix = match i {
                0 => "",
                _ => ", ",
            };
            write!(f, "{prefix}{error}")?;
        }
        Ok(())
    }
}
impl std::error::Error for Errors {}

/// A single validation error.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(transparent)]
    Regex { source: RegexError },

    #[snafu(display("input is {length} bytes long but must be no more than {max_length}"))]
    TooLong { length: usize, max_length: usize },

    #[snafu(display("{field} is {value} but must be at least {min}"))]
    TooSmall {
        field: String,
        value: u32,
        min: u32,
    },

    #[snafu(display("{first} conflicts with {second}, only one of them may be set"))]
    ConflictingFields {
        first: &'static str,
        second: &'static str,
    },

    #[snafu(display("zone is mandatory when region is set to {region:?}"))]
    MissingZone { region: String },

    #[snafu(display("at most one {block} block may be specified, found {count}"))]
    TooManyBlocks { block: String, count: usize },
}

#[derive(Debug)]
pub struct RegexError {
    /// The primary error message.
    msg: &'static str,

    /// The regex that the input must match.
    regex: &'static str,

    /// Examples of valid inputs (if non-empty).
    examples: &'static [&'static str],
}

impl Display for RegexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self {
            msg,
            regex,
            examples,
        } = self;
        write!(f, "{msg} (")?;
        for (i, example) in examples.iter().enumerate() {
            let prefix = match i {
                0 => "e.g.",
                _ => "or",
            };
            write!(f, "{prefix} {example:?}, ")?;
        }
        write!(f, "regex used for validation is {regex:?})")
    }
}

impl std::error::Error for RegexError {}

/// Returns [`Ok`] if `value`'s length fits within `max_length`.
fn validate_str_length(value: &str, max_length: usize) -> Result<(), Error> {
    if value.len() > max_length {
        TooLongSnafu {
            length: value.len(),
            max_length,
        }
        .fail()
    } else {
        Ok(())
    }
}

/// Returns [`Ok`] if `value` matches `regex`.
fn validate_str_regex(
    value: &str,
    regex: &'static Regex,
    error_msg: &'static str,
    examples: &'static [&'static str],
) -> Result<(), Error> {
    if regex.is_match(value) {
        Ok(())
    } else {
        Err(RegexError {
            msg: error_msg,
            regex: regex
                .as_str()
                // Clean up start/end-of-line markers
                .trim_start_matches('^')
                .trim_end_matches('$'),
            examples,
        }
        .into())
    }
}

/// Returns [`Ok`] if *all* validations are [`Ok`], otherwise returns all errors.
pub(crate) fn validate_all(validations: impl IntoIterator<Item = Result<(), Error>>) -> Result {
    let errors = validations
        .into_iter()
        .filter_map(Result::err)
        .collect::<Vec<_>>();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Errors(errors))
    }
}

/// Tests whether `value` is accepted by the provider as a cluster name.
pub fn is_cluster_name(value: &str) -> Result {
    validate_all([
        validate_str_length(value, CLUSTER_NAME_MAX_LENGTH),
        validate_str_regex(
            value,
            &CLUSTER_NAME_REGEX,
            CLUSTER_NAME_ERROR_MSG,
            &["my-cluster", "etl-2"],
        ),
    ])
}

/// Tests whether a boot disk of `size_gb` can be attached. `field` names the
/// offending attribute in the error.
pub fn is_boot_disk_size(field: &str, size_gb: u32) -> Result<(), Error> {
    if size_gb < MIN_BOOT_DISK_SIZE_GB {
        TooSmallSnafu {
            field,
            value: size_gb,
            min: MIN_BOOT_DISK_SIZE_GB,
        }
        .fail()
    } else {
        Ok(())
    }
}
