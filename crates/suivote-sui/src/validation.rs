// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Validation of user input before a transaction is built.

use std::{fmt, str::FromStr, sync::LazyLock};

use itertools::Itertools as _;
use regex::Regex;
use sui_types::base_types::SuiAddress;
use url::Url;

static SUI_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]{64}$").expect("this regex is valid"));

/// Maximum length of titles and names, in characters.
pub const MAX_TITLE_LENGTH: usize = 256;

/// An invalid value of a single field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Not a `0x`-prefixed 32-byte hex address.
    #[error("'{0}' is not a valid Sui address")]
    InvalidAddress(String),
    /// A required text is empty or only whitespace.
    #[error("must not be empty")]
    Empty,
    /// A text exceeds [`MAX_TITLE_LENGTH`].
    #[error("must be at most {max} characters long")]
    TooLong {
        /// The maximum number of characters.
        max: usize,
    },
    /// The expiration is not after the current time.
    #[error("the expiration date must be in the future")]
    ExpirationNotInFuture {
        /// The requested expiration in milliseconds since the epoch.
        expiration_ms: u64,
        /// The current time in milliseconds since the epoch.
        now_ms: u64,
    },
    /// Not an absolute `http` or `https` URL.
    #[error("'{0}' is not a valid http(s) URL")]
    InvalidUrl(String),
}

/// A [`ValidationError`] with the field it applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// The name of the field.
    pub field: &'static str,
    /// The error.
    pub error: ValidationError,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.error)
    }
}

/// All field errors of one input form.
#[derive(Debug, Clone, Default, PartialEq, Eq, thiserror::Error)]
#[error("invalid input: {}", .errors.iter().join("; "))]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// The individual errors, in the order the fields were checked.
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// The error of `field`, if any.
    pub fn field(&self, field: &str) -> Option<&ValidationError> {
        self.errors
            .iter()
            .find(|error| error.field == field)
            .map(|error| &error.error)
    }
}

impl From<FieldError> for ValidationErrors {
    fn from(error: FieldError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

/// Parses a full-length, `0x`-prefixed Sui address.
pub fn parse_address(input: &str) -> Result<SuiAddress, ValidationError> {
    let input = input.trim();
    if !SUI_ADDRESS.is_match(input) {
        return Err(ValidationError::InvalidAddress(input.to_owned()));
    }
    SuiAddress::from_str(input).map_err(|_| ValidationError::InvalidAddress(input.to_owned()))
}

/// Collects field errors of one form.
///
/// ```
/// # use suivote_sui::validation::Validator;
/// let mut validator = Validator::new();
/// validator.non_empty("title", "  ");
/// validator.future_expiration("expiration", 1_000, 2_000);
/// let errors = validator.finish().unwrap_err();
/// assert_eq!(errors.errors().len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    /// Creates a validator without errors.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, field: &'static str, error: ValidationError) {
        self.errors.push(FieldError { field, error });
    }

    /// Checks that `input` is a Sui address and returns it.
    pub fn address(&mut self, field: &'static str, input: &str) -> Option<SuiAddress> {
        parse_address(input)
            .inspect_err(|error| self.push(field, error.clone()))
            .ok()
    }

    /// Checks that `input` has visible characters and is not too long.
    pub fn non_empty(&mut self, field: &'static str, input: &str) {
        if input.trim().is_empty() {
            self.push(field, ValidationError::Empty);
        } else if input.chars().count() > MAX_TITLE_LENGTH {
            self.push(
                field,
                ValidationError::TooLong {
                    max: MAX_TITLE_LENGTH,
                },
            );
        }
    }

    /// Checks that `expiration_ms` is strictly after `now_ms`.
    pub fn future_expiration(&mut self, field: &'static str, expiration_ms: u64, now_ms: u64) {
        if expiration_ms <= now_ms {
            self.push(
                field,
                ValidationError::ExpirationNotInFuture {
                    expiration_ms,
                    now_ms,
                },
            );
        }
    }

    /// Checks that `input`, if given, is an absolute http(s) URL.
    pub fn optional_url(&mut self, field: &'static str, input: Option<&str>) {
        let Some(input) = input else {
            return;
        };
        let valid = Url::parse(input.trim())
            .is_ok_and(|url| matches!(url.scheme(), "http" | "https") && url.has_host());
        if !valid {
            self.push(field, ValidationError::InvalidUrl(input.to_owned()));
        }
    }

    /// Returns all collected errors, if any.
    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors {
                errors: self.errors,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS: &str = "0x00000000000000000000000000000000000000000000000000000000000000aa";

    #[test]
    fn addresses_must_be_full_length_hex() {
        assert!(parse_address(ADDRESS).is_ok());
        assert!(parse_address(&format!(" {ADDRESS} ")).is_ok());
        for invalid in ["", "0xaa", "aa", &ADDRESS[2..], &format!("{ADDRESS}0"), "0xzz"] {
            assert_eq!(
                parse_address(invalid),
                Err(ValidationError::InvalidAddress(invalid.trim().to_owned())),
            );
        }
    }

    #[test]
    fn errors_are_reported_per_field() {
        let mut validator = Validator::new();
        validator.non_empty("title", "Budget 2025");
        validator.non_empty("description", " ");
        validator.future_expiration("expiration", 5_000, 5_000);
        validator.optional_url("image_url", Some("ftp://example.com/a.png"));
        assert!(validator.address("voter", "0x1").is_none());

        let errors = validator.finish().expect_err("the form is invalid");

        assert_eq!(errors.errors().len(), 4);
        assert_eq!(errors.field("title"), None);
        assert_eq!(errors.field("description"), Some(&ValidationError::Empty));
        assert!(matches!(
            errors.field("expiration"),
            Some(ValidationError::ExpirationNotInFuture { .. })
        ));
        assert!(matches!(
            errors.field("image_url"),
            Some(ValidationError::InvalidUrl(_))
        ));
        assert!(errors.to_string().starts_with("invalid input: description"));
    }

    #[test]
    fn valid_input_passes() {
        let mut validator = Validator::new();
        validator.non_empty("name", "Alice");
        validator.future_expiration("expiration", 5_001, 5_000);
        validator.optional_url("image_url", Some("https://example.com/alice.png"));
        validator.optional_url("other_url", None);
        assert!(validator.address("voter", ADDRESS).is_some());

        assert!(validator.finish().is_ok());
    }

    #[test]
    fn overly_long_titles_are_rejected() {
        let mut validator = Validator::new();
        validator.non_empty("title", &"x".repeat(MAX_TITLE_LENGTH + 1));
        let errors = validator.finish().expect_err("the title is too long");
        assert_eq!(
            errors.field("title"),
            Some(&ValidationError::TooLong {
                max: MAX_TITLE_LENGTH
            })
        );
    }
}
