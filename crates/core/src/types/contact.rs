//! Contact details: email addresses and delivery addresses.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`Email`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    /// The input is empty after trimming.
    #[error("email cannot be empty")]
    Empty,
    /// The input is longer than RFC 5321 allows.
    #[error("email must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input is not `local@domain` with exactly one `@`.
    #[error("email must look like name@domain")]
    Malformed,
}

/// A normalized (trimmed, lowercased) email address.
///
/// ```
/// use mercato_core::Email;
///
/// assert_eq!(Email::parse(" Ada@Example.com ").unwrap().as_str(), "ada@example.com");
/// assert!(Email::parse("no-at-symbol").is_err());
/// assert!(Email::parse("a@b@c").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Maximum length of an email address (RFC 5321).
    pub const MAX_LENGTH: usize = 254;

    /// Parse and normalize an email address.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, too long, or does not have a
    /// non-empty local part and domain around a single `@`.
    pub fn parse(s: &str) -> Result<Self, EmailError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(EmailError::Empty);
        }
        if trimmed.len() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        let mut parts = trimmed.split('@');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(local), Some(domain), None) if !local.is_empty() && !domain.is_empty() => {
                Ok(Self(trimmed.to_lowercase()))
            }
            _ => Err(EmailError::Malformed),
        }
    }

    /// Returns the email address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Email {
    type Error = EmailError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

/// Field-level problems with an [`Address`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("address is missing: {}", .missing.join(", "))]
pub struct AddressError {
    /// Names of the blank or missing fields.
    pub missing: Vec<&'static str>,
}

/// A structured delivery address.
///
/// Equality is structural: two addresses with the same four fields are the
/// same address, which is how saved-address deduplication works.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Address {
    pub line1: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

impl Address {
    /// Build an address from optional parts, trimming each one.
    ///
    /// # Errors
    ///
    /// Returns every field that is missing or blank.
    pub fn from_parts(
        line1: Option<&str>,
        city: Option<&str>,
        state: Option<&str>,
        zip: Option<&str>,
    ) -> Result<Self, AddressError> {
        let fields = [("line1", line1), ("city", city), ("state", state), ("zip", zip)];
        let missing: Vec<&'static str> = fields
            .iter()
            .filter(|(_, value)| value.is_none_or(|v| v.trim().is_empty()))
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(AddressError { missing });
        }

        let take = |value: Option<&str>| value.unwrap_or_default().trim().to_owned();
        Ok(Self {
            line1: take(line1),
            city: take(city),
            state: take(state),
            zip: take(zip),
        })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {} {}", self.line1, self.city, self.state, self.zip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_normalized() {
        let email = Email::parse("  Someone@Shop.IN ").expect("valid");
        assert_eq!(email.as_str(), "someone@shop.in");
    }

    #[test]
    fn email_rejections() {
        assert_eq!(Email::parse("   "), Err(EmailError::Empty));
        assert_eq!(Email::parse("@shop.in"), Err(EmailError::Malformed));
        assert_eq!(Email::parse("someone@"), Err(EmailError::Malformed));
        assert_eq!(Email::parse("a@b@c"), Err(EmailError::Malformed));
        let long = format!("{}@x.io", "a".repeat(260));
        assert!(matches!(Email::parse(&long), Err(EmailError::TooLong { .. })));
    }

    #[test]
    fn email_deserialization_validates() {
        let ok: Result<Email, _> = serde_json::from_str("\"a@b.co\"");
        assert!(ok.is_ok());
        let bad: Result<Email, _> = serde_json::from_str("\"nope\"");
        assert!(bad.is_err());
    }

    #[test]
    fn address_reports_every_missing_field() {
        let err = Address::from_parts(Some("12 MG Road"), None, Some("  "), Some("560001"))
            .expect_err("city and state are missing");
        assert_eq!(err.missing, vec!["city", "state"]);
    }

    #[test]
    fn address_equality_is_structural() {
        let a = Address::from_parts(Some("12 MG Road"), Some("Bengaluru"), Some("KA"), Some("560001"))
            .expect("valid");
        let b = Address::from_parts(
            Some(" 12 MG Road "),
            Some("Bengaluru"),
            Some("KA"),
            Some("560001"),
        )
        .expect("valid");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "12 MG Road, Bengaluru, KA 560001");
    }
}
