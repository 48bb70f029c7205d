use serde::Deserialize;

use crate::error::Error;

/// The fields of a Google identity assertion, as returned by the
/// tokeninfo endpoint.
///
/// Everything arrives as a string — including the expiry timestamp and the
/// email-verified flag — and must be parsed, not trusted as already typed.
/// Absent fields deserialize to empty strings.
#[derive(Debug, Clone, Default, Deserialize)]
#[non_exhaustive]
pub struct Claim {
    /// Should be `https://accounts.google.com` or `accounts.google.com`.
    #[serde(rename = "iss", default)]
    pub issuer: String,
    /// Seconds since epoch, e.g. `"1433981953"`. Should not be in the past.
    #[serde(rename = "exp", default)]
    pub expiry: String,
    /// e.g. `"testuser@gmail.com"`.
    #[serde(default)]
    pub email: String,
    /// `"true"` once Google has verified the address.
    #[serde(default)]
    pub email_verified: String,
    /// e.g. `"Test User"`.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub picture: String,
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub family_name: String,
    /// The GSuite domain, e.g. `"example.com"`. Absent for plain accounts.
    #[serde(rename = "hd", default)]
    pub domain: String,
}

impl Claim {
    /// Parse a claim from a tokeninfo JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedClaim`] if the body is not valid JSON.
    pub fn from_json(body: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(body).map_err(Into::into)
    }

    /// Set the issuer.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Set the expiry timestamp (seconds since epoch, as a string).
    #[must_use]
    pub fn with_expiry(mut self, expiry: impl Into<String>) -> Self {
        self.expiry = expiry.into();
        self
    }

    /// Set the email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    /// Set the email-verified flag (a string, like the wire format).
    #[must_use]
    pub fn with_email_verified(mut self, verified: impl Into<String>) -> Self {
        self.email_verified = verified.into();
        self
    }

    /// Set the GSuite domain.
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }
}
