use std::future::Future;
use std::time::Duration;

use time::OffsetDateTime;
use url::Url;

use crate::claim::Claim;
use crate::error::Error;

/// How long a single introspection call may take. There are no retries:
/// a failed call is a hard failure for that request.
const INTROSPECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Verifies an identity token and produces its claim.
///
/// The production implementation is [`GoogleTokenVerifier`]; tests
/// substitute their own.
pub trait TokenVerifier: Send + Sync + 'static {
    /// Obtain the claim behind `id_token` and check it against the policy.
    fn validate_token(
        &self,
        id_token: &str,
    ) -> impl Future<Output = Result<Claim, Error>> + Send;
}

/// Verifies identity tokens with Google's tokeninfo endpoint.
pub struct GoogleTokenVerifier {
    allowed_domains: Vec<String>,
    tokeninfo_url: Url,
    http: reqwest::Client,
}

impl GoogleTokenVerifier {
    /// Create a verifier. An empty `allowed_domains` list accepts any domain.
    #[must_use]
    pub fn new(allowed_domains: Vec<String>) -> Self {
        Self {
            allowed_domains,
            tokeninfo_url: "https://www.googleapis.com/oauth2/v3/tokeninfo"
                .parse()
                .expect("valid default URL"),
            http: reqwest::Client::builder()
                .timeout(INTROSPECTION_TIMEOUT)
                .build()
                .expect("default TLS backend available"),
        }
    }

    /// Override the tokeninfo endpoint.
    #[must_use]
    pub fn with_tokeninfo_url(mut self, url: Url) -> Self {
        self.tokeninfo_url = url;
        self
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Fetch the claim behind `id_token` from the tokeninfo endpoint.
    ///
    /// The token travels as a URL-escaped query parameter. The response
    /// body is parsed regardless of status: Google answers bad tokens with
    /// an error object, which deserializes to an all-empty claim and fails
    /// the policy checks downstream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Introspection`] on transport failure, or
    /// [`Error::MalformedClaim`] if the body is not JSON.
    pub async fn get_claim(&self, id_token: &str) -> Result<Claim, Error> {
        let mut url = self.tokeninfo_url.clone();
        url.query_pairs_mut().append_pair("id_token", id_token);

        let response = self.http.get(url).send().await?;
        let body = response.bytes().await?;
        Claim::from_json(&body)
    }

    /// Evaluate the six policy checks against `claim`.
    ///
    /// Every check runs; the error message names each one with its outcome,
    /// so a failure shows exactly which rules were broken.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClaimPolicy`] if any check fails.
    pub fn is_claim_valid(&self, claim: &Claim) -> Result<(), Error> {
        let expiry: Option<i64> = claim.expiry.parse().ok();
        let email_verified: Option<bool> = claim.email_verified.parse().ok();
        let now = OffsetDateTime::now_utc().unix_timestamp();

        let checks = [
            ("email ok", !claim.email.is_empty()),
            ("email verified ok", email_verified == Some(true)),
            ("expiry is number", expiry.is_some()),
            ("expiry ok", expiry.is_some_and(|exp| exp > now)),
            (
                "issuer ok",
                claim.issuer == "https://accounts.google.com"
                    || claim.issuer == "accounts.google.com",
            ),
            (
                "domain ok",
                self.allowed_domains.is_empty()
                    || self.allowed_domains.iter().any(|d| *d == claim.domain),
            ),
        ];

        let mut ok = true;
        let mut message = String::new();
        for (name, valid) in checks {
            message.push_str(&format!("{name} {valid}\n"));
            ok &= valid;
        }

        if ok { Ok(()) } else { Err(Error::ClaimPolicy(message)) }
    }
}

impl TokenVerifier for GoogleTokenVerifier {
    async fn validate_token(&self, id_token: &str) -> Result<Claim, Error> {
        let claim = self.get_claim(id_token).await?;
        self.is_claim_valid(&claim)?;
        Ok(claim)
    }
}
