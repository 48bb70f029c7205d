use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;

use crate::error::Error;

/// Process-wide configuration, loaded once at startup and immutable
/// afterwards.
pub struct Configuration {
    /// Seals the session cookie. Must be 32 bytes of random data.
    pub session_encryption_key: [u8; 32],
    /// Name of the session cookie.
    pub cookie_name: String,
    /// Whether cookies are issued with the `Secure` flag. When set, cookies
    /// cannot travel over plain HTTP; SSL must already be in place.
    pub set_secure_flag: bool,
    /// Google OAuth client id, rendered into the sign-in page.
    pub google_auth_client_id: String,
    /// GSuite domains permitted to access the content. Empty means any
    /// domain is accepted.
    pub google_allowed_domains: Vec<String>,
}

impl Configuration {
    /// Load the configuration from environment variables.
    ///
    /// Reads `SESSION_ENCRYPTION_KEY` (base64, 32 bytes once decoded),
    /// `COOKIE_NAME`, `SET_SECURE_FLAG`, `GOOGLE_AUTH_CLIENT_ID` and
    /// `GOOGLE_ALLOWED_DOMAINS` (comma-separated, or `*` to accept any
    /// domain).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming every problem found, not just the
    /// first.
    pub fn from_env() -> Result<Self, Error> {
        let mut errs = Vec::new();

        let key = decode_session_key(&env_var("SESSION_ENCRYPTION_KEY"))
            .map_err(|e| errs.push(format!("SESSION_ENCRYPTION_KEY: {e}")))
            .ok();

        let cookie_name = match env_var("COOKIE_NAME") {
            name if name.is_empty() => {
                errs.push("COOKIE_NAME: not set".to_owned());
                None
            }
            name => Some(name),
        };

        let set_secure_flag = parse_flag(&env_var("SET_SECURE_FLAG"))
            .map_err(|e| errs.push(format!("SET_SECURE_FLAG: {e}")))
            .ok();

        let client_id = match env_var("GOOGLE_AUTH_CLIENT_ID") {
            id if id.is_empty() => {
                errs.push("GOOGLE_AUTH_CLIENT_ID: not set".to_owned());
                None
            }
            id => Some(id),
        };

        let allowed_domains = parse_allowed_domains(&env_var("GOOGLE_ALLOWED_DOMAINS"))
            .map_err(|e| errs.push(format!("GOOGLE_ALLOWED_DOMAINS: {e}")))
            .ok();

        match (key, cookie_name, set_secure_flag, client_id, allowed_domains) {
            (Some(key), Some(cookie_name), Some(secure), Some(client_id), Some(domains))
                if errs.is_empty() =>
            {
                Ok(Self {
                    session_encryption_key: key,
                    cookie_name,
                    set_secure_flag: secure,
                    google_auth_client_id: client_id,
                    google_allowed_domains: domains,
                })
            }
            _ => Err(Error::Config(errs.join(", "))),
        }
    }
}

fn env_var(name: &str) -> String {
    std::env::var(name).unwrap_or_default()
}

/// Decode the base64 session key. Padded and unpadded input are both
/// accepted; the decoded key must be exactly 32 bytes.
fn decode_session_key(value: &str) -> Result<[u8; 32], String> {
    if value.is_empty() {
        return Err("not set".to_owned());
    }
    let bytes = STANDARD_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|e| format!("invalid base64: {e}"))?;
    <[u8; 32]>::try_from(bytes.as_slice())
        .map_err(|_| format!("expected 32 bytes when base64 decoded, got {}", bytes.len()))
}

fn parse_flag(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "t" | "true" => Ok(true),
        "0" | "f" | "false" => Ok(false),
        other => Err(format!("not set or invalid value: '{other}'")),
    }
}

/// Parse the allowed-domain list. A literal `*` means unrestricted (an
/// empty allow-list); being unrestricted must be said explicitly, so an
/// empty or all-blank value is an error rather than accept-all.
fn parse_allowed_domains(value: &str) -> Result<Vec<String>, String> {
    match value.trim() {
        "" => Err("not set".to_owned()),
        "*" => Ok(Vec::new()),
        list => {
            let domains: Vec<String> = list
                .split(',')
                .map(|domain| domain.trim().to_owned())
                .filter(|domain| !domain.is_empty())
                .collect();
            if domains.is_empty() {
                return Err(format!("no usable domains in '{list}'"));
            }
            Ok(domains)
        }
    }
}
