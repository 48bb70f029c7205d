use axum::http::{HeaderMap, HeaderValue, Response, header};
use cookie::{Cookie, CookieJar, Key, SameSite};
use serde_json::{Map, Value};

use crate::error::Error;

/// The one session entry the gate recognizes.
const EMAIL_ADDRESS_KEY: &str = "emailAddress";

/// Determines how a user is logged in to the system.
///
/// The production implementation is [`SealedCookieSession`]. Any alternate
/// backend must honor the same contract: an absent session is a normal
/// outcome, an unopenable one is an error.
pub trait SessionStore: Send + Sync + 'static {
    /// Check the request for a valid session.
    ///
    /// Returns `Ok(Some(email))` for a logged-in user, `Ok(None)` when no
    /// session exists (no cookie, or no usable `emailAddress` entry).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Session`] when a session cookie is present but
    /// cannot be opened (tampered value or wrong key). Never swallowed.
    fn validate(&self, headers: &HeaderMap) -> Result<Option<String>, Error>;

    /// Create or overwrite the session, recording `email_address`.
    ///
    /// Reads any existing session from the request headers, sets the
    /// `emailAddress` entry and reseals. Returns the cookie to set on the
    /// response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Session`] if an existing session cookie cannot be
    /// opened or the new one cannot be sealed.
    fn start(&self, headers: &HeaderMap, email_address: &str) -> Result<Cookie<'static>, Error>;

    /// [`start`](Self::start) a session and write it onto `response` as a
    /// `Set-Cookie` header.
    ///
    /// # Errors
    ///
    /// Propagates [`start`](Self::start) failures.
    fn start_on_response<B>(
        &self,
        response: &mut Response<B>,
        request_headers: &HeaderMap,
        email_address: &str,
    ) -> Result<(), Error>
    where
        Self: Sized,
    {
        let cookie = self.start(request_headers, email_address)?;
        let value = HeaderValue::from_str(&cookie.to_string())
            .map_err(|e| Error::Session(format!("failed to encode the session cookie: {e}")))?;
        response.headers_mut().append(header::SET_COOKIE, value);
        Ok(())
    }
}

/// Session state sealed into a single encrypted, tamper-evident cookie.
///
/// The payload is a JSON object; sealing uses authenticated encryption
/// keyed by a key derived from the process-wide 32-byte secret, so any
/// bit-flip on the cookie value fails to open rather than misparse.
pub struct SealedCookieSession {
    key: Key,
    cookie_name: String,
    secure: bool,
}

impl SealedCookieSession {
    /// Create a session store sealing with `encryption_key`.
    ///
    /// `secure` controls the cookie's `Secure` flag; `HttpOnly` is
    /// always set.
    #[must_use]
    pub fn new(encryption_key: &[u8; 32], secure: bool, cookie_name: impl Into<String>) -> Self {
        Self {
            key: Key::derive_from(encryption_key),
            cookie_name: cookie_name.into(),
            secure,
        }
    }

    /// Find our cookie among the request's `Cookie` headers.
    fn request_cookie(&self, headers: &HeaderMap) -> Option<Cookie<'static>> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|part| Cookie::parse(part.trim().to_owned()).ok())
            .find(|cookie| cookie.name() == self.cookie_name)
    }

    /// Open the sealed session carried by the request, if any.
    ///
    /// `Ok(None)` when no cookie is present; `Err` when one is present but
    /// fails authenticated decryption. A payload that decrypts but is not a
    /// JSON object counts as an empty session, not an error.
    fn open(&self, headers: &HeaderMap) -> Result<Option<Map<String, Value>>, Error> {
        let Some(sealed) = self.request_cookie(headers) else {
            return Ok(None);
        };

        let mut jar = CookieJar::new();
        jar.add_original(sealed);
        let cookie = jar.private(&self.key).get(&self.cookie_name).ok_or_else(|| {
            Error::Session(format!(
                "failed to open the sealed cookie {:?}: tampered value or wrong key",
                self.cookie_name
            ))
        })?;

        Ok(Some(
            serde_json::from_str(cookie.value()).unwrap_or_default(),
        ))
    }
}

impl SessionStore for SealedCookieSession {
    fn validate(&self, headers: &HeaderMap) -> Result<Option<String>, Error> {
        let Some(values) = self.open(headers)? else {
            return Ok(None);
        };
        Ok(values
            .get(EMAIL_ADDRESS_KEY)
            .and_then(Value::as_str)
            .map(str::to_owned))
    }

    fn start(&self, headers: &HeaderMap, email_address: &str) -> Result<Cookie<'static>, Error> {
        let mut values = self.open(headers)?.unwrap_or_default();
        values.insert(
            EMAIL_ADDRESS_KEY.to_owned(),
            Value::String(email_address.to_owned()),
        );
        let payload = serde_json::to_string(&values)
            .map_err(|e| Error::Session(format!("failed to serialize the session: {e}")))?;

        let mut jar = CookieJar::new();
        jar.private_mut(&self.key).add(
            Cookie::build((self.cookie_name.clone(), payload))
                .http_only(true)
                .secure(self.secure)
                .same_site(SameSite::Lax)
                .path("/")
                .build(),
        );
        jar.get(&self.cookie_name).cloned().ok_or_else(|| {
            Error::Session(format!(
                "failed to seal the session cookie {:?}",
                self.cookie_name
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8; 32] = b"0123456789abcdef0123456789abcdef";
    const OTHER_KEY: &[u8; 32] = b"fedcba9876543210fedcba9876543210";

    fn session() -> SealedCookieSession {
        SealedCookieSession::new(KEY, false, "cookie-name")
    }

    fn headers_with_cookie(name: &str, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("{name}={value}")).unwrap(),
        );
        headers
    }

    #[test]
    fn no_cookie_is_not_logged_in_and_not_an_error() {
        assert_eq!(session().validate(&HeaderMap::new()).unwrap(), None);
    }

    #[test]
    fn a_started_session_round_trips() {
        let s = session();
        let cookie = s.start(&HeaderMap::new(), "test@example.com").unwrap();

        let headers = headers_with_cookie(cookie.name(), cookie.value());
        assert_eq!(
            s.validate(&headers).unwrap(),
            Some("test@example.com".to_owned())
        );
    }

    #[test]
    fn starting_again_overwrites_the_email() {
        let s = session();
        let first = s.start(&HeaderMap::new(), "first@example.com").unwrap();

        let headers = headers_with_cookie(first.name(), first.value());
        let second = s.start(&headers, "second@example.com").unwrap();

        let headers = headers_with_cookie(second.name(), second.value());
        assert_eq!(
            s.validate(&headers).unwrap(),
            Some("second@example.com".to_owned())
        );
    }

    #[test]
    fn the_cookie_carries_the_configured_flags() {
        let cookie = session().start(&HeaderMap::new(), "test@example.com").unwrap();
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(false));

        let secure = SealedCookieSession::new(KEY, true, "cookie-name")
            .start(&HeaderMap::new(), "test@example.com")
            .unwrap();
        assert_eq!(secure.http_only(), Some(true));
        assert_eq!(secure.secure(), Some(true));
    }

    #[test]
    fn a_cookie_sealed_with_a_different_key_fails_to_open() {
        let cookie = SealedCookieSession::new(OTHER_KEY, false, "cookie-name")
            .start(&HeaderMap::new(), "test@example.com")
            .unwrap();

        let headers = headers_with_cookie(cookie.name(), cookie.value());
        assert!(matches!(
            session().validate(&headers),
            Err(Error::Session(_))
        ));
    }

    #[test]
    fn a_tampered_cookie_fails_to_open() {
        let s = session();
        let cookie = s.start(&HeaderMap::new(), "test@example.com").unwrap();

        let mut value = cookie.value().to_owned();
        let flipped = if value.ends_with('A') { 'B' } else { 'A' };
        value.pop();
        value.push(flipped);

        let headers = headers_with_cookie(cookie.name(), &value);
        assert!(matches!(
            s.validate(&headers),
            Err(Error::Session(_))
        ));
    }

    #[test]
    fn a_cookie_under_another_name_is_ignored() {
        let cookie = session().start(&HeaderMap::new(), "test@example.com").unwrap();
        let headers = headers_with_cookie("other-name", cookie.value());
        assert_eq!(session().validate(&headers).unwrap(), None);
    }

    #[test]
    fn start_fails_when_the_existing_cookie_is_unopenable() {
        let headers = headers_with_cookie("cookie-name", "garbage");
        assert!(matches!(
            session().start(&headers, "test@example.com"),
            Err(Error::Session(_))
        ));
    }

    #[test]
    fn start_on_response_sets_the_cookie_header() {
        let s = session();
        let mut response = Response::new(String::new());
        s.start_on_response(&mut response, &HeaderMap::new(), "test@example.com")
            .unwrap();

        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(set_cookie.starts_with("cookie-name="));
        assert!(set_cookie.contains("HttpOnly"));
    }
}
