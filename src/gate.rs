use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use url::form_urlencoded;

use crate::config::Configuration;
use crate::error::Error;
use crate::session::{SealedCookieSession, SessionStore};
use crate::templates::{GoogleLoginPage, LoginRenderer};
use crate::verifier::{GoogleTokenVerifier, TokenVerifier};

/// A credential submission is a form POST; its body is never large.
const FORM_BODY_LIMIT: usize = 64 * 1024;

/// Shared state for the gate middleware.
pub(crate) struct GateState<V, S, R> {
    verifier: Arc<V>,
    session: Arc<S>,
    renderer: Arc<R>,
}

// Manual Clone: avoid derive adding `V: Clone, S: Clone, R: Clone` bounds.
impl<V, S, R> Clone for GateState<V, S, R> {
    fn clone(&self) -> Self {
        Self {
            verifier: self.verifier.clone(),
            session: self.session.clone(),
            renderer: self.renderer.clone(),
        }
    }
}

/// Put the gate in front of `next`.
///
/// Every request routed through the returned router is checked for a valid
/// session first: with one, the request passes through to `next` untouched;
/// without one, the login page is rendered. A POST carrying an `id_token`
/// form field has the token validated before the session check, and is
/// rejected outright when validation fails.
///
/// The gate never starts a session itself. Call
/// [`SessionStore::start_on_response`] from your own handler once a token
/// has validated.
pub fn protect<V, S, R>(verifier: V, session: S, renderer: R, next: Router) -> Router
where
    V: TokenVerifier,
    S: SessionStore,
    R: LoginRenderer,
{
    let state = GateState {
        verifier: Arc::new(verifier),
        session: Arc::new(session),
        renderer: Arc::new(renderer),
    };
    next.layer(middleware::from_fn_with_state(state, gate::<V, S, R>))
}

/// [`protect`] wired with the production collaborators: Google token
/// verification, a sealed cookie session and the Google Sign-In page.
pub fn with_configuration(conf: &Configuration, next: Router) -> Router {
    protect(
        GoogleTokenVerifier::new(conf.google_allowed_domains.clone()),
        SealedCookieSession::new(
            &conf.session_encryption_key,
            conf.set_secure_flag,
            conf.cookie_name.clone(),
        ),
        GoogleLoginPage::new(conf.google_auth_client_id.clone()),
        next,
    )
}

/// [`with_configuration`], loading everything from environment variables.
///
/// # Errors
///
/// Returns [`Error::Config`] when the environment is missing or malformed;
/// see [`Configuration::from_env`].
pub fn from_env(next: Router) -> Result<Router, Error> {
    let conf = Configuration::from_env()?;
    Ok(with_configuration(&conf, next))
}

/// The request-routing state machine.
async fn gate<V, S, R>(
    State(state): State<GateState<V, S, R>>,
    request: Request,
    next: Next,
) -> Response
where
    V: TokenVerifier,
    S: SessionStore,
    R: LoginRenderer,
{
    let (request, id_token) = match extract_id_token(request).await {
        Ok(extracted) => extracted,
        Err(response) => return response,
    };

    if let Some(id_token) = id_token {
        if let Err(err) = state.verifier.validate_token(&id_token).await {
            tracing::error!(error = %err, id_token = %id_token, "invalid token");
            return err.into_response();
        }
    }

    // A validated token does not log the user in by itself: the session is
    // checked independently, and only an explicit SessionStore::start call
    // (made by the consumer) establishes one.
    match state.session.validate(request.headers()) {
        Err(err) => {
            tracing::error!(error = %err, "invalid session");
            err.into_response()
        }
        Ok(None) => state.renderer.render_login().into_response(),
        Ok(Some(email)) => {
            tracing::info!(email = %email, url = %request.uri().path(), "accessing");
            next.run(request).await
        }
    }
}

/// Pull the `id_token` field out of a POSTed form, restoring the buffered
/// body onto the request so the protected handler sees it unchanged.
///
/// Non-POST requests, and POSTs without the field, are not credential
/// submissions and carry no token.
async fn extract_id_token(request: Request) -> Result<(Request, Option<String>), Response> {
    if request.method() != Method::POST {
        return Ok((request, None));
    }

    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, FORM_BODY_LIMIT).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::error!(error = %err, "failed to read the submission body");
            return Err(Error::ClaimPolicy(format!("failed to read the submission: {err}"))
                .into_response());
        }
    };

    let id_token = form_urlencoded::parse(&bytes)
        .find(|(name, _)| name == "id_token")
        .map(|(_, value)| value.into_owned());

    Ok((Request::from_parts(parts, Body::from(bytes)), id_token))
}
