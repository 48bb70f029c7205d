use axum::response::Html;

/// Produces the login page shown to unauthenticated requesters.
///
/// An explicit value constructed once at startup and shared by the gate;
/// tests substitute their own renderer.
pub trait LoginRenderer: Send + Sync + 'static {
    /// Render the login page body.
    fn render_login(&self) -> Html<String>;
}

/// The stock Google Sign-In page.
///
/// Renders the sign-in button for the configured client id. Once Google
/// hands the browser an identity token, the page POSTs it back to the
/// current URL as the `id_token` form field, which is what the gate
/// expects of a credential submission.
pub struct GoogleLoginPage {
    client_id: String,
}

const LOGIN_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
<title>Login</title>
<meta name="google-signin-client_id" content="{client_id}">
<script src="https://apis.google.com/js/platform.js" async defer></script>
</head>
<body>
<p>You must login to view this content.</p>
<div class="g-signin2" data-onsuccess="onSignIn"></div>
<script>
function onSignIn(googleUser) {
  var form = document.createElement("form");
  form.method = "POST";
  form.action = window.location.href;
  var field = document.createElement("input");
  field.type = "hidden";
  field.name = "id_token";
  field.value = googleUser.getAuthResponse().id_token;
  form.appendChild(field);
  document.body.appendChild(form);
  form.submit();
}
</script>
</body>
</html>
"#;

impl GoogleLoginPage {
    /// Create a login page for the given Google OAuth client id.
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
        }
    }
}

impl LoginRenderer for GoogleLoginPage {
    fn render_login(&self) -> Html<String> {
        Html(LOGIN_PAGE.replace("{client_id}", &self.client_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_login_page_embeds_the_client_id() {
        let Html(body) =
            GoogleLoginPage::new("test-client-id.apps.googleusercontent.com").render_login();
        assert!(body.contains("test-client-id.apps.googleusercontent.com"));
        assert!(body.contains("You must login"));
        assert!(body.contains("id_token"));
    }
}
