//! Four-step handshake
//!
//! 1. Connectivity probe against the bare host
//! 2. Initial login over the discovery paths
//! 3. CSRF token fetch
//! 4. Session validation with the token attached
//!
//! Each step must succeed before the next runs. Nothing is retried.

use crate::transport::{classify_status, OutboundRequest, RawResponse, Transport};
use adt_core::session::{credential_headers, CSRF_FETCH, CSRF_HEADER};
use adt_core::{Accept, AdtError, AdtResult, ConnectionProfile, RequestHeaders, Session};
use reqwest::Method;

/// Discovery paths tried in order for login and validation
pub const DISCOVERY_PATHS: [&str; 3] = ["/core/info/system", "/discovery", "/compatibility/graph"];

/// Token values that mean "no token issued"
const PLACEHOLDER_TOKENS: [&str; 2] = [CSRF_FETCH, "Required"];

/// Drives the handshake for one profile over one transport
#[derive(Debug)]
pub struct Authenticator<'a> {
    profile: &'a ConnectionProfile,
    transport: &'a Transport,
}

impl<'a> Authenticator<'a> {
    /// Create authenticator
    #[inline]
    #[must_use]
    pub fn new(profile: &'a ConnectionProfile, transport: &'a Transport) -> Self {
        Self { profile, transport }
    }

    /// Run all four steps
    ///
    /// # Errors
    /// - `AdtError::Connectivity` if the host is unreachable
    /// - `AdtError::Authentication` / `AdtError::Authorization` on 401 / 403
    /// - `AdtError::NotFound` if no discovery path exists
    /// - `AdtError::Protocol` if no usable CSRF token is issued
    pub async fn authenticate(&self) -> AdtResult<Session> {
        tracing::info!(
            "authenticating {}@{} (client {}, language {})",
            self.profile.username(),
            self.profile.host(),
            self.profile.client(),
            self.profile.language()
        );

        let mut session = Session::pending(self.profile.base_url());

        self.probe_connectivity().await?;
        self.login(&session).await?;
        let token = self.fetch_csrf_token(&session).await?;
        session.set_csrf_token(token);
        self.validate(&session).await;
        session.mark_authenticated()?;

        tracing::info!(
            "session established with {} (token {})",
            self.profile.host(),
            session.token_preview()
        );
        Ok(session)
    }

    /// Step 1: any HTTP answer from the bare host counts as reachable
    async fn probe_connectivity(&self) -> AdtResult<()> {
        let origin = origin_of(&self.profile.base_url());
        tracing::debug!("probing connectivity: {}", origin);

        let request = OutboundRequest::new(Method::HEAD, origin, RequestHeaders::new())
            .with_timeout(self.profile.connect_timeout());
        let response = self.transport.probe(request).await?;

        tracing::debug!(
            "host reachable (HTTP {}, server {})",
            response.status,
            response.header("server").unwrap_or("unknown")
        );
        Ok(())
    }

    /// Step 2: first 200/304 wins, 401/403 are fatal
    async fn login(&self, session: &Session) -> AdtResult<()> {
        let mut last_error: Option<AdtError> = None;
        let mut all_not_found = true;

        for path in DISCOVERY_PATHS {
            let request = OutboundRequest::new(
                Method::GET,
                session.url(path),
                credential_headers(self.profile, Accept::Any),
            );

            let response = match self.transport.send(request).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::debug!("login path {} failed: {}", path, e);
                    all_not_found = false;
                    last_error = Some(e);
                    continue;
                }
            };

            tracing::debug!("login path {} answered HTTP {}", path, response.status);
            match response.status {
                200 | 304 => {
                    tracing::info!("initial session established via {}", path);
                    return Ok(());
                }
                401 => {
                    return Err(AdtError::Authentication(format!(
                        "invalid username or password for {}",
                        self.profile.username()
                    )))
                }
                403 => {
                    return Err(AdtError::Authorization(
                        "user lacks development authorizations".to_string(),
                    ))
                }
                404 => last_error = Some(AdtError::NotFound(format!("ADT service {path}"))),
                status => {
                    all_not_found = false;
                    last_error = Some(classify_status(status, "login", response.body));
                }
            }
        }

        Err(match last_error {
            Some(_) if all_not_found => AdtError::NotFound(
                "ADT discovery services (check that ADT is activated in SICF)".to_string(),
            ),
            Some(e) => e,
            None => AdtError::protocol("no discovery path answered"),
        })
    }

    /// Step 3: token from the response header, placeholders rejected
    async fn fetch_csrf_token(&self, session: &Session) -> AdtResult<String> {
        let request = OutboundRequest::new(
            Method::GET,
            session.url("/discovery"),
            credential_headers(self.profile, Accept::Any),
        )
        .with_header(CSRF_HEADER, CSRF_FETCH);

        let response = self.transport.send(request).await?;
        if !response.is_ok_or_not_modified() {
            return Err(response.into_error("CSRF token fetch"));
        }

        extract_token(&response)
    }

    /// Step 4: re-probe with the token; holding a token is sufficient
    async fn validate(&self, session: &Session) {
        for path in DISCOVERY_PATHS {
            let request = OutboundRequest::new(
                Method::GET,
                session.url(path),
                session.headers(self.profile, Accept::Any),
            );
            match self.transport.send(request).await {
                Ok(response) if response.is_ok_or_not_modified() => {
                    tracing::debug!("session validated via {}", path);
                    return;
                }
                Ok(response) => {
                    tracing::debug!("validation path {} answered HTTP {}", path, response.status);
                }
                Err(e) => tracing::debug!("validation path {} failed: {}", path, e),
            }
        }
        tracing::info!("no validation path answered; CSRF token held, assuming session is valid");
    }
}

fn extract_token(response: &RawResponse) -> AdtResult<String> {
    let token = response.header(CSRF_HEADER).map(str::trim).unwrap_or_default();
    if token.is_empty()
        || PLACEHOLDER_TOKENS
            .iter()
            .any(|p| token.eq_ignore_ascii_case(p))
    {
        return Err(AdtError::protocol(format!(
            "no valid CSRF token received from server (got {token:?})"
        )));
    }
    Ok(token.to_string())
}

/// Scheme and authority of a URL
fn origin_of(url: &str) -> String {
    let (scheme, rest) = url.split_once("://").unwrap_or(("http", url));
    let authority = rest.split('/').next().unwrap_or(rest);
    format!("{scheme}://{authority}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    fn response_with_token(token: Option<&str>) -> RawResponse {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            headers.insert("x-csrf-token", HeaderValue::from_str(token).unwrap());
        }
        RawResponse {
            status: 200,
            headers,
            body: String::new(),
        }
    }

    #[test]
    fn placeholder_tokens_rejected() {
        for bad in [None, Some(""), Some("Fetch"), Some("required")] {
            let err = extract_token(&response_with_token(bad)).unwrap_err();
            assert!(matches!(err, AdtError::Protocol { .. }), "{bad:?}");
        }
        assert_eq!(
            extract_token(&response_with_token(Some("abc=="))).unwrap(),
            "abc=="
        );
    }

    #[test]
    fn origin_strips_path() {
        assert_eq!(
            origin_of("http://erp.local:8000/sap/bc/adt"),
            "http://erp.local:8000"
        );
        assert_eq!(origin_of("https://erp.local/sap/bc/adt"), "https://erp.local");
    }
}
