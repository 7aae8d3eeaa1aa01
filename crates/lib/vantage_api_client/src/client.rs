//! Session-aware API client.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Method, Request, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

use crate::error::{ClientError, ClientResult};
use crate::models::{AuthBody, ErrorBody, RefreshBody, User, UserBody};
use crate::session::{Session, SignOutReason};

/// Per-request timeout applied to every call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const LOGIN_PATH: &str = "/auth/login";
const REGISTER_PATH: &str = "/auth/register";
const REFRESH_PATH: &str = "/auth/refresh";
const LOGOUT_PATH: &str = "/auth/logout";
const ME_PATH: &str = "/auth/me";

/// Name of the refresh cookie set by the server.
pub const REFRESH_COOKIE: &str = "vantage_refresh";

/// Reason a renewal attempt did not produce a token.
#[derive(Debug)]
enum RenewError {
    SignedOut,
    NoRefreshToken,
    Rejected(StatusCode),
    Transport(ClientError),
}

impl std::fmt::Display for RenewError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenewError::SignedOut => f.write_str("session signed out by a concurrent renewal"),
            RenewError::NoRefreshToken => f.write_str("no refresh credential"),
            RenewError::Rejected(status) => write!(f, "refresh rejected with {status}"),
            RenewError::Transport(e) => write!(f, "refresh failed: {e}"),
        }
    }
}

/// HTTP client that attaches the session's bearer token and transparently
/// renews it on `401`.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    jar: Arc<Jar>,
    session: Arc<Session>,
    refresh_gate: Mutex<()>,
}

impl ApiClient {
    /// Client with the default 60 s timeout.
    pub fn new(base_url: &str, session: Arc<Session>) -> ClientResult<Self> {
        Self::with_timeout(base_url, session, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: &str,
        session: Arc<Session>,
        timeout: Duration,
    ) -> ClientResult<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let jar = Arc::new(Jar::default());
        let http = reqwest::Client::builder()
            .cookie_provider(jar.clone())
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url,
            jar,
            session,
            refresh_gate: Mutex::new(()),
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve an API path against the base URL, keeping any base path
    /// prefix (`http://host/api` + `/auth/me` is `http://host/api/auth/me`).
    pub fn url(&self, path: &str) -> ClientResult<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// Start a request builder for `path`. Send it with [`ApiClient::send`].
    pub fn request(&self, method: Method, path: &str) -> ClientResult<reqwest::RequestBuilder> {
        Ok(self.http.request(method, self.url(path)?))
    }

    /// Whether the cookie jar holds a refresh cookie for the API origin.
    pub fn has_refresh_cookie(&self) -> bool {
        let Some(header) = self.jar.cookies(&self.base_url) else {
            return false;
        };
        let Ok(raw) = header.to_str() else {
            return false;
        };
        raw.split(';').any(|pair| {
            pair.trim()
                .split_once('=')
                .is_some_and(|(name, value)| name == REFRESH_COOKIE && !value.is_empty())
        })
    }

    /// Send a request through the auth interceptor.
    ///
    /// Attaches the bearer token, and on a `401` from anything other than the
    /// login or refresh endpoints renews the access token and re-sends the
    /// request once. The response from that single retry is returned as is.
    /// If renewal fails the original `401` response is returned and the
    /// session is signed out.
    pub async fn send(&self, mut request: Request) -> ClientResult<Response> {
        let epoch = self.session.epoch();
        if let Some(token) = self.session.access_token() {
            set_bearer(&mut request, &token)?;
        }

        let path = request.url().path().to_string();
        let renewable = !path.ends_with(LOGIN_PATH) && !path.ends_with(REFRESH_PATH);
        let retry = if renewable { request.try_clone() } else { None };

        let response = self.http.execute(request).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        let Some(mut retry) = retry else {
            return Ok(response);
        };

        match self.renew(epoch).await {
            Ok(token) => {
                debug!(%path, "retrying request with renewed access token");
                set_bearer(&mut retry, &token)?;
                Ok(self.http.execute(retry).await?)
            }
            Err(reason) => {
                debug!(%path, %reason, "access token renewal failed");
                Ok(response)
            }
        }
    }

    /// Obtain a usable access token after a `401`.
    ///
    /// Serialized through `refresh_gate`: the first caller performs the
    /// refresh; callers queued behind it see the epoch moved on and reuse the
    /// result instead of refreshing again.
    async fn renew(&self, seen_epoch: u64) -> Result<String, RenewError> {
        let _gate = self.refresh_gate.lock().await;

        if self.session.epoch() != seen_epoch {
            return self.session.access_token().ok_or(RenewError::SignedOut);
        }

        let body_token = self.session.refresh_token();
        if body_token.is_none() && !self.has_refresh_cookie() {
            self.end_session(SignOutReason::NoRefreshToken);
            return Err(RenewError::NoRefreshToken);
        }

        let url = self.url(REFRESH_PATH).map_err(RenewError::Transport)?;
        let body = match &body_token {
            Some(token) => serde_json::json!({ "refreshToken": token }),
            None => serde_json::json!({}),
        };
        let response = match self.http.post(url).json(&body).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("refresh request failed: {e}");
                self.end_session(SignOutReason::RefreshFailed);
                return Err(RenewError::Transport(e.into()));
            }
        };

        let status = response.status();
        if !status.is_success() {
            self.end_session(SignOutReason::RefreshFailed);
            return Err(RenewError::Rejected(status));
        }
        match response.json::<RefreshBody>().await {
            Ok(body) => {
                self.session.rotate(body.access_token.clone(), body.refresh_token);
                Ok(body.access_token)
            }
            Err(e) => {
                self.end_session(SignOutReason::RefreshFailed);
                Err(RenewError::Transport(e.into()))
            }
        }
    }

    /// Clear every piece of local auth state: stored tokens and the refresh
    /// cookie.
    fn end_session(&self, reason: SignOutReason) {
        self.jar.add_cookie_str(
            &format!("{REFRESH_COOKIE}=; Max-Age=0; Path=/"),
            &self.base_url,
        );
        self.session.sign_out(reason);
    }

    async fn call<T: DeserializeOwned>(&self, request: Request) -> ClientResult<T> {
        let response = self.send(request).await?;
        decode(response).await
    }

    /// `GET path`, decoding a JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let request = self.request(Method::GET, path)?.build()?;
        self.call(request).await
    }

    /// `POST path` with a JSON body, decoding a JSON response.
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let request = self.request(Method::POST, path)?.json(body).build()?;
        self.call(request).await
    }

    /// `PATCH path` with a JSON body, decoding a JSON response.
    pub async fn patch_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let request = self.request(Method::PATCH, path)?.json(body).build()?;
        self.call(request).await
    }

    /// Sign in with email and password.
    ///
    /// A `401` here is never treated as an expired session; it surfaces as
    /// [`ClientError::InvalidCredentials`].
    pub async fn login(&self, email: &str, password: &str) -> ClientResult<User> {
        let request = self
            .request(Method::POST, LOGIN_PATH)?
            .json(&serde_json::json!({ "email": email, "password": password }))
            .build()?;
        let response = self.send(request).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            let message = error_message(response).await;
            return Err(ClientError::InvalidCredentials(message));
        }
        let body: AuthBody = decode(response).await?;
        self.session.sign_in(body.access_token);
        Ok(body.user)
    }

    /// Create an account and sign it in.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
        role: Option<&str>,
    ) -> ClientResult<User> {
        let body: AuthBody = self
            .post_json(
                REGISTER_PATH,
                &serde_json::json!({
                    "email": email,
                    "password": password,
                    "name": name,
                    "role": role,
                }),
            )
            .await?;
        self.session.sign_in(body.access_token);
        Ok(body.user)
    }

    /// The signed-in user's profile.
    pub async fn me(&self) -> ClientResult<User> {
        let body: UserBody = self.get_json(ME_PATH).await?;
        Ok(body.user)
    }

    /// Log out. Local state is cleared even if the server call fails.
    pub async fn logout(&self) -> ClientResult<()> {
        let result = async {
            let request = self.request(Method::POST, LOGOUT_PATH)?.build()?;
            self.http.execute(with_bearer(request, &self.session)?).await?;
            Ok::<(), ClientError>(())
        }
        .await;
        self.end_session(SignOutReason::Logout);
        result
    }
}

fn set_bearer(request: &mut Request, token: &str) -> ClientResult<()> {
    let value = HeaderValue::from_str(&format!("Bearer {token}"))?;
    request.headers_mut().insert(AUTHORIZATION, value);
    Ok(())
}

fn with_bearer(mut request: Request, session: &Session) -> ClientResult<Request> {
    if let Some(token) = session.access_token() {
        set_bearer(&mut request, &token)?;
    }
    Ok(request)
}

async fn error_message(response: Response) -> String {
    let status = response.status();
    match response.json::<ErrorBody>().await {
        Ok(body) => body.message,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let status = response.status();
    if !status.is_success() {
        let message = error_message(response).await;
        return Err(ClientError::Api { status, message });
    }
    Ok(response.json::<T>().await?)
}
