//! Crunchyroll Beta HTTP Client
//!
//! Pure HTTP client for the Crunchyroll Beta API: password-grant login
//! followed by read-only catalog queries. All responses are returned as raw
//! JSON values; no domain modeling is performed.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Method, StatusCode};
use serde_json::{Map, Value};
use tracing::debug;

use crate::endpoints;
use crate::error::{body_with_limit, CrunchyrollError};
use crate::session::{CmsSigning, SessionConfig};

// Stream ids are embedded in URL-shaped link fields of episode items.
// The pattern is a compile-time constant; Regex::new cannot fail on it.
static RE_STREAM_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"videos/(.+?)/streams").expect("invalid stream id regex"));

/// User agent of the Android client the API expects.
const API_USER_AGENT: &str = "Crunchyroll/3.10.0 Android/6.0 okhttp/4.9.1";

/// Pre-shared app-level Basic credential used for the password-grant token
/// call. This identifies the mobile app, not the user.
const PUBLIC_BASIC_AUTH: &str =
    "Basic aHJobzlxM2F3dnNrMjJ1LXRzNWE6cHROOURteXRBU2Z6QjZvbXVsSzh6cUxzYTczVE1TY1k=";

/// Default number of results for list-returning endpoints.
pub const DEFAULT_RESULT_LIMIT: u32 = 6;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared HTTP client for all API requests (connection pooling).
/// Redirects are disabled; the API never redirects legitimate calls.
static SHARED_CLIENT: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .pool_max_idle_per_host(10)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("Failed to build shared HTTP client")
});

/// Crunchyroll Beta API client.
///
/// Starts unauthenticated; `login` populates the session config (access
/// token, CMS signing fields, account id) and installs the bearer
/// `Authorization` header. Every other operation requires a completed login
/// and fails with `NotAuthenticated` otherwise. There is no logout and no
/// token refresh; once a token expires server-side, calls fail through the
/// normal error path and the caller logs in again.
pub struct CrunchyrollClient {
    locale: String,
    base_url: String,
    config: SessionConfig,
    headers: HeaderMap,
    client: Client,
}

impl CrunchyrollClient {
    /// Create a new client (reuses shared connection pool).
    ///
    /// `locale` is the language tag passed to most calls, e.g. `en-US`.
    pub fn new(locale: impl Into<String>) -> Result<Self, CrunchyrollError> {
        Self::with_base_url(locale, endpoints::API_HOST)
    }

    /// Create a new client against a custom API host.
    pub fn with_base_url(
        locale: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, CrunchyrollError> {
        Ok(Self {
            locale: locale.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            config: SessionConfig::new(),
            headers: default_headers(),
            client: SHARED_CLIENT.clone(),
        })
    }

    /// Create a new client with explicit timeouts (dedicated connection
    /// pool instead of the shared one).
    pub fn with_timeouts(
        locale: impl Into<String>,
        connect_timeout: Duration,
        timeout: Duration,
    ) -> Result<Self, CrunchyrollError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .pool_max_idle_per_host(10)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            locale: locale.into(),
            base_url: endpoints::API_HOST.to_string(),
            config: SessionConfig::new(),
            headers: default_headers(),
            client,
        })
    }

    #[must_use]
    pub fn locale(&self) -> &str {
        &self.locale
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether `login` has completed on this client.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.headers.contains_key(AUTHORIZATION)
    }

    /// Read-only view of the accumulated session config.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Low-level request primitive all operations are built on.
    ///
    /// Extra headers are merged with the client's base headers; base headers
    /// win on conflict. The response body is parsed as JSON and checked, in
    /// order: an `error` field equal to `invalid_grant` fails with
    /// `Authentication` regardless of status; a body carrying both `message`
    /// and `code` fails with `Api` regardless of status; any non-200 status
    /// fails with `Api` carrying the raw body text.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        extra_headers: Option<HeaderMap>,
        query: Option<&[(&str, &str)]>,
        form: Option<&[(&str, &str)]>,
    ) -> Result<Value, CrunchyrollError> {
        let mut headers = extra_headers.unwrap_or_default();
        headers.extend(self.headers.clone());

        let mut req = self.client.request(method.clone(), url).headers(headers);
        if let Some(query) = query {
            req = req.query(query);
        }
        if let Some(form) = form {
            req = req.form(form);
        }

        debug!(%method, url, "issuing API request");
        let response = req.send().await?;
        let status = response.status();
        let body = body_with_limit(response).await?;
        debug!(%status, bytes = body.len(), "API response received");

        let parsed = match serde_json::from_slice::<Value>(&body) {
            Ok(parsed) => parsed,
            Err(_) if status != StatusCode::OK => {
                return Err(CrunchyrollError::Api {
                    status,
                    message: String::from_utf8_lossy(&body).into_owned(),
                });
            }
            Err(err) => return Err(err.into()),
        };

        if parsed.get("error").and_then(Value::as_str) == Some("invalid_grant") {
            return Err(CrunchyrollError::Authentication(
                "invalid login credentials".to_string(),
            ));
        }
        if let (Some(message), Some(_code)) = (parsed.get("message"), parsed.get("code")) {
            let message = message
                .as_str()
                .map_or_else(|| message.to_string(), str::to_string);
            return Err(CrunchyrollError::Api { status, message });
        }
        if status != StatusCode::OK {
            return Err(CrunchyrollError::Api {
                status,
                message: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(parsed)
    }

    /// Login with username (or email) and password.
    ///
    /// Runs three calls strictly in sequence: token exchange, index
    /// bootstrap (CMS signing fields), profile (account id). The session
    /// config and the bearer `Authorization` header are only installed once
    /// all three have succeeded, so a mid-sequence failure leaves the client
    /// in its prior unauthenticated state.
    pub async fn login(
        &mut self,
        username: &str,
        password: &str,
    ) -> Result<bool, CrunchyrollError> {
        let mut token_headers = HeaderMap::new();
        token_headers.insert(AUTHORIZATION, HeaderValue::from_static(PUBLIC_BASIC_AUTH));

        debug!("exchanging credentials for access token");
        let token = self
            .request(
                Method::POST,
                &endpoints::token(&self.base_url),
                Some(token_headers),
                None,
                Some(&[
                    ("username", username),
                    ("password", password),
                    ("grant_type", "password"),
                    ("scope", "offline_access"),
                ]),
            )
            .await?;
        let token = into_object(token, "token")?;

        let access_token = token
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                CrunchyrollError::Parse("token response has no access_token".to_string())
            })?;
        let token_type = token
            .get("token_type")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                CrunchyrollError::Parse("token response has no token_type".to_string())
            })?;
        let bearer = HeaderValue::from_str(&format!("{token_type} {access_token}"))?;

        // The fresh bearer is passed per call here and only becomes a
        // default header after the whole sequence has succeeded.
        let mut bearer_headers = HeaderMap::new();
        bearer_headers.insert(AUTHORIZATION, bearer.clone());

        debug!("fetching index bootstrap");
        let index = self
            .request(
                Method::GET,
                &endpoints::index(&self.base_url),
                Some(bearer_headers.clone()),
                None,
                None,
            )
            .await?;
        let index = into_object(index, "index")?;

        debug!("fetching profile");
        let profile = self
            .request(
                Method::GET,
                &endpoints::profile(&self.base_url),
                Some(bearer_headers),
                None,
                None,
            )
            .await?;
        let profile = into_object(profile, "profile")?;

        self.config.merge(token);
        self.config.merge(index);
        self.config.merge(profile);
        self.headers.insert(AUTHORIZATION, bearer);
        Ok(true)
    }

    /// Search series. Returns the `items` list of the response.
    pub async fn search(
        &self,
        query: &str,
        limit: Option<u32>,
    ) -> Result<Vec<Value>, CrunchyrollError> {
        let n = limit.unwrap_or(DEFAULT_RESULT_LIMIT).to_string();
        let response = self
            .request(
                Method::GET,
                &endpoints::search(&self.base_url),
                None,
                Some(&[("q", query), ("n", &n), ("locale", &self.locale)]),
                None,
            )
            .await?;
        items(response)
    }

    /// Get info about a series. Returns the full response object.
    pub async fn get_series(&self, series_id: &str) -> Result<Value, CrunchyrollError> {
        let cms = self.config.cms()?;
        self.request(
            Method::GET,
            &endpoints::series(&self.base_url, &cms.bucket, series_id),
            None,
            Some(&self.signed_params(&cms)),
            None,
        )
        .await
    }

    /// Get seasons of a series. Returns the `items` list of the response.
    pub async fn get_seasons(&self, series_id: &str) -> Result<Vec<Value>, CrunchyrollError> {
        let cms = self.config.cms()?;
        let mut params = self.signed_params(&cms);
        params.push(("series_id", series_id));
        let response = self
            .request(
                Method::GET,
                &endpoints::seasons(&self.base_url, &cms.bucket),
                None,
                Some(&params),
                None,
            )
            .await?;
        items(response)
    }

    /// Get episodes of a season. Returns the `items` list of the response.
    pub async fn get_episodes(&self, season_id: &str) -> Result<Vec<Value>, CrunchyrollError> {
        let cms = self.config.cms()?;
        let mut params = self.signed_params(&cms);
        params.push(("season_id", season_id));
        let response = self
            .request(
                Method::GET,
                &endpoints::episodes(&self.base_url, &cms.bucket),
                None,
                Some(&params),
                None,
            )
            .await?;
        items(response)
    }

    /// Get streams for an episode item as returned by `get_episodes`.
    ///
    /// The stream id is extracted from the episode's
    /// `__links__.streams.href` link; a missing or unexpected link shape
    /// fails with `MalformedInput`.
    pub async fn get_streams(&self, episode: &Value) -> Result<Value, CrunchyrollError> {
        let stream_id = Self::extract_stream_id(episode)?;
        let cms = self.config.cms()?;
        self.request(
            Method::GET,
            &endpoints::streams(&self.base_url, &cms.bucket, &stream_id),
            None,
            Some(&self.signed_params(&cms)),
            None,
        )
        .await
    }

    /// Get series similar to the given one for the logged-in account.
    /// Returns the `items` list of the response.
    pub async fn get_similar(
        &self,
        series_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<Value>, CrunchyrollError> {
        let account_id = self.config.account_id()?.to_string();
        let n = limit.unwrap_or(DEFAULT_RESULT_LIMIT).to_string();
        let response = self
            .request(
                Method::GET,
                &endpoints::similar(&self.base_url, &account_id),
                None,
                Some(&[("guid", series_id), ("n", &n), ("locale", &self.locale)]),
                None,
            )
            .await?;
        items(response)
    }

    /// Get the news feed. Returns the full response object with its
    /// sub-feeds left unparsed.
    pub async fn news_feed(&self, limit: Option<u32>) -> Result<Value, CrunchyrollError> {
        let n = limit.unwrap_or(DEFAULT_RESULT_LIMIT).to_string();
        self.request(
            Method::GET,
            &endpoints::news_feed(&self.base_url),
            None,
            Some(&[("n", &n), ("locale", &self.locale)]),
            None,
        )
        .await
    }

    /// Extract the stream id from an episode item's streams link.
    pub fn extract_stream_id(episode: &Value) -> Result<String, CrunchyrollError> {
        let href = episode
            .pointer("/__links__/streams/href")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                CrunchyrollError::MalformedInput(
                    "episode item has no __links__.streams.href link".to_string(),
                )
            })?;
        RE_STREAM_ID
            .captures(href)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| {
                CrunchyrollError::MalformedInput(format!(
                    "stream link {href:?} does not match videos/<id>/streams"
                ))
            })
    }

    /// Query parameters all CMS endpoints require.
    fn signed_params<'a>(&'a self, cms: &'a CmsSigning) -> Vec<(&'a str, &'a str)> {
        vec![
            ("Policy", cms.policy.as_str()),
            ("Signature", cms.signature.as_str()),
            ("Key-Pair-Id", cms.key_pair_id.as_str()),
            ("locale", self.locale.as_str()),
        ]
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(API_USER_AGENT));
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/x-www-form-urlencoded"),
    );
    headers
}

fn into_object(value: Value, context: &str) -> Result<Map<String, Value>, CrunchyrollError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(CrunchyrollError::Parse(format!(
            "{context} response is not a JSON object"
        ))),
    }
}

fn items(value: Value) -> Result<Vec<Value>, CrunchyrollError> {
    match value {
        Value::Object(mut map) => match map.remove("items") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(CrunchyrollError::Parse(
                "response has no items array".to_string(),
            )),
        },
        _ => Err(CrunchyrollError::Parse(
            "response is not a JSON object".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_stream_id() {
        let episode = json!({
            "__links__": {"streams": {"href": "/videos/XYZ123/streams"}}
        });
        assert_eq!(
            CrunchyrollClient::extract_stream_id(&episode).unwrap(),
            "XYZ123"
        );
    }

    #[test]
    fn test_extract_stream_id_full_url() {
        let episode = json!({
            "__links__": {"streams": {"href": "https://beta-api.crunchyroll.com/cms/v2/us/b1/videos/GR49E/streams"}}
        });
        assert_eq!(
            CrunchyrollClient::extract_stream_id(&episode).unwrap(),
            "GR49E"
        );
    }

    #[test]
    fn test_extract_stream_id_missing_link() {
        let episode = json!({"id": "EP1"});
        assert!(matches!(
            CrunchyrollClient::extract_stream_id(&episode),
            Err(CrunchyrollError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_extract_stream_id_unexpected_shape() {
        let episode = json!({
            "__links__": {"streams": {"href": "/something/else"}}
        });
        assert!(matches!(
            CrunchyrollClient::extract_stream_id(&episode),
            Err(CrunchyrollError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_new_client_is_unauthenticated() {
        let client = CrunchyrollClient::new("en-US").unwrap();
        assert_eq!(client.locale(), "en-US");
        assert_eq!(client.base_url(), endpoints::API_HOST);
        assert!(!client.is_authenticated());
        assert!(client.config().values().is_empty());
    }

    #[test]
    fn test_with_base_url_trims_trailing_slash() {
        let client = CrunchyrollClient::with_base_url("it-IT", "http://127.0.0.1:9999/").unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:9999");
        assert_eq!(client.locale(), "it-IT");
    }

    #[test]
    fn test_default_headers() {
        let headers = default_headers();
        assert_eq!(
            headers.get(USER_AGENT).and_then(|v| v.to_str().ok()),
            Some(API_USER_AGENT)
        );
        assert_eq!(
            headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
            Some("application/x-www-form-urlencoded")
        );
    }

    #[test]
    fn test_items_unwraps_list() {
        let value = json!({"items": [1, 2, 3], "total": 3});
        let list = items(value).unwrap();
        assert_eq!(list, vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn test_items_missing_field_is_parse_error() {
        assert!(matches!(
            items(json!({"total": 0})),
            Err(CrunchyrollError::Parse(_))
        ));
        assert!(matches!(items(json!([])), Err(CrunchyrollError::Parse(_))));
    }
}
