//! Direct REST transport.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client as HttpClient, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::TrackerConfig;
use crate::error::{Result, TrackerError};
use crate::models::{CommentListing, FetchedFields, IssuePayload, RawComment, Transition, TransitionListing};
use crate::normalize;
use crate::transport::Transport;

/// Talks to the tracker's REST API directly.
#[derive(Clone)]
pub struct TrackerClient {
    http: HttpClient,
    config: TrackerConfig,
}

impl TrackerClient {
    /// Builds the HTTP client. A missing base URL is only reported once a request is made.
    pub fn new(config: TrackerConfig) -> Result<Self> {
        let http = build_http_client(&config)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// `{base}/seg1/seg2/...` with every segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.config.api_root()?;
        url.path_segments_mut()
            .map_err(|_| TrackerError::Configuration("tracker API URL cannot take a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn issue_endpoint(&self, key: &str, rest: &[&str]) -> Result<Url> {
        let mut segments = vec!["issue", key];
        segments.extend_from_slice(rest);
        self.endpoint(&segments)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!("{method} {url}");
        let request = self.http.request(method, url);
        match &self.config.credentials {
            Some(credentials) => credentials.apply(request),
            None => request,
        }
    }

    /// Sends the request; non-2xx answers go through the normalizer.
    ///
    /// `issue` is set only for requests on the issue resource itself, so a 404 there
    /// means the key is unknown. Sub-resources (comments, transitions) pass `None`.
    async fn send(issue: Option<&str>, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let url = response.url().clone();
        let body = response.text().await.unwrap_or_default();
        debug!("tracker answered {status} for {url}");
        Err(normalize::http_failure(
            issue,
            status.as_u16(),
            status.canonical_reason().unwrap_or_default(),
            &body,
        ))
    }

    async fn parse_json<T>(response: Response) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|err| TrackerError::Transport {
            status: None,
            message: format!("malformed response: {err}"),
            body: Some(text),
        })
    }

    async fn get_json<T>(&self, issue: Option<&str>, url: Url, query: Option<&[(&str, &str)]>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let mut request = self.request(Method::GET, url);
        if let Some(params) = query {
            request = request.query(params);
        }
        let response = Self::send(issue, request).await?;
        Self::parse_json(response).await
    }

    async fn send_expect_empty<B>(&self, issue: Option<&str>, method: Method, url: Url, body: Option<&B>) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        let mut request = self.request(method, url);
        if let Some(payload) = body {
            request = request.json(payload);
        }
        Self::send(issue, request).await.map(|_| ())
    }
}

#[async_trait]
impl Transport for TrackerClient {
    async fn fetch_fields(&self, key: &str, native_names: &[String]) -> Result<FetchedFields> {
        let url = self.issue_endpoint(key, &[])?;
        let fields = native_names.join(",");
        let payload: IssuePayload = self
            .get_json(Some(key), url, Some(&[("fields", fields.as_str())]))
            .await?;
        payload.into_fetched()
    }

    async fn write_fields(&self, key: &str, fields: &Map<String, Value>) -> Result<()> {
        let url = self.issue_endpoint(key, &[])?;
        let payload = IssueUpdateRequest { fields };
        self.send_expect_empty(Some(key), Method::PUT, url, Some(&payload)).await
    }

    async fn post_comment(&self, key: &str, body: &str) -> Result<()> {
        let url = self.issue_endpoint(key, &["comment"])?;
        let payload = CommentCreateRequest { body };
        self.send_expect_empty(None, Method::POST, url, Some(&payload)).await
    }

    async fn list_comments(&self, key: &str) -> Result<Vec<RawComment>> {
        let url = self.issue_endpoint(key, &["comment"])?;
        let listing: CommentListing = self.get_json(None, url, None).await?;
        Ok(listing.into_vec())
    }

    async fn delete_comment(&self, key: &str, id: &str) -> Result<()> {
        let url = self.issue_endpoint(key, &["comment", id])?;
        self.send_expect_empty(None, Method::DELETE, url, None::<&Value>).await
    }

    async fn get_transitions(&self, key: &str) -> Result<Vec<Transition>> {
        let url = self.issue_endpoint(key, &["transitions"])?;
        let listing: TransitionListing = self.get_json(None, url, None).await?;
        Ok(listing.into_vec())
    }

    async fn apply_transition(&self, key: &str, transition_id: &str) -> Result<()> {
        let url = self.issue_endpoint(key, &["transitions"])?;
        let payload = TransitionExecuteRequest {
            transition: TransitionRef { id: transition_id },
        };
        self.send_expect_empty(None, Method::POST, url, Some(&payload)).await
    }
}

fn build_http_client(config: &TrackerConfig) -> Result<HttpClient> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, header_value(&config.user_agent)?);

    HttpClient::builder()
        .default_headers(headers)
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .build()
        .map_err(|err| TrackerError::Configuration(err.to_string()))
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|err| TrackerError::Configuration(err.to_string()))
}

#[derive(Debug, Serialize)]
struct IssueUpdateRequest<'a> {
    fields: &'a Map<String, Value>,
}

#[derive(Debug, Serialize)]
struct CommentCreateRequest<'a> {
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct TransitionExecuteRequest<'a> {
    transition: TransitionRef<'a>,
}

#[derive(Debug, Serialize)]
struct TransitionRef<'a> {
    id: &'a str,
}
