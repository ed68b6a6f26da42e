//!
//! src/fetch.rs
//!
//! Defines methods for hitting the catalog endpoints and
//! returning unparsed track records
//!

use reqwest::blocking::{Client, ClientBuilder, Request};
use reqwest::{header, redirect};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::config::{HttpConfig, SpotifyConfig};
use crate::types::{Credential, SearchKind};
use crate::PipelineError;

/// Client building functionality
fn client_helper(http: &HttpConfig) -> ClientBuilder {
    Client::builder()
        .timeout(http.timeout)
        .connect_timeout(http.connect_timeout)
        .pool_max_idle_per_host(http.pool_max_idle_per_host)
        .pool_idle_timeout(Some(http.pool_idle_timeout))
        .redirect(redirect::Policy::limited(http.max_redirects as usize))
}

fn client_with_headers(http: &HttpConfig, headers: header::HeaderMap) ->
    Result<Client, PipelineError> {
    client_helper(http)
        .default_headers(headers)
        .build()
        .map_err(|e| PipelineError::Http(format!("build client: {e}")))
}

pub fn base_client(http: &HttpConfig) -> Result<Client, PipelineError> {
    let mut h = header::HeaderMap::new();
    h.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
    client_with_headers(http, h)
}

/// Status and decoded body of a catalog response
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: Value
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Seam between request building and the wire
pub trait Transport {
    fn execute(&self, request: Request) -> Result<HttpReply, PipelineError>;
}

pub struct ReqwestTransport {
    http: Client
}

impl ReqwestTransport {
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: Request) -> Result<HttpReply, PipelineError> {
        let url = request.url().clone();
        let response = self.http.execute(request)?;
        let status = response.status().as_u16();
        let text = response.text()?;

        // error pages are not always json, keep them as text for messages
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        debug!(url = %url, status, "http.reply");
        Ok( HttpReply { status, body } )
    }
}

/// Operations the driver needs from the music catalog
pub trait Catalog {
    fn acquire_credential(&self) -> Result<Credential, PipelineError>;

    fn lookup(&self, credential: &Credential, name: &str, kind: &str) ->
        Result<Value, PipelineError>;

    fn top_tracks_for_artist(&self, credential: &Credential, artist_name: &str) ->
        Result<Vec<Value>, PipelineError>;
}

pub struct SpotifyClient {
    http: Client,
    transport: Box<dyn Transport>,
    cfg: SpotifyConfig
}

impl SpotifyClient {
    pub fn new(http_config: &HttpConfig, cfg: &SpotifyConfig) ->
        Result<Self, PipelineError> {

        let http = base_client(http_config)?;
        let transport = Box::new(ReqwestTransport::new(http.clone()));
        Ok( Self { http, transport, cfg: cfg.clone() })
    }

    #[cfg(test)]
    pub fn with_transport(
        http_config: &HttpConfig,
        cfg: &SpotifyConfig,
        transport: Box<dyn Transport>
    ) -> Result<Self, PipelineError> {
        let http = base_client(http_config)?;
        Ok( Self { http, transport, cfg: cfg.clone() })
    }

    fn endpoint(&self, path: &str) -> Result<url::Url, PipelineError> {
        self.cfg.api_base.join(path)
            .map_err(|e| PipelineError::Config(format!("join {path}: {e}")))
    }

    /// POST /api/token, grant_type=client_credentials
    pub fn token_request(&self) -> Result<Request, PipelineError> {
        Ok(self.http
            .post(self.cfg.token_url.clone())
            .basic_auth(&self.cfg.client_id, Some(&self.cfg.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .build()?)
    }

    /// GET /v1/search?q=...&type=...&limit=1
    pub fn search_request(&self, credential: &Credential, name: &str, kind: SearchKind) ->
        Result<Request, PipelineError> {
        let url = self.endpoint("search")?;
        Ok(credential.authorize(self.http.get(url))
            .query(&[
                ("q", name),
                ("type", kind.as_str()),
                ("limit", "1")
            ])
            .build()?)
    }

    /// GET /v1/artists/{id}/top-tracks?market=..
    pub fn top_tracks_request(&self, credential: &Credential, artist_id: &str) ->
        Result<Request, PipelineError> {
        let url = self.endpoint(&format!("artists/{artist_id}/top-tracks"))?;
        Ok(credential.authorize(self.http.get(url))
            .query(&[("market", self.cfg.market.as_str())])
            .build()?)
    }

    /// Typed search returning the single best match
    pub fn search(&self, credential: &Credential, name: &str, kind: SearchKind) ->
        Result<Value, PipelineError> {
        debug!(kind = kind.as_str(), name, "catalog.search");

        let reply = self.transport.execute(self.search_request(credential, name, kind)?)?;
        let reply = expect_success(reply, || format!("search {} {name}", kind.as_str()))?;

        let items = reply.body
            .get(kind.plural())
            .and_then(|page| page.get("items"))
            .and_then(Value::as_array)
            .ok_or_else(|| PipelineError::Parse(
                format!("search response missing {}.items", kind.plural())
            ))?;

        match items.first() {
            Some(item) => Ok(item.clone()),
            None => {
                error!(kind = kind.as_str(), name, "catalog.lookup.miss");
                Err(PipelineError::NotFound(format!("no {} named {name}", kind.as_str())))
            }
        }
    }
}

fn expect_success(reply: HttpReply, context: impl FnOnce() -> String) ->
    Result<HttpReply, PipelineError> {
    if reply.is_success() {
        return Ok(reply);
    }
    let context = context();

    // a rejected bearer fails every later call too
    if matches!(reply.status, 401 | 403) {
        error!(status = reply.status, context = %context, "catalog.unauthorized");
        return Err(PipelineError::Credential(
            format!("status {} on {context}: {}", reply.status, error_message(&reply.body))
        ));
    }

    warn!(status = reply.status, context = %context, "catalog.status");
    Err(PipelineError::Status { status: reply.status, context })
}

/// Catalog errors come as `{"error": {"status", "message"}}`
fn error_message(body: &Value) -> String {
    body.pointer("/error/message")
        .and_then(Value::as_str)
        .unwrap_or("bearer rejected")
        .to_string()
}

/// Pull a credential out of a token endpoint reply. Anything other than a
/// body carrying `access_token` is fatal.
fn parse_credential(reply: HttpReply) -> Result<Credential, PipelineError> {
    if reply.body.get("access_token").and_then(Value::as_str).is_some() {
        return Ok(serde_json::from_value(reply.body)?);
    }

    let reason = match (
        reply.body.get("error").and_then(Value::as_str),
        reply.body.get("error_description").and_then(Value::as_str),
    ) {
        (Some(e), Some(d)) => format!("{e}: {d}"),
        (Some(e), None) => e.to_string(),
        _ => "response has no access_token".to_string()
    };
    Err(PipelineError::Credential(format!("status {}: {reason}", reply.status)))
}

impl Catalog for SpotifyClient {
    fn acquire_credential(&self) -> Result<Credential, PipelineError> {
        let reply = self.transport.execute(self.token_request()?)?;
        let credential = parse_credential(reply)?;
        debug!(expires_in = ?credential.expires_in, "catalog.credential");
        Ok(credential)
    }

    fn lookup(&self, credential: &Credential, name: &str, kind: &str) ->
        Result<Value, PipelineError> {
        let kind: SearchKind = kind.parse().inspect_err(|_| {
            error!(kind, "catalog.lookup.invalid_kind");
        })?;
        self.search(credential, name, kind)
    }

    fn top_tracks_for_artist(&self, credential: &Credential, artist_name: &str) ->
        Result<Vec<Value>, PipelineError> {
        let artist = self.lookup(credential, artist_name, SearchKind::Artist.as_str())
            .inspect_err(|e| {
                error!(artist = artist_name, error = %e, "catalog.top_tracks.no_artist");
            })?;

        let artist_id = artist.get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| PipelineError::Parse(
                format!("artist {artist_name} has no id")
            ))?;

        let reply = self.transport.execute(self.top_tracks_request(credential, artist_id)?)?;
        let reply = expect_success(reply, || format!("top-tracks {artist_name}"))?;

        match reply.body {
            Value::Object(mut map) => match map.remove("tracks") {
                Some(Value::Array(tracks)) => {
                    debug!(artist = artist_name, count = tracks.len(), "catalog.top_tracks");
                    Ok(tracks)
                },
                _ => Err(PipelineError::Parse("top-tracks response missing tracks".into()))
            },
            _ => Err(PipelineError::Parse("top-tracks response is not an object".into()))
        }
    }
}
