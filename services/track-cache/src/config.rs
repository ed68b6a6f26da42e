use url::Url;
use std::{path::PathBuf, time};
use crate::PipelineError;
use crate::table::ArtistSelection;

/// Constants for HTTP Config
pub const HTTP_TIMEOUT: u64 = 8000;
pub const HTTP_CONNECT_TIMEOUT: u64 = 2000;
pub const HTTP_POOL_MAX_IDLE: usize = 4;
pub const HTTP_POOL_IDLE_TIMEOUT: u64 = 90000;
pub const HTTP_MAX_REDIRECTS: u8 = 4;

pub const REDIS_DEFAULT_HOST: &str = "127.0.0.1";
pub const REDIS_DEFAULT_PORT: u16 = 6379;

pub const SINK_DEFAULT_LEVEL: i32 = 3;

/// Artists fetched when ARTISTS is not set, in processing order
pub const DEFAULT_ARTISTS: [&str; 10] = [
    "Aerosmith",
    "AC/DC",
    "Black Sabbath",
    "Bon Jovi",
    "Guns N' Roses",
    "Journey",
    "KISS",
    "Metallica",
    "Mötley Crüe",
    "Van Halen",
];

/// Source of configuration values. `std::env::var` in production,
/// a map in tests.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;
}

pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for std::collections::HashMap<&str, &str> {
    fn get(&self, key: &str) -> Option<String> {
        std::collections::HashMap::get(self, key).map(|v| v.to_string())
    }
}

/// Wrapper over env lookup to return an invalid enviroment var error
fn env_check(env: &dyn EnvSource, s: &str) -> Result<String, PipelineError> {
    match env.get(s) {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(PipelineError::Config(format!("{s} was not set"))),
    }
}

/// Optional value, blank counts as unset
fn env_opt(env: &dyn EnvSource, s: &str) -> Option<String> {
    env.get(s).filter(|v| !v.trim().is_empty())
}

/// Ensures that url is https
fn ensure_https(url: &Url) -> Result<(), String> {
    if url.scheme() == "https" {
        Ok(())
    } else {
        Err(format!("URL must be https: {url}"))
    }
}

fn ensure_host(url: &Url, expected_host: &str) -> Result<(), String> {
    match url.host_str() {
        Some(h) if h.eq_ignore_ascii_case(expected_host) => Ok(()),
        Some(h) => Err(
            format!("Unexpected host for {url} (got {h}, expected {expected_host})")
        ),
        None => Err(format!("URL missing host: {url}"))
    }
}

fn ensure_trailing_slash(url: &mut Url) {
    if !url.path().ends_with('/') {
        let mut path = url.path().to_string();
        path.push('/');
        url.set_path(&path);
    }
}

/// Configuration that Spotify expects when hitting endpoints
#[derive(Clone)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: Url,
    pub api_base: Url,
    pub market: String,
}

// keep the secret out of `println!("{:#?}")` and log lines
impl std::fmt::Debug for SpotifyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotifyConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("token_url", &self.token_url.as_str())
            .field("api_base", &self.api_base.as_str())
            .field("market", &self.market)
            .finish()
    }
}

fn build_spotify(env: &dyn EnvSource) -> Result<SpotifyConfig, PipelineError> {
    let client_id     = env_check(env, "SPOTIFY_CLIENT_ID")?;
    let client_secret = env_check(env, "SPOTIFY_CLIENT_SECRET")?;

    // form urls
    let token_url = env_opt(env, "SPOTIFY_TOKEN_URL")
        .unwrap_or_else(|| "https://accounts.spotify.com/api/token".to_string());

    let api_base  = env_opt(env, "SPOTIFY_API_BASE")
        .unwrap_or_else(|| "https://api.spotify.com/v1/".to_string());

    let token_url = Url::parse(&token_url)
        .map_err(|e| PipelineError::Config(
                format!("SPOTIFY_TOKEN_URL invalid {e}")
        ))?;

    let mut api_base  = Url::parse(&api_base)
        .map_err(|e| PipelineError::Config(
                format!("SPOTIFY_API_BASE invalid {e}")
        ))?;

    // ensure valid https and hostname for both urls
    ensure_https(&token_url).map_err(PipelineError::Config)?;
    ensure_https(&api_base).map_err(PipelineError::Config)?;
    ensure_host(&token_url, "accounts.spotify.com")
        .map_err(PipelineError::Config)?;
    ensure_host(&api_base, "api.spotify.com")
        .map_err(PipelineError::Config)?;

    ensure_trailing_slash(&mut api_base);

    let market = env_opt(env, "SPOTIFY_MARKET")
        .unwrap_or_else(|| "US".to_string())
        .to_ascii_uppercase();
    if market.len() != 2 || !market.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(PipelineError::Config(
            format!("SPOTIFY_MARKET must be a two letter country code, got {market}")
        ));
    }

    Ok( SpotifyConfig { client_id, client_secret, token_url, api_base, market })
}

///
/// Configuration for the document store the tracks are cached in
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Redis,
    Memory
}

#[derive(Clone)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>
}

impl std::fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheConfig")
            .field("backend", &self.backend)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Redis,
            host: REDIS_DEFAULT_HOST.to_string(),
            port: REDIS_DEFAULT_PORT,
            user: None,
            password: None
        }
    }
}

fn build_cache(env: &dyn EnvSource) -> Result<CacheConfig, PipelineError> {
    let backend = match env_opt(env, "CACHE_BACKEND").as_deref() {
        None | Some("redis") => CacheBackend::Redis,
        Some("memory") => CacheBackend::Memory,
        Some(other) => return Err(PipelineError::Config(
            format!("CACHE_BACKEND must be redis or memory, got {other}")
        )),
    };

    let host = env_opt(env, "REDIS_HOST")
        .unwrap_or_else(|| REDIS_DEFAULT_HOST.to_string());
    let port = match env_opt(env, "REDIS_PORT") {
        Some(p) => p.trim().parse::<u16>()
            .map_err(|e| PipelineError::Config(format!("REDIS_PORT invalid {e}")))?,
        None => REDIS_DEFAULT_PORT
    };

    Ok( CacheConfig {
        backend,
        host,
        port,
        user: env_opt(env, "REDIS_USER"),
        password: env_opt(env, "REDIS_PASSWORD")
    })
}

///
/// Configuration for Http timeouts, pooling, etc.
///
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: time::Duration,
    pub connect_timeout: time::Duration,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: time::Duration,
    pub max_redirects: u8,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: time::Duration::from_millis(HTTP_TIMEOUT),
            connect_timeout: time::Duration::from_millis(HTTP_CONNECT_TIMEOUT),
            pool_max_idle_per_host: HTTP_POOL_MAX_IDLE,
            pool_idle_timeout: time::Duration::from_millis(HTTP_POOL_IDLE_TIMEOUT),
            max_redirects: HTTP_MAX_REDIRECTS,
        }
    }
}

///
/// Which artists to fetch and how rows are projected
///
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub artists: Vec<String>,
    pub artist_selection: ArtistSelection
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            artists: DEFAULT_ARTISTS.iter().map(|a| a.to_string()).collect(),
            artist_selection: ArtistSelection::Last
        }
    }
}

fn build_pipeline(env: &dyn EnvSource) -> Result<PipelineConfig, PipelineError> {
    let mut cfg = PipelineConfig::default();

    if let Some(list) = env_opt(env, "ARTISTS") {
        cfg.artists = list.split(';')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect();
        if cfg.artists.is_empty() {
            return Err(PipelineError::Config("ARTISTS has no names".to_string()));
        }
    }

    if let Some(sel) = env_opt(env, "ARTIST_SELECTION") {
        cfg.artist_selection = sel.parse().map_err(PipelineError::Config)?;
    }

    Ok(cfg)
}

///
/// Configuration for the optional on-disk archive
///
#[derive(Debug, Clone)]
pub struct SinkConfig {
    pub root: Option<PathBuf>,
    pub level: i32
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self { root: None, level: SINK_DEFAULT_LEVEL }
    }
}

fn build_sink(env: &dyn EnvSource) -> Result<SinkConfig, PipelineError> {
    let root  = env_opt(env, "SINK_ROOT").map(PathBuf::from);
    let level = match env_opt(env, "SINK_LEVEL") {
        Some(l) => l.trim().parse::<i32>()
            .map_err(|e| PipelineError::Config(format!("SINK_LEVEL invalid {e}")))?,
        None => SINK_DEFAULT_LEVEL
    };
    Ok( SinkConfig { root, level } )
}

///
/// Configuration for Logger
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub filter_directives: String,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub include_file_line: bool,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter_directives: "info,track_cache=debug,reqwest=warn".to_string(),
            format: LogFormat::Json,
            with_ansi: true,
            include_file_line: true,
            include_target: true,
        }
    }
}

fn build_logging(env: &dyn EnvSource) -> Result<LoggingConfig, PipelineError> {
    let mut cfg = LoggingConfig::default();
    match env_opt(env, "LOG_FORMAT").as_deref() {
        None | Some("json") => {},
        Some("pretty") => cfg.format = LogFormat::Pretty,
        Some(other) => return Err(PipelineError::Config(
            format!("LOG_FORMAT must be json or pretty, got {other}")
        )),
    }
    Ok(cfg)
}

///
/// AppConfig which holds everything the pipeline needs, built once at start
///
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub spotify: SpotifyConfig,
    pub cache: CacheConfig,
    pub http: HttpConfig,
    pub pipeline: PipelineConfig,
    pub sink: SinkConfig,
    pub logging: LoggingConfig
}

///
/// Return all environment variables to caller at program start.
///
pub fn load_config() -> Result<AppConfig, PipelineError> {
    dotenvy::dotenv().ok();
    load_config_from(&ProcessEnv)
}

pub fn load_config_from(env: &dyn EnvSource) -> Result<AppConfig, PipelineError> {
    let spotify  = build_spotify(env)?;
    let cache    = build_cache(env)?;
    let http     = HttpConfig::default();
    let pipeline = build_pipeline(env)?;
    let sink     = build_sink(env)?;
    let logging  = build_logging(env)?;

    Ok( AppConfig { spotify, cache, http, pipeline, sink, logging } )
}
