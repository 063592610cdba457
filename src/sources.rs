//! HTTP clients for the upstream catalogs.
//!
//! All requests are blocking; a job that needs several sources fetches them
//! concurrently with `rayon::join` and only starts processing once every
//! fetch has succeeded. Any failure aborts the job before anything is written.

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::config::SourcesConfig;
use crate::error::{Error, Result};
use crate::models::{ChunirecSong, CommunityCatalog, OfficialSong};

const USER_AGENT: &str = concat!("chuni-catalog/", env!("CARGO_PKG_VERSION"));

/// Everything the primary sync reconciles.
#[derive(Debug, Clone)]
pub struct Sources {
    pub primary: Vec<ChunirecSong>,
    pub official: Vec<OfficialSong>,
    pub community: CommunityCatalog,
}

pub struct SourceClient {
    http: Client,
    endpoints: SourcesConfig,
}

impl SourceClient {
    pub fn new(endpoints: SourcesConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(endpoints.timeout())
            .build()
            .map_err(|source| Error::Http {
                url: String::new(),
                source: source.without_url(),
            })?;
        Ok(Self { http, endpoints })
    }

    pub fn endpoints(&self) -> &SourcesConfig {
        &self.endpoints
    }

    /// Fetch a URL as text, failing on any non-success status.
    pub fn fetch_text(&self, url: &str) -> Result<String> {
        debug!(url, "GET");
        let response = self.http.get(url).send().map_err(|source| Error::Http {
            url: redact(url),
            source: source.without_url(),
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                url: redact(url),
                status: status.as_u16(),
            });
        }
        response.text().map_err(|source| Error::Http {
            url: redact(url),
            source: source.without_url(),
        })
    }

    fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let body = self.fetch_text(url)?;
        serde_json::from_str(&body).map_err(|source| Error::Decode {
            url: redact(url),
            source,
        })
    }

    /// Primary metadata/difficulty source.
    pub fn fetch_primary(&self, token: &str) -> Result<Vec<ChunirecSong>> {
        let url = format!(
            "{}/2.0/music/showall.json?token={}&region=jp2",
            self.endpoints.chunirec_base.trim_end_matches('/'),
            token
        );
        self.fetch_json(&url)
    }

    /// Official title/genre source.
    pub fn fetch_official(&self) -> Result<Vec<OfficialSong>> {
        self.fetch_json(&self.endpoints.official_url)
    }

    /// Community note-count source.
    pub fn fetch_community(&self) -> Result<CommunityCatalog> {
        self.fetch_json(&self.endpoints.community_url)
    }

    /// Community alias list (tab-separated).
    pub fn fetch_aliases(&self) -> Result<String> {
        self.fetch_text(&self.endpoints.alias_url)
    }

    /// Absolute sdvx.in URL for a site path such as `/chunithm/end.htm`.
    pub fn sdvxin_url(&self, path: &str) -> String {
        format!("{}{}", self.endpoints.sdvxin_base.trim_end_matches('/'), path)
    }

    /// Fetch the three catalogs concurrently.
    pub fn fetch_all(&self, token: &str) -> Result<Sources> {
        let (primary, (official, community)) = rayon::join(
            || self.fetch_primary(token),
            || rayon::join(|| self.fetch_official(), || self.fetch_community()),
        );
        let sources = Sources {
            primary: primary?,
            official: official?,
            community: community?,
        };
        info!(
            primary = sources.primary.len(),
            official = sources.official.len(),
            community = sources.community.songs.len(),
            "Fetched sources"
        );
        Ok(sources)
    }
}

/// Strip the query string so credentials never end up in logs or errors.
fn redact(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => format!("{base}?<redacted>"),
        None => url.to_string(),
    }
}
