//! HLS playlist relay.
//!
//! Fetches an upstream playlist, checks it really is one, and rewrites every
//! URI so nested playlists come back through the relay while segments are
//! fetched directly from their absolute location. Stateless: one instance
//! serves any number of concurrent requests.

use crate::domain::m3u8::{Playlist, EXTM3U};
use crate::error::{AppError, Result};
use crate::ports::fetch::{FetchedPlaylist, PlaylistFetcher};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Base used to parse relay-relative URLs such as `/api/hls-proxy?url=...`.
const LOCAL_BASE: &str = "http://relay.invalid/";
const MAX_NESTING: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Rewritten playlist body.
    Playlist(String),
    /// The request wrapped the relay in itself; go here instead.
    Redirect(String),
}

pub struct RelayService {
    fetcher: Arc<dyn PlaylistFetcher>,
    /// Prefix of emitted relay URLs, e.g. `/api/hls-proxy`
    relay_base: String,
    /// Path component of `relay_base`
    route: String,
}

impl RelayService {
    pub fn new(fetcher: Arc<dyn PlaylistFetcher>, relay_base: impl Into<String>) -> Self {
        let relay_base = relay_base.into();
        let route = Url::parse(&relay_base)
            .map(|url| url.path().to_string())
            .unwrap_or_else(|_| relay_base.clone());
        Self {
            fetcher,
            relay_base,
            route,
        }
    }

    /// Path the relay is mounted at.
    pub fn route(&self) -> &str {
        &self.route
    }

    pub async fn relay(&self, raw_url: &str) -> Result<RelayOutcome> {
        let raw_url = raw_url.trim();
        if raw_url.is_empty() {
            return Err(AppError::Input("missing url parameter".to_string()));
        }

        let target = parse_target(raw_url)?;
        if self.is_relay_url(&target) {
            let inner = self.innermost(raw_url)?;
            let location = self.relay_url(&inner);
            info!(inner = %inner, "Relay URL wraps the relay, redirecting once");
            return Ok(RelayOutcome::Redirect(location));
        }
        let target = require_absolute(target, raw_url)?;

        let fetched = self.fetcher.fetch(&target).await?;
        if !is_playlist(&target, &fetched) {
            warn!(url = %target, content_type = ?fetched.content_type, "Upstream response is not a playlist");
            return Err(AppError::NotAPlaylist {
                url: target.to_string(),
            });
        }

        debug!(url = %target, bytes = fetched.body.len(), "Rewriting playlist");
        Ok(RelayOutcome::Playlist(self.rewrite(&target, &fetched.body)))
    }

    /// Rewrite every URI of `body`, resolved against `base`.
    pub fn rewrite(&self, base: &Url, body: &str) -> String {
        let mut playlist = Playlist::parse(body);
        playlist.rewrite_uris(|uri| self.rewrite_uri(base, uri));
        playlist.to_string()
    }

    /// `<relay>?url=<encoded target>`
    pub fn relay_url(&self, target: &Url) -> String {
        format!(
            "{}?url={}",
            self.relay_base,
            urlencoding::encode(target.as_str())
        )
    }

    fn rewrite_uri(&self, base: &Url, uri: &str) -> String {
        let resolved = match Url::parse(uri) {
            Ok(absolute) => absolute,
            Err(url::ParseError::RelativeUrlWithoutBase) => match base.join(uri) {
                Ok(joined) => joined,
                Err(_) => return uri.to_string(),
            },
            Err(_) => return uri.to_string(),
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            return uri.to_string();
        }

        let resolved = if self.is_relay_url(&resolved) {
            match self.innermost(resolved.as_str()) {
                Ok(inner) => inner,
                Err(_) => return uri.to_string(),
            }
        } else {
            resolved
        };

        if is_playlist_path(&resolved) {
            self.relay_url(&resolved)
        } else {
            resolved.to_string()
        }
    }

    fn is_relay_url(&self, url: &Url) -> bool {
        url.path().ends_with(&self.route) && url_param(url.as_str(), &self.route).is_some()
    }

    /// Peel relay wrappers until the real upstream URL is left.
    fn innermost(&self, raw: &str) -> Result<Url> {
        let mut current = raw.to_string();
        for _ in 0..MAX_NESTING {
            let target = parse_target(&current)?;
            if !self.is_relay_url(&target) {
                return require_absolute(target, &current);
            }
            current = url_param(&current, &self.route)
                .ok_or_else(|| AppError::Input(format!("relay URL without target: {}", current)))?;
        }
        Err(AppError::Input("relay URL nested too deeply".to_string()))
    }
}

fn parse_target(raw: &str) -> Result<Url> {
    let parsed = if raw.starts_with('/') {
        Url::parse(LOCAL_BASE).and_then(|base| base.join(raw))
    } else {
        Url::parse(raw)
    };
    parsed.map_err(|e| AppError::Input(format!("invalid url {}: {}", raw, e)))
}

fn require_absolute(url: Url, raw: &str) -> Result<Url> {
    let local = Url::parse(LOCAL_BASE).ok();
    if !matches!(url.scheme(), "http" | "https")
        || local.as_ref().and_then(Url::host_str) == url.host_str()
    {
        return Err(AppError::Input(format!(
            "url must be an absolute http(s) URL: {}",
            raw
        )));
    }
    Ok(url)
}

/// Value of the `url=` parameter that follows the relay route in `raw`.
fn url_param(raw: &str, route: &str) -> Option<String> {
    let after_route = &raw[raw.find(route)? + route.len()..];
    target_param(after_route.strip_prefix('?')?)
}

/// The `url` parameter of a raw query string.
///
/// An unencoded absolute URL is taken verbatim to the end of the query, so
/// its own `?` and `&` survive; an encoded one ends at the next `&`.
pub fn target_param(query: &str) -> Option<String> {
    let start = if query.starts_with("url=") {
        0
    } else {
        query.find("&url=")? + 1
    };
    let value = &query[start + "url=".len()..];
    if value.is_empty() {
        return None;
    }
    if value.contains("://") {
        Some(value.to_string())
    } else {
        let value = value.split('&').next().unwrap_or(value);
        urlencoding::decode(value).ok().map(|v| v.into_owned())
    }
}

fn is_playlist_path(url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();
    path.ends_with(".m3u8") || path.ends_with(".m3u")
}

/// Playlist if the body carries `#EXTM3U`, the content type names an
/// M3U8/mpegURL type, or the path ends in `.m3u8`. A markup body is never a
/// playlist.
fn is_playlist(url: &Url, fetched: &FetchedPlaylist) -> bool {
    if fetched.body.trim_start().starts_with('<') {
        return false;
    }
    if fetched.body.contains(EXTM3U) {
        return true;
    }
    let declared = fetched
        .content_type
        .as_deref()
        .map(|ct| ct.to_ascii_lowercase())
        .map_or(false, |ct| ct.contains("mpegurl") || ct.contains("m3u8"));
    declared || is_playlist_path(url)
}
