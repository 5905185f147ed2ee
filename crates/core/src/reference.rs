//! Parsing of opaque storage references.
//!
//! A reference stored on a drink or collection row is one of:
//! - a storage-service URL (`https://<host>/storage/v1/object/<mode>/<bucket>/<path>`)
//! - a bare `bucket/path` string
//! - anything else, which is treated as an external URL and passed through

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static STORAGE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/storage/v1/object/(?:public|sign|authenticated)/([^/]+)/(.+)$")
        .expect("storage path pattern")
});

static BARE_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z0-9_-]+)/(.+)$").expect("bare object pattern"));

/// A parsed storage reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StorageReference {
    /// Usable as-is, no signing needed.
    External(String),
    /// An object in the managed storage service.
    Object { bucket: String, path: String },
}

impl StorageReference {
    /// Parses a reference.
    ///
    /// Returns `None` for empty input. When `storage_host` is `None`, any
    /// absolute URL whose path looks like a storage object URL is treated
    /// as one.
    pub fn parse(input: &str, storage_host: Option<&str>) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }

        if is_absolute_url(trimmed) {
            let Ok(url) = Url::parse(trimmed) else {
                return Some(Self::External(trimmed.to_string()));
            };

            let on_storage_host = match (url.host_str(), storage_host) {
                (Some(host), Some(expected)) => host.eq_ignore_ascii_case(expected),
                (Some(_), None) => true,
                (None, _) => false,
            };
            if !on_storage_host {
                return Some(Self::External(trimmed.to_string()));
            }

            return Some(
                Self::from_storage_path(url.path())
                    .unwrap_or_else(|| Self::External(trimmed.to_string())),
            );
        }

        match BARE_OBJECT.captures(trimmed) {
            Some(caps) => Some(Self::Object {
                bucket: caps[1].to_string(),
                path: caps[2].to_string(),
            }),
            None => Some(Self::External(trimmed.to_string())),
        }
    }

    fn from_storage_path(path: &str) -> Option<Self> {
        let caps = STORAGE_PATH.captures(path)?;
        let bucket = urlencoding::decode(&caps[1]).ok()?.into_owned();
        let object = urlencoding::decode(&caps[2]).ok()?.into_owned();
        Some(Self::Object {
            bucket,
            path: object,
        })
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object { .. })
    }
}

fn is_absolute_url(s: &str) -> bool {
    let lower = s.get(..8).unwrap_or(s).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
