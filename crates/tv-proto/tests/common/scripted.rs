#![allow(dead_code)]

//! In-memory catalog with per-key scripted replies.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tv_proto::catalog::{CatalogSource, FetchError};
use tv_proto::favorites::FavoritesFile;
use tv_proto::protocol::{Channel, CountryDirectory, CountryMeta, UserMeta};
use tv_proto::state::CatalogEngine;

#[derive(Debug, Clone)]
enum Reply {
    Channels(Vec<Channel>),
    Fail,
}

/// Unscripted keys answer with an empty list.  A queue with several replies
/// is consumed front to back; its last reply repeats forever.
#[derive(Default)]
pub struct ScriptedCatalog {
    directory: Vec<(String, String)>,
    metadata_fails: bool,
    delay: Option<Duration>,
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedCatalog {
    pub fn new(directory: &[(&str, &str)]) -> Self {
        Self {
            directory: directory
                .iter()
                .map(|(code, name)| (code.to_string(), name.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    fn push(self, key: String, reply: Reply) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(key)
            .or_default()
            .push_back(reply);
        self
    }

    pub fn country(self, code: &str, channels: Vec<Channel>) -> Self {
        self.push(format!("country:{}", code.to_uppercase()), Reply::Channels(channels))
    }

    pub fn country_fails(self, code: &str) -> Self {
        self.push(format!("country:{}", code.to_uppercase()), Reply::Fail)
    }

    pub fn category(self, slug: &str, channels: Vec<Channel>) -> Self {
        self.push(format!("category:{slug}"), Reply::Channels(channels))
    }

    pub fn metadata_fails(mut self) -> Self {
        self.metadata_fails = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fetches in call order, e.g. `country:AU`, `category:news`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn reply(&self, key: String) -> Result<Vec<Channel>, FetchError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push(key.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let reply = {
            let mut replies = self.replies.lock().unwrap();
            match replies.get_mut(&key) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match reply {
            Some(Reply::Channels(channels)) => Ok(channels),
            Some(Reply::Fail) => Err(FetchError::Other(format!("{key} unavailable"))),
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl CatalogSource for ScriptedCatalog {
    async fn fetch_channels_by_country(&self, country_code: &str) -> Result<Vec<Channel>, FetchError> {
        self.reply(format!("country:{}", country_code.to_uppercase()))
            .await
    }

    async fn fetch_channels_by_category(&self, category_slug: &str) -> Result<Vec<Channel>, FetchError> {
        self.reply(format!("category:{category_slug}")).await
    }

    async fn fetch_country_metadata(&self) -> Result<CountryDirectory, FetchError> {
        self.calls.lock().unwrap().push("metadata".into());
        if self.metadata_fails {
            return Err(FetchError::Other("metadata unavailable".into()));
        }
        Ok(CountryDirectory::from_entries(self.directory.iter().map(
            |(code, name)| {
                (
                    code.clone(),
                    CountryMeta {
                        country: name.clone(),
                        has_channels: true,
                        ..Default::default()
                    },
                )
            },
        )))
    }
}

/// `n` playable channels with ids `<prefix>-1` … `<prefix>-n`.
pub fn channels(prefix: &str, n: usize, lang: &str) -> Vec<Channel> {
    (1..=n)
        .map(|i| Channel {
            nanoid: format!("{prefix}-{i}"),
            name: format!("{prefix} {i}"),
            iptv_urls: vec![format!("https://streams.example/{prefix}/{i}.m3u8")],
            language: lang.to_string(),
            country: prefix.to_uppercase(),
            ..Default::default()
        })
        .collect()
}

pub fn user(country: &str, lang: &str) -> UserMeta {
    UserMeta {
        country_code: country.to_string(),
        lang_code: lang.to_string(),
    }
}

/// English-speaking US viewer.  Neighbors are AU, CA, IE, NZ, UK; the
/// remaining directory countries are FR then BR.
pub fn us_directory() -> Vec<(&'static str, &'static str)> {
    vec![
        ("US", "United States"),
        ("AU", "Australia"),
        ("FR", "France"),
        ("CA", "Canada"),
        ("BR", "Brazil"),
    ]
}

pub struct Harness {
    pub engine: CatalogEngine,
    pub source: Arc<ScriptedCatalog>,
    pub dir: tempfile::TempDir,
}

impl Harness {
    pub fn new(source: ScriptedCatalog, background_prefetch: usize) -> Self {
        let dir = tempfile::tempdir().unwrap();
        Self::in_dir(source, background_prefetch, dir)
    }

    pub fn in_dir(source: ScriptedCatalog, background_prefetch: usize, dir: tempfile::TempDir) -> Self {
        let source = Arc::new(source);
        let engine = CatalogEngine::new(
            source.clone(),
            FavoritesFile::new(dir.path().join("favorites.json")),
            background_prefetch,
        );
        Self {
            engine,
            source,
            dir,
        }
    }

    pub fn favorites_path(&self) -> std::path::PathBuf {
        self.dir.path().join("favorites.json")
    }

    /// Initialize and wait for the startup prefetch to finish.
    pub async fn ready(&self, meta: UserMeta) {
        let prefetch = self.engine.initialize(meta).await.ok().unwrap();
        prefetch.join().await;
    }
}
