use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tv_proto::catalog::{CatalogSource, FetchError};
use tv_proto::favorites::FavoritesFile;
use tv_proto::protocol::{Channel, CountryDirectory, CountryMeta, UserMeta};
use tv_proto::state::CatalogEngine;

/// Fixed in-memory catalog.  Unknown countries and every category are empty.
pub struct FixtureCatalog {
    home: String,
    lang: String,
    countries: HashMap<String, Vec<Channel>>,
    favorites: Vec<Channel>,
}

impl FixtureCatalog {
    pub fn new(home: &str, lang: &str) -> Self {
        Self {
            home: home.to_string(),
            lang: lang.to_string(),
            countries: HashMap::new(),
            favorites: Vec::new(),
        }
    }

    pub fn country(mut self, code: &str, channels: Vec<Channel>) -> Self {
        self.countries.insert(code.to_uppercase(), channels);
        self
    }

    /// Favorites saved before startup.
    pub fn favorites(mut self, channels: Vec<Channel>) -> Self {
        self.favorites = channels;
        self
    }
}

#[async_trait]
impl CatalogSource for FixtureCatalog {
    async fn fetch_channels_by_country(&self, country_code: &str) -> Result<Vec<Channel>, FetchError> {
        Ok(self
            .countries
            .get(&country_code.to_uppercase())
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_channels_by_category(&self, _category_slug: &str) -> Result<Vec<Channel>, FetchError> {
        Ok(Vec::new())
    }

    async fn fetch_country_metadata(&self) -> Result<CountryDirectory, FetchError> {
        Ok(CountryDirectory::from_entries([(
            self.home.clone(),
            CountryMeta {
                country: format!("Country {}", self.home),
                ..Default::default()
            },
        )]))
    }
}

pub fn channels(prefix: &str, n: usize) -> Vec<Channel> {
    (1..=n)
        .map(|i| Channel {
            nanoid: format!("{prefix}-{i}"),
            name: format!("{prefix} {i}"),
            iptv_urls: vec![format!("https://streams.example/{prefix}/{i}.m3u8")],
            ..Default::default()
        })
        .collect()
}

/// Initialized engine over `catalog`, favorites kept in a temp dir.
pub async fn engine_with(
    catalog: FixtureCatalog,
    background_prefetch: usize,
) -> (CatalogEngine, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let favorites = FavoritesFile::new(dir.path().join("favorites.json"));
    if !catalog.favorites.is_empty() {
        favorites.save(&catalog.favorites).await.unwrap();
    }

    let meta = UserMeta {
        country_code: catalog.home.clone(),
        lang_code: catalog.lang.clone(),
    };
    let engine = CatalogEngine::new(Arc::new(catalog), favorites, background_prefetch);
    let prefetch = engine.initialize(meta).await.ok().unwrap();
    prefetch.join().await;
    (engine, dir)
}
