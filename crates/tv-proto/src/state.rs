//! The catalog engine: group store, pagination cursor, navigation position
//! and favorites behind one owner.
//!
//! Lock order is always `cursor` → `state`.  The cursor mutex is held across
//! the network fetch so at most one fetch per cursor value is in flight; the
//! state lock is only ever held for synchronous updates.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogSource, FetchError};
use crate::favorites::{self, FavoritesFile};
use crate::groups::GroupStore;
use crate::pagination::{CandidatePlan, Slot};
use crate::protocol::{
    CatalogState, Channel, ChannelGroup, CountryDirectory, UserMeta, FAVORITES_GROUP_ID,
};

const FAVORITES_DISPLAY_NAME: &str = "Favorites";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to initialize: {0}")]
    Startup(#[source] FetchError),

    #[error("unknown group: {0}")]
    UnknownGroup(String),

    #[error("unknown channel: {0}")]
    UnknownChannel(String),

    #[error("no channel is playing")]
    NothingPlaying,
}

/// Result of one pagination step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowthOutcome {
    /// Slot consumed and a new group appended.
    Added,
    /// Slot consumed, nothing appended (empty after filtering, or id already present).
    Empty,
    /// Cursor is past the last candidate.
    Exhausted,
    /// Fetch failed or the engine is not initialized; cursor unchanged.
    Failed,
}

impl GrowthOutcome {
    pub fn advanced(self) -> bool {
        matches!(self, GrowthOutcome::Added | GrowthOutcome::Empty)
    }
}

/// Outcome of a favorite toggle, for user-facing notices.
#[derive(Debug, Clone)]
pub struct FavoriteChange {
    pub channel: Channel,
    pub added: bool,
}

/// Where the viewer is, as read by remote-key handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub active_group_id: String,
    pub current_index: usize,
    pub is_overlay_open: bool,
    /// A channel exists at the current index.
    pub is_playing: bool,
}

/// Detached background prefetch.  Dropping the handle does not stop it.
pub struct PrefetchHandle {
    handle: JoinHandle<usize>,
}

impl PrefetchHandle {
    /// Wait for the task and return how many groups it appended.
    pub async fn join(self) -> usize {
        match self.handle.await {
            Ok(added) => added,
            Err(e) => {
                debug!("Prefetch task ended early: {}", e);
                0
            }
        }
    }
}

#[derive(Debug, Default)]
struct EngineState {
    rev: u64,
    store: GroupStore,
    active_group_id: String,
    current_index: usize,
    favorites: Vec<Channel>,
    fetched_groups_count: usize,
    is_fetching: bool,
    is_all_fetched: bool,
    is_overlay_open: bool,
    error: Option<String>,
    user_meta: Option<UserMeta>,
    directory: Option<Arc<CountryDirectory>>,
}

impl EngineState {
    fn snapshot(&self) -> CatalogState {
        CatalogState {
            rev: self.rev,
            groups: self.store.as_slice().to_vec(),
            active_group_id: self.active_group_id.clone(),
            current_index: self.current_index,
            favorites: self.favorites.clone(),
            fetched_groups_count: self.fetched_groups_count,
            is_fetching: self.is_fetching,
            is_all_fetched: self.is_all_fetched,
            is_overlay_open: self.is_overlay_open,
            error: self.error.clone(),
            user_meta: self.user_meta.clone(),
        }
    }

    fn active_len(&self) -> usize {
        self.store
            .get(&self.active_group_id)
            .map(|g| g.channels.len())
            .unwrap_or(0)
    }

    fn activate(&mut self, position: usize, index: usize) {
        if let Some(group) = self.store.at(position) {
            self.active_group_id = group.id.clone();
            self.current_index = index;
        }
    }

    fn clamp_index(&mut self) {
        let len = self.active_len();
        if self.current_index >= len {
            self.current_index = len.saturating_sub(1);
        }
    }

    fn current_channel(&self) -> Option<&Channel> {
        self.store
            .get(&self.active_group_id)
            .and_then(|g| g.channels.get(self.current_index))
    }

    fn find_channel(&self, channel_id: &str) -> Option<&Channel> {
        self.store
            .find_channel(channel_id)
            .or_else(|| self.favorites.iter().find(|c| c.nanoid == channel_id))
    }
}

struct Inner {
    state: RwLock<EngineState>,
    /// Pagination cursor; the lock doubles as the single-flight guard.
    cursor: Mutex<usize>,
    source: Arc<dyn CatalogSource>,
    favorites_file: FavoritesFile,
    background_prefetch: usize,
    rev_tx: watch::Sender<u64>,
}

#[derive(Clone)]
pub struct CatalogEngine {
    inner: Arc<Inner>,
}

impl CatalogEngine {
    pub fn new(
        source: Arc<dyn CatalogSource>,
        favorites_file: FavoritesFile,
        background_prefetch: usize,
    ) -> Self {
        let (rev_tx, _) = watch::channel(0);
        let state = EngineState {
            rev: 1,
            active_group_id: FAVORITES_GROUP_ID.to_string(),
            ..Default::default()
        };
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(state),
                cursor: Mutex::new(0),
                source,
                favorites_file,
                background_prefetch,
                rev_tx,
            }),
        }
    }

    /// Revision feed; ticks after every state change, including ones made
    /// by background prefetch.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.rev_tx.subscribe()
    }

    fn bump(&self, state: &mut EngineState) {
        state.rev += 1;
        self.inner.rev_tx.send_replace(state.rev);
    }

    pub async fn snapshot(&self) -> CatalogState {
        self.inner.state.read().await.snapshot()
    }

    pub async fn is_all_fetched(&self) -> bool {
        self.inner.state.read().await.is_all_fetched
    }

    /// Cursor position without cloning the catalog.
    pub async fn position(&self) -> Position {
        let state = self.inner.state.read().await;
        Position {
            active_group_id: state.active_group_id.clone(),
            current_index: state.current_index,
            is_overlay_open: state.is_overlay_open,
            is_playing: state.current_channel().is_some(),
        }
    }

    /// Run `f` over the loaded groups under the read lock.
    pub async fn with_groups<R>(&self, f: impl FnOnce(&[ChannelGroup]) -> R) -> R {
        f(self.inner.state.read().await.store.as_slice())
    }

    /// Seed favorites, load country metadata and the home group, pick the
    /// start group, then start the background prefetch.
    ///
    /// Metadata or home-country fetch failures are fatal: the error flag is
    /// set and no groups are loaded.
    pub async fn initialize(&self, user_meta: UserMeta) -> Result<PrefetchHandle, EngineError> {
        let saved = self.inner.favorites_file.load();
        info!(
            "Initializing catalog for {}/{} ({} favorites)",
            user_meta.country_code,
            user_meta.lang_code,
            saved.len()
        );

        {
            let mut state = self.inner.state.write().await;
            state.favorites = saved.clone();
            state.user_meta = Some(user_meta.clone());
            state.is_fetching = true;
            state.error = None;
            self.bump(&mut state);
        }

        let loaded = self.load_startup_groups(&user_meta, saved).await;

        let mut state = self.inner.state.write().await;
        state.is_fetching = false;
        match loaded {
            Ok((directory, groups)) => {
                let start = match groups.as_slice() {
                    [favs, ..] if !favs.is_empty() => FAVORITES_GROUP_ID.to_string(),
                    [_, home, ..] => home.id.clone(),
                    _ => FAVORITES_GROUP_ID.to_string(),
                };
                for group in groups {
                    state.store.add_group(group);
                }
                state.directory = Some(Arc::new(directory));
                state.active_group_id = start;
                state.current_index = 0;
                self.bump(&mut state);
                drop(state);

                info!("Catalog ready, starting background prefetch");
                Ok(self.spawn_prefetch(self.inner.background_prefetch))
            }
            Err(e) => {
                warn!("Initialization failed: {}", e);
                state.error = Some(e.to_string());
                self.bump(&mut state);
                Err(EngineError::Startup(e))
            }
        }
    }

    async fn load_startup_groups(
        &self,
        user_meta: &UserMeta,
        favorites: Vec<Channel>,
    ) -> Result<(CountryDirectory, Vec<ChannelGroup>), FetchError> {
        let mut groups = vec![ChannelGroup::new(
            FAVORITES_GROUP_ID,
            FAVORITES_DISPLAY_NAME,
            favorites,
        )];

        let directory = self.inner.source.fetch_country_metadata().await?;
        debug!("Country metadata: {} entries", directory.len());

        let home = &user_meta.country_code;
        let channels = self.inner.source.fetch_channels_by_country(home).await?;
        if channels.is_empty() {
            debug!("Home country {} has no channels", home);
        } else {
            groups.push(ChannelGroup::new(
                home.to_lowercase(),
                directory.display_name(home),
                channels,
            ));
        }

        Ok((directory, groups))
    }

    // ── Pagination ───────────────────────────────────────────────────────────

    /// One pagination step.  `true` when the cursor advanced.
    pub async fn load_more_groups(&self) -> bool {
        self.load_more().await.advanced()
    }

    pub async fn load_more(&self) -> GrowthOutcome {
        let mut cursor = self.inner.cursor.lock().await;

        let (user_meta, directory) = {
            let state = self.inner.state.read().await;
            match (&state.user_meta, &state.directory) {
                (Some(meta), Some(dir)) => (meta.clone(), Arc::clone(dir)),
                _ => {
                    debug!("load_more_groups before initialization");
                    return GrowthOutcome::Failed;
                }
            }
        };

        let plan = CandidatePlan::new(&user_meta, &directory);
        let Some(slot) = plan.slot(*cursor) else {
            let mut state = self.inner.state.write().await;
            if !state.is_all_fetched {
                info!("All {} catalog candidates fetched", plan.total());
                state.is_all_fetched = true;
                self.bump(&mut state);
            }
            return GrowthOutcome::Exhausted;
        };

        let fetched = match &slot {
            Slot::Neighbor(code) | Slot::Other(code) => {
                self.inner.source.fetch_channels_by_country(code).await
            }
            Slot::NativeCategory(slug) | Slot::ForeignCategory(slug) => {
                self.inner.source.fetch_channels_by_category(slug).await
            }
        };
        let channels = match fetched {
            Ok(channels) => channels,
            Err(e) => {
                warn!("Failed to load group {} (cursor {}): {}", slot.key(), *cursor, e);
                return GrowthOutcome::Failed;
            }
        };

        let group = plan.build_group(&slot, channels);
        let mut state = self.inner.state.write().await;
        *cursor += 1;
        state.fetched_groups_count = *cursor;
        let added = match group {
            Some(group) => {
                let id = group.id.clone();
                let added = state.store.add_group(group);
                if added {
                    debug!("Added group {} (cursor {})", id, *cursor);
                }
                added
            }
            None => {
                debug!("Slot {} produced no channels", slot.key());
                false
            }
        };
        self.bump(&mut state);

        if added {
            GrowthOutcome::Added
        } else {
            GrowthOutcome::Empty
        }
    }

    /// Run up to `attempts` pagination steps on a detached task.  Failures
    /// are logged and never reach the caller.
    pub fn spawn_prefetch(&self, attempts: usize) -> PrefetchHandle {
        let engine = self.clone();
        let handle = tokio::spawn(async move {
            let mut added = 0;
            for _ in 0..attempts {
                match engine.load_more().await {
                    GrowthOutcome::Added => added += 1,
                    GrowthOutcome::Exhausted => break,
                    GrowthOutcome::Empty | GrowthOutcome::Failed => {}
                }
            }
            debug!("Background prefetch appended {} groups", added);
            added
        });
        PrefetchHandle { handle }
    }

    // ── Navigation ───────────────────────────────────────────────────────────

    pub async fn set_active_group(&self, group_id: &str) -> Result<(), EngineError> {
        let mut state = self.inner.state.write().await;
        if !state.store.contains(group_id) {
            return Err(EngineError::UnknownGroup(group_id.to_string()));
        }
        state.active_group_id = group_id.to_string();
        state.current_index = 0;
        self.bump(&mut state);
        Ok(())
    }

    /// Clamped to the active group's bounds.
    pub async fn set_current_index(&self, index: usize) {
        let mut state = self.inner.state.write().await;
        state.current_index = index;
        state.clamp_index();
        self.bump(&mut state);
    }

    pub async fn set_overlay_open(&self, open: bool) {
        let mut state = self.inner.state.write().await;
        if state.is_overlay_open != open {
            state.is_overlay_open = open;
            self.bump(&mut state);
        }
    }

    /// Move the current-channel cursor, crossing group boundaries with
    /// wraparound.  Stepping past the end of the last known group grows the
    /// catalog by one step and returns the detached follow-up prefetch.
    pub async fn navigate_to_channel(&self, target: i64) -> Option<PrefetchHandle> {
        let mut state = self.inner.state.write().await;
        let Some(position) = state.store.position(&state.active_group_id) else {
            warn!("Active group {} is not loaded", state.active_group_id);
            return None;
        };
        let len = state.active_len();

        if target < 0 {
            let count = state.store.len();
            let prev = (position + count - 1) % count;
            let last = state
                .store
                .at(prev)
                .map(|g| g.channels.len().saturating_sub(1))
                .unwrap_or(0);
            state.activate(prev, last);
            self.bump(&mut state);
            return None;
        }

        let target = target as usize;
        if target < len {
            state.current_index = target;
            self.bump(&mut state);
            return None;
        }

        if position + 1 < state.store.len() {
            state.activate(position + 1, 0);
            self.bump(&mut state);
            return None;
        }

        // Past the end of the last known group
        state.is_fetching = true;
        self.bump(&mut state);
        drop(state);

        let outcome = self.load_more().await;
        let prefetch = (outcome != GrowthOutcome::Exhausted)
            .then(|| self.spawn_prefetch(self.inner.background_prefetch));

        let mut state = self.inner.state.write().await;
        state.is_fetching = false;
        let next = match outcome {
            GrowthOutcome::Added | GrowthOutcome::Empty if position + 1 < state.store.len() => {
                position + 1
            }
            GrowthOutcome::Failed => {
                debug!("Growth failed, wrapping to the first group");
                0
            }
            _ => 0,
        };
        state.activate(next, 0);
        self.bump(&mut state);
        prefetch
    }

    /// Switch to `channel_id` within `group_id` (or the active group) and
    /// close the overlay.  A channel missing from that group only closes the
    /// overlay.  Returns whether the position changed.
    pub async fn play_channel(&self, channel_id: &str, group_id: Option<&str>) -> bool {
        let mut state = self.inner.state.write().await;
        let target = group_id
            .map(str::to_string)
            .unwrap_or_else(|| state.active_group_id.clone());

        let found = state
            .store
            .position(&target)
            .and_then(|pos| Some((pos, state.store.at(pos)?.position_of(channel_id)?)));

        state.is_overlay_open = false;
        let moved = match found {
            Some((pos, index)) => {
                state.activate(pos, index);
                true
            }
            None => {
                debug!("Channel {} is not in group {}", channel_id, target);
                false
            }
        };
        self.bump(&mut state);
        moved
    }

    // ── Favorites ────────────────────────────────────────────────────────────

    /// Replace the favorites list, rewrite the favorites group and persist.
    pub async fn set_favorites(&self, favorites: Vec<Channel>) {
        {
            let mut state = self.inner.state.write().await;
            self.apply_favorites(&mut state, favorites);
        }
        self.persist_favorites().await;
    }

    /// Toggle `channel_id`, or the current channel when `None`.
    pub async fn toggle_favorite(
        &self,
        channel_id: Option<&str>,
    ) -> Result<FavoriteChange, EngineError> {
        let change = {
            let mut state = self.inner.state.write().await;
            let channel = match channel_id {
                Some(id) => state
                    .find_channel(id)
                    .cloned()
                    .ok_or_else(|| EngineError::UnknownChannel(id.to_string()))?,
                None => state
                    .current_channel()
                    .cloned()
                    .ok_or(EngineError::NothingPlaying)?,
            };

            let mut list = state.favorites.clone();
            let added = favorites::toggle(&mut list, &channel);
            self.apply_favorites(&mut state, list);
            FavoriteChange { channel, added }
        };

        info!(
            "{} {} favorites",
            change.channel.name,
            if change.added { "added to" } else { "removed from" }
        );
        self.persist_favorites().await;
        Ok(change)
    }

    fn apply_favorites(&self, state: &mut EngineState, favorites: Vec<Channel>) {
        state.favorites = favorites.clone();
        state
            .store
            .update_group_channels(FAVORITES_GROUP_ID, favorites);
        if state.active_group_id == FAVORITES_GROUP_ID {
            state.clamp_index();
        }
        self.bump(state);
    }

    async fn persist_favorites(&self) {
        let favorites = self.inner.state.read().await.favorites.clone();
        if let Err(e) = self.inner.favorites_file.save(&favorites).await {
            warn!(
                "Failed to save favorites to {}: {}",
                self.inner.favorites_file.path().display(),
                e
            );
        }
    }
}
