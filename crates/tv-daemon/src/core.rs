//! DaemonCore: single-owner event loop for remote-control input.
//!
//! Every transport (TCP socket, HTTP API) funnels commands into this loop as
//! `DaemonEvent`s.  DaemonCore owns the quick-select state machine, its
//! auto-commit timer and the growth task; catalog and navigation state live
//! in the `CatalogEngine`, whose revision feed drives `StateUpdated`
//! broadcasts (including changes made by background prefetch).

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};
use tv_proto::config::QuickSelectConfig;
use tv_proto::protocol::{Command, QuickSelectView, RemoteKey};
use tv_proto::quick_select::QuickSelect;
use tv_proto::state::CatalogEngine;

use crate::BroadcastMessage;

// ── DaemonEvent ───────────────────────────────────────────────────────────────

/// All inputs into the DaemonCore loop.
#[derive(Debug)]
pub enum DaemonEvent {
    /// A command from a socket client or the HTTP API.
    ClientCommand(Command),
    /// Auto-commit timer fired for the given arm generation.
    QuickSelectTimeout(u64),
    /// Quick-select growth task finished.
    QuickSelectGrown { exhausted: bool, progressed: bool },
    Shutdown,
}

// ── DaemonCore ────────────────────────────────────────────────────────────────

pub struct DaemonCore {
    config: QuickSelectConfig,
    engine: CatalogEngine,
    quick_select: QuickSelect,
    /// Bumped on every quick-select change; older timeouts are stale.
    timer_generation: u64,
    timer: Option<AbortHandle>,
    view_tx: watch::Sender<QuickSelectView>,
    event_tx: mpsc::Sender<DaemonEvent>,
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
}

impl DaemonCore {
    pub fn new(
        engine: CatalogEngine,
        config: QuickSelectConfig,
        broadcast_tx: broadcast::Sender<BroadcastMessage>,
        event_tx: mpsc::Sender<DaemonEvent>,
    ) -> Self {
        let (view_tx, _) = watch::channel(QuickSelectView::default());
        Self {
            quick_select: QuickSelect::new(config.growth_window),
            config,
            engine,
            timer_generation: 0,
            timer: None,
            view_tx,
            event_tx,
            broadcast_tx,
        }
    }

    /// Latest quick-select view (for the HTTP server).
    pub fn quick_select_view(&self) -> watch::Receiver<QuickSelectView> {
        self.view_tx.subscribe()
    }

    /// Run the core event loop.  Returns when a `Shutdown` event is received
    /// or every event sender is gone.
    pub async fn run(mut self, mut event_rx: mpsc::Receiver<DaemonEvent>) -> anyhow::Result<()> {
        info!("DaemonCore: starting event loop");
        let mut rev_rx = self.engine.subscribe();

        loop {
            tokio::select! {
                evt = event_rx.recv() => match evt {
                    None => {
                        info!("DaemonCore: event channel closed, shutting down");
                        break;
                    }
                    Some(DaemonEvent::Shutdown) => {
                        info!("DaemonCore: shutdown requested");
                        break;
                    }
                    Some(evt) => self.handle_event(evt).await,
                },

                changed = rev_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let _ = self.broadcast_tx.send(BroadcastMessage::StateUpdated);
                    // New groups can add quick-select matches
                    if self.quick_select.is_active() {
                        self.publish_quick_select().await;
                    }
                }
            }
        }

        self.cancel_timer();
        Ok(())
    }

    async fn handle_event(&mut self, evt: DaemonEvent) {
        match evt {
            DaemonEvent::ClientCommand(cmd) => {
                debug!("DaemonCore: command {:?}", cmd);
                if let Err(e) = self.handle_command(cmd).await {
                    error!("DaemonCore: command error: {}", e);
                    let _ = self.broadcast_tx.send(BroadcastMessage::Error(e.to_string()));
                }
            }

            DaemonEvent::QuickSelectTimeout(generation) => {
                if generation == self.timer_generation && self.quick_select.is_active() {
                    debug!("Quick-select auto-commit");
                    self.commit_quick_select().await;
                }
            }

            DaemonEvent::QuickSelectGrown {
                exhausted,
                progressed,
            } => {
                self.quick_select.set_fetching(false);
                self.quick_select_changed(progressed && !exhausted).await;
            }

            DaemonEvent::Shutdown => {}
        }
    }

    // ── command handlers ──────────────────────────────────────────────────────

    async fn handle_command(&mut self, cmd: Command) -> anyhow::Result<()> {
        match cmd {
            Command::Key { key } => self.handle_key(key).await?,
            Command::SetActiveGroup { group_id } => self.engine.set_active_group(&group_id).await?,
            Command::SetCurrentIndex { index } => self.engine.set_current_index(index).await,
            Command::NavigateToChannel { index } => {
                self.engine.navigate_to_channel(index).await;
            }
            Command::PlayChannel {
                channel_id,
                group_id,
            } => {
                self.engine
                    .play_channel(&channel_id, group_id.as_deref())
                    .await;
            }
            Command::ToggleFavorite { channel_id } => {
                self.toggle_favorite(channel_id.as_deref()).await?
            }
            Command::SetFavorites { favorites } => self.engine.set_favorites(favorites).await,
            Command::LoadMoreGroups => {
                let more = self.engine.load_more_groups().await;
                debug!("load_more_groups -> {}", more);
            }
            Command::SetOverlayOpen { open } => self.engine.set_overlay_open(open).await,
            Command::GetState => {
                // State is sent back to the requesting client by the transport
            }
        }
        Ok(())
    }

    async fn handle_key(&mut self, key: RemoteKey) -> anyhow::Result<()> {
        if let RemoteKey::Digit(digit) = key {
            self.quick_select.push_digit(digit);
            self.quick_select_changed(true).await;
            return Ok(());
        }

        if self.quick_select.is_active() && self.handle_quick_select_key(key).await {
            return Ok(());
        }

        let position = self.engine.position().await;
        if position.is_overlay_open {
            if matches!(key, RemoteKey::Blue | RemoteKey::Back) {
                self.engine.set_overlay_open(false).await;
            }
            return Ok(());
        }

        let current = position.current_index as i64;
        match key {
            RemoteKey::ChannelUp => {
                self.engine.navigate_to_channel(current + 1).await;
            }
            RemoteKey::ChannelDown => {
                self.engine.navigate_to_channel(current - 1).await;
            }
            RemoteKey::Blue => self.engine.set_overlay_open(true).await,
            RemoteKey::Red => {
                if position.is_playing {
                    self.toggle_favorite(None).await?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Returns `false` for keys quick-select does not consume.
    async fn handle_quick_select_key(&mut self, key: RemoteKey) -> bool {
        match key {
            RemoteKey::Up | RemoteKey::Down | RemoteKey::Enter => {
                let match_count = self.match_count().await;
                if match_count == 0 {
                    return true;
                }
                match key {
                    RemoteKey::Up => self.quick_select.select_up(),
                    RemoteKey::Down => self.quick_select.select_down(match_count),
                    _ => {
                        self.commit_quick_select().await;
                        return true;
                    }
                }
                self.quick_select_changed(true).await;
            }
            RemoteKey::Back => {
                self.quick_select.backspace();
                let match_count = self.match_count().await;
                if self.quick_select.is_active() {
                    self.quick_select.clamp_selection(match_count);
                }
                self.quick_select_changed(true).await;
            }
            RemoteKey::Blue => self.close_quick_select().await,
            RemoteKey::Red => {
                if self.engine.position().await.is_playing {
                    self.close_quick_select().await;
                }
            }
            _ => return false,
        }
        true
    }

    async fn toggle_favorite(&mut self, channel_id: Option<&str>) -> anyhow::Result<()> {
        let change = self.engine.toggle_favorite(channel_id).await?;
        let message = if change.added {
            format!("Added {} to favorites", change.channel.name)
        } else {
            format!("Removed {} from favorites", change.channel.name)
        };
        let _ = self.broadcast_tx.send(BroadcastMessage::Alert(message));
        Ok(())
    }

    // ── quick-select ──────────────────────────────────────────────────────────

    async fn match_count(&self) -> usize {
        self.engine
            .with_groups(|groups| self.quick_select.matches(groups).len())
            .await
    }

    /// Re-arm the timer and maybe start growth after any buffer or
    /// selection change.
    async fn quick_select_changed(&mut self, allow_growth: bool) {
        self.cancel_timer();
        self.timer_generation += 1;

        if self.quick_select.is_active() && !self.quick_select.is_fetching() {
            if allow_growth {
                self.maybe_grow().await;
            }
            if self.quick_select.should_arm_timer() {
                self.arm_timer();
            }
        }

        self.publish_quick_select().await;
    }

    async fn maybe_grow(&mut self) {
        if self.engine.is_all_fetched().await {
            return;
        }
        let match_count = self.match_count().await;
        if !self.quick_select.needs_growth(match_count) {
            return;
        }

        debug!(
            "Quick-select growth: {} matches, selected {}",
            match_count,
            self.quick_select.selected()
        );
        self.quick_select.set_fetching(true);

        let engine = self.engine.clone();
        let batch = self.config.growth_batch;
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let mut progressed = engine.load_more_groups().await;
            for _ in 0..batch {
                if !engine.load_more_groups().await {
                    break;
                }
                progressed = true;
            }
            let exhausted = engine.is_all_fetched().await;
            if tx
                .send(DaemonEvent::QuickSelectGrown {
                    exhausted,
                    progressed,
                })
                .await
                .is_err()
            {
                warn!("DaemonEvent channel closed before growth finished");
            }
        });
    }

    fn arm_timer(&mut self) {
        let generation = self.timer_generation;
        let delay = Duration::from_millis(self.config.auto_commit_ms);
        let tx = self.event_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(DaemonEvent::QuickSelectTimeout(generation)).await;
        });
        self.timer = Some(handle.abort_handle());
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    async fn commit_quick_select(&mut self) {
        let target = self
            .engine
            .with_groups(|groups| self.quick_select.commit_target(groups))
            .await;
        match target {
            Some(target) => {
                info!(
                    "Quick-select: {} in {}",
                    target.channel.name, target.group_name
                );
                self.engine
                    .play_channel(target.channel.id(), Some(&target.group_id))
                    .await;
            }
            None => debug!("Quick-select committed with no match"),
        }
        self.quick_select_changed(false).await;
    }

    async fn close_quick_select(&mut self) {
        if self.quick_select.clear() {
            self.quick_select_changed(false).await;
        }
    }

    async fn publish_quick_select(&self) {
        let view = self
            .engine
            .with_groups(|groups| self.quick_select.view(groups))
            .await;
        self.view_tx.send_replace(view.clone());
        let _ = self.broadcast_tx.send(BroadcastMessage::QuickSelect(view));
    }
}
