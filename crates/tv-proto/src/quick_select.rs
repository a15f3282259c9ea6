//! Numeric quick-select: a typed channel number is matched against every
//! loaded group at once.
//!
//! This is only the state machine.  The daemon owns the auto-commit timer
//! and runs catalog growth when [`QuickSelect::needs_growth`] says so.

use crate::protocol::{ChannelGroup, QuickSelectMatch, QuickSelectView};

pub const DEFAULT_GROWTH_WINDOW: usize = 5;

#[derive(Debug, Clone)]
pub struct QuickSelect {
    buffer: String,
    selected: usize,
    fetching: bool,
    growth_window: usize,
}

impl Default for QuickSelect {
    fn default() -> Self {
        Self::new(DEFAULT_GROWTH_WINDOW)
    }
}

impl QuickSelect {
    pub fn new(growth_window: usize) -> Self {
        Self {
            buffer: String::new(),
            selected: 0,
            fetching: false,
            growth_window,
        }
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn is_active(&self) -> bool {
        !self.buffer.is_empty()
    }

    pub fn is_fetching(&self) -> bool {
        self.fetching
    }

    pub fn set_fetching(&mut self, fetching: bool) {
        self.fetching = fetching;
    }

    pub fn push_digit(&mut self, digit: u8) {
        if digit > 9 {
            return;
        }
        self.buffer.push(char::from(b'0' + digit));
        self.selected = 0;
    }

    /// Drop the last digit.  Returns `false` when the buffer was already empty.
    pub fn backspace(&mut self) -> bool {
        if self.buffer.pop().is_none() {
            return false;
        }
        if self.buffer.is_empty() {
            self.selected = 0;
        }
        true
    }

    pub fn select_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn select_down(&mut self, match_count: usize) {
        if self.selected + 1 < match_count {
            self.selected += 1;
        }
    }

    /// Pull the selection back inside `[0, match_count)`.
    pub fn clamp_selection(&mut self, match_count: usize) {
        if self.selected >= match_count {
            self.selected = match_count.saturating_sub(1);
        }
    }

    /// Empty the buffer without committing.  Returns whether anything was typed.
    pub fn clear(&mut self) -> bool {
        let was_active = self.is_active();
        self.buffer.clear();
        self.selected = 0;
        was_active
    }

    /// 1-based channel number typed so far.
    pub fn position(&self) -> Option<usize> {
        self.buffer.parse::<usize>().ok().filter(|&p| p > 0)
    }

    /// Every group with at least `position` channels contributes its
    /// `position`-th channel, in store order.
    pub fn matches(&self, groups: &[ChannelGroup]) -> Vec<QuickSelectMatch> {
        let Some(position) = self.position() else {
            return Vec::new();
        };
        groups
            .iter()
            .enumerate()
            .filter_map(|(i, group)| {
                group.channels.get(position - 1).map(|channel| QuickSelectMatch {
                    group_id: group.id.clone(),
                    group_name: group.display_name.clone(),
                    group_index: i + 1,
                    channel: channel.clone(),
                })
            })
            .collect()
    }

    /// The selected match, clearing the buffer either way.
    pub fn commit_target(&mut self, groups: &[ChannelGroup]) -> Option<QuickSelectMatch> {
        let target = self.matches(groups).into_iter().nth(self.selected);
        self.clear();
        target
    }

    /// Growth is wanted while the selection sits within the growth window of
    /// the end of the match list.
    pub fn needs_growth(&self, match_count: usize) -> bool {
        self.is_active() && self.selected + self.growth_window >= match_count.saturating_sub(1)
    }

    pub fn should_arm_timer(&self) -> bool {
        self.is_active() && !self.fetching
    }

    pub fn view(&self, groups: &[ChannelGroup]) -> QuickSelectView {
        QuickSelectView {
            buffer: self.buffer.clone(),
            selected: self.selected,
            fetching: self.fetching,
            matches: self.matches(groups),
        }
    }
}
