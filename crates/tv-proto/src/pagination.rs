//! Cursor → next group to fetch.
//!
//! The candidate sequence is four consecutive phases:
//!
//! ```text
//!  Neighbors        countries sharing the user's language (minus home)
//!  Categories       every category, user-language channels only   → <slug>_<lang>
//!  Others           every remaining country, directory order
//!  Categories       every category, other-language channels only  → <slug>_full
//! ```
//!
//! A [`CandidatePlan`] is cheap to build and is rebuilt for every fetch
//! step from the immutable session inputs, so nothing here caches state.

use crate::locale::{category_display_name, countries_by_lang, CATEGORIES};
use crate::protocol::{Channel, ChannelGroup, CountryDirectory, UserMeta};

/// One position of the candidate sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    Neighbor(String),
    NativeCategory(&'static str),
    Other(String),
    ForeignCategory(&'static str),
}

impl Slot {
    /// Country code or category slug to fetch.
    pub fn key(&self) -> &str {
        match self {
            Slot::Neighbor(code) | Slot::Other(code) => code,
            Slot::NativeCategory(slug) | Slot::ForeignCategory(slug) => slug,
        }
    }
}

pub struct CandidatePlan<'a> {
    lang_code: &'a str,
    directory: &'a CountryDirectory,
    neighbors: Vec<&'static str>,
    others: Vec<&'a str>,
}

impl<'a> CandidatePlan<'a> {
    pub fn new(user_meta: &'a UserMeta, directory: &'a CountryDirectory) -> Self {
        let home = user_meta.country_code.to_uppercase();
        let neighbors: Vec<&'static str> = countries_by_lang(&user_meta.lang_code)
            .iter()
            .copied()
            .filter(|c| c.to_uppercase() != home)
            .collect();
        let others = directory
            .codes()
            .filter(|c| {
                let upper = c.to_uppercase();
                upper != home && !neighbors.iter().any(|n| *n == upper)
            })
            .collect();

        Self {
            lang_code: &user_meta.lang_code,
            directory,
            neighbors,
            others,
        }
    }

    pub fn neighbors(&self) -> &[&'static str] {
        &self.neighbors
    }

    pub fn others(&self) -> &[&'a str] {
        &self.others
    }

    /// Length of the whole sequence; cursors at or past it are exhausted.
    pub fn total(&self) -> usize {
        self.neighbors.len() + 2 * CATEGORIES.len() + self.others.len()
    }

    pub fn slot(&self, cursor: usize) -> Option<Slot> {
        let n = self.neighbors.len();
        let c = CATEGORIES.len();
        let o = self.others.len();

        if cursor < n {
            Some(Slot::Neighbor(self.neighbors[cursor].to_string()))
        } else if cursor < n + c {
            Some(Slot::NativeCategory(CATEGORIES[cursor - n]))
        } else if cursor < n + c + o {
            Some(Slot::Other(self.others[cursor - n - c].to_string()))
        } else if cursor < n + 2 * c + o {
            Some(Slot::ForeignCategory(CATEGORIES[cursor - n - c - o]))
        } else {
            None
        }
    }

    pub fn group_id(&self, slot: &Slot) -> String {
        match slot {
            Slot::Neighbor(code) | Slot::Other(code) => code.to_lowercase(),
            Slot::NativeCategory(slug) => format!("{}_{}", slug, self.lang_code),
            Slot::ForeignCategory(slug) => format!("{}_full", slug),
        }
    }

    pub fn display_name(&self, slot: &Slot) -> String {
        match slot {
            Slot::Neighbor(code) | Slot::Other(code) => self.directory.display_name(code),
            Slot::NativeCategory(slug) => format!(
                "{} ({})",
                category_display_name(slug),
                self.lang_code.to_uppercase()
            ),
            Slot::ForeignCategory(slug) => category_display_name(slug),
        }
    }

    /// Build the group a slot produces from its fetched channels, or `None`
    /// when nothing survives the slot's language filter.
    pub fn build_group(&self, slot: &Slot, channels: Vec<Channel>) -> Option<ChannelGroup> {
        let channels: Vec<Channel> = match slot {
            Slot::NativeCategory(_) => channels
                .into_iter()
                .filter(|c| c.language == self.lang_code)
                .collect(),
            Slot::ForeignCategory(_) => channels
                .into_iter()
                .filter(|c| c.language != self.lang_code)
                .collect(),
            Slot::Neighbor(_) | Slot::Other(_) => channels,
        };

        if channels.is_empty() {
            return None;
        }
        Some(ChannelGroup::new(
            self.group_id(slot),
            self.display_name(slot),
            channels,
        ))
    }
}
