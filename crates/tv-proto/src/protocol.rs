use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Current protocol version.  Bump this when the wire format changes in a
/// breaking way.
pub const PROTOCOL_VERSION: u32 = 1;

/// Id of the always-first, user-managed group.
pub const FAVORITES_GROUP_ID: &str = "favorites";

/// A playable channel as served by the catalog mirror.
///
/// Identity is `nanoid`; two channels with the same stream URLs but
/// different ids are different channels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Channel {
    pub nanoid: String,
    pub name: String,
    #[serde(default)]
    pub iptv_urls: Vec<String>,
    #[serde(default)]
    pub youtube_urls: Vec<String>,
    /// Normalized ISO 639-2 code (e.g. `spa`, `eng`)
    #[serde(default)]
    pub language: String,
    /// ISO 3166-1 alpha-2 code
    #[serde(default)]
    pub country: String,
    #[serde(rename = "isGeoBlocked", default)]
    pub is_geo_blocked: bool,
    #[serde(
        rename = "isBroadcast",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub is_broadcast: Option<bool>,
}

impl Channel {
    pub fn id(&self) -> &str {
        &self.nanoid
    }

    /// Identity comparison, ignores every field except the id.
    pub fn same_as(&self, other: &Channel) -> bool {
        self.nanoid == other.nanoid
    }

    /// First stream URL, used as the playback source.
    pub fn primary_url(&self) -> Option<&str> {
        self.iptv_urls.first().map(String::as_str)
    }

    pub fn is_playable(&self) -> bool {
        !self.iptv_urls.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ChannelGroup {
    pub id: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub channels: Vec<Channel>,
}

impl ChannelGroup {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, channels: Vec<Channel>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            channels,
        }
    }

    pub fn position_of(&self, channel_id: &str) -> Option<usize> {
        self.channels.iter().position(|c| c.nanoid == channel_id)
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// The viewer's country and language, resolved once at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserMeta {
    #[serde(rename = "countryCode")]
    pub country_code: String,
    #[serde(rename = "langCode")]
    pub lang_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CountryMeta {
    /// Full country name (e.g. `Peru`)
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub capital: String,
    #[serde(rename = "timeZone", default)]
    pub time_zone: String,
    #[serde(rename = "hasChannels", default)]
    pub has_channels: bool,
}

/// Country code → metadata, in the order the mirror lists them.
///
/// Codes are stored upper-cased, so lookups are case-insensitive.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "IndexMap<String, CountryMeta>")]
pub struct CountryDirectory {
    entries: IndexMap<String, CountryMeta>,
}

impl From<IndexMap<String, CountryMeta>> for CountryDirectory {
    fn from(entries: IndexMap<String, CountryMeta>) -> Self {
        Self::from_entries(entries)
    }
}

impl CountryDirectory {
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, CountryMeta)>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(code, meta)| (code.to_uppercase(), meta))
                .collect(),
        }
    }

    pub fn get(&self, code: &str) -> Option<&CountryMeta> {
        self.entries.get(&code.to_uppercase())
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Full country name when known, else the raw code.
    pub fn display_name(&self, code: &str) -> String {
        self.get(code)
            .map(|m| m.country.clone())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| code.to_string())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Read-only snapshot of the catalog engine.  `rev` increases on every
/// mutation so clients can detect missed updates.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CatalogState {
    #[serde(default)]
    pub rev: u64,
    pub groups: Vec<ChannelGroup>,
    pub active_group_id: String,
    pub current_index: usize,
    pub favorites: Vec<Channel>,
    /// Pagination cursor value.
    pub fetched_groups_count: usize,
    pub is_fetching: bool,
    pub is_all_fetched: bool,
    pub is_overlay_open: bool,
    pub error: Option<String>,
    pub user_meta: Option<UserMeta>,
}

impl CatalogState {
    pub fn group(&self, id: &str) -> Option<&ChannelGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn active_group_position(&self) -> Option<usize> {
        self.groups.iter().position(|g| g.id == self.active_group_id)
    }

    /// Channels of the active group.
    pub fn playlist(&self) -> &[Channel] {
        self.group(&self.active_group_id)
            .map(|g| g.channels.as_slice())
            .unwrap_or(&[])
    }

    pub fn current_channel(&self) -> Option<&Channel> {
        self.playlist().get(self.current_index)
    }
}

/// One quick-select candidate: the n-th channel of a group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuickSelectMatch {
    pub group_id: String,
    pub group_name: String,
    /// 1-based position of the group in store order.
    pub group_index: usize,
    pub channel: Channel,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct QuickSelectView {
    pub buffer: String,
    pub selected: usize,
    pub fetching: bool,
    pub matches: Vec<QuickSelectMatch>,
}

/// Logical remote-control keys.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RemoteKey {
    Digit(u8),
    Up,
    Down,
    Enter,
    Back,
    ChannelUp,
    ChannelDown,
    Red,
    Blue,
}

impl FromStr for RemoteKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = match s.to_ascii_lowercase().as_str() {
            "up" => RemoteKey::Up,
            "down" => RemoteKey::Down,
            "enter" | "ok" => RemoteKey::Enter,
            "back" => RemoteKey::Back,
            "channel_up" | "chup" => RemoteKey::ChannelUp,
            "channel_down" | "chdown" => RemoteKey::ChannelDown,
            "red" => RemoteKey::Red,
            "blue" => RemoteKey::Blue,
            other => match other.parse::<u8>() {
                Ok(d) if d <= 9 => RemoteKey::Digit(d),
                _ => anyhow::bail!("unknown remote key: {}", s),
            },
        };
        Ok(key)
    }
}

/// Messages sent from clients to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum Command {
    Key { key: RemoteKey },
    SetActiveGroup { group_id: String },
    SetCurrentIndex { index: usize },
    /// Signed so callers can step before the first channel.
    NavigateToChannel { index: i64 },
    PlayChannel {
        channel_id: String,
        #[serde(default)]
        group_id: Option<String>,
    },
    /// `None` toggles the channel currently playing.
    ToggleFavorite {
        #[serde(default)]
        channel_id: Option<String>,
    },
    SetFavorites { favorites: Vec<Channel> },
    LoadMoreGroups,
    SetOverlayOpen { open: bool },
    GetState,
}

/// Messages sent from the daemon to clients (broadcasts)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "broadcast")]
pub enum Broadcast {
    /// Sent immediately on connect: protocol version + full state snapshot.
    Hello {
        protocol_version: u32,
        state: CatalogState,
    },
    State {
        data: CatalogState,
    },
    QuickSelect {
        view: QuickSelectView,
    },
    /// Short user-facing notice (favorites added/removed).
    Alert {
        message: String,
    },
    Log {
        message: String,
    },
    Error {
        message: String,
    },
}

/// Largest frame body a peer may announce.
pub const MAX_FRAME_LEN: usize = 4 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum FrameError {
    /// Wait for more bytes.
    #[error("incomplete frame")]
    Incomplete,

    #[error("frame of {0} bytes exceeds the limit")]
    TooLarge(usize),

    /// A complete frame whose body is not a valid message; skip `consumed` bytes.
    #[error("malformed frame: {source}")]
    Malformed {
        consumed: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Wrapper for socket communication
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Command(Command),
    Broadcast(Broadcast),
}

impl Message {
    pub fn encode(&self) -> anyhow::Result<Vec<u8>> {
        let json = serde_json::to_vec(self)?;
        let len = json.len() as u32;
        let mut result = Vec::with_capacity(4 + json.len());
        result.extend_from_slice(&len.to_be_bytes());
        result.extend_from_slice(&json);
        Ok(result)
    }

    /// Decode one frame from the head of `data`, returning the message and
    /// the bytes consumed.
    pub fn decode(data: &[u8]) -> Result<(Self, usize), FrameError> {
        if data.len() < 4 {
            return Err(FrameError::Incomplete);
        }
        let len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if len > MAX_FRAME_LEN {
            return Err(FrameError::TooLarge(len));
        }
        if data.len() < 4 + len {
            return Err(FrameError::Incomplete);
        }
        let msg: Self = serde_json::from_slice(&data[4..4 + len]).map_err(|source| {
            FrameError::Malformed {
                consumed: 4 + len,
                source,
            }
        })?;
        Ok((msg, 4 + len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_frame_decodes() {
        let msg = Message::Command(Command::NavigateToChannel { index: -1 });
        let encoded = msg.encode().unwrap();
        let (decoded, len) = Message::decode(&encoded).unwrap();
        assert_eq!(len, encoded.len());
        match decoded {
            Message::Command(Command::NavigateToChannel { index }) => assert_eq!(index, -1),
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_partial_frame_is_rejected() {
        let encoded = Message::Command(Command::GetState).encode().unwrap();
        assert!(matches!(
            Message::decode(&encoded[..encoded.len() - 1]),
            Err(FrameError::Incomplete)
        ));
        assert!(matches!(Message::decode(&encoded[..2]), Err(FrameError::Incomplete)));
    }

    #[test]
    fn test_malformed_frame_reports_its_length() {
        let mut frame = 9u32.to_be_bytes().to_vec();
        frame.extend_from_slice(b"{not json");
        frame.extend_from_slice(&Message::Command(Command::GetState).encode().unwrap());
        match Message::decode(&frame) {
            Err(FrameError::Malformed { consumed, .. }) => {
                assert_eq!(consumed, 13);
                assert!(matches!(
                    Message::decode(&frame[consumed..]),
                    Ok((Message::Command(Command::GetState), _))
                ));
            }
            other => panic!("expected a malformed frame, got {:?}", other.map(|(_, n)| n)),
        }
    }

    #[test]
    fn test_oversized_frame_is_rejected() {
        let header = ((MAX_FRAME_LEN + 1) as u32).to_be_bytes();
        assert!(matches!(Message::decode(&header), Err(FrameError::TooLarge(_))));
    }

    #[test]
    fn test_channel_uses_mirror_field_names() {
        let json = r#"{
            "nanoid": "abc",
            "name": "TV Peru",
            "iptv_urls": ["https://example.com/a.m3u8"],
            "youtube_urls": [],
            "language": "spa",
            "country": "PE",
            "isGeoBlocked": true
        }"#;
        let ch: Channel = serde_json::from_str(json).unwrap();
        assert_eq!(ch.id(), "abc");
        assert!(ch.is_geo_blocked);
        assert_eq!(ch.primary_url(), Some("https://example.com/a.m3u8"));
        assert_eq!(ch.is_broadcast, None);
    }

    #[test]
    fn test_channel_identity_ignores_urls() {
        let a = Channel {
            nanoid: "x".into(),
            iptv_urls: vec!["u1".into()],
            ..Default::default()
        };
        let b = Channel {
            nanoid: "x".into(),
            iptv_urls: vec!["u2".into()],
            ..Default::default()
        };
        assert!(a.same_as(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_country_directory_keeps_document_order() {
        let json = r#"{
            "ZW": {"country": "Zimbabwe", "capital": "Harare", "timeZone": "Africa/Harare", "hasChannels": true},
            "AD": {"country": "Andorra", "capital": "Andorra la Vella", "timeZone": "Europe/Andorra", "hasChannels": true},
            "MX": {"country": "Mexico", "capital": "Mexico City", "timeZone": "America/Mexico_City", "hasChannels": true}
        }"#;
        let dir: CountryDirectory = serde_json::from_str(json).unwrap();
        assert_eq!(dir.codes().collect::<Vec<_>>(), vec!["ZW", "AD", "MX"]);
        assert_eq!(dir.get("mx").unwrap().capital, "Mexico City");
        assert_eq!(dir.display_name("AD"), "Andorra");
        assert_eq!(dir.display_name("XX"), "XX");
    }

    #[test]
    fn test_country_directory_lowercase_codes() {
        let dir = CountryDirectory::from_entries([
            ("pe".to_string(), CountryMeta::default()),
            ("cl".to_string(), CountryMeta::default()),
        ]);
        assert_eq!(dir.codes().collect::<Vec<_>>(), vec!["PE", "CL"]);
        assert!(dir.get("Pe").is_some());
        assert_eq!(dir.len(), 2);
    }

    #[test]
    fn test_remote_key_parsing() {
        assert_eq!("7".parse::<RemoteKey>().unwrap(), RemoteKey::Digit(7));
        assert_eq!("channel_up".parse::<RemoteKey>().unwrap(), RemoteKey::ChannelUp);
        assert_eq!("OK".parse::<RemoteKey>().unwrap(), RemoteKey::Enter);
        assert!("12".parse::<RemoteKey>().is_err());
        assert!("green".parse::<RemoteKey>().is_err());
    }

    #[test]
    fn test_state_helpers() {
        let state = CatalogState {
            groups: vec![
                ChannelGroup::new(FAVORITES_GROUP_ID, "Favorites", vec![]),
                ChannelGroup::new(
                    "pe",
                    "Peru",
                    vec![
                        Channel {
                            nanoid: "a".into(),
                            ..Default::default()
                        },
                        Channel {
                            nanoid: "b".into(),
                            ..Default::default()
                        },
                    ],
                ),
            ],
            active_group_id: "pe".into(),
            current_index: 1,
            ..Default::default()
        };
        assert_eq!(state.active_group_position(), Some(1));
        assert_eq!(state.playlist().len(), 2);
        assert_eq!(state.current_channel().map(Channel::id), Some("b"));
    }
}
