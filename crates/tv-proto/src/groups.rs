use crate::protocol::{Channel, ChannelGroup};

/// Ordered channel groups, unique by id.  Favorites sit first; everything
/// else is appended in the order the pagination cursor produced it.
#[derive(Debug, Clone, Default)]
pub struct GroupStore {
    groups: Vec<ChannelGroup>,
}

impl GroupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `group` unless a group with the same id already exists.
    /// Returns whether the store changed.
    pub fn add_group(&mut self, group: ChannelGroup) -> bool {
        if self.contains(&group.id) {
            return false;
        }
        self.groups.push(group);
        true
    }

    /// Replace the channel list of an existing group.  Unknown ids are ignored.
    pub fn update_group_channels(&mut self, group_id: &str, channels: Vec<Channel>) -> bool {
        match self.groups.iter_mut().find(|g| g.id == group_id) {
            Some(group) => {
                group.channels = channels;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, group_id: &str) -> bool {
        self.groups.iter().any(|g| g.id == group_id)
    }

    pub fn get(&self, group_id: &str) -> Option<&ChannelGroup> {
        self.groups.iter().find(|g| g.id == group_id)
    }

    pub fn position(&self, group_id: &str) -> Option<usize> {
        self.groups.iter().position(|g| g.id == group_id)
    }

    pub fn at(&self, position: usize) -> Option<&ChannelGroup> {
        self.groups.get(position)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn as_slice(&self) -> &[ChannelGroup] {
        &self.groups
    }

    /// First channel with this id in store order.
    pub fn find_channel(&self, channel_id: &str) -> Option<&Channel> {
        self.groups
            .iter()
            .flat_map(|g| g.channels.iter())
            .find(|c| c.nanoid == channel_id)
    }
}
