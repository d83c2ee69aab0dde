//! Gateway object model
//!
//! Plain data carried by events and held by the state cache. Back-references
//! (`guild_id` on roles, channels and members) are not always present on the
//! wire; [`Guild::stamp_ids`] fills them in.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ChannelId, GuildId, MessageId, RoleId, UserId};

/// A gateway user
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub bot: bool,
}

/// A user's membership in a guild
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    #[serde(default)]
    pub guild_id: GuildId,
    #[serde(default)]
    pub user: User,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<RoleId>,
}

impl Member {
    pub fn has_role(&self, role: RoleId) -> bool {
        self.roles.contains(&role)
    }
}

/// A guild channel
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    #[serde(default)]
    pub guild_id: GuildId,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: u8,
    #[serde(default)]
    pub position: i32,
}

/// A ranked role inside a guild's hierarchy
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub managed: bool,
    #[serde(default)]
    pub mentionable: bool,
    #[serde(default)]
    pub hoist: bool,
    /// Raw RGB color
    #[serde(default)]
    pub color: u32,
    /// Rank in the hierarchy; higher outranks lower
    #[serde(default)]
    pub position: i32,
    /// Raw permission bit set
    #[serde(default)]
    pub permissions: u64,
    /// Owning guild, stamped locally
    #[serde(skip)]
    pub guild_id: GuildId,
}

impl Role {
    pub fn new(id: RoleId, guild_id: GuildId, position: i32) -> Self {
        Role {
            id,
            position,
            guild_id,
            ..Role::default()
        }
    }

    /// The default ("@everyone") role shares the guild's id
    #[inline]
    pub fn is_default(&self) -> bool {
        self.id.0 == self.guild_id.0
    }

    #[inline]
    pub fn lower_than(&self, other: &Role) -> bool {
        self.position < other.position
    }

    #[inline]
    pub fn higher_than(&self, other: &Role) -> bool {
        self.position > other.position
    }

    /// Mention string for chat content
    pub fn mention(&self) -> String {
        format!("<@&{}>", self.id)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// The roles of one guild, in the order the gateway delivered them
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roles(pub Vec<Role>);

impl Roles {
    pub fn new() -> Self {
        Roles(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.0.iter()
    }

    pub fn contains_id(&self, id: RoleId) -> bool {
        self.0.iter().any(|r| r.id == id)
    }

    pub fn index_of(&self, id: RoleId) -> Option<usize> {
        self.0.iter().position(|r| r.id == id)
    }

    pub fn get(&self, id: RoleId) -> Option<&Role> {
        self.0.iter().find(|r| r.id == id)
    }

    pub fn get_mut(&mut self, id: RoleId) -> Option<&mut Role> {
        self.0.iter_mut().find(|r| r.id == id)
    }

    /// Insert a role, replacing any role with the same id in place
    pub fn upsert(&mut self, role: Role) {
        match self.get_mut(role.id) {
            Some(existing) => *existing = role,
            None => self.0.push(role),
        }
    }

    pub fn remove(&mut self, id: RoleId) -> Option<Role> {
        let idx = self.index_of(id)?;
        Some(self.0.remove(idx))
    }

    /// Highest position first; ties keep their current relative order
    pub fn sort_by_rank(&mut self) {
        self.0.sort_by(|a, b| b.position.cmp(&a.position));
    }
}

impl FromIterator<Role> for Roles {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        Roles(iter.into_iter().collect())
    }
}

/// A guild: the owning collection of channels, members and roles
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guild {
    pub id: GuildId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub owner_id: UserId,
    #[serde(default)]
    pub unavailable: bool,
    #[serde(default)]
    pub roles: Roles,
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub members: Vec<Member>,
}

impl Guild {
    pub fn new(id: GuildId, name: impl Into<String>) -> Self {
        Guild {
            id,
            name: name.into(),
            ..Guild::default()
        }
    }

    /// Point every child object back at this guild
    pub fn stamp_ids(&mut self) {
        let id = self.id;
        for c in &mut self.channels {
            c.guild_id = id;
        }
        for m in &mut self.members {
            m.guild_id = id;
        }
        for r in &mut self.roles.0 {
            r.guild_id = id;
        }
    }

    pub fn role(&self, id: RoleId) -> Option<&Role> {
        self.roles.get(id)
    }

    pub fn default_role(&self) -> Option<&Role> {
        self.roles.get(RoleId::everyone(self.id))
    }
}

/// A chat message
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub channel_id: ChannelId,
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    #[serde(default)]
    pub author: User,
    #[serde(default)]
    pub content: String,
}

/// One entry of a role reorder batch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMove {
    pub id: RoleId,
    pub position: i32,
}

impl RoleMove {
    pub fn new(id: RoleId, position: i32) -> Self {
        RoleMove { id, position }
    }
}
