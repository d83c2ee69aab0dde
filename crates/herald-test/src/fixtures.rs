//! Test fixtures - guilds, events and a recording role service

use parking_lot::Mutex;

use herald_core::{
    Channel, ChannelId, Event, EventShape, Guild, GuildCreate, GuildId, HeraldError, HeraldResult,
    Member, Message, MessageCreate, MessageId, Ready, Role, RoleId, RoleMove, User, UserId,
};
use herald_state::{RoleApi, RoleSettings};

/// Builds guilds with a default role at position 0
#[derive(Clone, Debug)]
pub struct GuildBuilder {
    guild: Guild,
    next_id: u64,
}

impl GuildBuilder {
    pub fn new(id: u64) -> Self {
        let gid = GuildId::new(id);
        let mut guild = Guild::new(gid, format!("guild-{id}"));
        let mut everyone = Role::new(RoleId::everyone(gid), gid, 0);
        everyone.name = "@everyone".to_string();
        guild.roles.upsert(everyone);

        GuildBuilder {
            guild,
            next_id: id * 1000 + 1,
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Add a role at `position`
    pub fn role(mut self, name: &str, position: i32) -> Self {
        let id = RoleId::new(self.next_id());
        let mut role = Role::new(id, self.guild.id, position);
        role.name = name.to_string();
        self.guild.roles.upsert(role);
        self
    }

    /// Add `count` roles at positions 1..=count
    pub fn ladder(mut self, count: i32) -> Self {
        for position in 1..=count {
            self = self.role(&format!("rank-{position}"), position);
        }
        self
    }

    pub fn channel(mut self, name: &str) -> Self {
        let id = ChannelId::new(self.next_id());
        let position = self.guild.channels.len() as i32;
        self.guild.channels.push(Channel {
            id,
            guild_id: self.guild.id,
            name: name.to_string(),
            kind: 0,
            position,
        });
        self
    }

    /// Add a member holding the named roles
    pub fn member(mut self, username: &str, role_names: &[&str]) -> Self {
        let user = User {
            id: UserId::new(self.next_id()),
            username: username.to_string(),
            bot: false,
        };
        let roles = self
            .guild
            .roles
            .iter()
            .filter(|r| role_names.contains(&r.name.as_str()))
            .map(|r| r.id)
            .collect();
        self.guild.members.push(Member {
            guild_id: self.guild.id,
            user,
            nick: None,
            roles,
        });
        self
    }

    pub fn build(self) -> Guild {
        self.guild
    }
}

/// Id of the role named `name`
pub fn role_named(guild: &Guild, name: &str) -> Option<RoleId> {
    guild.roles.iter().find(|r| r.name == name).map(|r| r.id)
}

/// Role ids ordered by position, lowest first
pub fn ids_by_position(guild: &Guild) -> Vec<RoleId> {
    let mut roles: Vec<&Role> = guild.roles.iter().collect();
    roles.sort_by_key(|r| r.position);
    roles.into_iter().map(|r| r.id).collect()
}

pub fn message_event(id: u64, content: &str) -> Event {
    MessageCreate {
        message: Message {
            id: MessageId::new(id),
            channel_id: ChannelId::new(1),
            content: content.to_string(),
            ..Message::default()
        },
    }
    .into_event()
}

pub fn ready_event(session_id: &str, guilds: Vec<Guild>) -> Event {
    Ready {
        version: 10,
        session_id: session_id.to_string(),
        user: User {
            id: UserId::new(1),
            username: "herald".to_string(),
            bot: true,
        },
        guilds,
    }
    .into_event()
}

pub fn guild_create_event(guild: Guild) -> Event {
    GuildCreate { guild }.into_event()
}

/// A call received by [`RecordingRoleApi`]
#[derive(Clone, Debug, PartialEq)]
pub enum RoleCall {
    Reorder(GuildId, Vec<RoleMove>),
    Edit(GuildId, RoleId, RoleSettings),
    Delete(GuildId, RoleId),
}

/// Role service that records every call and can be told to fail
#[derive(Debug, Default)]
pub struct RecordingRoleApi {
    calls: Mutex<Vec<RoleCall>>,
    failure: Mutex<Option<String>>,
}

impl RecordingRoleApi {
    pub fn new() -> Self {
        RecordingRoleApi::default()
    }

    /// Fail every following call with a remote error
    pub fn fail_with(&self, reason: &str) {
        *self.failure.lock() = Some(reason.to_string());
    }

    pub fn recover(&self) {
        *self.failure.lock() = None;
    }

    pub fn calls(&self) -> Vec<RoleCall> {
        self.calls.lock().clone()
    }

    /// Reorder batches only
    pub fn reorders(&self) -> Vec<Vec<RoleMove>> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                RoleCall::Reorder(_, moves) => Some(moves.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: RoleCall) -> HeraldResult<()> {
        self.calls.lock().push(call);
        match self.failure.lock().as_ref() {
            Some(reason) => Err(HeraldError::Remote(reason.clone())),
            None => Ok(()),
        }
    }
}

impl RoleApi for RecordingRoleApi {
    fn reorder_roles(&self, guild: GuildId, moves: &[RoleMove]) -> HeraldResult<Vec<Role>> {
        self.record(RoleCall::Reorder(guild, moves.to_vec()))?;
        Ok(moves
            .iter()
            .map(|mv| Role::new(mv.id, guild, mv.position))
            .collect())
    }

    fn edit_role(&self, guild: GuildId, role: RoleId, settings: &RoleSettings) -> HeraldResult<Role> {
        self.record(RoleCall::Edit(guild, role, settings.clone()))?;
        let mut edited = Role::new(role, guild, 0);
        edited.name = settings.name.clone();
        edited.color = settings.color;
        edited.hoist = settings.hoist;
        edited.permissions = settings.permissions;
        edited.mentionable = settings.mentionable;
        Ok(edited)
    }

    fn delete_role(&self, guild: GuildId, role: RoleId) -> HeraldResult<()> {
        self.record(RoleCall::Delete(guild, role))
    }
}
