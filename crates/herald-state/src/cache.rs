//! State cache - the local view of guilds and roles

use std::collections::HashMap;

use parking_lot::RwLock;

use herald_core::{
    Event, Guild, GuildId, HeraldError, HeraldResult, Member, Role, RoleId, RoleMove, StateUpdate,
    User,
};

use crate::{plan_move, RoleApi};

/// Guild cache fed by the dispatcher before user handlers run
#[derive(Debug, Default)]
pub struct StateCache {
    guilds: RwLock<HashMap<GuildId, Guild>>,
    user: RwLock<Option<User>>,
}

impl StateCache {
    pub fn new() -> Self {
        StateCache::default()
    }

    /// The user this session is logged in as, once ready
    pub fn user(&self) -> Option<User> {
        self.user.read().clone()
    }

    pub fn guild(&self, id: GuildId) -> Option<Guild> {
        self.guilds.read().get(&id).cloned()
    }

    pub fn role(&self, guild: GuildId, role: RoleId) -> Option<Role> {
        self.guilds.read().get(&guild)?.role(role).cloned()
    }

    pub fn contains(&self, id: GuildId) -> bool {
        self.guilds.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.guilds.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guilds.read().is_empty()
    }

    /// Insert or update a guild
    ///
    /// Partial updates (no channels or members) keep the cached ones.
    pub fn insert_guild(&self, mut guild: Guild) {
        guild.stamp_ids();
        let mut guilds = self.guilds.write();
        if let Some(existing) = guilds.get_mut(&guild.id) {
            if guild.channels.is_empty() {
                guild.channels = std::mem::take(&mut existing.channels);
            }
            if guild.members.is_empty() {
                guild.members = std::mem::take(&mut existing.members);
            }
        }
        guilds.insert(guild.id, guild);
    }

    pub fn remove_guild(&self, id: GuildId) -> Option<Guild> {
        self.guilds.write().remove(&id)
    }

    /// Run `f` against a cached guild under the write lock
    pub fn with_guild_mut<R>(&self, id: GuildId, f: impl FnOnce(&mut Guild) -> R) -> HeraldResult<R> {
        let mut guilds = self.guilds.write();
        let guild = guilds.get_mut(&id).ok_or(HeraldError::GuildNotFound(id))?;
        Ok(f(guild))
    }

    pub fn upsert_role(&self, guild: GuildId, mut role: Role) -> HeraldResult<()> {
        role.guild_id = guild;
        self.with_guild_mut(guild, |g| g.roles.upsert(role))
    }

    pub fn remove_role(&self, guild: GuildId, role: RoleId) -> HeraldResult<Option<Role>> {
        self.with_guild_mut(guild, |g| g.roles.remove(role))
    }

    pub fn add_member(&self, mut member: Member) -> HeraldResult<()> {
        let guild = member.guild_id;
        self.with_guild_mut(guild, |g| {
            member.guild_id = g.id;
            match g.members.iter_mut().find(|m| m.user.id == member.user.id) {
                Some(existing) => *existing = member,
                None => g.members.push(member),
            }
        })
    }

    /// Move a cached role and submit the batch
    ///
    /// The guild lock covers only the local reassignment; the remote call
    /// runs after it is released.
    pub fn move_role(
        &self,
        guild: GuildId,
        role: RoleId,
        position: i32,
        api: &dyn RoleApi,
    ) -> HeraldResult<Vec<RoleMove>> {
        let moves = self.with_guild_mut(guild, |g| plan_move(g, role, position))??;
        api.reorder_roles(guild, &moves)?;
        Ok(moves)
    }
}

impl StateUpdate for StateCache {
    fn apply(&self, event: &Event) -> HeraldResult<()> {
        match event {
            Event::Ready(ready) => {
                *self.user.write() = Some(ready.user.clone());
                for guild in &ready.guilds {
                    self.insert_guild(guild.clone());
                }
                Ok(())
            }
            Event::GuildCreate(e) => {
                self.insert_guild(e.guild.clone());
                Ok(())
            }
            Event::GuildUpdate(e) => {
                self.insert_guild(e.guild.clone());
                Ok(())
            }
            Event::GuildDelete(e) => {
                self.remove_guild(e.guild.id);
                Ok(())
            }
            Event::GuildMemberAdd(e) => self.add_member(e.member.clone()),
            Event::GuildRoleCreate(e) => self.upsert_role(e.guild_id, e.role.clone()),
            Event::GuildRoleUpdate(e) => self.upsert_role(e.guild_id, e.role.clone()),
            Event::GuildRoleDelete(e) => self.remove_role(e.guild_id, e.role_id).map(|_| ()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::{
        Channel, ChannelId, EventShape, GuildCreate, GuildDelete, GuildMemberAdd, GuildRoleCreate,
        GuildRoleDelete, GuildUpdate, Ready, UserId,
    };

    fn lobby() -> Guild {
        let id = GuildId::new(10);
        let mut guild = Guild::new(id, "lobby");
        guild.roles.upsert(Role::new(RoleId::everyone(id), GuildId::ZERO, 0));
        guild.roles.upsert(Role::new(RoleId::new(11), GuildId::ZERO, 1));
        guild.roles.upsert(Role::new(RoleId::new(12), GuildId::ZERO, 2));
        guild.channels.push(Channel {
            id: ChannelId::new(20),
            ..Channel::default()
        });
        guild
    }

    #[test]
    fn test_guild_create_stamps_back_references() {
        let cache = StateCache::new();
        cache
            .apply(&GuildCreate { guild: lobby() }.into_event())
            .unwrap();

        let guild = cache.guild(GuildId::new(10)).unwrap();
        assert!(guild.roles.iter().all(|r| r.guild_id == guild.id));
        assert_eq!(guild.channels[0].guild_id, guild.id);
        assert!(cache.role(guild.id, RoleId::new(10)).unwrap().is_default());
    }

    #[test]
    fn test_ready_populates_user_and_guilds() {
        let cache = StateCache::new();
        let ready = Ready {
            session_id: "abc".into(),
            user: User {
                id: UserId::new(1),
                username: "bot".into(),
                bot: true,
            },
            guilds: vec![lobby()],
            ..Ready::default()
        };

        cache.apply(&ready.into_event()).unwrap();

        assert_eq!(cache.user().unwrap().username, "bot");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_partial_update_keeps_channels() {
        let cache = StateCache::new();
        cache.insert_guild(lobby());

        let mut update = Guild::new(GuildId::new(10), "renamed");
        update.roles = lobby().roles;
        cache.apply(&GuildUpdate { guild: update }.into_event()).unwrap();

        let guild = cache.guild(GuildId::new(10)).unwrap();
        assert_eq!(guild.name, "renamed");
        assert_eq!(guild.channels.len(), 1);
    }

    #[test]
    fn test_role_events() {
        let cache = StateCache::new();
        cache.insert_guild(lobby());
        let gid = GuildId::new(10);

        let created = GuildRoleCreate {
            guild_id: gid,
            role: Role::new(RoleId::new(13), GuildId::ZERO, 3),
        };
        cache.apply(&created.into_event()).unwrap();
        assert_eq!(cache.role(gid, RoleId::new(13)).unwrap().guild_id, gid);

        let deleted = GuildRoleDelete {
            guild_id: gid,
            role_id: RoleId::new(13),
        };
        cache.apply(&deleted.into_event()).unwrap();
        assert!(cache.role(gid, RoleId::new(13)).is_none());
    }

    #[test]
    fn test_role_event_for_unknown_guild() {
        let cache = StateCache::new();
        let created = GuildRoleCreate {
            guild_id: GuildId::new(99),
            role: Role::default(),
        };
        let err = cache.apply(&created.into_event()).unwrap_err();
        assert!(matches!(err, HeraldError::GuildNotFound(_)));
    }

    #[test]
    fn test_member_add_replaces_existing() {
        let cache = StateCache::new();
        cache.insert_guild(lobby());

        let mut member = Member {
            guild_id: GuildId::new(10),
            user: User {
                id: UserId::new(5),
                ..User::default()
            },
            ..Member::default()
        };
        cache
            .apply(&GuildMemberAdd { member: member.clone() }.into_event())
            .unwrap();
        member.nick = Some("five".into());
        cache.apply(&GuildMemberAdd { member }.into_event()).unwrap();

        let guild = cache.guild(GuildId::new(10)).unwrap();
        assert_eq!(guild.members.len(), 1);
        assert_eq!(guild.members[0].nick.as_deref(), Some("five"));
    }

    #[test]
    fn test_guild_delete() {
        let cache = StateCache::new();
        cache.insert_guild(lobby());
        cache
            .apply(&GuildDelete { guild: Guild::new(GuildId::new(10), "") }.into_event())
            .unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_move_cached_role_missing_guild() {
        struct NoApi;
        impl RoleApi for NoApi {
            fn reorder_roles(&self, _: GuildId, _: &[RoleMove]) -> HeraldResult<Vec<Role>> {
                unreachable!()
            }
            fn edit_role(&self, _: GuildId, _: RoleId, _: &crate::RoleSettings) -> HeraldResult<Role> {
                unreachable!()
            }
            fn delete_role(&self, _: GuildId, _: RoleId) -> HeraldResult<()> {
                unreachable!()
            }
        }

        let cache = StateCache::new();
        let err = cache
            .move_role(GuildId::new(1), RoleId::new(2), 1, &NoApi)
            .unwrap_err();
        assert!(matches!(err, HeraldError::GuildNotFound(_)));
    }
}
