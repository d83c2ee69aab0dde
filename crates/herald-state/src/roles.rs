//! Role operations backed by the remote mutation service

use serde::Serialize;

use herald_core::{Guild, GuildId, HeraldResult, Member, Role, RoleId, RoleMove};

use crate::plan_move;

/// Remote calls that persist role changes
///
/// Implemented by the REST client; errors are handed back to callers as-is.
pub trait RoleApi: Send + Sync {
    /// Submit a whole reorder batch in one call
    fn reorder_roles(&self, guild: GuildId, moves: &[RoleMove]) -> HeraldResult<Vec<Role>>;

    fn edit_role(&self, guild: GuildId, role: RoleId, settings: &RoleSettings) -> HeraldResult<Role>;

    fn delete_role(&self, guild: GuildId, role: RoleId) -> HeraldResult<()>;
}

/// Editable role fields; every field overwrites the current value
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RoleSettings {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub color: u32,
    pub hoist: bool,
    #[serde(skip_serializing_if = "is_zero_u64")]
    pub permissions: u64,
    pub mentionable: bool,
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

fn is_zero_u64(v: &u64) -> bool {
    *v == 0
}

impl RoleSettings {
    pub fn set_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn set_color(mut self, color: u32) -> Self {
        self.color = color;
        self
    }

    pub fn hoisted(mut self) -> Self {
        self.hoist = true;
        self
    }

    pub fn not_hoisted(mut self) -> Self {
        self.hoist = false;
        self
    }

    pub fn set_permissions(mut self, permissions: u64) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn mentionable(mut self) -> Self {
        self.mentionable = true;
        self
    }

    pub fn not_mentionable(mut self) -> Self {
        self.mentionable = false;
        self
    }
}

/// Start an edit from the role's current values
impl From<&Role> for RoleSettings {
    fn from(role: &Role) -> Self {
        RoleSettings {
            name: role.name.clone(),
            color: role.color,
            hoist: role.hoist,
            permissions: role.permissions,
            mentionable: role.mentionable,
        }
    }
}

/// Move a role and submit the resulting batch
///
/// Local positions change before the remote call and are not rolled back
/// if it fails.
pub fn move_role(
    guild: &mut Guild,
    role_id: RoleId,
    position: i32,
    api: &dyn RoleApi,
) -> HeraldResult<Vec<RoleMove>> {
    let moves = plan_move(guild, role_id, position)?;
    tracing::debug!(guild = %guild.id, role = %role_id, position, edits = moves.len(), "submitting role reorder");
    api.reorder_roles(guild.id, &moves)?;
    Ok(moves)
}

pub fn edit_role(role: &Role, settings: &RoleSettings, api: &dyn RoleApi) -> HeraldResult<Role> {
    api.edit_role(role.guild_id, role.id, settings)
}

pub fn delete_role(role: &Role, api: &dyn RoleApi) -> HeraldResult<()> {
    api.delete_role(role.guild_id, role.id)
}

/// Members of the guild holding the role
pub fn members_with_role(guild: &Guild, role: RoleId) -> Vec<&Member> {
    guild.members.iter().filter(|m| m.has_role(role)).collect()
}
