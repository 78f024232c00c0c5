//! Read accessors
//!
//! Every accessor returns an owned snapshot; no lock outlives the call.

use std::sync::Arc;

use hearth_core::{
    Channel, Guild, GuildMember, Permissions, Presence, Role, Snowflake, User, VoiceState,
};

use super::{EntityCache, GuildState};

impl EntityCache {
    pub fn user(&self, user_id: Snowflake) -> Option<Arc<User>> {
        self.0.users.get(&user_id).map(|user| Arc::clone(user.value()))
    }

    pub fn current_user(&self) -> Option<Arc<User>> {
        let user_id = (*self.0.current_user_id.read())?;
        self.user(user_id)
    }

    pub fn current_user_id(&self) -> Option<Snowflake> {
        *self.0.current_user_id.read()
    }

    /// Presence of the local user, independent of any guild
    pub fn current_presence(&self) -> Option<Presence> {
        self.0.current_presence.read().clone()
    }

    /// Guild header, including outage placeholders
    pub fn guild(&self, guild_id: Snowflake) -> Option<Guild> {
        self.0.guilds.get(&guild_id).map(|state| state.guild.clone())
    }

    /// Full copy of a guild and its sub-collections
    pub fn guild_state(&self, guild_id: Snowflake) -> Option<GuildState> {
        self.0.guilds.get(&guild_id).map(|state| state.clone())
    }

    /// `Some(false)` while the guild is in an outage, `None` if unknown
    pub fn is_guild_available(&self, guild_id: Snowflake) -> Option<bool> {
        self.0.guilds.get(&guild_id).map(|state| state.is_available())
    }

    pub fn guild_ids(&self) -> Vec<Snowflake> {
        self.0.guilds.iter().map(|entry| *entry.key()).collect()
    }

    /// Owner of the guild, resolved through the user store
    pub fn guild_owner(&self, guild_id: Snowflake) -> Option<Arc<User>> {
        let owner_id = self.0.guilds.get(&guild_id)?.guild.owner_id?;
        self.user(owner_id)
    }

    /// Guild or private channel by id
    pub fn channel(&self, channel_id: Snowflake) -> Option<Channel> {
        if let Some(channel) = self.0.private_channels.get(&channel_id) {
            return Some(channel.clone());
        }
        let guild_id = self.0.channel_guild.get(&channel_id).map(|entry| *entry)?;
        self.0
            .guilds
            .get(&guild_id)?
            .channels
            .get(&channel_id)
            .cloned()
    }

    pub fn guild_channels(&self, guild_id: Snowflake) -> Vec<Channel> {
        let mut channels: Vec<Channel> = self
            .0
            .guilds
            .get(&guild_id)
            .map(|state| state.channels.values().cloned().collect())
            .unwrap_or_default();
        channels.sort_by_key(|channel| (channel.position, channel.id));
        channels
    }

    pub fn private_channels(&self) -> Vec<Channel> {
        self.0
            .private_channels
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn member(&self, guild_id: Snowflake, user_id: Snowflake) -> Option<GuildMember> {
        self.0.guilds.get(&guild_id)?.members.get(&user_id).cloned()
    }

    /// Cached members, which may be a subset of the guild's members
    pub fn members(&self, guild_id: Snowflake) -> Vec<GuildMember> {
        self.0
            .guilds
            .get(&guild_id)
            .map(|state| state.members.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Member list, only once every member has been delivered
    pub fn complete_members(&self, guild_id: Snowflake) -> Option<Vec<GuildMember>> {
        let state = self.0.guilds.get(&guild_id)?;
        if !state.is_available() || !state.members_complete {
            return None;
        }
        Some(state.members.values().cloned().collect())
    }

    pub fn role(&self, guild_id: Snowflake, role_id: Snowflake) -> Option<Role> {
        self.0.guilds.get(&guild_id)?.roles.get(&role_id).cloned()
    }

    /// Roles in hierarchy order, highest first
    pub fn roles(&self, guild_id: Snowflake) -> Vec<Role> {
        let mut roles: Vec<Role> = self
            .0
            .guilds
            .get(&guild_id)
            .map(|state| state.roles.values().cloned().collect())
            .unwrap_or_default();
        roles.sort_by(Role::hierarchy_cmp);
        roles
    }

    /// A member's resolved roles in hierarchy order, highest first.
    /// Role ids the cache does not know are skipped.
    pub fn member_roles(&self, guild_id: Snowflake, user_id: Snowflake) -> Vec<Role> {
        let Some(state) = self.0.guilds.get(&guild_id) else {
            return Vec::new();
        };
        let Some(member) = state.members.get(&user_id) else {
            return Vec::new();
        };
        let mut roles: Vec<Role> = member
            .roles
            .iter()
            .filter_map(|role_id| state.roles.get(role_id).cloned())
            .collect();
        roles.sort_by(Role::hierarchy_cmp);
        roles
    }

    /// Union of the permissions of a member's resolved roles
    pub fn member_permissions(&self, guild_id: Snowflake, user_id: Snowflake) -> Option<Permissions> {
        let state = self.0.guilds.get(&guild_id)?;
        let member = state.members.get(&user_id)?;
        Some(Permissions::combine(
            member
                .roles
                .iter()
                .filter_map(|role_id| state.roles.get(role_id))
                .map(|role| role.permissions),
        ))
    }

    /// Highest role of a member, if any role resolves
    pub fn highest_role(&self, guild_id: Snowflake, user_id: Snowflake) -> Option<Role> {
        self.member_roles(guild_id, user_id).into_iter().next()
    }

    pub fn presence(&self, guild_id: Snowflake, user_id: Snowflake) -> Option<Presence> {
        self.0.guilds.get(&guild_id)?.presences.get(&user_id).cloned()
    }

    pub fn voice_state(&self, guild_id: Snowflake, user_id: Snowflake) -> Option<VoiceState> {
        self.0.guilds.get(&guild_id)?.voice_states.get(&user_id).cloned()
    }

    /// Users connected to a voice channel
    pub fn voice_channel_users(&self, channel_id: Snowflake) -> Vec<Snowflake> {
        let Some(guild_id) = self.0.channel_guild.get(&channel_id).map(|entry| *entry) else {
            return Vec::new();
        };
        self.0
            .guilds
            .get(&guild_id)
            .map(|state| {
                state
                    .voice_states
                    .values()
                    .filter(|vs| vs.channel_id == Some(channel_id))
                    .map(|vs| vs.user_id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Effective `(mute, deaf)` of a user in voice: session flags OR guild flags
    pub fn voice_flags(&self, guild_id: Snowflake, user_id: Snowflake) -> Option<(bool, bool)> {
        let state = self.0.guilds.get(&guild_id)?;
        let voice = state.voice_states.get(&user_id)?;
        let member = state.members.get(&user_id);
        Some((voice.effective_mute(member), voice.effective_deaf(member)))
    }
}
