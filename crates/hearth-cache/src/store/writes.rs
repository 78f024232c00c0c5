//! Write paths: merges, upserts, removals and availability transitions
//!
//! Writes return the value from before the write (if any) and the merged value,
//! so the caller can build events without a second lookup. Writes that cannot
//! be applied (unknown or unavailable guild) are logged and return `None`.

use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tokio::sync::oneshot;

use hearth_core::{
    Channel, ChannelPayload, ChannelType, Guild, GuildMember, GuildPayload, MemberPayload,
    Presence, PresencePayload, Role, RolePayload, Snowflake, User, UserPayload, VoiceState,
    VoiceStatePayload,
};

use super::{EntityCache, GuildState};
use crate::chunk::{ChunkProgress, ChunkSummary, MemberChunk};

/// Result of applying a GUILD_CREATE payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuildCreateOutcome {
    /// The guild was not cached before
    Created(Guild),
    /// The guild came back from an outage and was rebuilt
    Available(Guild),
    /// The guild was already available and has been rebuilt from the payload
    Replaced(Guild),
    /// The payload announced an outage
    Unavailable(Snowflake),
}

/// Presence updates only carry a full user object when the user changed
fn has_user_fields(user: &UserPayload) -> bool {
    !user.username.is_missing() || !user.avatar.is_missing() || !user.discriminator.is_missing()
}

impl EntityCache {
    // =========================================================================
    // Users
    // =========================================================================

    /// Merge a user payload, creating the user on first sight
    pub fn merge_user(&self, payload: UserPayload) -> (Option<Arc<User>>, Arc<User>) {
        match self.0.users.entry(payload.id) {
            Entry::Occupied(mut entry) => {
                let old = Arc::clone(entry.get());
                let mut user = (*old).clone();
                user.merge(payload);
                if user == *old {
                    return (Some(Arc::clone(&old)), old);
                }
                let user = Arc::new(user);
                entry.insert(Arc::clone(&user));
                (Some(old), user)
            }
            Entry::Vacant(entry) => {
                let user = Arc::new(User::from_payload(payload));
                entry.insert(Arc::clone(&user));
                (None, user)
            }
        }
    }

    /// Record the authenticated user (READY, USER_UPDATE, `GET /users/@me`)
    pub fn set_current_user(&self, payload: UserPayload) -> (Option<Arc<User>>, Arc<User>) {
        let (old, user) = self.merge_user(payload);
        *self.0.current_user_id.write() = Some(user.id);
        (old, user)
    }

    pub fn set_current_presence(&self, presence: Presence) {
        *self.0.current_presence.write() = Some(presence);
    }

    // =========================================================================
    // Guilds
    // =========================================================================

    /// Apply a GUILD_CREATE payload.
    ///
    /// An available payload always replaces the cached guild wholesale; stale
    /// sub-collections from before an outage never survive.
    pub fn guild_create(&self, payload: GuildPayload) -> GuildCreateOutcome {
        let guild_id = payload.id;
        if payload.is_unavailable() {
            self.set_unavailable(guild_id);
            return GuildCreateOutcome::Unavailable(guild_id);
        }

        for member in &payload.members {
            self.merge_user(member.user.clone());
        }
        for presence in payload.presences.iter().filter(|p| has_user_fields(&p.user)) {
            self.merge_user(presence.user.clone());
        }

        let state = GuildState::from_payload(payload);
        let guild = state.guild.clone();
        let new_channels: Vec<Snowflake> = state.channels.keys().copied().collect();

        let previous = match self.0.guilds.entry(guild_id) {
            Entry::Occupied(mut entry) => {
                let old = entry.insert(state);
                for channel_id in old.channels.keys() {
                    self.0.channel_guild.remove(channel_id);
                }
                Some(old.is_available())
            }
            Entry::Vacant(entry) => {
                entry.insert(state);
                None
            }
        };
        for channel_id in new_channels {
            self.0.channel_guild.insert(channel_id, guild_id);
        }

        tracing::debug!(guild_id = %guild_id, was_available = ?previous, "Guild cached");
        match previous {
            None => GuildCreateOutcome::Created(guild),
            Some(false) => GuildCreateOutcome::Available(guild),
            Some(true) => GuildCreateOutcome::Replaced(guild),
        }
    }

    /// Mark a guild as being in an outage.
    ///
    /// The guild keeps its id; members, channels, roles, presences and voice
    /// states are dropped and pending member requests are abandoned. Unknown
    /// guilds get a placeholder. Returns `true` if the guild was available before.
    pub fn set_unavailable(&self, guild_id: Snowflake) -> bool {
        let was_available = match self.0.guilds.entry(guild_id) {
            Entry::Occupied(mut entry) => {
                if !entry.get().is_available() {
                    return false;
                }
                let old = entry.insert(GuildState::unavailable(guild_id));
                for channel_id in old.channels.keys() {
                    self.0.channel_guild.remove(channel_id);
                }
                true
            }
            Entry::Vacant(entry) => {
                entry.insert(GuildState::unavailable(guild_id));
                false
            }
        };
        self.0.chunks.cancel_guild(guild_id);
        tracing::debug!(guild_id = %guild_id, was_available, "Guild marked unavailable");
        was_available
    }

    /// Merge a partial guild (GUILD_UPDATE, REST). Header fields only.
    ///
    /// An unknown guild is created from the payload with empty collections.
    pub fn merge_guild(&self, payload: &GuildPayload) -> Option<(Option<Guild>, Guild)> {
        match self.0.guilds.entry(payload.id) {
            Entry::Occupied(mut entry) => {
                let state = entry.get_mut();
                if !state.is_available() {
                    tracing::debug!(guild_id = %payload.id, "Dropping update for unavailable guild");
                    return None;
                }
                let old = state.guild.clone();
                state.guild.merge(payload);
                Some((Some(old), state.guild.clone()))
            }
            Entry::Vacant(entry) => {
                let mut state = GuildState::unavailable(payload.id);
                state.guild = Guild::from_payload(payload);
                state.guild.available = true;
                let guild = state.guild.clone();
                entry.insert(state);
                Some((None, guild))
            }
        }
    }

    /// Forget a guild the client left or was removed from
    pub fn remove_guild(&self, guild_id: Snowflake) -> Option<GuildState> {
        let (_, state) = self.0.guilds.remove(&guild_id)?;
        for channel_id in state.channels.keys() {
            self.0.channel_guild.remove(channel_id);
        }
        self.0.chunks.cancel_guild(guild_id);
        Some(state)
    }

    /// Run `f` on an available guild, logging and skipping otherwise
    pub(super) fn with_available_guild<R>(
        &self,
        guild_id: Snowflake,
        what: &'static str,
        f: impl FnOnce(&mut GuildState) -> R,
    ) -> Option<R> {
        let Some(mut state) = self.0.guilds.get_mut(&guild_id) else {
            tracing::warn!(guild_id = %guild_id, entity = what, "Dropping write for unknown guild");
            return None;
        };
        if !state.is_available() {
            tracing::debug!(guild_id = %guild_id, entity = what, "Dropping write for unavailable guild");
            return None;
        }
        Some(f(&mut state))
    }

    // =========================================================================
    // Channels
    // =========================================================================

    /// Merge a channel, creating it on first sight.
    ///
    /// `guild_id` falls back to the payload's own reference and then to the
    /// channel index. A guild channel whose guild is not cached is dropped.
    pub fn merge_channel(
        &self,
        guild_id: Option<Snowflake>,
        payload: ChannelPayload,
    ) -> Option<(Option<Channel>, Channel)> {
        let is_private = payload
            .kind
            .and_then(ChannelType::from_u8)
            .is_some_and(|kind| !kind.is_guild())
            || self.0.private_channels.contains_key(&payload.id);
        if is_private {
            return self.merge_private_channel(payload);
        }

        let channel_id = payload.id;
        let guild_id = guild_id
            .or(payload.guild_id)
            .or_else(|| self.0.channel_guild.get(&channel_id).map(|entry| *entry));
        let Some(guild_id) = guild_id else {
            tracing::warn!(channel_id = %channel_id, "Dropping channel without guild reference");
            return None;
        };

        let merged = self
            .with_available_guild(guild_id, "channel", |state| {
                if let Some(existing) = state.channels.get_mut(&channel_id) {
                    let old = existing.clone();
                    existing.merge(payload);
                    return Some((Some(old), existing.clone()));
                }
                match Channel::from_payload(Some(guild_id), payload) {
                    Ok(channel) => {
                        state.channels.insert(channel_id, channel.clone());
                        Some((None, channel))
                    }
                    Err(err) => {
                        tracing::warn!(guild_id = %guild_id, channel_id = %channel_id, error = %err, "Dropping channel");
                        None
                    }
                }
            })
            .flatten();

        if merged.is_some() {
            self.0.channel_guild.insert(channel_id, guild_id);
        }
        merged
    }

    fn merge_private_channel(&self, payload: ChannelPayload) -> Option<(Option<Channel>, Channel)> {
        if let Some(recipients) = payload.recipients.as_ref() {
            for user in recipients {
                self.merge_user(user.clone());
            }
        }

        match self.0.private_channels.entry(payload.id) {
            Entry::Occupied(mut entry) => {
                let old = entry.get().clone();
                entry.get_mut().merge(payload);
                Some((Some(old), entry.get().clone()))
            }
            Entry::Vacant(entry) => match Channel::from_payload(None, payload) {
                Ok(channel) => {
                    entry.insert(channel.clone());
                    Some((None, channel))
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Dropping private channel");
                    None
                }
            },
        }
    }

    pub fn remove_channel(&self, channel_id: Snowflake) -> Option<Channel> {
        if let Some((_, channel)) = self.0.private_channels.remove(&channel_id) {
            return Some(channel);
        }
        let (_, guild_id) = self.0.channel_guild.remove(&channel_id)?;
        self.0.guilds.get_mut(&guild_id)?.channels.remove(&channel_id)
    }

    /// Track the newest message of a channel (MESSAGE_CREATE)
    pub fn record_message(&self, channel_id: Snowflake, message_id: Snowflake) {
        let patch = ChannelPayload {
            id: channel_id,
            last_message_id: hearth_core::Field::Set(message_id),
            ..ChannelPayload::default()
        };
        if let Some(mut channel) = self.0.private_channels.get_mut(&channel_id) {
            channel.merge(patch);
            return;
        }
        let Some(guild_id) = self.0.channel_guild.get(&channel_id).map(|entry| *entry) else {
            return;
        };
        if let Some(mut state) = self.0.guilds.get_mut(&guild_id) {
            if let Some(channel) = state.channels.get_mut(&channel_id) {
                channel.merge(patch);
            }
        }
    }

    // =========================================================================
    // Members
    // =========================================================================

    /// Merge a member, resolving its user first.
    ///
    /// Creates the member on first sight. Dropped if the guild is unknown or unavailable.
    pub fn merge_member(
        &self,
        guild_id: Snowflake,
        payload: MemberPayload,
    ) -> Option<(Option<GuildMember>, GuildMember)> {
        if self.is_guild_available(guild_id) != Some(true) {
            tracing::warn!(guild_id = %guild_id, user_id = %payload.user.id, "Dropping member for missing or unavailable guild");
            return None;
        }
        self.merge_user(payload.user.clone());

        let user_id = payload.user.id;
        self.with_available_guild(guild_id, "member", |state| {
            match state.members.get_mut(&user_id) {
                Some(existing) => {
                    let old = existing.clone();
                    existing.merge(payload);
                    (Some(old), existing.clone())
                }
                None => {
                    let member = GuildMember::from_payload(guild_id, payload);
                    state.members.insert(user_id, member.clone());
                    (None, member)
                }
            }
        })
    }

    /// A member joined (GUILD_MEMBER_ADD); bumps the guild's member count
    pub fn add_member(&self, guild_id: Snowflake, payload: MemberPayload) -> Option<GuildMember> {
        let (old, member) = self.merge_member(guild_id, payload)?;
        if old.is_none() {
            if let Some(mut state) = self.0.guilds.get_mut(&guild_id) {
                state.guild.member_count += 1;
            }
        }
        Some(member)
    }

    /// A member left (GUILD_MEMBER_REMOVE). Lowers the member count even for
    /// members that were never cached, and drops the member's presence and
    /// voice state in that guild.
    pub fn remove_member(&self, guild_id: Snowflake, user_id: Snowflake) -> Option<GuildMember> {
        self.with_available_guild(guild_id, "member", |state| {
            state.guild.member_count = state.guild.member_count.saturating_sub(1);
            state.presences.remove(&user_id);
            state.voice_states.remove(&user_id);
            state.members.remove(&user_id)
        })
        .flatten()
    }

    /// Register interest in a member request before sending it
    pub fn await_member_chunks(
        &self,
        guild_id: Snowflake,
        nonce: Option<String>,
    ) -> oneshot::Receiver<ChunkSummary> {
        self.0.chunks.register(guild_id, nonce)
    }

    /// Merge one GUILD_MEMBERS_CHUNK page atomically.
    ///
    /// Waiters registered for the request are notified after the final page
    /// has been merged, never before.
    pub fn apply_member_chunk(&self, chunk: MemberChunk) -> Option<ChunkProgress> {
        let MemberChunk {
            guild_id,
            members,
            chunk_index,
            chunk_count,
            not_found,
            presences,
            nonce,
        } = chunk;

        if self.is_guild_available(guild_id) != Some(true) {
            tracing::warn!(guild_id = %guild_id, chunk_index, "Dropping member chunk for missing or unavailable guild");
            return None;
        }
        for member in &members {
            self.merge_user(member.user.clone());
        }
        for presence in presences.iter().filter(|p| has_user_fields(&p.user)) {
            self.merge_user(presence.user.clone());
        }

        let (user_ids, completion) = self.with_available_guild(guild_id, "member chunk", |state| {
            let mut user_ids = Vec::with_capacity(members.len());
            for payload in members {
                let user_id = payload.user.id;
                match state.members.get_mut(&user_id) {
                    Some(existing) => existing.merge(payload),
                    None => {
                        state
                            .members
                            .insert(user_id, GuildMember::from_payload(guild_id, payload));
                    }
                }
                user_ids.push(user_id);
            }
            for presence in &presences {
                match state.presences.get_mut(&presence.user.id) {
                    Some(existing) => existing.merge(presence),
                    None => {
                        state
                            .presences
                            .insert(presence.user.id, Presence::from_payload(Some(guild_id), presence));
                    }
                }
            }

            let completion = self.0.chunks.record(
                guild_id,
                nonce,
                chunk_index,
                chunk_count,
                &user_ids,
                &not_found,
            );
            if completion.is_some() {
                state.members_complete = state.members.len() as u64 >= state.guild.member_count;
            }
            (user_ids, completion)
        })?;

        let complete = completion.is_some();
        if let Some((summary, waiters)) = completion {
            tracing::debug!(guild_id = %guild_id, members = summary.user_ids.len(), "Member request complete");
            for waiter in waiters {
                let _ = waiter.send(summary.clone());
            }
        }

        Some(ChunkProgress {
            guild_id,
            chunk_index,
            chunk_count,
            user_ids,
            complete,
        })
    }

    // =========================================================================
    // Roles
    // =========================================================================

    pub fn merge_role(
        &self,
        guild_id: Snowflake,
        payload: RolePayload,
    ) -> Option<(Option<Role>, Role)> {
        self.with_available_guild(guild_id, "role", |state| {
            match state.roles.get_mut(&payload.id) {
                Some(existing) => {
                    let old = existing.clone();
                    existing.merge(payload);
                    (Some(old), existing.clone())
                }
                None => {
                    let role = Role::from_payload(guild_id, payload);
                    state.roles.insert(role.id, role.clone());
                    (None, role)
                }
            }
        })
    }

    /// Remove a role and strip it from every member holding it
    pub fn remove_role(&self, guild_id: Snowflake, role_id: Snowflake) -> Option<Role> {
        self.with_available_guild(guild_id, "role", |state| {
            for member in state.members.values_mut() {
                member.roles.retain(|id| *id != role_id);
            }
            state.roles.remove(&role_id)
        })
        .flatten()
    }

    // =========================================================================
    // Presences & voice states
    // =========================================================================

    pub fn merge_presence(&self, payload: PresencePayload) -> Option<(Option<Presence>, Presence)> {
        if has_user_fields(&payload.user) {
            self.merge_user(payload.user.clone());
        }

        let Some(guild_id) = payload.guild_id else {
            tracing::debug!(user_id = %payload.user.id, "Ignoring presence without guild");
            return None;
        };
        let user_id = payload.user.id;
        self.with_available_guild(guild_id, "presence", |state| {
            match state.presences.get_mut(&user_id) {
                Some(existing) => {
                    let old = existing.clone();
                    existing.merge(&payload);
                    (Some(old), existing.clone())
                }
                None => {
                    let presence = Presence::from_payload(Some(guild_id), &payload);
                    state.presences.insert(user_id, presence.clone());
                    (None, presence)
                }
            }
        })
    }

    /// Apply a VOICE_STATE_UPDATE. A state without channel means the user left voice.
    pub fn update_voice_state(
        &self,
        payload: VoiceStatePayload,
    ) -> Option<(Option<VoiceState>, VoiceState)> {
        let Some(guild_id) = payload.guild_id else {
            tracing::debug!(user_id = %payload.user_id, "Ignoring voice state without guild");
            return None;
        };
        if let Some(member) = payload.member.clone() {
            self.merge_member(guild_id, member);
        }

        let voice_state = VoiceState::from_payload(Some(guild_id), &payload);
        self.with_available_guild(guild_id, "voice state", |state| {
            let old = if voice_state.is_connected() {
                state
                    .voice_states
                    .insert(voice_state.user_id, voice_state.clone())
            } else {
                state.voice_states.remove(&voice_state.user_id)
            };
            (old, voice_state)
        })
    }
}
