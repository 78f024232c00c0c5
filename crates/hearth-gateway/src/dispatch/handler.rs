//! Applies dispatches to the cache
//!
//! Each dispatch is merged into the [`EntityCache`] and turned into at most
//! one [`DomainEvent`]. Writes the cache rejects (unknown or unavailable
//! guild) produce no event.

use std::sync::Arc;

use hearth_cache::{EntityCache, GuildCreateOutcome};
use hearth_core::{Channel, DomainEvent, User};

use super::event::GatewayEvent;
use crate::shard::ShardId;
use crate::voice::VoiceHandoff;

#[derive(Debug, Clone)]
pub struct DispatchHandler {
    shard: ShardId,
    cache: EntityCache,
    voice: VoiceHandoff,
}

impl DispatchHandler {
    pub(crate) fn new(shard: ShardId, cache: EntityCache, voice: VoiceHandoff) -> Self {
        Self { shard, cache, voice }
    }

    pub fn cache(&self) -> &EntityCache {
        &self.cache
    }

    /// Merge one dispatch and describe it
    pub fn apply(&self, event: GatewayEvent) -> Option<DomainEvent> {
        if let Some(guild_id) = event.guild_id() {
            if !self.shard.owns(guild_id) {
                tracing::trace!(shard = %self.shard, guild_id = %guild_id, "Dropping dispatch for foreign guild");
                return None;
            }
        }

        match event {
            GatewayEvent::Ready(ready) => {
                let (_, user) = self.cache.set_current_user(ready.user);
                let guild_ids: Vec<_> = ready
                    .guilds
                    .iter()
                    .map(|guild| guild.id)
                    .filter(|id| self.shard.owns(*id))
                    .collect();
                for guild_id in &guild_ids {
                    self.cache.set_unavailable(*guild_id);
                }
                Some(DomainEvent::Ready {
                    session_id: ready.session_id,
                    user: Arc::unwrap_or_clone(user),
                    guild_ids,
                })
            }
            GatewayEvent::Resumed => Some(DomainEvent::Resumed),

            // Guilds
            GatewayEvent::GuildCreate(payload) => Some(match self.cache.guild_create(*payload) {
                GuildCreateOutcome::Created(guild) | GuildCreateOutcome::Replaced(guild) => {
                    DomainEvent::GuildCreate { guild }
                }
                GuildCreateOutcome::Available(guild) => DomainEvent::GuildAvailable { guild },
                GuildCreateOutcome::Unavailable(guild_id) => {
                    DomainEvent::GuildUnavailable { guild_id }
                }
            }),
            GatewayEvent::GuildUpdate(payload) => self
                .cache
                .merge_guild(&payload)
                .map(|(old, guild)| DomainEvent::GuildUpdate { old, guild }),
            GatewayEvent::GuildDelete(stub) => {
                if stub.unavailable {
                    self.cache.set_unavailable(stub.id);
                    Some(DomainEvent::GuildUnavailable { guild_id: stub.id })
                } else {
                    let state = self.cache.remove_guild(stub.id);
                    Some(DomainEvent::GuildDelete {
                        guild_id: stub.id,
                        guild: state.map(|state| state.guild),
                    })
                }
            }

            // Channels
            GatewayEvent::ChannelCreate(payload) => self
                .cache
                .merge_channel(None, payload)
                .map(|(_, channel)| DomainEvent::ChannelCreate { channel }),
            GatewayEvent::ChannelUpdate(payload) => self
                .cache
                .merge_channel(None, payload)
                .map(|(old, channel)| DomainEvent::ChannelUpdate { old, channel }),
            GatewayEvent::ChannelDelete(payload) => {
                let guild_id = payload.guild_id;
                let channel = match self.cache.remove_channel(payload.id) {
                    Some(channel) => channel,
                    None => Channel::from_payload(guild_id, payload).ok()?,
                };
                Some(DomainEvent::ChannelDelete { channel })
            }

            // Members
            GatewayEvent::MemberAdd(payload) => {
                let guild_id = payload.guild_id?;
                let member = self.cache.add_member(guild_id, payload)?;
                let user = self.cache.user(member.user_id)?;
                Some(DomainEvent::MemberAdd {
                    member,
                    user: Arc::unwrap_or_clone(user),
                })
            }
            GatewayEvent::MemberUpdate(payload) => {
                let guild_id = payload.guild_id?;
                self.cache
                    .merge_member(guild_id, payload)
                    .map(|(old, member)| DomainEvent::MemberUpdate { old, member })
            }
            GatewayEvent::MemberRemove(remove) => {
                if self.cache.is_guild_available(remove.guild_id) != Some(true) {
                    tracing::debug!(guild_id = %remove.guild_id, "Dropping member removal for unavailable guild");
                    return None;
                }
                self.cache.remove_member(remove.guild_id, remove.user.id);
                let user = match self.cache.user(remove.user.id) {
                    Some(user) => Arc::unwrap_or_clone(user),
                    None => User::from_payload(remove.user),
                };
                Some(DomainEvent::MemberRemove {
                    guild_id: remove.guild_id,
                    user,
                })
            }
            GatewayEvent::MembersChunk(chunk) => {
                let nonce = chunk.nonce.clone();
                let not_found = chunk.not_found.clone();
                let progress = self.cache.apply_member_chunk(chunk)?;
                Some(DomainEvent::MembersChunk {
                    guild_id: progress.guild_id,
                    chunk_index: progress.chunk_index,
                    chunk_count: progress.chunk_count,
                    user_ids: progress.user_ids,
                    not_found,
                    nonce,
                })
            }

            // Roles
            GatewayEvent::RoleCreate(change) => self
                .cache
                .merge_role(change.guild_id, change.role)
                .map(|(_, role)| DomainEvent::RoleCreate { role }),
            GatewayEvent::RoleUpdate(change) => self
                .cache
                .merge_role(change.guild_id, change.role)
                .map(|(old, role)| DomainEvent::RoleUpdate { old, role }),
            GatewayEvent::RoleDelete(delete) => {
                if self.cache.is_guild_available(delete.guild_id) != Some(true) {
                    return None;
                }
                let role = self.cache.remove_role(delete.guild_id, delete.role_id);
                Some(DomainEvent::RoleDelete {
                    guild_id: delete.guild_id,
                    role_id: delete.role_id,
                    role,
                })
            }

            // Presence & voice
            GatewayEvent::PresenceUpdate(payload) => self
                .cache
                .merge_presence(payload)
                .map(|(old, presence)| DomainEvent::PresenceUpdate { old, presence }),
            GatewayEvent::VoiceStateUpdate(payload) => {
                self.voice.observe_state(self.current_user_id(), &payload);
                self.cache
                    .update_voice_state(payload)
                    .map(|(old, state)| DomainEvent::VoiceStateUpdate { old, state })
            }
            GatewayEvent::VoiceServerUpdate(server) => {
                self.voice.observe_server(
                    self.current_user_id(),
                    server.guild_id,
                    server.endpoint.as_deref(),
                    &server.token,
                );
                Some(DomainEvent::VoiceServerUpdate {
                    guild_id: server.guild_id,
                    endpoint: server.endpoint,
                    token: server.token,
                })
            }

            // Messages
            GatewayEvent::MessageCreate(mut message) => {
                self.cache.record_message(message.channel_id, message.id);
                if !message.author.username.is_missing() {
                    self.cache.merge_user(message.author.clone());
                }
                if let (Some(guild_id), Some(mut member)) = (message.guild_id, message.member.take()) {
                    member.user = message.author.clone();
                    self.cache.merge_member(guild_id, member.clone());
                    message.member = Some(member);
                }
                Some(DomainEvent::MessageCreate { message })
            }
            GatewayEvent::MessageUpdate(update) => Some(DomainEvent::MessageUpdate { update }),
            GatewayEvent::MessageDelete(delete) => Some(DomainEvent::MessageDelete {
                id: delete.id,
                channel_id: delete.channel_id,
                guild_id: delete.guild_id,
            }),
            GatewayEvent::MessageDeleteBulk(delete) => Some(DomainEvent::MessageDeleteBulk {
                ids: delete.ids,
                channel_id: delete.channel_id,
                guild_id: delete.guild_id,
            }),
            GatewayEvent::TypingStart(typing) => {
                if let (Some(guild_id), Some(member)) = (typing.guild_id, typing.member) {
                    self.cache.merge_member(guild_id, member);
                }
                Some(DomainEvent::TypingStart {
                    channel_id: typing.channel_id,
                    guild_id: typing.guild_id,
                    user_id: typing.user_id,
                    timestamp: typing.timestamp,
                })
            }

            GatewayEvent::UserUpdate(payload) => {
                let (old, user) = self.cache.set_current_user(payload);
                Some(DomainEvent::UserUpdate {
                    old: old.map(Arc::unwrap_or_clone),
                    user: Arc::unwrap_or_clone(user),
                })
            }
            GatewayEvent::Unknown { name, data } => {
                tracing::trace!(shard = %self.shard, event = %name, "Unhandled dispatch");
                Some(DomainEvent::Unknown { name, data })
            }
        }
    }

    fn current_user_id(&self) -> Option<hearth_core::Snowflake> {
        self.cache.current_user_id()
    }
}
