//! Kind-agnostic access to the cache
//!
//! Every entity kind is addressed by a [`CacheKey`] and carried as an
//! [`Entity`]. These wrap the typed accessors, which remain the preferred API.

use std::sync::Arc;

use hearth_core::{
    Channel, ChannelPayload, Guild, GuildMember, GuildPayload, MemberPayload, Presence,
    PresencePayload, Role, RolePayload, Snowflake, User, UserPayload, VoiceState,
    VoiceStatePayload,
};

use super::{EntityCache, GuildState};

/// Identity of one cached entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    User(Snowflake),
    Guild(Snowflake),
    Channel(Snowflake),
    Member { guild_id: Snowflake, user_id: Snowflake },
    Role { guild_id: Snowflake, role_id: Snowflake },
    Presence { guild_id: Snowflake, user_id: Snowflake },
    VoiceState { guild_id: Snowflake, user_id: Snowflake },
}

/// A complete cached entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    User(User),
    Guild(Guild),
    Channel(Channel),
    Member(GuildMember),
    Role(Role),
    Presence(Presence),
    VoiceState(VoiceState),
}

/// A partial update for one entity
#[derive(Debug, Clone)]
pub enum Patch {
    User(UserPayload),
    /// Header fields only; nested collections are ignored
    Guild(GuildPayload),
    Channel {
        guild_id: Option<Snowflake>,
        payload: ChannelPayload,
    },
    Member {
        guild_id: Snowflake,
        payload: MemberPayload,
    },
    Role {
        guild_id: Snowflake,
        payload: RolePayload,
    },
    Presence(PresencePayload),
    VoiceState(VoiceStatePayload),
}

impl Entity {
    pub fn key(&self) -> Option<CacheKey> {
        Some(match self {
            Self::User(user) => CacheKey::User(user.id),
            Self::Guild(guild) => CacheKey::Guild(guild.id),
            Self::Channel(channel) => CacheKey::Channel(channel.id),
            Self::Member(member) => CacheKey::Member {
                guild_id: member.guild_id,
                user_id: member.user_id,
            },
            Self::Role(role) => CacheKey::Role {
                guild_id: role.guild_id,
                role_id: role.id,
            },
            Self::Presence(presence) => CacheKey::Presence {
                guild_id: presence.guild_id?,
                user_id: presence.user_id,
            },
            Self::VoiceState(state) => CacheKey::VoiceState {
                guild_id: state.guild_id?,
                user_id: state.user_id,
            },
        })
    }
}

impl EntityCache {
    pub fn get(&self, key: &CacheKey) -> Option<Entity> {
        match *key {
            CacheKey::User(id) => self.user(id).map(|user| Entity::User((*user).clone())),
            CacheKey::Guild(id) => self.guild(id).map(Entity::Guild),
            CacheKey::Channel(id) => self.channel(id).map(Entity::Channel),
            CacheKey::Member { guild_id, user_id } => {
                self.member(guild_id, user_id).map(Entity::Member)
            }
            CacheKey::Role { guild_id, role_id } => self.role(guild_id, role_id).map(Entity::Role),
            CacheKey::Presence { guild_id, user_id } => {
                self.presence(guild_id, user_id).map(Entity::Presence)
            }
            CacheKey::VoiceState { guild_id, user_id } => {
                self.voice_state(guild_id, user_id).map(Entity::VoiceState)
            }
        }
    }

    /// Insert or overwrite a complete entity.
    ///
    /// Returns `false` when the entity is scoped to a guild that is unknown or
    /// unavailable. A member whose user is unknown gets a placeholder user.
    pub fn upsert(&self, entity: Entity) -> bool {
        match entity {
            Entity::User(user) => {
                self.0.users.insert(user.id, Arc::new(user));
                true
            }
            Entity::Guild(guild) => {
                let guild_id = guild.id;
                if !guild.available {
                    self.set_unavailable(guild_id);
                    return true;
                }
                self.0
                    .guilds
                    .entry(guild_id)
                    .or_insert_with(|| GuildState::unavailable(guild_id))
                    .guild = guild;
                true
            }
            Entity::Channel(channel) => {
                let Some(guild_id) = channel.guild_id else {
                    self.0.private_channels.insert(channel.id, channel);
                    return true;
                };
                let channel_id = channel.id;
                let stored = self
                    .with_available_guild(guild_id, "channel", |state| {
                        state.channels.insert(channel_id, channel);
                    })
                    .is_some();
                if stored {
                    self.0.channel_guild.insert(channel_id, guild_id);
                }
                stored
            }
            Entity::Member(member) => {
                if self.is_guild_available(member.guild_id) != Some(true) {
                    return false;
                }
                self.0
                    .users
                    .entry(member.user_id)
                    .or_insert_with(|| Arc::new(User::new(member.user_id)));
                self.with_available_guild(member.guild_id, "member", |state| {
                    state.members.insert(member.user_id, member);
                })
                .is_some()
            }
            Entity::Role(role) => self
                .with_available_guild(role.guild_id, "role", |state| {
                    state.roles.insert(role.id, role);
                })
                .is_some(),
            Entity::Presence(presence) => {
                let Some(guild_id) = presence.guild_id else {
                    return false;
                };
                self.with_available_guild(guild_id, "presence", |state| {
                    state.presences.insert(presence.user_id, presence);
                })
                .is_some()
            }
            Entity::VoiceState(voice) => {
                let Some(guild_id) = voice.guild_id else {
                    return false;
                };
                self.with_available_guild(guild_id, "voice state", |state| {
                    if voice.is_connected() {
                        state.voice_states.insert(voice.user_id, voice);
                    } else {
                        state.voice_states.remove(&voice.user_id);
                    }
                })
                .is_some()
            }
        }
    }

    /// Merge a partial update and return the merged entity
    pub fn merge(&self, patch: Patch) -> Option<Entity> {
        match patch {
            Patch::User(payload) => {
                let (_, user) = self.merge_user(payload);
                Some(Entity::User(Arc::unwrap_or_clone(user)))
            }
            Patch::Guild(payload) => self
                .merge_guild(&payload)
                .map(|(_, guild)| Entity::Guild(guild)),
            Patch::Channel { guild_id, payload } => self
                .merge_channel(guild_id, payload)
                .map(|(_, channel)| Entity::Channel(channel)),
            Patch::Member { guild_id, payload } => self
                .merge_member(guild_id, payload)
                .map(|(_, member)| Entity::Member(member)),
            Patch::Role { guild_id, payload } => self
                .merge_role(guild_id, payload)
                .map(|(_, role)| Entity::Role(role)),
            Patch::Presence(payload) => self
                .merge_presence(payload)
                .map(|(_, presence)| Entity::Presence(presence)),
            Patch::VoiceState(payload) => self
                .update_voice_state(payload)
                .map(|(_, state)| Entity::VoiceState(state)),
        }
    }

    /// Remove one entity. Removing a member leaves the guild's member count alone.
    pub fn remove(&self, key: &CacheKey) -> Option<Entity> {
        match *key {
            CacheKey::User(id) => self
                .0
                .users
                .remove(&id)
                .map(|(_, user)| Entity::User(Arc::unwrap_or_clone(user))),
            CacheKey::Guild(id) => self.remove_guild(id).map(|state| Entity::Guild(state.guild)),
            CacheKey::Channel(id) => self.remove_channel(id).map(Entity::Channel),
            CacheKey::Member { guild_id, user_id } => self
                .0
                .guilds
                .get_mut(&guild_id)?
                .members
                .remove(&user_id)
                .map(Entity::Member),
            CacheKey::Role { guild_id, role_id } => {
                self.remove_role(guild_id, role_id).map(Entity::Role)
            }
            CacheKey::Presence { guild_id, user_id } => self
                .0
                .guilds
                .get_mut(&guild_id)?
                .presences
                .remove(&user_id)
                .map(Entity::Presence),
            CacheKey::VoiceState { guild_id, user_id } => self
                .0
                .guilds
                .get_mut(&guild_id)?
                .voice_states
                .remove(&user_id)
                .map(Entity::VoiceState),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_core::{Field, Permissions};

    fn sf(id: u64) -> Snowflake {
        Snowflake::new(id)
    }

    fn cache_with_guild() -> EntityCache {
        let cache = EntityCache::new();
        let payload: GuildPayload =
            serde_json::from_str(r#"{"id":"1","name":"home","member_count":1}"#).unwrap();
        cache.guild_create(payload);
        cache
    }

    #[test]
    fn test_upsert_then_get_returns_entity() {
        let cache = cache_with_guild();
        let entities = vec![
            Entity::User(User::new(sf(10))),
            Entity::Role(Role::new(sf(2), sf(1), "mod".into(), Permissions::KICK_MEMBERS)),
            Entity::Member(GuildMember::new(sf(1), sf(10))),
            Entity::Presence(Presence::new(sf(10), Some(sf(1)))),
        ];

        for entity in entities {
            let key = entity.key().unwrap();
            assert!(cache.upsert(entity.clone()));
            assert_eq!(cache.get(&key), Some(entity));
        }
    }

    #[test]
    fn test_remove_then_get_is_none() {
        let cache = cache_with_guild();
        let member = Entity::Member(GuildMember::new(sf(1), sf(10)));
        let key = member.key().unwrap();
        cache.upsert(member.clone());

        assert_eq!(cache.remove(&key), Some(member));
        assert_eq!(cache.get(&key), None);
        assert_eq!(cache.remove(&key), None);
        assert_eq!(cache.guild(sf(1)).unwrap().member_count, 1);
    }

    #[test]
    fn test_member_upsert_creates_placeholder_user() {
        let cache = cache_with_guild();
        assert!(cache.upsert(Entity::Member(GuildMember::new(sf(1), sf(44)))));
        assert!(cache.user(sf(44)).is_some());

        assert!(!cache.upsert(Entity::Member(GuildMember::new(sf(9), sf(45)))));
        assert!(cache.user(sf(45)).is_none());
    }

    #[test]
    fn test_merge_leaves_absent_fields() {
        let cache = cache_with_guild();
        cache.merge(Patch::Role {
            guild_id: sf(1),
            payload: RolePayload {
                id: sf(2),
                name: Field::Set("mod".into()),
                color: Field::Set(0xff0000),
                ..Default::default()
            },
        });

        let merged = cache
            .merge(Patch::Role {
                guild_id: sf(1),
                payload: RolePayload {
                    id: sf(2),
                    color: Field::Null,
                    ..Default::default()
                },
            })
            .unwrap();

        let Entity::Role(role) = merged else {
            panic!("expected role");
        };
        assert_eq!(role.name, "mod");
        assert_eq!(role.color, 0);
    }

    #[test]
    fn test_later_merge_wins() {
        let cache = cache_with_guild();
        for name in ["first", "second"] {
            cache.merge(Patch::User(UserPayload {
                id: sf(7),
                username: Field::Set(name.into()),
                ..Default::default()
            }));
        }
        assert_eq!(cache.user(sf(7)).unwrap().username, "second");
    }

    #[test]
    fn test_guild_upsert_replaces_header() {
        let cache = cache_with_guild();
        let renamed = Guild {
            name: "renamed".into(),
            available: true,
            ..Guild::unavailable(sf(1))
        };
        assert!(cache.upsert(Entity::Guild(renamed.clone())));
        assert_eq!(cache.guild(sf(1)), Some(renamed));

        let fresh = Guild {
            name: "fresh".into(),
            available: true,
            ..Guild::unavailable(sf(3))
        };
        assert!(cache.upsert(Entity::Guild(fresh)));
        assert_eq!(cache.guild(sf(3)).unwrap().name, "fresh");
        assert_eq!(cache.is_guild_available(sf(3)), Some(true));
    }

    #[test]
    fn test_unavailable_guild_rejects_scoped_upserts() {
        let cache = cache_with_guild();
        cache.upsert(Entity::Guild(Guild::unavailable(sf(1))));

        assert_eq!(cache.is_guild_available(sf(1)), Some(false));
        assert!(!cache.upsert(Entity::Role(Role::new(sf(2), sf(1), "r".into(), Permissions::empty()))));
        assert!(cache.get(&CacheKey::Role { guild_id: sf(1), role_id: sf(2) }).is_none());
    }
}
