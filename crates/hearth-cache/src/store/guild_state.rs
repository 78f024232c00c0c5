//! Per-guild container
//!
//! Everything scoped to one guild lives in a single map entry so that a write
//! to the guild locks all of its sub-collections at once.

use std::collections::HashMap;

use hearth_core::{
    Channel, Guild, GuildMember, GuildPayload, Presence, Role, Snowflake, VoiceState,
};

/// A cached guild and its sub-collections
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildState {
    pub guild: Guild,
    pub members: HashMap<Snowflake, GuildMember>,
    pub channels: HashMap<Snowflake, Channel>,
    pub roles: HashMap<Snowflake, Role>,
    pub presences: HashMap<Snowflake, Presence>,
    pub voice_states: HashMap<Snowflake, VoiceState>,
    /// The member list holds every member the service reported
    pub members_complete: bool,
}

impl GuildState {
    /// Outage placeholder: id only, every collection empty
    pub fn unavailable(id: Snowflake) -> Self {
        Self {
            guild: Guild::unavailable(id),
            members: HashMap::new(),
            channels: HashMap::new(),
            roles: HashMap::new(),
            presences: HashMap::new(),
            voice_states: HashMap::new(),
            members_complete: false,
        }
    }

    /// Build a complete state from a full guild payload.
    ///
    /// Users embedded in members are not touched; the caller merges them first.
    pub fn from_payload(payload: GuildPayload) -> Self {
        let guild = Guild::from_payload(&payload);
        let guild_id = guild.id;

        let roles = payload
            .roles
            .into_iter()
            .map(|role| (role.id, Role::from_payload(guild_id, role)))
            .collect();

        let channels = payload
            .channels
            .into_iter()
            .filter_map(|channel| {
                let id = channel.id;
                match Channel::from_payload(Some(guild_id), channel) {
                    Ok(channel) => Some((id, channel)),
                    Err(err) => {
                        tracing::warn!(guild_id = %guild_id, channel_id = %id, error = %err, "Skipping channel in guild payload");
                        None
                    }
                }
            })
            .collect();

        let members: HashMap<_, _> = payload
            .members
            .into_iter()
            .map(|member| (member.user.id, GuildMember::from_payload(guild_id, member)))
            .collect();

        let presences = payload
            .presences
            .iter()
            .map(|presence| (presence.user.id, Presence::from_payload(Some(guild_id), presence)))
            .collect();

        let voice_states = payload
            .voice_states
            .iter()
            .filter(|state| state.channel_id.is_some())
            .map(|state| (state.user_id, VoiceState::from_payload(Some(guild_id), state)))
            .collect();

        let members_complete = members.len() as u64 >= guild.member_count;

        Self {
            guild,
            members,
            channels,
            roles,
            presences,
            voice_states,
            members_complete,
        }
    }

    #[inline]
    pub fn is_available(&self) -> bool {
        self.guild.available
    }
}
