//! Role entity - a guild role with permissions

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::value_objects::{Field, Permissions, Snowflake};

/// Role entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: Snowflake,
    pub guild_id: Snowflake,
    pub name: String,
    pub color: u32,
    pub hoist: bool,
    pub position: i64,
    pub permissions: Permissions,
    pub managed: bool,
    pub mentionable: bool,
}

/// Role object as received on the wire (guild id travels beside it)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePayload {
    pub id: Snowflake,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub name: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub color: Field<u32>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub hoist: Field<bool>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub position: Field<i64>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub permissions: Field<Permissions>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub managed: Field<bool>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub mentionable: Field<bool>,
}

impl Role {
    /// Create a new Role
    pub fn new(id: Snowflake, guild_id: Snowflake, name: String, permissions: Permissions) -> Self {
        Self {
            id,
            guild_id,
            name,
            color: 0,
            hoist: false,
            position: 0,
            permissions,
            managed: false,
            mentionable: false,
        }
    }

    pub fn from_payload(guild_id: Snowflake, payload: RolePayload) -> Self {
        let mut role = Self::new(payload.id, guild_id, String::new(), Permissions::empty());
        role.merge(payload);
        role
    }

    /// Apply a partial update
    pub fn merge(&mut self, payload: RolePayload) {
        payload.name.apply_required(&mut self.name);
        payload.color.apply_or_default(&mut self.color);
        payload.hoist.apply_required(&mut self.hoist);
        payload.position.apply_required(&mut self.position);
        payload.permissions.apply_or_default(&mut self.permissions);
        payload.managed.apply_required(&mut self.managed);
        payload.mentionable.apply_required(&mut self.mentionable);
    }

    /// The @everyone role shares its id with the guild
    #[inline]
    pub fn is_everyone(&self) -> bool {
        self.id == self.guild_id
    }

    /// Hierarchy order: higher position first, older role first on ties
    pub fn hierarchy_cmp(&self, other: &Role) -> Ordering {
        other
            .position
            .cmp(&self.position)
            .then_with(|| self.id.cmp(&other.id))
    }

    /// Check whether this role outranks another
    #[inline]
    pub fn is_higher_than(&self, other: &Role) -> bool {
        self.hierarchy_cmp(other) == Ordering::Less
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(id: u64, position: i64) -> Role {
        let mut role = Role::new(Snowflake::new(id), Snowflake::new(1), format!("r{id}"), Permissions::empty());
        role.position = position;
        role
    }

    #[test]
    fn test_from_payload() {
        let payload: RolePayload = serde_json::from_str(
            r#"{"id":"41771983423143936","name":"WE DEM BOYZZ!!!!!!","color":3447003,"hoist":true,"position":1,"permissions":"66321471","managed":false,"mentionable":false}"#,
        )
        .unwrap();
        let role = Role::from_payload(Snowflake::new(9), payload);

        assert_eq!(role.guild_id, Snowflake::new(9));
        assert_eq!(role.name, "WE DEM BOYZZ!!!!!!");
        assert_eq!(role.permissions.bits(), 66_321_471);
        assert_eq!(role.color, 0x3498db);
        assert!(role.hoist);
    }

    #[test]
    fn test_hierarchy_position_then_id() {
        let low = role(10, 1);
        let high = role(20, 5);
        let tie_old = role(30, 3);
        let tie_new = role(40, 3);

        assert!(high.is_higher_than(&low));
        assert!(!low.is_higher_than(&high));
        assert!(tie_old.is_higher_than(&tie_new));

        let mut roles = vec![low.clone(), tie_new.clone(), high.clone(), tie_old.clone()];
        roles.sort_by(Role::hierarchy_cmp);
        let ids: Vec<_> = roles.iter().map(|r| r.id.into_inner()).collect();
        assert_eq!(ids, vec![20, 30, 40, 10]);
    }

    #[test]
    fn test_everyone_role() {
        let everyone = Role::new(Snowflake::new(1), Snowflake::new(1), "@everyone".into(), Permissions::VIEW_CHANNEL);
        assert!(everyone.is_everyone());
        assert!(!role(2, 0).is_everyone());
    }

    #[test]
    fn test_merge_leaves_absent_fields() {
        let mut r = role(5, 2);
        r.permissions = Permissions::KICK_MEMBERS;
        r.merge(serde_json::from_str(r#"{"id":"5","name":"mods"}"#).unwrap());

        assert_eq!(r.name, "mods");
        assert_eq!(r.position, 2);
        assert_eq!(r.permissions, Permissions::KICK_MEMBERS);
    }
}
