//! Patch field - distinguishes "not sent" from "explicitly cleared"
//!
//! Partial payloads declare their fields as `#[serde(default)] Field<T>`:
//! an absent key deserializes to [`Field::Missing`], a JSON `null` to
//! [`Field::Null`] and any other value to [`Field::Set`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One field of a partial update
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Field<T> {
    /// Key was not present; the cached value is left untouched
    #[default]
    Missing,
    /// Key was present with `null`; the cached value is cleared
    Null,
    /// Key was present with a value; the cached value is replaced
    Set(T),
}

impl<T> Field<T> {
    #[inline]
    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// Borrow the value if one was sent
    #[inline]
    pub const fn as_ref(&self) -> Option<&T> {
        match self {
            Self::Set(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Field<U> {
        match self {
            Self::Missing => Field::Missing,
            Self::Null => Field::Null,
            Self::Set(value) => Field::Set(f(value)),
        }
    }

    /// Apply to a nullable cached value
    pub fn apply(self, target: &mut Option<T>) {
        match self {
            Self::Missing => {}
            Self::Null => *target = None,
            Self::Set(value) => *target = Some(value),
        }
    }

    /// Apply to a non-nullable cached value
    ///
    /// `Null` cannot clear a required value and is ignored like `Missing`.
    pub fn apply_required(self, target: &mut T) {
        if let Self::Set(value) = self {
            *target = value;
        }
    }

    /// Apply to a non-nullable cached value where `Null` means "reset to default"
    pub fn apply_or_default(self, target: &mut T)
    where
        T: Default,
    {
        match self {
            Self::Missing => {}
            Self::Null => *target = T::default(),
            Self::Set(value) => *target = value,
        }
    }
}

impl<T> From<Option<T>> for Field<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Self::Set)
    }
}

impl<'de, T> Deserialize<'de> for Field<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Field::from)
    }
}

// Missing fields must be skipped with `skip_serializing_if = "Field::is_missing"`
impl<T> Serialize for Field<T>
where
    T: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Set(value) => serializer.serialize_some(value),
            Self::Missing | Self::Null => serializer.serialize_none(),
        }
    }
}
