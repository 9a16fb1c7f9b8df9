use crate::value::Value;
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

///
/// Key
///
/// Primary-key value for a persisted entity. Keys are issued by the store
/// from a per-entity sequence; `UNSET` marks a not-yet-persisted entity.
///

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, Eq, From, Hash, Ord, PartialEq, PartialOrd,
    Serialize,
)]
pub struct Key(pub u64);

impl Key {
    /// Sentinel for entities that have not been persisted yet.
    pub const UNSET: Self = Self(0);

    #[must_use]
    pub const fn is_set(self) -> bool {
        self.0 != 0
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<Key> for Value {
    fn from(key: Key) -> Self {
        Self::Uint(key.0)
    }
}

impl Key {
    /// Decode a key from a row scalar, if it carries one.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Uint(v) => Some(Self(*v)),
            _ => None,
        }
    }
}
