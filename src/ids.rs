//! Identity of a [`crate::spec::Spec`].
//!
//! Every spec gets a [`SpecId`] when it is created. The id survives
//! [`crate::spec::Spec::clone_spec_info`], so a copy can be traced back to its origin in logs.
//! Ids are ULIDs: they sort by creation time and serialize as their 26 character string form.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct SpecId(pub Ulid);

impl SpecId {
    /// Fresh id stamped with the current time
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Milliseconds since the Unix epoch at which the spec was created
    #[must_use]
    pub fn created_at_ms(&self) -> u64 {
        self.0.timestamp_ms()
    }
}

impl Default for SpecId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Ulid> for SpecId {
    fn from(id: Ulid) -> Self {
        Self(id)
    }
}

impl fmt::Display for SpecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for SpecId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}

impl Serialize for SpecId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SpecId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse()
            .map_err(|e| de::Error::custom(format!("invalid spec id '{raw}': {e}")))
    }
}
