//! Typed identifiers, each a thin wrapper over [`Ulid`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ulid::Ulid;

macro_rules! id_type {
    ($name:ident, $prefix:literal) => {
        #[doc = concat!("Identifies a ", $prefix, " row.")]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Ulid);

        impl $name {
            #[doc = concat!("Mint a new ", $prefix, " id.")]
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }

            /// The id as its string form.
            #[must_use]
            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self(Ulid::from_raw(raw))
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(Ulid::from_raw(raw.to_string()))
            }
        }
    };
}

id_type!(SessionId, "session");
id_type!(AgentId, "agent");
id_type!(AuditEventId, "audit event");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_string() {
        let id = SessionId::new();
        let raw = id.to_string();
        let back = SessionId::from(raw.clone());
        assert_eq!(back.as_str(), raw);
    }
}
