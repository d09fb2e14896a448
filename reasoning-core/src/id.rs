//! Typed id wrappers for sessions, tournaments, and hypotheses.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Typed ids are plain strings underneath — no UUID enforcement, no
/// format requirement. Wrapping them prevents mixing up a session id
/// with a hypothesis id at a call site.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// Wrap an existing string-like value as this id type.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the inner string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

typed_id!(SessionId, "Unique identifier for a conversational session.");
typed_id!(TournamentId, "Unique identifier for a hypothesis tournament.");
typed_id!(HypothesisId, "Unique identifier for a hypothesis within a tournament.");
typed_id!(ProviderName, "Stable identifier for a configured provider.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_roundtrips_inner_string() {
        let id = SessionId::from("abc-123");
        assert_eq!(id.to_string(), "abc-123");
        assert_eq!(id.as_str(), "abc-123");
    }

    #[test]
    fn distinct_id_types_do_not_interconvert() {
        // compile-time property: SessionId and HypothesisId are distinct types.
        let s = SessionId::new("s1");
        let h = HypothesisId::new("s1");
        assert_eq!(s.as_str(), h.as_str());
    }
}
