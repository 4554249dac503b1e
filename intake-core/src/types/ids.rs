//! Identifier Types
//!
//! Naming conventions:
//! - `LocalId`: generated by the client while the wizard runs
//! - `ServerId`: assigned by the datastore when a row is inserted
//!
//! All ids use the newtype pattern and are non-interchangeable.

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

string_id!(
    /// Client-generated identifier of an Owner or Property
    LocalId
);

string_id!(
    /// Datastore-assigned row identifier
    ServerId
);

string_id!(
    /// Stable identity of the submitting user
    UserId
);

string_id!(
    /// Server identifier of a submission header row
    SubmissionId
);

impl From<ServerId> for SubmissionId {
    fn from(id: ServerId) -> Self {
        Self(id.0)
    }
}

/// Entity kinds that receive server identifiers during a submission
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Owner,
    Property,
}

impl EntityKind {
    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::Owner => "owner",
            EntityKind::Property => "property",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
