//! Entity identifiers
//!
//! Ids are opaque strings: the client mints UUID v7 values, but the remote
//! service may hand back a different id on create, so parsing never assumes a
//! particular format beyond "non-empty".

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new unique id using UUID v7 (time-sortable)
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            /// Get the string representation of this id
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(Error::InvalidInput(format!(
                        "{} cannot be empty",
                        stringify!($name)
                    )));
                }
                Ok(Self(trimmed.to_string()))
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

entity_id!(
    /// Identifier of a task
    TaskId
);
entity_id!(
    /// Identifier of a project
    ProjectId
);
entity_id!(
    /// Identifier of a tag
    TagId
);
entity_id!(
    /// Identifier of a subtask, unique within its parent task
    SubtaskId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_unique() {
        let id1 = TaskId::new();
        let id2 = TaskId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_id_parse_rejects_empty() {
        assert!("  ".parse::<ProjectId>().is_err());
        let parsed: TagId = " tag-1 ".parse().unwrap();
        assert_eq!(parsed.as_str(), "tag-1");
    }

    #[test]
    fn test_id_serializes_as_plain_string() {
        let id = TaskId::from("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }
}
