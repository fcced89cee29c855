//! Newtype domain identifiers.
//!
//! Every catalog entity is keyed by a distinct newtype wrapping a [`Uuid`]. This
//! prevents accidentally interchanging, for example, a [`TemplateId`] with an
//! [`ExecutionId`] even though both are UUIDs under the hood.
//!
//! Identifiers are always generated client-side, before the write that creates
//! the entity is issued. Concurrent stages therefore never contend on
//! identifier allocation.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for UUID-wrapped newtypes.
// Generates: struct (Copy), new_random(), from_uuid(), as_uuid(), Display, FromStr.
// ---------------------------------------------------------------------------
macro_rules! uuid_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a new random identifier.
            pub fn new_random() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID (e.g. deserialised from a checkpoint).
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Returns the underlying [`Uuid`].
            pub fn as_uuid(self) -> Uuid {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is blank.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.trim().is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Catalog entity identifiers
// ---------------------------------------------------------------------------

uuid_id! {
    /// Identifies a time-bounded grouping of one analysis run's artefacts.
    EpochId
}

uuid_id! {
    /// Identifies an extracted business requirement.
    RequirementId
}

uuid_id! {
    /// Identifies a generated analysis use case.
    UseCaseId
}

uuid_id! {
    /// Identifies a concrete, parameterised analytics job specification.
    TemplateId
}

uuid_id! {
    /// Identifies one run of a template on the analytics engine.
    ExecutionId
}

uuid_id! {
    /// Identifies a single pipeline run (one invocation of the orchestrator).
    ///
    /// Propagated through spans so all activity from a run can be correlated,
    /// and used as the checkpoint key for resumption.
    PipelineRunId
}

// ---------------------------------------------------------------------------
// Identifiers: String-backed (external names)
// ---------------------------------------------------------------------------

string_id! {
    /// Name of a graph known to the analytics engine (e.g. `"ecommerce_graph"`).
    GraphName
}

string_id! {
    /// Name of a vertex or edge collection in the analysed graph.
    CollectionName
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_ids_parse_their_display_form() {
        let id = ExecutionId::new_random();
        let parsed: ExecutionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn string_ids_reject_blank_values() {
        assert!(GraphName::new("").is_none());
        assert!(GraphName::new("   ").is_none());
        assert_eq!(GraphName::new("social").unwrap().as_str(), "social");
    }
}
