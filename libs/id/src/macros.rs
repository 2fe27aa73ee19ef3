//! Macros for defining typed ID types.

/// Macro to define a typed wrapper for an opaque, resource-manager-owned ID.
///
/// The resource manager mints these identifiers (offer IDs, agent IDs,
/// framework IDs); we carry them verbatim but keep them typed so they cannot
/// be mixed up. The generated newtype provides:
/// - `new()` from any string-like value
/// - `as_str()` access to the raw value
/// - `Display`, `FromStr` (rejecting empty strings)
/// - `Serialize` and `Deserialize` as a plain string
/// - `Ord`, `Hash`, and other standard traits
///
/// # Example
///
/// ```ignore
/// define_opaque_id!(AgentId);
///
/// let agent_id = AgentId::new("agent-7a2b");
/// assert_eq!(agent_id.as_str(), "agent-7a2b");
/// ```
#[macro_export]
macro_rules! define_opaque_id {
    ($name:ident) => {
        /// An opaque, resource-manager-owned identifier.
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw identifier value.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the raw identifier value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if s.is_empty() {
                    return Err($crate::IdError::Empty);
                }
                Ok(Self(s.to_string()))
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Ok(Self(s))
            }
        }
    };
}
