//! Strongly-typed identifiers used across the domain.
//!
//! Every identifier is a UUID newtype. Domain crates declare their own entity
//! identifiers through [`uuid_newtype!`] so that an `RfqLineId` can never be
//! passed where a `QuoteLineId` is expected.

/// Declare a UUID-backed identifier newtype.
///
/// The generated type is `Copy`, hashable, serializes transparently as the
/// underlying UUID and parses from its hyphenated string form. Callers must
/// depend on `serde` and `uuid` directly.
#[macro_export]
macro_rules! uuid_newtype {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord,
            ::serde::Serialize, ::serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(::uuid::Uuid);

        impl $name {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
            /// for determinism.
            pub fn new() -> Self {
                Self(::uuid::Uuid::now_v7())
            }

            pub fn from_uuid(uuid: ::uuid::Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &::uuid::Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<::uuid::Uuid> for $name {
            fn from(value: ::uuid::Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$name> for ::uuid::Uuid {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl core::str::FromStr for $name {
            type Err = $crate::DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = ::uuid::Uuid::parse_str(s.trim())
                    .map_err(|e| $crate::DomainError::invalid_id(format!("{}: {}", $label, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

uuid_newtype!(
    /// Identifier of a tenant (the buying company; multi-tenant boundary).
    TenantId,
    "TenantId"
);

uuid_newtype!(
    /// Identifier of a user (actor identity or notification recipient).
    UserId,
    "UserId"
);
