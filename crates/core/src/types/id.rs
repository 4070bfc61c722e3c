//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types. The backend store
//! generates UUID primary keys, so every ID wraps a [`uuid::Uuid`].

use serde::{Deserialize, Serialize};

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `Uuid` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `PartialOrd`, `Ord`, `Hash`
/// - Conversion methods: `new()`, `as_uuid()`, `generate()`
/// - `From<Uuid>` and `Into<Uuid>` implementations
/// - `Display` and `FromStr` via the canonical hyphenated form
///
/// # Example
///
/// ```rust
/// # use portal_sete_core::define_id;
/// define_id!(UserId);
/// define_id!(OrderId);
///
/// let user_id = UserId::generate();
/// let order_id = OrderId::generate();
///
/// // These are different types, so this won't compile:
/// // let _: UserId = order_id;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(::uuid::Uuid);

        impl $name {
            /// Create a new ID from a UUID value.
            #[must_use]
            pub const fn new(id: ::uuid::Uuid) -> Self {
                Self(id)
            }

            /// Generate a fresh random (v4) ID.
            #[must_use]
            pub fn generate() -> Self {
                Self(::uuid::Uuid::new_v4())
            }

            /// Get the underlying UUID value.
            #[must_use]
            pub const fn as_uuid(&self) -> ::uuid::Uuid {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ::uuid::Error;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }

        impl From<::uuid::Uuid> for $name {
            fn from(id: ::uuid::Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for ::uuid::Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

// Define standard entity IDs
define_id!(UserId);
define_id!(ProductId);
define_id!(OrderId);
define_id!(OrderItemId);
define_id!(ProductFileId);
define_id!(SectionId);
define_id!(SiteConfigId);

impl OrderId {
    /// Short reference code shown to shoppers (first 8 hex characters,
    /// uppercase), e.g. `#3F2A9B10`.
    #[must_use]
    pub fn short_code(&self) -> String {
        let simple = self.0.simple().to_string();
        simple.chars().take(8).collect::<String>().to_uppercase()
    }
}

/// A payment identifier issued by the external gateway.
///
/// This is an opaque token, not a UUID, so it gets its own wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(String);

impl PaymentId {
    /// Create a new payment ID from the gateway's token.
    #[must_use]
    pub const fn new(id: String) -> Self {
        Self(id)
    }

    /// Get the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PaymentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PaymentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_distinct_types() {
        let id = uuid::Uuid::new_v4();
        let user = UserId::new(id);
        let order = OrderId::new(id);
        assert_eq!(user.as_uuid(), order.as_uuid());
    }

    #[test]
    fn test_display_matches_uuid() {
        let raw = uuid::Uuid::new_v4();
        let id = ProductId::new(raw);
        assert_eq!(id.to_string(), raw.to_string());
    }

    #[test]
    fn test_from_str_roundtrip() {
        let id = OrderId::generate();
        let parsed: OrderId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_serde_transparent() {
        let id = ProductId::generate();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let back: ProductId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_ids_order_like_their_uuids() {
        // Ids are used as ordered-map keys, so they must sort.
        let a: ProductId = "00000000-0000-4000-8000-000000000001".parse().unwrap();
        let b: ProductId = "00000000-0000-4000-8000-000000000002".parse().unwrap();
        assert!(a < b);

        let mut grouped = std::collections::BTreeMap::new();
        grouped.insert(b, "second");
        grouped.insert(a, "first");
        assert_eq!(grouped.values().copied().collect::<Vec<_>>(), ["first", "second"]);
    }

    #[test]
    fn test_order_short_code() {
        let id: OrderId = "3f2a9b10-0000-4000-8000-000000000000".parse().unwrap();
        assert_eq!(id.short_code(), "3F2A9B10");
    }

    #[test]
    fn test_payment_id_is_opaque() {
        let id = PaymentId::new("123456789-MP".to_string());
        assert_eq!(id.as_str(), "123456789-MP");
        assert_eq!(id.to_string(), "123456789-MP");
    }
}
