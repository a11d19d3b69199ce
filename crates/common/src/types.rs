use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a UUID-backed identifier newtype.
///
/// Identifiers are handed out by a store when a record is first persisted,
/// so each type only offers `generate` for store implementations and
/// `from_uuid` for rehydration.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a fresh random identifier.
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(
    /// Identifier of an account, unique across the account store.
    AccountId
);

define_id!(
    /// Identifier of an order, unique across the order store.
    OrderId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_distinct() {
        assert_ne!(AccountId::generate(), AccountId::generate());
        assert_ne!(OrderId::generate(), OrderId::generate());
    }

    #[test]
    fn from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        assert_eq!(AccountId::from_uuid(uuid).as_uuid(), uuid);
        assert_eq!(Uuid::from(OrderId::from(uuid)), uuid);
    }

    #[test]
    fn ids_serialize_as_bare_uuid() {
        let uuid = Uuid::new_v4();
        let json = serde_json::to_string(&AccountId::from_uuid(uuid)).unwrap();
        assert_eq!(json, format!("\"{uuid}\""));

        let back: AccountId = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_uuid(), uuid);
    }
}
