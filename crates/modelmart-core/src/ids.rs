//! Identifier types for modelmart.
//!
//! Accounts and models are keyed by UUIDs. Everything that is appended over
//! time (usage events, transfers, ledger entries) is keyed by a ULID so that
//! byte order of the key equals creation order.

use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, OnceLock};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::{Generator, Ulid};

/// Process-wide ULID source; IDs generated within one millisecond still sort
/// in generation order.
fn monotonic_ulid() -> Ulid {
    static GENERATOR: OnceLock<Mutex<Generator>> = OnceLock::new();
    GENERATOR
        .get_or_init(|| Mutex::new(Generator::new()))
        .lock()
        .ok()
        .and_then(|mut generator| generator.generate().ok())
        .unwrap_or_else(Ulid::new)
}

/// Text form shared by every identifier: parsing, display, and string serde.
macro_rules! id_text_impls {
    ($name:ident, $inner:ty, $parse:expr) => {
        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let parse: fn(&str) -> Result<$inner, IdError> = $parse;
                parse(s).map(Self)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.to_string()
            }
        }
    };
}

/// Defines a UUID-backed identifier with string serde, parsing and display.
macro_rules! uuid_id_type {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Create a new identifier from a UUID.
            #[must_use]
            pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Generate a new random identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Return the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }

            /// Return the bytes of the UUID (16 bytes).
            #[must_use]
            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }

            /// Create an identifier from its 16 byte representation.
            #[must_use]
            pub const fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(uuid::Uuid::from_bytes(bytes))
            }
        }

        id_text_impls!($name, uuid::Uuid, |s| {
            uuid::Uuid::parse_str(s).map_err(|_| IdError::InvalidUuid)
        });
    };
}

/// Defines a ULID-backed identifier with string serde and byte conversion.
macro_rules! ulid_id_type {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(Ulid);

        impl $name {
            /// Generate a new identifier with the current timestamp.
            #[must_use]
            pub fn generate() -> Self {
                Self(monotonic_ulid())
            }

            /// Return the underlying ULID.
            #[must_use]
            pub const fn as_ulid(&self) -> &Ulid {
                &self.0
            }

            /// Return the bytes of the ULID (16 bytes).
            #[must_use]
            pub fn to_bytes(&self) -> [u8; 16] {
                self.0.to_bytes()
            }

            /// Create an identifier from its 16 byte representation.
            #[must_use]
            pub fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(Ulid::from_bytes(bytes))
            }
        }

        id_text_impls!($name, Ulid, |s| {
            Ulid::from_string(s).map_err(|_| IdError::InvalidUlid)
        });
    };
}

uuid_id_type!(AccountId, "A balance-holding account identifier (UUID).\n\nAn account is charged when it calls a model and paid when it owns one.");
uuid_id_type!(ModelId, "An uploaded model identifier (UUID).");

ulid_id_type!(TransferId, "Identifier of one ledger transfer (ULID).");
ulid_id_type!(EntryId, "Identifier of one ledger journal entry (ULID).");
ulid_id_type!(EventId, "Identifier of one usage event (ULID).\n\nThe timestamp component is the event timestamp, so index scans in key order return events in time order.");

impl EventId {
    /// Create an event identifier whose time component is `timestamp`.
    #[must_use]
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self(Ulid::from_datetime(SystemTime::from(timestamp)))
    }

    /// The lowest identifier that can carry the given millisecond timestamp.
    #[must_use]
    pub fn lower_bound(timestamp_ms: u64) -> Self {
        Self(Ulid::from_parts(timestamp_ms, 0))
    }

    /// The highest identifier that can carry the given millisecond timestamp.
    #[must_use]
    pub fn upper_bound(timestamp_ms: u64) -> Self {
        Self(Ulid::from_parts(timestamp_ms, u128::MAX))
    }

    /// Millisecond timestamp encoded in the identifier.
    #[must_use]
    pub fn timestamp_ms(&self) -> u64 {
        self.0.timestamp_ms()
    }
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input is not a valid UUID.
    #[error("invalid UUID format")]
    InvalidUuid,

    /// The input is not a valid ULID.
    #[error("invalid ULID format")]
    InvalidUlid,
}
