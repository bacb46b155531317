//! Branded ID newtypes for type-safe identifier handling.
//!
//! Each ID type wraps a `String` and serializes transparently, so the wire
//! format stays a plain JSON string while the Rust side gets compile-time
//! separation between session and office identifiers.
//!
//! Generated IDs carry a short prefix (`sess_`, `ofi_`) followed by a UUID v7,
//! which keeps them time-ordered and grep-friendly in logs and the database.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generate a new UUID v7 string (time-ordered).
fn new_v7() -> String {
    Uuid::now_v7().to_string()
}

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID with a freshly generated UUID v7.
            #[must_use]
            pub fn new() -> Self {
                Self(format!("{}{}", $prefix, new_v7()))
            }

            /// Wrap an existing string as this ID type.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Get the inner string as a str reference.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the ID and return the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Unique identifier for a queue session.
    SessionId, "sess_"
}

branded_id! {
    /// Identifier for a notary office. Usually assigned by the caller
    /// (e.g. `"ofi_centro"`); `new()` generates one for tests and tooling.
    OfficeId, "ofi_"
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
