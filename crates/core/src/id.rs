// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ID generation abstractions

/// Trait for truncating identifiers to a short prefix.
pub trait ShortId {
    /// Returns a string slice truncated to at most `n` characters.
    fn short(&self, n: usize) -> &str;
}

impl ShortId for str {
    fn short(&self, n: usize) -> &str {
        if self.len() <= n {
            self
        } else {
            &self[..n]
        }
    }
}

/// Define a newtype ID wrapper around `String`.
///
/// Generates `new()`, `as_str()`, `short()`, `Display`, `From<String>`, `From<&str>`,
/// `PartialEq<str>`, `PartialEq<&str>`, and `Borrow<str>` implementations.
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns a string slice truncated to at most `n` characters.
            pub fn short(&self, n: usize) -> &str {
                if self.0.len() <= n {
                    &self.0
                } else {
                    &self.0[..n]
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
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

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id! {
    /// Stable identifier for one process lifetime of an agent.
    ///
    /// Changes across restarts of the same agent name; the registry uses it
    /// to decide registration races (spec read-back) and first-contact
    /// detection in the inbox.
    pub struct SessionId;
}

impl SessionId {
    /// Generate a fresh session identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

define_id! {
    /// Unique identifier for a single message.
    pub struct MessageId;
}

impl MessageId {
    /// Generate a fresh message identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
