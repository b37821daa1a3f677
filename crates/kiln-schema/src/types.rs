//! Identifier newtypes. Each serializes as a plain string.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
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

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_newtype!(
    /// Full 64-character hex package identifier, derived from recipe identity,
    /// settings, and resolved options.
    PackageId
);

string_newtype!(
    /// Truncated 12-character prefix of a [`PackageId`], used for display.
    ShortId
);

string_newtype!(
    /// A pinned source revision: a git commit hash or a local tree digest.
    Revision
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_id_display_and_as_ref() {
        let id = PackageId::new("abc123");
        assert_eq!(id.to_string(), "abc123");
        assert_eq!(id.as_str(), "abc123");
        assert_eq!(AsRef::<str>::as_ref(&id), "abc123");
    }

    #[test]
    fn package_id_serializes_as_plain_string() {
        let id = PackageId::new("deadbeef");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"deadbeef\"");
        let back: PackageId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn short_id_from_str() {
        let sid = ShortId::from("abc123def456");
        assert_eq!(sid, "abc123def456");
    }

    #[test]
    fn revision_derefs_to_str() {
        let rev = Revision::new("0f1e2d".to_owned());
        assert!(rev.starts_with("0f1"));
        assert_eq!(rev.len(), 6);
    }
}
