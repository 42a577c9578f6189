//! Names used to address entries in an object tree
//!
//! Provides [`ObjectPath`], [`InterfaceName`] and [`PropertyName`]. All three
//! are opaque strings; only [`ObjectPath`] knows anything about its shape, and
//! only enough to answer "is this object under that root".

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

macro_rules! name_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw string without validation
            #[inline]
            #[must_use]
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Borrow the underlying string
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.to_string())
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self(raw)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

name_type! {
    /// Identifier of a remote object, unique within a snapshot
    ///
    /// Usually a slash-separated path such as `/com/example/obj/1`.
    /// Parsing through [`FromStr`] enforces that shape; [`ObjectPath::new`]
    /// accepts anything.
    ObjectPath
}

name_type! {
    /// Name of a property group attached to an object
    InterfaceName
}

name_type! {
    /// Key of a single property within an interface
    PropertyName
}

impl ObjectPath {
    /// The root object path `/`
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Check whether this path is `root` itself or lies beneath it
    ///
    /// Comparison is segment-aware: `/a/bc` is not under `/a/b`.
    #[must_use]
    pub fn is_under(&self, root: &ObjectPath) -> bool {
        if root.0 == "/" {
            return self.0.starts_with('/');
        }
        match self.0.strip_prefix(root.0.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Append a child segment, returning a new path
    #[must_use]
    pub fn child(&self, segment: impl AsRef<str>) -> Self {
        if self.0 == "/" {
            Self(format!("/{}", segment.as_ref()))
        } else {
            Self(format!("{}/{}", self.0, segment.as_ref()))
        }
    }
}

impl FromStr for ObjectPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "/" {
            return Ok(Self::root());
        }
        let Some(rest) = s.strip_prefix('/') else {
            return Err(PathError::NotAbsolute(s.to_string()));
        };
        for segment in rest.split('/') {
            if segment.is_empty() {
                return Err(PathError::EmptySegment(s.to_string()));
            }
            if segment.contains(|c: char| !c.is_ascii_alphanumeric() && c != '_') {
                return Err(PathError::InvalidSegment(segment.to_string()));
            }
        }
        Ok(Self(s.to_string()))
    }
}

/// Errors raised when parsing an [`ObjectPath`]
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    /// Path does not begin with `/`
    #[error("object path '{0}' must start with '/'")]
    NotAbsolute(String),

    /// Path contains `//` or ends with `/`
    #[error("object path '{0}' contains an empty segment")]
    EmptySegment(String),

    /// Segment with characters outside `[A-Za-z0-9_]`
    #[error("invalid segment: {0} (must be ASCII alphanumeric or underscore)")]
    InvalidSegment(String),
}
