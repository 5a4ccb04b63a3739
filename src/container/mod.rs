use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

mod error;
mod utils;

pub use error::{Error, Result};

/// The maximum allowed length for a [`ContainerID`].
const CONTAINER_ID_MAX_LEN: usize = 255;

/// A validated container reference, either a runtime id or a container name.
///
/// # Examples
///
/// ```
/// # use container_identity::container::{ContainerID, Error};
/// let raw_id = "abc123abc123abc123abc123abc123abc123abc123abc123abc123abc123abcd";
/// let container_id = ContainerID::new(raw_id).unwrap();
/// assert_eq!(container_id.as_ref(), "abc123abc123abc123abc123abc123abc123abc123abc123abc123abc123abcd");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerID(Arc<str>);

impl ContainerID {
    /// Creates a new `ContainerID` from the given raw id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidContainerID`] if the input is empty, longer than
    /// [`CONTAINER_ID_MAX_LEN`], or contains characters outside of
    /// `[A-Za-z0-9_.-]` (with an alphanumeric first character).
    ///
    /// # Examples
    ///
    /// ```
    /// # use container_identity::container::ContainerID;
    /// assert!(ContainerID::new("4f1c2a").is_ok());
    /// assert!(ContainerID::new("").is_err());
    /// assert!(ContainerID::new("../etc").is_err());
    /// ```
    pub fn new(src: impl AsRef<str>) -> Result<Self> {
        let src = src.as_ref();
        if src.len() > CONTAINER_ID_MAX_LEN || !utils::is_object_reference(src.as_bytes()) {
            return Err(Error::InvalidContainerID(src.to_owned()));
        }

        Ok(Self(src.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ContainerID {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for ContainerID {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ContainerID {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl serde::Serialize for ContainerID {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

/// A validated image reference as used by the runtime's image store.
///
/// Image ids are compared without their `sha256:` prefix, so `sha256:ab12`
/// and `ab12` refer to the same image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageID(Arc<str>);

impl ImageID {
    pub fn new(src: impl AsRef<str>) -> Result<Self> {
        let src = src.as_ref();
        let bare = utils::strip_digest_prefix(src);
        if bare.len() > CONTAINER_ID_MAX_LEN || !utils::is_object_reference(bare.as_bytes()) {
            return Err(Error::InvalidImageID(src.to_owned()));
        }

        Ok(Self(src.into()))
    }

    /// Returns whether `other` names the same image, ignoring the digest prefix.
    pub fn matches(&self, other: &str) -> bool {
        utils::strip_digest_prefix(&self.0) == utils::strip_digest_prefix(other)
    }
}

impl AsRef<str> for ImageID {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
