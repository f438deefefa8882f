//! Derived storage names.
//!
//! A storage name is used both as the RBD image name and as the iSCSI
//! target name, so the metadata row, the storage object and the target all
//! agree on one string.

use std::fmt;
use std::str::FromStr;

use crate::{IdError, ImageId};

/// Marker separating the uid segment from the image id segment.
pub const IMAGE_MARKER: &str = "img";

/// A derived `{uid}img{id}` name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StorageName {
    uid: u32,
    image_id: ImageId,
}

impl StorageName {
    /// Derives the storage name for an image row of this deployment.
    #[must_use]
    pub const fn derive(uid: u32, image_id: ImageId) -> Self {
        Self { uid, image_id }
    }

    /// Parses a full derived name, validating both segments.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        if s.is_empty() {
            return Err(IdError::Empty);
        }

        let Some((uid, id)) = s.split_once(IMAGE_MARKER) else {
            return Err(IdError::MissingMarker(s.to_string()));
        };

        if uid.is_empty() || !uid.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IdError::InvalidUid {
                value: uid.to_string(),
            });
        }
        let uid = uid.parse::<u32>().map_err(|_| IdError::InvalidUid {
            value: uid.to_string(),
        })?;

        Ok(Self {
            uid,
            image_id: id.parse()?,
        })
    }

    /// Deployment uid segment.
    #[must_use]
    pub const fn uid(&self) -> u32 {
        self.uid
    }

    /// Image row id segment.
    #[must_use]
    pub const fn image_id(&self) -> ImageId {
        self.image_id
    }
}

impl fmt::Display for StorageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.uid, IMAGE_MARKER, self.image_id)
    }
}

impl FromStr for StorageName {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<StorageName> for String {
    fn from(name: StorageName) -> Self {
        name.to_string()
    }
}

impl serde::Serialize for StorageName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for StorageName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Recovers the image id from a storage or target name.
///
/// Only the text after the first marker is inspected, so names with a
/// non-numeric prefix (for example an externally assigned target prefix)
/// still resolve as long as the suffix is a plain decimal id.
pub fn extract_id(name: &str) -> Result<ImageId, IdError> {
    if name.is_empty() {
        return Err(IdError::Empty);
    }
    let Some(start) = name.find(IMAGE_MARKER) else {
        return Err(IdError::MissingMarker(name.to_string()));
    };
    name[start + IMAGE_MARKER.len()..].parse()
}
