// ABOUTME: Validated container image names as listed in the images section.
// ABOUTME: Validates registry/repository:tag@digest spellings and orders names for stable cache keys.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageNameError {
    #[error("image name cannot be empty")]
    Empty,

    #[error("invalid character {1:?} in image name {0:?}")]
    InvalidChar(String, char),

    #[error("image name {0:?} has an empty path component")]
    EmptyComponent(String),

    #[error("image name {0:?} has an empty tag")]
    EmptyTag(String),
}

/// A container image reference such as `nginx:1.25` or
/// `registry.local:5000/team/app@sha256:...`.
///
/// The original spelling is kept verbatim because it is what the runtime is
/// asked to pull and export; parsing only validates it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageName {
    raw: String,
}

impl ImageName {
    pub fn parse(input: &str) -> Result<Self, ImageNameError> {
        let raw = input.trim();
        if raw.is_empty() {
            return Err(ImageNameError::Empty);
        }

        if let Some(c) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '/' | ':' | '.' | '-' | '_' | '@')))
        {
            return Err(ImageNameError::InvalidChar(raw.to_string(), c));
        }

        let before_digest = raw.split_once('@').map_or(raw, |(name, _)| name);

        // A colon after the last slash separates the tag; earlier colons belong
        // to a registry port.
        let last_slash = before_digest.rfind('/');
        let tag_start = before_digest
            .rfind(':')
            .filter(|colon| last_slash.is_none_or(|slash| *colon > slash));

        let path = &before_digest[..tag_start.unwrap_or(before_digest.len())];
        if path.split('/').any(str::is_empty) {
            return Err(ImageNameError::EmptyComponent(raw.to_string()));
        }
        if let Some(start) = tag_start
            && start + 1 == before_digest.len()
        {
            return Err(ImageNameError::EmptyTag(raw.to_string()));
        }

        Ok(Self {
            raw: raw.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for ImageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl AsRef<str> for ImageName {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

impl Serialize for ImageName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for ImageName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ImageName::parse(&s).map_err(serde::de::Error::custom)
    }
}
