//! Listing image normalization.
//!
//! A listing stores its images in two columns: `image_urls`, a nullable text
//! column holding a JSON array of URLs, and `primary_image_url`, the
//! denormalized default image chosen at write time. Rows written by older
//! clients may hold a bare URL string instead of an array, so reads accept
//! every historical shape and never fail.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Image references as supplied by a caller, resolved once at the request boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ImageInput {
    #[default]
    Absent,
    Single(String),
    Many(Vec<String>),
}

impl ImageInput {
    /// Anything that is not a string or an array of strings counts as absent.
    pub fn from_json(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(url)) => ImageInput::Single(url.clone()),
            Some(Value::Array(items)) => {
                let urls: Option<Vec<String>> = items
                    .iter()
                    .map(|item| item.as_str().map(str::to_string))
                    .collect();
                urls.map(ImageInput::Many).unwrap_or(ImageInput::Absent)
            }
            _ => ImageInput::Absent,
        }
    }

    /// The ordered URLs this input denotes.
    pub fn urls(&self) -> Vec<String> {
        match self {
            ImageInput::Absent => Vec::new(),
            ImageInput::Single(url) if url.trim().is_empty() => Vec::new(),
            ImageInput::Single(url) => vec![url.clone()],
            ImageInput::Many(urls) => urls.clone(),
        }
    }
}

impl<'de> Deserialize<'de> for ImageInput {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(ImageInput::from_json(Some(&value)))
    }
}

/// Raw `image_urls` value as read from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistedImages {
    Null,
    Text(String),
    /// The driver already deserialized the column.
    Structured(Vec<String>),
    Other,
}

impl From<Option<String>> for PersistedImages {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(text) => PersistedImages::Text(text),
            None => PersistedImages::Null,
        }
    }
}

impl From<Option<&str>> for PersistedImages {
    fn from(value: Option<&str>) -> Self {
        value.map(str::to_string).into()
    }
}

impl From<Value> for PersistedImages {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => PersistedImages::Null,
            Value::String(text) => PersistedImages::Text(text),
            Value::Array(items) => {
                let urls: Option<Vec<String>> = items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(url) => Some(url),
                        _ => None,
                    })
                    .collect();
                urls.map(PersistedImages::Structured)
                    .unwrap_or(PersistedImages::Other)
            }
            _ => PersistedImages::Other,
        }
    }
}

/// Stored text that looks like a JSON array but does not parse as one.
#[derive(Debug, thiserror::Error)]
#[error("malformed image_urls value {raw:?}: {source}")]
pub struct MalformedPersistedValue {
    pub raw: String,
    #[source]
    pub source: serde_json::Error,
}

#[derive(Debug)]
pub enum Decoded {
    Parsed(Vec<String>),
    Fallback {
        images: Vec<String>,
        diagnostic: MalformedPersistedValue,
    },
}

impl Decoded {
    pub fn into_images(self) -> Vec<String> {
        match self {
            Decoded::Parsed(images) => images,
            Decoded::Fallback { images, diagnostic } => {
                tracing::warn!(error = %diagnostic, "falling back to empty image list");
                images
            }
        }
    }
}

/// Persisted form of caller input: `None` when there are no images.
pub fn encode(input: &ImageInput) -> Option<String> {
    let urls = input.urls();
    if urls.is_empty() {
        return None;
    }
    serde_json::to_string(&urls).ok()
}

pub fn decode_detailed(value: PersistedImages) -> Decoded {
    match value {
        PersistedImages::Null | PersistedImages::Other => Decoded::Parsed(Vec::new()),
        PersistedImages::Structured(images) => Decoded::Parsed(images),
        PersistedImages::Text(text) if text.is_empty() => Decoded::Parsed(Vec::new()),
        PersistedImages::Text(text) => {
            if !text.trim_start().starts_with('[') {
                return Decoded::Parsed(vec![text]);
            }
            match serde_json::from_str::<Vec<String>>(&text) {
                Ok(images) => Decoded::Parsed(images),
                Err(source) => Decoded::Fallback {
                    images: Vec::new(),
                    diagnostic: MalformedPersistedValue { raw: text, source },
                },
            }
        }
    }
}

/// Ordered image URLs for a stored value. Never fails; malformed values are
/// logged and read as empty.
pub fn decode(value: impl Into<PersistedImages>) -> Vec<String> {
    decode_detailed(value.into()).into_images()
}

pub fn resolve_primary(images: &[String], explicit: Option<&str>) -> Option<String> {
    match explicit {
        Some(primary) if !primary.is_empty() => Some(primary.to_string()),
        _ => images.first().cloned(),
    }
}

/// A listing's images plus its default image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageSet {
    pub images: Vec<String>,
    pub primary: Option<String>,
}

impl ImageSet {
    /// Write side: resolves the primary from the explicit value or the first image.
    pub fn from_input(input: &ImageInput, explicit_primary: Option<&str>) -> Self {
        let images = input.urls();
        let primary = resolve_primary(&images, explicit_primary);
        Self { images, primary }
    }

    /// Read side: the stored primary is passed through unchanged.
    pub fn from_persisted(raw: impl Into<PersistedImages>, primary: Option<String>) -> Self {
        Self {
            images: decode(raw),
            primary,
        }
    }

    /// Value for the `image_urls` column.
    pub fn encoded_images(&self) -> Option<String> {
        encode(&ImageInput::Many(self.images.clone()))
    }
}
