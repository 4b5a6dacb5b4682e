//! Dataflow catalogue: descriptors, decoding and the per-run memoized store.

use std::fmt::{self, Formatter};
use std::sync::OnceLock;

use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::cache::{CacheError, RawCache, CATALOGUE_KEY};

pub const DEFAULT_LANG: &str = "en";

/// A single language-tagged string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedValue {
    #[serde(default)]
    pub lang: String,
    pub value: String,
}

/// Ordered language → text pairs.
///
/// Decodes from a JSON object (`{"en": "..."}`, document order kept), from a
/// list of `{lang, value}` pairs, or from a bare string whose language is
/// unknown. `null` decodes as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LocalizedText(Vec<LocalizedValue>);

impl LocalizedText {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(lang, value)| LocalizedValue {
                    lang: lang.to_string(),
                    value: value.to_string(),
                })
                .collect(),
        )
    }

    /// Text in exactly `lang`, skipping blank values.
    pub fn get(&self, lang: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|entry| entry.lang == lang && !entry.value.trim().is_empty())
            .map(|entry| entry.value.as_str())
    }

    /// First non-blank text in document order.
    pub fn first(&self) -> Option<&str> {
        self.0
            .iter()
            .find(|entry| !entry.value.trim().is_empty())
            .map(|entry| entry.value.as_str())
    }

    /// `lang` when present, otherwise the first available text.
    pub fn resolve(&self, lang: &str) -> Option<&str> {
        self.get(lang).or_else(|| self.first())
    }

    /// `lang` when present, otherwise text whose language is unknown.
    pub fn get_or_unlabelled(&self, lang: &str) -> Option<&str> {
        self.get(lang).or_else(|| self.get(""))
    }

    pub fn is_empty(&self) -> bool {
        self.first().is_none()
    }
}

impl<'de> Deserialize<'de> for LocalizedText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(LocalizedTextVisitor)
    }
}

struct LocalizedTextVisitor;

impl<'de> Visitor<'de> for LocalizedTextVisitor {
    type Value = LocalizedText;

    fn expecting(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("a language map, a list of {lang, value} pairs, or a string")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut values = Vec::with_capacity(map.size_hint().unwrap_or(1));
        while let Some((lang, value)) = map.next_entry::<String, String>()? {
            values.push(LocalizedValue { lang, value });
        }
        Ok(LocalizedText(values))
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut values = Vec::with_capacity(seq.size_hint().unwrap_or(1));
        while let Some(value) = seq.next_element::<LocalizedValue>()? {
            values.push(value);
        }
        Ok(LocalizedText(values))
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(LocalizedText(vec![LocalizedValue {
            lang: String::new(),
            value: value.to_string(),
        }]))
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(LocalizedText::default())
    }

    fn visit_none<E>(self) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(LocalizedText::default())
    }
}

/// One catalogue entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataflowDescriptor {
    pub id: String,
    #[serde(default, rename = "agencyID", skip_serializing_if = "Option::is_none")]
    pub agency_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub names: LocalizedText,
    #[serde(default)]
    pub description: LocalizedText,
}

impl DataflowDescriptor {
    /// Descriptor carrying nothing but the id, used when the catalogue has no entry.
    pub fn synthetic(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            agency_id: None,
            version: None,
            names: LocalizedText::default(),
            description: LocalizedText::default(),
        }
    }

    /// Name in `lang`, else the first listed name, else the id. Never empty.
    pub fn display_name(&self, lang: &str) -> &str {
        self.names.resolve(lang).unwrap_or(&self.id)
    }

    /// Description in `lang` only; other languages are never substituted.
    pub fn description_text(&self, lang: &str) -> Option<&str> {
        self.description.get_or_unlabelled(lang)
    }
}

#[derive(Debug, Default, Deserialize)]
struct CatalogueMessage {
    #[serde(default)]
    data: CatalogueData,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogueData {
    #[serde(default)]
    dataflows: Vec<DataflowDescriptor>,
}

/// Extracts `data.dataflows` from an SDMX structure message.
pub fn parse_catalogue(message: &Value) -> Result<Vec<DataflowDescriptor>, serde_json::Error> {
    let message = CatalogueMessage::deserialize(message)?;
    Ok(message.data.dataflows)
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read cached catalogue: {0}")]
    Cache(#[from] CacheError),

    #[error("cached catalogue is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Catalogue read from the raw cache at most once per store.
#[derive(Debug)]
pub struct CatalogStore {
    cache: RawCache,
    entries: OnceLock<Vec<DataflowDescriptor>>,
}

impl CatalogStore {
    pub fn new(cache: RawCache) -> Self {
        Self {
            cache,
            entries: OnceLock::new(),
        }
    }

    /// All descriptors. A catalogue that was never cached loads as empty.
    pub fn load_catalogue(&self) -> Result<&[DataflowDescriptor], CatalogError> {
        if let Some(entries) = self.entries.get() {
            return Ok(entries);
        }

        let loaded = match self.cache.load_json::<Value>(CATALOGUE_KEY) {
            Ok(message) => parse_catalogue(&message)?,
            Err(error) if error.is_not_found() => {
                tracing::debug!("no cached catalogue; continuing with an empty one");
                Vec::new()
            }
            Err(CacheError::Serialization(error)) => return Err(CatalogError::Malformed(error)),
            Err(error) => return Err(error.into()),
        };

        Ok(self.entries.get_or_init(|| loaded))
    }

    pub fn get_descriptor(&self, id: &str) -> Result<Option<&DataflowDescriptor>, CatalogError> {
        Ok(self
            .load_catalogue()?
            .iter()
            .find(|descriptor| descriptor.id == id))
    }

    /// Catalogue entry for `id`, or a synthetic one derived from the id.
    pub fn describe(&self, id: &str) -> Result<DataflowDescriptor, CatalogError> {
        Ok(self
            .get_descriptor(id)?
            .cloned()
            .unwrap_or_else(|| DataflowDescriptor::synthetic(id)))
    }

    pub fn get_display_name(&self, id: &str, lang: &str) -> Result<String, CatalogError> {
        Ok(match self.get_descriptor(id)? {
            Some(descriptor) => descriptor.display_name(lang).to_string(),
            None => id.to_string(),
        })
    }

    pub fn get_description(&self, id: &str, lang: &str) -> Result<Option<String>, CatalogError> {
        Ok(self
            .get_descriptor(id)?
            .and_then(|descriptor| descriptor.description_text(lang))
            .map(str::to_string))
    }
}
