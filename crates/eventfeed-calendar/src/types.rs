//! Calendar API types and the flattened feed records built from them.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

// Feed Types

/// Flattened, client-facing record for one event occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventView {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub registration_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub church_center_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<ResolvedTag>,
}

/// Tag as it appears on an [`EventView`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTag {
    pub name: String,
    pub color: Option<String>,
    /// Owning tag group name, `null` when the tag is ungrouped.
    pub group: Option<String>,
}

/// Response envelope handed to the HTTP front door.
///
/// `_cached`/`_cached_at` are only present when the events came from the
/// feed cache and exist for debugging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedResponse {
    pub events: Vec<EventView>,
    #[serde(rename = "_cached", default, skip_serializing_if = "is_false")]
    pub cached: bool,
    #[serde(rename = "_cached_at", default, skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<DateTime<Utc>>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl FeedResponse {
    pub fn fresh(events: Vec<EventView>) -> Self {
        Self {
            events,
            cached: false,
            cached_at: None,
        }
    }

    pub fn cached(events: Vec<EventView>, cached_at: DateTime<Utc>) -> Self {
        Self {
            events,
            cached: true,
            cached_at: Some(cached_at),
        }
    }
}

// Domain Types

/// One scheduled instance of an event (`EventInstance` upstream).
#[derive(Debug, Clone, Default)]
pub struct Occurrence {
    pub id: String,
    pub name: Option<String>,
    pub starts_at: Option<String>,
    pub ends_at: Option<String>,
    pub published_starts_at: Option<String>,
    pub published_ends_at: Option<String>,
    pub location: Option<String>,
    pub church_center_url: Option<String>,
    pub event_id: Option<String>,
}

/// Parent event definition.
#[derive(Debug, Clone, Default)]
pub struct Event {
    pub id: String,
    pub summary: Option<String>,
    pub image_url: Option<String>,
    pub registration_url: Option<String>,
    pub tag_ids: Vec<String>,
}

/// Category label attached to events.
#[derive(Debug, Clone, Default)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub color: Option<String>,
    pub group_id: Option<String>,
}

/// Named bucket of tags.
#[derive(Debug, Clone, Default)]
pub struct TagGroup {
    pub id: String,
    pub name: String,
    pub tag_ids: Vec<String>,
}

/// Occurrences plus the related records returned inline with them.
#[derive(Debug, Clone, Default)]
pub struct OccurrenceGraph {
    pub occurrences: Vec<Occurrence>,
    pub events: Vec<Event>,
    pub tags: Vec<Tag>,
}

impl OccurrenceGraph {
    /// Split a fetched document into occurrences and their included records.
    ///
    /// Included records of any type other than `Event` or `Tag` are ignored.
    pub fn from_document(document: Document) -> Self {
        let occurrences = document
            .data
            .into_vec()
            .into_iter()
            .map(Occurrence::from)
            .collect();

        let mut events = Vec::new();
        let mut tags = Vec::new();
        for resource in document.included {
            match resource.kind.as_str() {
                "Event" => events.push(Event::from(resource)),
                "Tag" => tags.push(Tag::from(resource)),
                _ => {}
            }
        }

        Self {
            occurrences,
            events,
            tags,
        }
    }
}

// API Response Types

/// JSON:API top-level document.
#[derive(Debug, Deserialize)]
pub struct Document {
    pub data: PrimaryData,
    #[serde(default)]
    pub included: Vec<Resource>,
    #[serde(default)]
    pub links: Links,
}

/// `data` is an array for collections and a bare object for single fetches.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PrimaryData {
    Many(Vec<Resource>),
    One(Box<Resource>),
}

impl PrimaryData {
    pub fn into_vec(self) -> Vec<Resource> {
        match self {
            PrimaryData::Many(resources) => resources,
            PrimaryData::One(resource) => vec![*resource],
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Links {
    pub next: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Resource {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    #[serde(default)]
    pub attributes: serde_json::Value,
    #[serde(default)]
    pub relationships: HashMap<String, Relationship>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Relationship {
    #[serde(default)]
    pub data: Option<Linkage>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Linkage {
    Many(Vec<ResourceIdentifier>),
    One(ResourceIdentifier),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceIdentifier {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub id: String,
}

impl Resource {
    /// Typed view of `attributes`; malformed attributes fall back to defaults.
    fn attributes<T: DeserializeOwned + Default>(&self) -> T {
        serde_json::from_value(self.attributes.clone()).unwrap_or_else(|e| {
            tracing::debug!("Ignoring malformed attributes on {} {}: {}", self.kind, self.id, e);
            T::default()
        })
    }

    fn related_id(&self, name: &str) -> Option<String> {
        match self.relationships.get(name)?.data.as_ref()? {
            Linkage::One(identifier) => Some(identifier.id.clone()),
            Linkage::Many(identifiers) => identifiers.first().map(|i| i.id.clone()),
        }
    }

    fn related_ids(&self, name: &str) -> Vec<String> {
        match self.relationships.get(name).and_then(|r| r.data.as_ref()) {
            Some(Linkage::Many(identifiers)) => identifiers.iter().map(|i| i.id.clone()).collect(),
            Some(Linkage::One(identifier)) => vec![identifier.id.clone()],
            None => Vec::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct OccurrenceAttributes {
    name: Option<String>,
    starts_at: Option<String>,
    ends_at: Option<String>,
    published_starts_at: Option<String>,
    published_ends_at: Option<String>,
    location: Option<String>,
    church_center_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct EventAttributes {
    summary: Option<String>,
    image_url: Option<String>,
    registration_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TagAttributes {
    name: Option<String>,
    color: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TagGroupAttributes {
    name: Option<String>,
}

impl From<Resource> for Occurrence {
    fn from(resource: Resource) -> Self {
        let attrs: OccurrenceAttributes = resource.attributes();
        Self {
            event_id: resource.related_id("event"),
            id: resource.id,
            name: attrs.name,
            starts_at: attrs.starts_at,
            ends_at: attrs.ends_at,
            published_starts_at: attrs.published_starts_at,
            published_ends_at: attrs.published_ends_at,
            location: attrs.location,
            church_center_url: attrs.church_center_url,
        }
    }
}

impl From<Resource> for Event {
    fn from(resource: Resource) -> Self {
        let attrs: EventAttributes = resource.attributes();
        Self {
            tag_ids: resource.related_ids("tags"),
            id: resource.id,
            summary: attrs.summary,
            image_url: attrs.image_url,
            registration_url: attrs.registration_url,
        }
    }
}

impl From<Resource> for Tag {
    fn from(resource: Resource) -> Self {
        let attrs: TagAttributes = resource.attributes();
        Self {
            group_id: resource.related_id("tag_group"),
            id: resource.id,
            name: attrs.name.unwrap_or_default(),
            color: attrs.color,
        }
    }
}

impl From<Resource> for TagGroup {
    fn from(resource: Resource) -> Self {
        let attrs: TagGroupAttributes = resource.attributes();
        Self {
            tag_ids: resource.related_ids("tags"),
            id: resource.id,
            name: attrs.name.unwrap_or_default(),
        }
    }
}
