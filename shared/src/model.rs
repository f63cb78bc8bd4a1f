use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Server-assigned identity of a collection item.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn from_position(index: usize) -> Self {
        Self(index.to_string())
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One record of a remote collection. Attribute shape depends on the
/// resource (word/meaning/..., question/options/..., sentence/missingWord/...).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollectionItem {
    pub id: ItemId,
    pub attributes: Map<String, Value>,
}

impl CollectionItem {
    pub fn new(id: impl Into<ItemId>, attributes: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            attributes,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Items of one collection in server order. Identifiers are unique.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    items: Vec<CollectionItem>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a collection keeping the first occurrence of each id. Returns
    /// the collection and how many duplicates were dropped.
    pub fn from_items(items: impl IntoIterator<Item = CollectionItem>) -> (Self, usize) {
        let mut seen = HashSet::new();
        let mut dropped = 0;
        let mut kept = Vec::new();
        for item in items {
            if seen.insert(item.id.clone()) {
                kept.push(item);
            } else {
                dropped += 1;
            }
        }
        (Self { items: kept }, dropped)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CollectionItem> {
        self.items.iter()
    }

    pub fn items(&self) -> &[CollectionItem] {
        &self.items
    }

    pub fn get(&self, id: &ItemId) -> Option<&CollectionItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    pub fn position(&self, id: &ItemId) -> Option<usize> {
        self.items.iter().position(|item| &item.id == id)
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.position(id).is_some()
    }

    /// Appends unless an item with the same id is already present.
    pub fn push_unique(&mut self, item: CollectionItem) -> bool {
        if self.contains(&item.id) {
            return false;
        }
        self.items.push(item);
        true
    }

    /// Replaces the item with `id` in place, keeping its index.
    pub fn replace(&mut self, id: &ItemId, item: CollectionItem) -> bool {
        match self.position(id) {
            Some(index) => {
                self.items[index] = item;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &ItemId) -> Option<CollectionItem> {
        let index = self.position(id)?;
        Some(self.items.remove(index))
    }

    /// Re-derives ids from indices for position-addressed collections.
    pub(crate) fn renumber(&mut self) {
        for (index, item) in self.items.iter_mut().enumerate() {
            item.id = ItemId::from_position(index);
        }
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a CollectionItem;
    type IntoIter = std::slice::Iter<'a, CollectionItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Binary file submitted alongside text fields (multipart).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    #[serde(with = "serde_bytes")]
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(
        field: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            field: field.into(),
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("field", &self.field)
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Form submission for add/update intents.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub fields: BTreeMap<String, Value>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), Value::String(value.into()));
        self
    }

    pub fn with_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.retain(|a| a.field != attachment.field);
        self.attachments.push(attachment);
        self
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn attachment(&self, field: &str) -> Option<&Attachment> {
        self.attachments.iter().find(|a| a.field == field)
    }

    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}
