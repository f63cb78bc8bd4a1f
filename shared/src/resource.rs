//! Content types as data.
//!
//! A [`ResourceDescriptor`] says where a collection lives on the content API,
//! how its list and item responses are shaped, how items are identified, and
//! how submissions are encoded. Stores are generic over descriptors.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::capabilities::{ApiRequest, Method, MAX_REQUEST_BODY_SIZE};
use crate::config::ApiConfig;
use crate::error::SyncError;
use crate::form::{self, FormSpec};
use crate::model::{CollectionItem, ItemId, Payload};
use crate::multipart;

use Segment::{Id, Key, Level, Lit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Vocabulary,
    Categories,
    Quizzes,
    FillBlanks,
    Conversations,
}

impl ResourceKind {
    pub fn descriptor(self) -> &'static ResourceDescriptor {
        match self {
            Self::Vocabulary => &VOCABULARY,
            Self::Categories => &CATEGORIES,
            Self::Quizzes => &QUIZZES,
            Self::FillBlanks => &FILL_BLANKS,
            Self::Conversations => &CONVERSATIONS,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Vocabulary => "vocabulary",
            Self::Categories => "categories",
            Self::Quizzes => "quizzes",
            Self::FillBlanks => "fill-blanks",
            Self::Conversations => "conversations",
        };
        f.write_str(name)
    }
}

/// One path segment of a URL template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Lit(&'static str),
    /// The collection key (category name, topic id).
    Key,
    /// The practice level name.
    Level,
    /// The item identifier.
    Id,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PathParams<'a> {
    pub key: &'a str,
    pub level: Option<&'a str>,
    pub id: Option<&'a ItemId>,
}

impl<'a> PathParams<'a> {
    pub fn key(key: &'a str) -> Self {
        Self {
            key,
            ..Self::default()
        }
    }

    pub fn with_level(mut self, level: &'a str) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_id(mut self, id: &'a ItemId) -> Self {
        self.id = Some(id);
        self
    }
}

pub fn render_path(template: &[Segment], params: &PathParams<'_>) -> Result<Vec<String>, SyncError> {
    template
        .iter()
        .map(|segment| match segment {
            Segment::Lit(s) => Ok((*s).to_string()),
            Segment::Key => non_blank(params.key, "Collection key"),
            Segment::Level => non_blank(params.level.unwrap_or_default(), "Level name"),
            Segment::Id => non_blank(params.id.map(ItemId::as_str).unwrap_or_default(), "Item id"),
        })
        .collect()
}

fn non_blank(value: &str, field: &str) -> Result<String, SyncError> {
    if value.trim().is_empty() {
        Err(SyncError::validation(field, "is required"))
    } else {
        Ok(value.to_string())
    }
}

/// Where the list lives in a GET response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListShape {
    /// The body is the array.
    Array,
    /// The array sits under a field of the body object. Missing means empty.
    Field(&'static str),
    /// The body is an object; each key is one item named by that key.
    ObjectKeys,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    /// Identifier read from an attribute of the item.
    Field(&'static str),
    /// Identifier is the item's index in server order.
    Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEncoding {
    Json,
    Multipart,
}

#[derive(Debug)]
pub struct ResourceDescriptor {
    pub kind: ResourceKind,
    pub list_path: &'static [Segment],
    pub create_path: &'static [Segment],
    pub item_path: &'static [Segment],
    pub list_shape: ListShape,
    /// Field wrapping the canonical item in create/update responses.
    pub envelope: Option<&'static str>,
    pub identity: Identity,
    pub encoding: BodyEncoding,
    pub add_form: FormSpec,
    pub edit_form: FormSpec,
    /// Update field that renames the item, changing its identity.
    pub rename_field: Option<&'static str>,
}

impl ResourceDescriptor {
    pub fn is_positional(&self) -> bool {
        self.identity == Identity::Position
    }

    /// Builds a request for `template`, with `payload` encoded as the body.
    pub fn request(
        &self,
        config: &ApiConfig,
        method: Method,
        template: &[Segment],
        params: &PathParams<'_>,
        payload: Option<&Payload>,
    ) -> Result<ApiRequest, SyncError> {
        let url = config.endpoint(render_path(template, params)?)?;
        let mut request = ApiRequest::new(method, url).with_header("Accept", "application/json");

        if let Some(payload) = payload {
            let (body, content_type) = self.encode(payload)?;
            request = request.with_body(body, content_type);
        }
        Ok(request)
    }

    /// Encodes `payload` as the request body, returning it with its content
    /// type.
    pub fn encode(&self, payload: &Payload) -> Result<(Vec<u8>, String), SyncError> {
        if self.encoding == BodyEncoding::Multipart || payload.has_attachments() {
            let form = multipart::encode(payload)?;
            Ok((form.body, form.content_type))
        } else {
            let body = serde_json::to_vec(&payload.to_json()).map_err(|e| {
                SyncError::InvalidRequest {
                    reason: e.to_string(),
                }
            })?;
            if body.len() > MAX_REQUEST_BODY_SIZE {
                return Err(SyncError::InvalidRequest {
                    reason: format!("body exceeds {MAX_REQUEST_BODY_SIZE} bytes"),
                });
            }
            Ok((body, "application/json".to_string()))
        }
    }

    /// Decodes a list response. An empty body is an empty list.
    pub fn decode_list(&self, body: Option<&Value>) -> Result<Vec<CollectionItem>, SyncError> {
        let Some(body) = body else {
            return Ok(Vec::new());
        };

        match self.list_shape {
            ListShape::Array => {
                let entries = body
                    .as_array()
                    .ok_or_else(|| SyncError::invalid_response("expected a JSON array"))?;
                self.decode_entries(entries)
            }
            ListShape::Field(field) => match body.get(field) {
                None | Some(Value::Null) => Ok(Vec::new()),
                Some(Value::Array(entries)) => self.decode_entries(entries),
                Some(_) => Err(SyncError::invalid_response(format!(
                    "'{field}' is not an array"
                ))),
            },
            ListShape::ObjectKeys => {
                let object = body
                    .as_object()
                    .ok_or_else(|| SyncError::invalid_response("expected a JSON object"))?;
                Ok(object.iter().map(|(name, value)| named_item(name, value)).collect())
            }
        }
    }

    /// Reads the canonical item out of a create/update response, if the body
    /// carries one. `index` is the position the item will occupy.
    pub fn decode_canonical(&self, body: Option<&Value>, index: usize) -> Option<CollectionItem> {
        let body = body?;
        let value = match self.envelope {
            Some(field) => body.get(field)?,
            None => body,
        };
        self.decode_item(value, index).ok()
    }

    pub fn decode_item(&self, value: &Value, index: usize) -> Result<CollectionItem, SyncError> {
        let attributes = value
            .as_object()
            .cloned()
            .ok_or_else(|| SyncError::invalid_response("item is not a JSON object"))?;

        let id = match self.identity {
            Identity::Position => ItemId::from_position(index),
            Identity::Field(field) => match attributes.get(field) {
                Some(Value::String(s)) if !s.is_empty() => ItemId::new(s.clone()),
                Some(Value::Number(n)) => ItemId::new(n.to_string()),
                _ => {
                    return Err(SyncError::invalid_response(format!(
                        "item has no '{field}' identifier"
                    )))
                }
            },
        };
        Ok(CollectionItem::new(id, attributes))
    }

    fn decode_entries(&self, entries: &[Value]) -> Result<Vec<CollectionItem>, SyncError> {
        entries
            .iter()
            .enumerate()
            .map(|(index, value)| self.decode_item(value, index))
            .collect()
    }
}

/// Item for an object-keyed listing: `{ "fruits": [...] }` becomes an item
/// named `fruits` with the entry count.
fn named_item(name: &str, value: &Value) -> CollectionItem {
    let mut attributes = Map::new();
    attributes.insert("name".to_string(), Value::String(name.to_string()));
    if let Some(entries) = value.as_array() {
        attributes.insert("entries".to_string(), Value::from(entries.len()));
    }
    CollectionItem::new(name, attributes)
}

pub static VOCABULARY: ResourceDescriptor = ResourceDescriptor {
    kind: ResourceKind::Vocabulary,
    list_path: &[Lit("vocabulary"), Key],
    create_path: &[Lit("vocabulary"), Key],
    item_path: &[Lit("vocabulary"), Key, Id],
    list_shape: ListShape::Array,
    envelope: None,
    identity: Identity::Field("_id"),
    encoding: BodyEncoding::Multipart,
    add_form: form::VOCABULARY_ADD_FORM,
    edit_form: form::VOCABULARY_EDIT_FORM,
    rename_field: None,
};

pub static CATEGORIES: ResourceDescriptor = ResourceDescriptor {
    kind: ResourceKind::Categories,
    list_path: &[Lit("vocabulary"), Lit("categories")],
    create_path: &[Lit("categories")],
    item_path: &[Lit("categories"), Id],
    list_shape: ListShape::ObjectKeys,
    envelope: None,
    identity: Identity::Field("name"),
    encoding: BodyEncoding::Json,
    add_form: form::CATEGORY_ADD_FORM,
    edit_form: form::CATEGORY_EDIT_FORM,
    rename_field: Some("newCategory"),
};

pub static QUIZZES: ResourceDescriptor = ResourceDescriptor {
    kind: ResourceKind::Quizzes,
    list_path: &[Lit("listening"), Lit("topics"), Key],
    create_path: &[Lit("listening"), Lit("topics"), Key, Lit("quiz")],
    item_path: &[Lit("listening"), Lit("topics"), Key, Lit("quiz"), Id],
    list_shape: ListShape::Field("quiz"),
    envelope: Some("quiz"),
    identity: Identity::Position,
    encoding: BodyEncoding::Json,
    add_form: form::QUIZ_FORM,
    edit_form: form::QUIZ_FORM,
    rename_field: None,
};

pub static FILL_BLANKS: ResourceDescriptor = ResourceDescriptor {
    kind: ResourceKind::FillBlanks,
    list_path: &[Lit("listening"), Lit("topics"), Key, Lit("fillblanks")],
    create_path: &[Lit("listening"), Lit("topics"), Key, Lit("fillblanks")],
    item_path: &[Lit("listening"), Lit("topics"), Key, Lit("fillblanks"), Id],
    list_shape: ListShape::Field("fillBlanks"),
    envelope: Some("fillBlank"),
    identity: Identity::Position,
    encoding: BodyEncoding::Json,
    add_form: form::FILL_BLANK_FORM,
    edit_form: form::FILL_BLANK_FORM,
    rename_field: None,
};

/// Conversations live inside practice levels; their list is read by the
/// nested store from the topic document.
pub static CONVERSATIONS: ResourceDescriptor = ResourceDescriptor {
    kind: ResourceKind::Conversations,
    list_path: &[Lit("listening"), Lit("topics"), Key],
    create_path: &[
        Lit("listening"),
        Lit("topics"),
        Key,
        Lit("practice"),
        Level,
        Lit("conversations"),
    ],
    item_path: &[
        Lit("listening"),
        Lit("topics"),
        Key,
        Lit("practice"),
        Level,
        Lit("conversations"),
        Id,
    ],
    list_shape: ListShape::Field("conversations"),
    envelope: Some("conversation"),
    identity: Identity::Position,
    encoding: BodyEncoding::Json,
    add_form: form::CONVERSATION_FORM,
    edit_form: form::CONVERSATION_FORM,
    rename_field: None,
};

/// Practice levels of a listening topic: named buckets of conversations.
#[derive(Debug)]
pub struct LevelDescriptor {
    pub topic_path: &'static [Segment],
    /// Field of the topic document holding the level map.
    pub practice_field: &'static str,
    pub create_path: &'static [Segment],
    pub item_path: &'static [Segment],
    pub create_field: &'static str,
    pub rename_field: &'static str,
    pub envelope: &'static str,
    pub add_form: FormSpec,
    pub edit_form: FormSpec,
    pub items: &'static ResourceDescriptor,
}

impl LevelDescriptor {
    pub fn request(
        &self,
        config: &ApiConfig,
        method: Method,
        template: &[Segment],
        params: &PathParams<'_>,
        payload: Option<&Payload>,
    ) -> Result<ApiRequest, SyncError> {
        self.items.request(config, method, template, params, payload)
    }

    /// Decodes the topic document into `(level name, conversations)` pairs in
    /// server order.
    pub fn decode_levels(
        &self,
        body: Option<&Value>,
    ) -> Result<Vec<(String, Vec<CollectionItem>)>, SyncError> {
        let practice = match body.and_then(|b| b.get(self.practice_field)) {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Object(levels)) => levels,
            Some(_) => {
                return Err(SyncError::invalid_response(format!(
                    "'{}' is not an object",
                    self.practice_field
                )))
            }
        };

        practice
            .iter()
            .map(|(name, level)| Ok((name.clone(), self.decode_level(level)?)))
            .collect()
    }

    /// A level body is `{ "conversations": [...] }` or a bare array.
    pub fn decode_level(&self, level: &Value) -> Result<Vec<CollectionItem>, SyncError> {
        match level {
            Value::Array(_) => {
                let wrapped = serde_json::json!({ "conversations": level });
                self.items.decode_list(Some(&wrapped))
            }
            Value::Null => Ok(Vec::new()),
            other => self.items.decode_list(Some(other)),
        }
    }

    /// Conversations of the level carried by a level create/rename response.
    pub fn decode_canonical(&self, body: Option<&Value>) -> Option<Vec<CollectionItem>> {
        let level = body?.get(self.envelope)?;
        self.decode_level(level).ok()
    }
}

pub static PRACTICE_LEVELS: LevelDescriptor = LevelDescriptor {
    topic_path: &[Lit("listening"), Lit("topics"), Key],
    practice_field: "practice",
    create_path: &[Lit("listening"), Lit("topics"), Key, Lit("level")],
    item_path: &[Lit("listening"), Lit("topics"), Key, Lit("level"), Level],
    create_field: "levelName",
    rename_field: "newLevelName",
    envelope: "level",
    add_form: form::LEVEL_ADD_FORM,
    edit_form: form::LEVEL_EDIT_FORM,
    items: &CONVERSATIONS,
};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_item_path() {
        let id = ItemId::new("abc");
        let segments =
            render_path(VOCABULARY.item_path, &PathParams::key("fruits").with_id(&id)).unwrap();
        assert_eq!(segments, vec!["vocabulary", "fruits", "abc"]);
    }

    #[test]
    fn test_blank_key_rejected() {
        let err = render_path(VOCABULARY.list_path, &PathParams::key("  ")).unwrap_err();
        assert!(matches!(err, SyncError::ValidationFailed { .. }));
    }

    #[test]
    fn test_categories_list_needs_no_key() {
        let segments = render_path(CATEGORIES.list_path, &PathParams::default()).unwrap();
        assert_eq!(segments, vec!["vocabulary", "categories"]);
    }

    #[test]
    fn test_vocabulary_request_is_multipart() {
        let config = ApiConfig::default();
        let payload = Payload::new().with_text("word", "banana");
        let request = VOCABULARY
            .request(
                &config,
                Method::Post,
                VOCABULARY.create_path,
                &PathParams::key("fruits"),
                Some(&payload),
            )
            .unwrap();
        assert_eq!(request.url().as_str(), "http://localhost:3005/api/vocabulary/fruits");
        let content_type = request.header("content-type").unwrap();
        assert!(content_type.starts_with("multipart/form-data; boundary="));
    }

    #[test]
    fn test_json_request_for_quiz() {
        let config = ApiConfig::default();
        let payload = Payload::new().with_text("question", "Q");
        let request = QUIZZES
            .request(
                &config,
                Method::Post,
                QUIZZES.create_path,
                &PathParams::key("travel"),
                Some(&payload),
            )
            .unwrap();
        assert_eq!(
            request.url().as_str(),
            "http://localhost:3005/api/listening/topics/travel/quiz"
        );
        let body: Value = serde_json::from_slice(request.body().unwrap()).unwrap();
        assert_eq!(body, json!({"question": "Q"}));
    }

    #[test]
    fn test_decode_vocabulary_array() {
        let body = json!([{"_id": "1", "word": "apple"}, {"_id": "2", "word": "pear"}]);
        let items = VOCABULARY.decode_list(Some(&body)).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].id, ItemId::new("2"));
    }

    #[test]
    fn test_decode_missing_identifier() {
        let body = json!([{"word": "apple"}]);
        assert!(matches!(
            VOCABULARY.decode_list(Some(&body)),
            Err(SyncError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn test_decode_categories_object() {
        let body = json!({"fruits": [{}, {}], "animals": []});
        let items = CATEGORIES.decode_list(Some(&body)).unwrap();
        let names: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(names, vec!["fruits", "animals"]);
        assert_eq!(items[0].get("entries"), Some(&json!(2)));
    }

    #[test]
    fn test_decode_field_missing_is_empty() {
        let body = json!({"title": "Travel"});
        assert!(QUIZZES.decode_list(Some(&body)).unwrap().is_empty());
    }

    #[test]
    fn test_positional_ids() {
        let body = json!({"fillBlanks": [{"sentence": "a"}, {"sentence": "b"}]});
        let items = FILL_BLANKS.decode_list(Some(&body)).unwrap();
        assert_eq!(items[0].id, ItemId::new("0"));
        assert_eq!(items[1].id, ItemId::new("1"));
    }

    #[test]
    fn test_canonical_uses_envelope() {
        let body = json!({"quiz": {"question": "Q", "options": ["a", "b", "c"]}});
        let item = QUIZZES.decode_canonical(Some(&body), 4).unwrap();
        assert_eq!(item.id, ItemId::new("4"));
        assert_eq!(item.text("question"), Some("Q"));
        assert!(QUIZZES.decode_canonical(Some(&json!({"ok": true})), 0).is_none());
    }

    #[test]
    fn test_decode_levels_in_server_order() {
        let body = json!({
            "practice": {
                "beginner": {"conversations": [{"speaker": "A", "text": "Hi"}]},
                "advanced": [{"speaker": "B", "text": "Hello"}],
                "empty": null
            }
        });
        let levels = PRACTICE_LEVELS.decode_levels(Some(&body)).unwrap();
        let names: Vec<_> = levels.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["beginner", "advanced", "empty"]);
        assert_eq!(levels[1].1[0].text("text"), Some("Hello"));
        assert!(levels[2].1.is_empty());
    }
}
