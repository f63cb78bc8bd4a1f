//! Data-driven form definitions.
//!
//! Every add/edit dialog of the dashboard is one `FormSpec`; shells render
//! the fields generically and submit a [`Payload`]. Validation runs in the
//! core before any request is prepared.

use serde::Serialize;
use serde_json::Value;

use crate::error::SyncError;
use crate::model::{CollectionItem, Payload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    TextArea,
    /// Value must be one of a fixed set.
    Choice { options: &'static [&'static str] },
    /// Value must equal one of the entries of another list field.
    OneOf { source: &'static str },
    /// Array of strings with at least `min` entries.
    TextList { min: usize },
    /// Binary attachment sent as a multipart file part.
    File { accept: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSpec {
    pub const fn required(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            label,
            kind,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            label,
            kind,
            required: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    /// Every required field must be supplied.
    Create,
    /// Partial patch: only supplied fields are checked.
    Edit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FormSpec {
    pub title: &'static str,
    pub fields: &'static [FieldSpec],
}

impl FormSpec {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn validate(&self, payload: &Payload, mode: FormMode) -> Result<(), SyncError> {
        for field in self.fields {
            match field.kind {
                FieldKind::File { .. } => {
                    if field.required
                        && mode == FormMode::Create
                        && payload.attachment(field.name).is_none()
                    {
                        return Err(SyncError::validation(field.label, "is required"));
                    }
                }
                _ => match payload.fields.get(field.name) {
                    Some(value) => Self::check_value(field, value, payload)?,
                    None if field.required && mode == FormMode::Create => {
                        return Err(SyncError::validation(field.label, "is required"));
                    }
                    None => {}
                },
            }
        }
        Ok(())
    }

    /// Initial values for an edit form. Attachments are never prefilled.
    pub fn prefill(&self, item: &CollectionItem) -> Payload {
        let mut payload = Payload::new();
        for field in self.fields {
            if matches!(field.kind, FieldKind::File { .. }) {
                continue;
            }
            if let Some(value) = item.get(field.name) {
                payload.fields.insert(field.name.to_string(), value.clone());
            }
        }
        payload
    }

    fn check_value(field: &FieldSpec, value: &Value, payload: &Payload) -> Result<(), SyncError> {
        match field.kind {
            FieldKind::Text | FieldKind::TextArea => {
                let text = value
                    .as_str()
                    .ok_or_else(|| SyncError::validation(field.label, "must be text"))?;
                if field.required && text.trim().is_empty() {
                    return Err(SyncError::validation(field.label, "is required"));
                }
            }
            FieldKind::Choice { options } => {
                let text = value.as_str().unwrap_or_default();
                if !options.contains(&text) {
                    return Err(SyncError::validation(
                        field.label,
                        format!("must be one of {}", options.join(", ")),
                    ));
                }
            }
            FieldKind::OneOf { source } => {
                let text = value.as_str().unwrap_or_default();
                if field.required && text.trim().is_empty() {
                    return Err(SyncError::validation(field.label, "is required"));
                }
                if let Some(Value::Array(candidates)) = payload.fields.get(source) {
                    if !candidates.iter().any(|c| c.as_str() == Some(text)) {
                        return Err(SyncError::validation(
                            field.label,
                            format!("must match one of the {source}"),
                        ));
                    }
                }
            }
            FieldKind::TextList { min } => {
                let entries = value
                    .as_array()
                    .ok_or_else(|| SyncError::validation(field.label, "must be a list"))?;
                if entries.len() < min {
                    return Err(SyncError::validation(
                        field.label,
                        format!("needs at least {min} entries"),
                    ));
                }
                let blank = entries
                    .iter()
                    .any(|e| !e.as_str().is_some_and(|s| !s.trim().is_empty()));
                if blank {
                    return Err(SyncError::validation(field.label, "cannot contain blank entries"));
                }
            }
            FieldKind::File { .. } => {}
        }
        Ok(())
    }
}

pub const VOCABULARY_ADD_FORM: FormSpec = FormSpec {
    title: "Add New Vocabulary",
    fields: &[
        FieldSpec::required("word", "Word", FieldKind::Text),
        FieldSpec::required("image", "Image", FieldKind::File { accept: "image/*" }),
        FieldSpec::required("pronunciation", "Pronunciation", FieldKind::Text),
        FieldSpec::required("meaning", "Meaning", FieldKind::Text),
        FieldSpec::required("example", "Example", FieldKind::Text),
    ],
};

pub const VOCABULARY_EDIT_FORM: FormSpec = FormSpec {
    title: "Edit Vocabulary",
    fields: &[
        FieldSpec::required("word", "Word", FieldKind::Text),
        FieldSpec::optional("image", "Image", FieldKind::File { accept: "image/*" }),
        FieldSpec::required("pronunciation", "Pronunciation", FieldKind::Text),
        FieldSpec::required("meaning", "Meaning", FieldKind::Text),
        FieldSpec::required("example", "Example", FieldKind::Text),
    ],
};

pub const CATEGORY_ADD_FORM: FormSpec = FormSpec {
    title: "Add New Category",
    fields: &[FieldSpec::required("category", "Category name", FieldKind::Text)],
};

pub const CATEGORY_EDIT_FORM: FormSpec = FormSpec {
    title: "Edit Category",
    fields: &[FieldSpec::required("newCategory", "Category name", FieldKind::Text)],
};

pub const QUIZ_FORM: FormSpec = FormSpec {
    title: "Quiz",
    fields: &[
        FieldSpec::required("question", "Question", FieldKind::Text),
        FieldSpec::required("options", "Options", FieldKind::TextList { min: 3 }),
        FieldSpec::required(
            "correctAnswer",
            "Correct answer",
            FieldKind::OneOf { source: "options" },
        ),
    ],
};

pub const FILL_BLANK_FORM: FormSpec = FormSpec {
    title: "Fill in the Blank",
    fields: &[
        FieldSpec::required("sentence", "Sentence", FieldKind::TextArea),
        FieldSpec::required("missingWord", "Missing word", FieldKind::Text),
        FieldSpec::required("audioText", "Audio text", FieldKind::TextArea),
    ],
};

pub const CONVERSATION_FORM: FormSpec = FormSpec {
    title: "Conversation",
    fields: &[
        FieldSpec::required("speaker", "Speaker", FieldKind::Choice { options: &["A", "B"] }),
        FieldSpec::required("text", "Text", FieldKind::TextArea),
        FieldSpec::required("translation", "Translation", FieldKind::TextArea),
    ],
};

pub const LEVEL_ADD_FORM: FormSpec = FormSpec {
    title: "Add Level",
    fields: &[FieldSpec::required("levelName", "Level name", FieldKind::Text)],
};

pub const LEVEL_EDIT_FORM: FormSpec = FormSpec {
    title: "Edit Level",
    fields: &[FieldSpec::required("newLevelName", "Level name", FieldKind::Text)],
};
