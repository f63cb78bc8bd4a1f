//! Read-only snapshot the shells render.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::config::ApiConfig;
use crate::error::{ErrorScope, OperationKind, ScopedError, SyncError};
use crate::event::Route;
use crate::form::FormSpec;
use crate::model::{CollectionItem, ItemId};
use crate::nested::NestedCollectionStore;
use crate::resource::{ResourceDescriptor, ResourceKind};
use crate::store::{CollectionSyncStore, SyncState, SyncStore};

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Idle,
    Loading,
    Ready,
    Error,
}

impl From<&SyncState> for Status {
    fn from(state: &SyncState) -> Self {
        match state {
            SyncState::Idle => Self::Idle,
            SyncState::Loading => Self::Loading,
            SyncState::Ready => Self::Ready,
            SyncState::Error(_) => Self::Error,
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ErrorView {
    pub code: String,
    pub message: String,
    pub status: Option<u16>,
    pub operation: Option<OperationKind>,
    pub scope: Option<ErrorScope>,
}

impl From<&SyncError> for ErrorView {
    fn from(e: &SyncError) -> Self {
        Self {
            code: e.code().to_string(),
            message: e.user_facing_message(),
            status: e.status(),
            operation: None,
            scope: None,
        }
    }
}

impl From<&ScopedError> for ErrorView {
    fn from(e: &ScopedError) -> Self {
        Self {
            operation: Some(e.operation),
            scope: Some(e.scope.clone()),
            ..Self::from(&e.error)
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ItemView {
    pub id: ItemId,
    pub attributes: Map<String, Value>,
    /// Absolute URL of the item's image, when it has one.
    pub media_url: Option<String>,
    /// Initial values for the edit form.
    pub edit_values: BTreeMap<String, Value>,
    pub busy: bool,
}

impl ItemView {
    fn new(item: &CollectionItem, edit_form: &FormSpec, config: &ApiConfig, busy: bool) -> Self {
        Self {
            id: item.id.clone(),
            attributes: item.attributes.clone(),
            media_url: item.text("image").and_then(|path| config.asset_url(path)),
            edit_values: edit_form.prefill(item).fields,
            busy,
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct CollectionView {
    pub kind: ResourceKind,
    pub key: String,
    pub status: Status,
    pub load_error: Option<ErrorView>,
    pub items: Vec<ItemView>,
    /// An add or list refresh is in flight.
    pub is_syncing: bool,
    pub errors: Vec<ErrorView>,
    pub add_form: FormSpec,
    pub edit_form: FormSpec,
}

impl CollectionView {
    pub fn new(store: &CollectionSyncStore, config: &ApiConfig) -> Self {
        let descriptor: &ResourceDescriptor = store.descriptor();
        let busy_ids: Vec<&ItemId> = store
            .in_flight()
            .iter()
            .filter_map(|p| p.scope.item_id())
            .collect();

        Self {
            kind: descriptor.kind,
            key: store.key().to_string(),
            status: Status::from(store.state()),
            load_error: store.state().error().map(ErrorView::from),
            items: store
                .collection()
                .iter()
                .map(|item| {
                    ItemView::new(item, &descriptor.edit_form, config, busy_ids.contains(&&item.id))
                })
                .collect(),
            is_syncing: store
                .in_flight()
                .iter()
                .any(|p| p.scope == ErrorScope::Collection),
            errors: store.errors().iter().map(ErrorView::from).collect(),
            add_form: descriptor.add_form,
            edit_form: descriptor.edit_form,
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct LevelView {
    pub name: String,
    pub items: Vec<ItemView>,
    pub busy: bool,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct PracticeView {
    pub topic: String,
    pub status: Status,
    pub load_error: Option<ErrorView>,
    pub levels: Vec<LevelView>,
    pub is_syncing: bool,
    pub errors: Vec<ErrorView>,
    pub level_add_form: FormSpec,
    pub level_edit_form: FormSpec,
    pub add_form: FormSpec,
    pub edit_form: FormSpec,
}

impl PracticeView {
    pub fn new(store: &NestedCollectionStore, config: &ApiConfig) -> Self {
        let descriptor = store.descriptor();
        let items = descriptor.items;
        let in_flight = store.in_flight();

        let levels = store
            .levels()
            .iter()
            .map(|level| {
                let level_busy = in_flight.iter().any(|p| {
                    matches!(&p.scope, ErrorScope::Level { name } if *name == level.name)
                });
                LevelView {
                    name: level.name.clone(),
                    items: level
                        .items
                        .iter()
                        .map(|item| {
                            let busy = in_flight.iter().any(|p| {
                                matches!(
                                    &p.scope,
                                    ErrorScope::LevelItem { level: l, id } if *l == level.name && *id == item.id
                                )
                            });
                            ItemView::new(item, &items.edit_form, config, busy)
                        })
                        .collect(),
                    busy: level_busy,
                }
            })
            .collect();

        Self {
            topic: store.key().to_string(),
            status: Status::from(store.state()),
            load_error: store.state().error().map(ErrorView::from),
            levels,
            is_syncing: in_flight.iter().any(|p| p.scope == ErrorScope::Collection),
            errors: store.errors().iter().map(ErrorView::from).collect(),
            level_add_form: descriptor.add_form,
            level_edit_form: descriptor.edit_form,
            add_form: items.add_form,
            edit_form: items.edit_form,
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum ScreenView {
    Dashboard,
    Vocabulary {
        category: String,
        words: CollectionView,
    },
    Listening {
        topic: String,
        practice: PracticeView,
        quizzes: CollectionView,
        fill_blanks: CollectionView,
    },
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ViewModel {
    pub route: Route,
    /// Path the shell's router should show.
    pub path: String,
    pub sidebar: Option<CollectionView>,
    pub screen: ScreenView,
}

impl Default for ViewModel {
    fn default() -> Self {
        Self {
            route: Route::Dashboard,
            path: Route::Dashboard.to_string(),
            sidebar: None,
            screen: ScreenView::Dashboard,
        }
    }
}
