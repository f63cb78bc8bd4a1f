//! Collections of collections: listening practice levels, each a named bucket
//! of conversations.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::capabilities::{ApiRequest, ApiResult, Method};
use crate::config::ApiConfig;
use crate::error::{classify, parse_json, ErrorScope, OperationKind, Reply, ScopedError, SyncError};
use crate::form::FormMode;
use crate::model::{Collection, CollectionItem, ItemId, Payload};
use crate::resource::{LevelDescriptor, PathParams, Segment};
use crate::store::{
    apply_item_success, Completion, InFlight, Lifetime, OpId, PreparedRequest, SyncState,
    SyncStore,
};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Level {
    pub name: String,
    pub items: Collection,
}

impl Level {
    fn new(name: impl Into<String>, items: Vec<CollectionItem>) -> Self {
        let (items, dropped) = Collection::from_items(items);
        if dropped > 0 {
            warn!(dropped, "duplicate identifiers in level");
        }
        Self {
            name: name.into(),
            items,
        }
    }
}

#[derive(Debug)]
pub struct NestedCollectionStore {
    descriptor: &'static LevelDescriptor,
    config: ApiConfig,
    key: String,
    lifetime: Lifetime,
    state: SyncState,
    levels: Vec<Level>,
    in_flight: Vec<InFlight>,
    errors: Vec<ScopedError>,
}

impl NestedCollectionStore {
    pub fn new(
        descriptor: &'static LevelDescriptor,
        config: ApiConfig,
        key: impl Into<String>,
        lifetime: Lifetime,
    ) -> Self {
        Self {
            descriptor,
            config,
            key: key.into(),
            lifetime,
            state: SyncState::Idle,
            levels: Vec::new(),
            in_flight: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn descriptor(&self) -> &'static LevelDescriptor {
        self.descriptor
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn level(&self, name: &str) -> Option<&Level> {
        self.levels.iter().find(|l| l.name == name)
    }

    pub fn begin_load(&mut self) -> Result<PreparedRequest, SyncError> {
        match self.prepare_fetch(OperationKind::Load) {
            Ok(prepared) => {
                self.state = SyncState::Loading;
                Ok(prepared)
            }
            Err(e) => {
                warn!(topic = %self.key, error = %e, "practice load not started");
                self.state = SyncState::Error(e.clone());
                Err(e)
            }
        }
    }

    pub fn begin_add_level(&mut self, name: &str) -> Result<PreparedRequest, SyncError> {
        let name = name.trim();
        let payload = Payload::new().with_text(self.descriptor.create_field, name);
        let scope = ErrorScope::Level {
            name: name.to_string(),
        };
        let prepared = self
            .descriptor
            .add_form
            .validate(&payload, FormMode::Create)
            .and_then(|()| self.ensure_level_free(name))
            .and_then(|()| {
                self.request(
                    Method::Post,
                    self.descriptor.create_path,
                    &PathParams::key(&self.key),
                    Some(&payload),
                )
            });
        self.track(OperationKind::AddLevel, scope, None, prepared)
    }

    pub fn begin_edit_level(&mut self, from: &str, to: &str) -> Result<PreparedRequest, SyncError> {
        let to = to.trim();
        let payload = Payload::new().with_text(self.descriptor.rename_field, to);
        let scope = ErrorScope::Level {
            name: from.to_string(),
        };
        let prepared = self
            .descriptor
            .edit_form
            .validate(&payload, FormMode::Create)
            .and_then(|()| {
                if to == from {
                    Ok(())
                } else {
                    self.ensure_level_free(to)
                }
            })
            .and_then(|()| {
                self.request(
                    Method::Put,
                    self.descriptor.item_path,
                    &PathParams::key(&self.key).with_level(from),
                    Some(&payload),
                )
            });
        self.track(OperationKind::EditLevel, scope, Some(to.to_string()), prepared)
    }

    pub fn begin_remove_level(&mut self, name: &str) -> Result<PreparedRequest, SyncError> {
        let scope = ErrorScope::Level {
            name: name.to_string(),
        };
        let prepared = self.request(
            Method::Delete,
            self.descriptor.item_path,
            &PathParams::key(&self.key).with_level(name),
            None,
        );
        self.track(OperationKind::RemoveLevel, scope, None, prepared)
    }

    pub fn begin_add_in_level(
        &mut self,
        level: &str,
        payload: &Payload,
    ) -> Result<PreparedRequest, SyncError> {
        let items = self.descriptor.items;
        let scope = ErrorScope::Level {
            name: level.to_string(),
        };
        let prepared = items
            .add_form
            .validate(payload, FormMode::Create)
            .and_then(|()| {
                self.request(
                    Method::Post,
                    items.create_path,
                    &PathParams::key(&self.key).with_level(level),
                    Some(payload),
                )
            });
        self.track(OperationKind::Add, scope, None, prepared)
    }

    pub fn begin_update_in_level(
        &mut self,
        level: &str,
        id: &ItemId,
        patch: &Payload,
    ) -> Result<PreparedRequest, SyncError> {
        let items = self.descriptor.items;
        let scope = ErrorScope::LevelItem {
            level: level.to_string(),
            id: id.clone(),
        };
        let prepared = items
            .edit_form
            .validate(patch, FormMode::Edit)
            .and_then(|()| {
                self.request(
                    Method::Put,
                    items.item_path,
                    &PathParams::key(&self.key).with_level(level).with_id(id),
                    Some(patch),
                )
            });
        self.track(OperationKind::Update, scope, None, prepared)
    }

    pub fn begin_remove_in_level(
        &mut self,
        level: &str,
        id: &ItemId,
    ) -> Result<PreparedRequest, SyncError> {
        let scope = ErrorScope::LevelItem {
            level: level.to_string(),
            id: id.clone(),
        };
        let prepared = self.request(
            Method::Delete,
            self.descriptor.items.item_path,
            &PathParams::key(&self.key).with_level(level).with_id(id),
            None,
        );
        self.track(OperationKind::Remove, scope, None, prepared)
    }

    fn request(
        &self,
        method: Method,
        template: &[Segment],
        params: &PathParams<'_>,
        payload: Option<&Payload>,
    ) -> Result<ApiRequest, SyncError> {
        self.descriptor
            .request(&self.config, method, template, params, payload)
    }

    fn ensure_level_free(&self, name: &str) -> Result<(), SyncError> {
        if self.level(name).is_some() {
            Err(SyncError::validation(
                self.descriptor.add_form.fields[0].label,
                format!("'{name}' already exists"),
            ))
        } else {
            Ok(())
        }
    }

    fn prepare_fetch(&mut self, operation: OperationKind) -> Result<PreparedRequest, SyncError> {
        let request = self.request(
            Method::Get,
            self.descriptor.topic_path,
            &PathParams::key(&self.key),
            None,
        )?;
        let op = OpId::generate();
        self.in_flight.push(InFlight {
            op: op.clone(),
            operation,
            scope: ErrorScope::Collection,
            rename_to: None,
        });
        Ok(PreparedRequest { op, request })
    }

    fn track(
        &mut self,
        operation: OperationKind,
        scope: ErrorScope,
        rename_to: Option<String>,
        prepared: Result<ApiRequest, SyncError>,
    ) -> Result<PreparedRequest, SyncError> {
        match prepared {
            Ok(request) => {
                let op = OpId::generate();
                debug!(topic = %self.key, op = %op.as_str(), %operation, "practice mutation prepared");
                self.in_flight.push(InFlight {
                    op: op.clone(),
                    operation,
                    scope,
                    rename_to,
                });
                Ok(PreparedRequest { op, request })
            }
            Err(e) => {
                warn!(topic = %self.key, %operation, error = %e, "practice intent rejected");
                self.errors.push(ScopedError::new(operation, scope, e.clone()));
                Err(e)
            }
        }
    }

    fn apply_levels(&mut self, operation: OperationKind, result: ApiResult) -> Completion {
        let mut completion = Completion {
            operation,
            scope: ErrorScope::Collection,
            error: None,
            follow_up: None,
            renamed_to: None,
        };

        let decoded = match classify(result).and_then(|body| parse_json(&body)) {
            Ok(body) => self.descriptor.decode_levels(body.as_ref()),
            Err(SyncError::NotFound { .. }) => Ok(Vec::new()),
            Err(e) => Err(e),
        };

        match decoded {
            Ok(levels) => {
                self.levels = levels
                    .into_iter()
                    .map(|(name, items)| Level::new(name, items))
                    .collect();
                info!(topic = %self.key, levels = self.levels.len(), %operation, "practice synced");
                self.state = SyncState::Ready;
                self.errors
                    .retain(|e| e.operation != OperationKind::Reconcile);
            }
            Err(e) => {
                warn!(topic = %self.key, error = %e, %operation, "practice fetch failed");
                if operation == OperationKind::Load {
                    self.state = SyncState::Error(e.clone());
                } else {
                    self.errors
                        .push(ScopedError::new(operation, ErrorScope::Collection, e.clone()));
                }
                completion.error = Some(e);
            }
        }
        completion
    }

    fn apply_mutation(&mut self, pending: InFlight, result: ApiResult) -> Completion {
        let mut completion = Completion {
            operation: pending.operation,
            scope: pending.scope.clone(),
            error: None,
            follow_up: None,
            renamed_to: None,
        };

        let body = match classify(result) {
            Ok(body) => body,
            Err(e) => {
                warn!(topic = %self.key, operation = %pending.operation, error = %e, "practice mutation failed");
                self.errors
                    .push(ScopedError::new(pending.operation, pending.scope, e.clone()));
                completion.error = Some(e);
                return completion;
            }
        };
        self.errors
            .retain(|e| !(e.operation == pending.operation && e.scope == pending.scope));
        if !matches!(self.state, SyncState::Loading) {
            self.state = SyncState::Ready;
        }

        let reply = Reply::parse(&body);
        let body = reply.json();
        let reconcile = match (&pending.scope, pending.operation) {
            (ErrorScope::Level { name }, OperationKind::AddLevel) => {
                if self.level(name).is_none() {
                    let items = self
                        .descriptor
                        .decode_canonical(body)
                        .unwrap_or_default();
                    self.levels.push(Level::new(name.clone(), items));
                }
                true
            }
            (ErrorScope::Level { name }, OperationKind::EditLevel) => {
                let canonical = self.descriptor.decode_canonical(body);
                let to = pending.rename_to.clone().unwrap_or_else(|| name.clone());
                match self.levels.iter_mut().find(|l| l.name == *name) {
                    Some(level) => {
                        level.name.clone_from(&to);
                        if let Some(items) = canonical {
                            *level = Level::new(to.clone(), items);
                        }
                    }
                    None => debug!(level = %name, "renamed level not loaded"),
                }
                completion.renamed_to = Some(to);
                false
            }
            (ErrorScope::Level { name }, OperationKind::RemoveLevel) => {
                self.levels.retain(|l| l.name != *name);
                false
            }
            (ErrorScope::Level { name }, OperationKind::Add) => {
                let items = self.descriptor.items;
                if let Some(level) = self.levels.iter_mut().find(|l| l.name == *name) {
                    apply_item_success(items, &mut level.items, OperationKind::Add, None, body);
                }
                true
            }
            (ErrorScope::LevelItem { level, id }, operation) => {
                let items = self.descriptor.items;
                match self.levels.iter_mut().find(|l| l.name == *level) {
                    Some(bucket) => apply_item_success(
                        items,
                        &mut bucket.items,
                        operation,
                        Some(id),
                        body,
                    ),
                    None => true,
                }
            }
            _ => false,
        } || reply == Reply::Undecodable;

        if reconcile {
            match self.prepare_fetch(OperationKind::Reconcile) {
                Ok(prepared) => completion.follow_up = Some(prepared),
                Err(e) => self.errors.push(ScopedError::new(
                    OperationKind::Reconcile,
                    ErrorScope::Collection,
                    e,
                )),
            }
        }
        completion
    }
}

impl SyncStore for NestedCollectionStore {
    fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    fn state(&self) -> &SyncState {
        &self.state
    }

    fn in_flight(&self) -> &[InFlight] {
        &self.in_flight
    }

    fn errors(&self) -> &[ScopedError] {
        &self.errors
    }

    fn dismiss_errors(&mut self) {
        self.errors.clear();
    }

    fn finish(&mut self, op: &OpId, result: ApiResult) -> Option<Completion> {
        let Some(index) = self.in_flight.iter().position(|p| &p.op == op) else {
            debug!(op = %op.as_str(), "response for unknown practice operation ignored");
            return None;
        };
        let pending = self.in_flight.remove(index);

        Some(match pending.operation {
            OperationKind::Load | OperationKind::Reconcile => {
                self.apply_levels(pending.operation, result)
            }
            _ => self.apply_mutation(pending, result),
        })
    }
}
