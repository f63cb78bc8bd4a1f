//! List-state synchronisation for one remote collection.
//!
//! A store never performs I/O. Each intent validates, records the operation
//! as in flight and returns a [`PreparedRequest`]; the app hands the request
//! to the shell and feeds the answer back through [`SyncStore::finish`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::capabilities::{ApiRequest, ApiResult, Method};
use crate::config::ApiConfig;
use crate::error::{classify, parse_json, ErrorScope, OperationKind, Reply, ScopedError, SyncError};
use crate::form::FormMode;
use crate::model::{Collection, ItemId, Payload};
use crate::resource::{PathParams, ResourceDescriptor};

/// Identity of one mounted store. Responses carrying another lifetime belong
/// to a store that has since been unmounted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Lifetime(pub u64);

impl Lifetime {
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// Correlates a prepared request with its in-flight record.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpId(String);

impl OpId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum SyncState {
    #[default]
    Idle,
    Loading,
    Ready,
    Error(SyncError),
}

impl SyncState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    pub fn error(&self) -> Option<&SyncError> {
        match self {
            Self::Error(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedRequest {
    pub op: OpId,
    pub request: ApiRequest,
}

/// Outcome of applying a response.
#[derive(Clone, Debug, PartialEq)]
pub struct Completion {
    pub operation: OperationKind,
    pub scope: ErrorScope,
    pub error: Option<SyncError>,
    /// Reconcile fetch to dispatch next.
    pub follow_up: Option<PreparedRequest>,
    /// New name of a renamed item or level.
    pub renamed_to: Option<String>,
}

impl Completion {
    fn new(operation: OperationKind, scope: ErrorScope) -> Self {
        Self {
            operation,
            scope,
            error: None,
            follow_up: None,
            renamed_to: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// An operation awaiting its response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InFlight {
    pub op: OpId,
    pub operation: OperationKind,
    pub scope: ErrorScope,
    #[serde(skip)]
    pub(crate) rename_to: Option<String>,
}

/// Common surface of the flat and nested stores.
pub trait SyncStore {
    fn lifetime(&self) -> Lifetime;

    fn state(&self) -> &SyncState;

    fn in_flight(&self) -> &[InFlight];

    fn errors(&self) -> &[ScopedError];

    fn dismiss_errors(&mut self);

    /// Applies the response for `op`. Returns `None` when `op` is not in
    /// flight on this store.
    fn finish(&mut self, op: &OpId, result: ApiResult) -> Option<Completion>;

    fn is_busy(&self) -> bool {
        !self.in_flight().is_empty()
    }
}

#[derive(Debug)]
pub struct CollectionSyncStore {
    descriptor: &'static ResourceDescriptor,
    config: ApiConfig,
    key: String,
    lifetime: Lifetime,
    state: SyncState,
    collection: Collection,
    in_flight: Vec<InFlight>,
    errors: Vec<ScopedError>,
}

impl CollectionSyncStore {
    pub fn new(
        descriptor: &'static ResourceDescriptor,
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
            collection: Collection::new(),
            in_flight: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn descriptor(&self) -> &'static ResourceDescriptor {
        self.descriptor
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    /// Fetches the whole collection. The displayed list is kept until the
    /// response arrives.
    #[instrument(skip(self), fields(resource = %self.descriptor.kind, key = %self.key))]
    pub fn begin_load(&mut self) -> Result<PreparedRequest, SyncError> {
        match self.prepare_list_fetch(OperationKind::Load) {
            Ok(prepared) => {
                self.state = SyncState::Loading;
                Ok(prepared)
            }
            Err(e) => {
                warn!(error = %e, "load not started");
                self.state = SyncState::Error(e.clone());
                Err(e)
            }
        }
    }

    pub fn begin_add(&mut self, payload: &Payload) -> Result<PreparedRequest, SyncError> {
        let scope = ErrorScope::Collection;
        let prepared = self
            .descriptor
            .add_form
            .validate(payload, FormMode::Create)
            .and_then(|()| {
                self.descriptor.request(
                    &self.config,
                    Method::Post,
                    self.descriptor.create_path,
                    &PathParams::key(&self.key),
                    Some(payload),
                )
            });
        self.track(OperationKind::Add, scope, None, prepared)
    }

    pub fn begin_update(
        &mut self,
        id: &ItemId,
        patch: &Payload,
    ) -> Result<PreparedRequest, SyncError> {
        let scope = ErrorScope::Item { id: id.clone() };
        let rename_to = self
            .descriptor
            .rename_field
            .and_then(|field| patch.text(field))
            .map(|name| name.trim().to_string());
        let prepared = self
            .descriptor
            .edit_form
            .validate(patch, FormMode::Edit)
            .and_then(|()| {
                self.descriptor.request(
                    &self.config,
                    Method::Put,
                    self.descriptor.item_path,
                    &PathParams::key(&self.key).with_id(id),
                    Some(patch),
                )
            });
        self.track(OperationKind::Update, scope, rename_to, prepared)
    }

    pub fn begin_remove(&mut self, id: &ItemId) -> Result<PreparedRequest, SyncError> {
        let scope = ErrorScope::Item { id: id.clone() };
        let prepared = self.descriptor.request(
            &self.config,
            Method::Delete,
            self.descriptor.item_path,
            &PathParams::key(&self.key).with_id(id),
            None,
        );
        self.track(OperationKind::Remove, scope, None, prepared)
    }

    fn begin_reconcile(&mut self) -> Result<PreparedRequest, SyncError> {
        self.prepare_list_fetch(OperationKind::Reconcile)
    }

    fn prepare_list_fetch(&mut self, operation: OperationKind) -> Result<PreparedRequest, SyncError> {
        let request = self.descriptor.request(
            &self.config,
            Method::Get,
            self.descriptor.list_path,
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
        debug!(op = %op.as_str(), %operation, "list fetch prepared");
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
                debug!(
                    resource = %self.descriptor.kind,
                    op = %op.as_str(),
                    %operation,
                    "mutation prepared"
                );
                self.in_flight.push(InFlight {
                    op: op.clone(),
                    operation,
                    scope,
                    rename_to,
                });
                Ok(PreparedRequest { op, request })
            }
            Err(e) => {
                warn!(resource = %self.descriptor.kind, %operation, error = %e, "intent rejected");
                self.errors.push(ScopedError::new(operation, scope, e.clone()));
                Err(e)
            }
        }
    }

    fn apply_list(&mut self, operation: OperationKind, result: ApiResult) -> Completion {
        let mut completion = Completion::new(operation, ErrorScope::Collection);

        let decoded = match classify(result).and_then(|body| parse_json(&body)) {
            Ok(body) => self.descriptor.decode_list(body.as_ref()),
            Err(SyncError::NotFound { .. }) => {
                debug!(key = %self.key, "collection not found, treating as empty");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        };

        match decoded {
            Ok(items) => {
                let (collection, dropped) = Collection::from_items(items);
                if dropped > 0 {
                    warn!(dropped, "duplicate identifiers in list response");
                }
                info!(
                    resource = %self.descriptor.kind,
                    key = %self.key,
                    count = collection.len(),
                    %operation,
                    "collection synced"
                );
                self.collection = collection;
                self.state = SyncState::Ready;
                self.clear_errors_for(OperationKind::Reconcile, &ErrorScope::Collection);
            }
            Err(e) => {
                warn!(resource = %self.descriptor.kind, key = %self.key, error = %e, %operation, "list fetch failed");
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
        let mut completion = Completion::new(pending.operation, pending.scope.clone());

        let body = match classify(result) {
            Ok(body) => body,
            Err(e) => {
                warn!(
                    resource = %self.descriptor.kind,
                    operation = %pending.operation,
                    error = %e,
                    "mutation failed"
                );
                self.errors.push(ScopedError::new(
                    pending.operation,
                    pending.scope.clone(),
                    e.clone(),
                ));
                completion.error = Some(e);
                return completion;
            }
        };
        self.clear_errors_for(pending.operation, &pending.scope);
        if !matches!(self.state, SyncState::Loading) {
            self.state = SyncState::Ready;
        }

        let reply = Reply::parse(&body);
        if reply == Reply::Undecodable {
            debug!(operation = %pending.operation, "mutation reply is not JSON");
        }
        let reconcile = apply_item_success(
            self.descriptor,
            &mut self.collection,
            pending.operation,
            pending.scope.item_id(),
            reply.json(),
        ) || reply == Reply::Undecodable;
        if pending.operation == OperationKind::Update {
            completion.renamed_to = pending.rename_to;
        }

        if reconcile {
            match self.begin_reconcile() {
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

    fn clear_errors_for(&mut self, operation: OperationKind, scope: &ErrorScope) {
        self.errors
            .retain(|e| !(e.operation == operation && &e.scope == scope));
    }
}

/// Applies a successful add/update/remove to `collection`. Returns whether a
/// reconcile fetch should follow.
pub(crate) fn apply_item_success(
    descriptor: &ResourceDescriptor,
    collection: &mut Collection,
    operation: OperationKind,
    target: Option<&ItemId>,
    body: Option<&Value>,
) -> bool {
    match (operation, target) {
        (OperationKind::Add, _) => {
            let index = collection.len();
            if let Some(item) = descriptor.decode_canonical(body, index) {
                if !collection.push_unique(item) {
                    debug!("created item already present");
                }
            }
            true
        }
        (OperationKind::Update, Some(id)) => {
            let canonical = collection
                .position(id)
                .and_then(|index| descriptor.decode_canonical(body, index));
            match canonical {
                Some(item) if item.id == *id || !collection.contains(&item.id) => {
                    collection.replace(id, item);
                    false
                }
                _ => true,
            }
        }
        (OperationKind::Remove, Some(id)) => {
            if collection.remove(id).is_some() && descriptor.is_positional() {
                collection.renumber();
            }
            false
        }
        _ => false,
    }
}

impl SyncStore for CollectionSyncStore {
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
            debug!(op = %op.as_str(), "response for unknown operation ignored");
            return None;
        };
        let pending = self.in_flight.remove(index);

        let completion = match pending.operation {
            OperationKind::Load | OperationKind::Reconcile => {
                self.apply_list(pending.operation, result)
            }
            _ => self.apply_mutation(pending, result),
        };
        Some(completion)
    }
}
