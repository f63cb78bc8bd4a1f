//! Shared core of the language-content admin dashboard.
//!
//! Web and mobile shells render [`ViewModel`], send [`Event`]s and perform the
//! HTTP requests the core asks for; all list state lives here.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod app;
pub mod capabilities;
pub mod config;
pub mod error;
pub mod event;
pub mod form;
pub mod model;
pub mod multipart;
pub mod nested;
pub mod resource;
pub mod store;
pub mod view;

pub use app::{App, Model};
pub use capabilities::{Capabilities, Effect};
pub use config::{ApiConfig, ConfigError};
pub use crux_core::{render::Render, App as CruxApp};
pub use error::{ErrorScope, OperationKind, ScopedError, SyncError};
pub use event::{Event, Route, Target};
pub use model::{Attachment, Collection, CollectionItem, ItemId, Payload};
pub use nested::{Level, NestedCollectionStore};
pub use store::{CollectionSyncStore, Lifetime, OpId, PreparedRequest, SyncState, SyncStore};
pub use view::ViewModel;
