use tracing::{debug, info, warn};

use crate::capabilities::Capabilities;
use crate::config::ApiConfig;
use crate::error::{ErrorScope, OperationKind, SyncError};
use crate::event::{Event, Route, Target};
use crate::nested::NestedCollectionStore;
use crate::resource::{ResourceKind, PRACTICE_LEVELS};
use crate::store::{CollectionSyncStore, Completion, Lifetime, PreparedRequest, SyncStore};
use crate::view::{CollectionView, PracticeView, ScreenView, ViewModel};

#[derive(Debug, Default)]
pub enum Screen {
    #[default]
    None,
    Vocabulary(CollectionSyncStore),
    Listening {
        practice: NestedCollectionStore,
        quizzes: CollectionSyncStore,
        fill_blanks: CollectionSyncStore,
    },
}

#[derive(Debug, Default)]
pub struct Model {
    pub config: ApiConfig,
    pub route: Route,
    next_lifetime: Lifetime,
    pub categories: Option<CollectionSyncStore>,
    pub screen: Screen,
}

impl Model {
    fn mint_lifetime(&mut self) -> Lifetime {
        self.next_lifetime = self.next_lifetime.next();
        self.next_lifetime
    }

    fn flat_store(&mut self, target: Target) -> Option<&mut CollectionSyncStore> {
        match (target, &mut self.screen) {
            (Target::Categories, _) => self.categories.as_mut(),
            (Target::Vocabulary, Screen::Vocabulary(store)) => Some(store),
            (Target::Quizzes, Screen::Listening { quizzes, .. }) => Some(quizzes),
            (Target::FillBlanks, Screen::Listening { fill_blanks, .. }) => Some(fill_blanks),
            _ => None,
        }
    }

    fn practice(&mut self) -> Option<&mut NestedCollectionStore> {
        match &mut self.screen {
            Screen::Listening { practice, .. } => Some(practice),
            _ => None,
        }
    }

    fn sync_store(&mut self, target: Target) -> Option<&mut dyn SyncStore> {
        match target {
            Target::Practice => self.practice().map(|s| s as &mut dyn SyncStore),
            other => self.flat_store(other).map(|s| s as &mut dyn SyncStore),
        }
    }
}

#[derive(Default)]
pub struct App;

impl App {
    fn dispatch(target: Target, lifetime: Lifetime, prepared: PreparedRequest, caps: &Capabilities) {
        let PreparedRequest { op, request } = prepared;
        debug!(
            %target,
            op = %op.as_str(),
            method = %request.method(),
            url = request.url().as_str(),
            "dispatching request"
        );
        request
            .into_builder(&caps.http)
            .send(move |result| Event::Responded {
                target,
                lifetime,
                op,
                result: Box::new(result),
            });
    }

    /// Sends the request when the intent was accepted. Rejected intents are
    /// already recorded on the store.
    fn send(
        target: Target,
        lifetime: Lifetime,
        prepared: Result<PreparedRequest, SyncError>,
        caps: &Capabilities,
    ) {
        match prepared {
            Ok(prepared) => Self::dispatch(target, lifetime, prepared, caps),
            Err(e) => debug!(%target, code = e.code(), "no request sent"),
        }
    }

    fn with_flat<F>(model: &mut Model, target: Target, caps: &Capabilities, intent: F)
    where
        F: FnOnce(&mut CollectionSyncStore) -> Result<PreparedRequest, SyncError>,
    {
        if target == Target::Practice {
            warn!("item intents for practice need a level");
            return;
        }
        match model.flat_store(target) {
            Some(store) => {
                let lifetime = store.lifetime();
                let prepared = intent(store);
                Self::send(target, lifetime, prepared, caps);
            }
            None => warn!(%target, route = %model.route, "intent for a store that is not mounted"),
        }
    }

    fn with_practice<F>(model: &mut Model, caps: &Capabilities, intent: F)
    where
        F: FnOnce(&mut NestedCollectionStore) -> Result<PreparedRequest, SyncError>,
    {
        match model.practice() {
            Some(store) => {
                let lifetime = store.lifetime();
                let prepared = intent(store);
                Self::send(Target::Practice, lifetime, prepared, caps);
            }
            None => warn!(route = %model.route, "practice intent outside a listening topic"),
        }
    }

    fn mount_categories(model: &mut Model, caps: &Capabilities) {
        let lifetime = model.mint_lifetime();
        let mut store = CollectionSyncStore::new(
            ResourceKind::Categories.descriptor(),
            model.config.clone(),
            "",
            lifetime,
        );
        let prepared = store.begin_load();
        model.categories = Some(store);
        Self::send(Target::Categories, lifetime, prepared, caps);
    }

    /// Drops the current screen's stores and mounts fresh ones for `route`.
    fn mount(model: &mut Model, route: Route, caps: &Capabilities) {
        info!(from = %model.route, to = %route, "navigating");
        model.route = route.clone();
        model.screen = Screen::None;

        match route {
            Route::Dashboard => {}
            Route::Vocabulary { category } => {
                let lifetime = model.mint_lifetime();
                let mut store = CollectionSyncStore::new(
                    ResourceKind::Vocabulary.descriptor(),
                    model.config.clone(),
                    category,
                    lifetime,
                );
                let prepared = store.begin_load();
                model.screen = Screen::Vocabulary(store);
                Self::send(Target::Vocabulary, lifetime, prepared, caps);
            }
            Route::Listening { topic } => {
                let config = model.config.clone();
                let (practice_life, quiz_life, blank_life) =
                    (model.mint_lifetime(), model.mint_lifetime(), model.mint_lifetime());

                let mut practice =
                    NestedCollectionStore::new(&PRACTICE_LEVELS, config.clone(), &topic, practice_life);
                let mut quizzes = CollectionSyncStore::new(
                    ResourceKind::Quizzes.descriptor(),
                    config.clone(),
                    &topic,
                    quiz_life,
                );
                let mut fill_blanks = CollectionSyncStore::new(
                    ResourceKind::FillBlanks.descriptor(),
                    config,
                    &topic,
                    blank_life,
                );

                let loads = [
                    (Target::Practice, practice_life, practice.begin_load()),
                    (Target::Quizzes, quiz_life, quizzes.begin_load()),
                    (Target::FillBlanks, blank_life, fill_blanks.begin_load()),
                ];
                model.screen = Screen::Listening {
                    practice,
                    quizzes,
                    fill_blanks,
                };
                for (target, lifetime, prepared) in loads {
                    Self::send(target, lifetime, prepared, caps);
                }
            }
        }
    }

    fn on_completion(model: &mut Model, target: Target, completion: Completion, caps: &Capabilities) {
        if let Some(follow_up) = completion.follow_up.clone() {
            if let Some(store) = model.sync_store(target) {
                let lifetime = store.lifetime();
                Self::dispatch(target, lifetime, follow_up, caps);
            }
        }

        if target != Target::Categories || !completion.succeeded() {
            return;
        }
        let ErrorScope::Item { id } = &completion.scope else {
            return;
        };
        let open = matches!(&model.route, Route::Vocabulary { category } if category == id.as_str());
        if !open {
            return;
        }

        let next = match (completion.operation, &completion.renamed_to) {
            (OperationKind::Remove, _) => {
                info!(category = %id, "open category deleted");
                Some(Route::Dashboard)
            }
            (OperationKind::Update, Some(new_name)) if new_name != id.as_str() => {
                info!(from = %id, to = %new_name, "open category renamed");
                Some(Route::Vocabulary {
                    category: new_name.clone(),
                })
            }
            _ => None,
        };
        if let Some(route) = next {
            Self::mount(model, route, caps);
        }
    }
}

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        if event.is_user_initiated() {
            debug!(event = event.name(), "user intent");
        }

        match event {
            Event::AppStarted { config } => {
                model.config = match config {
                    Some(config) => config,
                    None => ApiConfig::from_env().unwrap_or_else(|e| {
                        warn!(error = %e, "invalid API configuration in environment, using defaults");
                        ApiConfig::default()
                    }),
                };
                info!(base_url = model.config.base_url(), "app started");
                Self::mount_categories(model, caps);
                let route = model.route.clone();
                Self::mount(model, route, caps);
            }

            Event::Navigate(route) => Self::mount(model, route, caps),

            Event::Reload(Target::Practice) => {
                Self::with_practice(model, caps, NestedCollectionStore::begin_load);
            }
            Event::Reload(target) => {
                Self::with_flat(model, target, caps, CollectionSyncStore::begin_load);
            }

            Event::Add { target, payload } => {
                Self::with_flat(model, target, caps, |store| store.begin_add(&payload));
            }
            Event::Update {
                target,
                id,
                payload,
            } => {
                Self::with_flat(model, target, caps, |store| store.begin_update(&id, &payload));
            }
            Event::Remove { target, id } => {
                Self::with_flat(model, target, caps, |store| store.begin_remove(&id));
            }

            Event::AddLevel { name } => {
                Self::with_practice(model, caps, |store| store.begin_add_level(&name));
            }
            Event::RenameLevel { from, to } => {
                Self::with_practice(model, caps, |store| store.begin_edit_level(&from, &to));
            }
            Event::RemoveLevel { name } => {
                Self::with_practice(model, caps, |store| store.begin_remove_level(&name));
            }
            Event::AddToLevel { level, payload } => {
                Self::with_practice(model, caps, |store| store.begin_add_in_level(&level, &payload));
            }
            Event::UpdateInLevel { level, id, payload } => {
                Self::with_practice(model, caps, |store| {
                    store.begin_update_in_level(&level, &id, &payload)
                });
            }
            Event::RemoveFromLevel { level, id } => {
                Self::with_practice(model, caps, |store| store.begin_remove_in_level(&level, &id));
            }

            Event::DismissErrors { target } => {
                if let Some(store) = model.sync_store(target) {
                    store.dismiss_errors();
                }
            }

            Event::Responded {
                target,
                lifetime,
                op,
                result,
            } => {
                let completion = match model.sync_store(target) {
                    Some(store) if store.lifetime() == lifetime => store.finish(&op, *result),
                    _ => {
                        debug!(%target, op = %op.as_str(), "stale response dropped");
                        None
                    }
                };
                if let Some(completion) = completion {
                    Self::on_completion(model, target, completion, caps);
                }
            }
        }

        caps.render.render();
    }

    fn view(&self, model: &Model) -> ViewModel {
        let config = &model.config;
        let screen = match &model.screen {
            Screen::None => ScreenView::Dashboard,
            Screen::Vocabulary(store) => ScreenView::Vocabulary {
                category: store.key().to_string(),
                words: CollectionView::new(store, config),
            },
            Screen::Listening {
                practice,
                quizzes,
                fill_blanks,
            } => ScreenView::Listening {
                topic: practice.key().to_string(),
                practice: PracticeView::new(practice, config),
                quizzes: CollectionView::new(quizzes, config),
                fill_blanks: CollectionView::new(fill_blanks, config),
            },
        };

        ViewModel {
            route: model.route.clone(),
            path: model.route.to_string(),
            sidebar: model
                .categories
                .as_ref()
                .map(|store| CollectionView::new(store, config)),
            screen,
        }
    }
}
