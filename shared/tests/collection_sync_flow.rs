mod common;

use common::{empty, header, http, reply, respond, send, started, take, text};
use crux_http::protocol::HttpResult;
use lingo_core::view::{CollectionView, ScreenView, Status};
use lingo_core::{Attachment, Effect, Event, ItemId, Model, Payload, Route, Target};
use serde_json::json;

fn words(app: &common::Tester, model: &Model) -> CollectionView {
    match app.view(model).screen {
        ScreenView::Vocabulary { words, .. } => words,
        other => panic!("expected vocabulary screen, got {other:?}"),
    }
}

fn word_list(view: &CollectionView) -> Vec<String> {
    view.items
        .iter()
        .map(|item| item.attributes["word"].as_str().unwrap_or_default().to_string())
        .collect()
}

/// Opens the `fruits` category with `apple` loaded.
fn fruits_with_apple() -> (common::Tester, Model) {
    let (app, mut model) = started(json!({"fruits": [{}], "animals": []}));
    let mut requests = send(
        &app,
        &mut model,
        Event::Navigate(Route::Vocabulary {
            category: "fruits".into(),
        }),
    );
    let load = take(&mut requests, "GET", "/api/vocabulary/fruits");
    respond(
        &app,
        &mut model,
        load,
        reply(
            200,
            json!([{"_id": "1", "word": "apple", "pronunciation": "/ˈæp.əl/",
                    "meaning": "a fruit", "example": "An apple a day.", "image": "/uploads/apple.png"}]),
        ),
    );
    (app, model)
}

fn banana() -> Payload {
    Payload::new()
        .with_text("word", "banana")
        .with_text("pronunciation", "/bəˈnɑːnə/")
        .with_text("meaning", "a long fruit")
        .with_text("example", "Monkeys like bananas.")
        .with_attachment(Attachment::new("image", "banana.png", "image/png", vec![0x89, 0x50, 0x4e, 0x47]))
}

#[test]
fn test_load_category_shows_words() {
    let (app, model) = fruits_with_apple();
    let view = words(&app, &model);

    assert_eq!(view.status, Status::Ready);
    assert_eq!(word_list(&view), vec!["apple"]);
    assert_eq!(
        view.items[0].media_url.as_deref(),
        Some("http://localhost:3005/uploads/apple.png")
    );
    assert_eq!(view.items[0].edit_values["meaning"], json!("a fruit"));
    assert_eq!(app.view(&model).path, "/vocabulary/fruits");
}

#[test]
fn test_missing_category_is_empty_not_error() {
    let (app, mut model) = started(json!({}));
    let mut requests = send(
        &app,
        &mut model,
        Event::Navigate(Route::Vocabulary {
            category: "nonexistent".into(),
        }),
    );
    let load = take(&mut requests, "GET", "/vocabulary/nonexistent");
    respond(&app, &mut model, load, empty(404));

    let view = words(&app, &model);
    assert_eq!(view.status, Status::Ready);
    assert!(view.items.is_empty());
    assert!(view.load_error.is_none());
}

#[test]
fn test_add_then_reconcile_does_not_duplicate() {
    let (app, mut model) = fruits_with_apple();

    let mut requests = send(
        &app,
        &mut model,
        Event::Add {
            target: Target::Vocabulary,
            payload: banana(),
        },
    );
    let post = take(&mut requests, "POST", "/api/vocabulary/fruits");
    let content_type = header(&post, "content-type").unwrap_or_default();
    assert!(content_type.starts_with("multipart/form-data"));
    assert!(words(&app, &model).is_syncing);

    let mut follow_up = respond(
        &app,
        &mut model,
        post,
        reply(201, json!({"_id": "2", "word": "banana", "meaning": "a long fruit"})),
    );
    assert_eq!(word_list(&words(&app, &model)), vec!["apple", "banana"]);

    let reconcile = take(&mut follow_up, "GET", "/api/vocabulary/fruits");
    respond(
        &app,
        &mut model,
        reconcile,
        reply(
            200,
            json!([{"_id": "1", "word": "apple"}, {"_id": "2", "word": "banana"}]),
        ),
    );

    let view = words(&app, &model);
    assert_eq!(word_list(&view), vec!["apple", "banana"]);
    assert!(!view.is_syncing);
    assert!(view.errors.is_empty());
}

#[test]
fn test_failed_update_keeps_list_and_scopes_error() {
    let (app, mut model) = fruits_with_apple();
    let before = words(&app, &model).items;

    let mut requests = send(
        &app,
        &mut model,
        Event::Update {
            target: Target::Vocabulary,
            id: ItemId::new("1"),
            payload: Payload::new().with_text("meaning", "a fruit"),
        },
    );
    let put = take(&mut requests, "PUT", "/api/vocabulary/fruits/1");
    assert!(words(&app, &model).items[0].busy);

    let follow_up = respond(
        &app,
        &mut model,
        put,
        reply(500, json!({"message": "Database unavailable"})),
    );
    assert!(follow_up.is_empty());

    let view = words(&app, &model);
    let after: Vec<_> = view.items.iter().map(|i| (&i.id, &i.attributes)).collect();
    let expected: Vec<_> = before.iter().map(|i| (&i.id, &i.attributes)).collect();
    assert_eq!(after, expected);
    assert_eq!(view.status, Status::Ready);

    let error = &view.errors[0];
    assert_eq!(error.message, "Database unavailable");
    assert_eq!(error.status, Some(500));
    assert_eq!(
        error.scope.as_ref().and_then(|s| s.item_id()),
        Some(&ItemId::new("1"))
    );

    send(
        &app,
        &mut model,
        Event::DismissErrors {
            target: Target::Vocabulary,
        },
    );
    assert!(words(&app, &model).errors.is_empty());
}

#[test]
fn test_remove_drops_item() {
    let (app, mut model) = fruits_with_apple();
    let mut requests = send(
        &app,
        &mut model,
        Event::Add {
            target: Target::Vocabulary,
            payload: banana(),
        },
    );
    let post = take(&mut requests, "POST", "/vocabulary/fruits");
    let mut follow_up = respond(&app, &mut model, post, reply(201, json!({"_id": "2", "word": "banana"})));
    let reconcile = take(&mut follow_up, "GET", "/vocabulary/fruits");
    respond(
        &app,
        &mut model,
        reconcile,
        reply(200, json!([{"_id": "1", "word": "apple"}, {"_id": "2", "word": "banana"}])),
    );

    let mut requests = send(
        &app,
        &mut model,
        Event::Remove {
            target: Target::Vocabulary,
            id: ItemId::new("1"),
        },
    );
    let delete = take(&mut requests, "DELETE", "/api/vocabulary/fruits/1");
    assert!(http(&delete).body.is_empty());
    respond(&app, &mut model, delete, reply(200, json!({"message": "Deleted"})));

    let view = words(&app, &model);
    assert_eq!(view.items.len(), 1);
    assert!(view.items.iter().all(|i| i.id != ItemId::new("1")));
}

#[test]
fn test_plain_text_delete_after_failed_reload() {
    let (app, mut model) = started(json!({}));
    let mut requests = send(
        &app,
        &mut model,
        Event::Navigate(Route::Vocabulary {
            category: "fruits".into(),
        }),
    );
    let load = take(&mut requests, "GET", "/vocabulary/fruits");
    respond(
        &app,
        &mut model,
        load,
        reply(200, json!([{"_id": "1", "word": "apple"}, {"_id": "2", "word": "pear"}])),
    );

    let mut requests = send(&app, &mut model, Event::Reload(Target::Vocabulary));
    let reload = take(&mut requests, "GET", "/vocabulary/fruits");
    respond(&app, &mut model, reload, HttpResult::Err(crux_http::Error::Io("offline".into())));
    assert_eq!(words(&app, &model).status, Status::Error);

    let mut requests = send(
        &app,
        &mut model,
        Event::Remove {
            target: Target::Vocabulary,
            id: ItemId::new("1"),
        },
    );
    let delete = take(&mut requests, "DELETE", "/api/vocabulary/fruits/1");
    let mut follow_up = respond(&app, &mut model, delete, text(200, "Deleted"));

    let view = words(&app, &model);
    assert_eq!(view.status, Status::Ready);
    assert_eq!(word_list(&view), vec!["pear"]);
    assert!(view.errors.is_empty());
    assert!(view.load_error.is_none());
    take(&mut follow_up, "GET", "/api/vocabulary/fruits");
}

#[test]
fn test_validation_failure_sends_nothing() {
    let (app, mut model) = fruits_with_apple();
    let update = app.update(
        Event::Add {
            target: Target::Vocabulary,
            payload: Payload::new().with_text("word", "kiwi"),
        },
        &mut model,
    );
    assert!(update.effects.iter().all(|e| matches!(e, Effect::Render(_))));
    let view = words(&app, &model);
    assert_eq!(view.errors[0].code, "VALIDATION_FAILED");
    assert_eq!(word_list(&view), vec!["apple"]);
}

#[test]
fn test_offline_load_reports_network_error() {
    let (app, mut model) = started(json!({}));
    let mut requests = send(
        &app,
        &mut model,
        Event::Navigate(Route::Vocabulary {
            category: "fruits".into(),
        }),
    );
    let load = take(&mut requests, "GET", "/vocabulary/fruits");
    respond(
        &app,
        &mut model,
        load,
        HttpResult::Err(crux_http::Error::Timeout),
    );
    let view = words(&app, &model);
    assert_eq!(view.status, Status::Error);
    assert_eq!(view.load_error.unwrap().code, "NETWORK_UNAVAILABLE");
}

#[test]
fn test_response_after_navigation_is_dropped() {
    let (app, mut model) = started(json!({}));
    let mut requests = send(
        &app,
        &mut model,
        Event::Navigate(Route::Vocabulary {
            category: "fruits".into(),
        }),
    );
    let stale = take(&mut requests, "GET", "/vocabulary/fruits");

    let mut requests = send(
        &app,
        &mut model,
        Event::Navigate(Route::Vocabulary {
            category: "animals".into(),
        }),
    );
    let current = take(&mut requests, "GET", "/vocabulary/animals");

    respond(&app, &mut model, stale, reply(200, json!([{"_id": "1", "word": "apple"}])));
    let view = words(&app, &model);
    assert_eq!(view.key, "animals");
    assert_eq!(view.status, Status::Loading);
    assert!(view.items.is_empty());

    respond(&app, &mut model, current, reply(200, json!([{"_id": "9", "word": "cat"}])));
    assert_eq!(word_list(&words(&app, &model)), vec!["cat"]);
}

#[test]
fn test_deleting_open_category_returns_to_dashboard() {
    let (app, mut model) = fruits_with_apple();
    let mut requests = send(
        &app,
        &mut model,
        Event::Remove {
            target: Target::Categories,
            id: ItemId::new("fruits"),
        },
    );
    let delete = take(&mut requests, "DELETE", "/api/categories/fruits");
    respond(&app, &mut model, delete, reply(200, json!({"message": "Category deleted"})));

    let view = app.view(&model);
    assert_eq!(view.route, Route::Dashboard);
    assert_eq!(view.path, "/");
    assert!(matches!(view.screen, ScreenView::Dashboard));
    let sidebar = view.sidebar.unwrap();
    let names: Vec<_> = sidebar.items.iter().map(|i| i.id.as_str().to_string()).collect();
    assert_eq!(names, vec!["animals"]);
}

#[test]
fn test_renaming_open_category_follows_new_name() {
    let (app, mut model) = fruits_with_apple();
    let mut requests = send(
        &app,
        &mut model,
        Event::Update {
            target: Target::Categories,
            id: ItemId::new("fruits"),
            payload: Payload::new().with_text("newCategory", "produce"),
        },
    );
    let put = take(&mut requests, "PUT", "/api/categories/fruits");
    let body: serde_json::Value = serde_json::from_slice(&http(&put).body)
        .unwrap_or_default();
    assert_eq!(body, json!({"newCategory": "produce"}));

    let mut follow_up = respond(&app, &mut model, put, reply(200, json!({"message": "Category updated"})));
    let reconcile = take(&mut follow_up, "GET", "/api/vocabulary/categories");
    let load = take(&mut follow_up, "GET", "/api/vocabulary/produce");

    assert_eq!(
        app.view(&model).route,
        Route::Vocabulary {
            category: "produce".into()
        }
    );

    respond(&app, &mut model, reconcile, reply(200, json!({"produce": [{}], "animals": []})));
    respond(&app, &mut model, load, reply(200, json!([{"_id": "1", "word": "apple"}])));
    assert_eq!(word_list(&words(&app, &model)), vec!["apple"]);
}

#[test]
fn test_add_category_from_sidebar() {
    let (app, mut model) = started(json!({"fruits": []}));
    let mut requests = send(
        &app,
        &mut model,
        Event::Add {
            target: Target::Categories,
            payload: Payload::new().with_text("category", "animals"),
        },
    );
    let post = take(&mut requests, "POST", "/api/categories");
    let mut follow_up = respond(&app, &mut model, post, reply(201, json!({"message": "Category created"})));
    let reconcile = take(&mut follow_up, "GET", "/api/vocabulary/categories");
    respond(&app, &mut model, reconcile, reply(200, json!({"fruits": [], "animals": []})));

    let sidebar = app.view(&model).sidebar.unwrap();
    let names: Vec<_> = sidebar.items.iter().map(|i| i.id.as_str().to_string()).collect();
    assert_eq!(names, vec!["fruits", "animals"]);
}

#[test]
fn test_intent_for_unmounted_screen_is_ignored() {
    let (app, mut model) = started(json!({}));
    let requests = send(
        &app,
        &mut model,
        Event::Remove {
            target: Target::Quizzes,
            id: ItemId::new("0"),
        },
    );
    assert!(requests.is_empty());
}
