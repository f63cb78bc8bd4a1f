#![allow(dead_code)]

use crux_core::testing::AppTester;
use crux_core::Request;
use crux_http::protocol::{HttpRequest, HttpResponse, HttpResult};
use lingo_core::{ApiConfig, App, Effect, Event, Model};
use serde_json::Value;

pub type Tester = AppTester<App, Effect>;
pub type ApiRequest = Request<HttpRequest>;

pub fn http(request: &ApiRequest) -> &HttpRequest {
    &request.operation
}

pub fn header<'a>(request: &'a ApiRequest, name: &str) -> Option<&'a str> {
    http(request)
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

pub fn api_requests(effects: Vec<Effect>) -> Vec<ApiRequest> {
    effects
        .into_iter()
        .filter_map(|effect| match effect {
            Effect::Http(request) => Some(request),
            _ => None,
        })
        .collect()
}

/// Sends `event` and returns the HTTP requests it produced.
pub fn send(app: &Tester, model: &mut Model, event: Event) -> Vec<ApiRequest> {
    api_requests(app.update(event, model).effects)
}

/// Resolves `request` and feeds the resulting events back into the app.
/// Returns follow-up requests.
pub fn respond(
    app: &Tester,
    model: &mut Model,
    mut request: ApiRequest,
    result: HttpResult,
) -> Vec<ApiRequest> {
    let update = app.resolve(&mut request, result).expect("request resolves");
    let mut next = Vec::new();
    for event in update.events {
        next.extend(send(app, model, event));
    }
    next
}

pub fn reply(status: u16, body: Value) -> HttpResult {
    HttpResult::Ok(HttpResponse::status(status).json(body).build())
}

pub fn text(status: u16, body: &str) -> HttpResult {
    HttpResult::Ok(HttpResponse::status(status).body(body).build())
}

pub fn empty(status: u16) -> HttpResult {
    HttpResult::Ok(HttpResponse::status(status).build())
}

/// Removes the first pending request with `method` whose URL ends with
/// `suffix`.
pub fn take(requests: &mut Vec<ApiRequest>, method: &str, suffix: &str) -> ApiRequest {
    let index = requests
        .iter()
        .position(|r| http(r).method == method && http(r).url.ends_with(suffix))
        .unwrap_or_else(|| {
            let seen: Vec<_> = requests
                .iter()
                .map(|r| format!("{} {}", http(r).method, http(r).url))
                .collect();
            panic!("no {method} request ending with {suffix}; pending: {seen:?}")
        });
    requests.remove(index)
}

/// Starts the app and answers the sidebar category fetch.
pub fn started(categories: Value) -> (Tester, Model) {
    let app = Tester::default();
    let mut model = Model::default();
    let mut requests = send(
        &app,
        &mut model,
        Event::AppStarted {
            config: Some(ApiConfig::default()),
        },
    );
    let sidebar = take(&mut requests, "GET", "/api/vocabulary/categories");
    assert!(requests.is_empty());
    respond(&app, &mut model, sidebar, reply(200, categories));
    (app, model)
}
