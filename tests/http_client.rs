use log::Level;
use qakit::http::{
    CallOptions, HttpClient, HttpConfig, HttpError, HttpResponse, Interceptor, LoadTestExtras, Method, Reply, RequestOptions,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

mod common;
use common::capture_logger::{self, find};
use common::fake_transport::{FakeLoadTest, FakeTransport, Unreachable};

fn client_with(transport: &FakeTransport) -> HttpClient {
    capture_logger::install();
    HttpClient::new("http://svc/api/", HttpConfig::default()).with_transport(transport.clone())
}

#[test]
fn error_status_runs_every_handler_before_failing() {
    let transport = FakeTransport::new().reply(500, r#"{"msg": "boom"}"#);
    let mut client = client_with(&transport);
    let seen = Arc::new(Mutex::new(Vec::new()));
    for name in ["first", "second"] {
        let seen = seen.clone();
        client.add_response_handler(move |response| {
            seen.lock().unwrap().push((name, response.status));
            Ok(())
        });
    }

    let result = client.get("orders", None);

    assert!(matches!(result, Err(HttpError::Status { status: 500, ref url }) if url == "http://svc/api/orders"));
    assert_eq!(*seen.lock().unwrap(), vec![("first", 500), ("second", 500)]);
}

#[test]
fn first_handler_error_wins_after_all_handlers_ran() {
    let transport = FakeTransport::new().reply(200, "{}");
    let mut client = client_with(&transport);
    let ran = Arc::new(Mutex::new(0));

    client.add_response_handler(|_| Err(HttpError::Handler("first".into())));
    client.add_response_handler(|_| Err(HttpError::Handler("second".into())));
    let counter = ran.clone();
    client.add_response_handler(move |_| {
        *counter.lock().unwrap() += 1;
        Ok(())
    });

    let result = client.get("orders", None);
    assert!(matches!(result, Err(HttpError::Handler(ref m)) if m == "first"));
    assert_eq!(*ran.lock().unwrap(), 1);
}

#[test]
fn redirects_are_not_errors() {
    let transport = FakeTransport::new().reply(302, "{}");
    let mut client = client_with(&transport);
    let reply = client.get("moved", None).unwrap();
    assert_eq!(reply.response().map(|r| r.status), Some(302));
}

#[test]
fn undecodable_json_is_logged_and_returned_as_an_error() {
    let transport = FakeTransport::new().reply(200, "<html>oops</html>");
    let mut client = client_with(&transport);
    let json_handler_ran = Arc::new(Mutex::new(false));
    let flag = json_handler_ran.clone();
    client.add_json_handler(move |_| {
        *flag.lock().unwrap() = true;
        Ok(())
    });

    let result = client.get("page", None);

    assert!(matches!(result, Err(HttpError::Decode(_))));
    assert!(!*json_handler_ran.lock().unwrap());
    let logged = find("convert response to json fail");
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].level, Level::Error);
}

#[test]
fn raw_calls_skip_decoding() {
    let transport = FakeTransport::new().reply(200, "plain text");
    let mut client = client_with(&transport);

    let reply = client.call_api("health", Method::GET, None, CallOptions::raw()).unwrap();

    match reply {
        Reply::Response { response, json } => {
            assert_eq!(response.text(), "plain text");
            assert_eq!(json, None);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(find("got response")[0].field("is_json_format"), Some("false"));
}

#[test]
fn json_handlers_see_the_decoded_body() {
    let transport = FakeTransport::new().reply(200, r#"{"code": 7}"#);
    let mut client = client_with(&transport);
    let codes = Arc::new(Mutex::new(Vec::new()));
    let sink = codes.clone();
    client.add_json_handler(move |body| {
        sink.lock().unwrap().push(body["code"].clone());
        Ok(())
    });
    client.add_json_handler(|body| match body["code"].as_i64() {
        Some(0) => Ok(()),
        _ => Err(HttpError::Handler(format!("business error {}", body["code"]))),
    });

    let result = client.get("orders", None);

    assert!(matches!(result, Err(HttpError::Handler(ref m)) if m == "business error 7"));
    assert_eq!(*codes.lock().unwrap(), vec![json!(7)]);
}

#[test]
fn per_call_interceptor_beats_the_client_interceptor() {
    let transport = FakeTransport::new().reply(200, r#"{"data": {"id": 1}}"#).reply(200, r#"{"data": {"id": 2}}"#);
    let mut client = client_with(&transport);
    client.set_interceptor(Some(Arc::new(|_: &HttpResponse, json: Option<&Value>| {
        json.map(|j| j["data"].clone()).unwrap_or(Value::Null)
    })));
    let status_only: Interceptor = Arc::new(|response: &HttpResponse, _: Option<&Value>| json!(response.status));

    let by_client = client.get("a", None).unwrap();
    let by_call = client
        .call_api("b", Method::GET, None, CallOptions::default().with_interceptor(status_only))
        .unwrap();

    assert_eq!(by_client, Reply::Intercepted(json!({"id": 1})));
    assert_eq!(by_call, Reply::Intercepted(json!(200)));
    assert_eq!(by_client.json(), Some(&json!({"id": 1})));
}

#[test]
fn options_merge_over_the_client_defaults() {
    capture_logger::install();
    let transport = FakeTransport::new();
    let config = HttpConfig::default()
        .with_elastic_env_flag("feature-1")
        .with_defaults(RequestOptions::new().header("a", "1").query("lang", "en"));
    let mut client = HttpClient::new("http://svc/", config).with_transport(transport.clone());
    client.defaults_mut().headers.insert("token".into(), "t0".into());

    let per_call = RequestOptions::new()
        .header("a", "2")
        .header("b", "3")
        .timeout(Duration::from_secs(5))
        .json(json!({"name": "x"}));
    client.post("/v1/users/", Some(&per_call)).unwrap();

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    let request = &sent[0];
    assert_eq!(request.method, Method::POST);
    assert_eq!(request.url, "http://svc/v1/users/");
    let headers = &request.options.headers;
    assert_eq!(headers.get("x-env-flag").map(String::as_str), Some("feature-1"));
    assert_eq!(headers.get("a").map(String::as_str), Some("2"));
    assert_eq!(headers.get("b").map(String::as_str), Some("3"));
    assert_eq!(headers.get("token").map(String::as_str), Some("t0"));
    assert_eq!(request.options.query.get("lang").map(String::as_str), Some("en"));
    assert_eq!(request.options.timeout, Some(Duration::from_secs(5)));
    assert_eq!(request.options.json, Some(json!({"name": "x"})));

    // Per-call options never leak into the defaults.
    assert_eq!(client.defaults().headers.get("a").map(String::as_str), Some("1"));
    assert_eq!(client.defaults().timeout, Some(Duration::from_secs(90)));
}

#[test]
fn per_call_form_replaces_a_default_json_body() {
    capture_logger::install();
    let transport = FakeTransport::new();
    let config = HttpConfig::default().with_defaults(RequestOptions::new().json(json!({"tenant": "t1"})));
    let mut client = HttpClient::new("http://svc/", config).with_transport(transport.clone());

    client.post("login", Some(&RequestOptions::new().form("user", "qa"))).unwrap();
    client.post("login", None).unwrap();

    let sent = transport.sent();
    assert_eq!(sent[0].options.json, None);
    assert_eq!(sent[0].options.form.get("user").map(String::as_str), Some("qa"));
    assert_eq!(sent[1].options.json, Some(json!({"tenant": "t1"})));
}

#[test]
fn every_exchange_is_logged_with_its_request_id() {
    let transport = FakeTransport::new().reply(201, r#"{"ok": true}"#);
    let mut client = client_with(&transport);

    client
        .put("items/1", Some(&RequestOptions::new().query("dry_run", "1")))
        .unwrap();

    let start = find("start request").remove(0);
    let done = find("got response").remove(0);
    assert_eq!(start.field("method"), Some("PUT"));
    assert_eq!(start.field("url"), Some("http://svc/api/items/1"));
    assert!(start.field("parameters").unwrap().contains("dry_run"));
    assert_eq!(done.field("status_code"), Some("201"));
    assert_eq!(done.field("response"), Some(r#"{"ok": true}"#));
    assert_eq!(done.field("is_json_format"), Some("true"));
    assert!(done.field_u64("latency").is_some());
    assert_eq!(start.field("request_id"), done.field("request_id"));
}

#[test]
fn request_ids_increase() {
    let transport = FakeTransport::new();
    let mut client = client_with(&transport);
    client.get("a", None).unwrap();
    client.get("b", None).unwrap();

    let ids: Vec<u64> = find("start request")
        .iter()
        .map(|r| r.field_u64("request_id").unwrap())
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(ids[0] < ids[1]);
}

#[test]
fn logging_can_be_disabled_per_call() {
    let transport = FakeTransport::new().reply(200, "not json");
    let mut client = client_with(&transport);

    let result = client.call_api("upload", Method::POST, None, CallOptions::default().without_log());

    assert!(matches!(result, Err(HttpError::Decode(_))));
    assert!(find("start request").is_empty());
    assert!(find("got response").is_empty());
    assert!(find("convert response to json fail").is_empty());
}

#[test]
fn load_test_mode_bypasses_the_pipeline() {
    let transport = FakeTransport::new();
    let mut client = client_with(&transport);
    let harness = FakeLoadTest::default();
    let handler_calls = Arc::new(Mutex::new(0));
    let counter = handler_calls.clone();
    client.add_response_handler(move |_| {
        *counter.lock().unwrap() += 1;
        Ok(())
    });

    client.enable_load_test(harness.clone());
    assert!(client.on_performance_test());

    let call = CallOptions::default().with_load_test(LoadTestExtras::named("list orders"));
    let reply = client.call_api("orders", Method::GET, None, call.clone()).unwrap();
    // The harness answered "not json"; nothing tried to decode it.
    assert_eq!(reply.json(), None);

    client.inject_load_test(LoadTestExtras::named("injected").catch_response(true));
    client.call_api("orders", Method::GET, None, call.clone()).unwrap();
    client.call_api("orders", Method::GET, None, call).unwrap();

    let calls = harness.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0].0, "http://svc/api/orders");
    assert_eq!(calls[0].1, LoadTestExtras::named("list orders"));
    assert_eq!(calls[1].1, LoadTestExtras::named("injected").catch_response(true));
    assert_eq!(calls[2].1, LoadTestExtras::named("list orders"));

    assert!(transport.sent().is_empty());
    assert_eq!(*handler_calls.lock().unwrap(), 0);
    assert!(find("start request").is_empty());

    client.disable_load_test();
    client.get("orders", None).unwrap();
    assert_eq!(transport.sent().len(), 1);
    assert_eq!(*handler_calls.lock().unwrap(), 1);
}

#[test]
fn transport_failures_are_logged_and_propagated() {
    capture_logger::install();
    let mut client = HttpClient::new("http://down", HttpConfig::default()).with_transport(Unreachable);

    let result = client.delete("x", None);

    assert!(matches!(result, Err(HttpError::Transport(_))));
    assert_eq!(find("request to http://down/x failed")[0].level, Level::Error);
}
