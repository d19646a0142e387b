//! End-to-end pipeline tests over the in-memory transport
//!
//! Every scenario here drives the full state machine: entry, body write,
//! flush, content read, validation and completion.

use std::io::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use quiver_engine::prelude::*;
use quiver_engine::transport::memory::{MemoryTransport, ScriptedReply};

fn engine_with(replies: Vec<ScriptedReply>) -> (Arc<MemoryTransport>, Engine) {
    engine_with_config(replies, EngineConfig::default())
}

fn engine_with_config(
    replies: Vec<ScriptedReply>,
    config: EngineConfig,
) -> (Arc<MemoryTransport>, Engine) {
    let transport = Arc::new(MemoryTransport::new());
    for reply in replies {
        transport.push_reply(reply);
    }
    let engine = Engine::builder()
        .transport(Arc::clone(&transport) as Arc<dyn Transport>)
        .config(config)
        .build()
        .expect("engine builds");
    (transport, engine)
}

fn json_reply(body: &str) -> ScriptedReply {
    ScriptedReply::new(StatusCode::OK, body.to_string())
        .header(http::header::CONTENT_TYPE, "application/json")
}

fn scratch_path(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join("quiver-pipeline-tests");
    std::fs::create_dir_all(&dir).expect("scratch dir");
    dir.join(format!("{}-{name}", std::process::id()))
}

#[derive(Debug, PartialEq, serde::Deserialize)]
struct Answer {
    a: i64,
}

#[tokio::test]
async fn json_endpoint_materializes_typed_result() {
    let (_, engine) = engine_with(vec![json_reply(r#"{"a":1}"#)]);

    let request = Request::new(
        Method::GET,
        Url::parse("http://svc.test/answer").expect("url"),
    )
    .with_result(ResultKind::Json);
    let context = engine.send_async(request).await;

    assert!(context.is_success());
    assert_eq!(context.state(), State::Complete);
    assert!(context.fault().is_none());
    assert_eq!(
        context.result_as::<Answer>().expect("typed"),
        Answer { a: 1 }
    );
}

#[test]
fn blocking_send_replays_the_same_lifecycle() {
    let (_, engine) = engine_with(vec![json_reply(r#"{"a":1}"#)]);

    let request = Request::new(
        Method::GET,
        Url::parse("http://svc.test/answer").expect("url"),
    )
    .with_result(ResultKind::Json);
    let context = engine.send(request);

    assert!(context.is_success());
    assert_eq!(context.state(), State::Complete);
    assert_eq!(
        context.result_as::<Answer>().expect("typed"),
        Answer { a: 1 }
    );
}

#[tokio::test]
async fn http_level_failure_is_not_a_fault() {
    let (_, engine) = engine_with(vec![ScriptedReply::new(
        StatusCode::SERVICE_UNAVAILABLE,
        "maintenance",
    )
    .header(http::header::CONTENT_TYPE, "text/plain")]);

    let request = Request::new(
        Method::GET,
        Url::parse("http://svc.test/x").expect("url"),
    )
    .with_result(ResultKind::Text);
    let context = engine.send_async(request).await;

    assert!(!context.is_success());
    assert!(context.fault().is_none());
    let response = context.response().expect("response exists");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        response.reader().and_then(ContentReader::text),
        Some("maintenance")
    );
    assert_eq!(context.state(), State::Complete);
}

#[tokio::test]
async fn request_body_streams_through_with_progress() {
    let (transport, engine) = engine_with(vec![json_reply("{}")]);

    let snapshots: Arc<Mutex<Vec<(Direction, u64)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&snapshots);
    let request = Request::new(
        Method::POST,
        Url::parse("http://svc.test/upload").expect("url"),
    )
    .with_payload(Payload::Text("hello across the wire".into()));

    let mut context = engine
        .context(request)
        .with_progress(Arc::new(move |direction, snapshot| {
            sink.lock()
                .expect("lock")
                .push((direction, snapshot.bytes_passed));
        }));
    context.send_async().await.expect("send");

    assert!(context.is_success());
    let recorded = transport.recorded();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].body, b"hello across the wire");
    assert_eq!(
        recorded[0].outgoing.body_length,
        Some(b"hello across the wire".len() as i64)
    );
    assert_eq!(context.performance().bytes_sent(), 21);

    let events = snapshots.lock().expect("lock");
    let uploads: Vec<u64> = events
        .iter()
        .filter(|(direction, _)| *direction == Direction::Upload)
        .map(|(_, passed)| *passed)
        .collect();
    assert!(!uploads.is_empty());
    assert!(uploads.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(*uploads.last().expect("events"), 21);
}

#[tokio::test]
async fn get_requests_send_no_body_even_with_a_payload() {
    let (transport, engine) = engine_with(vec![json_reply("{}")]);

    let request = Request::new(
        Method::GET,
        Url::parse("http://svc.test/x").expect("url"),
    )
    .with_payload(Payload::Text("ignored".into()));
    let context = engine.send_async(request).await;

    assert!(context.is_success());
    let recorded = transport.recorded();
    assert!(recorded[0].body.is_empty());
    assert_eq!(recorded[0].outgoing.body_length, None);
}

#[tokio::test]
async fn gzip_bodies_are_decoded_before_materialization() {
    let mut encoder =
        flate2_write_gz(Vec::new());
    encoder.write_all(br#"{"a":7}"#).expect("encode");
    let compressed = encoder.finish().expect("finish");

    let reply = ScriptedReply::new(StatusCode::OK, compressed)
        .header(http::header::CONTENT_TYPE, "application/json")
        .header(http::header::CONTENT_ENCODING, "gzip");
    let (_, engine) = engine_with(vec![reply]);

    let request = Request::new(
        Method::GET,
        Url::parse("http://svc.test/z").expect("url"),
    )
    .with_result(ResultKind::Json);
    let context = engine.send_async(request).await;

    assert!(context.is_success());
    assert_eq!(
        context.result_as::<Answer>().expect("typed"),
        Answer { a: 7 }
    );
}

fn flate2_write_gz(sink: Vec<u8>) -> flate2::write::GzEncoder<Vec<u8>> {
    flate2::write::GzEncoder::new(sink, flate2::Compression::default())
}

#[tokio::test]
async fn resumed_download_sends_range_and_appends() {
    let path = scratch_path("resume.bin");
    tokio::fs::write(&path, b"01234").await.expect("seed");

    let reply = ScriptedReply::new(StatusCode::PARTIAL_CONTENT, "56789")
        .header(http::header::CONTENT_RANGE, "bytes 5-9/10");
    let (transport, engine) = engine_with(vec![reply]);

    let request = Request::new(
        Method::GET,
        Url::parse("http://files.test/data").expect("url"),
    )
    .with_result(ResultKind::File {
        path: path.clone(),
        resume: true,
    });
    let context = engine.send_async(request).await;

    assert!(context.is_success());
    let recorded = transport.recorded();
    assert_eq!(
        recorded[0]
            .outgoing
            .headers
            .get(http::header::RANGE)
            .and_then(|v| v.to_str().ok()),
        Some("bytes=5-")
    );
    let content = tokio::fs::read(&path).await.expect("file");
    assert_eq!(content, b"0123456789");
    assert!(matches!(
        context.result(),
        Some(Materialized::File { bytes_written: 5, .. })
    ));
}

#[tokio::test]
async fn range_not_satisfiable_completes_a_resumed_download() {
    let path = scratch_path("done.bin");
    tokio::fs::write(&path, b"all ten by").await.expect("seed");

    let reply = ScriptedReply::new(StatusCode::RANGE_NOT_SATISFIABLE, "ignored");
    let (_, engine) = engine_with(vec![reply]);

    let request = Request::new(
        Method::GET,
        Url::parse("http://files.test/data").expect("url"),
    )
    .with_result(ResultKind::File {
        path: path.clone(),
        resume: true,
    });
    let context = engine.send_async(request).await;

    assert!(context.is_success());
    // the pre-existing bytes were not clobbered
    let content = tokio::fs::read(&path).await.expect("file");
    assert_eq!(content, b"all ten by");
}

#[tokio::test]
async fn redirects_are_followed_by_resubmission() {
    let first = ScriptedReply::new(StatusCode::FOUND, "")
        .header(http::header::LOCATION, "/moved/here");
    let (transport, engine) = engine_with(vec![first, json_reply(r#"{"a":2}"#)]);

    let request = Request::new(
        Method::GET,
        Url::parse("http://svc.test/start").expect("url"),
    )
    .with_result(ResultKind::Json);
    let context = engine.send_async(request).await;

    assert!(context.is_success());
    assert_eq!(context.resubmit_count(), 1);
    let recorded = transport.recorded();
    assert_eq!(recorded.len(), 2);
    assert_eq!(recorded[1].outgoing.url.path(), "/moved/here");
    assert_eq!(
        context.result_as::<Answer>().expect("typed"),
        Answer { a: 2 }
    );
}

#[tokio::test]
async fn redirect_without_location_is_a_protocol_fault() {
    let (_, engine) = engine_with(vec![ScriptedReply::new(StatusCode::FOUND, "")]);

    let request = Request::new(
        Method::GET,
        Url::parse("http://svc.test/start").expect("url"),
    );
    let context = engine.send_async(request).await;

    assert!(!context.is_success());
    assert!(matches!(
        context.fault().map(Error::kind),
        Some(Kind::Protocol)
    ));
}

#[tokio::test]
async fn see_other_demotes_the_resubmitted_method_to_get() {
    let first = ScriptedReply::new(StatusCode::SEE_OTHER, "")
        .header(http::header::LOCATION, "/created");
    let (transport, engine) = engine_with(vec![first, json_reply("{}")]);

    let request = Request::new(
        Method::POST,
        Url::parse("http://svc.test/items").expect("url"),
    )
    .with_payload(Payload::Text("body".into()));
    let context = engine.send_async(request).await;

    assert!(context.is_success());
    let recorded = transport.recorded();
    assert_eq!(recorded[1].outgoing.method, Method::GET);
    assert!(recorded[1].body.is_empty());
}

#[tokio::test]
async fn cookies_persist_and_ride_the_next_request() {
    let first = ScriptedReply::new(StatusCode::OK, "")
        .header(http::header::SET_COOKIE, "sid=abc; Path=/");
    let (transport, engine) = engine_with(vec![first, json_reply("{}")]);

    let url = Url::parse("http://svc.test/login").expect("url");
    let _ = engine.send_async(Request::new(Method::GET, url.clone())).await;
    let _ = engine.send_async(Request::new(Method::GET, url)).await;

    let recorded = transport.recorded();
    assert_eq!(recorded.len(), 2);
    assert!(recorded[0].outgoing.headers.get(http::header::COOKIE).is_none());
    assert_eq!(
        recorded[1]
            .outgoing
            .headers
            .get(http::header::COOKIE)
            .and_then(|v| v.to_str().ok()),
        Some("sid=abc")
    );
}

#[tokio::test]
async fn ignore_mode_neither_sends_nor_stores_cookies() {
    let first = ScriptedReply::new(StatusCode::OK, "")
        .header(http::header::SET_COOKIE, "sid=abc");
    let (transport, engine) = engine_with(vec![first, json_reply("{}")]);

    let url = Url::parse("http://svc.test/x").expect("url");
    let _ = engine
        .send_async(Request::new(Method::GET, url.clone()).with_cookie_mode(CookieMode::Ignore))
        .await;
    let _ = engine.send_async(Request::new(Method::GET, url)).await;

    let recorded = transport.recorded();
    assert!(recorded[1].outgoing.headers.get(http::header::COOKIE).is_none());
}

#[tokio::test]
async fn validation_hook_veto_turns_success_into_failure() {
    let transport = Arc::new(MemoryTransport::new());
    transport.push_reply(json_reply("{}"));
    let mut builder = Engine::builder().transport(Arc::clone(&transport) as Arc<dyn Transport>);
    builder.hooks().validate_response(|ctx| {
        if ctx.response.headers().get("x-checksum").is_none() {
            HookAction::Fault(quiver_engine::error::content("missing checksum header"))
        } else {
            HookAction::Continue
        }
    });
    let engine = builder.build().expect("engine");

    let context = engine
        .send_async(Request::new(
            Method::GET,
            Url::parse("http://svc.test/x").expect("url"),
        ))
        .await;

    assert!(!context.is_success());
    assert!(matches!(
        context.fault().map(Error::kind),
        Some(Kind::Content)
    ));
}

#[tokio::test]
async fn request_end_fires_exactly_once_per_context() {
    let ends = Arc::new(AtomicUsize::new(0));
    let transport = Arc::new(MemoryTransport::new());
    transport.push_reply(json_reply("{}"));
    let counter = Arc::clone(&ends);
    let mut builder = Engine::builder().transport(Arc::clone(&transport) as Arc<dyn Transport>);
    builder.hooks().request_end(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let engine = builder.build().expect("engine");

    let _ = engine
        .send_async(Request::new(
            Method::GET,
            Url::parse("http://svc.test/x").expect("url"),
        ))
        .await;

    assert_eq!(ends.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn double_send_is_a_usage_fault_at_the_call_site() {
    let (_, engine) = engine_with(vec![json_reply("{}")]);

    let mut context = engine.context(Request::new(
        Method::GET,
        Url::parse("http://svc.test/x").expect("url"),
    ));
    context.send_async().await.expect("first send");
    let err = context.send_async().await.expect_err("second send");
    assert!(err.is_usage());
}

#[tokio::test]
async fn generic_object_reader_handles_untyped_responses() {
    let reply = ScriptedReply::new(StatusCode::OK, r#"wrap({"a":9});"#);
    let (_, engine) = engine_with(vec![reply]);

    let context = engine
        .send_async(Request::new(
            Method::GET,
            Url::parse("http://svc.test/jsonp").expect("url"),
        ))
        .await;

    assert!(context.is_success());
    assert_eq!(
        context.result_as::<Answer>().expect("typed"),
        Answer { a: 9 }
    );
}

#[tokio::test]
async fn transport_served_final_url_records_a_redirection() {
    let served = Url::parse("http://svc.test/final").expect("url");
    let reply = ScriptedReply::new(StatusCode::OK, "{}").served_from(served.clone());
    let (_, engine) = engine_with(vec![reply]);

    let context = engine
        .send_async(Request::new(
            Method::GET,
            Url::parse("http://svc.test/start").expect("url"),
        ))
        .await;

    assert!(context.is_success());
    let response = context.response().expect("response");
    assert_eq!(
        response.redirection().map(|r| r.location.clone()),
        Some(served)
    );
}
