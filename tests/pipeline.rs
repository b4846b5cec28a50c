mod support;

use chrono::{TimeZone, Utc};
use logtee::middleware::{emit_request, RequestContext, BODY_NOT_CAPTURED};
use logtee::{Field, Level};
use std::time::Duration;
use support::pipeline;

fn users_request(status: u16, errors: Vec<String>) -> RequestContext {
    let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    RequestContext {
        method: "GET".into(),
        path: "/users/42".into(),
        status,
        start,
        end: start + chrono::Duration::milliseconds(12),
        client_ip: "10.0.0.5".into(),
        user_agent: "Mozilla/5.0".into(),
        errors,
        body: None,
    }
}

#[tokio::test]
async fn successful_request_logs_info_to_console_only() {
    let (logger, out, transport) = pipeline(false);

    emit_request(&logger, &users_request(200, vec![]), "users::request_log");
    logger.flush(Duration::from_secs(1)).await.unwrap();

    let lines = out.json_lines();
    assert_eq!(lines.len(), 1);
    let line = &lines[0];
    assert_eq!(line["level"], "info");
    assert_eq!(line["msg"], "OK");
    assert_eq!(line["method"], "GET");
    assert_eq!(line["path"], "/users/42");
    assert_eq!(line["status"], 200);
    assert_eq!(line["caller"], "users::request_log");
    assert_eq!(line["latency"], "12ms");
    assert_eq!(line["ip"], "10.0.0.5");
    assert_eq!(line["user_agent"], "Mozilla/5.0");
    assert!(line.get("error").is_none());
    assert!(line.get("body").is_none());

    assert!(transport.events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn failing_request_reaches_console_and_remote() {
    let (logger, out, transport) = pipeline(false);

    emit_request(&logger, &users_request(503, vec!["db timeout".into()]), "users::request_log");
    logger.flush(Duration::from_secs(1)).await.unwrap();

    let lines = out.json_lines();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["level"], "error");
    assert_eq!(lines[0]["error"], "db timeout");
    assert_eq!(lines[0]["body"], BODY_NOT_CAPTURED);

    let events = transport.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.extra["level"], "error");
    assert_eq!(event.extra["status"], 503);
    assert_eq!(event.threads.values.len(), 1);
    let stack = event.threads.values[0].stacktrace.as_ref().unwrap();
    assert!(!stack.frames.is_empty());

    assert_eq!(event.tags.get("error").map(String::as_str), Some("db timeout"));
    assert_eq!(event.tags.get("path").map(String::as_str), Some("/users/42"));
    let message = event.message.as_deref().unwrap();
    assert!(message.ends_with(" - users-api - Service Unavailable"));
}

#[tokio::test]
async fn client_errors_are_warnings_with_body() {
    let (logger, out, transport) = pipeline(false);

    emit_request(&logger, &users_request(404, vec![]), "t");
    logger.flush(Duration::from_secs(1)).await.unwrap();

    let lines = out.json_lines();
    assert_eq!(lines[0]["level"], "warn");
    assert_eq!(lines[0]["msg"], "Not Found");
    assert!(lines[0].get("body").is_some());
    assert_eq!(transport.events.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn dev_mode_never_logs_identifying_fields() {
    let (logger, out, _transport) = pipeline(true);

    for status in [200, 404, 500] {
        emit_request(&logger, &users_request(status, vec![]), "t");
    }

    for line in out.json_lines() {
        for key in ["latency", "ip", "user_agent"] {
            assert!(line.get(key).is_none(), "{key} leaked in dev mode");
        }
    }
}

#[tokio::test]
async fn no_field_is_both_tag_and_extra() {
    let (logger, _out, transport) = pipeline(false);

    logger.log(
        Level::Warn,
        "mixed fields",
        vec![
            Field::str("region", "eu-west-1"),
            Field::int("attempt", 3),
            Field::float("ratio", 0.25),
            Field::bool("cached", true),
        ],
    );
    logger.flush(Duration::from_secs(1)).await.unwrap();

    let events = transport.events.lock().unwrap();
    let tags = &events[0].tags;
    let extra = &events[0].extra;
    for key in tags.keys() {
        assert!(!extra.contains_key(key), "{key} in both buckets");
    }
    assert!(tags.contains_key("region"));
    for key in ["attempt", "ratio", "cached"] {
        assert!(extra.contains_key(key));
    }
}

#[tokio::test]
async fn identical_messages_get_distinct_ids() {
    let (logger, _out, transport) = pipeline(false);

    logger.error("payment declined", vec![]);
    logger.error("payment declined", vec![]);
    logger.flush(Duration::from_secs(1)).await.unwrap();

    let events = transport.events.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert_ne!(events[0].event_id, events[1].event_id);
    assert_ne!(events[0].message, events[1].message);
}

#[test]
fn concurrent_writers_never_interleave_lines() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 200;

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build().unwrap();
    let _guard = runtime.enter();
    let (logger, out, transport) = pipeline(false);

    std::thread::scope(|scope| {
        for t in 0..THREADS {
            let logger = logger.clone();
            scope.spawn(move || {
                for i in 0..PER_THREAD {
                    let level = if i % 2 == 0 { Level::Info } else { Level::Warn };
                    logger.log(
                        level,
                        "concurrent write",
                        vec![Field::uint("thread", t as u64), Field::uint("seq", i as u64)],
                    );
                }
            });
        }
    });
    runtime.block_on(logger.flush(Duration::from_secs(5))).unwrap();

    // json_lines panics on any line that is not a whole JSON object.
    let lines = out.json_lines();
    assert_eq!(lines.len(), THREADS * PER_THREAD);
    for t in 0..THREADS as u64 {
        let seen = lines.iter().filter(|l| l["thread"] == t).count();
        assert_eq!(seen, PER_THREAD);
    }
    assert_eq!(transport.events.lock().unwrap().len(), THREADS * PER_THREAD / 2);
}
