//! Integration tests across the event bag, the registry and the viewers.

use std::sync::{Arc, Barrier};
use std::thread;

use beacon::core::debug::RecordingListener;
use beacon::core::flat::{pack, unpack};
use beacon::core::validate::EventRejectedReason;
use beacon::net::default_viewer::{DefaultDataViewer, DEFAULT_VIEWER_NAME, PACKET_CONTENT_TYPE};
use beacon::net::MockHttpClient;
use beacon::prelude::*;
use beacon::runtime::viewer::RecordingViewer;

fn sender_config() -> LogConfiguration {
    LogConfiguration::builder()
        .module_name("EventSender")
        .version("1.0.0")
        .host("EventSender")
        .cache_file_path("storage.db")
        .max_teardown_time(1)
        .build()
}

#[test]
fn event_sender_walkthrough() {
    let host = TelemetryHost::new();
    let recorder = Arc::new(RecordingViewer::new("recorder"));
    host.viewers().register_viewer(recorder.clone()).unwrap();

    let config = sender_config();
    let acquired = host.acquire(&config).unwrap();
    assert_eq!(acquired.status, AcquireStatus::Created);

    acquired
        .instance
        .submit(EventProperties::new("simple_event"))
        .unwrap();
    assert_eq!(host.release(&config).unwrap(), ReleaseStatus::TornDown);

    let packets = recorder.packets();
    assert_eq!(packets.len(), 1);
    let json: serde_json::Value = serde_json::from_slice(&packets[0]).unwrap();
    assert_eq!(json["name"], "simple_event");
    assert!(host.registry().is_empty());
}

#[test]
fn torn_down_handle_rejects_events() {
    let host = TelemetryHost::new();
    let handle = host.acquire_module("svc").unwrap().instance;
    host.release_module("svc").unwrap();

    assert_eq!(
        handle.submit(EventProperties::new("late_event")),
        Err(PipelineError::ShutDown)
    );
}

#[test]
fn default_viewer_forwards_pipeline_packets() {
    let host = TelemetryHost::new();
    let client = Arc::new(MockHttpClient::responding_with(200));
    let viewer = Arc::new(DefaultDataViewer::new(client.clone(), "Test").unwrap());
    assert!(viewer.enable_remote_viewer("http://localhost:5000/viewer"));
    host.viewers().register_viewer(viewer.clone()).unwrap();
    assert_eq!(
        host.viewers().is_viewer_enabled_named(DEFAULT_VIEWER_NAME),
        Ok(true)
    );

    let mut event = EventProperties::new("viewed_event");
    event.set_property("answer", 42i64);
    host.acquire_module("svc")
        .unwrap()
        .instance
        .submit(event)
        .unwrap();

    // probe plus one packet
    assert_eq!(client.sent_count(), 2);
    let request = client.last_request().unwrap();
    assert_eq!(request.url, "http://localhost:5000/viewer");
    assert_eq!(request.headers.get("content-type"), Some(PACKET_CONTENT_TYPE));
    let json: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(json["name"], "viewed_event");
}

#[test]
fn rejected_delivery_stops_remote_viewer_but_not_pipeline() {
    let host = TelemetryHost::new();
    let client = Arc::new(MockHttpClient::new().with_responder(|request| {
        let status = if request.body.is_empty() { 200 } else { 503 };
        Some(beacon::net::http::HttpResponse::new(request.id(), status))
    }));
    let viewer = Arc::new(DefaultDataViewer::new(client.clone(), "Test").unwrap());
    assert!(viewer.enable_remote_viewer("endpoint"));
    host.viewers().register_viewer(viewer.clone()).unwrap();

    let instance = host.acquire_module("svc").unwrap().instance;
    instance.submit(EventProperties::new("first_event")).unwrap();
    assert!(!viewer.is_transmission_enabled());

    instance.submit(EventProperties::new("second_event")).unwrap();
    assert_eq!(client.sent_count(), 2);
}

#[test]
fn invalid_input_reaches_bound_debug_channel() {
    let host = TelemetryHost::new();
    let listener = Arc::new(RecordingListener::new());
    host.debug_events().add_listener(listener.clone());

    let mut event = EventProperties::new("valid_event").with_debug_events(host.debug_events().clone());
    assert!(!event.set_name("bad name!"));
    event.set_property("", 1i64);

    let rejected: Vec<_> = listener
        .events()
        .into_iter()
        .filter_map(|e| e.reason)
        .collect();
    assert_eq!(
        rejected,
        vec![
            EventRejectedReason::InvalidCharacter,
            EventRejectedReason::NameMissing
        ]
    );
    assert_eq!(event.name(), "valid_event");
}

#[test]
fn flat_records_travel_through_the_pipeline() {
    let host = TelemetryHost::new();
    let recorder = Arc::new(RecordingViewer::new("recorder"));
    host.viewers().register_viewer(recorder.clone()).unwrap();

    let mut source = EventProperties::new("flat_event");
    source.set_property_with_pii("user", "alice@example.com", PiiKind::SmtpAddress);
    source.set_property_in("count", 7i64, PiiKind::None, DataCategory::PartB);

    let mut rebuilt = EventProperties::new("flat_event");
    unpack(&mut rebuilt, &pack(&source)).unwrap();
    assert_eq!(
        rebuilt.pii_properties(DataCategory::PartC),
        source.pii_properties(DataCategory::PartC)
    );

    host.acquire_module("svc")
        .unwrap()
        .instance
        .submit(rebuilt)
        .unwrap();
    assert_eq!(recorder.packet_count(), 1);
}

#[test]
fn concurrent_hosts_share_one_instance_per_module() {
    let host = Arc::new(TelemetryHost::new());
    let recorder = Arc::new(RecordingViewer::new("recorder"));
    host.viewers().register_viewer(recorder.clone()).unwrap();
    let threads = 6;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let host = host.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                let acquired = host.acquire_module("shared").unwrap();
                let mut event = EventProperties::new("threaded_event");
                event.set_property("worker", i as i64);
                acquired.instance.submit(event).unwrap();
                acquired.instance
            })
        })
        .collect();
    let instances: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(instances.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    assert_eq!(host.registry().ref_count("shared"), Some(threads));
    assert_eq!(recorder.packet_count(), threads);
    assert_eq!(host.shutdown(), 1);
}
