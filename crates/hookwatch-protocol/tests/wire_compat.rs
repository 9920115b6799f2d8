// Verify wire format matches what the viewer page expects.

use std::sync::Arc;

use hookwatch_core::types::{Headers, WebhookRecord};
use hookwatch_protocol::frames::{self, parse_command, ClientCommand, InvalidFrame};
use serde_json::value::RawValue;
use serde_json::{json, Value};

fn record(payload: Value) -> WebhookRecord {
    WebhookRecord::received("POST", Headers::new(), payload, Some("127.0.0.1".into()))
}

#[test]
fn new_webhook_frame_shape() {
    let rec = record(json!({"a": 1}));
    let text = frames::new_webhook(&rec, 7).unwrap();
    let v: Value = serde_json::from_str(&text).unwrap();

    assert_eq!(v["type"], "event");
    assert_eq!(v["event"], "new_webhook");
    assert_eq!(v["payload"]["total_count"], 7);
    assert_eq!(v["payload"]["request"]["payload"], json!({"a": 1}));
    assert_eq!(v["payload"]["request"]["source_ip"], "127.0.0.1");
    assert_eq!(
        v["payload"]["request"]["request_id"],
        rec.request_id.as_str()
    );
}

#[test]
fn history_data_frame_counts_requests() {
    let records = vec![Arc::new(record(json!(2))), Arc::new(record(json!(1)))];
    let text = frames::history_data(&records).unwrap();
    let v: Value = serde_json::from_str(&text).unwrap();

    assert_eq!(v["event"], "history_data");
    assert_eq!(v["payload"]["total_count"], 2);
    let requests = v["payload"]["requests"].as_array().unwrap();
    assert_eq!(requests[0]["payload"], 2);
    assert_eq!(requests[1]["payload"], 1);
}

#[test]
fn empty_history_data_frame() {
    let text = frames::history_data::<Arc<WebhookRecord>>(&[]).unwrap();
    let v: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(v["payload"]["requests"], json!([]));
    assert_eq!(v["payload"]["total_count"], 0);
}

#[test]
fn encoded_record_frames_match_direct_serialization() {
    let rec = record(json!({"a": [1, 2], "f": 0.1}));
    let encoded: Arc<RawValue> = serde_json::value::to_raw_value(&rec).unwrap().into();

    assert_eq!(
        frames::new_webhook(&*encoded, 3).unwrap(),
        frames::new_webhook(&rec, 3).unwrap()
    );
    assert_eq!(
        frames::history_data(&[encoded]).unwrap(),
        frames::history_data(&[Arc::new(rec)]).unwrap()
    );
}

#[test]
fn large_integers_survive_framing() {
    let payload: Value =
        serde_json::from_str(r#"{"n": 18446744073709551616, "big": -98765432109876543210}"#)
            .unwrap();
    let text = frames::new_webhook(&record(payload), 1).unwrap();
    assert!(text.contains(r#""payload":{"n":18446744073709551616,"big":-98765432109876543210}"#));
}

#[test]
fn history_cleared_frame_carries_timestamp() {
    let text = frames::history_cleared("2026-01-02T03:04:05.000000Z").unwrap();
    let v: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(v["event"], "history_cleared");
    assert_eq!(v["payload"]["timestamp"], "2026-01-02T03:04:05.000000Z");
}

#[test]
fn client_commands_parse() {
    assert_eq!(
        parse_command(r#"{"type":"event","event":"get_history"}"#).unwrap(),
        ClientCommand::GetHistory
    );
    assert_eq!(
        parse_command(r#"{"type":"event","event":"clear_history","payload":{"x":1}}"#).unwrap(),
        ClientCommand::ClearHistory
    );
}

#[test]
fn invalid_client_frames_are_classified() {
    assert!(matches!(
        parse_command("not json"),
        Err(InvalidFrame::Malformed(_))
    ));
    assert!(matches!(
        parse_command(r#"{"type":"req","event":"get_history"}"#),
        Err(InvalidFrame::UnsupportedType(t)) if t == "req"
    ));
    assert!(matches!(
        parse_command(r#"{"type":"event","event":"drop_tables"}"#),
        Err(InvalidFrame::UnknownEvent(e)) if e == "drop_tables"
    ));
}

#[test]
fn command_event_names_round_trip() {
    for cmd in [ClientCommand::GetHistory, ClientCommand::ClearHistory] {
        let text = format!(r#"{{"type":"event","event":"{}"}}"#, cmd.event_name());
        assert_eq!(parse_command(&text).unwrap(), cmd);
    }
}
