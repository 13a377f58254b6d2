use super::*;

fn sample_message() -> Message {
    Message::new("graph_sync")
        .with_field("ticker", "AAPL")
        .with_field("sync_time", "7d")
}

#[test]
fn decode_extracts_action_and_fields() {
    let message = decode_message(r#"{"action":"update_graph","ticker":"AAPL","price":1.5}"#)
        .expect("decode should succeed");
    assert_eq!(message.action, "update_graph");
    assert_eq!(message.field("ticker"), Some(&serde_json::json!("AAPL")));
    assert_eq!(message.field("price"), Some(&serde_json::json!(1.5)));
    assert!(message.field("action").is_none());
}

#[test]
fn encode_decode_round_trip_preserves_message() {
    let message = sample_message();
    let text = encode_message(&message);
    let decoded = decode_message(&text).expect("decode should succeed");
    assert_eq!(decoded, message);
}

#[test]
fn encode_emits_the_action_tag() {
    let text = encode_message(&Message::new("stop_trading"));
    let value = serde_json::from_str::<serde_json::Value>(&text).expect("valid JSON");
    assert_eq!(value.get("action"), Some(&serde_json::json!("stop_trading")));
}

#[test]
fn decode_rejects_malformed_json() {
    let err = decode_message("{not json").expect_err("text should fail");
    assert!(matches!(err, CodecError::Decode(_)));
}

#[test]
fn decode_rejects_non_object_document() {
    let err = decode_message("[1, 2, 3]").expect_err("array should fail");
    assert!(matches!(err, CodecError::NotAnObject));
}

#[test]
fn decode_rejects_missing_action() {
    let err = decode_message(r#"{"data": {"result": "ok"}}"#).expect_err("tag is required");
    assert!(matches!(err, CodecError::MissingAction));
}

#[test]
fn decode_rejects_non_string_action() {
    let err = decode_message(r#"{"action": 7}"#).expect_err("tag must be a string");
    assert!(matches!(err, CodecError::MissingAction));
}

#[test]
fn parse_data_reads_the_nested_payload() {
    let message = decode_message(r#"{"action":"start_trading","data":{"result":"ok"}}"#)
        .expect("decode should succeed");
    let result = message.parse_data::<CommandResult>().expect("payload");
    assert!(result.is_ok());
}

#[test]
fn parse_data_falls_back_to_unwrapped_fields() {
    let message = decode_message(
        r#"{"action":"update_graph","ticker":"ABC","timestamp":2,"price":11.0,"state":"bought"}"#,
    )
    .expect("decode should succeed");
    let update = message.parse_data::<GraphUpdate>().expect("payload");
    assert_eq!(update.ticker, "ABC");
    assert_eq!(update.timestamp, 2);
    assert_eq!(update.state, TradeState::Bought);
}

#[test]
fn parse_data_rejects_mismatched_payload() {
    let message = decode_message(r#"{"action":"start_trading","data":[1,2]}"#)
        .expect("decode should succeed");
    let err = message
        .parse_data::<CommandResult>()
        .expect_err("array is not a command result");
    assert!(matches!(err, CodecError::InvalidPayload { .. }));
}

#[test]
fn trade_state_serializes_as_lowercase_json() {
    assert_eq!(
        serde_json::to_string(&TradeState::Analyzing).expect("serialize"),
        "\"analyzing\""
    );
    assert_eq!(
        serde_json::to_string(&TradeState::Noop).expect("serialize"),
        "\"noop\""
    );
}

#[test]
fn trade_state_rejects_non_lowercase_json() {
    assert!(serde_json::from_str::<TradeState>("\"Bought\"").is_err());
}

#[test]
fn trade_state_wire_names_match_serde_form() {
    for state in [
        TradeState::Analyzing,
        TradeState::Bought,
        TradeState::Shorting,
        TradeState::Noop,
    ] {
        let serialized = serde_json::to_string(&state).expect("serialize");
        assert_eq!(serialized, format!("\"{}\"", state.as_str()));
    }
}

#[test]
fn command_result_interprets_ok_only() {
    assert!(CommandResult { result: "ok".to_owned() }.is_ok());
    assert!(!CommandResult { result: "error".to_owned() }.is_ok());
}

#[test]
fn graph_update_produces_its_point() {
    let update = GraphUpdate {
        ticker: "ABC".to_owned(),
        timestamp: 2,
        price: 11.0,
        state: TradeState::Bought,
    };
    let point = update.point();
    assert_eq!(point.timestamp, 2);
    assert!((point.price - 11.0).abs() < f64::EPSILON);
    assert_eq!(point.state, TradeState::Bought);
}

#[test]
fn health_report_tolerates_missing_internet_check() {
    let report = serde_json::from_str::<HealthReport>(
        r#"{"trade_node_check": true, "broker_api_check": true}"#,
    )
    .expect("deserialize");
    assert_eq!(report.internet_check, None);
    assert!(report.all_passing());
}

#[test]
fn health_report_fails_on_any_failed_subcheck() {
    let report = serde_json::from_str::<HealthReport>(
        r#"{"trade_node_check": true, "internet_check": true, "broker_api_check": false}"#,
    )
    .expect("deserialize");
    assert!(!report.all_passing());
}
