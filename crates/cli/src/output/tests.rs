use serde::Serialize;

use super::*;

#[derive(Debug, Serialize)]
struct ConnectData {
	client: String,
}

#[test]
fn result_builder_success() {
	let result = ResultBuilder::new("connect")
		.data(ConnectData {
			client: "ctrlink::clients::TaskClient".into(),
		})
		.build();

	assert!(result.ok);
	assert_eq!(result.command, "connect");
	assert_eq!(result.schema_version, Some(SCHEMA_VERSION));
	assert!(result.data.is_some());
	assert!(result.error.is_none());
	assert!(result.timings.is_some());
}

#[test]
fn result_builder_error_drops_data() {
	let result = ResultBuilder::new("connect")
		.data(ConnectData { client: "x".into() })
		.error(ErrorCode::ClientConnector, "controller unreachable")
		.build();

	assert!(!result.ok);
	assert!(result.data.is_none());
	assert_eq!(result.error.as_ref().unwrap().code, ErrorCode::ClientConnector);
}

#[test]
fn envelope_serializes_camel_case_and_skips_empty_fields() {
	let result = ResultBuilder::new("resolve")
		.data(ConnectData { client: "c".into() })
		.build();
	let value = serde_json::to_value(&result).unwrap();

	assert_eq!(value["schemaVersion"], SCHEMA_VERSION);
	assert_eq!(value["ok"], true);
	assert_eq!(value["data"]["client"], "c");
	assert!(value.get("error").is_none());
	assert!(value["timings"]["durationMs"].is_u64());
}

#[test]
fn error_code_display_matches_serialized_form() {
	for code in [
		ErrorCode::DescriptorNotFound,
		ErrorCode::ClientConnector,
		ErrorCode::ClusterState,
		ErrorCode::InternalError,
	] {
		let serialized = serde_json::to_value(code).unwrap();
		assert_eq!(serialized, code.to_string());
	}
	assert_eq!(ErrorCode::DescriptorNotReady.to_string(), "DESCRIPTOR_NOT_READY");
}
