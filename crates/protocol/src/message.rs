//! Request/response frames exchanged with a controller.
//!
//! Every frame on the wire is one JSON object. Requests carry a client
//! chosen `id`; the controller answers with a [`Response`] carrying the same
//! `id` and either a `result` or an `error`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Method sent to an object to check that it exists before handing out a
/// reference to it.
pub const METHOD_RESOLVE: &str = "__resolve__";

/// Method asking a controller object which client type should wrap it.
pub const METHOD_GET_CLIENT_NAME: &str = "get_client_name";

/// Request sent to a controller object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
	/// Unique request ID for correlating responses.
	pub id: u32,
	/// Name of the remote object, taken from the descriptor path.
	pub object: String,
	/// Method name to invoke.
	pub method: String,
	/// Method parameters.
	#[serde(default)]
	pub params: Value,
}

/// Response from a controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
	/// Request ID this response correlates to.
	pub id: u32,
	/// Success result (mutually exclusive with error).
	#[serde(skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	/// Error result (mutually exclusive with result).
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<ErrorPayload>,
}

impl Response {
	/// Builds a success response.
	pub fn ok(id: u32, result: Value) -> Self {
		Self {
			id,
			result: Some(result),
			error: None,
		}
	}

	/// Builds an error response.
	pub fn err(id: u32, name: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			id,
			result: None,
			error: Some(ErrorPayload {
				name: Some(name.into()),
				message: message.into(),
			}),
		}
	}
}

/// Remote error details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
	/// Error type name (e.g. `"NoSuchObject"`).
	#[serde(skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	/// Error message.
	pub message: String,
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn request_params_default_to_null() {
		let request: Request = serde_json::from_str(r#"{"id": 3, "object": "tc", "method": "get_client_name"}"#).unwrap();
		assert_eq!(request.id, 3);
		assert_eq!(request.method, METHOD_GET_CLIENT_NAME);
		assert_eq!(request.params, Value::Null);
	}

	#[test]
	fn error_response_omits_result() {
		let value = serde_json::to_value(Response::err(7, "NoSuchObject", "unknown object 'x'")).unwrap();
		assert_eq!(
			value,
			json!({"id": 7, "error": {"name": "NoSuchObject", "message": "unknown object 'x'"}})
		);
	}
}
