pub mod llm;
pub mod search;

mod error;

pub use error::{Error, Result};

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde_json::{Map, Value};

pub fn auth_headers(api_key: &str, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	let bearer = format!("Bearer {api_key}");

	headers.insert(AUTHORIZATION, header_value(AUTHORIZATION.as_str(), &bearer)?);

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::InvalidConfig {
				message: format!("Default header {key:?} must be a string."),
			});
		};
		let name = HeaderName::from_bytes(key.as_bytes())
			.map_err(|err| Error::Header { name: key.clone(), message: err.to_string() })?;

		headers.insert(name, header_value(key, raw)?);
	}

	Ok(headers)
}

fn header_value(name: &str, raw: &str) -> Result<HeaderValue> {
	HeaderValue::from_str(raw)
		.map_err(|err| Error::Header { name: name.to_string(), message: err.to_string() })
}
