pub mod embedding;
pub mod judge;
pub mod rerank;

mod error;

pub use error::{Error, Result};

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde_json::{Map, Value};

/// Bearer authorization plus the provider's configured extra headers. The key is marked
/// sensitive so it never shows up in debug output.
pub fn auth_headers(api_key: &str, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut bearer = HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))?;

	bearer.set_sensitive(true);

	let mut headers = HeaderMap::with_capacity(default_headers.len() + 1);

	headers.insert(AUTHORIZATION, bearer);

	for (name, value) in default_headers {
		let raw = value.as_str().ok_or_else(|| Error::InvalidConfig {
			message: format!("Default header {name} must be a string."),
		})?;

		headers.insert(HeaderName::from_bytes(name.as_bytes())?, HeaderValue::from_str(raw)?);
	}

	Ok(headers)
}
