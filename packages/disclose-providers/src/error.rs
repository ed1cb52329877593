pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Provider request failed: {0}")]
	Reqwest(#[from] reqwest::Error),
	#[error("Provider returned invalid JSON: {0}")]
	SerdeJson(#[from] serde_json::Error),
	#[error("Invalid header name: {0}")]
	InvalidHeaderName(#[from] reqwest::header::InvalidHeaderName),
	#[error("Invalid header value: {0}")]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
	#[error("Invalid provider config: {message}")]
	InvalidConfig { message: String },
	/// The provider envelope is malformed or inconsistent with the request.
	#[error("Invalid provider response: {message}")]
	InvalidResponse { message: String },
	/// The model answered, but the content does not fit the reply schema.
	#[error("Reply schema violation: {message}")]
	Schema { message: String },
}
impl Error {
	pub fn is_schema_violation(&self) -> bool {
		matches!(self, Self::Schema { .. } | Self::SerdeJson(_))
	}
}
