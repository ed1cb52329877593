use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Qdrant error: {message}")]
	Qdrant { message: String },
	#[error("{} is missing required column {column}.", path.display())]
	MissingColumn { path: PathBuf, column: String },
}
impl From<disclose_providers::Error> for Error {
	fn from(err: disclose_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
impl From<disclose_storage::Error> for Error {
	fn from(err: disclose_storage::Error) -> Self {
		match err {
			disclose_storage::Error::Qdrant(err) => Self::Qdrant { message: err.to_string() },
			disclose_storage::Error::MissingColumn { path, column } =>
				Self::MissingColumn { path, column },
			other => Self::Storage { message: other.to_string() },
		}
	}
}
