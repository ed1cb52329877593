use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Table I/O failed: {0}")]
	Io(#[from] std::io::Error),
	#[error("Malformed CSV: {0}")]
	Csv(#[from] csv::Error),
	#[error(transparent)]
	Qdrant(#[from] Box<qdrant_client::QdrantError>),
	#[error("{} is missing required column {column}.", path.display())]
	MissingColumn { path: PathBuf, column: String },
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
}
impl From<qdrant_client::QdrantError> for Error {
	fn from(err: qdrant_client::QdrantError) -> Self {
		Self::Qdrant(Box::new(err))
	}
}
