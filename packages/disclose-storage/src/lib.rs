pub mod guidelines;
pub mod qdrant;
pub mod summary;
pub mod table;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
