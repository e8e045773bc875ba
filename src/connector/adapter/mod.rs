mod duckdb_catalogue_repository;
mod gcp_token;
mod gemini_llm;
mod http;
mod in_memory_catalogue_repository;
mod mock_embedding;
mod mock_llm;
mod vertex_embedding;

pub use duckdb_catalogue_repository::*;
pub use gcp_token::*;
pub use gemini_llm::*;
pub use http::*;
pub use in_memory_catalogue_repository::*;
pub use mock_embedding::*;
pub use mock_llm::*;
pub use vertex_embedding::*;
