mod catalogue_repository;
mod embedding_service;
mod llm_service;

pub use catalogue_repository::*;
pub use embedding_service::*;
pub use llm_service::*;
