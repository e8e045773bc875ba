mod classify;
mod rerank;
mod retrieve;
mod rrf_fuse;

pub use classify::*;
pub use rerank::*;
pub use retrieve::*;
pub use rrf_fuse::*;
