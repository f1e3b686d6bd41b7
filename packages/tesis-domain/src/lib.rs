//! Pure legal-search building blocks: records, conversation turns, the legal hierarchy
//! scorer, reranking, source deduplication, and query normalization.

pub mod conversation;
pub mod hierarchy;
pub mod intent;
pub mod query;
pub mod record;
pub mod rerank;
pub mod search;
pub mod sources;
pub mod text;

pub use conversation::{Role, Turn};
pub use intent::Intent;
pub use record::{JurisprudenceRecord, RecordId};
pub use search::{SearchOutcome, SearchRequest, SearchTool};
