//! Schema-driven record extraction
//!
//! A compiled [`ExtractionPlan`] holds the schema's fields in dependency
//! order. [`RecordStream`] walks a document once, hands every subtree found at
//! the record path to [`RecordExtractor`], and releases processed subtrees so
//! memory stays flat however many records the document holds.

pub mod extractor;
pub mod order;
pub mod plan;
pub mod walker;
pub mod writer;

pub use extractor::RecordExtractor;
pub use order::order_fields;
pub use plan::ExtractionPlan;
pub use walker::RecordStream;
pub use writer::{to_line, RecordWriter};

/// One output record: field name to value. Every schema field is present.
pub type Record = serde_json::Map<String, serde_json::Value>;
