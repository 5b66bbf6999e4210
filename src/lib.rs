//! # Smelt - Streaming XML to NDJSON extraction
//!
//! Turns very large XML documents into newline-delimited JSON records,
//! guided by a declarative schema.
//!
//! ## Modules
//!
//! - **schema**: field declarations, from the builder API or a JSON file
//! - **extract**: dependency-ordered plans and the single-pass streaming walk
//! - **split**: cutting a document into well-formed fragments for parallel work
//! - **coordinator**: per-fragment workers feeding one output writer
//! - **verify**: comparing input element counts with output line counts
//!
//! ## Quick Start
//!
//! ```rust
//! use smelt::extract::{Record, RecordStream};
//! use smelt::schema::{FieldSpec, ScalarKind, Schema};
//! use tracing::Span;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let plan = Schema::builder("Set/Entry")
//!     .field("id", FieldSpec::path("Id").scalar(ScalarKind::Integer))
//!     .field("title", FieldSpec::absolute("Set/Title"))
//!     .build()?
//!     .compile()?;
//!
//! let xml = "<Set><Title>t</Title><Entry><Id>7</Id></Entry></Set>";
//! let records: Vec<Record> = RecordStream::new(xml.as_bytes(), &plan, &Span::none())
//!     .collect::<Result<_, _>>()?;
//!
//! assert_eq!(records[0]["id"], 7);
//! assert_eq!(records[0]["title"], "t");
//! # Ok(())
//! # }
//! ```

use std::io::Write;
use std::path::Path;
use tracing::{info, info_span};

pub mod coordinator;
pub mod error;
pub mod extract;
pub mod path;
pub mod schema;
pub mod split;
pub mod tree;
pub mod verify;
mod xml;

pub use coordinator::{CoordinatorOptions, ExtractionCoordinator, RunSummary};
pub use error::{CastError, ConfigError, Error, Result, SplitError};
pub use extract::{ExtractionPlan, Record, RecordStream, RecordWriter};
pub use path::TagPath;
pub use schema::{FieldSpec, ScalarKind, Schema, SchemaBuilder};
pub use split::{DocumentSplitter, Fragment, SplitOptions};

/// Extract every record of `input` in one pass and write them to `sink` as
/// NDJSON. Returns the number of records written.
pub fn extract_file<W: Write>(input: impl AsRef<Path>, plan: &ExtractionPlan, sink: W) -> Result<usize> {
    let input = input.as_ref();
    let span = info_span!("smelt", input = %input.display());
    let _enter = span.enter();

    let mut writer = RecordWriter::new(sink);
    for record in RecordStream::from_path(input, plan, &span)? {
        writer.write_record(&record?)?;
    }
    writer.flush()?;

    info!(records = writer.written(), "extraction finished");
    Ok(writer.written())
}

/// Split `input` at the plan's split path and extract the fragments in
/// parallel into `sink`.
///
/// Fragment files are deleted afterwards, whether the run succeeded or not,
/// unless `keep_parts` is set.
pub fn split_and_extract<W: Write + Send>(
    input: impl AsRef<Path>,
    plan: &ExtractionPlan,
    split: SplitOptions,
    options: CoordinatorOptions,
    keep_parts: bool,
    sink: W,
) -> Result<RunSummary> {
    let input = input.as_ref();
    let span = info_span!("smelt", input = %input.display());
    let _enter = span.enter();

    let split_path = plan.split_path()?;
    let fragments = DocumentSplitter::new(split_path, split, &span)?.split(input)?;
    let result = ExtractionCoordinator::new(plan, options, &span).run(&fragments, sink);

    if keep_parts {
        info!(fragments = fragments.len(), "keeping fragment files");
    } else {
        split::remove_fragments(&fragments);
    }
    result
}
