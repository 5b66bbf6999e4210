//! Single-pass streaming walk that yields records.

use super::extractor::RecordExtractor;
use super::plan::ExtractionPlan;
use super::Record;
use crate::error::{Error, Result};
use crate::path::{leads_to, path_matches};
use crate::tree::{Arena, NodeId};
use crate::xml;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, debug_span, trace, Span};

/// What one parser event means for the tree, with the event's borrow of the
/// read buffer already dropped.
enum Step {
    Open {
        tag: String,
        attributes: Vec<(String, String)>,
        empty: bool,
    },
    Close,
    Text(String),
    Eof,
    Skip,
}

/// Lazy sequence of records found in one document.
///
/// Memory follows the record in flight, not the document. A subtree matching the record path is extracted and released as
/// soon as it ends, and so is an element on the way to the record path once
/// its records are done. Other elements are kept whole until one of those is
/// released, so absolute paths can still reach earlier siblings of a record
/// and their descendants.
///
/// The stream stops after the root element closes and yields nothing after
/// an error.
pub struct RecordStream<'p, R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    arena: Arena,
    stack: Vec<NodeId>,
    plan: &'p ExtractionPlan,
    extractor: RecordExtractor<'p>,
    span: Span,
    records: usize,
    done: bool,
}

impl<'p> RecordStream<'p, BufReader<File>> {
    pub fn from_path(path: impl AsRef<Path>, plan: &'p ExtractionPlan, parent: &Span) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Ok(Self::new(BufReader::new(file), plan, parent))
    }
}

impl<'p, R: BufRead> RecordStream<'p, R> {
    pub fn new(source: R, plan: &'p ExtractionPlan, parent: &Span) -> Self {
        RecordStream {
            reader: Reader::from_reader(source),
            buf: Vec::new(),
            arena: Arena::new(),
            stack: Vec::new(),
            plan,
            extractor: RecordExtractor::new(plan),
            span: debug_span!(parent: parent, "walk", record_path = %plan.record_path()),
            records: 0,
            done: false,
        }
    }

    /// The node arena, mainly to observe how much of the tree is held.
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Records yielded so far.
    pub fn records(&self) -> usize {
        self.records
    }

    fn next_record(&mut self) -> Result<Option<Record>> {
        loop {
            if self.done {
                return Ok(None);
            }

            match self.read_step()? {
                Step::Open {
                    tag,
                    attributes,
                    empty,
                } => {
                    let id = self.arena.open(tag, attributes, self.stack.last().copied());
                    if !empty {
                        self.stack.push(id);
                    } else if let Some(record) = self.close(id)? {
                        return Ok(Some(record));
                    }
                }
                Step::Close => {
                    let Some(id) = self.stack.pop() else {
                        continue;
                    };
                    if let Some(record) = self.close(id)? {
                        return Ok(Some(record));
                    }
                }
                Step::Text(chunk) => {
                    if let Some(&id) = self.stack.last() {
                        self.arena.push_text(id, &chunk);
                    }
                }
                Step::Eof => {
                    self.done = true;
                    if !self.stack.is_empty() {
                        return Err(Error::UnexpectedEof(self.stack.len()));
                    }
                }
                Step::Skip => {}
            }
        }
    }

    fn read_step(&mut self) -> Result<Step> {
        self.buf.clear();
        let position = self.reader.buffer_position() as u64;
        let event = self
            .reader
            .read_event_into(&mut self.buf)
            .map_err(|e| Error::xml(position, e))?;

        Ok(match event {
            Event::Start(e) => Step::Open {
                tag: xml::element_name(&e, position)?,
                attributes: xml::attributes(&e, position)?,
                empty: false,
            },
            Event::Empty(e) => Step::Open {
                tag: xml::element_name(&e, position)?,
                attributes: xml::attributes(&e, position)?,
                empty: true,
            },
            Event::End(_) => Step::Close,
            Event::Text(t) => Step::Text(xml::text(&t, position)?),
            Event::CData(t) => Step::Text(xml::cdata(&t, position)?),
            Event::GeneralRef(r) => Step::Text(xml::reference(&r, position)?),
            Event::Eof => Step::Eof,
            _ => Step::Skip,
        })
    }

    /// Handle the end of element `id`, already popped from the stack.
    fn close(&mut self, id: NodeId) -> Result<Option<Record>> {
        let node = self.arena.get(id);
        let record_path = self.plan.record_path();
        let record = if path_matches(node, record_path) {
            let record = self.extractor.extract(node)?;
            self.arena.release(id);
            self.records += 1;
            trace!(parent: &self.span, records = self.records, "extracted record");
            Some(record)
        } else if leads_to(node, record_path) {
            self.arena.release(id);
            None
        } else {
            // Kept whole until the record or container above it is released.
            None
        };

        if self.stack.is_empty() {
            self.done = true;
            debug!(parent: &self.span, records = self.records, "reached end of root element");
        }
        Ok(record)
    }
}

impl<R: BufRead> Iterator for RecordStream<'_, R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: BufRead> std::iter::FusedIterator for RecordStream<'_, R> {}
