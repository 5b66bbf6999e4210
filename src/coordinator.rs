//! Parallel extraction over fragment files with a single output writer.
//!
//! Each fragment gets its own worker thread. Workers serialize records and
//! push the lines into a bounded queue; one consumer thread owns the sink and
//! writes lines in arrival order. Records from one fragment keep document
//! order, records from different fragments interleave freely.

use crate::error::{Error, Result};
use crate::extract::{to_line, ExtractionPlan, RecordStream, RecordWriter};
use crate::split::Fragment;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::io::Write;
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tracing::{debug, debug_span, info, info_span, warn, Span};

#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    /// Lines buffered between workers and the writer. Workers block when the
    /// queue is full.
    pub queue_capacity: usize,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        CoordinatorOptions {
            queue_capacity: 1024,
        }
    }
}

/// Counts for a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub records: usize,
    /// Records written per fragment, in the order the fragments were given.
    pub per_fragment: Vec<usize>,
}

enum Message {
    Line { slot: usize, line: String },
    End,
}

pub struct ExtractionCoordinator<'p> {
    plan: &'p ExtractionPlan,
    options: CoordinatorOptions,
    span: Span,
}

impl<'p> ExtractionCoordinator<'p> {
    pub fn new(plan: &'p ExtractionPlan, options: CoordinatorOptions, parent: &Span) -> Self {
        ExtractionCoordinator {
            plan,
            span: info_span!(parent: parent, "extract", queue_capacity = options.queue_capacity),
            options,
        }
    }

    /// Extract every fragment in parallel and write all records to `sink`.
    ///
    /// The first failing fragment stops the others at their next record and
    /// the run fails with [`Error::Worker`]. A failing sink fails the run
    /// with its own error.
    pub fn run<W: Write + Send>(&self, fragments: &[Fragment], sink: W) -> Result<RunSummary> {
        let _enter = self.span.enter();
        info!(fragments = fragments.len(), "starting workers");

        let (tx, rx) = bounded(self.options.queue_capacity);
        let cancel = AtomicBool::new(false);

        let summary = thread::scope(|scope| {
            let slots = fragments.len();
            let consumer = scope.spawn(move || consume(rx, sink, slots));

            let workers: Vec<_> = fragments
                .iter()
                .enumerate()
                .map(|(slot, fragment)| {
                    let tx = tx.clone();
                    let cancel = &cancel;
                    scope.spawn(move || self.extract_fragment(slot, fragment, &tx, cancel))
                })
                .collect();

            let mut failure = None;
            for (fragment, worker) in fragments.iter().zip(workers) {
                match worker.join() {
                    Ok(Ok(_)) => {}
                    Ok(Err(Error::Cancelled | Error::SinkClosed)) => {}
                    Ok(Err(e)) => {
                        failure.get_or_insert(Error::Worker {
                            fragment: fragment.path.clone(),
                            source: Box::new(e),
                        });
                    }
                    Err(payload) => panic::resume_unwind(payload),
                }
            }

            // A consumer that already stopped reports its own error below.
            let _ = tx.send(Message::End);
            drop(tx);

            let written = match consumer.join() {
                Ok(result) => result?,
                Err(payload) => panic::resume_unwind(payload),
            };
            match failure {
                Some(e) => Err(e),
                None => Ok(written),
            }
        })?;

        info!(records = summary.records, "extraction finished");
        Ok(summary)
    }

    fn extract_fragment(
        &self,
        slot: usize,
        fragment: &Fragment,
        tx: &Sender<Message>,
        cancel: &AtomicBool,
    ) -> Result<usize> {
        let span = debug_span!(parent: &self.span, "fragment", index = fragment.index);
        let _enter = span.enter();

        let result = self.send_records(slot, fragment, tx, cancel, &span);
        match &result {
            Ok(count) => debug!(records = count, "fragment done"),
            Err(Error::Cancelled) => debug!("fragment cancelled"),
            Err(Error::SinkClosed) => debug!("writer gone, fragment stopped"),
            Err(e) => {
                cancel.store(true, Ordering::SeqCst);
                warn!(path = %fragment.path.display(), error = %e, "fragment failed");
            }
        }
        result
    }

    fn send_records(
        &self,
        slot: usize,
        fragment: &Fragment,
        tx: &Sender<Message>,
        cancel: &AtomicBool,
        span: &Span,
    ) -> Result<usize> {
        let stream = RecordStream::from_path(&fragment.path, self.plan, span)?;
        let mut sent = 0;
        for record in stream {
            if cancel.load(Ordering::SeqCst) {
                return Err(Error::Cancelled);
            }
            let line = to_line(&record?)?;
            tx.send(Message::Line { slot, line })
                .map_err(|_| Error::SinkClosed)?;
            sent += 1;
        }
        Ok(sent)
    }
}

fn consume<W: Write>(rx: Receiver<Message>, sink: W, slots: usize) -> Result<RunSummary> {
    let mut writer = RecordWriter::new(sink);
    let mut per_fragment = vec![0; slots];

    for message in rx.iter() {
        match message {
            Message::Line { slot, line } => {
                writer.write_line(&line)?;
                if let Some(count) = per_fragment.get_mut(slot) {
                    *count += 1;
                }
            }
            Message::End => break,
        }
    }
    writer.flush()?;

    Ok(RunSummary {
        records: writer.written(),
        per_fragment,
    })
}
