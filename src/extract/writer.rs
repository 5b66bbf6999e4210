use super::Record;
use crate::error::Result;
use std::io::Write;

/// Serialize a record as one line of JSON, without the trailing newline.
pub fn to_line(record: &Record) -> Result<String> {
    Ok(serde_json::to_string(record)?)
}

/// Writes records to a single output as newline-delimited JSON.
pub struct RecordWriter<W: Write> {
    writer: W,
    written: usize,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(writer: W) -> Self {
        RecordWriter { writer, written: 0 }
    }

    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    /// Write an already serialized record.
    pub fn write_line(&mut self, line: &str) -> Result<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    /// Number of records written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn flush(&mut self) -> Result<()> {
        Ok(self.writer.flush()?)
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
