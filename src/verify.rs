//! Checks that an output holds one line per record element of its input.

use crate::error::{Error, Result};
use crate::path::TagPath;
use crate::xml;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verification {
    pub input_count: usize,
    pub output_count: usize,
}

impl Verification {
    pub fn is_match(&self) -> bool {
        self.input_count == self.output_count
    }
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_match() {
            write!(
                f,
                "SUCCESS: Input and output have the same number of entries ({})",
                self.input_count
            )
        } else {
            write!(
                f,
                "FAIL: Input has {} entries, output has {} entries",
                self.input_count, self.output_count
            )
        }
    }
}

/// Count elements of an XML file whose full path equals `path`.
///
/// Only the stack of open tag names is kept, never element content.
pub fn count_elements(input: impl AsRef<Path>, path: &TagPath) -> Result<usize> {
    let mut reader = Reader::from_reader(BufReader::new(File::open(input.as_ref())?));
    let mut buf = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut count = 0;

    loop {
        buf.clear();
        let position = reader.buffer_position() as u64;
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| Error::xml(position, e))?
        {
            Event::Start(e) => stack.push(xml::element_name(&e, position)?),
            Event::Empty(e) => {
                stack.push(xml::element_name(&e, position)?);
                if path.matches_stack(&stack) {
                    count += 1;
                }
                stack.pop();
            }
            Event::End(_) => {
                if path.matches_stack(&stack) {
                    count += 1;
                }
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(count)
}

/// Count non-empty lines.
pub fn count_lines(output: impl AsRef<Path>) -> Result<usize> {
    let reader = BufReader::new(File::open(output.as_ref())?);
    let mut count = 0;
    for line in reader.lines() {
        if !line?.trim().is_empty() {
            count += 1;
        }
    }
    Ok(count)
}

pub fn verify(input: impl AsRef<Path>, output: impl AsRef<Path>, path: &TagPath) -> Result<Verification> {
    Ok(Verification {
        input_count: count_elements(input, path)?,
        output_count: count_lines(output)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_pair(dir: &Path, records: usize, lines: usize) -> (std::path::PathBuf, std::path::PathBuf) {
        let input = dir.join("in.xml");
        let output = dir.join("out.jsonl");

        let mut doc = String::from("<Set>");
        for i in 0..records {
            doc.push_str(&format!("<Group><Entry id=\"{i}\"><Entry/></Entry></Group>"));
        }
        doc.push_str("</Set>");
        fs::write(&input, doc).unwrap();

        let body: String = (0..lines).map(|i| format!("{{\"id\":{i}}}\n")).collect();
        fs::write(&output, body).unwrap();
        (input, output)
    }

    #[test]
    fn test_matching_counts() {
        let dir = tempfile::tempdir().unwrap();
        let (input, output) = write_pair(dir.path(), 10, 10);

        let result = verify(&input, &output, &"Set/Group/Entry".into()).unwrap();
        assert!(result.is_match());
        assert_eq!(result.input_count, 10);
        assert_eq!(
            result.to_string(),
            "SUCCESS: Input and output have the same number of entries (10)"
        );
    }

    #[test]
    fn test_truncated_output_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let (input, output) = write_pair(dir.path(), 10, 9);

        let result = verify(&input, &output, &"Set/Group/Entry".into()).unwrap();
        assert!(!result.is_match());
        assert_eq!(result.to_string(), "FAIL: Input has 10 entries, output has 9 entries");
    }

    #[test]
    fn test_nested_tags_of_same_name_count_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let (input, _) = write_pair(dir.path(), 3, 0);
        assert_eq!(count_elements(&input, &"Set/Group/Entry/Entry".into()).unwrap(), 3);
        assert_eq!(count_elements(&input, &"Set/Entry".into()).unwrap(), 0);
    }

    #[test]
    fn test_blank_lines_are_not_records() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.jsonl");
        fs::write(&output, "{}\n\n{}\n").unwrap();
        assert_eq!(count_lines(&output).unwrap(), 2);
    }
}
