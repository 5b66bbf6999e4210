//! Splitting a document into independently well-formed fragments
//!
//! Elements at the split path are copied byte for byte into fragment files.
//! Each fragment is wrapped in the start and end tags of the copied
//! elements' ancestors, so it parses on its own and yields the same element
//! paths as the original document. Fragments are balanced by size, not by
//! element count.

use crate::error::{Error, Result, SplitError};
use crate::path::TagPath;
use crate::xml;
use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span, warn, Span};

#[derive(Debug, Clone)]
pub struct SplitOptions {
    /// Requested number of fragments. Fewer are produced when the document
    /// holds fewer split elements.
    pub parts: usize,
    /// Directory for fragment files; defaults to the input's directory.
    pub output_dir: Option<PathBuf>,
}

impl SplitOptions {
    pub fn new(parts: usize) -> Self {
        SplitOptions {
            parts,
            output_dir: None,
        }
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }
}

/// One fragment file written by [`DocumentSplitter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub index: usize,
    pub path: PathBuf,
    /// Number of split-path elements copied into this fragment.
    pub elements: usize,
    pub bytes: u64,
}

impl Fragment {
    pub fn remove(&self) -> io::Result<()> {
        fs::remove_file(&self.path)
    }
}

/// Delete fragment files, logging the ones that could not be removed.
pub fn remove_fragments(fragments: &[Fragment]) {
    for fragment in fragments {
        match fragment.remove() {
            Ok(()) => debug!(path = %fragment.path.display(), "deleted fragment"),
            Err(e) => warn!(path = %fragment.path.display(), error = %e, "could not delete fragment"),
        }
    }
}

pub struct DocumentSplitter<'a> {
    split_path: &'a TagPath,
    options: SplitOptions,
    span: Span,
}

impl<'a> DocumentSplitter<'a> {
    pub fn new(split_path: &'a TagPath, options: SplitOptions, parent: &Span) -> Result<Self> {
        if options.parts == 0 {
            return Err(SplitError::ZeroParts.into());
        }
        Ok(DocumentSplitter {
            split_path,
            span: info_span!(parent: parent, "split", split_path = %split_path, parts = options.parts),
            options,
        })
    }

    /// Split `input` into fragment files.
    ///
    /// # Errors
    /// Fails when the document holds no element at the split path, or on any
    /// I/O or XML error. Fragment files written before the failure are
    /// removed.
    pub fn split(&self, input: impl AsRef<Path>) -> Result<Vec<Fragment>> {
        let input = input.as_ref();
        let _enter = self.span.enter();

        let mut created = Vec::new();
        let result = self.split_into(input, &mut created);
        if result.is_err() {
            for path in &created {
                if let Err(e) = fs::remove_file(path) {
                    warn!(path = %path.display(), error = %e, "could not delete partial fragment");
                }
            }
        }
        result
    }

    fn split_into(&self, input: &Path, created: &mut Vec<PathBuf>) -> Result<Vec<Fragment>> {
        let total = fs::metadata(input)?.len();
        let target = total / self.options.parts as u64;
        debug!(total_bytes = total, target_bytes = target, "computed part size");

        let mut reader = Reader::from_reader(BufReader::new(File::open(input)?));
        let mut buf = Vec::new();
        let mut state = SplitState {
            splitter: self,
            input,
            target,
            chain: Vec::new(),
            names: Vec::new(),
            next_id: 0,
            decl: None,
            current: None,
            fragments: Vec::new(),
            created,
        };
        // Nesting depth inside the split element being copied; 0 when outside.
        let mut depth = 0usize;

        loop {
            buf.clear();
            let position = reader.buffer_position() as u64;
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| Error::xml(position, e))?;

            if depth > 0 {
                match &event {
                    Event::Start(_) => depth += 1,
                    Event::End(_) => depth -= 1,
                    Event::Eof => return Err(Error::UnexpectedEof(depth + state.chain.len())),
                    _ => {}
                }
                state.write(event)?;
                if depth == 0 {
                    state.end_element()?;
                }
                continue;
            }

            match event {
                Event::Decl(d) if state.chain.is_empty() => state.decl = Some(d.into_owned()),
                Event::Start(e) => {
                    let name = xml::element_name(&e, position)?;
                    if self.is_split_element(&state.names, &name) {
                        state.begin_element(Event::Start(e))?;
                        depth = 1;
                    } else {
                        state.push_ancestor(e.into_owned(), name);
                    }
                }
                Event::Empty(e) => {
                    let name = xml::element_name(&e, position)?;
                    if self.is_split_element(&state.names, &name) {
                        state.begin_element(Event::Empty(e))?;
                        state.end_element()?;
                    }
                }
                Event::End(_) => {
                    state.chain.pop();
                    state.names.pop();
                    if state.chain.is_empty() {
                        break;
                    }
                }
                Event::Eof => {
                    if !state.chain.is_empty() {
                        return Err(Error::UnexpectedEof(state.chain.len()));
                    }
                    break;
                }
                _ => {}
            }
        }

        if let Some(open) = state.current.take() {
            state.close(open)?;
        }

        let fragments = state.fragments;
        if fragments.is_empty() {
            return Err(SplitError::NoSplitElements(self.split_path.to_string()).into());
        }

        info!(
            fragments = fragments.len(),
            elements = fragments.iter().map(|f| f.elements).sum::<usize>(),
            "split document"
        );
        Ok(fragments)
    }

    fn is_split_element(&self, ancestors: &[String], name: &str) -> bool {
        match self.split_path.segments().split_last() {
            Some((last, parents)) => last == name && parents == ancestors,
            None => false,
        }
    }

    fn fragment_path(&self, input: &Path, index: usize) -> PathBuf {
        let mut name = input
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "document".into());
        name.push(format!(".{index}"));

        let dir = match &self.options.output_dir {
            Some(dir) => dir.as_path(),
            None => input.parent().unwrap_or_else(|| Path::new(".")),
        };
        dir.join(name)
    }
}

/// An open ancestor element. `id` tells apart elements with the same tag.
#[derive(Clone)]
struct Ancestor {
    id: u64,
    start: BytesStart<'static>,
}

struct SplitState<'s, 'a> {
    splitter: &'s DocumentSplitter<'a>,
    input: &'s Path,
    target: u64,
    chain: Vec<Ancestor>,
    names: Vec<String>,
    next_id: u64,
    decl: Option<BytesDecl<'static>>,
    current: Option<OpenFragment>,
    fragments: Vec<Fragment>,
    created: &'s mut Vec<PathBuf>,
}

impl SplitState<'_, '_> {
    fn push_ancestor(&mut self, start: BytesStart<'static>, name: String) {
        self.next_id += 1;
        self.chain.push(Ancestor {
            id: self.next_id,
            start,
        });
        self.names.push(name);
    }

    /// Write the first event of a split element, opening a fragment first if
    /// none is open.
    fn begin_element(&mut self, event: Event<'_>) -> Result<()> {
        if let Some(fragment) = self.current.as_mut() {
            fragment.enter(&self.chain)?;
            return fragment.write(event);
        }

        let index = self.fragments.len();
        let path = self.splitter.fragment_path(self.input, index);
        self.created.push(path.clone());

        let mut fragment = OpenFragment::create(index, path, self.decl.as_ref())?;
        fragment.enter(&self.chain)?;
        fragment.write(event)?;
        self.current = Some(fragment);
        Ok(())
    }

    fn write(&mut self, event: Event<'_>) -> Result<()> {
        match self.current.as_mut() {
            Some(fragment) => fragment.write(event),
            None => Ok(()),
        }
    }

    /// A split element was fully copied; close the fragment once it is over
    /// the target size. The last allowed fragment takes whatever remains.
    fn end_element(&mut self) -> Result<()> {
        let Some(fragment) = self.current.as_mut() else {
            return Ok(());
        };
        fragment.elements += 1;

        let is_last_part = self.fragments.len() + 1 >= self.splitter.options.parts;
        if fragment.bytes() > self.target && !is_last_part {
            if let Some(full) = self.current.take() {
                self.close(full)?;
            }
        }
        Ok(())
    }

    fn close(&mut self, open: OpenFragment) -> Result<()> {
        let fragment = open.finish()?;
        debug!(
            index = fragment.index,
            path = %fragment.path.display(),
            elements = fragment.elements,
            bytes = fragment.bytes,
            "wrote fragment"
        );
        self.fragments.push(fragment);
        Ok(())
    }
}

/// Counts bytes passed through to the inner writer.
struct Counting<W> {
    inner: W,
    bytes: u64,
}

impl<W: Write> Write for Counting<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.bytes += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct OpenFragment {
    index: usize,
    path: PathBuf,
    writer: Writer<Counting<BufWriter<File>>>,
    /// Wrapper elements currently open in this fragment, outermost first.
    open: Vec<Ancestor>,
    elements: usize,
}

impl OpenFragment {
    fn create(index: usize, path: PathBuf, decl: Option<&BytesDecl<'static>>) -> Result<Self> {
        let file = File::create(&path)?;
        let mut writer = Writer::new(Counting {
            inner: BufWriter::new(file),
            bytes: 0,
        });
        if let Some(decl) = decl {
            writer.write_event(Event::Decl(decl.clone()))?;
            writer.get_mut().write_all(b"\n")?;
        }
        Ok(OpenFragment {
            index,
            path,
            writer,
            open: Vec::new(),
            elements: 0,
        })
    }

    /// Make the open wrapper match `chain`: close wrapper elements that are
    /// not ancestors of the next split element, then open the missing ones.
    fn enter(&mut self, chain: &[Ancestor]) -> Result<()> {
        let common = self
            .open
            .iter()
            .zip(chain)
            .take_while(|(open, next)| open.id == next.id)
            .count();

        for stale in self.open.drain(common..).rev() {
            self.writer.write_event(Event::End(stale.start.to_end()))?;
        }
        for ancestor in &chain[common..] {
            self.writer.write_event(Event::Start(ancestor.start.borrow()))?;
            self.open.push(ancestor.clone());
        }
        Ok(())
    }

    fn write(&mut self, event: Event<'_>) -> Result<()> {
        self.writer.write_event(event)?;
        Ok(())
    }

    fn bytes(&self) -> u64 {
        self.writer.get_ref().bytes
    }

    fn finish(mut self) -> Result<Fragment> {
        for ancestor in self.open.drain(..).rev() {
            self.writer.write_event(Event::End(ancestor.start.to_end()))?;
        }
        self.writer.get_mut().write_all(b"\n")?;
        self.writer.get_mut().flush()?;

        Ok(Fragment {
            index: self.index,
            bytes: self.bytes(),
            path: self.path,
            elements: self.elements,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ReleaseSet Dated="2024-01-01">
  <Header>not copied</Header>
  <ClinVarSet ID="1"><Title>one</Title></ClinVarSet>
  <ClinVarSet ID="2"><Title>two &amp; more</Title></ClinVarSet>
  <ClinVarSet ID="3"><Title><![CDATA[three]]></Title></ClinVarSet>
  <ClinVarSet ID="4"/>
</ReleaseSet>
"#;

    fn split(doc: &str, path: &str, parts: usize) -> Result<(tempfile::TempDir, Vec<Fragment>)> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("doc.xml");
        fs::write(&input, doc)?;
        let split_path = TagPath::parse(path);
        let fragments = DocumentSplitter::new(&split_path, SplitOptions::new(parts), &Span::none())?
            .split(&input)?;
        Ok((dir, fragments))
    }

    #[test]
    fn test_fragments_reproduce_split_elements() {
        let (_dir, fragments) = split(DOC, "ReleaseSet/ClinVarSet", 2).unwrap();
        assert_eq!(fragments.len(), 2);

        let mut bodies = String::new();
        for (i, fragment) in fragments.iter().enumerate() {
            assert_eq!(fragment.index, i);
            assert!(fragment.path.ends_with(format!("doc.xml.{i}")));
            let text = fs::read_to_string(&fragment.path).unwrap();
            assert_eq!(text.len() as u64, fragment.bytes);
            assert!(text.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
            assert!(text.contains(r#"<ReleaseSet Dated="2024-01-01">"#));
            assert!(!text.contains("Header"));
            assert!(text.trim_end().ends_with("</ReleaseSet>"));
            bodies.push_str(&text);
        }

        assert_eq!(fragments.iter().map(|f| f.elements).sum::<usize>(), 4);
        for needle in [
            r#"<ClinVarSet ID="1"><Title>one</Title></ClinVarSet>"#,
            r#"<ClinVarSet ID="2"><Title>two &amp; more</Title></ClinVarSet>"#,
            r#"<ClinVarSet ID="3"><Title><![CDATA[three]]></Title></ClinVarSet>"#,
            r#"<ClinVarSet ID="4"/>"#,
        ] {
            assert_eq!(bodies.matches(needle).count(), 1, "{needle}");
        }
    }

    #[test]
    fn test_one_fragment_per_element_when_parts_exceed_elements() {
        let (_dir, fragments) = split(DOC, "ReleaseSet/ClinVarSet", 50).unwrap();
        assert_eq!(fragments.len(), 4);
        assert!(fragments.iter().all(|f| f.elements == 1));
    }

    #[test]
    fn test_single_part_holds_everything() {
        let (_dir, fragments) = split(DOC, "ReleaseSet/ClinVarSet", 1).unwrap();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].elements, 4);
    }

    #[test]
    fn test_wrapper_follows_parent_instances() {
        let doc = r#"<Root><Group n="a"><Item>1</Item><Item>2</Item></Group><Group n="b"><Item>3</Item></Group></Root>"#;
        let (_dir, fragments) = split(doc, "Root/Group/Item", 1).unwrap();
        assert_eq!(fragments.len(), 1);
        let text = fs::read_to_string(&fragments[0].path).unwrap();
        assert_eq!(
            text.trim_end(),
            r#"<Root><Group n="a"><Item>1</Item><Item>2</Item></Group><Group n="b"><Item>3</Item></Group></Root>"#
        );
    }

    #[test]
    fn test_missing_split_path_fails_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.xml");
        fs::write(&input, DOC).unwrap();
        let split_path = TagPath::parse("ReleaseSet/Nothing");

        let err = DocumentSplitter::new(&split_path, SplitOptions::new(2), &Span::none())
            .unwrap()
            .split(&input)
            .unwrap_err();
        assert!(matches!(err, Error::Split(SplitError::NoSplitElements(_))));

        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_truncated_input_removes_partial_fragments() {
        let doc = "<Root><Item>1</Item><Item>2</Item><Item>3";
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.xml");
        fs::write(&input, doc).unwrap();
        let split_path = TagPath::parse("Root/Item");

        let result = DocumentSplitter::new(&split_path, SplitOptions::new(1), &Span::none())
            .unwrap()
            .split(&input);
        assert!(result.is_err());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_zero_parts_rejected() {
        let split_path = TagPath::parse("a/b");
        assert!(matches!(
            DocumentSplitter::new(&split_path, SplitOptions::new(0), &Span::none()),
            Err(Error::Split(SplitError::ZeroParts))
        ));
    }

    #[test]
    fn test_output_dir_option() {
        let out = tempfile::tempdir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.xml");
        fs::write(&input, DOC).unwrap();
        let split_path = TagPath::parse("ReleaseSet/ClinVarSet");

        let fragments = DocumentSplitter::new(
            &split_path,
            SplitOptions::new(2).output_dir(out.path()),
            &Span::none(),
        )
        .unwrap()
        .split(&input)
        .unwrap();
        assert!(fragments.iter().all(|f| f.path.starts_with(out.path())));

        remove_fragments(&fragments);
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
    }
}
