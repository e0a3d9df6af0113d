use std::borrow::Cow;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::Error;

/// Keeps only characters XML 1.0 can carry. Line breaks and tabs become
/// spaces so a label stays on one line inside an attribute value.
pub fn sanitize(s: &str) -> Cow<'_, str> {
    if s.chars().all(|c| is_xml_char(c) && !matches!(c, '\t' | '\n' | '\r')) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(
        s.chars()
            .filter_map(|c| match c {
                '\t' | '\n' | '\r' => Some(' '),
                c if is_xml_char(c) => Some(c),
                _ => None,
            })
            .collect(),
    )
}

fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\r'
            | '\u{20}'..='\u{D7FF}'
            | '\u{E000}'..='\u{FFFD}'
            | '\u{10000}'..='\u{10FFFF}'
    )
}

/// Indented document writer over `quick_xml`. Element names are trusted;
/// attribute values and text are sanitized, then escaped by `quick_xml`.
pub struct XmlWriter {
    writer: Writer<Vec<u8>>,
    open: Vec<String>,
}

impl XmlWriter {
    pub fn new() -> Result<Self, Error> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(write_error)?;
        Ok(Self {
            writer,
            open: Vec::new(),
        })
    }

    pub fn open(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), Error> {
        self.emit(Event::Start(start_tag(name, attrs)))?;
        self.open.push(name.to_string());
        Ok(())
    }

    pub fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), Error> {
        self.emit(Event::Empty(start_tag(name, attrs)))
    }

    /// A single element holding `text` and nothing else.
    pub fn text(&mut self, name: &str, attrs: &[(&str, &str)], text: &str) -> Result<(), Error> {
        self.emit(Event::Start(start_tag(name, attrs)))?;
        self.emit(Event::Text(BytesText::new(&sanitize(text))))?;
        self.emit(Event::End(BytesEnd::new(name)))
    }

    pub fn close(&mut self) -> Result<(), Error> {
        match self.open.pop() {
            Some(name) => self.emit(Event::End(BytesEnd::new(name))),
            None => Ok(()),
        }
    }

    /// Closes every element still open and returns the document.
    pub fn finish(mut self) -> Result<String, Error> {
        while !self.open.is_empty() {
            self.close()?;
        }
        let mut bytes = self.writer.into_inner();
        bytes.push(b'\n');
        String::from_utf8(bytes).map_err(write_error)
    }

    fn emit(&mut self, event: Event<'_>) -> Result<(), Error> {
        self.writer.write_event(event).map_err(write_error)
    }
}

fn start_tag<'a>(name: &'a str, attrs: &[(&str, &str)]) -> BytesStart<'a> {
    let mut start = BytesStart::new(name);
    for (key, value) in attrs {
        start.push_attribute((*key, &*sanitize(value)));
    }
    start
}

fn write_error(e: impl std::fmt::Display) -> Error {
    Error::Write(e.to_string())
}
