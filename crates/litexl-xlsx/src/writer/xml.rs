//! Thin builder over `quick_xml::Writer` used by every part generator.
//!
//! Output is flat (no indentation): the declaration, a CRLF, then the root
//! element. Text and attribute values are escaped by quick-xml; characters
//! XML 1.0 cannot carry are refused, so every part stays well-formed. String
//! content that may hold them goes through `encode_excel_escapes` first.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::{XlsxError, XlsxResult};
use crate::escape::is_xml_char;

/// XML declaration shared by every part
pub(crate) const XML_DECLARATION: &str =
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

fn check_chars(value: &str) -> XlsxResult<()> {
    match value.chars().find(|&c| !is_xml_char(c)) {
        Some(c) => Err(XlsxError::InvalidFormat(format!(
            "character U+{:04X} cannot be written to XML",
            c as u32
        ))),
        None => Ok(()),
    }
}

fn check_attrs(attrs: &[(&str, &str)]) -> XlsxResult<()> {
    attrs.iter().try_for_each(|(_, value)| check_chars(value))
}

pub(crate) struct XmlBuilder {
    writer: Writer<Vec<u8>>,
}

impl XmlBuilder {
    /// Start a new part with the standalone UTF-8 declaration
    pub(crate) fn new() -> XlsxResult<Self> {
        let mut writer = Writer::new(Vec::new());
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        writer.get_mut().extend_from_slice(b"\r\n");
        Ok(Self { writer })
    }

    /// Start without a declaration, for parts re-emitted event by event
    pub(crate) fn without_declaration() -> Self {
        Self {
            writer: Writer::new(Vec::new()),
        }
    }

    /// Write an event read from an existing part unchanged
    pub(crate) fn event(&mut self, event: Event<'_>) -> XlsxResult<()> {
        self.writer.write_event(event)?;
        Ok(())
    }

    pub(crate) fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> XlsxResult<()> {
        check_attrs(attrs)?;
        let elem = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.writer.write_event(Event::Start(elem))?;
        Ok(())
    }

    pub(crate) fn end(&mut self, name: &str) -> XlsxResult<()> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    pub(crate) fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> XlsxResult<()> {
        check_attrs(attrs)?;
        let elem = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.writer.write_event(Event::Empty(elem))?;
        Ok(())
    }

    pub(crate) fn text(&mut self, text: &str) -> XlsxResult<()> {
        check_chars(text)?;
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        Ok(())
    }

    /// `<name attrs>text</name>`
    pub(crate) fn text_element(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
        text: &str,
    ) -> XlsxResult<()> {
        self.start(name, attrs)?;
        self.text(text)?;
        self.end(name)
    }

    pub(crate) fn finish(self) -> XlsxResult<String> {
        Ok(String::from_utf8(self.writer.into_inner())?)
    }
}
