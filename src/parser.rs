//! Parsing of the target-supplied `library-list` document.
//!
//! The schema is small and fixed:
//!
//! ```text
//! <library-list version="1.0">     version optional, "1.0" if present
//!   <library name="...">           name required
//!     <segment address="..."/>     zero or more, XOR with <section>
//!     <section address="..."/>
//!   </library>
//! </library-list>
//! ```
//!
//! Addresses are unsigned, hexadecimal (`0x...`) or decimal. Elements
//! outside the schema are skipped. Parsing is all-or-nothing: any schema
//! violation discards every partially built record.
//!
//! The event loop threads a [`ListBuilder`] through each handler rather than
//! mutating shared state from callbacks; on success the builder yields its
//! records, on failure it is dropped wholesale.

use cfg_if::cfg_if;
use log::*;
use thiserror::Error;

use crate::record::LmInfo;

/// Why a `library-list` document was rejected.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The root element carried a `version` other than `"1.0"`.
    #[error("library list has unsupported version {0:?}")]
    UnsupportedVersion(String),

    /// The document's root element is not `<library-list>`.
    #[error("expected <library-list> root element, found <{0}>")]
    UnexpectedRoot(String),

    /// A schema element is missing a required attribute.
    #[error("<{element}> is missing its required {attribute:?} attribute")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },

    /// An `address` attribute is not a hexadecimal or decimal unsigned
    /// integer.
    #[error("malformed address {0:?}")]
    MalformedAddress(String),

    /// A single library reported both segment and section bases.
    #[error("library list with both segments and sections")]
    MixedBaseKinds,

    /// A library closed with no segment or section bases at all.
    #[error("no segment or section bases defined")]
    IncompleteLibrary,

    /// The document ended before `</library-list>`.
    #[error("truncated library list document")]
    Truncated,

    /// The document is not well-formed XML.
    #[cfg(feature = "xml")]
    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Accumulates records as elements close. Owned by the parse loop; never
/// shared.
#[cfg(feature = "xml")]
#[derive(Debug, Default)]
struct ListBuilder {
    list: Vec<LmInfo>,
}

#[cfg(feature = "xml")]
impl ListBuilder {
    fn start_library(&mut self, name: String) {
        self.list.push(LmInfo::named(name));
    }

    fn current(&mut self) -> &mut LmInfo {
        // a <segment>/<section> handler only runs inside <library>
        self.list.last_mut().expect("no open <library> element")
    }

    fn add_segment_base(&mut self, address: u64) -> Result<(), ParseError> {
        let lm = self.current();
        if !lm.section_bases.is_empty() {
            return Err(ParseError::MixedBaseKinds);
        }
        lm.segment_bases.push(address);
        Ok(())
    }

    fn add_section_base(&mut self, address: u64) -> Result<(), ParseError> {
        let lm = self.current();
        if !lm.segment_bases.is_empty() {
            return Err(ParseError::MixedBaseKinds);
        }
        lm.section_bases.push(address);
        Ok(())
    }

    fn end_library(&mut self) -> Result<(), ParseError> {
        if !self.current().has_bases() {
            return Err(ParseError::IncompleteLibrary);
        }
        Ok(())
    }

    fn finish(self) -> Vec<LmInfo> {
        self.list
    }
}

/// Parse an `address` attribute value: `0x`-prefixed hexadecimal or plain
/// decimal.
#[cfg(feature = "xml")]
fn parse_address(text: &str) -> Result<u64, ParseError> {
    let text = text.trim();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|_| ParseError::MalformedAddress(text.to_owned()))
}

cfg_if! {
    if #[cfg(feature = "xml")] {
        use quick_xml::events::{BytesStart, Event};
        use quick_xml::name::QName;
        use quick_xml::Reader;

        /// Where the event loop currently sits in the schema.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        enum State {
            /// Before the root element.
            Start,
            /// Inside `<library-list>`.
            InList,
            /// Inside a `<library>`.
            InLibrary,
            /// After `</library-list>`.
            Done,
        }

        /// Fetch a required attribute off an element, unescaped.
        fn required_attribute(
            element: &BytesStart<'_>,
            element_name: &'static str,
            attribute: &'static str,
        ) -> Result<String, ParseError> {
            optional_attribute(element, attribute)?.ok_or(ParseError::MissingAttribute {
                element: element_name,
                attribute,
            })
        }

        fn optional_attribute(
            element: &BytesStart<'_>,
            attribute: &'static str,
        ) -> Result<Option<String>, ParseError> {
            for attr in element.attributes() {
                let attr = attr.map_err(quick_xml::Error::from)?;
                if attr.key.as_ref() == attribute.as_bytes() {
                    let value = attr.unescape_value()?;
                    return Ok(Some(value.into_owned()));
                }
            }
            Ok(None)
        }

        /// Skip an element this schema doesn't know about, subtree included.
        fn skip_element(
            reader: &mut Reader<&[u8]>,
            element: &BytesStart<'_>,
        ) -> Result<(), ParseError> {
            let name = element.name().as_ref().to_vec();
            reader.read_to_end(QName(&name))?;
            Ok(())
        }

        /// Handle an opening tag (`<x>` or self-closing `<x/>`), returning
        /// the state the loop continues in.
        fn handle_open(
            reader: &mut Reader<&[u8]>,
            builder: &mut ListBuilder,
            state: State,
            element: &BytesStart<'_>,
            self_closing: bool,
        ) -> Result<State, ParseError> {
            match (state, element.name().as_ref()) {
                (State::Start, b"library-list") => {
                    // #FIXED attribute, so it may be omitted entirely
                    if let Some(version) = optional_attribute(element, "version")? {
                        if version != "1.0" {
                            return Err(ParseError::UnsupportedVersion(version));
                        }
                    }
                    Ok(if self_closing { State::Done } else { State::InList })
                }
                (State::Start, other) => Err(ParseError::UnexpectedRoot(
                    String::from_utf8_lossy(other).into_owned(),
                )),
                (State::InList, b"library") => {
                    let name = required_attribute(element, "library", "name")?;
                    builder.start_library(name);
                    if self_closing {
                        // <library .../> closed without any bases
                        builder.end_library()?;
                        Ok(State::InList)
                    } else {
                        Ok(State::InLibrary)
                    }
                }
                (State::InLibrary, b"segment") => {
                    let address = required_attribute(element, "segment", "address")?;
                    builder.add_segment_base(parse_address(&address)?)?;
                    if !self_closing {
                        skip_element(reader, element)?;
                    }
                    Ok(State::InLibrary)
                }
                (State::InLibrary, b"section") => {
                    let address = required_attribute(element, "section", "address")?;
                    builder.add_section_base(parse_address(&address)?)?;
                    if !self_closing {
                        skip_element(reader, element)?;
                    }
                    Ok(State::InLibrary)
                }
                // anything else is outside the schema: skip it, subtree
                // included
                _ => {
                    if !self_closing {
                        skip_element(reader, element)?;
                    }
                    Ok(state)
                }
            }
        }

        /// Parse a `library-list` document into one [`LmInfo`] per reported
        /// library, in document order.
        ///
        /// Parsing is all-or-nothing: any schema violation or XML error
        /// discards the entire result.
        pub fn parse_library_list(document: &[u8]) -> Result<Vec<LmInfo>, ParseError> {
            trace!("parsing target library list ({} bytes)", document.len());

            let mut reader = Reader::from_reader(document);
            reader.trim_text(true);

            let mut builder = ListBuilder::default();
            let mut state = State::Start;

            loop {
                match reader.read_event()? {
                    Event::Start(e) => {
                        state = handle_open(&mut reader, &mut builder, state, &e, false)?;
                    }
                    Event::Empty(e) => {
                        state = handle_open(&mut reader, &mut builder, state, &e, true)?;
                    }
                    Event::End(e) => match e.name().as_ref() {
                        b"library" => {
                            builder.end_library()?;
                            state = State::InList;
                        }
                        b"library-list" => state = State::Done,
                        _ => {}
                    },
                    Event::Eof => break,
                    // declarations, text, comments: nothing to do
                    _ => {}
                }
            }

            if state != State::Done {
                return Err(ParseError::Truncated);
            }

            Ok(builder.finish())
        }
    } else {
        use std::sync::atomic::{AtomicBool, Ordering};

        /// Without XML support there is nothing to parse. Warn once.
        pub(crate) fn parse_libraries(_document: &[u8]) -> Option<Vec<LmInfo>> {
            static HAVE_WARNED: AtomicBool = AtomicBool::new(false);

            if !HAVE_WARNED.swap(true, Ordering::Relaxed) {
                warn!(
                    "Can not parse XML library list; XML support was disabled \
                     at compile time"
                );
            }

            None
        }
    }
}

#[cfg(feature = "xml")]
pub(crate) fn parse_libraries(document: &[u8]) -> Option<Vec<LmInfo>> {
    match parse_library_list(document) {
        Ok(list) => Some(list),
        Err(err) => {
            warn!("while parsing target library list: {err}");
            None
        }
    }
}

#[cfg(all(test, feature = "xml"))]
mod tests {
    use super::*;

    fn parse(doc: &str) -> Result<Vec<LmInfo>, ParseError> {
        parse_library_list(doc.as_bytes())
    }

    #[test]
    fn two_libraries_in_document_order() {
        let list = parse(
            r#"<library-list version="1.0">
                 <library name="libfoo.so">
                   <segment address="0x1000"/>
                   <segment address="0x2000"/>
                 </library>
                 <library name="libbar.so">
                   <section address="0x4000"/>
                 </library>
               </library-list>"#,
        )
        .unwrap();

        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name(), "libfoo.so");
        assert_eq!(list[0].segment_bases, vec![0x1000, 0x2000]);
        assert!(list[0].section_bases.is_empty());
        assert_eq!(list[1].name(), "libbar.so");
        assert_eq!(list[1].section_bases, vec![0x4000]);
        assert!(list[1].segment_bases.is_empty());
    }

    #[test]
    fn empty_list_is_valid() {
        assert!(parse(r#"<library-list version="1.0"></library-list>"#)
            .unwrap()
            .is_empty());
        assert!(parse(r#"<library-list/>"#).unwrap().is_empty());
    }

    #[test]
    fn version_is_optional_but_checked() {
        assert!(parse(
            r#"<library-list>
                 <library name="a"><segment address="1"/></library>
               </library-list>"#
        )
        .is_ok());

        let err = parse(
            r#"<library-list version="2.0">
                 <library name="a"><segment address="1"/></library>
               </library-list>"#,
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedVersion(v) if v == "2.0"));
    }

    #[test]
    fn decimal_and_hex_addresses() {
        let list = parse(
            r#"<library-list>
                 <library name="a">
                   <section address="4096"/>
                   <section address="0X20"/>
                 </library>
               </library-list>"#,
        )
        .unwrap();
        assert_eq!(list[0].section_bases, vec![4096, 0x20]);
    }

    #[test]
    fn malformed_address_rejected() {
        let err = parse(
            r#"<library-list>
                 <library name="a"><segment address="0xzz"/></library>
               </library-list>"#,
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::MalformedAddress(_)));
    }

    #[test]
    fn mixed_bases_rejected_both_orders() {
        let err = parse(
            r#"<library-list>
                 <library name="a">
                   <segment address="0x1000"/>
                   <section address="0x2000"/>
                 </library>
               </library-list>"#,
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::MixedBaseKinds));

        let err = parse(
            r#"<library-list>
                 <library name="a">
                   <section address="0x2000"/>
                   <segment address="0x1000"/>
                 </library>
               </library-list>"#,
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::MixedBaseKinds));
    }

    #[test]
    fn library_without_bases_rejected() {
        let err = parse(r#"<library-list><library name="a"></library></library-list>"#)
            .unwrap_err();
        assert!(matches!(err, ParseError::IncompleteLibrary));

        // self-closing form
        let err = parse(r#"<library-list><library name="a"/></library-list>"#).unwrap_err();
        assert!(matches!(err, ParseError::IncompleteLibrary));
    }

    #[test]
    fn missing_required_attributes() {
        let err = parse(r#"<library-list><library><segment address="1"/></library></library-list>"#)
            .unwrap_err();
        assert!(matches!(
            err,
            ParseError::MissingAttribute {
                element: "library",
                attribute: "name"
            }
        ));

        let err = parse(r#"<library-list><library name="a"><segment/></library></library-list>"#)
            .unwrap_err();
        assert!(matches!(
            err,
            ParseError::MissingAttribute {
                element: "segment",
                attribute: "address"
            }
        ));
    }

    #[test]
    fn failure_discards_whole_document() {
        // the well-formed first library must not survive the second's error
        let err = parse(
            r#"<library-list>
                 <library name="good"><segment address="0x1000"/></library>
                 <library name="bad"></library>
               </library-list>"#,
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::IncompleteLibrary));
        assert!(parse_libraries(
            br#"<library-list>
                  <library name="good"><segment address="0x1000"/></library>
                  <library name="bad"></library>
                </library-list>"#
        )
        .is_none());
    }

    #[test]
    fn unknown_elements_skipped() {
        let list = parse(
            r#"<?xml version="1.0"?>
               <library-list version="1.0">
                 <annotations><note>hi</note></annotations>
                 <library name="a">
                   <mystery attr="1"><nested/></mystery>
                   <segment address="0x10"/>
                 </library>
               </library-list>"#,
        )
        .unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].segment_bases, vec![0x10]);
    }

    #[test]
    fn wrong_root_rejected() {
        let err = parse(r#"<libraries></libraries>"#).unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedRoot(r) if r == "libraries"));
    }

    #[test]
    fn truncated_document_rejected() {
        let err = parse(r#"<library-list><library name="a"><segment address="1"/>"#).unwrap_err();
        // quick-xml may flag the dangling tags itself; either way it must
        // not parse
        assert!(matches!(err, ParseError::Truncated | ParseError::Xml(_)));
    }

    #[test]
    fn escaped_names_unescaped() {
        let list = parse(
            r#"<library-list>
                 <library name="libs &amp; stubs.so"><section address="1"/></library>
               </library-list>"#,
        )
        .unwrap();
        assert_eq!(list[0].name(), "libs & stubs.so");
    }
}
