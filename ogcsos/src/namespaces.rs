//! XML namespace tables.
//!
//! Two kinds of tables are used for every exchange: the fixed OGC SOS 2.0
//! table declared on outbound requests, and the table harvested from the root
//! element of each response, because servers are free to bind other prefixes
//! to the same URIs.

use std::collections::BTreeMap;
use std::io::BufRead;

use quick_xml::{Reader, events::Event};
use tracing::debug;

pub const FES: &str = "http://www.opengis.net/fes/2.0";
pub const GML: &str = "http://www.opengis.net/gml/3.2";
pub const OM: &str = "http://www.opengis.net/om/2.0";
pub const OWS: &str = "http://www.opengis.net/ows/1.1";
pub const SOS: &str = "http://www.opengis.net/sos/2.0";
pub const SWE: &str = "http://www.opengis.net/swe/2.0";
pub const SWES: &str = "http://www.opengis.net/swes/2.0";
pub const OGC: &str = "http://www.opengis.net/ogc";
pub const WSA: &str = "http://www.w3.org/2005/08/addressing";
pub const XS: &str = "http://www.w3.org/2001/XMLSchema";
pub const XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const XLINK: &str = "http://www.w3.org/1999/xlink";

pub const SOS_SCHEMA_LOCATION: &str =
    "http://www.opengis.net/sos/2.0 http://schemas.opengis.net/sos/2.0/sos.xsd";

/// Prefix → URI bindings, plus the schema location declared on requests.
///
/// The default namespace, when harvested, is stored under the empty prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceTable {
    bindings: BTreeMap<String, String>,
    schema_location: Option<String>,
}

impl NamespaceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binding(mut self, prefix: &str, uri: &str) -> Self {
        self.bindings.insert(prefix.to_string(), uri.to_string());
        self
    }

    pub fn with_schema_location(mut self, location: &str) -> Self {
        self.schema_location = Some(location.to_string());
        self
    }

    pub fn uri(&self, prefix: &str) -> Option<&str> {
        self.bindings.get(prefix).map(String::as_str)
    }

    pub fn contains(&self, prefix: &str) -> bool {
        self.bindings.contains_key(prefix)
    }

    pub fn schema_location(&self) -> Option<&str> {
        self.schema_location.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings
            .iter()
            .map(|(prefix, uri)| (prefix.as_str(), uri.as_str()))
    }

    /// Attributes declaring this table on a root element
    /// (`xmlns:p="uri"` pairs, then `xsi:schemaLocation`).
    pub fn declarations(&self) -> Vec<(String, String)> {
        let mut attributes: Vec<(String, String)> = self
            .iter()
            .map(|(prefix, uri)| {
                if prefix.is_empty() {
                    ("xmlns".to_string(), uri.to_string())
                } else {
                    (format!("xmlns:{prefix}"), uri.to_string())
                }
            })
            .collect();
        if let Some(location) = &self.schema_location {
            attributes.push(("xsi:schemaLocation".to_string(), location.clone()));
        }
        attributes
    }
}

/// The fixed outbound table of OGC SOS 2.0 (table 12 of the standard).
pub fn default_namespaces() -> NamespaceTable {
    NamespaceTable::new()
        .with_binding("fes", FES)
        .with_binding("gml", GML)
        .with_binding("om", OM)
        .with_binding("ows", OWS)
        .with_binding("sos", SOS)
        .with_binding("swe", SWE)
        .with_binding("swes", SWES)
        .with_binding("ogc", OGC)
        .with_binding("wsa", WSA)
        .with_binding("xs", XS)
        .with_binding("xsi", XSI)
        .with_binding("xlink", XLINK)
        .with_schema_location(SOS_SCHEMA_LOCATION)
}

/// Reads the namespace declarations of the root element.
///
/// Only the prolog and the opening root tag are consumed from `reader`.
/// Malformed input yields whatever was collected before the error; the
/// content parse reports the problem.
pub fn harvest_namespaces<R: BufRead>(reader: R) -> NamespaceTable {
    let mut reader = Reader::from_reader(reader);
    let mut buf = Vec::new();
    let mut table = NamespaceTable::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                for attr in e.attributes().flatten() {
                    let key = attr.key.as_ref();
                    let prefix = if key == b"xmlns" {
                        Some(String::new())
                    } else {
                        key.strip_prefix(b"xmlns:")
                            .map(|p| String::from_utf8_lossy(p).into_owned())
                    };
                    if let Some(prefix) = prefix {
                        let uri = String::from_utf8_lossy(&attr.value).into_owned();
                        table.bindings.insert(prefix, uri);
                    }
                }
                break;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                debug!("Stopping namespace harvest on malformed XML: {}", err);
                break;
            }
        }
        buf.clear();
    }

    table
}
