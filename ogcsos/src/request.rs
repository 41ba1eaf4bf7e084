//! Construction of SOS 2.0 request documents.

use chrono::FixedOffset;
use xmltree::{Element, EmitterConfig, XMLNode};

use crate::errors::Result;
use crate::model::TimeSeries;
use crate::namespaces::NamespaceTable;
use crate::time::{TimeRange, encode_timestamp};

pub const SERVICE: &str = "SOS";
pub const VERSION: &str = "2.0.0";

/// Sections requested by GetCapabilities.
pub const CAPABILITIES_SECTIONS: &[&str] = &[
    "OperationsMetadata",
    "ServiceIdentification",
    "ServiceProvider",
    "Filter_Capabilities",
    "Contents",
];

const MEASUREMENT_TYPE: &str =
    "http://www.opengis.net/def/observationType/OGC-OM/2.0/OM_Measurement";

/// Operations sharing the offering / property / temporal filter layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOperation {
    GetObservation,
    GetResult,
}

impl DataOperation {
    pub fn name(&self) -> &'static str {
        match self {
            DataOperation::GetObservation => "GetObservation",
            DataOperation::GetResult => "GetResult",
        }
    }
}

/// Builds request trees declaring `namespaces` on their root element.
///
/// Builders never fail: an empty property list or procedure produces a
/// well-formed request that the server will reject.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    namespaces: NamespaceTable,
    utc_offset: FixedOffset,
}

impl RequestBuilder {
    pub fn new(namespaces: NamespaceTable, utc_offset: FixedOffset) -> Self {
        Self {
            namespaces,
            utc_offset,
        }
    }

    pub fn namespaces(&self) -> &NamespaceTable {
        &self.namespaces
    }

    fn root(&self, name: &str) -> Element {
        let mut root = Element::new(name);
        for (key, value) in self.namespaces.declarations() {
            root.attributes.insert(key, value);
        }
        root.attributes
            .insert("service".to_string(), SERVICE.to_string());
        root
    }

    /// GetCapabilities. The root sits in the default namespace bound to the
    /// SOS URI: some servers reject a `sos:` prefixed GetCapabilities.
    pub fn capabilities(&self) -> Element {
        let mut root = self.root("GetCapabilities");
        if let Some(sos) = self.namespaces.uri("sos") {
            root.attributes.insert("xmlns".to_string(), sos.to_string());
        }

        let accept_version = push_child(&mut root, Element::new("ows:AcceptVersion"));
        push_child(accept_version, text_element("ows:Version", VERSION));

        let sections = push_child(&mut root, Element::new("ows:Sections"));
        for section in CAPABILITIES_SECTIONS {
            push_child(sections, text_element("ows:Section", section));
        }
        root
    }

    pub fn observation<S: AsRef<str>>(
        &self,
        procedure: &str,
        properties: &[S],
        range: &TimeRange,
    ) -> Element {
        self.data_request(DataOperation::GetObservation, procedure, properties, range)
    }

    /// GetResult. Several properties in one request are a server extension;
    /// see `response::parse_result` for how the answer is split back.
    pub fn result<S: AsRef<str>>(
        &self,
        procedure: &str,
        properties: &[S],
        range: &TimeRange,
    ) -> Element {
        self.data_request(DataOperation::GetResult, procedure, properties, range)
    }

    pub fn data_request<S: AsRef<str>>(
        &self,
        operation: DataOperation,
        procedure: &str,
        properties: &[S],
        range: &TimeRange,
    ) -> Element {
        let mut root = self.root(&format!("sos:{}", operation.name()));
        root.attributes
            .insert("version".to_string(), VERSION.to_string());
        push_child(&mut root, text_element("sos:offering", procedure));
        for property in properties {
            push_child(
                &mut root,
                text_element("sos:observedProperty", property.as_ref()),
            );
        }

        let filter = push_child(&mut root, Element::new("sos:temporalFilter"));
        match range {
            TimeRange::Between(start, end) => {
                let during = push_child(filter, Element::new("fes:During"));
                push_child(during, text_element("fes:ValueReference", "phenomenonTime"));
                let period = push_child(during, with_gml_id("gml:TimePeriod", "t1"));
                push_child(
                    period,
                    text_element(
                        "gml:beginPosition",
                        &encode_timestamp(start, &self.utc_offset),
                    ),
                );
                push_child(
                    period,
                    text_element("gml:endPosition", &encode_timestamp(end, &self.utc_offset)),
                );
            }
            TimeRange::At(_) | TimeRange::Latest => {
                let equals = push_child(filter, Element::new("fes:TEquals"));
                push_child(equals, text_element("fes:ValueReference", "phenomenonTime"));
                let instant = push_child(equals, with_gml_id("gml:TimeInstant", "t1"));
                let position = match range {
                    TimeRange::At(time) => encode_timestamp(time, &self.utc_offset),
                    _ => "last".to_string(),
                };
                push_child(instant, text_element("gml:timePosition", &position));
            }
        }
        root
    }

    /// InsertObservation with one `om:OM_Observation` per (time, property)
    /// entry, in the iteration order of `measurements`.
    pub fn insert_observation(&self, procedure: &str, measurements: &TimeSeries) -> Element {
        let mut root = self.root("sos:InsertObservation");
        root.attributes
            .insert("version".to_string(), VERSION.to_string());
        push_child(&mut root, text_element("sos:offering", procedure));

        let mut index = 0usize;
        for (time, values) in measurements {
            for (property, measurement) in values {
                index += 1;
                let instant_id = format!("phenomenonTime{index}");

                let observation = push_child(&mut root, Element::new("sos:observation"));
                let om = push_child(
                    observation,
                    with_gml_id("om:OM_Observation", &format!("obs{index}")),
                );

                let mut om_type = Element::new("om:type");
                om_type
                    .attributes
                    .insert("xlink:href".to_string(), MEASUREMENT_TYPE.to_string());
                push_child(om, om_type);

                let phenomenon_time = push_child(om, Element::new("om:phenomenonTime"));
                let instant = push_child(phenomenon_time, with_gml_id("gml:TimeInstant", &instant_id));
                push_child(
                    instant,
                    text_element("gml:timePosition", &encode_timestamp(time, &self.utc_offset)),
                );

                let mut result_time = Element::new("om:resultTime");
                result_time
                    .attributes
                    .insert("xlink:href".to_string(), format!("#{instant_id}"));
                push_child(om, result_time);

                push_child(om, text_element("om:procedure", procedure));
                push_child(om, text_element("sos:observedProperty", property));

                let mut result = text_element("om:result", &measurement.value.to_string());
                result
                    .attributes
                    .insert("xsi:type".to_string(), "gml:MeasureType".to_string());
                result
                    .attributes
                    .insert("uom".to_string(), measurement.unit.clone());
                push_child(om, result);
            }
        }
        root
    }
}

/// Serializes a request tree with an XML declaration.
pub fn to_xml_string(root: &Element) -> Result<String> {
    let mut buf = Vec::new();
    let config = EmitterConfig::new()
        .write_document_declaration(true)
        .perform_indent(true)
        .indent_string("  ");
    root.write_with_config(&mut buf, config)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn text_element(name: &str, text: &str) -> Element {
    let mut elem = Element::new(name);
    elem.children.push(XMLNode::Text(text.to_string()));
    elem
}

fn with_gml_id(name: &str, id: &str) -> Element {
    let mut elem = Element::new(name);
    elem.attributes.insert("gml:id".to_string(), id.to_string());
    elem
}

/// Appends `child` and returns it for further nesting.
fn push_child(parent: &mut Element, child: Element) -> &mut Element {
    parent.children.push(XMLNode::Element(child));
    match parent.children.last_mut() {
        Some(XMLNode::Element(elem)) => elem,
        _ => unreachable!("an element was just pushed"),
    }
}
