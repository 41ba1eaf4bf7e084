//! Parsing of SOS 2.0 response documents.
//!
//! Every document goes through two passes: a streaming scan of the root
//! element's namespace declarations, then a full tree parse. Search paths
//! are written with the usual OGC prefixes and resolved against the
//! harvested table, so whatever prefixes the server picked are honoured.
//!
//! Unparseable capabilities and observation documents degrade to empty
//! results; the insert acknowledgement falls back to the raw body.

use chrono::NaiveDateTime;
use tracing::{debug, warn};
use xmltree::Element;

use crate::model::{Capabilities, Measurement, Offering, Provider, Server, TimeSeries, record};
use crate::namespaces::{NamespaceTable, harvest_namespaces};
use crate::qpath::{child_elements, find_all_in, find_in};
use crate::time::parse_timestamp;

/// A response parsed as a namespaced tree.
#[derive(Debug, Clone)]
pub struct ResponseDocument {
    pub root: Element,
    pub namespaces: NamespaceTable,
}

impl ResponseDocument {
    /// `None` when `body` is not well-formed namespaced XML.
    pub fn parse(body: &str) -> Option<Self> {
        let namespaces = harvest_namespaces(body.as_bytes());
        match Element::parse(body.as_bytes()) {
            Ok(root) => Some(Self { root, namespaces }),
            Err(err) => {
                debug!("Response is not well-formed XML: {}", err);
                None
            }
        }
    }

    pub fn find(&self, path: &str) -> Option<&Element> {
        find_in(&self.root, path, &self.namespaces)
    }

    pub fn find_all(&self, path: &str) -> Vec<&Element> {
        find_all_in(&self.root, path, &self.namespaces)
    }
}

fn element_text(element: &Element) -> Option<String> {
    element
        .get_text()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Text of the first child named `local`, whatever its namespace.
fn child_text(parent: &Element, local: &str) -> Option<String> {
    child_elements(parent)
        .find(|e| e.name == local)
        .and_then(element_text)
}

fn text_at(parent: &Element, path: &str, namespaces: &NamespaceTable) -> Option<String> {
    find_in(parent, path, namespaces).and_then(element_text)
}

// ---------------------------------------------------------------------------
// GetCapabilities
// ---------------------------------------------------------------------------

pub fn parse_capabilities(body: &str) -> Capabilities {
    match ResponseDocument::parse(body) {
        Some(doc) => capabilities_from(&doc),
        None => {
            warn!("GetCapabilities response is not valid XML, returning empty capabilities");
            Capabilities::default()
        }
    }
}

pub fn capabilities_from(doc: &ResponseDocument) -> Capabilities {
    let ns = &doc.namespaces;

    let server = doc.find("ows:ServiceIdentification").map(parse_service);
    let provider = doc
        .find("ows:ServiceProvider")
        .map(|elem| parse_provider(elem, ns));
    let operations = doc
        .find("ows:OperationsMetadata")
        .map(|elem| parse_operations(elem, ns))
        .unwrap_or_default();
    let offerings = doc
        .find_all("sos:contents/sos:Contents/swes:offering")
        .into_iter()
        .filter_map(|elem| parse_offering(elem, ns))
        .collect::<Vec<_>>();

    debug!(
        operations = operations.len(),
        offerings = offerings.len(),
        "Parsed capabilities"
    );

    Capabilities {
        server,
        provider,
        operations,
        offerings,
    }
}

pub fn parse_service(service: &Element) -> Server {
    Server {
        name: child_text(service, "Title"),
        service_type: child_text(service, "ServiceType"),
        service_version: child_text(service, "ServiceTypeVersion"),
        fees: child_text(service, "Fees"),
    }
}

pub fn parse_provider(provider: &Element, namespaces: &NamespaceTable) -> Provider {
    let mut parsed = Provider {
        name: child_text(provider, "ProviderName"),
        ..Default::default()
    };

    if let Some(contact) = child_elements(provider).find(|e| e.name == "ServiceContact") {
        parsed.individual_name = text_at(contact, "ows:IndividualName", namespaces);
        parsed.position_name = text_at(contact, "ows:PositionName", namespaces);
        if let Some(address) = find_in(contact, "ows:ContactInfo/ows:Address", namespaces) {
            parsed.delivery_point = text_at(address, "ows:DeliveryPoint", namespaces);
            parsed.city = text_at(address, "ows:City", namespaces);
            parsed.administrative_area = text_at(address, "ows:AdministrativeArea", namespaces);
            parsed.country = text_at(address, "ows:Country", namespaces);
        }
    }
    parsed
}

pub fn parse_operations(operations: &Element, namespaces: &NamespaceTable) -> Vec<String> {
    find_all_in(operations, "ows:Operation", namespaces)
        .into_iter()
        .filter_map(|op| op.attributes.get("name").cloned())
        .collect()
}

/// Reads one `swes:offering`. Offerings without a procedure cannot be
/// addressed and are skipped.
pub fn parse_offering(offering: &Element, namespaces: &NamespaceTable) -> Option<Offering> {
    let observation_offering = find_in(offering, "sos:ObservationOffering", namespaces)?;

    let mut name = None;
    let mut description = None;
    let mut procedure = None;
    let mut properties = Vec::new();
    for child in child_elements(observation_offering) {
        match child.name.as_str() {
            "description" => description = element_text(child),
            "name" => name = element_text(child),
            "procedure" => procedure = element_text(child),
            "observableProperty" => {
                if let Some(property) = element_text(child) {
                    properties.push(property);
                }
            }
            _ => {}
        }
    }

    let Some(procedure) = procedure else {
        warn!(?name, "Skipping offering without procedure");
        return None;
    };

    Some(Offering {
        name: name.unwrap_or_else(|| procedure.clone()),
        description,
        procedure,
        properties,
    })
}

// ---------------------------------------------------------------------------
// GetObservation
// ---------------------------------------------------------------------------

pub fn parse_observations(body: &str) -> TimeSeries {
    match ResponseDocument::parse(body) {
        Some(doc) => observations_from(&doc),
        None => {
            warn!("GetObservation response is not valid XML, returning no measurement");
            TimeSeries::new()
        }
    }
}

pub fn observations_from(doc: &ResponseDocument) -> TimeSeries {
    let mut series = TimeSeries::new();
    for observation in doc.find_all("sos:observationData/om:OM_Observation") {
        match parse_observation(observation, &doc.namespaces) {
            Some((time, property, measurement)) => {
                record(&mut series, time, property, measurement)
            }
            None => warn!("Skipping incomplete OM_Observation"),
        }
    }
    series
}

/// Phenomenon time, observed property and measured value of one
/// `om:OM_Observation`.
pub fn parse_observation(
    observation: &Element,
    namespaces: &NamespaceTable,
) -> Option<(NaiveDateTime, String, Measurement)> {
    let time = text_at(
        observation,
        "om:phenomenonTime/gml:TimeInstant/gml:timePosition",
        namespaces,
    )
    .and_then(|t| parse_timestamp(&t))?;

    let property_elem = find_in(observation, "om:observedProperty", namespaces)?;
    // Some servers quote the property name.
    let property = element_text(property_elem)
        .or_else(|| property_elem.attributes.get("href").cloned())?
        .trim_matches('"')
        .to_string();

    let result = find_in(observation, "om:result", namespaces)?;
    let value = element_text(result)?.parse::<f64>().ok()?;
    let unit = result
        .attributes
        .get("uom")
        .map(|uom| unescape_unit(uom))
        .unwrap_or_default();

    Some((time, property, Measurement { value, unit }))
}

/// Units come back HTML-escaped on top of the XML escaping.
fn unescape_unit(raw: &str) -> String {
    htmlescape::decode_html(raw).unwrap_or_else(|_| raw.to_string())
}

// ---------------------------------------------------------------------------
// GetResult
// ---------------------------------------------------------------------------

pub fn parse_result<S: AsRef<str>>(body: &str, properties: &[S]) -> TimeSeries {
    match ResponseDocument::parse(body) {
        Some(doc) => result_from(&doc, properties),
        None => {
            warn!("GetResult response is not valid XML, returning no measurement");
            TimeSeries::new()
        }
    }
}

pub fn result_from<S: AsRef<str>>(doc: &ResponseDocument, properties: &[S]) -> TimeSeries {
    match doc.find("sos:resultValues").and_then(element_text) {
        Some(values) => decode_result_values(&values, properties),
        None => {
            warn!("GetResult response has no sos:resultValues");
            TimeSeries::new()
        }
    }
}

/// Splits the `timestamp,value` lines of a multi-property GetResult answer.
///
/// The server concatenates one chronological run per requested property,
/// in request order, without any separator. A row older than the previous
/// one therefore starts the next property's run.
///
/// Rows are silently misattributed when either assumption breaks: a run is
/// not non-decreasing, or a run starts at or after the last timestamp of the
/// run before it (the two runs then merge). The multi-property encoding is
/// server specific and the payload carries nothing better to split on.
pub fn decode_result_values<S: AsRef<str>>(values: &str, properties: &[S]) -> TimeSeries {
    let mut series = TimeSeries::new();
    let mut index = 0usize;
    let mut previous: Option<NaiveDateTime> = None;

    for line in values.trim().split('\n') {
        let fields: Vec<&str> = line.split(',').collect();
        let [time, value] = fields.as_slice() else {
            continue;
        };
        let Some(time) = parse_timestamp(time) else {
            warn!(line, "Skipping GetResult row with unreadable timestamp");
            continue;
        };
        let Ok(value) = value.trim().parse::<f64>() else {
            warn!(line, "Skipping GetResult row with non numeric value");
            continue;
        };

        if previous.is_some_and(|prev| time < prev) {
            index += 1;
        }
        previous = Some(time);

        match properties.get(index) {
            Some(property) => record(
                &mut series,
                time,
                property.as_ref().to_string(),
                Measurement::new(value, ""),
            ),
            None => warn!(
                index,
                line, "GetResult row beyond the requested properties, dropped"
            ),
        }
    }
    series
}

// ---------------------------------------------------------------------------
// InsertObservation
// ---------------------------------------------------------------------------

/// The acknowledgement text of an InsertObservation response, or the raw
/// body when it cannot be read as namespaced XML.
pub fn parse_insert_response(body: &str) -> String {
    let Some(doc) = ResponseDocument::parse(body) else {
        debug!("InsertObservation response is not valid XML, returning raw body");
        return body.to_string();
    };
    match doc.find("sos:observation") {
        Some(ack) => ack
            .get_text()
            .map(|t| t.trim().to_string())
            .unwrap_or_default(),
        None => {
            warn!("InsertObservation response has no sos:observation, returning raw body");
            body.to_string()
        }
    }
}
