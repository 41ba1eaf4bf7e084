use std::collections::BTreeMap;

use chrono::NaiveDateTime;

/// Service identification section of a capabilities document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Server {
    pub name: Option<String>,
    pub service_type: Option<String>,
    pub service_version: Option<String>,
    pub fees: Option<String>,
}

/// Service provider section of a capabilities document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provider {
    pub name: Option<String>,
    /// Administrator of the service (`ows:IndividualName`).
    pub individual_name: Option<String>,
    pub position_name: Option<String>,
    pub delivery_point: Option<String>,
    pub city: Option<String>,
    pub administrative_area: Option<String>,
    pub country: Option<String>,
}

/// A sensor node advertised by the server.
///
/// `properties` keeps document order and duplicates: the position of a
/// property is meaningful for GetResult decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Offering {
    pub name: String,
    pub description: Option<String>,
    pub procedure: String,
    pub properties: Vec<String>,
}

impl Offering {
    pub fn has_property(&self, property: &str) -> bool {
        self.properties.iter().any(|p| p == property)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub value: f64,
    pub unit: String,
}

impl Measurement {
    pub fn new(value: f64, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: unit.into(),
        }
    }
}

/// Measurements keyed by local wall time, then by observed property.
pub type TimeSeries = BTreeMap<NaiveDateTime, BTreeMap<String, Measurement>>;

/// Inserts a measurement, merging with any entry already stored at `time`.
pub fn record(series: &mut TimeSeries, time: NaiveDateTime, property: String, value: Measurement) {
    series.entry(time).or_default().insert(property, value);
}

/// Parsed GetCapabilities answer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Capabilities {
    pub server: Option<Server>,
    pub provider: Option<Provider>,
    pub operations: Vec<String>,
    pub offerings: Vec<Offering>,
}

/// Offering argument of the session operations.
#[derive(Debug, Clone, Copy)]
pub enum OfferingRef<'a> {
    Resolved(&'a Offering),
    Procedure(&'a str),
}

impl<'a> OfferingRef<'a> {
    pub fn procedure(&self) -> &'a str {
        match self {
            OfferingRef::Resolved(offering) => &offering.procedure,
            OfferingRef::Procedure(procedure) => procedure,
        }
    }
}

impl<'a> From<&'a Offering> for OfferingRef<'a> {
    fn from(offering: &'a Offering) -> Self {
        OfferingRef::Resolved(offering)
    }
}

impl<'a> From<&'a str> for OfferingRef<'a> {
    fn from(procedure: &'a str) -> Self {
        OfferingRef::Procedure(procedure)
    }
}

impl<'a> From<&'a String> for OfferingRef<'a> {
    fn from(procedure: &'a String) -> Self {
        OfferingRef::Procedure(procedure.as_str())
    }
}
