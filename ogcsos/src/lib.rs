//! # ogcsos - OGC Sensor Observation Service 2.0 client
//!
//! Builds the namespace-qualified request documents of GetCapabilities,
//! GetObservation, GetResult and InsertObservation, posts them with token
//! authentication and turns the answers into typed values.
//!
//! ## Example
//!
//! ```no_run
//! use ogcsos::{SosSession, TimeRange};
//!
//! let mut session = SosSession::new("https://sos.example.com/api", "TOKEN");
//! session.update_capabilities()?;
//!
//! let node = session.find_offering("1").expect("no sensor node").clone();
//! let end = chrono::Local::now().naive_local();
//! let range = TimeRange::last_minutes(end, 10)?;
//! let series = session.observation(&node, &node.properties, &range)?;
//! for (time, values) in &series {
//!     println!("{time}: {values:?}");
//! }
//! # Ok::<(), ogcsos::SosError>(())
//! ```

pub mod errors;
pub mod model;
pub mod namespaces;
pub mod qpath;
pub mod request;
pub mod response;
pub mod selector;
pub mod session;
pub mod time;
pub mod transport;

pub use errors::{Result, SosError};
pub use model::{
    Capabilities, Measurement, Offering, OfferingRef, Provider, Server, TimeSeries, record,
};
pub use namespaces::{NamespaceTable, default_namespaces, harvest_namespaces};
pub use qpath::{QualifiedPath, qualify};
pub use request::RequestBuilder;
pub use selector::{resolve_offering, resolve_property};
pub use session::{AuthMode, SessionSettings, SosSession};
pub use time::{TimeRange, parse_time_literal};
pub use transport::{HttpReply, HttpRequest, Transport, UreqTransport};
