use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use chrono::{NaiveDate, NaiveDateTime};
use ogcsos::{
    AuthMode, HttpReply, HttpRequest, Measurement, SosError, SosSession, TimeRange, TimeSeries,
    Transport, record,
};
use xmltree::Element;

const CAPABILITIES: &str = include_str!("data/capabilities.xml");
const OBSERVATION: &str = include_str!("data/observation.xml");

/// Replays canned replies and keeps every request it was given.
#[derive(Clone, Default)]
struct ScriptedTransport {
    replies: Rc<RefCell<VecDeque<HttpReply>>>,
    requests: Rc<RefCell<Vec<HttpRequest>>>,
}

impl ScriptedTransport {
    fn reply(self, status: u16, body: &str) -> Self {
        self.replies.borrow_mut().push_back(HttpReply {
            status,
            body: body.to_string(),
        });
        self
    }

    fn last_request(&self) -> HttpRequest {
        self.requests.borrow().last().cloned().expect("no request sent")
    }

    fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl Transport for ScriptedTransport {
    fn post(&self, request: &HttpRequest) -> ogcsos::Result<HttpReply> {
        self.requests.borrow_mut().push(request.clone());
        Ok(self
            .replies
            .borrow_mut()
            .pop_front()
            .expect("unexpected request"))
    }
}

fn at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2020, 1, 1)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

fn session(transport: &ScriptedTransport) -> SosSession {
    SosSession::new("https://sos.example.com/api", "SECRET").with_transport(transport.clone())
}

fn request_root(request: &HttpRequest) -> Element {
    Element::parse(request.body.as_bytes()).unwrap()
}

#[test]
fn update_capabilities_fills_session_cache() {
    let transport = ScriptedTransport::default().reply(200, CAPABILITIES);
    let mut session = session(&transport);
    assert!(session.offerings().is_empty());

    session.update_capabilities().unwrap();

    assert_eq!(session.server().unwrap().name.as_deref(), Some("Field SOS"));
    assert_eq!(session.provider().unwrap().name.as_deref(), Some("Example Farms"));
    assert_eq!(session.operations().len(), 4);
    assert_eq!(session.offerings().len(), 3);
    assert_eq!(session.find_offering("2").unwrap().name, "Greenhouse");
    assert_eq!(
        session.find_offering("Field").unwrap().procedure,
        "TEST:Field:Field"
    );
    assert!(session.find_offering("7").is_none());
    assert!(session.find_offering("Nowhere").is_none());

    let request = transport.last_request();
    assert_eq!(request.url, "https://sos.example.com/api");
    assert_eq!(
        request.query,
        vec![("Key".to_string(), "SECRET".to_string())]
    );
    assert!(request.headers.contains(&(
        "Content-Type".to_string(),
        r#"application/xml; charset="utf-8""#.to_string()
    )));
    assert_eq!(request_root(&request).name, "GetCapabilities");
}

#[test]
fn capabilities_does_not_touch_cache() {
    let transport = ScriptedTransport::default().reply(200, CAPABILITIES);
    let session = session(&transport);
    let capabilities = session.capabilities().unwrap();
    assert_eq!(capabilities.offerings.len(), 3);
    assert!(session.offerings().is_empty());
}

#[test]
fn header_auth_sends_authorization() {
    let transport = ScriptedTransport::default().reply(200, CAPABILITIES);
    let session = session(&transport).with_auth_mode(AuthMode::Header);
    session.capabilities().unwrap();

    let request = transport.last_request();
    assert!(request.query.is_empty());
    assert!(
        request
            .headers
            .contains(&("Authorization".to_string(), "SECRET".to_string()))
    );
}

#[test]
fn observation_by_offering_or_procedure() {
    let transport = ScriptedTransport::default()
        .reply(200, CAPABILITIES)
        .reply(200, OBSERVATION)
        .reply(200, OBSERVATION);
    let mut session = session(&transport);
    session.update_capabilities().unwrap();

    let range = TimeRange::between(at(0, 0), at(0, 5)).unwrap();
    let node = session.find_offering("Greenhouse").unwrap();
    let series = session
        .observation(node, &["air_temperature", "relative_humidity"], &range)
        .unwrap();
    assert_eq!(series.len(), 2);
    assert_eq!(series[&at(0, 0)]["air_temperature"].unit, "°C");

    let root = request_root(&transport.last_request());
    assert_eq!(root.name, "GetObservation");
    assert_eq!(
        root.get_child("offering").unwrap().get_text().unwrap(),
        "TEST:Field:Greenhouse"
    );

    session
        .observation("RAW:Procedure", &["air_temperature"], &range)
        .unwrap();
    let root = request_root(&transport.last_request());
    assert_eq!(
        root.get_child("offering").unwrap().get_text().unwrap(),
        "RAW:Procedure"
    );
}

#[test]
fn result_reconstructs_each_property_run() {
    let body = r#"<sos:GetResultResponse xmlns:sos="http://www.opengis.net/sos/2.0">
<sos:resultValues>2020-01-01T00:00:00+0900,1.0
2020-01-01T00:01:00+0900,2.0
2020-01-01T00:00:00+0900,3.0
2020-01-01T00:01:00+0900,4.0</sos:resultValues>
</sos:GetResultResponse>"#;
    let transport = ScriptedTransport::default().reply(200, body);
    let session = session(&transport);

    let series = session
        .result("TEST:Field:Greenhouse", &["p1", "p2"], &TimeRange::Latest)
        .unwrap();
    assert_eq!(series[&at(0, 0)]["p1"].value, 1.0);
    assert_eq!(series[&at(0, 1)]["p1"].value, 2.0);
    assert_eq!(series[&at(0, 0)]["p2"].value, 3.0);
    assert_eq!(series[&at(0, 1)]["p2"].value, 4.0);

    let root = request_root(&transport.last_request());
    assert_eq!(root.name, "GetResult");
    let position = root
        .get_child("temporalFilter")
        .and_then(|f| f.get_child("TEquals"))
        .and_then(|e| e.get_child("TimeInstant"))
        .and_then(|i| i.get_child("timePosition"))
        .unwrap();
    assert_eq!(position.get_text().unwrap(), "last");
}

#[test]
fn insert_round_trip_returns_acknowledgement() {
    let ack = r#"<sos:InsertObservationResponse xmlns:sos="http://www.opengis.net/sos/2.0">
  <sos:observation>Inserted</sos:observation>
</sos:InsertObservationResponse>"#;
    let transport = ScriptedTransport::default().reply(200, ack).reply(200, "Inserted");
    let session = session(&transport);

    let mut measurements = TimeSeries::new();
    record(
        &mut measurements,
        at(0, 0),
        "air_temperature".to_string(),
        Measurement::new(20.5, "Cel"),
    );

    let acknowledgement = session
        .insert_observation("TEST:Field:Greenhouse", &measurements)
        .unwrap();
    assert_eq!(acknowledgement, "Inserted");

    let root = request_root(&transport.last_request());
    assert_eq!(root.name, "InsertObservation");
    let observations = root
        .children
        .iter()
        .filter(|node| node.as_element().is_some_and(|e| e.name == "observation"))
        .count();
    assert_eq!(observations, 1);

    // A body that is not XML is handed back verbatim.
    let acknowledgement = session
        .insert_observation("TEST:Field:Greenhouse", &measurements)
        .unwrap();
    assert_eq!(acknowledgement, "Inserted");
}

#[test]
fn http_errors_carry_status_and_body() {
    let transport = ScriptedTransport::default().reply(401, "invalid key");
    let session = session(&transport);

    match session.capabilities() {
        Err(SosError::Transport { status, body }) => {
            assert_eq!(status, 401);
            assert_eq!(body, "invalid key");
        }
        other => panic!("expected a transport error, got {other:?}"),
    }
    assert_eq!(transport.request_count(), 1);
}

#[test]
fn invalid_range_is_rejected_before_any_request() {
    let transport = ScriptedTransport::default();
    let session = session(&transport);

    let outcome = TimeRange::between(at(0, 5), at(0, 0))
        .and_then(|range| session.observation("P", &["a"], &range));
    assert!(matches!(outcome, Err(SosError::InvalidTimeRange(_))));
    assert_eq!(transport.request_count(), 0);
}

#[test]
fn inverted_between_is_rejected_by_the_session() {
    let transport = ScriptedTransport::default();
    let session = session(&transport);
    let inverted = TimeRange::Between(at(0, 5), at(0, 0));

    assert!(matches!(
        session.observation("P", &["a"], &inverted),
        Err(SosError::InvalidTimeRange(_))
    ));
    assert!(matches!(
        session.result("P", &["a"], &inverted),
        Err(SosError::InvalidTimeRange(_))
    ));
    assert_eq!(transport.request_count(), 0);
}
