use std::fmt;
use std::str::FromStr;

use chrono::FixedOffset;
use tracing::{debug, info};
use xmltree::Element;

use crate::errors::{Result, SosError};
use crate::model::{Capabilities, OfferingRef, Offering, Provider, Server, TimeSeries};
use crate::namespaces::default_namespaces;
use crate::request::{RequestBuilder, to_xml_string};
use crate::response;
use crate::selector::resolve_offering;
use crate::time::{TimeRange, default_utc_offset};
use crate::transport::{HttpRequest, Transport, UreqTransport, XML_CONTENT_TYPE};

/// Query parameter carrying the token in [`AuthMode::QueryParameter`].
pub const TOKEN_PARAMETER: &str = "Key";

/// Where the token travels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthMode {
    /// `?Key=<token>` appended to the endpoint.
    #[default]
    QueryParameter,
    /// `Authorization: <token>` header.
    Header,
}

impl FromStr for AuthMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "query" | "parameter" | "key" => Ok(AuthMode::QueryParameter),
            "header" | "authorization" => Ok(AuthMode::Header),
            other => Err(format!("unknown auth mode '{other}' (expected query or header)")),
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::QueryParameter => f.write_str("query"),
            AuthMode::Header => f.write_str("header"),
        }
    }
}

/// Everything needed to open a session, usually read from configuration.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub endpoint: String,
    pub token: String,
    pub auth_mode: AuthMode,
    pub utc_offset: FixedOffset,
    /// Log full request and response bodies at info level.
    pub dump_exchanges: bool,
}

impl SessionSettings {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: token.into(),
            auth_mode: AuthMode::default(),
            utc_offset: default_utc_offset(),
            dump_exchanges: false,
        }
    }
}

/// A client bound to one SOS endpoint.
///
/// Holds the last capabilities fetched with [`SosSession::update_capabilities`].
/// Every operation performs exactly one blocking round trip, without retry.
pub struct SosSession {
    endpoint: String,
    token: String,
    auth_mode: AuthMode,
    dump_exchanges: bool,
    builder: RequestBuilder,
    transport: Box<dyn Transport>,

    server: Option<Server>,
    provider: Option<Provider>,
    operations: Vec<String>,
    offerings: Vec<Offering>,
}

impl fmt::Debug for SosSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SosSession")
            .field("endpoint", &self.endpoint)
            .field("auth_mode", &self.auth_mode)
            .field("offerings", &self.offerings.len())
            .finish_non_exhaustive()
    }
}

impl SosSession {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self::from_settings(SessionSettings::new(endpoint, token))
    }

    pub fn from_settings(settings: SessionSettings) -> Self {
        Self {
            endpoint: settings.endpoint,
            token: settings.token,
            auth_mode: settings.auth_mode,
            dump_exchanges: settings.dump_exchanges,
            builder: RequestBuilder::new(default_namespaces(), settings.utc_offset),
            transport: Box::new(UreqTransport::new()),
            server: None,
            provider: None,
            operations: Vec::new(),
            offerings: Vec::new(),
        }
    }

    pub fn with_auth_mode(mut self, auth_mode: AuthMode) -> Self {
        self.auth_mode = auth_mode;
        self
    }

    pub fn with_utc_offset(mut self, utc_offset: FixedOffset) -> Self {
        self.builder = RequestBuilder::new(default_namespaces(), utc_offset);
        self
    }

    pub fn with_dump_exchanges(mut self, dump: bool) -> Self {
        self.dump_exchanges = dump;
        self
    }

    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Box::new(transport);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn auth_mode(&self) -> AuthMode {
        self.auth_mode
    }

    pub fn server(&self) -> Option<&Server> {
        self.server.as_ref()
    }

    pub fn provider(&self) -> Option<&Provider> {
        self.provider.as_ref()
    }

    pub fn operations(&self) -> &[String] {
        &self.operations
    }

    pub fn offerings(&self) -> &[Offering] {
        &self.offerings
    }

    /// Cached offering by name or 1-based position.
    pub fn find_offering(&self, selector: &str) -> Option<&Offering> {
        resolve_offering(selector, &self.offerings)
    }

    /// GetCapabilities, leaving the session cache untouched.
    pub fn capabilities(&self) -> Result<Capabilities> {
        let body = self.exchange("GetCapabilities", &self.builder.capabilities())?;
        Ok(response::parse_capabilities(&body))
    }

    /// GetCapabilities, replacing the cached server, provider, operations
    /// and offerings.
    pub fn update_capabilities(&mut self) -> Result<()> {
        let capabilities = self.capabilities()?;
        info!(
            endpoint = %self.endpoint,
            operations = capabilities.operations.len(),
            offerings = capabilities.offerings.len(),
            "Capabilities updated"
        );
        self.server = capabilities.server;
        self.provider = capabilities.provider;
        self.operations = capabilities.operations;
        self.offerings = capabilities.offerings;
        Ok(())
    }

    pub fn observation<'a, S: AsRef<str>>(
        &self,
        offering: impl Into<OfferingRef<'a>>,
        properties: &[S],
        range: &TimeRange,
    ) -> Result<TimeSeries> {
        range.validate()?;
        let offering: OfferingRef<'a> = offering.into();
        let procedure = offering.procedure();
        let request = self.builder.observation(procedure, properties, range);
        let body = self.exchange("GetObservation", &request)?;
        Ok(response::parse_observations(&body))
    }

    /// GetResult for one or several properties of the same offering.
    ///
    /// Values carry no unit: the result stream does not transmit it.
    pub fn result<'a, S: AsRef<str>>(
        &self,
        offering: impl Into<OfferingRef<'a>>,
        properties: &[S],
        range: &TimeRange,
    ) -> Result<TimeSeries> {
        range.validate()?;
        let offering: OfferingRef<'a> = offering.into();
        let procedure = offering.procedure();
        let request = self.builder.result(procedure, properties, range);
        let body = self.exchange("GetResult", &request)?;
        Ok(response::parse_result(&body, properties))
    }

    /// InsertObservation; returns the server acknowledgement, or the raw
    /// body when the server answered something that is not namespaced XML.
    pub fn insert_observation<'a>(
        &self,
        offering: impl Into<OfferingRef<'a>>,
        measurements: &TimeSeries,
    ) -> Result<String> {
        let offering: OfferingRef<'a> = offering.into();
        let procedure = offering.procedure();
        let request = self.builder.insert_observation(procedure, measurements);
        let body = self.exchange("InsertObservation", &request)?;
        Ok(response::parse_insert_response(&body))
    }

    fn http_request(&self, body: String) -> HttpRequest {
        let mut request = HttpRequest {
            url: self.endpoint.clone(),
            query: Vec::new(),
            headers: vec![("Content-Type".to_string(), XML_CONTENT_TYPE.to_string())],
            body,
        };
        if !self.token.is_empty() {
            match self.auth_mode {
                AuthMode::QueryParameter => request
                    .query
                    .push((TOKEN_PARAMETER.to_string(), self.token.clone())),
                AuthMode::Header => request
                    .headers
                    .push(("Authorization".to_string(), self.token.clone())),
            }
        }
        request
    }

    /// Sends `document` and returns the body of a successful answer.
    fn exchange(&self, operation: &str, document: &Element) -> Result<String> {
        let body = to_xml_string(document)?;
        if self.dump_exchanges {
            info!(operation, "SOS request:\n{}", body);
        }

        let reply = self.transport.post(&self.http_request(body))?;
        if self.dump_exchanges {
            info!(operation, status = reply.status, "SOS response:\n{}", reply.body);
        }

        if !reply.is_success() {
            debug!(operation, status = reply.status, "SOS request rejected");
            return Err(SosError::Transport {
                status: reply.status,
                body: reply.body,
            });
        }
        Ok(reply.body)
    }
}
