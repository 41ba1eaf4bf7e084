//! Text output of the shell.

use std::fmt::Write;

use ogcsos::{Offering, Provider, Server, TimeSeries};

const CSV_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// `time,<properties...>` rows in time order. A property without a value at
/// some time leaves an empty cell.
pub fn render_csv<S: AsRef<str>>(series: &TimeSeries, properties: &[S]) -> String {
    let mut out = String::from("time");
    for property in properties {
        out.push(',');
        out.push_str(property.as_ref());
    }
    out.push('\n');

    for (time, values) in series {
        let _ = write!(out, "{}", time.format(CSV_TIME_FORMAT));
        for property in properties {
            out.push(',');
            if let Some(measurement) = values.get(property.as_ref()) {
                let _ = write!(out, "{}", measurement.value);
            }
        }
        out.push('\n');
    }
    out
}

pub fn render_nodes(offerings: &[Offering], long: bool) -> String {
    let mut out = String::new();
    for (index, offering) in offerings.iter().enumerate() {
        let _ = write!(out, "{:>3}: {}", index + 1, offering.name);
        if long {
            let _ = write!(
                out,
                "\n     procedure: {}\n     sensors: {}",
                offering.procedure,
                offering.properties.join(", ")
            );
            if let Some(description) = &offering.description {
                let _ = write!(out, "\n     description: {description}");
            }
        }
        out.push('\n');
    }
    out
}

pub fn render_sensors(offering: &Offering) -> String {
    let mut out = String::new();
    for (index, property) in offering.properties.iter().enumerate() {
        let _ = writeln!(out, "{:>3}: {}", index + 1, property);
    }
    out
}

fn field(out: &mut String, label: &str, value: &Option<String>) {
    if let Some(value) = value {
        let _ = writeln!(out, "{label:<20}{value}");
    }
}

pub fn render_server(server: &Server) -> String {
    let mut out = String::new();
    field(&mut out, "name", &server.name);
    field(&mut out, "service type", &server.service_type);
    field(&mut out, "service version", &server.service_version);
    field(&mut out, "fees", &server.fees);
    out
}

pub fn render_provider(provider: &Provider) -> String {
    let mut out = String::new();
    field(&mut out, "name", &provider.name);
    field(&mut out, "contact", &provider.individual_name);
    field(&mut out, "position", &provider.position_name);
    field(&mut out, "address", &provider.delivery_point);
    field(&mut out, "city", &provider.city);
    field(&mut out, "area", &provider.administrative_area);
    field(&mut out, "country", &provider.country);
    out
}
