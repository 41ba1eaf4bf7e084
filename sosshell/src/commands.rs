//! Shell command line parsing.

use anyhow::{Result, anyhow, bail};
use chrono::NaiveDateTime;
use ogcsos::{TimeRange, parse_time_literal};

/// Span requested when `measures` is given no start.
pub const DEFAULT_SPAN_MINUTES: i64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Nodes { long: bool },
    Sensors { node: String },
    Measures(MeasuresArgs),
    Last { node: String, sensors: Vec<String> },
    Operations,
    Server,
    Provider,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasuresArgs {
    pub node: String,
    pub start: Option<String>,
    pub end: Option<String>,
    /// Fetch through GetResult instead of GetObservation.
    pub result: bool,
    pub sensors: Vec<String>,
}

impl MeasuresArgs {
    /// Window of the request; a missing end is `now`, a missing start is
    /// [`DEFAULT_SPAN_MINUTES`] before the end.
    pub fn time_range(&self, now: NaiveDateTime) -> ogcsos::Result<TimeRange> {
        let end = match &self.end {
            Some(text) => parse_time_literal(text, now)?,
            None => now,
        };
        match &self.start {
            Some(text) => TimeRange::between(parse_time_literal(text, now)?, end),
            None => TimeRange::last_minutes(end, DEFAULT_SPAN_MINUTES),
        }
    }
}

/// Parses one input line; `Ok(None)` for a blank line.
pub fn parse_line(line: &str) -> Result<Option<Command>> {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match name {
        "nodes" => match args.as_slice() {
            [] => Command::Nodes { long: false },
            ["-l"] => Command::Nodes { long: true },
            _ => bail!("usage: nodes [-l]"),
        },
        "sensors" => match args.as_slice() {
            [node] => Command::Sensors {
                node: node.to_string(),
            },
            _ => bail!("usage: sensors <node>"),
        },
        "measures" | "measurements" => Command::Measures(parse_measures(&args)?),
        "last" => {
            let (node, sensors) = parse_node_and_sensors(&args, "last -n <node> <sensor>...")?;
            Command::Last { node, sensors }
        }
        "operations" => Command::Operations,
        "server" => Command::Server,
        "provider" => Command::Provider,
        "help" | "h" => Command::Help,
        "quit" | "q" | "exit" => Command::Quit,
        other => bail!("Unknown command: {other}. Type help for the list of commands."),
    };
    Ok(Some(command))
}

const MEASURES_USAGE: &str = "measures -n <node> [-s start] [-e end] [--result] <sensor>...";

fn parse_measures(args: &[&str]) -> Result<MeasuresArgs> {
    let mut node = None;
    let mut start = None;
    let mut end = None;
    let mut result = false;
    let mut sensors = Vec::new();

    let mut args = args.iter();
    while let Some(arg) = args.next() {
        match *arg {
            "-n" | "--node" => node = Some(option_value(arg, args.next())?),
            "-s" | "--start" => start = Some(option_value(arg, args.next())?),
            "-e" | "--end" => end = Some(option_value(arg, args.next())?),
            "--result" => result = true,
            other if other.starts_with('-') => bail!("Unknown option {other}, usage: {MEASURES_USAGE}"),
            sensor => sensors.push(sensor.to_string()),
        }
    }

    let node = node.ok_or_else(|| anyhow!("Missing node, usage: {MEASURES_USAGE}"))?;
    if sensors.is_empty() {
        bail!("Missing sensor, usage: {MEASURES_USAGE}");
    }
    Ok(MeasuresArgs {
        node,
        start,
        end,
        result,
        sensors,
    })
}

fn parse_node_and_sensors(args: &[&str], usage: &str) -> Result<(String, Vec<String>)> {
    let mut node = None;
    let mut sensors = Vec::new();
    let mut args = args.iter();
    while let Some(arg) = args.next() {
        match *arg {
            "-n" | "--node" => node = Some(option_value(arg, args.next())?),
            other if other.starts_with('-') => bail!("Unknown option {other}, usage: {usage}"),
            sensor => sensors.push(sensor.to_string()),
        }
    }
    let node = node.ok_or_else(|| anyhow!("Missing node, usage: {usage}"))?;
    if sensors.is_empty() {
        bail!("Missing sensor, usage: {usage}");
    }
    Ok((node, sensors))
}

fn option_value(option: &str, value: Option<&&str>) -> Result<String> {
    value
        .map(|v| v.to_string())
        .ok_or_else(|| anyhow!("{option} requires a value"))
}

pub fn help_text() -> &'static str {
    "Commands:
  nodes [-l]                       list sensor nodes (-l: with procedures and sensors)
  sensors <node>                   list the sensors of a node
  measures, measurements -n <node> [-s start] [-e end] [--result] <sensor>...
                                   measurements as CSV (default: last 10 minutes)
  last -n <node> <sensor>...       latest measurement of each sensor
  operations                       operations offered by the server
  server                           server description
  provider                         service provider
  help, h                          this help
  quit, q, exit                    leave the shell

Nodes and sensors are given by name or by number (as listed, starting at 1).
Times: 20161026123456, 2016-10-26T12:34:56, 2016-10-26, 12:34 (today)..."
}
