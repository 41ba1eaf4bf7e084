//! Interactive shell over an OGC SOS 2.0 endpoint.
//!
//! Lists the sensor nodes of the server and prints their measurements as CSV.

mod commands;
mod render;

use std::env;
use std::io::{self, BufRead, Write};
use std::process;

use anyhow::{Context, Result, anyhow, bail};
use chrono::Local;
use ogcsos::{
    AuthMode, Offering, SosError, SosSession, TimeRange, TimeSeries, resolve_property,
};
use sosconfig::Config;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use commands::{Command, MeasuresArgs, help_text, parse_line};
use render::{render_csv, render_nodes, render_provider, render_sensors, render_server};

#[derive(Debug, Default)]
struct ShellOptions {
    token: Option<String>,
    endpoint: Option<String>,
    auth_mode: Option<AuthMode>,
    config_dir: Option<String>,
}

fn main() -> Result<()> {
    let options = resolve_options(env::args().skip(1))?;
    let config = Config::load_config(options.config_dir.as_deref().unwrap_or(""))?;
    init_tracing(&config.get_log_min_level());

    let mut settings = config.session_settings();
    if let Some(endpoint) = options.endpoint {
        settings.endpoint = endpoint;
    }
    if let Some(token) = options.token {
        settings.token = token;
    }
    if let Some(auth_mode) = options.auth_mode {
        settings.auth_mode = auth_mode;
    }
    if settings.token.is_empty() {
        bail!(
            "No API token: pass --token or set sos.token in {}/config.yaml",
            config.config_dir()
        );
    }

    info!(endpoint = %settings.endpoint, auth_mode = %settings.auth_mode, "Starting SOS shell");
    let mut session = SosSession::from_settings(settings);
    session
        .update_capabilities()
        .with_context(|| format!("Cannot read the capabilities of {}", session.endpoint()))?;

    println!("{}", greeting(&session));
    println!("Type help for the list of commands.");
    run(&session)?;
    println!("Bye.");
    Ok(())
}

fn resolve_options(args: impl Iterator<Item = String>) -> Result<ShellOptions> {
    let mut args = args;
    let mut options = ShellOptions::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--token" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("--token requires a value"))?;
                options.token = Some(value);
            }
            "--endpoint" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("--endpoint requires a value"))?;
                options.endpoint = Some(value);
            }
            "--auth" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("--auth requires a value"))?;
                let mode = value.parse::<AuthMode>().map_err(|err| anyhow!(err))?;
                options.auth_mode = Some(mode);
            }
            "--config" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a value"))?;
                options.config_dir = Some(value);
            }
            "--help" | "-h" => {
                print_usage();
                process::exit(0);
            }
            other => bail!("Unknown argument: {other}. Use --help for usage."),
        }
    }
    Ok(options)
}

fn print_usage() {
    println!(
        "Usage: sosshell [--token <token>] [--endpoint <url>] [--auth header|query] [--config <dir>]"
    );
    println!("Environment variables:");
    println!("  OGCSOS_CONFIG                   configuration directory (default ./.ogcsos or ~/.ogcsos)");
    println!("  OGCSOS_CONFIG__SOS__TOKEN=...   override any configuration key");
    println!("  RUST_LOG                        tracing filter (e.g. ogcsos=debug)");
}

fn init_tracing(min_level: &str) {
    let _ = tracing_log::LogTracer::init();
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(min_level.to_lowercase()))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .try_init();
}

fn greeting(session: &SosSession) -> String {
    let server = session
        .server()
        .and_then(|s| s.name.clone())
        .unwrap_or_else(|| session.endpoint().to_string());
    match session.provider().and_then(|p| p.name.clone()) {
        Some(provider) => format!(
            "Connected to {server}, provided by {provider} ({} sensor nodes).",
            session.offerings().len()
        ),
        None => format!(
            "Connected to {server} ({} sensor nodes).",
            session.offerings().len()
        ),
    }
}

fn run(session: &SosSession) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut line = String::new();
    loop {
        print!("sos> ");
        stdout.flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!();
            return Ok(());
        }

        let command = match parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                eprintln!("{err}");
                continue;
            }
        };
        if command == Command::Quit {
            return Ok(());
        }
        match execute(session, &command) {
            Ok(output) => print!("{output}"),
            Err(err) => eprintln!("Error: {err:#}"),
        }
    }
}

fn execute(session: &SosSession, command: &Command) -> Result<String> {
    debug!(?command, "Executing shell command");
    let output = match command {
        Command::Nodes { long } => render_nodes(session.offerings(), *long),
        Command::Sensors { node } => render_sensors(find_node(session, node)?),
        Command::Measures(args) => measures(session, args)?,
        Command::Last { node, sensors } => {
            let offering = find_node(session, node)?;
            let properties = find_sensors(offering, sensors)?;
            let series = session.observation(offering, &properties, &TimeRange::Latest)?;
            render_csv(&series, &properties)
        }
        Command::Operations => session
            .operations()
            .iter()
            .map(|operation| format!("{operation}\n"))
            .collect(),
        Command::Server => session.server().map(render_server).unwrap_or_default(),
        Command::Provider => session.provider().map(render_provider).unwrap_or_default(),
        Command::Help => format!("{}\n", help_text()),
        Command::Quit => String::new(),
    };
    Ok(output)
}

fn measures(session: &SosSession, args: &MeasuresArgs) -> Result<String> {
    let offering = find_node(session, &args.node)?;
    let properties = find_sensors(offering, &args.sensors)?;
    let range = args.time_range(Local::now().naive_local())?;

    let series: TimeSeries = if args.result {
        session.result(offering, &properties, &range)?
    } else {
        session.observation(offering, &properties, &range)?
    };
    Ok(render_csv(&series, &properties))
}

fn find_node<'a>(session: &'a SosSession, selector: &str) -> Result<&'a Offering, SosError> {
    session
        .find_offering(selector)
        .ok_or_else(|| SosError::not_found(&format!("Sensor node '{selector}'")))
}

fn find_sensors<'a>(offering: &'a Offering, selectors: &[String]) -> Result<Vec<&'a str>, SosError> {
    selectors
        .iter()
        .map(|selector| {
            resolve_property(selector, offering).ok_or_else(|| {
                SosError::not_found(&format!("Sensor '{selector}' of node {}", offering.name))
            })
        })
        .collect()
}
