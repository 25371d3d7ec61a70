use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use anyhow::Context;
use clap::builder::PossibleValuesParser;
use clap::{crate_version, value_parser, Arg, ArgAction, Command};
use common::error::{ErrCode, KmipCliResult};
use kmip_client::format::{read_request, render_response};
use kmip_client::{format_io_err, send_request, tls, Exchange, ExchangeState, Format};
use log::{debug, info, warn, LevelFilter};
use strum::VariantNames;

mod settings;

use settings::Settings;

fn app() -> Command {
  Command::new("kmip-cli")
    .version(crate_version!())
    .about("Sends one KMIP request over mutual TLS and prints the response")
    .arg(
      Arg::new("server")
        .long("server")
        .env("KMIP_SERVER")
        .value_name("HOST[:PORT]")
        .help("KMIP server address; port defaults to 5696.")
        .required(true),
    )
    .arg(
      Arg::new("key")
        .long("key")
        .env("KMIP_CLIENT_KEY")
        .value_name("FILE")
        .value_parser(value_parser!(PathBuf))
        .help("client private key, PEM.")
        .required(true),
    )
    .arg(
      Arg::new("cert")
        .long("cert")
        .env("KMIP_CLIENT_CERT")
        .value_name("FILE")
        .value_parser(value_parser!(PathBuf))
        .help("client certificate chain, PEM.")
        .required(true),
    )
    .arg(
      Arg::new("cacert")
        .long("cacert")
        .env("KMIP_CA_CERT")
        .value_name("FILE")
        .value_parser(value_parser!(PathBuf))
        .help("CA certificates trusted to sign the server certificate, PEM."),
    )
    .arg(
      Arg::new("insecure")
        .long("insecure")
        .action(ArgAction::SetTrue)
        .help("accept any server certificate when no CA is given."),
    )
    .arg(
      Arg::new("server-name")
        .long("server-name")
        .value_name("NAME")
        .help("name to verify the server certificate against; defaults to the server host."),
    )
    .arg(
      Arg::new("in")
        .long("in")
        .value_name("FILE")
        .value_parser(value_parser!(PathBuf))
        .help("request file; read from stdin when absent."),
    )
    .arg(
      Arg::new("input-format")
        .long("input-format")
        .value_name("FORMAT")
        .value_parser(PossibleValuesParser::new(Format::VARIANTS.iter().copied()))
        .default_value("hex")
        .help("request encoding."),
    )
    .arg(
      Arg::new("output-format")
        .long("output-format")
        .value_name("FORMAT")
        .value_parser(PossibleValuesParser::new(Format::VARIANTS.iter().copied()))
        .default_value("hex")
        .help("response encoding."),
    )
    .arg(
      Arg::new("timeout")
        .long("timeout")
        .value_name("SECS")
        .value_parser(value_parser!(u64).range(1..))
        .help("TCP connect timeout [default: 10]."),
    )
    .arg(
      Arg::new("io-timeout")
        .long("io-timeout")
        .value_name("SECS")
        .value_parser(value_parser!(u64).range(1..))
        .help("read/write timeout on the established connection."),
    )
    .arg(
      Arg::new("verbose")
        .short('v')
        .long("verbose")
        .action(ArgAction::Count)
        .help("more logging on stderr; repeat for debug and trace."),
    )
}

fn init_logger(verbosity: u8) {
  let level = match verbosity {
    0 => LevelFilter::Warn,
    1 => LevelFilter::Info,
    2 => LevelFilter::Debug,
    _ => LevelFilter::Trace,
  };
  env_logger::Builder::new()
    .filter_level(level)
    .parse_default_env()
    .target(env_logger::Target::Stderr)
    .init();
}

fn main() {
  let matches = app().get_matches();
  init_logger(matches.get_count("verbose"));

  if let Err(e) = Settings::from_matches(&matches)
    .map_err(anyhow::Error::from)
    .and_then(|settings| run(&settings))
  {
    eprintln!("Error: {:#}", e);
    std::process::exit(1);
  }
}

fn load_request(settings: &Settings) -> KmipCliResult<Vec<u8>> {
  let format = settings.input_format;
  match &settings.input {
    Some(path) => {
      let mut file = File::open(path).map_err(|e| {
        format_io_err(
          e,
          ErrCode::CONFIGURATION,
          &format!("unable to open request file {}", path.display()),
        )
      })?;
      read_request(&mut file, format)
    }
    None => {
      let stdin = io::stdin();
      if stdin.is_terminal() {
        eprintln!("Enter the {} encoded request, end with Ctrl-D:", format.name());
      }
      read_request(&mut stdin.lock(), format)
    }
  }
}

fn run(settings: &Settings) -> anyhow::Result<()> {
  let request = load_request(settings).context("reading request")?;

  let trust = tls::server_trust(settings.ca_cert.as_deref(), settings.insecure)?;
  let auth = tls::client_cert(&settings.key, &settings.cert).context("loading client credentials")?;
  let config = tls::client_config(trust, auth)?;

  let mut conn = tls::connect(
    config,
    &settings.server,
    settings.server_name.as_deref(),
    settings.timeout,
    settings.io_timeout,
  )
  .with_context(|| format!("connecting to {}:{}", settings.server.host, settings.server.port))?;
  let exchange = send_request(&mut conn, &request).validate();
  drop(conn);

  let (stdout, result) = conclude(exchange, settings.output_format);
  if let Some(out) = stdout {
    println!("{}", out);
  }
  result.map_err(anyhow::Error::from)
}

/// Decides what a finished exchange prints and how the run ends. A validated response is
/// printed; a server-reported failure is printed and still fails the run.
fn conclude(exchange: Exchange, format: Format) -> (Option<String>, KmipCliResult<()>) {
  if exchange.state() == ExchangeState::Validated {
    info!("request succeeded");
    return match render_response(exchange.raw(), exchange.response(), format) {
      Ok(out) => (Some(out), Ok(())),
      Err(e) => (None, Err(e)),
    };
  }

  let stdout = if exchange.error().map_or(false, |e| e.is(ErrCode::PROTOCOL)) {
    render_response(exchange.raw(), exchange.response(), format)
      .map_err(|e| warn!("unable to render the failed response: {}", e))
      .ok()
  } else {
    if !exchange.raw().is_empty() {
      if let Ok(partial) = render_response(exchange.raw(), None, Format::Hex) {
        debug!("partial response: {}", partial);
      }
    }
    None
  };
  let err = exchange
    .into_error()
    .unwrap_or_else(|| ErrCode::PROTOCOL.msg("exchange did not complete"));
  (stdout, Err(err))
}
