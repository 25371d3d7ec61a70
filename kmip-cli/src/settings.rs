use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::ArgMatches;
use common::constants::DEFAULT_CONNECT_TIMEOUT;
use common::error::{ErrCode, KmipCliResult};
use kmip_client::tls::ServerAddr;
use kmip_client::Format;

/// Everything a run needs, resolved from flags and environment before any network activity.
#[derive(Debug)]
pub struct Settings {
  pub server: ServerAddr,
  pub server_name: Option<String>,
  pub key: PathBuf,
  pub cert: PathBuf,
  pub ca_cert: Option<PathBuf>,
  pub insecure: bool,
  pub input: Option<PathBuf>,
  pub input_format: Format,
  pub output_format: Format,
  pub timeout: Duration,
  pub io_timeout: Option<Duration>,
}

impl Settings {
  pub fn from_matches(matches: &ArgMatches) -> KmipCliResult<Settings> {
    let server = matches
      .get_one::<String>("server")
      .ok_or_else(|| ErrCode::CONFIGURATION.msg("missing server address"))?;

    Ok(Settings {
      server: ServerAddr::parse(server)?,
      server_name: matches.get_one::<String>("server-name").cloned(),
      key: required_path(matches, "key")?,
      cert: required_path(matches, "cert")?,
      ca_cert: matches.get_one::<PathBuf>("cacert").cloned(),
      insecure: matches.get_flag("insecure"),
      input: matches.get_one::<PathBuf>("in").cloned(),
      input_format: format(matches, "input-format")?,
      output_format: format(matches, "output-format")?,
      timeout: matches
        .get_one::<u64>("timeout")
        .map(|secs| Duration::from_secs(*secs))
        .unwrap_or(DEFAULT_CONNECT_TIMEOUT),
      io_timeout: matches
        .get_one::<u64>("io-timeout")
        .map(|secs| Duration::from_secs(*secs)),
    })
  }
}

fn required_path(matches: &ArgMatches, id: &str) -> KmipCliResult<PathBuf> {
  matches
    .get_one::<PathBuf>(id)
    .cloned()
    .ok_or_else(|| ErrCode::CONFIGURATION.msg(format!("missing --{}", id)))
}

fn format(matches: &ArgMatches, id: &str) -> KmipCliResult<Format> {
  match matches.get_one::<String>(id) {
    Some(name) => Format::from_str(name)
      .map_err(|_| ErrCode::CONFIGURATION.msg(format!("unknown format {} for --{}", name, id))),
    None => Ok(Format::Hex),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::app;

  fn settings(args: &[&str]) -> KmipCliResult<Settings> {
    let mut argv = vec!["kmip-cli", "--key", "client.key", "--cert", "client.crt"];
    argv.extend_from_slice(args);
    let matches = app().try_get_matches_from(argv).unwrap();
    Settings::from_matches(&matches)
  }

  #[test]
  fn applies_defaults() {
    let s = settings(&["--server", "kms.local"]).unwrap();
    assert_eq!(s.server.host, "kms.local");
    assert_eq!(s.server.port, 5696);
    assert_eq!(s.key, PathBuf::from("client.key"));
    assert_eq!(s.cert, PathBuf::from("client.crt"));
    assert_eq!(s.input_format, Format::Hex);
    assert_eq!(s.output_format, Format::Hex);
    assert_eq!(s.timeout, Duration::from_secs(10));
    assert_eq!(s.io_timeout, None);
    assert_eq!(s.ca_cert, None);
    assert!(!s.insecure);
  }

  #[test]
  fn reads_every_flag() {
    let s = settings(&[
      "--server",
      "kmip://[::1]:7000",
      "--server-name",
      "kms.example.com",
      "--cacert",
      "ca.pem",
      "--insecure",
      "--in",
      "request.xml",
      "--input-format",
      "xml",
      "--output-format",
      "xml",
      "--timeout",
      "3",
      "--io-timeout",
      "30",
      "-vv",
    ])
    .unwrap();
    assert_eq!(s.server.host, "::1");
    assert_eq!(s.server.port, 7000);
    assert_eq!(s.server_name.as_deref(), Some("kms.example.com"));
    assert_eq!(s.ca_cert, Some(PathBuf::from("ca.pem")));
    assert!(s.insecure);
    assert_eq!(s.input, Some(PathBuf::from("request.xml")));
    assert_eq!(s.input_format, Format::Xml);
    assert_eq!(s.output_format, Format::Xml);
    assert_eq!(s.timeout, Duration::from_secs(3));
    assert_eq!(s.io_timeout, Some(Duration::from_secs(30)));
  }

  #[test]
  fn rejects_bad_arguments() {
    for args in [
      &["--server", "kms.local", "--input-format", "json"][..],
      &["--server", "kms.local", "--timeout", "0"][..],
      &["--server", "kms.local", "--timeout", "soon"][..],
    ] {
      let mut argv = vec!["kmip-cli", "--key", "k", "--cert", "c"];
      argv.extend_from_slice(args);
      assert!(app().try_get_matches_from(argv).is_err(), "{:?}", args);
    }
  }

  #[test]
  fn rejects_bad_server_address() {
    let err = settings(&["--server", "https://kms.local"]).unwrap_err();
    assert!(err.is(ErrCode::CONFIGURATION));
  }

  #[test]
  fn app_definition_is_consistent() {
    app().debug_assert();
  }
}
