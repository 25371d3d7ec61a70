use std::io::{ErrorKind, Read, Write};

use common::constants::MAX_MESSAGE_SIZE_BYTES;
use common::error::{ErrCode, KmipCliError, KmipCliResult};
use kmip::ttlv::{parse_ttlv_len, Ttlv, HEADER_LEN};
use kmip::ResponseMessage;
use log::{debug, trace, warn};

use crate::tls::format_io_err;

/// Progress of a single request/response exchange.
///
/// `Idle -> Sent -> Decoded -> Validated`, or `Failed` from any step.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum ExchangeState {
  Idle,
  Sent,
  Decoded,
  Validated,
  Failed,
}

/// Outcome of one exchange. Whatever was read off the wire is kept, even on failure.
#[derive(Debug)]
pub struct Exchange {
  state: ExchangeState,
  raw: Vec<u8>,
  response: Option<Ttlv>,
  error: Option<KmipCliError>,
}

impl Default for Exchange {
  fn default() -> Self {
    Exchange {
      state: ExchangeState::Idle,
      raw: Vec::new(),
      response: None,
      error: None,
    }
  }
}

impl Exchange {
  pub fn state(&self) -> ExchangeState {
    self.state
  }
  /// Response bytes read so far.
  pub fn raw(&self) -> &[u8] {
    &self.raw
  }
  pub fn response(&self) -> Option<&Ttlv> {
    self.response.as_ref()
  }
  pub fn error(&self) -> Option<&KmipCliError> {
    self.error.as_ref()
  }
  pub fn into_error(self) -> Option<KmipCliError> {
    self.error
  }

  fn advance(&mut self, state: ExchangeState) {
    debug!("exchange {:?} -> {:?}", self.state, state);
    self.state = state;
  }

  fn fail(mut self, err: KmipCliError) -> Self {
    warn!("exchange failed in state {:?}: {}", self.state, err);
    self.advance(ExchangeState::Failed);
    self.error = Some(err);
    self
  }

  /// Checks the decoded response envelope and the status of every batch item.
  pub fn validate(mut self) -> Self {
    if self.state != ExchangeState::Decoded {
      return self;
    }
    let Some(tree) = self.response.as_ref() else {
      return self;
    };
    match ResponseMessage::from_ttlv(tree).and_then(|msg| msg.check_status()) {
      Ok(()) => {
        self.advance(ExchangeState::Validated);
        self
      }
      Err(e) => self.fail(e.into()),
    }
  }
}

/// Writes one encoded request and reads back exactly one TTLV message.
pub fn send_request<T: Read + Write>(tls: &mut T, request: &[u8]) -> Exchange {
  let mut exchange = Exchange::default();

  if let Err(e) = tls.write_all(request).and_then(|_| tls.flush()) {
    return exchange.fail(format_io_err(
      e,
      ErrCode::IO,
      "R/W IO error in KMIP session",
    ));
  }
  debug!("sent request of {} bytes", request.len());
  exchange.advance(ExchangeState::Sent);

  if let Err(e) = read_response(tls, &mut exchange.raw) {
    return exchange.fail(e);
  }
  trace!("response: {}", hex::encode(&exchange.raw));

  match Ttlv::unmarshal(&exchange.raw) {
    Ok((tree, _)) => {
      exchange.response = Some(tree);
      exchange.advance(ExchangeState::Decoded);
      exchange
    }
    Err(e) => exchange.fail(e.into()),
  }
}

fn read_response<T: Read>(tls: &mut T, raw: &mut Vec<u8>) -> KmipCliResult<()> {
  read_up_to(tls, raw, HEADER_LEN)?;
  let size = parse_ttlv_len(&raw[..HEADER_LEN])?;
  if size > MAX_MESSAGE_SIZE_BYTES {
    return Err(ErrCode::DECODE.msg(format!(
      "response of {} bytes exceeds the {} byte limit",
      size, MAX_MESSAGE_SIZE_BYTES
    )));
  }
  read_up_to(tls, raw, size)?;
  debug!("received response of {} bytes", size);
  Ok(())
}

// Appends to `raw` until it holds `len` bytes, keeping partial reads on failure.
fn read_up_to<T: Read>(tls: &mut T, raw: &mut Vec<u8>, len: usize) -> KmipCliResult<()> {
  let missing = len.saturating_sub(raw.len());
  let read = tls
    .by_ref()
    .take(missing as u64)
    .read_to_end(raw)
    .map_err(|e| match e.kind() {
      ErrorKind::UnexpectedEof => truncated(len, raw.len()),
      _ => format_io_err(e, ErrCode::IO, "R/W IO error in KMIP session"),
    })?;
  if read < missing {
    return Err(truncated(len, raw.len()));
  }
  Ok(())
}

fn truncated(expected: usize, got: usize) -> KmipCliError {
  ErrCode::DECODE.msg(format!(
    "response truncated: expected {} bytes, got {}",
    expected, got
  ))
}
