#![allow(non_camel_case_types)]

use core::fmt::{self, Display};
use kmip::error::{KmipError, TtlvError};
use std::io;
use strum_macros::{EnumIter, IntoStaticStr};

pub type KmipCliResult<T> = Result<T, KmipCliError>;

#[derive(Debug)]
pub struct KmipCliError {
  pub tag: ErrCode,
  pub message: Option<String>,
}

impl Display for KmipCliError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      KmipCliError { tag, message: None } => write!(f, "{:?}", tag),
      KmipCliError {
        tag,
        message: Some(msg),
      } => write!(f, "{:?} ({})", tag, msg),
    }
  }
}

impl std::error::Error for KmipCliError {}

#[derive(Copy, Clone, Debug, Eq, PartialEq, EnumIter, IntoStaticStr)]
#[repr(u32)]
pub enum ErrCode {
  /// Missing, unreadable or invalid credentials, input or arguments.
  CONFIGURATION = 1,
  /// Address resolution, dial or TLS handshake failure.
  CONNECTION = 2,
  /// Malformed TTLV, XML or response envelope.
  DECODE = 3,
  /// A batch item came back with a non-success status.
  PROTOCOL = 4,
  IO = 5,
}

impl ErrCode {
  pub fn msg<M: Display>(self, tag_msg: M) -> KmipCliError {
    KmipCliError {
      tag: self,
      message: Some(tag_msg.to_string()),
    }
  }
  pub const fn no_msg(self) -> KmipCliError {
    KmipCliError {
      tag: self,
      message: None,
    }
  }
}

impl KmipCliError {
  pub fn is(&self, tag: ErrCode) -> bool {
    self.tag == tag
  }
}

impl From<ErrCode> for KmipCliError {
  fn from(tag: ErrCode) -> Self {
    tag.no_msg()
  }
}
impl From<KmipError> for KmipCliError {
  fn from(kmip_err: KmipError) -> Self {
    let tag = if kmip_err.is_decode() {
      ErrCode::DECODE
    } else {
      ErrCode::PROTOCOL
    };
    tag.msg(kmip_err)
  }
}
impl From<TtlvError> for KmipCliError {
  fn from(ttlv_err: TtlvError) -> Self {
    ErrCode::DECODE.msg(ttlv_err)
  }
}
impl From<io::Error> for KmipCliError {
  fn from(io_err: io::Error) -> Self {
    ErrCode::IO.msg(io_err)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn displays_tag_and_message() {
    assert_eq!(ErrCode::IO.no_msg().to_string(), "IO");
    assert_eq!(
      ErrCode::CONFIGURATION.msg("no CA").to_string(),
      "CONFIGURATION (no CA)"
    );
  }

  #[test]
  fn classifies_kmip_errors() {
    let decode: KmipCliError = KmipError::MissingTag(0x42_007F).into();
    assert!(decode.is(ErrCode::DECODE));
    assert_eq!(
      decode.message.as_deref(),
      Some("missing required tag ResultStatus")
    );

    let failed: KmipCliError = KmipError::RequestFailed {
      index: 0,
      status: 1,
      reason: None,
      message: None,
    }
    .into();
    assert!(failed.is(ErrCode::PROTOCOL));

    let ttlv: KmipCliError = TtlvError::ChildOverrun(0x42_0078).into();
    assert!(ttlv.is(ErrCode::DECODE));

    let io: KmipCliError = io::Error::new(io::ErrorKind::BrokenPipe, "gone").into();
    assert!(io.is(ErrCode::IO));
  }
}
