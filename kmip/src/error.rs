use crate::constants::{enumeration_name, tag_display, Tag};
use thiserror::Error;

/// TTLV-related errors. Every decode failure of the binary form lands here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TtlvError {
  #[error("buffer truncated: need {needed} bytes, {available} available")]
  Truncated { needed: usize, available: usize },
  #[error("invalid tag 0x{0:06X}: tags must start with 0x42 or 0x54")]
  InvalidTag(u32),
  #[error("unknown item type 0x{type_:02X} for tag {}", tag_display(*.tag))]
  UnknownType { tag: u32, type_: u8 },
  #[error("invalid length {len} for {type_name} item {}", tag_display(*.tag))]
  InvalidLength {
    tag: u32,
    type_name: &'static str,
    len: u32,
  },
  #[error("child item overruns the declared length of structure {}", tag_display(*.0))]
  ChildOverrun(u32),
  #[error("invalid boolean value {value} for tag {}", tag_display(*.tag))]
  InvalidBoolean { tag: u32, value: u64 },
  #[error("text string for tag {} is not valid UTF-8", tag_display(*.0))]
  CorruptUtf8(u32),
  #[error("structure nesting exceeds {0} levels")]
  TooDeep(usize),
  #[error("item value is too large to encode ({0} bytes)")]
  TooLarge(usize),
  #[error("output buffer too small")]
  BufferTooSmall,
  #[error("type mismatch for tag {}", tag_display(*.0))]
  TypeMismatch(u32),
  #[error("tag {} not found", tag_display(*.0))]
  PathNotFound(u32),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KmipError {
  #[error("malformed TTLV: {0}")]
  Ttlv(#[from] TtlvError),
  #[error("missing required tag {}", tag_display(*.0))]
  MissingTag(u32),
  #[error("unexpected tag {}, expected {}", tag_display(*.found), tag_display(*.expected))]
  UnexpectedTag { expected: u32, found: u32 },
  #[error("malformed XML: {0}")]
  Xml(String),
  #[error("KMIP operation in batch item {index} failed: {} - {} - {}",
    status_display(*.status),
    reason_display(*.reason),
    .message.as_deref().unwrap_or("No Message"))]
  RequestFailed {
    index: usize,
    status: u32,
    reason: Option<u32>,
    message: Option<String>,
  },
}

impl KmipError {
  /// True for every failure of the response shape, as opposed to a server reported failure.
  pub fn is_decode(&self) -> bool {
    !matches!(self, KmipError::RequestFailed { .. })
  }

  pub(crate) fn xml<M: std::fmt::Display>(msg: M) -> Self {
    KmipError::Xml(msg.to_string())
  }
}

fn status_display(status: u32) -> String {
  enumeration_name(Tag::ResultStatus.into(), status)
    .map(str::to_string)
    .unwrap_or_else(|| format!("0x{:08X}", status))
}

fn reason_display(reason: Option<u32>) -> String {
  match reason {
    None => "No Reason".to_string(),
    Some(r) => enumeration_name(Tag::ResultReason.into(), r)
      .map(str::to_string)
      .unwrap_or_else(|| format!("0x{:08X}", r)),
  }
}
