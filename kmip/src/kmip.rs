use crate::constants::enumerations::{CredentialType, Operation, ResultStatus};
use crate::constants::Tag;
use crate::error::KmipError;
use crate::ttlv::{Ttlv, Value::*};
use log::{debug, warn};

pub const KMIP_PROTOCOL_VERSION: (i32, i32) = (1, 4);

#[derive(Clone, Debug)]
pub struct Auth {
  pub username: String,
  pub password: String,
}

/// Builder for an outgoing `RequestMessage`.
#[derive(Clone, Debug)]
pub struct RequestMessage {
  pub protocol_version: (i32, i32),
  pub maximum_response_size: Option<i32>,
  pub authentication: Option<Auth>,
  pub batch_items: Vec<(Operation, Ttlv)>,
}

impl Default for RequestMessage {
  fn default() -> Self {
    RequestMessage::new(KMIP_PROTOCOL_VERSION)
  }
}

impl RequestMessage {
  pub fn new(protocol_version: (i32, i32)) -> Self {
    RequestMessage {
      protocol_version,
      maximum_response_size: None,
      authentication: None,
      batch_items: Vec::new(),
    }
  }

  pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
    self.authentication = Some(Auth {
      username: username.to_string(),
      password: password.to_string(),
    });
    self
  }

  pub fn with_maximum_response_size(mut self, size: i32) -> Self {
    self.maximum_response_size = Some(size);
    self
  }

  /// Appends a batch item; `payload` is expected to be tagged `RequestPayload`.
  pub fn push(mut self, operation: Operation, payload: Ttlv) -> Self {
    self.batch_items.push((operation, payload));
    self
  }

  pub fn to_ttlv(&self) -> Ttlv {
    let mut request_header = vec![protocol_version(self.protocol_version)];
    if let Some(size) = self.maximum_response_size {
      request_header.push(Ttlv::new(Tag::MaximumResponseSize, Integer(size)));
    }
    if let Some(Auth { username, password }) = &self.authentication {
      request_header.push(Ttlv::new(
        Tag::Authentication,
        Structure(vec![Ttlv::new(
          Tag::Credential,
          Structure(vec![
            Ttlv::new(
              Tag::CredentialType,
              Enumeration(CredentialType::UsernameAndPassword as u32),
            ),
            Ttlv::new(
              Tag::CredentialValue,
              Structure(vec![
                Ttlv::new(Tag::Username, TextString(username.clone())),
                Ttlv::new(Tag::Password, TextString(password.clone())),
              ]),
            ),
          ]),
        )]),
      ));
    }
    request_header.push(Ttlv::new(
      Tag::BatchCount,
      Integer(self.batch_items.len() as i32),
    ));

    let mut message = vec![Ttlv::new(Tag::RequestHeader, Structure(request_header))];
    // batch item ids are mandatory once a message carries more than one item
    let numbered = self.batch_items.len() > 1;
    for (index, (operation, payload)) in self.batch_items.iter().enumerate() {
      let mut item = vec![Ttlv::new(Tag::Operation, Enumeration(*operation as u32))];
      if numbered {
        item.push(Ttlv::new(
          Tag::UniqueBatchItemID,
          ByteString((index as u32).to_be_bytes().to_vec()),
        ));
      }
      item.push(payload.clone());
      message.push(Ttlv::new(Tag::BatchItem, Structure(item)));
    }
    Ttlv::new(Tag::RequestMessage, Structure(message))
  }
}

fn protocol_version((major, minor): (i32, i32)) -> Ttlv {
  Ttlv::new(
    Tag::ProtocolVersion,
    Structure(vec![
      Ttlv::new(Tag::ProtocolVersionMajor, Integer(major)),
      Ttlv::new(Tag::ProtocolVersionMinor, Integer(minor)),
    ]),
  )
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResponseHeader {
  pub protocol_version: (i32, i32),
  pub time_stamp: Option<i64>,
  pub batch_count: i32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResponseBatchItem {
  pub operation: Option<u32>,
  pub unique_batch_item_id: Option<Vec<u8>>,
  pub result_status: u32,
  pub result_reason: Option<u32>,
  pub result_message: Option<String>,
  pub payload: Option<Ttlv>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResponseMessage {
  pub header: ResponseHeader,
  pub batch_items: Vec<ResponseBatchItem>,
}

fn required(parent: &Ttlv, tag: Tag) -> Result<&Ttlv, KmipError> {
  parent
    .child_iter()?
    .find(|c| c.is(tag))
    .ok_or(KmipError::MissingTag(tag as u32))
}

fn optional<'a, T: crate::util::TryFromValue<'a>>(
  parent: &'a Ttlv, tag: Tag,
) -> Result<Option<T>, KmipError> {
  match parent.child(tag) {
    Some(c) => Ok(Some(c.unbox()?)),
    None => Ok(None),
  }
}

impl ResponseMessage {
  /// Interprets a decoded tree as a response envelope. Tags the envelope does not know are skipped.
  pub fn from_ttlv(ttlv: &Ttlv) -> Result<Self, KmipError> {
    if !ttlv.is(Tag::ResponseMessage) {
      return Err(KmipError::UnexpectedTag {
        expected: Tag::ResponseMessage as u32,
        found: ttlv.tag,
      });
    }

    let header = required(ttlv, Tag::ResponseHeader)?;
    let version = required(header, Tag::ProtocolVersion)?;
    let header = ResponseHeader {
      protocol_version: (
        required(version, Tag::ProtocolVersionMajor)?.unbox()?,
        required(version, Tag::ProtocolVersionMinor)?.unbox()?,
      ),
      time_stamp: match header.child(Tag::TimeStamp) {
        Some(ts) => match ts.value {
          DateTime(ts) => Some(ts),
          _ => return Err(crate::error::TtlvError::TypeMismatch(ts.tag).into()),
        },
        None => None,
      },
      batch_count: required(header, Tag::BatchCount)?.unbox()?,
    };

    let batch_items = ttlv
      .child_iter()?
      .filter(|c| c.is(Tag::BatchItem))
      .map(ResponseBatchItem::from_ttlv)
      .collect::<Result<Vec<_>, _>>()?;

    if batch_items.len() != header.batch_count.max(0) as usize {
      warn!(
        "response declares {} batch items but carries {}",
        header.batch_count,
        batch_items.len()
      );
    }
    debug!(
      "decoded response: protocol {}.{}, {} batch item(s)",
      header.protocol_version.0,
      header.protocol_version.1,
      batch_items.len()
    );
    Ok(ResponseMessage {
      header,
      batch_items,
    })
  }

  /// Fails on the first batch item whose status is not Success.
  pub fn check_status(&self) -> Result<(), KmipError> {
    match self
      .batch_items
      .iter()
      .enumerate()
      .find(|(_, item)| item.result_status != ResultStatus::Success as u32)
    {
      Some((index, item)) => Err(KmipError::RequestFailed {
        index,
        status: item.result_status,
        reason: item.result_reason,
        message: item.result_message.clone(),
      }),
      None => Ok(()),
    }
  }

  pub fn to_ttlv(&self) -> Ttlv {
    let mut header = vec![protocol_version(self.header.protocol_version)];
    if let Some(ts) = self.header.time_stamp {
      header.push(Ttlv::new(Tag::TimeStamp, DateTime(ts)));
    }
    header.push(Ttlv::new(Tag::BatchCount, Integer(self.header.batch_count)));

    let mut message = vec![Ttlv::new(Tag::ResponseHeader, Structure(header))];
    message.extend(self.batch_items.iter().map(ResponseBatchItem::to_ttlv));
    Ttlv::new(Tag::ResponseMessage, Structure(message))
  }
}

impl ResponseBatchItem {
  pub fn from_ttlv(item: &Ttlv) -> Result<Self, KmipError> {
    Ok(ResponseBatchItem {
      operation: optional(item, Tag::Operation)?,
      unique_batch_item_id: optional::<&[u8]>(item, Tag::UniqueBatchItemID)?.map(<[u8]>::to_vec),
      result_status: required(item, Tag::ResultStatus)?.unbox()?,
      result_reason: optional(item, Tag::ResultReason)?,
      result_message: optional::<&str>(item, Tag::ResultMessage)?.map(str::to_string),
      payload: item.child(Tag::ResponsePayload).cloned(),
    })
  }

  pub fn is_success(&self) -> bool {
    self.result_status == ResultStatus::Success as u32
  }

  pub fn to_ttlv(&self) -> Ttlv {
    let mut item = Vec::new();
    if let Some(op) = self.operation {
      item.push(Ttlv::new(Tag::Operation, Enumeration(op)));
    }
    if let Some(id) = &self.unique_batch_item_id {
      item.push(Ttlv::new(Tag::UniqueBatchItemID, ByteString(id.clone())));
    }
    item.push(Ttlv::new(Tag::ResultStatus, Enumeration(self.result_status)));
    if let Some(reason) = self.result_reason {
      item.push(Ttlv::new(Tag::ResultReason, Enumeration(reason)));
    }
    if let Some(msg) = &self.result_message {
      item.push(Ttlv::new(Tag::ResultMessage, TextString(msg.clone())));
    }
    if let Some(payload) = &self.payload {
      item.push(payload.clone());
    }
    Ttlv::new(Tag::BatchItem, Structure(item))
  }
}
