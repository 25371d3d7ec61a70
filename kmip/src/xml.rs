//! Conversion between TTLV trees and the KMIP XML profile.
//!
//! Every item is one element named after its tag. Unknown tags use a `TTLV` element with a
//! `tag="0x42xxxx"` attribute. Primitive items carry `type` and `value` attributes, structures
//! carry their children and no `type` attribute.

use crate::constants::{enumeration_name, enumeration_value, Tag, EXTENSION_TAG_PREFIX, STANDARD_TAG_PREFIX};
use crate::error::{KmipError, TtlvError};
use crate::ttlv::{Ttlv, Type, Value, MAX_DEPTH};
use crate::util::padded_len;
use quick_xml::escape::escape;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::str::FromStr;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

const UNKNOWN_TAG_ELEMENT: &str = "TTLV";

pub fn to_xml(ttlv: &Ttlv) -> Result<String, KmipError> {
  let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
  write_ttlv(&mut writer, ttlv)?;
  String::from_utf8(writer.into_inner()).map_err(KmipError::xml)
}

fn emit(w: &mut Writer<Vec<u8>>, event: Event) -> Result<(), KmipError> {
  w.write_event(event).map_err(KmipError::xml)
}

fn write_ttlv(w: &mut Writer<Vec<u8>>, ttlv: &Ttlv) -> Result<(), KmipError> {
  let name = Tag::name(ttlv.tag).unwrap_or(UNKNOWN_TAG_ELEMENT);
  let mut elem = BytesStart::new(name);
  if name == UNKNOWN_TAG_ELEMENT {
    elem.push_attribute(("tag", format!("0x{:06X}", ttlv.tag).as_str()));
  }

  let value = match &ttlv.value {
    Value::Structure(children) if children.is_empty() => return emit(w, Event::Empty(elem)),
    Value::Structure(children) => {
      emit(w, Event::Start(elem))?;
      for c in children {
        write_ttlv(w, c)?;
      }
      return emit(w, Event::End(BytesEnd::new(name)));
    }
    Value::Integer(v) => v.to_string(),
    Value::LongInteger(v) => v.to_string(),
    Value::BigInteger(v) | Value::ByteString(v) => hex::encode(v),
    Value::Enumeration(v) => enumeration_name(ttlv.tag, *v)
      .map(str::to_string)
      .unwrap_or_else(|| format!("0x{:08X}", v)),
    Value::Boolean(v) => v.to_string(),
    Value::TextString(v) => v.clone(),
    Value::DateTime(v) => format_date_time(*v),
    Value::Interval(v) => v.to_string(),
  };
  elem.push_attribute(("type", ttlv.value.item_type().name()));
  let value = escape_attribute(&value);
  elem.push_attribute(("value".as_bytes(), value.as_bytes()));
  emit(w, Event::Empty(elem))
}

/// Attribute values are whitespace-normalized by XML readers, so line breaks and tabs go out as
/// character references.
fn escape_attribute(raw: &str) -> String {
  escape(raw)
    .replace('\n', "&#10;")
    .replace('\r', "&#13;")
    .replace('\t', "&#9;")
}

fn format_date_time(ts: i64) -> String {
  OffsetDateTime::from_unix_timestamp(ts)
    .ok()
    .and_then(|dt| dt.format(&Rfc3339).ok())
    .unwrap_or_else(|| ts.to_string())
}

/// Parses exactly one XML element tree into a TTLV tree.
pub fn from_xml(xml: &str) -> Result<Ttlv, KmipError> {
  let mut reader = Reader::from_str(xml);
  reader.trim_text(true);
  let mut buf = Vec::new();
  let mut stack: Vec<Ttlv> = Vec::new();
  let mut root = None;

  loop {
    let event = reader
      .read_event_into(&mut buf)
      .map_err(|e| KmipError::xml(format!("at position {}: {}", reader.buffer_position(), e)))?;
    match event {
      Event::Start(e) => {
        let el = Element::parse(&e)?;
        if stack.is_empty() && root.is_some() {
          return Err(KmipError::xml("more than one root element"));
        }
        if let Some(t) = el.type_.as_deref().filter(|t| *t != Type::Structure.name()) {
          return Err(KmipError::xml(format!(
            "element {} of type {} cannot have children",
            el.name, t
          )));
        }
        if stack.len() >= MAX_DEPTH {
          return Err(TtlvError::TooDeep(MAX_DEPTH).into());
        }
        stack.push(Ttlv::new(el.tag, Value::Structure(Vec::new())));
      }
      Event::Empty(e) => {
        let el = Element::parse(&e)?;
        let value = el.value()?;
        if matches!(value, Value::Structure(_)) && stack.len() >= MAX_DEPTH {
          return Err(TtlvError::TooDeep(MAX_DEPTH).into());
        }
        attach(&mut stack, &mut root, Ttlv::new(el.tag, value))?;
      }
      Event::End(_) => {
        let node = stack
          .pop()
          .ok_or_else(|| KmipError::xml("unbalanced end tag"))?;
        attach(&mut stack, &mut root, node)?;
      }
      Event::Text(_) | Event::CData(_) => {
        return Err(KmipError::xml(format!(
          "unexpected text content at position {}",
          reader.buffer_position()
        )))
      }
      Event::Eof => break,
      Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
    }
    buf.clear();
  }

  if let Some(open) = stack.last() {
    return Err(KmipError::xml(format!(
      "element {} is never closed",
      crate::constants::tag_display(open.tag)
    )));
  }
  root.ok_or_else(|| KmipError::xml("no root element"))
}

fn attach(stack: &mut [Ttlv], root: &mut Option<Ttlv>, node: Ttlv) -> Result<(), KmipError> {
  match stack.last_mut() {
    Some(parent) => {
      if let Value::Structure(children) = &mut parent.value {
        children.push(node);
      }
      Ok(())
    }
    None if root.is_none() => {
      *root = Some(node);
      Ok(())
    }
    None => Err(KmipError::xml("more than one root element")),
  }
}

struct Element {
  name: String,
  tag: u32,
  type_: Option<String>,
  value: Option<String>,
}

impl Element {
  fn parse(e: &BytesStart) -> Result<Self, KmipError> {
    let name = std::str::from_utf8(e.name().as_ref())
      .map_err(KmipError::xml)?
      .to_string();
    let (mut type_, mut value, mut raw_tag) = (None, None, None);
    for a in e.attributes() {
      let a = a.map_err(KmipError::xml)?;
      let v = a.unescape_value().map_err(KmipError::xml)?.into_owned();
      match a.key.as_ref() {
        b"type" => type_ = Some(v),
        b"value" => value = Some(v),
        b"tag" => raw_tag = Some(v),
        _ => {}
      }
    }

    let tag_name = raw_tag.as_deref().unwrap_or(&name);
    let tag = Tag::parse(tag_name)
      .ok_or_else(|| KmipError::xml(format!("unknown tag `{}`", tag_name)))?;
    let prefix = (tag >> 16) as u8;
    if prefix != STANDARD_TAG_PREFIX && prefix != EXTENSION_TAG_PREFIX {
      return Err(TtlvError::InvalidTag(tag).into());
    }
    Ok(Element {
      name,
      tag,
      type_,
      value,
    })
  }

  fn value(&self) -> Result<Value, KmipError> {
    let type_ = match self.type_.as_deref() {
      None if self.value.is_none() => return Ok(Value::Structure(Vec::new())),
      None => {
        return Err(KmipError::xml(format!(
          "element {} has a value but no type",
          self.name
        )))
      }
      Some(t) => Type::from_str(t).map_err(|_| {
        KmipError::xml(format!("unknown type `{}` on element {}", t, self.name))
      })?,
    };
    let raw = self.value.as_deref().unwrap_or("");
    let invalid = || {
      KmipError::xml(format!(
        "invalid {} value `{}` on element {}",
        type_.name(),
        raw,
        self.name
      ))
    };

    Ok(match type_ {
      Type::Structure if self.value.is_none() => Value::Structure(Vec::new()),
      Type::Structure => return Err(invalid()),
      Type::Integer => Value::Integer(parse_i32(raw).ok_or_else(invalid)?),
      Type::LongInteger => Value::LongInteger(parse_i64(raw).ok_or_else(invalid)?),
      Type::BigInteger => Value::BigInteger(sign_extend(decode_hex(raw).ok_or_else(invalid)?)),
      Type::Enumeration => Value::Enumeration(
        match hex_digits(raw) {
          Some(h) => u32::from_str_radix(h, 16).ok(),
          None => enumeration_value(self.tag, raw).or_else(|| raw.parse().ok()),
        }
        .ok_or_else(invalid)?,
      ),
      Type::Boolean => Value::Boolean(match raw {
        "true" => true,
        "false" => false,
        _ => return Err(invalid()),
      }),
      Type::TextString => Value::TextString(raw.to_string()),
      Type::ByteString => Value::ByteString(decode_hex(raw).ok_or_else(invalid)?),
      Type::DateTime => Value::DateTime(
        OffsetDateTime::parse(raw, &Rfc3339)
          .map(|dt| dt.unix_timestamp())
          .ok()
          .or_else(|| parse_i64(raw))
          .ok_or_else(invalid)?,
      ),
      Type::Interval => Value::Interval(parse_u32(raw).ok_or_else(invalid)?),
    })
  }
}

fn hex_digits(raw: &str) -> Option<&str> {
  raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X"))
}

fn decode_hex(raw: &str) -> Option<Vec<u8>> {
  hex::decode(hex_digits(raw).unwrap_or(raw)).ok()
}

// hex literals give the raw bit pattern, decimal literals the signed value
fn parse_i32(raw: &str) -> Option<i32> {
  match hex_digits(raw) {
    Some(h) => u32::from_str_radix(h, 16).ok().map(|v| v as i32),
    None => raw.parse().ok(),
  }
}

fn parse_i64(raw: &str) -> Option<i64> {
  match hex_digits(raw) {
    Some(h) => u64::from_str_radix(h, 16).ok().map(|v| v as i64),
    None => raw.parse().ok(),
  }
}

fn parse_u32(raw: &str) -> Option<u32> {
  match hex_digits(raw) {
    Some(h) => u32::from_str_radix(h, 16).ok(),
    None => raw.parse().ok(),
  }
}

/// Left-pads a two's complement value to the next multiple of 8 bytes.
fn sign_extend(mut bytes: Vec<u8>) -> Vec<u8> {
  let pad = padded_len(bytes.len()) - bytes.len();
  if pad == 0 {
    return bytes;
  }
  let fill = match bytes.first() {
    Some(b) if b & 0x80 != 0 => 0xFF,
    _ => 0x00,
  };
  let mut out = vec![fill; pad];
  out.append(&mut bytes);
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::constants::enumerations::Operation;
  use crate::kmip::RequestMessage;
  use crate::ttlv::Value::*;

  fn sample() -> Ttlv {
    Ttlv::new(
      Tag::ResponseMessage,
      Structure(vec![
        Ttlv::new(Tag::BatchCount, Integer(-3)),
        Ttlv::new(Tag::MaximumResponseSize, LongInteger(1 << 40)),
        Ttlv::new(Tag::Modulus, BigInteger(vec![0xFF, 0, 0, 0, 0, 0, 1, 0])),
        Ttlv::new(Tag::Operation, Enumeration(0x0A)),
        Ttlv::new(Tag::ObjectType, Enumeration(0x8000_0001)),
        Ttlv::new(Tag::Fresh, Boolean(false)),
        Ttlv::new(Tag::UniqueIdentifier, TextString("a <b> & \"c\"".to_string())),
        Ttlv::new(Tag::Data, ByteString(vec![0xDE, 0xAD])),
        Ttlv::new(Tag::TimeStamp, DateTime(1_700_000_000)),
        Ttlv::new(Tag::LeaseTime, Interval(86400)),
        Ttlv::new(Tag::Attribute, Structure(vec![])),
        Ttlv::new(0x54_0001u32, TextString("vendor".to_string())),
      ]),
    )
  }

  #[test]
  fn round_trip() {
    let ttlv = sample();
    let xml = to_xml(&ttlv).unwrap();
    assert_eq!(from_xml(&xml).unwrap(), ttlv);
  }

  #[test]
  fn renders_profile_elements() {
    let xml = to_xml(&sample()).unwrap();
    assert!(xml.starts_with("<ResponseMessage>"));
    assert!(xml.contains(r#"<Operation type="Enumeration" value="Get"/>"#));
    assert!(xml.contains(r#"<ObjectType type="Enumeration" value="0x80000001"/>"#));
    assert!(xml.contains(r#"<TimeStamp type="DateTime" value="2023-11-14T22:13:20Z"/>"#));
    assert!(xml.contains(r#"<Data type="ByteString" value="dead"/>"#));
    assert!(xml.contains(r#"<TTLV tag="0x540001" type="TextString" value="vendor"/>"#));
    assert!(xml.contains("<Attribute/>"));
    assert!(xml.contains("\n  <BatchCount"));
    assert!(xml.trim_end().ends_with("</ResponseMessage>"));
  }

  #[test]
  fn escapes_line_breaks_in_attributes() {
    let ttlv = Ttlv::new(
      Tag::ResultMessage,
      TextString("first line\r\nsecond\tcolumn".to_string()),
    );
    let xml = to_xml(&ttlv).unwrap();
    assert_eq!(
      xml,
      r#"<ResultMessage type="TextString" value="first line&#13;&#10;second&#9;column"/>"#
    );
    assert!(!xml.contains('\n') && !xml.contains('\t'));
    assert_eq!(from_xml(&xml).unwrap(), ttlv);
  }

  #[test]
  fn hex_and_xml_agree() {
    let xml = r#"
      <RequestMessage>
        <RequestHeader>
          <ProtocolVersion>
            <ProtocolVersionMajor type="Integer" value="1"/>
            <ProtocolVersionMinor type="Integer" value="4"/>
          </ProtocolVersion>
          <BatchCount type="Integer" value="1"/>
        </RequestHeader>
        <BatchItem>
          <Operation type="Enumeration" value="Get"/>
          <RequestPayload>
            <UniqueIdentifier type="TextString" value="1"/>
          </RequestPayload>
        </BatchItem>
      </RequestMessage>"#;
    let expected = RequestMessage::default()
      .push(
        Operation::Get,
        Ttlv::new(
          Tag::RequestPayload,
          Structure(vec![Ttlv::new(Tag::UniqueIdentifier, TextString("1".into()))]),
        ),
      )
      .to_ttlv();

    let from_xml = from_xml(xml).unwrap();
    let hex = hex::encode(expected.to_bytes().unwrap());
    let (from_hex, _) = Ttlv::unmarshal(&hex::decode(&hex).unwrap()).unwrap();
    assert_eq!(from_xml, from_hex);
    assert_eq!(from_xml.to_bytes().unwrap(), expected.to_bytes().unwrap());
  }

  #[test]
  fn accepts_alternative_value_forms() {
    let xml = r#"<?xml version="1.0"?>
      <!-- comment -->
      <ResponseMessage type="Structure">
        <BatchCount type="Integer" value="0xFFFFFFFF"/>
        <Operation type="Enumeration" value="0x0000000A"/>
        <ResultStatus type="Enumeration" value="1"/>
        <TimeStamp type="DateTime" value="1700000000"/>
        <Data type="ByteString" value="0xCAFE"/>
        <Modulus type="BigInteger" value="ff01"/>
        <Nonce/>
        <TTLV tag="0x420079"/>
      </ResponseMessage>"#;
    let ttlv = from_xml(xml).unwrap();
    let expected = Ttlv::new(
      Tag::ResponseMessage,
      Structure(vec![
        Ttlv::new(Tag::BatchCount, Integer(-1)),
        Ttlv::new(Tag::Operation, Enumeration(0x0A)),
        Ttlv::new(Tag::ResultStatus, Enumeration(1)),
        Ttlv::new(Tag::TimeStamp, DateTime(1_700_000_000)),
        Ttlv::new(Tag::Data, ByteString(vec![0xCA, 0xFE])),
        Ttlv::new(
          Tag::Modulus,
          BigInteger(vec![0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]),
        ),
        Ttlv::new(Tag::Nonce, Structure(vec![])),
        Ttlv::new(Tag::RequestPayload, Structure(vec![])),
      ]),
    );
    assert_eq!(ttlv, expected);
  }

  #[test]
  fn rejects_malformed_documents() {
    let cases = [
      r#"<NotATag type="Integer" value="1"/>"#,
      r#"<BatchCount type="Float" value="1"/>"#,
      r#"<BatchCount type="Integer" value="one"/>"#,
      r#"<BatchCount value="1"/>"#,
      r#"<Operation type="Enumeration" value="Fly"/>"#,
      r#"<Fresh type="Boolean" value="yes"/>"#,
      r#"<Data type="ByteString" value="abc"/>"#,
      r#"<BatchItem type="Integer"><BatchCount type="Integer" value="1"/></BatchItem>"#,
      r#"<BatchItem>text</BatchItem>"#,
      r#"<BatchItem><BatchCount type="Integer" value="1"/>"#,
      r#"<BatchCount type="Integer" value="1"/><BatchCount type="Integer" value="2"/>"#,
      "",
    ];
    for xml in cases {
      assert!(from_xml(xml).is_err(), "accepted {:?}", xml);
    }
  }

  #[test]
  fn rejects_invalid_tag_literal() {
    assert_eq!(
      from_xml(r#"<TTLV tag="0x430001" type="Integer" value="1"/>"#),
      Err(KmipError::Ttlv(TtlvError::InvalidTag(0x43_0001)))
    );
  }

  #[test]
  fn bounds_nesting_depth() {
    let open = "<BatchItem>".repeat(MAX_DEPTH + 1);
    let close = "</BatchItem>".repeat(MAX_DEPTH + 1);
    let xml = format!("{}<BatchCount type=\"Integer\" value=\"1\"/>{}", open, close);
    assert_eq!(
      from_xml(&xml),
      Err(KmipError::Ttlv(TtlvError::TooDeep(MAX_DEPTH)))
    );

    let open = "<BatchItem>".repeat(MAX_DEPTH);
    let close = "</BatchItem>".repeat(MAX_DEPTH);
    let xml = format!("{}<BatchCount type=\"Integer\" value=\"1\"/>{}", open, close);
    assert!(from_xml(&xml).is_ok());
  }

  #[test]
  fn sign_extends_big_integers() {
    assert_eq!(sign_extend(vec![0x01, 0x02]), vec![0, 0, 0, 0, 0, 0, 1, 2]);
    assert_eq!(sign_extend(vec![0x80]), vec![0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x80]);
    assert_eq!(sign_extend(vec![]), Vec::<u8>::new());
  }
}
