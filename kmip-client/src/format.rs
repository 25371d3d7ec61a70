use std::io::Read;

use common::error::{ErrCode, KmipCliResult};
use kmip::ttlv::Ttlv;
use kmip::xml::{from_xml, to_xml};
use log::{debug, warn};
use strum_macros::{EnumString, IntoStaticStr, VariantNames};

use crate::tls::format_io_err;

/// Representation of requests read and responses printed.
#[derive(Debug, PartialEq, Eq, Copy, Clone, EnumString, IntoStaticStr, VariantNames)]
#[strum(serialize_all = "lowercase")]
pub enum Format {
  Hex,
  Xml,
}

impl Format {
  pub fn name(self) -> &'static str {
    self.into()
  }
}

pub fn read_request<R: Read>(rd: &mut R, format: Format) -> KmipCliResult<Vec<u8>> {
  let mut input = String::new();
  rd.read_to_string(&mut input)
    .map_err(|e| format_io_err(e, ErrCode::CONFIGURATION, "unable to read request"))?;
  decode_request(&input, format)
}

/// Turns textual request input into the bytes to put on the wire.
pub fn decode_request(input: &str, format: Format) -> KmipCliResult<Vec<u8>> {
  let request = match format {
    Format::Hex => {
      let digits: String = input.chars().filter(|c| !c.is_ascii_whitespace()).collect();
      if digits.is_empty() {
        return Err(ErrCode::CONFIGURATION.msg("empty request"));
      }
      let request = hex::decode(&digits)
        .map_err(|e| ErrCode::CONFIGURATION.msg(format!("request is not valid hex: {}", e)))?;
      // the request is sent as given; a bad one only earns a warning
      match Ttlv::unmarshal(&request) {
        Ok((_, consumed)) if consumed < request.len() => warn!(
          "request carries {} bytes after the first TTLV message",
          request.len() - consumed
        ),
        Ok(_) => {}
        Err(e) => warn!("request does not decode as TTLV: {}", e),
      }
      request
    }
    Format::Xml => {
      if input.trim().is_empty() {
        return Err(ErrCode::CONFIGURATION.msg("empty request"));
      }
      from_xml(input)?.to_bytes()?
    }
  };
  debug!("request of {} bytes", request.len());
  Ok(request)
}

/// Renders a response: lowercase hex of the raw bytes, or the decoded tree as indented XML.
pub fn render_response(raw: &[u8], tree: Option<&Ttlv>, format: Format) -> KmipCliResult<String> {
  match format {
    Format::Hex => Ok(hex::encode(raw)),
    Format::Xml => match tree {
      Some(tree) => Ok(to_xml(tree)?),
      None => {
        let (tree, _) = Ttlv::unmarshal(raw)?;
        Ok(to_xml(&tree)?)
      }
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use kmip::enumerations::Operation;
  use kmip::{RequestMessage, Tag, Value};
  use std::str::FromStr;

  fn get_request() -> Ttlv {
    RequestMessage::default()
      .push(
        Operation::Get,
        Ttlv::new(
          Tag::RequestPayload,
          Value::Structure(vec![Ttlv::new(
            Tag::UniqueIdentifier,
            Value::TextString("1".to_string()),
          )]),
        ),
      )
      .to_ttlv()
  }

  #[test]
  fn parses_format_names() {
    assert_eq!(Format::from_str("hex").unwrap(), Format::Hex);
    assert_eq!(Format::from_str("xml").unwrap(), Format::Xml);
    assert!(Format::from_str("json").is_err());
    assert_eq!(Format::Xml.name(), "xml");
  }

  #[test]
  fn variant_names_parse_back() {
    use strum::VariantNames;

    assert_eq!(Format::VARIANTS, &["hex", "xml"]);
    for name in Format::VARIANTS {
      assert_eq!(Format::from_str(name).unwrap().name(), *name);
    }
  }

  #[test]
  fn strips_whitespace_from_hex() {
    let bytes = get_request().to_bytes().unwrap();
    let hex = hex::encode(&bytes);
    let spaced: String = hex
      .as_bytes()
      .chunks(16)
      .map(|c| format!("{}\n\t ", std::str::from_utf8(c).unwrap()))
      .collect();
    assert_eq!(decode_request(&spaced, Format::Hex).unwrap(), bytes);
  }

  #[test]
  fn sends_undecodable_hex_as_is() {
    assert_eq!(
      decode_request("deadbeef", Format::Hex).unwrap(),
      vec![0xDE, 0xAD, 0xBE, 0xEF]
    );
  }

  #[test]
  fn rejects_empty_or_invalid_input() {
    for (input, format) in [(" \n", Format::Hex), ("", Format::Xml), ("abc", Format::Hex)] {
      let err = decode_request(input, format).unwrap_err();
      assert!(err.is(ErrCode::CONFIGURATION), "{:?}", input);
    }
    let err = decode_request("<NotATag/>", Format::Xml).unwrap_err();
    assert!(err.is(ErrCode::DECODE));
  }

  #[test]
  fn xml_and_hex_requests_match() {
    let tree = get_request();
    let xml = to_xml(&tree).unwrap();
    let hex = hex::encode(tree.to_bytes().unwrap());
    assert_eq!(
      decode_request(&xml, Format::Xml).unwrap(),
      decode_request(&hex, Format::Hex).unwrap()
    );
  }

  #[test]
  fn reads_request_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    std::io::Write::write_all(&mut file, b"42000d0200000004 0000000100000000\n").unwrap();
    let mut rd = std::fs::File::open(file.path()).unwrap();
    assert_eq!(read_request(&mut rd, Format::Hex).unwrap().len(), 16);
  }

  #[test]
  fn renders_both_formats() {
    let tree = get_request();
    let raw = tree.to_bytes().unwrap();
    assert_eq!(
      render_response(&raw, Some(&tree), Format::Hex).unwrap(),
      hex::encode(&raw)
    );
    let xml = render_response(&raw, None, Format::Xml).unwrap();
    assert!(xml.starts_with("<RequestMessage>"));
    assert_eq!(xml, render_response(&raw, Some(&tree), Format::Xml).unwrap());
    assert!(render_response(&raw[..10], None, Format::Xml).is_err());
  }
}
