use crate::constants::{Tag, EXTENSION_TAG_PREFIX, STANDARD_TAG_PREFIX};
use crate::error::TtlvError;
use crate::util::{padded_len, TryFromValue};
use core::slice::Iter;
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;
use scroll::{Cread, Cwrite, BE};
use strum_macros::{EnumString, IntoStaticStr};

/// 3-byte tag, 1-byte type, 4-byte length.
pub const HEADER_LEN: usize = 8;
/// Deepest structure nesting accepted by the decoder.
pub const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct Ttlv {
  pub tag: u32,
  pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive, IntoStaticStr, EnumString)]
#[repr(u8)]
pub enum Type {
  Structure = 0x01,
  Integer,
  LongInteger,
  BigInteger,
  Enumeration,
  Boolean,
  TextString,
  ByteString,
  DateTime,
  Interval,
}

impl Type {
  /// Length every item of this type must declare, `None` for variable-length types.
  pub fn fixed_len(self) -> Option<u32> {
    match self {
      Type::Integer | Type::Enumeration | Type::Interval => Some(4),
      Type::LongInteger | Type::Boolean | Type::DateTime => Some(8),
      Type::Structure | Type::BigInteger | Type::TextString | Type::ByteString => None,
    }
  }

  pub fn name(self) -> &'static str {
    self.into()
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
  Structure(Vec<Ttlv>),
  Integer(i32),
  LongInteger(i64),
  /// Big-endian two's complement, sign-extended to a multiple of 8 bytes.
  BigInteger(Vec<u8>),
  Enumeration(u32),
  Boolean(bool),
  TextString(String),
  ByteString(Vec<u8>),
  DateTime(i64), // POSIX Time, as described in IEEE Standard 1003.1 [FIPS202]
  Interval(u32),
}

impl Value {
  pub fn item_type(&self) -> Type {
    match self {
      Value::Structure(_) => Type::Structure,
      Value::Integer(_) => Type::Integer,
      Value::LongInteger(_) => Type::LongInteger,
      Value::BigInteger(_) => Type::BigInteger,
      Value::Enumeration(_) => Type::Enumeration,
      Value::Boolean(_) => Type::Boolean,
      Value::TextString(_) => Type::TextString,
      Value::ByteString(_) => Type::ByteString,
      Value::DateTime(_) => Type::DateTime,
      Value::Interval(_) => Type::Interval,
    }
  }
}

/// The fixed 8-byte prefix of every item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
  pub tag: u32,
  pub type_: Type,
  pub len: u32,
}

impl Header {
  /// Parses and validates an item header: tag prefix, type byte and length consistency.
  pub fn parse(buf: &[u8]) -> Result<Header, TtlvError> {
    if buf.len() < HEADER_LEN {
      return Err(TtlvError::Truncated {
        needed: HEADER_LEN,
        available: buf.len(),
      });
    }
    let tag = (buf.cread_with::<u8>(0, BE) as u32) << 16 | buf.cread_with::<u16>(1, BE) as u32;
    check_tag(tag)?;

    let type_byte = buf.cread_with::<u8>(3, BE);
    let type_ = Type::from_u8(type_byte).ok_or(TtlvError::UnknownType {
      tag,
      type_: type_byte,
    })?;
    let len = buf.cread_with::<u32>(4, BE);

    let consistent = match type_.fixed_len() {
      Some(fixed) => fixed == len,
      None => !matches!(type_, Type::Structure | Type::BigInteger) || len % 8 == 0,
    };
    if !consistent {
      return Err(TtlvError::InvalidLength {
        tag,
        type_name: type_.name(),
        len,
      });
    }
    Ok(Header { tag, type_, len })
  }

  /// Full encoded size of the item, header and padding included.
  pub fn node_len(&self) -> usize {
    HEADER_LEN + padded_len(self.len as usize)
  }
}

/// Total length of the item whose header starts `buf`.
pub fn parse_ttlv_len(buf: &[u8]) -> Result<usize, TtlvError> {
  Header::parse(buf).map(|h| h.node_len())
}

fn check_tag(tag: u32) -> Result<(), TtlvError> {
  let prefix = (tag >> 16) as u8;
  if tag > 0xFF_FFFF || (prefix != STANDARD_TAG_PREFIX && prefix != EXTENSION_TAG_PREFIX) {
    Err(TtlvError::InvalidTag(tag))
  } else {
    Ok(())
  }
}

impl Ttlv {
  pub fn new<T: Into<u32>>(tag: T, value: Value) -> Self {
    Ttlv {
      tag: tag.into(),
      value,
    }
  }
  pub fn tag(&self) -> u32 {
    self.tag
  }
  pub fn is(&self, tag: Tag) -> bool {
    self.tag == tag as u32
  }
  pub fn unbox<'a, T: TryFromValue<'a>>(&'a self) -> Result<T, TtlvError> {
    T::from_value(&self.value).ok_or(TtlvError::TypeMismatch(self.tag))
  }
  pub fn child_iter(&self) -> Result<Iter<'_, Ttlv>, TtlvError> {
    if let Value::Structure(val) = &self.value {
      Ok(val.iter())
    } else {
      Err(TtlvError::TypeMismatch(self.tag))
    }
  }
  /// First direct child carrying `tag`.
  pub fn child(&self, tag: Tag) -> Option<&Ttlv> {
    self.child_iter().ok()?.find(|c| c.is(tag))
  }

  pub fn path(&self, tags: &[Tag]) -> Result<&Ttlv, TtlvError> {
    let Some((first, rest)) = tags.split_first() else {
      return Ok(self);
    };
    self
      .child_iter()?
      .find(|c| c.is(*first))
      .ok_or(TtlvError::PathNotFound(*first as u32))
      .and_then(|c| c.path(rest))
  }

  pub fn paths(&self, tags: &[Tag]) -> Result<Vec<&Ttlv>, TtlvError> {
    let Some((first, rest)) = tags.split_first() else {
      return Ok(vec![self]);
    };
    let mut it = self.child_iter()?;
    if rest.is_empty() {
      let r: Vec<&Ttlv> = it.filter(|c| c.is(*first)).collect();
      if r.is_empty() {
        Err(TtlvError::PathNotFound(*first as u32))
      } else {
        Ok(r)
      }
    } else {
      it.find(|c| c.is(*first))
        .ok_or(TtlvError::PathNotFound(*first as u32))
        .and_then(|c| c.paths(rest))
    }
  }

  pub fn encoded_len(&self) -> usize {
    HEADER_LEN
      + match &self.value {
        Value::Structure(children) => children.iter().map(Ttlv::encoded_len).sum(),
        Value::TextString(val) => padded_len(val.len()),
        Value::ByteString(val) | Value::BigInteger(val) => padded_len(val.len()),
        _ => 8,
      }
  }

  pub fn to_bytes(&self) -> Result<Vec<u8>, TtlvError> {
    let mut buf = vec![0u8; self.encoded_len()];
    self.marshal(&mut buf)?;
    Ok(buf)
  }

  pub fn marshal(&self, buf: &mut [u8]) -> Result<usize, TtlvError> {
    let total = self.encoded_len();
    if buf.len() < total {
      return Err(TtlvError::BufferTooSmall);
    }
    check_tag(self.tag)?;
    buf.cwrite_with::<u8>((self.tag >> 16) as u8, 0, BE);
    buf.cwrite_with::<u16>(self.tag as u16, 1, BE);
    let len = match &self.value {
      Value::Structure(children) => {
        let mut cursor = HEADER_LEN;
        for c in children {
          cursor += c.marshal(&mut buf[cursor..])?;
        }
        cursor - HEADER_LEN
      }
      Value::Integer(val) => {
        buf.cwrite_with::<i32>(*val, 8, BE);
        buf.cwrite_with::<u32>(0, 12, BE);
        4
      }
      Value::LongInteger(val) => {
        buf.cwrite_with::<i64>(*val, 8, BE);
        8
      }
      Value::BigInteger(val) => {
        if val.len() % 8 != 0 {
          return Err(TtlvError::InvalidLength {
            tag: self.tag,
            type_name: Type::BigInteger.name(),
            len: val.len() as u32,
          });
        }
        write_bin_string(buf, val)
      }
      Value::Enumeration(val) => {
        buf.cwrite_with::<u32>(*val, 8, BE);
        buf.cwrite_with::<u32>(0, 12, BE);
        4
      }
      Value::Boolean(val) => {
        buf.cwrite_with::<u64>(u64::from(*val), 8, BE);
        8
      }
      Value::DateTime(val) => {
        buf.cwrite_with::<i64>(*val, 8, BE);
        8
      }
      Value::Interval(val) => {
        buf.cwrite_with::<u32>(*val, 8, BE);
        buf.cwrite_with::<u32>(0, 12, BE);
        4
      }
      Value::TextString(val) => write_bin_string(buf, val.as_bytes()),
      Value::ByteString(val) => write_bin_string(buf, val),
    };
    let len = u32::try_from(len).map_err(|_| TtlvError::TooLarge(len))?;
    buf.cwrite_with::<u8>(self.value.item_type() as u8, 3, BE);
    buf.cwrite_with::<u32>(len, 4, BE);
    Ok(total)
  }

  /// Decodes one item from the front of `buf`, returning it with the number of bytes consumed.
  pub fn unmarshal(buf: &[u8]) -> Result<(Self, usize), TtlvError> {
    Ttlv::unmarshal_nested(buf, 0)
  }

  fn unmarshal_nested(buf: &[u8], depth: usize) -> Result<(Self, usize), TtlvError> {
    let header = Header::parse(buf)?;
    let node_len = header.node_len();
    if buf.len() < node_len {
      return Err(TtlvError::Truncated {
        needed: node_len,
        available: buf.len(),
      });
    }
    let tag = header.tag;
    let len = header.len as usize;
    let body = &buf[HEADER_LEN..HEADER_LEN + len];

    let value = match header.type_ {
      Type::Structure => {
        if depth >= MAX_DEPTH {
          return Err(TtlvError::TooDeep(MAX_DEPTH));
        }
        let mut cursor = 0;
        let mut children = Vec::new();
        while cursor < len {
          // the parent region is fully present, so a short child overran the parent's length
          let (c, c_len) =
            Ttlv::unmarshal_nested(&body[cursor..], depth + 1).map_err(|e| match e {
              TtlvError::Truncated { .. } => TtlvError::ChildOverrun(tag),
              e => e,
            })?;
          cursor += c_len;
          children.push(c);
        }
        Value::Structure(children)
      }
      Type::Integer => Value::Integer(buf.cread_with::<i32>(8, BE)),
      Type::LongInteger => Value::LongInteger(buf.cread_with::<i64>(8, BE)),
      Type::BigInteger => Value::BigInteger(body.to_vec()),
      Type::Enumeration => Value::Enumeration(buf.cread_with::<u32>(8, BE)),
      Type::Boolean => match buf.cread_with::<u64>(8, BE) {
        0 => Value::Boolean(false),
        1 => Value::Boolean(true),
        value => return Err(TtlvError::InvalidBoolean { tag, value }),
      },
      Type::TextString => Value::TextString(
        String::from_utf8(body.to_vec()).map_err(|_| TtlvError::CorruptUtf8(tag))?,
      ),
      Type::ByteString => Value::ByteString(body.to_vec()),
      Type::DateTime => Value::DateTime(buf.cread_with::<i64>(8, BE)),
      Type::Interval => Value::Interval(buf.cread_with::<u32>(8, BE)),
    };
    Ok((Ttlv { tag, value }, node_len))
  }
}

// Caller guarantees `buf` holds the header plus the padded value.
fn write_bin_string(buf: &mut [u8], data: &[u8]) -> usize {
  let data_len = data.len();
  let buf = &mut buf[HEADER_LEN..HEADER_LEN + padded_len(data_len)];
  buf[..data_len].copy_from_slice(data);
  for pad in &mut buf[data_len..] {
    *pad = 0;
  }
  data_len
}
