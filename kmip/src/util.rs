use crate::ttlv::Value;

pub const fn padded_len(len: usize) -> usize {
  (len + 7) / 8 * 8
}

/// Typed view of a primitive value, used by `Ttlv::unbox`.
pub trait TryFromValue<'a>: Sized {
  fn from_value(value: &'a Value) -> Option<Self>;
}

macro_rules! try_from_value {
  ($($ty:ty => $($variant:ident)|+ ; $conv:expr),* $(,)?) => {
    $(
      impl<'a> TryFromValue<'a> for $ty {
        fn from_value(value: &'a Value) -> Option<Self> {
          match value {
            $(Value::$variant(val))|+ => Some($conv(val)),
            _ => None,
          }
        }
      }
    )*
  };
}

try_from_value!(
  i32 => Integer; |v: &i32| *v,
  i64 => LongInteger | DateTime; |v: &i64| *v,
  u32 => Enumeration | Interval; |v: &u32| *v,
  bool => Boolean; |v: &bool| *v,
  &'a str => TextString; String::as_str,
  &'a [u8] => ByteString | BigInteger; Vec::as_slice,
);

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn pads_to_eight() {
    assert_eq!(padded_len(0), 0);
    assert_eq!(padded_len(1), 8);
    assert_eq!(padded_len(8), 8);
    assert_eq!(padded_len(13), 16);
  }

  #[test]
  fn views_follow_the_variant() {
    assert_eq!(i64::from_value(&Value::DateTime(7)), Some(7));
    assert_eq!(u32::from_value(&Value::Interval(9)), Some(9));
    assert_eq!(u32::from_value(&Value::Integer(9)), None);
    let bytes = Value::BigInteger(vec![0; 8]);
    assert_eq!(<&[u8]>::from_value(&bytes), Some(&[0u8; 8][..]));
  }

  #[test]
  fn std_conversions_stay_unambiguous() {
    assert_eq!(u32::try_from(16usize), Ok(16));
    assert!(u32::try_from(usize::MAX).is_err() || usize::BITS == 32);
  }
}
