pub mod constants;
mod kmip;
pub mod ttlv;
pub mod xml;
pub mod error;
mod util;

pub use constants::{enumerations, Tag};
pub use kmip::*;
pub use ttlv::{parse_ttlv_len, Ttlv, Value, HEADER_LEN, MAX_DEPTH};
pub use util::TryFromValue;
