use std::time::Duration;

/// IANA registered port for KMIP over TLS.
pub const DEFAULT_KMIP_PORT: u16 = 5696;
pub const KMIP_URI_SCHEME: &str = "kmip";

pub const MAX_MESSAGE_SIZE_BYTES: usize = 1 << 21;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
