pub mod format;
pub mod kmip_client;
pub mod tls;

pub use format::Format;
pub use kmip_client::{send_request, Exchange, ExchangeState};
pub use tls::format_io_err;
