use thiserror::Error;

use scenes::FormatTag;

mod gate;
pub use gate::*;
pub mod pool;
mod decode;
pub use decode::*;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("{0} operation already in flight")]
    Busy(Domain),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("no decoder for {} data", .0.as_str())]
    UnsupportedFormat(FormatTag),
    #[error("{name}: {reason}")]
    Malformed { name: String, reason: String },
    #[error("cancelled")]
    Cancelled,
}
