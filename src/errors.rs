use std::{io, net::AddrParseError};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to bind socket address: {0}")]
    BindFailed(io::Error),

    #[error("failed to configure socket: {0}")]
    SocketConfig(io::Error),

    #[error("udp socket failed to send data: {0}")]
    SendFailed(io::Error),

    #[error("invalid address: {0}")]
    InvalidAddress(#[from] AddrParseError),

    #[error("payload text of {prefix_len} bytes does not fit in {budget} data bytes (MTU too small)")]
    PayloadTooLarge { prefix_len: usize, budget: usize },
}
