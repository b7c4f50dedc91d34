/// Errors that can occur while parsing addresses or opening streams.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The address text is not of the form `scheme://host:port`.
    #[error("invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// The address uses a scheme this transport does not know.
    #[error("unsupported scheme '{scheme}' in address '{address}'")]
    UnsupportedScheme { scheme: String, address: String },

    /// The host name did not resolve to any socket address.
    #[error("failed to resolve {address}: {source}")]
    Resolve {
        address: String,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        source: std::io::Error,
    },

    /// An I/O error occurred on the stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// The underlying I/O error kind, if this error carries one.
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            TransportError::Resolve { source, .. } | TransportError::Connect { source, .. } => {
                Some(source.kind())
            }
            TransportError::Io(err) => Some(err.kind()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
