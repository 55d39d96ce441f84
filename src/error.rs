//! Error taxonomy for the remote map client.
//!
//! [`RemoteMapError`] is the single public error type returned by every
//! client operation. Each variant corresponds to a row in the error taxonomy
//! table; propagation policy (does this close the connection? is it
//! retried?) lives with the callers in [`crate::exchange`], not here.

use std::{fmt, net::SocketAddr};

use thiserror::Error;

/// A single synthetic stack frame reported by the remote server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFrame {
    /// Fully-qualified class or module name on the server side.
    pub class_name: String,
    /// Method or function name.
    pub method_name: String,
    /// Source file, if the server supplied one.
    pub file: Option<String>,
    /// Source line, if the server supplied one.
    pub line: Option<u32>,
}

impl fmt::Display for RemoteFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class_name, self.method_name)?;
        if let Some(file) = &self.file {
            write!(f, " ({file}")?;
            if let Some(line) = self.line {
                write!(f, ":{line}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// A remote exception reported by the server in a response frame.
///
/// Carries the server-side exception verbatim rather than reaching into a
/// foreign stack trace: the client appends one synthetic frame identifying
/// the endpoint the failure came from and formats the whole chain on
/// display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFailure {
    /// Exception class name as reported by the server.
    pub server_class_name: String,
    /// Exception message as reported by the server.
    pub server_message: String,
    /// Stack trace as reported by the server, outermost frame first.
    pub server_stack: Vec<RemoteFrame>,
    /// Address of the server that raised the exception.
    pub remote_endpoint: SocketAddr,
}

impl fmt::Display for RemoteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {}", self.server_class_name, self.server_message)?;
        for frame in &self.server_stack {
            writeln!(f, "    at {frame}")?;
        }
        write!(
            f,
            "    at ~ remote tcp ~ {} {}",
            self.remote_endpoint.ip(),
            self.remote_endpoint.port()
        )
    }
}

/// Errors raised by the remote map client.
#[derive(Debug, Error)]
pub enum RemoteMapError {
    /// A null key or value was passed where the operation disallows it.
    #[error("null key or value is not permitted for this operation")]
    NullKey,

    /// An entry's key or value type did not match the configured serializer.
    #[error("entry type mismatch during put_all")]
    TypeMismatch,

    /// The requested operation is not reachable over the wire protocol.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// The operation's deadline elapsed before it could complete.
    #[error("remote call timed out after {0:?}")]
    RemoteCallTimeout(std::time::Duration),

    /// The response's echoed transaction id did not match the request's.
    #[error("protocol violation: expected txn {expected}, got {actual}")]
    ProtocolViolation {
        /// Transaction id written into the request.
        expected: u64,
        /// Transaction id echoed back by the server.
        actual: u64,
    },

    /// The server reported a remote exception for this request.
    #[error("remote failure: {0}")]
    RemoteFailure(Box<RemoteFailure>),

    /// An I/O error occurred that was not a clean disconnect.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RemoteFailure> for RemoteMapError {
    fn from(failure: RemoteFailure) -> Self { Self::RemoteFailure(Box::new(failure)) }
}

/// Internal signal raised while encoding a request: the buffer ran out of
/// room. Never surfaced past [`crate::request::RequestBuilder`]; callers
/// catch it, grow the buffer, and retry the write at the same anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OutOfSpace {
    /// Bytes the failed write needed, when known precisely.
    pub required: Option<usize>,
}
