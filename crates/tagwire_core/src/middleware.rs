//! This module contains the client and service side
//! objects that carry method invocations over a stream.
//!
//! A request is the method [Selector] followed by the encoded argument tuple.
//! The reply is the encoded return value of the handler. Both sides run
//! strictly one request at a time per stream.

mod context_manager;
mod dispatch;
pub mod service;

use std::fmt;

use serde::{
    de::{DeserializeOwned, IgnoredAny},
    Deserialize, Serialize,
};

pub use context_manager::*;
pub use dispatch::*;

use crate::{
    interface::Selector,
    ser_de::{self, Deserializer, Serializer},
    stream::{BoundedReader, CaptureReader, Reader, ReplayReader, Writer},
};

/// Method invocation errors
#[derive(Debug)]
pub enum InvokeError {
    /// The service has no handler for the selector.
    ///
    /// The request was skipped and the stream is still usable.
    HandlerNotFound(Selector),

    /// Two bindings share a selector
    DuplicateSelector(Selector),

    /// A value could not be encoded
    SerializationFailed(ser_de::Error),

    /// The payload did not decode as the expected type
    DeserializationFailed(ser_de::Error),

    /// Unable to send data to the remote
    DataTransmissionFailed(ser_de::Error),

    /// Unable to receive data from the remote
    RemoteReceiveError(ser_de::Error),

    /// An unhandled request could not be skipped, the stream position is lost
    Desynchronized(ser_de::Error),

    /// The service loop was asked to stop
    Stopped,
}

impl InvokeError {
    /// Classify an encoding failure.
    pub fn from_write(e: ser_de::Error) -> Self {
        match e.is_transport() {
            true => Self::DataTransmissionFailed(e),
            false => Self::SerializationFailed(e),
        }
    }

    /// Classify a decoding failure.
    pub fn from_read(e: ser_de::Error) -> Self {
        match e.is_transport() {
            true => Self::RemoteReceiveError(e),
            false => Self::DeserializationFailed(e),
        }
    }

    /// Errors after which the stream cannot carry further requests.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::DataTransmissionFailed(_)
                | Self::RemoteReceiveError(_)
                | Self::Desynchronized(_)
                | Self::Stopped
        )
    }
}

impl std::error::Error for InvokeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SerializationFailed(e)
            | Self::DeserializationFailed(e)
            | Self::DataTransmissionFailed(e)
            | Self::RemoteReceiveError(e)
            | Self::Desynchronized(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for InvokeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HandlerNotFound(s) => write!(f, "no handler for selector {:#018x}", s),
            Self::DuplicateSelector(s) => write!(f, "selector {:#018x} is bound twice", s),
            Self::SerializationFailed(e) => write!(f, "serialization failed: {}", e),
            Self::DeserializationFailed(e) => write!(f, "deserialization failed: {}", e),
            Self::DataTransmissionFailed(e) => write!(f, "failed to send data: {}", e),
            Self::RemoteReceiveError(e) => write!(f, "failed to receive data: {}", e),
            Self::Desynchronized(e) => write!(f, "stream desynchronized: {}", e),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Folds a failed invocation into the application error of its reply.
///
/// ```
/// use tagwire_core::middleware::{InvokeError, InvokeResultExt};
///
/// #[derive(Debug, PartialEq)]
/// enum AppError {
///     Io,
/// }
///
/// impl From<InvokeError> for AppError {
///     fn from(_: InvokeError) -> Self {
///         AppError::Io
///     }
/// }
///
/// let call: Result<Result<u8, AppError>, InvokeError> = Err(InvokeError::Stopped);
/// assert_eq!(call.flatten_invoke(), Err(AppError::Io));
/// ```
pub trait InvokeResultExt<T, E> {
    fn flatten_invoke(self) -> Result<T, E>;
}

impl<T, E: From<InvokeError>> InvokeResultExt<T, E> for Result<Result<T, E>, InvokeError> {
    fn flatten_invoke(self) -> Result<T, E> {
        match self {
            Ok(reply) => reply,
            Err(e) => Err(e.into()),
        }
    }
}

/// Encoding and decoding ends of one connection.
///
/// Owns both streams; dropping the channel releases the transport.
#[derive(Debug)]
pub struct Channel<R: Reader, W: Writer> {
    serializer: Serializer<W>,
    deserializer: Deserializer<R>,
}

impl<R: Reader, W: Writer> Channel<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            serializer: Serializer::new(writer),
            deserializer: Deserializer::new(reader),
        }
    }

    /// Decode the next value.
    pub fn read<T: DeserializeOwned>(&mut self) -> Result<T, InvokeError> {
        T::deserialize(&mut self.deserializer).map_err(InvokeError::from_read)
    }

    /// Encode a value without flushing.
    pub fn write<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), InvokeError> {
        value
            .serialize(&mut self.serializer)
            .map_err(InvokeError::from_write)
    }

    pub fn flush(&mut self) -> Result<(), InvokeError> {
        self.serializer.flush().map_err(InvokeError::from_write)
    }

    /// Discard the next value without decoding more than `limit` bytes of it.
    pub fn skip_value(&mut self, limit: usize) -> Result<(), InvokeError> {
        let bounded = BoundedReader::new(self.deserializer.reader_mut(), limit);
        let mut de = Deserializer::new(bounded);

        IgnoredAny::deserialize(&mut de)
            .map(drop)
            .map_err(Self::lost_position)
    }

    /// Take the whole next value off the stream, then decode it as `T`.
    ///
    /// The value may span at most `limit` bytes. A value that does not decode
    /// as `T` fails with [InvokeError::DeserializationFailed] and leaves the
    /// stream on the following value.
    pub fn read_isolated<T: DeserializeOwned>(&mut self, limit: usize) -> Result<T, InvokeError> {
        let bounded = BoundedReader::new(self.deserializer.reader_mut(), limit);
        let mut capture = Deserializer::new(CaptureReader::new(bounded));
        IgnoredAny::deserialize(&mut capture).map_err(Self::lost_position)?;

        let (origin, bytes) = capture.into_inner().into_parts();
        let mut replay = ReplayReader::new(&bytes, origin);
        T::deserialize(&mut Deserializer::new(&mut replay)).map_err(InvokeError::from_read)
    }

    fn lost_position(e: ser_de::Error) -> InvokeError {
        match e.is_transport() {
            true => InvokeError::RemoteReceiveError(e),
            false => InvokeError::Desynchronized(e),
        }
    }

    pub fn into_inner(self) -> (R, W) {
        (self.deserializer.into_inner(), self.serializer.into_inner())
    }
}
