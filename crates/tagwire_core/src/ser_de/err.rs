//! Error implementations

use serde::{de, ser};

use super::consts::EncodingByte;

pub type SerDeResult<T> = std::result::Result<T, Error>;

/// Custom error object for this library
#[derive(Debug)]
pub enum Error {
    /// The underlying transport failed
    Io(std::io::Error),
    /// A read or write went past the end of a buffer or a bounded stream
    BufferExhausted { requested: usize, remaining: usize },
    /// A declared element count or byte length does not fit its destination
    InvalidContainerLength,
    /// A structure carried a different number of fields than its declaration
    InvalidMemberCount { expected: usize, found: usize },
    /// The prefix byte is not valid for the type being decoded
    PrefixNotMatched {
        expected: &'static str,
        found: EncodingByte,
    },
    InvalidStringEncoding,
    InvalidCharacter(u32),
    InvalidVariantIndex(i64),
    /// Integer elements of an integer sequence had mixed widths
    HeterogeneousElements,
    /// `Some` around a value that encodes as nil, which would decode as `None`
    AmbiguousOption,
    UnsupportedType(&'static str),
    HandlesUnsupported,
    InvalidHandleReference(i64),
    DepthLimitExceeded,
    Custom(String),
}

impl Error {
    /// Connection problems, as opposed to malformed payloads.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    /// Payloads that declared more data than the destination or the stream allows.
    pub fn is_bounds(&self) -> bool {
        matches!(
            self,
            Self::BufferExhausted { .. } | Self::InvalidContainerLength
        )
    }

    pub(crate) fn prefix(expected: &'static str, found: EncodingByte) -> Self {
        Self::PrefixNotMatched { expected, found }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl ser::Error for Error {
    fn custom<T>(msg: T) -> Self
    where
        T: std::fmt::Display,
    {
        Self::Custom(msg.to_string())
    }
}

impl de::Error for Error {
    fn custom<T>(msg: T) -> Self
    where
        T: std::fmt::Display,
    {
        Self::Custom(msg.to_string())
    }

    // fixed-size targets (arrays, tuples, logical buffers) report overruns here
    fn invalid_length(_len: usize, _exp: &dyn de::Expected) -> Self {
        Self::InvalidContainerLength
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io error: {}", e),
            Self::BufferExhausted {
                requested,
                remaining,
            } => write!(
                f,
                "buffer exhausted: requested {} bytes, {} remaining",
                requested, remaining
            ),
            Self::InvalidContainerLength => write!(f, "invalid container length"),
            Self::InvalidMemberCount { expected, found } => write!(
                f,
                "invalid member count: expected {}, found {}",
                expected, found
            ),
            Self::PrefixNotMatched { expected, found } => {
                write!(f, "expected {} prefix, found {}", expected, found)
            }
            Self::InvalidStringEncoding => write!(f, "string is not valid utf-8"),
            Self::InvalidCharacter(c) => write!(f, "invalid character: 0x{:x}", c),
            Self::InvalidVariantIndex(i) => write!(f, "invalid variant index: {}", i),
            Self::HeterogeneousElements => write!(f, "integer sequence elements differ in width"),
            Self::AmbiguousOption => write!(f, "optional value encodes as nil"),
            Self::UnsupportedType(t) => write!(f, "unsupported type: {}", t),
            Self::HandlesUnsupported => write!(f, "stream does not carry handles"),
            Self::InvalidHandleReference(r) => write!(f, "invalid handle reference: {}", r),
            Self::DepthLimitExceeded => write!(f, "nesting depth limit exceeded"),
            Self::Custom(msg) => f.write_str(msg),
        }
    }
}
