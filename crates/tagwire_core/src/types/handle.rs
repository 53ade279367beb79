//! Out-of-band resource handles.
//!
//! A [Handle] never puts its raw value on the wire. The writer records the raw
//! value in its handle table and the payload carries the returned reference;
//! the reader resolves the reference back through its own table. How the table
//! travels between processes is up to the transport.

use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::ser_de::consts::HANDLE_TOKEN;

const EMPTY_RAW: i32 = -1;

/// A raw descriptor value, `-1` when empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(i32);

impl Handle {
    pub fn new(raw: i32) -> Self {
        Self(raw)
    }

    pub fn empty() -> Self {
        Self(EMPTY_RAW)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == EMPTY_RAW
    }

    pub fn raw(&self) -> i32 {
        self.0
    }

    pub fn into_raw(self) -> i32 {
        self.0
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::empty()
    }
}

impl Serialize for Handle {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_newtype_struct(HANDLE_TOKEN, &self.0)
    }
}

impl<'de> Deserialize<'de> for Handle {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct HandleVisitor;

        impl<'de> de::Visitor<'de> for HandleVisitor {
            type Value = Handle;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a handle")
            }

            fn visit_newtype_struct<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
            where
                D: Deserializer<'de>,
            {
                i32::deserialize(deserializer).map(Handle)
            }
        }

        deserializer.deserialize_newtype_struct(HANDLE_TOKEN, HandleVisitor)
    }
}
