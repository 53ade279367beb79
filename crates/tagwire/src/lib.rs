//! Binary object serialization and typed RPC interfaces.
//!
//! Values are encoded with serde into a self-describing binary format (see
//! [ser_de]). Interfaces are declared as plain traits with the [interface]
//! attribute, served by a [middleware::Dispatcher] and called through a
//! [middleware::ContextManager]:
//!
//! ```
//! use std::os::unix::net::UnixStream;
//!
//! use tagwire::prelude::*;
//!
//! #[interface("io.example.Calculator")]
//! pub trait Calculator {
//!     fn add(left: i64, right: i64) -> i64;
//! }
//!
//! struct Adder;
//!
//! impl Calculator for Adder {
//!     fn add(&mut self, left: i64, right: i64) -> i64 {
//!         left + right
//!     }
//! }
//!
//! let (client, server) = UnixStream::pair().unwrap();
//! let dispatcher = DispatcherBuilder::<Adder, _, _>::new()
//!     .bind_interface::<CalculatorApi>()
//!     .unwrap()
//!     .build(
//!         StreamReader::new(server.try_clone().unwrap()),
//!         StreamWriter::new(server),
//!     );
//! let service = service::spawn(dispatcher, Adder).unwrap();
//!
//! let mut ctx = ContextManager::new(
//!     StreamReader::new(client.try_clone().unwrap()),
//!     StreamWriter::new(client),
//! );
//! assert_eq!(CalculatorClient::add(&mut ctx, 2, 3).unwrap(), 5);
//!
//! // closing the client ends the service loop
//! drop(ctx);
//! let (_, res) = service.join().unwrap();
//! assert!(res.is_err());
//! ```

extern crate self as tagwire;

pub use tagwire_core::{
    defaults, fsm, interface, middleware, ser_de, state_transitions, stream, types,
};
pub use tagwire_macros::interface;

/// Commonly used items, for glob imports.
pub mod prelude {
    pub use crate::interface;
    pub use tagwire_core::{
        interface::{Interface, InterfaceBindings, Method, MethodDescriptor, Selector},
        middleware::{
            service, ContextManager, Dispatcher, DispatcherBuilder, DispatcherConfig,
            InvokeError, InvokeResultExt, StopHandle,
        },
        ser_de::{deserialize, deserialize_from, serialize, serialize_into},
        stream::{BufferReader, BufferWriter, Reader, StreamReader, StreamWriter, Writer},
        types::{ErrorKind, Handle, ResultExt},
    };
}

#[cfg(test)]
mod tests;
