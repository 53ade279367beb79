//! Encoding engine, stream contract, variant runtime and RPC middleware.
//!
//! Values are written as a sequence of tagged objects: every object starts
//! with a prefix byte naming its type, so a reader can decode or skip any
//! value without knowing its schema.

pub mod fsm;
pub mod interface;
pub mod middleware;
pub mod ser_de;
pub mod stream;
pub mod types;

/// Default limits and names shared by both ends of a connection.
pub mod defaults {

    /// Deepest container nesting a deserializer accepts
    pub const MAX_NESTING_DEPTH: usize = 128;

    /// Largest argument payload a dispatcher skips for an unknown selector
    pub const MAX_UNHANDLED_PAYLOAD: usize = 64 * 1024;

    /// Largest argument payload a dispatcher takes for a bound method
    pub const MAX_ARGUMENT_PAYLOAD: usize = 16 * 1024 * 1024;

    /// Name given to dispatchers and their service threads
    pub const DEFAULT_SERVICE_NAME: &str = "tagwire-service";
}
