//! The client-side middleware module

use super::{Channel, InvokeError};
use crate::{
    interface::Method,
    stream::{Reader, Writer},
};

/// The context manager for the client.
///
/// The context manager carries invocations to its service-side counterpart,
/// the dispatcher, and waits for each reply before returning. Calls are
/// strictly sequential; the reply read is blocking.
#[derive(Debug)]
pub struct ContextManager<R: Reader, W: Writer> {
    channel: Channel<R, W>,

    /// Number of invocations sent so far
    invocations: u64,
}

impl<R: Reader, W: Writer> ContextManager<R, W> {
    /// Create a new context manager over a reply stream and a request stream.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            channel: Channel::new(reader, writer),
            invocations: 0,
        }
    }

    /// Send an invocation to the remote, and returns the reply.
    pub fn invoke<M: Method>(&mut self, args: M::Args) -> Result<M::Reply, InvokeError> {
        log::debug!(
            "invocation #{}: {}::{} ({:#018x})",
            self.invocations,
            M::INTERFACE,
            M::NAME,
            M::SELECTOR
        );
        self.invocations += 1;

        self.channel.write(&M::SELECTOR)?;
        self.channel.write(&args)?;
        self.channel.flush()?;

        self.channel.read::<M::Reply>().map_err(|e| {
            log::error!("{}::{} failed: {}", M::INTERFACE, M::NAME, e);
            e
        })
    }

    pub fn invocations(&self) -> u64 {
        self.invocations
    }

    /// Release the streams.
    pub fn into_inner(self) -> (R, W) {
        self.channel.into_inner()
    }
}
