//! Running a dispatcher on its own thread.

use std::{
    io,
    thread::{self, JoinHandle},
};

use super::{Dispatcher, InvokeError, StopHandle};
use crate::stream::{Reader, Writer};

/// Handler state and loop outcome returned by a finished service thread.
pub type ServiceOutcome<H> = (H, Result<(), InvokeError>);

/// A dispatcher serving one connection on a dedicated thread.
#[derive(Debug)]
pub struct ServiceHandle<H> {
    name: String,
    stop: StopHandle,
    thread: JoinHandle<ServiceOutcome<H>>,
}

/// Serve `dispatcher` with `handler` on a new thread named after the service.
///
/// The streams are dropped when the loop ends, which closes the transport.
pub fn spawn<H, R, W>(mut dispatcher: Dispatcher<H, R, W>, mut handler: H) -> io::Result<ServiceHandle<H>>
where
    H: Send + 'static,
    R: Reader + Send + 'static,
    W: Writer + Send + 'static,
{
    let name = dispatcher.config().name.clone();
    let stop = dispatcher.stop_handle();

    let thread = thread::Builder::new().name(name.clone()).spawn(move || {
        let res = dispatcher.serve(&mut handler);
        drop(dispatcher);
        (handler, res)
    })?;

    log::debug!("{}: service thread started", name);
    Ok(ServiceHandle { name, stop, thread })
}

impl<H> ServiceHandle<H> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Request a stop and wait for the loop to end.
    pub fn stop(self) -> thread::Result<ServiceOutcome<H>> {
        self.stop.stop();
        self.join()
    }

    /// Wait for the loop to end on its own.
    pub fn join(self) -> thread::Result<ServiceOutcome<H>> {
        let outcome = self.thread.join();
        log::debug!("{}: service thread joined", self.name);
        outcome
    }
}
