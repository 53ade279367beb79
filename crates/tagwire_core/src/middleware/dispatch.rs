//! Service side implementations.
//!
//! A [Dispatcher] owns one connection and a table of bound handlers keyed by
//! selector. Each cycle reads a selector, takes the argument tuple off the
//! stream, decodes it, calls the handler and writes its return value back.
//! Arguments that fail to decode cost one request, not the connection.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use super::{Channel, InvokeError};
use crate::{
    defaults,
    fsm::{ConnectionEvent, ConnectionState, TransitableState},
    interface::{InterfaceBindings, Method, Selector},
    stream::{Reader, Writer},
};

type Binding<H, R, W> = Box<
    dyn Fn(&mut H, &mut Channel<R, W>, &mut ConnectionState, usize) -> Result<(), InvokeError>
        + Send,
>;

struct BoundMethod<H, R: Reader, W: Writer> {
    name: &'static str,
    call: Binding<H, R, W>,
}

/// Dispatcher settings
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Used in log lines and as the service thread name
    pub name: String,

    /// Largest argument payload skipped for an unknown selector.
    ///
    /// Anything larger cannot be skipped and ends the connection.
    pub max_unhandled_payload: usize,

    /// Largest argument payload accepted for a bound method.
    ///
    /// Arguments are buffered whole before decoding, anything larger ends
    /// the connection.
    pub max_argument_payload: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            name: defaults::DEFAULT_SERVICE_NAME.to_string(),
            max_unhandled_payload: defaults::MAX_UNHANDLED_PAYLOAD,
            max_argument_payload: defaults::MAX_ARGUMENT_PAYLOAD,
        }
    }
}

/// Builds the dispatch table of a [Dispatcher].
pub struct DispatcherBuilder<H, R: Reader, W: Writer> {
    bindings: HashMap<Selector, BoundMethod<H, R, W>>,
    config: DispatcherConfig,
}

impl<H, R, W> DispatcherBuilder<H, R, W>
where
    H: 'static,
    R: Reader + 'static,
    W: Writer + 'static,
{
    pub fn new() -> Self {
        Self {
            bindings: HashMap::new(),
            config: DispatcherConfig::default(),
        }
    }

    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Bind a handler function to method `M`.
    pub fn bind<M, F>(mut self, handler: F) -> Result<Self, InvokeError>
    where
        M: Method,
        F: Fn(&mut H, M::Args) -> M::Reply + Send + 'static,
    {
        if self.bindings.contains_key(&M::SELECTOR) {
            return Err(InvokeError::DuplicateSelector(M::SELECTOR));
        }

        let call: Binding<H, R, W> = Box::new(
            move |receiver: &mut H,
                  channel: &mut Channel<R, W>,
                  state: &mut ConnectionState,
                  limit: usize|
                  -> Result<(), InvokeError> {
                let args = channel.read_isolated::<M::Args>(limit)?;
                state.ingest(ConnectionEvent::ArgumentsRead);

                let reply = handler(receiver, args);
                state.ingest(ConnectionEvent::HandlerReturned);

                channel.write(&reply)?;
                channel.flush()
            },
        );

        log::trace!("binding {}::{} ({:#018x})", M::INTERFACE, M::NAME, M::SELECTOR);
        self.bindings.insert(
            M::SELECTOR,
            BoundMethod {
                name: M::NAME,
                call,
            },
        );
        Ok(self)
    }

    /// Bind every method of interface `I`.
    pub fn bind_interface<I: InterfaceBindings<H>>(self) -> Result<Self, InvokeError> {
        log::debug!("binding interface {}", I::IDENTIFIER);
        I::bind_all(self)
    }

    /// Attach the table to a connection.
    pub fn build(self, reader: R, writer: W) -> Dispatcher<H, R, W> {
        Dispatcher {
            bindings: self.bindings,
            channel: Channel::new(reader, writer),
            state: ConnectionState::default(),
            config: self.config,
            stop: StopHandle::new(),
            cycles: 0,
        }
    }
}

impl<H, R, W> Default for DispatcherBuilder<H, R, W>
where
    H: 'static,
    R: Reader + 'static,
    W: Writer + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<H, R: Reader, W: Writer> fmt::Debug for DispatcherBuilder<H, R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherBuilder")
            .field("methods", &self.bindings.values().map(|b| b.name).collect::<Vec<_>>())
            .field("config", &self.config)
            .finish()
    }
}

/// The dispatcher for remote invocations.
///
/// The dispatcher routes each request on its connection to the bound
/// handler, one request at a time.
pub struct Dispatcher<H, R: Reader, W: Writer> {
    bindings: HashMap<Selector, BoundMethod<H, R, W>>,
    channel: Channel<R, W>,
    state: ConnectionState,
    config: DispatcherConfig,
    stop: StopHandle,
    cycles: u64,
}

impl<H, R: Reader, W: Writer> Dispatcher<H, R, W> {
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Handle used to stop [Self::serve] from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Run one request cycle, returning the selector that was served.
    ///
    /// An unknown selector has its arguments skipped and yields
    /// [InvokeError::HandlerNotFound] without a reply.
    pub fn handle_message(&mut self, handler: &mut H) -> Result<Selector, InvokeError> {
        if self.state.is_closed() {
            return Err(InvokeError::Stopped);
        }

        let res = self.cycle(handler);
        match &res {
            Ok(_) => (),
            Err(e) if e.is_fatal() => self.state.ingest(ConnectionEvent::Fail),
            Err(_) => self.state.ingest(ConnectionEvent::Abort),
        }
        self.cycles += 1;

        res
    }

    fn cycle(&mut self, handler: &mut H) -> Result<Selector, InvokeError> {
        self.state.ingest(ConnectionEvent::Begin);
        log::trace!("{}: awaiting request #{}", self.config.name, self.cycles);

        let selector = self.channel.read::<Selector>()?;
        self.state.ingest(ConnectionEvent::SelectorRead);

        let Some(method) = self.bindings.get(&selector) else {
            log::debug!(
                "{}: skipping request for unknown selector {:#018x}",
                self.config.name,
                selector
            );
            self.channel.skip_value(self.config.max_unhandled_payload)?;
            return Err(InvokeError::HandlerNotFound(selector));
        };

        log::debug!("{}: request #{} -> {}", self.config.name, self.cycles, method.name);
        (method.call)(
            handler,
            &mut self.channel,
            &mut self.state,
            self.config.max_argument_payload,
        )?;
        self.state.ingest(ConnectionEvent::ReplyWritten);

        Ok(selector)
    }

    /// Serve requests until stopped or the connection fails.
    ///
    /// Failed cycles are logged and the loop continues, unless the failure
    /// leaves the stream unusable. A deliberate stop returns `Ok(())`.
    pub fn serve(&mut self, handler: &mut H) -> Result<(), InvokeError> {
        log::info!("{}: serving", self.config.name);

        loop {
            if self.stop.is_stopped() {
                self.state.ingest(ConnectionEvent::Stop);
                log::info!("{}: stopped after {} requests", self.config.name, self.cycles);
                return Ok(());
            }

            match self.handle_message(handler) {
                Ok(_) => (),
                Err(e) if self.stop.is_stopped() => {
                    log::debug!("{}: request interrupted by stop: {}", self.config.name, e)
                }
                Err(e) if e.is_fatal() => {
                    log::error!("{}: connection lost: {}", self.config.name, e);
                    return Err(e);
                }
                Err(e) => log::error!("{}: failed to handle message: {}", self.config.name, e),
            }
        }
    }

    /// Release the streams.
    pub fn into_inner(self) -> (R, W) {
        self.channel.into_inner()
    }
}

impl<H, R: Reader, W: Writer> fmt::Debug for Dispatcher<H, R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("name", &self.config.name)
            .field("methods", &self.bindings.len())
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .finish()
    }
}

type StopHook = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct StopState {
    stopped: AtomicBool,
    hooks: Mutex<Vec<StopHook>>,
}

/// Cooperative stop signal for a service loop.
///
/// The flag is checked between request cycles. A read that is already
/// blocked only returns once the transport does, so hooks registered with
/// [StopHandle::on_stop] are run on stop to close it.
#[derive(Clone, Default)]
pub struct StopHandle {
    inner: Arc<StopState>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    /// Raise the flag and run the registered hooks once.
    pub fn stop(&self) {
        if self.inner.stopped.swap(true, Ordering::AcqRel) {
            return;
        }

        let hooks = std::mem::take(&mut *self.hooks());
        log::debug!("stop requested, running {} hooks", hooks.len());
        for hook in hooks {
            hook();
        }
    }

    /// Register a hook to run on stop, for example shutting down a socket.
    ///
    /// Runs immediately if the handle is already stopped.
    pub fn on_stop(&self, hook: impl FnOnce() + Send + 'static) {
        let mut hooks = self.hooks();
        if self.is_stopped() {
            drop(hooks);
            hook();
            return;
        }
        hooks.push(Box::new(hook));
    }

    fn hooks(&self) -> MutexGuard<'_, Vec<StopHook>> {
        self.inner
            .hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopHandle")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use super::*;
    use crate::{
        ser_de::{self, serialize_into},
        stream::{BufferReader, BufferWriter, StreamReader},
    };

    #[derive(Debug, Default)]
    struct Counter {
        total: i64,
    }

    struct Add;

    impl Method for Add {
        const INTERFACE: &'static str = "io.example.Counter";
        const NAME: &'static str = "add";
        type Args = (i64,);
        type Reply = i64;
    }

    struct Reset;

    impl Method for Reset {
        const INTERFACE: &'static str = "io.example.Counter";
        const NAME: &'static str = "reset";
        type Args = ();
        type Reply = Result<(), u8>;
    }

    fn builder<R: Reader + 'static>() -> DispatcherBuilder<Counter, R, BufferWriter> {
        DispatcherBuilder::new()
            .bind::<Add, _>(|counter: &mut Counter, (n,)| {
                counter.total += n;
                counter.total
            })
            .unwrap()
            .bind::<Reset, _>(|counter: &mut Counter, ()| {
                counter.total = 0;
                Ok(())
            })
            .unwrap()
    }

    type Input = StreamReader<io::Cursor<Vec<u8>>>;

    fn input(requests: BufferWriter) -> Input {
        StreamReader::new(io::Cursor::new(requests.into_inner()))
    }

    fn request<A: serde::Serialize>(writer: &mut BufferWriter, selector: Selector, args: &A) {
        serialize_into(&selector, &mut *writer).unwrap();
        serialize_into(args, &mut *writer).unwrap();
    }

    #[test]
    fn test_dispatch_cycles() {
        let _ = pretty_env_logger::try_init();

        let mut requests = BufferWriter::new();
        request(&mut requests, Add::SELECTOR, &(5i64,));
        request(&mut requests, Add::SELECTOR, &(-2i64,));
        request(&mut requests, Reset::SELECTOR, &());

        let mut counter = Counter::default();
        let mut dispatcher = builder().build(input(requests), BufferWriter::new());

        assert_eq!(dispatcher.handle_message(&mut counter).unwrap(), Add::SELECTOR);
        assert_eq!(dispatcher.handle_message(&mut counter).unwrap(), Add::SELECTOR);
        assert_eq!(counter.total, 3);
        assert_eq!(dispatcher.state(), ConnectionState::Idle);
        dispatcher.handle_message(&mut counter).unwrap();
        assert_eq!(counter.total, 0);

        let (_, replies) = dispatcher.into_inner();
        let mut reader = BufferReader::new(replies.as_bytes());
        assert_eq!(ser_de::deserialize_from::<i64, _>(&mut reader).unwrap(), 5);
        assert_eq!(ser_de::deserialize_from::<i64, _>(&mut reader).unwrap(), 3);
        assert_eq!(
            ser_de::deserialize_from::<Result<(), u8>, _>(&mut reader).unwrap(),
            Ok(())
        );
    }

    #[test]
    fn test_unknown_selector_keeps_stream_aligned() {
        let mut requests = BufferWriter::new();
        request(&mut requests, 0xdead_beef, &("unknown", vec![1u32, 2, 3], Some(4u8)));
        request(&mut requests, Add::SELECTOR, &(7i64,));

        let mut counter = Counter::default();
        let mut dispatcher = builder().build(input(requests), BufferWriter::new());

        assert!(matches!(
            dispatcher.handle_message(&mut counter),
            Err(InvokeError::HandlerNotFound(0xdead_beef))
        ));
        assert_eq!(dispatcher.state(), ConnectionState::Idle);
        assert_eq!(dispatcher.handle_message(&mut counter).unwrap(), Add::SELECTOR);
        assert_eq!(counter.total, 7);

        // no reply was written for the unknown request
        let (_, replies) = dispatcher.into_inner();
        assert_eq!(replies.as_bytes(), ser_de::serialize(&7i64).unwrap().as_slice());
    }

    #[test]
    fn test_oversized_unknown_request_is_fatal() {
        let mut requests = BufferWriter::new();
        request(&mut requests, 1, &vec![0u64; 32]);

        let config = DispatcherConfig {
            max_unhandled_payload: 64,
            ..Default::default()
        };
        let mut counter = Counter::default();
        let mut dispatcher = builder()
            .config(config)
            .build(input(requests), BufferWriter::new());

        let err = dispatcher.handle_message(&mut counter).unwrap_err();
        assert!(matches!(err, InvokeError::Desynchronized(_)));
        assert!(err.is_fatal());
        assert!(dispatcher.state().is_closed());
        assert!(matches!(
            dispatcher.handle_message(&mut counter),
            Err(InvokeError::Stopped)
        ));
    }

    #[test]
    fn test_duplicate_selector() {
        let res = builder::<Input>().bind::<Add, _>(|_: &mut Counter, _| 0);
        assert!(matches!(res, Err(InvokeError::DuplicateSelector(s)) if s == Add::SELECTOR));
    }

    #[test]
    fn test_bad_arguments_are_not_fatal() {
        let mut requests = BufferWriter::new();
        request(&mut requests, Add::SELECTOR, &("not a number",));
        request(&mut requests, Add::SELECTOR, &(1i64,));

        let mut counter = Counter::default();
        let mut dispatcher = builder().build(input(requests), BufferWriter::new());

        let err = dispatcher.handle_message(&mut counter).unwrap_err();
        assert!(matches!(err, InvokeError::DeserializationFailed(_)));
        assert!(!err.is_fatal());
        assert_eq!(dispatcher.state(), ConnectionState::Idle);

        // the rejected arguments were consumed, the next request is intact
        assert_eq!(dispatcher.handle_message(&mut counter).unwrap(), Add::SELECTOR);
        assert_eq!(counter.total, 1);

        let (_, replies) = dispatcher.into_inner();
        assert_eq!(replies.as_bytes(), ser_de::serialize(&1i64).unwrap().as_slice());
    }

    #[test]
    fn test_bad_arguments_while_serving() {
        let mut requests = BufferWriter::new();
        request(&mut requests, Add::SELECTOR, &(vec!["x"; 3], 1.5f64));
        request(&mut requests, Add::SELECTOR, &(4i64,));
        request(&mut requests, Reset::SELECTOR, &(9u8,));
        request(&mut requests, Add::SELECTOR, &(6i64,));

        let mut counter = Counter::default();
        let mut dispatcher = builder().build(input(requests), BufferWriter::new());

        let res = dispatcher.serve(&mut counter);
        assert!(matches!(res, Err(InvokeError::RemoteReceiveError(_))));
        assert_eq!(counter.total, 10);
    }

    #[test]
    fn test_oversized_arguments_are_fatal() {
        let mut requests = BufferWriter::new();
        request(&mut requests, Add::SELECTOR, &(vec![7u64; 32],));

        let config = DispatcherConfig {
            max_argument_payload: 16,
            ..Default::default()
        };
        let mut counter = Counter::default();
        let mut dispatcher = builder()
            .config(config)
            .build(input(requests), BufferWriter::new());

        assert!(matches!(
            dispatcher.handle_message(&mut counter),
            Err(InvokeError::Desynchronized(_))
        ));
        assert!(dispatcher.state().is_closed());
    }

    #[test]
    fn test_serve_until_transport_ends() {
        let mut requests = BufferWriter::new();
        request(&mut requests, Add::SELECTOR, &(2i64,));
        request(&mut requests, 99, &"skipped");
        request(&mut requests, Add::SELECTOR, &(3i64,));

        let mut counter = Counter::default();
        let mut dispatcher = builder().build(input(requests), BufferWriter::new());

        let res = dispatcher.serve(&mut counter);
        assert!(matches!(res, Err(InvokeError::RemoteReceiveError(_))));
        assert_eq!(counter.total, 5);
    }

    #[test]
    fn test_stopped_before_serving() {
        let mut counter = Counter::default();
        let mut dispatcher = builder().build(input(BufferWriter::new()), BufferWriter::new());

        let stop = dispatcher.stop_handle();
        stop.stop();
        assert!(dispatcher.serve(&mut counter).is_ok());
        assert!(dispatcher.state().is_closed());
    }

    #[test]
    fn test_stop_hooks_run_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let stop = StopHandle::new();

        let counted = runs.clone();
        stop.on_stop(move || {
            counted.fetch_add(1, Ordering::SeqCst);
        });
        stop.stop();
        stop.stop();
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        // late hooks run right away
        let counted = runs.clone();
        stop.clone().on_stop(move || {
            counted.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}
