//! Finite state machine

use std::fmt::Debug;

/// C-enums that implement this trait can undergo state machine transitions.
///
/// There are no outputs during state transitions, just changes in state.
pub trait TransitableState: Clone + Copy + Debug + Default {
    /// Events that can trigger a change in state.
    type Event;

    /// Process the input and modify the internal state, if applicable.
    ///
    /// Use the [state_transitions!] macro to implement this trait.
    fn ingest(&mut self, event: Self::Event);
}

/// Generate the state transition logic.
///
/// This macro implements [TransitableState::ingest]. Events with no listed
/// transition leave the state unchanged.
///
/// ```
/// use tagwire_core::fsm::TransitableState;
/// use tagwire_core::state_transitions;
///
/// #[derive(Clone, Copy, Debug, Default, PartialEq)]
/// enum Door {
///     #[default]
///     Closed,
///     Open,
///     Locked,
/// }
///
/// enum DoorEvent {
///     Push,
///     Pull,
///     Turn,
/// }
///
/// state_transitions! {
///     type State = Door;
///     type Event = DoorEvent;
///
///     Closed + Push => Open;
///     Open + Pull => Closed;
///     Closed + Turn => Locked;
///     Locked + Turn => Closed;
/// }
///
/// let mut door = Door::default();
/// door.ingest(DoorEvent::Turn);
/// door.ingest(DoorEvent::Push);
/// assert_eq!(door, Door::Locked);
/// ```
#[macro_export]
macro_rules! state_transitions {
    {
        type State = $st: ident;
        type Event = $ev: ident;

        $($st_variant: ident + $($ev_variant: ident)|+ => $new_st: ident;)*
    } => {

        impl $crate::fsm::TransitableState for $st {
            type Event = $ev;

            #[allow(unreachable_patterns)]
            fn ingest(&mut self, event: Self::Event) {

                *self = match (*self, event) {

                    $(
                        ($st::$st_variant, $($ev::$ev_variant)|+) => $st::$new_st,
                    )*

                    // all other cases
                    _ => *self,
                };

            }
        }
    };
}

/// Position of a connection within one request cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Idle,
    ReadingSelector,
    ReadingArguments,
    Dispatching,
    WritingReply,

    /// The stream can no longer be used
    Closed,
}

/// Progress reported by the dispatcher during a request cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Start waiting for a request
    Begin,
    SelectorRead,
    ArgumentsRead,
    HandlerReturned,
    ReplyWritten,

    /// Give up on the current request, the stream is still aligned
    Abort,

    /// A transport failure or lost stream position
    Fail,

    /// Deliberate shutdown between cycles
    Stop,
}

state_transitions! {
    type State = ConnectionState;
    type Event = ConnectionEvent;

    Idle + Begin => ReadingSelector;
    ReadingSelector + SelectorRead => ReadingArguments;
    ReadingArguments + ArgumentsRead => Dispatching;
    Dispatching + HandlerReturned => WritingReply;
    WritingReply + ReplyWritten => Idle;

    ReadingSelector + Abort => Idle;
    ReadingArguments + Abort => Idle;
    Dispatching + Abort => Idle;
    WritingReply + Abort => Idle;

    Idle + Fail | Stop => Closed;
    ReadingSelector + Fail | Stop => Closed;
    ReadingArguments + Fail => Closed;
    Dispatching + Fail => Closed;
    WritingReply + Fail => Closed;
}

impl ConnectionState {
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}
