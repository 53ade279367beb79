//! Interface and method descriptors.
//!
//! An interface is a named, immutable set of methods. Each method is identified
//! on the wire by its [Selector], a 64-bit FNV-1a hash of
//! `"<interface identifier>::<method name>"`. The hash is computed at compile
//! time, so independently built senders and receivers agree on it.
//!
//! These traits are implemented by the `#[interface]` attribute; implementing
//! them by hand is possible but rarely needed.

use serde::{de::DeserializeOwned, Serialize};

use crate::{
    middleware::{DispatcherBuilder, InvokeError},
    stream::{Reader, Writer},
};

/// Method identifier carried at the start of every request.
pub type Selector = u64;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

const fn fnv1a(mut hash: u64, bytes: &[u8]) -> u64 {
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hash
}

/// Selector of `method` in the interface `interface`.
pub const fn selector(interface: &str, method: &str) -> Selector {
    let hash = fnv1a(FNV_OFFSET_BASIS, interface.as_bytes());
    let hash = fnv1a(hash, b"::");
    fnv1a(hash, method.as_bytes())
}

/// A remotely callable method.
pub trait Method: 'static {
    /// Identifier of the interface the method belongs to
    const INTERFACE: &'static str;

    const NAME: &'static str;

    const SELECTOR: Selector = selector(Self::INTERFACE, Self::NAME);

    /// Argument tuple, in declaration order.
    type Args: Serialize + DeserializeOwned;

    /// Reply value, usually a `Result` carrying an application error code.
    type Reply: Serialize + DeserializeOwned;

    fn descriptor() -> MethodDescriptor {
        MethodDescriptor {
            name: Self::NAME,
            selector: Self::SELECTOR,
        }
    }
}

/// Name and selector of one method of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    pub name: &'static str,
    pub selector: Selector,
}

/// A named set of methods.
pub trait Interface {
    const IDENTIFIER: &'static str;

    /// Methods in declaration order
    const METHODS: &'static [MethodDescriptor];

    /// Look up a method of this interface by selector.
    fn method(selector: Selector) -> Option<&'static MethodDescriptor> {
        Self::METHODS.iter().find(|m| m.selector == selector)
    }
}

/// Binds every method of an interface to a handler of type `H`.
pub trait InterfaceBindings<H: 'static>: Interface {
    fn bind_all<R, W>(
        builder: DispatcherBuilder<H, R, W>,
    ) -> Result<DispatcherBuilder<H, R, W>, InvokeError>
    where
        R: Reader + 'static,
        W: Writer + 'static;
}
