//! Value types with a dedicated wire form.

mod handle;
mod logical_buffer;
mod result;
mod variant;

pub use handle::Handle;
pub use logical_buffer::{BufferSize, LogicalBuffer, LogicalBufferRef, LogicalBufferSeed};
pub use result::{ErrorKind, ResultExt};
pub use variant::{
    Alternative, AnyVariant, At, ConvertSet, DynVariant, EmptyVariant, IfAnyOf, Select, TypeSet,
    Variant1, Variant2, Variant3, Variant4, Variant5, Variant6, Variant7, Variant8, Visit,
    VisitMut, VisitOwned, VisitRef, VisitSet,
};
