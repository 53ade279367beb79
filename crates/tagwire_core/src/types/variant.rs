//! Closed tagged unions over a fixed list of alternatives.
//!
//! `VariantN<T0, .., Tn-1>` is either empty or holds exactly one alternative.
//! Alternatives are selected by type through [Select]; the index parameter of
//! `Select<T, I>` is inferred, so a type listed twice cannot be selected by type
//! and has to be addressed by index through [Alternative] instead.
//!
//! On the wire a variant is its signed index (`-1` when empty) followed by the
//! active alternative.
//!
//! ```
//! use tagwire_core::types::{Variant3, Visit, VisitRef};
//!
//! struct Describe;
//!
//! impl Visit for Describe {
//!     type Output = String;
//!
//!     fn empty(&mut self) -> String {
//!         "nothing".into()
//!     }
//! }
//!
//! impl<T: std::fmt::Debug> VisitRef<T> for Describe {
//!     fn visit_ref(&mut self, value: &T) -> String {
//!         format!("{:?}", value)
//!     }
//! }
//!
//! let mut v = Variant3::<i32, String, bool>::default();
//! assert_eq!(v.visit(&mut Describe), "nothing");
//!
//! v.set("hello".to_string());
//! assert_eq!(v.index(), Some(1));
//! assert_eq!(v.visit(&mut Describe), "\"hello\"");
//! ```

use std::{
    any::{Any, TypeId},
    fmt,
    marker::PhantomData,
};

use serde::{
    de::{self, Deserialize, Deserializer, EnumAccess, Unexpected, VariantAccess, Visitor},
    ser::{Serialize, Serializer},
};

use crate::ser_de::consts::EMPTY_VARIANT_INDEX_U32;

/// Index marker for [Select].
pub struct At<const N: usize>;

/// The empty state, assignable to any variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EmptyVariant;

impl fmt::Display for EmptyVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("variant is empty")
    }
}

impl std::error::Error for EmptyVariant {}

/// Operations shared by every variant, independent of its alternatives.
pub trait AnyVariant: Sized {
    /// Number of alternatives
    const ALTERNATIVES: usize;

    fn empty() -> Self;

    /// Index of the active alternative, `None` when empty.
    fn index(&self) -> Option<usize>;

    /// Drop the active alternative, if any.
    fn clear(&mut self);
}

/// Selects the alternative of type `T`, found at index `I`.
pub trait Select<T, I>: AnyVariant {
    const INDEX: usize;

    fn select(value: T) -> Self;

    /// Assign in place when `T` is already active, otherwise replace the active alternative.
    fn assign(&mut self, value: T);

    fn peek(&self) -> Option<&T>;

    fn peek_mut(&mut self) -> Option<&mut T>;

    /// Move the value out if `T` is active, leaving the variant empty.
    fn extract(&mut self) -> Option<T>;
}

/// The alternative at index `N`.
pub trait Alternative<const N: usize>: AnyVariant {
    type Type;

    fn wrap(value: Self::Type) -> Self;

    fn alternative(&self) -> Option<&Self::Type>;

    fn alternative_mut(&mut self) -> Option<&mut Self::Type>;
}

/// Base of the visitor traits: what an empty variant produces.
pub trait Visit {
    type Output;

    fn empty(&mut self) -> Self::Output;
}

pub trait VisitRef<T>: Visit {
    fn visit_ref(&mut self, value: &T) -> Self::Output;
}

pub trait VisitMut<T>: Visit {
    fn visit_mut(&mut self, value: &mut T) -> Self::Output;
}

pub trait VisitOwned<T>: Visit {
    fn visit_owned(&mut self, value: T) -> Self::Output;
}

/// Type-erased access to the active alternative.
///
/// Implemented for variants whose alternatives are all `'static`.
pub trait DynVariant: AnyVariant {
    fn active_any(&self) -> Option<&dyn Any>;

    fn active_any_mut(&mut self) -> Option<&mut dyn Any>;

    /// Move the active alternative out, leaving the variant empty.
    fn take_any(&mut self) -> Option<Box<dyn Any>>;
}

macro_rules! variant {
    (
        $(#[$meta: meta])*
        $name: ident $generics: tt {
            $($alt: ident ($ty: ident, $idx: ident) = $n: tt),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum $name<$($ty),+> {
            Empty,
            $($alt($ty)),+
        }

        $(variant!(@alternative $name $generics $alt $ty $n);)+

        impl<$($ty),+> Default for $name<$($ty),+> {
            fn default() -> Self {
                Self::Empty
            }
        }

        impl<$($ty),+> From<EmptyVariant> for $name<$($ty),+> {
            fn from(_: EmptyVariant) -> Self {
                Self::Empty
            }
        }

        impl<$($ty),+> AnyVariant for $name<$($ty),+> {
            const ALTERNATIVES: usize = [$($n),+].len();

            fn empty() -> Self {
                Self::Empty
            }

            fn index(&self) -> Option<usize> {
                $name::index(self)
            }

            fn clear(&mut self) {
                $name::clear(self)
            }
        }

        impl<$($ty),+> $name<$($ty),+> {
            pub fn new() -> Self {
                Self::Empty
            }

            pub fn from_value<T, I>(value: T) -> Self
            where
                Self: Select<T, I>,
            {
                <Self as Select<T, I>>::select(value)
            }

            /// Index of the active alternative, `None` when empty.
            pub fn index(&self) -> Option<usize> {
                match self {
                    Self::Empty => None,
                    $(Self::$alt(_) => Some($n)),+
                }
            }

            /// Index at which type `T` lives in this variant.
            pub fn index_of<T, I>() -> usize
            where
                Self: Select<T, I>,
            {
                <Self as Select<T, I>>::INDEX
            }

            pub fn is_empty(&self) -> bool {
                matches!(self, Self::Empty)
            }

            /// Drop the active alternative, if any.
            pub fn clear(&mut self) {
                *self = Self::Empty;
            }

            pub fn is<T, I>(&self) -> bool
            where
                Self: Select<T, I>,
            {
                self.index() == Some(<Self as Select<T, I>>::INDEX)
            }

            pub fn set<T, I>(&mut self, value: T)
            where
                Self: Select<T, I>,
            {
                <Self as Select<T, I>>::assign(self, value)
            }

            /// Convert `value` into the explicitly named alternative `U` and assign it.
            pub fn set_converted<U, I>(&mut self, value: impl Into<U>)
            where
                Self: Select<U, I>,
            {
                <Self as Select<U, I>>::assign(self, value.into())
            }

            pub fn get<T, I>(&self) -> Option<&T>
            where
                Self: Select<T, I>,
            {
                <Self as Select<T, I>>::peek(self)
            }

            pub fn get_mut<T, I>(&mut self) -> Option<&mut T>
            where
                Self: Select<T, I>,
            {
                <Self as Select<T, I>>::peek_mut(self)
            }

            pub fn take<T, I>(&mut self) -> Option<T>
            where
                Self: Select<T, I>,
            {
                <Self as Select<T, I>>::extract(self)
            }

            pub fn get_at<const N: usize>(&self) -> Option<&<Self as Alternative<N>>::Type>
            where
                Self: Alternative<N>,
            {
                <Self as Alternative<N>>::alternative(self)
            }

            pub fn get_at_mut<const N: usize>(
                &mut self,
            ) -> Option<&mut <Self as Alternative<N>>::Type>
            where
                Self: Alternative<N>,
            {
                <Self as Alternative<N>>::alternative_mut(self)
            }

            /// Switch to a default-constructed alternative `index`.
            ///
            /// No-op when `index` is already active. An out-of-range index leaves the variant empty.
            pub fn become_default(&mut self, index: usize)
            where
                $($ty: Default,)+
            {
                if self.index() == Some(index) {
                    return;
                }

                self.clear();
                *self = match index {
                    $($n => Self::$alt(<$ty>::default()),)+
                    _ => Self::Empty,
                };
            }

            /// Switch to alternative `N`, built by `ctor` once the previous alternative is gone.
            pub fn become_with<const N: usize>(
                &mut self,
                ctor: impl FnOnce() -> <Self as Alternative<N>>::Type,
            ) where
                Self: Alternative<N>,
            {
                if self.index() == Some(N) {
                    return;
                }

                self.clear();
                *self = <Self as Alternative<N>>::wrap(ctor());
            }

            pub fn visit<V>(&self, visitor: &mut V) -> V::Output
            where
                V: Visit $(+ VisitRef<$ty>)+,
            {
                match self {
                    Self::Empty => visitor.empty(),
                    $(Self::$alt(value) => <V as VisitRef<$ty>>::visit_ref(visitor, value)),+
                }
            }

            pub fn visit_mut<V>(&mut self, visitor: &mut V) -> V::Output
            where
                V: Visit $(+ VisitMut<$ty>)+,
            {
                match self {
                    Self::Empty => visitor.empty(),
                    $(Self::$alt(value) => <V as VisitMut<$ty>>::visit_mut(visitor, value)),+
                }
            }

            pub fn visit_owned<V>(self, visitor: &mut V) -> V::Output
            where
                V: Visit $(+ VisitOwned<$ty>)+,
            {
                match self {
                    Self::Empty => visitor.empty(),
                    $(Self::$alt(value) => <V as VisitOwned<$ty>>::visit_owned(visitor, value)),+
                }
            }

            /// Convert into a variant over a different alternative list.
            ///
            /// Every alternative of `self` must be selectable in `D`.
            pub fn convert_into<D, $($idx),+>(self) -> D
            where
                D: AnyVariant $(+ Select<$ty, $idx>)+,
            {
                match self {
                    Self::Empty => D::empty(),
                    $(Self::$alt(value) => <D as Select<$ty, $idx>>::select(value)),+
                }
            }

            /// Assign the active value into `dest`, as [Self::set] would.
            pub fn assign_into<D, $($idx),+>(self, dest: &mut D)
            where
                D: AnyVariant $(+ Select<$ty, $idx>)+,
            {
                match self {
                    Self::Empty => dest.clear(),
                    $(Self::$alt(value) => <D as Select<$ty, $idx>>::assign(dest, value)),+
                }
            }
        }

        impl<$($ty: 'static),+> DynVariant for $name<$($ty),+> {
            fn active_any(&self) -> Option<&dyn Any> {
                match self {
                    Self::Empty => None,
                    $(Self::$alt(value) => Some(value as &dyn Any)),+
                }
            }

            fn active_any_mut(&mut self) -> Option<&mut dyn Any> {
                match self {
                    Self::Empty => None,
                    $(Self::$alt(value) => Some(value as &mut dyn Any)),+
                }
            }

            fn take_any(&mut self) -> Option<Box<dyn Any>> {
                match std::mem::replace(self, Self::Empty) {
                    Self::Empty => None,
                    $(Self::$alt(value) => Some(Box::new(value) as Box<dyn Any>)),+
                }
            }
        }

        impl<$($ty: Serialize),+> Serialize for $name<$($ty),+> {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                match self {
                    Self::Empty => serializer.serialize_unit_variant(
                        stringify!($name),
                        EMPTY_VARIANT_INDEX_U32,
                        "Empty",
                    ),
                    $(Self::$alt(value) => serializer.serialize_newtype_variant(
                        stringify!($name),
                        $n,
                        stringify!($alt),
                        value,
                    )),+
                }
            }
        }

        impl<'de, $($ty: Deserialize<'de>),+> Deserialize<'de> for $name<$($ty),+> {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                struct VariantVisitor<$($ty),+>(PhantomData<($($ty,)+)>);

                impl<'de, $($ty: Deserialize<'de>),+> Visitor<'de> for VariantVisitor<$($ty),+> {
                    type Value = $name<$($ty),+>;

                    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                        write!(
                            f,
                            "a variant of {} alternatives",
                            <$name<$($ty),+> as AnyVariant>::ALTERNATIVES
                        )
                    }

                    fn visit_enum<A>(self, data: A) -> Result<Self::Value, A::Error>
                    where
                        A: EnumAccess<'de>,
                    {
                        let (index, access): (u32, _) = data.variant()?;
                        match index {
                            EMPTY_VARIANT_INDEX_U32 => {
                                access.unit_variant()?;
                                Ok($name::Empty)
                            }
                            $($n => access.newtype_variant::<$ty>().map($name::$alt),)+
                            other => Err(de::Error::invalid_value(
                                Unexpected::Unsigned(other as u64),
                                &self,
                            )),
                        }
                    }
                }

                deserializer.deserialize_enum(
                    stringify!($name),
                    &["Empty", $(stringify!($alt)),+],
                    VariantVisitor(PhantomData),
                )
            }
        }
    };

    (@alternative $name: ident [$($g: ident),+] $alt: ident $ty: ident $n: tt) => {
        impl<$($g),+> Select<$ty, At<$n>> for $name<$($g),+> {
            const INDEX: usize = $n;

            fn select(value: $ty) -> Self {
                Self::$alt(value)
            }

            fn assign(&mut self, value: $ty) {
                match self {
                    Self::$alt(current) => *current = value,
                    _ => {
                        // the old alternative is dropped before the new one is stored
                        self.clear();
                        *self = Self::$alt(value);
                    }
                }
            }

            fn peek(&self) -> Option<&$ty> {
                match self {
                    Self::$alt(value) => Some(value),
                    _ => None,
                }
            }

            fn peek_mut(&mut self) -> Option<&mut $ty> {
                match self {
                    Self::$alt(value) => Some(value),
                    _ => None,
                }
            }

            fn extract(&mut self) -> Option<$ty> {
                if !matches!(self, Self::$alt(_)) {
                    return None;
                }
                match std::mem::replace(self, Self::Empty) {
                    Self::$alt(value) => Some(value),
                    _ => None,
                }
            }
        }

        impl<$($g),+> Alternative<$n> for $name<$($g),+> {
            type Type = $ty;

            fn wrap(value: $ty) -> Self {
                Self::$alt(value)
            }

            fn alternative(&self) -> Option<&$ty> {
                <Self as Select<$ty, At<$n>>>::peek(self)
            }

            fn alternative_mut(&mut self) -> Option<&mut $ty> {
                <Self as Select<$ty, At<$n>>>::peek_mut(self)
            }
        }
    };
}

variant! {
    /// A variant of a single alternative, an optional value with a variant's wire form.
    Variant1 [T0] { Alt0(T0, I0) = 0 }
}

variant! {
    /// Two alternatives. Shares its wire form with [std::result::Result].
    Variant2 [T0, T1] { Alt0(T0, I0) = 0, Alt1(T1, I1) = 1 }
}

variant! {
    Variant3 [T0, T1, T2] { Alt0(T0, I0) = 0, Alt1(T1, I1) = 1, Alt2(T2, I2) = 2 }
}

variant! {
    Variant4 [T0, T1, T2, T3] {
        Alt0(T0, I0) = 0,
        Alt1(T1, I1) = 1,
        Alt2(T2, I2) = 2,
        Alt3(T3, I3) = 3,
    }
}

variant! {
    Variant5 [T0, T1, T2, T3, T4] {
        Alt0(T0, I0) = 0,
        Alt1(T1, I1) = 1,
        Alt2(T2, I2) = 2,
        Alt3(T3, I3) = 3,
        Alt4(T4, I4) = 4,
    }
}

variant! {
    Variant6 [T0, T1, T2, T3, T4, T5] {
        Alt0(T0, I0) = 0,
        Alt1(T1, I1) = 1,
        Alt2(T2, I2) = 2,
        Alt3(T3, I3) = 3,
        Alt4(T4, I4) = 4,
        Alt5(T5, I5) = 5,
    }
}

variant! {
    Variant7 [T0, T1, T2, T3, T4, T5, T6] {
        Alt0(T0, I0) = 0,
        Alt1(T1, I1) = 1,
        Alt2(T2, I2) = 2,
        Alt3(T3, I3) = 3,
        Alt4(T4, I4) = 4,
        Alt5(T5, I5) = 5,
        Alt6(T6, I6) = 6,
    }
}

variant! {
    Variant8 [T0, T1, T2, T3, T4, T5, T6, T7] {
        Alt0(T0, I0) = 0,
        Alt1(T1, I1) = 1,
        Alt2(T2, I2) = 2,
        Alt3(T3, I3) = 3,
        Alt4(T4, I4) = 4,
        Alt5(T5, I5) = 5,
        Alt6(T6, I6) = 6,
        Alt7(T7, I7) = 7,
    }
}

/// A list of types, given as a tuple.
pub trait TypeSet {
    fn contains(id: TypeId) -> bool;
}

/// Every type in the list converts into `T`.
pub trait ConvertSet<T>: TypeSet {
    fn convert_ref(value: &dyn Any) -> Option<T>;

    fn convert_owned(value: Box<dyn Any>) -> Option<T>;
}

/// `V` visits every type in the list.
pub trait VisitSet<V: Visit>: TypeSet {
    fn call(value: &dyn Any, visitor: &mut V) -> Option<V::Output>;
}

macro_rules! type_set {
    ($($a: ident),+) => {
        impl<$($a: 'static),+> TypeSet for ($($a,)+) {
            fn contains(id: TypeId) -> bool {
                $(id == TypeId::of::<$a>())||+
            }
        }

        impl<T, $($a: 'static + Clone + Into<T>),+> ConvertSet<T> for ($($a,)+) {
            fn convert_ref(value: &dyn Any) -> Option<T> {
                $(
                    if let Some(value) = value.downcast_ref::<$a>() {
                        return Some(value.clone().into());
                    }
                )+
                None
            }

            fn convert_owned(value: Box<dyn Any>) -> Option<T> {
                $(
                    let value = match value.downcast::<$a>() {
                        Ok(value) => return Some((*value).into()),
                        Err(value) => value,
                    };
                )+
                drop(value);
                None
            }
        }

        impl<V: Visit $(+ VisitRef<$a>)+, $($a: 'static),+> VisitSet<V> for ($($a,)+) {
            fn call(value: &dyn Any, visitor: &mut V) -> Option<V::Output> {
                $(
                    if let Some(value) = value.downcast_ref::<$a>() {
                        return Some(<V as VisitRef<$a>>::visit_ref(visitor, value));
                    }
                )+
                None
            }
        }
    };
}

type_set!(A);
type_set!(A, B);
type_set!(A, B, C);
type_set!(A, B, C, D);
type_set!(A, B, C, D, E);
type_set!(A, B, C, D, E, F);
type_set!(A, B, C, D, E, F, G);
type_set!(A, B, C, D, E, F, G, H);

/// Conditional access to a variant whose active alternative is one of `L`.
///
/// Every operation does nothing and returns `false` when the active
/// alternative is not in `L`.
///
/// ```
/// use tagwire_core::types::{IfAnyOf, Variant3};
///
/// let v = Variant3::<u8, u16, String>::from_value(7u16);
/// let mut wide = 0u64;
/// assert!(IfAnyOf::<(u8, u16)>::get(&v, &mut wide));
/// assert_eq!(wide, 7);
/// ```
pub struct IfAnyOf<L>(PhantomData<L>);

impl<L: TypeSet> IfAnyOf<L> {
    /// Visit the active value.
    pub fn call<Var, V>(variant: &Var, visitor: &mut V) -> bool
    where
        Var: DynVariant,
        V: Visit,
        L: VisitSet<V>,
    {
        variant
            .active_any()
            .and_then(|value| L::call(value, visitor))
            .is_some()
    }

    /// Convert a copy of the active value into `out`.
    pub fn get<Var, T>(variant: &Var, out: &mut T) -> bool
    where
        Var: DynVariant,
        L: ConvertSet<T>,
    {
        match variant.active_any().and_then(L::convert_ref) {
            Some(value) => {
                *out = value;
                true
            }
            None => false,
        }
    }

    /// Move the active value into `out`, leaving the variant empty.
    pub fn take<Var, T>(variant: &mut Var, out: &mut T) -> bool
    where
        Var: DynVariant,
        L: ConvertSet<T>,
    {
        let listed = variant
            .active_any()
            .is_some_and(|value| L::contains((*value).type_id()));
        if !listed {
            return false;
        }

        match variant.take_any().and_then(L::convert_owned) {
            Some(value) => {
                *out = value;
                true
            }
            None => false,
        }
    }

    /// Swap the active value with `out`; `T` must be the active type.
    pub fn swap<Var, T>(variant: &mut Var, out: &mut T) -> bool
    where
        Var: DynVariant,
        T: 'static,
    {
        if !L::contains(TypeId::of::<T>()) {
            return false;
        }

        match variant
            .active_any_mut()
            .and_then(|value| value.downcast_mut::<T>())
        {
            Some(value) => {
                std::mem::swap(value, out);
                true
            }
            None => false,
        }
    }
}
