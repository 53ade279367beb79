//! Logic for deriving the method descriptor of each interface method.

use quote::quote;
use syn::{Ident, Visibility};

use crate::InterfaceMethod;

/// Derive a unit struct implementing `Method` for a single interface method.
///
/// The argument tuple follows the declaration order of the parameters.
pub fn derive(
    vis: &Visibility,
    trait_name: &Ident,
    identifier: &str,
    method: &InterfaceMethod,
) -> proc_macro2::TokenStream {
    let InterfaceMethod {
        ident,
        descriptor,
        params,
        reply,
        ..
    } = method;

    let name = ident.to_string();
    let arg_types = params.iter().map(|(_, ty)| ty);

    quote! {
        #[doc = concat!(
            "Descriptor of [`",
            stringify!(#trait_name),
            "::",
            stringify!(#ident),
            "`]."
        )]
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        #vis struct #descriptor;

        impl ::tagwire::interface::Method for #descriptor {
            const INTERFACE: &'static str = #identifier;
            const NAME: &'static str = #name;
            type Args = ( #(#arg_types,)* );
            type Reply = #reply;
        }
    }
}
