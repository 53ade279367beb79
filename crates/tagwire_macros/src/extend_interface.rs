//! This module turns an interface trait into its handler trait.

use quote::ToTokens;
use syn::{Attribute, FnArg, Ident, ItemTrait, TraitItem};

/// Adds a mutable receiver to the start of each method definition.
pub fn extend_trait(mut trait_def: ItemTrait) -> proc_macro2::TokenStream {
    let mut_receiver: FnArg = syn::parse_quote! {&mut self};

    for item in trait_def.items.iter_mut() {
        if let TraitItem::Fn(method) = item {
            method.sig.inputs.insert(0, mut_receiver.clone());
        }
    }

    let api = Ident::new(&format!("{}Api", trait_def.ident), trait_def.ident.span());
    let blank_attr: Attribute = syn::parse_quote! {
        #[doc = ""]
    };
    let comment_attr: Attribute = syn::parse_quote! {
        #[doc = concat!(
            "Implementations are bound to a dispatcher through [`",
            stringify!(#api),
            "`]."
        )]
    };
    trait_def.attrs.push(blank_attr);
    trait_def.attrs.push(comment_attr);

    trait_def.to_token_stream()
}
