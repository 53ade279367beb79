//! Logic for deriving a client data structure.

use proc_macro2::Span;
use quote::quote;
use syn::{Ident, Visibility};

use crate::InterfaceMethod;

/// The identifier for the context manager
const CTX_MGR_IDENT: &str = "ctx";

/// From the trait name, derive a new client struct and implement
/// the same methods as the trait, but with an additional parameter:
/// the context manager.
///
/// The context manager is the middleware that handles communication with the
/// remote.
pub fn derive_client(
    vis: &Visibility,
    trait_name: &Ident,
    methods: &[InterfaceMethod],
) -> proc_macro2::TokenStream {
    let struct_name = Ident::new(&format!("{}Client", trait_name), trait_name.span());
    let ctx = Ident::new(CTX_MGR_IDENT, Span::call_site());

    let impl_methods = methods
        .iter()
        .map(|method| {
            let InterfaceMethod {
                attrs,
                ident,
                descriptor,
                params,
                reply,
            } = method;
            let typed_params = params.iter().map(|(arg, ty)| quote! { #arg: #ty });
            let args = params.iter().map(|(arg, _)| arg);

            quote! {
                #(#attrs)*
                pub fn #ident<R: ::tagwire::stream::Reader, W: ::tagwire::stream::Writer>(
                    #ctx: &mut ::tagwire::middleware::ContextManager<R, W>,
                    #(#typed_params),*
                ) -> ::core::result::Result<#reply, ::tagwire::middleware::InvokeError> {
                    #ctx.invoke::<#descriptor>(( #(#args,)* ))
                }
            }
        })
        .collect::<proc_macro2::TokenStream>();

    quote! {
        #[doc = "Client for method invocations."]
        #[doc = ""]
        #[doc = concat!("This struct is automatically generated from [`", stringify!(#trait_name), "`]")]
        #[derive(Debug, Clone, Copy, Default)]
        #vis struct #struct_name;

        impl #struct_name {
            #impl_methods
        }
    }
}
