//! Logic for deriving the interface struct and its dispatch bindings.

use quote::quote;
use syn::{Ident, Visibility};

use crate::InterfaceMethod;

/// Name of the handler binding inside each generated closure
const HANDLER_IDENT: &str = "__handler";

/// Derive `<Trait>Api`, implementing `Interface` and `InterfaceBindings`.
pub fn derive_bindings(
    vis: &Visibility,
    trait_name: &Ident,
    identifier: &str,
    methods: &[InterfaceMethod],
) -> proc_macro2::TokenStream {
    let api = Ident::new(&format!("{}Api", trait_name), trait_name.span());
    let handler = Ident::new(HANDLER_IDENT, proc_macro2::Span::call_site());
    let descriptors = methods.iter().map(|m| &m.descriptor).collect::<Vec<_>>();

    let binds = methods
        .iter()
        .map(|m| {
            let InterfaceMethod {
                ident,
                descriptor,
                params,
                ..
            } = m;
            let args = params.iter().map(|(arg, _)| arg).collect::<Vec<_>>();

            quote! {
                let builder = builder.bind::<#descriptor, _>(
                    |#handler: &mut H, ( #(#args,)* )| <H as #trait_name>::#ident(#handler, #(#args),*)
                )?;
            }
        })
        .collect::<proc_macro2::TokenStream>();

    quote! {
        #[doc = concat!("The `", #identifier, "` interface.")]
        #[doc = ""]
        #[doc = concat!("This struct is automatically generated from [`", stringify!(#trait_name), "`]")]
        #[derive(Debug, Clone, Copy, Default)]
        #vis struct #api;

        impl ::tagwire::interface::Interface for #api {
            const IDENTIFIER: &'static str = #identifier;
            const METHODS: &'static [::tagwire::interface::MethodDescriptor] = &[
                #(
                    ::tagwire::interface::MethodDescriptor {
                        name: <#descriptors as ::tagwire::interface::Method>::NAME,
                        selector: <#descriptors as ::tagwire::interface::Method>::SELECTOR,
                    },
                )*
            ];
        }

        impl<H: #trait_name + 'static> ::tagwire::interface::InterfaceBindings<H> for #api {
            fn bind_all<R, W>(
                builder: ::tagwire::middleware::DispatcherBuilder<H, R, W>,
            ) -> ::core::result::Result<
                ::tagwire::middleware::DispatcherBuilder<H, R, W>,
                ::tagwire::middleware::InvokeError,
            >
            where
                R: ::tagwire::stream::Reader + 'static,
                W: ::tagwire::stream::Writer + 'static,
            {
                #binds
                ::core::result::Result::Ok(builder)
            }
        }
    }
}
