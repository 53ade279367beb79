//! Proc-macros for tagwire interfaces.

use proc_macro2::TokenStream;
use syn::{
    spanned::Spanned, Attribute, FnArg, Ident, ItemTrait, LitStr, Pat, ReturnType, TraitItem,
    TraitItemFn, Type,
};

mod bindings;
mod client_builder;
mod extend_interface;
mod method_descriptor;

/// Generates the necessary code to implement a remote interface.
///
/// The attribute argument is the interface identifier that, together with
/// each method name, determines the method selectors. It defaults to the
/// trait name.
///
/// As a general rule, parameters and return values can be of any type as long
/// as they satisfy these constraints:
/// - they are owned types (references are not allowed)
/// - they are concrete types (generics are not allowed)
/// - they implement serde's `Serialize` and `Deserialize`
///
/// ```ignore
/// #[interface("io.example.Calculator")]
/// pub trait Calculator {
///     /// Methods must not contain receivers (&self, &mut self).
///     ///
///     /// A mutable receiver will be added after processing by the macro.
///     fn add(left: i64, right: i64) -> i64;
/// }
/// ```
///
/// This generates, next to the handler trait itself:
/// - `CalculatorAdd`, the method descriptor
/// - `CalculatorApi`, the interface, used to bind a handler to a dispatcher
/// - `CalculatorClient`, whose methods invoke the remote through a context manager
#[proc_macro_attribute]
pub fn interface(
    attr: proc_macro::TokenStream,
    item: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    let identifier = match attr.is_empty() {
        true => None,
        false => Some(syn::parse_macro_input!(attr as LitStr)),
    };
    let item = syn::parse_macro_input!(item as ItemTrait);

    expand_interface(identifier, item)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// A method of an interface trait, as seen by the generators.
pub(crate) struct InterfaceMethod {
    /// Doc attributes, copied onto the client method
    pub attrs: Vec<Attribute>,
    pub ident: Ident,

    /// Name of the derived descriptor struct
    pub descriptor: Ident,
    pub params: Vec<(Ident, Type)>,
    pub reply: Type,
}

impl InterfaceMethod {
    fn parse(trait_name: &Ident, method: &TraitItemFn) -> syn::Result<Self> {
        let sig = &method.sig;

        if let Some(asyncness) = sig.asyncness {
            return Err(syn::Error::new(
                asyncness.span(),
                "interface methods are blocking, remove `async`",
            ));
        }
        if !sig.generics.params.is_empty() {
            return Err(syn::Error::new(
                sig.generics.span(),
                "interface methods cannot be generic",
            ));
        }

        let params = sig
            .inputs
            .iter()
            .map(|input| match input {
                FnArg::Receiver(r) => Err(syn::Error::new(
                    r.span(),
                    "remove the receiver, `&mut self` is added by the macro",
                )),
                FnArg::Typed(typed) => {
                    if let Type::Reference(r) = &*typed.ty {
                        return Err(syn::Error::new(r.span(), "parameters must be owned types"));
                    }
                    match &*typed.pat {
                        Pat::Ident(pat) => Ok((pat.ident.to_owned(), (*typed.ty).to_owned())),
                        other => Err(syn::Error::new(
                            other.span(),
                            "parameters must be plain identifiers",
                        )),
                    }
                }
            })
            .collect::<syn::Result<Vec<_>>>()?;

        let reply = match &sig.output {
            ReturnType::Default => syn::parse_quote! { () },
            ReturnType::Type(_, ty) => (**ty).to_owned(),
        };

        Ok(Self {
            attrs: method
                .attrs
                .iter()
                .filter(|attr| attr.path().is_ident("doc"))
                .cloned()
                .collect(),
            ident: sig.ident.to_owned(),
            descriptor: Ident::new(
                &camel_case_to_pascal_case(&format!("{}_{}", trait_name, sig.ident)),
                sig.ident.span(),
            ),
            params,
            reply,
        })
    }
}

fn expand_interface(identifier: Option<LitStr>, item: ItemTrait) -> syn::Result<TokenStream> {
    let identifier = match identifier {
        Some(lit) if lit.value().is_empty() => {
            return Err(syn::Error::new(lit.span(), "interface identifier is empty"))
        }
        Some(lit) => lit.value(),
        None => item.ident.to_string(),
    };

    if !item.generics.params.is_empty() {
        return Err(syn::Error::new(
            item.generics.span(),
            "interfaces cannot be generic",
        ));
    }

    let methods = item
        .items
        .iter()
        .map(|trait_item| match trait_item {
            TraitItem::Fn(f) => InterfaceMethod::parse(&item.ident, f),
            other => Err(syn::Error::new(
                other.span(),
                "interfaces can only contain methods",
            )),
        })
        .collect::<syn::Result<Vec<_>>>()?;

    let descriptors = methods
        .iter()
        .map(|m| method_descriptor::derive(&item.vis, &item.ident, &identifier, m))
        .collect::<TokenStream>();
    let api = bindings::derive_bindings(&item.vis, &item.ident, &identifier, &methods);
    let client = client_builder::derive_client(&item.vis, &item.ident, &methods);
    let trait_def = extend_interface::extend_trait(item);

    Ok([trait_def, descriptors, api, client].into_iter().collect())
}

/// Converts `camel_case` to `CamelCase`
fn camel_case_to_pascal_case(input: &str) -> String {
    input
        .split('_')
        .map(|item| {
            let mut chars = item.chars().collect::<Vec<_>>();

            if let Some(c) = chars.first_mut() {
                *c = c.to_ascii_uppercase()
            }

            chars.iter().collect::<String>()
        })
        .collect::<String>()
}
