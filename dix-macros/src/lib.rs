use proc_macro::TokenStream;
use quote::{quote, ToTokens};
use std::env::var_os;
use syn::parse::Parse;

mod attr_parsing;
mod inject_methods;
mod record;

/// Derives `dix::Reflect` and `dix::Record` for a struct.
///
/// Field attributes:
/// - `#[dix(skip)]`: the container never sees the field, a fresh record gets `Default::default()`.
/// - `#[dix(group = "name")]`: the field is resolved from, or stored under, the `name` group.
///
/// Struct attributes:
/// - `#[dix(methods)]`: injection methods generated by `#[dix::inject_methods]` are called
///   before the fields are injected.
#[proc_macro_derive(Record, attributes(dix))]
pub fn derive_record(item: TokenStream) -> TokenStream {
    expand_with(item, record::expand)
}

/// Implements `dix::InjectMethods` for the methods of an `impl` block whose names start with the prefix.
///
/// The prefix is `dix_inject` unless set with `#[dix::inject_methods(prefix = "...")]`.
#[proc_macro_attribute]
pub fn inject_methods(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = match syn::parse::<inject_methods::InjectMethodsArgs>(attr) {
        Ok(args) => args,
        Err(err) => return err.into_compile_error().into(),
    };
    expand_with(item, |item| inject_methods::expand(args, item))
}

fn expand_with<F, I, K>(input: TokenStream, f: F) -> TokenStream
where
    F: FnOnce(I) -> syn::Result<K>,
    I: Parse,
    K: ToTokens,
{
    expand(syn::parse(input).and_then(f))
}

fn expand<T>(result: syn::Result<T>) -> TokenStream
where
    T: ToTokens,
{
    match result {
        Ok(tokens) => {
            let tokens = (quote! { #tokens }).into();
            if var_os("MACROS_DEBUG").is_some() {
                eprintln!("{tokens}");
            }
            tokens
        }
        Err(err) => err.into_compile_error().into(),
    }
}
