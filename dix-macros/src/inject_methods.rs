mod attr;

pub(crate) use attr::InjectMethodsArgs;

use proc_macro2::TokenStream;
use quote::{format_ident, quote, quote_spanned};
use syn::{spanned::Spanned as _, FnArg, ImplItem, ImplItemFn, ItemImpl, LitStr};

pub(crate) fn expand(args: InjectMethodsArgs, item: ItemImpl) -> syn::Result<TokenStream> {
    if let Some((_, path, _)) = &item.trait_ {
        return Err(syn::Error::new_spanned(path, "`inject_methods` expects an inherent `impl` block"));
    }

    let prefix = args.prefix();
    let methods = item
        .items
        .iter()
        .filter_map(|item| match item {
            ImplItem::Fn(method) if method.sig.ident.to_string().starts_with(&prefix) => Some(method),
            _ => None,
        })
        .map(quote_method)
        .collect::<syn::Result<Vec<_>>>()?;

    let self_ty = &item.self_ty;
    let (impl_generics, _, where_clause) = item.generics.split_for_impl();

    Ok(quote! {
        #item

        impl #impl_generics ::dix::InjectMethods for #self_ty #where_clause {
            fn inject_methods() -> ::std::vec::Vec<::dix::Method<Self>> {
                ::std::vec![#(#methods),*]
            }
        }
    })
}

fn quote_method(method: &ImplItemFn) -> syn::Result<TokenStream> {
    let sig = &method.sig;
    if let Some(asyncness) = &sig.asyncness {
        return Err(syn::Error::new_spanned(asyncness, "injection methods can't be async"));
    }
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(&sig.generics, "injection methods can't be generic"));
    }

    let mut inputs = sig.inputs.iter();
    match inputs.next() {
        Some(FnArg::Receiver(receiver)) if receiver.reference.is_some() => {}
        Some(other) => {
            return Err(syn::Error::new_spanned(other, "injection methods take `&self` or `&mut self` first"));
        }
        None => {
            return Err(syn::Error::new_spanned(sig, "injection methods take `&self` or `&mut self` first"));
        }
    }

    let mut params = Vec::new();
    let mut args = Vec::new();
    for (index, input) in inputs.enumerate() {
        let FnArg::Typed(pat_type) = input else {
            return Err(syn::Error::new_spanned(input, "unexpected receiver"));
        };
        let ty = &pat_type.ty;
        let arg = format_ident!("arg{}", index);
        params.push(quote_spanned! { ty.span() => #arg: #ty });
        args.push(arg);
    }

    let ident = &sig.ident;
    let name = LitStr::new(&ident.to_string(), ident.span());

    Ok(quote_spanned! { method.span() =>
        ::dix::Method::new(#name, |this: &mut Self, #(#params),*| Self::#ident(this, #(#args),*))
    })
}
