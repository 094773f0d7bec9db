mod attr;

use proc_macro2::{Span, TokenStream};
use quote::{quote, quote_spanned};
use syn::{
    ext::IdentExt as _, parse_quote, spanned::Spanned as _, Data, DeriveInput, Fields, Index, LitStr, Member,
};

use attr::{parse_field_attrs, parse_struct_attrs};

struct RecordField {
    member: Member,
    ty: syn::Type,
    name: LitStr,
    group: Option<LitStr>,
    skip: bool,
}

pub(crate) fn expand(input: DeriveInput) -> syn::Result<TokenStream> {
    let fields = match &input.data {
        Data::Struct(data) => collect_fields(&data.fields)?,
        Data::Enum(data) => return Err(syn::Error::new(data.enum_token.span, "`Record` can only be derived for structs")),
        Data::Union(data) => return Err(syn::Error::new(data.union_token.span, "`Record` can only be derived for structs")),
    };
    let struct_args = parse_struct_attrs(&input.attrs)?;

    let ident = &input.ident;
    let mut generics = input.generics.clone();
    {
        let where_clause = generics.make_where_clause();
        for field in &fields {
            let ty = &field.ty;
            if field.skip {
                where_clause.predicates.push(parse_quote!(#ty: ::core::default::Default));
            } else {
                where_clause.predicates.push(parse_quote!(#ty: ::dix::Reflect));
            }
        }
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let described: Vec<&RecordField> = fields.iter().filter(|field| !field.skip).collect();

    let shape_fields = described.iter().map(|field| {
        let RecordField { ty, name, group, .. } = field;
        let group = group.as_ref().map(|group| quote! { .group(#group) });
        quote_spanned! { ty.span() => ::dix::Field::new::<#ty>(#name) #group }
    });

    let inits = fields.iter().map(|field| {
        let RecordField { member, ty, .. } = field;
        if field.skip {
            quote_spanned! { ty.span() => #member: <#ty as ::core::default::Default>::default() }
        } else {
            quote_spanned! { ty.span() => #member: fields.take::<#ty>()? }
        }
    });

    let exploded = described.iter().map(|field| {
        let member = &field.member;
        quote! { ::std::boxed::Box::new(self.#member) as ::dix::AnyBox }
    });

    let slots = described.iter().enumerate().map(|(index, field)| {
        let member = &field.member;
        quote! { #index => ::core::option::Option::Some(&mut self.#member as &mut dyn ::core::any::Any), }
    });

    let methods = struct_args.methods.map(|kw| {
        quote_spanned! { kw.span =>
            fn methods() -> ::std::vec::Vec<::dix::Method<Self>> {
                <Self as ::dix::InjectMethods>::inject_methods()
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::dix::Reflect for #ident #ty_generics #where_clause {
            fn shape() -> ::dix::Shape {
                ::dix::Shape::record::<Self>(::std::vec![#(#shape_fields),*])
            }
        }

        impl #impl_generics ::dix::Record for #ident #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn from_fields(fields: &mut ::dix::FieldValues) -> ::core::result::Result<Self, ::dix::Error> {
                ::core::result::Result::Ok(Self { #(#inits),* })
            }

            fn into_fields(self) -> ::std::vec::Vec<::dix::AnyBox> {
                ::std::vec![#(#exploded),*]
            }

            fn field_mut(&mut self, index: usize) -> ::core::option::Option<&mut dyn ::core::any::Any> {
                match index {
                    #(#slots)*
                    _ => ::core::option::Option::None,
                }
            }

            #methods
        }
    })
}

fn collect_fields(fields: &Fields) -> syn::Result<Vec<RecordField>> {
    fields
        .iter()
        .enumerate()
        .map(|(index, field)| {
            let args = parse_field_attrs(&field.attrs)?;
            let (member, name) = match &field.ident {
                Some(ident) => (
                    Member::Named(ident.clone()),
                    LitStr::new(&ident.unraw().to_string(), ident.span()),
                ),
                None => (
                    Member::Unnamed(Index {
                        index: index as u32,
                        span: field.ty.span(),
                    }),
                    LitStr::new(&index.to_string(), Span::call_site()),
                ),
            };

            Ok(RecordField {
                member,
                ty: field.ty.clone(),
                name,
                group: args.group.map(|(_, group)| LitStr::new(group.value().trim(), group.span())),
                skip: args.skip.is_some(),
            })
        })
        .collect()
}
