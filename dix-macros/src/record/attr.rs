use syn::{
    parse::{Parse, ParseStream},
    Attribute, LitStr, Token,
};

use crate::attr_parsing::{combine_attribute, combine_flag, parse_assignment_attribute, parse_attrs, parse_flag_attribute, Combine};

pub(crate) mod kw {
    syn::custom_keyword!(skip);
    syn::custom_keyword!(group);
    syn::custom_keyword!(methods);
}

#[derive(Default)]
pub(crate) struct FieldArgs {
    pub(super) skip: Option<kw::skip>,
    pub(super) group: Option<(kw::group, LitStr)>,
}

impl Parse for FieldArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut args = Self::default();

        while !input.is_empty() {
            let lh = input.lookahead1();
            if lh.peek(kw::skip) {
                parse_flag_attribute(input, &mut args.skip)?;
            } else if lh.peek(kw::group) {
                parse_assignment_attribute(input, &mut args.group)?;
            } else {
                return Err(lh.error());
            }

            if !input.is_empty() {
                input.parse::<Token![,]>()?;
            }
        }

        if let (Some(skip), Some(_)) = (&args.skip, &args.group) {
            return Err(syn::Error::new_spanned(skip, "`skip` can't be combined with `group`"));
        }
        if let Some((_, group)) = &args.group {
            if group.value().trim().is_empty() {
                return Err(syn::Error::new_spanned(group, "group can't be empty"));
            }
        }

        Ok(args)
    }
}

impl Combine for FieldArgs {
    fn combine(mut self, other: Self) -> syn::Result<Self> {
        let Self { skip, group } = other;
        combine_flag(&mut self.skip, skip)?;
        combine_attribute(&mut self.group, group)?;
        Ok(self)
    }
}

#[derive(Default)]
pub(crate) struct StructArgs {
    pub(super) methods: Option<kw::methods>,
}

impl Parse for StructArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut args = Self::default();

        while !input.is_empty() {
            let lh = input.lookahead1();
            if lh.peek(kw::methods) {
                parse_flag_attribute(input, &mut args.methods)?;
            } else {
                return Err(lh.error());
            }

            if !input.is_empty() {
                input.parse::<Token![,]>()?;
            }
        }

        Ok(args)
    }
}

impl Combine for StructArgs {
    fn combine(mut self, other: Self) -> syn::Result<Self> {
        combine_flag(&mut self.methods, other.methods)?;
        Ok(self)
    }
}

pub(crate) fn parse_field_attrs(attrs: &[Attribute]) -> syn::Result<FieldArgs> {
    parse_attrs("dix", attrs)
        .map(|result| result.map_err(|(err, attr)| syn::Error::new_spanned(attr, err)))
        .unwrap_or_else(|| Ok(FieldArgs::default()))
}

pub(crate) fn parse_struct_attrs(attrs: &[Attribute]) -> syn::Result<StructArgs> {
    parse_attrs("dix", attrs)
        .map(|result| result.map_err(|(err, attr)| syn::Error::new_spanned(attr, err)))
        .unwrap_or_else(|| Ok(StructArgs::default()))
}
