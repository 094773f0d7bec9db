use syn::{
    parse::{Parse, ParseStream},
    LitStr, Token,
};

use crate::attr_parsing::parse_assignment_attribute;

pub(crate) mod kw {
    syn::custom_keyword!(prefix);
}

const DEFAULT_METHOD_PREFIX: &str = "dix_inject";

pub(crate) struct InjectMethodsArgs {
    prefix: Option<(kw::prefix, LitStr)>,
}

impl InjectMethodsArgs {
    pub(super) fn prefix(&self) -> String {
        self.prefix
            .as_ref()
            .map_or_else(|| DEFAULT_METHOD_PREFIX.to_owned(), |(_, prefix)| prefix.value())
    }
}

impl Parse for InjectMethodsArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut prefix: Option<(kw::prefix, LitStr)> = None;

        while !input.is_empty() {
            let lh = input.lookahead1();
            if lh.peek(kw::prefix) {
                parse_assignment_attribute(input, &mut prefix)?;
            } else {
                return Err(lh.error());
            }

            if !input.is_empty() {
                input.parse::<Token![,]>()?;
            }
        }

        if let Some((_, value)) = &prefix {
            if value.value().is_empty() {
                return Err(syn::Error::new_spanned(value, "prefix can't be empty"));
            }
        }

        Ok(Self { prefix })
    }
}
