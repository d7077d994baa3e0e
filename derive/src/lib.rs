// Copyright 2023 Dmitry Tantsur <dtantsur@protonmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Derive macros for `oscloud`.

use convert_case::{Case, Casing};
use proc_macro::TokenStream;
use quote::quote;

/// Derive `oscloud::QueryItem` for an enumeration of filters.
///
/// Every variant must have exactly one unnamed field implementing `Display`. The query key is
/// the variant name in snake case unless overridden with `#[query_item = "key"]`.
#[proc_macro_derive(QueryItem, attributes(query_item))]
pub fn query_item_macro_derive(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as syn::DeriveInput);

    let data = match input.data {
        syn::Data::Enum(ref data) => data,
        _ => {
            return syn::Error::new_spanned(
                &input,
                "only enums are supported for derive(QueryItem)",
            )
            .into_compile_error()
            .into()
        }
    };

    let class_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let mut arms = Vec::with_capacity(data.variants.len());
    for variant in &data.variants {
        match variant.fields {
            syn::Fields::Unnamed(ref fs) if fs.unnamed.len() == 1 => {}
            _ => {
                return syn::Error::new_spanned(
                    variant,
                    "derive(QueryItem) requires variants with exactly one unnamed field",
                )
                .into_compile_error()
                .into()
            }
        }

        let key = match get_query_item_name(variant) {
            Ok(Some(name)) => name,
            Ok(None) => variant.ident.to_string().to_case(Case::Snake),
            Err(err) => return err.into_compile_error().into(),
        };
        let ident = &variant.ident;
        arms.push(quote! {
            #class_name::#ident(ref value) => (
                #key,
                ::std::borrow::Cow::Owned(::std::string::ToString::to_string(value)),
            )
        });
    }

    quote! {
        #[allow(missing_docs, unused)]
        impl #impl_generics ::oscloud::QueryItem for #class_name #ty_generics #where_clause {
            fn query_item(
                &self,
            ) -> ::std::result::Result<(&str, ::std::borrow::Cow<str>), ::oscloud::Error> {
                ::std::result::Result::Ok(match *self {
                    #(#arms),*
                })
            }
        }
    }
    .into()
}

fn get_query_item_name(variant: &syn::Variant) -> syn::Result<Option<String>> {
    for attr in &variant.attrs {
        match attr.parse_meta() {
            Ok(syn::Meta::NameValue(nv)) if nv.path.is_ident("query_item") => {
                return match nv.lit {
                    syn::Lit::Str(s) => Ok(Some(s.value())),
                    _ => Err(syn::Error::new_spanned(
                        attr,
                        "query_item must be a string",
                    )),
                };
            }
            Ok(syn::Meta::Path(p)) if p.is_ident("query_item") => {
                return Err(syn::Error::new_spanned(
                    attr,
                    "query_item requires a value: #[query_item = \"name\"]",
                ));
            }
            _ => {}
        }
    }

    Ok(None)
}
