extern crate proc_macro;

use quote::quote;
use syn::{parse_macro_input, DeriveInput};

use proc_macro::TokenStream;

/// Derive `IndexBase` and the `From`/`Into` conversions for a single-field tuple struct
#[proc_macro_derive(IndexBase)]
pub fn impl_index_base(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);

    let name = &ast.ident;

    let data = match ast.data {
        syn::Data::Struct(data) => data,
        _ => panic!("Expected a struct for IndexBase impl")
    };

    if data.fields.len() != 1 {
        panic!("Expected exactly one struct field");
    }
    let field_type = match data.fields.iter().next() {
        Some(field) => &field.ty,
        None => panic!("Expected exactly one struct field")
    };

    let expanded = quote! {
        impl crate::strong::IndexBase for #name {
            type Type = #field_type;

            fn get(&self) -> #field_type {
                self.0
            }
        }

        impl From<#field_type> for #name {
            fn from(value: #field_type) -> #name {
                #name(value)
            }
        }

        impl From<#name> for #field_type {
            fn from(value: #name) -> #field_type {
                value.0
            }
        }
    };

    TokenStream::from(expanded)
}
