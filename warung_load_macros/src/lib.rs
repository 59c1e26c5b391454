//! Attribute macros that remove the derive boilerplate from metric and
//! aggregate types in `warung-load`.
use proc_macro::TokenStream;
use quote::quote;
use syn::{ItemStruct, parse_macro_input};

extern crate proc_macro;

/// Derives everything a `warung_load::Metric` needs and implements the marker
/// trait. `Metric` must be in scope where the macro is used.
#[proc_macro_attribute]
pub fn metric(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(item as ItemStruct);
    let ident = &ast.ident;
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();
    let expanded = quote! {
        #[derive(
            ::serde::Serialize,
            ::serde::Deserialize,
            ::std::cmp::PartialOrd,
            ::std::cmp::PartialEq,
            ::std::fmt::Debug,
            ::std::clone::Clone
        )]
        #ast

        impl #impl_generics Metric for #ident #ty_generics #where_clause {}
    };

    TokenStream::from(expanded)
}

/// Derives the supertraits required by `warung_load::Aggregate`. The trait
/// itself is implemented by hand since `consume` and `merge` are type specific.
#[proc_macro_attribute]
pub fn aggregate(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(item as ItemStruct);
    let expanded = quote! {
        #[derive(
            ::serde::Serialize,
            ::serde::Deserialize,
            ::std::cmp::PartialOrd,
            ::std::cmp::PartialEq,
            ::std::fmt::Debug,
            ::std::clone::Clone
        )]
        #ast
    };

    TokenStream::from(expanded)
}
