//! Derive macro for the crate's deterministic binary format.
//!
//! Fields are written in declaration order using the `Encode`/`Decode`
//! impls from `crate::types::encoding` (little-endian integers, `u64`
//! length prefixes for vectors). Only structs are supported: persisted
//! evo data is plain records such as program images and test cases.
//!
//! ```ignore
//! #[derive(BinaryCodec)]
//! pub struct ProgramImage {
//!     pub words: Vec<u16>,
//!     pub length: u32,
//! }
//! ```
//!
//! expands to
//!
//! ```ignore
//! impl Encode for ProgramImage {
//!     fn encode<S: EncodeSink>(&self, out: &mut S) {
//!         self.words.encode(out);
//!         self.length.encode(out);
//!     }
//! }
//!
//! impl Decode for ProgramImage {
//!     fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
//!         Ok(Self { words: Decode::decode(input)?, length: Decode::decode(input)? })
//!     }
//! }
//! ```

use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, parse_macro_input};

pub fn derive_binary_codec(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let Data::Struct(data) = &input.data else {
        return syn::Error::new_spanned(&input, "BinaryCodec derive only supports structs")
            .to_compile_error()
            .into();
    };

    let (encode_body, decode_body) = match &data.fields {
        Fields::Named(fields) => {
            let names: Vec<_> = fields.named.iter().map(|f| &f.ident).collect();
            (
                quote! {
                    #( crate::types::encoding::Encode::encode(&self.#names, out); )*
                },
                quote! {
                    Ok(Self { #( #names: crate::types::encoding::Decode::decode(input)?, )* })
                },
            )
        }
        Fields::Unnamed(fields) => {
            let indices: Vec<_> = (0..fields.unnamed.len()).map(syn::Index::from).collect();
            let reads = indices
                .iter()
                .map(|_| quote! { crate::types::encoding::Decode::decode(input)?, });
            (
                quote! {
                    #( crate::types::encoding::Encode::encode(&self.#indices, out); )*
                },
                quote! {
                    Ok(Self( #(#reads)* ))
                },
            )
        }
        Fields::Unit => (quote! { let _ = out; }, quote! { let _ = input; Ok(Self) }),
    };

    TokenStream::from(quote! {
        impl #impl_generics crate::types::encoding::Encode for #name #ty_generics #where_clause {
            fn encode<S: crate::types::encoding::EncodeSink>(&self, out: &mut S) {
                #encode_body
            }
        }

        impl #impl_generics crate::types::encoding::Decode for #name #ty_generics #where_clause {
            fn decode(input: &mut &[u8]) -> ::std::result::Result<Self, crate::types::encoding::DecodeError> {
                #decode_body
            }
        }
    })
}
