//! Derive macros for the evo crate.
//!
//! Provides:
//! - `#[derive(Error)]` - `Display` + `std::error::Error` for error enums
//! - `#[derive(BinaryCodec)]` - `Encode`/`Decode` for persisted structs

mod binary_codec;
mod error;

use proc_macro::TokenStream;

/// Implements `crate::types::encoding::{Encode, Decode}` field by field.
#[proc_macro_derive(BinaryCodec)]
pub fn derive_binary_codec(input: TokenStream) -> TokenStream {
    binary_codec::derive_binary_codec(input)
}

/// Implements `Display` and `Error` for an enum whose variants carry `#[error("...")]`.
#[proc_macro_derive(Error, attributes(error))]
pub fn derive_error(input: TokenStream) -> TokenStream {
    error::derive_error(input)
}
