extern crate proc_macro;

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput, Ident};

/// Implements `arpc::RpcParam` for a serde type (JSON and MsgPack).
///
/// `#[rpc_param(protobuf)]` adds a protobuf arm, for types that also derive
/// `prost::Message`.
#[proc_macro_derive(RpcParam, attributes(rpc_param))]
pub fn rpc_param(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let name = input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let protobuf = input.attrs.iter().any(|attr| {
        attr.path().is_ident("rpc_param")
            && attr
                .parse_args::<Ident>()
                .map(|ident| ident == "protobuf")
                .unwrap_or(false)
    });

    let (into_protobuf, from_protobuf) = if protobuf {
        (
            quote! {
                ::arpc::SerializeType::ProtoBuffer => Ok(::prost::Message::encode_to_vec(self)),
            },
            quote! {
                ::arpc::SerializeType::ProtoBuffer => {
                    *self = <Self as ::prost::Message>::decode(data).map_err(|err| {
                        ::arpc::Error::new(::arpc::ErrorKind::Serialization, err)
                    })?;
                    Ok(())
                }
            },
        )
    } else {
        (quote! {}, quote! {})
    };

    let expanded = quote! {
        impl #impl_generics ::arpc::RpcParam for #name #ty_generics #where_clause {
            fn into_bytes(&self, st: ::arpc::SerializeType) -> ::arpc::Result<Vec<u8>> {
                match st {
                    #into_protobuf
                    _ => ::arpc::serde_into_bytes(self, st),
                }
            }
            fn from_slice(&mut self, st: ::arpc::SerializeType, data: &[u8]) -> ::arpc::Result<()> {
                match st {
                    #from_protobuf
                    _ => {
                        *self = ::arpc::serde_from_slice(st, data)?;
                        Ok(())
                    }
                }
            }
        }
    };

    // Hand the output tokens back to the compiler
    TokenStream::from(expanded)
}
