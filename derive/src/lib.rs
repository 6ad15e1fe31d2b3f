use proc_macro::TokenStream;
use proc_macro2::{Ident, Span};
use proc_macro_crate::FoundCrate;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, LitStr};

/// Derive `anoncreds_bls::Attributes` for a struct with named fields.
///
/// Each field becomes one credential attribute, named after the field unless overridden with
/// `#[anoncreds(name = "...")]`. Raw values are taken from the field's `Display` output.
#[proc_macro_derive(Attributes, attributes(anoncreds))]
pub fn derive_attributes(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let crate_path = match proc_macro_crate::crate_name("anoncreds-bls") {
        Ok(FoundCrate::Itself) => Ident::new("crate", Span::call_site()),
        Ok(FoundCrate::Name(name)) => Ident::new(&name, Span::call_site()),
        Err(_) => {
            return Err(syn::Error::new_spanned(
                struct_name,
                "anoncreds-bls must be a direct dependency",
            ))
        }
    };

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    struct_name,
                    "only structs with named fields are supported",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                struct_name,
                "only structs are supported",
            ))
        }
    };
    if fields.is_empty() {
        return Err(syn::Error::new_spanned(
            struct_name,
            "a credential needs at least one attribute",
        ));
    }

    let mut field_idents = Vec::new();
    let mut attr_names = Vec::new();
    for field in fields.iter() {
        let mut name = field.ident.as_ref().map(|ident| ident.to_string());
        for attr in field.attrs.iter().filter(|a| a.path().is_ident("anoncreds")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let value: LitStr = meta.value()?.parse()?;
                    name = Some(value.value());
                    Ok(())
                } else {
                    Err(meta.error("unsupported anoncreds attribute"))
                }
            })?;
        }
        field_idents.push(field.ident.clone());
        attr_names.push(name.unwrap_or_default());
    }

    Ok(quote! {
        impl #impl_generics #crate_path::Attributes for #struct_name #ty_generics #where_clause {
            fn attribute_names() -> #crate_path::AttributeNames {
                [#(#attr_names),*].into_iter().collect()
            }

            fn credential_values(&self) -> #crate_path::CredentialValues {
                let mut values = #crate_path::CredentialValues::new();
                #(values.add_raw(#attr_names, self.#field_idents.to_string());)*
                values
            }
        }
    })
}
