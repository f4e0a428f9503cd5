use proc_macro::TokenStream;
use proc_macro2::{Ident, Span, TokenStream as TokenStream2};
use proc_macro_crate::{FoundCrate, crate_name};
use quote::quote;
use syn::{Data, DeriveInput, Fields, parse_macro_input};

/// Derives `calmform::form::FormModel`, mapping every named field to a form
/// field of the same name.
#[proc_macro_derive(FormModel)]
pub fn derive_form_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let model_ident = &input.ident;

    if !input.generics.params.is_empty() {
        return syn::Error::new_spanned(
            model_ident,
            "FormModel derive currently supports only non-generic structs",
        )
        .to_compile_error()
        .into();
    }

    let named_fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return syn::Error::new_spanned(
                    model_ident,
                    "FormModel derive requires a struct with named fields",
                )
                .to_compile_error()
                .into();
            }
        },
        _ => {
            return syn::Error::new_spanned(
                model_ident,
                "FormModel derive is only supported on structs",
            )
            .to_compile_error()
            .into();
        }
    };

    let calmform = calmform_path();
    let mut inserts = Vec::new();
    let mut decodes = Vec::new();

    for field in named_fields {
        let Some(field_ident) = &field.ident else {
            continue;
        };
        let field_name = field_name(field_ident);

        inserts.push(quote! {
            values.insert(
                #field_name,
                #calmform::form::FieldValue::from(
                    ::core::clone::Clone::clone(&self.#field_ident),
                ),
            );
        });
        decodes.push(quote! {
            #field_ident: values.decode(#field_name)?
        });
    }

    quote! {
        impl #calmform::form::FormModel for #model_ident {
            fn to_values(&self) -> #calmform::form::FieldValues {
                let mut values = #calmform::form::FieldValues::new();
                #(#inserts)*
                values
            }

            fn from_values(
                values: &#calmform::form::FieldValues,
            ) -> #calmform::form::FormResult<Self> {
                ::core::result::Result::Ok(Self {
                    #(#decodes),*
                })
            }
        }
    }
    .into()
}

fn calmform_path() -> TokenStream2 {
    match crate_name("calmform") {
        Ok(FoundCrate::Name(name)) => {
            let ident = Ident::new(&name, Span::call_site());
            quote!(::#ident)
        }
        Ok(FoundCrate::Itself) => quote!(crate),
        Err(_) => quote!(::calmform),
    }
}

fn field_name(ident: &Ident) -> String {
    let raw = ident.to_string();
    match raw.strip_prefix("r#") {
        Some(stripped) => stripped.to_string(),
        None => raw,
    }
}
