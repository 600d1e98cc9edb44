use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use std::collections::BTreeSet;
use syn::{Attribute, Data, DeriveInput, Field, Fields, FieldsNamed, Ident, Type, Variant};

struct ErrorVariant<'a> {
    ident: &'a Ident,
    source: Option<&'a Field>,
    has_context: bool,
    cfg_attrs: Vec<Attribute>,
}

impl ErrorVariant<'_> {
    fn source_parts(&self) -> Option<(&Ident, &Type)> {
        let field = self.source?;
        Some((field.ident.as_ref()?, &field.ty))
    }
}

pub fn expand_derive(input: DeriveInput) -> TokenStream {
    let Data::Enum(data) = &input.data else {
        return quote! { compile_error!("limbo_error can only be applied to enums"); };
    };

    let mut variants = Vec::with_capacity(data.variants.len());
    for variant in &data.variants {
        match parse_variant(variant) {
            Ok(parsed) => variants.push(parsed),
            Err(err) => return err.to_compile_error(),
        }
    }
    if let Err(err) = check_source_has_context(&variants) {
        return err.to_compile_error();
    }

    let name = &input.ident;
    let ext = format_ident!("{}Ext", name);

    let derives = missing_derives(&input);
    let ext_trait = expand_ext_trait(name, &ext, &variants);
    let conversions = variants.iter().filter_map(|v| expand_source_conversion(name, &ext, v));
    let internal = expand_internal_conversions(name, &variants);
    let kind = expand_kind(name, &variants);

    quote! {
        #[allow(non_shorthand_field_patterns)]
        #derives
        #input

        #ext_trait
        #(#conversions)*
        #internal
        #kind

        #[allow(dead_code)]
        fn format_context(context: &Option<std::borrow::Cow<'static, str>>) -> std::borrow::Cow<'static, str> {
            context.as_ref().map_or(std::borrow::Cow::Borrowed(""), |c| std::borrow::Cow::Owned(format!(" ({c})")))
        }
    }
}

fn parse_variant(variant: &Variant) -> syn::Result<ErrorVariant<'_>> {
    let Fields::Named(fields) = &variant.fields else {
        return Err(syn::Error::new_spanned(
            variant,
            "limbo_error requires named fields so source/context can be wired",
        ));
    };

    Ok(ErrorVariant {
        ident: &variant.ident,
        source: source_field(fields),
        has_context: context_field(fields)?.is_some(),
        cfg_attrs: variant.attrs.iter().filter(|a| a.path().is_ident("cfg")).cloned().collect(),
    })
}

fn context_field(fields: &FieldsNamed) -> syn::Result<Option<&Field>> {
    let Some(field) = fields.named.iter().find(|f| f.ident.as_ref().is_some_and(|i| i == "context"))
    else {
        return Ok(None);
    };
    if is_optional_static_cow(&field.ty) {
        Ok(Some(field))
    } else {
        Err(syn::Error::new_spanned(&field.ty, "context field must be Option<Cow<'static, str>>"))
    }
}

fn source_field(fields: &FieldsNamed) -> Option<&Field> {
    fields.named.iter().find(|field| {
        field.ident.as_ref().is_some_and(|ident| ident == "source")
            || field.attrs.iter().any(|a| a.path().is_ident("source") || a.path().is_ident("from"))
    })
}

fn check_source_has_context(variants: &[ErrorVariant<'_>]) -> syn::Result<()> {
    match variants.iter().find(|v| v.source.is_some() && !v.has_context) {
        Some(v) => Err(syn::Error::new_spanned(
            v.ident,
            "limbo_error requires `context: Option<Cow<'static, str>>` next to a source field",
        )),
        None => Ok(()),
    }
}

fn missing_derives(input: &DeriveInput) -> TokenStream {
    let present = derived_traits(input);
    let mut wanted = Vec::new();
    if !present.contains("Debug") {
        wanted.push(quote! { Debug });
    }
    if !present.contains("Error") {
        wanted.push(quote! { ::thiserror::Error });
    }
    if wanted.is_empty() {
        quote! {}
    } else {
        quote! { #[derive(#(#wanted),*)] }
    }
}

fn expand_ext_trait(name: &Ident, ext: &Ident, variants: &[ErrorVariant<'_>]) -> TokenStream {
    let arms = variants.iter().filter(|v| v.has_context).map(|v| {
        let cfg_attrs = &v.cfg_attrs;
        let ident = v.ident;
        quote! { #(#cfg_attrs)* #name::#ident { context: c, .. } => *c = Some(context.into()), }
    });

    quote! {
        pub trait #ext<T> {
            fn context(self, context: impl Into<std::borrow::Cow<'static, str>>) -> Result<T, #name>;
        }

        #[automatically_derived]
        impl<T> #ext<T> for Result<T, #name> {
            #[inline]
            fn context(self, context: impl Into<std::borrow::Cow<'static, str>>) -> Self {
                self.map_err(|mut e| {
                    match &mut e {
                        #( #arms )*
                        _ => {}
                    }
                    e
                })
            }
        }
    }
}

fn expand_source_conversion(
    name: &Ident,
    ext: &Ident,
    variant: &ErrorVariant<'_>,
) -> Option<TokenStream> {
    if variant.ident == "Internal" {
        return None;
    }
    let (field, ty) = variant.source_parts()?;
    let ident = variant.ident;
    let cfg_attrs = &variant.cfg_attrs;

    Some(quote! {
        #(#cfg_attrs)*
        #[automatically_derived]
        impl From<#ty> for #name {
            #[inline]
            fn from(#field: #ty) -> Self { Self::#ident { #field, context: None } }
        }

        #(#cfg_attrs)*
        impl<T> #ext<T> for std::result::Result<T, #ty> {
            #[inline]
            fn context(self, context: impl Into<std::borrow::Cow<'static, str>>) -> std::result::Result<T, #name> {
                self.map_err(|#field| #name::#ident { #field, context: Some(context.into()) })
            }
        }
    })
}

fn expand_internal_conversions(name: &Ident, variants: &[ErrorVariant<'_>]) -> TokenStream {
    let Some(internal) = variants.iter().find(|v| v.ident == "Internal") else {
        return quote!();
    };
    let cfg_attrs = &internal.cfg_attrs;

    quote! {
        #(#cfg_attrs)*
        impl From<&'static str> for #name {
            #[inline]
            fn from(s: &'static str) -> Self { Self::Internal { message: std::borrow::Cow::Borrowed(s), context: None } }
        }
        #(#cfg_attrs)*
        impl From<String> for #name {
            #[inline]
            fn from(s: String) -> Self { Self::Internal { message: std::borrow::Cow::Owned(s), context: None } }
        }
    }
}

/// `kind()` returns the variant name, used as a stable structured-logging field.
fn expand_kind(name: &Ident, variants: &[ErrorVariant<'_>]) -> TokenStream {
    let arms = variants.iter().map(|v| {
        let cfg_attrs = &v.cfg_attrs;
        let ident = v.ident;
        let label = ident.to_string();
        quote! { #(#cfg_attrs)* Self::#ident { .. } => #label, }
    });

    quote! {
        #[automatically_derived]
        impl #name {
            #[must_use]
            pub const fn kind(&self) -> &'static str {
                match self {
                    #( #arms )*
                }
            }
        }
    }
}

fn derived_traits(input: &DeriveInput) -> BTreeSet<String> {
    let mut traits = BTreeSet::new();
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("derive")) {
        let _ = attr.parse_nested_meta(|meta| {
            if let Some(seg) = meta.path.segments.last() {
                traits.insert(seg.ident.to_string());
            }
            Ok(())
        });
    }
    traits
}

fn is_optional_static_cow(ty: &Type) -> bool {
    let Some(inner) = single_generic(ty, "Option") else {
        return false;
    };
    let Type::Path(path) = inner else {
        return false;
    };
    let Some(segment) = path.path.segments.last() else {
        return false;
    };
    if segment.ident != "Cow" {
        return false;
    }
    let syn::PathArguments::AngleBracketed(args) = &segment.arguments else {
        return false;
    };
    let mut args = args.args.iter();
    let lifetime_ok = matches!(args.next(), Some(syn::GenericArgument::Lifetime(lt)) if lt.ident == "static");
    let target_ok = matches!(
        args.next(),
        Some(syn::GenericArgument::Type(Type::Path(p)))
            if p.path.segments.last().is_some_and(|s| s.ident == "str")
    );
    lifetime_ok && target_ok
}

fn single_generic<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let syn::PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        syn::GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}
