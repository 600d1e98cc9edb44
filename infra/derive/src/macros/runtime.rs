use proc_macro2::TokenStream;
use quote::quote;
use syn::{Error, Ident, ItemFn, ReturnType, Type};

enum Profile {
    Default,
    HighPerformance,
    MemoryEfficient,
}

impl Profile {
    fn parse(args: TokenStream) -> syn::Result<Self> {
        if args.is_empty() {
            return Ok(Self::Default);
        }
        let ident: Ident = syn::parse2(args)?;
        match ident.to_string().as_str() {
            "default" => Ok(Self::Default),
            "high_performance" => Ok(Self::HighPerformance),
            "memory_efficient" => Ok(Self::MemoryEfficient),
            _ => Err(Error::new_spanned(
                ident,
                "unknown runtime profile, expected one of: default, high_performance, memory_efficient",
            )),
        }
    }

    fn config_expr(&self) -> TokenStream {
        match self {
            Self::Default => quote! { ::limbo_runtime::RuntimeConfig::default() },
            Self::HighPerformance => quote! { ::limbo_runtime::RuntimeConfig::high_performance() },
            Self::MemoryEfficient => quote! { ::limbo_runtime::RuntimeConfig::memory_efficient() },
        }
    }
}

/// Expands `#[limbo_runtime::main]` into a plain `fn main` driving the async body.
#[must_use]
pub fn expand_main(args: TokenStream, input: ItemFn) -> TokenStream {
    if input.sig.asyncness.is_none() {
        return Error::new_spanned(
            &input.sig.ident,
            "#[limbo_runtime::main] can only be applied to an async fn",
        )
        .to_compile_error();
    }
    if !returns_result(&input.sig.output) {
        return Error::new_spanned(
            &input.sig.output,
            "#[limbo_runtime::main] requires the function to return a Result",
        )
        .to_compile_error();
    }

    let config = match Profile::parse(args) {
        Ok(profile) => profile.config_expr(),
        Err(err) => return err.to_compile_error(),
    };

    let ItemFn { attrs, vis, sig, block } = input;
    let name = &sig.ident;
    let output = &sig.output;

    quote! {
        #(#attrs)*
        #vis fn #name() #output {
            let config = #config;
            let rt = ::limbo_runtime::build_runtime_with_config(&config)?;
            rt.block_on(async #block)
        }
    }
}

fn returns_result(output: &ReturnType) -> bool {
    let ReturnType::Type(_, ty) = output else {
        return false;
    };
    let Type::Path(path) = &**ty else {
        return false;
    };
    path.path.segments.last().is_some_and(|seg| seg.ident == "Result")
}
