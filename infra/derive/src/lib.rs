#![allow(unreachable_pub)]
#![allow(clippy::needless_pass_by_value)]

//! # Macros
//!
//! Procedural macros shared by the Limbo crates.
//!
//! * [`limbo_error`] turns an enum into a context-aware error type.
//! * [`main`] bootstraps the Tokio runtime from a named profile. It is re-exported
//!   as `limbo_runtime::main` and should be used through that path.

mod macros;

use proc_macro::TokenStream;
use syn::{DeriveInput, ItemFn, parse_macro_input};

/// Attribute macro to bootstrap the Tokio runtime.
///
/// Rewrites an `async fn main` returning a `Result` into a synchronous `fn main`
/// that builds a runtime through `limbo_runtime::build_runtime_with_config`
/// and blocks on the original body.
///
/// # Arguments
///
/// * `high_performance` - server profile, larger stacks and longer keep-alive.
/// * `memory_efficient` - half the worker threads, smaller stacks.
/// * `default` (or no argument) - auto-detected worker threads.
///
/// # Examples
///
/// ```rust,ignore
/// #[limbo_runtime::main(high_performance)]
/// async fn main() -> anyhow::Result<()> {
///     Ok(())
/// }
/// ```
#[proc_macro_attribute]
pub fn main(args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);
    macros::runtime::expand_main(args.into(), input).into()
}

/// Attribute macro for crate error enums.
///
/// # Generated Items
///
/// * `#[derive(Debug, thiserror::Error)]` unless already derived.
/// * `<ErrorName>Ext` trait with `.context(...)` on `Result<T, ErrorName>` and on
///   `Result<T, Source>` for every variant with a source field.
/// * `From<Source>` for variants with a source field.
/// * `From<&'static str>` / `From<String>` when an `Internal` variant exists.
/// * `kind()` returning the variant name as a `&'static str`.
/// * A module-private `format_context` helper for use in `#[error(...)]` strings.
///
/// # Requirements
///
/// Variants must use named fields. A variant with a `source` field (or a field
/// marked `#[source]`/`#[from]`) must also carry `context: Option<Cow<'static, str>>`.
///
/// # Example
///
/// ```rust,ignore
/// use limbo_derive::limbo_error;
/// use std::borrow::Cow;
///
/// #[limbo_error]
/// pub enum UploadError {
///     #[error("I/O failure{}: {source}", format_context(.context))]
///     Io { source: std::io::Error, context: Option<Cow<'static, str>> },
///
///     #[error("Internal fault{}: {message}", format_context(.context))]
///     Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
/// }
///
/// fn open(path: &std::path::Path) -> Result<std::fs::File, UploadError> {
///     std::fs::File::open(path).context("Opening staged upload")
/// }
/// ```
#[proc_macro_attribute]
pub fn limbo_error(_args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    macros::error::expand_derive(input).into()
}
