//! microbench Macros
//!
//! Procedural macros that turn a sectioned function into a registered
//! benchmark.
//!
//! ## Macros
//!
//! - `#[bench]` - Extract the `'init` / `'bench` / `'verify` sections, emit the
//!   timing routine and register it for discovery
//! - `#[configure]` - Attach an iteration count and/or display name to a `#[bench]` function

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{Attribute, ItemFn, parse_macro_input};

mod sections;

use sections::{SectionSet, extract, verify_bindings};

/// Unroll count used when a benchmark does not configure one; kept equal to
/// `microbench_core::DEFAULT_ITERATIONS`.
const DEFAULT_UNROLL: u64 = 20;

/// Larger unroll counts are repeated with a runtime loop instead of inline copies
const MAX_INLINE_UNROLL: u64 = 128;

// ============================================================================
// Attribute Parsing Helpers
// ============================================================================

mod attr {
    use syn::meta::ParseNestedMeta;

    /// Get the attribute name as a string
    pub fn name(meta: &ParseNestedMeta) -> String {
        meta.path
            .get_ident()
            .map(|i| i.to_string())
            .unwrap_or_default()
    }

    /// Parse a string literal attribute: `attr = "value"`
    pub fn string(meta: &ParseNestedMeta) -> syn::Result<String> {
        let value: syn::LitStr = meta.value()?.parse()?;
        Ok(value.value())
    }

    /// Parse a positive integer literal attribute: `attr = 42`
    pub fn positive_int(meta: &ParseNestedMeta) -> syn::Result<u64> {
        let value: syn::LitInt = meta.value()?.parse()?;
        let n: u64 = value.base10_parse()?;
        if n == 0 {
            return Err(syn::Error::new_spanned(value, "iterations must be positive"));
        }
        Ok(n)
    }

    /// Create an unknown attribute error
    pub fn unknown(meta: &ParseNestedMeta, name: &str) -> syn::Error {
        meta.error(format!(
            "unknown attribute: {} (expected `iterations` or `name`)",
            name
        ))
    }
}

/// Per-benchmark overrides collected from `#[bench(...)]` and `#[configure(...)]`
#[derive(Debug, Default, PartialEq)]
struct BenchConfig {
    iterations: Option<u64>,
    name: Option<String>,
}

impl BenchConfig {
    /// Parse `iterations = N, name = "..."`; later keys overwrite earlier ones.
    fn merge(&mut self, args: TokenStream2) -> syn::Result<()> {
        if args.is_empty() {
            return Ok(());
        }

        let parser = syn::meta::parser(|meta| {
            let name = attr::name(&meta);
            match name.as_str() {
                "iterations" => self.iterations = Some(attr::positive_int(&meta)?),
                "name" => self.name = Some(attr::string(&meta)?),
                _ => return Err(attr::unknown(&meta, &name)),
            }
            Ok(())
        });

        syn::parse::Parser::parse2(parser, args)
    }
}

fn is_attr(attr: &Attribute, name: &str) -> bool {
    attr.path()
        .segments
        .last()
        .is_some_and(|segment| segment.ident == name)
}

fn attr_args(attr: &Attribute) -> syn::Result<TokenStream2> {
    match &attr.meta {
        syn::Meta::Path(_) => Ok(TokenStream2::new()),
        syn::Meta::List(list) => Ok(list.tokens.clone()),
        syn::Meta::NameValue(nv) => Err(syn::Error::new_spanned(
            nv,
            "expected `#[configure(iterations = N, name = \"...\")]`",
        )),
    }
}

/// Register a benchmark function
///
/// The body is split into three labeled sections:
///
/// ```ignore
/// #[microbench::bench]
/// fn bench_add() {
///     'init: {
///         let x = 1;
///     }
///     'bench: {
///         let y = x + 1;
///     }
///     'verify: {
///         assert_eq!(y, 2);
///     }
/// }
///
/// // With configuration
/// #[microbench::bench(iterations = 5, name = "add")]
/// fn bench_add_configured() { ... }
/// ```
///
/// `'init` runs once, `'bench` is repeated `iterations` times per timed loop
/// pass, `'verify` runs once after the clock stops. Bindings made by the last
/// bench pass are visible in `'verify`. Any statement before the first marker
/// is a compile error. The function itself stays callable and runs each
/// section once.
#[proc_macro_attribute]
pub fn bench(args: TokenStream, item: TokenStream) -> TokenStream {
    let args = TokenStream2::from(args);
    let func = parse_macro_input!(item as ItemFn);

    bench_impl(args, func)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

fn bench_impl(args: TokenStream2, mut func: ItemFn) -> Result<TokenStream2, syn::Error> {
    validate_signature(&func)?;

    let mut config = BenchConfig::default();
    config.merge(args)?;

    // Strip stacked #[configure(...)] attributes, applying them top to bottom
    let mut kept = Vec::with_capacity(func.attrs.len());
    for attr in std::mem::take(&mut func.attrs) {
        if is_attr(&attr, "configure") {
            config.merge(attr_args(&attr)?)?;
        } else {
            kept.push(attr);
        }
    }
    func.attrs = kept;

    let sections = extract(&func.block)?;
    Ok(synthesize(&func, &sections, &config))
}

fn validate_signature(func: &ItemFn) -> syn::Result<()> {
    let sig = &func.sig;
    if !sig.inputs.is_empty() {
        return Err(syn::Error::new_spanned(
            &sig.inputs,
            "microbench: benchmark functions take no arguments",
        ));
    }
    if sig.asyncness.is_some() {
        return Err(syn::Error::new_spanned(
            sig.asyncness,
            "microbench: benchmark functions cannot be async",
        ));
    }
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &sig.generics,
            "microbench: benchmark functions cannot be generic",
        ));
    }
    if !matches!(sig.output, syn::ReturnType::Default) {
        return Err(syn::Error::new_spanned(
            &sig.output,
            "microbench: benchmark functions return nothing",
        ));
    }
    Ok(())
}

/// Emit the flattened function, its timing routine and the registration.
fn synthesize(func: &ItemFn, sections: &SectionSet, config: &BenchConfig) -> TokenStream2 {
    let attrs = &func.attrs;
    let vis = &func.vis;
    let sig = &func.sig;
    let fn_name = &sig.ident;
    let fn_name_str = fn_name.to_string();
    let timed_name = format_ident!("__microbench_timed_{}", fn_name);

    let init = &sections.init;
    let bench = &sections.bench;
    let verify = &sections.verify;

    // With no passes the bench bindings never exist; verify only runs if it
    // does not read them.
    let zero_pass_verify = if verify_bindings(sections).is_empty() {
        quote! { #(#verify)* }
    } else {
        quote! {
            ::core::panic!(
                "benchmark `{}`: verify reads bindings from the bench section, \
                 but the bench section never ran",
                #fn_name_str
            );
        }
    };

    // All passes but the last; the last one runs at function scope so its
    // bindings stay visible to verify.
    let unroll = config.iterations.unwrap_or(DEFAULT_UNROLL);
    let leading_passes = if unroll <= MAX_INLINE_UNROLL {
        let copies: Vec<TokenStream2> = (0..unroll).map(|_| quote! { { #(#bench)* } }).collect();
        let tail = &copies[..copies.len() - 1];
        quote! {
            if __mb_unroll == #unroll {
                for _ in 1..__mb_loops {
                    #(#copies)*
                }
                #(#tail)*
            } else {
                for _ in 1..__mb_passes {
                    #(#bench)*
                }
            }
        }
    } else {
        quote! {
            for _ in 1..__mb_passes {
                #(#bench)*
            }
        }
    };

    let iterations = config
        .iterations
        .map(|v| quote! { ::core::option::Option::Some(#v) })
        .unwrap_or(quote! { ::core::option::Option::None });
    let display_name = config
        .name
        .as_ref()
        .map(|v| quote! { ::core::option::Option::Some(#v) })
        .unwrap_or(quote! { ::core::option::Option::None });

    quote! {
        #(#attrs)*
        #[allow(dead_code)]
        #vis #sig {
            #(#init)*
            #(#bench)*
            #(#verify)*
        }

        #[doc(hidden)]
        #[allow(non_snake_case, unused_variables, unused_mut, unused_assignments, unreachable_code)]
        fn #timed_name(__mb_loops: u64, __mb_unroll: u64) -> f64 {
            let __mb_t0 = ::microbench::internal::Instant::now();
            #(#init)*
            let __mb_passes = __mb_loops.saturating_mul(__mb_unroll);
            if __mb_passes == 0 {
                let __mb_elapsed = __mb_t0.elapsed_secs();
                #zero_pass_verify
                return __mb_elapsed;
            }
            #leading_passes
            #(#bench)*
            let __mb_elapsed = __mb_t0.elapsed_secs();
            #(#verify)*
            __mb_elapsed
        }

        ::microbench::internal::inventory::submit! {
            ::microbench::internal::StaticBenchmark {
                name: #fn_name_str,
                display_name: #display_name,
                iterations: #iterations,
                timed_fn: #timed_name,
                file: file!(),
                line: line!(),
                module_path: module_path!(),
            }
        }
    }
}

/// Attach an iteration count and/or display name to a benchmark
///
/// ```ignore
/// #[microbench::configure(iterations = 5, name = "custom")]
/// #[microbench::bench]
/// fn bench_lookup() { ... }
/// ```
///
/// Must be stacked with `#[bench]`, above or below it. When several are
/// stacked, the one farthest from `#[bench]` wins per field; settings given
/// in `#[configure]` override the arguments of `#[bench]` itself.
#[proc_macro_attribute]
pub fn configure(args: TokenStream, item: TokenStream) -> TokenStream {
    let args = TokenStream2::from(args);
    let func = parse_macro_input!(item as ItemFn);

    configure_impl(args, func)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

fn configure_impl(args: TokenStream2, mut func: ItemFn) -> Result<TokenStream2, syn::Error> {
    // Validate early so errors point at this attribute
    BenchConfig::default().merge(args.clone())?;

    let Some(position) = func.attrs.iter().position(|a| is_attr(a, "bench")) else {
        return Err(syn::Error::new_spanned(
            &func.sig.ident,
            "microbench: #[configure] must be stacked with #[bench]",
        ));
    };

    // Re-attach below #[bench]; the bench expansion strips and applies it.
    // Inserting directly after #[bench] puts outer attributes last, so they win.
    let reattached: Attribute = syn::parse_quote! { #[configure(#args)] };
    func.attrs.insert(position + 1, reattached);

    Ok(quote! { #func })
}
