//! `#[excel_fn(...)]`: turns a plain `fn(args: &[LiteralValue], ctx: &dyn
//! EvalContext) -> Result<LiteralValue, ExcelError>` into a zero-sized type
//! implementing `crate::function::Function`, so a built-in reads as one
//! function body instead of a struct-plus-impl boilerplate pair.
//!
//! ```ignore
//! #[excel_fn(name = "SUM", min = 1, variadic)]
//! fn sum(args: &[LiteralValue], ctx: &dyn EvalContext) -> Result<LiteralValue, ExcelError> {
//!     ...
//! }
//! ```
//!
//! expands to the original function (kept as a private helper) plus a
//! `SumFn` unit struct implementing `Function` by delegating `eval` to it.

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::punctuated::Punctuated;
use syn::{parse_macro_input, Ident, ItemFn, Lit, Meta, Token};

struct FnSpec {
    name: String,
    min_args: usize,
    variadic: bool,
    volatile: bool,
}

impl FnSpec {
    fn from_metas(metas: Punctuated<Meta, Token![,]>, fallback_name: &str) -> Self {
        let mut spec = FnSpec {
            name: fallback_name.to_ascii_uppercase(),
            min_args: 0,
            variadic: false,
            volatile: false,
        };
        for meta in metas {
            match meta {
                Meta::NameValue(nv) if nv.path.is_ident("name") => {
                    if let syn::Expr::Lit(expr_lit) = &nv.value {
                        if let Lit::Str(s) = &expr_lit.lit {
                            spec.name = s.value();
                        }
                    }
                }
                Meta::NameValue(nv) if nv.path.is_ident("min") => {
                    if let syn::Expr::Lit(expr_lit) = &nv.value {
                        if let Lit::Int(i) = &expr_lit.lit {
                            spec.min_args = i.base10_parse().unwrap_or(0);
                        }
                    }
                }
                Meta::Path(p) if p.is_ident("variadic") => spec.variadic = true,
                Meta::Path(p) if p.is_ident("volatile") => spec.volatile = true,
                _ => {}
            }
        }
        spec
    }
}

fn pascal_case(snake: &str) -> String {
    snake
        .split('_')
        .filter(|s| !s.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

#[proc_macro_attribute]
pub fn excel_fn(attr: TokenStream, item: TokenStream) -> TokenStream {
    let item_fn = parse_macro_input!(item as ItemFn);
    let fn_ident = item_fn.sig.ident.clone();

    let parser = Punctuated::<Meta, Token![,]>::parse_terminated;
    let metas = parser.parse(attr).unwrap_or_default();
    let spec = FnSpec::from_metas(metas, &fn_ident.to_string());

    let struct_ident = Ident::new(&format!("{}Fn", pascal_case(&fn_ident.to_string())), Span::call_site());
    let name = spec.name;
    let min_args = spec.min_args;
    let variadic = spec.variadic;
    let volatile = spec.volatile;

    let expanded = quote! {
        #item_fn

        #[doc(hidden)]
        #[derive(Default)]
        pub struct #struct_ident;

        impl crate::function::Function for #struct_ident {
            fn name(&self) -> &'static str {
                #name
            }

            fn volatile(&self) -> bool {
                #volatile
            }

            fn min_args(&self) -> usize {
                #min_args
            }

            fn variadic(&self) -> bool {
                #variadic
            }

            fn eval(
                &self,
                args: &[formualizer_common::LiteralValue],
                ctx: &dyn crate::context::EvalContext,
            ) -> Result<formualizer_common::LiteralValue, formualizer_common::ExcelError> {
                #fn_ident(args, ctx)
            }
        }
    };

    expanded.into()
}
