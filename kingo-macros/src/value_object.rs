use crate::attr_args::AttrArgs;
use crate::derive_utils::apply_derives;
use proc_macro::TokenStream;
use quote::quote;
use syn::spanned::Spanned;
use syn::{Item, parse_macro_input};

/// #[value_object] 宏实现
/// - 支持结构体（具名或 tuple）与枚举
/// - 合并/追加派生：Default, Clone, Serialize, Deserialize, PartialEq, Eq
/// - `debug = false` 时不派生 Debug
/// - `ordered = true` 时额外派生 Copy, PartialOrd, Ord, Hash（版本号等可比较值）
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as AttrArgs);
    let mut input = parse_macro_input!(item as Item);

    let cfg = match ValueObjectConfig::from_args(args) {
        Ok(cfg) => cfg,
        Err(err) => return err.to_compile_error().into(),
    };

    let mut required: Vec<syn::Path> = vec![
        syn::parse_quote!(Default),
        syn::parse_quote!(Clone),
        syn::parse_quote!(serde::Serialize),
        syn::parse_quote!(serde::Deserialize),
        syn::parse_quote!(PartialEq),
        syn::parse_quote!(Eq),
    ];

    if cfg.derive_debug {
        required.insert(0, syn::parse_quote!(Debug));
    }

    if cfg.ordered {
        required.extend([
            syn::parse_quote!(Copy),
            syn::parse_quote!(PartialOrd),
            syn::parse_quote!(Ord),
            syn::parse_quote!(Hash),
        ]);
    }

    match &mut input {
        Item::Struct(st) => {
            apply_derives(&mut st.attrs, required);
            TokenStream::from(quote! { #st })
        }
        Item::Enum(en) => {
            apply_derives(&mut en.attrs, required);
            TokenStream::from(quote! { #en })
        }
        other => syn::Error::new(other.span(), "#[value_object] only supports struct or enum")
            .to_compile_error()
            .into(),
    }
}

struct ValueObjectConfig {
    derive_debug: bool,
    ordered: bool,
}

impl ValueObjectConfig {
    fn from_args(mut args: AttrArgs) -> syn::Result<Self> {
        let derive_debug = args.take_bool("debug")?.unwrap_or(true);
        let ordered = args.take_bool("ordered")?.unwrap_or(false);
        args.finish("'debug' | 'ordered'")?;

        Ok(Self {
            derive_debug,
            ordered,
        })
    }
}
