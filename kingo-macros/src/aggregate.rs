use crate::attr_args::AttrArgs;
use crate::derive_utils::apply_derives;
use crate::field_utils::ensure_leading_fields;
use proc_macro::TokenStream;
use quote::quote;
use syn::spanned::Spanned;
use syn::{Item, LitStr, Type, parse_macro_input};

/// #[aggregate] 宏实现
/// - 若缺失则追加字段 `key`、`version` 并置于字段最前
/// - 派生 Clone、Default（以及默认开启的 Debug）
/// - 实现 `::kingo_domain::aggregate::Aggregate` 与 `with_key` 构造函数
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as AttrArgs);
    let input = parse_macro_input!(item as Item);

    let mut st = match input {
        Item::Struct(s) => s,
        other => {
            return syn::Error::new(other.span(), "#[aggregate] only on struct")
                .to_compile_error()
                .into();
        }
    };

    let cfg = match AggregateConfig::from_args(args, &st.ident) {
        Ok(cfg) => cfg,
        Err(err) => return err.to_compile_error().into(),
    };

    let fields_named = match &mut st.fields {
        syn::Fields::Named(f) => f,
        _ => {
            return syn::Error::new(st.span(), "#[aggregate] only supports named-field struct")
                .to_compile_error()
                .into();
        }
    };

    ensure_leading_fields(
        fields_named,
        &[("key", &cfg.key_ty), ("version", &cfg.version_ty)],
    );

    let mut required: Vec<syn::Path> = vec![syn::parse_quote!(Clone), syn::parse_quote!(Default)];
    if cfg.derive_debug {
        required.insert(0, syn::parse_quote!(Debug));
    }
    apply_derives(&mut st.attrs, required);

    let ident = &st.ident;
    let (impl_generics, ty_generics, where_clause) = st.generics.split_for_impl();
    let key_ty = &cfg.key_ty;
    let version_ty = &cfg.version_ty;
    let name = &cfg.name;

    let expanded = quote! {
        #st

        impl #impl_generics ::kingo_domain::aggregate::Aggregate for #ident #ty_generics #where_clause {
            const TYPE: &'static str = #name;

            type Key = #key_ty;
            type Version = #version_ty;

            fn key(&self) -> &Self::Key { &self.key }

            fn version(&self) -> Self::Version { self.version }

            fn version_mut(&mut self) -> &mut Self::Version { &mut self.version }
        }

        impl #impl_generics #ident #ty_generics #where_clause {
            /// 以给定键创建初始版本的聚合，其余字段取默认值
            pub fn with_key(key: #key_ty) -> Self {
                Self { key, ..::core::default::Default::default() }
            }
        }
    };

    TokenStream::from(expanded)
}

struct AggregateConfig {
    key_ty: Type,
    version_ty: Type,
    name: LitStr,
    derive_debug: bool,
}

impl AggregateConfig {
    fn from_args(mut args: AttrArgs, ident: &syn::Ident) -> syn::Result<Self> {
        let key_ty = args
            .take_type("key")?
            .unwrap_or_else(|| syn::parse_quote! { String });
        let version_ty = args
            .take_type("version")?
            .unwrap_or_else(|| syn::parse_quote! { ::kingo_domain::version::AggregateVersion });
        let name = args
            .take_str("name")?
            .unwrap_or_else(|| LitStr::new(&ident.to_string(), ident.span()));
        let derive_debug = args.take_bool("debug")?.unwrap_or(true);
        args.finish("'key' | 'version' | 'name' | 'debug'")?;

        Ok(Self {
            key_ty,
            version_ty,
            name,
            derive_debug,
        })
    }
}
