use quote::ToTokens;
use syn::punctuated::Punctuated;
use syn::{Attribute, Path, Token};

/// 将 `required` 与已有 `#[derive(...)]` 合并为单个 derive 属性（去重，required 在前），
/// 其他属性保持原顺序跟随其后。
pub(crate) fn apply_derives(attrs: &mut Vec<Attribute>, required: Vec<Path>) {
    let mut retained: Vec<Attribute> = Vec::with_capacity(attrs.len());
    let mut existing: Vec<Path> = Vec::new();

    for attr in attrs.drain(..) {
        if !attr.path().is_ident("derive") {
            retained.push(attr);
            continue;
        }
        if let Ok(list) = attr.parse_args_with(Punctuated::<Path, Token![,]>::parse_terminated) {
            existing.extend(list);
        }
    }

    let mut seen: Vec<String> = Vec::new();
    let merged: Vec<Path> = required
        .into_iter()
        .chain(existing)
        .filter(|p| {
            let key = derive_key(p);
            if seen.contains(&key) {
                false
            } else {
                seen.push(key);
                true
            }
        })
        .collect();

    attrs.push(syn::parse_quote!(#[derive(#(#merged),*)]));
    attrs.extend(retained);
}

// 归一化 derive 名称，避免 `Serialize` 与 `serde::Serialize` 重复派生
fn derive_key(p: &Path) -> String {
    match p.segments.last() {
        Some(last) => match last.ident.to_string().as_str() {
            name @ ("Serialize" | "Deserialize") => format!("serde::{name}"),
            name => name.to_string(),
        },
        None => p.to_token_stream().to_string(),
    }
}
