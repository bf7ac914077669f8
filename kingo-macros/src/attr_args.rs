use syn::punctuated::Punctuated;
use syn::{Ident, Lit, LitStr, Result, Token, Type, parse::Parse, parse::ParseStream};

/// 属性参数值：字面量（`"name"`、`true`）或类型（`u64`、`::path::Type<T>`）
pub(crate) enum ArgValue {
    Lit(Lit),
    Type(Box<Type>),
}

pub(crate) struct AttrArg {
    key: Ident,
    value: ArgValue,
}

impl Parse for AttrArg {
    fn parse(input: ParseStream) -> Result<Self> {
        let key: Ident = input.parse()?;
        let _eq: Token![=] = input.parse()?;
        let value = if input.peek(Lit) {
            ArgValue::Lit(input.parse()?)
        } else {
            ArgValue::Type(Box::new(input.parse()?))
        };
        Ok(Self { key, value })
    }
}

/// `key = value, ...` 形式的属性参数集合（键不可重复）
pub(crate) struct AttrArgs {
    args: Vec<AttrArg>,
}

impl Parse for AttrArgs {
    fn parse(input: ParseStream) -> Result<Self> {
        let parsed: Punctuated<AttrArg, Token![,]> = Punctuated::parse_terminated(input)?;
        let mut args: Vec<AttrArg> = Vec::with_capacity(parsed.len());

        for arg in parsed {
            if args.iter().any(|a| a.key == arg.key) {
                return Err(syn::Error::new(
                    arg.key.span(),
                    format!("duplicate key '{}' in attribute", arg.key),
                ));
            }
            args.push(arg);
        }

        Ok(Self { args })
    }
}

impl AttrArgs {
    fn take(&mut self, key: &str) -> Option<AttrArg> {
        let pos = self.args.iter().position(|a| a.key == key)?;
        Some(self.args.remove(pos))
    }

    pub(crate) fn take_type(&mut self, key: &str) -> Result<Option<Type>> {
        match self.take(key) {
            None => Ok(None),
            Some(AttrArg {
                value: ArgValue::Type(ty),
                ..
            }) => Ok(Some(*ty)),
            Some(AttrArg {
                value: ArgValue::Lit(lit),
                ..
            }) => Err(syn::Error::new(
                lit.span(),
                format!("expected a type for '{key}'"),
            )),
        }
    }

    pub(crate) fn take_bool(&mut self, key: &str) -> Result<Option<bool>> {
        match self.take(key) {
            None => Ok(None),
            Some(AttrArg {
                value: ArgValue::Lit(Lit::Bool(b)),
                ..
            }) => Ok(Some(b.value())),
            Some(other) => Err(syn::Error::new(
                other.key.span(),
                format!("expected boolean literal for '{key}'"),
            )),
        }
    }

    pub(crate) fn take_str(&mut self, key: &str) -> Result<Option<LitStr>> {
        match self.take(key) {
            None => Ok(None),
            Some(AttrArg {
                value: ArgValue::Lit(Lit::Str(s)),
                ..
            }) => Ok(Some(s)),
            Some(other) => Err(syn::Error::new(
                other.key.span(),
                format!("expected string literal for '{key}'"),
            )),
        }
    }

    /// 所有已知键取出后调用；剩余键视为未知参数
    pub(crate) fn finish(self, expected: &str) -> Result<()> {
        match self.args.into_iter().next() {
            None => Ok(()),
            Some(arg) => Err(syn::Error::new(
                arg.key.span(),
                format!("unknown key '{}' in attribute; expected {expected}", arg.key),
            )),
        }
    }
}
