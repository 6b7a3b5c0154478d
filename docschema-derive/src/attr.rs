use heck::{ToKebabCase, ToLowerCamelCase, ToShoutyKebabCase, ToShoutySnakeCase, ToSnakeCase, ToUpperCamelCase};
use proc_macro2::TokenStream;
use syn::meta::ParseNestedMeta;
use syn::{Attribute, Error, Ident, LitStr, Token};

///
/// ContainerAttrs
///

#[derive(Default)]
pub struct ContainerAttrs {
    pub indexes: bool,
    pub options: bool,
    pub hooks: Vec<Ident>,
    pub rename_all: Option<String>,
}

/// Hook attribute name and the trait (and `HookKind` variant) it stands for.
pub const HOOKS: [(&str, &str); 6] = [
    ("before_create", "BeforeCreate"),
    ("after_create", "AfterCreate"),
    ("before_save", "BeforeSave"),
    ("after_save", "AfterSave"),
    ("before_delete", "BeforeDelete"),
    ("after_delete", "AfterDelete"),
];

pub fn container_attrs(attrs: &[Attribute]) -> syn::Result<ContainerAttrs> {
    let mut out = ContainerAttrs::default();

    for attr in attrs {
        if attr.path().is_ident("docschema") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("indexes") {
                    out.indexes = true;
                } else if meta.path.is_ident("options") {
                    out.options = true;
                } else if meta.path.is_ident("hooks") {
                    meta.parse_nested_meta(|hook| {
                        let ident = hook.path.require_ident()?;
                        if !HOOKS.iter().any(|(name, _)| ident == name) {
                            return Err(hook.error(
                                "unknown hook, expected one of before_create, after_create, \
                                 before_save, after_save, before_delete, after_delete",
                            ));
                        }
                        out.hooks.push(ident.clone());
                        Ok(())
                    })?;
                } else {
                    return Err(meta.error("expected `indexes`, `options` or `hooks(...)`"));
                }
                Ok(())
            })?;
        } else if attr.path().is_ident("serde") {
            // serde validates its own attributes; only pick out what matters here.
            let _ = attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename_all") {
                    out.rename_all = Some(rename_value(&meta)?);
                } else {
                    skip_value(&meta)?;
                }
                Ok(())
            });
        }
    }

    Ok(out)
}

///
/// FieldAttrs
///

#[derive(Default)]
pub struct FieldAttrs {
    pub constraints: Option<LitStr>,
    pub rename: Option<String>,
    pub skip: bool,
    pub omit_empty: bool,
    pub flatten: bool,
}

pub fn field_attrs(attrs: &[Attribute]) -> syn::Result<FieldAttrs> {
    let mut out = FieldAttrs::default();

    for attr in attrs {
        if attr.path().is_ident("docschema") {
            if out.constraints.is_some() {
                return Err(Error::new_spanned(attr, "duplicate #[docschema] attribute"));
            }
            out.constraints = Some(attr.parse_args::<LitStr>()?);
        } else if attr.path().is_ident("serde") {
            let _ = attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    out.rename = Some(rename_value(&meta)?);
                } else if meta.path.is_ident("skip") || meta.path.is_ident("skip_serializing") {
                    out.skip = true;
                } else if meta.path.is_ident("skip_serializing_if") {
                    out.omit_empty = true;
                    skip_value(&meta)?;
                } else if meta.path.is_ident("flatten") {
                    out.flatten = true;
                } else {
                    skip_value(&meta)?;
                }
                Ok(())
            });
        }
    }

    Ok(out)
}

/// `rename = "x"` or `rename(serialize = "x", deserialize = "y")`; the
/// serialized name wins.
fn rename_value(meta: &ParseNestedMeta) -> syn::Result<String> {
    if meta.input.peek(Token![=]) {
        let lit: LitStr = meta.value()?.parse()?;
        return Ok(lit.value());
    }

    let mut serialized = None;
    meta.parse_nested_meta(|inner| {
        let lit: LitStr = inner.value()?.parse()?;
        if inner.path.is_ident("serialize") {
            serialized = Some(lit.value());
        }
        Ok(())
    })?;
    serialized.ok_or_else(|| meta.error("expected a serialized name"))
}

fn skip_value(meta: &ParseNestedMeta) -> syn::Result<()> {
    if meta.input.peek(Token![=]) {
        let _: syn::Expr = meta.value()?.parse()?;
    } else if meta.input.peek(syn::token::Paren) {
        let content;
        syn::parenthesized!(content in meta.input);
        let _: TokenStream = content.parse()?;
    }
    Ok(())
}

/// Apply a serde `rename_all` rule to a field name.
pub fn apply_rename_all(rule: &str, name: &str) -> String {
    match rule {
        "lowercase" => name.to_lowercase(),
        "UPPERCASE" => name.to_uppercase(),
        "PascalCase" => name.to_upper_camel_case(),
        "camelCase" => name.to_lower_camel_case(),
        "snake_case" => name.to_snake_case(),
        "SCREAMING_SNAKE_CASE" => name.to_shouty_snake_case(),
        "kebab-case" => name.to_kebab_case(),
        "SCREAMING-KEBAB-CASE" => name.to_shouty_kebab_case(),
        _ => name.to_string(),
    }
}
