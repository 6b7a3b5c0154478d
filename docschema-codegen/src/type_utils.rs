use docschema::InferredType;
use heck::{ToPascalCase, ToSnakeCase};
use proc_macro2::{Ident, Span, TokenStream};
use quote::{format_ident, quote};

/// Convert a collection name to its singular PascalCase struct name.
/// e.g. "users" -> "User", "order_items" -> "OrderItem", "app.categories" -> "AppCategory"
pub fn collection_struct_name(collection_name: &str) -> String {
    let name = singularize(collection_name).to_pascal_case();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        format!("Model{name}")
    } else {
        name
    }
}

/// Naive singularization of English words.
pub fn singularize(word: &str) -> String {
    let w = word.to_lowercase();
    if w.ends_with("ies") {
        format!("{}y", &w[..w.len() - 3])
    } else if w.ends_with("ses") || w.ends_with("xes") || w.ends_with("zes") {
        w[..w.len() - 2].to_string()
    } else if w.ends_with("ves") {
        format!("{}f", &w[..w.len() - 3])
    } else if w.ends_with('s') && !w.ends_with("ss") {
        w[..w.len() - 1].to_string()
    } else {
        w
    }
}

const STRICT_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "dyn", "else", "enum", "extern",
    "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut",
    "pub", "ref", "return", "static", "struct", "trait", "true", "type", "unsafe", "use",
    "where", "while", "abstract", "become", "box", "do", "final", "macro", "override", "priv",
    "typeof", "unsized", "virtual", "yield", "try",
];

/// Keywords that can't be raw identifiers.
const RESERVED: &[&str] = &["self", "super", "crate", "Self"];

/// Rust field name for a stored field name.
///
/// Wire names are snake-cased; anything left that isn't a plain identifier
/// gets a `field_` prefix, and keywords become raw identifiers.
pub fn field_ident_name(wire: &str) -> String {
    let snake = wire.to_snake_case();
    if snake.is_empty() || snake.starts_with(|c: char| c.is_ascii_digit()) {
        return format!("field_{snake}");
    }
    if RESERVED.contains(&snake.as_str()) {
        return format!("{snake}_");
    }
    if STRICT_KEYWORDS.contains(&snake.as_str()) {
        return format!("r#{snake}");
    }
    snake
}

pub fn safe_field_ident(wire: &str) -> Ident {
    let name = field_ident_name(wire);
    match name.strip_prefix("r#") {
        Some(raw) => Ident::new_raw(raw, Span::call_site()),
        None => format_ident!("{}", name),
    }
}

/// Map an inferred type to its Rust type.
///
/// Fields missing from some sampled documents are wrapped in `Option` unless
/// the inference already made them nullable.
pub fn field_rust_type(inferred: &InferredType, required: bool) -> TokenStream {
    let base = inferred_type_tokens(inferred);
    if required || matches!(inferred, InferredType::Nullable(_)) {
        base
    } else {
        quote! { Option<#base> }
    }
}

fn inferred_type_tokens(inferred: &InferredType) -> TokenStream {
    match inferred {
        InferredType::String => quote! { String },
        InferredType::Int32 => quote! { i32 },
        InferredType::Int64 => quote! { i64 },
        InferredType::Double => quote! { f64 },
        InferredType::Bool => quote! { bool },
        InferredType::ObjectId => quote! { ObjectId },
        InferredType::DateTime => quote! { DateTime<Utc> },
        InferredType::Binary => quote! { Vec<u8> },
        InferredType::Decimal => quote! { Decimal128 },
        InferredType::Document | InferredType::Null | InferredType::Any => {
            quote! { serde_json::Value }
        }
        InferredType::Array(None) => quote! { Vec<serde_json::Value> },
        InferredType::Array(Some(inner)) => {
            let inner = inferred_type_tokens(inner);
            quote! { Vec<#inner> }
        }
        InferredType::Nullable(inner) => {
            let inner = inferred_type_tokens(inner);
            quote! { Option<#inner> }
        }
    }
}

/// Whether the generated type mentions `name` anywhere (for imports).
pub fn uses_type(inferred: &InferredType, name: &InferredType) -> bool {
    match inferred {
        InferredType::Array(Some(inner)) | InferredType::Nullable(inner) => uses_type(inner, name),
        other => other == name,
    }
}
