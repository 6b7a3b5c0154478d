use docschema::discovery::{DiscoveredCollection, DiscoveredField};
use docschema::InferredType;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use std::collections::HashSet;

use crate::type_utils::{collection_struct_name, field_ident_name, field_rust_type, safe_field_ident};

/// Stored names covered by `docschema::Base`.
pub const BASE_FIELDS: [&str; 4] = ["_id", "created_at", "updated_at", "__v"];

/// Whether the collection's documents look like they embed `Base`.
///
/// Every base field present must have the type `Base` stores it as, or the
/// generated model couldn't read the live documents back.
pub fn has_base(collection: &DiscoveredCollection) -> bool {
    let present = ["_id", "created_at", "updated_at"]
        .iter()
        .any(|name| collection.field(name).is_some());
    present && BASE_FIELDS.iter().all(|name| {
        collection
            .field(name)
            .map_or(true, |field| base_compatible(name, &field.inferred))
    })
}

fn base_compatible(name: &str, inferred: &InferredType) -> bool {
    match name {
        "_id" => *inferred == InferredType::ObjectId,
        "__v" => matches!(inferred, InferredType::Int32 | InferredType::Int64),
        _ => match inferred {
            InferredType::Nullable(inner) => **inner == InferredType::DateTime,
            other => *other == InferredType::DateTime,
        },
    }
}

/// Generate a model struct for a discovered collection.
pub fn generate_collection_struct(collection: &DiscoveredCollection) -> TokenStream {
    let struct_ident = format_ident!("{}", collection_struct_name(&collection.name));
    let doc_comment = format!(
        " A document in the `{}` collection.\n {} documents at discovery time.",
        collection.name, collection.doc_count
    );

    let with_base = has_base(collection);
    let base_field = with_base.then(|| {
        quote! {
            #[serde(flatten)]
            pub base: Base,
        }
    });

    let mut taken: HashSet<String> = HashSet::new();
    if with_base {
        taken.insert("base".to_string());
    }

    let field_tokens: Vec<_> = collection
        .fields
        .iter()
        .filter(|field| !(with_base && BASE_FIELDS.contains(&field.name.as_str())))
        .map(|field| generate_field(field, &mut taken))
        .collect();

    quote! {
        #[doc = #doc_comment]
        #[derive(Debug, Clone, Serialize, Deserialize, Model)]
        pub struct #struct_ident {
            #base_field
            #(#field_tokens)*
        }
    }
}

/// Generate a struct field with its serde and constraint attributes.
fn generate_field(field: &DiscoveredField, taken: &mut HashSet<String>) -> TokenStream {
    let ident = unique_ident(&field.name, taken);
    let ty = field_rust_type(&field.inferred, field.required);

    let wire = &field.name;
    let mut serde_args = Vec::new();
    if ident.to_string().trim_start_matches("r#") != wire.as_str() {
        serde_args.push(quote! { rename = #wire });
    }
    if !field.required {
        serde_args.push(quote! { default });
        serde_args.push(quote! { skip_serializing_if = "Option::is_none" });
    }
    let serde_attr = (!serde_args.is_empty()).then(|| quote! { #[serde(#(#serde_args),*)] });

    let constraints = constraint_tag(field);
    let docschema_attr = (!constraints.is_empty()).then(|| quote! { #[docschema(#constraints)] });

    quote! {
        #serde_attr
        #docschema_attr
        pub #ident: #ty,
    }
}

/// Snake-cased identifier, suffixed when two stored names collapse to one.
fn unique_ident(wire: &str, taken: &mut HashSet<String>) -> proc_macro2::Ident {
    let base = field_ident_name(wire);
    if taken.insert(base.clone()) {
        return safe_field_ident(wire);
    }
    let stem = base.trim_start_matches("r#");
    let mut n = 2;
    loop {
        let name = format!("{stem}_{n}");
        if taken.insert(name.clone()) {
            return format_ident!("{}", name);
        }
        n += 1;
    }
}

/// `unique,index,required` built from the discovery flags.
pub fn constraint_tag(field: &DiscoveredField) -> String {
    let mut parts = Vec::new();
    if field.unique {
        parts.push("unique");
    } else if field.indexed {
        parts.push("index");
    }
    if field.required {
        parts.push("required");
    }
    parts.join(",")
}
