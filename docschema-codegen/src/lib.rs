//! docschema code generation: turns discovered collections into model source.
//!
//! The main entry point is [`generate_models`], which renders one
//! `#[derive(Model)]` struct per collection, with constraint annotations taken
//! from the discovered index flags.

mod struct_gen;
pub mod type_utils;

use docschema::discovery::DiscoveredCollection;
use docschema::{Context, DiscoverOptions, DocumentStore, InferredType};
use proc_macro2::TokenStream;
use quote::quote;

pub use struct_gen::{constraint_tag, has_base};

/// Render a single collection as a formatted source file.
pub fn generate_model(collection: &DiscoveredCollection) -> Result<String, syn::Error> {
    generate_models(std::slice::from_ref(collection))
}

/// Render every collection into one formatted source file, sorted by
/// collection name.
pub fn generate_models(collections: &[DiscoveredCollection]) -> Result<String, syn::Error> {
    let mut sorted: Vec<_> = collections.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let imports = generate_imports(&sorted);
    let structs = sorted.iter().map(|c| struct_gen::generate_collection_struct(c));

    format_token_stream(quote! {
        #imports
        #(#structs)*
    })
}

/// Discover the store's collections and write their models to `output_path`.
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = docschema::SqliteStore::open(std::path::Path::new("app.db"))?;
/// docschema_codegen::generate_from_store(
///     &store,
///     &docschema::Context::background(),
///     &docschema::DiscoverOptions::default(),
///     "src/models.rs",
/// )?;
/// # Ok(())
/// # }
/// ```
pub fn generate_from_store(
    store: &dyn DocumentStore,
    ctx: &Context,
    options: &DiscoverOptions,
    output_path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let collections = docschema::discover(store, ctx, options)?;
    let code = generate_models(&collections)?;
    std::fs::write(output_path, code)?;
    log::info!("wrote {} models to {output_path}", collections.len());
    Ok(())
}

fn generate_imports(collections: &[&DiscoveredCollection]) -> TokenStream {
    let uses = |ty: InferredType| {
        collections.iter().any(|c| {
            let with_base = has_base(c);
            c.fields
                .iter()
                .filter(|f| !(with_base && struct_gen::BASE_FIELDS.contains(&f.name.as_str())))
                .any(|f| type_utils::uses_type(&f.inferred, &ty))
        })
    };

    let mut docschema_items = vec![quote!(Model)];
    if collections.iter().any(|c| has_base(c)) {
        docschema_items.insert(0, quote!(Base));
    }
    if uses(InferredType::Decimal) {
        docschema_items.push(quote!(Decimal128));
    }
    if uses(InferredType::ObjectId) {
        docschema_items.push(quote!(ObjectId));
    }
    let chrono_import = uses(InferredType::DateTime).then(|| quote!(use chrono::{DateTime, Utc};));

    quote! {
        #chrono_import
        use docschema::{#(#docschema_items),*};
        use serde::{Deserialize, Serialize};
    }
}

fn format_token_stream(tokens: TokenStream) -> Result<String, syn::Error> {
    let file: syn::File = syn::parse2(tokens)?;
    Ok(prettyplease::unparse(&file))
}
