use proc_macro::TokenStream;

mod attr;
mod model;

/// Derive `docschema::schema::Model` for a struct with named fields.
///
/// Field constraints go in `#[docschema("unique,required,min=1")]`. Storage
/// names follow the struct's serde attributes. Optional capabilities are
/// declared on the struct: `#[docschema(indexes, options, hooks(before_create))]`.
///
/// The struct must also implement `serde::Serialize`; defaults are only
/// written into nested structs that serialize as non-empty.
#[proc_macro_derive(Model, attributes(docschema))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    model::derive_model(input.into()).into()
}
