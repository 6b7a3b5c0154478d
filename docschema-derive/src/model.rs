use crate::attr::{apply_rename_all, container_attrs, field_attrs, ContainerAttrs, HOOKS};
use proc_macro2::TokenStream;
use quote::quote;
use syn::ext::IdentExt;
use syn::punctuated::Punctuated;
use syn::{Data, DeriveInput, Error, Field, Fields, Ident, Token, Visibility};

// derive_model
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input: DeriveInput = match syn::parse2(input) {
        Ok(input) => input,
        Err(err) => return err.to_compile_error(),
    };

    match expand(&input) {
        Ok(tokens) => tokens,
        Err(err) => err.to_compile_error(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream> {
    let ident = &input.ident;
    let type_name = ident.unraw().to_string();

    if !input.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &input.generics,
            "Model cannot be derived for generic types",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            other => {
                return Err(Error::new_spanned(
                    other,
                    "Model can only be derived for structs with named fields",
                ))
            }
        },
        _ => {
            return Err(Error::new_spanned(
                ident,
                "Model can only be derived for structs with named fields",
            ))
        }
    };

    let container = container_attrs(&input.attrs)?;
    let field_descriptors = fields
        .iter()
        .map(|field| field_descriptor(field, &container))
        .collect::<syn::Result<Vec<_>>>()?;
    let capabilities = capabilities(ident, &container);
    let default_slot = default_slot(ident, fields)?;

    Ok(quote! {
        impl ::docschema::schema::FieldShape for #ident {
            fn shape() -> ::docschema::schema::Shape {
                ::docschema::schema::Shape::Object(<Self as ::docschema::schema::Model>::descriptor)
            }

            fn type_label() -> ::std::string::String {
                ::std::string::String::from(#type_name)
            }
        }

        impl ::docschema::schema::Model for #ident {
            fn descriptor() -> ::docschema::schema::TypeDescriptor {
                ::docschema::schema::TypeDescriptor {
                    name: #type_name,
                    type_id: ::std::any::TypeId::of::<Self>(),
                    fields: ::std::vec![#(#field_descriptors),*],
                    capabilities: #capabilities,
                }
            }
        }

        #default_slot
    })
}

// Per-field default filling. Only fields the schema can name get an arm;
// flattened fields are offered every name the struct itself doesn't own.
fn default_slot(ident: &Ident, fields: &Punctuated<Field, Token![,]>) -> syn::Result<TokenStream> {
    let mut arms = Vec::new();
    let mut embedded = Vec::new();

    for field in fields {
        let Some(field_ident) = field.ident.as_ref() else {
            return Err(Error::new_spanned(field, "expected a named field"));
        };
        let attrs = field_attrs(&field.attrs)?;
        if matches!(field.vis, Visibility::Inherited) || attrs.skip {
            continue;
        }
        if attrs.flatten {
            embedded.push(quote! {
                ::docschema::defaults::DefaultSlot::fill_fields(
                    &mut self.#field_ident,
                    ::std::slice::from_ref(field),
                    prefix,
                    pass,
                )?
            });
        } else {
            let name = field_ident.unraw().to_string();
            arms.push(quote! {
                #name => ::docschema::defaults::fill_field(&mut self.#field_ident, field, prefix, pass)?,
            });
        }
    }

    Ok(quote! {
        impl ::docschema::defaults::DefaultSlot for #ident {
            fn fill_slot(
                &mut self,
                field: &::docschema::schema::FieldSchema,
                path: &str,
                pass: ::docschema::defaults::Pass,
            ) -> ::docschema::Result<usize> {
                ::docschema::defaults::fill_model(self, field, path, pass)
            }

            fn from_default(
                field: &::docschema::schema::FieldSchema,
                raw: &str,
                path: &str,
            ) -> ::docschema::Result<Self> {
                ::std::result::Result::Err(::docschema::defaults::unsupported_default(field, raw, path))
            }

            #[allow(unused_variables)]
            fn fill_fields(
                &mut self,
                fields: &[::docschema::schema::FieldSchema],
                prefix: &str,
                pass: ::docschema::defaults::Pass,
            ) -> ::docschema::Result<usize> {
                let mut applied = 0;
                for field in fields {
                    applied += match field.name.as_str() {
                        #(#arms)*
                        _ => 0 #(+ #embedded)*,
                    };
                }
                ::std::result::Result::Ok(applied)
            }
        }
    })
}

fn field_descriptor(field: &Field, container: &ContainerAttrs) -> syn::Result<TokenStream> {
    let Some(field_ident) = field.ident.as_ref() else {
        return Err(Error::new_spanned(field, "expected a named field"));
    };
    let attrs = field_attrs(&field.attrs)?;

    let name = field_ident.unraw().to_string();
    let public = !matches!(field.vis, Visibility::Inherited);
    let embedded = attrs.flatten;

    let storage_tag = if attrs.skip {
        "-".to_string()
    } else {
        let wire = match (&attrs.rename, &container.rename_all) {
            (Some(rename), _) => rename.clone(),
            (None, Some(rule)) => apply_rename_all(rule, &name),
            (None, None) => name.clone(),
        };
        if attrs.omit_empty {
            format!("{wire},omitempty")
        } else {
            wire
        }
    };
    let constraint_tag = attrs.constraints.map(|lit| lit.value()).unwrap_or_default();

    // Fields the schema never looks at don't need a FieldShape impl.
    let (shape, type_label) = if public && !attrs.skip {
        let ty = &field.ty;
        (
            quote!(<#ty as ::docschema::schema::FieldShape>::shape),
            quote!(<#ty as ::docschema::schema::FieldShape>::type_label),
        )
    } else {
        (
            quote!(|| ::docschema::schema::Shape::Scalar(::docschema::schema::FieldKind::Any)),
            quote!(|| ::std::string::String::new()),
        )
    };

    Ok(quote! {
        ::docschema::schema::FieldDescriptor {
            name: #name,
            public: #public,
            embedded: #embedded,
            storage_tag: #storage_tag,
            constraint_tag: #constraint_tag,
            shape: #shape,
            type_label: #type_label,
        }
    })
}

fn capabilities(ident: &Ident, container: &ContainerAttrs) -> TokenStream {
    let compound_indexes = if container.indexes {
        quote!(::std::option::Option::Some(<#ident as ::docschema::schema::Indexable>::indexes))
    } else {
        quote!(::std::option::Option::None)
    };
    let collection_options = if container.options {
        quote!(::std::option::Option::Some(
            <#ident as ::docschema::schema::Configurable>::collection_options
        ))
    } else {
        quote!(::std::option::Option::None)
    };

    let hooks = container.hooks.iter().filter_map(|hook| {
        let (_, name) = HOOKS.iter().find(|(attr, _)| hook == attr)?;
        // Spanned at the hook so a missing impl is reported there.
        let name = Ident::new(name, hook.span());
        Some(quote! {
            {
                fn assert_hook<T: ::docschema::schema::#name>() {}
                assert_hook::<#ident>();
                ::docschema::schema::HookKind::#name
            }
        })
    });

    quote! {
        ::docschema::schema::Capabilities {
            compound_indexes: #compound_indexes,
            collection_options: #collection_options,
            hooks: ::std::vec![#(#hooks),*],
        }
    }
}
