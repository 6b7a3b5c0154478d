// Static type descriptors produced by #[derive(Model)]

use crate::context::Context;
use crate::defaults::DefaultSlot;
use crate::document::{Decimal128, ObjectId};
use crate::error::Result;
use crate::schema::types::{CollectionOptions, CompoundIndex, FieldKind, HookKind};
use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};

/// Everything the schema parser needs to know about one Rust type.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    pub name: &'static str,
    pub type_id: TypeId,
    pub fields: Vec<FieldDescriptor>,
    pub capabilities: Capabilities,
}

/// One declared field of a described type.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub public: bool,
    /// Flattened into the parent's field list instead of nested.
    pub embedded: bool,
    /// Storage-name annotation, `name[,omitempty]` or `-`.
    pub storage_tag: &'static str,
    /// Constraint annotation, e.g. `unique,required`.
    pub constraint_tag: &'static str,
    pub shape: fn() -> Shape,
    pub type_label: fn() -> String,
}

/// Structural classification of a field's type.
#[derive(Debug, Clone)]
pub enum Shape {
    Scalar(FieldKind),
    Object(fn() -> TypeDescriptor),
    Sequence(Box<Shape>),
}

/// Optional behaviours a model declares. Probed once when the schema is built.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    pub compound_indexes: Option<fn() -> Vec<CompoundIndex>>,
    pub collection_options: Option<fn() -> CollectionOptions>,
    pub hooks: Vec<HookKind>,
}

/// Maps a Rust type onto a [`Shape`].
pub trait FieldShape {
    fn shape() -> Shape;
    fn type_label() -> String;
}

/// A type with a derived descriptor. Implemented by `#[derive(Model)]`.
pub trait Model: FieldShape + DefaultSlot + 'static {
    fn descriptor() -> TypeDescriptor;
}

/// Supplies compound indexes for a model's collection.
pub trait Indexable {
    fn indexes() -> Vec<CompoundIndex>;
}

/// Supplies per-collection consistency settings.
pub trait Configurable {
    fn collection_options() -> CollectionOptions;
}

pub trait BeforeCreate {
    fn before_create(&mut self, ctx: &Context) -> Result<()>;
}

pub trait AfterCreate {
    fn after_create(&mut self, ctx: &Context) -> Result<()>;
}

pub trait BeforeSave {
    fn before_save(&mut self, ctx: &Context) -> Result<()>;
}

pub trait AfterSave {
    fn after_save(&mut self, ctx: &Context) -> Result<()>;
}

pub trait BeforeDelete {
    fn before_delete(&mut self, ctx: &Context) -> Result<()>;
}

pub trait AfterDelete {
    fn after_delete(&mut self, ctx: &Context) -> Result<()>;
}

macro_rules! scalar_shape {
    ($kind:ident => $($ty:ty),+ $(,)?) => {
        $(
            impl FieldShape for $ty {
                fn shape() -> Shape {
                    Shape::Scalar(FieldKind::$kind)
                }

                fn type_label() -> String {
                    stringify!($ty).to_string()
                }
            }
        )+
    };
}

scalar_shape!(Text => String, char);
scalar_shape!(Bool => bool);
scalar_shape!(Int => i8, i16, i32, i64, isize);
scalar_shape!(Uint => u8, u16, u32, u64, usize);
scalar_shape!(Float => f32, f64);
scalar_shape!(ObjectId => ObjectId);
scalar_shape!(Decimal => Decimal128);
scalar_shape!(Any => serde_json::Value);

impl FieldShape for chrono::DateTime<chrono::Utc> {
    fn shape() -> Shape {
        Shape::Scalar(FieldKind::Timestamp)
    }

    fn type_label() -> String {
        "DateTime<Utc>".to_string()
    }
}

impl FieldShape for chrono::NaiveDate {
    fn shape() -> Shape {
        Shape::Scalar(FieldKind::Timestamp)
    }

    fn type_label() -> String {
        "NaiveDate".to_string()
    }
}

impl<T: FieldShape> FieldShape for Option<T> {
    fn shape() -> Shape {
        T::shape()
    }

    fn type_label() -> String {
        format!("Option<{}>", T::type_label())
    }
}

impl<T: FieldShape> FieldShape for Box<T> {
    fn shape() -> Shape {
        T::shape()
    }

    fn type_label() -> String {
        format!("Box<{}>", T::type_label())
    }
}

impl<T: FieldShape> FieldShape for Vec<T> {
    fn shape() -> Shape {
        Shape::Sequence(Box::new(T::shape()))
    }

    fn type_label() -> String {
        format!("Vec<{}>", T::type_label())
    }
}

impl<K, V: FieldShape> FieldShape for HashMap<K, V> {
    fn shape() -> Shape {
        Shape::Scalar(FieldKind::Any)
    }

    fn type_label() -> String {
        format!("HashMap<String, {}>", V::type_label())
    }
}

impl<K, V: FieldShape> FieldShape for BTreeMap<K, V> {
    fn shape() -> Shape {
        Shape::Scalar(FieldKind::Any)
    }

    fn type_label() -> String {
        format!("BTreeMap<String, {}>", V::type_label())
    }
}
