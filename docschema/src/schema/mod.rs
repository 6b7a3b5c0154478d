mod descriptor;
mod parser;
mod types;

pub use descriptor::{
    AfterCreate, AfterDelete, AfterSave, BeforeCreate, BeforeDelete, BeforeSave, Capabilities,
    Configurable, FieldDescriptor, FieldShape, Indexable, Model, Shape, TypeDescriptor,
};
pub use parser::{build_schema, parse_schema};
pub use types::{
    CollectionOptions, CompoundIndex, FieldKind, FieldSchema, HookKind, ReadConcern,
    ReadPreference, Schema, WriteConcern,
};
pub(crate) use types::is_zero_value;
