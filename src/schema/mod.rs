//! Schema Graph
//!
//! The introspected API surface, stored in arenas with field→type
//! back-references, plus the introspection collaborators that produce it.

pub mod graph;
pub mod introspection;
pub mod raw;

pub use graph::{link_parents, FieldId, Schema, SchemaField, SchemaType, TypeId};
pub use introspection::{resolve_schema, HttpIntrospector, Introspector};
pub use raw::{EnumValue, InputValue, IntrospectionResponse, RawSchema, TypeKind, TypeRef};
