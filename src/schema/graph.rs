//! Arena-backed schema graph
//!
//! Types and fields live in index-addressable vectors. A field's owning type is
//! stored as a [`TypeId`] rather than a pointer, so the type→field→type cycle
//! never turns into an ownership cycle.

use crate::error::{GenerationError, IntrospectionError};
use crate::schema::raw::{
    EnumValue, GraphQLEnvelope, InputValue, IntrospectionResponse, RawSchema, TypeKind, TypeRef,
};
use std::collections::HashMap;

/// Index of a type in [`Schema::types`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub usize);

/// Index of a field in the schema's field arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaType {
    pub name: String,
    pub kind: TypeKind,
    pub description: Option<String>,
    pub input_fields: Vec<InputValue>,
    pub enum_values: Vec<EnumValue>,
    field_ids: Vec<FieldId>,
}

impl SchemaType {
    /// Fields declared on this type, in declaration order.
    pub fn field_ids(&self) -> &[FieldId] {
        &self.field_ids
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaField {
    pub name: String,
    pub description: Option<String>,
    pub type_ref: TypeRef,
    pub args: Vec<InputValue>,
    pub is_deprecated: bool,
    pub deprecation_reason: Option<String>,
    parent: Option<TypeId>,
}

impl SchemaField {
    /// Owning type. `None` until [`link_parents`] has run.
    pub fn parent(&self) -> Option<TypeId> {
        self.parent
    }
}

/// Navigable schema graph handed to generators.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    types: Vec<SchemaType>,
    fields: Vec<SchemaField>,
    by_name: HashMap<String, TypeId>,
    query_type: Option<String>,
    mutation_type: Option<String>,
    subscription_type: Option<String>,
}

impl Schema {
    /// Build the arenas from a decoded introspection schema.
    ///
    /// Field parents start unset; call [`link_parents`] before handing the
    /// graph to a generator.
    pub fn from_raw(raw: RawSchema) -> Self {
        let mut schema = Schema {
            query_type: raw.query_type.map(|t| t.name),
            mutation_type: raw.mutation_type.map(|t| t.name),
            subscription_type: raw.subscription_type.map(|t| t.name),
            ..Default::default()
        };

        for raw_type in raw.types {
            let type_id = TypeId(schema.types.len());
            let mut field_ids = Vec::with_capacity(raw_type.fields.len());
            for raw_field in raw_type.fields {
                field_ids.push(FieldId(schema.fields.len()));
                schema.fields.push(SchemaField {
                    name: raw_field.name,
                    description: raw_field.description,
                    type_ref: raw_field.type_ref,
                    args: raw_field.args,
                    is_deprecated: raw_field.is_deprecated,
                    deprecation_reason: raw_field.deprecation_reason,
                    parent: None,
                });
            }
            schema.by_name.insert(raw_type.name.clone(), type_id);
            schema.types.push(SchemaType {
                name: raw_type.name,
                kind: raw_type.kind,
                description: raw_type.description,
                input_fields: raw_type.input_fields,
                enum_values: raw_type.enum_values,
                field_ids,
            });
        }

        schema
    }

    /// Decode an introspection payload, build the graph and link parents.
    ///
    /// Returns the linked schema together with its version tag.
    pub fn from_introspection_json(payload: &str) -> Result<(Schema, String), IntrospectionError> {
        let response = decode_introspection(payload)?;
        let mut schema = Schema::from_raw(response.schema);
        link_parents(&mut schema);
        Ok((schema, response.schema_version))
    }

    pub fn types(&self) -> impl Iterator<Item = (TypeId, &SchemaType)> {
        self.types.iter().enumerate().map(|(i, t)| (TypeId(i), t))
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn get_type(&self, id: TypeId) -> Option<&SchemaType> {
        self.types.get(id.0)
    }

    pub fn type_by_name(&self, name: &str) -> Option<(TypeId, &SchemaType)> {
        let id = *self.by_name.get(name)?;
        self.types.get(id.0).map(|t| (id, t))
    }

    pub fn field(&self, id: FieldId) -> Option<&SchemaField> {
        self.fields.get(id.0)
    }

    /// Fields of a type, in declaration order
    pub fn fields_of(&self, id: TypeId) -> impl Iterator<Item = (FieldId, &SchemaField)> {
        self.types
            .get(id.0)
            .map(|t| t.field_ids.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|fid| self.fields.get(fid.0).map(|f| (*fid, f)))
    }

    /// Whether every field points back at the type that declares it.
    pub fn is_linked(&self) -> bool {
        self.types.iter().enumerate().all(|(index, schema_type)| {
            schema_type
                .field_ids
                .iter()
                .all(|fid| self.fields.get(fid.0).map(|f| f.parent) == Some(Some(TypeId(index))))
        })
    }

    /// Owning type of a field, resolved through the parent index
    pub fn parent_of(&self, id: FieldId) -> Option<&SchemaType> {
        self.field(id)
            .and_then(|f| f.parent)
            .and_then(|tid| self.get_type(tid))
    }

    pub fn query_type(&self) -> Option<&SchemaType> {
        self.root_type(self.query_type.as_deref())
    }

    pub fn mutation_type(&self) -> Option<&SchemaType> {
        self.root_type(self.mutation_type.as_deref())
    }

    pub fn subscription_type(&self) -> Option<&SchemaType> {
        self.root_type(self.subscription_type.as_deref())
    }

    fn root_type(&self, name: Option<&str>) -> Option<&SchemaType> {
        name.and_then(|n| self.type_by_name(n)).map(|(_, t)| t)
    }

    /// Check that every named type referenced by a field, argument or input
    /// field is declared in the schema.
    pub fn validate_references(&self) -> Result<(), GenerationError> {
        for schema_type in &self.types {
            for field_id in &schema_type.field_ids {
                let Some(field) = self.fields.get(field_id.0) else {
                    continue;
                };
                self.check_ref(&field.type_ref, || {
                    format!("{}.{}", schema_type.name, field.name)
                })?;
                for arg in &field.args {
                    self.check_ref(&arg.type_ref, || {
                        format!("{}.{}({})", schema_type.name, field.name, arg.name)
                    })?;
                }
            }
            for input in &schema_type.input_fields {
                self.check_ref(&input.type_ref, || {
                    format!("{}.{}", schema_type.name, input.name)
                })?;
            }
        }
        Ok(())
    }

    fn check_ref(
        &self,
        type_ref: &TypeRef,
        location: impl FnOnce() -> String,
    ) -> Result<(), GenerationError> {
        match type_ref.named_type() {
            Some(name) if self.by_name.contains_key(name) => Ok(()),
            Some(name) => Err(GenerationError::MalformedSchema(format!(
                "{} references undeclared type '{}'",
                location(),
                name
            ))),
            None => Err(GenerationError::MalformedSchema(format!(
                "{} has a type reference without a named type",
                location()
            ))),
        }
    }
}

/// Set every field's parent to the type that declares it.
///
/// Deterministic and idempotent; a schema without types or fields is left as is.
pub fn link_parents(schema: &mut Schema) {
    for (index, schema_type) in schema.types.iter().enumerate() {
        for field_id in &schema_type.field_ids {
            if let Some(field) = schema.fields.get_mut(field_id.0) {
                field.parent = Some(TypeId(index));
            }
        }
    }
}

pub(crate) fn decode_introspection(payload: &str) -> Result<IntrospectionResponse, IntrospectionError> {
    let value: serde_json::Value = serde_json::from_str(payload)
        .map_err(|e| IntrospectionError::Decode(format!("Invalid JSON: {}", e)))?;

    if value.get("data").is_some() || value.get("errors").is_some() {
        let envelope: GraphQLEnvelope = serde_json::from_value(value)
            .map_err(|e| IntrospectionError::Decode(e.to_string()))?;
        if !envelope.errors.is_empty() {
            let messages: Vec<String> = envelope.errors.into_iter().map(|e| e.message).collect();
            return Err(IntrospectionError::Query(messages.join("; ")));
        }
        return envelope
            .data
            .ok_or_else(|| IntrospectionError::Decode("Response has no data".to_string()));
    }

    serde_json::from_value(value).map_err(|e| IntrospectionError::Decode(e.to_string()))
}
