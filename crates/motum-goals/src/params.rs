//! Typed parameter parsing with field-path error messages.
//!
//! Every kind declares its parameters as a struct deriving `Deserialize` and
//! `JsonSchema`.  Before handing the raw payload to serde, [`parse`] walks it
//! against the kind's JSON schema so that unknown fields, missing fields, and
//! type mismatches are reported with the exact path (`goal_point.point.x`)
//! rather than serde's position-less message.

use schemars::JsonSchema;
use schemars::schema::{InstanceType, RootSchema, Schema, SchemaObject, SingleOrVec};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    #[error("{path}: unknown field")]
    UnknownField { path: String },

    #[error("{path}: missing field")]
    MissingField { path: String },

    #[error("{path}: expected {expected}, found {found}")]
    WrongType {
        path: String,
        expected: String,
        found: &'static str,
    },

    #[error("{0}")]
    Invalid(String),
}

impl From<String> for ParamError {
    fn from(message: String) -> Self {
        ParamError::Invalid(message)
    }
}

impl From<&str> for ParamError {
    fn from(message: &str) -> Self {
        ParamError::Invalid(message.to_string())
    }
}

/// JSON schema of `T`, pretty-printed, used as a kind's usage text.
pub fn usage_of<T: JsonSchema>() -> String {
    let schema = schemars::schema_for!(T);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

/// Validate `value` against `T`'s schema, then deserialize it.
pub fn parse<T: DeserializeOwned + JsonSchema>(value: &Value) -> Result<T, ParamError> {
    let root = schemars::schema_for!(T);
    let walker = Walker { root: &root };
    walker.check(&root.schema, value, "")?;
    T::deserialize(value).map_err(|e| ParamError::Invalid(e.to_string()))
}

struct Walker<'a> {
    root: &'a RootSchema,
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn matches_type(ty: &InstanceType, value: &Value) -> bool {
    match ty {
        InstanceType::Null => value.is_null(),
        InstanceType::Boolean => value.is_boolean(),
        InstanceType::Number => value.is_number(),
        InstanceType::Integer => value.is_i64() || value.is_u64(),
        InstanceType::String => value.is_string(),
        InstanceType::Array => value.is_array(),
        InstanceType::Object => value.is_object(),
    }
}

fn type_name(ty: &InstanceType) -> &'static str {
    match ty {
        InstanceType::Null => "null",
        InstanceType::Boolean => "boolean",
        InstanceType::Number => "number",
        InstanceType::Integer => "integer",
        InstanceType::String => "string",
        InstanceType::Array => "array",
        InstanceType::Object => "object",
    }
}

fn join(path: &str, field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{path}.{field}")
    }
}

fn display(path: &str) -> String {
    if path.is_empty() {
        "parameters".to_string()
    } else {
        path.to_string()
    }
}

impl Walker<'_> {
    fn resolve<'s>(&'s self, schema: &'s SchemaObject) -> &'s SchemaObject {
        let Some(reference) = &schema.reference else {
            return schema;
        };
        let name = reference.trim_start_matches("#/definitions/");
        match self.root.definitions.get(name) {
            Some(Schema::Object(target)) => target,
            _ => schema,
        }
    }

    fn check_schema(&self, schema: &Schema, value: &Value, path: &str) -> Result<(), ParamError> {
        match schema {
            Schema::Bool(true) => Ok(()),
            Schema::Bool(false) => Err(ParamError::UnknownField { path: display(path) }),
            Schema::Object(object) => self.check(object, value, path),
        }
    }

    fn check(&self, schema: &SchemaObject, value: &Value, path: &str) -> Result<(), ParamError> {
        let schema = self.resolve(schema);

        if let Some(subschemas) = &schema.subschemas
            && let Some(all_of) = &subschemas.all_of
        {
            for sub in all_of {
                self.check_schema(sub, value, path)?;
            }
        }

        if let Some(types) = &schema.instance_type {
            let allowed: Vec<&InstanceType> = match types {
                SingleOrVec::Single(ty) => vec![ty.as_ref()],
                SingleOrVec::Vec(tys) => tys.iter().collect(),
            };
            if !allowed.iter().any(|ty| matches_type(ty, value)) {
                return Err(ParamError::WrongType {
                    path: display(path),
                    expected: allowed.iter().map(|ty| type_name(ty)).collect::<Vec<_>>().join(" or "),
                    found: json_kind(value),
                });
            }
        }

        if let (Some(object), Value::Object(map)) = (&schema.object, value) {
            for (key, field) in map {
                let field_path = join(path, key);
                match (object.properties.get(key), &object.additional_properties) {
                    (Some(sub), _) => self.check_schema(sub, field, &field_path)?,
                    (None, Some(extra)) => self.check_schema(extra, field, &field_path)?,
                    (None, None) => {}
                }
            }
            for required in &object.required {
                if !map.contains_key(required) {
                    return Err(ParamError::MissingField {
                        path: join(path, required),
                    });
                }
            }
        }

        if let (Some(array), Value::Array(items)) = (&schema.array, value)
            && let Some(SingleOrVec::Single(item_schema)) = &array.items
        {
            for (i, item) in items.iter().enumerate() {
                self.check_schema(item_schema, item, &format!("{}[{i}]", display(path)))?;
            }
        }

        Ok(())
    }
}
