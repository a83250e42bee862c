use crate::attr::{AttrId, KeyValue};
use crate::error::{Result, TycoError};
use crate::source::SourceLocation;
use indexmap::IndexMap;
use std::collections::HashMap;

/// One declared field of a struct schema.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    pub type_name: String,
    pub is_primary: bool,
    pub is_nullable: bool,
    pub is_array: bool,
    /// Default declared on the schema line itself. Deep-copied into each
    /// instance that does not supply the field.
    pub default: Option<AttrId>,
}

/// A struct type: its field schemas in declaration order, the primary-key
/// column list, and every instance created for it. The pk index maps
/// rendered key tuples to instances and is built after base rendering.
#[derive(Debug, Clone)]
pub struct StructDef {
    pub type_name: String,
    pub fields: IndexMap<String, FieldSchema>,
    pub primary_keys: Vec<String>,
    pub instances: Vec<AttrId>,
    pub pk_index: HashMap<Vec<KeyValue>, AttrId>,
    pub location: Option<SourceLocation>,
}

impl StructDef {
    pub fn new(type_name: impl Into<String>, location: Option<SourceLocation>) -> Self {
        StructDef {
            type_name: type_name.into(),
            fields: IndexMap::new(),
            primary_keys: Vec::new(),
            instances: Vec::new(),
            pk_index: HashMap::new(),
            location,
        }
    }

    /// Registers a field declaration. Redeclaring a field, or marking an
    /// array field as a primary key, is a schema error.
    pub fn add_field(
        &mut self,
        name: &str,
        field: FieldSchema,
        location: Option<SourceLocation>,
    ) -> Result<()> {
        if self.fields.contains_key(name) {
            return Err(TycoError::schema(
                format!("duplicate field {} in struct {}", name, self.type_name),
                location,
            ));
        }
        if field.is_primary {
            if field.is_array {
                return Err(TycoError::schema(
                    format!(
                        "primary key {} in struct {} cannot be an array",
                        name, self.type_name
                    ),
                    location,
                ));
            }
            self.primary_keys.push(name.to_string());
        }
        self.fields.insert(name.to_string(), field);
        Ok(())
    }

    pub fn has_primary_keys(&self) -> bool {
        !self.primary_keys.is_empty()
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(type_name: &str, primary: bool) -> FieldSchema {
        FieldSchema {
            type_name: type_name.to_string(),
            is_primary: primary,
            is_nullable: false,
            is_array: false,
            default: None,
        }
    }

    #[test]
    fn duplicate_field_is_schema_error() {
        let mut def = StructDef::new("Dog", None);
        def.add_field("name", scalar("str", true), None).unwrap();
        let err = def.add_field("name", scalar("str", false), None).unwrap_err();
        assert!(matches!(err, TycoError::Schema(_)));
    }

    #[test]
    fn primary_key_order_follows_declaration() {
        let mut def = StructDef::new("Point", None);
        def.add_field("x", scalar("int", true), None).unwrap();
        def.add_field("label", scalar("str", false), None).unwrap();
        def.add_field("y", scalar("int", true), None).unwrap();
        assert_eq!(def.primary_keys, vec!["x", "y"]);
    }

    #[test]
    fn array_primary_key_rejected() {
        let mut def = StructDef::new("Bag", None);
        let field = FieldSchema {
            type_name: "int".to_string(),
            is_primary: true,
            is_nullable: false,
            is_array: true,
            default: None,
        };
        let err = def.add_field("items", field, None).unwrap_err();
        assert!(err.message().contains("cannot be an array"));
    }
}
