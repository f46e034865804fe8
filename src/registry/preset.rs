//! Type definitions as published by presets and runtime metadata

use super::descriptor::{Field, TypeDescriptor, TypeKind, Variant};
use super::type_name::parse_type_string;
use crate::error::{InterfaceError, Result};
use parity_scale_codec::{Decode, Encode};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Preset layered under every named preset
pub const DEFAULT_PRESET: &str = "default";

const PRESETS: &[(&str, &str)] = &[
    ("default", include_str!("presets/default.json")),
    ("test", include_str!("presets/test.json")),
    ("reef", include_str!("presets/reef.json")),
];

/// Unresolved definition of one named type.
///
/// This is the shape both bundled presets and the metadata type table use;
/// it becomes a [`TypeDescriptor`] when inserted into a registry layer.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum TypeDefinition {
    /// Another type string, e.g. `u64` or `Compact<Balance>`
    Alias(String),
    /// Ordered `(field name, type string)` pairs
    Struct(Vec<(String, String)>),
    /// Ordered `(variant name, payload type string)` pairs; `Null` means no payload
    Enum(Vec<(String, String)>),
    /// Fieldless enum
    ValueEnum(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct NamedType {
    pub name: String,
    pub definition: TypeDefinition,
}

impl NamedType {
    pub fn new(name: impl Into<String>, definition: TypeDefinition) -> Self {
        Self {
            name: name.into(),
            definition,
        }
    }

    pub fn to_descriptor(&self) -> Result<TypeDescriptor> {
        let kind = match &self.definition {
            TypeDefinition::Alias(target) => {
                return Ok(parse_type_string(target)?.renamed(self.name.clone()))
            }
            TypeDefinition::Struct(fields) => TypeKind::Struct(
                fields
                    .iter()
                    .map(|(name, ty)| {
                        Ok(Field {
                            name: name.clone(),
                            ty: parse_type_string(ty)?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?,
            ),
            TypeDefinition::Enum(variants) => TypeKind::Enum(
                variants
                    .iter()
                    .enumerate()
                    .map(|(index, (name, ty))| {
                        let payload = if is_null(ty) {
                            None
                        } else {
                            Some(parse_type_string(ty)?)
                        };
                        Ok(Variant {
                            name: name.clone(),
                            index: variant_index(&self.name, index)?,
                            payload,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?,
            ),
            TypeDefinition::ValueEnum(names) => TypeKind::Enum(
                names
                    .iter()
                    .enumerate()
                    .map(|(index, name)| {
                        Ok(Variant {
                            name: name.clone(),
                            index: variant_index(&self.name, index)?,
                            payload: None,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?,
            ),
        };
        Ok(TypeDescriptor::new(self.name.clone(), kind))
    }
}

fn is_null(type_string: &str) -> bool {
    let trimmed = type_string.trim();
    trimmed.is_empty() || trimmed == "()" || trimmed.eq_ignore_ascii_case("null")
}

fn variant_index(type_name: &str, index: usize) -> Result<u8> {
    u8::try_from(index)
        .map_err(|_| InterfaceError::Config(format!("{} has more than 256 variants", type_name)))
}

#[derive(Deserialize)]
struct PresetFile {
    types: BTreeMap<String, RawDefinition>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDefinition {
    Alias(String),
    Composite {
        #[serde(rename = "type")]
        kind: String,
        #[serde(default)]
        type_mapping: Vec<(String, String)>,
        #[serde(default)]
        value_list: Vec<String>,
    },
}

/// Parse a preset document (`{"types": {...}}`)
pub fn parse_preset_json(json: &str) -> Result<Vec<NamedType>> {
    let file: PresetFile = serde_json::from_str(json)?;
    file.types
        .into_iter()
        .map(|(name, raw)| {
            let definition = match raw {
                RawDefinition::Alias(target) => TypeDefinition::Alias(target),
                RawDefinition::Composite {
                    kind,
                    type_mapping,
                    value_list,
                } => match kind.as_str() {
                    "struct" => TypeDefinition::Struct(type_mapping),
                    "enum" if !value_list.is_empty() => TypeDefinition::ValueEnum(value_list),
                    "enum" => TypeDefinition::Enum(type_mapping),
                    other => {
                        return Err(InterfaceError::Config(format!(
                            "Unsupported definition kind `{}` for {}",
                            other, name
                        )))
                    }
                },
            };
            Ok(NamedType::new(name, definition))
        })
        .collect()
}

pub fn is_known_preset(name: &str) -> bool {
    PRESETS.iter().any(|(preset, _)| *preset == name)
}

/// Bundled definitions for `name`, layered on top of the default preset.
///
/// Later entries win when the same type appears twice.
pub fn bundled_preset(name: &str) -> Result<Vec<NamedType>> {
    let source = |preset: &str| {
        PRESETS
            .iter()
            .find(|(candidate, _)| *candidate == preset)
            .map(|(_, json)| *json)
            .ok_or_else(|| InterfaceError::Config(format!("Unknown type registry preset: {}", preset)))
    };

    let mut types = parse_preset_json(source(DEFAULT_PRESET)?)?;
    if name != DEFAULT_PRESET {
        types.extend(parse_preset_json(source(name)?)?);
    }
    Ok(types)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::descriptor::Primitive;

    #[test]
    fn test_bundled_presets_parse() {
        for (name, _) in PRESETS {
            let types = bundled_preset(name).unwrap();
            for named in &types {
                named.to_descriptor().unwrap();
            }
        }
    }

    #[test]
    fn test_named_preset_layers_over_default() {
        let types = bundled_preset("test").unwrap();
        let last_block_number = types
            .iter()
            .rev()
            .find(|t| t.name == "BlockNumber")
            .unwrap();
        assert_eq!(
            last_block_number.definition,
            TypeDefinition::Alias("u64".to_string())
        );
        assert!(types.iter().any(|t| t.name == "MultiAddress"));
    }

    #[test]
    fn test_unknown_preset() {
        assert!(matches!(
            bundled_preset("kusama"),
            Err(InterfaceError::Config(_))
        ));
        assert!(is_known_preset("reef"));
        assert!(!is_known_preset("kusama"));
    }

    #[test]
    fn test_enum_definition_to_descriptor() {
        let named = NamedType::new(
            "DispatchResult",
            TypeDefinition::Enum(vec![
                ("Ok".into(), "Null".into()),
                ("Error".into(), "DispatchError".into()),
            ]),
        );
        let descriptor = named.to_descriptor().unwrap();
        let ok = descriptor.variant_by_name("Ok").unwrap();
        assert_eq!(ok.index, 0);
        assert!(ok.payload.is_none());
        let error = descriptor.variant_by_index(1).unwrap();
        assert!(error.payload.as_ref().unwrap().is_alias());
    }

    #[test]
    fn test_alias_definition_keeps_name() {
        let named = NamedType::new("BlockNumber", TypeDefinition::Alias("u32".into()));
        let descriptor = named.to_descriptor().unwrap();
        assert_eq!(descriptor.name, "BlockNumber");
        assert_eq!(descriptor.kind, TypeKind::Primitive(Primitive::U32));
    }

    #[test]
    fn test_rejects_unknown_kind() {
        let json = r#"{"types": {"Foo": {"type": "union"}}}"#;
        assert!(parse_preset_json(json).is_err());
    }
}
