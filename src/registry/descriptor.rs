//! Type descriptors: the closed set of SCALE encoding strategies

use std::fmt;

/// Normalized registry key.
///
/// Keys are lowercased with whitespace removed, so `"U64"` and `"u64"` (or
/// `"[u8; 32]"` and `"[u8;32]"`) address the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(String);

impl TypeKey {
    pub fn new(name: &str) -> Self {
        let canonical = super::type_name::canonical_name(name);
        TypeKey(canonical.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fixed-width base types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Bool,
    U8,
    U16,
    U32,
    U64,
    U128,
    I8,
    I16,
    I32,
    I64,
    I128,
    /// UTF-8 string, compact length prefixed
    Text,
}

impl Primitive {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name.to_lowercase().as_str() {
            "bool" => Primitive::Bool,
            "u8" => Primitive::U8,
            "u16" => Primitive::U16,
            "u32" => Primitive::U32,
            "u64" => Primitive::U64,
            "u128" => Primitive::U128,
            "i8" => Primitive::I8,
            "i16" => Primitive::I16,
            "i32" => Primitive::I32,
            "i64" => Primitive::I64,
            "i128" => Primitive::I128,
            "text" | "str" | "string" => Primitive::Text,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Primitive::Bool => "bool",
            Primitive::U8 => "u8",
            Primitive::U16 => "u16",
            Primitive::U32 => "u32",
            Primitive::U64 => "u64",
            Primitive::U128 => "u128",
            Primitive::I8 => "i8",
            Primitive::I16 => "i16",
            Primitive::I32 => "i32",
            Primitive::I64 => "i64",
            Primitive::I128 => "i128",
            Primitive::Text => "Text",
        }
    }

    /// Largest value representable, for unsigned integer primitives
    pub fn unsigned_max(self) -> Option<u128> {
        match self {
            Primitive::U8 => Some(u8::MAX as u128),
            Primitive::U16 => Some(u16::MAX as u128),
            Primitive::U32 => Some(u32::MAX as u128),
            Primitive::U64 => Some(u64::MAX as u128),
            Primitive::U128 => Some(u128::MAX),
            _ => None,
        }
    }
}

/// A struct field, or the payload of an enum variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: TypeDescriptor,
}

/// One variant of an enum descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub name: String,
    pub index: u8,
    /// Payload type; `None` for fieldless variants
    pub payload: Option<TypeDescriptor>,
}

/// Encoding strategy of a descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    Primitive(Primitive),
    Struct(Vec<Field>),
    Enum(Vec<Variant>),
    /// Reference to another registry entry, looked up by exact key
    Alias(TypeKey),
    Compact(Box<TypeDescriptor>),
    Sequence(Box<TypeDescriptor>),
    Array(Box<TypeDescriptor>, usize),
    Option(Box<TypeDescriptor>),
    Tuple(Vec<TypeDescriptor>),
}

/// Identifies one SCALE type: its display name and how to encode/decode it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub name: String,
    pub kind: TypeKind,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn primitive(primitive: Primitive) -> Self {
        Self::new(primitive.name(), TypeKind::Primitive(primitive))
    }

    pub fn alias(name: impl Into<String>, target: &str) -> Self {
        Self::new(name, TypeKind::Alias(TypeKey::new(target)))
    }

    pub fn is_alias(&self) -> bool {
        matches!(self.kind, TypeKind::Alias(_))
    }

    /// Same strategy under a different display name
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn variant_by_name(&self, name: &str) -> Option<&Variant> {
        match &self.kind {
            TypeKind::Enum(variants) => variants.iter().find(|v| v.name == name),
            _ => None,
        }
    }

    pub fn variant_by_index(&self, index: u8) -> Option<&Variant> {
        match &self.kind {
            TypeKind::Enum(variants) => variants.iter().find(|v| v.index == index),
            _ => None,
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
