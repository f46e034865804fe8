//! Descriptor-driven SCALE encoding and decoding of dynamic values
//!
//! Values are [`scale_value::Value`] trees. Encoding is driven by the
//! descriptor, never by the shape of the value: a value that does not fit
//! its descriptor is an error, not a guess.

pub mod primitive;

pub use primitive::{blake2_256, decode_compact, encode_compact};

use crate::address::{decode_ss58, decode_ss58_for_format};
use crate::error::{InterfaceError, Result};
use crate::registry::{Primitive, RegistrySnapshot, TypeDescriptor, TypeKey, TypeKind, Variant};
use crate::types::from_hex;
use parity_scale_codec::Decode;
use primitive::{decode_primitive, encode_primitive, value_as_u128};
use scale_value::{Composite, Primitive as ScalePrimitive, Value, ValueDef};

/// Nesting bound for self-referential descriptors
const MAX_DEPTH: usize = 64;

fn mismatch(ty: &TypeDescriptor, cause: impl Into<String>) -> InterfaceError {
    InterfaceError::Encoding {
        param: String::new(),
        type_name: ty.name.clone(),
        cause: cause.into(),
    }
}

fn composite_values(composite: &Composite<()>) -> Vec<&Value> {
    match composite {
        Composite::Named(fields) => fields.iter().map(|(_, v)| v).collect(),
        Composite::Unnamed(values) => values.iter().collect(),
    }
}

/// Payload supplied for an enum variant
enum Payload<'v> {
    /// A value standing for the whole payload, e.g. the address string of `Id`
    Bare(&'v Value),
    /// The variant's own field list, named or positional
    Fields(&'v Composite<()>),
}

/// Encoder/decoder bound to one registry snapshot
pub struct ScaleCodec<'a> {
    registry: &'a RegistrySnapshot,
    ss58_format: Option<u16>,
}

impl<'a> ScaleCodec<'a> {
    /// `ss58_format`, when set, is enforced on SS58 strings given for account ids.
    pub fn new(registry: &'a RegistrySnapshot, ss58_format: Option<u16>) -> Self {
        Self {
            registry,
            ss58_format,
        }
    }

    pub fn registry(&self) -> &RegistrySnapshot {
        self.registry
    }

    pub fn encode(&self, ty: &TypeDescriptor, value: &Value) -> Result<Vec<u8>> {
        let mut dest = Vec::new();
        self.encode_to(ty, value, &mut dest)?;
        Ok(dest)
    }

    pub fn encode_to(&self, ty: &TypeDescriptor, value: &Value, dest: &mut Vec<u8>) -> Result<()> {
        self.encode_at(ty, value, dest, 0)
    }

    pub fn encode_by_name(&self, type_name: &str, value: &Value) -> Result<Vec<u8>> {
        let ty = self.registry.resolve(type_name)?;
        self.encode(&ty, value)
    }

    pub fn decode(&self, ty: &TypeDescriptor, input: &mut &[u8]) -> Result<Value> {
        self.decode_at(ty, input, 0)
    }

    pub fn decode_by_name(&self, type_name: &str, input: &mut &[u8]) -> Result<Value> {
        let ty = self.registry.resolve(type_name)?;
        self.decode(&ty, input)
    }

    fn encode_at(
        &self,
        ty: &TypeDescriptor,
        value: &Value,
        dest: &mut Vec<u8>,
        depth: usize,
    ) -> Result<()> {
        if depth > MAX_DEPTH {
            return Err(mismatch(ty, "nesting too deep"));
        }
        let depth = depth + 1;

        match &ty.kind {
            TypeKind::Alias(key) => {
                let target = self.registry.resolve_key(key)?;
                self.encode_at(&target, value, dest, depth)
            }
            TypeKind::Primitive(p) => {
                encode_primitive(*p, value, dest).map_err(|cause| mismatch(ty, cause))
            }
            TypeKind::Compact(inner) => {
                let inner = self.concrete(inner)?;
                let max = match inner.kind {
                    TypeKind::Primitive(p) => p.unsigned_max(),
                    TypeKind::Tuple(ref items) if items.is_empty() => return Ok(()),
                    _ => None,
                }
                .ok_or_else(|| mismatch(ty, "compact requires an unsigned integer"))?;
                let n = value_as_u128(value).map_err(|cause| mismatch(ty, cause))?;
                if n > max {
                    return Err(mismatch(ty, format!("{} out of range for {}", n, inner.name)));
                }
                encode_compact(n, dest);
                Ok(())
            }
            TypeKind::Sequence(element) => {
                let element = self.concrete(element)?;
                if is_byte(&element) {
                    if let Some(bytes) = self.bytes_from_value(ty, value, None)? {
                        encode_compact(bytes.len() as u128, dest);
                        dest.extend_from_slice(&bytes);
                        return Ok(());
                    }
                }
                let items = self.items(ty, value)?;
                encode_compact(items.len() as u128, dest);
                for item in items {
                    self.encode_at(&element, item, dest, depth)?;
                }
                Ok(())
            }
            TypeKind::Array(element, len) => {
                let element = self.concrete(element)?;
                if is_byte(&element) {
                    if let Some(bytes) = self.bytes_from_value(ty, value, Some(*len))? {
                        if bytes.len() != *len {
                            return Err(mismatch(
                                ty,
                                format!("expected {} bytes, got {}", len, bytes.len()),
                            ));
                        }
                        dest.extend_from_slice(&bytes);
                        return Ok(());
                    }
                }
                let items = self.items(ty, value)?;
                if items.len() != *len {
                    return Err(mismatch(
                        ty,
                        format!("expected {} elements, got {}", len, items.len()),
                    ));
                }
                for item in items {
                    self.encode_at(&element, item, dest, depth)?;
                }
                Ok(())
            }
            TypeKind::Option(inner) => {
                let (name, payload) = match &value.value {
                    ValueDef::Variant(v) => (v.name.as_str(), composite_values(&v.values)),
                    other => return Err(mismatch(ty, format!("expected None or Some, got {:?}", other))),
                };
                let inner = self.concrete(inner)?;
                let bool_option = matches!(inner.kind, TypeKind::Primitive(Primitive::Bool));
                match (name, payload.as_slice()) {
                    ("None", []) => dest.push(0),
                    ("Some", [some]) if bool_option => match some.value {
                        // Option<bool> packs into a single byte
                        ValueDef::Primitive(ScalePrimitive::Bool(true)) => dest.push(1),
                        ValueDef::Primitive(ScalePrimitive::Bool(false)) => dest.push(2),
                        _ => return Err(mismatch(ty, "expected bool in Some")),
                    },
                    ("Some", [some]) => {
                        dest.push(1);
                        self.encode_at(&inner, some, dest, depth)?;
                    }
                    _ => return Err(mismatch(ty, format!("invalid option variant `{}`", name))),
                }
                Ok(())
            }
            TypeKind::Tuple(types) => {
                if types.is_empty() {
                    return Ok(());
                }
                if types.len() == 1 && !matches!(value.value, ValueDef::Composite(_)) {
                    return self.encode_at(&types[0], value, dest, depth);
                }
                let items = self.items(ty, value)?;
                if items.len() != types.len() {
                    return Err(mismatch(
                        ty,
                        format!("expected {} elements, got {}", types.len(), items.len()),
                    ));
                }
                for (item_ty, item) in types.iter().zip(items) {
                    self.encode_at(item_ty, item, dest, depth)?;
                }
                Ok(())
            }
            TypeKind::Struct(fields) => match &value.value {
                ValueDef::Composite(Composite::Named(values)) => {
                    for field in fields {
                        let field_value = values
                            .iter()
                            .find(|(name, _)| *name == field.name)
                            .map(|(_, v)| v)
                            .ok_or_else(|| mismatch(ty, format!("missing field `{}`", field.name)))?;
                        self.encode_at(&field.ty, field_value, dest, depth)?;
                    }
                    if values.len() > fields.len() {
                        return Err(mismatch(ty, "unexpected extra fields"));
                    }
                    Ok(())
                }
                ValueDef::Composite(Composite::Unnamed(values)) => {
                    if values.len() != fields.len() {
                        return Err(mismatch(
                            ty,
                            format!("expected {} fields, got {}", fields.len(), values.len()),
                        ));
                    }
                    for (field, field_value) in fields.iter().zip(values) {
                        self.encode_at(&field.ty, field_value, dest, depth)?;
                    }
                    Ok(())
                }
                // Newtype structs accept their inner value directly
                _ if fields.len() == 1 => self.encode_at(&fields[0].ty, value, dest, depth),
                other => Err(mismatch(ty, format!("expected composite, got {:?}", other))),
            },
            TypeKind::Enum(variants) => {
                let (variant, payload) = self.select_variant(ty, variants, value)?;
                dest.push(variant.index);
                match (&variant.payload, payload) {
                    (None, None) => Ok(()),
                    (None, Some(Payload::Fields(fields))) if composite_values(fields).is_empty() => {
                        Ok(())
                    }
                    (None, Some(_)) => Err(mismatch(
                        ty,
                        format!("variant `{}` takes no payload", variant.name),
                    )),
                    (Some(_), None) => Err(mismatch(
                        ty,
                        format!("variant `{}` requires a payload", variant.name),
                    )),
                    (Some(payload_ty), Some(Payload::Bare(single))) => {
                        self.encode_at(payload_ty, single, dest, depth)
                    }
                    (Some(payload_ty), Some(Payload::Fields(Composite::Unnamed(values))))
                        if values.len() == 1 =>
                    {
                        self.encode_at(payload_ty, &values[0], dest, depth)
                    }
                    // Named fields keep their names so struct payloads encode in schema order
                    (Some(payload_ty), Some(Payload::Fields(fields))) => {
                        let composite = Value {
                            value: ValueDef::Composite(fields.clone()),
                            context: (),
                        };
                        self.encode_at(payload_ty, &composite, dest, depth)
                    }
                }
            }
        }
    }

    /// Pick the enum variant a value refers to, plus its payload values.
    ///
    /// A bare string names a fieldless variant; any other string is taken as
    /// the payload of an `Id` variant when there is one (MultiAddress).
    fn select_variant<'v>(
        &self,
        ty: &'v TypeDescriptor,
        variants: &'v [Variant],
        value: &'v Value,
    ) -> Result<(&'v Variant, Option<Payload<'v>>)> {
        match &value.value {
            ValueDef::Variant(v) => {
                let variant = variants
                    .iter()
                    .find(|candidate| candidate.name == v.name)
                    .ok_or_else(|| mismatch(ty, format!("unknown variant `{}`", v.name)))?;
                Ok((variant, Some(Payload::Fields(&v.values))))
            }
            ValueDef::Primitive(ScalePrimitive::String(s)) => {
                if let Some(variant) = variants.iter().find(|v| v.name == *s) {
                    return Ok((variant, None));
                }
                let id = variants
                    .iter()
                    .find(|v| v.name == "Id" && v.payload.is_some())
                    .ok_or_else(|| mismatch(ty, format!("unknown variant `{}`", s)))?;
                Ok((id, Some(Payload::Bare(value))))
            }
            other => Err(mismatch(ty, format!("expected variant, got {:?}", other))),
        }
    }

    fn items<'v>(&self, ty: &TypeDescriptor, value: &'v Value) -> Result<Vec<&'v Value>> {
        match &value.value {
            ValueDef::Composite(composite) => Ok(composite_values(composite)),
            other => Err(mismatch(ty, format!("expected sequence, got {:?}", other))),
        }
    }

    /// Bytes given as a hex string, UTF-8 text or (for account ids) an SS58 address.
    ///
    /// Returns `None` when the value is not a string, so composites of u8
    /// fall through to element-wise encoding.
    fn bytes_from_value(
        &self,
        ty: &TypeDescriptor,
        value: &Value,
        fixed_len: Option<usize>,
    ) -> Result<Option<Vec<u8>>> {
        let ValueDef::Primitive(ScalePrimitive::String(s)) = &value.value else {
            return Ok(None);
        };
        if s.starts_with("0x") {
            return from_hex(s)
                .map(Some)
                .map_err(|e| mismatch(ty, e.to_string()));
        }
        match fixed_len {
            Some(32) if is_account_id(ty) => {
                let account = match self.ss58_format {
                    Some(format) => decode_ss58_for_format(s, format),
                    None => decode_ss58(s).map(|(pk, _)| pk),
                }
                .map_err(|e| mismatch(ty, e.to_string()))?;
                Ok(Some(account.to_vec()))
            }
            Some(_) => Err(mismatch(ty, "expected hex string")),
            None => Ok(Some(s.as_bytes().to_vec())),
        }
    }

    fn concrete(&self, ty: &TypeDescriptor) -> Result<TypeDescriptor> {
        match &ty.kind {
            TypeKind::Alias(key) => Ok((*self.registry.resolve_key(key)?).clone()),
            _ => Ok(ty.clone()),
        }
    }

    fn decode_at(&self, ty: &TypeDescriptor, input: &mut &[u8], depth: usize) -> Result<Value> {
        if depth > MAX_DEPTH {
            return Err(InterfaceError::Decode(format!("{} nests too deep", ty.name)));
        }
        let depth = depth + 1;

        match &ty.kind {
            TypeKind::Alias(key) => {
                let target = self.registry.resolve_key(key)?;
                self.decode_at(&target, input, depth)
            }
            TypeKind::Primitive(p) => decode_primitive(*p, input),
            TypeKind::Compact(inner) => {
                let inner = self.concrete(inner)?;
                let max = match inner.kind {
                    TypeKind::Primitive(p) => p.unsigned_max(),
                    TypeKind::Tuple(ref items) if items.is_empty() => {
                        return Ok(Value::unnamed_composite([]))
                    }
                    _ => None,
                }
                .ok_or_else(|| {
                    InterfaceError::Decode(format!("{} is not a compact unsigned integer", ty.name))
                })?;
                let n = decode_compact(input)?;
                if n > max {
                    return Err(InterfaceError::Decode(format!(
                        "Compact value {} out of range for {}",
                        n, inner.name
                    )));
                }
                Ok(Value::u128(n))
            }
            TypeKind::Sequence(element) => {
                let len = decode_compact(input)? as usize;
                let element = self.concrete(element)?;
                let mut items = Vec::with_capacity(len.min(input.len()));
                for _ in 0..len {
                    items.push(self.decode_at(&element, input, depth)?);
                }
                Ok(Value::unnamed_composite(items))
            }
            TypeKind::Array(element, len) => {
                let element = self.concrete(element)?;
                let items = (0..*len)
                    .map(|_| self.decode_at(&element, input, depth))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::unnamed_composite(items))
            }
            TypeKind::Option(inner) => {
                let inner = self.concrete(inner)?;
                let bool_option = matches!(inner.kind, TypeKind::Primitive(Primitive::Bool));
                let tag = u8::decode(input)?;
                match (tag, bool_option) {
                    (0, _) => Ok(Value::unnamed_variant("None", [])),
                    (1, true) => Ok(Value::unnamed_variant("Some", [Value::bool(true)])),
                    (2, true) => Ok(Value::unnamed_variant("Some", [Value::bool(false)])),
                    (1, false) => Ok(Value::unnamed_variant(
                        "Some",
                        [self.decode_at(&inner, input, depth)?],
                    )),
                    (other, _) => Err(InterfaceError::Decode(format!(
                        "Invalid option tag {} for {}",
                        other, ty.name
                    ))),
                }
            }
            TypeKind::Tuple(types) => {
                let items = types
                    .iter()
                    .map(|item_ty| self.decode_at(item_ty, input, depth))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::unnamed_composite(items))
            }
            TypeKind::Struct(fields) => {
                let values = fields
                    .iter()
                    .map(|field| Ok((field.name.clone(), self.decode_at(&field.ty, input, depth)?)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::named_composite(values))
            }
            TypeKind::Enum(_) => {
                let index = u8::decode(input)?;
                let variant = ty.variant_by_index(index).ok_or_else(|| {
                    InterfaceError::Decode(format!("Invalid variant index {} for {}", index, ty.name))
                })?;
                match &variant.payload {
                    None => Ok(Value::unnamed_variant(variant.name.clone(), [])),
                    Some(payload_ty) => {
                        let payload = self.decode_at(payload_ty, input, depth)?;
                        Ok(Value::unnamed_variant(variant.name.clone(), [payload]))
                    }
                }
            }
        }
    }
}

fn is_byte(ty: &TypeDescriptor) -> bool {
    matches!(ty.kind, TypeKind::Primitive(Primitive::U8))
}

fn is_account_id(ty: &TypeDescriptor) -> bool {
    matches!(TypeKey::new(&ty.name).as_str(), "accountid" | "accountid32")
}

/// Read an account id back out of a decoded `[u8; 32]` value
pub fn value_to_bytes(value: &Value) -> Option<Vec<u8>> {
    match &value.value {
        ValueDef::Composite(composite) => composite_values(composite)
            .into_iter()
            .map(|v| match v.value {
                ValueDef::Primitive(ScalePrimitive::U128(n)) => u8::try_from(n).ok(),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}
