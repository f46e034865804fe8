//! Layered type registry
//!
//! Type names resolve against three layers plus a table of built-ins:
//!
//! 1. `overrides`: entries set at runtime with [`TypeRegistry::set_override`]
//! 2. `preset`: the bundled local preset
//! 3. `remote`: the type table published in runtime metadata
//!
//! The first two form the local layer, which always wins over `remote`.
//! Layers are immutable maps behind an [`ArcSwap`]; every mutation builds a
//! new `Layers` value and swaps it in, so readers see either the old or the
//! new state and never wait on a writer.

pub mod descriptor;
pub mod preset;
pub mod type_name;

pub use descriptor::{Field, Primitive, TypeDescriptor, TypeKey, TypeKind, Variant};
pub use preset::{
    bundled_preset, is_known_preset, parse_preset_json, NamedType, TypeDefinition, DEFAULT_PRESET,
};
pub use type_name::{canonical_name, parse_type_string};

use crate::error::{InterfaceError, Result};
use arc_swap::ArcSwap;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, OnceLock};
use tracing::debug;

pub type TypeMap = HashMap<TypeKey, Arc<TypeDescriptor>>;

/// Default bound on alias hops before resolution gives up
pub const DEFAULT_MAX_ALIAS_HOPS: usize = 32;

#[derive(Debug, Clone, Default)]
struct Layers {
    overrides: Arc<TypeMap>,
    preset: Arc<TypeMap>,
    remote: Arc<TypeMap>,
}

impl Layers {
    fn lookup(&self, key: &TypeKey) -> Option<&Arc<TypeDescriptor>> {
        self.overrides
            .get(key)
            .or_else(|| self.preset.get(key))
            .or_else(|| self.remote.get(key))
            .or_else(|| builtins().get(key))
    }
}

fn builtins() -> &'static TypeMap {
    static BUILTINS: OnceLock<TypeMap> = OnceLock::new();
    BUILTINS.get_or_init(|| {
        use Primitive::*;
        let byte = || Box::new(TypeDescriptor::primitive(U8));
        let mut map: TypeMap = [Bool, U8, U16, U32, U64, U128, I8, I16, I32, I64, I128, Text]
            .into_iter()
            .map(|p| (TypeKey::new(p.name()), Arc::new(TypeDescriptor::primitive(p))))
            .collect();
        let mut insert = |name: &str, kind: TypeKind| {
            map.insert(TypeKey::new(name), Arc::new(TypeDescriptor::new(name, kind)));
        };
        insert("Bytes", TypeKind::Sequence(byte()));
        insert("H160", TypeKind::Array(byte(), 20));
        insert("H256", TypeKind::Array(byte(), 32));
        insert("H512", TypeKind::Array(byte(), 64));
        insert("Null", TypeKind::Tuple(vec![]));
        map
    })
}

fn build_map(types: &[NamedType]) -> Result<TypeMap> {
    types
        .iter()
        .map(|named| {
            Ok((
                TypeKey::new(&named.name),
                Arc::new(named.to_descriptor()?),
            ))
        })
        .collect()
}

/// Consistent read view of the registry at one point in time
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    layers: Arc<Layers>,
    max_alias_hops: usize,
}

impl RegistrySnapshot {
    /// Resolve a type name to a non-alias descriptor.
    ///
    /// Names not registered in any layer are parsed as type strings, so
    /// `Vec<Balance>` or `[u8; 20]` resolve without an explicit entry. Every
    /// name reachable from the result must resolve too.
    pub fn resolve(&self, name: &str) -> Result<Arc<TypeDescriptor>> {
        let key = TypeKey::new(name);
        let descriptor = if self.layers.lookup(&key).is_some() {
            self.resolve_key(&key)?
        } else {
            let parsed = parse_type_string(name)?;
            match &parsed.kind {
                TypeKind::Alias(target) if *target == key => {
                    return Err(InterfaceError::UnknownType(name.to_string()))
                }
                TypeKind::Alias(target) => self.resolve_key(target)?,
                _ => Arc::new(parsed),
            }
        };
        self.check_nested(&descriptor)?;
        Ok(descriptor)
    }

    /// Check that every alias nested in `descriptor` resolves.
    ///
    /// Each key is followed once, so recursive types terminate.
    pub fn check_nested(&self, descriptor: &TypeDescriptor) -> Result<()> {
        self.check_nested_with(descriptor, &mut HashSet::new())
    }

    fn check_nested_with(&self, descriptor: &TypeDescriptor, seen: &mut HashSet<TypeKey>) -> Result<()> {
        match &descriptor.kind {
            TypeKind::Primitive(_) => Ok(()),
            TypeKind::Alias(key) => {
                if !seen.insert(key.clone()) {
                    return Ok(());
                }
                let target = self.resolve_key(key)?;
                self.check_nested_with(&target, seen)
            }
            TypeKind::Compact(inner)
            | TypeKind::Sequence(inner)
            | TypeKind::Array(inner, _)
            | TypeKind::Option(inner) => self.check_nested_with(inner, seen),
            TypeKind::Tuple(items) => items
                .iter()
                .try_for_each(|item| self.check_nested_with(item, seen)),
            TypeKind::Struct(fields) => fields
                .iter()
                .try_for_each(|field| self.check_nested_with(&field.ty, seen)),
            TypeKind::Enum(variants) => variants
                .iter()
                .filter_map(|variant| variant.payload.as_ref())
                .try_for_each(|payload| self.check_nested_with(payload, seen)),
        }
    }

    /// Follow alias links from `key` until a concrete descriptor.
    pub fn resolve_key(&self, key: &TypeKey) -> Result<Arc<TypeDescriptor>> {
        let mut current = key;
        let mut hops = 0;
        loop {
            let descriptor = self
                .layers
                .lookup(current)
                .ok_or_else(|| InterfaceError::UnknownType(current.to_string()))?;
            match &descriptor.kind {
                TypeKind::Alias(next) => {
                    hops += 1;
                    if hops > self.max_alias_hops {
                        return Err(InterfaceError::AliasCycle {
                            name: key.to_string(),
                            hops,
                        });
                    }
                    current = next;
                }
                _ => return Ok(descriptor.clone()),
            }
        }
    }

    /// Raw entry for `name`, without alias unwrapping
    pub fn lookup(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
        self.layers.lookup(&TypeKey::new(name)).cloned()
    }

    pub fn has_override(&self, name: &str) -> bool {
        self.layers.overrides.contains_key(&TypeKey::new(name))
    }
}

/// How [`TypeRegistry::reload`] treats the layers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadOptions {
    /// Rebuild `remote` from fetched metadata rather than the bundled preset
    pub use_remote_preset: bool,
    /// Keep overrides set since the last load
    pub keep_overrides: bool,
}

impl Default for ReloadOptions {
    fn default() -> Self {
        Self {
            use_remote_preset: true,
            keep_overrides: true,
        }
    }
}

/// Type registry shared by every composition and decode in a client
#[derive(Debug)]
pub struct TypeRegistry {
    layers: ArcSwap<Layers>,
    // Serializes mutators; readers never take it
    mutator: Mutex<()>,
    preset_name: String,
    preset_types: Vec<NamedType>,
    max_alias_hops: usize,
}

impl TypeRegistry {
    /// Registry backed by the bundled preset `preset_name`.
    ///
    /// Until metadata is loaded, `remote` mirrors the bundled preset.
    pub fn new(preset_name: &str, max_alias_hops: usize) -> Result<Self> {
        let preset_types = bundled_preset(preset_name)?;
        let preset = Arc::new(build_map(&preset_types)?);
        let layers = Layers {
            overrides: Arc::default(),
            preset: preset.clone(),
            remote: preset,
        };
        Ok(Self {
            layers: ArcSwap::from_pointee(layers),
            mutator: Mutex::new(()),
            preset_name: preset_name.to_string(),
            preset_types,
            max_alias_hops,
        })
    }

    pub fn preset_name(&self) -> &str {
        &self.preset_name
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            layers: self.layers.load_full(),
            max_alias_hops: self.max_alias_hops,
        }
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<TypeDescriptor>> {
        self.snapshot().resolve(name)
    }

    /// Register `descriptor` under `name` in the local layer.
    pub fn set_override(&self, name: &str, descriptor: TypeDescriptor) {
        self.mutate(|layers| {
            let mut overrides = (*layers.overrides).clone();
            overrides.insert(TypeKey::new(name), Arc::new(descriptor));
            layers.overrides = Arc::new(overrides);
        });
        debug!("Type override set: {}", name);
    }

    /// Register `name` as the type described by `type_string`.
    pub fn set_override_str(&self, name: &str, type_string: &str) -> Result<()> {
        let descriptor = parse_type_string(type_string)?.renamed(name);
        self.set_override(name, descriptor);
        Ok(())
    }

    pub fn clear_overrides(&self) {
        self.mutate(|layers| layers.overrides = Arc::default());
    }

    /// Rebuild the `remote` layer.
    ///
    /// `remote_types` is the metadata type table; it is only consulted when
    /// `options.use_remote_preset` is set, otherwise `remote` is rebuilt from
    /// the bundled preset. Overrides are kept unless `options.keep_overrides`
    /// is false. The new state is built completely before it is published.
    pub fn reload(&self, remote_types: Option<&[NamedType]>, options: ReloadOptions) -> Result<()> {
        let remote = match (options.use_remote_preset, remote_types) {
            (true, Some(types)) => build_map(types)?,
            _ => build_map(&self.preset_types)?,
        };
        let preset = build_map(&self.preset_types)?;
        self.mutate(move |layers| {
            layers.remote = Arc::new(remote);
            layers.preset = Arc::new(preset);
            if !options.keep_overrides {
                layers.overrides = Arc::default();
            }
        });
        debug!(
            preset = %self.preset_name,
            use_remote_preset = options.use_remote_preset,
            keep_overrides = options.keep_overrides,
            "Type registry reloaded"
        );
        Ok(())
    }

    fn mutate<F>(&self, f: F)
    where
        F: FnOnce(&mut Layers),
    {
        let _guard = self.mutator.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = Layers::clone(&self.layers.load());
        f(&mut next);
        self.layers.store(Arc::new(next));
    }
}
