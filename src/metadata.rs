//! Runtime metadata model and the per-runtime-version metadata cache

use crate::error::{InterfaceError, Result};
use crate::registry::{parse_type_string, NamedType, TypeDescriptor};
use parity_scale_codec::{Decode, Encode};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::debug;

/// `"meta"` as a little-endian u32
pub const META_MAGIC: u32 = 0x6174_656d;

/// Metadata layout understood by [`decode_metadata`]
pub const METADATA_VERSION: u8 = 12;

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct RuntimeMetadata {
    pub modules: Vec<ModuleMetadata>,
    /// Chain-published type table; the registry's remote layer
    pub types: Vec<NamedType>,
    pub extrinsic_version: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct ModuleMetadata {
    pub name: String,
    pub index: u8,
    pub calls: Vec<FunctionMetadata>,
    pub events: Vec<EventMetadata>,
    pub errors: Vec<ErrorMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct FunctionMetadata {
    pub name: String,
    pub args: Vec<FunctionArgument>,
    pub docs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct FunctionArgument {
    pub name: String,
    pub ty: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct EventMetadata {
    pub name: String,
    /// Argument type strings, in payload order
    pub args: Vec<String>,
    pub docs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct ErrorMetadata {
    pub name: String,
    pub docs: Vec<String>,
}

impl ErrorMetadata {
    /// Documentation joined into one line
    pub fn description(&self) -> String {
        self.docs
            .iter()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// One call parameter as declared in metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallParam {
    pub name: String,
    /// Type string exactly as published
    pub type_name: String,
    pub descriptor: TypeDescriptor,
}

/// Parameter schema of one call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSpec {
    pub module: String,
    pub function: String,
    pub module_index: u8,
    pub call_index: u8,
    pub params: Vec<CallParam>,
}

impl CallSpec {
    /// `Module.function`, as used in error messages
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.module, self.function)
    }
}

impl RuntimeMetadata {
    pub fn module(&self, name: &str) -> Option<&ModuleMetadata> {
        self.modules.iter().find(|module| module.name == name)
    }

    pub fn module_by_index(&self, index: u8) -> Option<&ModuleMetadata> {
        self.modules.iter().find(|module| module.index == index)
    }

    /// Parameter schema for `module.function`.
    pub fn call_spec(&self, module_name: &str, function: &str) -> Result<CallSpec> {
        let unknown = || InterfaceError::UnknownCall {
            module: module_name.to_string(),
            function: function.to_string(),
        };
        let module = self.module(module_name).ok_or_else(unknown)?;
        let (call_index, call) = module
            .calls
            .iter()
            .enumerate()
            .find(|(_, call)| call.name == function)
            .ok_or_else(unknown)?;

        let params = call
            .args
            .iter()
            .map(|arg| {
                Ok(CallParam {
                    name: arg.name.clone(),
                    type_name: arg.ty.clone(),
                    descriptor: parse_type_string(&arg.ty)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(CallSpec {
            module: module.name.clone(),
            function: call.name.clone(),
            module_index: module.index,
            call_index: u8::try_from(call_index)
                .map_err(|_| InterfaceError::Metadata(format!("{} has too many calls", module.name)))?,
            params,
        })
    }

    pub fn event(&self, module_index: u8, event_index: u8) -> Result<(&ModuleMetadata, &EventMetadata)> {
        let module = self.module_by_index(module_index).ok_or_else(|| {
            InterfaceError::Metadata(format!("Module index {} not found", module_index))
        })?;
        let event = module.events.get(event_index as usize).ok_or_else(|| {
            InterfaceError::Metadata(format!("Event {} not found in {}", event_index, module.name))
        })?;
        Ok((module, event))
    }

    pub fn error(&self, module_index: u8, error_index: u8) -> Option<(&ModuleMetadata, &ErrorMetadata)> {
        let module = self.module_by_index(module_index)?;
        let error = module.errors.get(error_index as usize)?;
        Some((module, error))
    }

    /// Magic-prefixed bytes, as served by `state_getMetadata`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = META_MAGIC.encode();
        bytes.push(METADATA_VERSION);
        self.encode_to(&mut bytes);
        bytes
    }
}

/// Decode magic-prefixed runtime metadata
pub fn decode_metadata(bytes: &[u8]) -> Result<RuntimeMetadata> {
    let input = &mut &bytes[..];
    let magic = u32::decode(input)?;
    if magic != META_MAGIC {
        return Err(InterfaceError::Metadata(format!(
            "Invalid metadata magic 0x{:08x}",
            magic
        )));
    }
    let version = u8::decode(input)?;
    if version != METADATA_VERSION {
        return Err(InterfaceError::Metadata(format!(
            "Unsupported metadata version {}",
            version
        )));
    }
    let metadata = RuntimeMetadata::decode(input)?;
    if !input.is_empty() {
        return Err(InterfaceError::Metadata(format!(
            "{} trailing bytes after metadata",
            input.len()
        )));
    }
    Ok(metadata)
}

type MetadataSlot = Arc<OnceCell<Arc<RuntimeMetadata>>>;

/// Caches decoded metadata per runtime spec version.
///
/// A version is fetched at most once: concurrent callers for the same
/// version wait on the same fetch. Entries for other versions are evicted
/// once a newer version has loaded.
#[derive(Debug, Default)]
pub struct MetadataResolver {
    slots: Mutex<HashMap<u32, MetadataSlot>>,
}

impl MetadataResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata for `spec_version`, calling `fetch` only on a cache miss.
    pub async fn metadata<F, Fut>(&self, spec_version: u32, fetch: F) -> Result<Arc<RuntimeMetadata>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>>>,
    {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots.entry(spec_version).or_default().clone()
        };

        let metadata = slot
            .get_or_try_init(move || async move {
                debug!(spec_version, "Fetching runtime metadata");
                let bytes = fetch().await?;
                let metadata = decode_metadata(&bytes)?;
                debug!(
                    spec_version,
                    modules = metadata.modules.len(),
                    types = metadata.types.len(),
                    "Runtime metadata cached"
                );
                Ok::<_, InterfaceError>(Arc::new(metadata))
            })
            .await?
            .clone();

        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.retain(|version, _| *version >= spec_version);
        Ok(metadata)
    }

    /// Already-loaded metadata for `spec_version`, without fetching
    pub fn cached(&self, spec_version: u32) -> Option<Arc<RuntimeMetadata>> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.get(&spec_version).and_then(|slot| slot.get().cloned())
    }

    pub fn clear(&self) {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}
