//! Block event decoding
//!
//! A block's events are a SCALE `Vec<EventRecord>`. Event arguments have no
//! length prefix, so each one is decoded through its metadata type to find
//! where the next record starts.

use crate::codec::{decode_compact, encode_compact, ScaleCodec};
use crate::error::{InterfaceError, Result};
use crate::metadata::RuntimeMetadata;
use crate::registry::parse_type_string;
use crate::types::Hash;
use parity_scale_codec::{Decode, Encode};
use scale_value::Value;

/// Stage of block execution an event was emitted in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum Phase {
    /// While applying the extrinsic at this index
    ApplyExtrinsic(u32),
    Finalization,
    Initialization,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub module_index: u8,
    pub event_index: u8,
    pub module: String,
    pub name: String,
    /// Decoded arguments, in metadata order
    pub values: Vec<Value>,
}

impl Event {
    pub fn is(&self, module: &str, name: &str) -> bool {
        self.module == module && self.name == name
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub phase: Phase,
    pub event: Event,
    pub topics: Vec<Hash>,
}

impl EventRecord {
    pub fn extrinsic_index(&self) -> Option<u32> {
        match self.phase {
            Phase::ApplyExtrinsic(index) => Some(index),
            _ => None,
        }
    }
}

/// Decode a block's event list
pub fn decode_events(
    codec: &ScaleCodec<'_>,
    metadata: &RuntimeMetadata,
    bytes: &[u8],
) -> Result<Vec<EventRecord>> {
    let input = &mut &bytes[..];
    let count = decode_compact(input)? as usize;
    let mut records = Vec::with_capacity(count.min(input.len()));

    for _ in 0..count {
        let phase = Phase::decode(input)?;
        let module_index = u8::decode(input)?;
        let event_index = u8::decode(input)?;
        let (module, event_meta) = metadata.event(module_index, event_index)?;

        let values = event_meta
            .args
            .iter()
            .map(|arg| {
                let ty = parse_type_string(arg)?;
                codec.decode(&ty, input).map_err(|e| {
                    InterfaceError::Decode(format!(
                        "{}.{} argument {}: {}",
                        module.name, event_meta.name, arg, e
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let topics = Vec::<Hash>::decode(input)?;

        records.push(EventRecord {
            phase,
            event: Event {
                module_index,
                event_index,
                module: module.name.clone(),
                name: event_meta.name.clone(),
                values,
            },
            topics,
        });
    }

    if !input.is_empty() {
        return Err(InterfaceError::Decode(format!(
            "{} trailing bytes after events",
            input.len()
        )));
    }
    Ok(records)
}

/// Encode events back into the block storage layout
pub fn encode_events(
    codec: &ScaleCodec<'_>,
    metadata: &RuntimeMetadata,
    records: &[EventRecord],
) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    encode_compact(records.len() as u128, &mut bytes);
    for record in records {
        let (_, event_meta) = metadata.event(record.event.module_index, record.event.event_index)?;
        if event_meta.args.len() != record.event.values.len() {
            return Err(InterfaceError::InvalidInput(format!(
                "{} expects {} arguments, got {}",
                event_meta.name,
                event_meta.args.len(),
                record.event.values.len()
            )));
        }
        record.phase.encode_to(&mut bytes);
        bytes.push(record.event.module_index);
        bytes.push(record.event.event_index);
        for (arg, value) in event_meta.args.iter().zip(&record.event.values) {
            let ty = parse_type_string(arg)?;
            codec.encode_to(&ty, value, &mut bytes)?;
        }
        record.topics.encode_to(&mut bytes);
    }
    Ok(bytes)
}
