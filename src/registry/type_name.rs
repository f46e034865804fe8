//! Type-string parsing
//!
//! Metadata and presets describe types with Rust-like strings such as
//! `Compact<T::Balance>`, `Vec<(AccountId, u32)>` or
//! `<T::Lookup as StaticLookup>::Source`. These are turned into
//! [`TypeDescriptor`]s once, at insertion time; named references become
//! [`TypeKind::Alias`] nodes keyed by their normalized name.

use super::descriptor::{Primitive, TypeDescriptor, TypeKey, TypeKind};
use crate::error::{InterfaceError, Result};

/// Spellings that name the same type, applied before normalization
const KNOWN_ALIASES: &[(&str, &str)] = &[
    ("<T::Lookup as StaticLookup>::Source", "LookupSource"),
    ("&'static [u8]", "Bytes"),
    ("&[u8]", "Bytes"),
    ("<T::Balance as HasCompact>", "Compact<Balance>"),
];

/// Canonical spelling of a type name, with case preserved.
///
/// Collapses whitespace, rewrites [`KNOWN_ALIASES`], drops trait projections
/// (`<T as Trait<I>>::Balance` becomes `Balance`) and `T::` prefixes.
pub fn canonical_name(name: &str) -> String {
    let mut canonical = name.split_whitespace().collect::<Vec<_>>().join(" ");
    for (from, to) in KNOWN_ALIASES {
        canonical = canonical.replace(from, to);
    }
    canonical = strip_trait_projections(&canonical);
    canonical.replace("T::", "").replace(' ', "")
}

fn strip_trait_projections(name: &str) -> String {
    let mut name = name.to_string();
    while let Some(as_pos) = name.find(" as ") {
        let open = name[..as_pos].rfind('<');
        let close = name[as_pos..].find(">::").map(|p| p + as_pos);
        match (open, close) {
            (Some(open), Some(close)) => name.replace_range(open..close + 3, ""),
            _ => break,
        }
    }
    name
}

/// Parse a type string into a descriptor.
pub fn parse_type_string(type_string: &str) -> Result<TypeDescriptor> {
    let canonical = canonical_name(type_string);
    parse_canonical(&canonical)
}

fn parse_canonical(s: &str) -> Result<TypeDescriptor> {
    if s.is_empty() {
        return Err(InterfaceError::UnknownType("<empty type string>".to_string()));
    }

    if s == "()" || s.eq_ignore_ascii_case("null") {
        return Ok(TypeDescriptor::new(s, TypeKind::Tuple(vec![])));
    }

    if let Some(inner) = s.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
        let items = split_top_level(inner, ',')
            .into_iter()
            .filter(|item| !item.is_empty())
            .map(parse_canonical)
            .collect::<Result<Vec<_>>>()?;
        return Ok(TypeDescriptor::new(s, TypeKind::Tuple(items)));
    }

    if let Some(inner) = s.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
        let parts = split_top_level(inner, ';');
        if parts.len() != 2 {
            return Err(InterfaceError::UnknownType(s.to_string()));
        }
        let len = parts[1]
            .parse::<usize>()
            .map_err(|_| InterfaceError::UnknownType(s.to_string()))?;
        let element = parse_canonical(parts[0])?;
        return Ok(TypeDescriptor::new(
            s,
            TypeKind::Array(Box::new(element), len),
        ));
    }

    if let (Some(open), true) = (s.find('<'), s.ends_with('>')) {
        let base = &s[..open];
        let args = split_top_level(&s[open + 1..s.len() - 1], ',');
        let first = || -> Result<TypeDescriptor> {
            let arg = args
                .first()
                .ok_or_else(|| InterfaceError::UnknownType(s.to_string()))?;
            parse_canonical(arg)
        };
        let kind = match base.to_lowercase().as_str() {
            "vec" | "vecdeque" | "btreeset" | "boundedvec" | "weakboundedvec" => {
                TypeKind::Sequence(Box::new(first()?))
            }
            "compact" => TypeKind::Compact(Box::new(first()?)),
            "option" => TypeKind::Option(Box::new(first()?)),
            "box" | "rc" | "arc" => return Ok(first()?.renamed(s)),
            "btreemap" | "boundedbtreemap" => {
                if args.len() < 2 {
                    return Err(InterfaceError::UnknownType(s.to_string()));
                }
                let pair = TypeDescriptor::new(
                    format!("({},{})", args[0], args[1]),
                    TypeKind::Tuple(vec![parse_canonical(args[0])?, parse_canonical(args[1])?]),
                );
                TypeKind::Sequence(Box::new(pair))
            }
            "phantomdata" => TypeKind::Tuple(vec![]),
            // Other generics are registered under their bare name
            _ => TypeKind::Alias(TypeKey::new(base)),
        };
        return Ok(TypeDescriptor::new(s, kind));
    }

    if let Some(primitive) = Primitive::from_name(s) {
        return Ok(TypeDescriptor::primitive(primitive));
    }

    Ok(TypeDescriptor::alias(s, s))
}

/// Split on `separator` where it is not nested inside `<>`, `()` or `[]`
fn split_top_level(s: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '<' | '(' | '[' => depth += 1,
            '>' | ')' | ']' => depth -= 1,
            c if c == separator && depth == 0 => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}
