//! Member binding: overload resolution with a first-call cache.
//!
//! Resolution is keyed by (member name, argument tag signature). The winning
//! overload index is cached so repeated calls with the same shape skip the
//! scoring pass entirely.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use marten_value::{AccessError, AccessResult, ConvertError, ScriptValue, ValueTag};

use crate::member::{IndexerSlot, MethodOverload};

type Signature = SmallVec<[ValueTag; 4]>;

/// Per-proxy cache of resolved overloads.
#[derive(Default)]
pub struct BindingCache {
    resolved: Mutex<FxHashMap<(String, Signature), usize>>,
}

impl BindingCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lookup(&self, name: &str, sig: &Signature) -> Option<usize> {
        self.resolved
            .lock()
            .get(&(name.to_string(), sig.clone()))
            .copied()
    }

    fn store(&self, name: &str, sig: Signature, index: usize) {
        self.resolved.lock().insert((name.to_string(), sig), index);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.resolved.lock().len()
    }
}

fn signature_of(args: &[ScriptValue]) -> Signature {
    args.iter().map(|a| a.tag()).collect()
}

/// Score one overload against the arguments. `None` means incompatible;
/// lower totals are better matches.
fn score_overload(overload: &MethodOverload, args: &[ScriptValue]) -> Option<u32> {
    if overload.params.len() != args.len() {
        return None;
    }
    let mut total = 0u32;
    for (param, arg) in overload.params.iter().zip(args) {
        total += param.score(arg)? as u32;
    }
    Some(total)
}

/// Pick the best-matching overload for `args`.
///
/// An empty overload set is impossible here (callers check the slot exists),
/// so failure means the arguments fit no overload (a conversion failure,
/// distinct from member-not-found) or fit more than one equally well
/// (ambiguous).
pub fn resolve_overload<'a>(
    name: &str,
    overloads: &'a [MethodOverload],
    args: &[ScriptValue],
    cache: &BindingCache,
) -> AccessResult<&'a MethodOverload> {
    let sig = signature_of(args);
    if let Some(index) = cache.lookup(name, &sig) {
        return Ok(&overloads[index]);
    }

    let mut best: Option<(usize, u32)> = None;
    let mut tied = false;
    for (index, overload) in overloads.iter().enumerate() {
        let Some(score) = score_overload(overload, args) else {
            continue;
        };
        match best {
            Some((_, s)) if score > s => {}
            Some((_, s)) if score == s => tied = true,
            _ => {
                best = Some((index, score));
                tied = false;
            }
        }
    }

    match best {
        Some((index, _)) if !tied => {
            cache.store(name, sig, index);
            Ok(&overloads[index])
        }
        Some(_) => Err(AccessError::ambiguous(name)),
        None => {
            let found = args.first().map(|a| a.tag()).unwrap_or(ValueTag::Undefined);
            Err(AccessError::Conversion(ConvertError::mismatch(
                "arguments", found,
            )))
        }
    }
}

/// Pick the indexer whose key signature matches `args`.
///
/// No matching indexer signature is a not-found condition, distinct from a
/// conversion failure inside a matching indexer.
pub fn resolve_indexer<'a>(
    indexers: &'a [IndexerSlot],
    args: &[ScriptValue],
) -> AccessResult<&'a IndexerSlot> {
    let mut best: Option<(&IndexerSlot, u32)> = None;
    let mut tied = false;
    for slot in indexers {
        if slot.params.len() != args.len() {
            continue;
        }
        let mut total = 0u32;
        let mut ok = true;
        for (param, arg) in slot.params.iter().zip(args) {
            match param.score(arg) {
                Some(s) => total += s as u32,
                None => {
                    ok = false;
                    break;
                }
            }
        }
        if !ok {
            continue;
        }
        match best {
            Some((_, s)) if total > s => {}
            Some((_, s)) if total == s => tied = true,
            _ => {
                best = Some((slot, total));
                tied = false;
            }
        }
    }
    match best {
        Some((slot, _)) if !tied => Ok(slot),
        Some(_) => Err(AccessError::ambiguous("indexer")),
        None => Err(AccessError::not_found("indexer")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::{ParamType, TypeDescriptor};
    use std::sync::Arc;

    struct Probe;

    fn overload_set() -> Arc<TypeDescriptor> {
        TypeDescriptor::builder::<Probe>("Probe")
            .method("hit", &[ParamType::Int32], |_, _| {
                Ok(ScriptValue::string("i32"))
            })
            .method("hit", &[ParamType::String], |_, _| {
                Ok(ScriptValue::string("string"))
            })
            .method("hit", &[ParamType::Int32, ParamType::Int32], |_, _| {
                Ok(ScriptValue::string("i32,i32"))
            })
            .build()
    }

    fn call(desc: &TypeDescriptor, args: &[ScriptValue], cache: &BindingCache) -> String {
        let target: crate::member::HostTarget = Arc::new(Probe);
        let slot = desc.method("hit").unwrap();
        let overload = resolve_overload("hit", &slot.overloads, args, cache).unwrap();
        (overload.invoke)(&target, args)
            .unwrap()
            .try_to::<String>()
            .unwrap()
    }

    #[test]
    fn test_overload_by_arity_and_type() {
        let desc = overload_set();
        let cache = BindingCache::new();
        assert_eq!(call(&desc, &[ScriptValue::Int32(1)], &cache), "i32");
        assert_eq!(call(&desc, &[ScriptValue::string("x")], &cache), "string");
        assert_eq!(
            call(
                &desc,
                &[ScriptValue::Int32(1), ScriptValue::Int32(2)],
                &cache
            ),
            "i32,i32"
        );
    }

    #[test]
    fn test_exact_tag_beats_convertible() {
        let desc = overload_set();
        let cache = BindingCache::new();
        // Float64(1.0) converts to i32 but is not an exact match; with only
        // one viable overload it still resolves.
        assert_eq!(call(&desc, &[ScriptValue::Float64(1.0)], &cache), "i32");
    }

    #[test]
    fn test_no_match_is_conversion_failure() {
        let desc = overload_set();
        let cache = BindingCache::new();
        let slot = desc.method("hit").unwrap();
        let err = resolve_overload("hit", &slot.overloads, &[ScriptValue::Null], &cache)
            .err()
            .unwrap();
        assert!(matches!(err, AccessError::Conversion(_)));
    }

    #[test]
    fn test_ambiguous_tie() {
        let desc = TypeDescriptor::builder::<Probe>("Probe")
            .method("dup", &[ParamType::Any], |_, _| Ok(ScriptValue::Null))
            .method("dup", &[ParamType::Any], |_, _| Ok(ScriptValue::Null))
            .build();
        let slot = desc.method("dup").unwrap();
        let cache = BindingCache::new();
        let err = resolve_overload("dup", &slot.overloads, &[ScriptValue::Int32(1)], &cache)
            .err()
            .unwrap();
        assert!(matches!(err, AccessError::Ambiguous(_)));
    }

    #[test]
    fn test_cache_skips_rescore() {
        let desc = overload_set();
        let cache = BindingCache::new();
        let args = [ScriptValue::Int32(5)];
        let slot = desc.method("hit").unwrap();
        let first = resolve_overload("hit", &slot.overloads, &args, &cache).unwrap() as *const _;
        let second = resolve_overload("hit", &slot.overloads, &args, &cache).unwrap() as *const _;
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
    }
}
