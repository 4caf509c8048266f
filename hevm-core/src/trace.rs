use std::env;
use std::fmt;
use std::sync::OnceLock;

/// Trace categories, enabled via environment variables.
///
/// Supported:
/// - HEVM_TRACE="vm,sched,array,save" (comma/space separated; "all" enables all)
/// - HEVM_TRACE_VM=1, HEVM_TRACE_SCHED=1, HEVM_TRACE_ARRAY=1, HEVM_TRACE_SAVE=1
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceKind {
    Vm,
    Sched,
    Array,
    Save,
}

impl TraceKind {
    fn mask(self) -> u32 {
        match self {
            TraceKind::Vm => M_VM,
            TraceKind::Sched => M_SCHED,
            TraceKind::Array => M_ARRAY,
            TraceKind::Save => M_SAVE,
        }
    }
}

const M_VM: u32 = 1 << 0;
const M_SCHED: u32 = 1 << 1;
const M_ARRAY: u32 = 1 << 2;
const M_SAVE: u32 = 1 << 3;
const M_ALL: u32 = M_VM | M_SCHED | M_ARRAY | M_SAVE;

fn parse_bool_env(name: &str) -> bool {
    match env::var(name) {
        Ok(v) => {
            let s = v.trim().to_ascii_lowercase();
            !(s.is_empty() || s == "0" || s == "false" || s == "no" || s == "off")
        }
        Err(_) => false,
    }
}

pub(crate) fn parse_mask_from_trace_list(s: &str) -> u32 {
    let mut mask = 0u32;
    for raw in s.split(|c: char| c == ',' || c == ';' || c.is_whitespace()) {
        match raw.trim().to_ascii_lowercase().as_str() {
            "all" => mask |= M_ALL,
            "vm" | "op" => mask |= M_VM,
            "sched" | "scheduler" => mask |= M_SCHED,
            "array" => mask |= M_ARRAY,
            "save" => mask |= M_SAVE,
            _ => {}
        }
    }
    mask
}

fn build_mask() -> u32 {
    let mut mask = 0u32;
    if let Ok(list) = env::var("HEVM_TRACE") {
        mask |= parse_mask_from_trace_list(&list);
    }
    for (name, bit) in [
        ("HEVM_TRACE_VM", M_VM),
        ("HEVM_TRACE_SCHED", M_SCHED),
        ("HEVM_TRACE_ARRAY", M_ARRAY),
        ("HEVM_TRACE_SAVE", M_SAVE),
    ] {
        if parse_bool_env(name) {
            mask |= bit;
        }
    }
    mask
}

fn mask() -> u32 {
    static MASK: OnceLock<u32> = OnceLock::new();
    *MASK.get_or_init(build_mask)
}

pub fn enabled(k: TraceKind) -> bool {
    mask() & k.mask() != 0
}

fn emit(kind: TraceKind, args: fmt::Arguments) {
    if !enabled(kind) {
        return;
    }
    log::info!("{}", args);
}

pub fn vm(args: fmt::Arguments) {
    emit(TraceKind::Vm, args)
}

pub fn sched(args: fmt::Arguments) {
    emit(TraceKind::Sched, args)
}

pub fn array(args: fmt::Arguments) {
    emit(TraceKind::Array, args)
}

pub fn save(args: fmt::Arguments) {
    emit(TraceKind::Save, args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_list_parsing() {
        assert_eq!(parse_mask_from_trace_list("vm, sched"), M_VM | M_SCHED);
        assert_eq!(parse_mask_from_trace_list("ALL"), M_ALL);
        assert_eq!(parse_mask_from_trace_list("bogus;;array"), M_ARRAY);
        assert_eq!(parse_mask_from_trace_list(""), 0);
    }
}
