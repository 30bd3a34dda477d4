//! Geographic filtering for the cleaning pipeline.

use serde_json::Value;

use crate::recover::RawRecord;

/// ICAO prefixes assigned to Brazilian aerodromes.
pub const BR_PREFIXES: &[&str] = &["SB", "SD", "SN", "SS", "SW"];

/// Which endpoints must be domestic for a flight to be kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterScope {
    /// Origin AND destination are Brazilian.
    Both,
    /// At least one endpoint is Brazilian.
    Either,
}

/// Whether an ICAO code belongs to a Brazilian aerodrome.
pub fn is_brazilian(icao: &str) -> bool {
    let upper = icao.trim().to_uppercase();
    BR_PREFIXES.iter().any(|p| upper.starts_with(p))
}

fn endpoint(record: &RawRecord, key: &str) -> bool {
    record
        .get(key)
        .and_then(Value::as_str)
        .map(is_brazilian)
        .unwrap_or(false)
}

/// Applies the domestic predicate to a cleaned record (canonical names).
pub fn is_domestic(record: &RawRecord, scope: FilterScope) -> bool {
    let origem = endpoint(record, "origem_icao");
    let destino = endpoint(record, "destino_icao");
    match scope {
        FilterScope::Both => origem && destino,
        FilterScope::Either => origem || destino,
    }
}
