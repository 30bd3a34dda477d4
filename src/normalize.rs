//! Schema normalization for recovered VRA records.
//!
//! Renames the publisher's column names to canonical snake_case fields,
//! parses timestamps, and derives route and calendar features. Records
//! missing columns keep going with the corresponding fields unset; they
//! are never dropped here.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde_json::Value;

use crate::recover::RawRecord;

/// Source column name → canonical field name.
pub static FIELD_RENAMES: &[(&str, &str)] = &[
    ("ICAOEmpresaAérea", "cia_icao"),
    ("NúmeroVoo", "numero_voo"),
    ("CódigoAutorização", "codigo_autorizacao"),
    ("CódigoTipoLinha", "codigo_tipo_linha"),
    ("ICAOAeródromoOrigem", "origem_icao"),
    ("ICAOAeródromoDestino", "destino_icao"),
    ("PartidaPrevista", "partida_prevista"),
    ("PartidaReal", "partida_real"),
    ("ChegadaPrevista", "chegada_prevista"),
    ("ChegadaReal", "chegada_real"),
    ("SituaçãoVoo", "situacao_voo"),
    ("CódigoJustificativa", "codigo_justificativa"),
];

const TIMESTAMP_COLUMNS: &[&str] = &[
    "partida_prevista",
    "partida_real",
    "chegada_prevista",
    "chegada_real",
];

/// Timestamp layouts seen across VRA exports, most common first.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Maps a source column name to its canonical name, or passes it through.
pub fn canonical_name(source: &str) -> &str {
    FIELD_RENAMES
        .iter()
        .find(|(from, _)| *from == source)
        .map(|(_, to)| *to)
        .unwrap_or(source)
}

/// Parses a VRA timestamp string, trying each known layout in order.
/// Unparseable values are missing, not errors.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// One normalized flight movement. Every field is optional: the input is
/// whatever subset of columns the publisher managed to export that month.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Flight {
    pub cia_icao: Option<String>,
    pub numero_voo: Option<String>,
    pub codigo_autorizacao: Option<String>,
    pub codigo_tipo_linha: Option<String>,
    pub origem_icao: Option<String>,
    pub destino_icao: Option<String>,
    pub partida_prevista: Option<NaiveDateTime>,
    pub partida_real: Option<NaiveDateTime>,
    pub chegada_prevista: Option<NaiveDateTime>,
    pub chegada_real: Option<NaiveDateTime>,
    pub situacao_voo: Option<String>,
    pub codigo_justificativa: Option<String>,

    /// ORIGIN-DEST, uppercase. Set only when both endpoints are present.
    pub rota: Option<String>,
    pub ano: Option<i32>,
    pub mes: Option<u32>,
    pub hora: Option<u32>,
    /// Weekday index, 0 = Monday .. 6 = Sunday.
    pub dow: Option<u32>,

    pub atraso_partida_min: Option<f64>,
    pub atraso_chegada_min: Option<f64>,
    pub delay_min: Option<f64>,
    pub is_delayed: Option<bool>,

    /// Unmapped source fields, passed through unchanged.
    pub extra: BTreeMap<String, Value>,
}

impl Flight {
    /// Builds a normalized flight from one recovered record.
    pub fn from_raw(raw: &RawRecord) -> Flight {
        let mut flight = Flight::default();

        for (key, value) in raw {
            let canonical = canonical_name(key);
            match canonical {
                "cia_icao" => flight.cia_icao = scalar_string(value),
                "numero_voo" => flight.numero_voo = scalar_string(value),
                "codigo_autorizacao" => flight.codigo_autorizacao = scalar_string(value),
                "codigo_tipo_linha" => flight.codigo_tipo_linha = scalar_string(value),
                "origem_icao" => flight.origem_icao = scalar_string(value),
                "destino_icao" => flight.destino_icao = scalar_string(value),
                "partida_prevista" => flight.partida_prevista = scalar_timestamp(value),
                "partida_real" => flight.partida_real = scalar_timestamp(value),
                "chegada_prevista" => flight.chegada_prevista = scalar_timestamp(value),
                "chegada_real" => flight.chegada_real = scalar_timestamp(value),
                "situacao_voo" => flight.situacao_voo = scalar_string(value),
                "codigo_justificativa" => flight.codigo_justificativa = scalar_string(value),
                _ => {
                    flight.extra.insert(key.clone(), value.clone());
                }
            }
        }

        if let (Some(origem), Some(destino)) = (&flight.origem_icao, &flight.destino_icao) {
            flight.rota = Some(format!(
                "{}-{}",
                origem.to_uppercase(),
                destino.to_uppercase()
            ));
        }

        if let Some(reference) = flight.reference_timestamp() {
            flight.ano = Some(reference.year());
            flight.mes = Some(reference.month());
            flight.hora = Some(reference.hour());
            flight.dow = Some(reference.weekday().num_days_from_monday());
        }

        flight
    }

    /// The timestamp calendar features derive from: scheduled departure,
    /// then scheduled arrival, then actual departure, then actual arrival.
    pub fn reference_timestamp(&self) -> Option<NaiveDateTime> {
        self.partida_prevista
            .or(self.chegada_prevista)
            .or(self.partida_real)
            .or(self.chegada_real)
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() { None } else { Some(s.to_string()) }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn scalar_timestamp(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::String(s) => parse_timestamp(s),
        _ => None,
    }
}

/// Canonical columns observed across the raw input. Views use this to tell
/// "column absent" apart from "column present but sparse".
#[derive(Debug, Default, Clone)]
pub struct ColumnSet {
    observed: BTreeSet<String>,
}

impl ColumnSet {
    pub fn observe(&mut self, raw: &RawRecord) {
        for key in raw.keys() {
            self.observed.insert(canonical_name(key).to_string());
        }
    }

    /// Derived columns exist whenever their sources do, mirroring what a
    /// column-wise pipeline would produce.
    fn finalize(&mut self) {
        if TIMESTAMP_COLUMNS.iter().any(|c| self.contains(c)) {
            for derived in ["ano", "mes", "hora", "dow"] {
                self.observed.insert(derived.to_string());
            }
        }
        if self.contains("origem_icao") && self.contains("destino_icao") {
            self.observed.insert("rota".to_string());
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.observed.contains(name)
    }
}

/// A normalized dataset: the flights plus which columns the input carried.
#[derive(Debug, Default)]
pub struct Dataset {
    pub flights: Vec<Flight>,
    pub columns: ColumnSet,
}

/// Normalizes a batch of recovered records into flights.
pub fn normalize_records(raws: &[RawRecord]) -> Dataset {
    let mut columns = ColumnSet::default();
    let mut flights = Vec::with_capacity(raws.len());
    for raw in raws {
        columns.observe(raw);
        flights.push(Flight::from_raw(raw));
    }
    columns.finalize();
    Dataset { flights, columns }
}

/// Normalizes one record for the cleaning pipeline: canonical names,
/// timestamps rewritten in ISO form, route and calendar fields added,
/// everything else passed through.
pub fn clean_record(raw: &RawRecord) -> RawRecord {
    let flight = Flight::from_raw(raw);
    let mut out = RawRecord::new();

    let mut put = |key: &str, value: Option<Value>| {
        if let Some(value) = value {
            out.insert(key.to_string(), value);
        }
    };

    put("cia_icao", flight.cia_icao.clone().map(Value::from));
    put("numero_voo", flight.numero_voo.clone().map(Value::from));
    put(
        "codigo_autorizacao",
        flight.codigo_autorizacao.clone().map(Value::from),
    );
    put(
        "codigo_tipo_linha",
        flight.codigo_tipo_linha.clone().map(Value::from),
    );
    put("origem_icao", flight.origem_icao.clone().map(Value::from));
    put("destino_icao", flight.destino_icao.clone().map(Value::from));
    for (key, ts) in [
        ("partida_prevista", flight.partida_prevista),
        ("partida_real", flight.partida_real),
        ("chegada_prevista", flight.chegada_prevista),
        ("chegada_real", flight.chegada_real),
    ] {
        put(
            key,
            ts.map(|t| Value::from(t.format("%Y-%m-%dT%H:%M:%S").to_string())),
        );
    }
    put("situacao_voo", flight.situacao_voo.clone().map(Value::from));
    put(
        "codigo_justificativa",
        flight.codigo_justificativa.clone().map(Value::from),
    );
    put("rota", flight.rota.clone().map(Value::from));
    put("ano", flight.ano.map(Value::from));
    put("mes", flight.mes.map(Value::from));

    for (key, value) in &flight.extra {
        out.insert(key.clone(), value.clone());
    }

    out
}
