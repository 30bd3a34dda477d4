//! Report emission and cleaned-data persistence.
//!
//! Turns a [`DelayReport`] into per-view CSV tables plus a `report.md`
//! summary, and writes the cleaning pipeline's record sets as
//! CSV/JSON/NDJSON, optionally gzip-compressed. No aggregation logic
//! lives here.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::analyzers::types::{AirportTrend, DelayReport, ViewResult, YearAirlineRanking};
use crate::recover::RawRecord;

/// Canonical column order for cleaned CSV output; extras follow.
const CLEAN_COLUMNS: &[&str] = &[
    "cia_icao",
    "numero_voo",
    "codigo_autorizacao",
    "codigo_tipo_linha",
    "origem_icao",
    "destino_icao",
    "partida_prevista",
    "partida_real",
    "chegada_prevista",
    "chegada_real",
    "situacao_voo",
    "codigo_justificativa",
    "rota",
    "ano",
    "mes",
];

#[derive(Serialize)]
struct SeriesRow<'a> {
    ano: i32,
    rotulo: &'a str,
    metrica: &'a str,
    valor: f64,
}

#[derive(Serialize)]
struct AirlineRateRow<'a> {
    ano: i32,
    cia_icao: &'a str,
    taxa_atraso: f64,
    voos: u64,
    rank: u32,
}

#[derive(Serialize)]
struct AirlineCountRow<'a> {
    ano: i32,
    cia_icao: &'a str,
    atrasos: u64,
}

fn write_serialized<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn note_empty<T>(lines: &mut Vec<String>, view: &ViewResult<T>) {
    if let Some(reason) = view.reason() {
        lines.push(format!("_Sem dados: {reason}._\n"));
    }
}

/// Writes the report tables and `report.md` under `out_dir`.
///
/// Populated views become CSV files in `out_dir/tables/`; empty views are
/// noted in the markdown with their reason. Never fails because of an
/// empty view.
pub fn write_report(report: &DelayReport, out_dir: &Path) -> Result<()> {
    let tables = out_dir.join("tables");
    fs::create_dir_all(&tables)?;

    let mut lines: Vec<String> = Vec::new();
    lines.push("# Relatório de Atrasos (VRA)\n".to_string());
    lines.push(format!(
        "- Regra de pontualidade: atraso > **{} min** (chegada preferencial; partida como fallback).",
        report.config.on_time_min
    ));
    lines.push(format!(
        "- Ranking de companhias por taxa exige n ≥ {} voos/ano (fallback para contagem).\n",
        report.config.min_count_airline
    ));

    lines.push("## 1) Qual o aeroporto que tem mais atrasos no geral?".to_string());
    if let Some(data) = report.airport_counts.data() {
        if !data.destino_top.is_empty() {
            write_serialized(
                &tables.join("aeroportos_destino_mais_atrasos.csv"),
                &data.destino_top,
            )?;
            lines.push(
                "Tabela: `tables/aeroportos_destino_mais_atrasos.csv` (por destino).".to_string(),
            );
        }
        if !data.origem_top.is_empty() {
            write_serialized(
                &tables.join("aeroportos_origem_mais_atrasos.csv"),
                &data.origem_top,
            )?;
            lines.push(
                "Tabela: `tables/aeroportos_origem_mais_atrasos.csv` (por origem).".to_string(),
            );
        }
        lines.push(String::new());
    }
    note_empty(&mut lines, &report.airport_counts);

    lines.push("## 2) Qual aeroporto aumentou e qual diminuiu o número de atrasos?".to_string());
    match report.airport_trend.data() {
        Some(AirportTrend::Delta {
            primeiro_ano,
            ultimo_ano,
            destino,
            origem,
        }) => {
            if !destino.is_empty() {
                write_serialized(&tables.join("aeroporto_destino_variacao_atrasos.csv"), destino)?;
            }
            if !origem.is_empty() {
                write_serialized(&tables.join("aeroporto_origem_variacao_atrasos.csv"), origem)?;
            }
            lines.push(format!(
                "Δ = atrasos em {ultimo_ano} − atrasos em {primeiro_ano}. Tabelas: \
                 `tables/aeroporto_destino_variacao_atrasos.csv`, \
                 `tables/aeroporto_origem_variacao_atrasos.csv`.\n"
            ));
        }
        Some(AirportTrend::SingleYearCounts { ano, destino, origem }) => {
            if !destino.is_empty() {
                write_serialized(
                    &tables.join(format!("aeroporto_destino_atrasos_{ano}.csv")),
                    destino,
                )?;
            }
            if !origem.is_empty() {
                write_serialized(
                    &tables.join(format!("aeroporto_origem_atrasos_{ano}.csv")),
                    origem,
                )?;
            }
            lines.push(format!(
                "Apenas um ano nos dados ({ano}): ranking por contagem, sem Δ.\n"
            ));
        }
        None => {}
    }
    note_empty(&mut lines, &report.airport_trend);

    lines.push("## 3) Os atrasos aumentaram ou diminuíram no período?".to_string());
    if let Some(data) = report.monthly_trend.data() {
        write_serialized(&tables.join("tendencia_mensal_taxa_atraso.csv"), data)?;
        lines.push("Tabela: `tables/tendencia_mensal_taxa_atraso.csv` (taxa mensal).\n".to_string());
    }
    note_empty(&mut lines, &report.monthly_trend);

    lines.push("## 4) Dias da semana com mais atrasos (a cada ano)".to_string());
    if let Some(series) = report.weekday_pattern.data() {
        let rows: Vec<SeriesRow> = series
            .iter()
            .flat_map(|s| {
                s.values.iter().map(|(rotulo, valor)| SeriesRow {
                    ano: s.ano,
                    rotulo: rotulo.as_str(),
                    metrica: s.metric.label(),
                    valor: *valor,
                })
            })
            .collect();
        write_serialized(&tables.join("dias_semana_por_ano.csv"), &rows)?;
        lines.push(
            "Tabela: `tables/dias_semana_por_ano.csv` (Seg…Dom; taxa ou contagem).\n".to_string(),
        );
    }
    note_empty(&mut lines, &report.weekday_pattern);

    lines.push("## 5) Período do dia com mais atrasos (a cada ano)".to_string());
    if let Some(series) = report.period_pattern.data() {
        let rows: Vec<SeriesRow> = series
            .iter()
            .flat_map(|s| {
                s.values.iter().map(|(rotulo, valor)| SeriesRow {
                    ano: s.ano,
                    rotulo: rotulo.as_str(),
                    metrica: s.metric.label(),
                    valor: *valor,
                })
            })
            .collect();
        write_serialized(&tables.join("periodo_dia_por_ano.csv"), &rows)?;
        lines.push(
            "Tabela: `tables/periodo_dia_por_ano.csv` (madrugada, manhã, tarde, noite).\n"
                .to_string(),
        );
    }
    note_empty(&mut lines, &report.period_pattern);

    lines.push("## 6) Companhia que mais atrasa (a cada ano)".to_string());
    if let Some(entries) = report.airline_ranking.data() {
        let mut rate_rows: Vec<AirlineRateRow> = Vec::new();
        let mut count_rows: Vec<AirlineCountRow> = Vec::new();
        for entry in entries {
            match &entry.ranking {
                YearAirlineRanking::Taxa(table) => {
                    rate_rows.extend(table.iter().map(|r| AirlineRateRow {
                        ano: entry.ano,
                        cia_icao: r.cia_icao.as_str(),
                        taxa_atraso: r.taxa_atraso,
                        voos: r.voos,
                        rank: r.rank,
                    }));
                }
                YearAirlineRanking::Contagem(table) => {
                    count_rows.extend(table.iter().map(|c| AirlineCountRow {
                        ano: entry.ano,
                        cia_icao: c.cia_icao.as_str(),
                        atrasos: c.atrasos,
                    }));
                }
            }
        }
        if !rate_rows.is_empty() {
            write_serialized(&tables.join("companhias_taxa_atraso_por_ano.csv"), &rate_rows)?;
            lines.push(
                "Tabela: `tables/companhias_taxa_atraso_por_ano.csv` (taxa, rank denso)."
                    .to_string(),
            );
        }
        if !count_rows.is_empty() {
            write_serialized(
                &tables.join("companhias_contagem_atraso_por_ano.csv"),
                &count_rows,
            )?;
            lines.push(
                "Tabela: `tables/companhias_contagem_atraso_por_ano.csv` (anos sem n mínimo)."
                    .to_string(),
            );
        }
        lines.push(String::new());
    }
    note_empty(&mut lines, &report.airline_ranking);

    if !report.diagnostics.is_empty() {
        lines.push("## Diagnósticos".to_string());
        for diagnostic in &report.diagnostics {
            warn!(%diagnostic, "aggregation diagnostic");
            lines.push(format!("- {diagnostic}"));
        }
        lines.push(String::new());
    }

    let markdown = out_dir.join("report.md");
    fs::write(&markdown, lines.join("\n"))?;
    info!(path = %markdown.display(), "report written");
    Ok(())
}

fn write_bytes(path: &Path, bytes: &[u8], gzip: bool) -> Result<()> {
    if gzip {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes)?;
        let compressed = encoder.finish()?;
        fs::write(path, compressed)?;
    } else {
        fs::write(path, bytes)?;
    }
    Ok(())
}

fn output_path(out_dir: &Path, basename: &str, extension: &str, gzip: bool) -> PathBuf {
    let name = if gzip {
        format!("{basename}.{extension}.gz")
    } else {
        format!("{basename}.{extension}")
    };
    out_dir.join(name)
}

fn csv_headers(records: &[RawRecord]) -> Vec<String> {
    let mut headers: Vec<String> = CLEAN_COLUMNS
        .iter()
        .filter(|c| records.iter().any(|r| r.contains_key(**c)))
        .map(|c| c.to_string())
        .collect();
    let mut extras: Vec<String> = records
        .iter()
        .flat_map(|r| r.keys())
        .filter(|k| !CLEAN_COLUMNS.contains(&k.as_str()))
        .cloned()
        .collect();
    extras.sort();
    extras.dedup();
    headers.extend(extras);
    headers
}

fn csv_field(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Writes cleaned records under `out_dir` as `basename.csv` and/or
/// `basename.json`/`basename.ndjson`, with a `.gz` suffix when compressed.
/// Returns the paths written.
pub fn save_cleaned(
    records: &[RawRecord],
    out_dir: &Path,
    basename: &str,
    want_csv: bool,
    want_json: bool,
    ndjson: bool,
    gzip: bool,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir)?;
    let mut written = Vec::new();

    if want_csv {
        let headers = csv_headers(records);
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&headers)?;
        for record in records {
            writer.write_record(headers.iter().map(|h| csv_field(record.get(h))))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("finishing CSV buffer: {e}"))?;
        let path = output_path(out_dir, basename, "csv", gzip);
        write_bytes(&path, &bytes, gzip)?;
        info!(path = %path.display(), records = records.len(), "CSV saved");
        written.push(path);
    }

    if want_json {
        let (extension, bytes) = if ndjson {
            let mut buffer = String::new();
            for record in records {
                buffer.push_str(&serde_json::to_string(record)?);
                buffer.push('\n');
            }
            ("ndjson", buffer.into_bytes())
        } else {
            ("json", serde_json::to_vec_pretty(records)?)
        };
        let path = output_path(out_dir, basename, extension, gzip);
        write_bytes(&path, &bytes, gzip)?;
        info!(path = %path.display(), records = records.len(), "JSON saved");
        written.push(path);
    }

    Ok(written)
}
