use std::collections::{BTreeMap, BTreeSet};

use crate::analyzers::rank::dense_ranks;
use crate::analyzers::types::{
    AirlineCount, AirlineRate, AirlineYearEntry, AirportCount, AirportDelayCounts, AirportDelta,
    AirportTrend, DelayReport, MonthlyRate, ReportConfig, SeriesMetric, ViewResult,
    YearAirlineRanking, YearlySeries,
};
use crate::analyzers::utility::rate;
use crate::normalize::{ColumnSet, Flight};
use chrono::Datelike;

/// Weekday display labels, Monday first.
pub const DOW_LABELS: [&str; 7] = ["Seg", "Ter", "Qua", "Qui", "Sex", "Sáb", "Dom"];

/// Fixed hour buckets of the day, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Periodo {
    Madrugada,
    Manha,
    Tarde,
    Noite,
}

impl Periodo {
    pub const ORDER: [Periodo; 4] = [
        Periodo::Madrugada,
        Periodo::Manha,
        Periodo::Tarde,
        Periodo::Noite,
    ];

    pub fn from_hora(hora: u32) -> Periodo {
        match hora {
            0..=5 => Periodo::Madrugada,
            6..=11 => Periodo::Manha,
            12..=17 => Periodo::Tarde,
            _ => Periodo::Noite,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Periodo::Madrugada => "madrugada",
            Periodo::Manha => "manhã",
            Periodo::Tarde => "tarde",
            Periodo::Noite => "noite",
        }
    }
}

fn delayed(flight: &Flight) -> bool {
    flight.is_delayed == Some(true)
}

fn distinct_years(flights: &[Flight]) -> Vec<i32> {
    let years: BTreeSet<i32> = flights.iter().filter_map(|f| f.ano).collect();
    years.into_iter().collect()
}

/// Delayed counts per airport, sorted by count descending then code.
/// Groups with zero delayed flights still appear.
fn count_delayed_by<'a, I, K>(flights: I, key: K) -> Vec<AirportCount>
where
    I: IntoIterator<Item = &'a Flight>,
    K: Fn(&'a Flight) -> Option<&'a str>,
{
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for flight in flights {
        if let Some(code) = key(flight) {
            let entry = counts.entry(code).or_default();
            if delayed(flight) {
                *entry += 1;
            }
        }
    }
    let mut out: Vec<AirportCount> = counts
        .into_iter()
        .map(|(aeroporto, atrasos)| AirportCount {
            aeroporto: aeroporto.to_string(),
            atrasos,
        })
        .collect();
    out.sort_by(|a, b| {
        b.atrasos
            .cmp(&a.atrasos)
            .then_with(|| a.aeroporto.cmp(&b.aeroporto))
    });
    out
}

/// View 1: airports with the most delayed flights, by destination and by
/// origin. Always count-based.
pub fn most_delayed_airports(
    flights: &[Flight],
    columns: &ColumnSet,
) -> ViewResult<AirportDelayCounts> {
    let has_destino = columns.contains("destino_icao");
    let has_origem = columns.contains("origem_icao");
    if !has_destino && !has_origem {
        return ViewResult::empty("neither destino_icao nor origem_icao is present");
    }

    let destino_top = if has_destino {
        count_delayed_by(flights, |f| f.destino_icao.as_deref())
    } else {
        Vec::new()
    };
    let origem_top = if has_origem {
        count_delayed_by(flights, |f| f.origem_icao.as_deref())
    } else {
        Vec::new()
    };
    ViewResult::Ready(AirportDelayCounts {
        destino_top,
        origem_top,
    })
}

fn year_deltas<'a, K>(flights: &'a [Flight], key: K, primeiro: i32, ultimo: i32) -> Vec<AirportDelta>
where
    K: Fn(&'a Flight) -> Option<&'a str>,
{
    let mut per_airport: BTreeMap<&str, BTreeMap<i32, u64>> = BTreeMap::new();
    for flight in flights {
        if let (Some(code), Some(ano)) = (key(flight), flight.ano) {
            let years = per_airport.entry(code).or_default();
            let count = years.entry(ano).or_default();
            if delayed(flight) {
                *count += 1;
            }
        }
    }
    let mut out: Vec<AirportDelta> = per_airport
        .into_iter()
        .map(|(code, years)| {
            let first = years.get(&primeiro).copied().unwrap_or(0) as i64;
            let last = years.get(&ultimo).copied().unwrap_or(0) as i64;
            AirportDelta {
                aeroporto: code.to_string(),
                delta_atrasos: last - first,
            }
        })
        .collect();
    out.sort_by(|a, b| {
        b.delta_atrasos
            .cmp(&a.delta_atrasos)
            .then_with(|| a.aeroporto.cmp(&b.aeroporto))
    });
    out
}

/// View 2: year-over-year delay trend per airport. Needs at least two
/// distinct years for the delta; a single-year dataset falls back to a
/// plain count ranking for that year.
pub fn airport_delay_trend(
    flights: &[Flight],
    columns: &ColumnSet,
    diagnostics: &mut Vec<String>,
) -> ViewResult<AirportTrend> {
    if !columns.contains("ano") {
        return ViewResult::empty("ano column is absent");
    }
    let has_destino = columns.contains("destino_icao");
    let has_origem = columns.contains("origem_icao");
    if !has_destino && !has_origem {
        return ViewResult::empty("neither destino_icao nor origem_icao is present");
    }

    let anos = distinct_years(flights);
    match anos.as_slice() {
        [] => ViewResult::empty("no record carries a derivable year"),
        [ano] => {
            let ano = *ano;
            diagnostics.push(format!(
                "airport trend: only one year in the data ({ano}), ranking by count instead of delta"
            ));
            let year_flights = flights.iter().filter(|f| f.ano == Some(ano));
            let destino = if has_destino {
                count_delayed_by(year_flights.clone(), |f| f.destino_icao.as_deref())
            } else {
                Vec::new()
            };
            let origem = if has_origem {
                count_delayed_by(year_flights, |f| f.origem_icao.as_deref())
            } else {
                Vec::new()
            };
            ViewResult::Ready(AirportTrend::SingleYearCounts {
                ano,
                destino,
                origem,
            })
        }
        [primeiro, .., ultimo] => {
            let (primeiro, ultimo) = (*primeiro, *ultimo);
            let destino = if has_destino {
                year_deltas(flights, |f| f.destino_icao.as_deref(), primeiro, ultimo)
            } else {
                Vec::new()
            };
            let origem = if has_origem {
                year_deltas(flights, |f| f.origem_icao.as_deref(), primeiro, ultimo)
            } else {
                Vec::new()
            };
            ViewResult::Ready(AirportTrend::Delta {
                primeiro_ano: primeiro,
                ultimo_ano: ultimo,
                destino,
                origem,
            })
        }
    }
}

/// View 3: mean delay rate per calendar month of the scheduled departure.
pub fn monthly_delay_trend(flights: &[Flight], columns: &ColumnSet) -> ViewResult<Vec<MonthlyRate>> {
    if !columns.contains("partida_prevista") {
        return ViewResult::empty("partida_prevista column is absent");
    }
    let mut groups: BTreeMap<(i32, u32), (u64, u64)> = BTreeMap::new();
    for flight in flights {
        if let Some(ts) = flight.partida_prevista {
            let entry = groups.entry((ts.year(), ts.month())).or_default();
            entry.1 += 1;
            if delayed(flight) {
                entry.0 += 1;
            }
        }
    }
    if groups.is_empty() {
        return ViewResult::empty("no record carries a parseable scheduled departure");
    }
    ViewResult::Ready(
        groups
            .into_iter()
            .map(|((ano, mes), (d, t))| MonthlyRate {
                ano,
                mes,
                taxa_atraso: rate(d, t),
            })
            .collect(),
    )
}

/// View 4: delay rate per weekday for each year, Monday→Sunday, with the
/// per-year fallback to delayed counts when a rate series comes up empty.
pub fn weekday_pattern(
    flights: &[Flight],
    columns: &ColumnSet,
    diagnostics: &mut Vec<String>,
) -> ViewResult<Vec<YearlySeries>> {
    if !columns.contains("ano") || !columns.contains("dow") {
        return ViewResult::empty("ano/dow columns are absent");
    }
    let mut groups: BTreeMap<(i32, u32), (u64, u64)> = BTreeMap::new();
    for flight in flights {
        if let (Some(ano), Some(dow)) = (flight.ano, flight.dow) {
            let entry = groups.entry((ano, dow)).or_default();
            entry.1 += 1;
            if delayed(flight) {
                entry.0 += 1;
            }
        }
    }

    let mut series = Vec::new();
    for ano in distinct_years(flights) {
        let taxa: Vec<(String, f64)> = (0..7u32)
            .filter_map(|dow| {
                groups
                    .get(&(ano, dow))
                    .map(|&(d, t)| (DOW_LABELS[dow as usize].to_string(), rate(d, t)))
            })
            .collect();
        if !taxa.is_empty() {
            series.push(YearlySeries {
                ano,
                metric: SeriesMetric::Taxa,
                values: taxa,
            });
            continue;
        }
        let contagem: Vec<(String, f64)> = (0..7u32)
            .filter_map(|dow| {
                groups
                    .get(&(ano, dow))
                    .map(|&(d, _)| (DOW_LABELS[dow as usize].to_string(), d as f64))
            })
            .collect();
        if contagem.is_empty() {
            diagnostics.push(format!("weekday pattern: no data for {ano}"));
        } else {
            series.push(YearlySeries {
                ano,
                metric: SeriesMetric::Contagem,
                values: contagem,
            });
        }
    }

    if series.is_empty() {
        ViewResult::empty("no year produced a weekday series")
    } else {
        ViewResult::Ready(series)
    }
}

/// View 5: delay rate per period of the day for each year, in fixed
/// madrugada→manhã→tarde→noite order, same rate→count fallback as the
/// weekday view.
pub fn period_pattern(
    flights: &[Flight],
    columns: &ColumnSet,
    diagnostics: &mut Vec<String>,
) -> ViewResult<Vec<YearlySeries>> {
    if !columns.contains("ano") || !columns.contains("hora") {
        return ViewResult::empty("ano/hora columns are absent");
    }
    let mut groups: BTreeMap<(i32, Periodo), (u64, u64)> = BTreeMap::new();
    for flight in flights {
        if let (Some(ano), Some(hora)) = (flight.ano, flight.hora) {
            let entry = groups.entry((ano, Periodo::from_hora(hora))).or_default();
            entry.1 += 1;
            if delayed(flight) {
                entry.0 += 1;
            }
        }
    }

    let mut series = Vec::new();
    for ano in distinct_years(flights) {
        let taxa: Vec<(String, f64)> = Periodo::ORDER
            .iter()
            .filter_map(|&periodo| {
                groups
                    .get(&(ano, periodo))
                    .map(|&(d, t)| (periodo.label().to_string(), rate(d, t)))
            })
            .collect();
        if !taxa.is_empty() {
            series.push(YearlySeries {
                ano,
                metric: SeriesMetric::Taxa,
                values: taxa,
            });
            continue;
        }
        let contagem: Vec<(String, f64)> = Periodo::ORDER
            .iter()
            .filter_map(|&periodo| {
                groups
                    .get(&(ano, periodo))
                    .map(|&(d, _)| (periodo.label().to_string(), d as f64))
            })
            .collect();
        if contagem.is_empty() {
            diagnostics.push(format!("period pattern: no data for {ano}"));
        } else {
            series.push(YearlySeries {
                ano,
                metric: SeriesMetric::Contagem,
                values: contagem,
            });
        }
    }

    if series.is_empty() {
        ViewResult::empty("no year produced a period-of-day series")
    } else {
        ViewResult::Ready(series)
    }
}

/// View 6: airline delay-rate ranking per year, dense-ranked, restricted
/// to airlines with enough flights that year. Years where nobody reaches
/// the minimum fall back to a raw delayed-count ranking.
pub fn airline_ranking(
    flights: &[Flight],
    columns: &ColumnSet,
    config: &ReportConfig,
    diagnostics: &mut Vec<String>,
) -> ViewResult<Vec<AirlineYearEntry>> {
    if !columns.contains("ano") || !columns.contains("cia_icao") {
        return ViewResult::empty("ano/cia_icao columns are absent");
    }
    let mut groups: BTreeMap<(i32, &str), (u64, u64)> = BTreeMap::new();
    for flight in flights {
        if let (Some(ano), Some(cia)) = (flight.ano, flight.cia_icao.as_deref()) {
            let entry = groups.entry((ano, cia)).or_default();
            entry.1 += 1;
            if delayed(flight) {
                entry.0 += 1;
            }
        }
    }

    let mut entries = Vec::new();
    for ano in distinct_years(flights) {
        let mut qualified: Vec<(&str, f64, u64)> = groups
            .iter()
            .filter(|&(&(a, _), &(_, total))| a == ano && total >= config.min_count_airline)
            .map(|(&(_, cia), &(d, t))| (cia, rate(d, t), t))
            .collect();

        if !qualified.is_empty() {
            qualified.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
            let rates: Vec<f64> = qualified.iter().map(|q| q.1).collect();
            let table = qualified
                .iter()
                .zip(dense_ranks(&rates))
                .map(|(&(cia, taxa, voos), rank)| AirlineRate {
                    cia_icao: cia.to_string(),
                    taxa_atraso: taxa,
                    voos,
                    rank,
                })
                .collect();
            entries.push(AirlineYearEntry {
                ano,
                ranking: YearAirlineRanking::Taxa(table),
            });
            continue;
        }

        diagnostics.push(format!(
            "airline ranking: no airline reached {} flights in {ano}, falling back to delayed counts",
            config.min_count_airline
        ));
        let mut counts: Vec<AirlineCount> = groups
            .iter()
            .filter(|((a, _), _)| *a == ano)
            .map(|((_, cia), &(d, _))| AirlineCount {
                cia_icao: cia.to_string(),
                atrasos: d,
            })
            .collect();
        counts.sort_by(|a, b| {
            b.atrasos
                .cmp(&a.atrasos)
                .then_with(|| a.cia_icao.cmp(&b.cia_icao))
        });
        if counts.is_empty() {
            diagnostics.push(format!("airline ranking: no airline data at all for {ano}"));
        } else {
            entries.push(AirlineYearEntry {
                ano,
                ranking: YearAirlineRanking::Contagem(counts),
            });
        }
    }

    if entries.is_empty() {
        ViewResult::empty("no year produced an airline ranking")
    } else {
        ViewResult::Ready(entries)
    }
}

/// Runs every view over the delay-flagged flights. Flights are expected
/// to already exclude records without a delay signal.
pub fn build_report(flights: &[Flight], columns: &ColumnSet, config: ReportConfig) -> DelayReport {
    let mut diagnostics = Vec::new();

    let airport_counts = most_delayed_airports(flights, columns);
    let airport_trend = airport_delay_trend(flights, columns, &mut diagnostics);
    let monthly_trend = monthly_delay_trend(flights, columns);
    let weekday = weekday_pattern(flights, columns, &mut diagnostics);
    let period = period_pattern(flights, columns, &mut diagnostics);
    let airlines = airline_ranking(flights, columns, &config, &mut diagnostics);

    for (view, reason) in [
        ("most-delayed airports", airport_counts.reason()),
        ("airport trend", airport_trend.reason()),
        ("monthly trend", monthly_trend.reason()),
        ("weekday pattern", weekday.reason()),
        ("period pattern", period.reason()),
        ("airline ranking", airlines.reason()),
    ] {
        if let Some(reason) = reason {
            diagnostics.push(format!("{view}: {reason}"));
        }
    }

    DelayReport {
        config,
        airport_counts,
        airport_trend,
        monthly_trend,
        weekday_pattern: weekday,
        period_pattern: period,
        airline_ranking: airlines,
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delay::derive_delays;
    use crate::normalize::{Dataset, normalize_records, parse_timestamp};
    use crate::recover::RawRecord;
    use serde_json::{Value, json};

    /// One flight record: scheduled departure plus a real departure
    /// shifted by `atraso_min` minutes.
    fn voo(cia: &str, origem: &str, destino: &str, partida: &str, atraso_min: i64) -> Value {
        let prevista = parse_timestamp(partida).unwrap();
        let real = prevista + chrono::Duration::minutes(atraso_min);
        json!({
            "ICAOEmpresaAérea": cia,
            "ICAOAeródromoOrigem": origem,
            "ICAOAeródromoDestino": destino,
            "PartidaPrevista": partida,
            "PartidaReal": real.format("%Y-%m-%dT%H:%M:%S").to_string(),
        })
    }

    /// Normalizes, derives delays at threshold 15 and drops signal-less
    /// records, the same way the analyze pipeline does.
    fn dataset(rows: Vec<Value>) -> (Vec<Flight>, ColumnSet) {
        let raws: Vec<RawRecord> = rows
            .into_iter()
            .map(|v| match v {
                Value::Object(map) => map,
                _ => unreachable!("test rows are objects"),
            })
            .collect();
        let Dataset { flights, columns } = normalize_records(&raws);
        let mut flights = derive_delays(flights, 15.0);
        flights.retain(|f| f.delay_min.is_some());
        (flights, columns)
    }

    fn config(min_count_airline: u64) -> ReportConfig {
        ReportConfig {
            on_time_min: 15.0,
            min_count_airline,
        }
    }

    #[test]
    fn test_most_delayed_airports_counts_and_order() {
        let (flights, columns) = dataset(vec![
            voo("GLO", "SBSP", "SBGR", "2022-01-01T10:00:00", 30),
            voo("GLO", "SBSP", "SBGR", "2022-01-02T10:00:00", 40),
            voo("GLO", "SBRJ", "SBGR", "2022-01-03T10:00:00", 20),
            voo("AZU", "SBRJ", "SBSV", "2022-01-04T10:00:00", 25),
            voo("AZU", "SBRJ", "SBSV", "2022-01-05T10:00:00", 0),
        ]);
        let view = most_delayed_airports(&flights, &columns);
        let data = view.data().unwrap();
        assert_eq!(
            data.destino_top,
            vec![
                AirportCount { aeroporto: "SBGR".into(), atrasos: 3 },
                AirportCount { aeroporto: "SBSV".into(), atrasos: 1 },
            ]
        );
        assert_eq!(data.origem_top[0].aeroporto, "SBRJ");
        assert_eq!(data.origem_top[0].atrasos, 2);
    }

    #[test]
    fn test_most_delayed_airports_missing_columns() {
        let rows = vec![json!({
            "PartidaPrevista": "2022-01-01T10:00:00",
            "PartidaReal": "2022-01-01T10:30:00",
        })];
        let (flights, columns) = dataset(rows);
        let view = most_delayed_airports(&flights, &columns);
        assert!(!view.is_ready());
        assert!(view.reason().unwrap().contains("destino_icao"));
    }

    #[test]
    fn test_airport_trend_delta_last_minus_first() {
        let (flights, columns) = dataset(vec![
            voo("GLO", "SBSP", "SBGR", "2021-03-01T10:00:00", 30),
            voo("GLO", "SBSP", "SBGR", "2022-03-01T10:00:00", 30),
            voo("GLO", "SBSP", "SBGR", "2022-03-02T10:00:00", 30),
            voo("GLO", "SBSP", "SBGR", "2022-03-03T10:00:00", 30),
            voo("GLO", "SBGR", "SBCF", "2021-05-01T10:00:00", 40),
        ]);
        let mut diagnostics = Vec::new();
        let view = airport_delay_trend(&flights, &columns, &mut diagnostics);
        match view.data().unwrap() {
            AirportTrend::Delta {
                primeiro_ano,
                ultimo_ano,
                destino,
                ..
            } => {
                assert_eq!((*primeiro_ano, *ultimo_ano), (2021, 2022));
                assert_eq!(
                    destino,
                    &vec![
                        AirportDelta { aeroporto: "SBGR".into(), delta_atrasos: 2 },
                        AirportDelta { aeroporto: "SBCF".into(), delta_atrasos: -1 },
                    ]
                );
            }
            other => panic!("expected delta trend, got {other:?}"),
        }
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_airport_trend_single_year_falls_back_to_counts() {
        let (flights, columns) = dataset(vec![
            voo("GLO", "SBSP", "SBGR", "2022-03-01T10:00:00", 30),
            voo("GLO", "SBSP", "SBCF", "2022-03-02T10:00:00", 20),
        ]);
        let mut diagnostics = Vec::new();
        let view = airport_delay_trend(&flights, &columns, &mut diagnostics);
        match view.data().unwrap() {
            AirportTrend::SingleYearCounts { ano, destino, .. } => {
                assert_eq!(*ano, 2022);
                assert!(!destino.is_empty());
            }
            other => panic!("expected single-year counts, got {other:?}"),
        }
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].contains("only one year"));
    }

    #[test]
    fn test_monthly_trend_rates_chronological() {
        let (flights, columns) = dataset(vec![
            voo("GLO", "SBSP", "SBGR", "2022-02-01T10:00:00", 30),
            voo("GLO", "SBSP", "SBGR", "2022-01-01T10:00:00", 30),
            voo("GLO", "SBSP", "SBGR", "2022-01-02T10:00:00", 0),
        ]);
        let view = monthly_delay_trend(&flights, &columns);
        let data = view.data().unwrap();
        assert_eq!(
            data,
            &vec![
                MonthlyRate { ano: 2022, mes: 1, taxa_atraso: 0.5 },
                MonthlyRate { ano: 2022, mes: 2, taxa_atraso: 1.0 },
            ]
        );
    }

    #[test]
    fn test_monthly_trend_requires_scheduled_departure() {
        let rows = vec![json!({
            "ChegadaPrevista": "2022-01-01T10:00:00",
            "ChegadaReal": "2022-01-01T10:30:00",
        })];
        let (flights, columns) = dataset(rows);
        assert_eq!(flights.len(), 1); // delay still derivable from arrival
        let view = monthly_delay_trend(&flights, &columns);
        assert!(!view.is_ready());
        assert!(view.reason().unwrap().contains("partida_prevista"));
    }

    #[test]
    fn test_weekday_pattern_fixed_order_and_rates() {
        // 2022-08-07 Sunday, 2022-08-03 Wednesday, 2022-08-01 Monday —
        // fed out of display order on purpose.
        let (flights, columns) = dataset(vec![
            voo("GLO", "SBSP", "SBGR", "2022-08-07T10:00:00", 30),
            voo("GLO", "SBSP", "SBGR", "2022-08-03T10:00:00", 0),
            voo("GLO", "SBSP", "SBGR", "2022-08-01T10:00:00", 30),
            voo("GLO", "SBSP", "SBGR", "2022-08-01T12:00:00", 30),
        ]);
        let mut diagnostics = Vec::new();
        let view = weekday_pattern(&flights, &columns, &mut diagnostics);
        let series = view.data().unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].ano, 2022);
        assert_eq!(series[0].metric, SeriesMetric::Taxa);
        assert_eq!(
            series[0].values,
            vec![
                ("Seg".to_string(), 1.0),
                ("Qua".to_string(), 0.0),
                ("Dom".to_string(), 1.0),
            ]
        );
    }

    #[test]
    fn test_period_bucket_boundaries() {
        assert_eq!(Periodo::from_hora(0), Periodo::Madrugada);
        assert_eq!(Periodo::from_hora(5), Periodo::Madrugada);
        assert_eq!(Periodo::from_hora(6), Periodo::Manha);
        assert_eq!(Periodo::from_hora(11), Periodo::Manha);
        assert_eq!(Periodo::from_hora(12), Periodo::Tarde);
        assert_eq!(Periodo::from_hora(17), Periodo::Tarde);
        assert_eq!(Periodo::from_hora(18), Periodo::Noite);
        assert_eq!(Periodo::from_hora(23), Periodo::Noite);
    }

    #[test]
    fn test_period_pattern_fixed_order() {
        let (flights, columns) = dataset(vec![
            voo("GLO", "SBSP", "SBGR", "2022-08-01T22:00:00", 30),
            voo("GLO", "SBSP", "SBGR", "2022-08-01T03:00:00", 30),
            voo("GLO", "SBSP", "SBGR", "2022-08-01T14:00:00", 0),
        ]);
        let mut diagnostics = Vec::new();
        let view = period_pattern(&flights, &columns, &mut diagnostics);
        let series = view.data().unwrap();
        let labels: Vec<&str> = series[0].values.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["madrugada", "tarde", "noite"]);
    }

    #[test]
    fn test_airline_ranking_dense_ranks_ties() {
        let (flights, columns) = dataset(vec![
            voo("AAA", "SBSP", "SBGR", "2022-01-01T10:00:00", 30),
            voo("AAA", "SBSP", "SBGR", "2022-01-02T10:00:00", 30),
            voo("BBB", "SBSP", "SBGR", "2022-01-01T10:00:00", 30),
            voo("BBB", "SBSP", "SBGR", "2022-01-02T10:00:00", 30),
            voo("CCC", "SBSP", "SBGR", "2022-01-01T10:00:00", 30),
            voo("CCC", "SBSP", "SBGR", "2022-01-02T10:00:00", 0),
        ]);
        let mut diagnostics = Vec::new();
        let view = airline_ranking(&flights, &columns, &config(2), &mut diagnostics);
        let entries = view.data().unwrap();
        assert_eq!(entries.len(), 1);
        match &entries[0].ranking {
            YearAirlineRanking::Taxa(table) => {
                assert_eq!(table.len(), 3);
                assert_eq!((table[0].cia_icao.as_str(), table[0].rank), ("AAA", 1));
                assert_eq!((table[1].cia_icao.as_str(), table[1].rank), ("BBB", 1));
                assert_eq!((table[2].cia_icao.as_str(), table[2].rank), ("CCC", 2));
                assert_eq!(table[2].taxa_atraso, 0.5);
            }
            other => panic!("expected rate ranking, got {other:?}"),
        }
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_airline_ranking_count_fallback_when_nobody_qualifies() {
        let (flights, columns) = dataset(vec![
            voo("AAA", "SBSP", "SBGR", "2022-01-01T10:00:00", 30),
            voo("BBB", "SBSP", "SBGR", "2022-01-02T10:00:00", 30),
            voo("BBB", "SBSP", "SBGR", "2022-01-03T10:00:00", 30),
        ]);
        let mut diagnostics = Vec::new();
        let view = airline_ranking(&flights, &columns, &config(20), &mut diagnostics);
        let entries = view.data().unwrap();
        match &entries[0].ranking {
            YearAirlineRanking::Contagem(counts) => {
                assert_eq!(
                    counts,
                    &vec![
                        AirlineCount { cia_icao: "BBB".into(), atrasos: 2 },
                        AirlineCount { cia_icao: "AAA".into(), atrasos: 1 },
                    ]
                );
            }
            other => panic!("expected count fallback, got {other:?}"),
        }
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].contains("falling back"));
    }

    #[test]
    fn test_airline_ranking_mixed_years_fallback_per_year() {
        // 2021 has enough samples for a rate ranking, 2022 does not.
        let mut rows = Vec::new();
        for day in 1..=3 {
            rows.push(voo("AAA", "SBSP", "SBGR", &format!("2021-01-0{day}T10:00:00"), 30));
        }
        rows.push(voo("AAA", "SBSP", "SBGR", "2022-01-01T10:00:00", 30));
        let (flights, columns) = dataset(rows);
        let mut diagnostics = Vec::new();
        let view = airline_ranking(&flights, &columns, &config(3), &mut diagnostics);
        let entries = view.data().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(matches!(entries[0].ranking, YearAirlineRanking::Taxa(_)));
        assert!(matches!(entries[1].ranking, YearAirlineRanking::Contagem(_)));
    }

    #[test]
    fn test_build_report_runs_all_views_and_collects_reasons() {
        // Only arrival timestamps: delays derivable, but no airports, no
        // airline, no scheduled departure.
        let rows = vec![json!({
            "ChegadaPrevista": "2022-01-01T10:00:00",
            "ChegadaReal": "2022-01-01T10:30:00",
        })];
        let (flights, columns) = dataset(rows);
        let report = build_report(&flights, &columns, config(20));
        assert!(!report.airport_counts.is_ready());
        assert!(!report.monthly_trend.is_ready());
        assert!(!report.airline_ranking.is_ready());
        // Weekday/period still work off the arrival-derived reference.
        assert!(report.weekday_pattern.is_ready());
        assert!(report.period_pattern.is_ready());
        assert!(report.diagnostics.iter().any(|d| d.contains("monthly trend")));
        assert!(report.diagnostics.iter().any(|d| d.contains("airline ranking")));
    }
}
