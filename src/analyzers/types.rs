//! Data types produced by the aggregation engine.

use serde::Serialize;

/// Outcome of one analytical view: a populated series, or nothing plus the
/// reason it could not be computed. An empty view never fails the run.
#[derive(Debug)]
pub enum ViewResult<T> {
    Ready(T),
    Empty { reason: String },
}

impl<T> ViewResult<T> {
    pub fn empty(reason: impl Into<String>) -> Self {
        ViewResult::Empty {
            reason: reason.into(),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ViewResult::Ready(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            ViewResult::Ready(data) => Some(data),
            ViewResult::Empty { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ViewResult::Ready(_) => None,
            ViewResult::Empty { reason } => Some(reason),
        }
    }
}

/// Delayed-flight count for one airport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AirportCount {
    pub aeroporto: String,
    pub atrasos: u64,
}

/// Most-delayed airports, by destination and by origin, sorted descending.
#[derive(Debug)]
pub struct AirportDelayCounts {
    pub destino_top: Vec<AirportCount>,
    pub origem_top: Vec<AirportCount>,
}

/// Change in delayed-flight count between the first and last year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AirportDelta {
    pub aeroporto: String,
    pub delta_atrasos: i64,
}

/// Airport delay trend: year-over-year delta when at least two years are
/// present, otherwise a plain count ranking for the single year.
#[derive(Debug)]
pub enum AirportTrend {
    Delta {
        primeiro_ano: i32,
        ultimo_ano: i32,
        destino: Vec<AirportDelta>,
        origem: Vec<AirportDelta>,
    },
    SingleYearCounts {
        ano: i32,
        destino: Vec<AirportCount>,
        origem: Vec<AirportCount>,
    },
}

/// Delay rate for one calendar month of scheduled departures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyRate {
    pub ano: i32,
    pub mes: u32,
    pub taxa_atraso: f64,
}

/// Whether a yearly series carries delay rates or raw delayed counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesMetric {
    Taxa,
    Contagem,
}

impl SeriesMetric {
    pub fn label(self) -> &'static str {
        match self {
            SeriesMetric::Taxa => "taxa de atraso",
            SeriesMetric::Contagem => "contagem de atrasos",
        }
    }
}

/// One year of a weekday or period-of-day pattern, values in fixed
/// display order.
#[derive(Debug)]
pub struct YearlySeries {
    pub ano: i32,
    pub metric: SeriesMetric,
    pub values: Vec<(String, f64)>,
}

/// One airline's delay rate within a year, dense-ranked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AirlineRate {
    pub cia_icao: String,
    pub taxa_atraso: f64,
    pub voos: u64,
    pub rank: u32,
}

/// Delayed-flight count for one airline (rate-ranking fallback).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AirlineCount {
    pub cia_icao: String,
    pub atrasos: u64,
}

/// Ranking of one year's airlines: by rate when enough samples exist,
/// by raw delayed count otherwise.
#[derive(Debug)]
pub enum YearAirlineRanking {
    Taxa(Vec<AirlineRate>),
    Contagem(Vec<AirlineCount>),
}

#[derive(Debug)]
pub struct AirlineYearEntry {
    pub ano: i32,
    pub ranking: YearAirlineRanking,
}

/// Caller-supplied aggregation thresholds. Values are plain numbers;
/// passing a negative punctuality threshold is a caller error.
#[derive(Debug, Clone, Copy)]
pub struct ReportConfig {
    /// Punctuality threshold in minutes (delay strictly above = delayed).
    pub on_time_min: f64,
    /// Minimum flights per airline/year for the rate ranking.
    pub min_count_airline: u64,
}

/// Everything the report emitter needs: one result per view plus the
/// run-level diagnostics collected while aggregating.
#[derive(Debug)]
pub struct DelayReport {
    pub config: ReportConfig,
    pub airport_counts: ViewResult<AirportDelayCounts>,
    pub airport_trend: ViewResult<AirportTrend>,
    pub monthly_trend: ViewResult<Vec<MonthlyRate>>,
    pub weekday_pattern: ViewResult<Vec<YearlySeries>>,
    pub period_pattern: ViewResult<Vec<YearlySeries>>,
    pub airline_ranking: ViewResult<Vec<AirlineYearEntry>>,
    pub diagnostics: Vec<String>,
}
