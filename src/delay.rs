//! Delay signal derivation.
//!
//! One signed delay measurement per flight: arrival delay when the
//! arrival pair parsed, departure delay as the fallback. The caller
//! decides what to do with flights that end up with no signal at all.

use chrono::NaiveDateTime;

use crate::normalize::Flight;

/// Signed difference `real - scheduled` in minutes. Negative means early.
fn minutes_between(scheduled: Option<NaiveDateTime>, real: Option<NaiveDateTime>) -> Option<f64> {
    match (scheduled, real) {
        (Some(scheduled), Some(real)) => {
            Some((real - scheduled).num_seconds() as f64 / 60.0)
        }
        _ => None,
    }
}

/// Computes `atraso_partida_min`, `atraso_chegada_min`, `delay_min` and
/// `is_delayed` for every flight.
///
/// `on_time_min` is the punctuality threshold in minutes: a flight is
/// delayed when its delay is strictly greater than the threshold.
/// Callers are expected to pass a non-negative value. Flights whose
/// `delay_min` stays unset must be excluded by the caller before
/// aggregation; this pass only computes.
pub fn derive_delays(mut flights: Vec<Flight>, on_time_min: f64) -> Vec<Flight> {
    for flight in &mut flights {
        flight.atraso_partida_min = minutes_between(flight.partida_prevista, flight.partida_real);
        flight.atraso_chegada_min = minutes_between(flight.chegada_prevista, flight.chegada_real);
        flight.delay_min = flight.atraso_chegada_min.or(flight.atraso_partida_min);
        flight.is_delayed = flight.delay_min.map(|d| d > on_time_min);
    }
    flights
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::parse_timestamp;

    fn flight_with(
        partida_prevista: &str,
        partida_real: &str,
        chegada_prevista: &str,
        chegada_real: &str,
    ) -> Flight {
        Flight {
            partida_prevista: parse_timestamp(partida_prevista),
            partida_real: parse_timestamp(partida_real),
            chegada_prevista: parse_timestamp(chegada_prevista),
            chegada_real: parse_timestamp(chegada_real),
            ..Flight::default()
        }
    }

    #[test]
    fn test_arrival_delay_preferred_over_departure() {
        let flights = derive_delays(
            vec![flight_with(
                "2022-01-01T10:00:00",
                "2022-01-01T10:05:00",
                "2022-01-01T11:00:00",
                "2022-01-01T11:30:00",
            )],
            15.0,
        );
        let f = &flights[0];
        assert_eq!(f.atraso_partida_min, Some(5.0));
        assert_eq!(f.atraso_chegada_min, Some(30.0));
        assert_eq!(f.delay_min, Some(30.0));
        assert_eq!(f.is_delayed, Some(true));
    }

    #[test]
    fn test_departure_delay_used_when_arrival_missing() {
        let flights = derive_delays(
            vec![flight_with("2022-01-01T10:00:00", "2022-01-01T10:20:00", "", "")],
            15.0,
        );
        let f = &flights[0];
        assert!(f.atraso_chegada_min.is_none());
        assert_eq!(f.delay_min, Some(20.0));
        assert_eq!(f.is_delayed, Some(true));
    }

    #[test]
    fn test_early_flight_is_negative_and_not_delayed() {
        let flights = derive_delays(
            vec![flight_with("", "", "2022-01-01T11:00:00", "2022-01-01T10:50:00")],
            15.0,
        );
        let f = &flights[0];
        assert_eq!(f.delay_min, Some(-10.0));
        assert_eq!(f.is_delayed, Some(false));
    }

    #[test]
    fn test_threshold_is_strictly_greater_than() {
        let exactly_at = derive_delays(
            vec![flight_with("", "", "2022-01-01T11:00:00", "2022-01-01T11:15:00")],
            15.0,
        );
        assert_eq!(exactly_at[0].delay_min, Some(15.0));
        assert_eq!(exactly_at[0].is_delayed, Some(false));

        let just_over = derive_delays(
            vec![flight_with("", "", "2022-01-01T11:00:00", "2022-01-01T11:16:00")],
            15.0,
        );
        assert_eq!(just_over[0].is_delayed, Some(true));
    }

    #[test]
    fn test_no_pair_means_no_signal() {
        let flights = derive_delays(
            vec![flight_with("2022-01-01T10:00:00", "", "", "2022-01-01T11:30:00")],
            15.0,
        );
        let f = &flights[0];
        assert!(f.atraso_partida_min.is_none());
        assert!(f.atraso_chegada_min.is_none());
        assert!(f.delay_min.is_none());
        assert!(f.is_delayed.is_none());
    }

    #[test]
    fn test_is_delayed_defined_iff_delay_defined() {
        let flights = derive_delays(
            vec![
                flight_with("2022-01-01T10:00:00", "2022-01-01T10:01:00", "", ""),
                flight_with("", "", "", ""),
            ],
            0.0,
        );
        assert_eq!(flights[0].delay_min.is_some(), flights[0].is_delayed.is_some());
        assert_eq!(flights[1].delay_min.is_some(), flights[1].is_delayed.is_some());
        assert_eq!(flights[0].is_delayed, Some(true));
    }
}
