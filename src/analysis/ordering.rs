use crate::models::ranking::TeamAggregate;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// Composite ranking order:
/// 1. average, descending
/// 2. dispersion, ascending
/// 3. earliest submission, ascending, teams without one last
/// 4. team name, ascending, case-insensitive
/// 5. team id, ascending, so byte-identical names still order deterministically
pub fn compare_aggregates(a: &TeamAggregate, b: &TeamAggregate) -> Ordering {
    b.average
        .total_cmp(&a.average)
        .then_with(|| a.dispersion.total_cmp(&b.dispersion))
        .then_with(|| compare_submissions(a.earliest_submission, b.earliest_submission))
        .then_with(|| compare_names(&a.team_name, &b.team_name))
        .then_with(|| a.team_id.cmp(&b.team_id))
}

fn compare_submissions(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn team(id: i64, name: &str, average: f64, dispersion: f64) -> TeamAggregate {
        TeamAggregate {
            team_id: id,
            team_name: name.to_string(),
            average,
            dispersion,
            vote_count: 2,
            earliest_submission: None,
            missing_votes: false,
            position: 0,
        }
    }

    #[test]
    fn higher_average_ranks_first() {
        let a = team(1, "a", 9.0, 3.0);
        let b = team(2, "b", 8.0, 0.0);
        assert_eq!(compare_aggregates(&a, &b), Ordering::Less);
    }

    #[test]
    fn lower_dispersion_breaks_average_tie() {
        let a = team(1, "a", 8.0, 1.0);
        let b = team(2, "b", 8.0, 0.5);
        assert_eq!(compare_aggregates(&a, &b), Ordering::Greater);
    }

    #[test]
    fn earlier_submission_wins_and_missing_sorts_last() {
        let mut early = team(1, "zz", 8.0, 0.5);
        let mut late = team(2, "aa", 8.0, 0.5);
        let none = team(3, "aaa", 8.0, 0.5);
        early.earliest_submission = Some(Utc.with_ymd_and_hms(2026, 5, 1, 10, 0, 0).unwrap());
        late.earliest_submission = Some(Utc.with_ymd_and_hms(2026, 5, 1, 11, 0, 0).unwrap());

        assert_eq!(compare_aggregates(&early, &late), Ordering::Less);
        assert_eq!(compare_aggregates(&late, &none), Ordering::Less);
        assert_eq!(compare_aggregates(&none, &early), Ordering::Greater);
    }

    #[test]
    fn names_compare_case_insensitively() {
        let zeta = team(1, "Zeta", 7.0, 0.0);
        let alpha = team(2, "alpha", 7.0, 0.0);
        assert_eq!(compare_aggregates(&alpha, &zeta), Ordering::Less);
    }

    #[test]
    fn identical_names_fall_back_to_team_id() {
        let first = team(4, "Same", 7.0, 0.0);
        let second = team(9, "Same", 7.0, 0.0);
        assert_eq!(compare_aggregates(&first, &second), Ordering::Less);
        assert_eq!(compare_aggregates(&first, &first), Ordering::Equal);
    }
}
