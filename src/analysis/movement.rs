use crate::models::snapshot::{PositionChange, SnapshotPayload};
use std::collections::HashMap;

/// Position movement between two published rankings.
///
/// Follows `current` order; teams only present in `previous` are appended in
/// their old order.
pub fn position_changes(previous: &SnapshotPayload, current: &SnapshotPayload) -> Vec<PositionChange> {
    let previous_positions: HashMap<i64, usize> = previous
        .entries
        .iter()
        .map(|entry| (entry.team_id, entry.position))
        .collect();

    let mut changes: Vec<PositionChange> = current
        .entries
        .iter()
        .map(|entry| {
            let previous_position = previous_positions.get(&entry.team_id).copied();
            PositionChange {
                team_id: entry.team_id,
                team_name: entry.team_name.clone(),
                previous_position,
                current_position: Some(entry.position),
                delta: previous_position.map(|prev| prev as i64 - entry.position as i64),
            }
        })
        .collect();

    let mut dropped: Vec<_> = previous
        .entries
        .iter()
        .filter(|entry| !current.entries.iter().any(|c| c.team_id == entry.team_id))
        .collect();
    dropped.sort_by_key(|entry| entry.position);

    changes.extend(dropped.into_iter().map(|entry| PositionChange {
        team_id: entry.team_id,
        team_name: entry.team_name.clone(),
        previous_position: Some(entry.position),
        current_position: None,
        delta: None,
    }));

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::snapshot::SnapshotEntry;

    fn payload(version: i64, order: &[(i64, &str)]) -> SnapshotPayload {
        SnapshotPayload {
            hackathon_id: 1,
            version,
            generated_at: "2026-06-01T00:00:00.000Z".to_string(),
            missing_votes: false,
            motivation: None,
            entries: order
                .iter()
                .enumerate()
                .map(|(index, (team_id, name))| SnapshotEntry {
                    position: index + 1,
                    team_id: *team_id,
                    team_name: name.to_string(),
                    average: 5.0,
                    dispersion: 0.0,
                    votes: 1,
                    earliest_submission: None,
                    missing_votes: false,
                })
                .collect(),
        }
    }

    #[test]
    fn reports_climbs_and_falls() {
        let before = payload(1, &[(1, "A"), (2, "B"), (3, "C")]);
        let after = payload(2, &[(3, "C"), (1, "A"), (2, "B")]);

        let changes = position_changes(&before, &after);
        let deltas: Vec<(i64, Option<i64>)> = changes.iter().map(|c| (c.team_id, c.delta)).collect();
        assert_eq!(deltas, vec![(3, Some(2)), (1, Some(-1)), (2, Some(-1))]);
    }

    #[test]
    fn new_and_dropped_teams_have_no_delta() {
        let before = payload(1, &[(1, "A"), (2, "B")]);
        let after = payload(2, &[(4, "D"), (1, "A")]);

        let changes = position_changes(&before, &after);
        assert_eq!(changes.len(), 3);
        assert_eq!(changes[0].previous_position, None);
        assert_eq!(changes[0].delta, None);
        assert_eq!(changes[1].delta, Some(-1));
        assert_eq!(changes[2].team_id, 2);
        assert_eq!(changes[2].current_position, None);
    }

    #[test]
    fn identical_rankings_report_no_movement() {
        let ranking = payload(1, &[(1, "A"), (2, "B")]);
        let changes = position_changes(&ranking, &ranking);
        assert!(changes.iter().all(|c| c.delta == Some(0)));
    }
}
