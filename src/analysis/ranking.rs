use crate::analysis::dispersion::{mean, population_std_dev};
use crate::analysis::ordering::compare_aggregates;
use crate::models::ranking::TeamAggregate;
use crate::models::vote::{Team, Vote};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct RankingOutcome {
    pub entries: Vec<TeamAggregate>,
    pub missing_votes_overall: bool,
}

/// Turn judge votes into an ordered, positioned ranking.
///
/// Every registered team appears exactly once, voted or not. Votes for teams
/// outside `teams`, or cast in another hackathon, are ignored. The lookup is
/// called once per team; its first error aborts the computation.
pub fn compute_ranking<F, E>(
    hackathon_id: i64,
    teams: &[Team],
    votes: &[Vote],
    expected_judge_count: u32,
    mut submission_lookup: F,
) -> Result<RankingOutcome, E>
where
    F: FnMut(i64) -> Result<Option<DateTime<Utc>>, E>,
{
    let scores_by_team = group_scores(hackathon_id, teams, votes);

    let mut entries = Vec::with_capacity(teams.len());
    for team in teams {
        let scores = scores_by_team
            .get(&team.id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let vote_count = scores.len();

        entries.push(TeamAggregate {
            team_id: team.id,
            team_name: team.name.clone(),
            average: mean(scores),
            dispersion: population_std_dev(scores),
            vote_count,
            earliest_submission: submission_lookup(team.id)?,
            missing_votes: (vote_count as u64) < u64::from(expected_judge_count),
            position: 0,
        });
    }

    let missing_votes_overall = entries.iter().any(|entry| entry.missing_votes);

    entries.sort_by(compare_aggregates);
    for (index, entry) in entries.iter_mut().enumerate() {
        entry.position = index + 1;
    }

    Ok(RankingOutcome {
        entries,
        missing_votes_overall,
    })
}

fn group_scores(hackathon_id: i64, teams: &[Team], votes: &[Vote]) -> HashMap<i64, Vec<u8>> {
    let mut scores: HashMap<i64, Vec<u8>> = teams.iter().map(|t| (t.id, Vec::new())).collect();
    let mut ignored = 0usize;

    for vote in votes {
        match scores.get_mut(&vote.team_id) {
            Some(team_scores) if vote.hackathon_id == hackathon_id => team_scores.push(vote.score),
            _ => ignored += 1,
        }
    }

    if ignored > 0 {
        log::debug!("hackathon {hackathon_id}: ignored {ignored} votes for unregistered teams");
    }

    scores
}
