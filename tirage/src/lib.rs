mod config;
use log::{debug, info};

use std::collections::HashSet;

use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;

pub use crate::config::*;

/// The quota of examinees for a given number of present students: one third,
/// rounded down, and never less than one.
pub fn selection_quota(present_count: usize) -> usize {
    std::cmp::max(1, present_count / 3)
}

/// Draws a third of the present students, skipping the ones already selected
/// in previous sessions.
///
/// The quota is computed over all present rows, then the draw is made without
/// replacement among the present rows whose identity is not in
/// `already_selected`. Fewer than the quota are returned when not enough
/// students remain eligible, and nothing is returned once every present
/// student has been selected. The drawn identities are added to
/// `already_selected`, so the set always equals its input united with the
/// returned selection.
pub fn select_examinees<R: Rng>(
    roster: &[RosterEntry],
    already_selected: &mut HashSet<String>,
    rng: &mut R,
) -> Selection {
    let present: Vec<&RosterEntry> = roster.iter().filter(|r| r.present).collect();
    let quota = selection_quota(present.len());

    let eligible: Vec<&str> = present
        .iter()
        .filter(|r| !already_selected.contains(&r.identity))
        .map(|r| r.identity.as_str())
        .collect();
    debug!(
        "select_examinees: {} present, quota {}, {} eligible",
        present.len(),
        quota,
        eligible.len()
    );

    if eligible.is_empty() {
        info!("select_examinees: no eligible student left, returning an empty selection");
        return Selection {
            drawn: Vec::new(),
            present_count: present.len(),
            quota,
        };
    }

    let num_to_draw = std::cmp::min(quota, eligible.len());
    let drawn: Vec<String> = eligible
        .choose_multiple(rng, num_to_draw)
        .map(|s| s.to_string())
        .collect();
    for identity in drawn.iter() {
        already_selected.insert(identity.clone());
    }

    Selection {
        drawn,
        present_count: present.len(),
        quota,
    }
}

/// Generates a partition of `identities` into `num_groups` groups that has
/// not been produced before.
///
/// Each attempt shuffles the identities uniformly and assigns the element at
/// shuffled position `i` to group `i % num_groups`, so group sizes differ by
/// at most one. The first grouping that does not exactly equal a drawing in
/// `history` (same group order, same member order) is returned; after
/// `max_attempts` rejections the draw fails with
/// [DrawErrors::NoUniqueGrouping].
///
/// The caller owns the history: nothing is appended here.
pub fn generate_groups<R: Rng>(
    identities: &[String],
    num_groups: usize,
    history: &[Drawing],
    max_attempts: u32,
    rng: &mut R,
) -> Result<Drawing, DrawErrors> {
    if num_groups == 0 {
        return Err(DrawErrors::InvalidGroupCount);
    }

    let mut pool: Vec<String> = identities.to_vec();
    for attempt in 1..=max_attempts {
        pool.shuffle(rng);
        let mut groups: Drawing = vec![Vec::new(); num_groups];
        for (idx, identity) in pool.iter().enumerate() {
            groups[idx % num_groups].push(identity.clone());
        }
        if !history.iter().any(|past| *past == groups) {
            debug!(
                "generate_groups: accepted a drawing at attempt {}/{}",
                attempt, max_attempts
            );
            return Ok(groups);
        }
    }
    info!(
        "generate_groups: every attempt up to {} matched a past drawing",
        max_attempts
    );
    Err(DrawErrors::NoUniqueGrouping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn roster(present: &[&str], absent: &[&str]) -> Vec<RosterEntry> {
        let mut res: Vec<RosterEntry> = present
            .iter()
            .map(|s| RosterEntry {
                identity: s.to_string(),
                present: true,
            })
            .collect();
        res.extend(absent.iter().map(|s| RosterEntry {
            identity: s.to_string(),
            present: false,
        }));
        res
    }

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("Étudiant {}", i)).collect()
    }

    #[test]
    fn quota_is_a_third_with_a_floor_of_one() {
        assert_eq!(selection_quota(0), 1);
        assert_eq!(selection_quota(1), 1);
        assert_eq!(selection_quota(2), 1);
        assert_eq!(selection_quota(3), 1);
        assert_eq!(selection_quota(8), 2);
        assert_eq!(selection_quota(9), 3);
        assert_eq!(selection_quota(10), 3);
    }

    #[test]
    fn selects_a_third_of_present_students() {
        init();
        let ids = names(9);
        let present: Vec<&str> = ids.iter().map(|s| s.as_str()).collect();
        let r = roster(&present, &["Abs 1", "Abs 2", "Abs 3"]);
        let mut already = HashSet::new();
        let mut rng = StdRng::seed_from_u64(7);

        let sel = select_examinees(&r, &mut already, &mut rng);

        assert_eq!(sel.present_count, 9);
        assert_eq!(sel.quota, 3);
        assert_eq!(sel.drawn.len(), 3);
        let distinct: HashSet<&String> = sel.drawn.iter().collect();
        assert_eq!(distinct.len(), 3);
        for identity in sel.drawn.iter() {
            assert!(ids.contains(identity), "{} was not in the roster", identity);
            assert!(!identity.starts_with("Abs"));
        }
    }

    #[test]
    fn never_selects_an_already_selected_student() {
        let ids = names(6);
        let present: Vec<&str> = ids.iter().map(|s| s.as_str()).collect();
        let r = roster(&present, &[]);
        let mut already: HashSet<String> = HashSet::new();
        let mut rng = StdRng::seed_from_u64(41);

        // Repeated sessions drain the roster without ever repeating a name.
        let mut seen: HashSet<String> = HashSet::new();
        loop {
            let before = already.clone();
            let sel = select_examinees(&r, &mut already, &mut rng);
            if sel.drawn.is_empty() {
                assert_eq!(before, already);
                break;
            }
            for identity in sel.drawn.iter() {
                assert!(!before.contains(identity));
                assert!(seen.insert(identity.clone()));
            }
            // The updated set is exactly the input plus the new selection.
            let mut expected = before.clone();
            expected.extend(sel.drawn.iter().cloned());
            assert_eq!(already, expected);
        }
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn caps_the_draw_at_the_number_of_eligible_students() {
        let ids = names(9);
        let present: Vec<&str> = ids.iter().map(|s| s.as_str()).collect();
        let r = roster(&present, &[]);
        // All but one already selected: the quota is 3 but only one remains.
        let mut already: HashSet<String> = ids.iter().take(8).cloned().collect();
        let mut rng = StdRng::seed_from_u64(3);

        let sel = select_examinees(&r, &mut already, &mut rng);
        assert_eq!(sel.quota, 3);
        assert_eq!(sel.drawn, vec![ids[8].clone()]);
        assert!(already.contains(&ids[8]));
    }

    #[test]
    fn groups_partition_the_roster_evenly() {
        let ids = names(6);
        let mut rng = StdRng::seed_from_u64(11);

        let drawing = generate_groups(&ids, 2, &[], MAX_ATTEMPTS, &mut rng).unwrap();

        assert_eq!(drawing.len(), 2);
        assert_eq!(drawing[0].len(), 3);
        assert_eq!(drawing[1].len(), 3);
        let mut all: Vec<String> = drawing.iter().flatten().cloned().collect();
        all.sort();
        let mut expected = ids.clone();
        expected.sort();
        assert_eq!(all, expected);
    }

    #[test]
    fn group_sizes_differ_by_at_most_one() {
        let ids = names(10);
        let mut rng = StdRng::seed_from_u64(23);

        let drawing = generate_groups(&ids, 3, &[], MAX_ATTEMPTS, &mut rng).unwrap();

        assert_eq!(drawing.len(), 3);
        let sizes: Vec<usize> = drawing.iter().map(|g| g.len()).collect();
        assert_eq!(sizes.iter().sum::<usize>(), 10);
        let max = sizes.iter().max().unwrap();
        let min = sizes.iter().min().unwrap();
        assert!(max - min <= 1, "uneven sizes: {:?}", sizes);
    }

    #[test]
    fn round_robin_assignment_follows_the_shuffled_order() {
        // With as many groups as students, group i holds the i-th shuffled
        // element only.
        let ids = names(4);
        let mut rng = StdRng::seed_from_u64(5);
        let drawing = generate_groups(&ids, 4, &[], MAX_ATTEMPTS, &mut rng).unwrap();
        assert_eq!(drawing.len(), 4);
        for group in drawing.iter() {
            assert_eq!(group.len(), 1);
        }
    }

    #[test]
    fn rejects_drawings_already_in_history() {
        init();
        let ids = names(5);
        let mut rng = StdRng::seed_from_u64(17);
        let mut history: Vec<Drawing> = Vec::new();

        for _ in 0..10 {
            let drawing = generate_groups(&ids, 2, &history, MAX_ATTEMPTS, &mut rng).unwrap();
            assert!(!history.contains(&drawing));
            history.push(drawing);
        }
    }

    #[test]
    fn fails_once_the_grouping_space_is_exhausted() {
        // Two students in two groups: only two drawings exist. Once both are
        // in history, the bound is reached no matter what the RNG does.
        let ids = names(2);
        let mut rng = StdRng::seed_from_u64(29);
        let history: Vec<Drawing> = vec![
            vec![vec![ids[0].clone()], vec![ids[1].clone()]],
            vec![vec![ids[1].clone()], vec![ids[0].clone()]],
        ];

        let res = generate_groups(&ids, 2, &history, MAX_ATTEMPTS, &mut rng);
        assert_eq!(res, Err(DrawErrors::NoUniqueGrouping));
    }

    #[test]
    fn zero_groups_is_rejected() {
        let ids = names(3);
        let mut rng = StdRng::seed_from_u64(1);
        let res = generate_groups(&ids, 0, &[], MAX_ATTEMPTS, &mut rng);
        assert_eq!(res, Err(DrawErrors::InvalidGroupCount));
    }

    #[test]
    fn more_groups_than_students_leaves_empty_groups() {
        let ids = names(2);
        let mut rng = StdRng::seed_from_u64(13);
        let drawing = generate_groups(&ids, 4, &[], MAX_ATTEMPTS, &mut rng).unwrap();
        assert_eq!(drawing.len(), 4);
        let filled = drawing.iter().filter(|g| !g.is_empty()).count();
        assert_eq!(filled, 2);
        let empty = drawing.iter().filter(|g| g.is_empty()).count();
        assert_eq!(empty, 2);
    }
}
