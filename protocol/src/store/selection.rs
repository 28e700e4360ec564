//! Input selection for spends.
//!
//! Policy, in order:
//!
//! 1. The smallest set of notes whose amounts sum to exactly the target.
//!    Searched by iterative deepening on cardinality, so the first hit is
//!    the smallest. An exact match needs no change note, which saves a
//!    commitment and leaks nothing about the change amount.
//! 2. Otherwise, greedy largest-first until the sum covers the target. For
//!    "sum ≥ target" this is cardinality-optimal.
//!
//! Candidates are ordered by amount descending, then id ascending, and every
//! search walks that order, so the same inputs always give the same answer.
//!
//! The exact search is exponential in the worst case. It stops after a fixed
//! number of visited nodes and falls back to greedy.

use super::CommitmentId;

/// A spendable note as seen by the selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub id: CommitmentId,
    pub amount: u64,
}

/// The chosen inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub ids: Vec<CommitmentId>,
    pub total: u64,
    /// `true` when `total` equals the requested amount.
    pub exact: bool,
}

impl Selection {
    pub fn change(&self, amount: u64) -> u64 {
        self.total.saturating_sub(amount)
    }
}

/// Pick inputs covering `amount`, or `None` if everything together is short.
pub fn select(candidates: &[Candidate], amount: u64, budget: usize) -> Option<Selection> {
    let mut sorted = candidates.to_vec();
    sorted.sort_by(|a, b| b.amount.cmp(&a.amount).then(a.id.cmp(&b.id)));

    let total: u128 = sorted.iter().map(|c| c.amount as u128).sum();
    if total < amount as u128 {
        return None;
    }

    if let Some(picked) = exact_match(&sorted, amount, budget) {
        let ids = picked.iter().map(|&i| sorted[i].id).collect();
        return Some(Selection {
            ids,
            total: amount,
            exact: true,
        });
    }

    Some(greedy(&sorted, amount))
}

fn greedy(sorted: &[Candidate], amount: u64) -> Selection {
    let mut ids = Vec::new();
    let mut acc: u128 = 0;
    for c in sorted {
        if acc >= amount as u128 {
            break;
        }
        ids.push(c.id);
        acc += c.amount as u128;
    }
    Selection {
        ids,
        total: acc.min(u64::MAX as u128) as u64,
        exact: acc == amount as u128,
    }
}

/// Smallest-cardinality exact subset of `sorted` (descending), as indices.
fn exact_match(sorted: &[Candidate], amount: u64, budget: usize) -> Option<Vec<usize>> {
    let values: Vec<u128> = sorted.iter().map(|c| c.amount as u128).collect();
    let n = values.len();

    // prefix[i] = values[0] + .. + values[i - 1]
    let mut prefix = vec![0u128; n + 1];
    for i in 0..n {
        prefix[i + 1] = prefix[i] + values[i];
    }

    let mut search = ExactSearch {
        values: &values,
        prefix: &prefix,
        visited: 0,
        budget,
        picked: Vec::new(),
    };

    for k in 1..=n {
        // The k smallest already overshoot: no larger k can do better.
        if prefix[n] - prefix[n - k] > amount as u128 {
            return None;
        }
        // The k largest fall short: try more notes.
        if prefix[k] < amount as u128 {
            continue;
        }
        match search.run(0, k, amount as u128) {
            Outcome::Found => return Some(search.picked),
            Outcome::Exhausted => {}
            Outcome::OutOfBudget => return None,
        }
    }
    None
}

enum Outcome {
    Found,
    Exhausted,
    OutOfBudget,
}

struct ExactSearch<'a> {
    values: &'a [u128],
    prefix: &'a [u128],
    visited: usize,
    budget: usize,
    picked: Vec<usize>,
}

impl ExactSearch<'_> {
    fn window(&self, from: usize, len: usize) -> u128 {
        self.prefix[from + len] - self.prefix[from]
    }

    fn run(&mut self, start: usize, k_left: usize, target: u128) -> Outcome {
        let n = self.values.len();
        let mut i = start;
        while i + k_left <= n {
            self.visited += 1;
            if self.visited > self.budget {
                return Outcome::OutOfBudget;
            }

            // Largest reachable sum from here on is too small; later
            // windows are smaller still.
            if self.window(i, k_left) < target {
                return Outcome::Exhausted;
            }
            // Smallest reachable sum overshoots.
            if self.window(n - k_left, k_left) > target {
                return Outcome::Exhausted;
            }

            let v = self.values[i];
            if v <= target {
                if k_left == 1 {
                    if v == target {
                        self.picked.push(i);
                        return Outcome::Found;
                    }
                } else {
                    self.picked.push(i);
                    match self.run(i + 1, k_left - 1, target - v) {
                        Outcome::Found => return Outcome::Found,
                        Outcome::OutOfBudget => return Outcome::OutOfBudget,
                        Outcome::Exhausted => {
                            self.picked.pop();
                        }
                    }
                }
            }
            i += 1;
        }
        Outcome::Exhausted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EXACT_MATCH_SEARCH_BUDGET;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn cands(amounts: &[u64]) -> Vec<Candidate> {
        amounts
            .iter()
            .enumerate()
            .map(|(i, &amount)| Candidate {
                id: CommitmentId(i as u64 + 1),
                amount,
            })
            .collect()
    }

    fn pick(amounts: &[u64], target: u64) -> Option<Selection> {
        select(&cands(amounts), target, EXACT_MATCH_SEARCH_BUDGET)
    }

    #[test]
    fn single_exact_note_preferred() {
        let s = pick(&[500, 100, 400], 400).unwrap();
        assert_eq!(s.ids, vec![CommitmentId(3)]);
        assert!(s.exact);
    }

    #[test]
    fn smallest_exact_subset_wins_over_larger_one() {
        // 60 = 50 + 10 (two notes) = 20 + 20 + 20 (three notes).
        let s = pick(&[20, 20, 20, 50, 10], 60).unwrap();
        assert!(s.exact);
        assert_eq!(s.ids.len(), 2);
        assert_eq!(s.total, 60);
    }

    #[test]
    fn greedy_when_no_exact_subset() {
        let s = pick(&[500, 300, 7], 400).unwrap();
        assert!(!s.exact);
        assert_eq!(s.ids, vec![CommitmentId(1)]);
        assert_eq!(s.change(400), 100);
    }

    #[test]
    fn insufficient_returns_none() {
        assert!(pick(&[100, 200], 301).is_none());
        assert!(pick(&[], 1).is_none());
    }

    #[test]
    fn ties_break_by_id() {
        let s = pick(&[50, 50, 50], 50).unwrap();
        assert_eq!(s.ids, vec![CommitmentId(1)]);
    }

    #[test]
    fn exhausted_budget_falls_back_to_greedy() {
        // 59 + 41 = 100 exists, but five nodes are not enough to find it.
        let amounts: Vec<u64> = (0..30).map(|i| 2 * i + 1).collect();
        let s = select(&cands(&amounts), 100, 5).unwrap();
        assert!(!s.exact);
        assert_eq!(s.ids, vec![CommitmentId(30), CommitmentId(29)]);
        assert_eq!(s.total, 59 + 57);
    }

    #[test]
    fn never_under_covers() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let n = rng.gen_range(1..12);
            let amounts: Vec<u64> = (0..n).map(|_| rng.gen_range(1..1_000)).collect();
            let total: u64 = amounts.iter().sum();
            let target = rng.gen_range(1..=total);

            let s = pick(&amounts, target).unwrap();
            let picked: u64 = s
                .ids
                .iter()
                .map(|id| amounts[(id.0 - 1) as usize])
                .sum();
            assert_eq!(picked, s.total);
            assert!(s.total >= target);
            assert_eq!(s.exact, s.total == target);
        }
    }

    #[test]
    fn finds_exact_match_whenever_one_exists() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let n = rng.gen_range(1..10);
            let amounts: Vec<u64> = (0..n).map(|_| rng.gen_range(1..50)).collect();
            // Target is the sum of a random non-empty subset.
            let mask: u32 = rng.gen_range(1..(1u32 << n));
            let target: u64 = (0..n)
                .filter(|i| mask & (1 << i) != 0)
                .map(|i| amounts[i])
                .sum();

            let s = pick(&amounts, target).unwrap();
            assert!(s.exact, "missed exact subset for {} in {:?}", target, amounts);
            assert!(s.ids.len() as u32 <= mask.count_ones());
        }
    }
}
