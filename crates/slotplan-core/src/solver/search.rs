//! Exact branch-and-bound over candidate starts.
//!
//! Tasks are visited in id order. Each task either takes one of its
//! candidate starts or is skipped. A complete assignment A beats B when:
//!
//! 1. its weighted objective is higher,
//! 2. the objectives tie and it schedules more tasks,
//! 3. both tie and its start vector (id order, skipped = +inf) is
//!    lexicographically smaller.
//!
//! The last rule makes the result independent of visiting order, so the
//! search may try high-value candidates first and still return the same
//! schedule every time.
//!
//! Tasks with identical candidate lists ("twins") are interchangeable. Only
//! the permutation the tie-break would pick is explored: twins take strictly
//! increasing starts in id order, and a twin is skipped once an earlier one is.
//!
//! The bound at each node is a fractional knapsack of the remaining tasks'
//! best free candidates over the free quanta left (per day under a daily
//! cap), so tasks competing for the same capacity are not all counted.

use std::cmp::Ordering;
use std::time::Instant;

const EPSILON: f64 = 1e-9;
const SKIPPED: usize = usize::MAX;
/// How often the wall clock is sampled.
const CLOCK_CHECK_INTERVAL: u64 = 256;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Candidate {
    pub start: usize,
    pub score: f64,
    pub weighted: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct SearchTask {
    pub quanta: usize,
    pub priority: f64,
    /// Sorted by weighted score descending, then start ascending
    pub candidates: Vec<Candidate>,
}

impl SearchTask {
    pub fn new(quanta: usize, priority: f64, mut candidates: Vec<Candidate>) -> Self {
        candidates.sort_by(|a, b| {
            b.weighted
                .total_cmp(&a.weighted)
                .then_with(|| a.start.cmp(&b.start))
        });
        Self {
            quanta,
            priority,
            candidates,
        }
    }

    fn best_weighted(&self) -> f64 {
        self.candidates.first().map_or(0.0, |c| c.weighted)
    }

    fn is_twin_of(&self, other: &SearchTask) -> bool {
        self.quanta == other.quanta
            && self.priority.to_bits() == other.priority.to_bits()
            && self.candidates == other.candidates
    }
}

/// Per-day cap on scheduled quanta.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DailyCap<'a> {
    /// Day index of every quantum, non-decreasing
    pub day_of: &'a [usize],
    pub days: usize,
    pub limit: usize,
    /// Quanta per day already taken by work outside the search
    pub already_used: &'a [usize],
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SearchLimits {
    pub deadline: Option<Instant>,
    pub max_nodes: Option<u64>,
}

#[derive(Debug, Clone)]
pub(crate) struct SearchOutcome {
    /// Index into each task's candidate list, `None` when skipped
    pub choice: Vec<Option<usize>>,
    pub objective: f64,
    pub nodes: u64,
    pub exhausted: bool,
}

#[derive(Debug, Clone)]
struct Incumbent {
    choice: Vec<Option<usize>>,
    starts: Vec<usize>,
    objective: f64,
    count: usize,
}

struct Search<'a> {
    tasks: &'a [SearchTask],
    gap: usize,
    cap: Option<DailyCap<'a>>,
    limits: SearchLimits,
    suffix_best: Vec<f64>,
    /// Nearest earlier twin of each task
    twin_prev: Vec<Option<usize>>,
    /// Twin groups in id order
    groups: Vec<Vec<usize>>,
    /// Quanta covered by some candidate, per day (a single bucket without a cap)
    usable: Vec<usize>,

    busy: Vec<bool>,
    placed: Vec<usize>,
    day_used: Vec<usize>,
    choice: Vec<Option<usize>>,
    starts: Vec<usize>,
    objective: f64,
    count: usize,

    best: Option<Incumbent>,
    nodes: u64,
    exhausted: bool,
}

/// Find the best assignment of `tasks` on a grid of `grid_len` quanta.
///
/// Always returns a conflict-free assignment. `exhausted` is set when a
/// budget stopped the search before optimality was proven.
pub(crate) fn search(
    tasks: &[SearchTask],
    grid_len: usize,
    gap: usize,
    cap: Option<DailyCap<'_>>,
    limits: SearchLimits,
) -> SearchOutcome {
    let mut s = Search::new(tasks, grid_len, gap, cap, limits);
    s.seed_greedy();
    s.descend(0);

    let nodes = s.nodes;
    let exhausted = s.exhausted;
    match s.best {
        Some(best) => SearchOutcome {
            choice: best.choice,
            objective: best.objective,
            nodes,
            exhausted,
        },
        None => SearchOutcome {
            choice: vec![None; tasks.len()],
            objective: 0.0,
            nodes,
            exhausted,
        },
    }
}

fn lex_cmp(a: &[usize], b: &[usize]) -> Ordering {
    a.iter().cmp(b.iter())
}

fn tolerance(reference: f64) -> f64 {
    EPSILON * (1.0 + reference.abs())
}

impl<'a> Search<'a> {
    fn new(
        tasks: &'a [SearchTask],
        grid_len: usize,
        gap: usize,
        cap: Option<DailyCap<'a>>,
        limits: SearchLimits,
    ) -> Self {
        let n = tasks.len();
        let mut suffix_best = vec![0.0; n + 1];
        for k in (0..n).rev() {
            suffix_best[k] = suffix_best[k + 1] + tasks[k].best_weighted();
        }

        let mut twin_prev = vec![None; n];
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for t in 0..n {
            match groups.iter_mut().find(|g| tasks[g[0]].is_twin_of(&tasks[t])) {
                Some(group) => {
                    twin_prev[t] = group.last().copied();
                    group.push(t);
                }
                None => groups.push(vec![t]),
            }
        }

        let mut covered = vec![false; grid_len];
        for task in tasks {
            for c in &task.candidates {
                covered[c.start..c.start + task.quanta].fill(true);
            }
        }
        let buckets = cap.map_or(1, |c| c.days);
        let mut usable = vec![0; buckets];
        for (q, &c) in covered.iter().enumerate() {
            if c {
                usable[cap.map_or(0, |cap| cap.day_of[q])] += 1;
            }
        }

        let day_used = match cap {
            Some(c) => {
                let mut used = c.already_used.to_vec();
                used.resize(c.days, 0);
                used
            }
            None => Vec::new(),
        };

        Self {
            tasks,
            gap,
            cap,
            limits,
            suffix_best,
            twin_prev,
            groups,
            usable,
            busy: vec![false; grid_len],
            placed: vec![0; buckets],
            day_used,
            choice: vec![None; n],
            starts: vec![SKIPPED; n],
            objective: 0.0,
            count: 0,
            best: None,
            nodes: 0,
            exhausted: false,
        }
    }

    fn bucket(&self, q: usize) -> usize {
        self.cap.map_or(0, |c| c.day_of[q])
    }

    fn fits(&self, task: usize, cand: &Candidate) -> bool {
        let quanta = self.tasks[task].quanta;
        let lo = cand.start.saturating_sub(self.gap);
        let hi = (cand.start + quanta + self.gap).min(self.busy.len());
        if self.busy[lo..hi].iter().any(|&b| b) {
            return false;
        }

        if let Some(cap) = self.cap {
            // Days are contiguous runs of quanta.
            let end = cand.start + quanta;
            let mut q = cand.start;
            while q < end {
                let day = cap.day_of[q];
                let mut n = 0;
                while q < end && cap.day_of[q] == day {
                    n += 1;
                    q += 1;
                }
                if self.day_used[day] + n > cap.limit {
                    return false;
                }
            }
        }
        true
    }

    fn place(&mut self, task: usize, index: usize) {
        let cand = self.tasks[task].candidates[index];
        let quanta = self.tasks[task].quanta;
        for q in cand.start..cand.start + quanta {
            self.busy[q] = true;
            let bucket = self.bucket(q);
            self.placed[bucket] += 1;
            if self.cap.is_some() {
                self.day_used[bucket] += 1;
            }
        }
        self.choice[task] = Some(index);
        self.starts[task] = cand.start;
        self.objective += cand.weighted;
        self.count += 1;
    }

    fn unplace(&mut self, task: usize) {
        let Some(index) = self.choice[task].take() else {
            return;
        };
        let cand = self.tasks[task].candidates[index];
        let quanta = self.tasks[task].quanta;
        for q in cand.start..cand.start + quanta {
            self.busy[q] = false;
            let bucket = self.bucket(q);
            self.placed[bucket] -= 1;
            if self.cap.is_some() {
                self.day_used[bucket] -= 1;
            }
        }
        self.starts[task] = SKIPPED;
        self.objective -= cand.weighted;
        self.count -= 1;
    }

    /// Greedy incumbent: highest priority first, each task takes its best free slot.
    fn seed_greedy(&mut self) {
        let mut order: Vec<usize> = (0..self.tasks.len()).collect();
        order.sort_by(|&a, &b| {
            self.tasks[b]
                .priority
                .total_cmp(&self.tasks[a].priority)
                .then_with(|| a.cmp(&b))
        });

        for &t in &order {
            let pick = self.tasks[t]
                .candidates
                .iter()
                .position(|c| self.fits(t, c));
            if let Some(index) = pick {
                self.place(t, index);
            }
        }
        self.offer();
        for t in 0..self.tasks.len() {
            self.unplace(t);
        }
    }

    /// Compare the current complete assignment against the incumbent.
    fn offer(&mut self) {
        let better = match &self.best {
            None => true,
            Some(best) => {
                let tol = tolerance(best.objective);
                if self.objective > best.objective + tol {
                    true
                } else if self.objective < best.objective - tol {
                    false
                } else {
                    match self.count.cmp(&best.count) {
                        Ordering::Greater => true,
                        Ordering::Less => false,
                        Ordering::Equal => lex_cmp(&self.starts, &best.starts) == Ordering::Less,
                    }
                }
            }
        };
        if better {
            self.best = Some(Incumbent {
                choice: self.choice.clone(),
                starts: self.starts.clone(),
                objective: self.objective,
                count: self.count,
            });
        }
    }

    /// Whether no completion of the current prefix (tasks `0..depth`) can beat
    /// the incumbent given optimistic totals.
    fn dominated(&self, depth: usize, bound_objective: f64, bound_count: usize) -> bool {
        let Some(best) = &self.best else {
            return false;
        };
        let tol = tolerance(best.objective);
        if bound_objective < best.objective - tol {
            return true;
        }
        if bound_objective > best.objective + tol {
            return false;
        }
        match bound_count.cmp(&best.count) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => {
                lex_cmp(&self.starts[..depth], &best.starts[..depth]) == Ordering::Greater
            }
        }
    }

    /// Free quanta any remaining task could still use.
    fn free_capacity(&self) -> usize {
        match self.cap {
            Some(cap) => (0..self.usable.len())
                .map(|d| {
                    (self.usable[d] - self.placed[d]).min(cap.limit.saturating_sub(self.day_used[d]))
                })
                .sum(),
            None => self.usable[0] - self.placed[0],
        }
    }

    /// Optimistic totals for tasks `depth..` given what is already placed.
    fn dynamic_bound(&self, depth: usize) -> (f64, usize) {
        // (value, quanta) of the best free candidates each remaining task could take
        let mut items: Vec<(f64, usize)> = Vec::new();
        for group in &self.groups {
            let remaining = group.iter().filter(|&&t| t >= depth).count();
            if remaining == 0 {
                continue;
            }
            let floor = group
                .iter()
                .rev()
                .find(|&&t| t < depth)
                .map(|&t| self.starts[t]);
            if floor == Some(SKIPPED) {
                continue;
            }
            let root = group[0];
            let task = &self.tasks[root];
            items.extend(
                task.candidates
                    .iter()
                    .filter(|c| floor.map_or(true, |f| c.start > f) && self.fits(root, c))
                    .take(remaining)
                    .map(|c| (c.weighted, task.quanta)),
            );
        }

        let capacity = self.free_capacity();

        items.sort_by(|a, b| (b.0 / b.1 as f64).total_cmp(&(a.0 / a.1 as f64)));
        let mut objective = self.objective;
        let mut room = capacity as f64;
        for &(value, quanta) in &items {
            let size = quanta as f64;
            if size <= room {
                objective += value;
                room -= size;
            } else {
                objective += value * room / size;
                break;
            }
        }

        let mut sizes: Vec<usize> = items.iter().map(|&(_, q)| q).collect();
        sizes.sort_unstable();
        let mut count = self.count;
        let mut room = capacity;
        for size in sizes {
            if size > room {
                break;
            }
            room -= size;
            count += 1;
        }
        (objective, count)
    }

    fn out_of_budget(&mut self) -> bool {
        if self.exhausted {
            return true;
        }
        if let Some(max) = self.limits.max_nodes {
            if self.nodes >= max {
                self.exhausted = true;
            }
        }
        if let Some(deadline) = self.limits.deadline {
            if self.nodes % CLOCK_CHECK_INTERVAL == 0 && Instant::now() >= deadline {
                self.exhausted = true;
            }
        }
        self.exhausted
    }

    fn descend(&mut self, depth: usize) {
        if self.out_of_budget() {
            return;
        }
        self.nodes += 1;

        if depth == self.tasks.len() {
            self.offer();
            return;
        }

        let static_objective = self.objective + self.suffix_best[depth];
        let static_count = self.count + (self.tasks.len() - depth);
        if self.dominated(depth, static_objective, static_count) {
            return;
        }
        let (bound_objective, bound_count) = self.dynamic_bound(depth);
        if self.dominated(depth, bound_objective, bound_count) {
            return;
        }

        // A twin starts after its predecessor and is skipped once that one is.
        let floor = self.twin_prev[depth].map(|p| self.starts[p]);
        if floor != Some(SKIPPED) {
            for index in 0..self.tasks[depth].candidates.len() {
                let cand = self.tasks[depth].candidates[index];
                if floor.is_some_and(|f| cand.start <= f) || !self.fits(depth, &cand) {
                    continue;
                }
                self.place(depth, index);
                self.descend(depth + 1);
                self.unplace(depth);
                if self.exhausted {
                    return;
                }
            }
        }

        self.descend(depth + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(quanta: usize, starts: impl IntoIterator<Item = usize>, score: f64) -> SearchTask {
        let cands = starts
            .into_iter()
            .map(|start| Candidate {
                start,
                score,
                weighted: score,
            })
            .collect();
        SearchTask::new(quanta, 1.0, cands)
    }

    fn chosen_starts(tasks: &[SearchTask], out: &SearchOutcome) -> Vec<Option<usize>> {
        out.choice
            .iter()
            .zip(tasks)
            .map(|(c, t)| c.map(|i| t.candidates[i].start))
            .collect()
    }

    #[test]
    fn ties_resolve_to_earliest_starts_in_id_order() {
        let tasks = vec![uniform(2, 0..=6, 1.0), uniform(2, 0..=6, 1.0)];
        let out = search(&tasks, 8, 0, None, SearchLimits::default());
        assert_eq!(chosen_starts(&tasks, &out), vec![Some(0), Some(2)]);
        assert!(!out.exhausted);
        assert!((out.objective - 2.0).abs() < 1e-12);
    }

    #[test]
    fn higher_weight_wins_when_capacity_is_short() {
        let low = uniform(4, 0..=0, 1.0);
        let mut high = uniform(4, 0..=0, 1.0);
        high.priority = 3.0;
        for c in &mut high.candidates {
            c.weighted = 3.0;
        }
        let tasks = vec![low, high];
        let out = search(&tasks, 4, 0, None, SearchLimits::default());
        assert_eq!(chosen_starts(&tasks, &out), vec![None, Some(0)]);
    }

    #[test]
    fn exact_search_beats_greedy() {
        // Greedy puts the heavy task at its favourite start, which blocks light_b.
        let heavy = SearchTask::new(
            2,
            2.0,
            vec![
                Candidate { start: 1, score: 1.0, weighted: 2.0 },
                Candidate { start: 4, score: 0.9, weighted: 1.8 },
            ],
        );
        let light_a = uniform(1, [0], 1.0);
        let light_b = uniform(1, [2], 1.0);
        let tasks = vec![heavy, light_a, light_b];
        let out = search(&tasks, 6, 0, None, SearchLimits::default());
        assert_eq!(chosen_starts(&tasks, &out), vec![Some(4), Some(0), Some(2)]);
    }

    #[test]
    fn gap_keeps_tasks_apart() {
        let tasks = vec![uniform(1, 0..=3, 1.0), uniform(1, 0..=3, 1.0)];
        let out = search(&tasks, 4, 1, None, SearchLimits::default());
        assert_eq!(chosen_starts(&tasks, &out), vec![Some(0), Some(2)]);
    }

    #[test]
    fn daily_cap_limits_quanta_per_day() {
        let day_of = [0, 0, 0, 0, 1, 1, 1, 1];
        let cap = DailyCap {
            day_of: &day_of,
            days: 2,
            limit: 2,
            already_used: &[0, 0],
        };
        let tasks = vec![uniform(2, 0..=6, 1.0), uniform(2, 0..=6, 1.0)];
        let out = search(&tasks, 8, 0, Some(cap), SearchLimits::default());
        assert_eq!(chosen_starts(&tasks, &out), vec![Some(0), Some(4)]);
    }

    #[test]
    fn node_budget_returns_feasible_incumbent() {
        let tasks: Vec<SearchTask> = (0..6).map(|_| uniform(1, 0..=11, 1.0)).collect();
        let limits = SearchLimits {
            deadline: None,
            max_nodes: Some(3),
        };
        let out = search(&tasks, 12, 0, None, limits);
        assert!(out.exhausted);
        let mut starts: Vec<usize> = chosen_starts(&tasks, &out).into_iter().flatten().collect();
        starts.sort_unstable();
        starts.dedup();
        assert_eq!(starts.len(), 6);
    }

    #[test]
    fn task_without_candidates_is_skipped() {
        let tasks = vec![uniform(2, [], 1.0), uniform(2, [0], 1.0)];
        let out = search(&tasks, 2, 0, None, SearchLimits::default());
        assert_eq!(chosen_starts(&tasks, &out), vec![None, Some(0)]);
    }

    #[test]
    fn daily_cap_counts_work_done_outside_the_search() {
        let day_of = [0, 0, 0, 0, 1, 1, 1, 1];
        let cap = DailyCap {
            day_of: &day_of,
            days: 2,
            limit: 2,
            already_used: &[1, 0],
        };
        let tasks = vec![uniform(2, 0..=6, 1.0)];
        let out = search(&tasks, 8, 0, Some(cap), SearchLimits::default());
        assert_eq!(chosen_starts(&tasks, &out), vec![Some(4)]);
    }

    #[test]
    fn passed_deadline_returns_greedy_incumbent() {
        let tasks: Vec<SearchTask> = (0..6).map(|_| uniform(1, 0..=11, 1.0)).collect();
        let limits = SearchLimits {
            deadline: Some(Instant::now()),
            max_nodes: None,
        };
        let out = search(&tasks, 12, 0, None, limits);
        assert!(out.exhausted);
        assert_eq!(out.nodes, 0);
        let mut starts: Vec<usize> = chosen_starts(&tasks, &out).into_iter().flatten().collect();
        starts.sort_unstable();
        starts.dedup();
        assert_eq!(starts.len(), 6);
    }

    #[test]
    fn interchangeable_tasks_are_not_permuted() {
        // Later starts score higher, so value order fights the start tie-break.
        let twin = || {
            let cands = (0..8)
                .map(|start| Candidate {
                    start,
                    score: (start + 1) as f64,
                    weighted: (start + 1) as f64,
                })
                .collect();
            SearchTask::new(1, 1.0, cands)
        };
        let tasks: Vec<SearchTask> = (0..8).map(|_| twin()).collect();
        let out = search(&tasks, 8, 0, None, SearchLimits::default());

        assert!(!out.exhausted);
        assert_eq!(
            chosen_starts(&tasks, &out),
            (0..8).map(Some).collect::<Vec<_>>()
        );
        assert!(out.nodes < 1_000, "explored {} nodes", out.nodes);
    }

    #[test]
    fn twins_are_detected_in_id_order() {
        let tasks = vec![
            uniform(2, 0..=4, 1.0),
            uniform(1, 0..=4, 1.0),
            uniform(2, 0..=4, 1.0),
            uniform(2, 0..=4, 1.0),
        ];
        let s = Search::new(&tasks, 6, 0, None, SearchLimits::default());
        assert_eq!(s.twin_prev, vec![None, None, Some(0), Some(2)]);
        assert_eq!(s.groups, vec![vec![0, 2, 3], vec![1]]);
    }

    #[test]
    fn bound_accounts_for_shared_capacity() {
        let tasks = vec![
            uniform(2, 0..=2, 1.0),
            uniform(2, 0..=2, 0.9),
            uniform(2, 0..=2, 0.8),
        ];
        let s = Search::new(&tasks, 4, 0, None, SearchLimits::default());
        // Four free quanta hold two of the three tasks
        let (objective, count) = s.dynamic_bound(0);
        assert!((objective - 1.9).abs() < 1e-9);
        assert_eq!(count, 2);
    }

    #[test]
    fn bound_respects_remaining_daily_room() {
        let day_of = [0, 0, 0, 0, 1, 1, 1, 1];
        let cap = DailyCap {
            day_of: &day_of,
            days: 2,
            limit: 2,
            already_used: &[2, 0],
        };
        let tasks = vec![uniform(2, 0..=6, 1.0), uniform(2, 0..=6, 0.5)];
        let s = Search::new(&tasks, 8, 0, Some(cap), SearchLimits::default());
        let (objective, count) = s.dynamic_bound(0);
        assert!((objective - 1.0).abs() < 1e-9);
        assert_eq!(count, 1);

        let out = search(&tasks, 8, 0, Some(cap), SearchLimits::default());
        assert_eq!(chosen_starts(&tasks, &out), vec![Some(4), None]);
    }
}
