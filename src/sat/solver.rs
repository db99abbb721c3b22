#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
//! The search driver: the decide / propagate / analyze / backjump loop, and
//! the public control surface built on top of it (solving, optimization,
//! model counting, assumptions, incremental clause addition).
//!
//! The solver is single-threaded and cooperative. Optional sinks stream
//! models, intermediate results and certificate lines to consumers over
//! `mpsc` channels; an optional atomic stop flag is observed only at
//! suspension points (before a decision, after a restart, between
//! optimization iterations), never inside propagation or conflict analysis.

use crate::sat::analysis::{AnalysisBufs, Learned};
use crate::sat::assignment::{DecLevel, Model};
use crate::sat::clause::{Clause, Weight};
use crate::sat::cutting_planes::{CpBufs, PbLearned};
use crate::sat::error::{Error, Result};
use crate::sat::heap::VarOrderHeap;
use crate::sat::lbd::LbdStats;
use crate::sat::literal::{signed, Lit, Status, Var};
use crate::sat::problem::Problem;
use crate::sat::watcher::{ClauseRef, WatcherList};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// By how much clause bumping decays over time.
const CLAUSE_DECAY: f32 = 0.999;
/// Initial variable activity decay; climbs towards [`MAX_VAR_DECAY`].
const DEFAULT_VAR_DECAY: f64 = 0.8;
const MAX_VAR_DECAY: f64 = 0.95;
/// Minimum delay between two verbose progress lines.
const REPORT_EVERY: Duration = Duration::from_secs(3);

/// Statistics about the resolution process, for information purposes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub nb_restarts: usize,
    pub nb_conflicts: usize,
    pub nb_decisions: usize,
    pub nb_propagations: usize,
    /// How many unit clauses were learned.
    pub nb_unit_learned: usize,
    /// How many binary clauses were learned.
    pub nb_binary_learned: usize,
    /// How many clauses were learned.
    pub nb_learned: usize,
    /// How many learned clauses were deleted.
    pub nb_deleted: usize,
}

/// The outcome of a solve or optimization call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolveResult {
    pub status: Status,
    /// A model, valid only when `status` is `Sat`.
    pub model: Vec<bool>,
    /// The cost of the model for optimization problems, 0 for decision
    /// problems.
    pub cost: Weight,
}

/// A stop signal shared with the caller; level-triggered.
pub type StopFlag = Arc<AtomicBool>;

/// The main solver.
pub struct Solver {
    /// Display progress information while solving. Off by default.
    pub verbose: bool,
    /// Emit a RUP certificate while solving. Useful to prove UNSAT
    /// instances. Off by default.
    pub certified: bool,
    /// Where certificate lines go. When `certified` is set and no sink is
    /// given, lines are printed to stdout, one write per line.
    pub cert_out: Option<Sender<String>>,
    pub stats: Stats,
    pub(crate) nb_vars: usize,
    pub(crate) status: Status,
    pub(crate) wl: WatcherList,
    /// Current assignment stack.
    pub(crate) trail: Vec<Lit>,
    pub(crate) model: Model,
    /// Last model found, kept across repeated solves.
    pub(crate) last_model: Option<Model>,
    /// How often each variable is involved in conflicts.
    pub(crate) activity: Vec<f64>,
    /// Preferred sign for each variable (saved phase).
    pub(crate) polarity: Vec<bool>,
    /// True iff the variable's binding was assumed.
    pub(crate) assumptions: Vec<bool>,
    /// For each variable, the constraint that propagated it, if any.
    pub(crate) reason: Vec<Option<ClauseRef>>,
    pub(crate) var_queue: VarOrderHeap,
    pub(crate) var_inc: f64,
    pub(crate) clause_inc: f32,
    pub(crate) var_decay: f64,
    pub(crate) lbd_stats: LbdStats,
    pub(crate) analysis: AnalysisBufs,
    pub(crate) cp_bufs: CpBufs,
    min_lits: Option<Vec<Lit>>,
    min_weights: Option<Vec<Weight>>,
    /// Negated objective literals, sorted by decreasing weight.
    hypothesis: Vec<Lit>,
    hypothesis_weights: Vec<Weight>,
    stop: Option<StopFlag>,
    last_report: Instant,
}

impl Solver {
    /// Makes a solver for the given problem.
    #[must_use]
    pub fn new(mut problem: Problem) -> Self {
        let nb_vars = problem.nb_vars;
        let clauses = if problem.status == Status::Unsat {
            Vec::new()
        } else {
            std::mem::take(&mut problem.clauses)
        };
        let activity = vec![0.0; nb_vars];
        let mut s = Self {
            verbose: false,
            certified: false,
            cert_out: None,
            stats: Stats::default(),
            nb_vars,
            status: problem.status,
            wl: WatcherList::new(nb_vars, clauses),
            trail: problem.units.clone(),
            model: problem.model,
            last_model: None,
            activity,
            polarity: vec![false; nb_vars],
            assumptions: vec![false; nb_vars],
            reason: vec![None; nb_vars],
            var_queue: VarOrderHeap::default(),
            var_inc: 1.0,
            clause_inc: 1.0,
            var_decay: DEFAULT_VAR_DECAY,
            lbd_stats: LbdStats::default(),
            analysis: AnalysisBufs::new(nb_vars),
            cp_bufs: CpBufs::new(nb_vars),
            min_lits: problem.min_lits,
            min_weights: problem.min_weights,
            hypothesis: Vec::new(),
            hypothesis_weights: Vec::new(),
            stop: None,
            last_report: Instant::now(),
        };
        s.reset_optim_polarity();
        s.init_optim_activity();
        s.var_queue = VarOrderHeap::new(&s.activity);
        for i in 0..s.trail.len() {
            let lit = s.trail[i];
            s.model.assign(lit, 1);
        }
        s
    }

    /// Seeds activity for objective variables so the search looks at them
    /// first, proportionally to their weight.
    fn init_optim_activity(&mut self) {
        if let Some(min_lits) = &self.min_lits {
            for (i, lit) in min_lits.iter().enumerate() {
                let w = self.min_weights.as_ref().map_or(1, |ws| ws[i]);
                self.activity[lit.var() as usize] += w as f64;
            }
        }
    }

    /// Makes objective literals false by default, so the first models found
    /// are already cheap.
    fn reset_optim_polarity(&mut self) {
        if let Some(min_lits) = &self.min_lits {
            for lit in min_lits {
                self.polarity[lit.var() as usize] = !lit.is_positive();
            }
        }
    }

    /// True iff the underlying problem is an optimization problem.
    #[must_use]
    pub fn optim(&self) -> bool {
        self.min_lits.is_some()
    }

    pub(crate) fn var_decay_activity(&mut self) {
        self.var_inc *= 1.0 / self.var_decay;
    }

    pub(crate) fn var_bump_activity(&mut self, v: Var) {
        self.activity[v as usize] += self.var_inc;
        if self.activity[v as usize] > 1e100 {
            // Rescale to avoid overflow.
            for a in &mut self.activity {
                *a *= 1e-100;
            }
            self.var_inc *= 1e-100;
        }
        if self.var_queue.contains(v) {
            self.var_queue.decrease(v, &self.activity);
        }
    }

    pub(crate) fn clause_decay_activity(&mut self) {
        self.clause_inc *= 1.0 / CLAUSE_DECAY;
    }

    pub(crate) fn clause_bump_activity(&mut self, cref: ClauseRef) {
        if !self.wl[cref].learned() {
            return;
        }
        let inc = self.clause_inc;
        self.wl[cref].bump_activity(inc);
        if self.wl[cref].activity() > 1e30 {
            let refs: Vec<ClauseRef> = self.wl.learned_refs().collect();
            for r in refs {
                self.wl[r].scale_activity(1e-30);
            }
            self.clause_inc *= 1e-30;
        }
    }

    /// Chooses an unbound literal to be tested, or `None` if all variables
    /// are bound.
    fn choose_lit(&mut self) -> Option<Lit> {
        while !self.var_queue.is_empty() {
            let v = self.var_queue.remove_min(&self.activity);
            if self.model[v] == 0 {
                // Skip already-bound vars: removal is lazy.
                self.stats.nb_decisions += 1;
                return Some(signed(v, !self.polarity[v as usize]));
            }
        }
        None
    }

    /// Reinitializes bindings (model, reason, phase) for all variables
    /// bound at a level above `lvl`, and re-inserts them into the order
    /// heap.
    pub(crate) fn cleanup_bindings(&mut self, lvl: DecLevel) {
        let mut keep = 0;
        while keep < self.trail.len() && self.model.level(self.trail[keep].var()) <= lvl {
            keep += 1;
        }
        for j in keep..self.trail.len() {
            let lit = self.trail[j];
            let v = lit.var();
            self.model.unassign(v);
            if let Some(r) = self.reason[v as usize].take() {
                self.wl[r].unlock();
            }
            self.polarity[v as usize] = lit.is_positive();
            if !self.var_queue.contains(v) {
                self.var_queue.insert(v, &self.activity);
            }
        }
        self.trail.truncate(keep);
        self.reset_optim_polarity();
    }

    fn rebuild_order_heap(&mut self) {
        let unbound: Vec<Var> = (0..self.nb_vars as Var)
            .filter(|&v| self.model[v] == 0)
            .collect();
        self.var_queue.build(&unbound, &self.activity);
    }

    /// Emits a certificate line, if certification is on.
    pub(crate) fn certify(&mut self, line: String) {
        if !self.certified {
            return;
        }
        match &self.cert_out {
            Some(tx) => {
                // A closed consumer means nobody cares any more.
                let _ = tx.send(line);
            }
            None => println!("{line}"),
        }
    }

    /// Adds a learned clause: watches it, bumps it, streams its RUP line.
    fn add_learned(&mut self, clause: Clause) -> ClauseRef {
        let line = clause.cnf_string();
        let cref = self.wl.add_learned(clause);
        self.clause_bump_activity(cref);
        self.certify(line);
        cref
    }

    /// Registers a top-level unit, with its certificate line.
    fn add_learned_unit(&mut self, unit: Lit) {
        self.model.assign(unit, 1);
        self.certify(format!("{} 0", unit.to_dimacs()));
    }

    /// Sets the status to Unsat and closes the certificate.
    fn set_unsat(&mut self) -> Status {
        self.certify("0".to_string());
        self.status = Status::Unsat;
        Status::Unsat
    }

    fn should_stop(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Prints the verbose statistics line, at most every three seconds.
    /// Called from suspension points only.
    fn maybe_report(&mut self) {
        if !self.verbose || self.last_report.elapsed() < REPORT_EVERY {
            return;
        }
        self.last_report = Instant::now();
        let pct_del = if self.stats.nb_learned == 0 {
            0
        } else {
            100 * self.stats.nb_deleted / self.stats.nb_learned
        };
        println!(
            "c | {:8} | {:11} | {:9} | {:9} | {:3}% | {:6} | {:8}/{:8} |",
            self.stats.nb_restarts + 1,
            self.stats.nb_conflicts,
            self.wl.nb_learned(),
            self.stats.nb_deleted,
            pct_del,
            self.wl.idx_reduce - 1,
            self.stats.nb_unit_learned,
            self.nb_vars,
        );
    }

    fn report_header(&self) {
        if self.verbose {
            println!("c ======================================================================================");
            println!("c | Restarts |  Conflicts  |  Learned  |  Deleted  | Del% | Reduce |   Units learned   |");
            println!("c ======================================================================================");
        }
    }

    /// Reorders a propositional or cardinality constraint so unassigned
    /// literals come first, then assigned ones by decreasing level. The
    /// position-based watch seating then covers the literals whose
    /// falsification must re-trigger examination.
    fn order_for_watching(&self, clause: &mut Clause) {
        let mut lits: Vec<Lit> = clause.iter().copied().collect();
        lits.sort_by_key(|l| {
            let lvl = self.model.level(l.var());
            if lvl == 0 {
                DecLevel::MIN
            } else {
                -lvl
            }
        });
        let card = clause.cardinality() as usize;
        *clause = if card == 1 {
            Clause::new(lits)
        } else {
            Clause::new_card(lits, card)
        };
    }

    /// Propagates all the given literals as top-level units. On conflict the
    /// status becomes Unsat.
    pub(crate) fn propagate_units(&mut self, units: &[Lit]) {
        for &unit in units {
            self.cleanup_bindings(1);
            match self.model.lit_status(unit) {
                Status::Sat => continue, // Already bound at the top level.
                Status::Unsat => {
                    self.status = Status::Unsat;
                    return;
                }
                Status::Indet => {}
            }
            self.lbd_stats.add_lbd(1);
            self.stats.nb_unit_learned += 1;
            self.model.assign(unit, 1);
            if self.unify_literal(unit, 1).is_some() {
                self.status = Status::Unsat;
                return;
            }
            self.rebuild_order_heap();
        }
    }

    /// Binds `lit`, propagates it, and searches for a solution until one is
    /// found, Unsat is proven, or a restart is needed.
    fn propagate_and_search(&mut self, mut lit: Option<Lit>, mut lvl: DecLevel) -> Status {
        while let Some(l) = lit {
            let Some(confl) = self.unify_literal(l, lvl) else {
                if self.lbd_stats.must_restart() {
                    self.lbd_stats.clear();
                    self.cleanup_bindings(1);
                    return Status::Indet;
                }
                if self.stats.nb_conflicts >= self.wl.idx_reduce * self.wl.nb_max {
                    self.wl.idx_reduce = self.stats.nb_conflicts / self.wl.nb_max + 1;
                    self.stats.nb_deleted += self.wl.reduce();
                    self.wl.bump_nb_max();
                }
                self.maybe_report();
                if self.should_stop() {
                    return Status::Indet;
                }
                lvl += 1;
                lit = self.choose_lit();
                continue;
            };
            self.stats.nb_conflicts += 1;
            if self.stats.nb_conflicts % 5000 == 0 && self.var_decay < MAX_VAR_DECAY {
                self.var_decay += 0.01;
            }
            self.lbd_stats.add_conflict(self.trail.len());
            if self.wl[confl].is_pseudo_boolean() {
                match self.cutting_planes(confl, lvl) {
                    PbLearned::Ground => return self.set_unsat(),
                    PbLearned::Propagate(units) => {
                        self.propagate_units(&units);
                        if self.status == Status::Unsat {
                            return self.set_unsat();
                        }
                        self.rebuild_order_heap();
                        lvl = 2;
                        lit = self.choose_lit();
                    }
                    PbLearned::Constraint {
                        mut clause,
                        unit,
                        bt_level,
                    } => {
                        if bt_level < 1 {
                            return self.set_unsat();
                        }
                        clause.compute_lbd(&self.model);
                        self.lbd_stats.add_lbd(clause.lbd());
                        self.stats.nb_learned += 1;
                        self.cleanup_bindings(bt_level);
                        if !clause.is_pseudo_boolean() {
                            // Seat the watches on the literals falsified
                            // last, so backtracking re-triggers them.
                            self.order_for_watching(&mut clause);
                        }
                        let cref = self.wl.append_clause(clause);
                        self.reseat_pb_watches(cref);
                        self.reason[unit.var() as usize] = Some(cref);
                        self.wl[cref].lock();
                        lvl = bt_level;
                        lit = Some(unit);
                    }
                }
            } else {
                match self.learn_clause(confl, lvl) {
                    Learned::Ground => return self.set_unsat(),
                    Learned::Unit(unit) => {
                        if self.model.level(unit.var()) == 1
                            && self.model.lit_status(unit) == Status::Unsat
                        {
                            // Top-level conflict. The unit is still a valid
                            // consequence: stream it so the closing empty
                            // clause replays under unit propagation.
                            self.certify(format!("{} 0", unit.to_dimacs()));
                            return self.set_unsat();
                        }
                        self.stats.nb_unit_learned += 1;
                        self.lbd_stats.add_lbd(1);
                        self.cleanup_bindings(1);
                        self.add_learned_unit(unit);
                        if self.unify_literal(unit, 1).is_some() {
                            return self.set_unsat();
                        }
                        self.rebuild_order_heap();
                        lit = self.choose_lit();
                        lvl = 2;
                    }
                    Learned::Clause(learnt) => {
                        if learnt.len() == 2 {
                            self.stats.nb_binary_learned += 1;
                        }
                        self.stats.nb_learned += 1;
                        self.lbd_stats.add_lbd(learnt.lbd());
                        // Backjump to the second-highest level in the clause;
                        // the asserting literal sits at position 0.
                        let bt_level = self.model.level(learnt.second().var());
                        let asserting = learnt.first();
                        let cref = self.add_learned(learnt);
                        self.cleanup_bindings(bt_level);
                        self.reason[asserting.var() as usize] = Some(cref);
                        self.wl[cref].lock();
                        lvl = bt_level;
                        lit = Some(asserting);
                    }
                }
            }
        }
        Status::Sat
    }

    /// Searches until a restart is needed. Level starts at 2: 1 is for
    /// top-level bindings, 0 means "no level assigned yet".
    fn search(&mut self) -> Status {
        let lvl: DecLevel = 2;
        let first = self.choose_lit();
        self.status = self.propagate_and_search(first, lvl);
        self.status
    }

    /// Solves the problem and returns its status.
    pub fn solve(&mut self) -> Status {
        self.solve_with_stop(None)
    }

    /// Solves, checking `stop` at suspension points. On stop, the status is
    /// whatever was established so far (usually `Indet`).
    pub fn solve_with_stop(&mut self, stop: Option<StopFlag>) -> Status {
        if self.status == Status::Unsat {
            return self.status;
        }
        self.stop = stop;
        self.status = Status::Indet;
        self.report_header();
        while self.status == Status::Indet {
            self.search();
            if self.status == Status::Indet {
                self.stats.nb_restarts += 1;
                self.rebuild_order_heap();
                if self.should_stop() {
                    break;
                }
            }
        }
        if self.status == Status::Sat {
            self.last_model = Some(self.model.clone());
        }
        self.stop = None;
        self.status
    }

    /// Adds unit literals to the solver, clearing the previous trail. This
    /// keeps the solver "hot" across related solves.
    pub fn assume(&mut self, lits: &[Lit]) -> Status {
        self.cleanup_bindings(0);
        self.trail.clear();
        self.assumptions = vec![false; self.nb_vars];
        for &lit in lits {
            self.add_learned_unit(lit);
            self.assumptions[lit.var() as usize] = true;
            self.trail.push(lit);
        }
        self.status = Status::Indet;
        if self.propagate(0, 1).is_some() {
            // Conflict right after unit propagation.
            self.status = Status::Unsat;
        }
        self.status
    }

    /// Folds a new problem clause into the running solver, handling the
    /// top-level Sat / Unit / Unsat cases against the current bindings.
    pub fn append_clause(&mut self, mut clause: Clause) {
        self.cleanup_bindings(1);
        let card = clause.cardinality();
        let mut min_w: Weight = 0;
        let mut max_w: Weight = 0;
        let mut i = 0;
        while i < clause.len() {
            let lit = clause.get(i);
            match self.model.lit_status(lit) {
                Status::Sat => {
                    let w = clause.weight(i);
                    min_w += w;
                    max_w += w;
                    clause.remove_lit(i);
                }
                Status::Unsat => clause.remove_lit(i),
                Status::Indet => {
                    max_w += clause.weight(i);
                    i += 1;
                }
            }
        }
        if min_w >= card {
            return; // Already satisfied at the top level.
        }
        if max_w < card {
            self.status = Status::Unsat;
            return;
        }
        if max_w == card {
            let units: Vec<Lit> = clause.iter().copied().collect();
            self.propagate_units(&units);
            return;
        }
        if min_w > 0 {
            // Satisfied literals were removed: the rest only needs to
            // cover the remaining threshold.
            clause.update_cardinality(-min_w);
        }
        // A literal whose weight the rest cannot do without is forced.
        let remaining = max_w - min_w;
        let forced: Vec<Lit> = (0..clause.len())
            .filter(|&i| remaining - clause.weight(i) < clause.cardinality())
            .map(|i| clause.get(i))
            .collect();
        if forced.is_empty() {
            self.wl.append_clause(clause);
            return;
        }
        self.propagate_units(&forced);
        if self.status != Status::Unsat {
            self.append_clause(clause);
        }
    }

    /// The model of the last successful solve, one boolean per variable.
    ///
    /// # Errors
    ///
    /// `Error::Protocol` when no model was found yet.
    pub fn model(&self) -> Result<Vec<bool>> {
        let Some(model) = &self.last_model else {
            return Err(Error::Protocol("model requested on a non-Sat solver"));
        };
        Ok(model.bindings())
    }

    /// The cost of `model` under the objective.
    fn cost_of(&self, model: &Model) -> Weight {
        let Some(min_lits) = &self.min_lits else {
            return 0;
        };
        let mut cost = 0;
        for (i, lit) in min_lits.iter().enumerate() {
            if (model[lit.var()] > 0) == lit.is_positive() {
                cost += self.min_weights.as_ref().map_or(1, |ws| ws[i]);
            }
        }
        cost
    }

    /// Prepares the sorted, negated objective (the "hypothesis") and
    /// returns the objective's maximum cost.
    fn prepare_objective(&mut self) -> Weight {
        let min_lits = self.min_lits.as_ref().expect("objective required");
        let max_cost = self
            .min_weights
            .as_ref()
            .map_or(min_lits.len() as Weight, |ws| ws.iter().sum());
        let mut pairs: Vec<(Lit, Weight)> = min_lits
            .iter()
            .enumerate()
            .map(|(i, &lit)| {
                (
                    lit.negated(),
                    self.min_weights.as_ref().map_or(1, |ws| ws[i]),
                )
            })
            .collect();
        pairs.sort_by_key(|&(_, w)| std::cmp::Reverse(w));
        self.hypothesis = pairs.iter().map(|&(l, _)| l).collect();
        self.hypothesis_weights = pairs.into_iter().map(|(_, w)| w).collect();
        max_cost
    }

    /// The constraint enforcing a strictly better cost than `cost`.
    fn better_cost_constraint(&self, max_cost: Weight, cost: Weight) -> Clause {
        Clause::new_pb(
            self.hypothesis.clone(),
            self.hypothesis_weights.clone(),
            max_cost - cost + 1,
        )
    }

    /// Minimizes the objective. Returns the optimal cost, or -1 when the
    /// problem is unsatisfiable. On decision problems, a model means cost 0.
    pub fn minimize(&mut self) -> Weight {
        self.minimize_with(None, None)
    }

    /// Like [`Self::minimize`], streaming every interim result to `results`
    /// and observing `stop` between iterations.
    pub fn minimize_with(
        &mut self,
        results: Option<&Sender<SolveResult>>,
        stop: Option<StopFlag>,
    ) -> Weight {
        let mut status = self.solve_with_stop(stop.clone());
        if status == Status::Unsat {
            return -1;
        }
        if self.min_lits.is_none() {
            return 0;
        }
        let max_cost = self.prepare_objective();
        let mut cost = 0;
        while status == Status::Sat {
            let model = self.model.clone();
            cost = self.cost_of(&model);
            self.last_model = Some(model);
            if let Some(tx) = results {
                let _ = tx.send(SolveResult {
                    status: Status::Sat,
                    model: self.last_model.as_ref().map(Model::bindings).unwrap_or_default(),
                    cost,
                });
            }
            if cost == 0 {
                break;
            }
            if self.verbose {
                println!("o {cost}");
            }
            if stop.as_ref().is_some_and(|f| f.load(Ordering::Relaxed)) {
                break;
            }
            // Constrain the next model to a strictly better cost.
            self.append_clause(self.better_cost_constraint(max_cost, cost));
            self.rebuild_order_heap();
            status = self.solve_with_stop(stop.clone());
        }
        cost
    }

    /// Finds the optimal solution. Interim results are streamed on
    /// `results` in order of discovery, with monotonically non-increasing
    /// costs; the sink closes when the call returns. If the stop flag is
    /// raised, the best-known result is returned with status `Indet` unless
    /// optimality was already proven.
    pub fn optimal(
        &mut self,
        results: Option<Sender<SolveResult>>,
        stop: Option<StopFlag>,
    ) -> SolveResult {
        let cost = self.minimize_with(results.as_ref(), stop);
        if cost < 0 {
            let res = SolveResult {
                status: Status::Unsat,
                model: Vec::new(),
                cost: 0,
            };
            if let Some(tx) = results {
                let _ = tx.send(res.clone());
            }
            return res;
        }
        if self.last_model.is_none() {
            // Stopped before any model was found.
            return SolveResult {
                status: Status::Indet,
                model: Vec::new(),
                cost: 0,
            };
        }
        // The optimum is proven when cost hit zero or when the last
        // re-solve turned Unsat; a stop mid-descent leaves Indet. Interim
        // results were already streamed, so nothing more is sent here.
        let proven = cost == 0 || self.status == Status::Unsat;
        SolveResult {
            status: if proven { Status::Sat } else { Status::Indet },
            model: self.model().unwrap_or_default(),
            cost,
        }
    }

    /// The negation of all decision literals of the current model, ordered
    /// by decision level. Used to search for further models.
    fn decision_lits(&self) -> Vec<Lit> {
        let last_lit = self.trail[self.trail.len() - 1];
        let lvls = self.model.level(last_lit.var());
        let mut lits = vec![Lit::default(); (lvls - 1).max(0) as usize];
        for v in 0..self.nb_vars as Var {
            let lvl = self.model.level(v);
            if self.reason[v as usize].is_none() && lvl > 1 {
                // Levels besides unit clauses start at 2.
                let negated = self.model[v] > 0;
                lits[(lvl - 2) as usize] = signed(v, negated);
            }
        }
        lits
    }

    /// Counts the models the current (possibly partial) assignment stands
    /// for: `2^k` for `k` unbound variables.
    fn count_current_models(&self) -> u64 {
        let unbound = self
            .last_model
            .as_ref()
            .map_or(0, |m| m.iter().filter(|&lvl| lvl == 0).count());
        1_u64 << unbound
    }

    /// Streams every concrete model covered by the current assignment.
    fn send_current_models(&self, tx: &Sender<Vec<bool>>) -> u64 {
        let last_model = self.last_model.as_ref().expect("a model was just found");
        let mut unbound = Vec::new();
        let mut model = vec![false; self.nb_vars];
        for (i, lvl) in last_model.iter().enumerate() {
            if lvl == 0 {
                unbound.push(i);
            } else {
                model[i] = lvl > 0;
            }
        }
        let nb = 1_u64 << unbound.len();
        for i in 0..nb {
            for (j, &idx) in unbound.iter().enumerate() {
                model[idx] = i & (1 << j) != 0;
            }
            if tx.send(model.clone()).is_err() {
                break;
            }
        }
        nb
    }

    /// Counts the models of the problem, streaming each one to `models` if
    /// given. The sink closes when the call returns. The stop flag is
    /// observed between models; on stop, the count so far is returned.
    ///
    /// Must not be called on optimization problems.
    ///
    /// # Errors
    ///
    /// `Error::Protocol` on an optimization problem.
    pub fn enumerate(
        &mut self,
        models: Option<Sender<Vec<bool>>>,
        stop: Option<StopFlag>,
    ) -> Result<u64> {
        if self.optim() {
            return Err(Error::Protocol(
                "model enumeration on an optimization problem",
            ));
        }
        let mut nb = 0;
        self.report_header();
        while self.status != Status::Unsat {
            while self.status == Status::Indet {
                self.search();
                if self.status == Status::Indet {
                    self.stats.nb_restarts += 1;
                    self.rebuild_order_heap();
                }
            }
            if self.status != Status::Sat {
                break;
            }
            self.last_model = Some(self.model.clone());
            nb += models
                .as_ref()
                .map_or_else(|| self.count_current_models(), |tx| self.send_current_models(tx));
            if self.verbose {
                println!("c found {nb} model(s)");
            }
            if stop.as_ref().is_some_and(|f| f.load(Ordering::Relaxed)) {
                break;
            }
            self.status = Status::Indet;
            if self.trail.is_empty() {
                self.status = Status::Unsat;
                break;
            }
            let mut lits = self.decision_lits();
            match lits.len() {
                0 => self.status = Status::Unsat,
                1 => self.propagate_units(&lits),
                _ => {
                    // Deepest decisions first, so the clause is watched on
                    // the literals falsified last.
                    lits.reverse();
                    let lit = lits[0];
                    let v = lit.var();
                    let lvl = self.model.level(v) - 1;
                    let cref = self.wl.append_clause(Clause::new(lits));
                    self.cleanup_bindings(lvl);
                    // The reason must be seated here: the search loop will
                    // not do it for this literal.
                    self.reason[v as usize] = Some(cref);
                    self.status = self.propagate_and_search(Some(lit), lvl);
                }
            }
        }
        Ok(nb)
    }

    /// Counts the models of the problem without streaming them.
    ///
    /// # Errors
    ///
    /// `Error::Protocol` on an optimization problem.
    pub fn count_models(&mut self) -> Result<u64> {
        self.enumerate(None, None)
    }

    /// A representation of the solver's state as a pseudo-boolean problem.
    #[must_use]
    pub fn pb_string(&self) -> String {
        let mut meta = format!(
            "* #variable= {} #constraint= {} #learned= {}\n",
            self.nb_vars,
            self.wl.nb_orig(),
            self.wl.nb_learned(),
        );
        if let Some(min_lits) = &self.min_lits {
            let terms: Vec<String> = min_lits
                .iter()
                .enumerate()
                .map(|(i, lit)| {
                    let w = self.min_weights.as_ref().map_or(1, |ws| ws[i]);
                    let d = lit.to_dimacs();
                    let (neg, v) = if d < 0 { ("~", -d) } else { ("", d) };
                    format!("{w} {neg}x{v}")
                })
                .collect();
            meta.push_str(&format!("min: {} ;\n", terms.join(" +")));
        }
        let mut clauses: Vec<String> = self
            .wl
            .orig_refs()
            .chain(self.wl.learned_refs())
            .map(|cref| self.wl[cref].pb_string())
            .collect();
        for v in 0..self.nb_vars as Var {
            if self.model[v] == 1 {
                clauses.push(format!("1 x{} = 1 ;", v + 1));
            } else if self.model[v] == -1 {
                clauses.push(format!("1 x{} = 0 ;", v + 1));
            }
        }
        meta + &clauses.join("\n")
    }

    /// Outputs the solver's answer in the DIMACS conventions.
    pub fn output_model(&self) {
        if self.status == Status::Sat || self.last_model.is_some() {
            println!("s SATISFIABLE");
            let bindings = self
                .last_model
                .as_ref()
                .map_or_else(|| self.model.bindings(), Model::bindings);
            let mut line = String::from("v");
            for (i, val) in bindings.iter().enumerate() {
                let d = if *val { i as i64 + 1 } else { -(i as i64 + 1) };
                line.push_str(&format!(" {d}"));
            }
            println!("{line}");
        } else if self.status == Status::Unsat {
            println!("s UNSATISFIABLE");
        } else {
            println!("s UNKNOWN");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sat::constraint::{CardConstr, PbConstr};

    fn solve_slice(cnf: &[Vec<i32>]) -> Status {
        let pb = Problem::parse_slice(cnf).unwrap();
        Solver::new(pb).solve()
    }

    #[test]
    fn test_trivial_sat() {
        assert_eq!(solve_slice(&[vec![1, 2], vec![-1, 2]]), Status::Sat);
    }

    #[test]
    fn test_trivial_unsat() {
        assert_eq!(solve_slice(&[vec![1], vec![-1]]), Status::Unsat);
    }

    #[test]
    fn test_empty_problem() {
        assert_eq!(solve_slice(&[]), Status::Sat);
    }

    #[test]
    fn test_all_units_unsat() {
        assert_eq!(
            solve_slice(&[vec![1, 2, 3], vec![-1], vec![-2], vec![-3]]),
            Status::Unsat
        );
    }

    #[test]
    fn test_small_sat_with_model() {
        let cnf = vec![
            vec![1],
            vec![-2, 3],
            vec![-2, 4],
            vec![-5, 3],
            vec![-5, 6],
            vec![-7, 3],
            vec![-7, 8],
            vec![-9, 10],
            vec![-9, 4],
            vec![-1, 10],
            vec![-1, 6],
            vec![3, 10],
            vec![-3, -10],
            vec![4, 6, 8],
        ];
        let pb = Problem::parse_slice(&cnf).unwrap();
        let mut s = Solver::new(pb);
        assert_eq!(s.solve(), Status::Sat);
        let model = s.model().unwrap();
        for clause in &cnf {
            assert!(
                clause.iter().any(|&l| {
                    let v = l.unsigned_abs() as usize - 1;
                    (l > 0) == model[v]
                }),
                "model does not satisfy {clause:?}"
            );
        }
    }

    #[test]
    fn test_card_pigeons() {
        // Four pigeons in three holes, as cardinality constraints.
        let mut constrs = Vec::new();
        for p in 0..4 {
            let hole_lits: Vec<i32> = (1..=3).map(|h| p * 3 + h).collect();
            constrs.push(CardConstr::at_least1(&hole_lits));
            constrs.push(CardConstr::at_most1(&hole_lits));
        }
        for h in 1..=3 {
            let pigeon_lits: Vec<i32> = (0..4).map(|p| p * 3 + h).collect();
            constrs.push(CardConstr::at_most1(&pigeon_lits));
        }
        let pb = Problem::parse_card_constrs(&constrs);
        assert_eq!(Solver::new(pb).solve(), Status::Unsat);
    }

    #[test]
    fn test_card_sat_with_model() {
        let constrs = vec![
            CardConstr::at_least(&[1, 2, 3], 3),
            CardConstr::at_least(&[2, 3, -4], 2),
            CardConstr::at_least1(&[-1, -4]),
        ];
        let pb = Problem::parse_card_constrs(&constrs);
        let mut s = Solver::new(pb);
        assert_eq!(s.solve(), Status::Sat);
        let model = s.model().unwrap();
        assert!(model[0] && model[1] && model[2] && !model[3]);
    }

    #[test]
    fn test_pb_pigeons() {
        // The same pigeonhole instance, in PB form.
        let mut constrs = Vec::new();
        for p in 0..4 {
            let hole_lits: Vec<i32> = (1..=3).map(|h| p * 3 + h).collect();
            constrs.push(PbConstr::gt_eq(&hole_lits, &[1, 1, 1], 1));
            let neg: Vec<i32> = hole_lits.iter().map(|&l| -l).collect();
            constrs.push(PbConstr::gt_eq(&neg, &[1, 1, 1], 2));
        }
        for h in 1..=3 {
            let neg: Vec<i32> = (0..4).map(|p| -(p * 3 + h)).collect();
            constrs.push(PbConstr::gt_eq(&neg, &[1, 1, 1, 1], 3));
        }
        let pb = Problem::parse_pb_constrs(&constrs);
        assert_eq!(Solver::new(pb).solve(), Status::Unsat);
    }

    #[test]
    fn test_pb_weighted_sat() {
        // 3 x1 + 2 x2 + x3 >= 4 with x1 forbidden: x2 and x3 must hold.
        let constrs = vec![
            PbConstr::gt_eq(&[1, 2, 3], &[3, 2, 1], 4),
            PbConstr::prop_clause(&[-1]),
        ];
        let pb = Problem::parse_pb_constrs(&constrs);
        let mut s = Solver::new(pb);
        assert_eq!(s.solve(), Status::Sat);
        let model = s.model().unwrap();
        assert!(!model[0] && model[1] && model[2]);
    }

    #[test]
    fn test_count_models() {
        let constrs = vec![
            CardConstr::at_least1(&[1, 2, 3]),
            CardConstr::at_least1(&[-1, -2, -3]),
            CardConstr::at_least1(&[2, 3, 4]),
            CardConstr::at_least1(&[2, 3, 5]),
            CardConstr::at_least1(&[3, 4, 5]),
            CardConstr::at_least1(&[2, 4, 5]),
        ];
        let pb = Problem::parse_card_constrs(&constrs);
        let mut s = Solver::new(pb);
        assert_eq!(s.count_models().unwrap(), 17);
    }

    #[test]
    fn test_enumerate_streams_models() {
        let constrs = vec![
            CardConstr::at_least1(&[1, 2, 3]),
            CardConstr::at_least1(&[-1, -2, -3]),
            CardConstr::at_least1(&[2, 3, 4]),
            CardConstr::at_least1(&[2, 3, 5]),
            CardConstr::at_least1(&[3, 4, 5]),
            CardConstr::at_least1(&[2, 4, 5]),
        ];
        let pb = Problem::parse_card_constrs(&constrs);
        let mut s = Solver::new(pb);
        let (tx, rx) = std::sync::mpsc::channel();
        let handle = std::thread::spawn(move || s.enumerate(Some(tx), None).unwrap());
        let received: Vec<Vec<bool>> = rx.into_iter().collect();
        assert_eq!(handle.join().unwrap(), 17);
        assert_eq!(received.len(), 17);
    }

    #[test]
    fn test_enumerate_free_variables() {
        // One clause over 2 vars out of 3: 3 models of the clause times 2.
        let pb = Problem::parse_slice_nb(&[vec![1, 2]], 3).unwrap();
        let mut s = Solver::new(pb);
        assert_eq!(s.count_models().unwrap(), 6);
    }

    #[test]
    fn test_enumerate_rejected_on_optim() {
        let mut pb = Problem::parse_slice(&[vec![1, 2]]).unwrap();
        pb.set_cost_func(vec![Lit::from_dimacs(1)], None);
        let mut s = Solver::new(pb);
        assert!(matches!(s.count_models(), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_model_before_solve_is_protocol_error() {
        let pb = Problem::parse_slice(&[vec![1, 2]]).unwrap();
        let s = Solver::new(pb);
        assert!(matches!(s.model(), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_minimize_decision_problem() {
        let pb = Problem::parse_slice(&[vec![1, 2]]).unwrap();
        let mut s = Solver::new(pb);
        assert_eq!(s.minimize(), 0);
    }

    #[test]
    fn test_minimize_unsat() {
        let pb = Problem::parse_slice(&[vec![1], vec![-1]]).unwrap();
        let mut s = Solver::new(pb);
        assert_eq!(s.minimize(), -1);
    }

    #[test]
    fn test_minimize_weighted() {
        // Exactly one of x1 x2 x3; costs 3, 2, 1: optimum picks x3.
        let mut constrs: Vec<PbConstr> = Vec::new();
        for c in CardConstr::exactly1(&[1, 2, 3]) {
            constrs.push(PbConstr {
                lits: c.lits,
                weights: None,
                at_least: c.at_least as Weight,
            });
        }
        let mut pb = Problem::parse_pb_constrs(&constrs);
        pb.set_cost_func(
            vec![
                Lit::from_dimacs(1),
                Lit::from_dimacs(2),
                Lit::from_dimacs(3),
            ],
            Some(vec![3, 2, 1]),
        );
        let mut s = Solver::new(pb);
        assert_eq!(s.minimize(), 1);
        let model = s.model().unwrap();
        assert!(!model[0] && !model[1] && model[2]);
    }

    #[test]
    fn test_optimal_streams_decreasing_costs() {
        let mut constrs: Vec<PbConstr> = Vec::new();
        for c in CardConstr::exactly1(&[1, 2, 3]) {
            constrs.push(PbConstr {
                lits: c.lits,
                weights: None,
                at_least: c.at_least as Weight,
            });
        }
        let mut pb = Problem::parse_pb_constrs(&constrs);
        pb.set_cost_func(
            vec![
                Lit::from_dimacs(1),
                Lit::from_dimacs(2),
                Lit::from_dimacs(3),
            ],
            Some(vec![3, 2, 1]),
        );
        let mut s = Solver::new(pb);
        let (tx, rx) = std::sync::mpsc::channel();
        let handle = std::thread::spawn(move || s.optimal(Some(tx), None));
        let results: Vec<SolveResult> = rx.into_iter().collect();
        let res = handle.join().unwrap();
        assert_eq!(res.status, Status::Sat);
        assert_eq!(res.cost, 1);
        assert_eq!(results.last().unwrap().cost, 1);
        for pair in results.windows(2) {
            assert!(pair[1].cost < pair[0].cost, "streamed costs must decrease");
        }
    }

    #[test]
    fn test_assume() {
        let pb = Problem::parse_slice(&[vec![1, 2], vec![-1, 2]]).unwrap();
        let mut s = Solver::new(pb);
        assert_eq!(s.solve(), Status::Sat);
        assert_eq!(s.assume(&[Lit::from_dimacs(-2)]), Status::Unsat);
    }

    #[test]
    fn test_append_clause_then_resolve() {
        let pb = Problem::parse_slice(&[vec![1, 2]]).unwrap();
        let mut s = Solver::new(pb);
        assert_eq!(s.solve(), Status::Sat);
        s.append_clause(Clause::from_dimacs(&[-1]));
        s.append_clause(Clause::from_dimacs(&[-2]));
        assert_eq!(s.solve(), Status::Unsat);
    }

    #[test]
    fn test_solve_is_idempotent() {
        let cnf = vec![vec![1, 2], vec![-1, 3], vec![-3, -2]];
        let pb = Problem::parse_slice(&cnf).unwrap();
        let mut s = Solver::new(pb.clone());
        let first = s.solve();
        let mut s2 = Solver::new(pb);
        assert_eq!(first, s2.solve());
    }
}
