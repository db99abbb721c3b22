#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Watcher lists: the per-literal indices that drive propagation, plus the
//! clause arena they point into.
//!
//! Each literal `l` owns three lists keyed by `¬l` — a clause appears in the
//! lists of the literals whose falsification requires re-examining it:
//! - `wlist_bin`: binary clauses, each entry carrying the other literal so
//!   most propagations never touch the clause itself;
//! - `wlist`: longer propositional clauses, watched by their first two
//!   literals, with a blocking literal per entry;
//! - `wlist_pb`: cardinality and PB constraints. A cardinality-`k`
//!   constraint is watched by its first `k + 1` literals; a PB constraint by
//!   a prefix whose weight sum covers `cardinality + max watched weight`.
//!
//! Clauses live in a slot arena. References are plain indices and stay
//! stable for the lifetime of a clause; the learnt-reduction pass is the
//! only reclaimer, pushing freed slots onto a free list for reuse.

use crate::sat::clause::Clause;
use crate::sat::literal::Lit;
use std::ops::{Index, IndexMut};

/// Maximum number of learned clauses kept at first.
const INIT_NB_MAX_CLAUSES: usize = 2000;
/// By how much the learned-clause cap grows after each reduction.
const INCR_NB_MAX_CLAUSES: usize = 300;
/// Extra cap growth when the learned set is too good to halve.
const INCR_POSTPONE_NB_MAX: usize = 1000;

/// A stable reference to a clause in the arena.
pub type ClauseRef = usize;

/// One watch entry: the clause plus a blocking literal from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watcher {
    /// Another literal from the clause. If it is already true the clause is
    /// satisfied and needs no further inspection.
    pub other: Lit,
    pub cref: ClauseRef,
}

/// The three watch lanes and the clause arena.
#[derive(Debug, Clone, Default)]
pub struct WatcherList {
    /// Max number of learned clauses at the current moment.
    pub nb_max: usize,
    /// Number of calls to reduce, plus one.
    pub idx_reduce: usize,
    wlist_bin: Vec<Vec<Watcher>>,
    wlist: Vec<Vec<Watcher>>,
    wlist_pb: Vec<Vec<ClauseRef>>,
    clauses: Vec<Clause>,
    free: Vec<ClauseRef>,
    /// Problem clauses, in insertion order.
    orig: Vec<ClauseRef>,
    /// Learned clauses currently alive.
    learned: Vec<ClauseRef>,
}

impl WatcherList {
    /// Builds the lists for `nb_vars` variables and installs the problem
    /// clauses.
    #[must_use]
    pub fn new(nb_vars: usize, clauses: Vec<Clause>) -> Self {
        let mut wl = Self {
            nb_max: INIT_NB_MAX_CLAUSES,
            idx_reduce: 1,
            wlist_bin: vec![Vec::new(); nb_vars * 2],
            wlist: vec![Vec::new(); nb_vars * 2],
            wlist_pb: vec![Vec::new(); nb_vars * 2],
            clauses: Vec::with_capacity(clauses.len()),
            free: Vec::new(),
            orig: Vec::with_capacity(clauses.len()),
            learned: Vec::new(),
        };
        for clause in clauses {
            let cref = wl.alloc(clause);
            wl.orig.push(cref);
            wl.watch_clause(cref);
        }
        wl
    }

    fn alloc(&mut self, clause: Clause) -> ClauseRef {
        if let Some(cref) = self.free.pop() {
            self.clauses[cref] = clause;
            cref
        } else {
            self.clauses.push(clause);
            self.clauses.len() - 1
        }
    }

    #[must_use]
    pub fn nb_learned(&self) -> usize {
        self.learned.len()
    }

    #[must_use]
    pub fn nb_orig(&self) -> usize {
        self.orig.len()
    }

    pub fn learned_refs(&self) -> impl Iterator<Item = ClauseRef> + '_ {
        self.learned.iter().copied()
    }

    pub fn orig_refs(&self) -> impl Iterator<Item = ClauseRef> + '_ {
        self.orig.iter().copied()
    }

    /// Appends a problem clause (not a learned one) and watches it. The
    /// caller is responsible for top-level Sat/Unit/Unsat handling.
    pub fn append_clause(&mut self, clause: Clause) -> ClauseRef {
        let cref = self.alloc(clause);
        self.orig.push(cref);
        self.watch_clause(cref);
        cref
    }

    /// Adds a learned clause and watches it.
    pub fn add_learned(&mut self, clause: Clause) -> ClauseRef {
        debug_assert!(clause.learned());
        let cref = self.alloc(clause);
        self.learned.push(cref);
        self.watch_clause(cref);
        cref
    }

    /// Routes the clause into the correct lane and seats its watches.
    fn watch_clause(&mut self, cref: ClauseRef) {
        let c = &self.clauses[cref];
        if c.is_pseudo_boolean() {
            self.watch_pb(cref);
        } else if c.cardinality() > 1 {
            // Watched by its first cardinality + 1 literals: it becomes unit
            // once all but cardinality of them are false.
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let n = c.cardinality() as usize + 1;
            for i in 0..n {
                let neg = self.clauses[cref].get(i).negated();
                self.wlist_pb[neg.index()].push(cref);
            }
        } else if c.len() == 2 {
            let first = c.first();
            let second = c.second();
            self.wlist_bin[first.negated().index()].push(Watcher {
                cref,
                other: second,
            });
            self.wlist_bin[second.negated().index()].push(Watcher {
                cref,
                other: first,
            });
        } else {
            let first = c.first();
            let second = c.second();
            self.wlist[first.negated().index()].push(Watcher {
                cref,
                other: second,
            });
            self.wlist[second.negated().index()].push(Watcher {
                cref,
                other: first,
            });
        }
    }

    /// Seats the watches of a PB constraint: literals are ordered by
    /// decreasing weight, so watching the prefix whose weight sum reaches
    /// `max_weight + cardinality` guarantees a propagation or conflict
    /// cannot be missed.
    fn watch_pb(&mut self, cref: ClauseRef) {
        let goal = self.clauses[cref].weight(0) + self.clauses[cref].cardinality();
        let mut sum = 0;
        let mut i = 0;
        while sum < goal && i < self.clauses[cref].len() {
            let lit = self.clauses[cref].get(i);
            self.wlist_pb[lit.negated().index()].push(cref);
            self.clauses[cref].set_watched(i, true);
            sum += self.clauses[cref].weight(i);
            i += 1;
        }
    }

    /// Removes a learned clause's watch entries. Learned clauses are
    /// propositional, and the reduce pass never selects binary ones, so only
    /// the non-binary lane needs cleaning.
    fn unwatch_learned(&mut self, cref: ClauseRef) {
        for i in 0..2 {
            let neg = self.clauses[cref].get(i).negated();
            let list = &mut self.wlist[neg.index()];
            let pos = list
                .iter()
                .position(|w| w.cref == cref)
                .expect("learned clause missing from its watch list");
            list.swap_remove(pos);
        }
    }

    /// Grows the learned cap. Called after each reduction.
    pub fn bump_nb_max(&mut self) {
        self.nb_max += INCR_NB_MAX_CLAUSES;
    }

    /// Grows the learned cap further, when so many good clauses are alive
    /// that reducing now would throw away useful work.
    pub fn postpone_nb_max(&mut self) {
        self.nb_max += INCR_POSTPONE_NB_MAX;
    }

    /// Removes roughly the worse half of the learned clauses.
    ///
    /// Learned clauses are sorted by LBD descending (ties broken by lower
    /// activity first) and the first half is discarded, skipping clauses
    /// that are locked (currently a reason on the trail) or of LBD ≤ 2.
    /// When the median LBD is ≤ 3 the cap additionally grows so the next
    /// reduction comes later. Returns the number of clauses deleted.
    pub fn reduce(&mut self) -> usize {
        if self.learned.is_empty() {
            return 0;
        }
        let clauses = &self.clauses;
        self.learned.sort_by(|&a, &b| {
            let (ca, cb) = (&clauses[a], &clauses[b]);
            cb.lbd()
                .cmp(&ca.lbd())
                .then_with(|| ca.activity().partial_cmp(&cb.activity()).unwrap_or(std::cmp::Ordering::Equal))
        });
        let nb_learned = self.learned.len();
        let half = nb_learned / 2;
        if self.clauses[self.learned[half]].lbd() <= 3 {
            // Lots of good clauses: postpone reduction.
            self.postpone_nb_max();
        }
        let mut nb_removed = 0;
        for i in 0..half {
            let cref = self.learned[i];
            if self.clauses[cref].lbd() <= 2 || self.clauses[cref].is_locked() {
                continue;
            }
            nb_removed += 1;
            self.learned[i] = self.learned[nb_learned - nb_removed];
            self.unwatch_learned(cref);
            self.clauses[cref] = Clause::default();
            self.free.push(cref);
        }
        self.learned.truncate(nb_learned - nb_removed);
        nb_removed
    }

    pub(crate) fn bin_watchers(&self, lit: Lit) -> &[Watcher] {
        &self.wlist_bin[lit.index()]
    }

    pub(crate) fn take_watchers(&mut self, lit: Lit) -> Vec<Watcher> {
        std::mem::take(&mut self.wlist[lit.index()])
    }

    pub(crate) fn restore_watchers(&mut self, lit: Lit, mut list: Vec<Watcher>) {
        // Relocations during processing can never target this literal (its
        // negation is false), so the slot is still empty.
        debug_assert!(self.wlist[lit.index()].is_empty());
        std::mem::swap(&mut self.wlist[lit.index()], &mut list);
    }

    pub(crate) fn push_watcher(&mut self, lit: Lit, w: Watcher) {
        self.wlist[lit.index()].push(w);
    }

    pub(crate) fn take_pb_watchers(&mut self, lit: Lit) -> Vec<ClauseRef> {
        std::mem::take(&mut self.wlist_pb[lit.index()])
    }

    pub(crate) fn restore_pb_watchers(&mut self, lit: Lit, mut list: Vec<ClauseRef>) {
        debug_assert!(self.wlist_pb[lit.index()].is_empty());
        std::mem::swap(&mut self.wlist_pb[lit.index()], &mut list);
    }

    pub(crate) fn push_pb_watcher(&mut self, lit: Lit, cref: ClauseRef) {
        self.wlist_pb[lit.index()].push(cref);
    }

    /// Removes `cref` from the PB lane of `lit`. The entry must be present.
    pub(crate) fn remove_pb_watcher(&mut self, lit: Lit, cref: ClauseRef) {
        let list = &mut self.wlist_pb[lit.index()];
        let pos = list
            .iter()
            .position(|&c| c == cref)
            .expect("constraint missing from its PB watch list");
        list.swap_remove(pos);
    }
}

impl Index<ClauseRef> for WatcherList {
    type Output = Clause;

    fn index(&self, cref: ClauseRef) -> &Clause {
        &self.clauses[cref]
    }
}

impl IndexMut<ClauseRef> for WatcherList {
    fn index_mut(&mut self, cref: ClauseRef) -> &mut Clause {
        &mut self.clauses[cref]
    }
}
