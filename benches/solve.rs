//! Criterion benchmarks over classic hard instances.

use cardinal::sat::{CardConstr, PbConstr, Problem, Solver};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// Pigeonhole: `pigeons` pigeons into `pigeons - 1` holes, as cardinality
/// constraints. Unsatisfiable, and exponentially hard for resolution.
fn pigeonhole_card(pigeons: i32) -> Vec<CardConstr> {
    let holes = pigeons - 1;
    let mut constrs = Vec::new();
    for p in 0..pigeons {
        let lits: Vec<i32> = (1..=holes).map(|h| p * holes + h).collect();
        constrs.push(CardConstr::at_least1(&lits));
        constrs.push(CardConstr::at_most1(&lits));
    }
    for h in 1..=holes {
        let lits: Vec<i32> = (0..pigeons).map(|p| p * holes + h).collect();
        constrs.push(CardConstr::at_most1(&lits));
    }
    constrs
}

/// The same instance in PB form, which lets the cutting-planes analysis
/// shine.
fn pigeonhole_pb(pigeons: i32) -> Vec<PbConstr> {
    pigeonhole_card(pigeons)
        .into_iter()
        .map(|c| PbConstr {
            at_least: c.at_least as i64,
            lits: c.lits,
            weights: None,
        })
        .collect()
}

/// A chain of exclusive-or constraints in CNF, satisfiable.
fn xor_chain(n: i32) -> Vec<Vec<i32>> {
    let mut cnf = vec![vec![1]];
    for i in 1..n {
        cnf.push(vec![-i, -(i + 1)]);
        cnf.push(vec![i, i + 1]);
    }
    cnf
}

fn bench_pigeonhole(c: &mut Criterion) {
    c.bench_function("pigeonhole 6 card", |b| {
        b.iter(|| {
            let pb = Problem::parse_card_constrs(black_box(&pigeonhole_card(6)));
            Solver::new(pb).solve()
        });
    });
    c.bench_function("pigeonhole 6 pb", |b| {
        b.iter(|| {
            let pb = Problem::parse_pb_constrs(black_box(&pigeonhole_pb(6)));
            Solver::new(pb).solve()
        });
    });
}

fn bench_xor_chain(c: &mut Criterion) {
    c.bench_function("xor chain 200", |b| {
        b.iter(|| {
            let pb = Problem::parse_slice(black_box(&xor_chain(200))).unwrap();
            Solver::new(pb).solve()
        });
    });
}

criterion_group!(benches, bench_pigeonhole, bench_xor_chain);
criterion_main!(benches);
