use criterion::{criterion_group, criterion_main, Criterion};
use lrstep::{Algorithm, Automaton, Context, Grammar, ParseTable};
use lrstep_tests::grammars::{self, Fixture};
use std::{hint::black_box, rc::Rc};

criterion_main!(benches);
criterion_group!(benches, bench_simple, bench_lalr);

fn bench_simple(c: &mut Criterion) {
    bench_table_gen(c, "g_simple1", grammars::g_simple1);
    bench_table_gen(c, "g_simple2", grammars::g_simple2);
}

fn bench_lalr(c: &mut Criterion) {
    bench_table_gen(c, "g1", grammars::g1);
    bench_table_gen(c, "g2", grammars::g2);
    bench_table_gen(c, "g4", grammars::g4);
    bench_table_gen(c, "pointers", grammars::pointers);
}

fn bench_table_gen(c: &mut Criterion, name: &str, f: Fixture) {
    let grammar = Grammar::define(f).expect("invalid grammar");
    let ctx = Context::new(Rc::new(grammar));
    for algorithm in [
        Algorithm::LR0,
        Algorithm::LR1,
        Algorithm::LALRFromLR0,
        Algorithm::LALRFromLR1,
    ] {
        c.bench_function(&format!("{}/{:?}", name, algorithm), |b| {
            b.iter(|| {
                let automaton = Automaton::build(&ctx, algorithm).unwrap();
                black_box(ParseTable::build(&automaton, &ctx).unwrap())
            });
        });
    }
}
