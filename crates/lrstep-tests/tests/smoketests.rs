use lrstep::{
    error::{ConstructionError, SequencingCondition},
    first_sets::FirstSets,
    grammar::{Grammar, GrammarDef},
    interpreter::{ParseStep, Token, TokenStream},
    item::ClosureStep,
    loader,
    table::Action,
    Algorithm, Automaton, AutomatonStep, Config, Context, Error, Interpreter, ParseTable,
    Session, StateID,
};
use lrstep_tests::grammars;
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

const ALGORITHMS: [Algorithm; 4] = [
    Algorithm::LR0,
    Algorithm::LR1,
    Algorithm::LALRFromLR0,
    Algorithm::LALRFromLR1,
];

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn context(f: grammars::Fixture) -> anyhow::Result<Context> {
    let grammar = Grammar::define(f)?;
    Ok(Context::new(Rc::new(grammar)))
}

fn table(ctx: &Context, algorithm: Algorithm) -> anyhow::Result<ParseTable> {
    let automaton = Automaton::build(ctx, algorithm)?;
    Ok(ParseTable::build(&automaton, ctx)?)
}

fn tokens(input: &[(&str, &str)]) -> Vec<Token> {
    input.iter().map(|(kind, value)| Token::new(*kind, *value)).collect()
}

fn parse(table: &ParseTable, input: &[(&str, &str)]) -> anyhow::Result<String> {
    let mut parser = Interpreter::new(table, TokenStream::from_tokens(tokens(input)));
    Ok(parser.run()?.to_string())
}

#[test]
fn smoketest_all_grammars() -> anyhow::Result<()> {
    init_tracing();

    for (name, f) in grammars::ALL {
        let ctx = context(*f)?;
        eprintln!("grammar {}:\n{}", name, ctx.grammar());

        let mut automata = vec![];
        for algorithm in ALGORITHMS {
            let automaton = Automaton::build(&ctx, algorithm)?;
            assert!(automaton.is_done(), "{}: {}", name, algorithm);
            automata.push(automaton);
        }
        let [lr0, lr1, lalr_from_lr0, lalr_from_lr1] = &automata[..] else {
            unreachable!()
        };

        assert!(lr0.num_states() <= lr1.num_states(), "{}", name);
        assert_eq!(
            lalr_from_lr0.num_states(),
            lalr_from_lr1.num_states(),
            "{}",
            name
        );
        assert_eq!(lalr_from_lr0.num_states(), lr0.num_states(), "{}", name);

        let t0 = ParseTable::build(lalr_from_lr0, &ctx)?;
        let t1 = ParseTable::build(lalr_from_lr1, &ctx)?;
        eprintln!("LALR(1) table:\n{}", t0.display());
        assert_eq!(t0.normalized(), t1.normalized(), "{}", name);
    }

    Ok(())
}

#[test]
fn kernels_of_live_states_are_unique() -> anyhow::Result<()> {
    for (name, f) in grammars::ALL {
        let ctx = context(*f)?;
        for algorithm in ALGORITHMS {
            let automaton = Automaton::build(&ctx, algorithm)?;
            let kind = algorithm.item_kind();
            let states: Vec<_> = automaton.states().collect();
            for (i, x) in states.iter().enumerate() {
                assert!(x.kernel_eq(x.kernel(), kind));
                for y in &states[i + 1..] {
                    assert!(
                        !x.kernel_eq(y.kernel(), kind),
                        "{} ({}): states {} and {} share a kernel",
                        name,
                        algorithm,
                        x.id(),
                        y.id()
                    );
                    assert_eq!(x.kernel_eq(y.kernel(), kind), y.kernel_eq(x.kernel(), kind));
                }
            }
        }
    }
    Ok(())
}

#[test]
fn closure_of_closed_state() -> anyhow::Result<()> {
    let ctx = context(grammars::parens)?;
    let automaton = Automaton::build(&ctx, Algorithm::LR1)?;
    let mut state = automaton
        .state(StateID::START)
        .cloned()
        .expect("start state");
    let before = state.closure().to_vec();

    let step = state.closure_step(&ctx, Algorithm::LR1.item_kind())?;
    assert!(matches!(step, ClosureStep::AlreadyComputed));
    assert_eq!(state.closure(), &before[..]);
    Ok(())
}

#[test]
fn steps_after_done_are_finished() -> anyhow::Result<()> {
    let ctx = context(grammars::c_s_d)?;
    for algorithm in ALGORITHMS {
        let mut automaton = Automaton::new(&ctx, algorithm);
        let steps = automaton.run(&ctx)?;
        assert!(steps > 0);
        let num_states = automaton.num_states();
        assert!(matches!(automaton.step(&ctx)?, AutomatonStep::Finished));
        assert_eq!(automaton.num_states(), num_states);
    }
    Ok(())
}

#[test]
fn first_sets_converge() -> anyhow::Result<()> {
    for (name, f) in grammars::ALL {
        let ctx = context(*f)?;
        let g = ctx.grammar();
        let first_sets = FirstSets::new(g);
        let bound = (g.terminals.len() + g.nonterminals.len()) * g.rules.len();
        assert!(first_sets.iterations() <= bound, "{}", name);

        let passes = first_sets.passes();
        for pair in passes.windows(2) {
            assert!(pair[0].nullables <= pair[1].nullables, "{}", name);
            assert!(pair[0].first <= pair[1].first, "{}", name);
        }
        let last = passes.last().expect("at least one pass");
        assert_eq!(last.nullables, first_sets.nullables().count(), "{}", name);
    }
    Ok(())
}

#[test]
fn parens() -> anyhow::Result<()> {
    init_tracing();
    let ctx = context(grammars::parens)?;
    for algorithm in ALGORITHMS {
        let table = table(&ctx, algorithm)?;
        assert!(!table.has_conflict(), "{}", algorithm);
        let tree = parse(&table, &[("(", "("), ("a", "a"), (")", ")")])?;
        assert_eq!(tree, r#"S("(", S("a"), ")")"#, "{}", algorithm);
    }
    Ok(())
}

#[test]
fn c_s_d() -> anyhow::Result<()> {
    let ctx = context(grammars::c_s_d)?;
    let input = [("c", "c"), ("c", "c"), ("d", "d")];

    for algorithm in [Algorithm::LR1, Algorithm::LALRFromLR0, Algorithm::LALRFromLR1] {
        let table = table(&ctx, algorithm)?;
        assert!(!table.has_conflict(), "{}", algorithm);
        assert_eq!(parse(&table, &input)?, r#"S("c", S("c"), "d")"#);
    }

    // LR(0) reduces `S -> c` on every terminal, including `c`.
    let lr0 = table(&ctx, Algorithm::LR0)?;
    assert!(lr0.has_conflict());
    Ok(())
}

#[test]
fn pointers() -> anyhow::Result<()> {
    let ctx = context(grammars::pointers)?;
    let input = [("*", "*"), ("id", "p"), ("=", "="), ("id", "q")];

    assert!(table(&ctx, Algorithm::LR0)?.has_conflict());
    for algorithm in [Algorithm::LR1, Algorithm::LALRFromLR0, Algorithm::LALRFromLR1] {
        let table = table(&ctx, algorithm)?;
        assert!(!table.has_conflict(), "{}", algorithm);
        assert_eq!(
            parse(&table, &input)?,
            r#"S(L("*", R(L("p"))), "=", R(L("q")))"#
        );
    }
    Ok(())
}

#[test]
fn arithmetic() -> anyhow::Result<()> {
    let ctx = context(grammars::g_simple2)?;
    let table = table(&ctx, Algorithm::LALRFromLR0)?;
    assert!(!table.has_conflict());

    let tree = parse(
        &table,
        &[("NUM", "1"), ("PLUS", "+"), ("NUM", "2"), ("STAR", "*"), ("NUM", "3")],
    )?;
    assert_eq!(
        tree,
        r#"EXPR(EXPR(FACTOR(TERM("1"))), "+", FACTOR(FACTOR(TERM("2")), "*", TERM("3")))"#
    );
    Ok(())
}

#[test]
fn epsilon_reduce() -> anyhow::Result<()> {
    let ctx = context(grammars::epsilon)?;
    for algorithm in ALGORITHMS {
        let table = table(&ctx, algorithm)?;
        let mut parser = Interpreter::new(&table, TokenStream::from_tokens(tokens(&[("a", "a")])));
        loop {
            let before = parser.value_stack().len();
            match parser.step()? {
                ParseStep::Reduce { popped: 0, node, .. } => {
                    assert_eq!(parser.value_stack().len(), before + 1);
                    assert!(node.children().is_empty());
                }
                ParseStep::Accept => break,
                _ => (),
            }
        }
        assert_eq!(parser.tree().map(|t| t.to_string()).as_deref(), Some(r#"S(A(), "a")"#));
    }
    Ok(())
}

#[test]
fn unexpected_token() -> anyhow::Result<()> {
    let ctx = context(grammars::parens)?;
    let table = table(&ctx, Algorithm::LR1)?;
    let mut parser = Interpreter::new(
        &table,
        TokenStream::from_tokens(tokens(&[("(", "("), ("a", "a"), ("a", "x")])),
    );
    let err = parser.run().unwrap_err();
    match err {
        Error::Parse(lrstep::error::ParseError::UnexpectedToken {
            value, expected, ..
        }) => {
            assert_eq!(value, "x");
            assert_eq!(expected, [")"]);
        }
        err => panic!("unexpected error: {}", err),
    }
    Ok(())
}

#[test]
fn dangling_else() -> anyhow::Result<()> {
    let ctx = context(grammars::dangling_else)?;
    let else_ = ctx.grammar().terminal_by_name("else").expect("else");
    let input = [("if", "if"), ("if", "if"), ("x", "x"), ("else", "else"), ("x", "x")];

    for algorithm in [Algorithm::LR1, Algorithm::LALRFromLR0, Algorithm::LALRFromLR1] {
        let table = table(&ctx, algorithm)?;
        assert!(table.has_conflict(), "{}", algorithm);

        let conflicting: Vec<_> = table
            .states()
            .iter()
            .filter(|state| table.action_cell(**state, else_).len() > 1)
            .collect();
        assert!(!conflicting.is_empty(), "{}", algorithm);
        for state in conflicting {
            assert!(
                matches!(table.get(*state, else_), Some(Action::Shift(..))),
                "{}: state {}",
                algorithm,
                state
            );
        }

        assert_eq!(
            parse(&table, &input)?,
            r#"S("if", S("if", S("x"), "else", S("x")))"#,
            "{}",
            algorithm
        );
    }
    Ok(())
}

#[test]
fn prioritized_operators() -> anyhow::Result<()> {
    let ctx = context(grammars::prioritized)?;
    let input = [
        ("a", "a"),
        ("+", "+"),
        ("a", "a"),
        ("*", "*"),
        ("a", "a"),
        ("+", "+"),
        ("a", "a"),
    ];

    for algorithm in [Algorithm::LR1, Algorithm::LALRFromLR0, Algorithm::LALRFromLR1] {
        let table = table(&ctx, algorithm)?;
        assert!(table.has_conflict(), "{}", algorithm);
        assert_eq!(
            parse(&table, &input)?,
            r#"E(E("a"), "+", E(E(E("a"), "*", E("a")), "+", E("a")))"#,
            "{}",
            algorithm
        );
    }
    Ok(())
}

#[test]
fn reduce_reduce_prefers_lowest_rule() -> anyhow::Result<()> {
    let ctx = context(grammars::g2)?;
    assert!(!table(&ctx, Algorithm::LR1)?.has_conflict());

    for algorithm in [Algorithm::LALRFromLR0, Algorithm::LALRFromLR1] {
        let table = table(&ctx, algorithm)?;
        assert!(table.has_conflict(), "{}", algorithm);

        let mut found = 0;
        for state in table.states() {
            for t in ctx.grammar().input_terminals() {
                let cell = table.action_cell(*state, t);
                if cell.len() < 2 || !cell.iter().all(|e| matches!(e.action, Action::Reduce(..))) {
                    continue;
                }
                found += 1;
                let lowest = cell.iter().map(|e| e.rule).min().expect("non-empty cell");
                assert_eq!(cell[0].rule, lowest, "{}: state {}", algorithm, state);
                assert_eq!(table.get(*state, t), Some(&Action::Reduce(lowest)));
            }
        }
        assert!(found > 0, "{}", algorithm);
    }
    Ok(())
}

#[test]
fn hash_terminal() -> anyhow::Result<()> {
    let ctx = context(grammars::hash)?;
    for algorithm in [Algorithm::LR1, Algorithm::LALRFromLR0, Algorithm::LALRFromLR1] {
        let table = table(&ctx, algorithm)?;
        assert!(!table.has_conflict(), "{}", algorithm);
        assert_eq!(parse(&table, &[("#", "#")])?, r##"start("#")"##, "{}", algorithm);
        assert_eq!(
            parse(&table, &[("#", "#"), ("#", "#")])?,
            r##"start("#", start("#"))"##,
            "{}",
            algorithm
        );
    }
    Ok(())
}

#[test]
fn missing_start_rule() {
    let err = Grammar::define(|g: &mut GrammarDef| {
        let a = g.terminal("a")?;
        let s = g.nonterminal("S")?;
        let t = g.nonterminal("T")?;
        g.rule(t, [lrstep::grammar::SymbolID::T(a)], None)?;
        g.start_symbol(s)?;
        Ok(())
    })
    .unwrap_err();
    assert!(matches!(err, ConstructionError::StartSymbolNotFound { .. }));
}

#[test]
fn stream_without_end_marker() -> anyhow::Result<()> {
    let ctx = context(grammars::parens)?;
    let table = table(&ctx, Algorithm::LR1)?;
    let mut parser = Interpreter::new(&table, TokenStream::raw(tokens(&[("a", "a")])));
    assert!(matches!(parser.step()?, ParseStep::Shift { pending: None, .. }));
    assert!(matches!(
        parser.step(),
        Err(Error::Sequencing(SequencingCondition::TokenExhausted { index: 1 }))
    ));
    Ok(())
}

const RULES: &str = r#"[
    {
        "origin": { "__type__": "NonTerminal", "name": "start" },
        "expansion": [
            { "__type__": "NonTerminal", "name": "start" },
            { "__type__": "Terminal", "name": "PLUS" },
            { "__type__": "NonTerminal", "name": "atom" }
        ]
    },
    {
        "origin": { "__type__": "NonTerminal", "name": "start" },
        "expansion": [{ "__type__": "NonTerminal", "name": "atom" }]
    },
    {
        "origin": { "__type__": "NonTerminal", "name": "atom" },
        "expansion": [{ "__type__": "Terminal", "name": "NUMBER" }],
        "priority": 1
    }
]"#;

const TOKENS: &str = r#"[
    { "type": "NUMBER", "value": "1", "start_pos": 0, "line": 1, "column": 1 },
    { "type": "PLUS", "value": "+", "start_pos": 2, "line": 1, "column": 3 },
    { "type": "NUMBER", "value": "2", "start_pos": 4, "line": 1, "column": 5 }
]"#;

#[test]
fn session_from_json() -> anyhow::Result<()> {
    init_tracing();
    let records = loader::rules_from_json(RULES)?;

    for algorithm in ALGORITHMS {
        let mut config = Config::new();
        config.algorithm(algorithm);
        let mut session = Session::from_records(&records, config)?;

        let mut steps = 0;
        while !session.automaton().is_done() {
            session.step_automaton()?;
            steps += 1;
        }
        assert!(steps >= session.automaton().num_states());

        session.build_table()?;
        session.load_tokens(loader::tokens_from_json(TOKENS)?)?;
        loop {
            match session.step_parse()? {
                ParseStep::Accept => break,
                ParseStep::Shift { token, .. } => assert!(token.line.is_some()),
                ParseStep::Reduce { .. } => (),
            }
        }
        let tree = session
            .interpreter()
            .and_then(|parser| parser.tree())
            .map(|tree| tree.to_string());
        assert_eq!(
            tree.as_deref(),
            Some(r#"start(start(atom("1")), "+", atom("2"))"#)
        );
        let err = session.step_parse().unwrap_err();
        assert!(err.is_sequencing(), "{}", err);
    }
    Ok(())
}

#[test]
fn session_with_unknown_start() -> anyhow::Result<()> {
    let records = loader::rules_from_json(RULES)?;
    let mut config = Config::new();
    config.start_symbol("expr");
    assert!(matches!(
        Session::from_records(&records, config),
        Err(ConstructionError::StartSymbolNotFound { .. })
    ));
    Ok(())
}
