//! The canonical collection of LR states, built one unit of work at a time.

use crate::{
    error::{Error, FatalInvariantError, SequencingCondition},
    grammar::{Grammar, RuleID, SymbolID},
    item::{ClosureStep, ItemKind, LRItem, LRItemSet},
    lalr::{MergeStep, PropagationPass, RecloseStep, RewriteStep, SpontaneousStep},
    session::Context,
    types::Map,
    util::display_fn,
};
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct StateID {
    raw: usize,
}

impl StateID {
    pub const START: Self = Self::new(0);

    pub(crate) const fn new(raw: usize) -> Self {
        Self { raw }
    }

    pub const fn raw(self) -> usize {
        self.raw
    }
}

impl fmt::Display for StateID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.raw, f)
    }
}

/// The construction algorithm of the automaton.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Algorithm {
    LR0,
    LR1,
    /// LALR(1) by propagating lookaheads over the LR(0) automaton.
    LALRFromLR0,
    /// LALR(1) by merging the states of the canonical LR(1) automaton.
    LALRFromLR1,
}

impl Algorithm {
    /// The kind of items the canonical collection is built from.
    pub fn item_kind(self) -> ItemKind {
        match self {
            Self::LR0 | Self::LALRFromLR0 => ItemKind::LR0,
            Self::LR1 | Self::LALRFromLR1 => ItemKind::LR1,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LR0 => f.write_str("LR(0)"),
            Self::LR1 => f.write_str("LR(1)"),
            Self::LALRFromLR0 => f.write_str("LALR(1) over LR(0)"),
            Self::LALRFromLR1 => f.write_str("LALR(1) from LR(1)"),
        }
    }
}

/// What the next call to `Automaton::step` will do.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Expand one item of the current state's closure.
    Closure,
    /// Coalesce the current state's items that share a core.
    MergeLookaheads,
    /// Compute the successors of the current state.
    Goto,
    /// Merge one pair of LR(1) states with equal cores.
    MergeStates,
    /// Point the transitions at the surviving states.
    RewriteTransitions,
    /// Find the spontaneous lookaheads and propagation edges of one state.
    Spontaneous,
    /// Run one propagation pass over every edge.
    Propagate,
    /// Recompute the closure of one state from its final kernel.
    Reclose,
    Done,
}

/// The successors found by one GOTO step.
#[derive(Debug, Clone)]
pub struct GotoStep {
    pub state: StateID,
    /// `(symbol, target, whether the target was created by this step)`.
    pub transitions: Vec<(SymbolID, StateID, bool)>,
}

/// The outcome of `Automaton::step`.
#[derive(Debug, Clone)]
pub enum AutomatonStep {
    Closure { state: StateID, step: ClosureStep },
    MergeLookaheads { state: StateID, removed: usize },
    Goto(GotoStep),
    MergeStates(MergeStep),
    RewriteTransitions(RewriteStep),
    Spontaneous(SpontaneousStep),
    Propagate(PropagationPass),
    Reclose(RecloseStep),
    /// The construction had already finished. Nothing changed.
    Finished,
}

#[derive(Debug, Clone)]
pub(crate) struct Slot {
    pub(crate) state: LRItemSet,
    pub(crate) live: bool,
}

/// A stable-id arena of states and the transitions between them.
///
/// Merged states stay in the arena as tombstones so that state ids never
/// change. Lookups through `resolve` follow the redirection map.
#[derive(Debug, Clone)]
pub struct Automaton {
    pub(crate) algorithm: Algorithm,
    pub(crate) slots: Vec<Slot>,
    pub(crate) transitions: Map<(StateID, SymbolID), StateID>,
    pub(crate) transition_rules: Map<(StateID, SymbolID), RuleID>,
    pub(crate) effects: Map<(StateID, usize), Vec<(StateID, usize)>>,
    pub(crate) redirects: Map<StateID, StateID>,
    pub(crate) ptr: usize,
    pub(crate) phase: Phase,
    pub(crate) merge_cursor: usize,
    pub(crate) passes: usize,
}

impl Automaton {
    /// Create an automaton holding just the start state.
    pub fn new(ctx: &Context, algorithm: Algorithm) -> Self {
        let start = LRItemSet::new(
            StateID::START,
            vec![LRItem::start(algorithm.item_kind())],
            ctx.grammar(),
        );
        Self {
            algorithm,
            slots: vec![Slot {
                state: start,
                live: true,
            }],
            transitions: Map::default(),
            transition_rules: Map::default(),
            effects: Map::default(),
            redirects: Map::default(),
            ptr: 0,
            phase: Phase::Closure,
            merge_cursor: 0,
            passes: 0,
        }
    }

    /// Build the whole automaton at once.
    #[tracing::instrument(skip_all, fields(algorithm = %algorithm))]
    pub fn build(ctx: &Context, algorithm: Algorithm) -> Result<Self, Error> {
        let mut automaton = Self::new(ctx, algorithm);
        let steps = automaton.run(ctx)?;
        tracing::debug!(steps, states = automaton.num_states(), "automaton built");
        Ok(automaton)
    }

    /// Step until the construction finishes. Returns the number of steps taken.
    pub fn run(&mut self, ctx: &Context) -> Result<usize, Error> {
        let mut steps = 0;
        while !self.is_done() {
            self.step(ctx)?;
            steps += 1;
        }
        Ok(steps)
    }

    /// Perform exactly one unit of work.
    pub fn step(&mut self, ctx: &Context) -> Result<AutomatonStep, Error> {
        match self.phase {
            Phase::Closure => {
                let kind = self.algorithm.item_kind();
                let id = StateID::new(self.ptr);
                let state = self.live_state_mut(id)?;
                let step = state.closure_step(ctx, kind)?;
                if state.is_closure_done() {
                    self.phase = match kind {
                        ItemKind::LR0 => Phase::Goto,
                        ItemKind::LR1 => Phase::MergeLookaheads,
                    };
                }
                Ok(AutomatonStep::Closure { state: id, step })
            }
            Phase::MergeLookaheads => {
                let id = StateID::new(self.ptr);
                let removed = self.live_state_mut(id)?.merge_lookaheads();
                self.phase = Phase::Goto;
                Ok(AutomatonStep::MergeLookaheads { state: id, removed })
            }
            Phase::Goto => self.goto_step(ctx).map(AutomatonStep::Goto),
            Phase::MergeStates => match self.merge_step()? {
                Some(step) => Ok(AutomatonStep::MergeStates(step)),
                None => self.step(ctx),
            },
            Phase::RewriteTransitions => self
                .rewrite_transitions()
                .map(AutomatonStep::RewriteTransitions),
            Phase::Spontaneous => self.spontaneous_step(ctx).map(AutomatonStep::Spontaneous),
            Phase::Propagate => self.propagation_pass().map(AutomatonStep::Propagate),
            Phase::Reclose => self.reclose_step(ctx).map(AutomatonStep::Reclose),
            Phase::Done => Ok(AutomatonStep::Finished),
        }
    }

    /// Compute the successor states of the current state.
    pub fn goto_step(&mut self, ctx: &Context) -> Result<GotoStep, Error> {
        self.expect_phase(Phase::Goto)?;
        let g = ctx.grammar();
        let kind = self.algorithm.item_kind();
        let id = StateID::new(self.ptr);

        // Partition the items by the symbol after the dot, keeping the
        // rule that wins each transition.
        let mut successors: Map<SymbolID, (Vec<LRItem>, RuleID)> = Map::default();
        for item in self.live_state(id)?.closure() {
            let symbol = match item.next_symbol(g) {
                Some(symbol) => symbol,
                None => continue,
            };
            let (kernel, winner) = successors
                .entry(symbol)
                .or_insert_with(|| (vec![], item.rule()));
            kernel.push(item.advance());
            if g.rule(item.rule()).outranks(g.rule(*winner)) {
                *winner = item.rule();
            }
        }

        let mut transitions = Vec::with_capacity(successors.len());
        for (symbol, (kernel, rule)) in successors {
            let (target, created) = match self.find_state(&kernel, kind) {
                Some(target) => (target, false),
                None => {
                    let target = StateID::new(self.slots.len());
                    self.slots.push(Slot {
                        state: LRItemSet::new(target, kernel, g),
                        live: true,
                    });
                    (target, true)
                }
            };
            self.transitions.insert((id, symbol), target);
            self.transition_rules.insert((id, symbol), rule);
            transitions.push((symbol, target, created));
        }

        tracing::trace!(state = %id, successors = transitions.len(), "goto step");

        self.ptr += 1;
        self.enter_state();

        Ok(GotoStep {
            state: id,
            transitions,
        })
    }

    fn find_state(&self, kernel: &[LRItem], kind: ItemKind) -> Option<StateID> {
        self.slots
            .iter()
            .find(|slot| slot.live && slot.state.kernel_eq(kernel, kind))
            .map(|slot| slot.state.id())
    }

    /// Move on to the state under the pointer, or to the phase that follows
    /// the canonical collection once every state has been expanded.
    fn enter_state(&mut self) {
        match self.slots.get(self.ptr) {
            Some(slot) if slot.state.is_closure_done() => self.phase = Phase::Goto,
            Some(..) => self.phase = Phase::Closure,
            None => {
                tracing::debug!(
                    algorithm = %self.algorithm,
                    states = self.slots.len(),
                    "canonical collection finished"
                );
                match self.algorithm {
                    Algorithm::LR0 | Algorithm::LR1 => self.phase = Phase::Done,
                    Algorithm::LALRFromLR1 => self.start_merging(),
                    Algorithm::LALRFromLR0 => self.start_propagation(),
                }
            }
        }
    }

    pub(crate) fn expect_phase(&self, expected: Phase) -> Result<(), SequencingCondition> {
        if self.phase != expected {
            return Err(SequencingCondition::PhaseMismatch {
                expected,
                actual: self.phase,
            });
        }
        Ok(())
    }

    pub(crate) fn expect_algorithm(&self, expected: Algorithm) -> Result<(), SequencingCondition> {
        if self.algorithm != expected {
            return Err(SequencingCondition::WrongAlgorithm {
                expected,
                actual: self.algorithm,
            });
        }
        Ok(())
    }

    pub(crate) fn live_state(&self, id: StateID) -> Result<&LRItemSet, FatalInvariantError> {
        match self.slots.get(id.raw) {
            Some(slot) if slot.live => Ok(&slot.state),
            _ => Err(FatalInvariantError::DeadState(id)),
        }
    }

    pub(crate) fn live_state_mut(
        &mut self,
        id: StateID,
    ) -> Result<&mut LRItemSet, FatalInvariantError> {
        match self.slots.get_mut(id.raw) {
            Some(slot) if slot.live => Ok(&mut slot.state),
            _ => Err(FatalInvariantError::DeadState(id)),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    /// The index of the state the construction is working on.
    pub fn pointer(&self) -> usize {
        self.ptr
    }

    /// Iterate over the live states in id order.
    pub fn states(&self) -> impl Iterator<Item = &LRItemSet> + '_ {
        self.slots
            .iter()
            .filter(|slot| slot.live)
            .map(|slot| &slot.state)
    }

    pub fn state(&self, id: StateID) -> Option<&LRItemSet> {
        self.live_state(id).ok()
    }

    pub fn num_states(&self) -> usize {
        self.slots.iter().filter(|slot| slot.live).count()
    }

    pub fn transitions(&self) -> impl Iterator<Item = (StateID, SymbolID, StateID)> + '_ {
        self.transitions
            .iter()
            .map(|((source, symbol), target)| (*source, *symbol, *target))
    }

    pub fn transition(&self, state: StateID, symbol: SymbolID) -> Option<StateID> {
        self.transitions.get(&(state, symbol)).copied()
    }

    /// The rule that justifies the transition.
    pub fn transition_rule(&self, state: StateID, symbol: SymbolID) -> Option<RuleID> {
        self.transition_rules.get(&(state, symbol)).copied()
    }

    /// Lookahead propagation edges between kernel items, as
    /// `(state, kernel index)` pairs.
    pub fn effects(&self) -> impl Iterator<Item = ((StateID, usize), &[(StateID, usize)])> + '_ {
        self.effects
            .iter()
            .map(|(source, targets)| (*source, &targets[..]))
    }

    /// Follow the redirections left by merged states.
    pub fn resolve(&self, id: StateID) -> StateID {
        resolve(&self.redirects, id)
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            for (i, state) in self.states().enumerate() {
                if i > 0 {
                    writeln!(f)?;
                }
                write!(f, "{}", state.display(g))?;
                writeln!(f, "## transitions")?;
                for (source, symbol, target) in self.transitions() {
                    if source == state.id() {
                        writeln!(f, "- {} => {:02}", g.symbol_name(symbol), target)?;
                    }
                }
            }
            Ok(())
        })
    }
}

pub(crate) fn resolve(redirects: &Map<StateID, StateID>, mut id: StateID) -> StateID {
    while let Some(next) = redirects.get(&id) {
        id = *next;
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{SymbolID::*, TerminalID};
    use std::rc::Rc;

    fn parens() -> Context {
        // S → ( S ) | a
        let grammar = Grammar::define(|g| {
            let lparen = g.terminal("(")?;
            let rparen = g.terminal(")")?;
            let a = g.terminal("a")?;
            let s = g.nonterminal("S")?;
            g.rule(s, [T(lparen), N(s), T(rparen)], None)?;
            g.rule(s, [T(a)], None)?;
            Ok(())
        })
        .unwrap();
        Context::new(Rc::new(grammar))
    }

    #[test]
    fn smoketest() {
        let _ = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .try_init();

        let ctx = parens();
        for algorithm in [
            Algorithm::LR0,
            Algorithm::LR1,
            Algorithm::LALRFromLR0,
            Algorithm::LALRFromLR1,
        ] {
            let automaton = Automaton::build(&ctx, algorithm).unwrap();
            eprintln!("{}:\n{}", algorithm, automaton.display(ctx.grammar()));
            assert!(automaton.is_done());
        }
    }

    #[test]
    fn state_counts() {
        let ctx = parens();
        let lr0 = Automaton::build(&ctx, Algorithm::LR0).unwrap();
        let lr1 = Automaton::build(&ctx, Algorithm::LR1).unwrap();
        assert_eq!(lr0.num_states(), 6);
        // Every state under `(` is split by the lookahead `)`.
        assert_eq!(lr1.num_states(), 10);
    }

    #[test]
    fn first_steps_are_observable() {
        let ctx = parens();
        let mut automaton = Automaton::new(&ctx, Algorithm::LR0);
        assert_eq!(automaton.phase(), Phase::Closure);

        for _ in 0..3 {
            let step = automaton.step(&ctx).unwrap();
            assert!(matches!(
                step,
                AutomatonStep::Closure {
                    state: StateID::START,
                    step: ClosureStep::Expanded { .. },
                }
            ));
        }
        assert_eq!(automaton.phase(), Phase::Goto);

        let step = match automaton.step(&ctx).unwrap() {
            AutomatonStep::Goto(step) => step,
            step => panic!("unexpected step: {:?}", step),
        };
        assert_eq!(step.state, StateID::START);
        assert_eq!(step.transitions.len(), 3);
        assert!(step.transitions.iter().all(|(_, _, created)| *created));
        assert_eq!(automaton.num_states(), 4);
        assert_eq!(automaton.pointer(), 1);

        // `S` leads to the end state, which is born closed.
        let end = automaton.state(StateID::new(1)).unwrap();
        assert!(end.is_end());
        assert_eq!(automaton.phase(), Phase::Goto);
    }

    #[test]
    fn kernels_are_unique() {
        let ctx = parens();
        for algorithm in [Algorithm::LR0, Algorithm::LR1] {
            let automaton = Automaton::build(&ctx, algorithm).unwrap();
            let kind = algorithm.item_kind();
            let states: Vec<_> = automaton.states().collect();
            for (i, x) in states.iter().enumerate() {
                assert!(x.kernel_eq(x.kernel(), kind));
                for y in &states[i + 1..] {
                    assert_eq!(
                        x.kernel_eq(y.kernel(), kind),
                        y.kernel_eq(x.kernel(), kind)
                    );
                    assert!(!x.kernel_eq(y.kernel(), kind));
                }
            }
        }
    }

    #[test]
    fn steps_after_done() {
        let ctx = parens();
        let mut automaton = Automaton::build(&ctx, Algorithm::LR1).unwrap();
        assert!(matches!(
            automaton.step(&ctx).unwrap(),
            AutomatonStep::Finished
        ));
        assert!(matches!(
            automaton.goto_step(&ctx),
            Err(Error::Sequencing(SequencingCondition::PhaseMismatch { .. }))
        ));
    }

    #[test]
    fn transition_rules_prefer_priority() {
        let mut ids = None;
        let grammar = Grammar::define(|g| {
            let a = g.terminal("a")?;
            let b = g.terminal("b")?;
            let s = g.nonterminal("S")?;
            let low = g.rule(s, [T(a), T(b)], Some(1))?;
            let later = g.rule(s, [T(a)], None)?;
            ids = Some((a, low, later));
            Ok(())
        })
        .unwrap();
        let (a, low, later) = ids.unwrap();
        let ctx = Context::new(Rc::new(grammar));

        let automaton = Automaton::build(&ctx, Algorithm::LR0).unwrap();
        assert_eq!(automaton.transition_rule(StateID::START, T(a)), Some(low));
        assert_ne!(automaton.transition_rule(StateID::START, T(a)), Some(later));
        assert!(automaton.transition(StateID::START, T(TerminalID::EOI)).is_none());
    }
}
