//! ACTION/GOTO tables and conflict resolution.

use crate::{
    automaton::{Algorithm, Automaton, StateID},
    error::{Error, SequencingCondition},
    grammar::{Grammar, NonterminalID, RuleID, SymbolID, TerminalID},
    session::Context,
    types::{Map, Queue},
    util::display_fn,
};
use std::{cmp::Ordering, collections::BTreeMap, fmt, rc::Rc};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    Shift(StateID),
    Reduce(RuleID),
    Goto(StateID),
    Accept,
}

impl Action {
    /// The short form used in table cells: `s3`, `r2`, `g4`, `acc`.
    pub fn label(&self) -> String {
        match self {
            Self::Shift(n) => format!("s{}", n),
            Self::Reduce(r) => format!("r{}", r.raw()),
            Self::Goto(n) => format!("g{}", n),
            Self::Accept => "acc".into(),
        }
    }

    fn relabel(self, map: &Map<StateID, StateID>) -> Self {
        let relabel = |id: StateID| map.get(&id).copied().unwrap_or(id);
        match self {
            Self::Shift(n) => Self::Shift(relabel(n)),
            Self::Goto(n) => Self::Goto(relabel(n)),
            action => action,
        }
    }
}

/// An action together with the rule that justifies it.
///
/// Shift and Goto actions are justified by the rule that won their
/// transition; Reduce and Accept actions by the rule being reduced.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Entry {
    pub action: Action,
    pub rule: RuleID,
}

/// A single rule of the conflict resolution policy.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TieBreak {
    /// The higher rule priority wins.
    Priority,
    /// Between rules of the same priority and the same left-hand side, the
    /// later declared one wins.
    Order,
    /// A Shift wins over a Reduce.
    ShiftOverReduce,
    /// The lower rule id wins.
    LowestRuleId,
}

/// The tie-break rules, consulted in order until one of them decides.
pub const POLICY: [TieBreak; 4] = [
    TieBreak::Priority,
    TieBreak::Order,
    TieBreak::ShiftOverReduce,
    TieBreak::LowestRuleId,
];

impl TieBreak {
    /// `Ordering::Less` means that `a` ranks before `b`.
    pub fn compare(self, g: &Grammar, a: &Entry, b: &Entry) -> Ordering {
        let (ra, rb) = (g.rule(a.rule), g.rule(b.rule));
        match self {
            Self::Priority => rb.priority().cmp(&ra.priority()),
            Self::Order if ra.priority() == rb.priority() && ra.left() == rb.left() => {
                rb.order().cmp(&ra.order())
            }
            Self::Order => Ordering::Equal,
            Self::ShiftOverReduce => match (a.action, b.action) {
                (Action::Shift(..), Action::Reduce(..)) => Ordering::Less,
                (Action::Reduce(..), Action::Shift(..)) => Ordering::Greater,
                _ => Ordering::Equal,
            },
            Self::LowestRuleId => a.rule.cmp(&b.rule),
        }
    }
}

/// Rank two entries by the whole policy.
pub fn rank(g: &Grammar, a: &Entry, b: &Entry) -> Ordering {
    POLICY
        .iter()
        .map(|rule| rule.compare(g, a, b))
        .find(|ord| ord.is_ne())
        .unwrap_or(Ordering::Equal)
}

#[derive(Debug)]
pub struct ParseTable {
    grammar: Rc<Grammar>,
    algorithm: Algorithm,
    states: Vec<StateID>,
    actions: Map<(StateID, TerminalID), Vec<Entry>>,
    gotos: Map<(StateID, NonterminalID), Vec<Entry>>,
    conflict: bool,
}

impl ParseTable {
    /// Build the tables from a finished automaton.
    #[tracing::instrument(skip_all, fields(algorithm = %automaton.algorithm()))]
    pub fn build(automaton: &Automaton, ctx: &Context) -> Result<Self, Error> {
        if !automaton.is_done() {
            return Err(SequencingCondition::AutomatonNotDone.into());
        }
        let g = ctx.grammar();

        let mut table = Self {
            grammar: ctx.grammar_rc().clone(),
            algorithm: automaton.algorithm(),
            states: automaton.states().map(|state| state.id()).collect(),
            actions: Map::default(),
            gotos: Map::default(),
            conflict: false,
        };

        for (source, symbol, target) in automaton.transitions() {
            let rule = automaton
                .transition_rule(source, symbol)
                .unwrap_or(RuleID::ACCEPT);
            match symbol {
                SymbolID::T(t) => table.insert_action(
                    source,
                    t,
                    Entry {
                        action: Action::Shift(target),
                        rule,
                    },
                ),
                SymbolID::N(n) => table.insert_goto(
                    source,
                    n,
                    Entry {
                        action: Action::Goto(target),
                        rule,
                    },
                ),
            }
        }

        for state in automaton.states() {
            for item in state.closure().iter().filter(|item| item.is_end(g)) {
                let rule = item.rule();
                if g.rule(rule).left() == NonterminalID::START {
                    table.insert_action(
                        state.id(),
                        TerminalID::EOI,
                        Entry {
                            action: Action::Accept,
                            rule,
                        },
                    );
                    continue;
                }

                let entry = Entry {
                    action: Action::Reduce(rule),
                    rule,
                };
                match (automaton.algorithm(), item.lookaheads()) {
                    (Algorithm::LR0, _) | (_, None) => {
                        for t in g.input_terminals() {
                            table.insert_action(state.id(), t, entry);
                        }
                    }
                    (_, Some(lookaheads)) => {
                        for t in lookaheads.iter().filter(|t| *t != TerminalID::PROPAGATE) {
                            table.insert_action(state.id(), t, entry);
                        }
                    }
                }
            }
        }

        tracing::debug!(
            states = table.states.len(),
            actions = table.actions.len(),
            gotos = table.gotos.len(),
            conflict = table.conflict,
            "parse table built"
        );

        Ok(table)
    }

    fn insert_action(&mut self, state: StateID, terminal: TerminalID, entry: Entry) {
        let cell = self.actions.entry((state, terminal)).or_default();
        if insert_ranked(&self.grammar, cell, entry) {
            tracing::debug!(%state, terminal = %self.grammar.terminal(terminal), "conflict");
            self.conflict = true;
        }
    }

    fn insert_goto(&mut self, state: StateID, symbol: NonterminalID, entry: Entry) {
        let cell = self.gotos.entry((state, symbol)).or_default();
        if insert_ranked(&self.grammar, cell, entry) {
            self.conflict = true;
        }
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn initial_state(&self) -> StateID {
        StateID::START
    }

    pub fn states(&self) -> &[StateID] {
        &self.states
    }

    /// Whether some cell holds more than one action.
    pub fn has_conflict(&self) -> bool {
        self.conflict
    }

    /// The highest ranked action in the cell.
    pub fn get(&self, state: StateID, terminal: TerminalID) -> Option<&Action> {
        self.actions
            .get(&(state, terminal))
            .and_then(|cell| cell.first())
            .map(|entry| &entry.action)
    }

    pub fn goto(&self, state: StateID, symbol: NonterminalID) -> Option<StateID> {
        match self.gotos.get(&(state, symbol))?.first()?.action {
            Action::Goto(target) => Some(target),
            _ => None,
        }
    }

    /// Every entry of an ACTION cell, best first.
    pub fn action_cell(&self, state: StateID, terminal: TerminalID) -> &[Entry] {
        self.actions
            .get(&(state, terminal))
            .map_or(&[], |cell| &cell[..])
    }

    pub fn goto_cell(&self, state: StateID, symbol: NonterminalID) -> &[Entry] {
        self.gotos.get(&(state, symbol)).map_or(&[], |cell| &cell[..])
    }

    /// The terminals that have an action in `state`.
    pub fn expected(&self, state: StateID) -> impl Iterator<Item = TerminalID> + '_ {
        self.actions
            .iter()
            .filter(move |((s, _), cell)| *s == state && !cell.is_empty())
            .map(|((_, t), _)| *t)
    }

    /// The tables with states renumbered in breadth-first order from the
    /// initial state, visiting successors by symbol.
    pub fn normalized(&self) -> NormalizedTable {
        let mut successors: Map<StateID, BTreeMap<SymbolID, StateID>> = Map::default();
        for ((state, t), cell) in &self.actions {
            if let Some(Entry {
                action: Action::Shift(target),
                ..
            }) = cell.first()
            {
                successors
                    .entry(*state)
                    .or_default()
                    .insert(SymbolID::T(*t), *target);
            }
        }
        for ((state, n), cell) in &self.gotos {
            if let Some(Entry {
                action: Action::Goto(target),
                ..
            }) = cell.first()
            {
                successors
                    .entry(*state)
                    .or_default()
                    .insert(SymbolID::N(*n), *target);
            }
        }

        let mut relabel: Map<StateID, StateID> = Map::default();
        let mut queue: Queue<StateID> = Some(self.initial_state()).into_iter().collect();
        while let Some(state) = queue.pop() {
            relabel.insert(state, StateID::new(relabel.len()));
            for target in successors.get(&state).into_iter().flat_map(|s| s.values()) {
                queue.push(*target);
            }
        }

        let cells = |cell: &Vec<Entry>| -> Vec<Action> {
            cell.iter().map(|entry| entry.action.relabel(&relabel)).collect()
        };
        let rel = |state: &StateID| relabel.get(state).copied().unwrap_or(*state);
        NormalizedTable {
            actions: self
                .actions
                .iter()
                .map(|((state, t), cell)| ((rel(state), *t), cells(cell)))
                .collect(),
            gotos: self
                .gotos
                .iter()
                .map(|((state, n), cell)| ((rel(state), *n), cells(cell)))
                .collect(),
        }
    }

    /// Render the tables as a grid: one row per state, one column per input
    /// terminal followed by one per nonterminal. Cells list every action,
    /// best first, separated by `/`.
    pub fn display(&self) -> impl fmt::Display + '_ {
        display_fn(move |f| {
            let g = &*self.grammar;
            writeln!(f, "#### {} parse table", self.algorithm)?;
            if self.conflict {
                writeln!(f, "## conflicts detected")?;
            }

            let terminals: Vec<_> = g.input_terminals().collect();
            let nonterminals: Vec<_> = g
                .nonterminals
                .keys()
                .copied()
                .filter(|n| *n != NonterminalID::START)
                .collect();

            let join = |cell: &[Entry]| -> String {
                let labels: Vec<_> = cell.iter().map(|entry| entry.action.label()).collect();
                labels.join("/")
            };
            let mut rows = vec![];
            let mut header = vec!["state".to_owned()];
            header.extend(terminals.iter().map(|t| g.terminal(*t).to_string()));
            header.extend(nonterminals.iter().map(|n| g.nonterminal(*n).to_string()));
            rows.push(header);
            for state in &self.states {
                let mut row = vec![state.to_string()];
                row.extend(terminals.iter().map(|t| join(self.action_cell(*state, *t))));
                row.extend(nonterminals.iter().map(|n| join(self.goto_cell(*state, *n))));
                rows.push(row);
            }

            let mut widths = vec![0; rows[0].len()];
            for row in &rows {
                for (width, cell) in widths.iter_mut().zip(row) {
                    *width = (*width).max(cell.chars().count());
                }
            }
            for row in &rows {
                let mut line = String::new();
                for (width, cell) in widths.iter().zip(row) {
                    line.push_str(&format!("| {:<width$} ", cell, width = *width));
                }
                writeln!(f, "{}|", line)?;
            }
            Ok(())
        })
    }
}

/// Insert `entry` behind every entry that ranks before or equal to it.
/// Returns whether the cell was already occupied by a different action.
fn insert_ranked(g: &Grammar, cell: &mut Vec<Entry>, entry: Entry) -> bool {
    if cell.iter().any(|e| e.action == entry.action) {
        return false;
    }
    let occupied = !cell.is_empty();
    let position = cell
        .iter()
        .position(|e| rank(g, &entry, e) == Ordering::Less)
        .unwrap_or(cell.len());
    cell.insert(position, entry);
    occupied
}

/// A parse table with canonical state numbers, comparable across
/// construction algorithms.
#[derive(Debug, PartialEq, Eq)]
pub struct NormalizedTable {
    pub actions: BTreeMap<(StateID, TerminalID), Vec<Action>>,
    pub gotos: BTreeMap<(StateID, NonterminalID), Vec<Action>>,
}
