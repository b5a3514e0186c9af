//! Calculation of first set function.

use crate::{
    grammar::{Grammar, NonterminalID, SymbolID, TerminalSet},
    types::{Map, Set},
};

/// The sizes of the sets at the end of one pass.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PassSizes {
    pub nullables: usize,
    pub first: usize,
}

#[derive(Debug)]
pub struct FirstSets {
    nullables: Set<NonterminalID>,
    first_sets: Map<NonterminalID, TerminalSet>,
    passes: Vec<PassSizes>,
}

impl FirstSets {
    /// Compute the nullable set and the FIRST sets of every nonterminal.
    ///
    /// Each iteration is a single pass over all rules; the loop stops at the
    /// first pass in which no set grows.
    #[tracing::instrument(skip_all)]
    pub fn new(grammar: &Grammar) -> Self {
        let mut nullables = Set::default();
        let mut first_sets: Map<NonterminalID, TerminalSet> = grammar
            .nonterminals
            .keys()
            .map(|n| (*n, TerminalSet::default()))
            .collect();

        let mut passes = vec![];
        let mut changed = true;
        while changed {
            changed = false;

            for rule in grammar.rules.values() {
                if rule
                    .right()
                    .iter()
                    .all(|s| matches!(s, SymbolID::N(n) if nullables.contains(n)))
                {
                    changed |= nullables.insert(rule.left());
                }

                // First(X) ⊇ First(Yi) while Y1 ... Y(i-1) are all nullable.
                let mut added = TerminalSet::default();
                for symbol in rule.right() {
                    match symbol {
                        SymbolID::T(t) => {
                            added.insert(*t);
                            break;
                        }
                        SymbolID::N(n) => {
                            if let Some(first) = first_sets.get(n) {
                                added.union_with(first);
                            }
                            if !nullables.contains(n) {
                                break;
                            }
                        }
                    }
                }
                if let Some(first) = first_sets.get_mut(&rule.left()) {
                    if !first.is_superset(&added) {
                        first.union_with(&added);
                        changed = true;
                    }
                }
            }

            let sizes = PassSizes {
                nullables: nullables.len(),
                first: first_sets.values().map(TerminalSet::len).sum(),
            };
            passes.push(sizes);
            tracing::trace!(
                iterations = passes.len(),
                nullables = sizes.nullables,
                first = sizes.first,
                "first sets pass"
            );
        }

        Self {
            nullables,
            first_sets,
            passes,
        }
    }

    pub fn is_nullable(&self, symbol: NonterminalID) -> bool {
        self.nullables.contains(&symbol)
    }

    pub fn nullables(&self) -> impl Iterator<Item = NonterminalID> + '_ {
        self.nullables.iter().copied()
    }

    /// `First(N)`. The empty string is never a member; see `is_nullable`.
    pub fn first(&self, symbol: NonterminalID) -> Option<&TerminalSet> {
        self.first_sets.get(&symbol)
    }

    /// The number of passes the fixpoint took, including the final one
    /// that observed no change.
    pub fn iterations(&self) -> usize {
        self.passes.len()
    }

    /// The set sizes after each pass, in order.
    pub fn passes(&self) -> &[PassSizes] {
        &self.passes
    }

    /// `First(seq a)` for every `a` in `lookaheads`.
    pub fn first_seq(&self, seq: &[SymbolID], lookaheads: &TerminalSet) -> TerminalSet {
        let mut res = TerminalSet::default();
        for symbol in seq {
            match symbol {
                SymbolID::T(t) => {
                    res.insert(*t);
                    return res;
                }
                SymbolID::N(n) => {
                    if let Some(first) = self.first_sets.get(n) {
                        res.union_with(first);
                    }
                    if !self.nullables.contains(n) {
                        return res;
                    }
                }
            }
        }
        res.union_with(lookaheads);
        res
    }
}
