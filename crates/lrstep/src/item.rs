//! LR items and item sets.

use crate::{
    automaton::StateID,
    error::{ConstructionError, Error},
    grammar::{Grammar, NonterminalID, RuleID, SymbolID, TerminalID, TerminalSet},
    session::Context,
    types::Map,
    util::{display_fn, write_joined},
};
use std::fmt;

/// Which flavour of items an operation works on.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ItemKind {
    /// Items without lookaheads. Items are identified by their core.
    LR0,
    /// Items carrying a set of lookahead terminals.
    LR1,
}

/// A production paired with a dot, and optionally a set of lookaheads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LRItem {
    rule: RuleID,
    index: usize,
    lookaheads: Option<TerminalSet>,
}

impl LRItem {
    pub fn new(
        g: &Grammar,
        rule: RuleID,
        index: usize,
        lookaheads: Option<TerminalSet>,
    ) -> Result<Self, ConstructionError> {
        let len = g
            .rules
            .get(&rule)
            .ok_or(ConstructionError::UnknownRule(rule))?
            .right()
            .len();
        if index > len {
            return Err(ConstructionError::ItemIndexOutOfRange { rule, index, len });
        }
        Ok(Self {
            rule,
            index,
            lookaheads,
        })
    }

    pub(crate) fn start(kind: ItemKind) -> Self {
        Self {
            rule: RuleID::ACCEPT,
            index: 0,
            lookaheads: match kind {
                ItemKind::LR0 => None,
                ItemKind::LR1 => Some([TerminalID::EOI].into_iter().collect()),
            },
        }
    }

    pub fn rule(&self) -> RuleID {
        self.rule
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn lookaheads(&self) -> Option<&TerminalSet> {
        self.lookaheads.as_ref()
    }

    pub(crate) fn lookaheads_mut(&mut self) -> Option<&mut TerminalSet> {
        self.lookaheads.as_mut()
    }

    pub fn kind(&self) -> ItemKind {
        match self.lookaheads {
            Some(..) => ItemKind::LR1,
            None => ItemKind::LR0,
        }
    }

    /// The LR(0) core of this item.
    pub fn core(&self) -> (RuleID, usize) {
        (self.rule, self.index)
    }

    /// LR(0) equality: the rule and the dot position match.
    pub fn core_eq(&self, other: &Self) -> bool {
        self.core() == other.core()
    }

    /// LR(1) equality, checking that both items are of the same kind.
    pub fn eq_with(&self, other: &Self) -> Result<bool, ConstructionError> {
        self.check_kind(other)?;
        Ok(self == other)
    }

    /// The cores match and this item's lookaheads cover the other's.
    pub fn includes(&self, other: &Self) -> Result<bool, ConstructionError> {
        self.check_kind(other)?;
        Ok(self.core_eq(other)
            && match (&self.lookaheads, &other.lookaheads) {
                (Some(x), Some(y)) => x.is_superset(y),
                _ => true,
            })
    }

    fn check_kind(&self, other: &Self) -> Result<(), ConstructionError> {
        if self.kind() != other.kind() {
            return Err(ConstructionError::ItemKindMismatch);
        }
        Ok(())
    }

    /// Return the symbol right after the dot, if any.
    pub fn next_symbol(&self, g: &Grammar) -> Option<SymbolID> {
        g.rule(self.rule).right().get(self.index).copied()
    }

    pub fn is_end(&self, g: &Grammar) -> bool {
        self.index >= g.rule(self.rule).right().len()
    }

    /// The item with its dot moved one symbol to the right.
    pub(crate) fn advance(&self) -> Self {
        Self {
            rule: self.rule,
            index: self.index + 1,
            lookaheads: self.lookaheads.clone(),
        }
    }

    pub(crate) fn merge_lookaheads_from(&mut self, other: &Self) {
        if let (Some(x), Some(y)) = (&mut self.lookaheads, &other.lookaheads) {
            x.union_with(y);
        }
    }

    /// Convert an LR(0) item into an LR(1) item with empty lookaheads.
    pub(crate) fn promote(&mut self) {
        self.lookaheads.get_or_insert_with(TerminalSet::default);
    }

    // `"[S -> ( · S ) ; $END )]"`
    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            let rule = g.rule(self.rule);
            write!(f, "[{} ->", g.nonterminal(rule.left()))?;
            for (i, symbol) in rule.right().iter().enumerate() {
                if i == self.index {
                    f.write_str(" ·")?;
                }
                write!(f, " {}", g.symbol_name(*symbol))?;
            }
            if self.index == rule.right().len() {
                f.write_str(" ·")?;
            }
            if let Some(lookaheads) = &self.lookaheads {
                f.write_str(" ; ")?;
                write_joined(f, " ", lookaheads.iter().map(|t| g.terminal(t)))?;
            }
            f.write_str("]")
        })
    }
}

/// Whether a closure step found an item for the first time.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Discovery {
    Added,
    Present,
}

/// The outcome of a single closure step.
#[derive(Debug, Clone)]
pub enum ClosureStep {
    /// One closure item was processed.
    Expanded {
        item: LRItem,
        discovered: Vec<(LRItem, Discovery)>,
    },
    /// The closure was complete before this call. Nothing changed.
    AlreadyComputed,
}

/// A parser state.
#[derive(Debug, Clone)]
pub struct LRItemSet {
    id: StateID,
    kernel: Vec<LRItem>,
    closure: Vec<LRItem>,
    search_index: usize,
    closure_done: bool,
    accepting: bool,
    end: bool,
}

impl LRItemSet {
    /// Create a state from its kernel items.
    ///
    /// A state whose kernel items are all at their end has nothing to
    /// expand, so it is created with its closure already done.
    pub fn new(id: StateID, kernel: Vec<LRItem>, g: &Grammar) -> Self {
        let mut state = Self {
            id,
            closure: kernel.clone(),
            kernel,
            search_index: 0,
            closure_done: false,
            accepting: false,
            end: false,
        };
        state.reset_closure(g);
        state
    }

    /// Discard the closure and start over from the kernel.
    pub(crate) fn reset_closure(&mut self, g: &Grammar) {
        self.closure = self.kernel.clone();
        self.search_index = 0;
        self.closure_done = false;
        self.accepting = false;
        self.end = false;
        if self.kernel.iter().all(|item| item.is_end(g)) {
            self.accepting = !self.kernel.is_empty();
            self.end = self
                .kernel
                .iter()
                .any(|item| g.rule(item.rule).left() == NonterminalID::START);
            self.search_index = self.closure.len();
            self.closure_done = true;
        }
    }

    fn mark_end(&mut self, g: &Grammar, rule: RuleID) {
        self.accepting = true;
        if g.rule(rule).left() == NonterminalID::START {
            self.end = true;
        }
    }

    pub fn id(&self) -> StateID {
        self.id
    }

    pub fn kernel(&self) -> &[LRItem] {
        &self.kernel
    }

    pub(crate) fn kernel_mut(&mut self) -> &mut [LRItem] {
        &mut self.kernel
    }

    pub fn closure(&self) -> &[LRItem] {
        &self.closure
    }

    pub fn is_closure_done(&self) -> bool {
        self.closure_done
    }

    /// Some item has consumed its whole right-hand side.
    pub fn is_accepting(&self) -> bool {
        self.accepting
    }

    /// The augmented start rule is complete in this state.
    pub fn is_end(&self) -> bool {
        self.end
    }

    /// Process exactly one item of the closure.
    pub fn closure_step(&mut self, ctx: &Context, kind: ItemKind) -> Result<ClosureStep, Error> {
        if self.closure_done {
            return Ok(ClosureStep::AlreadyComputed);
        }
        let g = ctx.grammar();

        let item = match self.closure.get(self.search_index) {
            Some(item) => item.clone(),
            None => {
                self.closure_done = true;
                return Ok(ClosureStep::AlreadyComputed);
            }
        };
        if item.kind() != kind {
            return Err(ConstructionError::ItemKindMismatch.into());
        }
        self.search_index += 1;

        let mut discovered = vec![];
        match item.next_symbol(g) {
            None => self.mark_end(g, item.rule),
            Some(SymbolID::T(..)) => (),
            Some(SymbolID::N(n)) => {
                let lookaheads = match &item.lookaheads {
                    Some(lookaheads) => {
                        let beta = &g.rule(item.rule).right()[item.index + 1..];
                        Some(ctx.first_sets().first_seq(beta, lookaheads))
                    }
                    None => None,
                };

                for rule in g.rules_of(n) {
                    let mut new_item = LRItem {
                        rule: rule.id(),
                        index: 0,
                        lookaheads: lookaheads.clone(),
                    };
                    let discovery = self.insert_closure_item(&mut new_item);
                    discovered.push((new_item, discovery));
                }
            }
        }

        if self.search_index >= self.closure.len() {
            self.closure_done = true;
        }

        tracing::trace!(
            state = %self.id,
            item = %item.display(g),
            discovered = discovered.len(),
            "closure step"
        );

        Ok(ClosureStep::Expanded { item, discovered })
    }

    /// Add `item` to the closure unless existing items of the same core
    /// already cover it. An LR(1) item is trimmed down to the lookaheads
    /// that are not covered yet.
    fn insert_closure_item(&mut self, item: &mut LRItem) -> Discovery {
        let mut found = false;
        let mut covered = TerminalSet::default();
        for existing in self.closure.iter().filter(|i| i.core_eq(item)) {
            found = true;
            if let Some(lookaheads) = &existing.lookaheads {
                covered.union_with(lookaheads);
            }
        }

        match &mut item.lookaheads {
            None if found => Discovery::Present,
            Some(lookaheads) if found => {
                lookaheads.difference_with(&covered);
                if lookaheads.is_empty() {
                    Discovery::Present
                } else {
                    self.closure.push(item.clone());
                    Discovery::Added
                }
            }
            _ => {
                self.closure.push(item.clone());
                Discovery::Added
            }
        }
    }

    /// Run the closure to completion, returning every step taken.
    pub fn compute_closure(
        &mut self,
        ctx: &Context,
        kind: ItemKind,
    ) -> Result<Vec<ClosureStep>, Error> {
        let mut steps = vec![];
        loop {
            match self.closure_step(ctx, kind)? {
                ClosureStep::AlreadyComputed => break,
                step => steps.push(step),
            }
        }
        Ok(steps)
    }

    /// Coalesce non-kernel items sharing a core into one item carrying
    /// the union of their lookaheads. Returns the number of items removed.
    pub fn merge_lookaheads(&mut self) -> usize {
        let num_kernels = self.kernel.len().min(self.closure.len());
        let before = self.closure.len();

        let mut merged: Vec<LRItem> = Vec::with_capacity(before - num_kernels);
        let mut positions: Map<(RuleID, usize), usize> = Map::default();
        for item in self.closure.drain(num_kernels..) {
            match positions.get(&item.core()) {
                Some(&i) => merged[i].merge_lookaheads_from(&item),
                None => {
                    positions.insert(item.core(), merged.len());
                    merged.push(item);
                }
            }
        }
        self.closure.extend(merged);

        if self.closure_done {
            self.search_index = self.closure.len();
        }
        before - self.closure.len()
    }

    /// Union the lookaheads of `other` into this state item by item.
    /// Both states must have equal LR(0) kernels.
    pub(crate) fn absorb(&mut self, other: &LRItemSet) {
        for (target, source) in [
            (&mut self.kernel, &other.kernel),
            (&mut self.closure, &other.closure),
        ] {
            for item in source {
                if let Some(t) = target.iter_mut().find(|t| t.core_eq(item)) {
                    t.merge_lookaheads_from(item);
                }
            }
        }
    }

    pub(crate) fn promote(&mut self) {
        self.kernel.iter_mut().for_each(LRItem::promote);
        self.closure.iter_mut().for_each(LRItem::promote);
    }

    /// Structural kernel equality: LR(0) cores for `ItemKind::LR0`,
    /// cores and lookaheads for `ItemKind::LR1`.
    pub fn kernel_eq(&self, kernel: &[LRItem], kind: ItemKind) -> bool {
        same_kernel(&self.kernel, kernel, kind)
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            write!(f, "#### State {:02}", self.id)?;
            if self.end {
                f.write_str(" (end)")?;
            } else if self.accepting {
                f.write_str(" (accepting)")?;
            }
            writeln!(f)?;
            for (i, item) in self.closure.iter().enumerate() {
                let marker = if i < self.kernel.len() { "*" } else { "-" };
                writeln!(f, "{} {}", marker, item.display(g))?;
            }
            Ok(())
        })
    }
}

pub(crate) fn same_kernel(x: &[LRItem], y: &[LRItem], kind: ItemKind) -> bool {
    x.len() == y.len()
        && x.iter().all(|a| {
            y.iter().any(|b| match kind {
                ItemKind::LR0 => a.core_eq(b),
                ItemKind::LR1 => a == b,
            })
        })
}
