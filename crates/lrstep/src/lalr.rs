//! The two derivations of the LALR(1) automaton.
//!
//! * Merging: build the canonical LR(1) automaton, then merge every pair of
//!   states whose kernels share their LR(0) cores, one pair per step.
//! * Propagation: build the LR(0) automaton, discover which lookaheads each
//!   kernel item generates spontaneously and which it passes on, and
//!   propagate them until nothing grows.
//!
//! Both must produce the same states and the same tables.

use crate::{
    automaton::{resolve, Algorithm, Automaton, Phase, StateID},
    error::{Error, FatalInvariantError},
    grammar::{SymbolID, TerminalID, TerminalSet},
    item::{ItemKind, LRItem, LRItemSet},
    session::Context,
};

/// One pair of states merged into one.
#[derive(Debug, Clone)]
pub struct MergeStep {
    /// The state that was removed.
    pub from: StateID,
    /// The state that absorbed it.
    pub into: StateID,
    /// Every redirection recorded so far, `(removed, replacement)`.
    pub merge_map: Vec<(StateID, StateID)>,
}

/// A transition that was pointed at a surviving state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub source: StateID,
    pub symbol: SymbolID,
    pub old_target: StateID,
    pub new_target: StateID,
}

#[derive(Debug, Clone)]
pub struct RewriteStep {
    pub merge_map: Vec<(StateID, StateID)>,
    pub changed: Vec<Rewrite>,
}

/// The lookaheads found for the kernel items of one state.
#[derive(Debug, Clone)]
pub struct SpontaneousStep {
    pub state: StateID,
    /// `(target state, kernel index, generated lookaheads)`.
    pub spontaneous: Vec<(StateID, usize, TerminalSet)>,
    /// Propagation edges discovered by this step.
    pub edges: Vec<((StateID, usize), (StateID, usize))>,
}

#[derive(Debug, Clone)]
pub struct PropagationPass {
    /// The number of this pass, starting from one.
    pub pass: usize,
    /// Kernel items whose lookaheads grew during this pass.
    pub grown: Vec<(StateID, usize)>,
}

impl PropagationPass {
    pub fn changed(&self) -> bool {
        !self.grown.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct RecloseStep {
    pub state: StateID,
    /// The number of closure steps taken.
    pub closure_steps: usize,
    /// The number of items removed by merging lookaheads.
    pub merged: usize,
}

impl Automaton {
    // ==== merging the canonical LR(1) automaton ====

    pub(crate) fn start_merging(&mut self) {
        self.merge_cursor = 0;
        self.phase = match self.find_mergeable() {
            Some(..) => Phase::MergeStates,
            None => Phase::RewriteTransitions,
        };
    }

    /// The first pair of live states with equal LR(0) kernels, as
    /// `(earlier, later)`.
    fn find_mergeable(&self) -> Option<(StateID, StateID)> {
        for (i, x) in self.slots.iter().enumerate().skip(self.merge_cursor) {
            if !x.live {
                continue;
            }
            for y in &self.slots[i + 1..] {
                if y.live && x.state.kernel_eq(y.state.kernel(), ItemKind::LR0) {
                    return Some((x.state.id(), y.state.id()));
                }
            }
        }
        None
    }

    /// Merge the next pair of states with equal cores.
    ///
    /// Returns `None` when no such pair is left, and moves on to rewriting
    /// the transitions.
    pub fn merge_step(&mut self) -> Result<Option<MergeStep>, Error> {
        self.expect_algorithm(Algorithm::LALRFromLR1)?;
        self.expect_phase(Phase::MergeStates)?;

        let (into, from) = match self.find_mergeable() {
            Some(pair) => pair,
            None => {
                self.phase = Phase::RewriteTransitions;
                return Ok(None);
            }
        };
        self.merge_cursor = into.raw();

        let source = self.live_state(from)?.clone();
        self.live_state_mut(into)?.absorb(&source);
        self.slots[from.raw()].live = false;
        self.redirects.insert(from, into);

        // The outgoing transitions of `into` already cover those of `from`.
        self.transitions.retain(|(source, _), _| *source != from);
        self.transition_rules.retain(|(source, _), _| *source != from);

        tracing::trace!(%from, %into, "merge states");

        if self.find_mergeable().is_none() {
            self.phase = Phase::RewriteTransitions;
        }

        Ok(Some(MergeStep {
            from,
            into,
            merge_map: self.merge_map(),
        }))
    }

    /// Point every transition at the state that replaced its target.
    pub fn rewrite_transitions(&mut self) -> Result<RewriteStep, Error> {
        self.expect_algorithm(Algorithm::LALRFromLR1)?;
        self.expect_phase(Phase::RewriteTransitions)?;

        let mut changed = vec![];
        for ((source, symbol), target) in self.transitions.iter_mut() {
            let new_target = resolve(&self.redirects, *target);
            if new_target != *target {
                changed.push(Rewrite {
                    source: *source,
                    symbol: *symbol,
                    old_target: *target,
                    new_target,
                });
                *target = new_target;
            }
        }

        tracing::debug!(
            merged = self.redirects.len(),
            rewritten = changed.len(),
            "transitions rewritten"
        );
        self.phase = Phase::Done;

        Ok(RewriteStep {
            merge_map: self.merge_map(),
            changed,
        })
    }

    pub fn merge_map(&self) -> Vec<(StateID, StateID)> {
        self.redirects
            .keys()
            .map(|from| (*from, resolve(&self.redirects, *from)))
            .collect()
    }

    // ==== propagation over the LR(0) automaton ====

    pub(crate) fn start_propagation(&mut self) {
        for slot in &mut self.slots {
            slot.state.promote();
        }
        if let Some(lookaheads) = self
            .slots
            .first_mut()
            .and_then(|slot| slot.state.kernel_mut().first_mut())
            .and_then(|item| item.lookaheads_mut())
        {
            lookaheads.insert(TerminalID::EOI);
        }
        self.ptr = 0;
        self.passes = 0;
        self.phase = Phase::Spontaneous;
    }

    /// Determine the spontaneous lookaheads and the propagation edges that
    /// originate from the kernel items of the current state.
    pub fn spontaneous_step(&mut self, ctx: &Context) -> Result<SpontaneousStep, Error> {
        self.expect_algorithm(Algorithm::LALRFromLR0)?;
        self.expect_phase(Phase::Spontaneous)?;
        let g = ctx.grammar();
        let id = StateID::new(self.ptr);

        let kernel = self.live_state(id)?.kernel().to_vec();
        let mut spontaneous = vec![];
        let mut edges = vec![];
        for (index, kernel_item) in kernel.iter().enumerate() {
            let seed = LRItem::new(
                g,
                kernel_item.rule(),
                kernel_item.index(),
                Some([TerminalID::PROPAGATE].into_iter().collect()),
            )?;
            let mut probe = LRItemSet::new(id, vec![seed], g);
            probe.compute_closure(ctx, ItemKind::LR1)?;

            for item in probe.closure() {
                let symbol = match item.next_symbol(g) {
                    Some(symbol) => symbol,
                    None => continue,
                };
                let target = self.transition(id, symbol).ok_or_else(|| {
                    FatalInvariantError::MissingTransition {
                        state: id,
                        symbol: g.symbol_name(symbol).into(),
                    }
                })?;
                let advanced = item.advance();
                let position = self
                    .live_state(target)?
                    .kernel()
                    .iter()
                    .position(|k| k.core_eq(&advanced))
                    .ok_or_else(|| FatalInvariantError::MissingKernelItem {
                        state: target,
                        item: advanced.display(g).to_string(),
                    })?;

                let mut lookaheads = item.lookaheads().cloned().unwrap_or_default();
                if lookaheads.remove(TerminalID::PROPAGATE) {
                    let edge = (target, position);
                    let targets = self.effects.entry((id, index)).or_default();
                    if !targets.contains(&edge) {
                        targets.push(edge);
                        edges.push(((id, index), edge));
                    }
                }
                if !lookaheads.is_empty() {
                    if let Some(current) = self.live_state_mut(target)?.kernel_mut()[position]
                        .lookaheads_mut()
                    {
                        current.union_with(&lookaheads);
                    }
                    spontaneous.push((target, position, lookaheads));
                }
            }
        }

        tracing::trace!(
            state = %id,
            spontaneous = spontaneous.len(),
            edges = edges.len(),
            "spontaneous lookaheads"
        );

        self.ptr += 1;
        if self.ptr >= self.slots.len() {
            self.phase = Phase::Propagate;
        }

        Ok(SpontaneousStep {
            state: id,
            spontaneous,
            edges,
        })
    }

    /// Push the lookaheads of every edge source into its targets, once.
    pub fn propagation_pass(&mut self) -> Result<PropagationPass, Error> {
        self.expect_algorithm(Algorithm::LALRFromLR0)?;
        self.expect_phase(Phase::Propagate)?;
        self.passes += 1;

        let mut grown = vec![];
        for (&(source, index), targets) in &self.effects {
            let lookaheads = self.slots[source.raw()].state.kernel()[index]
                .lookaheads()
                .cloned()
                .unwrap_or_default();
            for &(target, position) in targets {
                if let Some(current) =
                    self.slots[target.raw()].state.kernel_mut()[position].lookaheads_mut()
                {
                    if !current.is_superset(&lookaheads) {
                        current.union_with(&lookaheads);
                        grown.push((target, position));
                    }
                }
            }
        }

        tracing::trace!(pass = self.passes, grown = grown.len(), "propagation pass");

        if grown.is_empty() {
            self.ptr = 0;
            self.phase = Phase::Reclose;
        }

        Ok(PropagationPass {
            pass: self.passes,
            grown,
        })
    }

    /// Recompute the LR(1) closure of the current state from its final
    /// kernel lookaheads.
    pub fn reclose_step(&mut self, ctx: &Context) -> Result<RecloseStep, Error> {
        self.expect_algorithm(Algorithm::LALRFromLR0)?;
        self.expect_phase(Phase::Reclose)?;
        let id = StateID::new(self.ptr);

        let state = self.live_state_mut(id)?;
        state.reset_closure(ctx.grammar());
        let closure_steps = state.compute_closure(ctx, ItemKind::LR1)?.len();
        let merged = state.merge_lookaheads();

        self.ptr += 1;
        if self.ptr >= self.slots.len() {
            tracing::debug!(passes = self.passes, "lookahead propagation finished");
            self.phase = Phase::Done;
        }

        Ok(RecloseStep {
            state: id,
            closure_steps,
            merged,
        })
    }
}
