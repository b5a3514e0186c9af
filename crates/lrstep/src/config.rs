//! Session configuration.

use crate::{automaton::Algorithm, grammar::DEFAULT_START};

#[derive(Debug, Clone)]
pub struct Config {
    algorithm: Algorithm,
    start_symbol: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            algorithm: Algorithm::LALRFromLR0,
            start_symbol: DEFAULT_START.into(),
        }
    }

    /// Build the LR(0) automaton.
    pub fn use_lr0(&mut self) -> &mut Self {
        self.algorithm = Algorithm::LR0;
        self
    }

    /// Build Knuth's canonical LR(1) automaton.
    pub fn use_canonical(&mut self) -> &mut Self {
        self.algorithm = Algorithm::LR1;
        self
    }

    /// Build the LALR(1) automaton by merging the states of the canonical
    /// LR(1) automaton that share their cores.
    pub fn use_lalr_from_lr1(&mut self) -> &mut Self {
        self.algorithm = Algorithm::LALRFromLR1;
        self
    }

    /// Build the LALR(1) automaton by propagating lookaheads over the LR(0)
    /// automaton, in the manner of DeRemer.
    ///
    /// This is the default.
    pub fn use_lalr_from_lr0(&mut self) -> &mut Self {
        self.algorithm = Algorithm::LALRFromLR0;
        self
    }

    pub fn algorithm(&mut self, algorithm: Algorithm) -> &mut Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the name of the start symbol used when loading rule records.
    pub fn start_symbol(&mut self, name: impl Into<String>) -> &mut Self {
        self.start_symbol = name.into();
        self
    }

    pub fn selected_algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn start_symbol_name(&self) -> &str {
        &self.start_symbol
    }
}
