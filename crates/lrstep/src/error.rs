//! Error types.

use crate::{
    automaton::{Algorithm, Phase, StateID},
    grammar::{RuleID, SymbolID},
};

/// The umbrella error returned by the stepping operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Construction(#[from] ConstructionError),

    #[error(transparent)]
    Sequencing(#[from] SequencingCondition),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Fatal(#[from] FatalInvariantError),
}

impl Error {
    pub fn is_sequencing(&self) -> bool {
        matches!(self, Self::Sequencing(..))
    }
}

/// Errors that abort building the grammar or the automaton.
#[derive(Debug, thiserror::Error)]
pub enum ConstructionError {
    #[error("no rule derives the start symbol `{name}'")]
    StartSymbolNotFound { name: String },

    #[error("dot index {index} is out of range for rule {rule:?} (length {len})")]
    ItemIndexOutOfRange {
        rule: RuleID,
        index: usize,
        len: usize,
    },

    #[error("LR(0) and LR(1) items cannot be mixed in this operation")]
    ItemKindMismatch,

    #[error("the symbol `{name}' is used both as a terminal and a nonterminal")]
    SymbolKindMismatch { name: String },

    #[error("the symbol name `{name}' is reserved")]
    ReservedSymbol { name: String },

    #[error("duplicate production rule: {rule}")]
    DuplicateRule { rule: String },

    #[error("the symbol {0:?} is not declared in this grammar")]
    UnknownSymbol(SymbolID),

    #[error("unknown rule: {0:?}")]
    UnknownRule(RuleID),

    #[error("too many symbols or rules in the grammar")]
    TooManySymbols,

    #[error("malformed record: {0}")]
    Deserialize(
        #[from]
        #[source]
        serde_json::Error,
    ),
}

/// Operations requested in an order the current state cannot serve.
///
/// These never corrupt the receiver; it stays usable afterwards.
#[derive(Debug, thiserror::Error)]
pub enum SequencingCondition {
    #[error("the automaton construction has not finished yet")]
    AutomatonNotDone,

    #[error("this operation requires the {expected} algorithm, but the automaton uses {actual}")]
    WrongAlgorithm {
        expected: Algorithm,
        actual: Algorithm,
    },

    #[error("this operation belongs to the {expected:?} phase, but the automaton is in {actual:?}")]
    PhaseMismatch { expected: Phase, actual: Phase },

    #[error("the token stream is exhausted at index {index}")]
    TokenExhausted { index: usize },

    #[error("tokens have already been loaded into this session")]
    TokensAlreadyLoaded,

    #[error("no tokens have been loaded into this session")]
    TokensNotLoaded,

    #[error("the parser has already halted")]
    ParserHalted,

    #[error("the parse table has not been built yet")]
    TableNotBuilt,
}

/// The input was rejected by the parse table.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("unexpected token `{value}' ({token_type}) in state {state}, expected one of: {}", .expected.join(", "))]
    UnexpectedToken {
        value: String,
        token_type: String,
        state: StateID,
        expected: Vec<String>,
    },
}

/// An internal consistency check failed.
#[derive(Debug, thiserror::Error)]
pub enum FatalInvariantError {
    #[error("kernel item `{item}' is missing from state {state}")]
    MissingKernelItem { state: StateID, item: String },

    #[error("no transition from state {state} on `{symbol}'")]
    MissingTransition { state: StateID, symbol: String },

    #[error("no GOTO entry for state {state} on `{symbol}'")]
    MissingGoto { state: StateID, symbol: String },

    #[error("the parser stack underflowed while reducing {rule:?}")]
    StackUnderflow { rule: RuleID },

    #[error("the state {0} has been merged away")]
    DeadState(StateID),
}
