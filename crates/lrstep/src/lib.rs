//! A stepwise LR parser generator.
//!
//! Every stage can be driven one unit of work at a time, down to a single
//! closure expansion or a single shift of the parser.

pub mod automaton;
pub mod config;
pub mod error;
pub mod first_sets;
pub mod grammar;
pub mod interpreter;
pub mod item;
pub mod lalr;
pub mod loader;
pub mod session;
pub mod table;
pub mod tree;
pub mod types;
pub mod util;

pub use crate::{
    automaton::{Algorithm, Automaton, AutomatonStep, Phase, StateID},
    config::Config,
    error::Error,
    grammar::Grammar,
    interpreter::{Interpreter, ParseStep, Token, TokenStream},
    session::{Context, Session},
    table::ParseTable,
    tree::ParseTree,
};
