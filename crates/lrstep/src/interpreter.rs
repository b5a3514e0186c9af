//! The stepwise shift-reduce parser driven by a parse table.

use crate::{
    automaton::StateID,
    error::{Error, FatalInvariantError, ParseError, SequencingCondition},
    grammar::{RuleID, END_OF_INPUT},
    table::{Action, ParseTable},
    tree::ParseTree,
};
use serde::Deserialize;
use std::borrow::Borrow;

/// A lexical token supplied by the external tokenizer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Token {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub start_pos: Option<usize>,
    #[serde(default)]
    pub line: Option<usize>,
    #[serde(default)]
    pub column: Option<usize>,
    #[serde(default)]
    pub end_line: Option<usize>,
    #[serde(default)]
    pub end_column: Option<usize>,
    #[serde(default)]
    pub end_pos: Option<usize>,
}

impl Token {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
            start_pos: None,
            line: None,
            column: None,
            end_line: None,
            end_column: None,
            end_pos: None,
        }
    }

    /// The synthetic token that ends every stream.
    pub fn end_of_input() -> Self {
        Self::new(END_OF_INPUT, "")
    }

    pub fn is_end_of_input(&self) -> bool {
        self.kind == END_OF_INPUT
    }
}

/// The tokens consumed by an interpreter.
#[derive(Debug, Clone, Default)]
pub struct TokenStream {
    tokens: Vec<Token>,
}

impl TokenStream {
    /// Wrap `tokens`, appending the end-of-input token unless the stream
    /// already ends with one.
    pub fn from_tokens(tokens: impl IntoIterator<Item = Token>) -> Self {
        let mut tokens: Vec<_> = tokens.into_iter().collect();
        if !tokens.last().map_or(false, Token::is_end_of_input) {
            tokens.push(Token::end_of_input());
        }
        Self { tokens }
    }

    /// Wrap `tokens` as is.
    pub fn raw(tokens: impl IntoIterator<Item = Token>) -> Self {
        Self {
            tokens: tokens.into_iter().collect(),
        }
    }

    pub fn get(&self, index: usize) -> Result<&Token, SequencingCondition> {
        self.tokens
            .get(index)
            .ok_or(SequencingCondition::TokenExhausted { index })
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// The outcome of a single interpreter step.
#[derive(Debug, Clone)]
pub enum ParseStep {
    /// A token was pushed onto the stacks.
    Shift {
        token: Token,
        /// The state pushed onto the state stack.
        state: StateID,
        /// The token the next step will look at, if any.
        pending: Option<Token>,
    },
    /// A rule was reduced and the GOTO entry followed.
    Reduce {
        rule: RuleID,
        /// The number of entries popped from each stack.
        popped: usize,
        /// The state exposed on top of the state stack after popping.
        exposed: StateID,
        /// The state pushed by GOTO.
        state: StateID,
        /// The node pushed onto the value stack.
        node: ParseTree,
    },
    Accept,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Status {
    Running,
    Accepted,
    Failed,
}

/// The parser driven by a parse table.
#[derive(Debug)]
pub struct Interpreter<T>
where
    T: Borrow<ParseTable>,
{
    table: T,
    tokens: TokenStream,
    cursor: usize,
    state_stack: Vec<StateID>,
    value_stack: Vec<ParseTree>,
    status: Status,
}

impl<T> Interpreter<T>
where
    T: Borrow<ParseTable>,
{
    pub fn new(table: T, tokens: TokenStream) -> Self {
        let initial_state = Borrow::<ParseTable>::borrow(&table).initial_state();
        Self {
            table,
            tokens,
            cursor: 0,
            state_stack: vec![initial_state],
            value_stack: vec![],
            status: Status::Running,
        }
    }

    pub fn table(&self) -> &ParseTable {
        self.table.borrow()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn state_stack(&self) -> &[StateID] {
        &self.state_stack
    }

    pub fn value_stack(&self) -> &[ParseTree] {
        &self.value_stack
    }

    /// The index of the next token to read.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The parse tree, once the input has been accepted.
    pub fn tree(&self) -> Option<&ParseTree> {
        match self.status {
            Status::Accepted => self.value_stack.last(),
            _ => None,
        }
    }

    /// Perform one shift, one reduce together with its GOTO, or the accept.
    pub fn step(&mut self) -> Result<ParseStep, Error> {
        if self.status != Status::Running {
            return Err(SequencingCondition::ParserHalted.into());
        }
        let table: &ParseTable = self.table.borrow();
        let g = table.grammar();

        let current = *self
            .state_stack
            .last()
            .ok_or(FatalInvariantError::StackUnderflow {
                rule: RuleID::ACCEPT,
            })?;
        let token = self.tokens.get(self.cursor)?;

        let action = g
            .terminal_by_name(&token.kind)
            .and_then(|t| table.get(current, t))
            .copied();
        let action = match action {
            Some(action) => action,
            None => {
                self.status = Status::Failed;
                let mut expected: Vec<String> = table
                    .expected(current)
                    .map(|t| g.terminal(t).name().to_owned())
                    .collect();
                expected.sort();
                return Err(ParseError::UnexpectedToken {
                    value: token.value.clone(),
                    token_type: token.kind.clone(),
                    state: current,
                    expected,
                }
                .into());
            }
        };

        match action {
            Action::Shift(n) => {
                let token = token.clone();
                self.state_stack.push(n);
                self.value_stack
                    .push(ParseTree::leaf(token.kind.clone(), token.value.clone()));
                self.cursor += 1;
                tracing::trace!(state = %n, token = %token.kind, "shift");
                Ok(ParseStep::Shift {
                    token,
                    state: n,
                    pending: self.tokens.get(self.cursor).ok().cloned(),
                })
            }

            Action::Reduce(rule_id) => {
                let rule = g.rule(rule_id);
                let n = rule.right().len();
                if self.state_stack.len() <= n || self.value_stack.len() < n {
                    return Err(FatalInvariantError::StackUnderflow { rule: rule_id }.into());
                }
                // `split_off` at the length leaves both stacks untouched for ε-rules.
                let children = self.value_stack.split_off(self.value_stack.len() - n);
                self.state_stack.truncate(self.state_stack.len() - n);

                let exposed = *self
                    .state_stack
                    .last()
                    .ok_or(FatalInvariantError::StackUnderflow { rule: rule_id })?;
                let target = table.goto(exposed, rule.left()).ok_or_else(|| {
                    FatalInvariantError::MissingGoto {
                        state: exposed,
                        symbol: g.nonterminal(rule.left()).name().into(),
                    }
                })?;

                let node = ParseTree::node(g.nonterminal(rule.left()).name(), children);
                self.state_stack.push(target);
                self.value_stack.push(node.clone());
                tracing::trace!(rule = %rule.display(g), popped = n, state = %target, "reduce");
                Ok(ParseStep::Reduce {
                    rule: rule_id,
                    popped: n,
                    exposed,
                    state: target,
                    node,
                })
            }

            Action::Accept => {
                self.status = Status::Accepted;
                tracing::trace!("accept");
                Ok(ParseStep::Accept)
            }

            Action::Goto(..) => Err(FatalInvariantError::MissingGoto {
                state: current,
                symbol: token.kind.clone(),
            }
            .into()),
        }
    }

    /// Step until the input is accepted.
    pub fn run(&mut self) -> Result<&ParseTree, Error> {
        while self.status == Status::Running {
            self.step()?;
        }
        self.tree().ok_or_else(|| SequencingCondition::ParserHalted.into())
    }
}
