//! The construction context and the session that drives a whole run.

use crate::{
    automaton::{Automaton, AutomatonStep},
    config::Config,
    error::{ConstructionError, Error, SequencingCondition},
    first_sets::FirstSets,
    grammar::Grammar,
    interpreter::{Interpreter, ParseStep, Token, TokenStream},
    loader::RuleRecord,
    table::ParseTable,
    tree::ParseTree,
};
use std::{cell::OnceCell, rc::Rc};

/// The grammar under construction together with the data derived from it.
#[derive(Debug)]
pub struct Context {
    grammar: Rc<Grammar>,
    first_sets: OnceCell<FirstSets>,
}

impl Context {
    pub fn new(grammar: Rc<Grammar>) -> Self {
        Self {
            grammar,
            first_sets: OnceCell::new(),
        }
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn grammar_rc(&self) -> &Rc<Grammar> {
        &self.grammar
    }

    /// The FIRST sets of the grammar, computed on first use.
    pub fn first_sets(&self) -> &FirstSets {
        self.first_sets.get_or_init(|| FirstSets::new(&self.grammar))
    }
}

/// Owns every stage of one run: the automaton, the table, and the parser.
#[derive(Debug)]
pub struct Session {
    ctx: Context,
    config: Config,
    automaton: Automaton,
    table: Option<Rc<ParseTable>>,
    interpreter: Option<Interpreter<Rc<ParseTable>>>,
}

impl Session {
    pub fn new(grammar: Grammar, config: Config) -> Self {
        let ctx = Context::new(Rc::new(grammar));
        let automaton = Automaton::new(&ctx, config.selected_algorithm());
        Self {
            ctx,
            config,
            automaton,
            table: None,
            interpreter: None,
        }
    }

    /// Start a session from rule records, using the configured start symbol.
    pub fn from_records(records: &[RuleRecord], config: Config) -> Result<Self, ConstructionError> {
        let grammar = Grammar::from_records(records, config.start_symbol_name())?;
        Ok(Self::new(grammar, config))
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn grammar(&self) -> &Grammar {
        self.ctx.grammar()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn automaton(&self) -> &Automaton {
        &self.automaton
    }

    pub fn table(&self) -> Option<&ParseTable> {
        self.table.as_deref()
    }

    pub fn interpreter(&self) -> Option<&Interpreter<Rc<ParseTable>>> {
        self.interpreter.as_ref()
    }

    /// Advance the automaton construction by one step.
    pub fn step_automaton(&mut self) -> Result<AutomatonStep, Error> {
        self.automaton.step(&self.ctx)
    }

    /// Finish the automaton construction.
    pub fn build_automaton(&mut self) -> Result<&Automaton, Error> {
        self.automaton.run(&self.ctx)?;
        Ok(&self.automaton)
    }

    /// Build the parse table from the finished automaton.
    pub fn build_table(&mut self) -> Result<&ParseTable, Error> {
        let table = Rc::new(ParseTable::build(&self.automaton, &self.ctx)?);
        self.interpreter = None;
        Ok(&**self.table.insert(table))
    }

    /// Hand the token stream to a fresh parser.
    pub fn load_tokens<I>(&mut self, tokens: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = Token>,
    {
        if self.interpreter.is_some() {
            return Err(SequencingCondition::TokensAlreadyLoaded.into());
        }
        let table = self
            .table
            .clone()
            .ok_or(SequencingCondition::TableNotBuilt)?;
        self.interpreter = Some(Interpreter::new(table, TokenStream::from_tokens(tokens)));
        Ok(())
    }

    /// Perform one parser step.
    pub fn step_parse(&mut self) -> Result<ParseStep, Error> {
        if self.table.is_none() {
            return Err(SequencingCondition::TableNotBuilt.into());
        }
        self.interpreter
            .as_mut()
            .ok_or(SequencingCondition::TokensNotLoaded)?
            .step()
    }

    /// Drop the loaded tokens and the parser state.
    pub fn reset_parse(&mut self) {
        self.interpreter = None;
    }

    /// Run every remaining stage and parse `tokens`.
    pub fn parse<I>(&mut self, tokens: I) -> Result<ParseTree, Error>
    where
        I: IntoIterator<Item = Token>,
    {
        if !self.automaton.is_done() {
            self.automaton.run(&self.ctx)?;
        }
        if self.table.is_none() {
            self.build_table()?;
        }
        self.reset_parse();
        self.load_tokens(tokens)?;
        match &mut self.interpreter {
            Some(interpreter) => interpreter.run().cloned(),
            None => Err(SequencingCondition::TokensNotLoaded.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        automaton::{Algorithm, Phase},
        grammar::SymbolID::*,
    };

    fn parens() -> Grammar {
        Grammar::define(|g| {
            let lparen = g.terminal("(")?;
            let rparen = g.terminal(")")?;
            let a = g.terminal("a")?;
            let s = g.nonterminal("S")?;
            g.rule(s, [T(lparen), N(s), T(rparen)], None)?;
            g.rule(s, [T(a)], None)?;
            Ok(())
        })
        .unwrap()
    }

    fn tokens(kinds: &[&str]) -> Vec<Token> {
        kinds.iter().map(|k| Token::new(*k, *k)).collect()
    }

    #[test]
    fn sequencing() {
        let mut session = Session::new(parens(), Config::default());

        assert!(matches!(
            session.build_table(),
            Err(Error::Sequencing(SequencingCondition::AutomatonNotDone))
        ));
        assert!(matches!(
            session.load_tokens(tokens(&["a"])),
            Err(Error::Sequencing(SequencingCondition::TableNotBuilt))
        ));
        assert!(matches!(
            session.step_parse(),
            Err(Error::Sequencing(SequencingCondition::TableNotBuilt))
        ));

        session.step_automaton().unwrap();
        assert_eq!(session.automaton().phase(), Phase::Closure);
        session.build_automaton().unwrap();
        session.build_table().unwrap();

        assert!(matches!(
            session.step_parse(),
            Err(Error::Sequencing(SequencingCondition::TokensNotLoaded))
        ));
        session.load_tokens(tokens(&["(", "a", ")"])).unwrap();
        assert!(matches!(
            session.load_tokens(tokens(&["a"])),
            Err(Error::Sequencing(SequencingCondition::TokensAlreadyLoaded))
        ));

        while !matches!(session.step_parse().unwrap(), ParseStep::Accept) {}
        let tree = session.interpreter().and_then(|i| i.tree()).unwrap();
        assert_eq!(tree.to_string(), r#"S("(", S("a"), ")")"#);
    }

    #[test]
    fn parse_at_once() {
        let mut config = Config::new();
        config.algorithm(Algorithm::LALRFromLR1);
        let mut session = Session::new(parens(), config);
        let tree = session.parse(tokens(&["(", "(", "a", ")", ")"])).unwrap();
        assert_eq!(tree.to_string(), r#"S("(", S("(", S("a"), ")"), ")")"#);

        let tree = session.parse(tokens(&["a"])).unwrap();
        assert_eq!(tree.to_string(), r#"S("a")"#);
    }
}
