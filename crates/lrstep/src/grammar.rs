//! Grammar types.

use crate::{
    error::ConstructionError,
    types::Map,
    util::{display_fn, write_joined},
};
use std::fmt;

/// The name of the terminal symbol that marks the end of input.
pub const END_OF_INPUT: &str = "$END";

/// The default name of the designated start symbol.
pub const DEFAULT_START: &str = "start";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TerminalID {
    raw: u16,
}
impl TerminalID {
    /// Reserved symbol used as a terminal symbol that means the end of input.
    pub const EOI: Self = Self::new(0);

    /// Reserved lookahead that marks a propagated lookahead during LALR(1)
    /// construction. No rule or token ever refers to it.
    pub const PROPAGATE: Self = Self::new(1);

    const OFFSET: u16 = 2;

    #[inline]
    const fn new(raw: u16) -> Self {
        Self { raw }
    }

    pub const fn is_reserved(self) -> bool {
        self.raw < Self::OFFSET
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NonterminalID {
    raw: u16,
}
impl NonterminalID {
    /// The augmented start symbol.
    pub const START: Self = Self::new(0);
    const OFFSET: u16 = 1;

    #[inline]
    const fn new(raw: u16) -> Self {
        Self { raw }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SymbolID {
    T(TerminalID),
    N(NonterminalID),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct RuleID {
    raw: u16,
}
impl RuleID {
    /// The augmented rule `$accept -> S`.
    pub const ACCEPT: Self = Self::new(0);

    const OFFSET: u16 = 1;

    #[inline]
    const fn new(raw: u16) -> Self {
        Self { raw }
    }

    pub const fn raw(self) -> u16 {
        self.raw
    }
}

#[derive(Debug, Default, Clone)]
pub struct TerminalSet {
    inner: bit_set::BitSet,
}
impl TerminalSet {
    pub fn contains(&self, id: TerminalID) -> bool {
        self.inner.contains(id.raw.into())
    }
    pub fn insert(&mut self, id: TerminalID) -> bool {
        self.inner.insert(id.raw.into())
    }
    pub fn remove(&mut self, id: TerminalID) -> bool {
        self.inner.remove(id.raw.into())
    }
    pub fn union_with(&mut self, other: &Self) {
        self.inner.union_with(&other.inner)
    }
    pub fn difference_with(&mut self, other: &Self) {
        self.inner.difference_with(&other.inner)
    }
    pub fn is_superset(&self, other: &Self) -> bool {
        self.inner.is_superset(&other.inner)
    }
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
    pub fn len(&self) -> usize {
        self.inner.len()
    }
    pub fn iter(&self) -> impl Iterator<Item = TerminalID> + '_ {
        self.inner.iter().map(|raw| TerminalID::new(raw as u16))
    }
}
impl PartialEq for TerminalSet {
    fn eq(&self, other: &Self) -> bool {
        // The underlying bit vectors may differ in length.
        self.inner.is_subset(&other.inner) && self.inner.is_superset(&other.inner)
    }
}
impl Eq for TerminalSet {}
impl FromIterator<TerminalID> for TerminalSet {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = TerminalID>,
    {
        Self {
            inner: iter.into_iter().map(|t| usize::from(t.raw)).collect(),
        }
    }
}

#[derive(Debug)]
pub struct Terminal {
    id: TerminalID,
    name: String,
}
impl Terminal {
    pub fn id(&self) -> TerminalID {
        self.id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
}
impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug)]
pub struct Nonterminal {
    id: NonterminalID,
    name: String,
}
impl Nonterminal {
    pub fn id(&self) -> NonterminalID {
        self.id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
}
impl fmt::Display for Nonterminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// The type that represents a production rule in grammar.
#[derive(Debug)]
pub struct Rule {
    id: RuleID,
    left: NonterminalID,
    right: Vec<SymbolID>,
    order: usize,
    priority: i32,
}
impl Rule {
    pub fn id(&self) -> RuleID {
        self.id
    }

    /// Return the left-hand side of this production.
    pub fn left(&self) -> NonterminalID {
        self.left
    }

    /// Return the right-hand side of this production.
    pub fn right(&self) -> &[SymbolID] {
        &self.right[..]
    }

    /// The declaration index, used to break ties between rules.
    pub fn order(&self) -> usize {
        self.order
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Whether this rule wins over `other` when both justify the same
    /// transition: the higher priority, then the later declaration.
    pub fn outranks(&self, other: &Rule) -> bool {
        (self.priority, self.order) > (other.priority, other.order)
    }

    // `"LHS -> R1 R2 R3"`
    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(|f| {
            write!(f, "{} ->", g.nonterminal(self.left))?;
            if self.right.is_empty() {
                f.write_str(" ε")?;
            }
            for symbol in &self.right {
                write!(f, " {}", g.symbol_name(*symbol))?;
            }
            Ok(())
        })
    }
}

/// The grammar definition used to derive the parser tables.
#[derive(Debug)]
#[non_exhaustive]
pub struct Grammar {
    pub terminals: Map<TerminalID, Terminal>,
    pub nonterminals: Map<NonterminalID, Nonterminal>,
    pub rules: Map<RuleID, Rule>,
    pub start_symbol: NonterminalID,
    symbols: Map<String, SymbolID>,
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("## terminals: ")?;
        write_joined(f, ", ", self.terminals.values())?;

        f.write_str("\n## nonterminals: ")?;
        write_joined(f, ", ", self.nonterminals.values())?;

        writeln!(f, "\n## rules:")?;
        for rule in self.rules.values() {
            write!(f, "{}", rule.display(self))?;
            if rule.priority != 0 {
                write!(f, " (priority={})", rule.priority)?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

impl Grammar {
    /// Define a grammar using the specified function.
    pub fn define<F>(f: F) -> Result<Self, ConstructionError>
    where
        F: FnOnce(&mut GrammarDef) -> Result<(), ConstructionError>,
    {
        let mut def = GrammarDef {
            terminals: Map::default(),
            nonterminals: Map::default(),
            rules: Map::default(),
            symbols: Map::default(),
            start: None,
            next_terminal_id: TerminalID::OFFSET,
            next_nonterminal_id: NonterminalID::OFFSET,
            next_rule_id: RuleID::OFFSET,
        };

        def.reserve_terminal(TerminalID::EOI, END_OF_INPUT);
        // Not interned, so no name declared by the user can refer to it.
        def.terminals.insert(
            TerminalID::PROPAGATE,
            Terminal {
                id: TerminalID::PROPAGATE,
                name: "#".into(),
            },
        );
        def.nonterminals.insert(
            NonterminalID::START,
            Nonterminal {
                id: NonterminalID::START,
                name: "$accept".into(),
            },
        );
        def.symbols
            .insert("$accept".into(), SymbolID::N(NonterminalID::START));

        f(&mut def)?;

        def.end()
    }

    pub fn terminal(&self, id: TerminalID) -> &Terminal {
        &self.terminals[&id]
    }

    pub fn nonterminal(&self, id: NonterminalID) -> &Nonterminal {
        &self.nonterminals[&id]
    }

    pub fn rule(&self, id: RuleID) -> &Rule {
        &self.rules[&id]
    }

    /// Iterate over the rules whose left-hand side is `left`, in declaration order.
    pub fn rules_of(&self, left: NonterminalID) -> impl Iterator<Item = &Rule> + '_ {
        self.rules.values().filter(move |rule| rule.left == left)
    }

    /// Look up an interned symbol by name.
    pub fn symbol(&self, name: &str) -> Option<SymbolID> {
        self.symbols.get(name).copied()
    }

    /// Look up a terminal by the token type that refers to it.
    pub fn terminal_by_name(&self, name: &str) -> Option<TerminalID> {
        match self.symbol(name)? {
            SymbolID::T(t) if t != TerminalID::PROPAGATE => Some(t),
            _ => None,
        }
    }

    /// Every terminal a token can carry, including the end of input.
    pub fn input_terminals(&self) -> impl Iterator<Item = TerminalID> + '_ {
        self.terminals
            .keys()
            .copied()
            .filter(|t| *t != TerminalID::PROPAGATE)
    }

    pub fn symbol_name(&self, symbol: SymbolID) -> &str {
        match symbol {
            SymbolID::T(t) => self.terminal(t).name(),
            SymbolID::N(n) => self.nonterminal(n).name(),
        }
    }
}

/// The contextural values for building a `Grammar`.
#[derive(Debug)]
pub struct GrammarDef {
    terminals: Map<TerminalID, Terminal>,
    nonterminals: Map<NonterminalID, Nonterminal>,
    rules: Map<RuleID, Rule>,
    symbols: Map<String, SymbolID>,
    start: Option<NonterminalID>,
    next_terminal_id: u16,
    next_nonterminal_id: u16,
    next_rule_id: u16,
}

impl GrammarDef {
    fn reserve_terminal(&mut self, id: TerminalID, name: &str) {
        self.terminals.insert(
            id,
            Terminal {
                id,
                name: name.into(),
            },
        );
        self.symbols.insert(name.into(), SymbolID::T(id));
    }

    /// Declare a terminal symbol used in this grammar.
    ///
    /// Declaring the same name twice returns the same symbol.
    pub fn terminal(&mut self, name: &str) -> Result<TerminalID, ConstructionError> {
        match self.symbols.get(name) {
            Some(SymbolID::T(t)) if !t.is_reserved() => return Ok(*t),
            Some(SymbolID::T(..)) | Some(SymbolID::N(NonterminalID::START)) => {
                return Err(ConstructionError::ReservedSymbol { name: name.into() })
            }
            Some(SymbolID::N(..)) => {
                return Err(ConstructionError::SymbolKindMismatch { name: name.into() })
            }
            None => (),
        }

        let id = TerminalID::new(self.next_terminal_id);
        self.next_terminal_id = self
            .next_terminal_id
            .checked_add(1)
            .ok_or(ConstructionError::TooManySymbols)?;
        self.terminals.insert(
            id,
            Terminal {
                id,
                name: name.into(),
            },
        );
        self.symbols.insert(name.into(), SymbolID::T(id));

        Ok(id)
    }

    /// Declare a nonterminal symbol used in this grammar.
    ///
    /// Declaring the same name twice returns the same symbol.
    pub fn nonterminal(&mut self, name: &str) -> Result<NonterminalID, ConstructionError> {
        match self.symbols.get(name) {
            Some(SymbolID::N(NonterminalID::START)) | Some(SymbolID::T(TerminalID::EOI)) => {
                return Err(ConstructionError::ReservedSymbol { name: name.into() })
            }
            Some(SymbolID::N(n)) => return Ok(*n),
            Some(SymbolID::T(..)) => {
                return Err(ConstructionError::SymbolKindMismatch { name: name.into() })
            }
            None => (),
        }

        let id = NonterminalID::new(self.next_nonterminal_id);
        self.next_nonterminal_id = self
            .next_nonterminal_id
            .checked_add(1)
            .ok_or(ConstructionError::TooManySymbols)?;
        self.nonterminals.insert(
            id,
            Nonterminal {
                id,
                name: name.into(),
            },
        );
        self.symbols.insert(name.into(), SymbolID::N(id));

        Ok(id)
    }

    /// Specify a production rule into this grammar.
    ///
    /// The declaration order is the number of rules specified so far.
    pub fn rule<I>(
        &mut self,
        left: NonterminalID,
        right: I,
        priority: Option<i32>,
    ) -> Result<RuleID, ConstructionError>
    where
        I: IntoIterator<Item = SymbolID>,
    {
        let order = self.rules.len();
        self.rule_with_order(left, right, order, priority.unwrap_or(0))
    }

    /// Specify a production rule with an explicit declaration order.
    pub fn rule_with_order<I>(
        &mut self,
        left: NonterminalID,
        right: I,
        order: usize,
        priority: i32,
    ) -> Result<RuleID, ConstructionError>
    where
        I: IntoIterator<Item = SymbolID>,
    {
        let right: Vec<_> = right.into_iter().collect();
        if let Some(unknown) = std::iter::once(SymbolID::N(left))
            .chain(right.iter().copied())
            .find(|s| !self.is_declared(*s))
        {
            return Err(ConstructionError::UnknownSymbol(unknown));
        }
        if left == NonterminalID::START
            || right.iter().any(|s| {
                matches!(s, SymbolID::T(t) if t.is_reserved())
                    || *s == SymbolID::N(NonterminalID::START)
            })
        {
            return Err(ConstructionError::ReservedSymbol {
                name: "$accept".into(),
            });
        }
        for rule in self.rules.values() {
            if rule.left == left && rule.right == right {
                return Err(ConstructionError::DuplicateRule {
                    rule: self.describe(left, &right),
                });
            }
        }

        let id = RuleID::new(self.next_rule_id);
        self.next_rule_id = self
            .next_rule_id
            .checked_add(1)
            .ok_or(ConstructionError::TooManySymbols)?;
        self.rules.insert(
            id,
            Rule {
                id,
                left,
                right,
                order,
                priority,
            },
        );

        Ok(id)
    }

    /// Specify the start symbol for this grammar.
    pub fn start_symbol(&mut self, symbol: NonterminalID) -> Result<(), ConstructionError> {
        self.start.replace(symbol);
        Ok(())
    }

    /// Specify the start symbol by name.
    pub fn start_symbol_by_name(&mut self, name: &str) -> Result<(), ConstructionError> {
        match self.symbols.get(name) {
            Some(SymbolID::N(n)) if *n != NonterminalID::START => {
                self.start.replace(*n);
                Ok(())
            }
            _ => Err(ConstructionError::StartSymbolNotFound { name: name.into() }),
        }
    }

    fn is_declared(&self, symbol: SymbolID) -> bool {
        match symbol {
            SymbolID::T(t) => self.terminals.contains_key(&t),
            SymbolID::N(n) => self.nonterminals.contains_key(&n),
        }
    }

    fn describe(&self, left: NonterminalID, right: &[SymbolID]) -> String {
        let mut s = self
            .nonterminals
            .get(&left)
            .map_or("<unknown>", |n| n.name())
            .to_owned();
        s.push_str(" ->");
        for symbol in right {
            let name = match symbol {
                SymbolID::T(t) => self.terminals.get(t).map(|t| t.name()),
                SymbolID::N(n) => self.nonterminals.get(n).map(|n| n.name()),
            };
            s.push(' ');
            s.push_str(name.unwrap_or("<unknown>"));
        }
        s
    }

    fn end(mut self) -> Result<Grammar, ConstructionError> {
        // Fall back to the first declared nonterminal.
        let start = match self.start.take() {
            Some(start) => start,
            None => self
                .nonterminals
                .keys()
                .find(|id| **id != NonterminalID::START)
                .copied()
                .ok_or_else(|| ConstructionError::StartSymbolNotFound {
                    name: "<none>".into(),
                })?,
        };

        if !self.rules.values().any(|rule| rule.left == start) {
            return Err(ConstructionError::StartSymbolNotFound {
                name: self
                    .nonterminals
                    .get(&start)
                    .map_or("<unknown>", |n| n.name())
                    .into(),
            });
        }

        let mut rules = Map::default();
        rules.insert(
            RuleID::ACCEPT,
            Rule {
                id: RuleID::ACCEPT,
                left: NonterminalID::START,
                right: vec![SymbolID::N(start)],
                order: 0,
                priority: 0,
            },
        );
        rules.extend(self.rules);

        tracing::debug!(
            terminals = self.terminals.len(),
            nonterminals = self.nonterminals.len(),
            rules = rules.len(),
            "grammar defined"
        );

        Ok(Grammar {
            terminals: self.terminals,
            nonterminals: self.nonterminals,
            rules,
            start_symbol: start,
            symbols: self.symbols,
        })
    }
}
