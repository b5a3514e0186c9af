//! Loading grammars and token streams from their JSON form.

use crate::{
    error::ConstructionError,
    grammar::{Grammar, SymbolID},
    interpreter::Token,
};
use serde::Deserialize;

/// A symbol reference inside a rule record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "__type__")]
pub enum SymbolRecord {
    Terminal { name: String },
    NonTerminal { name: String },
}

impl SymbolRecord {
    pub fn name(&self) -> &str {
        match self {
            Self::Terminal { name } | Self::NonTerminal { name } => name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RuleOptions {
    #[serde(default)]
    pub priority: Option<i32>,
}

/// A production rule as stored in the JSON grammar.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RuleRecord {
    pub origin: SymbolRecord,
    pub expansion: Vec<SymbolRecord>,
    #[serde(default)]
    pub order: Option<usize>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub options: Option<RuleOptions>,
}

impl RuleRecord {
    /// The explicit priority, falling back to the one in the rule options.
    pub fn priority(&self) -> i32 {
        self.priority
            .or_else(|| self.options.as_ref().and_then(|o| o.priority))
            .unwrap_or(0)
    }
}

pub fn rules_from_json(input: &str) -> Result<Vec<RuleRecord>, ConstructionError> {
    Ok(serde_json::from_str(input)?)
}

pub fn tokens_from_json(input: &str) -> Result<Vec<Token>, ConstructionError> {
    Ok(serde_json::from_str(input)?)
}

impl Grammar {
    /// Build a grammar from rule records.
    ///
    /// A record without an explicit order takes its position in `records`.
    pub fn from_records(records: &[RuleRecord], start: &str) -> Result<Self, ConstructionError> {
        Self::define(|g| {
            for (i, record) in records.iter().enumerate() {
                let left = match &record.origin {
                    SymbolRecord::NonTerminal { name } => g.nonterminal(name)?,
                    SymbolRecord::Terminal { name } => {
                        return Err(ConstructionError::SymbolKindMismatch { name: name.clone() })
                    }
                };
                let mut right = Vec::with_capacity(record.expansion.len());
                for symbol in &record.expansion {
                    right.push(match symbol {
                        SymbolRecord::Terminal { name } => SymbolID::T(g.terminal(name)?),
                        SymbolRecord::NonTerminal { name } => SymbolID::N(g.nonterminal(name)?),
                    });
                }
                g.rule_with_order(left, right, record.order.unwrap_or(i), record.priority())?;
            }
            g.start_symbol_by_name(start)?;
            Ok(())
        })
    }

    pub fn from_json(input: &str, start: &str) -> Result<Self, ConstructionError> {
        let records = rules_from_json(input)?;
        Self::from_records(&records, start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARENS: &str = r#"[
        {
            "origin": { "__type__": "NonTerminal", "name": "start" },
            "expansion": [
                { "__type__": "Terminal", "name": "(" },
                { "__type__": "NonTerminal", "name": "start" },
                { "__type__": "Terminal", "name": ")" }
            ],
            "order": 0
        },
        {
            "origin": { "__type__": "NonTerminal", "name": "start" },
            "expansion": [{ "__type__": "Terminal", "name": "a" }],
            "order": 1,
            "options": { "priority": 3 }
        }
    ]"#;

    #[test]
    fn load_rules() {
        let records = rules_from_json(PARENS).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].origin.name(), "start");
        assert_eq!(records[0].priority(), 0);
        assert_eq!(records[1].priority(), 3);

        let g = Grammar::from_records(&records, "start").unwrap();
        assert_eq!(g.rules.len(), 3);
        assert!(g.terminal_by_name("(").is_some());
        assert!(matches!(g.symbol("start"), Some(SymbolID::N(..))));
    }

    #[test]
    fn unknown_start_symbol() {
        let err = Grammar::from_json(PARENS, "expr").unwrap_err();
        assert!(matches!(
            err,
            ConstructionError::StartSymbolNotFound { ref name } if name == "expr"
        ));
    }

    #[test]
    fn terminal_origin_is_rejected() {
        let input = r#"[{
            "origin": { "__type__": "Terminal", "name": "a" },
            "expansion": []
        }]"#;
        assert!(matches!(
            Grammar::from_json(input, "start"),
            Err(ConstructionError::SymbolKindMismatch { .. })
        ));
    }

    #[test]
    fn load_tokens() {
        let tokens = tokens_from_json(
            r#"[
                { "type": "(", "value": "(", "line": 1, "column": 1 },
                { "type": "a", "value": "a" }
            ]"#,
        )
        .unwrap();
        assert_eq!(tokens[0].kind, "(");
        assert_eq!(tokens[0].line, Some(1));
        assert_eq!(tokens[1].end_pos, None);

        assert!(matches!(
            tokens_from_json("{"),
            Err(ConstructionError::Deserialize(..))
        ));
    }
}
