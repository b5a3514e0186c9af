//! Parse trees.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTree {
    pub symbol: String,
    pub kind: ParseTreeKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseTreeKind {
    /// A shifted token and its lexeme.
    Leaf(String),
    /// A reduced rule and the trees of its right-hand side.
    Node(Vec<ParseTree>),
}

impl ParseTree {
    pub fn leaf(symbol: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            kind: ParseTreeKind::Leaf(value.into()),
        }
    }

    pub fn node(symbol: impl Into<String>, children: Vec<ParseTree>) -> Self {
        Self {
            symbol: symbol.into(),
            kind: ParseTreeKind::Node(children),
        }
    }

    pub fn children(&self) -> &[ParseTree] {
        match &self.kind {
            ParseTreeKind::Node(children) => children,
            ParseTreeKind::Leaf(..) => &[],
        }
    }

    pub fn value(&self) -> Option<&str> {
        match &self.kind {
            ParseTreeKind::Leaf(value) => Some(value),
            ParseTreeKind::Node(..) => None,
        }
    }
}

/// `S("(", S("a"), ")")`
impl fmt::Display for ParseTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ParseTreeKind::Leaf(value) => write!(f, "{:?}", value),
            ParseTreeKind::Node(children) => {
                write!(f, "{}(", self.symbol)?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", child)?;
                }
                f.write_str(")")
            }
        }
    }
}
