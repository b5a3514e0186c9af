//! Grammar definition for integration tests.

use lrstep::{
    error::ConstructionError,
    grammar::{GrammarDef, SymbolID::*},
};

pub type Fixture = fn(&mut GrammarDef) -> Result<(), ConstructionError>;

/// Every fixture with its name.
pub const ALL: &[(&str, Fixture)] = &[
    ("parens", parens),
    ("c_s_d", c_s_d),
    ("epsilon", epsilon),
    ("pointers", pointers),
    ("with_nullable", with_nullable),
    ("g_simple1", g_simple1),
    ("g_simple2", g_simple2),
    ("g1", g1),
    ("g2", g2),
    ("g4", g4),
    ("dangling_else", dangling_else),
    ("prioritized", prioritized),
    ("hash", hash),
];

pub fn parens(g: &mut GrammarDef) -> Result<(), ConstructionError> {
    let lparen = g.terminal("(")?;
    let rparen = g.terminal(")")?;
    let a = g.terminal("a")?;
    let s = g.nonterminal("S")?;

    // S → ( S ) | a
    g.rule(s, [T(lparen), N(s), T(rparen)], None)?;
    g.rule(s, [T(a)], None)?;
    Ok(())
}

pub fn c_s_d(g: &mut GrammarDef) -> Result<(), ConstructionError> {
    let c = g.terminal("c")?;
    let d = g.terminal("d")?;
    let s = g.nonterminal("S")?;

    // S → c S d | c
    g.rule(s, [T(c), N(s), T(d)], None)?;
    g.rule(s, [T(c)], None)?;
    Ok(())
}

pub fn epsilon(g: &mut GrammarDef) -> Result<(), ConstructionError> {
    let a = g.terminal("a")?;
    let s = g.nonterminal("S")?;
    let x = g.nonterminal("A")?;

    // S → A a
    // A → ε
    g.rule(s, [N(x), T(a)], None)?;
    g.rule(x, [], None)?;
    Ok(())
}

/// The assignment grammar that is LALR(1) but not SLR(1).
pub fn pointers(g: &mut GrammarDef) -> Result<(), ConstructionError> {
    let equal = g.terminal("=")?;
    let star = g.terminal("*")?;
    let id = g.terminal("id")?;

    let s = g.nonterminal("S")?;
    let l = g.nonterminal("L")?;
    let r = g.nonterminal("R")?;

    // S → L = R | R
    // L → * R | id
    // R → L
    g.rule(s, [N(l), T(equal), N(r)], None)?;
    g.rule(s, [N(r)], None)?;
    g.rule(l, [T(star), N(r)], None)?;
    g.rule(l, [T(id)], None)?;
    g.rule(r, [N(l)], None)?;
    Ok(())
}

pub fn with_nullable(g: &mut GrammarDef) -> Result<(), ConstructionError> {
    let lparen = g.terminal("LPAREN")?;
    let rparen = g.terminal("RPAREN")?;
    let plus = g.terminal("PLUS")?;
    let num = g.terminal("NUM")?;

    let expr = g.nonterminal("EXPR")?;
    let args = g.nonterminal("ARGS")?;
    let tail = g.nonterminal("TAIL")?;

    // EXPR → NUM | LPAREN ARGS RPAREN
    // ARGS → EXPR TAIL | ε
    // TAIL → PLUS EXPR TAIL | ε
    g.rule(expr, [T(num)], None)?;
    g.rule(expr, [T(lparen), N(args), T(rparen)], None)?;
    g.rule(args, [N(expr), N(tail)], None)?;
    g.rule(args, [], None)?;
    g.rule(tail, [T(plus), N(expr), N(tail)], None)?;
    g.rule(tail, [], None)?;
    Ok(())
}

pub fn g_simple1(g: &mut GrammarDef) -> Result<(), ConstructionError> {
    let equal = g.terminal("EQUAL")?;
    let plus = g.terminal("PLUS")?;
    let ident = g.terminal("ID")?;
    let num = g.terminal("NUM")?;

    let a = g.nonterminal("A")?;
    let e = g.nonterminal("E")?;
    let t = g.nonterminal("T")?;

    g.start_symbol(a)?;

    g.rule(a, [N(e), T(equal), N(e)], None)?;
    g.rule(a, [T(ident)], None)?;
    g.rule(e, [N(e), T(plus), N(t)], None)?;
    g.rule(e, [N(t)], None)?;
    g.rule(t, [T(num)], None)?;
    g.rule(t, [T(ident)], None)?;
    Ok(())
}

pub fn g_simple2(g: &mut GrammarDef) -> Result<(), ConstructionError> {
    // declare terminal symbols.
    let lparen = g.terminal("LPAREN")?;
    let rparen = g.terminal("RPAREN")?;
    let plus = g.terminal("PLUS")?;
    let minus = g.terminal("MINUS")?;
    let star = g.terminal("STAR")?;
    let slash = g.terminal("SLASH")?;
    let num = g.terminal("NUM")?;

    // declare nonterminal symbols.
    let expr = g.nonterminal("EXPR")?;
    let factor = g.nonterminal("FACTOR")?;
    let term = g.nonterminal("TERM")?;

    g.start_symbol(expr)?;

    // declare syntax rules.
    g.rule(expr, [N(expr), T(plus), N(factor)], None)?; // expr '+' factor
    g.rule(expr, [N(expr), T(minus), N(factor)], None)?; // expr '-' factor
    g.rule(expr, [N(factor)], None)?; // factor
    g.rule(factor, [N(factor), T(star), N(term)], None)?; // factor '*' term
    g.rule(factor, [N(factor), T(slash), N(term)], None)?; // factor '/' term
    g.rule(factor, [N(term)], None)?; // term
    g.rule(term, [T(num)], None)?; // num
    g.rule(term, [T(lparen), N(expr), T(rparen)], None)?; // '(' expr ')'
    Ok(())
}

pub fn g1(g: &mut GrammarDef) -> Result<(), ConstructionError> {
    let plus = g.terminal("PLUS")?;
    let star = g.terminal("STAR")?;
    let a = g.terminal("A")?;

    let e = g.nonterminal("E")?;
    let t = g.nonterminal("T")?;

    g.start_symbol(e)?;

    g.rule(e, [N(e), T(plus), N(t)], None)?;
    g.rule(e, [N(t)], None)?;
    g.rule(t, [N(t), T(star), T(a)], None)?;
    g.rule(t, [T(a)], None)?;
    Ok(())
}

pub fn g2(g: &mut GrammarDef) -> Result<(), ConstructionError> {
    let comma = g.terminal("COMMA")?;
    let colon = g.terminal("COLON")?;
    let ident = g.terminal("ID")?;

    let def = g.nonterminal("DEF")?;
    let param_spec = g.nonterminal("PARAM_SPEC")?;
    let return_spec = g.nonterminal("RETURN_SPEC")?;
    let type_ = g.nonterminal("TYPE")?;
    let name = g.nonterminal("NAME")?;
    let name_list = g.nonterminal("NAME_LIST")?;

    g.rule(def, [N(param_spec), N(return_spec), T(comma)], None)?;
    g.rule(param_spec, [N(type_)], None)?;
    g.rule(param_spec, [N(name_list), T(colon), N(type_)], None)?;
    g.rule(return_spec, [N(type_)], None)?;
    g.rule(return_spec, [N(name), T(colon), N(type_)], None)?;
    g.rule(type_, [T(ident)], None)?;
    g.rule(name, [T(ident)], None)?;
    g.rule(name_list, [N(name)], None)?;
    g.rule(name_list, [N(name), T(comma), N(name_list)], None)?;
    Ok(())
}

pub fn g4(g: &mut GrammarDef) -> Result<(), ConstructionError> {
    let plus = g.terminal("PLUS")?;
    let lparen = g.terminal("LPAREN")?;
    let rparen = g.terminal("RPAREN")?;
    let num = g.terminal("NUM")?;

    let e = g.nonterminal("E")?;
    let t = g.nonterminal("T")?;

    // E → E + T | T
    // T → ( E ) | n
    g.rule(e, [N(e), T(plus), N(t)], None)?;
    g.rule(e, [N(t)], None)?;
    g.rule(t, [T(lparen), N(e), T(rparen)], None)?;
    g.rule(t, [T(num)], None)?;
    Ok(())
}

/// The ambiguous `if`/`else` grammar. The shift on `else` must win.
pub fn dangling_else(g: &mut GrammarDef) -> Result<(), ConstructionError> {
    let if_ = g.terminal("if")?;
    let else_ = g.terminal("else")?;
    let x = g.terminal("x")?;
    let s = g.nonterminal("S")?;

    // S → if S | if S else S | x
    g.rule(s, [T(if_), N(s)], None)?;
    g.rule(s, [T(if_), N(s), T(else_), N(s)], None)?;
    g.rule(s, [T(x)], None)?;
    Ok(())
}

/// Ambiguous binary operators ordered by rule priority alone.
pub fn prioritized(g: &mut GrammarDef) -> Result<(), ConstructionError> {
    let plus = g.terminal("+")?;
    let star = g.terminal("*")?;
    let a = g.terminal("a")?;
    let e = g.nonterminal("E")?;

    // E → E + E (1) | E * E (2) | a
    g.rule(e, [N(e), T(plus), N(e)], Some(1))?;
    g.rule(e, [N(e), T(star), N(e)], Some(2))?;
    g.rule(e, [T(a)], None)?;
    Ok(())
}

/// A user terminal spelled like the lookahead propagation marker.
pub fn hash(g: &mut GrammarDef) -> Result<(), ConstructionError> {
    let hash = g.terminal("#")?;
    let s = g.nonterminal("start")?;

    // start → # start | #
    g.rule(s, [T(hash), N(s)], None)?;
    g.rule(s, [T(hash)], None)?;
    Ok(())
}
