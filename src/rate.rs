//! A tiny arithmetic expression language for non-mass-action propensities.
//!
//! Grammar (loosest to tightest binding):
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := unary (('*' | '/') unary)*
//! unary  := '-' unary | atom
//! atom   := number | ident | '(' expr ')'
//! ```
//!
//! No exponentiation and no function calls. Whitespace is insignificant.
//! Numbers accept scientific notation (`1e-4`, `2.5E10`).

use std::collections::{HashMap, HashSet};

use crate::error::Error;

/// The parsed form of a rate expression, as written by the user.
#[derive(Debug, Clone, PartialEq)]
pub enum Ast {
    Lit(f64),
    Var(String),
    Neg(Box<Ast>),
    Add(Box<Ast>, Box<Ast>),
    Sub(Box<Ast>, Box<Ast>),
    Mul(Box<Ast>, Box<Ast>),
    Div(Box<Ast>, Box<Ast>),
}

impl Ast {
    /// Collects every identifier referenced anywhere in the expression.
    pub fn free_names(&self, out: &mut HashSet<String>) {
        match self {
            Ast::Lit(_) => {}
            Ast::Var(name) => {
                out.insert(name.clone());
            }
            Ast::Neg(e) => e.free_names(out),
            Ast::Add(l, r) | Ast::Sub(l, r) | Ast::Mul(l, r) | Ast::Div(l, r) => {
                l.free_names(out);
                r.free_names(out);
            }
        }
    }
}

/// Where a `Var` node resolved to, decided once per `run` rather than on
/// every evaluation of the hot loop.
#[derive(Debug, Clone, Copy)]
enum Ref {
    /// Index into the state vector; re-read every evaluation.
    Species(usize),
    /// Parameters are fixed for the whole run, so the value is baked in.
    Param(f64),
}

/// An [`Ast`] with every `Var` resolved to a [`Ref`], ready for repeated
/// evaluation in the driver's inner loop without any string lookups.
#[derive(Debug, Clone)]
pub enum ResolvedAst {
    Lit(f64),
    Ref(Ref),
    Neg(Box<ResolvedAst>),
    Add(Box<ResolvedAst>, Box<ResolvedAst>),
    Sub(Box<ResolvedAst>, Box<ResolvedAst>),
    Mul(Box<ResolvedAst>, Box<ResolvedAst>),
    Div(Box<ResolvedAst>, Box<ResolvedAst>),
}

impl ResolvedAst {
    /// Evaluates the expression against the current state. Division by
    /// zero follows IEEE-754 (±inf or NaN); the driver clamps the result,
    /// this function does not.
    pub fn eval(&self, x: &[i64]) -> f64 {
        match self {
            ResolvedAst::Lit(v) => *v,
            ResolvedAst::Ref(Ref::Species(i)) => x[*i] as f64,
            ResolvedAst::Ref(Ref::Param(v)) => *v,
            ResolvedAst::Neg(e) => -e.eval(x),
            ResolvedAst::Add(l, r) => l.eval(x) + r.eval(x),
            ResolvedAst::Sub(l, r) => l.eval(x) - r.eval(x),
            ResolvedAst::Mul(l, r) => l.eval(x) * r.eval(x),
            ResolvedAst::Div(l, r) => l.eval(x) / r.eval(x),
        }
    }
}

/// Resolves every `Var` in `ast`: the species table is tried first, then
/// `params`. A name in neither is a [`Error::MissingParameter`].
pub fn compile(
    ast: &Ast,
    species: &HashMap<String, usize>,
    params: &HashMap<String, f64>,
) -> Result<ResolvedAst, Error> {
    Ok(match ast {
        Ast::Lit(v) => ResolvedAst::Lit(*v),
        Ast::Var(name) => {
            if let Some(&idx) = species.get(name) {
                ResolvedAst::Ref(Ref::Species(idx))
            } else if let Some(&value) = params.get(name) {
                ResolvedAst::Ref(Ref::Param(value))
            } else {
                return Err(Error::MissingParameter(name.clone()));
            }
        }
        Ast::Neg(e) => ResolvedAst::Neg(Box::new(compile(e, species, params)?)),
        Ast::Add(l, r) => ResolvedAst::Add(
            Box::new(compile(l, species, params)?),
            Box::new(compile(r, species, params)?),
        ),
        Ast::Sub(l, r) => ResolvedAst::Sub(
            Box::new(compile(l, species, params)?),
            Box::new(compile(r, species, params)?),
        ),
        Ast::Mul(l, r) => ResolvedAst::Mul(
            Box::new(compile(l, species, params)?),
            Box::new(compile(r, species, params)?),
        ),
        Ast::Div(l, r) => ResolvedAst::Div(
            Box::new(compile(l, species, params)?),
            Box::new(compile(r, species, params)?),
        ),
    })
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn lex(s: &str) -> Option<Vec<Token>> {
    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;
    let mut tokens = Vec::new();
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                if i < chars.len() && chars[i] == '.' {
                    i += 1;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mark = i;
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        while j < chars.len() && chars[j].is_ascii_digit() {
                            j += 1;
                        }
                        i = j;
                    } else {
                        i = mark;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(Token::Num(text.parse().ok()?));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            _ => return None,
        }
    }
    Some(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        self.pos += 1;
        tok
    }

    fn parse_expr(&mut self) -> Option<Ast> {
        let mut lhs = self.parse_term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.advance();
                    lhs = Ast::Add(Box::new(lhs), Box::new(self.parse_term()?));
                }
                Some(Token::Minus) => {
                    self.advance();
                    lhs = Ast::Sub(Box::new(lhs), Box::new(self.parse_term()?));
                }
                _ => break,
            }
        }
        Some(lhs)
    }

    fn parse_term(&mut self) -> Option<Ast> {
        let mut lhs = self.parse_unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.advance();
                    lhs = Ast::Mul(Box::new(lhs), Box::new(self.parse_unary()?));
                }
                Some(Token::Slash) => {
                    self.advance();
                    lhs = Ast::Div(Box::new(lhs), Box::new(self.parse_unary()?));
                }
                _ => break,
            }
        }
        Some(lhs)
    }

    fn parse_unary(&mut self) -> Option<Ast> {
        if let Some(Token::Minus) = self.peek() {
            self.advance();
            return Some(Ast::Neg(Box::new(self.parse_unary()?)));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Option<Ast> {
        match self.advance()?.clone() {
            Token::Num(v) => Some(Ast::Lit(v)),
            Token::Ident(name) => Some(Ast::Var(name)),
            Token::LParen => {
                let e = self.parse_expr()?;
                match self.advance() {
                    Some(Token::RParen) => Some(e),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

/// Parses a rate expression. Any malformed input — an unrecognized
/// character, an unmatched parenthesis, a missing operand, or trailing
/// garbage — is reported identically; the caller wraps it into
/// [`Error::RateExpressionNotUnderstood`] with the original text.
pub fn parse(source: &str) -> Result<Ast, ()> {
    let tokens = lex(source).ok_or(())?;
    let mut parser = Parser { tokens: &tokens, pos: 0 };
    let ast = parser.parse_expr().ok_or(())?;
    if parser.pos != tokens.len() {
        return Err(());
    }
    Ok(ast)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(ast: &Ast) -> HashSet<String> {
        let mut out = HashSet::new();
        ast.free_names(&mut out);
        out
    }

    #[test]
    fn parses_literal() {
        assert_eq!(parse("4.2").unwrap(), Ast::Lit(4.2));
    }

    #[test]
    fn parses_scientific_notation() {
        assert_eq!(parse("1e-4").unwrap(), Ast::Lit(1e-4));
        assert_eq!(parse("2.5E10").unwrap(), Ast::Lit(2.5e10));
    }

    #[test]
    fn precedence_and_associativity() {
        // 2 + 3 * 4 - 1 == 13, left-to-right among equal precedence
        let ast = parse("2 + 3 * 4 - 1").unwrap();
        assert_eq!(
            ast,
            Ast::Sub(
                Box::new(Ast::Add(
                    Box::new(Ast::Lit(2.0)),
                    Box::new(Ast::Mul(Box::new(Ast::Lit(3.0)), Box::new(Ast::Lit(4.0))))
                )),
                Box::new(Ast::Lit(1.0)),
            )
        );
    }

    #[test]
    fn unary_minus_binds_tighter_than_multiplication() {
        let ast = parse("-2 * 3").unwrap();
        assert_eq!(
            ast,
            Ast::Mul(Box::new(Ast::Neg(Box::new(Ast::Lit(2.0)))), Box::new(Ast::Lit(3.0)))
        );
    }

    #[test]
    fn parses_michaelis_menten_rate() {
        let ast = parse("V * A / (Km + A)").unwrap();
        assert_eq!(names(&ast), HashSet::from(["V".to_string(), "A".to_string(), "Km".to_string()]));
    }

    #[test]
    fn whitespace_insignificant() {
        assert_eq!(parse("1+2").unwrap(), parse(" 1 + 2 ").unwrap());
    }

    #[test]
    fn rejects_unmatched_paren() {
        assert!(parse("(1 + 2").is_err());
        assert!(parse("1 + 2)").is_err());
    }

    #[test]
    fn rejects_missing_operand() {
        assert!(parse("1 +").is_err());
        assert!(parse("* 1").is_err());
    }

    #[test]
    fn rejects_unrecognized_character() {
        assert!(parse("1 ^ 2").is_err());
        assert!(parse("A & B").is_err());
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(parse("1 + 2 3").is_err());
    }

    #[test]
    fn compile_resolves_species_before_params() {
        let ast = parse("A").unwrap();
        let species = HashMap::from([("A".to_string(), 0usize)]);
        let params = HashMap::from([("A".to_string(), 99.0)]);
        let resolved = compile(&ast, &species, &params).unwrap();
        assert_eq!(resolved.eval(&[7]), 7.0);
    }

    #[test]
    fn compile_missing_name_is_an_error() {
        let ast = parse("k * A").unwrap();
        let species = HashMap::from([("A".to_string(), 0usize)]);
        let params = HashMap::new();
        assert_eq!(
            compile(&ast, &species, &params).unwrap_err(),
            Error::MissingParameter("k".to_string())
        );
    }
}
