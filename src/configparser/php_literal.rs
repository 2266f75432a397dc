//! Safe parsing of the code-style configuration dialect (§4.3).
//!
//! Follows the `policy_exprs` mini-language pattern: a `logos` lexer
//! feeds `nom` combinators running over the token stream (not raw text)
//! that build a restricted expression AST, which is then evaluated
//! directly into JSON — never through a general-purpose interpreter.
//! Only the first top-level `return <literal-expression>;` is
//! evaluated; anything else at the top level is ignored with a
//! warning, and any construct inside the expression that falls outside
//! the allowlisted grammar aborts just that expression the same way.

use logos::Logos;
use nom::{
    Finish as _, IResult,
    branch::alt,
    combinator::{map, opt},
    error::{Error as NomError, ErrorKind},
    multi::{fold_many0, separated_list0},
    sequence::preceded,
};
use serde_json::{Map, Value};

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*([^*]|\*[^/])*\*/")]
pub enum Token {
    #[token("<?php")]
    OpenTag,

    #[token("return")]
    Return,

    #[token("array")]
    ArrayKeyword,

    #[token("(")]
    OpenParen,

    #[token(")")]
    CloseParen,

    #[token("[")]
    OpenBracket,

    #[token("]")]
    CloseBracket,

    #[token("=>")]
    FatArrow,

    #[token(",")]
    Comma,

    #[token(";")]
    Semicolon,

    #[token(".")]
    Dot,

    #[token("true", |_| true)]
    #[token("TRUE", |_| true)]
    #[token("false", |_| false)]
    #[token("FALSE", |_| false)]
    Bool(bool),

    #[token("null", priority = 3)]
    #[token("NULL", priority = 3)]
    Null,

    #[regex(r"-?[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),

    #[regex(r"-?[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Integer(i64),

    #[regex(r#"'([^'\\]|\\.)*'"#, |lex| unescape_single(lex.slice()))]
    SingleQuoted(String),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape_double(lex.slice()))]
    DoubleQuoted(String),

    #[regex(r"[A-Za-z_\\][A-Za-z0-9_\\]*", |lex| lex.slice().to_owned(), priority = 1)]
    Ident(String),
}

fn unescape_single(raw: &str) -> Option<String> {
    let inner = &raw[1..raw.len() - 1];
    Some(inner.replace("\\'", "'").replace("\\\\", "\\"))
}

fn unescape_double(raw: &str) -> Option<String> {
    let inner = &raw[1..raw.len() - 1];
    Some(
        inner
            .replace("\\\"", "\"")
            .replace("\\n", "\n")
            .replace("\\t", "\t")
            .replace("\\\\", "\\"),
    )
}

pub fn tokenize(source: &str) -> Vec<Token> {
    Token::lexer(source).filter_map(Result::ok).collect()
}

/// The restricted literal-expression grammar (§4.3): scalars, arrays
/// (sequence or associative, PHP's `array(...)`/`[...]` both accepted),
/// constant references (resolved only against the caller's allowlist),
/// and string concatenation via `.`.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralExpr {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    ConstRef(String),
    Concat(Box<LiteralExpr>, Box<LiteralExpr>),
    Sequence(Vec<LiteralExpr>),
    Map(Vec<(LiteralExpr, LiteralExpr)>),
}

pub struct ParseLimits {
    pub max_depth: usize,
}

impl Default for ParseLimits {
    fn default() -> Self {
        ParseLimits { max_depth: 50 }
    }
}

type Input<'a> = &'a [Token];
type PResult<'a, O> = IResult<Input<'a>, O, NomError<Input<'a>>>;

/// A single array entry before it's sorted into sequence or map style.
enum ArrayEntry {
    Bare(LiteralExpr),
    Keyed(LiteralExpr, LiteralExpr),
}

/// Matches and consumes one specific punctuation/keyword token.
fn tok<'a>(expected: Token) -> impl Fn(Input<'a>) -> PResult<'a, &'a Token> {
    move |input: Input<'a>| match input.split_first() {
        Some((t, rest)) if *t == expected => Ok((rest, t)),
        _ => Err(nom::Err::Error(NomError::new(input, ErrorKind::Tag))),
    }
}

/// Matches and consumes one token satisfying `pred`.
fn satisfy<'a, F: Fn(&Token) -> bool>(pred: F) -> impl Fn(Input<'a>) -> PResult<'a, &'a Token> {
    move |input: Input<'a>| match input.split_first() {
        Some((t, rest)) if pred(t) => Ok((rest, t)),
        _ => Err(nom::Err::Error(NomError::new(input, ErrorKind::Satisfy))),
    }
}

fn null_lit(input: Input<'_>) -> PResult<'_, LiteralExpr> {
    map(tok(Token::Null), |_| LiteralExpr::Null)(input)
}

fn bool_lit(input: Input<'_>) -> PResult<'_, LiteralExpr> {
    map(satisfy(|t| matches!(t, Token::Bool(_))), |t| match t {
        Token::Bool(b) => LiteralExpr::Bool(*b),
        _ => unreachable!(),
    })(input)
}

fn int_lit(input: Input<'_>) -> PResult<'_, LiteralExpr> {
    map(satisfy(|t| matches!(t, Token::Integer(_))), |t| match t {
        Token::Integer(n) => LiteralExpr::Int(*n),
        _ => unreachable!(),
    })(input)
}

fn float_lit(input: Input<'_>) -> PResult<'_, LiteralExpr> {
    map(satisfy(|t| matches!(t, Token::Float(_))), |t| match t {
        Token::Float(f) => LiteralExpr::Float(*f),
        _ => unreachable!(),
    })(input)
}

fn string_lit(input: Input<'_>) -> PResult<'_, LiteralExpr> {
    map(
        satisfy(|t| matches!(t, Token::SingleQuoted(_) | Token::DoubleQuoted(_))),
        |t| match t {
            Token::SingleQuoted(s) | Token::DoubleQuoted(s) => LiteralExpr::Str(s.clone()),
            _ => unreachable!(),
        },
    )(input)
}

fn ident_lit(input: Input<'_>) -> PResult<'_, LiteralExpr> {
    map(satisfy(|t| matches!(t, Token::Ident(_))), |t| match t {
        Token::Ident(name) => LiteralExpr::ConstRef(name.clone()),
        _ => unreachable!(),
    })(input)
}

/// Parses `tokens` looking for the first top-level `return <expr>;`. All
/// other top-level content (assignments, function calls, anything that
/// isn't a bare `return` statement) is skipped, which is how class
/// definitions, `use` imports and the like in a real config file are
/// tolerated without ever being evaluated.
pub fn find_and_parse_return(tokens: &[Token], limits: &ParseLimits) -> Result<LiteralExpr, String> {
    let mut i = 0;
    while i < tokens.len() {
        if matches!(tokens[i], Token::Return) {
            let rest = &tokens[i + 1..];
            return match parse_expr(rest, 0, limits).finish() {
                Ok((remaining, expr)) => match remaining.first() {
                    Some(Token::Semicolon) => Ok(expr),
                    _ => Err("expected ';' after return expression".to_owned()),
                },
                Err(e) => Err(format!(
                    "failed to parse return expression (kind {:?}, {} tokens remaining)",
                    e.code,
                    e.input.len()
                )),
            };
        }
        i += 1;
    }
    Err("no top-level return statement found".to_owned())
}

fn parse_expr<'a>(input: Input<'a>, depth: usize, limits: &ParseLimits) -> PResult<'a, LiteralExpr> {
    if depth > limits.max_depth {
        return Err(nom::Err::Error(NomError::new(input, ErrorKind::TooLarge)));
    }
    let (input, first) = parse_primary(input, depth, limits)?;
    fold_many0(
        preceded(tok(Token::Dot), |i| parse_primary(i, depth, limits)),
        move || first.clone(),
        |acc, next| LiteralExpr::Concat(Box::new(acc), Box::new(next)),
    )(input)
}

fn parse_primary<'a>(input: Input<'a>, depth: usize, limits: &ParseLimits) -> PResult<'a, LiteralExpr> {
    alt((
        null_lit,
        bool_lit,
        int_lit,
        float_lit,
        string_lit,
        ident_lit,
        |i| parse_array_keyword(i, depth, limits),
        |i| parse_bracket_array(i, depth, limits),
        |i| parse_paren_expr(i, depth, limits),
    ))(input)
}

fn parse_array_keyword<'a>(input: Input<'a>, depth: usize, limits: &ParseLimits) -> PResult<'a, LiteralExpr> {
    let (input, _) = tok(Token::ArrayKeyword)(input)?;
    let (input, _) = tok(Token::OpenParen)(input)?;
    parse_array_body(input, depth + 1, limits, Token::CloseParen)
}

fn parse_bracket_array<'a>(input: Input<'a>, depth: usize, limits: &ParseLimits) -> PResult<'a, LiteralExpr> {
    let (input, _) = tok(Token::OpenBracket)(input)?;
    parse_array_body(input, depth + 1, limits, Token::CloseBracket)
}

fn parse_paren_expr<'a>(input: Input<'a>, depth: usize, limits: &ParseLimits) -> PResult<'a, LiteralExpr> {
    let (input, _) = tok(Token::OpenParen)(input)?;
    let (input, inner) = parse_expr(input, depth, limits)?;
    let (input, _) = tok(Token::CloseParen)(input)?;
    Ok((input, inner))
}

fn parse_array_entry<'a>(input: Input<'a>, depth: usize, limits: &ParseLimits) -> PResult<'a, ArrayEntry> {
    let (input, first) = parse_expr(input, depth, limits)?;
    match tok(Token::FatArrow)(input) {
        Ok((input, _)) => {
            let (input, value) = parse_expr(input, depth, limits)?;
            Ok((input, ArrayEntry::Keyed(first, value)))
        }
        Err(_) => Ok((input, ArrayEntry::Bare(first))),
    }
}

/// Parses comma-separated array entries up to (and consuming) `closer`.
/// Entries are either `key => value` or bare `value` (sequence style);
/// mixing both in one literal is allowed, matching PHP's own `array()`.
fn parse_array_body<'a>(
    input: Input<'a>,
    depth: usize,
    limits: &ParseLimits,
    closer: Token,
) -> PResult<'a, LiteralExpr> {
    if let Ok((rest, _)) = tok(closer.clone())(input) {
        return Ok((rest, LiteralExpr::Sequence(Vec::new())));
    }

    let (input, entries) =
        separated_list0(tok(Token::Comma), |i| parse_array_entry(i, depth, limits))(input)?;
    let (input, _) = opt(tok(Token::Comma))(input)?;
    let (input, _) = tok(closer)(input)?;

    let is_map = entries.iter().any(|e| matches!(e, ArrayEntry::Keyed(_, _)));
    let expr = if is_map {
        LiteralExpr::Map(
            entries
                .into_iter()
                .filter_map(|e| match e {
                    ArrayEntry::Keyed(k, v) => Some((k, v)),
                    ArrayEntry::Bare(_) => None,
                })
                .collect(),
        )
    } else {
        LiteralExpr::Sequence(
            entries
                .into_iter()
                .map(|e| match e {
                    ArrayEntry::Bare(v) => v,
                    ArrayEntry::Keyed(_, _) => unreachable!(),
                })
                .collect(),
        )
    };

    Ok((input, expr))
}

/// Evaluates a parsed literal expression into JSON. `resolve_const` is
/// the caller's closed allowlist; any identifier it doesn't recognize
/// fails evaluation rather than silently resolving to null.
pub fn evaluate(
    expr: &LiteralExpr,
    resolve_const: &dyn Fn(&str) -> Option<Value>,
) -> Result<Value, String> {
    match expr {
        LiteralExpr::Null => Ok(Value::Null),
        LiteralExpr::Bool(b) => Ok(Value::Bool(*b)),
        LiteralExpr::Int(n) => Ok(Value::from(*n)),
        LiteralExpr::Float(f) => Ok(Value::from(*f)),
        LiteralExpr::Str(s) => Ok(Value::String(s.clone())),
        LiteralExpr::ConstRef(name) => resolve_const(name)
            .ok_or_else(|| format!("reference to unallowlisted identifier '{name}'")),
        LiteralExpr::Concat(a, b) => {
            let a = evaluate(a, resolve_const)?;
            let b = evaluate(b, resolve_const)?;
            match (a, b) {
                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
                _ => Err("concatenation operands must both be strings".to_owned()),
            }
        }
        LiteralExpr::Sequence(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(evaluate(item, resolve_const)?);
            }
            Ok(Value::Array(out))
        }
        LiteralExpr::Map(entries) => {
            let mut out = Map::new();
            for (key, value) in entries {
                let key = evaluate(key, resolve_const)?;
                let key = key
                    .as_str()
                    .map(str::to_owned)
                    .or_else(|| key.as_i64().map(|n| n.to_string()))
                    .ok_or_else(|| "array key must be a string or integer literal".to_owned())?;
                out.insert(key, evaluate(value, resolve_const)?);
            }
            Ok(Value::Object(out))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_constants(_: &str) -> Option<Value> {
        None
    }

    #[test]
    fn parses_nested_associative_and_sequence_arrays() {
        let source = r#"<?php
return array(
    'DB' => array(
        'Connections' => array(
            'Default' => array(
                'host' => 'localhost',
                'port' => 3306,
            ),
        ),
    ),
    'tags' => ['a', 'b', 'c'],
);
"#;
        let tokens = tokenize(source);
        let expr = find_and_parse_return(&tokens, &ParseLimits::default()).unwrap();
        let value = evaluate(&expr, &no_constants).unwrap();
        assert_eq!(value["DB"]["Connections"]["Default"]["host"], "localhost");
        assert_eq!(value["DB"]["Connections"]["Default"]["port"], 3306);
        assert_eq!(value["tags"][1], "b");
    }

    #[test]
    fn concatenates_literal_strings() {
        let tokens = tokenize(r#"return 'foo' . 'bar';"#);
        let expr = find_and_parse_return(&tokens, &ParseLimits::default()).unwrap();
        let value = evaluate(&expr, &no_constants).unwrap();
        assert_eq!(value, "foobar");
    }

    #[test]
    fn resolves_allowlisted_constant_references() {
        let tokens = tokenize(r#"return PHP_VERSION_ID;"#);
        let expr = find_and_parse_return(&tokens, &ParseLimits::default()).unwrap();
        let resolver = |name: &str| -> Option<Value> {
            (name == "PHP_VERSION_ID").then(|| Value::from(80300))
        };
        let value = evaluate(&expr, &resolver).unwrap();
        assert_eq!(value, 80300);
    }

    #[test]
    fn unallowlisted_constant_fails_evaluation_without_panicking() {
        let tokens = tokenize(r#"return SOME_RANDOM_CONSTANT;"#);
        let expr = find_and_parse_return(&tokens, &ParseLimits::default()).unwrap();
        assert!(evaluate(&expr, &no_constants).is_err());
    }

    #[test]
    fn dangerous_function_call_statement_is_never_evaluated() {
        // Only the return statement is inspected; a preceding call-like
        // construct (which this grammar can't even represent as a call)
        // is simply skipped over while scanning for `return`.
        let tokens = tokenize(r#"<?php
eval($_GET['x']);
return array('safe' => true);
"#);
        let expr = find_and_parse_return(&tokens, &ParseLimits::default()).unwrap();
        let value = evaluate(&expr, &no_constants).unwrap();
        assert_eq!(value["safe"], true);
    }

    #[test]
    fn excessive_nesting_is_rejected() {
        let mut source = String::from("return ");
        for _ in 0..60 {
            source.push_str("array(");
        }
        source.push('1');
        for _ in 0..60 {
            source.push(')');
        }
        source.push(';');

        let tokens = tokenize(&source);
        let limits = ParseLimits { max_depth: 50 };
        assert!(find_and_parse_return(&tokens, &limits).is_err());
    }
}
