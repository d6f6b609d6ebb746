//! Expression grammar, built from `nom` combinators.
//!
//! Precedence, lowest first: `?:`, `||`, `&&`, `== !=`, `< <= > >= ~=`,
//! `+ -`, `* / %`, prefix `! -`, then postfix `[index]`, `.field` and
//! `.method(args)`. Whitespace between tokens is ignored.
//!
//! Parsing is bounded: brackets, lists and prefix operators may nest at most
//! [`MAX_NESTING`] levels and one expression holds at most [`MAX_OPERATORS`]
//! operators, so the tree handed to the evaluator stays shallow.

use crate::error::EvaluationError;
use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{anychar, char, digit1, multispace0, satisfy},
    combinator::{all_consuming, cut, map, not, opt, recognize, value, verify},
    error::{VerboseError, VerboseErrorKind, context},
    multi::{fold_many0, separated_list0},
    sequence::{pair, preceded, terminated},
};
use serde_json::Value;
use std::cell::Cell;

pub(crate) const MAX_NESTING: usize = 64;
pub(crate) const MAX_OPERATORS: usize = 256;

const TOO_DEEP: &str = "expression nested more than 64 levels deep";
const TOO_MANY_OPERATORS: &str = "expression has more than 256 operators";

type Res<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(Value),
    List(Vec<Expr>),
    Variable(String),
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Field {
        target: Box<Expr>,
        name: String,
    },
    Call {
        target: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    RegexMatch,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// Parse a whole expression. Errors carry the byte offset where parsing
/// stopped.
pub(crate) fn parse(source: &str) -> Result<Expr, EvaluationError> {
    let grammar = Grammar::default();
    match all_consuming(terminated(|i| grammar.expression(i, 0), multispace0))(source) {
        Ok((_, expr)) => Ok(expr),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(syntax_error(source, e)),
        Err(nom::Err::Incomplete(_)) => Err(EvaluationError::Syntax {
            position: source.len(),
            message: "incomplete expression".to_string(),
        }),
    }
}

fn syntax_error(source: &str, error: VerboseError<&str>) -> EvaluationError {
    let position = error
        .errors
        .first()
        .map_or(source.len(), |(rest, _)| source.len() - rest.len());
    let message = error
        .errors
        .iter()
        .find_map(|(_, kind)| match kind {
            VerboseErrorKind::Context(message) => Some(message.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| match source.get(position..) {
            Some(rest) if !rest.is_empty() => format!("unexpected input '{}'", rest),
            _ => "unexpected end of expression".to_string(),
        });
    EvaluationError::Syntax { position, message }
}

fn failure<'a>(input: &'a str, message: &'static str) -> nom::Err<VerboseError<&'a str>> {
    nom::Err::Failure(VerboseError {
        errors: vec![(input, VerboseErrorKind::Context(message))],
    })
}

/// State of one parse: the operators seen so far.
#[derive(Default)]
struct Grammar {
    operators: Cell<usize>,
}

impl Grammar {
    fn count_operator<'a>(&self, input: &'a str) -> Result<(), nom::Err<VerboseError<&'a str>>> {
        let seen = self.operators.get() + 1;
        if seen > MAX_OPERATORS {
            return Err(failure(input, TOO_MANY_OPERATORS));
        }
        self.operators.set(seen);
        Ok(())
    }

    /// `condition ? then : otherwise`, right associative.
    fn expression<'a>(&self, input: &'a str, depth: usize) -> Res<'a, Expr> {
        if depth > MAX_NESTING {
            return Err(failure(input, TOO_DEEP));
        }
        let (input, condition) = self.or_expr(input, depth)?;
        let Ok((rest, _)) = symbol('?')(input) else {
            return Ok((input, condition));
        };
        self.count_operator(input)?;
        let (rest, then) = cut(|i| self.expression(i, depth + 1))(rest)?;
        let (rest, _) = cut(context(
            "expected ':' in conditional expression",
            symbol(':'),
        ))(rest)?;
        let (rest, otherwise) = cut(|i| self.expression(i, depth + 1))(rest)?;
        Ok((
            rest,
            Expr::Conditional {
                condition: Box::new(condition),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
        ))
    }

    fn or_expr<'a>(&self, input: &'a str, depth: usize) -> Res<'a, Expr> {
        self.binary_level(input, or_operator, |i| self.and_expr(i, depth))
    }

    fn and_expr<'a>(&self, input: &'a str, depth: usize) -> Res<'a, Expr> {
        self.binary_level(input, and_operator, |i| self.equality(i, depth))
    }

    fn equality<'a>(&self, input: &'a str, depth: usize) -> Res<'a, Expr> {
        self.binary_level(input, equality_operator, |i| self.comparison(i, depth))
    }

    fn comparison<'a>(&self, input: &'a str, depth: usize) -> Res<'a, Expr> {
        self.binary_level(input, comparison_operator, |i| self.additive(i, depth))
    }

    fn additive<'a>(&self, input: &'a str, depth: usize) -> Res<'a, Expr> {
        self.binary_level(input, additive_operator, |i| self.multiplicative(i, depth))
    }

    fn multiplicative<'a>(&self, input: &'a str, depth: usize) -> Res<'a, Expr> {
        self.binary_level(input, multiplicative_operator, |i| self.unary(i, depth))
    }

    /// Left-associative chain of `operand (operator operand)*`.
    fn binary_level<'a, O, P>(&self, input: &'a str, mut operator: O, operand: P) -> Res<'a, Expr>
    where
        O: FnMut(&'a str) -> Res<'a, BinaryOp>,
        P: Fn(&'a str) -> Res<'a, Expr>,
    {
        let (mut input, mut left) = operand(input)?;
        loop {
            let Ok((rest, op)) = operator(input) else {
                return Ok((input, left));
            };
            self.count_operator(input)?;
            let (rest, right) = cut(|i| operand(i))(rest)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
            input = rest;
        }
    }

    fn unary<'a>(&self, input: &'a str, depth: usize) -> Res<'a, Expr> {
        let (rest, op) = opt(unary_operator)(input)?;
        let Some(op) = op else {
            return self.postfix(input, depth);
        };
        if depth > MAX_NESTING {
            return Err(failure(input, TOO_DEEP));
        }
        self.count_operator(input)?;
        let (rest, operand) = cut(|i| self.unary(i, depth + 1))(rest)?;
        Ok((
            rest,
            Expr::Unary {
                op,
                operand: Box::new(operand),
            },
        ))
    }

    fn postfix<'a>(&self, input: &'a str, depth: usize) -> Res<'a, Expr> {
        let (mut input, mut expr) = self.primary(input, depth)?;
        loop {
            if let Ok((rest, _)) = symbol('[')(input) {
                self.count_operator(input)?;
                let (rest, index) = cut(terminated(
                    |i| self.expression(i, depth + 1),
                    context("expected ']' after index", symbol(']')),
                ))(rest)?;
                expr = Expr::Index {
                    target: Box::new(expr),
                    index: Box::new(index),
                };
                input = rest;
            } else if let Ok((rest, _)) = symbol('.')(input) {
                self.count_operator(input)?;
                let (rest, name) = cut(context(
                    "expected member name after '.'",
                    preceded(multispace0, identifier),
                ))(rest)?;
                let (rest, args) = opt(preceded(
                    symbol('('),
                    cut(|i| self.arguments(i, depth, ')', "expected ')' after arguments")),
                ))(rest)?;
                expr = match args {
                    Some(args) => Expr::Call {
                        target: Box::new(expr),
                        method: name.to_string(),
                        args,
                    },
                    None => Expr::Field {
                        target: Box::new(expr),
                        name: name.to_string(),
                    },
                };
                input = rest;
            } else {
                return Ok((input, expr));
            }
        }
    }

    fn primary<'a>(&self, input: &'a str, depth: usize) -> Res<'a, Expr> {
        preceded(
            multispace0,
            context(
                "expected an expression",
                alt((
                    number,
                    map(string_literal, |s| Expr::Literal(Value::String(s))),
                    map(identifier, keyword_or_variable),
                    |i| self.parenthesized(i, depth),
                    |i| self.list(i, depth),
                )),
            ),
        )(input)
    }

    fn parenthesized<'a>(&self, input: &'a str, depth: usize) -> Res<'a, Expr> {
        preceded(
            char('('),
            cut(terminated(
                |i| self.expression(i, depth + 1),
                context("expected ')'", symbol(')')),
            )),
        )(input)
    }

    fn list<'a>(&self, input: &'a str, depth: usize) -> Res<'a, Expr> {
        map(
            preceded(
                char('['),
                cut(|i| self.arguments(i, depth, ']', "expected ']' after list elements")),
            ),
            Expr::List,
        )(input)
    }

    /// Comma separated expressions up to `close`.
    fn arguments<'a>(
        &self,
        input: &'a str,
        depth: usize,
        close: char,
        message: &'static str,
    ) -> Res<'a, Vec<Expr>> {
        terminated(
            separated_list0(symbol(','), |i| self.expression(i, depth + 1)),
            context(message, symbol(close)),
        )(input)
    }
}

fn symbol<'a>(c: char) -> impl FnMut(&'a str) -> Res<'a, char> {
    preceded(multispace0, char(c))
}

fn op_token<'a>(text: &'static str) -> impl FnMut(&'a str) -> Res<'a, &'a str> {
    preceded(multispace0, tag(text))
}

fn or_operator(input: &str) -> Res<'_, BinaryOp> {
    value(BinaryOp::Or, op_token("||"))(input)
}

fn and_operator(input: &str) -> Res<'_, BinaryOp> {
    value(BinaryOp::And, op_token("&&"))(input)
}

fn equality_operator(input: &str) -> Res<'_, BinaryOp> {
    alt((
        value(BinaryOp::Eq, op_token("==")),
        value(BinaryOp::Ne, op_token("!=")),
    ))(input)
}

fn comparison_operator(input: &str) -> Res<'_, BinaryOp> {
    alt((
        value(BinaryOp::Le, op_token("<=")),
        value(BinaryOp::Ge, op_token(">=")),
        value(BinaryOp::Lt, op_token("<")),
        value(BinaryOp::Gt, op_token(">")),
        value(BinaryOp::RegexMatch, op_token("~=")),
    ))(input)
}

fn additive_operator(input: &str) -> Res<'_, BinaryOp> {
    alt((
        value(BinaryOp::Add, op_token("+")),
        value(BinaryOp::Sub, op_token("-")),
    ))(input)
}

fn multiplicative_operator(input: &str) -> Res<'_, BinaryOp> {
    alt((
        value(BinaryOp::Mul, op_token("*")),
        value(BinaryOp::Div, op_token("/")),
        value(BinaryOp::Rem, op_token("%")),
    ))(input)
}

fn unary_operator(input: &str) -> Res<'_, UnaryOp> {
    preceded(
        multispace0,
        alt((
            value(UnaryOp::Not, terminated(char('!'), not(char('=')))),
            value(UnaryOp::Negate, char('-')),
        )),
    )(input)
}

fn identifier(input: &str) -> Res<'_, &str> {
    recognize(pair(
        satisfy(|c| c.is_alphabetic() || c == '_' || c == '$'),
        take_while(|c: char| c.is_alphanumeric() || c == '_' || c == '$'),
    ))(input)
}

fn keyword_or_variable(name: &str) -> Expr {
    match name {
        "true" => Expr::Literal(Value::Bool(true)),
        "false" => Expr::Literal(Value::Bool(false)),
        "null" | "nil" => Expr::Literal(Value::Null),
        _ => Expr::Variable(name.to_string()),
    }
}

fn number_text(input: &str) -> Res<'_, &str> {
    recognize(pair(digit1, opt(pair(char('.'), digit1))))(input)
}

/// Integer or decimal literal. Signs are unary operators.
fn number(input: &str) -> Res<'_, Expr> {
    let (rest, text) = number_text(input)?;
    let literal = if text.contains('.') {
        text.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Value::from)
    } else {
        text.parse::<i64>().ok().map(Value::from)
    };
    match literal {
        Some(literal) => Ok((rest, Expr::Literal(literal))),
        None => Err(failure(input, "number literal out of range")),
    }
}

fn string_literal(input: &str) -> Res<'_, String> {
    alt((quoted('\''), quoted('"')))(input)
}

/// String between `quote` characters. `\n`, `\t` and `\r` are control
/// characters, any other escaped character stands for itself.
fn quoted<'a>(quote: char) -> impl FnMut(&'a str) -> Res<'a, String> {
    preceded(
        char(quote),
        cut(terminated(
            fold_many0(
                alt((
                    preceded(char('\\'), escape),
                    verify(anychar, move |c: &char| *c != quote && *c != '\\'),
                )),
                String::new,
                |mut text, c| {
                    text.push(c);
                    text
                },
            ),
            context("unterminated string literal", char(quote)),
        )),
    )
}

fn escape(input: &str) -> Res<'_, char> {
    alt((
        value('\n', char('n')),
        value('\t', char('t')),
        value('\r', char('r')),
        anychar,
    ))(input)
}
