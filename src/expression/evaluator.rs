//! Tree-walking evaluator for parsed expressions.

use super::ExpressionEvaluator;
use super::parser::{BinaryOp, Expr, UnaryOp, parse};
use crate::context::TranslationContext;
use crate::error::EvaluationError;
use regex::Regex;
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// The built-in expression language.
///
/// A small MVEL-like grammar over JSON values: variables from the context,
/// indexing, method calls, arithmetic, comparisons, regex matching (`~=`),
/// boolean logic and the ternary operator. Evaluation has no side effects.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardEvaluator;

impl StandardEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl ExpressionEvaluator for StandardEvaluator {
    fn evaluate(
        &self,
        expression: &str,
        context: &TranslationContext,
    ) -> Result<Value, EvaluationError> {
        let expr = parse(expression)?;
        eval(&expr, context)
    }
}

fn eval(expr: &Expr, context: &TranslationContext) -> Result<Value, EvaluationError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::List(items) => items
            .iter()
            .map(|item| eval(item, context))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Expr::Variable(name) => context
            .get(name)
            .cloned()
            .ok_or_else(|| EvaluationError::UnknownVariable(name.clone())),
        Expr::Index { target, index } => {
            let target = eval(target, context)?;
            let index = eval(index, context)?;
            index_value(&target, &index)
        }
        Expr::Field { target, name } => match eval(target, context)? {
            Value::Object(map) => Ok(map.get(name).cloned().unwrap_or(Value::Null)),
            Value::Null => Err(EvaluationError::NullReference {
                message: format!("field '{}' accessed on null", name),
            }),
            other => Err(EvaluationError::Type {
                message: format!("{} has no field '{}'", type_name(&other), name),
            }),
        },
        Expr::Call {
            target,
            method,
            args,
        } => {
            let receiver = eval(target, context)?;
            let args = args
                .iter()
                .map(|arg| eval(arg, context))
                .collect::<Result<Vec<_>, _>>()?;
            call_method(&receiver, method, &args)
        }
        Expr::Unary { op, operand } => {
            let value = eval(operand, context)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!require_bool(&value, "!")?)),
                UnaryOp::Negate => negate(&value),
            }
        }
        Expr::Binary { op, left, right } => match op {
            BinaryOp::And => {
                if !require_bool(&eval(left, context)?, "&&")? {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(require_bool(&eval(right, context)?, "&&")?))
            }
            BinaryOp::Or => {
                if require_bool(&eval(left, context)?, "||")? {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(require_bool(&eval(right, context)?, "||")?))
            }
            _ => {
                let left = eval(left, context)?;
                let right = eval(right, context)?;
                binary(*op, &left, &right)
            }
        },
        Expr::Conditional {
            condition,
            then,
            otherwise,
        } => {
            if require_bool(&eval(condition, context)?, "?:")? {
                eval(then, context)
            } else {
                eval(otherwise, context)
            }
        }
    }
}

/// Name of the JSON type of a value, for error messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "decimal",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

/// Plain text rendering of a value: strings are not quoted, `null` renders
/// as `null`, composites render as JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn require_bool(value: &Value, operator: &str) -> Result<bool, EvaluationError> {
    value.as_bool().ok_or_else(|| EvaluationError::Type {
        message: format!("operator '{}' requires boolean, got {}", operator, type_name(value)),
    })
}

fn index_value(target: &Value, index: &Value) -> Result<Value, EvaluationError> {
    match (target, index) {
        (Value::Null, _) => Err(EvaluationError::NullReference {
            message: format!("index [{}] applied to null", display_value(index)),
        }),
        (Value::Object(map), Value::String(key)) => {
            Ok(map.get(key).cloned().unwrap_or(Value::Null))
        }
        (Value::Array(items), Value::Number(n)) => {
            let i = n.as_i64().ok_or_else(|| EvaluationError::Type {
                message: format!("list index must be an integer, got {}", n),
            })?;
            list_get(items, i)
        }
        (Value::String(s), Value::Number(n)) => {
            let chars: Vec<Value> = s.chars().map(|c| Value::String(c.to_string())).collect();
            let i = n.as_i64().ok_or_else(|| EvaluationError::Type {
                message: format!("string index must be an integer, got {}", n),
            })?;
            list_get(&chars, i)
        }
        (target, index) => Err(EvaluationError::Type {
            message: format!(
                "can not index {} with {}",
                type_name(target),
                type_name(index)
            ),
        }),
    }
}

fn list_get(items: &[Value], index: i64) -> Result<Value, EvaluationError> {
    usize::try_from(index)
        .ok()
        .and_then(|i| items.get(i))
        .cloned()
        .ok_or(EvaluationError::IndexOutOfBounds {
            index,
            len: items.len(),
        })
}

fn negate(value: &Value) -> Result<Value, EvaluationError> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.checked_neg()
                    .map(Value::from)
                    .ok_or_else(|| EvaluationError::Type {
                        message: "integer overflow".to_string(),
                    })
            } else {
                Ok(Value::from(-n.as_f64().unwrap_or_default()))
            }
        }
        other => Err(EvaluationError::Type {
            message: format!("can not negate {}", type_name(other)),
        }),
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a == b,
            _ => a.as_f64() == b.as_f64(),
        },
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value) -> Result<Ordering, EvaluationError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
                return Ok(a.cmp(&b));
            }
            let (a, b) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
            a.partial_cmp(&b).ok_or_else(|| EvaluationError::Type {
                message: "numbers are not comparable".to_string(),
            })
        }
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        (left, right) => Err(EvaluationError::Type {
            message: format!(
                "can not compare {} with {}",
                type_name(left),
                type_name(right)
            ),
        }),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvaluationError> {
    let result = match op {
        BinaryOp::Eq => Value::Bool(values_equal(left, right)),
        BinaryOp::Ne => Value::Bool(!values_equal(left, right)),
        BinaryOp::Lt => Value::Bool(compare(left, right)? == Ordering::Less),
        BinaryOp::Le => Value::Bool(compare(left, right)? != Ordering::Greater),
        BinaryOp::Gt => Value::Bool(compare(left, right)? == Ordering::Greater),
        BinaryOp::Ge => Value::Bool(compare(left, right)? != Ordering::Less),
        BinaryOp::RegexMatch => {
            let (Value::String(text), Value::String(pattern)) = (left, right) else {
                return Err(EvaluationError::Type {
                    message: format!(
                        "'~=' requires string operands, got {} and {}",
                        type_name(left),
                        type_name(right)
                    ),
                });
            };
            Value::Bool(full_match(pattern, text)?)
        }
        BinaryOp::Add => match (left, right) {
            (Value::String(_), _) | (_, Value::String(_)) => {
                Value::String(format!("{}{}", display_value(left), display_value(right)))
            }
            _ => arithmetic(op, left, right)?,
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            arithmetic(op, left, right)?
        }
        BinaryOp::And | BinaryOp::Or => {
            // short circuit operators are handled by eval
            Value::Bool(require_bool(left, "&&")? && require_bool(right, "&&")?)
        }
    };
    Ok(result)
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvaluationError> {
    let (Value::Number(a), Value::Number(b)) = (left, right) else {
        return Err(EvaluationError::Type {
            message: format!(
                "arithmetic on {} and {}",
                type_name(left),
                type_name(right)
            ),
        });
    };
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        let result = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Div | BinaryOp::Rem if b == 0 => {
                return Err(EvaluationError::DivisionByZero);
            }
            BinaryOp::Div => a.checked_div(b),
            BinaryOp::Rem => a.checked_rem(b),
            _ => None,
        };
        return result.map(Value::from).ok_or_else(|| EvaluationError::Type {
            message: "integer overflow".to_string(),
        });
    }
    let (a, b) = (a.as_f64().unwrap_or_default(), b.as_f64().unwrap_or_default());
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Rem => a % b,
        _ => f64::NAN,
    };
    if result.is_finite() {
        return Ok(Value::from(result));
    }
    match op {
        BinaryOp::Div | BinaryOp::Rem if b == 0.0 => Err(EvaluationError::DivisionByZero),
        _ => Err(EvaluationError::Type {
            message: format!("arithmetic on {} and {} is not a finite number", a, b),
        }),
    }
}

fn compile_regex(pattern: &str) -> Result<Regex, EvaluationError> {
    Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| EvaluationError::InvalidRegex {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

fn full_match(pattern: &str, text: &str) -> Result<bool, EvaluationError> {
    Ok(compile_regex(pattern)?.is_match(text))
}

fn arg<'a>(args: &'a [Value], index: usize, method: &str) -> Result<&'a Value, EvaluationError> {
    args.get(index).ok_or_else(|| EvaluationError::Type {
        message: format!("method '{}' expects at least {} argument(s)", method, index + 1),
    })
}

fn arg_str<'a>(args: &'a [Value], index: usize, method: &str) -> Result<&'a str, EvaluationError> {
    let value = arg(args, index, method)?;
    value.as_str().ok_or_else(|| EvaluationError::Type {
        message: format!(
            "argument {} of '{}' must be a string, got {}",
            index + 1,
            method,
            type_name(value)
        ),
    })
}

fn arg_int(args: &[Value], index: usize, method: &str) -> Result<i64, EvaluationError> {
    let value = arg(args, index, method)?;
    value.as_i64().ok_or_else(|| EvaluationError::Type {
        message: format!(
            "argument {} of '{}' must be an integer, got {}",
            index + 1,
            method,
            type_name(value)
        ),
    })
}

fn call_method(receiver: &Value, method: &str, args: &[Value]) -> Result<Value, EvaluationError> {
    if method == "toString" {
        return match receiver {
            Value::Null => Err(EvaluationError::NullReference {
                message: "toString() called on null".to_string(),
            }),
            other => Ok(Value::String(display_value(other))),
        };
    }
    match receiver {
        Value::Null => Err(EvaluationError::NullReference {
            message: format!("{}() called on null", method),
        }),
        Value::String(s) => string_method(s, method, args),
        Value::Array(items) => list_method(items, method, args),
        Value::Object(map) => map_method(map, method, args),
        other => Err(EvaluationError::UnknownMethod {
            method: method.to_string(),
            receiver: type_name(other).to_string(),
        }),
    }
}

fn string_method(s: &str, method: &str, args: &[Value]) -> Result<Value, EvaluationError> {
    let value = match method {
        "length" | "size" => Value::from(s.chars().count()),
        "isEmpty" => Value::Bool(s.is_empty()),
        "contains" => Value::Bool(s.contains(arg_str(args, 0, method)?)),
        "startsWith" => Value::Bool(s.starts_with(arg_str(args, 0, method)?)),
        "endsWith" => Value::Bool(s.ends_with(arg_str(args, 0, method)?)),
        "toLowerCase" => Value::String(s.to_lowercase()),
        "toUpperCase" => Value::String(s.to_uppercase()),
        "trim" => Value::String(s.trim().to_string()),
        "matches" => Value::Bool(full_match(arg_str(args, 0, method)?, s)?),
        "replace" => Value::String(s.replace(arg_str(args, 0, method)?, arg_str(args, 1, method)?)),
        "split" => {
            let pattern = arg_str(args, 0, method)?;
            let regex = Regex::new(pattern).map_err(|e| EvaluationError::InvalidRegex {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;
            Value::Array(
                regex
                    .split(s)
                    .map(|part| Value::String(part.to_string()))
                    .collect(),
            )
        }
        "substring" => {
            let chars: Vec<char> = s.chars().collect();
            let start = arg_int(args, 0, method)?;
            let end = if args.len() > 1 {
                arg_int(args, 1, method)?
            } else {
                chars.len() as i64
            };
            let (Ok(start), Ok(end)) = (usize::try_from(start), usize::try_from(end)) else {
                return Err(EvaluationError::IndexOutOfBounds {
                    index: start.min(end),
                    len: chars.len(),
                });
            };
            if start > end || end > chars.len() {
                return Err(EvaluationError::IndexOutOfBounds {
                    index: end as i64,
                    len: chars.len(),
                });
            }
            Value::String(chars[start..end].iter().collect())
        }
        _ => {
            return Err(EvaluationError::UnknownMethod {
                method: method.to_string(),
                receiver: "string".to_string(),
            });
        }
    };
    Ok(value)
}

fn list_method(items: &[Value], method: &str, args: &[Value]) -> Result<Value, EvaluationError> {
    let value = match method {
        "size" | "length" => Value::from(items.len()),
        "isEmpty" => Value::Bool(items.is_empty()),
        "contains" => {
            let needle = arg(args, 0, method)?;
            Value::Bool(items.iter().any(|item| values_equal(item, needle)))
        }
        "get" => list_get(items, arg_int(args, 0, method)?)?,
        _ => {
            return Err(EvaluationError::UnknownMethod {
                method: method.to_string(),
                receiver: "list".to_string(),
            });
        }
    };
    Ok(value)
}

fn map_method(
    map: &Map<String, Value>,
    method: &str,
    args: &[Value],
) -> Result<Value, EvaluationError> {
    let value = match method {
        "size" => Value::from(map.len()),
        "isEmpty" => Value::Bool(map.is_empty()),
        "containsKey" => Value::Bool(map.contains_key(arg_str(args, 0, method)?)),
        "get" => map
            .get(arg_str(args, 0, method)?)
            .cloned()
            .unwrap_or(Value::Null),
        "keySet" => Value::Array(map.keys().cloned().map(Value::String).collect()),
        "values" => Value::Array(map.values().cloned().collect()),
        _ => {
            return Err(EvaluationError::UnknownMethod {
                method: method.to_string(),
                receiver: "map".to_string(),
            });
        }
    };
    Ok(value)
}
