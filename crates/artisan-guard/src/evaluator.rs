//! Safe arithmetic expression evaluator
//!
//! A two-stack shunting-yard interpreter over a fixed whitelist of
//! characters: digits, `.`, parentheses and the operators `+ - * / %`.
//! Whitespace is ignored. There are no identifiers, no function calls and
//! no unary operators, so nothing outside plain arithmetic can run.
//!
//! The same algorithm ships to artifacts as JavaScript (see
//! [`crate::inject::SAFE_EVALUATOR_JS`]); this module is the reference the
//! injected helper is tested against.

use once_cell::sync::Lazy;
use regex::Regex;

static TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d+(?:\.\d*)?|\.\d+|[+\-*/%()]").expect("token pattern is valid")
});

/// Errors raised by [`evaluate`]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    /// Nothing to evaluate
    #[error("expression is empty")]
    Empty,

    /// Character outside the arithmetic whitelist
    #[error("invalid character '{ch}' at position {position}")]
    InvalidCharacter { ch: char, position: usize },

    /// A `.` that is not part of a numeric literal
    #[error("malformed number in expression")]
    MalformedNumber,

    /// Operator or operand where it cannot appear
    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),

    /// Unbalanced `(` / `)`
    #[error("mismatched parentheses")]
    MismatchedParentheses,

    /// Expression ends before an operand
    #[error("incomplete expression")]
    Incomplete,

    /// Right operand of `/` or `%` is zero
    #[error("division by zero")]
    DivisionByZero,

    /// Overflow or other non-finite intermediate value
    #[error("result is not finite")]
    NonFinite,
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl Operator {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Self::Add),
            '-' => Some(Self::Sub),
            '*' => Some(Self::Mul),
            '/' => Some(Self::Div),
            '%' => Some(Self::Rem),
            _ => None,
        }
    }

    fn precedence(self) -> u8 {
        match self {
            Self::Add | Self::Sub => 1,
            Self::Mul | Self::Div | Self::Rem => 2,
        }
    }

    fn apply(self, a: f64, b: f64) -> Result<f64, EvaluationError> {
        let value = match self {
            Self::Add => a + b,
            Self::Sub => a - b,
            Self::Mul => a * b,
            Self::Div | Self::Rem if b == 0.0 => return Err(EvaluationError::DivisionByZero),
            Self::Div => a / b,
            Self::Rem => a % b,
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(EvaluationError::NonFinite)
        }
    }
}

/// Entry on the operator stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StackOp {
    Open,
    Binary(Operator),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Op(Operator),
    Open,
    Close,
}

fn is_whitelisted(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '.' | '(' | ')' | '+' | '-' | '*' | '/' | '%')
}

fn tokenize(expression: &str) -> Result<Vec<Token>, EvaluationError> {
    let mut significant = 0usize;
    for (position, ch) in expression.char_indices() {
        if ch.is_whitespace() {
            continue;
        }
        if !is_whitelisted(ch) {
            return Err(EvaluationError::InvalidCharacter { ch, position });
        }
        significant += 1;
    }
    if significant == 0 {
        return Err(EvaluationError::Empty);
    }

    let mut covered = 0usize;
    let mut tokens = Vec::new();
    for m in TOKEN_PATTERN.find_iter(expression) {
        let text = m.as_str();
        covered += text.len();
        let token = match text {
            "(" => Token::Open,
            ")" => Token::Close,
            _ => match text.chars().next().and_then(Operator::from_char) {
                Some(op) if text.len() == 1 => Token::Op(op),
                _ => Token::Number(
                    text.parse::<f64>()
                        .map_err(|_| EvaluationError::MalformedNumber)?,
                ),
            },
        };
        tokens.push(token);
    }

    // whitelisted characters the tokenizer skipped can only be stray dots
    if covered != significant {
        return Err(EvaluationError::MalformedNumber);
    }
    Ok(tokens)
}

fn reduce(values: &mut Vec<f64>, op: Operator) -> Result<(), EvaluationError> {
    let b = values.pop().ok_or(EvaluationError::Incomplete)?;
    let a = values.pop().ok_or(EvaluationError::Incomplete)?;
    values.push(op.apply(a, b)?);
    Ok(())
}

/// Evaluate an arithmetic expression
///
/// # Errors
/// Returns [`EvaluationError`] for empty input, characters outside the
/// whitelist, mismatched parentheses, incomplete expressions, division or
/// modulo by zero, and non-finite results.
///
/// # Example
///
/// ```rust
/// use artisan_guard::evaluate;
///
/// assert_eq!(evaluate("(2+3)*4").unwrap(), 20.0);
/// assert!(evaluate("5/0").is_err());
/// ```
pub fn evaluate(expression: &str) -> Result<f64, EvaluationError> {
    let tokens = tokenize(expression)?;

    let mut values: Vec<f64> = Vec::new();
    let mut ops: Vec<StackOp> = Vec::new();
    let mut expect_operand = true;

    for token in tokens {
        match token {
            Token::Number(n) => {
                if !expect_operand {
                    return Err(EvaluationError::UnexpectedToken(n.to_string()));
                }
                values.push(n);
                expect_operand = false;
            }
            Token::Open => {
                if !expect_operand {
                    return Err(EvaluationError::UnexpectedToken("(".to_string()));
                }
                ops.push(StackOp::Open);
            }
            Token::Close => {
                if expect_operand {
                    return Err(EvaluationError::Incomplete);
                }
                loop {
                    match ops.pop() {
                        Some(StackOp::Open) => break,
                        Some(StackOp::Binary(op)) => reduce(&mut values, op)?,
                        None => return Err(EvaluationError::MismatchedParentheses),
                    }
                }
            }
            Token::Op(op) => {
                if expect_operand {
                    return Err(EvaluationError::UnexpectedToken(
                        operator_symbol(op).to_string(),
                    ));
                }
                while let Some(&StackOp::Binary(top)) = ops.last() {
                    if top.precedence() < op.precedence() {
                        break;
                    }
                    ops.pop();
                    reduce(&mut values, top)?;
                }
                ops.push(StackOp::Binary(op));
                expect_operand = true;
            }
        }
    }

    if expect_operand {
        return Err(EvaluationError::Incomplete);
    }

    while let Some(entry) = ops.pop() {
        match entry {
            StackOp::Open => return Err(EvaluationError::MismatchedParentheses),
            StackOp::Binary(op) => reduce(&mut values, op)?,
        }
    }

    match values.as_slice() {
        [value] => Ok(*value),
        _ => Err(EvaluationError::Incomplete),
    }
}

fn operator_symbol(op: Operator) -> char {
    match op {
        Operator::Add => '+',
        Operator::Sub => '-',
        Operator::Mul => '*',
        Operator::Div => '/',
        Operator::Rem => '%',
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn basic_arithmetic() {
        assert_eq!(evaluate("2+2").unwrap(), 4.0);
        assert_eq!(evaluate("(2+3)*4").unwrap(), 20.0);
        assert_eq!(evaluate("2+3*4").unwrap(), 14.0);
        assert_eq!(evaluate("10 % 4").unwrap(), 2.0);
        assert_eq!(evaluate(" 1.5 * 2 ").unwrap(), 3.0);
        assert_eq!(evaluate(".5+.5").unwrap(), 1.0);
        assert_eq!(evaluate("3.").unwrap(), 3.0);
    }

    #[test]
    fn left_associative() {
        assert_eq!(evaluate("10-4-3").unwrap(), 3.0);
        assert_eq!(evaluate("64/4/2").unwrap(), 8.0);
        assert_eq!(evaluate("20/5*2").unwrap(), 8.0);
    }

    #[test]
    fn nested_parentheses() {
        assert_eq!(evaluate("((1+2)*(3+4))").unwrap(), 21.0);
        assert_eq!(evaluate("2*(3+(4-1))/3").unwrap(), 4.0);
    }

    #[test]
    fn division_by_zero() {
        assert_eq!(evaluate("5/0"), Err(EvaluationError::DivisionByZero));
        assert_eq!(evaluate("5%0"), Err(EvaluationError::DivisionByZero));
        assert_eq!(evaluate("5/(2-2)"), Err(EvaluationError::DivisionByZero));
    }

    #[test]
    fn incomplete_expressions() {
        assert_eq!(evaluate("2+"), Err(EvaluationError::Incomplete));
        assert_eq!(evaluate("(2+)"), Err(EvaluationError::Incomplete));
        assert_eq!(evaluate("()"), Err(EvaluationError::Incomplete));
    }

    #[test]
    fn mismatched_parentheses() {
        assert_eq!(evaluate("(1+2"), Err(EvaluationError::MismatchedParentheses));
        assert_eq!(evaluate("1+2)"), Err(EvaluationError::MismatchedParentheses));
    }

    #[test]
    fn rejects_identifiers_and_calls() {
        assert!(matches!(
            evaluate("alert(1)"),
            Err(EvaluationError::InvalidCharacter { ch: 'a', position: 0 })
        ));
        assert!(matches!(
            evaluate("1;2"),
            Err(EvaluationError::InvalidCharacter { ch: ';', .. })
        ));
        assert!(matches!(
            evaluate("2**3"),
            Err(EvaluationError::UnexpectedToken(_))
        ));
    }

    #[test]
    fn empty_input() {
        assert_eq!(evaluate(""), Err(EvaluationError::Empty));
        assert_eq!(evaluate("   "), Err(EvaluationError::Empty));
    }

    #[test]
    fn malformed_numbers() {
        assert_eq!(evaluate("."), Err(EvaluationError::MalformedNumber));
        assert!(evaluate("1..2").is_err());
        assert!(evaluate("1.2.3").is_err());
    }

    #[test]
    fn unary_operators_are_not_supported() {
        assert!(matches!(
            evaluate("-3"),
            Err(EvaluationError::UnexpectedToken(_))
        ));
        assert!(evaluate("2*-3").is_err());
    }

    #[test]
    fn implicit_multiplication_rejected() {
        assert!(matches!(
            evaluate("2(3)"),
            Err(EvaluationError::UnexpectedToken(_))
        ));
        assert!(evaluate("(2)(3)").is_err());
    }

    #[test]
    fn non_finite_result() {
        let huge = format!("1{}", "0".repeat(308));
        assert_eq!(
            evaluate(&format!("{huge}*{huge}")),
            Err(EvaluationError::NonFinite)
        );
    }

    proptest! {
        #[test]
        fn integer_sums_match(a in 0u32..100_000, b in 0u32..100_000) {
            let got = evaluate(&format!("{a} + {b}")).unwrap();
            prop_assert_eq!(got, f64::from(a) + f64::from(b));
        }

        #[test]
        fn precedence_matches_native(a in 1u32..1000, b in 1u32..1000, c in 1u32..1000) {
            let got = evaluate(&format!("{a}-{b}*{c}")).unwrap();
            prop_assert_eq!(got, f64::from(a) - f64::from(b) * f64::from(c));
        }

        #[test]
        fn letters_never_evaluate(s in "[0-9+*/()]{0,6}[a-zA-Z_$][0-9+*/()]{0,6}") {
            let is_invalid_char = matches!(
                evaluate(&s),
                Err(EvaluationError::InvalidCharacter { .. })
            );
            prop_assert!(is_invalid_char);
        }
    }
}
