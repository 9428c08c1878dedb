//! Restricted arithmetic evaluator.
//!
//! Expressions are folded by the first operator kind present, in the order
//! `+`, `-`, `*`, `/`. There is no precedence: every part between operators
//! must itself be a plain number, so `2+3*4` fails to evaluate.

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalcError {
    #[error("Invalid expression")]
    InvalidExpression,

    #[error("Cannot evaluate expression: {0}")]
    CannotEvaluate(String),

    #[error("Division by zero")]
    DivisionByZero,
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '+' | '-' | '*' | '/' | '(' | ')' | '.') || c.is_whitespace()
}

/// Evaluate `expression`
pub fn evaluate(expression: &str) -> Result<f64, CalcError> {
    let clean: String = expression.chars().filter(|c| *c != ' ').collect();

    if clean.is_empty() || !clean.chars().all(is_allowed) {
        return Err(CalcError::InvalidExpression);
    }

    let cannot = || CalcError::CannotEvaluate(expression.to_string());
    let parse = |part: &str| part.trim().parse::<f64>().map_err(|_| cannot());

    let operator = ['+', '-', '*', '/'].into_iter().find(|op| clean.contains(*op));

    let Some(operator) = operator else {
        return parse(&clean);
    };

    let parts = clean
        .split(operator)
        .map(parse)
        .collect::<Result<Vec<f64>, _>>()?;
    let (first, rest) = parts.split_first().ok_or_else(cannot)?;

    match operator {
        '+' => Ok(parts.iter().sum()),
        '-' => Ok(first - rest.iter().sum::<f64>()),
        '*' => Ok(parts.iter().product()),
        _ => rest.iter().try_fold(*first, |acc, divisor| {
            if *divisor == 0.0 {
                Err(CalcError::DivisionByZero)
            } else {
                Ok(acc / divisor)
            }
        }),
    }
}

/// Render a result with at least one decimal place (`5.0`)
pub fn format_result(value: f64) -> String {
    format!("{:?}", value)
}
