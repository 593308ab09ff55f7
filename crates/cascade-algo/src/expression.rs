//! Named constraint rows over good_lp expressions.
//!
//! The algorithms in this crate describe constraints as `lhs sense rhs` rows instead of
//! handing them straight to a solver, so a consuming layer can inspect them, relax the
//! violatable ones with a slack variable, or evaluate them against a candidate solution.

use good_lp::{constraint, Constraint, Expression, IntoAffineExpression, Variable};
use serde::Serialize;
use std::fmt;

use cascade_core::ViolationAllowance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConstraintSense {
    Equal,
    LessOrEqual,
    GreaterOrEqual,
}

impl fmt::Display for ConstraintSense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConstraintSense::Equal => "==",
            ConstraintSense::LessOrEqual => "<=",
            ConstraintSense::GreaterOrEqual => ">=",
        })
    }
}

/// Value of `expr` when every variable takes `value_of(var)`.
pub fn evaluate<F>(expr: &Expression, value_of: F) -> f64
where
    F: Fn(Variable) -> f64,
{
    let constant = expr.constant();
    expr.clone()
        .linear_coefficients()
        .into_iter()
        .fold(constant, |acc, (var, coef)| acc + coef * value_of(var))
}

#[derive(Debug, Clone)]
pub struct ConstraintRow {
    pub name: String,
    pub lhs: Expression,
    pub sense: ConstraintSense,
    pub rhs: Expression,
    pub violation: ViolationAllowance,
}

impl ConstraintRow {
    fn new(name: impl Into<String>, lhs: Expression, sense: ConstraintSense, rhs: Expression) -> Self {
        Self {
            name: name.into(),
            lhs,
            sense,
            rhs,
            violation: ViolationAllowance::hard(),
        }
    }

    pub fn equal(name: impl Into<String>, lhs: Expression, rhs: Expression) -> Self {
        Self::new(name, lhs, ConstraintSense::Equal, rhs)
    }

    pub fn less_or_equal(name: impl Into<String>, lhs: Expression, rhs: Expression) -> Self {
        Self::new(name, lhs, ConstraintSense::LessOrEqual, rhs)
    }

    pub fn greater_or_equal(name: impl Into<String>, lhs: Expression, rhs: Expression) -> Self {
        Self::new(name, lhs, ConstraintSense::GreaterOrEqual, rhs)
    }

    pub fn with_violation(mut self, violation: ViolationAllowance) -> Self {
        self.violation = violation;
        self
    }

    pub fn is_violatable(&self) -> bool {
        self.violation.allowed && self.sense != ConstraintSense::Equal
    }

    /// The row as a hard good_lp constraint.
    pub fn to_constraint(&self) -> Constraint {
        let lhs = self.lhs.clone();
        let rhs = self.rhs.clone();
        match self.sense {
            ConstraintSense::Equal => constraint!(lhs == rhs),
            ConstraintSense::LessOrEqual => constraint!(lhs <= rhs),
            ConstraintSense::GreaterOrEqual => constraint!(lhs >= rhs),
        }
    }

    /// The row loosened by a non-negative `slack` in the direction of its inequality.
    ///
    /// Equalities are returned unchanged.
    pub fn to_relaxed_constraint(&self, slack: Variable) -> Constraint {
        let rhs = self.rhs.clone();
        match self.sense {
            ConstraintSense::Equal => self.to_constraint(),
            ConstraintSense::LessOrEqual => {
                let lhs = self.lhs.clone() - slack;
                constraint!(lhs <= rhs)
            }
            ConstraintSense::GreaterOrEqual => {
                let lhs = self.lhs.clone() + slack;
                constraint!(lhs >= rhs)
            }
        }
    }

    /// `lhs - rhs` under the given assignment.
    pub fn residual<F>(&self, value_of: F) -> f64
    where
        F: Fn(Variable) -> f64,
    {
        evaluate(&self.lhs, &value_of) - evaluate(&self.rhs, &value_of)
    }

    /// Amount by which the row is violated (0 when satisfied).
    pub fn violation_amount<F>(&self, value_of: F) -> f64
    where
        F: Fn(Variable) -> f64,
    {
        let residual = self.residual(value_of);
        match self.sense {
            ConstraintSense::Equal => residual.abs(),
            ConstraintSense::LessOrEqual => residual.max(0.0),
            ConstraintSense::GreaterOrEqual => (-residual).max(0.0),
        }
    }

    pub fn is_satisfied<F>(&self, value_of: F, tolerance: f64) -> bool
    where
        F: Fn(Variable) -> f64,
    {
        self.violation_amount(value_of) <= tolerance
    }
}

impl fmt::Display for ConstraintRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.sense)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use good_lp::{variable, variables};
    use std::collections::HashMap;

    #[test]
    fn test_evaluate_linear_expression() {
        let mut vars = variables!();
        let x = vars.add(variable().min(0.0));
        let y = vars.add(variable().min(0.0));
        let expr: Expression = 2.0 * x + 3.0 * y + 1.0;
        let values: HashMap<Variable, f64> = [(x, 4.0), (y, -1.0)].into_iter().collect();
        let value = evaluate(&expr, |v| values.get(&v).copied().unwrap_or(0.0));
        assert!((value - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_row_satisfaction() {
        let mut vars = variables!();
        let x = vars.add(variable().min(0.0));
        let row = ConstraintRow::less_or_equal("cap", Expression::from(x), Expression::from(10.0));
        assert!(row.is_satisfied(|_| 9.0, 1e-9));
        assert!(!row.is_satisfied(|_| 12.0, 1e-9));
        assert!((row.violation_amount(|_| 12.0) - 2.0).abs() < 1e-12);

        let floor = ConstraintRow::greater_or_equal("floor", Expression::from(x), Expression::from(5.0));
        assert!((floor.violation_amount(|_| 3.0) - 2.0).abs() < 1e-12);
        assert_eq!(floor.violation_amount(|_| 7.0), 0.0);
    }

    #[test]
    fn test_violatable_rows() {
        let row = ConstraintRow::greater_or_equal("floor", Expression::from(0.0), Expression::from(1.0));
        assert!(!row.is_violatable());
        let soft = row.with_violation(ViolationAllowance::penalized(50.0));
        assert!(soft.is_violatable());
        let eq = ConstraintRow::equal("balance", Expression::from(0.0), Expression::from(0.0))
            .with_violation(ViolationAllowance::penalized(1.0));
        assert!(!eq.is_violatable());
        assert_eq!(soft.to_string(), "floor (>=)");
    }
}
