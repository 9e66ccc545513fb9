use crate::attribute::{AttributeRef, AttributeSource, AttributeValue};
use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::collections::BTreeSet;

const MAX_EXPRESSION_DEPTH: usize = 32;

/// Operator of a comparison node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ComparisonOperator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
}

impl ComparisonOperator {
    /// Result of the comparison when the attribute is absent.
    fn holds_when_absent(self) -> bool {
        matches!(self, Self::Neq | Self::NotIn | Self::NotContains)
    }
}

/// Operator of a logical node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LogicalOperator {
    And,
    Or,
    Not,
}

/// Condition tree.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum Expression {
    /// Compares one attribute with a literal.
    Comparison {
        operator: ComparisonOperator,
        attribute: AttributeRef,
        value: AttributeValue,
    },
    /// Combines child expressions.
    Logical {
        operator: LogicalOperator,
        children: Vec<Expression>,
    },
    /// Fixed outcome.
    Constant { value: bool },
}

impl Expression {
    /// Builds a comparison node.
    pub fn compare(
        operator: ComparisonOperator,
        attribute: AttributeRef,
        value: impl Into<AttributeValue>,
    ) -> Self {
        Self::Comparison {
            operator,
            attribute,
            value: value.into(),
        }
    }

    /// `attribute == value`.
    pub fn eq(attribute: AttributeRef, value: impl Into<AttributeValue>) -> Self {
        Self::compare(ComparisonOperator::Eq, attribute, value)
    }

    /// `attribute != value`.
    pub fn neq(attribute: AttributeRef, value: impl Into<AttributeValue>) -> Self {
        Self::compare(ComparisonOperator::Neq, attribute, value)
    }

    /// Conjunction of `children`.
    pub fn all(children: impl IntoIterator<Item = Expression>) -> Self {
        Self::Logical {
            operator: LogicalOperator::And,
            children: children.into_iter().collect(),
        }
    }

    /// Disjunction of `children`.
    pub fn any(children: impl IntoIterator<Item = Expression>) -> Self {
        Self::Logical {
            operator: LogicalOperator::Or,
            children: children.into_iter().collect(),
        }
    }

    /// Negation of `child`.
    pub fn not(child: Expression) -> Self {
        Self::Logical {
            operator: LogicalOperator::Not,
            children: vec![child],
        }
    }

    /// Constant expression.
    pub fn constant(value: bool) -> Self {
        Self::Constant { value }
    }

    /// Checks the tree's structure.
    ///
    /// `not` takes exactly one child, `and`/`or` at least one, and nesting is
    /// bounded so evaluation cannot exhaust the stack.
    pub fn validate(&self) -> Result<()> {
        self.validate_at(1)
    }

    fn validate_at(&self, depth: usize) -> Result<()> {
        if depth > MAX_EXPRESSION_DEPTH {
            return Err(Error::MalformedExpression(format!(
                "nesting deeper than {MAX_EXPRESSION_DEPTH}"
            )));
        }
        match self {
            Self::Comparison { .. } | Self::Constant { .. } => Ok(()),
            Self::Logical { operator, children } => {
                match operator {
                    LogicalOperator::Not if children.len() != 1 => {
                        return Err(Error::MalformedExpression(format!(
                            "`not` requires exactly one child, found {}",
                            children.len()
                        )));
                    }
                    LogicalOperator::And | LogicalOperator::Or if children.is_empty() => {
                        return Err(Error::MalformedExpression(format!(
                            "`{}` requires at least one child",
                            if *operator == LogicalOperator::And { "and" } else { "or" }
                        )));
                    }
                    _ => {}
                }
                children
                    .iter()
                    .try_for_each(|child| child.validate_at(depth + 1))
            }
        }
    }

    /// Returns every attribute the tree reads.
    pub fn attributes(&self) -> BTreeSet<&AttributeRef> {
        let mut output = BTreeSet::new();
        self.collect_attributes(&mut output);
        output
    }

    fn collect_attributes<'a>(&'a self, output: &mut BTreeSet<&'a AttributeRef>) {
        match self {
            Self::Comparison { attribute, .. } => {
                output.insert(attribute);
            }
            Self::Logical { children, .. } => {
                for child in children {
                    child.collect_attributes(output);
                }
            }
            Self::Constant { .. } => {}
        }
    }

    /// Evaluates the tree, treating a failed attribute lookup as `false`.
    ///
    /// Missing attributes and type mismatches never error. Call
    /// [`Expression::validate`] first; a `not` node with the wrong arity
    /// evaluates to `false` here.
    pub fn evaluate<A>(&self, attributes: &A) -> bool
    where
        A: AttributeSource + ?Sized,
    {
        self.try_evaluate(attributes).unwrap_or(false)
    }

    /// Evaluates the tree left to right, short-circuiting `and` and `or`.
    ///
    /// Returns the first attribute read whose lookup failed. Attributes on a
    /// branch that is never reached do not matter.
    pub fn try_evaluate<'e, A>(
        &'e self,
        attributes: &A,
    ) -> std::result::Result<bool, &'e AttributeRef>
    where
        A: AttributeSource + ?Sized,
    {
        match self {
            Self::Constant { value } => Ok(*value),
            Self::Comparison {
                operator,
                attribute,
                value,
            } => {
                if attributes.failed(attribute) {
                    return Err(attribute);
                }
                Ok(compare(*operator, attributes.attribute(attribute), value))
            }
            Self::Logical { operator, children } => match operator {
                LogicalOperator::And => {
                    for child in children {
                        if !child.try_evaluate(attributes)? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
                LogicalOperator::Or => {
                    for child in children {
                        if child.try_evaluate(attributes)? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                LogicalOperator::Not => match children.as_slice() {
                    [child] => Ok(!child.try_evaluate(attributes)?),
                    _ => Ok(false),
                },
            },
        }
    }
}

fn compare(
    operator: ComparisonOperator,
    actual: Option<&AttributeValue>,
    expected: &AttributeValue,
) -> bool {
    let Some(actual) = actual else {
        return operator.holds_when_absent();
    };
    match operator {
        ComparisonOperator::Eq => values_equal(actual, expected),
        ComparisonOperator::Neq => !values_equal(actual, expected),
        ComparisonOperator::Gt => order(actual, expected) == Some(Ordering::Greater),
        ComparisonOperator::Gte => matches!(
            order(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        ComparisonOperator::Lt => order(actual, expected) == Some(Ordering::Less),
        ComparisonOperator::Lte => matches!(
            order(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        ComparisonOperator::In => member_of(actual, expected),
        ComparisonOperator::NotIn => !member_of(actual, expected),
        ComparisonOperator::Contains => contains(actual, expected),
        ComparisonOperator::NotContains => !contains(actual, expected),
        ComparisonOperator::StartsWith => match (actual.as_str(), expected.as_str()) {
            (Some(actual), Some(prefix)) => actual.starts_with(prefix),
            _ => false,
        },
        ComparisonOperator::EndsWith => match (actual.as_str(), expected.as_str()) {
            (Some(actual), Some(suffix)) => actual.ends_with(suffix),
            _ => false,
        },
    }
}

fn values_equal(left: &AttributeValue, right: &AttributeValue) -> bool {
    use AttributeValue as V;
    match (left, right) {
        (V::Bool(l), V::Bool(r)) => l == r,
        (V::Number(l), V::Number(r)) => l == r,
        (V::String(l), V::String(r)) => match (left.as_timestamp(), right.as_timestamp()) {
            (Some(l), Some(r)) => l == r,
            _ => l == r,
        },
        (V::Timestamp(_), V::Timestamp(_) | V::String(_))
        | (V::String(_), V::Timestamp(_)) => match (left.as_timestamp(), right.as_timestamp()) {
            (Some(l), Some(r)) => l == r,
            _ => false,
        },
        (V::List(l), V::List(r)) => {
            l.len() == r.len() && l.iter().zip(r).all(|(l, r)| values_equal(l, r))
        }
        _ => false,
    }
}

fn order(left: &AttributeValue, right: &AttributeValue) -> Option<Ordering> {
    if let (Some(l), Some(r)) = (left.as_number(), right.as_number()) {
        return l.partial_cmp(&r);
    }
    match (left.as_timestamp(), right.as_timestamp()) {
        (Some(l), Some(r)) => Some(l.cmp(&r)),
        _ => None,
    }
}

fn member_of(actual: &AttributeValue, expected: &AttributeValue) -> bool {
    match expected.as_list() {
        Some(items) => items.iter().any(|item| values_equal(actual, item)),
        None => values_equal(actual, expected),
    }
}

fn contains(actual: &AttributeValue, expected: &AttributeValue) -> bool {
    match actual {
        AttributeValue::String(haystack) => expected
            .as_str()
            .is_some_and(|needle| haystack.contains(needle)),
        AttributeValue::List(items) => items.iter().any(|item| values_equal(item, expected)),
        _ => false,
    }
}
