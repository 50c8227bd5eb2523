//! Constraint violation vocabulary shared by validation and the integrity engine.

use serde::{Deserialize, Serialize};

/// Which declarative rule produced a violation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Required,
    Length,
    Pattern,
    Min,
    Max,
    Past,
    PastOrPresent,
    Future,
    /// Named custom predicate (e.g. `"no_digits"`).
    Predicate(String),
}

impl core::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RuleKind::Required => f.write_str("required"),
            RuleKind::Length => f.write_str("length"),
            RuleKind::Pattern => f.write_str("pattern"),
            RuleKind::Min => f.write_str("min"),
            RuleKind::Max => f.write_str("max"),
            RuleKind::Past => f.write_str("past"),
            RuleKind::PastOrPresent => f.write_str("past_or_present"),
            RuleKind::Future => f.write_str("future"),
            RuleKind::Predicate(name) => f.write_str(name),
        }
    }
}

/// One failed field rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstraintViolation {
    pub entity: String,
    pub field: String,
    pub rule: RuleKind,
    pub message: String,
}

impl ConstraintViolation {
    pub fn new(
        entity: impl Into<String>,
        field: impl Into<String>,
        rule: RuleKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            entity: entity.into(),
            field: field.into(),
            rule,
            message: message.into(),
        }
    }
}

impl core::fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{} [{}]: {}", self.entity, self.field, self.rule, self.message)
    }
}

/// All violations found for one entity, in field declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Violations {
    violations: Vec<ConstraintViolation>,
}

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, violation: ConstraintViolation) {
        self.violations.push(violation);
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn all(&self) -> &[ConstraintViolation] {
        &self.violations
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConstraintViolation> {
        self.violations.iter()
    }

    /// Violations reported for a single field.
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a ConstraintViolation> {
        self.violations.iter().filter(move |v| v.field == field)
    }

    pub fn has(&self, field: &str, rule: &RuleKind) -> bool {
        self.violations.iter().any(|v| v.field == field && &v.rule == rule)
    }
}

impl core::fmt::Display for Violations {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut first = true;
        for v in &self.violations {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{v}")?;
            first = false;
        }
        Ok(())
    }
}

impl IntoIterator for Violations {
    type Item = ConstraintViolation;
    type IntoIter = std::vec::IntoIter<ConstraintViolation>;

    fn into_iter(self) -> Self::IntoIter {
        self.violations.into_iter()
    }
}

impl FromIterator<ConstraintViolation> for Violations {
    fn from_iter<I: IntoIterator<Item = ConstraintViolation>>(iter: I) -> Self {
        Self {
            violations: iter.into_iter().collect(),
        }
    }
}
