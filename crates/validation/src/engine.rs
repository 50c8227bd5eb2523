//! Rule evaluation.

use std::collections::HashMap;
use std::sync::Arc;

use bakehouse_core::{ConstraintViolation, RuleKind, Violations};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::config::ValidationConfig;
use crate::field::{Field, FieldValue, Rule, Validate};
use crate::predicate::{CnpjChecksum, CpfChecksum, NoDigits, PostalRegion, Predicate};

/// Source of "now" for temporal rules.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Explicitly constructed validation service.
///
/// Owned by the caller and passed to whoever needs it; there is no global
/// instance. The predicate registry and the clock are fixed at construction
/// and `validate` only reads them, so one engine can be shared across threads.
pub struct ValidationEngine {
    predicates: HashMap<&'static str, Arc<dyn Predicate>>,
    clock: Clock,
}

impl core::fmt::Debug for ValidationEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut names: Vec<_> = self.predicates.keys().collect();
        names.sort();
        f.debug_struct("ValidationEngine")
            .field("predicates", &names)
            .finish_non_exhaustive()
    }
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationEngine {
    /// Engine with the default predicates: `no_digits` and `postal_region`.
    pub fn new() -> Self {
        Self::from_config(&ValidationConfig::default())
    }

    /// Engine with no predicates at all; rules naming one are skipped.
    pub fn bare() -> Self {
        Self {
            predicates: HashMap::new(),
            clock: Arc::new(Utc::now),
        }
    }

    pub fn from_config(config: &ValidationConfig) -> Self {
        let engine = Self::bare()
            .with_predicate(NoDigits)
            .with_predicate(PostalRegion::new(config.postal_regions.iter().copied()));

        if config.tax_checksums {
            engine.with_predicate(CpfChecksum).with_predicate(CnpjChecksum)
        } else {
            engine
        }
    }

    /// Register (or replace) a predicate under its own name.
    pub fn with_predicate(mut self, predicate: impl Predicate + 'static) -> Self {
        self.predicates.insert(predicate.name(), Arc::new(predicate));
        self
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn has_predicate(&self, name: &str) -> bool {
        self.predicates.contains_key(name)
    }

    /// Evaluate every rule of every field and return all violations.
    pub fn validate<V: Validate + ?Sized>(&self, entity: &V) -> Violations {
        let now = (self.clock)();
        let entity_name = entity.entity_name();
        let mut violations = Violations::new();
        for field in entity.fields() {
            self.check_field(entity_name, &field, now, &mut violations);
        }
        violations
    }

    fn check_field(
        &self,
        entity: &'static str,
        field: &Field<'_>,
        now: DateTime<Utc>,
        out: &mut Violations,
    ) {
        // Null values are judged by presence alone; every other rule skips them.
        if field.value.is_null() {
            if field.rules.contains(&Rule::Required) {
                out.push(ConstraintViolation::new(
                    entity,
                    field.name,
                    RuleKind::Required,
                    "must not be null",
                ));
            }
            return;
        }

        for rule in &field.rules {
            if let Some((kind, message)) = self.check_rule(rule, &field.value, now) {
                out.push(ConstraintViolation::new(entity, field.name, kind, message));
            }
        }
    }

    fn check_rule(
        &self,
        rule: &Rule,
        value: &FieldValue<'_>,
        now: DateTime<Utc>,
    ) -> Option<(RuleKind, String)> {
        match rule {
            Rule::Required => match value {
                FieldValue::Text(Some(text)) if text.trim().is_empty() => {
                    Some((RuleKind::Required, "must not be blank".to_string()))
                }
                _ => None,
            },
            Rule::Length { min, max } => {
                let len = match value {
                    FieldValue::Text(Some(text)) => text.chars().count(),
                    FieldValue::Bytes(Some(bytes)) => bytes.len(),
                    _ => return None,
                };
                let too_short = min.is_some_and(|min| len < min);
                let too_long = max.is_some_and(|max| len > max);
                (too_short || too_long).then(|| (RuleKind::Length, length_message(*min, *max)))
            }
            Rule::Pattern(pattern) => {
                let text = value.as_text()?;
                (!pattern.is_match(text))
                    .then(|| (RuleKind::Pattern, format!("must match \"{}\"", pattern.source())))
            }
            Rule::Min { value: bound, inclusive } => {
                let actual = value.as_decimal()?;
                let ok = if *inclusive { actual >= *bound } else { actual > *bound };
                (!ok).then(|| (RuleKind::Min, bound_message("greater than", *bound, *inclusive)))
            }
            Rule::Max { value: bound, inclusive } => {
                let actual = value.as_decimal()?;
                let ok = if *inclusive { actual <= *bound } else { actual < *bound };
                (!ok).then(|| (RuleKind::Max, bound_message("less than", *bound, *inclusive)))
            }
            Rule::Past => temporal(value, now, |ord| ord.is_lt())
                .then(|| (RuleKind::Past, "must be in the past".to_string())),
            Rule::PastOrPresent => temporal(value, now, |ord| ord.is_le())
                .then(|| (RuleKind::PastOrPresent, "must be in the past or present".to_string())),
            Rule::Future => temporal(value, now, |ord| ord.is_gt())
                .then(|| (RuleKind::Future, "must be in the future".to_string())),
            Rule::Predicate(name) => {
                let Some(predicate) = self.predicates.get(name) else {
                    tracing::trace!(predicate = name, "predicate not registered, rule skipped");
                    return None;
                };
                (!predicate.test(value))
                    .then(|| (RuleKind::Predicate((*name).to_string()), predicate.message()))
            }
        }
    }
}

/// `true` when the rule is violated, i.e. `accept(value.cmp(now))` is false.
fn temporal(
    value: &FieldValue<'_>,
    now: DateTime<Utc>,
    accept: impl Fn(core::cmp::Ordering) -> bool,
) -> bool {
    let ordering = match value {
        FieldValue::Timestamp(Some(ts)) => ts.cmp(&now),
        FieldValue::Date(Some(date)) => date.cmp(&now.date_naive()),
        _ => return false,
    };
    !accept(ordering)
}

fn length_message(min: Option<usize>, max: Option<usize>) -> String {
    match (min, max) {
        (Some(min), Some(max)) if min == max => format!("length must be exactly {min}"),
        (Some(min), Some(max)) => format!("length must be between {min} and {max}"),
        (Some(min), None) => format!("length must be at least {min}"),
        (None, Some(max)) => format!("length must be at most {max}"),
        (None, None) => "invalid length".to_string(),
    }
}

fn bound_message(direction: &str, bound: Decimal, inclusive: bool) -> String {
    if inclusive {
        format!("must be {direction} or equal to {bound}")
    } else {
        format!("must be {direction} {bound}")
    }
}
