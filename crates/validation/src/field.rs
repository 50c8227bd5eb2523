//! Field descriptions and the rules declared on them.

use std::sync::OnceLock;

use bakehouse_core::EntityId;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use regex_lite::Regex;
use rust_decimal::Decimal;

/// Borrowed view of a field value. `None` means the field is unset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Text(Option<&'a str>),
    Decimal(Option<Decimal>),
    Integer(Option<i64>),
    Timestamp(Option<DateTime<Utc>>),
    Date(Option<NaiveDate>),
    Time(Option<NaiveTime>),
    Reference(Option<EntityId>),
    Flag(Option<bool>),
    Bytes(Option<&'a [u8]>),
}

impl FieldValue<'_> {
    pub fn is_null(&self) -> bool {
        match self {
            FieldValue::Text(v) => v.is_none(),
            FieldValue::Decimal(v) => v.is_none(),
            FieldValue::Integer(v) => v.is_none(),
            FieldValue::Timestamp(v) => v.is_none(),
            FieldValue::Date(v) => v.is_none(),
            FieldValue::Time(v) => v.is_none(),
            FieldValue::Reference(v) => v.is_none(),
            FieldValue::Flag(v) => v.is_none(),
            FieldValue::Bytes(v) => v.is_none(),
        }
    }

    /// Numeric view used by min/max rules.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            FieldValue::Decimal(v) => *v,
            FieldValue::Integer(v) => v.map(Decimal::from),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(v) => *v,
            _ => None,
        }
    }
}

/// A whole-value regular expression, compiled on first use.
///
/// Declared as a `static` beside the rules that use it, so each pattern is
/// compiled once per process:
///
/// ```
/// use bakehouse_validation::{Field, Pattern};
///
/// static BRANCH: Pattern = Pattern::new("[0-9-]+");
/// let field = Field::text("branch", Some("1234-5")).pattern(&BRANCH);
/// # let _ = field;
/// ```
pub struct Pattern {
    source: &'static str,
    compiled: OnceLock<Option<Regex>>,
}

impl Pattern {
    pub const fn new(source: &'static str) -> Self {
        Self {
            source,
            compiled: OnceLock::new(),
        }
    }

    pub fn source(&self) -> &'static str {
        self.source
    }

    /// Anchored match against the whole of `text`. An invalid pattern matches
    /// nothing.
    pub fn is_match(&self, text: &str) -> bool {
        self.compiled
            .get_or_init(|| {
                Regex::new(&format!("^(?:{})$", self.source))
                    .inspect_err(|e| {
                        tracing::error!(pattern = self.source, error = %e, "invalid validation pattern")
                    })
                    .ok()
            })
            .as_ref()
            .is_some_and(|re| re.is_match(text))
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl core::fmt::Debug for Pattern {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("Pattern").field(&self.source).finish()
    }
}

/// A declarative constraint on one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// Non-null; text must also be non-blank.
    Required,
    /// Character count bounds (inclusive).
    Length { min: Option<usize>, max: Option<usize> },
    /// Whole-value regular expression match.
    Pattern(&'static Pattern),
    Min { value: Decimal, inclusive: bool },
    Max { value: Decimal, inclusive: bool },
    Past,
    PastOrPresent,
    Future,
    /// Custom predicate looked up by name in the engine's registry.
    Predicate(&'static str),
}

/// One field of an entity together with its rules.
#[derive(Debug, Clone)]
pub struct Field<'a> {
    pub name: &'static str,
    pub value: FieldValue<'a>,
    pub rules: Vec<Rule>,
}

impl<'a> Field<'a> {
    pub fn new(name: &'static str, value: FieldValue<'a>) -> Self {
        Self {
            name,
            value,
            rules: Vec::new(),
        }
    }

    pub fn text(name: &'static str, value: Option<&'a str>) -> Self {
        Self::new(name, FieldValue::Text(value))
    }

    pub fn decimal(name: &'static str, value: Option<Decimal>) -> Self {
        Self::new(name, FieldValue::Decimal(value))
    }

    pub fn integer(name: &'static str, value: Option<i64>) -> Self {
        Self::new(name, FieldValue::Integer(value))
    }

    pub fn timestamp(name: &'static str, value: Option<DateTime<Utc>>) -> Self {
        Self::new(name, FieldValue::Timestamp(value))
    }

    pub fn date(name: &'static str, value: Option<NaiveDate>) -> Self {
        Self::new(name, FieldValue::Date(value))
    }

    pub fn time(name: &'static str, value: Option<NaiveTime>) -> Self {
        Self::new(name, FieldValue::Time(value))
    }

    pub fn reference(name: &'static str, value: Option<EntityId>) -> Self {
        Self::new(name, FieldValue::Reference(value))
    }

    pub fn flag(name: &'static str, value: Option<bool>) -> Self {
        Self::new(name, FieldValue::Flag(value))
    }

    pub fn bytes(name: &'static str, value: Option<&'a [u8]>) -> Self {
        Self::new(name, FieldValue::Bytes(value))
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn required(self) -> Self {
        self.rule(Rule::Required)
    }

    pub fn length(self, min: usize, max: usize) -> Self {
        self.rule(Rule::Length {
            min: Some(min),
            max: Some(max),
        })
    }

    pub fn max_len(self, max: usize) -> Self {
        self.rule(Rule::Length {
            min: None,
            max: Some(max),
        })
    }

    pub fn pattern(self, pattern: &'static Pattern) -> Self {
        self.rule(Rule::Pattern(pattern))
    }

    /// `value >= min`.
    pub fn min(self, value: Decimal) -> Self {
        self.rule(Rule::Min {
            value,
            inclusive: true,
        })
    }

    /// `value > 0`.
    pub fn positive(self) -> Self {
        self.rule(Rule::Min {
            value: Decimal::ZERO,
            inclusive: false,
        })
    }

    /// `value >= 0`.
    pub fn positive_or_zero(self) -> Self {
        self.min(Decimal::ZERO)
    }

    pub fn max(self, value: Decimal) -> Self {
        self.rule(Rule::Max {
            value,
            inclusive: true,
        })
    }

    pub fn past(self) -> Self {
        self.rule(Rule::Past)
    }

    pub fn past_or_present(self) -> Self {
        self.rule(Rule::PastOrPresent)
    }

    pub fn future(self) -> Self {
        self.rule(Rule::Future)
    }

    pub fn predicate(self, name: &'static str) -> Self {
        self.rule(Rule::Predicate(name))
    }
}

/// Implemented by every validated entity.
pub trait Validate {
    /// Entity name reported in violations.
    fn entity_name(&self) -> &'static str;

    /// Fields in declaration order, each with its rules.
    fn fields(&self) -> Vec<Field<'_>>;
}
