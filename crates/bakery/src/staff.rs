//! Employees and what they own: tasks and a bank account.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bakehouse_core::{EntityId, Identity};
use bakehouse_validation::{CPF_CHECKSUM, Field, NO_DIGITS, Pattern, Validate};

/// Lowest salary the chain pays, 1000.00.
pub fn minimum_salary() -> Decimal {
    Decimal::new(100_000, 2)
}

static EMAIL: Pattern = Pattern::new(r"[^@ ]+@[^@ ]+\.[^@ ]+");
static CPF: Pattern = Pattern::new(r"\d{3}\.?\d{3}\.?\d{3}-?\d{2}");
static DIGITS_AND_DASHES: Pattern = Pattern::new("[0-9-]+");

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Employee {
    pub(crate) identity: Identity,
    /// Owning bakery. Set by the engine when the employee is saved through
    /// `Bakery::employees`.
    pub bakery: Option<EntityId>,
    pub name: String,
    pub cpf: String,
    pub email: String,
    pub role: String,
    pub hire_date: Option<NaiveDate>,
    pub salary: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<Task>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_account: Option<BankAccount>,
    /// Foreign key column for `bank_account`; kept in step by the engine.
    pub(crate) bank_account_id: Option<EntityId>,
    /// Set by `load` and `save` when the owned collections mirror storage.
    #[serde(skip)]
    pub(crate) hydrated: bool,
}

impl_entity!(Employee);

impl Employee {
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            ..Self::default()
        }
    }

    pub fn with_documents(mut self, cpf: impl Into<String>, email: impl Into<String>) -> Self {
        self.cpf = cpf.into();
        self.email = email.into();
        self
    }

    pub fn with_salary(mut self, salary: Decimal) -> Self {
        self.salary = Some(salary);
        self
    }

    pub fn with_hire_date(mut self, date: NaiveDate) -> Self {
        self.hire_date = Some(date);
        self
    }

    /// Id of the stored bank account row, if any.
    pub fn bank_account_id(&self) -> Option<EntityId> {
        self.bank_account_id
    }

    /// Attach a bank account. Saving the employee persists it, links both
    /// directions, and removes any account it replaces.
    pub fn set_bank_account(&mut self, account: BankAccount) {
        self.bank_account = Some(account);
    }

    pub fn assign(&mut self, task: Task) {
        self.tasks.push(task);
    }
}

impl Validate for Employee {
    fn entity_name(&self) -> &'static str {
        "Employee"
    }

    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::text("name", Some(self.name.as_str()))
                .required()
                .max_len(255)
                .predicate(NO_DIGITS),
            Field::text("cpf", Some(self.cpf.as_str()))
                .required()
                .pattern(&CPF)
                .predicate(CPF_CHECKSUM),
            Field::text("email", Some(self.email.as_str()))
                .required()
                .max_len(150)
                .pattern(&EMAIL),
            Field::text("role", Some(self.role.as_str())).required().max_len(50),
            Field::date("hire_date", self.hire_date).past(),
            Field::decimal("salary", self.salary).min(minimum_salary()),
        ]
    }
}

/// Bank details of exactly one employee.
///
/// The foreign key lives on [`Employee`]; `employee()` is the back-reference,
/// written only by the integrity engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BankAccount {
    pub(crate) identity: Identity,
    pub bank_name: String,
    pub branch: String,
    pub account_number: String,
    pub(crate) employee: Option<EntityId>,
}

impl_entity!(BankAccount);

impl BankAccount {
    pub fn new(
        bank_name: impl Into<String>,
        branch: impl Into<String>,
        account_number: impl Into<String>,
    ) -> Self {
        Self {
            bank_name: bank_name.into(),
            branch: branch.into(),
            account_number: account_number.into(),
            ..Self::default()
        }
    }

    /// The employee holding this account.
    pub fn employee(&self) -> Option<EntityId> {
        self.employee
    }
}

impl Validate for BankAccount {
    fn entity_name(&self) -> &'static str {
        "BankAccount"
    }

    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::text("bank_name", Some(self.bank_name.as_str()))
                .required()
                .max_len(100)
                .predicate(NO_DIGITS),
            Field::text("branch", Some(self.branch.as_str()))
                .required()
                .max_len(10)
                .pattern(&DIGITS_AND_DASHES),
            Field::text("account_number", Some(self.account_number.as_str()))
                .required()
                .max_len(20)
                .pattern(&DIGITS_AND_DASHES),
        ]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Task {
    pub(crate) identity: Identity,
    pub employee: Option<EntityId>,
    pub description: String,
    pub started_at: Option<DateTime<Utc>>,
    pub due_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed: bool,
}

impl_entity!(Task);

impl Task {
    pub fn new(
        description: impl Into<String>,
        started_at: DateTime<Utc>,
        due_at: DateTime<Utc>,
    ) -> Self {
        Self {
            description: description.into(),
            started_at: Some(started_at),
            due_at: Some(due_at),
            ..Self::default()
        }
    }

    pub fn complete(&mut self, at: DateTime<Utc>) {
        self.completed = true;
        self.completed_at = Some(at);
    }
}

impl Validate for Task {
    fn entity_name(&self) -> &'static str {
        "Task"
    }

    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::reference("employee", self.employee).required(),
            Field::text("description", Some(self.description.as_str()))
                .required()
                .max_len(500),
            Field::timestamp("started_at", self.started_at).required(),
            Field::timestamp("due_at", self.due_at).required().future(),
            Field::timestamp("completed_at", self.completed_at),
            Field::flag("completed", Some(self.completed)).required(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bakehouse_core::RuleKind;
    use bakehouse_validation::{CpfChecksum, ValidationEngine};
    use chrono::{Duration, TimeZone};

    fn valid_employee() -> Employee {
        Employee::new("João Silva", "Padeiro Senior")
            .with_documents("12345678909", "joao@padaria.com")
            .with_salary(Decimal::new(320_000, 2))
            .with_hire_date(NaiveDate::from_ymd_opt(2021, 3, 1).unwrap())
    }

    #[test]
    fn valid_employee_has_no_violations() {
        assert!(ValidationEngine::new().validate(&valid_employee()).is_empty());
    }

    #[test]
    fn salary_below_minimum_is_exactly_one_violation() {
        let employee = valid_employee().with_salary(Decimal::new(90_000, 2));
        let violations = ValidationEngine::new().validate(&employee);
        assert_eq!(violations.len(), 1);
        assert!(violations.has("salary", &RuleKind::Min));
    }

    #[test]
    fn malformed_email_is_exactly_one_violation() {
        let mut employee = valid_employee();
        employee.email = "joaopadaria.com".to_string();
        let violations = ValidationEngine::new().validate(&employee);
        assert_eq!(violations.len(), 1);
        assert!(violations.has("email", &RuleKind::Pattern));
    }

    #[test]
    fn hire_date_in_the_future_is_rejected() {
        let employee = valid_employee().with_hire_date(NaiveDate::from_ymd_opt(2099, 12, 31).unwrap());
        let violations = ValidationEngine::new().validate(&employee);
        assert_eq!(violations.len(), 1);
        assert!(violations.has("hire_date", &RuleKind::Past));
    }

    #[test]
    fn hire_date_must_be_strictly_past() {
        let hired = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let engine = ValidationEngine::new()
            .with_clock(|| Utc.with_ymd_and_hms(2025, 6, 15, 9, 0, 0).unwrap());
        let violations = engine.validate(&valid_employee().with_hire_date(hired));
        assert_eq!(violations.len(), 1);
        assert!(violations.has("hire_date", &RuleKind::Past));

        let engine = ValidationEngine::new()
            .with_clock(|| Utc.with_ymd_and_hms(2025, 6, 16, 9, 0, 0).unwrap());
        assert!(engine.validate(&valid_employee().with_hire_date(hired)).is_empty());
    }

    #[test]
    fn fake_cpf_needs_the_checksum_predicate() {
        let mut employee = valid_employee();
        employee.cpf = "11111111111".to_string();
        assert!(ValidationEngine::new().validate(&employee).is_empty());

        let strict = ValidationEngine::new().with_predicate(CpfChecksum);
        assert_eq!(strict.validate(&employee).len(), 1);
    }

    #[test]
    fn bank_account_rules() {
        let ok = BankAccount::new("Banco do Brasil", "1234-5", "98765-0");
        assert!(ValidationEngine::new().validate(&ok).is_empty());

        let bad = BankAccount::new("Banco 24h", "12a", "");
        let violations = ValidationEngine::new().validate(&bad);
        assert!(violations.has("bank_name", &RuleKind::Predicate(NO_DIGITS.to_string())));
        assert!(violations.has("branch", &RuleKind::Pattern));
        assert!(violations.has("account_number", &RuleKind::Required));
    }

    #[test]
    fn task_requires_an_employee_and_a_future_due_date() {
        let now = Utc::now();
        let task = Task::new("Preparar massa", now, now - Duration::hours(1));
        let violations = ValidationEngine::new().validate(&task);
        assert_eq!(violations.len(), 2);
        assert!(violations.has("employee", &RuleKind::Required));
        assert!(violations.has("due_at", &RuleKind::Future));
    }

    #[test]
    fn completing_a_task_records_the_time() {
        let now = Utc::now();
        let mut task = Task::new("Assar pães", now, now + Duration::hours(2));
        task.complete(now);
        assert!(task.completed);
        assert_eq!(task.completed_at, Some(now));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: the salary floor is inclusive and is the only salary rule.
            #[test]
            fn salary_floor_is_inclusive(cents in 0i64..1_000_000) {
                let salary = Decimal::new(cents, 2);
                let violations = ValidationEngine::new().validate(&valid_employee().with_salary(salary));
                prop_assert_eq!(violations.is_empty(), salary >= minimum_salary());
            }
        }
    }
}
