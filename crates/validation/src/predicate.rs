//! Pluggable domain predicates.
//!
//! Rules refer to predicates by name; the engine resolves the name against its
//! registry. The jurisdiction-specific checks (Brazilian CPF/CNPJ check digits,
//! postal regions) live here as ordinary implementations so callers can swap
//! or omit them.

use crate::field::FieldValue;

pub const NO_DIGITS: &str = "no_digits";
pub const POSTAL_REGION: &str = "postal_region";
pub const CPF_CHECKSUM: &str = "cpf_checksum";
pub const CNPJ_CHECKSUM: &str = "cnpj_checksum";

/// A named boolean check over a non-null field value.
///
/// The engine never calls `test` with a null value; presence is the job of
/// the `Required` rule.
pub trait Predicate: Send + Sync {
    fn name(&self) -> &'static str;

    fn test(&self, value: &FieldValue<'_>) -> bool;

    fn message(&self) -> String;
}

/// Text must not contain any ASCII digit.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDigits;

impl Predicate for NoDigits {
    fn name(&self) -> &'static str {
        NO_DIGITS
    }

    fn test(&self, value: &FieldValue<'_>) -> bool {
        match value.as_text() {
            Some(text) => !text.chars().any(|c| c.is_ascii_digit()),
            None => true,
        }
    }

    fn message(&self) -> String {
        "must not contain digits".to_string()
    }
}

/// Postal code must start with one of the allowed region digits.
#[derive(Debug, Clone)]
pub struct PostalRegion {
    allowed: Vec<char>,
}

impl PostalRegion {
    pub fn new(allowed: impl IntoIterator<Item = char>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }

    pub fn allowed(&self) -> &[char] {
        &self.allowed
    }
}

impl Default for PostalRegion {
    fn default() -> Self {
        Self::new(['5'])
    }
}

impl Predicate for PostalRegion {
    fn name(&self) -> &'static str {
        POSTAL_REGION
    }

    fn test(&self, value: &FieldValue<'_>) -> bool {
        let Some(text) = value.as_text() else {
            return true;
        };
        text.trim()
            .chars()
            .find(|c| *c != '-')
            .is_some_and(|first| self.allowed.contains(&first))
    }

    fn message(&self) -> String {
        let regions: String = self.allowed.iter().collect();
        format!("must start with one of the region digits [{regions}]")
    }
}

/// Brazilian individual taxpayer number (11 digits, two mod-11 check digits).
#[derive(Debug, Default, Clone, Copy)]
pub struct CpfChecksum;

impl Predicate for CpfChecksum {
    fn name(&self) -> &'static str {
        CPF_CHECKSUM
    }

    fn test(&self, value: &FieldValue<'_>) -> bool {
        value
            .as_text()
            .map(|text| check_digits_valid(text, 11, &CPF_WEIGHTS_1, &CPF_WEIGHTS_2))
            .unwrap_or(true)
    }

    fn message(&self) -> String {
        "is not a valid CPF".to_string()
    }
}

/// Brazilian company registry number (14 digits, two mod-11 check digits).
#[derive(Debug, Default, Clone, Copy)]
pub struct CnpjChecksum;

impl Predicate for CnpjChecksum {
    fn name(&self) -> &'static str {
        CNPJ_CHECKSUM
    }

    fn test(&self, value: &FieldValue<'_>) -> bool {
        value
            .as_text()
            .map(|text| check_digits_valid(text, 14, &CNPJ_WEIGHTS_1, &CNPJ_WEIGHTS_2))
            .unwrap_or(true)
    }

    fn message(&self) -> String {
        "is not a valid CNPJ".to_string()
    }
}

const CPF_WEIGHTS_1: [u32; 9] = [10, 9, 8, 7, 6, 5, 4, 3, 2];
const CPF_WEIGHTS_2: [u32; 10] = [11, 10, 9, 8, 7, 6, 5, 4, 3, 2];
const CNPJ_WEIGHTS_1: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
const CNPJ_WEIGHTS_2: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

/// Punctuation (`.`, `-`, `/`) is ignored; numbers made of one repeated digit
/// are rejected even though their check digits add up.
fn check_digits_valid(text: &str, len: usize, first: &[u32], second: &[u32]) -> bool {
    let mut digits = Vec::with_capacity(len);
    for c in text.chars() {
        match c {
            '.' | '-' | '/' => continue,
            _ => match c.to_digit(10) {
                Some(d) => digits.push(d),
                None => return false,
            },
        }
    }

    if digits.len() != len || digits.iter().all(|d| *d == digits[0]) {
        return false;
    }

    let dv1 = mod11_digit(&digits[..first.len()], first);
    let dv2 = mod11_digit(&digits[..second.len()], second);
    digits[len - 2] == dv1 && digits[len - 1] == dv2
}

fn mod11_digit(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    let rem = sum % 11;
    if rem < 2 { 0 } else { 11 - rem }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> FieldValue<'_> {
        FieldValue::Text(Some(s))
    }

    #[test]
    fn no_digits_rejects_any_digit() {
        assert!(NoDigits.test(&text("Banco do Brasil")));
        assert!(!NoDigits.test(&text("Banco 24h")));
        assert!(NoDigits.test(&FieldValue::Text(None)));
    }

    #[test]
    fn postal_region_checks_first_digit() {
        let pe = PostalRegion::default();
        assert!(pe.test(&text("50000-000")));
        assert!(!pe.test(&text("64000-450")));

        let wider = PostalRegion::new(['5', '6']);
        assert!(wider.test(&text("64000-450")));
        assert!(!wider.test(&text("")));
    }

    #[test]
    fn cpf_check_digits() {
        assert!(CpfChecksum.test(&text("12345678909")));
        assert!(CpfChecksum.test(&text("123.456.789-09")));
        assert!(!CpfChecksum.test(&text("12345678900")));
        assert!(!CpfChecksum.test(&text("11111111111")));
        assert!(!CpfChecksum.test(&text("1234567890")));
    }

    #[test]
    fn cnpj_check_digits() {
        assert!(CnpjChecksum.test(&text("05604099000154")));
        assert!(CnpjChecksum.test(&text("05.604.099/0001-54")));
        assert!(!CnpjChecksum.test(&text("12345678901234")));
        assert!(!CnpjChecksum.test(&text("12345678000199")));
        assert!(!CnpjChecksum.test(&text("00000000000000")));
    }
}
