use chrono::{Datelike, Utc};
use rand::Rng;

use crate::domain::account::AccountType;

/// Generates externally visible account numbers:
/// type prefix + 2-digit year + 6 random digits + 1 checksum digit.
///
/// The 6-digit random body does not guarantee uniqueness; the account store
/// enforces it and the account service regenerates on collision.
#[derive(Debug, Default)]
pub struct AccountNumberGenerator;

impl AccountNumberGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self, account_type: AccountType) -> String {
        let year = Utc::now().year() % 100;
        let body = format!(
            "{}{year:02}{:06}",
            account_type.number_prefix(),
            rand::thread_rng().gen_range(0..1_000_000u32),
        );
        format!("{body}{}", check_digit(&body))
    }
}

/// Weighted positional sum mod 10. Letters weigh in at their alphabetic
/// ordinal plus ten, so the type prefix participates in the checksum.
fn check_digit(body: &str) -> u32 {
    body.chars()
        .enumerate()
        .map(|(i, c)| numeric_value(c) * (i as u32 + 1))
        .sum::<u32>()
        % 10
}

fn numeric_value(c: char) -> u32 {
    match c {
        '0'..='9' => c as u32 - '0' as u32,
        'a'..='z' => c as u32 - 'a' as u32 + 10,
        'A'..='Z' => c as u32 - 'A' as u32 + 10,
        _ => 0,
    }
}

/// Whether `number` carries a valid checksum digit.
pub fn verify(number: &str) -> bool {
    if number.len() < 2 {
        return false;
    }
    let (body, check) = number.split_at(number.len() - 1);
    check
        .chars()
        .next()
        .and_then(|c| c.to_digit(10))
        .is_some_and(|digit| digit == check_digit(body))
}
