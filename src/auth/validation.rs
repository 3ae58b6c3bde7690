use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref NAME_RE: Regex = Regex::new(r"^[A-Za-z\s\-']{2,}$").unwrap();
    static ref EMAIL_RE: Regex = Regex::new(r"^[\w.-]+@[\w.-]+\.\w{2,}$").unwrap();
    static ref LOGIN_EMAIL_RE: Regex = Regex::new(r"^[\w.-]+@[\w.-]+\.\w+$").unwrap();
}

pub const MOBILE_DIGITS: usize = 10;
pub const MIN_PASSWORD_LEN: usize = 8;

/// Letters, spaces, hyphens and apostrophes; at least two characters.
pub fn is_valid_full_name(name: &str) -> bool {
    NAME_RE.is_match(name)
}

/// `local@domain.tld` with a TLD of two or more word characters.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Looser form accepted at login, where any non-empty TLD passes.
pub fn is_valid_login_email(email: &str) -> bool {
    LOGIN_EMAIL_RE.is_match(email)
}

/// Mobile numbers may carry separators; only the digits count.
pub fn mobile_digits(mobile: &str) -> String {
    mobile.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Every strength rule `password` misses, in a fixed order.
pub fn password_problems(password: &str) -> Vec<&'static str> {
    let mut problems = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LEN {
        problems.push("at least 8 characters");
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        problems.push("an uppercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        problems.push("a lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        problems.push("a number");
    }
    if !password.chars().any(|c| !c.is_ascii_alphanumeric()) {
        problems.push("a special character");
    }
    problems
}

pub fn check_password_strength(password: &str) -> Result<(), String> {
    let problems = password_problems(password);
    if problems.is_empty() {
        Ok(())
    } else {
        Err(format!("Password must contain {}", problems.join(", ")))
    }
}
