//! Master password complexity rules.

use std::fmt;

/// Characters that satisfy the special-character rule.
pub const SPECIAL_CHARACTERS: &[char] = &['!', '#', '$', '*', '&', '@', '%', '_'];

/// Minimum master password length, in characters.
pub const MIN_LENGTH: usize = 8;

/// Per-rule outcome of checking a candidate master password.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationReport {
    pub has_uppercase: bool,
    pub has_lowercase: bool,
    pub has_special: bool,
    pub has_digit: bool,
    pub long_enough: bool,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.has_uppercase && self.has_lowercase && self.has_special && self.has_digit && self.long_enough
    }

    /// Rule descriptions paired with whether the candidate passed them.
    pub fn checks(&self) -> [(&'static str, bool); 5] {
        [
            ("at least one capital", self.has_uppercase),
            ("at least one lowercase", self.has_lowercase),
            ("at least one special", self.has_special),
            ("at least one number", self.has_digit),
            ("must be at least 8 characters", self.long_enough),
        ]
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (rule, passed) in self.checks() {
            writeln!(f, "    {rule:<32}{}", if passed { "ok" } else { "MISSING" })?;
        }
        Ok(())
    }
}

/// Check a candidate against every rule.
pub fn validate(candidate: &str) -> ValidationReport {
    ValidationReport {
        has_uppercase: candidate.chars().any(|c| c.is_ascii_uppercase()),
        has_lowercase: candidate.chars().any(|c| c.is_ascii_lowercase()),
        has_special: candidate.chars().any(|c| SPECIAL_CHARACTERS.contains(&c)),
        has_digit: candidate.chars().any(|c| c.is_ascii_digit()),
        long_enough: candidate.chars().count() >= MIN_LENGTH,
    }
}

/// Human-readable rule list shown before the root password is chosen.
pub fn describe_rules() -> String {
    let specials: String = SPECIAL_CHARACTERS.iter().collect();
    format!(
        "your password must meet all of the following conditions:\n\
         \n\
         \x20   at least one capital letter\n\
         \x20   at least one lowercase letter\n\
         \x20   at least one special character ({specials})\n\
         \x20   at least one number\n\
         \x20   must be at least {MIN_LENGTH} characters long\n\
         \n\
         **This is a one-time entry, you cannot change the root user password\n\
         after the first initialization.**"
    )
}
