//! Input validation for the three lookup kinds.

use std::sync::LazyLock;

use phonenumber::{Mode, PhoneNumber, country};
use regex::Regex;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}$").expect("static regex")
});

static USERNAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.]{3,30}$").expect("static regex"));

/// What the user asked to look up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    Email,
    Phone,
    Username,
}

impl LookupKind {
    /// Callback data carried by the menu button.
    pub fn callback_data(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Username => "user",
        }
    }

    pub fn from_callback_data(data: &str) -> Option<Self> {
        match data {
            "email" => Some(Self::Email),
            "phone" => Some(Self::Phone),
            "user" => Some(Self::Username),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Email => "📧 Email",
            Self::Phone => "📞 Phone",
            Self::Username => "👤 Username",
        }
    }

    pub fn prompt(self) -> &'static str {
        match self {
            Self::Email => "Send the email address:",
            Self::Phone => "Send the phone number (+9665xxxxxxxx or 05xxxxxxxx):",
            Self::Username => "Send the username (e.g. @username):",
        }
    }

    pub fn invalid_hint(self) -> &'static str {
        match self {
            Self::Email => "That is not a valid email address. Try again.",
            Self::Phone => "That is not a valid phone number. Send it as +9665xxxxxxxx or 05xxxxxxxx.",
            Self::Username => "That is not a valid username. Example: @example",
        }
    }

    /// Validates `input` and returns the text to report for it.
    pub fn check(self, input: &str, region: country::Id) -> Option<String> {
        match self {
            Self::Email => normalize_email(input),
            Self::Phone => parse_phone(input, region).map(|phone| phone.summary()),
            Self::Username => normalize_username(input).map(|name| format!("@{name}")),
        }
    }

    pub const ALL: [Self; 3] = [Self::Email, Self::Phone, Self::Username];
}

/// Returns the trimmed, lowercased address if it looks like an email.
pub fn normalize_email(input: &str) -> Option<String> {
    let trimmed = input.trim();
    EMAIL.is_match(trimmed).then(|| trimmed.to_lowercase())
}

/// Returns the name without a leading `@`.
///
/// A name of 3 to 30 letters, digits, `_` or `.` is accepted as is. Anything
/// else is accepted only when written with a leading `@`.
pub fn normalize_username(input: &str) -> Option<String> {
    let trimmed = input.trim();
    match trimmed.strip_prefix('@') {
        Some(name) if !name.is_empty() => Some(name.to_string()),
        Some(_) => None,
        None => USERNAME.is_match(trimmed).then(|| trimmed.to_string()),
    }
}

/// A validated phone number in the forms shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneDetails {
    pub e164: String,
    pub international: String,
    pub national: String,
}

impl PhoneDetails {
    fn from_number(number: &PhoneNumber) -> Self {
        Self {
            e164: number.format().mode(Mode::E164).to_string(),
            international: number.format().mode(Mode::International).to_string(),
            national: number.format().mode(Mode::National).to_string(),
        }
    }

    /// One line per format.
    pub fn summary(&self) -> String {
        format!(
            "E164: {}\nIntl: {}\nLocal: {}",
            self.e164, self.international, self.national
        )
    }
}

/// Parses a phone number, reading numbers without a `+` prefix as national
/// numbers of `region`. Returns `None` unless the number is valid.
pub fn parse_phone(input: &str, region: country::Id) -> Option<PhoneDetails> {
    let number = phonenumber::parse(Some(region), input.trim()).ok()?;
    phonenumber::is_valid(&number).then(|| PhoneDetails::from_number(&number))
}

/// Parses a two-letter region code such as `SA`.
pub fn parse_region(value: &str) -> Result<country::Id, String> {
    value
        .trim()
        .to_ascii_uppercase()
        .parse::<country::Id>()
        .map_err(|_| format!("'{value}' is not a region code"))
}
