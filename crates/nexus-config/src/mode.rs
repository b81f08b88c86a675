//! Socket file permission bits written the way `chmod` takes them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::defaults::DEFAULT_SOCKET_PERMISSIONS;

/// Highest mode accepted for a socket file; setuid, setgid and sticky bits
/// are refused.
const MAX_MODE: u32 = 0o777;

/// Permission bits applied to each service socket.
///
/// Both text and integers are read as octal digits, so `770`, `"770"`,
/// `"0770"` and `"0o770"` all mean `rwxrwx---`. A TOML octal literal such as
/// `0o770` reaches the parser as the integer 504 and is read as `0o504`; write
/// the digits plainly instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "RawMode", into = "String")]
pub struct SocketMode(u32);

impl SocketMode {
    /// Wraps already decoded permission bits.
    ///
    /// # Errors
    ///
    /// Returns [`SocketModeError::OutOfRange`] for bits above `0o777`.
    pub const fn from_bits(bits: u32) -> Result<Self, SocketModeError> {
        if bits > MAX_MODE {
            return Err(SocketModeError::OutOfRange { bits });
        }
        Ok(Self(bits))
    }

    /// Decoded permission bits, ready for `chmod`.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }
}

impl Default for SocketMode {
    fn default() -> Self {
        Self(DEFAULT_SOCKET_PERMISSIONS)
    }
}

impl fmt::Display for SocketMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04o}", self.0)
    }
}

impl FromStr for SocketMode {
    type Err = SocketModeError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let trimmed = text.trim();
        let digits = trimmed.strip_prefix("0o").unwrap_or(trimmed);
        let bits = u32::from_str_radix(digits, 8).map_err(|_| SocketModeError::NotOctal {
            value: text.to_owned(),
        })?;
        Self::from_bits(bits)
    }
}

impl From<SocketMode> for String {
    fn from(mode: SocketMode) -> Self {
        mode.to_string()
    }
}

/// Wire forms accepted for a socket mode.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawMode {
    Digits(u64),
    Text(String),
}

impl TryFrom<RawMode> for SocketMode {
    type Error = SocketModeError;

    fn try_from(raw: RawMode) -> Result<Self, Self::Error> {
        match raw {
            RawMode::Digits(digits) => digits.to_string().parse(),
            RawMode::Text(text) => text.parse(),
        }
    }
}

/// Errors raised while reading a [`SocketMode`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SocketModeError {
    /// The value holds a digit outside `0..=7` or no digits at all.
    #[error("socket mode '{value}' is not an octal number such as 770")]
    NotOctal {
        /// Rejected text.
        value: String,
    },
    /// The value sets bits beyond the owner, group and other triplets.
    #[error("socket mode {bits:o} exceeds 777")]
    OutOfRange {
        /// Rejected bits.
        bits: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("770", 0o770)]
    #[case("0770", 0o770)]
    #[case("0o600", 0o600)]
    #[case(" 640 ", 0o640)]
    fn parses_octal_text(#[case] text: &str, #[case] bits: u32) {
        let mode: SocketMode = text.parse().expect("mode should parse");
        assert_eq!(mode.bits(), bits);
    }

    #[rstest]
    #[case("780")]
    #[case("rwx")]
    #[case("")]
    fn rejects_non_octal_text(#[case] text: &str) {
        let error = text.parse::<SocketMode>().expect_err("mode should be rejected");
        assert!(matches!(error, SocketModeError::NotOctal { .. }));
    }

    #[test]
    fn rejects_special_bits() {
        let error = "1777".parse::<SocketMode>().expect_err("sticky bit refused");
        assert_eq!(error, SocketModeError::OutOfRange { bits: 0o1777 });
    }

    #[rstest]
    #[case(serde_json::json!(770), 0o770)]
    #[case(serde_json::json!("0660"), 0o660)]
    fn integers_and_strings_read_as_octal(#[case] value: serde_json::Value, #[case] bits: u32) {
        let mode: SocketMode = serde_json::from_value(value).expect("mode should deserialise");
        assert_eq!(mode.bits(), bits);
    }

    #[test]
    fn serialises_as_octal_text() {
        let value = serde_json::to_value(SocketMode::default()).expect("mode serialises");
        assert_eq!(value, serde_json::json!("0770"));
    }
}
