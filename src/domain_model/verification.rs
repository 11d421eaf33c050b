use serde::{Deserialize, Serialize};
use std::fmt;

/// What an emailed verification code is for. Each variant has its own
/// preconditions when the code is requested and its own effect once verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerificationPurpose {
    #[serde(rename = "register")]
    Register,
    #[serde(rename = "lost")]
    LostPassword,
    #[serde(rename = "email")]
    EmailChange,
}

impl VerificationPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationPurpose::Register => "register",
            VerificationPurpose::LostPassword => "lost",
            VerificationPurpose::EmailChange => "email",
        }
    }

    pub fn mail_subject(&self) -> &'static str {
        match self {
            VerificationPurpose::Register => "Your sign-up verification code",
            VerificationPurpose::LostPassword => "Your password reset verification code",
            VerificationPurpose::EmailChange => "Your email change verification code",
        }
    }
}

impl fmt::Display for VerificationPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Proof that a code was verified for an email; redeemable once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VerifiedToken(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purposes_use_short_wire_names() {
        let p: VerificationPurpose = serde_json::from_str("\"lost\"").unwrap();
        assert_eq!(p, VerificationPurpose::LostPassword);
        assert_eq!(
            serde_json::to_string(&VerificationPurpose::EmailChange).unwrap(),
            "\"email\""
        );
        assert!(serde_json::from_str::<VerificationPurpose>("\"other\"").is_err());
    }
}
