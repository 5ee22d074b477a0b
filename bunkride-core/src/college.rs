use serde::{Deserialize, Serialize};

use crate::error::{WorkflowError, WorkflowResult};

/// Opaque partition key derived from an institutional email address.
/// "priya@thapar.edu" → "thapar". Trips are only visible within one college,
/// so the derivation must be deterministic and is never recomputed after
/// signup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct College(String);

impl College {
    /// First label of the email's domain, lowercased.
    pub fn from_email(email: &str) -> WorkflowResult<Self> {
        let domain = email
            .rsplit_once('@')
            .map(|(_, d)| d)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| WorkflowError::Validation(format!("not an email address: {email}")))?;

        let label = domain
            .split('.')
            .next()
            .filter(|l| !l.is_empty())
            .ok_or_else(|| WorkflowError::Validation(format!("email domain has no label: {email}")))?;

        Ok(College(label.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for College {
    fn from(raw: String) -> Self {
        College(raw)
    }
}

impl std::fmt::Display for College {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Signup gate: the email's domain must end with one of the configured
/// institutional suffixes (".edu", ".ac.in", ...).
pub fn is_institutional(email: &str, allowed_suffixes: &[String]) -> bool {
    let Some((_, domain)) = email.rsplit_once('@') else {
        return false;
    };
    let domain = domain.to_ascii_lowercase();
    allowed_suffixes
        .iter()
        .any(|suffix| domain.ends_with(suffix.to_ascii_lowercase().as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_first_domain_label() {
        assert_eq!(College::from_email("priya@thapar.edu").unwrap().as_str(), "thapar");
        assert_eq!(College::from_email("x@Chitkara.ac.in").unwrap().as_str(), "chitkara");
    }

    #[test]
    fn rejects_non_emails() {
        assert!(College::from_email("no-at-sign").is_err());
        assert!(College::from_email("trailing@").is_err());
    }

    #[test]
    fn institutional_suffix_check() {
        let allowed = vec![".edu".to_string(), ".ac.in".to_string()];
        assert!(is_institutional("a@thapar.edu", &allowed));
        assert!(is_institutional("b@iitd.ac.in", &allowed));
        assert!(!is_institutional("c@gmail.com", &allowed));
        assert!(!is_institutional("not-an-email", &allowed));
    }
}
