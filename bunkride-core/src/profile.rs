use bunkride_shared::pii::Masked;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::college::College;

/// A registered student. The college is derived from the email at signup and
/// never changes; mutable fields are edited only by the owning principal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub college: College,
    pub phone: Masked<String>,
    pub year: Option<String>,
    pub avatar_url: Option<String>,
    pub show_name: bool,
    pub show_year: bool,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// Name as shown to other students, honoring the privacy flag.
    pub fn public_name(&self) -> String {
        if self.show_name {
            self.name.clone()
        } else {
            initials(&self.name)
        }
    }

    pub fn public_year(&self) -> Option<&str> {
        if self.show_year {
            self.year.as_deref()
        } else {
            None
        }
    }
}

fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .flat_map(|c| c.to_uppercase())
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProfile {
    pub name: String,
    pub email: String,
    /// Raw password; hashed with Argon2id before storage.
    pub password: String,
    pub phone: String,
    pub year: Option<String>,
}

/// `None` = no change. Email and college are immutable and absent here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub year: Option<String>,
    pub avatar_url: Option<String>,
    pub show_name: Option<bool>,
    pub show_year: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(show_name: bool) -> Profile {
        Profile {
            id: Uuid::new_v4(),
            name: "Arjun Sharma".to_string(),
            email: "arjun@thapar.edu".to_string(),
            college: College::from_email("arjun@thapar.edu").unwrap(),
            phone: Masked::new("+91 98765 43210".to_string()),
            year: Some("Final Year".to_string()),
            avatar_url: None,
            show_name,
            show_year: false,
            email_verified: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn public_name_honors_privacy_flag() {
        assert_eq!(profile(true).public_name(), "Arjun Sharma");
        assert_eq!(profile(false).public_name(), "AS");
    }

    #[test]
    fn hidden_year_is_absent() {
        assert_eq!(profile(true).public_year(), None);
    }
}
