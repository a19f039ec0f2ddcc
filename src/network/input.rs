//! Request payloads and their validation
//!
//! Every payload validates into a typed value before the service touches the
//! store. All field problems of a payload are reported together.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::Role;
use crate::db::Gender;
use crate::network::store::ProfileChanges;
use crate::types::{AliancaError, FieldError, Result};

pub const MIN_NAME_LEN: usize = 3;
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MIN_LOGIN_PASSWORD_LEN: usize = 6;
pub const MAX_REASON_LEN: usize = 500;

/// Collects field failures for one payload
#[derive(Default)]
struct Checks {
    errors: Vec<FieldError>,
}

impl Checks {
    fn fail(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    fn name(&mut self, name: &str) {
        if name.trim().chars().count() < MIN_NAME_LEN {
            self.fail("name", format!("Name must have at least {MIN_NAME_LEN} characters"));
        }
    }

    fn email(&mut self, email: &str) {
        if !is_valid_email(email.trim()) {
            self.fail("email", "Invalid email");
        }
    }

    fn password(&mut self, field: &str, password: &str) {
        if password.chars().count() < MIN_PASSWORD_LEN {
            self.fail(
                field,
                format!("Password must have at least {MIN_PASSWORD_LEN} characters"),
            );
        }
    }

    fn uuid(&mut self, field: &str, value: Option<&str>) {
        if let Some(value) = value {
            if Uuid::parse_str(value).is_err() {
                self.fail(field, "Must be a UUID");
            }
        }
    }

    fn activity(&mut self, level: Option<u8>) {
        if let Some(level) = level {
            if !(1..=5).contains(&level) {
                self.fail("activity_level", "Activity level must be between 1 and 5");
            }
        }
    }

    fn birth_date(&mut self, raw: Option<&str>) -> Option<NaiveDate> {
        let raw = raw?;
        match parse_birth_date(raw) {
            Some(date) if date <= Utc::now().date_naive() => Some(date),
            Some(_) => {
                self.fail("birth_date", "Birth date cannot be in the future");
                None
            }
            None => {
                self.fail("birth_date", "Expected a date as YYYY-MM-DD");
                None
            }
        }
    }

    fn finish(self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AliancaError::Validation(self.errors))
        }
    }
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

/// Accepts a plain date or an RFC 3339 timestamp
fn parse_birth_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().or_else(|| {
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc).date_naive())
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<()> {
        let mut checks = Checks::default();
        checks.email(&self.email);
        if self.password.chars().count() < MIN_LOGIN_PASSWORD_LEN {
            checks.fail(
                "password",
                format!("Password must have at least {MIN_LOGIN_PASSWORD_LEN} characters"),
            );
        }
        checks.finish()
    }
}

/// Body of a member registration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewMember {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub phone: Option<String>,
    pub birth_date: Option<String>,
    pub gender: Option<Gender>,
    pub role: Option<Role>,
    pub supervisor_id: Option<String>,
    pub ministry_id: Option<String>,
    pub photo_url: Option<String>,
    pub baptized: Option<bool>,
    pub life_university: Option<bool>,
    pub destiny_training_1: Option<bool>,
    pub destiny_training_2: Option<bool>,
    pub destiny_training_3: Option<bool>,
    pub activity_level: Option<u8>,
}

/// Registration that passed validation
#[derive(Debug, Clone)]
pub struct ValidNewMember {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    /// Optional fields, applied on top of the fresh document
    pub profile: ProfileChanges,
}

impl NewMember {
    pub fn validate(self) -> Result<ValidNewMember> {
        let mut checks = Checks::default();
        checks.name(&self.name);
        checks.email(&self.email);
        checks.password("password", &self.password);
        if self.gender.is_none() {
            checks.fail("gender", "Gender is required");
        }
        checks.uuid("supervisor_id", self.supervisor_id.as_deref());
        checks.uuid("ministry_id", self.ministry_id.as_deref());
        checks.activity(self.activity_level);
        let birth_date = checks.birth_date(self.birth_date.as_deref());
        checks.finish()?;

        Ok(ValidNewMember {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            password: self.password,
            role: self.role.unwrap_or_default(),
            profile: ProfileChanges {
                name: None,
                email: None,
                phone: non_blank(self.phone),
                birth_date,
                gender: self.gender,
                supervisor_id: self.supervisor_id,
                ministry_id: self.ministry_id,
                photo_url: non_blank(self.photo_url),
                baptized: self.baptized,
                life_university: self.life_university,
                destiny_training_1: self.destiny_training_1,
                destiny_training_2: self.destiny_training_2,
                destiny_training_3: self.destiny_training_3,
                activity_level: self.activity_level,
            },
        })
    }
}

/// Body of a profile update; every field is optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateMember {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<String>,
    pub gender: Option<Gender>,
    /// Only present to reject it; roles change through promotion
    pub role: Option<Role>,
    pub supervisor_id: Option<String>,
    pub ministry_id: Option<String>,
    pub photo_url: Option<String>,
    pub baptized: Option<bool>,
    pub life_university: Option<bool>,
    pub destiny_training_1: Option<bool>,
    pub destiny_training_2: Option<bool>,
    pub destiny_training_3: Option<bool>,
    pub activity_level: Option<u8>,
}

impl UpdateMember {
    pub fn validate(self) -> Result<ProfileChanges> {
        let mut checks = Checks::default();
        if let Some(ref name) = self.name {
            checks.name(name);
        }
        if let Some(ref email) = self.email {
            checks.email(email);
        }
        if self.role.is_some() {
            checks.fail("role", "Role can only be changed through promotion");
        }
        checks.uuid("supervisor_id", self.supervisor_id.as_deref());
        checks.uuid("ministry_id", self.ministry_id.as_deref());
        checks.activity(self.activity_level);
        let birth_date = checks.birth_date(self.birth_date.as_deref());
        checks.finish()?;

        Ok(ProfileChanges {
            name: self.name.map(|n| n.trim().to_string()),
            email: self.email.map(|e| e.trim().to_lowercase()),
            phone: self.phone,
            birth_date,
            gender: self.gender,
            supervisor_id: self.supervisor_id,
            ministry_id: self.ministry_id,
            photo_url: self.photo_url,
            baptized: self.baptized,
            life_university: self.life_university,
            destiny_training_1: self.destiny_training_1,
            destiny_training_2: self.destiny_training_2,
            destiny_training_3: self.destiny_training_3,
            activity_level: self.activity_level,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromoteRequest {
    pub new_role: Role,
    pub reason: Option<String>,
}

impl PromoteRequest {
    pub fn validate(&self) -> Result<()> {
        let mut checks = Checks::default();
        if self
            .reason
            .as_ref()
            .is_some_and(|r| r.chars().count() > MAX_REASON_LEN)
        {
            checks.fail(
                "reason",
                format!("Reason must have at most {MAX_REASON_LEN} characters"),
            );
        }
        checks.finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PasswordChange {
    pub current_password: Option<String>,
    #[serde(default)]
    pub new_password: String,
}

impl PasswordChange {
    pub fn validate(&self) -> Result<()> {
        let mut checks = Checks::default();
        checks.password("new_password", &self.new_password);
        checks.finish()
    }
}
