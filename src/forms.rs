use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;

pub const REQUIRED: &str = "This field is required.";

/**
 * Validation errors keyed by field name, rendered next to each input
 */
#[derive(Debug, Default, Serialize)]
pub struct FieldErrors(BTreeMap<&'static str, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &'static str, message: &str) {
        self.0.entry(field).or_default().push(message.to_string());
    }

    pub fn require(&mut self, field: &'static str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, REQUIRED);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&Vec<String>> {
        self.0.get(field)
    }
}

/**
 * Submitted ballot, `choice` is the id of the selected choice
 */
#[derive(Debug, Default, Deserialize)]
pub struct VoteForm {
    pub choice: Option<String>,
}

/**
 * User-provided details to create a poll with its first two choices
 */
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PollForm {
    pub text: String,
    pub choice1: String,
    pub choice2: String,
}

impl PollForm {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::default();
        errors.require("text", &self.text);
        errors.require("choice1", &self.choice1);
        errors.require("choice2", &self.choice2);
        errors
    }

    pub fn choices(&self) -> Vec<String> {
        vec![
            self.choice1.trim().to_string(),
            self.choice2.trim().to_string(),
        ]
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EditPollForm {
    pub text: String,
}

impl EditPollForm {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::default();
        errors.require("text", &self.text);
        errors
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ChoiceForm {
    pub choice_text: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password1: String,
    #[serde(skip_serializing)]
    pub password2: String,
}

impl RegisterForm {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::default();
        errors.require("username", &self.username);
        errors.require("password1", &self.password1);
        errors.require("password2", &self.password2);

        let email = self.email.trim();
        if !email.is_empty() && !email.contains('@') {
            errors.add("email", "Enter a valid email address.");
        }
        if !self.password1.is_empty() && !self.password2.is_empty() {
            if self.password1 != self.password2 {
                errors.add("password2", "The two password fields did not match.");
            } else if self.password1.chars().count() < 8 {
                errors.add(
                    "password2",
                    "This password is too short. It must contain at least 8 characters.",
                );
            } else if self.password1.chars().all(|c| c.is_ascii_digit()) {
                errors.add("password2", "This password is entirely numeric.");
            }
        }
        errors
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub next: Option<String>,
}

/**
 * Query string of the poll listings
 */
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    pub page: Option<String>,
    pub sort: Option<String>,
}

impl ListQuery {
    /**
     * A blank search box means no filtering at all
     */
    pub fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}
