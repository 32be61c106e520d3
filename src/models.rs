use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/**
 * Permissions which may be granted to a user
 *
 * Stored in the database by their codename
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Permission {
    AddPoll,
}

impl Permission {
    pub fn codename(&self) -> &'static str {
        match self {
            Permission::AddPoll => "add_poll",
        }
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add_poll" => Ok(Permission::AddPoll),
            other => Err(format!("unknown permission `{}`", other)),
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.codename())
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub date_joined: DateTime<Utc>,
    pub permissions: Vec<Permission>,
}

impl User {
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/**
 * A user along with the stored password hash, only used for authentication
 */
#[derive(Clone, Debug)]
pub struct Credentials {
    pub user: User,
    pub password_hash: String,
}

#[derive(Clone, Debug)]
pub struct InsertableUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub permissions: Vec<Permission>,
}

#[derive(Clone, Debug)]
pub struct Session {
    pub token: Uuid,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
pub struct Poll {
    pub id: i64,
    pub owner_id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Poll {
    pub fn is_owned_by(&self, user: &User) -> bool {
        self.owner_id == user.id
    }
}

#[derive(Clone, Debug)]
pub struct InsertablePoll {
    pub owner_id: i64,
    pub text: String,
    /**
     * Just the text of each choice
     */
    pub choices: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
pub struct Choice {
    pub id: i64,
    pub poll_id: i64,
    pub choice_text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
pub struct Vote {
    pub id: i64,
    pub user_id: i64,
    pub poll_id: i64,
    pub choice_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct InsertableVote {
    pub user_id: i64,
    pub poll_id: i64,
    pub choice_id: i64,
}

/**
 * A single row of a poll listing
 */
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct PollSummary {
    pub id: i64,
    pub owner_id: i64,
    pub owner_username: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub vote_count: i64,
}

/**
 * Results for a given choice, the tally is always computed from the votes
 */
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct ChoiceTally {
    pub id: i64,
    pub poll_id: i64,
    pub choice_text: String,
    pub votes: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollSort {
    Name,
    Newest,
    Votes,
}

impl Default for PollSort {
    fn default() -> Self {
        PollSort::Newest
    }
}

impl PollSort {
    /**
     * Unknown values fall back to the default ordering rather than failing
     */
    pub fn from_param(param: Option<&str>) -> Self {
        match param.map(str::trim) {
            Some("name") => PollSort::Name,
            Some("votes") => PollSort::Votes,
            _ => PollSort::Newest,
        }
    }

    pub fn param(&self) -> &'static str {
        match self {
            PollSort::Name => "name",
            PollSort::Newest => "date",
            PollSort::Votes => "votes",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct PollFilter {
    /**
     * Case-insensitive substring of the poll text
     */
    pub search: Option<String>,
    pub owner_id: Option<i64>,
    pub sort: PollSort,
}

impl PollFilter {
    pub fn matches(&self, poll: &Poll) -> bool {
        if let Some(owner) = self.owner_id {
            if poll.owner_id != owner {
                return false;
            }
        }
        match &self.search {
            Some(term) => poll.text.to_lowercase().contains(&term.to_lowercase()),
            None => true,
        }
    }
}
