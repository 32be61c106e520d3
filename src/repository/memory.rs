use async_trait::async_trait;
use chrono::Utc;
use log::*;
use uuid::Uuid;

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use super::*;

#[derive(Debug)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    password_hash: String,
    date_joined: chrono::DateTime<Utc>,
    permissions: HashSet<Permission>,
}

impl UserRow {
    fn to_user(&self) -> User {
        let mut permissions: Vec<Permission> = self.permissions.iter().copied().collect();
        permissions.sort_by_key(|p| p.codename());
        User {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            date_joined: self.date_joined,
            permissions,
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    users: Vec<UserRow>,
    sessions: HashMap<Uuid, Session>,
    polls: Vec<Poll>,
    choices: Vec<Choice>,
    votes: Vec<Vote>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn summary(&self, poll: &Poll) -> PollSummary {
        let owner_username = self
            .users
            .iter()
            .find(|u| u.id == poll.owner_id)
            .map(|u| u.username.clone())
            .unwrap_or_default();
        PollSummary {
            id: poll.id,
            owner_id: poll.owner_id,
            owner_username,
            text: poll.text.clone(),
            created_at: poll.created_at,
            vote_count: self.votes.iter().filter(|v| v.poll_id == poll.id).count() as i64,
        }
    }

    fn matching(&self, filter: &PollFilter) -> Vec<PollSummary> {
        let mut rows: Vec<PollSummary> = self
            .polls
            .iter()
            .filter(|p| filter.matches(p))
            .map(|p| self.summary(p))
            .collect();

        match filter.sort {
            PollSort::Name => rows.sort_by(|a, b| a.text.cmp(&b.text).then(a.id.cmp(&b.id))),
            PollSort::Newest => rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))),
            PollSort::Votes => rows.sort_by(|a, b| b.vote_count.cmp(&a.vote_count).then(b.id.cmp(&a.id))),
        }
        rows
    }
}

/**
 * Process-local storage with the same invariants as the database schema
 */
#[derive(Debug, Default)]
pub struct MemoryRepository {
    tables: Mutex<Tables>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> RepoResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|e| RepoError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl UserRepository for MemoryRepository {
    async fn create_user(&self, user: InsertableUser) -> RepoResult<User> {
        let mut tables = self.lock()?;
        if tables.users.iter().any(|u| u.username == user.username) {
            return Err(RepoError::Conflict(format!("username {}", user.username)));
        }
        let row = UserRow {
            id: tables.next_id(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            date_joined: Utc::now(),
            permissions: user.permissions.into_iter().collect(),
        };
        let created = row.to_user();
        tables.users.push(row);
        debug!("Created user {}", created.username);
        Ok(created)
    }

    async fn find_user(&self, id: i64) -> RepoResult<Option<User>> {
        let tables = self.lock()?;
        Ok(tables.users.iter().find(|u| u.id == id).map(UserRow::to_user))
    }

    async fn find_credentials(&self, username: &str) -> RepoResult<Option<Credentials>> {
        let tables = self.lock()?;
        Ok(tables
            .users
            .iter()
            .find(|u| u.username == username)
            .map(|u| Credentials {
                user: u.to_user(),
                password_hash: u.password_hash.clone(),
            }))
    }

    async fn grant_permission(&self, user_id: i64, permission: Permission) -> RepoResult<()> {
        let mut tables = self.lock()?;
        if let Some(user) = tables.users.iter_mut().find(|u| u.id == user_id) {
            user.permissions.insert(permission);
        }
        Ok(())
    }

    async fn create_session(&self, user_id: i64) -> RepoResult<Session> {
        let session = Session {
            token: Uuid::new_v4(),
            user_id,
            created_at: Utc::now(),
        };
        self.lock()?.sessions.insert(session.token, session.clone());
        Ok(session)
    }

    async fn session_user(&self, token: Uuid) -> RepoResult<Option<User>> {
        let tables = self.lock()?;
        Ok(tables.sessions.get(&token).and_then(|session| {
            tables
                .users
                .iter()
                .find(|u| u.id == session.user_id)
                .map(UserRow::to_user)
        }))
    }

    async fn delete_session(&self, token: Uuid) -> RepoResult<()> {
        self.lock()?.sessions.remove(&token);
        Ok(())
    }
}

#[async_trait]
impl PollRepository for MemoryRepository {
    async fn create_poll(&self, poll: InsertablePoll) -> RepoResult<Poll> {
        let mut tables = self.lock()?;
        let created = Poll {
            id: tables.next_id(),
            owner_id: poll.owner_id,
            text: poll.text,
            created_at: Utc::now(),
        };
        for choice_text in poll.choices {
            let id = tables.next_id();
            tables.choices.push(Choice {
                id,
                poll_id: created.id,
                choice_text,
            });
        }
        tables.polls.push(created.clone());
        Ok(created)
    }

    async fn find_poll(&self, id: i64) -> RepoResult<Option<Poll>> {
        Ok(self.lock()?.polls.iter().find(|p| p.id == id).cloned())
    }

    async fn update_poll_text(&self, id: i64, text: &str) -> RepoResult<()> {
        let mut tables = self.lock()?;
        if let Some(poll) = tables.polls.iter_mut().find(|p| p.id == id) {
            poll.text = text.to_string();
        }
        Ok(())
    }

    async fn delete_poll(&self, id: i64) -> RepoResult<()> {
        let mut tables = self.lock()?;
        tables.votes.retain(|v| v.poll_id != id);
        tables.choices.retain(|c| c.poll_id != id);
        tables.polls.retain(|p| p.id != id);
        Ok(())
    }

    async fn add_choice(&self, poll_id: i64, choice_text: &str) -> RepoResult<Choice> {
        let mut tables = self.lock()?;
        let choice = Choice {
            id: tables.next_id(),
            poll_id,
            choice_text: choice_text.to_string(),
        };
        tables.choices.push(choice.clone());
        Ok(choice)
    }

    async fn choices(&self, poll_id: i64) -> RepoResult<Vec<Choice>> {
        Ok(self
            .lock()?
            .choices
            .iter()
            .filter(|c| c.poll_id == poll_id)
            .cloned()
            .collect())
    }

    async fn find_choice(&self, poll_id: i64, choice_id: i64) -> RepoResult<Option<Choice>> {
        Ok(self
            .lock()?
            .choices
            .iter()
            .find(|c| c.id == choice_id && c.poll_id == poll_id)
            .cloned())
    }

    async fn count_polls(&self, filter: &PollFilter) -> RepoResult<u64> {
        let tables = self.lock()?;
        Ok(tables.polls.iter().filter(|p| filter.matches(p)).count() as u64)
    }

    async fn list_polls(
        &self,
        filter: &PollFilter,
        limit: u64,
        offset: u64,
    ) -> RepoResult<Vec<PollSummary>> {
        let tables = self.lock()?;
        Ok(tables
            .matching(filter)
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }
}

#[async_trait]
impl VoteRepository for MemoryRepository {
    async fn find_vote(&self, user_id: i64, poll_id: i64) -> RepoResult<Option<Vote>> {
        Ok(self
            .lock()?
            .votes
            .iter()
            .find(|v| v.user_id == user_id && v.poll_id == poll_id)
            .cloned())
    }

    async fn insert_vote(&self, vote: InsertableVote) -> RepoResult<Vote> {
        let mut tables = self.lock()?;
        if tables
            .votes
            .iter()
            .any(|v| v.user_id == vote.user_id && v.poll_id == vote.poll_id)
        {
            return Err(RepoError::Conflict(format!(
                "vote by user {} on poll {}",
                vote.user_id, vote.poll_id
            )));
        }
        let created = Vote {
            id: tables.next_id(),
            user_id: vote.user_id,
            poll_id: vote.poll_id,
            choice_id: vote.choice_id,
            created_at: Utc::now(),
        };
        tables.votes.push(created.clone());
        Ok(created)
    }

    async fn count_votes(&self, user_id: i64, poll_id: i64) -> RepoResult<u64> {
        Ok(self
            .lock()?
            .votes
            .iter()
            .filter(|v| v.user_id == user_id && v.poll_id == poll_id)
            .count() as u64)
    }

    async fn tally(&self, poll_id: i64) -> RepoResult<Vec<ChoiceTally>> {
        let tables = self.lock()?;
        Ok(tables
            .choices
            .iter()
            .filter(|c| c.poll_id == poll_id)
            .map(|c| ChoiceTally {
                id: c.id,
                poll_id: c.poll_id,
                choice_text: c.choice_text.clone(),
                votes: tables.votes.iter().filter(|v| v.choice_id == c.id).count() as i64,
            })
            .collect())
    }
}
