/**
 * The repository module holds the storage seams of the application
 *
 * Handlers and the voting rules only ever see these traits, the concrete
 * storage is picked once at startup: PostgreSQL when a `DATABASE_URL` is
 * configured, otherwise the in-memory store (which is also what the tests use).
 */
use async_trait::async_trait;
use uuid::Uuid;

use crate::error::RepoError;
use crate::models::*;

pub mod memory;
pub mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PgRepository;

pub type RepoResult<T> = Result<T, RepoError>;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /**
     * Fails with `RepoError::Conflict` when the username is taken
     */
    async fn create_user(&self, user: InsertableUser) -> RepoResult<User>;
    async fn find_user(&self, id: i64) -> RepoResult<Option<User>>;
    async fn find_credentials(&self, username: &str) -> RepoResult<Option<Credentials>>;
    async fn grant_permission(&self, user_id: i64, permission: Permission) -> RepoResult<()>;

    async fn create_session(&self, user_id: i64) -> RepoResult<Session>;
    async fn session_user(&self, token: Uuid) -> RepoResult<Option<User>>;
    async fn delete_session(&self, token: Uuid) -> RepoResult<()>;
}

#[async_trait]
pub trait PollRepository: Send + Sync {
    /**
     * Insert the poll and all of its choices as one unit
     */
    async fn create_poll(&self, poll: InsertablePoll) -> RepoResult<Poll>;
    async fn find_poll(&self, id: i64) -> RepoResult<Option<Poll>>;
    async fn update_poll_text(&self, id: i64, text: &str) -> RepoResult<()>;
    /**
     * Removes the poll together with its choices and votes
     */
    async fn delete_poll(&self, id: i64) -> RepoResult<()>;

    async fn add_choice(&self, poll_id: i64, choice_text: &str) -> RepoResult<Choice>;
    async fn choices(&self, poll_id: i64) -> RepoResult<Vec<Choice>>;
    /**
     * Only resolves choices which belong to `poll_id`
     */
    async fn find_choice(&self, poll_id: i64, choice_id: i64) -> RepoResult<Option<Choice>>;

    async fn count_polls(&self, filter: &PollFilter) -> RepoResult<u64>;
    async fn list_polls(
        &self,
        filter: &PollFilter,
        limit: u64,
        offset: u64,
    ) -> RepoResult<Vec<PollSummary>>;
}

#[async_trait]
pub trait VoteRepository: Send + Sync {
    async fn find_vote(&self, user_id: i64, poll_id: i64) -> RepoResult<Option<Vote>>;
    /**
     * Must reject a second vote for the same (user, poll) pair with
     * `RepoError::Conflict`, regardless of what callers checked beforehand
     */
    async fn insert_vote(&self, vote: InsertableVote) -> RepoResult<Vote>;
    async fn count_votes(&self, user_id: i64, poll_id: i64) -> RepoResult<u64>;
    async fn tally(&self, poll_id: i64) -> RepoResult<Vec<ChoiceTally>>;
}

/**
 * Everything the web application needs from storage
 */
pub trait Repository: UserRepository + PollRepository + VoteRepository {}

impl<T> Repository for T where T: UserRepository + PollRepository + VoteRepository {}

/**
 * Escape the LIKE wildcards in a user-provided search term
 */
pub(crate) fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
