use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::*;
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use super::*;

/**
 * SQLSTATE for unique_violation
 */
const UNIQUE_VIOLATION: &str = "23505";

const SUMMARY_SELECT: &str = r#"
    SELECT p.id, p.owner_id, u.username AS owner_username, p.text, p.created_at,
           COUNT(v.id) AS vote_count
    FROM polls p
    JOIN users u ON u.id = p.owner_id
    LEFT JOIN votes v ON v.poll_id = p.id
    WHERE ($1::TEXT IS NULL OR p.text ILIKE $1)
      AND ($2::BIGINT IS NULL OR p.owner_id = $2)
    GROUP BY p.id, u.username
"#;

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    password_hash: String,
    date_joined: DateTime<Utc>,
}

/**
 * Map a unique constraint violation onto `RepoError::Conflict`
 */
fn conflict_or(err: sqlx::Error, what: String) -> RepoError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return RepoError::Conflict(what);
        }
    }
    RepoError::Database(err)
}

/**
 * Repository backed by the PostgreSQL connection pool
 */
#[derive(Clone, Debug)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    /**
     * Connect to the database and bring the schema up to date
     */
    pub async fn connect(database_url: &str) -> RepoResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Database migrations applied");
        Ok(Self { pool })
    }

    async fn permissions(&self, user_id: i64) -> RepoResult<Vec<Permission>> {
        let codenames: Vec<(String,)> = sqlx::query_as(
            "SELECT codename FROM user_permissions WHERE user_id = $1 ORDER BY codename",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(codenames
            .into_iter()
            .filter_map(|(codename,)| match codename.parse() {
                Ok(permission) => Some(permission),
                Err(err) => {
                    warn!("Ignoring stored permission: {}", err);
                    None
                }
            })
            .collect())
    }

    async fn hydrate(&self, row: UserRow) -> RepoResult<Credentials> {
        let permissions = self.permissions(row.id).await?;
        Ok(Credentials {
            user: User {
                id: row.id,
                username: row.username,
                email: row.email,
                date_joined: row.date_joined,
                permissions,
            },
            password_hash: row.password_hash,
        })
    }
}

#[async_trait]
impl UserRepository for PgRepository {
    async fn create_user(&self, user: InsertableUser) -> RepoResult<User> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (username, email, password_hash) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&mut tx)
        .await
        .map_err(|e| conflict_or(e, format!("username {}", user.username)))?;

        for permission in user.permissions.iter() {
            sqlx::query("INSERT INTO user_permissions (user_id, codename) VALUES ($1, $2)")
                .bind(row.id)
                .bind(permission.codename())
                .execute(&mut tx)
                .await?;
        }
        tx.commit().await?;

        debug!("Created user {}", row.username);
        Ok(User {
            id: row.id,
            username: row.username,
            email: row.email,
            date_joined: row.date_joined,
            permissions: user.permissions,
        })
    }

    async fn find_user(&self, id: i64) -> RepoResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?.user)),
            None => Ok(None),
        }
    }

    async fn find_credentials(&self, username: &str) -> RepoResult<Option<Credentials>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn grant_permission(&self, user_id: i64, permission: Permission) -> RepoResult<()> {
        sqlx::query(
            "INSERT INTO user_permissions (user_id, codename) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(permission.codename())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_session(&self, user_id: i64) -> RepoResult<Session> {
        let (token, created_at): (Uuid, DateTime<Utc>) = sqlx::query_as(
            "INSERT INTO sessions (token, user_id) VALUES ($1, $2) RETURNING token, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(Session {
            token,
            user_id,
            created_at,
        })
    }

    async fn session_user(&self, token: Uuid) -> RepoResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT u.* FROM users u JOIN sessions s ON s.user_id = u.id WHERE s.token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?.user)),
            None => Ok(None),
        }
    }

    async fn delete_session(&self, token: Uuid) -> RepoResult<()> {
        sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PollRepository for PgRepository {
    async fn create_poll(&self, poll: InsertablePoll) -> RepoResult<Poll> {
        let mut tx = self.pool.begin().await?;
        let created = sqlx::query_as::<_, Poll>(
            "INSERT INTO polls (owner_id, text) VALUES ($1, $2) RETURNING *",
        )
        .bind(poll.owner_id)
        .bind(&poll.text)
        .fetch_one(&mut tx)
        .await?;

        for choice in poll.choices.iter() {
            sqlx::query("INSERT INTO choices (poll_id, choice_text) VALUES ($1, $2)")
                .bind(created.id)
                .bind(choice)
                .execute(&mut tx)
                .await?;
        }
        tx.commit().await?;

        debug!("inserted: {:?}", created);
        Ok(created)
    }

    async fn find_poll(&self, id: i64) -> RepoResult<Option<Poll>> {
        Ok(sqlx::query_as::<_, Poll>("SELECT * FROM polls WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_poll_text(&self, id: i64, text: &str) -> RepoResult<()> {
        sqlx::query("UPDATE polls SET text = $1 WHERE id = $2")
            .bind(text)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_poll(&self, id: i64) -> RepoResult<()> {
        sqlx::query("DELETE FROM polls WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn add_choice(&self, poll_id: i64, choice_text: &str) -> RepoResult<Choice> {
        Ok(sqlx::query_as::<_, Choice>(
            "INSERT INTO choices (poll_id, choice_text) VALUES ($1, $2) RETURNING *",
        )
        .bind(poll_id)
        .bind(choice_text)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn choices(&self, poll_id: i64) -> RepoResult<Vec<Choice>> {
        Ok(sqlx::query_as::<_, Choice>(
            "SELECT * FROM choices WHERE poll_id = $1 ORDER BY id ASC",
        )
        .bind(poll_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn find_choice(&self, poll_id: i64, choice_id: i64) -> RepoResult<Option<Choice>> {
        Ok(sqlx::query_as::<_, Choice>(
            "SELECT * FROM choices WHERE id = $1 AND poll_id = $2",
        )
        .bind(choice_id)
        .bind(poll_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn count_polls(&self, filter: &PollFilter) -> RepoResult<u64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"SELECT COUNT(*) FROM polls p
               WHERE ($1::TEXT IS NULL OR p.text ILIKE $1)
                 AND ($2::BIGINT IS NULL OR p.owner_id = $2)"#,
        )
        .bind(filter.search.as_deref().map(like_pattern))
        .bind(filter.owner_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }

    async fn list_polls(
        &self,
        filter: &PollFilter,
        limit: u64,
        offset: u64,
    ) -> RepoResult<Vec<PollSummary>> {
        let order = match filter.sort {
            PollSort::Name => "p.text ASC, p.id ASC",
            PollSort::Newest => "p.created_at DESC, p.id DESC",
            PollSort::Votes => "vote_count DESC, p.id DESC",
        };
        let query = format!("{} ORDER BY {} LIMIT $3 OFFSET $4", SUMMARY_SELECT, order);

        Ok(sqlx::query_as::<_, PollSummary>(&query)
            .bind(filter.search.as_deref().map(like_pattern))
            .bind(filter.owner_id)
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await?)
    }
}

#[async_trait]
impl VoteRepository for PgRepository {
    async fn find_vote(&self, user_id: i64, poll_id: i64) -> RepoResult<Option<Vote>> {
        Ok(sqlx::query_as::<_, Vote>(
            "SELECT * FROM votes WHERE user_id = $1 AND poll_id = $2",
        )
        .bind(user_id)
        .bind(poll_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn insert_vote(&self, vote: InsertableVote) -> RepoResult<Vote> {
        sqlx::query_as::<_, Vote>(
            "INSERT INTO votes (user_id, poll_id, choice_id) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(vote.user_id)
        .bind(vote.poll_id)
        .bind(vote.choice_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            conflict_or(
                e,
                format!("vote by user {} on poll {}", vote.user_id, vote.poll_id),
            )
        })
    }

    async fn count_votes(&self, user_id: i64, poll_id: i64) -> RepoResult<u64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM votes WHERE user_id = $1 AND poll_id = $2")
                .bind(user_id)
                .bind(poll_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }

    async fn tally(&self, poll_id: i64) -> RepoResult<Vec<ChoiceTally>> {
        Ok(sqlx::query_as::<_, ChoiceTally>(
            r#"SELECT c.id, c.poll_id, c.choice_text, COUNT(v.id) AS votes
               FROM choices c
               LEFT JOIN votes v ON v.choice_id = c.id
               WHERE c.poll_id = $1
               GROUP BY c.id
               ORDER BY c.id ASC"#,
        )
        .bind(poll_id)
        .fetch_all(&self.pool)
        .await?)
    }
}
