use thiserror::Error;
use tide::StatusCode;

/**
 * Failures coming out of a repository implementation
 */
#[derive(Debug, Error)]
pub enum RepoError {
    /**
     * A uniqueness constraint rejected the write
     */
    #[error("conflicting record: {0}")]
    Conflict(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/**
 * Per-request failures of poll and vote operations
 *
 * None of these are fatal, each one is turned into something the user sees
 */
#[derive(Debug, Error)]
pub enum PollError {
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("you are not allowed to change this poll")]
    Forbidden,
    #[error("You already voted this poll!")]
    DuplicateVote,
    #[error(transparent)]
    Repository(#[from] RepoError),
}

impl PollError {
    pub fn status(&self) -> StatusCode {
        match self {
            PollError::Validation(_) => StatusCode::Ok,
            PollError::NotFound(_) => StatusCode::NotFound,
            PollError::Forbidden => StatusCode::Forbidden,
            PollError::DuplicateVote => StatusCode::Found,
            PollError::Repository(_) => StatusCode::InternalServerError,
        }
    }

    /**
     * tide's blanket conversion would turn every error into a 500, so handlers
     * map through here to keep the intended status
     */
    pub fn into_http(self) -> tide::Error {
        if let PollError::Repository(err) = &self {
            log::error!("Repository failure: {:?}", err);
        }
        tide::Error::from_str(self.status(), self.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value `{value}`")]
    Invalid { name: &'static str, value: String },
}

/**
 * Anything which keeps the server from starting
 */
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Repository(#[from] RepoError),
    #[error(transparent)]
    Templates(#[from] handlebars::TemplateFileError),
}
