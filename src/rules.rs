/**
 * Voting and ownership rules
 *
 * These functions decide whether a vote may be cast or a poll changed. They
 * only talk to storage through the repository traits and report to the user
 * through a `MessageSink`, so the request handlers stay thin.
 */
use log::*;

use crate::error::{PollError, RepoError};
use crate::messages::MessageSink;
use crate::models::*;
use crate::repository::{PollRepository, VoteRepository};

pub const NO_CHOICE_SELECTED: &str = "No choice selected!";

/**
 * A user may vote on a poll exactly once
 */
pub async fn can_vote<R>(repo: &R, user: &User, poll: &Poll) -> Result<bool, PollError>
where
    R: VoteRepository + ?Sized,
{
    Ok(repo.find_vote(user.id, poll.id).await?.is_none())
}

/**
 * Record `user`'s vote for `choice` on `poll`
 *
 * The uniqueness of (user, poll) is ultimately enforced by the repository, a
 * conflicting insert from a concurrent request is reported the same way as a
 * vote caught by `can_vote`.
 */
pub async fn cast_vote<R>(
    repo: &R,
    user: &User,
    poll: &Poll,
    choice: Option<&str>,
) -> Result<Vote, PollError>
where
    R: PollRepository + VoteRepository + ?Sized,
{
    let raw = choice
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| PollError::Validation(NO_CHOICE_SELECTED.to_string()))?;

    if !can_vote(repo, user, poll).await? {
        return Err(PollError::DuplicateVote);
    }

    let choice_id = raw
        .parse::<i64>()
        .map_err(|_| PollError::NotFound("choice"))?;
    let choice = repo
        .find_choice(poll.id, choice_id)
        .await?
        .ok_or(PollError::NotFound("choice"))?;

    let vote = InsertableVote {
        user_id: user.id,
        poll_id: poll.id,
        choice_id: choice.id,
    };
    match repo.insert_vote(vote).await {
        Ok(vote) => {
            info!("User {} voted on poll {}", user.id, poll.id);
            Ok(vote)
        }
        Err(RepoError::Conflict(what)) => {
            debug!("Lost the race for {}", what);
            Err(PollError::DuplicateVote)
        }
        Err(err) => Err(err.into()),
    }
}

/**
 * What the caller should do after a vote submission
 */
#[derive(Debug)]
pub enum VoteOutcome {
    /**
     * The vote was stored, show the results
     */
    Recorded(Vote),
    /**
     * Nothing was stored, send the user back to the voting form
     */
    Retry,
    /**
     * The user had already voted, send them back to the poll list
     */
    AlreadyVoted,
}

/**
 * Run `cast_vote` and turn the recoverable failures into user messages
 *
 * Missing records and storage failures are still returned as errors.
 */
pub async fn submit_vote<R, S>(
    repo: &R,
    messages: &mut S,
    user: &User,
    poll: &Poll,
    choice: Option<&str>,
) -> Result<VoteOutcome, PollError>
where
    R: PollRepository + VoteRepository + ?Sized,
    S: MessageSink + ?Sized,
{
    match cast_vote(repo, user, poll, choice).await {
        Ok(vote) => Ok(VoteOutcome::Recorded(vote)),
        Err(PollError::Validation(message)) => {
            messages.warning(&message);
            Ok(VoteOutcome::Retry)
        }
        Err(err @ PollError::DuplicateVote) => {
            messages.info(&err.to_string());
            Ok(VoteOutcome::AlreadyVoted)
        }
        Err(err) => Err(err),
    }
}

pub fn can_edit(user: &User, poll: &Poll) -> bool {
    poll.is_owned_by(user)
}

pub fn authorize_edit(user: &User, poll: &Poll) -> Result<(), PollError> {
    if can_edit(user, poll) {
        Ok(())
    } else {
        warn!("User {} may not change poll {}", user.id, poll.id);
        Err(PollError::Forbidden)
    }
}

/**
 * Load a poll for modification, a missing poll wins over a foreign one
 */
pub async fn editable_poll<R>(repo: &R, user: &User, poll_id: i64) -> Result<Poll, PollError>
where
    R: PollRepository + ?Sized,
{
    let poll = repo
        .find_poll(poll_id)
        .await?
        .ok_or(PollError::NotFound("poll"))?;
    authorize_edit(user, &poll)?;
    Ok(poll)
}
