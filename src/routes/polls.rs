use log::*;
use serde::Serialize;
use serde_json::{json, Value};
use tide::{Request, Response, StatusCode};

use super::{id_param, redirect};
use crate::auth::RequestContext;
use crate::error::PollError;
use crate::forms::*;
use crate::messages::{FlashMessages, MessageSink};
use crate::models::*;
use crate::pagination::Paginator;
use crate::rules::{self, VoteOutcome};
use crate::AppState;

pub const LIST_URL: &str = "/polls/list/";
pub const USER_LIST_URL: &str = "/polls/list/user/";

/**
 * Query parameters carried along by the pagination and sort links
 */
#[derive(Serialize)]
struct ListingParams<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    search: Option<&'a str>,
    sort: &'static str,
}

fn listing_query(search: Option<&str>, sort: PollSort) -> Result<String, serde_qs::Error> {
    serde_qs::to_string(&ListingParams {
        search,
        sort: sort.param(),
    })
}

async fn render_listing(
    state: &AppState,
    ctx: &RequestContext,
    flash: FlashMessages,
    query: &ListQuery,
    filter: PollFilter,
    title: &str,
) -> tide::Result<Response> {
    let repo = &state.repo;
    let count = repo.count_polls(&filter).await?;
    let paginator = Paginator::new(count, state.config.polls_per_page);
    let page = paginator.page(query.page.as_deref());
    let summaries = repo
        .list_polls(&filter, paginator.limit(), paginator.offset(&page))
        .await?;

    let polls: Vec<Value> = summaries
        .iter()
        .map(|p| {
            json!({
                "id": p.id,
                "text": p.text,
                "owner": p.owner_username,
                "created_at": p.created_at.format("%B %-d, %Y").to_string(),
                "vote_count": p.vote_count,
                "editable": ctx.user().map(|u| u.id == p.owner_id).unwrap_or(false),
            })
        })
        .collect();

    let search = filter.search.as_deref();
    let params = listing_query(search, filter.sort)?;
    let mut sort_links = vec![];
    for (label, sort) in &[
        ("Name", PollSort::Name),
        ("Date", PollSort::Newest),
        ("Votes", PollSort::Votes),
    ] {
        let query = listing_query(search, *sort)?;
        sort_links.push(json!({ "label": label, "query": query }));
    }

    state.views.page(
        ctx,
        flash,
        "poll_list",
        json!({
            "title": title,
            "polls": polls,
            "page": page,
            "search": filter.search,
            "sort": filter.sort.param(),
            "params": params,
            "sort_links": sort_links,
        }),
        StatusCode::Ok,
    )
}

async fn find_poll(state: &AppState, id: i64) -> tide::Result<Poll> {
    state
        .repo
        .find_poll(id)
        .await?
        .ok_or_else(|| PollError::NotFound("poll").into_http())
}

/**
 *  GET /polls/list/
 */
pub async fn list(req: Request<AppState>) -> tide::Result<Response> {
    let ctx = RequestContext::from_request(&req).await?;
    let flash = FlashMessages::from_request(&req);
    let query: ListQuery = req.query()?;

    let filter = PollFilter {
        search: query.search_term(),
        owner_id: None,
        sort: PollSort::from_param(query.sort.as_deref()),
    };
    debug!("Listing polls: {:?}", filter);
    render_listing(req.state(), &ctx, flash, &query, filter, "Polls List").await
}

/**
 *  GET /polls/list/user/
 */
pub async fn user_list(req: Request<AppState>) -> tide::Result<Response> {
    let ctx = RequestContext::from_request(&req).await?;
    let user = match ctx.user() {
        Some(user) => user,
        None => return Ok(ctx.login_redirect()),
    };
    let flash = FlashMessages::from_request(&req);
    let query: ListQuery = req.query()?;

    let filter = PollFilter {
        search: query.search_term(),
        owner_id: Some(user.id),
        sort: PollSort::from_param(query.sort.as_deref()),
    };
    render_listing(req.state(), &ctx, flash, &query, filter, "My Polls").await
}

/**
 * Poll creation needs a logged in user holding `add_poll`
 */
fn creator(ctx: &RequestContext) -> Result<&User, Response> {
    match ctx.user() {
        Some(user) if user.has_permission(Permission::AddPoll) => Ok(user),
        Some(user) => {
            warn!("User {} may not add polls", user.username);
            Err(Response::new(StatusCode::Forbidden))
        }
        None => Err(ctx.login_redirect()),
    }
}

/**
 *  GET /polls/add/
 */
pub async fn add_form(req: Request<AppState>) -> tide::Result<Response> {
    let ctx = RequestContext::from_request(&req).await?;
    if let Err(res) = creator(&ctx) {
        return Ok(res);
    }
    let flash = FlashMessages::from_request(&req);

    req.state().views.page(
        &ctx,
        flash,
        "poll_add",
        json!({ "form": PollForm::default(), "errors": {} }),
        StatusCode::Ok,
    )
}

/**
 *  POST /polls/add/
 */
pub async fn add(mut req: Request<AppState>) -> tide::Result<Response> {
    let form: PollForm = req.body_form().await?;
    let ctx = RequestContext::from_request(&req).await?;
    let user = match creator(&ctx) {
        Ok(user) => user,
        Err(res) => return Ok(res),
    };
    let mut flash = FlashMessages::from_request(&req);
    let state = req.state();

    let errors = form.validate();
    if !errors.is_empty() {
        return state.views.page(
            &ctx,
            flash,
            "poll_add",
            json!({ "form": form, "errors": errors }),
            StatusCode::Ok,
        );
    }

    let poll = state
        .repo
        .create_poll(InsertablePoll {
            owner_id: user.id,
            text: form.text.trim().to_string(),
            choices: form.choices(),
        })
        .await?;
    info!("User {} created poll {}", user.username, poll.id);

    flash.success("Poll & Choices added successfully.");
    Ok(redirect(flash, LIST_URL))
}

/**
 *  GET /polls/:id/
 */
pub async fn detail(req: Request<AppState>) -> tide::Result<Response> {
    let ctx = RequestContext::from_request(&req).await?;
    if ctx.user().is_none() {
        return Ok(ctx.login_redirect());
    }
    let flash = FlashMessages::from_request(&req);
    let state = req.state();

    let poll = find_poll(state, id_param(&req)?).await?;
    let choices = state.repo.choices(poll.id).await?;

    state.views.page(
        &ctx,
        flash,
        "poll_detail",
        json!({ "poll": poll, "choices": choices }),
        StatusCode::Ok,
    )
}

async fn render_results(
    state: &AppState,
    ctx: &RequestContext,
    flash: FlashMessages,
    poll: &Poll,
) -> tide::Result<Response> {
    let tally = state.repo.tally(poll.id).await?;
    let total: i64 = tally.iter().map(|c| c.votes).sum();

    state.views.page(
        ctx,
        flash,
        "poll_results",
        json!({ "poll": poll, "choices": tally, "total": total }),
        StatusCode::Ok,
    )
}

/**
 *  POST /polls/:id/vote/
 */
pub async fn vote(mut req: Request<AppState>) -> tide::Result<Response> {
    let form: VoteForm = req.body_form().await?;
    let ctx = RequestContext::from_request(&req).await?;
    let user = match ctx.user() {
        Some(user) => user,
        None => return Ok(ctx.login_redirect()),
    };
    let mut flash = FlashMessages::from_request(&req);
    let state = req.state();
    let poll = find_poll(state, id_param(&req)?).await?;

    let outcome = rules::submit_vote(
        &*state.repo,
        &mut flash,
        user,
        &poll,
        form.choice.as_deref(),
    )
    .await
    .map_err(PollError::into_http)?;

    match outcome {
        VoteOutcome::Recorded(_) => render_results(state, &ctx, flash, &poll).await,
        VoteOutcome::Retry => Ok(redirect(flash, &format!("/polls/{}/", poll.id))),
        VoteOutcome::AlreadyVoted => Ok(redirect(flash, LIST_URL)),
    }
}

/**
 *  GET /polls/:id/results/
 */
pub async fn results(req: Request<AppState>) -> tide::Result<Response> {
    let ctx = RequestContext::from_request(&req).await?;
    let flash = FlashMessages::from_request(&req);
    let poll = find_poll(req.state(), id_param(&req)?).await?;
    render_results(req.state(), &ctx, flash, &poll).await
}

async fn render_edit(
    state: &AppState,
    ctx: &RequestContext,
    flash: FlashMessages,
    poll: &Poll,
    form: &EditPollForm,
    errors: &FieldErrors,
) -> tide::Result<Response> {
    let choices = state.repo.choices(poll.id).await?;
    state.views.page(
        ctx,
        flash,
        "poll_edit",
        json!({ "poll": poll, "choices": choices, "form": form, "errors": errors }),
        StatusCode::Ok,
    )
}

/**
 *  GET /polls/edit/:id/
 */
pub async fn edit_form(req: Request<AppState>) -> tide::Result<Response> {
    let ctx = RequestContext::from_request(&req).await?;
    let user = match ctx.user() {
        Some(user) => user,
        None => return Ok(ctx.login_redirect()),
    };
    let flash = FlashMessages::from_request(&req);
    let state = req.state();

    let poll = rules::editable_poll(&*state.repo, user, id_param(&req)?)
        .await
        .map_err(PollError::into_http)?;
    let form = EditPollForm {
        text: poll.text.clone(),
    };
    render_edit(state, &ctx, flash, &poll, &form, &FieldErrors::default()).await
}

/**
 *  POST /polls/edit/:id/
 */
pub async fn edit(mut req: Request<AppState>) -> tide::Result<Response> {
    let form: EditPollForm = req.body_form().await?;
    let ctx = RequestContext::from_request(&req).await?;
    let user = match ctx.user() {
        Some(user) => user,
        None => return Ok(ctx.login_redirect()),
    };
    let mut flash = FlashMessages::from_request(&req);
    let state = req.state();

    let poll = rules::editable_poll(&*state.repo, user, id_param(&req)?)
        .await
        .map_err(PollError::into_http)?;

    let errors = form.validate();
    if !errors.is_empty() {
        return render_edit(state, &ctx, flash, &poll, &form, &errors).await;
    }

    state.repo.update_poll_text(poll.id, form.text.trim()).await?;
    info!("User {} updated poll {}", user.username, poll.id);

    flash.success("Poll Updated successfully.");
    Ok(redirect(flash, USER_LIST_URL))
}

/**
 *  POST /polls/edit/:id/choice/add/
 */
pub async fn add_choice(mut req: Request<AppState>) -> tide::Result<Response> {
    let form: ChoiceForm = req.body_form().await?;
    let ctx = RequestContext::from_request(&req).await?;
    let user = match ctx.user() {
        Some(user) => user,
        None => return Ok(ctx.login_redirect()),
    };
    let mut flash = FlashMessages::from_request(&req);
    let state = req.state();

    let poll = rules::editable_poll(&*state.repo, user, id_param(&req)?)
        .await
        .map_err(PollError::into_http)?;

    let choice_text = form.choice_text.trim();
    if choice_text.is_empty() {
        flash.warning("Choice text is required.");
    } else {
        state.repo.add_choice(poll.id, choice_text).await?;
        flash.success("New choice added successfully.");
    }
    Ok(redirect(flash, &format!("/polls/edit/{}/", poll.id)))
}

/**
 *  POST /polls/delete/:id/
 */
pub async fn delete(req: Request<AppState>) -> tide::Result<Response> {
    let ctx = RequestContext::from_request(&req).await?;
    let user = match ctx.user() {
        Some(user) => user,
        None => return Ok(ctx.login_redirect()),
    };
    let mut flash = FlashMessages::from_request(&req);
    let state = req.state();

    let poll = rules::editable_poll(&*state.repo, user, id_param(&req)?)
        .await
        .map_err(PollError::into_http)?;
    state.repo.delete_poll(poll.id).await?;
    info!("User {} deleted poll {}", user.username, poll.id);

    flash.success("Poll Deleted successfully.");
    Ok(redirect(flash, USER_LIST_URL))
}
