use log::*;
use serde_json::json;
use tide::{Request, Response, StatusCode};

use super::redirect;
use crate::auth::{self, RequestContext, LOGIN_URL};
use crate::error::RepoError;
use crate::forms::*;
use crate::messages::{FlashMessages, MessageSink};
use crate::models::{InsertableUser, Permission};
use crate::routes::polls::LIST_URL;
use crate::AppState;

const BAD_CREDENTIALS: &str = "Please enter a correct username and password.";

/**
 *  GET /accounts/register/
 */
pub async fn register_form(req: Request<AppState>) -> tide::Result<Response> {
    let ctx = RequestContext::from_request(&req).await?;
    let flash = FlashMessages::from_request(&req);
    req.state().views.page(
        &ctx,
        flash,
        "register",
        json!({ "form": RegisterForm::default(), "errors": {} }),
        StatusCode::Ok,
    )
}

/**
 *  POST /accounts/register/
 */
pub async fn register(mut req: Request<AppState>) -> tide::Result<Response> {
    let form: RegisterForm = req.body_form().await?;
    let ctx = RequestContext::from_request(&req).await?;
    let mut flash = FlashMessages::from_request(&req);
    let state = req.state();

    let mut errors = form.validate();
    if errors.is_empty() {
        let permissions = if state.config.open_poll_creation {
            vec![Permission::AddPoll]
        } else {
            vec![]
        };
        let password_hash = auth::hash_password(&form.password1).map_err(|err| {
            error!("Failed to hash password: {}", err);
            tide::Error::from_str(StatusCode::InternalServerError, "Failed to register")
        })?;
        let created = state
            .repo
            .create_user(InsertableUser {
                username: form.username.trim().to_string(),
                email: form.email.trim().to_string(),
                password_hash,
                permissions,
            })
            .await;

        match created {
            Ok(user) => {
                info!("Registered user {}", user.username);
                flash.success("Your account has been created, you can log in now.");
                return Ok(redirect(flash, LOGIN_URL));
            }
            Err(RepoError::Conflict(_)) => {
                errors.add("username", "A user with that username already exists.");
            }
            Err(err) => return Err(err.into()),
        }
    }

    state.views.page(
        &ctx,
        flash,
        "register",
        json!({ "form": form, "errors": errors }),
        StatusCode::Ok,
    )
}

/**
 *  GET /accounts/login/
 */
pub async fn login_form(req: Request<AppState>) -> tide::Result<Response> {
    let ctx = RequestContext::from_request(&req).await?;
    let flash = FlashMessages::from_request(&req);
    let query: NextQuery = req.query()?;
    let form = LoginForm {
        next: auth::safe_next(query.next.as_deref()).map(str::to_string),
        ..Default::default()
    };

    req.state().views.page(
        &ctx,
        flash,
        "login",
        json!({ "form": form, "error": null }),
        StatusCode::Ok,
    )
}

/**
 *  POST /accounts/login/
 */
pub async fn login(mut req: Request<AppState>) -> tide::Result<Response> {
    let form: LoginForm = req.body_form().await?;
    let ctx = RequestContext::from_request(&req).await?;
    let mut flash = FlashMessages::from_request(&req);
    let state = req.state();

    let credentials = state.repo.find_credentials(form.username.trim()).await?;
    let user = match credentials {
        Some(c) if auth::verify_password(&form.password, &c.password_hash) => c.user,
        _ => {
            debug!("Failed login for {:?}", form.username);
            return state.views.page(
                &ctx,
                flash,
                "login",
                json!({ "form": form, "error": BAD_CREDENTIALS }),
                StatusCode::Ok,
            );
        }
    };

    if let Some(old) = ctx.session {
        state.repo.delete_session(old).await?;
    }
    let session = state.repo.create_session(user.id).await?;
    info!("User {} logged in", user.username);

    flash.success(&format!("Welcome back, {}!", user.username));
    let next = auth::safe_next(form.next.as_deref()).unwrap_or(LIST_URL);
    let mut res = redirect(flash, next);
    res.insert_cookie(auth::session_cookie(session.token));
    Ok(res)
}

/**
 *  GET /accounts/logout/
 */
pub async fn logout(req: Request<AppState>) -> tide::Result<Response> {
    let ctx = RequestContext::from_request(&req).await?;
    let mut flash = FlashMessages::from_request(&req);

    if let Some(token) = ctx.session {
        req.state().repo.delete_session(token).await?;
    }
    flash.info("You have been logged out.");

    let mut res = redirect(flash, LOGIN_URL);
    if req.cookie(auth::SESSION_COOKIE).is_some() {
        res.remove_cookie(auth::expired_session_cookie());
    }
    Ok(res)
}
