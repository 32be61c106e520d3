/**
 * The routes module contains all the tide routes and the logic to fulfill the
 * responses for each route.
 *
 * Modules are nested for cleaner organization here
 */
use tide::{Redirect, Request, Response, StatusCode};

use crate::messages::FlashMessages;
use crate::AppState;

pub mod accounts;
pub mod polls;

/**
 *  GET /
 */
pub async fn index(_req: Request<AppState>) -> tide::Result<Response> {
    Ok(Redirect::new("/polls/list/").into())
}

/**
 * Parse the `:id` route parameter, an unparseable id can never match a record
 */
pub(crate) fn id_param(req: &Request<AppState>) -> tide::Result<i64> {
    req.param::<i64>("id")
        .map_err(|_| tide::Error::from_str(StatusCode::NotFound, "Invalid id specified"))
}

/**
 * Redirect, carrying along any messages which have not been displayed yet
 */
pub(crate) fn redirect(flash: FlashMessages, to: &str) -> Response {
    let mut res: Response = Redirect::new(to).into();
    flash.apply(&mut res);
    res
}
