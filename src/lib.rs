/**
 * pollbooth is a small polling site: people register, create polls, vote once
 * per poll and edit the polls they own.
 */
use log::*;

use std::sync::Arc;

pub mod auth;
pub mod config;
pub mod error;
pub mod forms;
pub mod messages;
pub mod models;
pub mod pagination;
pub mod repository;
pub mod routes;
pub mod rules;
pub mod views;

use crate::config::Config;
use crate::error::StartupError;
use crate::repository::{MemoryRepository, PgRepository, Repository};
use crate::views::Views;

/**
 * Struct for carrying application state into tide request handlers
 */
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub views: Arc<Views>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(repo: Arc<dyn Repository>, views: Views, config: Config) -> Self {
        Self {
            repo,
            views: Arc::new(views),
            config: Arc::new(config),
        }
    }

    /**
     * Connect the storage and load the templates named by `config`
     */
    pub async fn from_config(config: Config) -> Result<Self, StartupError> {
        let repo: Arc<dyn Repository> = match &config.database_url {
            Some(url) => Arc::new(PgRepository::connect(url).await?),
            None => {
                warn!("DATABASE_URL is not set, polls will only be kept in memory");
                Arc::new(MemoryRepository::new())
            }
        };
        let views = Views::load(&config.views_dir)?;
        Ok(Self::new(repo, views, config))
    }
}

/**
 * Build the tide application with all of its routes
 */
pub fn app(state: AppState) -> tide::Server<AppState> {
    // with_state already installs tide's request logging
    let mut app = tide::with_state(state);

    app.at("/").get(routes::index);

    app.at("/polls/list/").get(routes::polls::list);
    app.at("/polls/list/user/").get(routes::polls::user_list);
    app.at("/polls/add/")
        .get(routes::polls::add_form)
        .post(routes::polls::add);
    app.at("/polls/:id/").get(routes::polls::detail);
    app.at("/polls/:id/vote/").post(routes::polls::vote);
    app.at("/polls/:id/results/").get(routes::polls::results);
    app.at("/polls/edit/:id/")
        .get(routes::polls::edit_form)
        .post(routes::polls::edit);
    app.at("/polls/edit/:id/choice/add/")
        .post(routes::polls::add_choice);
    app.at("/polls/delete/:id/").post(routes::polls::delete);

    app.at("/accounts/register/")
        .get(routes::accounts::register_form)
        .post(routes::accounts::register);
    app.at("/accounts/login/")
        .get(routes::accounts::login_form)
        .post(routes::accounts::login);
    app.at("/accounts/logout/").get(routes::accounts::logout);

    app
}
