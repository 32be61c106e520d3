#![allow(dead_code)]

use tide::http::{Method, Request, Response, StatusCode, Url};

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use pollbooth::auth::hash_password;
use pollbooth::config::Config;
use pollbooth::models::*;
use pollbooth::repository::{MemoryRepository, PollRepository, UserRepository};
use pollbooth::views::Views;
use pollbooth::AppState;

pub struct TestApp {
    pub repo: Arc<MemoryRepository>,
    pub server: tide::Server<AppState>,
}

pub fn test_app() -> TestApp {
    let repo = Arc::new(MemoryRepository::new());
    let views = Views::load(Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/views")))
        .expect("Failed to load templates");
    let state = AppState::new(repo.clone(), views, Config::default());
    TestApp {
        repo,
        server: pollbooth::app(state),
    }
}

impl TestApp {
    pub async fn user(&self, username: &str, password: &str, permissions: Vec<Permission>) -> User {
        self.repo
            .create_user(InsertableUser {
                username: username.to_string(),
                email: format!("{}@example.com", username),
                password_hash: hash_password(password).expect("Failed to hash password"),
                permissions,
            })
            .await
            .expect("Failed to create user")
    }

    pub async fn poll(&self, owner: &User, text: &str, choices: &[&str]) -> Poll {
        self.repo
            .create_poll(InsertablePoll {
                owner_id: owner.id,
                text: text.to_string(),
                choices: choices.iter().map(|c| c.to_string()).collect(),
            })
            .await
            .expect("Failed to create poll")
    }

    pub async fn choices(&self, poll: &Poll) -> Vec<Choice> {
        self.repo.choices(poll.id).await.expect("Failed to load choices")
    }

    pub fn client(&self) -> Client<'_> {
        Client {
            app: self,
            cookies: HashMap::new(),
        }
    }
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: String,
}

impl TestResponse {
    pub fn assert_redirect(&self, to: &str) {
        assert_eq!(self.status, StatusCode::Found, "body: {}", self.body);
        assert_eq!(self.location.as_deref(), Some(to));
    }

    pub fn assert_contains(&self, needle: &str) {
        assert!(
            self.body.contains(needle),
            "expected {:?} in response body:\n{}",
            needle,
            self.body
        );
    }
}

/**
 * Minimal browser: keeps cookies between requests
 */
pub struct Client<'a> {
    app: &'a TestApp,
    cookies: HashMap<String, String>,
}

impl<'a> Client<'a> {
    pub async fn get(&mut self, path: &str) -> TestResponse {
        let req = Request::new(Method::Get, url(path));
        self.send(req).await
    }

    pub async fn post(&mut self, path: &str, form: &[(&str, &str)]) -> TestResponse {
        let mut req = Request::new(Method::Post, url(path));
        req.insert_header("Content-Type", "application/x-www-form-urlencoded");
        req.set_body(encode_form(form));
        self.send(req).await
    }

    /**
     * GET the redirect target of `res`
     */
    pub async fn follow(&mut self, res: TestResponse) -> TestResponse {
        let location = res.location.expect("Response was not a redirect");
        self.get(&location).await
    }

    pub async fn login(&mut self, username: &str, password: &str) {
        let res = self
            .post(
                "/accounts/login/",
                &[("username", username), ("password", password)],
            )
            .await;
        res.assert_redirect("/polls/list/");
        // consume the welcome message
        self.follow(res).await;
    }

    pub fn has_cookie(&self, name: &str) -> bool {
        self.cookies.contains_key(name)
    }

    async fn send(&mut self, mut req: Request) -> TestResponse {
        if !self.cookies.is_empty() {
            let header: Vec<String> = self
                .cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect();
            req.insert_header("Cookie", header.join("; "));
        }

        let mut res: Response = self.app.server.respond(req).await.expect("Request failed");

        if let Some(values) = res.header("Set-Cookie") {
            for value in values.iter() {
                let pair = value.as_str().split(';').next().unwrap_or_default();
                let mut parts = pair.splitn(2, '=');
                let name = parts.next().unwrap_or_default().trim().to_string();
                let value = parts.next().unwrap_or_default().trim().to_string();
                if value.is_empty() {
                    self.cookies.remove(&name);
                } else {
                    self.cookies.insert(name, value);
                }
            }
        }

        TestResponse {
            status: res.status(),
            location: res.header("Location").map(|v| v.last().as_str().to_string()),
            body: res.body_string().await.expect("Unreadable body"),
        }
    }
}

fn url(path: &str) -> Url {
    Url::parse(&format!("http://localhost{}", path)).expect("Invalid test url")
}

fn encode_form(form: &[(&str, &str)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(form)
        .finish()
}
