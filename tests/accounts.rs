mod common;

use tide::http::StatusCode;

use pollbooth::auth::SESSION_COOKIE;
use pollbooth::models::Permission;
use pollbooth::repository::UserRepository;

use common::*;

fn registration<'a>(username: &'a str, password1: &'a str, password2: &'a str) -> Vec<(&'a str, &'a str)> {
    vec![
        ("username", username),
        ("email", "someone@example.com"),
        ("password1", password1),
        ("password2", password2),
    ]
}

#[async_std::test]
async fn test_register_then_login() {
    let app = test_app();
    let mut client = app.client();

    let res = client
        .post(
            "/accounts/register/",
            &registration("newuser", "Testpass123", "Testpass123"),
        )
        .await;
    res.assert_redirect("/accounts/login/");

    let res = client.follow(res).await;
    res.assert_contains("Your account has been created, you can log in now.");

    let creds = app.repo.find_credentials("newuser").await.unwrap().unwrap();
    assert!(creds.user.has_permission(Permission::AddPoll));

    client.login("newuser", "Testpass123").await;
    assert!(client.has_cookie(SESSION_COOKIE));

    let res = client.get("/polls/list/").await;
    res.assert_contains("Logout");
    res.assert_contains("newuser");
}

#[async_std::test]
async fn test_register_password_mismatch() {
    let app = test_app();
    let mut client = app.client();

    let res = client
        .post(
            "/accounts/register/",
            &registration("newuser", "Testpass123", "Different456"),
        )
        .await;
    assert_eq!(res.status, StatusCode::Ok);
    res.assert_contains("The two password fields did not match.");
    res.assert_contains("value=\"newuser\"");
    assert!(app.repo.find_credentials("newuser").await.unwrap().is_none());
}

#[async_std::test]
async fn test_register_weak_password() {
    let app = test_app();
    let mut client = app.client();

    let res = client
        .post("/accounts/register/", &registration("numbers", "12345678", "12345678"))
        .await;
    assert_eq!(res.status, StatusCode::Ok);
    res.assert_contains("This password is entirely numeric.");
    assert!(app.repo.find_credentials("numbers").await.unwrap().is_none());
}

#[async_std::test]
async fn test_register_duplicate_username() {
    let app = test_app();
    app.user("taken", "Testpass123", vec![]).await;
    let mut client = app.client();

    let res = client
        .post(
            "/accounts/register/",
            &registration("taken", "Testpass123", "Testpass123"),
        )
        .await;
    assert_eq!(res.status, StatusCode::Ok);
    res.assert_contains("A user with that username already exists.");
}

#[async_std::test]
async fn test_login_with_bad_password() {
    let app = test_app();
    app.user("alice", "password", vec![]).await;
    let mut client = app.client();

    let res = client
        .post(
            "/accounts/login/",
            &[("username", "alice"), ("password", "wrong")],
        )
        .await;
    assert_eq!(res.status, StatusCode::Ok);
    res.assert_contains("Please enter a correct username and password.");
    assert!(!client.has_cookie(SESSION_COOKIE));

    let res = client
        .post(
            "/accounts/login/",
            &[("username", "nobody"), ("password", "password")],
        )
        .await;
    res.assert_contains("Please enter a correct username and password.");
}

#[async_std::test]
async fn test_login_follows_next() {
    let app = test_app();
    app.user("alice", "password", vec![]).await;
    let mut client = app.client();

    let res = client
        .post(
            "/accounts/login/",
            &[
                ("username", "alice"),
                ("password", "password"),
                ("next", "/polls/list/user/"),
            ],
        )
        .await;
    res.assert_redirect("/polls/list/user/");
}

#[async_std::test]
async fn test_login_ignores_offsite_next() {
    let app = test_app();
    app.user("alice", "password", vec![]).await;
    let mut client = app.client();

    let res = client
        .post(
            "/accounts/login/",
            &[
                ("username", "alice"),
                ("password", "password"),
                ("next", "//evil.example.com/"),
            ],
        )
        .await;
    res.assert_redirect("/polls/list/");
}

#[async_std::test]
async fn test_logout() {
    let app = test_app();
    app.user("alice", "password", vec![]).await;
    let mut client = app.client();
    client.login("alice", "password").await;

    let res = client.get("/accounts/logout/").await;
    res.assert_redirect("/accounts/login/");
    assert!(!client.has_cookie(SESSION_COOKIE));

    let res = client.follow(res).await;
    res.assert_contains("You have been logged out.");

    let res = client.get("/polls/list/user/").await;
    assert_eq!(res.status, StatusCode::Found);
    assert!(res.location.unwrap().starts_with("/accounts/login/"));
}

#[async_std::test]
async fn test_index_redirects_to_list() {
    let app = test_app();
    let mut client = app.client();

    let res = client.get("/").await;
    res.assert_redirect("/polls/list/");
}
