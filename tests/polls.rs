mod common;

use tide::http::StatusCode;

use pollbooth::models::{InsertableVote, Permission, Poll, PollFilter, User};
use pollbooth::repository::{PollRepository, VoteRepository};

use common::*;

/**
 * alice may add polls and owns "Your favorite language?"
 */
async fn setup() -> (TestApp, User, Poll) {
    let app = test_app();
    let alice = app.user("alice", "password", vec![Permission::AddPoll]).await;
    let poll = app
        .poll(&alice, "Your favorite language?", &["Python", "JavaScript"])
        .await;
    (app, alice, poll)
}

#[async_std::test]
async fn test_vote_valid_choice() {
    let (app, alice, poll) = setup().await;
    let python = app.choices(&poll).await.remove(0);
    let mut client = app.client();
    client.login("alice", "password").await;

    let res = client
        .post(
            &format!("/polls/{}/vote/", poll.id),
            &[("choice", &python.id.to_string())],
        )
        .await;
    assert_eq!(res.status, StatusCode::Ok);
    res.assert_contains("Results");
    res.assert_contains("Python");
    assert_eq!(app.repo.count_votes(alice.id, poll.id).await.unwrap(), 1);
}

#[async_std::test]
async fn test_prevent_double_vote() {
    let (app, alice, poll) = setup().await;
    let choices = app.choices(&poll).await;
    app.repo
        .insert_vote(InsertableVote {
            user_id: alice.id,
            poll_id: poll.id,
            choice_id: choices[0].id,
        })
        .await
        .unwrap();
    let mut client = app.client();
    client.login("alice", "password").await;

    let res = client
        .post(
            &format!("/polls/{}/vote/", poll.id),
            &[("choice", &choices[1].id.to_string())],
        )
        .await;
    res.assert_redirect("/polls/list/");

    let res = client.follow(res).await;
    assert_eq!(res.status, StatusCode::Ok);
    res.assert_contains("You already voted this poll!");
    res.assert_contains("alert alert-info alert-dismissible fade show");
    assert_eq!(app.repo.count_votes(alice.id, poll.id).await.unwrap(), 1);
}

#[async_std::test]
async fn test_vote_twice_through_the_form() {
    let app = test_app();
    let bob = app.user("bob", "pw", vec![]).await;
    let poll = app.poll(&bob, "Color?", &["Blue"]).await;
    let blue = app.choices(&poll).await.remove(0);
    let mut client = app.client();
    client.login("bob", "pw").await;

    let path = format!("/polls/{}/vote/", poll.id);
    let first = client.post(&path, &[("choice", &blue.id.to_string())]).await;
    assert_eq!(first.status, StatusCode::Ok);

    let second = client.post(&path, &[("choice", &blue.id.to_string())]).await;
    second.assert_redirect("/polls/list/");
    assert_eq!(app.repo.count_votes(bob.id, poll.id).await.unwrap(), 1);
}

#[async_std::test]
async fn test_vote_no_choice_selected() {
    let app = test_app();
    let carol = app.user("carol", "pw", vec![]).await;
    let poll = app.poll(&carol, "Drink?", &["Tea"]).await;
    let mut client = app.client();
    client.login("carol", "pw").await;

    let res = client.post(&format!("/polls/{}/vote/", poll.id), &[]).await;
    res.assert_redirect(&format!("/polls/{}/", poll.id));

    let res = client.follow(res).await;
    assert_eq!(res.status, StatusCode::Ok);
    res.assert_contains("No choice selected!");
    res.assert_contains("alert alert-warning alert-dismissible fade show");
    res.assert_contains("value=\"Vote\"");
    assert_eq!(app.repo.count_votes(carol.id, poll.id).await.unwrap(), 0);

    // shown once only
    let res = client.get(&format!("/polls/{}/", poll.id)).await;
    assert!(!res.body.contains("No choice selected!"));
}

#[async_std::test]
async fn test_vote_with_invalid_choice_id() {
    let (app, alice, poll) = setup().await;
    let mut client = app.client();
    client.login("alice", "password").await;

    let res = client
        .post(&format!("/polls/{}/vote/", poll.id), &[("choice", "9999")])
        .await;
    assert_eq!(res.status, StatusCode::NotFound);
    assert_eq!(app.repo.count_votes(alice.id, poll.id).await.unwrap(), 0);
}

#[async_std::test]
async fn test_vote_on_missing_poll() {
    let (app, _, _) = setup().await;
    let mut client = app.client();
    client.login("alice", "password").await;

    let res = client.post("/polls/9999/vote/", &[("choice", "1")]).await;
    assert_eq!(res.status, StatusCode::NotFound);
}

#[async_std::test]
async fn test_vote_requires_login() {
    let (app, _, poll) = setup().await;
    let mut client = app.client();

    let res = client
        .post(&format!("/polls/{}/vote/", poll.id), &[("choice", "1")])
        .await;
    assert_eq!(res.status, StatusCode::Found);
    assert!(res
        .location
        .unwrap()
        .starts_with("/accounts/login/?next="));
}

#[async_std::test]
async fn test_search_poll_by_keyword() {
    let (app, _, _) = setup().await;
    let mut client = app.client();

    let res = client.get("/polls/list/?search=language").await;
    assert_eq!(res.status, StatusCode::Ok);
    res.assert_contains("Your favorite language?");

    let res = client.get("/polls/list/?search=weather").await;
    assert_eq!(res.status, StatusCode::Ok);
    assert!(!res.body.contains("Your favorite language?"));
}

#[async_std::test]
async fn test_search_one_letter() {
    let (app, alice, _) = setup().await;
    app.poll(&alice, "Zebra poll", &[]).await;
    let mut client = app.client();

    let res = client.get("/polls/list/?search=z").await;
    assert_eq!(res.status, StatusCode::Ok);
    res.assert_contains("Zebra");
    assert!(!res.body.contains("Your favorite language?"));
}

#[async_std::test]
async fn test_pagination_exact_limit() {
    let (app, alice, _) = setup().await;
    for i in 0..6 {
        app.poll(&alice, &format!("Poll {}", i), &[]).await;
    }
    let mut client = app.client();

    let res = client.get("/polls/list/").await;
    assert_eq!(res.status, StatusCode::Ok);
    res.assert_contains("Page 1 of 2");

    let res = client.get("/polls/list/?page=2").await;
    res.assert_contains("Page 2 of 2");
    res.assert_contains("Your favorite language?");

    let res = client.get("/polls/list/?page=bogus").await;
    res.assert_contains("Page 1 of 2");
}

#[async_std::test]
async fn test_sort_by_name() {
    let (app, alice, _) = setup().await;
    app.poll(&alice, "Animal?", &[]).await;
    let mut client = app.client();

    let res = client.get("/polls/list/?sort=name").await;
    let animal = res.body.find("Animal?").unwrap();
    let language = res.body.find("Your favorite language?").unwrap();
    assert!(animal < language);
}

#[async_std::test]
async fn test_sort_links_keep_search() {
    let (app, alice, _) = setup().await;
    for i in 0..6 {
        app.poll(&alice, &format!("Another poll {}", i), &[]).await;
    }
    let mut client = app.client();

    let res = client.get("/polls/list/?search=poll&sort=votes").await;
    res.assert_contains("href=\"?search=poll&sort=name\"");
    res.assert_contains("href=\"?search=poll&sort=date\"");
    res.assert_contains("href=\"?search=poll&sort=votes\"");
    res.assert_contains("href=\"?page=2&search=poll&sort=votes\"");
}

#[async_std::test]
async fn test_huge_page_number_shows_last_page() {
    let (app, alice, _) = setup().await;
    for i in 0..6 {
        app.poll(&alice, &format!("Poll {}", i), &[]).await;
    }
    let mut client = app.client();

    let res = client.get("/polls/list/?page=99999999999999999999").await;
    assert_eq!(res.status, StatusCode::Ok);
    res.assert_contains("Page 2 of 2");
}

#[async_std::test]
async fn test_create_poll_missing_question() {
    let (app, _, _) = setup().await;
    let mut client = app.client();
    client.login("alice", "password").await;

    let res = client
        .post(
            "/polls/add/",
            &[("text", ""), ("choice1", "Option A"), ("choice2", "Option B")],
        )
        .await;
    assert_eq!(res.status, StatusCode::Ok);
    res.assert_contains("This field is required.");
    res.assert_contains("Option A");
    assert_eq!(app.repo.count_polls(&PollFilter::default()).await.unwrap(), 1);
}

#[async_std::test]
async fn test_create_poll_with_empty_choices() {
    let (app, _, _) = setup().await;
    let mut client = app.client();
    client.login("alice", "password").await;

    let res = client
        .post(
            "/polls/add/",
            &[("text", "What is your favorite?"), ("choice1", ""), ("choice2", "")],
        )
        .await;
    assert_eq!(res.status, StatusCode::Ok);
    res.assert_contains("This field is required.");
    assert_eq!(app.repo.count_polls(&PollFilter::default()).await.unwrap(), 1);
}

#[async_std::test]
async fn test_create_poll() {
    let (app, _, _) = setup().await;
    let mut client = app.client();
    client.login("alice", "password").await;

    let res = client
        .post(
            "/polls/add/",
            &[
                ("text", "Is testing useful?"),
                ("choice1", "Yes"),
                ("choice2", "No"),
            ],
        )
        .await;
    res.assert_redirect("/polls/list/");

    let res = client.follow(res).await;
    res.assert_contains("Is testing useful?");
    res.assert_contains("Poll &amp; Choices added successfully.");
    assert_eq!(app.repo.count_polls(&PollFilter::default()).await.unwrap(), 2);
}

#[async_std::test]
async fn test_create_poll_without_permission() {
    let (app, _, _) = setup().await;
    app.user("bob", "123456", vec![]).await;
    let mut client = app.client();
    client.login("bob", "123456").await;

    let res = client.get("/polls/add/").await;
    assert_eq!(res.status, StatusCode::Forbidden);

    let res = client
        .post(
            "/polls/add/",
            &[("text", "Sneaky?"), ("choice1", "Yes"), ("choice2", "No")],
        )
        .await;
    assert_eq!(res.status, StatusCode::Forbidden);
    assert_eq!(app.repo.count_polls(&PollFilter::default()).await.unwrap(), 1);
}

#[async_std::test]
async fn test_create_poll_requires_login() {
    let (app, _, _) = setup().await;
    let mut client = app.client();

    let res = client.get("/polls/add/").await;
    assert_eq!(res.status, StatusCode::Found);
    let res = client.follow(res).await;
    res.assert_contains("name=\"next\" value=\"/polls/add/\"");
}

#[async_std::test]
async fn test_edit_nonexistent_poll() {
    let (app, _, _) = setup().await;
    let mut client = app.client();
    client.login("alice", "password").await;

    let res = client.get("/polls/edit/9999/").await;
    assert_eq!(res.status, StatusCode::NotFound);
}

#[async_std::test]
async fn test_edit_poll_access_by_non_owner() {
    let (app, _, poll) = setup().await;
    app.user("bob", "123456", vec![Permission::AddPoll]).await;
    let mut client = app.client();
    client.login("bob", "123456").await;

    let path = format!("/polls/edit/{}/", poll.id);
    let res = client.get(&path).await;
    assert_eq!(res.status, StatusCode::Forbidden);

    let res = client.post(&path, &[("text", "Hijacked?")]).await;
    assert_eq!(res.status, StatusCode::Forbidden);
    let stored = app.repo.find_poll(poll.id).await.unwrap().unwrap();
    assert_eq!(stored.text, "Your favorite language?");

    let res = client.post(&format!("/polls/delete/{}/", poll.id), &[]).await;
    assert_eq!(res.status, StatusCode::Forbidden);
    assert!(app.repo.find_poll(poll.id).await.unwrap().is_some());
}

#[async_std::test]
async fn test_owner_edits_poll() {
    let (app, _, poll) = setup().await;
    let mut client = app.client();
    client.login("alice", "password").await;

    let path = format!("/polls/edit/{}/", poll.id);
    let res = client.get(&path).await;
    assert_eq!(res.status, StatusCode::Ok);
    res.assert_contains("Your favorite language?");

    let res = client.post(&path, &[("text", "Updated question")]).await;
    res.assert_redirect("/polls/list/user/");

    let res = client.follow(res).await;
    res.assert_contains("Updated question");
    res.assert_contains("title=\"Edit Poll\"");
    res.assert_contains("Poll Updated successfully.");
}

#[async_std::test]
async fn test_edit_with_blank_text() {
    let (app, _, poll) = setup().await;
    let mut client = app.client();
    client.login("alice", "password").await;

    let res = client
        .post(&format!("/polls/edit/{}/", poll.id), &[("text", "  ")])
        .await;
    assert_eq!(res.status, StatusCode::Ok);
    res.assert_contains("This field is required.");
    let stored = app.repo.find_poll(poll.id).await.unwrap().unwrap();
    assert_eq!(stored.text, "Your favorite language?");
}

#[async_std::test]
async fn test_add_choice_and_delete() {
    let (app, alice, poll) = setup().await;
    let mut client = app.client();
    client.login("alice", "password").await;

    let res = client
        .post(
            &format!("/polls/edit/{}/choice/add/", poll.id),
            &[("choice_text", "Rust")],
        )
        .await;
    res.assert_redirect(&format!("/polls/edit/{}/", poll.id));
    let res = client.follow(res).await;
    res.assert_contains("Rust");
    assert_eq!(app.choices(&poll).await.len(), 3);

    let res = client.post(&format!("/polls/delete/{}/", poll.id), &[]).await;
    res.assert_redirect("/polls/list/user/");
    assert!(app.repo.find_poll(poll.id).await.unwrap().is_none());
    assert_eq!(
        app.repo
            .count_polls(&PollFilter {
                owner_id: Some(alice.id),
                ..Default::default()
            })
            .await
            .unwrap(),
        0
    );
}

#[async_std::test]
async fn test_user_list_only_shows_own_polls() {
    let (app, _, _) = setup().await;
    let bob = app.user("bob", "123456", vec![Permission::AddPoll]).await;
    app.poll(&bob, "Question from Bob", &[]).await;
    let mut client = app.client();
    client.login("bob", "123456").await;

    let res = client.get("/polls/list/user/").await;
    assert_eq!(res.status, StatusCode::Ok);
    res.assert_contains("My Polls");
    res.assert_contains("Question from Bob");
    assert!(!res.body.contains("Your favorite language?"));
}

#[async_std::test]
async fn test_results_page() {
    let (app, alice, poll) = setup().await;
    let choices = app.choices(&poll).await;
    app.repo
        .insert_vote(InsertableVote {
            user_id: alice.id,
            poll_id: poll.id,
            choice_id: choices[1].id,
        })
        .await
        .unwrap();
    let mut client = app.client();

    let res = client.get(&format!("/polls/{}/results/", poll.id)).await;
    assert_eq!(res.status, StatusCode::Ok);
    res.assert_contains("JavaScript");
    res.assert_contains("Total votes: 1");

    let res = client.get("/polls/9999/results/").await;
    assert_eq!(res.status, StatusCode::NotFound);
}
