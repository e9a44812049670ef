//! Notification inbox tests
//!
//! Covers listing (filters, both pagination modes), unread counts, and the
//! read-state transition.

mod common;

use axum::http::StatusCode;
use common::app;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use huddle::app::notifications::NewNotification;
use huddle::domain::notification::NotificationType;

// ===========================================================================
// Listing
// ===========================================================================

#[tokio::test]
async fn list_requires_authentication() {
    let app = app().await;

    let resp = app.get("/notifications", None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn empty_inbox_is_empty_not_an_error() {
    let app = app().await;
    let user = app.create_user("ntf_empty").await;

    let resp = app.get("/notifications", Some(&user.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);

    let body = resp.json();
    assert_eq!(body["items"].as_array().unwrap().len(), 0);
    assert_eq!(body["has_more"].as_bool().unwrap(), false);
    assert!(body["next_cursor"].is_null());
}

#[tokio::test]
async fn list_is_newest_first_with_id_tiebreak() {
    let app = app().await;
    let user = app.create_user("ntf_order").await;
    let actor = app.create_user("ntf_order_actor").await;

    let base = OffsetDateTime::now_utc() - Duration::minutes(10);
    app.insert_notification_at(user.id, actor.id, "first", base)
        .await;
    app.insert_notification_at(user.id, actor.id, "second", base + Duration::minutes(1))
        .await;
    // Same timestamp as "second": ordering must still be total via id.
    app.insert_notification_at(user.id, actor.id, "second-twin", base + Duration::minutes(1))
        .await;

    let resp = app.get("/notifications", Some(&user.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);

    let body = resp.json();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[2]["text"], "first");

    let first_two: Vec<&str> = items[..2]
        .iter()
        .map(|item| item["text"].as_str().unwrap())
        .collect();
    assert!(first_two.contains(&"second"));
    assert!(first_two.contains(&"second-twin"));
    // Tie broken by id descending.
    assert!(items[0]["id"].as_str().unwrap() > items[1]["id"].as_str().unwrap());
}

#[tokio::test]
async fn unread_filter_hides_read_rows() {
    let app = app().await;
    let user = app.create_user("ntf_unread").await;
    let actor = app.create_user("ntf_unread_actor").await;

    app.insert_notification(user.id, actor.id, "unread one").await;
    let read_id = app.insert_notification(user.id, actor.id, "soon read").await;

    let resp = app
        .post_empty(
            &format!("/notifications/{}/read", read_id),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let resp = app
        .get("/notifications?unread=true", Some(&user.access_token))
        .await;
    let body = resp.json();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["text"], "unread one");
    assert_eq!(items[0]["status"], "unread");
}

#[tokio::test]
async fn type_filter_applies_before_pagination() {
    let app = app().await;
    let user = app.create_user("ntf_type").await;
    let actor = app.create_user("ntf_type_actor").await;

    for i in 0..3 {
        app.insert_typed_notification(user.id, actor.id, &format!("mention {}", i), "mention")
            .await;
    }
    app.insert_notification(user.id, actor.id, "plain message")
        .await;

    let resp = app
        .get(
            "/notifications?type=mention&limit=2",
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let body = resp.json();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    for item in items {
        assert_eq!(item["type"], "mention");
    }
    // has_more reflects the filtered set: one mention left, the plain
    // message does not count.
    assert_eq!(body["has_more"].as_bool().unwrap(), true);
}

#[tokio::test]
async fn unknown_type_filter_is_rejected() {
    let app = app().await;
    let user = app.create_user("ntf_badtype").await;

    let resp = app
        .get("/notifications?type=smoke_signal", Some(&user.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn time_window_filters_by_creation_time() {
    let app = app().await;
    let user = app.create_user("ntf_window").await;
    let actor = app.create_user("ntf_window_actor").await;

    let base = OffsetDateTime::now_utc() - Duration::hours(3);
    app.insert_notification_at(user.id, actor.id, "old", base)
        .await;
    app.insert_notification_at(user.id, actor.id, "recent", base + Duration::hours(2))
        .await;

    let since = (base + Duration::hours(1))
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap();
    let resp = app
        .get(
            &format!("/notifications?since={}", urlencode(&since)),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let body = resp.json();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["text"], "recent");
}

// ===========================================================================
// Pagination
// ===========================================================================

#[tokio::test]
async fn cursor_pagination_is_stable_under_concurrent_insert() {
    let app = app().await;
    let user = app.create_user("ntf_cursor").await;
    let actor = app.create_user("ntf_cursor_actor").await;

    let base = OffsetDateTime::now_utc() - Duration::minutes(30);
    let mut expected = Vec::new();
    for i in 0..5 {
        app.insert_notification_at(
            user.id,
            actor.id,
            &format!("item {}", i),
            base + Duration::minutes(i),
        )
        .await;
        expected.push(format!("item {}", i));
    }
    expected.reverse(); // newest first

    let resp = app
        .get("/notifications?limit=3", Some(&user.access_token))
        .await;
    let body = resp.json();
    let page_one: Vec<String> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["text"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(page_one, expected[..3].to_vec());
    assert_eq!(body["has_more"].as_bool().unwrap(), true);
    let cursor = body["next_cursor"].as_str().unwrap().to_string();

    // New rows arrive after the cursor was captured.
    app.insert_notification(user.id, actor.id, "later one").await;
    app.insert_notification(user.id, actor.id, "later two").await;

    let resp = app
        .get(
            &format!("/notifications?limit=3&cursor={}", urlencode(&cursor)),
            Some(&user.access_token),
        )
        .await;
    let body = resp.json();
    let page_two: Vec<String> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["text"].as_str().unwrap().to_string())
        .collect();

    // Exactly the rest of the snapshot: nothing skipped, nothing repeated.
    assert_eq!(page_two, expected[3..].to_vec());
    assert_eq!(body["has_more"].as_bool().unwrap(), false);
}

#[tokio::test]
async fn offset_pagination_walks_pages() {
    let app = app().await;
    let user = app.create_user("ntf_page").await;
    let actor = app.create_user("ntf_page_actor").await;

    let base = OffsetDateTime::now_utc() - Duration::minutes(10);
    for i in 0..5 {
        app.insert_notification_at(
            user.id,
            actor.id,
            &format!("page item {}", i),
            base + Duration::minutes(i),
        )
        .await;
    }

    let resp = app
        .get("/notifications?page=0&limit=2", Some(&user.access_token))
        .await;
    let body = resp.json();
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
    assert_eq!(body["next_page"].as_i64().unwrap(), 1);
    assert!(body["next_cursor"].is_null());

    let resp = app
        .get("/notifications?page=2&limit=2", Some(&user.access_token))
        .await;
    let body = resp.json();
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["has_more"].as_bool().unwrap(), false);
    assert!(body["next_page"].is_null());
}

#[tokio::test]
async fn cursor_and_page_are_mutually_exclusive() {
    let app = app().await;
    let user = app.create_user("ntf_modes").await;

    let resp = app
        .get(
            "/notifications?page=0&cursor=2024-01-01T00:00:00Z/00000000-0000-0000-0000-000000000000",
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_cursor_is_rejected() {
    let app = app().await;
    let user = app.create_user("ntf_badcursor").await;

    let resp = app
        .get("/notifications?cursor=garbage", Some(&user.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "invalid cursor");
}

#[tokio::test]
async fn limit_is_clamped_not_rejected() {
    let app = app().await;
    let user = app.create_user("ntf_clamp").await;
    let actor = app.create_user("ntf_clamp_actor").await;

    app.insert_notification(user.id, actor.id, "one").await;
    app.insert_notification(user.id, actor.id, "two").await;

    // A wild limit is clamped server-side, never an error.
    let resp = app
        .get("/notifications?limit=100000", Some(&user.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["items"].as_array().unwrap().len(), 2);

    let resp = app
        .get("/notifications?limit=0", Some(&user.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["items"].as_array().unwrap().len(), 1);
}

// ===========================================================================
// Read state
// ===========================================================================

#[tokio::test]
async fn mark_read_transitions_once() {
    let app = app().await;
    let user = app.create_user("ntf_read").await;
    let actor = app.create_user("ntf_read_actor").await;

    let id = app.insert_notification(user.id, actor.id, "mark me").await;

    let resp = app
        .post_empty(
            &format!("/notifications/{}/read", id),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    // Second call is a no-op reported as not found.
    let resp = app
        .post_empty(
            &format!("/notifications/{}/read", id),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    let (status, read_at): (String, Option<OffsetDateTime>) = sqlx::query_as(
        "SELECT status, read_at FROM notifications WHERE id = $1",
    )
    .bind(id)
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(status, "read");
    assert!(read_at.is_some());
}

#[tokio::test]
async fn read_at_is_monotonic_under_repeated_marks() {
    let app = app().await;
    let user = app.create_user("ntf_mono").await;
    let actor = app.create_user("ntf_mono_actor").await;

    let id = app.insert_notification(user.id, actor.id, "read once").await;

    app.post_empty(
        &format!("/notifications/{}/read", id),
        Some(&user.access_token),
    )
    .await;

    let first_read_at: Option<OffsetDateTime> =
        sqlx::query_scalar("SELECT read_at FROM notifications WHERE id = $1")
            .bind(id)
            .fetch_one(app.pool())
            .await
            .unwrap();

    // Neither a repeated mark nor a bulk mark may move the stamp.
    app.post_empty(
        &format!("/notifications/{}/read", id),
        Some(&user.access_token),
    )
    .await;
    app.post_empty("/notifications/read-all", Some(&user.access_token))
        .await;

    let after: Option<OffsetDateTime> =
        sqlx::query_scalar("SELECT read_at FROM notifications WHERE id = $1")
            .bind(id)
            .fetch_one(app.pool())
            .await
            .unwrap();
    assert_eq!(after, first_read_at);
}

#[tokio::test]
async fn cannot_mark_another_users_notification() {
    let app = app().await;
    let owner = app.create_user("ntf_owner").await;
    let intruder = app.create_user("ntf_intruder").await;
    let actor = app.create_user("ntf_owner_actor").await;

    let id = app.insert_notification(owner.id, actor.id, "private").await;

    let resp = app
        .post_empty(
            &format!("/notifications/{}/read", id),
            Some(&intruder.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    let status: String = sqlx::query_scalar("SELECT status FROM notifications WHERE id = $1")
        .bind(id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(status, "unread");
}

#[tokio::test]
async fn mark_unknown_notification_returns_not_found() {
    let app = app().await;
    let user = app.create_user("ntf_unknown").await;

    let resp = app
        .post_empty(
            &format!("/notifications/{}/read", Uuid::new_v4()),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn read_all_zeroes_the_unread_count() {
    let app = app().await;
    let user = app.create_user("ntf_readall").await;
    let actor = app.create_user("ntf_readall_actor").await;

    for i in 0..3 {
        app.insert_notification(user.id, actor.id, &format!("bulk {}", i))
            .await;
    }

    let resp = app
        .get("/notifications/unread-count", Some(&user.access_token))
        .await;
    assert_eq!(resp.json()["unread"].as_i64().unwrap(), 3);

    let resp = app
        .post_empty("/notifications/read-all", Some(&user.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let resp = app
        .get("/notifications/unread-count", Some(&user.access_token))
        .await;
    assert_eq!(resp.json()["unread"].as_i64().unwrap(), 0);

    // Idempotent: running it again stays 204 with nothing left to flip.
    let resp = app
        .post_empty("/notifications/read-all", Some(&user.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn read_all_only_touches_the_callers_rows() {
    let app = app().await;
    let user_a = app.create_user("ntf_bulk_a").await;
    let user_b = app.create_user("ntf_bulk_b").await;
    let actor = app.create_user("ntf_bulk_actor").await;

    app.insert_notification(user_a.id, actor.id, "for a").await;
    app.insert_notification(user_b.id, actor.id, "for b").await;

    app.post_empty("/notifications/read-all", Some(&user_a.access_token))
        .await;

    let resp = app
        .get("/notifications/unread-count", Some(&user_b.access_token))
        .await;
    assert_eq!(resp.json()["unread"].as_i64().unwrap(), 1);
}

// ===========================================================================
// Creation invariants (service level)
// ===========================================================================

#[tokio::test]
async fn duplicate_create_is_a_no_op_not_an_error() {
    let app = app().await;
    let user = app.create_user("ntf_dup").await;
    let actor = app.create_user("ntf_dup_actor").await;
    let message_id = Uuid::new_v4();

    let new = NewNotification {
        recipient_user_id: user.id,
        actor_user_id: actor.id,
        direct_conversation_id: Some(Uuid::new_v4()),
        channel_id: None,
        message_id: Some(message_id),
        notification_type: None,
        text: "Alice sent a message".into(),
    };

    let first = app.notifications().create(&new).await.unwrap();
    assert!(first.is_some());
    // Absent type defaults to message.
    assert_eq!(
        first.unwrap().notification_type,
        NotificationType::Message
    );

    let second = app.notifications().create(&new).await.unwrap();
    assert!(second.is_none());

    assert_eq!(app.count_notifications(user.id).await, 1);
}

#[tokio::test]
async fn writer_refuses_self_notification() {
    let app = app().await;
    let user = app.create_user("ntf_self").await;

    let new = NewNotification {
        recipient_user_id: user.id,
        actor_user_id: user.id,
        direct_conversation_id: Some(Uuid::new_v4()),
        channel_id: None,
        message_id: Some(Uuid::new_v4()),
        notification_type: None,
        text: "talking to myself".into(),
    };

    let created = app.writer().create(new).await.unwrap();
    assert!(created.is_none());
    assert_eq!(app.count_notifications(user.id).await, 0);
}

#[tokio::test]
async fn writer_rejects_empty_text_before_any_write() {
    let app = app().await;
    let user = app.create_user("ntf_notext").await;
    let actor = app.create_user("ntf_notext_actor").await;

    let new = NewNotification {
        recipient_user_id: user.id,
        actor_user_id: actor.id,
        direct_conversation_id: None,
        channel_id: None,
        message_id: Some(Uuid::new_v4()),
        notification_type: None,
        text: "   ".into(),
    };

    assert!(app.writer().create(new).await.is_err());
    assert_eq!(app.count_notifications(user.id).await, 0);
}

#[tokio::test]
async fn unread_count_matches_unread_rows() {
    let app = app().await;
    let user = app.create_user("ntf_count").await;
    let actor = app.create_user("ntf_count_actor").await;

    for i in 0..4 {
        app.insert_notification(user.id, actor.id, &format!("n{}", i))
            .await;
    }
    let read_id = app.insert_notification(user.id, actor.id, "read me").await;
    app.post_empty(
        &format!("/notifications/{}/read", read_id),
        Some(&user.access_token),
    )
    .await;

    let db_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications \
         WHERE recipient_user_id = $1 AND status = 'unread'",
    )
    .bind(user.id)
    .fetch_one(app.pool())
    .await
    .unwrap();

    let resp = app
        .get("/notifications/unread-count", Some(&user.access_token))
        .await;
    assert_eq!(resp.json()["unread"].as_i64().unwrap(), db_count);
    assert_eq!(db_count, 4);
}

fn urlencode(value: &str) -> String {
    value
        .replace('+', "%2B")
        .replace(':', "%3A")
        .replace('/', "%2F")
}
