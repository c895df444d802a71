mod common;

use common::*;
use serde_json::json;
use wiremock::MockServer;

use unimail::unified::InboxRequest;

#[tokio::test]
async fn merges_accounts_newest_first_and_truncates_from_the_top() {
    let server = MockServer::start().await;
    mount_session(&server, &ALICE).await;
    mount_session(&server, &BOB).await;
    mount_api(
        &server,
        &ALICE,
        query_response(
            "A",
            3,
            vec![
                email("a1", "2026-02-08T10:00:00Z"),
                email("a2", "2026-02-08T09:00:00Z"),
                email("a3", "2026-02-08T08:00:00Z"),
            ],
        ),
    )
    .await;
    mount_api(
        &server,
        &BOB,
        query_response(
            "B",
            2,
            vec![email("b1", "2026-02-08T09:30:00Z"), email("b2", "2026-02-08T07:00:00Z")],
        ),
    )
    .await;

    let unified = unified(&server, &[&ALICE, &BOB]);
    let req = InboxRequest {
        page_size: Some(4),
        ..Default::default()
    };
    let out = unified.inbox(USER, &req).await.expect("inbox");

    let ids: Vec<String> = out.data.emails.iter().map(|e| e.id.to_string()).collect();
    assert_eq!(ids, vec!["1:a1", "2:b1", "1:a2", "1:a3"]);
    assert_eq!(out.data.total, 5);
    assert!(out.data.has_more);
    assert!(out.warning.is_none());

    let first = &out.data.emails[0];
    assert_eq!(first.owner.identity_email, "alice@alpha.test");
    assert_eq!(first.owner.domain_name, "alpha.test");
    assert_eq!(first.thread_id.as_ref().map(|t| t.to_string()).as_deref(), Some("1:t-a1"));
    assert_eq!(first.mailbox_ids[0].to_string(), "1:inbox");
}

#[tokio::test]
async fn totals_are_summed_while_the_page_keeps_the_newest_ten() {
    let server = MockServer::start().await;
    mount_session(&server, &ALICE).await;
    mount_session(&server, &BOB).await;

    // A: 7 emails, one per hour from 12:00 down. B: first 10 of 20, on the half hour.
    let a: Vec<_> = (0..7)
        .map(|i| email(&format!("a{i}"), &format!("2026-02-08T{:02}:00:00Z", 12 - i)))
        .collect();
    let b: Vec<_> = (0..10)
        .map(|i| email(&format!("b{i}"), &format!("2026-02-08T{:02}:30:00Z", 12 - i)))
        .collect();
    mount_api(&server, &ALICE, query_response("A", 7, a)).await;
    mount_api(&server, &BOB, query_response("B", 20, b)).await;

    let unified = unified(&server, &[&ALICE, &BOB]);
    let req = InboxRequest {
        page_size: Some(10),
        ..Default::default()
    };
    let out = unified.inbox(USER, &req).await.expect("inbox");

    assert_eq!(out.data.total, 27);
    assert_eq!(out.data.emails.len(), 10);
    assert!(out.data.has_more);
    let ids: Vec<String> = out.data.emails.iter().map(|e| e.id.to_string()).collect();
    assert_eq!(
        ids,
        vec!["2:b0", "1:a0", "2:b1", "1:a1", "2:b2", "1:a2", "2:b3", "1:a3", "2:b4", "1:a4"]
    );
    let times: Vec<_> = out.data.emails.iter().map(|e| e.received_at).collect();
    assert!(times.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
async fn one_unreachable_account_is_reported_not_fatal() {
    let server = MockServer::start().await;
    mount_session(&server, &ALICE).await;
    mount_session(&server, &BOB).await;
    // CAROL has no session mock: discovery answers 404.
    mount_api(&server, &ALICE, query_response("A", 1, vec![email("a1", "2026-02-08T10:00:00Z")])).await;
    mount_api(&server, &BOB, query_response("B", 1, vec![email("b1", "2026-02-08T11:00:00Z")])).await;

    let unified = unified(&server, &[&ALICE, &BOB, &CAROL]);
    let out = unified.inbox(USER, &InboxRequest::default()).await.expect("inbox");

    assert_eq!(out.data.emails.len(), 2);
    assert_eq!(out.data.total, 2);
    let failed: Vec<_> = out.statuses.iter().filter(|s| !s.ok).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].identity_id, 3);
    assert_eq!(
        out.warning.as_ref().map(|w| w.kind()),
        Some("partialFailure")
    );
    assert_eq!(out.data.identities.len(), 3);
}

#[tokio::test]
async fn every_account_failing_is_an_error() {
    let server = MockServer::start().await;
    let unified = unified(&server, &[&ALICE, &BOB]);
    let err = unified
        .inbox(USER, &InboxRequest::default())
        .await
        .expect_err("all failed");
    assert_eq!(err.kind(), "allIdentitiesFailed");
}

#[tokio::test]
async fn mailbox_filter_pins_the_query_to_one_account() {
    let server = MockServer::start().await;
    mount_session(&server, &ALICE).await;
    mount_session(&server, &BOB).await;
    mount_api(&server, &ALICE, query_response("A", 0, vec![])).await;
    mount_api(&server, &BOB, query_response("B", 1, vec![email("b1", "2026-02-08T11:00:00Z")])).await;

    let unified = unified(&server, &[&ALICE, &BOB]);
    let req = InboxRequest {
        mailbox_id: Some("2:inbox".into()),
        unread: true,
        ..Default::default()
    };
    let out = unified.inbox(USER, &req).await.expect("inbox");
    assert_eq!(out.data.emails.len(), 1);
    assert_eq!(out.data.identities.len(), 1);

    assert!(api_calls(&server, &ALICE).await.is_empty());
    let calls = api_calls(&server, &BOB).await;
    assert_eq!(calls.len(), 1);
    let query = &calls[0]["methodCalls"][0];
    assert_eq!(query[0], "Email/query");
    assert_eq!(query[1]["filter"], json!({"inMailbox": "inbox", "notKeyword": "$seen"}));
    assert_eq!(query[1]["calculateTotal"], true);
    let get = &calls[0]["methodCalls"][1];
    assert_eq!(get[1]["#ids"], json!({"resultOf": "c0", "name": "Email/query", "path": "/ids"}));
}

#[tokio::test]
async fn unknown_identity_filter_is_not_found() {
    let server = MockServer::start().await;
    let unified = unified(&server, &[&ALICE]);
    let req = InboxRequest {
        identity_id: Some(99),
        ..Default::default()
    };
    let err = unified.inbox(USER, &req).await.expect_err("unknown identity");
    assert_eq!(err.kind(), "notFound");
}

#[tokio::test]
async fn later_pages_offset_every_account_and_end_the_listing() {
    let server = MockServer::start().await;
    mount_session(&server, &ALICE).await;
    mount_session(&server, &BOB).await;
    // 22 + 8 = 30 in total: page 3 of 10 is the last one.
    mount_api(
        &server,
        &ALICE,
        query_response(
            "A",
            22,
            vec![email("a20", "2026-02-01T10:00:00Z"), email("a21", "2026-02-01T09:00:00Z")],
        ),
    )
    .await;
    mount_api(&server, &BOB, query_response("B", 8, vec![])).await;

    let unified = unified(&server, &[&ALICE, &BOB]);
    let req = InboxRequest {
        page: Some(3),
        page_size: Some(10),
        ..Default::default()
    };
    let out = unified.inbox(USER, &req).await.expect("inbox");

    assert_eq!(out.data.page, 3);
    assert_eq!(out.data.total, 30);
    assert!(!out.data.has_more);
    let ids: Vec<String> = out.data.emails.iter().map(|e| e.id.to_string()).collect();
    assert_eq!(ids, vec!["1:a20", "1:a21"]);

    for account in [&ALICE, &BOB] {
        let calls = api_calls(&server, account).await;
        assert_eq!(calls.len(), 1);
        let query = &calls[0]["methodCalls"][0][1];
        assert_eq!(query["position"], 20, "{}", account.email);
        assert_eq!(query["limit"], 10, "{}", account.email);
    }
}

#[tokio::test]
async fn out_of_range_page_is_a_usage_error_without_requests() {
    let server = MockServer::start().await;
    mount_session(&server, &ALICE).await;
    mount_api(&server, &ALICE, query_response("A", 0, vec![])).await;

    let unified = unified(&server, &[&ALICE]);
    let req = InboxRequest {
        page: Some(u64::MAX),
        page_size: Some(10),
        ..Default::default()
    };
    let err = unified.inbox(USER, &req).await.expect_err("page too large");
    assert_eq!(err.kind(), "usageError");
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}
