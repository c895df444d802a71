mod common;

use common::*;
use serde_json::json;
use wiremock::MockServer;

use unimail::CompositeId;
use unimail::unified::{Mutation, mutate};

fn ids(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn one_set_call_per_identity_group() {
    let server = MockServer::start().await;
    for (account, id) in [(&ALICE, "A"), (&BOB, "B"), (&CAROL, "C")] {
        mount_session(&server, account).await;
        mount_api(
            &server,
            account,
            set_response(id, json!({"updated": {"m1": null, "m2": null}})),
        )
        .await;
    }

    let unified = unified(&server, &[&ALICE, &BOB, &CAROL]);
    let plan = mutate::plan(
        Mutation::MarkRead,
        &ids(&["1:m1", "2:m1", "3:m1", "1:m2", "2:m2", "3:m2"]),
    );
    let out = unified.apply(USER, plan).await.expect("apply");

    assert_eq!(out.data.succeeded, 6);
    assert_eq!(out.data.groups.len(), 3);
    for account in [&ALICE, &BOB, &CAROL] {
        let calls = api_calls(&server, account).await;
        assert_eq!(calls.len(), 1, "{} got {} calls", account.email, calls.len());
        let call = &calls[0]["methodCalls"][0];
        assert_eq!(call[0], "Email/set");
        assert_eq!(call[1]["accountId"], account.account_id);
        assert_eq!(call[1]["update"]["m1"], json!({"keywords/$seen": true}));
        assert_eq!(call[1]["update"]["m2"], json!({"keywords/$seen": true}));
    }
}

#[tokio::test]
async fn cross_identity_move_is_excluded_from_dispatch() {
    let server = MockServer::start().await;
    mount_session(&server, &ALICE).await;
    mount_session(&server, &BOB).await;
    mount_api(&server, &ALICE, set_response("A", json!({"updated": {"m1": null}}))).await;
    mount_api(&server, &BOB, set_response("B", json!({"updated": {"x": null}}))).await;

    let unified = unified(&server, &[&ALICE, &BOB]);
    let plan = mutate::plan(
        Mutation::Move {
            target: CompositeId::new(1, "archive"),
        },
        &ids(&["1:m1", "2:x"]),
    );
    let out = unified.apply(USER, plan).await.expect("apply");

    assert_eq!(out.data.rejected.len(), 1);
    assert_eq!(out.data.rejected[0].id, "2:x");
    assert!(api_calls(&server, &BOB).await.is_empty());
    let calls = api_calls(&server, &ALICE).await;
    assert_eq!(calls[0]["methodCalls"][0][1]["update"]["m1"], json!({"mailboxIds": {"archive": true}}));
}

#[tokio::test]
async fn per_object_rejections_are_reported_with_their_ids() {
    let server = MockServer::start().await;
    mount_session(&server, &ALICE).await;
    mount_api(
        &server,
        &ALICE,
        set_response(
            "A",
            json!({
                "updated": {"m1": null},
                "notUpdated": {"m2": {"type": "notFound", "description": "no such email"}}
            }),
        ),
    )
    .await;

    let unified = unified(&server, &[&ALICE]);
    let out = unified
        .apply(USER, mutate::plan(Mutation::Flag, &ids(&["1:m1", "1:m2"])))
        .await
        .expect("apply");

    assert_eq!(out.data.succeeded, 1);
    assert_eq!(out.data.failed, 1);
    let failed = &out.data.groups[0].failed[0];
    assert_eq!(failed.id.to_string(), "1:m2");
    assert_eq!(failed.kind, "notFound");
    assert_eq!(failed.description.as_deref(), Some("no such email"));
}

#[tokio::test]
async fn trash_resolves_the_trash_mailbox_first() {
    let server = MockServer::start().await;
    mount_session(&server, &ALICE).await;
    mount_api_when(&server, &ALICE, "Mailbox/get", mailbox_response("A", standard_mailboxes())).await;
    mount_api_when(&server, &ALICE, "Email/set", set_response("A", json!({"updated": {"m1": null}}))).await;

    let unified = unified(&server, &[&ALICE]);
    let out = unified
        .apply(USER, mutate::plan(Mutation::Trash, &ids(&["1:m1"])))
        .await
        .expect("apply");
    assert_eq!(out.data.succeeded, 1);

    let calls = api_calls(&server, &ALICE).await;
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1]["methodCalls"][0][1]["update"]["m1"], json!({"mailboxIds": {"trash": true}}));
}

#[tokio::test]
async fn destroy_reports_destroyed_ids() {
    let server = MockServer::start().await;
    mount_session(&server, &ALICE).await;
    mount_api(&server, &ALICE, set_response("A", json!({"destroyed": ["m1"]}))).await;

    let unified = unified(&server, &[&ALICE]);
    let out = unified
        .apply(USER, mutate::plan(Mutation::Destroy, &ids(&["1:m1"])))
        .await
        .expect("apply");
    assert_eq!(out.data.action, "delete");
    assert_eq!(out.data.groups[0].succeeded[0].to_string(), "1:m1");
    let calls = api_calls(&server, &ALICE).await;
    assert_eq!(calls[0]["methodCalls"][0][1]["destroy"], json!(["m1"]));
}

#[tokio::test]
async fn failing_group_is_a_warning_unless_all_fail() {
    let server = MockServer::start().await;
    mount_session(&server, &ALICE).await;
    mount_api(&server, &ALICE, set_response("A", json!({"updated": {"m1": null}}))).await;
    // BOB: no session, discovery fails.

    let unified = unified(&server, &[&ALICE, &BOB]);
    let out = unified
        .apply(USER, mutate::plan(Mutation::MarkUnread, &ids(&["1:m1", "2:m1"])))
        .await
        .expect("apply");
    assert_eq!(out.warning.as_ref().map(|w| w.kind()), Some("partialFailure"));
    let bob = out.data.groups.iter().find(|g| g.identity_id == 2).expect("bob group");
    assert!(bob.error.is_some());

    // Only BOB's ids, and an identity the user does not own.
    let err = unified
        .apply(USER, mutate::plan(Mutation::MarkUnread, &ids(&["2:m1", "42:m1"])))
        .await
        .expect_err("all failed");
    assert_eq!(err.kind(), "allIdentitiesFailed");
}

#[tokio::test]
async fn unowned_identity_status_carries_no_address() {
    let server = MockServer::start().await;
    mount_session(&server, &ALICE).await;
    mount_api(&server, &ALICE, set_response("A", json!({"updated": {"m1": null}}))).await;

    let unified = unified(&server, &[&ALICE]);
    let out = unified
        .apply(USER, mutate::plan(Mutation::Flag, &ids(&["1:m1", "42:m1"])))
        .await
        .expect("apply");

    let statuses = serde_json::to_value(&out.statuses).unwrap();
    assert_eq!(statuses[0]["email"], "alice@alpha.test");
    assert_eq!(statuses[1]["identityId"], 42);
    assert_eq!(statuses[1]["ok"], false);
    assert!(statuses[1].get("email").is_none());
}
