use serde_json::{json, Value};
use villa_core::capabilities::{HttpMethod, RequestBody};
use villa_core::testing::TestHarness;
use villa_core::{ItemId, ListScreen, Notice, Property};

const PROPERTIES: &str = "/villas/properties/";
const AGENT: ItemId = ItemId(7);

fn property_path(id: u64) -> String {
    format!("/villas/properties/{id}/")
}

/// Properties 1-3 belong to agent 7, 4 is free and 5 belongs to agent 8.
async fn properties_screen(harness: &TestHarness) -> ListScreen<Property> {
    harness.transport.reply_json(
        HttpMethod::Get,
        PROPERTIES,
        200,
        &json!({"properties": [
            {"id": 1, "title": "Villa Azul", "agent": 7},
            {"id": 2, "title": "Casa Sol", "agent": 7},
            {"id": 3, "title": "Olive Grove", "agent": 7},
            {"id": 4, "title": "Sea Cliff", "agent": null},
            {"id": 5, "title": "Pine Lodge", "agent": 8}
        ]}),
    );
    let screen: ListScreen<Property> = harness.screen();
    screen.load().await;
    screen
}

fn patch_count(harness: &TestHarness, id: u64) -> usize {
    harness
        .transport
        .requests_to(HttpMethod::Patch, &property_path(id))
        .len()
}

#[tokio::test]
async fn selection_change_sends_one_patch_per_difference() {
    let harness = TestHarness::new();
    let screen = properties_screen(&harness).await;
    for id in [1, 4] {
        harness
            .transport
            .reply_json(HttpMethod::Patch, &property_path(id), 200, &json!({"id": id}));
    }
    assert_eq!(
        screen.assigned_to(AGENT).await.into_iter().collect::<Vec<_>>(),
        vec![ItemId(1), ItemId(2), ItemId(3)]
    );

    let report = screen
        .save_assignments(AGENT, [ItemId(2), ItemId(3), ItemId(4)])
        .await;

    assert_eq!(report.assigned, vec![ItemId(4)]);
    assert_eq!(report.unassigned, vec![ItemId(1)]);
    assert!(report.is_complete());

    let assign: Vec<Value> = harness
        .transport
        .json_bodies(HttpMethod::Patch, &property_path(4));
    let unassign: Vec<Value> = harness
        .transport
        .json_bodies(HttpMethod::Patch, &property_path(1));
    assert_eq!(assign, vec![json!({"agent": 7})]);
    assert_eq!(unassign, vec![json!({"agent": null})]);
    for untouched in [2, 3, 5] {
        assert_eq!(patch_count(&harness, untouched), 0);
    }

    // The list is always fetched again afterwards.
    assert_eq!(harness.transport.requests_to(HttpMethod::Get, PROPERTIES).len(), 2);
    assert_eq!(
        harness.notifier.notices(),
        vec![Notice::success("Properties: 1 assigned, 1 unassigned")]
    );
}

#[tokio::test]
async fn one_failure_does_not_stop_the_others() {
    let harness = TestHarness::new();
    let screen = properties_screen(&harness).await;
    harness.transport.reply_json(
        HttpMethod::Patch,
        &property_path(1),
        400,
        &json!({"agent": ["Property has active bookings."]}),
    );
    harness
        .transport
        .reply_json(HttpMethod::Patch, &property_path(4), 200, &json!({"id": 4}));

    let report = screen
        .save_assignments(AGENT, [ItemId(2), ItemId(3), ItemId(4)])
        .await;

    assert_eq!(report.assigned, vec![ItemId(4)]);
    assert!(report.unassigned.is_empty());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].property, ItemId(1));
    assert_eq!(
        harness.notifier.notices(),
        vec![Notice::failed(
            "Properties: 1 assigned, 1 failed. agent: Property has active bookings."
        )]
    );
    assert!(harness.navigator.redirects().is_empty());
}

#[tokio::test]
async fn unsupported_media_type_retries_as_form_data() {
    let harness = TestHarness::new();
    let screen = properties_screen(&harness).await;
    for id in [1, 4] {
        let path = property_path(id);
        harness
            .transport
            .reply_json(HttpMethod::Patch, &path, 415, &json!({"detail": "Unsupported"}));
        harness
            .transport
            .reply_json(HttpMethod::Patch, &path, 200, &json!({"id": id}));
    }

    let report = screen
        .save_assignments(AGENT, [ItemId(2), ItemId(3), ItemId(4)])
        .await;
    assert!(report.is_complete());

    for (id, expected) in [(4, "7"), (1, "")] {
        let sent = harness
            .transport
            .requests_to(HttpMethod::Patch, &property_path(id));
        assert_eq!(sent.len(), 2, "property {id}");
        assert!(matches!(sent[0].body(), Some(RequestBody::Json(_))));
        match sent[1].body() {
            Some(RequestBody::Multipart(fields)) => {
                assert_eq!(fields[0].name, "agent");
                assert_eq!(fields[0].value, expected);
            }
            other => panic!("expected form data for property {id}, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn rejected_session_redirects_once_for_the_batch() {
    let harness = TestHarness::new();
    let screen = properties_screen(&harness).await;
    for id in [1, 4] {
        harness.transport.reply_json(
            HttpMethod::Patch,
            &property_path(id),
            401,
            &json!({"detail": "Authentication credentials were not provided."}),
        );
    }

    let report = screen
        .save_assignments(AGENT, [ItemId(2), ItemId(3), ItemId(4)])
        .await;

    assert!(report.requires_login());
    assert_eq!(report.failures.len(), 2);
    assert_eq!(
        harness.navigator.redirects(),
        vec!["/login?next=%2Fadmin%2Fproperties".to_string()]
    );
    assert_eq!(harness.transport.requests_to(HttpMethod::Get, PROPERTIES).len(), 1);
    assert!(harness.notifier.successes().is_empty());
}

#[tokio::test]
async fn unchanged_selection_sends_nothing() {
    let harness = TestHarness::new();
    let screen = properties_screen(&harness).await;

    let report = screen
        .save_assignments(AGENT, [ItemId(3), ItemId(1), ItemId(2)])
        .await;

    assert!(report.assigned.is_empty() && report.unassigned.is_empty());
    assert_eq!(harness.transport.request_count(), 1);
    assert_eq!(harness.notifier.successes(), vec!["No changes".to_string()]);
}
