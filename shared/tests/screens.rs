use chrono::NaiveDate;
use secrecy::SecretString;
use serde_json::{json, Value};
use villa_core::capabilities::HttpMethod;
use villa_core::screens::{AgentUpdate, AnalyticsScreen, DateRange, NewAgent, NewFaq};
use villa_core::testing::TestHarness;
use villa_core::{
    Agent, Booking, Dashboard, ErrorKind, Faq, ItemId, ListScreen, LoadStatus, MutationOutcome,
    Notice,
};

fn agents_screen(harness: &TestHarness) -> ListScreen<Agent> {
    harness.transport.reply_json(
        HttpMethod::Get,
        "/agents/",
        200,
        &json!([
            {"id": 3, "username": "mkeller", "email": "maya@villas.example",
             "first_name": "Maya", "last_name": "Keller", "is_active": true}
        ]),
    );
    harness.screen()
}

#[tokio::test]
async fn unknown_list_envelope_fails_loudly() {
    let harness = TestHarness::new();
    harness
        .transport
        .reply_json(HttpMethod::Get, "/villas/bookings/", 200, &json!({"data": []}));
    let screen: ListScreen<Booking> = harness.screen();

    let status = screen.load().await;

    assert!(matches!(status, LoadStatus::Failed(_)));
    assert!(screen.view().await.is_empty());
    assert_eq!(
        harness.notifier.notices(),
        vec![Notice::failed("The server sent a response we could not read.")]
    );
}

#[tokio::test]
async fn network_failure_on_load_leaves_screen_interactive() {
    let harness = TestHarness::new();
    let screen: ListScreen<Faq> = harness.screen();

    // Nothing scripted: the transport reports a connection error.
    let status = screen.load().await;

    assert_eq!(
        status,
        LoadStatus::Failed(
            "Unable to reach the server. Please check your connection and try again.".into()
        )
    );
    harness
        .transport
        .reply_json(HttpMethod::Get, "/api/faqs/", 200, &json!([{"id": 1}]));
    assert_eq!(screen.load().await, LoadStatus::Ready);
    assert_eq!(screen.items().await.len(), 1);
}

#[tokio::test]
async fn creating_faq_appends_server_record() {
    let harness = TestHarness::new();
    harness
        .transport
        .reply_json(HttpMethod::Get, "/api/faqs/", 200, &json!({"faqs": []}));
    harness.transport.reply_json(
        HttpMethod::Post,
        "/api/faqs/",
        201,
        &json!({"id": 12, "question": "Is there a pool?", "answer": "Yes, heated."}),
    );
    let screen: ListScreen<Faq> = harness.screen();
    screen.load().await;

    let outcome = screen
        .create(NewFaq::new("  Is there a pool? ", "Yes, heated."))
        .await;

    assert_eq!(outcome, MutationOutcome::Committed);
    assert_eq!(screen.items().await[0].id, ItemId(12));
    let sent: Vec<Value> = harness.transport.json_bodies(HttpMethod::Post, "/api/faqs/");
    assert_eq!(
        sent,
        vec![json!({"question": "Is there a pool?", "answer": "Yes, heated."})]
    );
    assert_eq!(harness.notifier.successes(), vec!["FAQ added".to_string()]);
}

#[tokio::test]
async fn faq_created_without_body_reports_once_when_reload_fails() {
    let harness = TestHarness::new();
    harness
        .transport
        .reply_json(HttpMethod::Get, "/api/faqs/", 200, &json!([]));
    harness
        .transport
        .reply_json(HttpMethod::Get, "/api/faqs/", 502, &json!({"detail": "Bad gateway"}));
    harness
        .transport
        .reply_raw(HttpMethod::Post, "/api/faqs/", 201, b"");
    let screen: ListScreen<Faq> = harness.screen();
    assert_eq!(screen.load().await, LoadStatus::Ready);

    let outcome = screen.create(NewFaq::new("Late checkout?", "Until noon.")).await;

    assert_eq!(outcome, MutationOutcome::Committed);
    assert_eq!(
        harness.notifier.notices(),
        vec![Notice::success("FAQ added. Reload the list to see it.")]
    );
    assert_eq!(screen.status().await, LoadStatus::Ready);
    assert_eq!(harness.transport.requests_to(HttpMethod::Get, "/api/faqs/").len(), 2);
}

#[tokio::test]
async fn faq_created_without_body_is_picked_up_by_reload() {
    let harness = TestHarness::new();
    harness
        .transport
        .reply_json(HttpMethod::Get, "/api/faqs/", 200, &json!([]));
    harness.transport.reply_json(
        HttpMethod::Get,
        "/api/faqs/",
        200,
        &json!([{"id": 5, "question": "Late checkout?", "answer": "Until noon."}]),
    );
    harness
        .transport
        .reply_raw(HttpMethod::Post, "/api/faqs/", 201, b"");
    let screen: ListScreen<Faq> = harness.screen();
    screen.load().await;

    screen.create(NewFaq::new("Late checkout?", "Until noon.")).await;

    assert_eq!(screen.items().await[0].id, ItemId(5));
    assert_eq!(harness.notifier.successes(), vec!["FAQ added".to_string()]);
}

#[tokio::test]
async fn blank_faq_is_rejected_locally() {
    let harness = TestHarness::new();
    let screen: ListScreen<Faq> = harness.screen();

    let outcome = screen.create(NewFaq::new("   ", "answer")).await;

    assert!(matches!(outcome, MutationOutcome::Failed(ref e) if e.kind == ErrorKind::Validation));
    assert_eq!(harness.transport.request_count(), 0);
    assert_eq!(
        harness.notifier.notices(),
        vec![Notice::failed("Question is required.")]
    );
}

#[tokio::test]
async fn agent_lifecycle_uses_admin_user_endpoints() {
    let harness = TestHarness::new();
    let screen = agents_screen(&harness);
    assert_eq!(screen.load().await, LoadStatus::Ready);

    harness.transport.reply_json(
        HttpMethod::Post,
        "/admin/users/",
        201,
        &json!({"id": 9, "username": "jdoe", "email": "j@villas.example", "is_active": true}),
    );
    let outcome = screen
        .create(NewAgent {
            username: "jdoe".into(),
            email: "j@villas.example".into(),
            first_name: String::new(),
            last_name: String::new(),
            phone: String::new(),
            password: SecretString::new("correct horse".into()),
        })
        .await;
    assert_eq!(outcome, MutationOutcome::Committed);
    assert_eq!(screen.items().await.len(), 2);

    harness.transport.reply_json(
        HttpMethod::Patch,
        "/admin/users/3/",
        200,
        &json!({"id": 3, "is_active": false}),
    );
    let outcome = screen.set_active(ItemId(3), false).await.unwrap();
    assert_eq!(outcome, MutationOutcome::Committed);
    assert_eq!(harness.confirmer.prompts()[0].title, "Deactivate agent?");
    assert_eq!(screen.active_agents().await.len(), 1);

    let mut update = AgentUpdate::from_agent(&screen.get(ItemId(3)).await.unwrap());
    update.phone = "+34 600 000 000".into();
    harness.transport.reply_json(
        HttpMethod::Put,
        "/admin/users/3/",
        200,
        &json!({"id": 3, "phone": "+34 600 000 000"}),
    );
    let outcome = screen.update(ItemId(3), update).await.unwrap();
    assert_eq!(outcome, MutationOutcome::Committed);
    assert_eq!(screen.get(ItemId(3)).await.unwrap().phone, "+34 600 000 000");

    harness
        .transport
        .reply_raw(HttpMethod::Delete, "/admin/users/9/", 204, b"");
    assert_eq!(
        screen.delete(ItemId(9)).await.unwrap(),
        MutationOutcome::Committed
    );
    assert_eq!(
        harness
            .notifier
            .successes(),
        vec![
            "Agent created".to_string(),
            "Agent deactivated".to_string(),
            "Agent updated".to_string(),
            "Agent deleted".to_string(),
        ]
    );
}

#[tokio::test]
async fn analytics_fetch_sends_date_range() {
    let harness = TestHarness::new();
    harness.transport.reply_json(
        HttpMethod::Get,
        "/villas/analytics/",
        200,
        &json!({"total_bookings": 4, "total_revenue": 12500.0,
                "bookings_by_status": {"approved": 2, "pending": 2}}),
    );
    let screen = AnalyticsScreen::new(harness.config.clone(), harness.capabilities());
    let range = DateRange::new(
        NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
        NaiveDate::from_ymd_opt(2026, 6, 30).unwrap(),
    )
    .unwrap();

    assert_eq!(screen.fetch(range).await, LoadStatus::Ready);

    let summary = screen.summary().await.unwrap();
    assert_eq!(summary.total_bookings, 4);
    assert_eq!(summary.bookings_with_status("approved"), 2);
    let sent = harness.transport.requests();
    assert_eq!(
        sent[0].url().as_str(),
        "http://localhost:8000/villas/analytics/?start_date=2026-06-01&end_date=2026-06-30"
    );
}

#[tokio::test]
async fn dashboard_loads_every_list() {
    let harness = TestHarness::new();
    for path in [
        "/villas/bookings/",
        "/agents/",
        "/api/faqs/",
        "/villas/reviews/",
        "/villas/properties/",
    ] {
        harness.transport.reply_json(HttpMethod::Get, path, 200, &json!([]));
    }
    let dashboard = Dashboard::new(harness.config.clone(), harness.capabilities()).unwrap();

    let statuses = dashboard.load_lists().await;

    assert!(statuses.iter().all(LoadStatus::is_ready));
    assert_eq!(harness.transport.request_count(), 5);
    dashboard.shutdown();
    assert!(dashboard.is_shut_down());
    assert_eq!(dashboard.faqs.load().await, LoadStatus::Idle);
}
