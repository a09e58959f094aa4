use super::common::*;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::marketplace::domain::{Company, LeadAssignment};
use crate::marketplace::memory::InMemoryMarketplaceStore;
use crate::marketplace::notifications::RecordingSink;
use crate::marketplace::router::{self, marketplace_router, CLIENT_KEY_HEADER};

fn json_request(method: &str, uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(CLIENT_KEY_HEADER, "203.0.113.7")
        .body(Body::from(payload.to_string()))
        .expect("request builds")
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}

fn reveal_uri(company: &Company, assignment: &LeadAssignment) -> String {
    format!(
        "/api/v1/companies/{}/assignments/{}/reveal",
        company.id, assignment.id
    )
}

struct Fixture {
    store: Arc<InMemoryMarketplaceStore>,
    router: Router,
    company: Company,
    assignment: LeadAssignment,
}

fn fixture(balance: u32) -> Fixture {
    let store = Arc::new(InMemoryMarketplaceStore::new());
    let company = approved_company(store.as_ref(), "Swift Removals", &["SW1A"]);
    let lead = stored_lead(store.as_ref(), local_studio());
    let assignment = assignment(store.as_ref(), &lead, &company);
    if balance > 0 {
        fund(&store, &company, balance);
    }
    let (marketplace, _) = marketplace(store.clone());
    Fixture {
        store,
        router: marketplace_router(marketplace),
        company,
        assignment,
    }
}

#[tokio::test]
async fn lead_submission_returns_created_with_match_count() {
    let store = Arc::new(InMemoryMarketplaceStore::new());
    approved_company(store.as_ref(), "Swift Removals", &["SW"]);
    let (marketplace, sink) = marketplace(store);

    let response = marketplace_router(marketplace)
        .oneshot(json_request(
            "POST",
            "/api/v1/leads",
            serde_json::to_value(local_studio()).expect("serializes"),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["matched"], 1);
    assert!(body["lead_id"].as_str().is_some());
    assert_eq!(sink.events().len(), 1);
}

#[tokio::test]
async fn lead_submission_is_rate_limited_per_client() {
    let store = Arc::new(InMemoryMarketplaceStore::new());
    let (marketplace, _) = marketplace(store);
    let router = marketplace_router(marketplace);
    let payload = serde_json::to_value(local_studio()).expect("serializes");

    for _ in 0..5 {
        let response = router
            .clone()
            .oneshot(json_request("POST", "/api/v1/leads", payload.clone()))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = router
        .oneshot(json_request("POST", "/api/v1/leads", payload))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = json_body(response).await;
    assert!(body["retry_after_secs"].as_u64().is_some());
}

#[tokio::test]
async fn reveal_route_returns_contact() {
    let Fixture {
        router,
        company,
        assignment,
        ..
    } = fixture(20);

    let response = router
        .oneshot(json_request(
            "POST",
            &reveal_uri(&company, &assignment),
            json!({ "lead_id": assignment.lead_id }),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["contact"]["email"], "jo.bloggs@example.com");
    assert_eq!(body["charged"], true);
    assert_eq!(body["price"], "5.00");
}

#[tokio::test]
async fn reveal_route_reports_payment_required() {
    let Fixture {
        router,
        company,
        assignment,
        ..
    } = fixture(2);

    let response = router
        .oneshot(json_request(
            "POST",
            &reveal_uri(&company, &assignment),
            json!({ "lead_id": assignment.lead_id }),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body = json_body(response).await;
    assert_eq!(body["required"], "5.00");
    assert_eq!(body["balance"], "2");
}

#[tokio::test]
async fn reveal_handler_reports_refunded_failure_as_conflict() {
    let store = Arc::new(FaultyStore::failing_mark_revealed());
    let company = approved_company(store.as_ref(), "Swift Removals", &["SW1A"]);
    let lead = stored_lead(store.as_ref(), local_studio());
    let assignment = assignment(store.as_ref(), &lead, &company);
    fund(&store, &company, 20);
    let (marketplace, _) = marketplace(store.clone());

    let response = router::reveal_handler::<FaultyStore, RecordingSink>(
        State(marketplace),
        Path((company.id.0.clone(), assignment.id.0.clone())),
        axum::Json(serde_json::from_value(json!({ "lead_id": lead.id })).expect("body")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = json_body(response).await;
    assert_eq!(body["refunded"], true);
    assert_eq!(balance_of(store.as_ref(), &company), credits(20));
}

#[tokio::test]
async fn reveal_route_hides_other_companies_assignments() {
    let Fixture {
        store,
        router,
        assignment,
        ..
    } = fixture(20);
    let rival = approved_company(store.as_ref(), "Rival Removals", &["SW"]);

    let response = router
        .oneshot(json_request(
            "POST",
            &reveal_uri(&rival, &assignment),
            json!({ "lead_id": assignment.lead_id }),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn assignment_patch_requires_reveal_first() {
    let Fixture {
        router,
        company,
        assignment,
        ..
    } = fixture(20);

    let response = router
        .oneshot(json_request(
            "PATCH",
            &format!(
                "/api/v1/companies/{}/assignments/{}",
                company.id, assignment.id
            ),
            json!({ "status": "contacted" }),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn assignment_list_returns_company_leads() {
    let Fixture {
        router,
        company,
        assignment,
        ..
    } = fixture(0);

    let response = router
        .oneshot(get_request(&format!(
            "/api/v1/companies/{}/assignments",
            company.id
        )))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let items = body.as_array().expect("array");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], assignment.id.0);
    assert_eq!(items[0]["lead"]["from_postcode"], "SW1A 1AA");
}

#[tokio::test]
async fn checkout_webhook_replay_is_acknowledged_once() {
    let Fixture {
        store,
        router,
        company,
        ..
    } = fixture(0);
    let payload = json!({
        "company_id": company.id,
        "credits": 25,
        "session_id": "cs_live_replayed",
    });

    let first = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/payments/checkout-completed",
            payload.clone(),
        ))
        .await
        .expect("response");
    let second = router
        .oneshot(json_request(
            "POST",
            "/api/v1/payments/checkout-completed",
            payload,
        ))
        .await
        .expect("response");

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(json_body(first).await["status"], "applied");
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(
        json_body(second).await,
        json!({ "status": "already_processed" })
    );
    assert_eq!(entries_of(store.as_ref(), &company).len(), 1);
    assert_eq!(balance_of(store.as_ref(), &company), credits(25));
}

#[tokio::test]
async fn credits_route_reports_balance_and_history() {
    let Fixture {
        router, company, ..
    } = fixture(12);

    let response = router
        .oneshot(get_request(&format!(
            "/api/v1/companies/{}/credits",
            company.id
        )))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["balance"], "12");
    assert_eq!(body["low_credit_threshold"], "10");
    assert_eq!(body["entries"].as_array().expect("entries").len(), 1);
}
