//! HTTP API tests for the misfit feed and reconciliation endpoints.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

use common::{fixtures, TestFixture};
use misfits_core::{LedgerStore, TicketStatus};

// ============================================================================
// Feed
// ============================================================================

#[tokio::test]
async fn test_feed_lists_misfits_with_suggestions() {
    let fixture = TestFixture::new().await;
    fixture
        .ledger
        .insert_transaction(&fixtures::shipment_credit("tx-1", "SHIP123", dec!(-50.00)))
        .unwrap();
    fixture
        .ledger
        .insert_ticket(&fixtures::shipment_ticket("tk-1", "SHIP123", dec!(0)))
        .unwrap();

    let response = fixture.get("/api/v1/misfits").await;
    assert_status!(response, StatusCode::OK);

    let body = &response.body;
    assert_eq!(body["totalCount"], 1);
    assert_eq!(body["data"][0]["id"], "tx-1");
    assert_eq!(body["data"][0]["missingBrand"], true);
    assert_eq!(body["data"][0]["missingTicket"], true);
    assert_eq!(body["data"][0]["missingShipment"], false);
    assert_eq!(body["availableTickets"].as_array().unwrap().len(), 1);

    let suggestion = &body["suggestions"]["tx-1"];
    assert_eq!(suggestion["ticket"]["id"], "tk-1");
    assert_eq!(suggestion["confidence"], "exact");
    assert_eq!(suggestion["reason"], "Same shipment ID");
}

#[tokio::test]
async fn test_feed_filters_and_pagination() {
    let fixture = TestFixture::new().await;
    for i in 0..5 {
        fixture
            .ledger
            .insert_transaction(&fixtures::credit(&format!("tx-{}", i), dec!(-10.00)))
            .unwrap();
    }
    fixture
        .ledger
        .insert_transaction(&fixtures::charge(
            "fee-1",
            misfits_core::FeeType::parse("Storage"),
            dec!(4.00),
        ))
        .unwrap();

    let response = fixture.get("/api/v1/misfits?limit=2&offset=1").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["totalCount"], 6);
    assert_eq!(response.body["data"].as_array().unwrap().len(), 2);

    let response = fixture.get("/api/v1/misfits?feeType=Credit").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["totalCount"], 5);

    let response = fixture.get("/api/v1/misfits?search=tx-3").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["totalCount"], 1);
    assert_eq!(response.body["data"][0]["id"], "tx-3");
}

#[tokio::test]
async fn test_feed_rejects_unknown_type() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/misfits?type=everything").await;
    assert_status!(response, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.body["error"].is_string());
}

// ============================================================================
// Single reconcile calls
// ============================================================================

#[tokio::test]
async fn test_connect_ticket_resolves_gaps() {
    let fixture = TestFixture::new().await;
    fixture
        .ledger
        .insert_transaction(&fixtures::credit("tx-1", dec!(-25.00)))
        .unwrap();
    let mut ticket = fixtures::brand_ticket("tk-1", "brandA", dec!(25.00));
    ticket.shipment_id = Some("SHIP9".to_string());
    fixture.ledger.insert_ticket(&ticket).unwrap();

    let response = fixture
        .post(
            "/api/v1/misfits/reconcile",
            json!({ "transactionId": "tx-1", "action": "connect_ticket", "ticketId": "tk-1" }),
        )
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(
        response.body["resolved"],
        json!({ "brand": true, "shipment": true, "ticket": true })
    );

    let stored = fixture
        .ledger
        .get_transaction("tx-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.care_ticket_id.as_deref(), Some("tk-1"));
    assert_eq!(stored.client_id(), Some("brandA"));

    let feed = fixture.get("/api/v1/misfits").await;
    assert_eq!(feed.body["totalCount"], 0);
}

#[tokio::test]
async fn test_connect_claimed_ticket_conflicts() {
    let fixture = TestFixture::new().await;
    fixture
        .ledger
        .insert_transaction(&fixtures::credit("tx-1", dec!(-25.00)))
        .unwrap();
    fixture
        .ledger
        .insert_transaction(&fixtures::credit("tx-2", dec!(-25.00)))
        .unwrap();
    fixture
        .ledger
        .insert_ticket(&fixtures::ticket("tk-1", dec!(25.00)))
        .unwrap();

    let first = fixture
        .post(
            "/api/v1/misfits/reconcile",
            json!({ "transactionId": "tx-1", "action": "connect_ticket", "ticketId": "tk-1" }),
        )
        .await;
    assert_status!(first, StatusCode::OK);

    let second = fixture
        .post(
            "/api/v1/misfits/reconcile",
            json!({ "transactionId": "tx-2", "action": "connect_ticket", "ticketId": "tk-1" }),
        )
        .await;
    assert_status!(second, StatusCode::CONFLICT);
    assert!(second.body["error"]
        .as_str()
        .unwrap()
        .contains("already claimed"));

    let untouched = fixture
        .ledger
        .get_transaction("tx-2")
        .await
        .unwrap()
        .unwrap();
    assert!(untouched.care_ticket_id.is_none());
}

#[tokio::test]
async fn test_reconcile_unknown_transaction_is_not_found() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/misfits/reconcile",
            json!({ "transactionId": "missing", "action": "set_brand", "clientId": "brandA" }),
        )
        .await;
    assert_status!(response, StatusCode::NOT_FOUND);
    assert!(response.body["error"].is_string());
}

#[tokio::test]
async fn test_reconcile_malformed_body_is_unprocessable() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post_raw("/api/v1/misfits/reconcile", "{ not json")
        .await;
    assert_status!(response, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.body["error"].is_string());

    let response = fixture
        .post(
            "/api/v1/misfits/reconcile",
            json!({ "transactionId": "tx-1", "action": "merge" }),
        )
        .await;
    assert_status!(response, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_create_ticket_from_credit() {
    let fixture = TestFixture::new().await;
    fixture
        .ledger
        .insert_transaction(&fixtures::brand_credit("tx-1", "brandA", dec!(-40.00)))
        .unwrap();

    let response = fixture
        .post(
            "/api/v1/misfits/reconcile",
            json!({
                "transactionId": "tx-1",
                "action": "create_ticket",
                "shipmentId": "SHIP77",
                "description": "Damaged in transit"
            }),
        )
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["ticketNumber"], "CT-000001");
    assert_eq!(response.body["autoResolved"], false);
    assert_eq!(response.body["resolved"]["ticket"], true);
    assert_eq!(response.body["resolved"]["shipment"], true);

    let ticket_id = response.body["ticketId"].as_str().unwrap();
    let ticket = fixture
        .ledger
        .get_ticket(ticket_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ticket.credit_amount, dec!(40.00));
    assert_eq!(ticket.client_id.as_deref(), Some("brandA"));
    assert_eq!(ticket.shipment_id.as_deref(), Some("SHIP77"));
    assert_eq!(ticket.status, TicketStatus::Open);
}

#[tokio::test]
async fn test_ticket_actions_on_non_credit_are_unprocessable() {
    let fixture = TestFixture::new().await;
    fixture
        .ledger
        .insert_transaction(&fixtures::charge(
            "fee-1",
            misfits_core::FeeType::Shipping,
            dec!(12.00),
        ))
        .unwrap();

    let response = fixture
        .post(
            "/api/v1/misfits/reconcile",
            json!({ "transactionId": "fee-1", "action": "create_ticket" }),
        )
        .await;
    assert_status!(response, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.body["error"].as_str().unwrap().contains("not a credit"));
}

#[tokio::test]
async fn test_set_brand_and_parent_confirmation() {
    let fixture = TestFixture::new().await;
    fixture
        .ledger
        .insert_transaction(&fixtures::credit("tx-1", dec!(-10.00)))
        .unwrap();
    fixture
        .ledger
        .insert_transaction(&fixtures::credit("tx-2", dec!(-10.00)))
        .unwrap();

    let response = fixture
        .post(
            "/api/v1/misfits/reconcile",
            json!({ "transactionId": "tx-1", "action": "set_brand", "clientId": "brandB" }),
        )
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(
        response.body["resolved"],
        json!({ "brand": true, "shipment": false, "ticket": false })
    );

    let unknown = fixture
        .post(
            "/api/v1/misfits/reconcile",
            json!({ "transactionId": "tx-2", "action": "set_brand", "clientId": "brandZ" }),
        )
        .await;
    assert_status!(unknown, StatusCode::UNPROCESSABLE_ENTITY);

    let unconfirmed = fixture
        .post(
            "/api/v1/misfits/reconcile",
            json!({ "transactionId": "tx-2", "action": "set_brand", "parentAbsorbed": true }),
        )
        .await;
    assert_status!(unconfirmed, StatusCode::UNPROCESSABLE_ENTITY);

    let confirmed = fixture
        .post(
            "/api/v1/misfits/reconcile",
            json!({
                "transactionId": "tx-2",
                "action": "set_brand",
                "parentAbsorbed": true,
                "confirmed": true
            }),
        )
        .await;
    assert_status!(confirmed, StatusCode::OK);

    let stored = fixture
        .ledger
        .get_transaction("tx-2")
        .await
        .unwrap()
        .unwrap();
    assert!(stored
        .attribution
        .as_ref()
        .is_some_and(|a| a.is_parent_absorbed()));
}

// ============================================================================
// Dispute and bulk
// ============================================================================

#[tokio::test]
async fn test_dispute_removes_from_feed_and_blocks_actions() {
    let fixture = TestFixture::new().await;
    fixture
        .ledger
        .insert_transaction(&fixtures::credit("tx-1", dec!(-10.00)))
        .unwrap();

    let response = fixture.post_empty("/api/v1/misfits/tx-1/dispute").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(
        response.body,
        json!({ "transactionId": "tx-1", "disputed": true })
    );

    let feed = fixture.get("/api/v1/misfits").await;
    assert_eq!(feed.body["totalCount"], 0);

    let blocked = fixture
        .post(
            "/api/v1/misfits/reconcile",
            json!({ "transactionId": "tx-1", "action": "set_brand", "clientId": "brandA" }),
        )
        .await;
    assert_status!(blocked, StatusCode::CONFLICT);

    let missing = fixture.post_empty("/api/v1/misfits/nope/dispute").await;
    assert_status!(missing, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bulk_attribute_reports_per_item() {
    let fixture = TestFixture::new().await;
    fixture
        .ledger
        .insert_transaction(&fixtures::credit("tx-1", dec!(-10.00)))
        .unwrap();
    fixture
        .ledger
        .insert_transaction(&fixtures::credit("tx-2", dec!(-10.00)))
        .unwrap();

    let response = fixture
        .post(
            "/api/v1/misfits/bulk",
            json!({
                "action": "attribute",
                "clientId": "brandA",
                "transactionIds": ["tx-1", "missing", "tx-2", "tx-1"]
            }),
        )
        .await;
    assert_status!(response, StatusCode::OK);

    let body = &response.body;
    assert_eq!(body["succeeded"], 2);
    assert_eq!(body["failed"], 1);

    let ids: Vec<&str> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["tx-1", "missing", "tx-2"]);
    assert_eq!(body["items"][1]["ok"], false);
    assert_eq!(body["items"][1]["kind"], "not_found");
}

#[tokio::test]
async fn test_bulk_unconfirmed_parent_fails_every_item() {
    let fixture = TestFixture::new().await;
    fixture
        .ledger
        .insert_transaction(&fixtures::credit("tx-1", dec!(-10.00)))
        .unwrap();

    let response = fixture
        .post(
            "/api/v1/misfits/bulk",
            json!({ "action": "attribute", "parentAbsorbed": true, "transactionIds": ["tx-1"] }),
        )
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["failed"], 1);
    assert_eq!(response.body["items"][0]["kind"], "validation");

    let stored = fixture
        .ledger
        .get_transaction("tx-1")
        .await
        .unwrap()
        .unwrap();
    assert!(stored.attribution.is_none());
}

#[tokio::test]
async fn test_bulk_dispute() {
    let fixture = TestFixture::new().await;
    for id in ["tx-1", "tx-2", "tx-3"] {
        fixture
            .ledger
            .insert_transaction(&fixtures::credit(id, dec!(-10.00)))
            .unwrap();
    }

    let response = fixture
        .post(
            "/api/v1/misfits/bulk",
            json!({ "action": "dispute", "transactionIds": ["tx-1", "tx-3"] }),
        )
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["succeeded"], 2);

    let feed = fixture.get("/api/v1/misfits").await;
    assert_eq!(feed.body["totalCount"], 1);
    assert_eq!(feed.body["data"][0]["id"], "tx-2");
}

#[tokio::test]
async fn test_bulk_rejects_oversized_selection() {
    let fixture = TestFixture::new().await;
    let ids: Vec<String> = (0..1001).map(|i| format!("tx-{}", i)).collect();

    let response = fixture
        .post(
            "/api/v1/misfits/bulk",
            json!({ "action": "dispute", "transactionIds": ids }),
        )
        .await;
    assert_status!(response, StatusCode::UNPROCESSABLE_ENTITY);
}

// ============================================================================
// Brands, audit, metrics
// ============================================================================

#[tokio::test]
async fn test_brands_include_parent_bucket() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/brands").await;
    assert_status!(response, StatusCode::OK);

    let brands = response.body.as_array().unwrap();
    assert_eq!(brands.len(), 3);
    assert_eq!(brands[0]["id"], "brandA");
    assert_eq!(brands[0]["parentAbsorbed"], false);

    let parent = brands.last().unwrap();
    assert_eq!(parent["id"], Value::Null);
    assert_eq!(parent["parentAbsorbed"], true);
}

#[tokio::test]
async fn test_audit_records_reconcile_actions() {
    let fixture = TestFixture::new().await;
    fixture
        .ledger
        .insert_transaction(&fixtures::credit("tx-1", dec!(-10.00)))
        .unwrap();
    fixture
        .ledger
        .insert_transaction(&fixtures::credit("tx-2", dec!(-10.00)))
        .unwrap();

    fixture
        .post(
            "/api/v1/misfits/reconcile",
            json!({ "transactionId": "tx-1", "action": "set_brand", "clientId": "brandA" }),
        )
        .await;
    fixture
        .post(
            "/api/v1/misfits/reconcile",
            json!({ "transactionId": "tx-2", "action": "connect_ticket", "ticketId": "nope" }),
        )
        .await;

    // The writer persists events in the background
    let mut events = Value::Null;
    for _ in 0..40 {
        let response = fixture.get("/api/v1/audit?transaction_id=tx-1").await;
        assert_status!(response, StatusCode::OK);
        if response.body["total"] == 1 {
            events = response.body["events"].clone();
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert_eq!(events[0]["event_type"], "brand_attributed");
    assert_eq!(events[0]["data"]["client_id"], "brandA");

    let mut failed = Value::Null;
    for _ in 0..40 {
        let response = fixture
            .get("/api/v1/audit?event_type=reconcile_failed")
            .await;
        if response.body["total"] == 1 {
            failed = response.body["events"][0].clone();
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert_eq!(failed["transaction_id"], "tx-2");
    assert_eq!(failed["data"]["kind"], "not_found");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new().await;
    fixture.get("/api/v1/health").await;

    let (status, text) = fixture.get_text("/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("misfits_http_requests_total"));
}
