use crate::infra::{deserialize_optional_date, AppState};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use chrono::{NaiveDate, Utc};
use moveleads::marketplace::pricing::quote_with_rule;
use moveleads::marketplace::{
    marketplace_router, DistanceBand, Marketplace, MarketplaceStore, NotificationSink,
    PricingRule, PropertySize,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub(crate) struct QuoteRequest {
    pub(crate) from_postcode: String,
    pub(crate) to_postcode: String,
    pub(crate) property_size: PropertySize,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub(crate) move_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub(crate) today: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuoteResponse {
    pub(crate) price: Decimal,
    pub(crate) distance_band: DistanceBand,
    pub(crate) short_notice: bool,
    pub(crate) today: NaiveDate,
}

pub(crate) fn with_marketplace_routes<S, N>(marketplace: Arc<Marketplace<S, N>>) -> axum::Router
where
    S: MarketplaceStore + 'static,
    N: NotificationSink + 'static,
{
    marketplace_router(marketplace)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route("/api/v1/quote", axum::routing::post(quote_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Price an arbitrary move under the built-in rule. Stores nothing.
pub(crate) async fn quote_endpoint(Json(payload): Json<QuoteRequest>) -> Json<QuoteResponse> {
    let QuoteRequest {
        from_postcode,
        to_postcode,
        property_size,
        move_date,
        today,
    } = payload;

    let today = today.unwrap_or_else(|| Utc::now().date_naive());
    let quote = quote_with_rule(
        &PricingRule::fallback(),
        &from_postcode,
        &to_postcode,
        property_size,
        move_date,
        today,
    );

    Json(QuoteResponse {
        price: quote.price,
        distance_band: quote.distance_band,
        short_notice: quote.short_notice,
        today,
    })
}
