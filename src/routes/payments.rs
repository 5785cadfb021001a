use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::json;

use crate::api::AppContext;
use crate::error::DemoAccessError;
use crate::models::purchase::{NewPurchase, PurchaseStatus};
use crate::models::requests::PaymentIntentRequest;

#[utoipa::path(
    post,
    path = "/api/create-payment-intent",
    tag = "Payments",
    request_body = PaymentIntentRequest,
    responses(
        (status = 200, description = "Payment intent created"),
        (status = 400, description = "App is not purchasable"),
        (status = 404, description = "No such app"),
        (status = 500, description = "Payments not configured or provider error"),
    )
)]
pub async fn create_payment_intent(
    State(context): State<AppContext>,
    Json(request): Json<PaymentIntentRequest>,
) -> Result<Json<serde_json::Value>, DemoAccessError> {
    if !context.payments.is_configured() {
        return Err(DemoAccessError::PaymentsNotConfigured);
    }

    let app = context
        .storage
        .app(&request.app_id)
        .await?
        .ok_or(DemoAccessError::AppNotFound)?;

    if !app.is_premium {
        return Err(DemoAccessError::Validation(
            "This app is not available for purchase".to_string(),
        ));
    }
    let price = app.price.as_deref().filter(|p| !p.is_empty()).ok_or_else(|| {
        DemoAccessError::Validation("This app has no price set".to_string())
    })?;
    let amount_cents = parse_price_cents(price).ok_or_else(|| {
        DemoAccessError::Internal(format!("unparseable price for app {}", app.id))
    })?;

    let customer_name = request
        .customer_name
        .as_deref()
        .unwrap_or_default()
        .trim()
        .to_string();
    let intent = context
        .payments
        .create_payment_intent(
            amount_cents,
            &app.id,
            request.customer_email.trim(),
            &customer_name,
        )
        .await?;

    context
        .storage
        .create_purchase(NewPurchase {
            app_id: app.id.clone(),
            customer_email: request.customer_email.trim().to_string(),
            customer_name: request.customer_name.clone(),
            amount: price.to_string(),
            stripe_payment_intent_id: intent.id.clone(),
        })
        .await?;

    tracing::info!("payment intent {} opened for app {}", intent.id, app.id);

    Ok(Json(json!({
        "clientSecret": intent.client_secret,
        "paymentIntentId": intent.id,
    })))
}

/// Raw-body handler: the signature covers the exact bytes Stripe sent, so
/// this must not go through `Json` extraction first.
#[utoipa::path(
    post,
    path = "/api/webhook/stripe",
    tag = "Payments",
    request_body(content = String, content_type = "application/json"),
    responses(
        (status = 200, description = "Event processed"),
        (status = 400, description = "Missing or invalid signature"),
    )
)]
pub async fn stripe_webhook(
    State(context): State<AppContext>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<serde_json::Value>), DemoAccessError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(DemoAccessError::InvalidSignature)?;

    let event = context.payments.verify_webhook(&body, signature)?;

    let new_status = match event.event_type.as_str() {
        "payment_intent.succeeded" => Some(PurchaseStatus::Completed),
        "payment_intent.payment_failed" => Some(PurchaseStatus::Failed),
        _ => None,
    };

    if let Some(status) = new_status {
        let intent_id = &event.data.object.id;
        // Stripe retries on non-2xx; an event for a purchase we never
        // opened is not worth a retry storm, so log and acknowledge.
        match context.storage.purchase_by_payment_intent(intent_id).await {
            Ok(Some(purchase)) => {
                match context
                    .storage
                    .update_purchase_status(&purchase.id, status)
                    .await
                {
                    Ok(updated) => {
                        tracing::info!(
                            "purchase {} marked {} for intent {intent_id}",
                            updated.id,
                            status.as_str()
                        );
                    }
                    Err(e) => {
                        tracing::error!("purchase update for intent {intent_id} failed: {e}");
                    }
                }
            }
            Ok(None) => {
                tracing::warn!("webhook for unknown payment intent {intent_id}");
            }
            Err(e) => {
                tracing::error!("purchase lookup for intent {intent_id} failed: {e}");
            }
        }
    }

    Ok((StatusCode::OK, Json(json!({ "received": true }))))
}

fn parse_price_cents(price: &str) -> Option<i64> {
    // Catalog prices are non-negative; a sign anywhere means a bad row.
    if price.contains('-') {
        return None;
    }
    let (dollars, cents) = match price.split_once('.') {
        Some((d, c)) => (d, c),
        None => (price, ""),
    };
    let dollars: i64 = dollars.parse().ok()?;
    let cents: i64 = match cents.len() {
        0 => 0,
        1 => cents.parse::<i64>().ok()? * 10,
        2 => cents.parse().ok()?,
        _ => return None,
    };
    if cents >= 100 {
        return None;
    }
    Some(dollars * 100 + cents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prices_convert_to_cents() {
        assert_eq!(parse_price_cents("49.99"), Some(4999));
        assert_eq!(parse_price_cents("79.9"), Some(7990));
        assert_eq!(parse_price_cents("150000.00"), Some(15_000_000));
        assert_eq!(parse_price_cents("10"), Some(1000));
        assert_eq!(parse_price_cents("0.00"), Some(0));
    }

    #[test]
    fn malformed_prices_are_rejected() {
        assert_eq!(parse_price_cents("49.999"), None);
        assert_eq!(parse_price_cents("-5.00"), None);
        assert_eq!(parse_price_cents("-0.50"), None);
        assert_eq!(parse_price_cents("0.-5"), None);
        assert_eq!(parse_price_cents("abc"), None);
        assert_eq!(parse_price_cents(""), None);
    }
}
