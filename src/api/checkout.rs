use axum::{extract::State, Json};

use super::{ApiError, AppState, CurrentUser};
use crate::services::CheckoutSnapshot;

pub(super) async fn summary(State(s): State<AppState>, CurrentUser(user): CurrentUser) -> Result<Json<CheckoutSnapshot>, ApiError> {
    Ok(Json(s.checkout.snapshot(&user).await?))
}

pub(super) async fn complete(State(s): State<AppState>, CurrentUser(user): CurrentUser) -> Result<Json<CheckoutSnapshot>, ApiError> {
    Ok(Json(s.checkout.complete(&user).await?))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use rust_decimal::Decimal;
    use serde_json::json;

    use crate::api::tests::TestApp;
    use crate::domain::aggregates::Product;

    #[tokio::test]
    async fn test_checkout_flow() {
        let app = TestApp::new();
        let product = Product::create("Cap", Decimal::new(40, 0)).with_variant("red", &[("OS", 3)]);
        app.catalog.upsert(product.clone()).await;
        let body = json!({"productId": product.id, "color": "red", "size": "OS", "quantity": 2});
        app.send(Method::POST, "/api/v1/cart/items", Some("u1"), Some(body)).await;

        let (status, summary) = app.send(Method::GET, "/api/v1/checkout/summary", Some("u1"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["total"], "80");

        let (status, _) = app.send(Method::POST, "/api/v1/checkout/complete", Some("u1"), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, error) = app.send(Method::GET, "/api/v1/checkout/summary", Some("u1"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["error"]["message"], "Cart is empty");
    }
}
