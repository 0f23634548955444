use axum::http::StatusCode;

use crate::common::{app, lazy_state};

#[tokio::test]
async fn test_health_is_ok_without_database() {
    let client = app(lazy_state());

    let response = client.get("/health").await;

    response.assert_status(StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_route_falls_back_to_404() {
    let client = app(lazy_state());

    let response = client.get("/calendars/unknown").await;

    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.text(), "The requested resource was not found");
}
