mod common;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::json;
use stockwatch::routes;
use tower::ServiceExt;

use common::{body_json, memory_state, session_token, FakeMarket, RecordingNotifier};

fn app_with_market(market: Arc<FakeMarket>) -> axum::Router {
    let (state, _store) = memory_state(market, Arc::new(RecordingNotifier::default()));
    routes::app(state)
}

fn authed(method: &str, uri: &str, token: &str, body: Option<serde_json::Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"));

    match body {
        Some(b) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

#[tokio::test]
async fn api_requires_a_session() {
    let app = app_with_market(Arc::new(FakeMarket::new()));

    let req = Request::builder().uri("/api/watchlist").body(Body::empty()).unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(res).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Unauthorized");

    // a forged token is no better than none
    let req = authed("GET", "/api/watchlist", "not-a-jwt", None);
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn session_cookie_is_accepted() {
    let app = app_with_market(Arc::new(FakeMarket::new()));
    let token = session_token("u1", "ann@example.com");

    let req = Request::builder()
        .uri("/api/watchlist/symbols")
        .header(header::COOKIE, format!("auth={token}"))
        .body(Body::empty())
        .unwrap();

    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["data"], json!([]));
}

#[tokio::test]
async fn add_is_idempotent_per_user_and_symbol() {
    let app = app_with_market(Arc::new(FakeMarket::new()));
    let token = session_token("u1", "ann@example.com");

    let req = authed("POST", "/api/watchlist", &token, Some(json!({ "symbol": " aapl ", "company": "Apple Inc" })));
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = body_json(res).await;
    assert_eq!(body["data"]["symbol"], "AAPL");

    let req = authed("POST", "/api/watchlist", &token, Some(json!({ "symbol": "AAPL", "company": "Apple Inc" })));
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(res).await["error"], "Stock already in watchlist");

    let req = authed("GET", "/api/watchlist/symbols", &token, None);
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(body_json(res).await["data"], json!(["AAPL"]));
}

#[tokio::test]
async fn add_rejects_missing_fields() {
    let app = app_with_market(Arc::new(FakeMarket::new()));
    let token = session_token("u1", "ann@example.com");

    let req = authed("POST", "/api/watchlist", &token, Some(json!({ "symbol": "AAPL" })));
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["error"], "Missing required fields");

    let req = authed("POST", "/api/watchlist", &token, Some(json!({ "symbol": "", "company": "X" })));
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn remove_reports_missing_entries() {
    let app = app_with_market(Arc::new(FakeMarket::new()));
    let token = session_token("u1", "ann@example.com");

    let req = authed("DELETE", "/api/watchlist/MSFT", &token, None);
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let req = authed("POST", "/api/watchlist", &token, Some(json!({ "symbol": "MSFT", "company": "Microsoft" })));
    assert_eq!(app.clone().oneshot(req).await.unwrap().status(), StatusCode::CREATED);

    let req = authed("DELETE", "/api/watchlist/msft", &token, None);
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["success"], true);

    let req = authed("GET", "/api/watchlist/symbols", &token, None);
    assert_eq!(body_json(app.oneshot(req).await.unwrap()).await["data"], json!([]));
}

#[tokio::test]
async fn watchlist_is_joined_with_market_data() {
    let market = Arc::new(FakeMarket::new());
    market.set("AAPL", 189.5, -0.25);
    let app = app_with_market(market);
    let token = session_token("u1", "ann@example.com");

    for (symbol, company) in [("AAPL", "Apple Inc"), ("QQQQ", "No Data Corp")] {
        let req = authed("POST", "/api/watchlist", &token, Some(json!({ "symbol": symbol, "company": company })));
        assert_eq!(app.clone().oneshot(req).await.unwrap().status(), StatusCode::CREATED);
    }

    let req = authed("GET", "/api/watchlist", &token, None);
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body = body_json(res).await;
    let items = body["data"].as_array().unwrap();
    assert_eq!(items.len(), 2);

    let aapl = items.iter().find(|i| i["symbol"] == "AAPL").unwrap();
    assert_eq!(aapl["priceFormatted"], "189.50");
    assert_eq!(aapl["changeFormatted"], "-0.25%");
    assert_eq!(aapl["marketCap"], "$2.50T");

    // failed lookups keep the stored fields
    let other = items.iter().find(|i| i["symbol"] == "QQQQ").unwrap();
    assert_eq!(other["company"], "No Data Corp");
    assert!(other["currentPrice"].is_null());
}

#[tokio::test]
async fn users_do_not_see_each_other() {
    let app = app_with_market(Arc::new(FakeMarket::new()));
    let ann = session_token("u1", "ann@example.com");
    let bob = session_token("u2", "bob@example.com");

    let req = authed("POST", "/api/watchlist", &ann, Some(json!({ "symbol": "AAPL", "company": "Apple" })));
    assert_eq!(app.clone().oneshot(req).await.unwrap().status(), StatusCode::CREATED);

    let req = authed("GET", "/api/watchlist/symbols", &bob, None);
    assert_eq!(body_json(app.clone().oneshot(req).await.unwrap()).await["data"], json!([]));

    let req = authed("DELETE", "/api/watchlist/AAPL", &bob, None);
    assert_eq!(app.oneshot(req).await.unwrap().status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn search_marks_watchlisted_symbols() {
    let market = Arc::new(FakeMarket::new());
    market.set("AAPL", 1.0, 0.0);
    market.set("AMZN", 1.0, 0.0);
    let app = app_with_market(market);
    let token = session_token("u1", "ann@example.com");

    let req = authed("POST", "/api/watchlist", &token, Some(json!({ "symbol": "AMZN", "company": "Amazon" })));
    assert_eq!(app.clone().oneshot(req).await.unwrap().status(), StatusCode::CREATED);

    let req = authed("GET", "/api/stocks/search?q=a", &token, None);
    let body = body_json(app.oneshot(req).await.unwrap()).await;
    let items = body["data"].as_array().unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["symbol"], "AAPL");
    assert_eq!(items[0]["isInWatchlist"], false);
    assert_eq!(items[1]["symbol"], "AMZN");
    assert_eq!(items[1]["isInWatchlist"], true);
    assert_eq!(items[1]["type"], "Common Stock");
}

#[tokio::test]
async fn stock_details_and_unknown_symbols() {
    let market = Arc::new(FakeMarket::new());
    market.set("AAPL", 190.0, 1.0);
    let app = app_with_market(market);
    let token = session_token("u1", "ann@example.com");

    let req = authed("GET", "/api/stocks/aapl", &token, None);
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["data"]["symbol"], "AAPL");
    assert_eq!(body["data"]["peRatioFormatted"], "30.00");

    let req = authed("GET", "/api/stocks/NOPE", &token, None);
    assert_eq!(app.oneshot(req).await.unwrap().status(), StatusCode::NOT_FOUND);
}
