use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde_json::Value;
use stockwatch::{
    error::NotifyError,
    models::AlertType,
    services::notifier::{AlertTriggered, HttpEventNotifier, Notification, Notifier},
    templates,
};

#[derive(Clone, Default)]
struct Ingest {
    received: Arc<Mutex<Vec<(String, Value)>>>,
}

async fn accept(State(ingest): State<Ingest>, Path(key): Path<String>, Json(body): Json<Value>) -> StatusCode {
    if key != "event-key" {
        return StatusCode::UNAUTHORIZED;
    }
    ingest.received.lock().unwrap().push((key, body));
    StatusCode::OK
}

async fn spawn_ingest() -> (String, Ingest) {
    let ingest = Ingest::default();
    let app = Router::new()
        .route("/e/:key", post(accept))
        .with_state(ingest.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/e"), ingest)
}

fn triggered() -> Notification {
    Notification::AlertTriggered(AlertTriggered {
        email: "ann@example.com".into(),
        alert_name: "Dip buy".into(),
        symbol: "TSLA".into(),
        company: "Tesla".into(),
        current_price: 149.0,
        threshold: 150.0,
        alert_type: AlertType::Lower,
    })
}

#[tokio::test]
async fn posts_named_event_with_rendered_email() {
    let (url, ingest) = spawn_ingest().await;
    let hbs = templates::build_handlebars().unwrap();
    let notifier = HttpEventNotifier::new(&url, "event-key", hbs, "https://app.test", Duration::from_secs(5));

    notifier.emit("abc:1700000000", &triggered()).await.unwrap();

    let received = ingest.received.lock().unwrap().clone();
    assert_eq!(received.len(), 1);

    let body = &received[0].1;
    assert_eq!(body["name"], "app/alert.triggered");
    assert_eq!(body["id"], "abc:1700000000");
    assert_eq!(body["data"]["symbol"], "TSLA");
    assert_eq!(body["data"]["alertType"], "lower");
    assert_eq!(body["email"]["to"], "ann@example.com");
    assert_eq!(body["email"]["subject"], "Alert: TSLA is below $150.00");
    assert!(body["email"]["html"].as_str().unwrap().contains("$149.00"));
}

#[tokio::test]
async fn rejected_event_is_an_error() {
    let (url, ingest) = spawn_ingest().await;
    let hbs = templates::build_handlebars().unwrap();
    let notifier = HttpEventNotifier::new(&url, "wrong-key", hbs, "https://app.test", Duration::from_secs(5));

    let err = notifier.emit("abc:1", &triggered()).await.unwrap_err();
    assert!(matches!(err, NotifyError::Status { status: 401, .. }));
    assert!(ingest.received.lock().unwrap().is_empty());
}
