use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    controllers::ok,
    error::{ApiError, StoreError, ValidationError},
    models::{Alert, AlertType, CurrentUser, Frequency, NewAlert},
    services::notifier::{AlertCreated, Notification},
    AppState,
};

#[derive(Deserialize)]
pub struct AlertsQuery {
    pub symbol: Option<String>,
}

/// Request body; fields stay loose so bad values become 400s, not 422s.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAlertBody {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub alert_name: String,
    #[serde(default)]
    pub alert_type: String,
    pub threshold: Option<Value>,
    pub frequency: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertView {
    pub id: String,
    pub symbol: String,
    pub company: String,
    pub alert_name: String,
    pub alert_type: AlertType,
    pub threshold: f64,
    pub frequency: Frequency,
    pub is_active: bool,
    pub last_triggered: Option<i64>,
    pub created_at: i64,
}

impl From<Alert> for AlertView {
    fn from(a: Alert) -> Self {
        Self {
            id: a.id.to_hex(),
            symbol: a.symbol,
            company: a.company,
            alert_name: a.alert_name,
            alert_type: a.alert_type,
            threshold: a.threshold,
            frequency: a.frequency,
            is_active: a.is_active,
            last_triggered: a.last_triggered,
            created_at: a.created_at,
        }
    }
}

fn parse_threshold(raw: Option<&Value>) -> Result<f64, ValidationError> {
    let value = match raw {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().parse::<f64>().ok(),
        None | Some(Value::Null) => return Err(ValidationError::MissingField { field: "threshold" }),
        Some(Value::String(_)) => return Err(ValidationError::MissingField { field: "threshold" }),
        Some(_) => None,
    };

    value.ok_or(ValidationError::InvalidThreshold)
}

impl CreateAlertBody {
    fn validate(&self) -> Result<NewAlert, ValidationError> {
        if self.alert_type.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "alertType" });
        }
        let alert_type: AlertType = self.alert_type.parse()?;

        let frequency = match self.frequency.as_deref().map(str::trim) {
            None | Some("") => Frequency::default(),
            Some(f) => f.parse()?,
        };

        let threshold = parse_threshold(self.threshold.as_ref())?;

        NewAlert::new(
            &self.symbol,
            &self.company,
            &self.alert_name,
            alert_type,
            threshold,
            frequency,
        )
    }
}

// GET /api/alerts?symbol=
pub async fn get_alerts(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<AlertsQuery>,
) -> Result<Json<Value>, ApiError> {
    let symbol = query.symbol.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let alerts = state.alerts.list_by_user(&user.id, symbol).await?;
    let items: Vec<AlertView> = alerts.into_iter().map(AlertView::from).collect();

    Ok(ok(items))
}

// POST /api/alerts
pub async fn post_create_alert(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    body: Result<Json<CreateAlertBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let new_alert = body.validate()?;

    let alert = state.alerts.create(&user.id, new_alert).await?;
    tracing::info!(user = %user.id, alert = %alert.id, symbol = %alert.symbol, "alert created");

    notify_created(&state, &user, &alert).await;

    Ok((StatusCode::CREATED, ok(AlertView::from(alert))))
}

// the alert exists either way; a failed confirmation email is only logged
async fn notify_created(state: &AppState, user: &CurrentUser, alert: &Alert) {
    let email = if user.email.trim().is_empty() {
        match state.users.resolve_user_email(&user.id).await {
            Ok(Some(email)) => email,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(user = %user.id, error = %e, "cannot resolve email for alert confirmation");
                return;
            }
        }
    } else {
        user.email.trim().to_string()
    };

    let notification = Notification::AlertCreated(AlertCreated {
        email,
        alert_name: alert.alert_name.clone(),
        symbol: alert.symbol.clone(),
        company: alert.company.clone(),
        alert_type: alert.alert_type,
        threshold: alert.threshold,
        frequency: alert.frequency,
    });

    let event_id = format!("{}:created", alert.id.to_hex());
    if let Err(e) = state.notifier.emit(&event_id, &notification).await {
        tracing::warn!(alert = %alert.id, error = %e, "alert confirmation not sent");
    }
}

// DELETE /api/alerts/:id
pub async fn delete_alert(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let oid = ObjectId::parse_str(id.trim()).map_err(|_| ApiError::BadRequest("Invalid alert id".to_string()))?;

    state.alerts.delete(oid, &user.id).await.map_err(|e| match e {
        StoreError::NotFound => ApiError::NotFound("Alert not found".to_string()),
        other => other.into(),
    })?;

    Ok(Json(json!({ "success": true })))
}
