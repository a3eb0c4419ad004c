use std::{fmt, str::FromStr};

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

use super::normalize_symbol;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Upper,
    Lower,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::Upper => "upper",
            AlertType::Lower => "lower",
        }
    }

    /// Wording used in notification copy.
    pub fn direction_label(&self) -> &'static str {
        match self {
            AlertType::Upper => "ABOVE",
            AlertType::Lower => "BELOW",
        }
    }
}

impl FromStr for AlertType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "upper" => Ok(AlertType::Upper),
            "lower" => Ok(AlertType::Lower),
            _ => Err(ValidationError::InvalidAlertType { value: s.to_string() }),
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    #[default]
    Once,
    Daily,
    Weekly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Once => "once",
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
        }
    }

    /// Minimum number of days between two notifications, `None` for single-fire alerts.
    pub fn min_days_between(&self) -> Option<f64> {
        match self {
            Frequency::Once => None,
            Frequency::Daily => Some(1.0),
            Frequency::Weekly => Some(7.0),
        }
    }
}

impl FromStr for Frequency {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "once" => Ok(Frequency::Once),
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            _ => Err(ValidationError::InvalidFrequency { value: s.to_string() }),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub user_id: String,
    pub symbol: String,
    pub company: String,
    pub alert_name: String,

    pub alert_type: AlertType,
    pub threshold: f64,
    #[serde(default)]
    pub frequency: Frequency,

    #[serde(default = "default_true")]
    pub is_active: bool,
    // unix seconds, written only by the evaluator
    #[serde(default)]
    pub last_triggered: Option<i64>,

    pub created_at: i64,
    pub updated_at: i64,
}

/// Validated input for a new alert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    pub symbol: String,
    pub company: String,
    pub alert_name: String,
    pub alert_type: AlertType,
    pub threshold: f64,
    pub frequency: Frequency,
}

impl NewAlert {
    pub fn new(
        symbol: &str,
        company: &str,
        alert_name: &str,
        alert_type: AlertType,
        threshold: f64,
        frequency: Frequency,
    ) -> Result<Self, ValidationError> {
        let symbol = normalize_symbol(symbol)?;

        let company = company.trim();
        if company.is_empty() {
            return Err(ValidationError::MissingField { field: "company" });
        }

        let alert_name = alert_name.trim();
        if alert_name.is_empty() {
            return Err(ValidationError::MissingField { field: "alertName" });
        }

        if !threshold.is_finite() || threshold < 0.0 {
            return Err(ValidationError::InvalidThreshold);
        }

        Ok(Self {
            symbol,
            company: company.to_string(),
            alert_name: alert_name.to_string(),
            alert_type,
            threshold,
            frequency,
        })
    }

    pub fn into_alert(self, user_id: &str, now: i64) -> Alert {
        Alert {
            id: ObjectId::new(),
            user_id: user_id.to_string(),
            symbol: self.symbol,
            company: self.company,
            alert_name: self.alert_name,
            alert_type: self.alert_type,
            threshold: self.threshold,
            frequency: self.frequency,
            is_active: true,
            last_triggered: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Fields the evaluator is allowed to change on an alert.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerUpdate {
    pub last_triggered: Option<i64>,
    pub is_active: bool,
}
