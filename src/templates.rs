use handlebars::{Handlebars, TemplateError};
use serde_json::json;
use std::sync::Arc;

use crate::{
    error::NotifyError,
    models::{AlertType, quote::format_change_percent},
    services::notifier::Notification,
};

pub type Hbs = Arc<Handlebars<'static>>;

// compiled into the binary so the service runs from any working directory
const EMAIL_TEMPLATES: [(&str, &str); 4] = [
    ("emails/alert_created", include_str!("../templates/emails/alert_created.hbs")),
    ("emails/alert_triggered", include_str!("../templates/emails/alert_triggered.hbs")),
    ("emails/watchlist_daily", include_str!("../templates/emails/watchlist_daily.hbs")),
    ("emails/watchlist_weekly", include_str!("../templates/emails/watchlist_weekly.hbs")),
];

pub fn build_handlebars() -> Result<Hbs, TemplateError> {
    let mut hb = Handlebars::new();
    hb.set_strict_mode(false);

    hb.register_partial("email_footer", include_str!("../templates/emails/footer.hbs"))?;

    for (name, source) in EMAIL_TEMPLATES {
        hb.register_template_string(name, source)?;
    }

    Ok(Arc::new(hb))
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

fn frequency_note(frequency: &str) -> &'static str {
    match frequency {
        "daily" => "This alert can fire at most once per day while the condition holds.",
        "weekly" => "This alert can fire at most once per week while the condition holds.",
        _ => "This alert fires once and is then deactivated.",
    }
}

pub fn render_email(hbs: &Hbs, notification: &Notification, app_url: &str) -> Result<EmailMessage, NotifyError> {
    let base = app_url.trim_end_matches('/');
    let watchlist_url = format!("{base}/watchlist");

    let (template, subject, ctx) = match notification {
        Notification::AlertCreated(p) => (
            "emails/alert_created",
            format!("Price alert created: {} {}", p.symbol, p.alert_name),
            json!({
                "alert_name": p.alert_name,
                "symbol": p.symbol,
                "company": p.company,
                "direction": p.alert_type.direction_label().to_lowercase(),
                "threshold": format!("{:.2}", p.threshold),
                "frequency_label": p.frequency.as_str(),
                "frequency_note": frequency_note(p.frequency.as_str()),
                "watchlist_url": watchlist_url,
            }),
        ),
        Notification::AlertTriggered(p) => (
            "emails/alert_triggered",
            format!(
                "Alert: {} is {} ${:.2}",
                p.symbol,
                p.alert_type.direction_label().to_lowercase(),
                p.threshold
            ),
            json!({
                "alert_name": p.alert_name,
                "symbol": p.symbol,
                "company": p.company,
                "is_upper": p.alert_type == AlertType::Upper,
                "direction": p.alert_type.direction_label(),
                "current_price": format!("{:.2}", p.current_price),
                "threshold": format!("{:.2}", p.threshold),
                "stock_url": format!("{base}/stocks/{}", p.symbol),
                "watchlist_url": watchlist_url,
            }),
        ),
        Notification::WatchlistDigest(p) => (
            "emails/watchlist_daily",
            format!("Your watchlist today: {} up, {} down", p.gainers_count, p.losers_count),
            json!({
                "name": p.name,
                "date": p.date,
                "items": p.items,
                "total_value": format!("{:.2}", p.total_value),
                "gainers_count": p.gainers_count,
                "losers_count": p.losers_count,
                "top_gainer": p.top_gainer,
                "top_loser": p.top_loser,
                "watchlist_url": watchlist_url,
            }),
        ),
        Notification::WeeklySummary(p) => (
            "emails/watchlist_weekly",
            format!("Your weekly watchlist summary ({})", p.week_of),
            json!({
                "name": p.name,
                "week_of": p.week_of,
                "items": p.items,
                "item_count": p.items.len(),
                "average_change": format_change_percent(p.average_change),
                "best_performer": p.best_performer,
                "worst_performer": p.worst_performer,
                "watchlist_url": watchlist_url,
            }),
        ),
    };

    let html = hbs.render(template, &ctx)?;

    Ok(EmailMessage {
        to: notification.recipient().to_string(),
        subject,
        html,
    })
}
