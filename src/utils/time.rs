use chrono::{DateTime, SecondsFormat, Utc};

pub fn parse_slot(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw.trim())?.with_timezone(&Utc))
}

pub fn format_line_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn synthesized_message_id() -> String {
    format!("generated-{}", Utc::now().timestamp_millis())
}
