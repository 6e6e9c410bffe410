use chrono::Local;

use crate::models::ProductRecord;
use crate::utils::text::escape_html;

pub fn restock_message(record: &ProductRecord) -> String {
    format!(
        "🔔 <b>Back in stock</b>\n\
         🏪 {}\n\
         📦 <a href=\"{}\">{}</a>\n\
         🕒 {}",
        escape_html(&record.site_name),
        escape_html(&record.url),
        escape_html(&record.name),
        Local::now().format("%Y-%m-%d %H:%M:%S"),
    )
}

pub fn escalation_message(failures: u32) -> String {
    format!(
        "⚠️ <b>Scanning degraded</b>\n\
         {} consecutive cycles had failing targets. Stock data may be stale.",
        failures
    )
}

pub fn recovery_message(failures: u32) -> String {
    format!(
        "✅ <b>Scanning recovered</b>\n\
         A full cycle completed without errors after {} failing cycles.",
        failures
    )
}
