use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::models::{MessageId, ProductRecord};
use crate::plugins::traits::Notifier;
use crate::utils::text::{char_len, escape_html};

const MIN_BODY_LENGTH: usize = 16;

/// One rendered status message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardPage {
    pub site_name: String,
    /// 1-based position within the site's pages.
    pub page: usize,
    pub total_pages: usize,
    pub header: String,
    pub body: String,
    pub item_count: usize,
}

impl DashboardPage {
    pub fn text(&self) -> String {
        format!("{}{}", self.header, self.body.trim_end())
    }
}

/// Renders the store into per-site pages whose bodies stay within
/// `max_body_length` characters.
#[derive(Debug, Clone)]
pub struct DashboardRenderer {
    max_body_length: usize,
}

impl DashboardRenderer {
    pub fn new(max_body_length: usize) -> Self {
        Self {
            max_body_length: max_body_length.max(MIN_BODY_LENGTH),
        }
    }

    /// Pages grouped by site name (alphabetical), in-stock items first.
    pub fn render<'a, I>(&self, records: I, now: DateTime<Local>) -> Vec<DashboardPage>
    where
        I: IntoIterator<Item = &'a ProductRecord>,
    {
        let mut sites: BTreeMap<&str, Vec<&ProductRecord>> = BTreeMap::new();
        for record in records {
            sites.entry(record.site_name.as_str()).or_default().push(record);
        }

        let timestamp = now.format("%Y-%m-%d %H:%M:%S").to_string();
        let mut pages = Vec::new();

        for (site_name, mut items) in sites {
            items.sort_by(|a, b| {
                a.is_sold_out
                    .cmp(&b.is_sold_out)
                    .then_with(|| a.name.cmp(&b.name))
            });
            let in_stock = items.iter().filter(|r| r.is_in_stock()).count();
            let sold_out = items.len() - in_stock;

            let bodies = self.paginate(&items);
            let total_pages = bodies.len();
            for (index, (body, item_count)) in bodies.into_iter().enumerate() {
                let page = index + 1;
                pages.push(DashboardPage {
                    site_name: site_name.to_string(),
                    page,
                    total_pages,
                    header: header(site_name, page, total_pages, in_stock, sold_out, &timestamp),
                    body,
                    item_count,
                });
            }
        }

        pages
    }

    fn paginate(&self, items: &[&ProductRecord]) -> Vec<(String, usize)> {
        let mut bodies = Vec::new();
        let mut body = String::new();
        let mut body_len = 0;
        let mut count = 0;

        for record in items {
            let line = self.item_line(record);
            let line_len = char_len(&line) + 1;

            if count > 0 && body_len + line_len > self.max_body_length {
                bodies.push((std::mem::take(&mut body), count));
                body_len = 0;
                count = 0;
            }

            body.push_str(&line);
            body.push('\n');
            body_len += line_len;
            count += 1;
        }

        if count > 0 {
            bodies.push((body, count));
        }
        bodies
    }

    /// A line plus its newline always fits in one body; overlong names are
    /// cut and end with an ellipsis.
    fn item_line(&self, record: &ProductRecord) -> String {
        let full = format_line(record, &escape_html(&record.name), true);
        if char_len(&full) < self.max_body_length {
            return full;
        }

        let with_link = char_len(&format_line(record, "", true)) + 2 < self.max_body_length;
        let overhead = char_len(&format_line(record, "", with_link));
        let budget = self.max_body_length.saturating_sub(overhead + 2);

        let mut name = String::new();
        let mut used = 0;
        for c in record.name.chars() {
            let escaped = escape_html(c.encode_utf8(&mut [0; 4]));
            let len = char_len(&escaped);
            if used + len > budget {
                break;
            }
            name.push_str(&escaped);
            used += len;
        }
        name.push('…');

        format_line(record, &name, with_link)
    }
}

fn format_line(record: &ProductRecord, name: &str, link: bool) -> String {
    if record.is_sold_out {
        format!("❌ {}", name)
    } else if link {
        format!("✅ <a href=\"{}\">{}</a>", escape_html(&record.url), name)
    } else {
        format!("✅ {}", name)
    }
}

fn header(
    site_name: &str,
    page: usize,
    total_pages: usize,
    in_stock: usize,
    sold_out: usize,
    timestamp: &str,
) -> String {
    let position = if total_pages > 1 {
        format!(" ({}/{})", page, total_pages)
    } else {
        String::new()
    };

    format!(
        "🏪 <b>{}</b>{}\n🕒 {}\n✅ In stock: {} | ❌ Sold out: {}\n\n",
        escape_html(site_name),
        position,
        timestamp,
        in_stock,
        sold_out
    )
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PublishSummary {
    pub edited: usize,
    pub sent: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// Bring the published messages in line with `pages`, reusing `message_ids`
/// in order. Trailing surplus messages are deleted, existing ones edited
/// (replaced by a fresh send when the edit fails) and missing ones sent.
pub async fn publish(
    notifier: &dyn Notifier,
    message_ids: &mut Vec<MessageId>,
    pages: &[DashboardPage],
) -> PublishSummary {
    let mut summary = PublishSummary::default();

    while message_ids.len() > pages.len() {
        let Some(message_id) = message_ids.pop() else {
            break;
        };
        match notifier.delete(message_id).await {
            Ok(()) => summary.deleted += 1,
            Err(e) => warn!(message_id, error = %e, "failed to delete surplus dashboard message"),
        }
    }

    for (index, page) in pages.iter().enumerate() {
        let text = page.text();

        if let Some(&message_id) = message_ids.get(index) {
            match notifier.edit(message_id, &text).await {
                Ok(()) => {
                    summary.edited += 1;
                    continue;
                }
                Err(e) => {
                    debug!(message_id, error = %e, "dashboard edit failed, sending a new message")
                }
            }
            match notifier.send(&text).await {
                Ok(new_id) => {
                    message_ids[index] = new_id;
                    summary.sent += 1;
                }
                Err(e) => {
                    warn!(site = %page.site_name, page = page.page, error = %e, "failed to replace dashboard message");
                    summary.failed += 1;
                }
            }
        } else {
            match notifier.send(&text).await {
                Ok(new_id) => {
                    message_ids.push(new_id);
                    summary.sent += 1;
                }
                Err(e) => {
                    warn!(site = %page.site_name, page = page.page, error = %e, "failed to send dashboard message");
                    summary.failed += 1;
                }
            }
        }
    }

    summary
}
