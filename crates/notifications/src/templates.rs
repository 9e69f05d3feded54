//! Handlebars templates for the new-order notifications.
//!
//! Email HTML goes through a registry with the default HTML escaping; the
//! subject, plain-text body and chat message go through one with escaping
//! turned off. Both run in strict mode so a missing field is an error rather
//! than an empty string.

use handlebars::Handlebars;
use serde::Serialize;

use crate::error::Result;
use crate::summary::OrderSummary;

const SUBJECT: &str = "new_order_subject";
const TEXT: &str = "new_order_text";
const HTML: &str = "new_order_html";
const CHAT: &str = "new_order_chat";

const SUBJECT_TEMPLATE: &str = "New order {{order_id}} ({{total}})";

const TEXT_TEMPLATE: &str = "A new order was placed.

Order: {{order_id}}
Patient: {{patient}}
Placed: {{placed_at}}
Deliver to: {{delivery_address}}

{{#each lines}}
  {{quantity}} x {{product_name}}  {{line_total}}
{{/each}}

Total: {{total}}
";

const HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <h2>New order placed</h2>
    <p>
        <strong>Order:</strong> {{order_id}}<br>
        <strong>Patient:</strong> {{patient}}<br>
        <strong>Placed:</strong> {{placed_at}}<br>
        <strong>Deliver to:</strong> {{delivery_address}}
    </p>
    <table>
        <thead><tr><th>Drug</th><th>Qty</th><th>Amount</th></tr></thead>
        <tbody>
        {{#each lines}}
            <tr><td>{{product_name}}</td><td>{{quantity}}</td><td>{{line_total}}</td></tr>
        {{/each}}
        </tbody>
    </table>
    <p><strong>Total:</strong> {{total}}</p>
</body>
</html>"#;

const CHAT_TEMPLATE: &str = "New order {{order_id}}
Patient: {{patient}}
Items: {{#each lines}}{{product_name}} x{{quantity}}{{#unless @last}}, {{/unless}}{{/each}}
Total: {{total}}
Deliver to: {{delivery_address}}";

/// The subject and both bodies of one email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Registered new-order templates.
pub struct OrderTemplates {
    plain: Handlebars<'static>,
    html: Handlebars<'static>,
}

impl std::fmt::Debug for OrderTemplates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderTemplates").finish_non_exhaustive()
    }
}

impl OrderTemplates {
    /// Compiles and registers every template.
    pub fn new() -> Result<Self> {
        let mut plain = Handlebars::new();
        plain.set_strict_mode(true);
        plain.register_escape_fn(handlebars::no_escape);
        plain.register_template_string(SUBJECT, SUBJECT_TEMPLATE)?;
        plain.register_template_string(TEXT, TEXT_TEMPLATE)?;
        plain.register_template_string(CHAT, CHAT_TEMPLATE)?;

        let mut html = Handlebars::new();
        html.set_strict_mode(true);
        html.register_template_string(HTML, HTML_TEMPLATE)?;

        Ok(Self { plain, html })
    }

    pub fn render_email(&self, summary: &OrderSummary) -> Result<RenderedEmail> {
        let view = SummaryView::from(summary);
        Ok(RenderedEmail {
            subject: self.plain.render(SUBJECT, &view)?,
            text: self.plain.render(TEXT, &view)?,
            html: self.html.render(HTML, &view)?,
        })
    }

    pub fn render_chat(&self, summary: &OrderSummary) -> Result<String> {
        Ok(self.plain.render(CHAT, &SummaryView::from(summary))?)
    }
}

/// Template data. Amounts and timestamps are preformatted for display.
#[derive(Serialize)]
struct SummaryView<'a> {
    order_id: String,
    patient: String,
    placed_at: String,
    delivery_address: &'a str,
    lines: Vec<LineView<'a>>,
    total: String,
}

#[derive(Serialize)]
struct LineView<'a> {
    product_name: &'a str,
    quantity: u32,
    line_total: String,
}

impl<'a> From<&'a OrderSummary> for SummaryView<'a> {
    fn from(summary: &'a OrderSummary) -> Self {
        let patient = match &summary.patient_name {
            Some(name) => format!("{name} ({})", summary.account_id),
            None => summary.account_id.to_string(),
        };

        Self {
            order_id: summary.order_id.to_string(),
            patient,
            placed_at: summary.placed_at.format("%Y-%m-%d %H:%M UTC").to_string(),
            delivery_address: &summary.delivery_address,
            lines: summary
                .lines
                .iter()
                .map(|line| LineView {
                    product_name: &line.product_name,
                    quantity: line.quantity,
                    line_total: line.line_total.to_string(),
                })
                .collect(),
            total: summary.total.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::SummaryLine;
    use chrono::Utc;
    use common::{AccountId, Money, OrderId};

    fn summary() -> OrderSummary {
        OrderSummary {
            order_id: OrderId::new(),
            account_id: AccountId::new(),
            patient_name: Some("Jane Doe".into()),
            lines: vec![
                SummaryLine {
                    product_name: "Aspirin".into(),
                    quantity: 2,
                    line_total: Money::from_cents(998),
                },
                SummaryLine {
                    product_name: "Cough <Syrup> & Co".into(),
                    quantity: 1,
                    line_total: Money::from_cents(1250),
                },
            ],
            total: Money::from_cents(2248),
            delivery_address: "1 Main St".into(),
            placed_at: Utc::now(),
        }
    }

    #[test]
    fn email_mentions_total_and_items() {
        let summary = summary();
        let email = OrderTemplates::new().unwrap().render_email(&summary).unwrap();

        assert_eq!(
            email.subject,
            format!("New order {} ($22.48)", summary.order_id)
        );
        assert!(email.text.contains("2 x Aspirin  $9.98"));
        assert!(email.text.contains("Jane Doe"));
        assert!(email.text.contains("Total: $22.48"));
    }

    #[test]
    fn plain_text_is_not_escaped() {
        let email = OrderTemplates::new().unwrap().render_email(&summary()).unwrap();
        assert!(email.text.contains("Cough <Syrup> & Co"));
    }

    #[test]
    fn html_is_escaped() {
        let email = OrderTemplates::new().unwrap().render_email(&summary()).unwrap();
        assert!(email.html.contains("Cough &lt;Syrup&gt; &amp; Co"));
        assert!(!email.html.contains("<Syrup>"));
        assert!(email.html.contains("<td>$12.50</td>"));
    }

    #[test]
    fn chat_lists_items_inline() {
        let chat = OrderTemplates::new().unwrap().render_chat(&summary()).unwrap();
        assert!(chat.contains("Items: Aspirin x2, Cough <Syrup> & Co x1\n"));
        assert!(chat.contains("Total: $22.48"));
        assert!(chat.contains("Patient: Jane Doe ("));
    }

    #[test]
    fn anonymous_patient_shows_account_id() {
        let mut summary = summary();
        summary.patient_name = None;
        let chat = OrderTemplates::new().unwrap().render_chat(&summary).unwrap();
        assert!(chat.contains(&format!("Patient: {}\n", summary.account_id)));
    }
}
