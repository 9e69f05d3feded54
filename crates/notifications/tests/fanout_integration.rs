//! End-to-end fan-out from a stored order.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::{AccountId, Money, OrderId, OrderStatus, ProductId};
use notifications::{
    ChannelOutcome, FanoutConfig, InMemoryChatSender, InMemoryEmailSender, NotificationFanout,
    OrderSummary,
};
use store::{LineItem, Order};

fn placed_order() -> Order {
    let now = Utc::now();
    Order {
        id: OrderId::new(),
        account_id: AccountId::new(),
        line_items: vec![LineItem {
            product_id: ProductId::new(),
            product_name: "Amoxicillin 500mg".into(),
            quantity: 3,
            unit_price: Money::from_cents(1299),
        }],
        total_amount: Money::from_cents(3897),
        delivery_address: "221B Baker St".into(),
        status: OrderStatus::Pending,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn dispatched_order_reaches_both_channels() {
    let email = InMemoryEmailSender::new();
    let chat = InMemoryChatSender::new();
    let fanout = NotificationFanout::new(FanoutConfig {
        admin_email: Some("pharmacist@pharmacy.test".into()),
        chat_recipient: Some("-1001".into()),
        timeout: Duration::from_secs(1),
        max_in_flight: 2,
    })
    .unwrap()
    .with_email(Arc::new(email.clone()))
    .with_chat(Arc::new(chat.clone()));

    let order = placed_order();
    let summary = OrderSummary::from_order(&order).with_patient_name("Jane Doe");
    let report = fanout.dispatch(summary).unwrap().await.unwrap();

    assert!(report.is_clean());

    let emails = email.sent().await;
    assert_eq!(emails.len(), 1);
    assert!(emails[0].subject.contains(&order.id.to_string()));
    assert!(emails[0].text.contains("3 x Amoxicillin 500mg"));
    assert!(emails[0].html.contains("221B Baker St"));

    let messages = chat.sent().await;
    assert_eq!(messages.len(), 1);
    assert!(messages[0].text.contains("Total: $38.97"));
}

#[tokio::test]
async fn both_channels_failing_still_reports() {
    let fanout = NotificationFanout::new(FanoutConfig {
        admin_email: Some("pharmacist@pharmacy.test".into()),
        chat_recipient: Some("-1001".into()),
        ..FanoutConfig::default()
    })
    .unwrap()
    .with_email(Arc::new(InMemoryEmailSender::failing()))
    .with_chat(Arc::new(InMemoryChatSender::failing()));

    let report = fanout
        .dispatch(OrderSummary::from_order(&placed_order()))
        .unwrap()
        .await
        .unwrap();

    assert!(matches!(report.email, ChannelOutcome::Failed(_)));
    assert!(matches!(report.chat, ChannelOutcome::Failed(_)));
}
