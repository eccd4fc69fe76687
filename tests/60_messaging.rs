mod common;

use std::collections::HashSet;

use anyhow::Result;
use esm_portal::models::UserRole;
use esm_portal::services::conversations::{MessageQuery, SendMessageRequest, StartConversationRequest};
use esm_portal::services::ConversationService;

fn text(body: &str) -> SendMessageRequest {
    SendMessageRequest {
        body: body.to_string(),
        attachments: vec![],
    }
}

#[tokio::test]
async fn polling_with_the_cursor_sees_each_message_once() -> Result<()> {
    let Some(pool) = common::database().await? else { return Ok(()) };
    let buyer = common::account(&pool, UserRole::Buyer).await?;
    let seller = common::account(&pool, UserRole::Seller).await?;
    let service = ConversationService::with_pool(pool.clone());

    let thread = service
        .start_conversation(
            &buyer,
            StartConversationRequest {
                recipient_id: seller.user_id,
                product_id: None,
                message: Some("Is the shawl still available?".to_string()),
            },
        )
        .await?;
    let id = thread.conversation.id;

    let first = service.list_messages(&seller, id, MessageQuery::default()).await?;
    assert_eq!(first.messages.len(), 1);

    // Both sides write at once
    let (a, b, c) = tokio::join!(
        service.send_message(&buyer, id, text("Need two")),
        service.send_message(&seller, id, text("Yes, in stock")),
        service.send_message(&seller, id, text("Ships tomorrow")),
    );
    let sent: HashSet<_> = [a?.id, b?.id, c?.id].into_iter().collect();

    let mut seen = HashSet::new();
    let mut cursor = first.next_since;
    loop {
        let poll = service
            .list_messages(&buyer, id, MessageQuery { since: cursor, limit: Some(2) })
            .await?;
        if poll.messages.is_empty() {
            break;
        }
        for message in &poll.messages {
            assert!(seen.insert(message.id), "message {} delivered twice", message.id);
        }
        assert!(poll.next_since > cursor);
        cursor = poll.next_since;
    }
    assert_eq!(seen, sent);
    Ok(())
}

#[tokio::test]
async fn marking_read_clears_the_unread_count() -> Result<()> {
    let Some(pool) = common::database().await? else { return Ok(()) };
    let buyer = common::account(&pool, UserRole::Buyer).await?;
    let seller = common::account(&pool, UserRole::Seller).await?;
    let service = ConversationService::with_pool(pool.clone());

    let thread = service
        .start_conversation(
            &buyer,
            StartConversationRequest {
                recipient_id: seller.user_id,
                product_id: None,
                message: Some("Do you ship to Pune?".to_string()),
            },
        )
        .await?;
    let id = thread.conversation.id;
    service.send_message(&buyer, id, text("Order would be for 3")).await?;

    assert_eq!(service.get_conversation(&seller, id).await?.unread_count, 2);
    assert_eq!(service.unread_total(&seller).await?.unread, 2);
    assert_eq!(service.get_conversation(&buyer, id).await?.unread_count, 0);

    let read = service.mark_read(&seller, id).await?;
    assert_eq!(read.unread_count, 0);
    assert_eq!(service.unread_total(&seller).await?.unread, 0);

    service.send_message(&buyer, id, text("Any update?")).await?;
    assert_eq!(service.get_conversation(&seller, id).await?.unread_count, 1);
    Ok(())
}
