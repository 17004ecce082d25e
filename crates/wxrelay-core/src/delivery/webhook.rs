use async_trait::async_trait;

use super::{ChatMessage, DeliveryAck, DeliveryChannel};
use crate::error::DeliveryError;

/// Posts messages as JSON to a chat incoming-webhook URL.
pub struct WebhookChannel {
    client: reqwest::Client,
    url: String,
}

impl WebhookChannel {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl DeliveryChannel for WebhookChannel {
    async fn send(&self, message: &ChatMessage) -> Result<DeliveryAck, DeliveryError> {
        let response = self.client.post(&self.url).json(message).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| DeliveryError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::Attachment;
    use crate::feed::http_client;
    use mockito::Matcher;
    use serde_json::json;
    use std::time::Duration;

    fn message() -> ChatMessage {
        ChatMessage {
            text: "Forecaster (05:14): issue Thunderstorm Warning.".to_string(),
            attachments: vec![Attachment {
                title: "Thunderstorm Warning".to_string(),
                text: "Action: issue (alice:bob)".to_string(),
                color: "red".to_string(),
                thumb_url: None,
            }],
        }
    }

    fn channel(server: &mockito::Server, path: &str) -> WebhookChannel {
        WebhookChannel::new(
            http_client(Duration::from_secs(5)).unwrap(),
            format!("{}{path}", server.url()),
        )
    }

    #[tokio::test]
    async fn posts_json_and_reads_ack() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hooks/abc")
            .match_body(Matcher::PartialJson(json!({
                "text": "Forecaster (05:14): issue Thunderstorm Warning.",
                "attachments": [{ "title": "Thunderstorm Warning", "color": "red" }]
            })))
            .with_status(200)
            .with_body(r#"{"success":true}"#)
            .create_async()
            .await;

        let ack = channel(&server, "/hooks/abc").send(&message()).await.unwrap();
        assert!(ack.success);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn negative_ack_is_not_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/hooks/abc")
            .with_status(200)
            .with_body(r#"{"success":false,"error":"invalid token"}"#)
            .create_async()
            .await;

        let ack = channel(&server, "/hooks/abc").send(&message()).await.unwrap();
        assert!(!ack.success);
    }

    #[tokio::test]
    async fn http_failure_and_garbage_are_errors() {
        let mut server = mockito::Server::new_async().await;
        let _fail = server
            .mock("POST", "/fail")
            .with_status(500)
            .create_async()
            .await;
        let _garbage = server
            .mock("POST", "/garbage")
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;

        let err = channel(&server, "/fail").send(&message()).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Status(500)));
        let err = channel(&server, "/garbage").send(&message()).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Decode(_)));
    }
}
