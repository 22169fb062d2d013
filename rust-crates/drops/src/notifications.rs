use crate::{
    Error,
    Result,
    address::Address,
    model::DropId,
};
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{
    info,
    warn,
};
use uuid::Uuid;

pub const DROP_CREATED_TITLE: &str = "🔥 New FireBall Drop Created";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub target_url: String,
    pub uuid: String,
}

/// Body posted to the relay. An empty `targetFids` reaches every user that
/// enabled notifications.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayRequest<'a> {
    target_fids: &'a [u64],
    notification: &'a Notification,
}

pub fn new_uuid() -> String {
    Uuid::new_v4().to_string()
}

pub fn drop_created_notification(
    app_origin: &str,
    creator: &Address,
    drop_id: DropId,
    amount: &str,
    currency: &str,
) -> Notification {
    Notification {
        title: DROP_CREATED_TITLE.to_string(),
        body: format!(
            "{} created a new drop with {amount} {currency}",
            creator.short()
        ),
        target_url: format!("{}/drop/{drop_id}", app_origin.trim_end_matches('/')),
        uuid: new_uuid(),
    }
}

/// Posts notifications to the app's relay endpoint.
#[derive(Clone)]
pub struct NotificationRelay {
    url: String,
    app_origin: String,
    http: reqwest::Client,
}

impl NotificationRelay {
    pub fn new(url: impl Into<String>, app_origin: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            url: url.into(),
            app_origin: app_origin.into(),
            http,
        })
    }

    async fn post(&self, target_fids: &[u64], notification: &Notification) -> Result<()> {
        let body = serde_json::to_vec(&RelayRequest {
            target_fids,
            notification,
        })?;
        let res = self
            .http
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        let status = res.status();
        if !status.is_success() {
            let body = res
                .text()
                .await
                .unwrap_or_else(|_| "<unavailable body>".to_string());
            return Err(Error::UnexpectedStatus {
                service: "notification relay",
                status: status.as_u16(),
                body,
            });
        }
        info!(uuid = %notification.uuid, title = %notification.title, "notification sent");
        Ok(())
    }

    /// Sends to the given users only. Nothing is sent when `target_fids` is
    /// empty, since the relay would read that as a broadcast.
    pub async fn send_targeted(
        &self,
        target_fids: &[u64],
        title: &str,
        body: &str,
        target_url: &str,
    ) -> Result<()> {
        if target_fids.is_empty() {
            warn!("no target fids for targeted notification");
            return Ok(());
        }
        let notification = Notification {
            title: title.to_string(),
            body: body.to_string(),
            target_url: target_url.to_string(),
            uuid: new_uuid(),
        };
        self.post(target_fids, &notification).await
    }

    /// Broadcasts a new drop in the background. Failures are only logged.
    pub fn notify_drop_created(
        &self,
        creator: Address,
        drop_id: DropId,
        amount: String,
        currency: String,
    ) -> JoinHandle<()> {
        let relay = self.clone();
        tokio::spawn(async move {
            let notification = drop_created_notification(
                &relay.app_origin,
                &creator,
                drop_id,
                &amount,
                &currency,
            );
            if let Err(error) = relay.post(&[], &notification).await {
                warn!(drop_id, %error, "drop creation notification failed");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn new_uuid__is_version_four() {
        let uuid = new_uuid();
        let groups: Vec<_> = uuid.split('-').map(str::len).collect();
        assert_eq!(groups, vec![8, 4, 4, 4, 12]);
        assert_eq!(&uuid[14..15], "4");
        assert!(matches!(&uuid[19..20], "8" | "9" | "a" | "b"));
        assert_ne!(uuid, new_uuid());
    }

    #[test]
    fn drop_created_notification__formats_title_body_and_link() {
        // given
        let creator: Address = "0x1234567890abcdef1234567890abcdef12345678".parse().unwrap();

        // when
        let notification =
            drop_created_notification("https://fireball.example/", &creator, 12, "0.5", "ETH");

        // then
        assert_eq!(notification.title, "🔥 New FireBall Drop Created");
        assert_eq!(
            notification.body,
            "0x1234...5678 created a new drop with 0.5 ETH"
        );
        assert_eq!(notification.target_url, "https://fireball.example/drop/12");
    }

    #[test]
    fn relay_request__serializes_expected_shape() {
        // given
        let notification = Notification {
            title: "t".to_string(),
            body: "b".to_string(),
            target_url: "https://x/drop/1".to_string(),
            uuid: "u".to_string(),
        };

        // when
        let json = serde_json::to_value(RelayRequest {
            target_fids: &[3, 4],
            notification: &notification,
        })
        .unwrap();

        // then
        assert_eq!(
            json,
            serde_json::json!({
                "targetFids": [3, 4],
                "notification": {
                    "title": "t",
                    "body": "b",
                    "target_url": "https://x/drop/1",
                    "uuid": "u"
                }
            })
        );
    }

    #[tokio::test]
    async fn send_targeted__skips_empty_recipients() {
        let relay = NotificationRelay::new("http://127.0.0.1:9/unreachable", "http://app").unwrap();
        assert!(relay.send_targeted(&[], "t", "b", "u").await.is_ok());
    }

    #[tokio::test]
    async fn notify_drop_created__swallows_delivery_failure() {
        // given
        let relay = NotificationRelay::new("http://127.0.0.1:9/unreachable", "http://app").unwrap();

        // when
        let handle = relay.notify_drop_created(Address::from_low_u64(1), 4, "1".into(), "ETH".into());

        // then
        assert!(handle.await.is_ok());
    }
}
