//! Telegram alert sink
//!
//! Sends motion notifications via `sendMessage` and finalized clips via
//! `sendVideo` (multipart upload).

use super::AlertSink;
use crate::config::GlobalSettings;
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::Duration;

const API_BASE_URL: &str = "https://api.telegram.org";

pub struct TelegramAlertSink {
    client: reqwest::Client,
    bot_token: String,
    chat_id: String,
}

impl TelegramAlertSink {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            bot_token,
            chat_id,
        }
    }

    /// Construct from global settings when both token and chat id are set
    pub fn from_settings(settings: &GlobalSettings) -> Option<Self> {
        match (&settings.telegram_bot_token, &settings.telegram_chat_id) {
            (Some(token), Some(chat_id)) if !token.is_empty() && !chat_id.is_empty() => {
                Some(Self::new(token.clone(), chat_id.clone()))
            }
            _ => None,
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", API_BASE_URL, self.bot_token, method)
    }
}

#[async_trait]
impl AlertSink for TelegramAlertSink {
    async fn notify_motion(&self, camera_name: &str, at: DateTime<Utc>) -> Result<()> {
        let text = format!(
            "Motion detected!\n\nCamera: {}\nTime: {}",
            camera_name,
            at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&serde_json::json!({
                "chat_id": self.chat_id,
                "text": text,
            }))
            .send()
            .await
            .map_err(|e| Error::AlertDelivery(format!("sendMessage failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::AlertDelivery(format!(
                "sendMessage returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn deliver_clip(&self, camera_name: &str, file_path: &Path) -> Result<()> {
        let video = tokio::fs::read(file_path)
            .await
            .map_err(|e| Error::AlertDelivery(format!("clip read failed: {}", e)))?;

        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "clip.avi".to_string());

        let form = reqwest::multipart::Form::new()
            .text("chat_id", self.chat_id.clone())
            .text("caption", format!("Motion recording - {}", camera_name))
            .part(
                "video",
                reqwest::multipart::Part::bytes(video).file_name(file_name),
            );

        let response = self
            .client
            .post(self.method_url("sendVideo"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::AlertDelivery(format!("sendVideo failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::AlertDelivery(format!(
                "sendVideo returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_settings_requires_both_credentials() {
        let mut settings = GlobalSettings::default();
        assert!(TelegramAlertSink::from_settings(&settings).is_none());

        settings.telegram_bot_token = Some("123:abc".to_string());
        assert!(TelegramAlertSink::from_settings(&settings).is_none());

        settings.telegram_chat_id = Some("-100200".to_string());
        assert!(TelegramAlertSink::from_settings(&settings).is_some());
    }
}
