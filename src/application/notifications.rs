//! "New post" e-mail fan-out.

use std::sync::Arc;

use futures::future::join_all;
use metrics::counter;
use serde::Serialize;
use tracing::{info, warn};

use crate::application::gateways::{Mailer, PostNotificationEmail};
use crate::application::repos::ProfilesRepo;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FanoutReport {
    pub recipients: usize,
    pub delivered: usize,
    pub failed: usize,
    /// The recipient query itself failed; nothing was sent.
    pub recipients_unavailable: bool,
}

#[derive(Clone)]
pub struct NotificationFanout {
    profiles: Arc<dyn ProfilesRepo>,
    mailer: Arc<dyn Mailer>,
}

impl NotificationFanout {
    pub fn new(profiles: Arc<dyn ProfilesRepo>, mailer: Arc<dyn Mailer>) -> Self {
        Self { profiles, mailer }
    }

    /// Sends one message per subscribed profile and waits for every send to settle.
    /// Failures are logged and counted, never returned.
    pub async fn announce(&self, title: &str, post_url: &str) -> FanoutReport {
        let profiles = match self.profiles.list_notification_recipients().await {
            Ok(profiles) => profiles,
            Err(err) => {
                warn!(
                    target = "blogdeck::application::notifications",
                    error = %err,
                    "could not load notification recipients"
                );
                return FanoutReport {
                    recipients_unavailable: true,
                    ..FanoutReport::default()
                };
            }
        };

        let messages: Vec<PostNotificationEmail> = profiles
            .into_iter()
            .filter(|profile| profile.receives_notifications())
            .filter_map(|profile| profile.email)
            .map(|to_email| PostNotificationEmail {
                to_email,
                title: title.to_string(),
                post_url: post_url.to_string(),
            })
            .collect();

        if messages.is_empty() {
            return FanoutReport::default();
        }

        let sends = messages
            .iter()
            .map(|message| self.mailer.send_post_notification(message));
        let outcomes = join_all(sends).await;

        let mut report = FanoutReport {
            recipients: messages.len(),
            ..FanoutReport::default()
        };
        for (message, outcome) in messages.iter().zip(outcomes) {
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    report.failed += 1;
                    warn!(
                        target = "blogdeck::application::notifications",
                        recipient = %message.to_email,
                        error = %err,
                        "notification e-mail failed"
                    );
                }
            }
        }

        counter!("blogdeck_notification_sent_total").increment(report.delivered as u64);
        counter!("blogdeck_notification_failed_total").increment(report.failed as u64);
        info!(
            target = "blogdeck::application::notifications",
            recipients = report.recipients,
            delivered = report.delivered,
            failed = report.failed,
            "post notification fan-out finished"
        );

        report
    }
}
