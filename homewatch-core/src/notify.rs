//! Alert delivery behind the mute gate.
//!
//! Monitors never talk to a delivery channel directly. They hand alerts to
//! the [`NotificationGate`], which consults the live mute status and either
//! forwards to the injected [`Notifier`] or drops the alert. Delivery
//! failures are logged and swallowed: a broken notification channel must
//! never take the monitoring pipeline down with it.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::settings::{MuteStatus, Settings, SettingsStore};

/// Errors from a notification channel.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The channel accepted the alert but could not deliver it
    #[error("failed to deliver notification: {0}")]
    Delivery(String),

    /// The channel is not available at all
    #[error("notification channel unavailable: {0}")]
    Unavailable(String),
}

/// An alert delivery channel.
///
/// Implementations are injected into [`NotificationGate`]; the core ships
/// only [`LogNotifier`], a shell wires in something real (push, SMS, a
/// desktop tray).
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one alert with a short title and a longer body.
    async fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError>;
}

/// A [`Notifier`] that writes alerts to the log. Useful as a default sink
/// and in headless deployments.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        tracing::info!(title, body, "alert");
        Ok(())
    }
}

/// The mute choices offered to the user, in menu order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuteOption {
    /// Re-enable alerts
    Enable,
    /// Mute indefinitely
    Mute,
    /// Mute for the next 15 minutes
    MuteFifteenMinutes,
    /// Mute for the next 24 hours
    MuteForADay,
}

impl MuteOption {
    /// Every option, in the order a menu should present them.
    pub const ALL: [MuteOption; 4] = [
        MuteOption::Enable,
        MuteOption::Mute,
        MuteOption::MuteFifteenMinutes,
        MuteOption::MuteForADay,
    ];

    /// The label a menu shows for this option.
    pub fn label(&self) -> &'static str {
        match self {
            MuteOption::Enable => "Enable",
            MuteOption::Mute => "Mute",
            MuteOption::MuteFifteenMinutes => "Mute for 15 minutes",
            MuteOption::MuteForADay => "Mute for a day",
        }
    }

    fn to_status(self) -> MuteStatus {
        match self {
            MuteOption::Enable => MuteStatus::Enabled,
            MuteOption::Mute => MuteStatus::Muted,
            MuteOption::MuteFifteenMinutes => MuteStatus::MutedUntil(Utc::now() + Duration::minutes(15)),
            MuteOption::MuteForADay => MuteStatus::MutedUntil(Utc::now() + Duration::hours(24)),
        }
    }
}

/// Gatekeeper between alert producers and the delivery channel.
///
/// Consults [`SettingsStore`] on every alert, so a mute takes effect for
/// the very next alert without any monitor restart.
pub struct NotificationGate {
    settings: Arc<SettingsStore>,
    notifier: Arc<dyn Notifier>,
}

impl NotificationGate {
    pub fn new(settings: Arc<SettingsStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { settings, notifier }
    }

    /// Whether alerts are currently suppressed.
    ///
    /// An expired timed mute reverts the persisted status to
    /// [`MuteStatus::Enabled`] before answering, so the revert survives a
    /// restart.
    pub async fn is_suppressed(&self) -> bool {
        match self.settings.get().await.mute_status {
            MuteStatus::Enabled => false,
            MuteStatus::Muted => true,
            MuteStatus::MutedUntil(until) => {
                if Utc::now() < until {
                    true
                } else {
                    let settings = self.settings.get().await;
                    self.settings
                        .set(Settings {
                            mute_status: MuteStatus::Enabled,
                            ..settings
                        })
                        .await;
                    false
                }
            }
        }
    }

    /// Deliver one alert, unless muted.
    ///
    /// Suppressed alerts vanish without a trace beyond a debug log entry;
    /// delivery failures are logged and swallowed.
    pub async fn fire(&self, title: &str, body: &str) {
        if self.is_suppressed().await {
            tracing::debug!(title, "alert suppressed by mute status");
            return;
        }
        if let Err(error) = self.notifier.notify(title, body).await {
            tracing::warn!(%error, title, "failed to deliver alert");
        }
    }

    /// Apply one of the user-facing mute choices.
    ///
    /// Returns the settings record after the change.
    pub async fn set_mute(&self, option: MuteOption) -> Settings {
        let current = self.settings.get().await;
        self.settings
            .set(Settings {
                mute_status: option.to_status(),
                ..current
            })
            .await
    }
}

impl std::fmt::Debug for NotificationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationGate").finish_non_exhaustive()
    }
}
