use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::info;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::settings::MeterSettings;
use crate::ui::view::MeterView;

use super::bridge::MeterBridge;
use super::loop_worker::meter_loop;
use super::session::MeterSession;

/// Owns the polling task and the session it drives.
pub struct MeterController {
    session: Arc<Mutex<MeterSession>>,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl MeterController {
    pub fn new(settings: &MeterSettings, verbose: bool) -> Result<Self> {
        let session = MeterSession::new(Uuid::new_v4().to_string(), settings, verbose)?;
        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            handle: None,
            cancel_token: None,
        })
    }

    pub fn session(&self) -> Arc<Mutex<MeterSession>> {
        Arc::clone(&self.session)
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub async fn start(
        &mut self,
        bridge: Box<dyn MeterBridge>,
        view: Box<dyn MeterView>,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("meter already running");
        }

        let cancel_token = CancellationToken::new();
        let session_id = self.session.lock().await.id().to_string();
        info!("Starting meter session {session_id}");

        let handle = tokio::spawn(meter_loop(
            self.session(),
            bridge,
            view,
            cancel_token.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("meter loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meter::bridge::testing::ScriptedBridge;
    use crate::ui::view::testing::RecordingView;
    use tokio::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn start_stop_lifecycle() {
        let mut controller = MeterController::new(&MeterSettings::default(), false).unwrap();
        assert!(!controller.is_running());

        let bridge = ScriptedBridge::new(&[]).repeating("lux: 250.0");
        controller
            .start(Box::new(bridge), Box::new(RecordingView::default()))
            .await
            .unwrap();
        assert!(controller.is_running());

        let second = controller
            .start(
                Box::new(ScriptedBridge::new(&[])),
                Box::new(RecordingView::default()),
            )
            .await;
        assert!(second.is_err());

        tokio::time::sleep(Duration::from_millis(1000)).await;
        {
            let session = controller.session();
            let guard = session.lock().await;
            assert_eq!(guard.state.lux, 250.0);
            assert_eq!(guard.snapshot().state.stats.max, 250.0);
        }

        controller.stop().await.unwrap();
        assert!(!controller.is_running());
        controller.stop().await.unwrap();
    }
}
