pub mod meter;
pub mod settings;
pub mod ui;
mod utils;

use meter::{MeterController, SimulatedBridge};
use settings::{EnvOverrides, SettingsStore};

#[cfg(feature = "desktop")]
use std::sync::Arc;
#[cfg(feature = "desktop")]
use tauri::Manager;
#[cfg(feature = "desktop")]
use tokio::sync::Mutex;
#[cfg(feature = "desktop")]
use ui::commands::{
    get_choices, get_meter_settings, get_meter_snapshot, get_selection, select_value,
    set_calc_mode, set_custom_time, set_flash_mode, set_high_gain, set_meter_settings,
    set_profile,
};

#[cfg(feature = "desktop")]
pub(crate) struct AppState {
    pub(crate) meter: Mutex<MeterController>,
    pub(crate) session: Arc<Mutex<meter::MeterSession>>,
    pub(crate) settings: SettingsStore,
}

fn init_logging() {
    // RUST_LOG wins when set
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// Puts a fresh session into the profile requested through the environment.
async fn apply_start_profile(controller: &MeterController, env: &EnvOverrides) {
    let Some(name) = env.profile.as_deref() else {
        return;
    };
    let session = controller.session();
    let mut guard = session.lock().await;
    if let Err(err) = guard.set_profile(name) {
        log::warn!("Ignoring BLM_PROFILE: {err:#}");
    }
}

#[cfg(feature = "desktop")]
fn run_desktop(env: EnvOverrides) {
    use ui::view::TauriView;

    let app = tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .setup(move |app| {
            let result = (|| -> anyhow::Result<()> {
                let app_data_dir = app
                    .path()
                    .app_data_dir()
                    .map_err(|err| anyhow::anyhow!(err))?;
                std::fs::create_dir_all(&app_data_dir)?;

                let settings_path = app_data_dir.join("settings.json");
                let settings_store = SettingsStore::new(settings_path)?;

                let mut controller = MeterController::new(&settings_store.meter(), env.debug)?;
                let session = controller.session();
                let view = TauriView::new(app.handle().clone());
                tauri::async_runtime::block_on(async {
                    apply_start_profile(&controller, &env).await;
                    controller
                        .start(Box::new(SimulatedBridge::new(env.sim_lux)), Box::new(view))
                        .await
                })?;

                app.manage(AppState {
                    meter: Mutex::new(controller),
                    session,
                    settings: settings_store,
                });

                Ok(())
            })();

            result.map_err(|err| err.into())
        })
        .invoke_handler(tauri::generate_handler![
            get_choices,
            get_selection,
            select_value,
            set_calc_mode,
            set_flash_mode,
            set_profile,
            set_high_gain,
            set_custom_time,
            get_meter_snapshot,
            get_meter_settings,
            set_meter_settings,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application");

    app.run(|app_handle, event| {
        if let tauri::RunEvent::Exit = event {
            let state = app_handle.state::<AppState>();
            tauri::async_runtime::block_on(async {
                if let Err(err) = state.meter.lock().await.stop().await {
                    log::error!("Failed to stop meter: {err:#}");
                }
            });
        }
    });
}

/// Runs the meter against the simulated sensor, logging readouts until Ctrl-C.
#[cfg(not(feature = "desktop"))]
fn run_headless(env: EnvOverrides) -> anyhow::Result<()> {
    use anyhow::Context;
    use ui::view::LogView;

    let settings_store = SettingsStore::new(env.settings_path.clone())?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(async {
        let mut controller = MeterController::new(&settings_store.meter(), env.debug)?;
        apply_start_profile(&controller, &env).await;
        controller
            .start(
                Box::new(SimulatedBridge::new(env.sim_lux)),
                Box::new(LogView::new()),
            )
            .await?;

        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl-C")?;
        log::info!("Stopping meter");
        controller.stop().await
    })
}

#[cfg_attr(all(feature = "desktop", mobile), tauri::mobile_entry_point)]
pub fn run() {
    init_logging();
    log::info!("BlueLightMeter starting up...");

    let env = EnvOverrides::from_env();

    #[cfg(feature = "desktop")]
    run_desktop(env);

    #[cfg(not(feature = "desktop"))]
    if let Err(err) = run_headless(env) {
        log::error!("Meter stopped with an error: {err:#}");
        std::process::exit(1);
    }
}
