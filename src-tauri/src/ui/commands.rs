use std::sync::Arc;

use tauri::State;
use tokio::sync::Mutex;

use crate::{
    meter::{exposure::CalcMode, MeterSession, MeterSnapshot},
    settings::MeterSettings,
    ui::selection::{Choices, Control, Selection},
};

use crate::AppState;

fn session_from_state(state: &State<'_, AppState>) -> Arc<Mutex<MeterSession>> {
    state.session.clone()
}

#[tauri::command]
pub async fn get_choices(state: State<'_, AppState>) -> Result<Choices, String> {
    let session = session_from_state(&state);
    let guard = session.lock().await;
    Ok(Choices::new(guard.profiles()))
}

#[tauri::command]
pub async fn get_selection(state: State<'_, AppState>) -> Result<Selection, String> {
    let session = session_from_state(&state);
    let guard = session.lock().await;
    Ok(guard.selection.clone())
}

#[tauri::command]
pub async fn select_value(
    state: State<'_, AppState>,
    control: Control,
    value: String,
) -> Result<(), String> {
    let session = session_from_state(&state);
    let mut guard = session.lock().await;
    guard
        .selection
        .select(control, &value)
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn set_calc_mode(state: State<'_, AppState>, mode: CalcMode) -> Result<(), String> {
    let session = session_from_state(&state);
    session.lock().await.selection.calc_mode = mode;
    Ok(())
}

#[tauri::command]
pub async fn set_flash_mode(state: State<'_, AppState>, enabled: bool) -> Result<(), String> {
    let session = session_from_state(&state);
    session.lock().await.selection.flash = enabled;
    Ok(())
}

#[tauri::command]
pub async fn set_profile(state: State<'_, AppState>, name: String) -> Result<(), String> {
    let session = session_from_state(&state);
    let mut guard = session.lock().await;
    guard.set_profile(&name).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn set_high_gain(state: State<'_, AppState>, enabled: bool) -> Result<(), String> {
    let session = session_from_state(&state);
    session.lock().await.selection.set_high_gain(enabled);
    Ok(())
}

#[tauri::command]
pub async fn set_custom_time(state: State<'_, AppState>, ms: u16) -> Result<(), String> {
    let session = session_from_state(&state);
    let mut guard = session.lock().await;
    guard.selection.set_custom_time(ms).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn get_meter_snapshot(state: State<'_, AppState>) -> Result<MeterSnapshot, String> {
    let session = session_from_state(&state);
    let guard = session.lock().await;
    Ok(guard.snapshot())
}

#[tauri::command]
pub fn get_meter_settings(state: State<'_, AppState>) -> Result<MeterSettings, String> {
    Ok(state.settings.meter())
}

#[tauri::command]
pub async fn set_meter_settings(
    state: State<'_, AppState>,
    settings: MeterSettings,
) -> Result<(), String> {
    state
        .settings
        .update_meter(settings.clone())
        .map_err(|e| e.to_string())?;

    let session = session_from_state(&state);
    session.lock().await.apply_settings(&settings);
    Ok(())
}
