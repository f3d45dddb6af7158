use crate::errors::AppError;
use crate::models::{DashboardResponse, InteractionRequest, SessionQuery};
use crate::render::render;
use crate::session::Interaction;
use crate::state::AppState;
use crate::ui::render_index;
use axum::{
    extract::{Query, State},
    response::{Html, Redirect},
    Json,
};
use tracing::{debug, error, info};

const DEFAULT_SESSION: &str = "default";
const MAX_SESSION_LEN: usize = 64;

pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Result<Html<String>, AppError> {
    let session = session_id(query)?;
    let response = dashboard(&state, session).await;
    Ok(Html(render_index(&response)))
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn get_dashboard(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<DashboardResponse>, AppError> {
    let session = session_id(query)?;
    Ok(Json(dashboard(&state, session).await))
}

pub async fn interaction(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    Json(payload): Json<InteractionRequest>,
) -> Result<Json<DashboardResponse>, AppError> {
    let session = session_id(query)?;

    if let Some(interaction) = Interaction::from_request(payload) {
        apply_interaction(&state, &session, interaction).await;
    } else {
        debug!(%session, "ignored click without points");
    }

    Ok(Json(dashboard(&state, session).await))
}

pub async fn reset_form(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Result<Redirect, AppError> {
    let session = session_id(query)?;
    apply_interaction(&state, &session, Interaction::Reset).await;
    Ok(Redirect::to(&format!("/?session={session}")))
}

async fn apply_interaction(state: &AppState, session: &str, interaction: Interaction) {
    let mut sessions = state.sessions.lock().await;
    let selection = sessions.entry(session.to_string()).or_default();
    info!(%session, ?interaction, "applying interaction");
    selection.apply(interaction, state.config.grid_selection);
    // an absent entry already reads as the empty selection
    if selection.is_empty() {
        sessions.remove(session);
    }
}

/// Load (or reuse) the dataset and render it for the session's selection.
/// A load failure becomes a diagnostic in the response instead of an error.
async fn dashboard(state: &AppState, session: String) -> DashboardResponse {
    let selection = state.selection(&session).await;

    match state
        .cache
        .get_or_load(&state.config.data_path, &state.config.load)
        .await
    {
        Ok(dataset) => DashboardResponse {
            view: Some(render(&dataset, &selection)),
            error: None,
            selection,
            session,
        },
        Err(err) => {
            error!("failed to load tree data: {err}");
            DashboardResponse {
                view: None,
                error: Some(err.to_string()),
                selection,
                session,
            }
        }
    }
}

fn session_id(query: SessionQuery) -> Result<String, AppError> {
    let Some(session) = query.session.filter(|value| !value.is_empty()) else {
        return Ok(DEFAULT_SESSION.to_string());
    };
    let valid = session.len() <= MAX_SESSION_LEN
        && session
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(AppError::bad_request(
            "session must be at most 64 characters of letters, digits, '-' or '_'",
        ));
    }
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DashboardConfig, GridSelectionMode, LoadOptions};
    use std::path::PathBuf;

    fn state() -> AppState {
        AppState::new(DashboardConfig {
            data_path: PathBuf::from("unused.csv"),
            port: 0,
            load: LoadOptions::default(),
            grid_selection: GridSelectionMode::Replace,
        })
    }

    fn query(session: Option<&str>) -> SessionQuery {
        SessionQuery {
            session: session.map(str::to_string),
        }
    }

    #[test]
    fn session_defaults_and_validation() {
        assert_eq!(session_id(query(None)).unwrap(), DEFAULT_SESSION);
        assert_eq!(session_id(query(Some(""))).unwrap(), DEFAULT_SESSION);
        assert_eq!(session_id(query(Some("tab-1_a"))).unwrap(), "tab-1_a");
        assert!(session_id(query(Some("../etc"))).is_err());
        assert!(session_id(query(Some(&"x".repeat(65)))).is_err());
    }

    #[tokio::test]
    async fn cleared_sessions_are_evicted() {
        let state = state();
        apply_interaction(&state, "a", Interaction::ClickGridBar(vec!["G1".to_string()])).await;
        apply_interaction(&state, "b", Interaction::ClickDatePoint("01/01".to_string())).await;
        assert_eq!(state.sessions.lock().await.len(), 2);

        apply_interaction(&state, "a", Interaction::Reset).await;
        apply_interaction(&state, "b", Interaction::SelectGridCells(Default::default())).await;
        assert!(state.sessions.lock().await.contains_key("b"));

        apply_interaction(&state, "b", Interaction::Reset).await;
        apply_interaction(&state, "c", Interaction::Reset).await;
        assert!(state.sessions.lock().await.is_empty());
        assert!(state.selection("a").await.is_empty());
    }
}
