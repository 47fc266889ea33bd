use axum::Json;

use crate::api::response::{CurrentSession, JSend};
use crate::session::Session;

pub async fn current_session(CurrentSession(session): CurrentSession) -> Json<JSend<Session>> {
    JSend::success(session)
}
