use crate::models::Notification;
use crate::prelude::*;
use crate::schema::notifications;

#[derive(Insertable)]
#[diesel(table_name = notifications)]
struct NewNotification<'a> {
    user_id: i32,
    kind: &'a str,
    title: &'a str,
    message: String,
}

/// Append a notification row for `user_id`. Runs on an open connection so
/// callers can include it in their own transaction.
pub fn notify(
    conn: &mut PgConnection,
    user_id: i32,
    kind: &str,
    title: &str,
    message: String,
) -> QueryResult<usize> {
    diesel::insert_into(notifications::table)
        .values(NewNotification {
            user_id,
            kind,
            title,
            message,
        })
        .execute(conn)
}

pub async fn list_notifications(
    Extension(user): Extension<AuthUser>,
    State(state): State<Context>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let conn = state.pool.get().await.map_err(internal_error)?;

    let rows = conn
        .interact(move |conn| {
            notifications::table
                .filter(notifications::user_id.eq(user.user_id))
                .order(notifications::created_at.desc())
                .select(Notification::as_select())
                .load(conn)
        })
        .await
        .map_err(internal_error)?
        .map_err(internal_error)?;

    Ok(Json(rows))
}

pub async fn mark_notification_read(
    Extension(user): Extension<AuthUser>,
    State(state): State<Context>,
    Path(id): Path<i32>,
) -> Result<Json<Notification>, ApiError> {
    let conn = state.pool.get().await.map_err(internal_error)?;

    let row = conn
        .interact(move |conn| {
            diesel::update(
                notifications::table
                    .filter(notifications::id.eq(id))
                    .filter(notifications::user_id.eq(user.user_id)),
            )
            .set(notifications::is_read.eq(true))
            .returning(Notification::as_returning())
            .get_result(conn)
            .optional()
        })
        .await
        .map_err(internal_error)?
        .map_err(internal_error)?
        .ok_or_else(|| not_found("no such notification"))?;

    Ok(Json(row))
}

pub async fn mark_all_notifications_read(
    Extension(user): Extension<AuthUser>,
    State(state): State<Context>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let conn = state.pool.get().await.map_err(internal_error)?;

    let updated = conn
        .interact(move |conn| {
            diesel::update(
                notifications::table
                    .filter(notifications::user_id.eq(user.user_id))
                    .filter(notifications::is_read.eq(false)),
            )
            .set(notifications::is_read.eq(true))
            .execute(conn)
        })
        .await
        .map_err(internal_error)?
        .map_err(internal_error)?;

    Ok(Json(serde_json::json!({ "marked_read": updated })))
}
