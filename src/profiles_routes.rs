use crate::models::{TouristProfile, UserRole};
use crate::prelude::*;
use crate::schema::tourist_profiles;

/// Tourist profile for the authenticated user, used by booking handlers.
pub fn own_profile(conn: &mut PgConnection, user_id: i32) -> QueryResult<Option<TouristProfile>> {
    tourist_profiles::table
        .filter(tourist_profiles::user_id.eq(user_id))
        .select(TouristProfile::as_select())
        .first(conn)
        .optional()
}

#[derive(Deserialize)]
pub struct UpsertProfile {
    pub name: String,
    pub location: Option<String>,
}

pub async fn upsert_tourist_profile(
    Extension(user): Extension<AuthUser>,
    State(state): State<Context>,
    Json(body): Json<UpsertProfile>,
) -> Result<Json<TouristProfile>, ApiError> {
    user.require(UserRole::Tourist)?;
    if body.name.trim().is_empty() {
        return Err(bad_request("name must not be empty"));
    }

    let conn = state.pool.get().await.map_err(internal_error)?;

    let profile = conn
        .interact(move |conn| -> QueryResult<TouristProfile> {
            let name = body.name.trim().to_string();
            match own_profile(conn, user.user_id)? {
                Some(existing) => diesel::update(tourist_profiles::table.find(existing.id))
                    .set((
                        tourist_profiles::name.eq(name),
                        tourist_profiles::location.eq(body.location),
                    ))
                    .returning(TouristProfile::as_returning())
                    .get_result(conn),
                None => diesel::insert_into(tourist_profiles::table)
                    .values((
                        tourist_profiles::user_id.eq(user.user_id),
                        tourist_profiles::name.eq(name),
                        tourist_profiles::location.eq(body.location),
                    ))
                    .returning(TouristProfile::as_returning())
                    .get_result(conn),
            }
        })
        .await
        .map_err(internal_error)?
        .map_err(internal_error)?;

    Ok(Json(profile))
}

pub async fn get_tourist_profile(
    Extension(user): Extension<AuthUser>,
    State(state): State<Context>,
) -> Result<Json<TouristProfile>, ApiError> {
    let conn = state.pool.get().await.map_err(internal_error)?;

    let profile = conn
        .interact(move |conn| own_profile(conn, user.user_id))
        .await
        .map_err(internal_error)?
        .map_err(internal_error)?
        .ok_or_else(|| not_found("no tourist profile for this user"))?;

    Ok(Json(profile))
}
