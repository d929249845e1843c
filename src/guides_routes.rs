use std::collections::HashMap;

use chrono::NaiveDate;

use crate::booking::window_covers;
use crate::models::{Availability, Guide, GuideStatus, Itinerary, UserRole};
use crate::notifications_routes::notify;
use crate::prelude::*;
use crate::schema::{guide_availability, guide_itineraries, guides};

pub const PRICE_TYPES: [&str; 2] = ["per_day", "fixed"];

// ---------------------------------------------------------------------------
// Public catalogue
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct GuideFilter {
    pub language: Option<String>,
    pub date: Option<NaiveDate>,
}

#[derive(Serialize)]
pub struct GuideListing {
    #[serde(flatten)]
    pub guide: Guide,
    pub availability: Option<Availability>,
}

#[derive(Serialize)]
pub struct GuideDetail {
    #[serde(flatten)]
    pub guide: Guide,
    pub availability: Option<Availability>,
    pub itineraries: Vec<Itinerary>,
}

/// Latest availability per guide, last-created row wins.
fn latest_windows(
    conn: &mut PgConnection,
    guide_ids: &[i32],
) -> QueryResult<HashMap<i32, Availability>> {
    let rows: Vec<Availability> = guide_availability::table
        .filter(guide_availability::guide_id.eq_any(guide_ids))
        .order(guide_availability::id.asc())
        .select(Availability::as_select())
        .load(conn)?;

    let mut latest = HashMap::new();
    for row in rows {
        latest.insert(row.guide_id, row);
    }
    Ok(latest)
}

pub async fn list_guides(
    State(state): State<Context>,
    Query(filter): Query<GuideFilter>,
) -> Result<Json<Vec<GuideListing>>, ApiError> {
    let conn = state.pool.get().await.map_err(internal_error)?;

    let listings = conn
        .interact(move |conn| -> QueryResult<Vec<GuideListing>> {
            let mut query = guides::table
                .filter(guides::status.eq(GuideStatus::Approved.as_str()))
                .filter(guides::is_deactivated.eq(false))
                .into_boxed();
            if let Some(language) = &filter.language {
                query = query.filter(guides::languages.contains(vec![language.clone()]));
            }

            let rows: Vec<Guide> = query.select(Guide::as_select()).load(conn)?;
            let ids: Vec<i32> = rows.iter().map(|g| g.id).collect();
            let mut windows = latest_windows(conn, &ids)?;

            let listings = rows
                .into_iter()
                .map(|guide| {
                    let availability = windows.remove(&guide.id);
                    GuideListing {
                        guide,
                        availability,
                    }
                })
                .filter(|l| match (filter.date, &l.availability) {
                    (None, _) => true,
                    (Some(_), None) => false,
                    (Some(date), Some(w)) => {
                        window_covers(w.start_date, w.end_date, w.is_available, date)
                    }
                })
                .collect();
            Ok(listings)
        })
        .await
        .map_err(internal_error)?
        .map_err(internal_error)?;

    Ok(Json(listings))
}

pub async fn get_guide(
    State(state): State<Context>,
    Path(id): Path<i32>,
) -> Result<Json<GuideDetail>, ApiError> {
    let conn = state.pool.get().await.map_err(internal_error)?;

    let detail = conn
        .interact(move |conn| -> QueryResult<Option<GuideDetail>> {
            let guide: Option<Guide> = guides::table
                .find(id)
                .select(Guide::as_select())
                .first(conn)
                .optional()?;
            let guide = match guide {
                Some(g) => g,
                None => return Ok(None),
            };

            let availability = latest_windows(conn, &[guide.id])?.remove(&guide.id);
            let itineraries = guide_itineraries::table
                .filter(guide_itineraries::guide_id.eq(guide.id))
                .order(guide_itineraries::id.asc())
                .select(Itinerary::as_select())
                .load(conn)?;

            Ok(Some(GuideDetail {
                guide,
                availability,
                itineraries,
            }))
        })
        .await
        .map_err(internal_error)?
        .map_err(internal_error)?
        .ok_or_else(|| not_found("no such guide"))?;

    Ok(Json(detail))
}

// ---------------------------------------------------------------------------
// Registration & verification workflow
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct RegisterGuide {
    pub full_name: String,
    pub bio: Option<String>,
    pub languages: Vec<String>,
    pub document_path: Option<String>,
}

pub async fn register_guide(
    Extension(user): Extension<AuthUser>,
    State(state): State<Context>,
    Json(body): Json<RegisterGuide>,
) -> Result<Json<Guide>, ApiError> {
    user.require(UserRole::Guide)?;
    if body.full_name.trim().is_empty() {
        return Err(bad_request("full_name must not be empty"));
    }
    if body.languages.is_empty() {
        return Err(bad_request("at least one language is required"));
    }

    let conn = state.pool.get().await.map_err(internal_error)?;

    let guide = conn
        .interact(move |conn| {
            conn.transaction(|conn| -> Result<Guide, TxError> {
                let existing: Option<i32> = guides::table
                    .filter(guides::user_id.eq(user.user_id))
                    .select(guides::id)
                    .first(conn)
                    .optional()?;
                if existing.is_some() {
                    return Err(refuse(conflict(
                        "a guide profile already exists for this user",
                    )));
                }

                // The unique index on guides.user_id catches registrations
                // racing past the check above.
                diesel::insert_into(guides::table)
                    .values((
                        guides::user_id.eq(user.user_id),
                        guides::full_name.eq(body.full_name.trim()),
                        guides::bio.eq(body.bio),
                        guides::languages.eq(body.languages),
                        guides::document_path.eq(body.document_path),
                        guides::status.eq(GuideStatus::Pending.as_str()),
                        guides::is_deactivated.eq(false),
                        guides::trips_completed.eq(0),
                    ))
                    .returning(Guide::as_returning())
                    .get_result(conn)
                    .map_err(|e| {
                        unique_conflict(e, "a guide profile already exists for this user")
                    })
            })
        })
        .await
        .map_err(internal_error)?;
    let guide = unwrap_tx(guide)?;

    tracing::info!(guide_id = guide.id, "guide registered, pending verification");
    Ok(Json(guide))
}

#[derive(Deserialize)]
pub struct VerificationQueueFilter {
    pub status: Option<String>,
}

pub async fn admin_list_guides(
    Extension(user): Extension<AuthUser>,
    State(state): State<Context>,
    Query(filter): Query<VerificationQueueFilter>,
) -> Result<Json<Vec<Guide>>, ApiError> {
    user.require(UserRole::Admin)?;
    let status = match filter.status {
        Some(s) => Some(
            GuideStatus::from_str(&s)
                .ok_or_else(|| bad_request(format!("unknown guide status {s:?}")))?,
        ),
        None => None,
    };

    let conn = state.pool.get().await.map_err(internal_error)?;

    let rows = conn
        .interact(move |conn| {
            let mut query = guides::table.order(guides::created_at.asc()).into_boxed();
            if let Some(status) = status {
                query = query.filter(guides::status.eq(status.as_str()));
            }
            query.select(Guide::as_select()).load(conn)
        })
        .await
        .map_err(internal_error)?
        .map_err(internal_error)?;

    Ok(Json(rows))
}

#[derive(Deserialize, Default)]
pub struct VerificationDecision {
    pub reason: Option<String>,
}

async fn decide_verification(
    user: AuthUser,
    state: Context,
    guide_id: i32,
    decision: GuideStatus,
    reason: Option<String>,
) -> Result<Json<Guide>, ApiError> {
    user.require(UserRole::Admin)?;

    let conn = state.pool.get().await.map_err(internal_error)?;

    let guide = conn
        .interact(move |conn| -> QueryResult<Option<Guide>> {
            conn.transaction(|conn| {
                // Guarded update: only a pending guide can be decided on.
                let guide: Option<Guide> = diesel::update(
                    guides::table
                        .filter(guides::id.eq(guide_id))
                        .filter(guides::status.eq(GuideStatus::Pending.as_str())),
                )
                .set(guides::status.eq(decision.as_str()))
                .returning(Guide::as_returning())
                .get_result(conn)
                .optional()?;

                if let Some(guide) = &guide {
                    let (title, message) = match decision {
                        GuideStatus::Approved => (
                            "Verification approved",
                            "Your guide profile has been verified. You can now receive bookings."
                                .to_string(),
                        ),
                        _ => (
                            "Verification rejected",
                            reason.clone().unwrap_or_else(|| {
                                "Your guide profile could not be verified.".to_string()
                            }),
                        ),
                    };
                    notify(conn, guide.user_id, "verification", title, message)?;
                }
                Ok(guide)
            })
        })
        .await
        .map_err(internal_error)?
        .map_err(internal_error)?
        .ok_or_else(|| conflict("guide is not pending verification"))?;

    tracing::info!(guide_id, decision = decision.as_str(), "verification decided");
    Ok(Json(guide))
}

pub async fn approve_guide(
    Extension(user): Extension<AuthUser>,
    State(state): State<Context>,
    Path(id): Path<i32>,
) -> Result<Json<Guide>, ApiError> {
    decide_verification(user, state, id, GuideStatus::Approved, None).await
}

pub async fn reject_guide(
    Extension(user): Extension<AuthUser>,
    State(state): State<Context>,
    Path(id): Path<i32>,
    body: Option<Json<VerificationDecision>>,
) -> Result<Json<Guide>, ApiError> {
    let reason = body.and_then(|Json(b)| b.reason);
    decide_verification(user, state, id, GuideStatus::Rejected, reason).await
}

#[derive(Deserialize)]
pub struct DeactivationToggle {
    pub is_deactivated: bool,
}

pub async fn set_deactivation(
    Extension(user): Extension<AuthUser>,
    State(state): State<Context>,
    Json(body): Json<DeactivationToggle>,
) -> Result<Json<Guide>, ApiError> {
    user.require(UserRole::Guide)?;

    let conn = state.pool.get().await.map_err(internal_error)?;

    let guide = conn
        .interact(move |conn| {
            diesel::update(guides::table.filter(guides::user_id.eq(user.user_id)))
                .set(guides::is_deactivated.eq(body.is_deactivated))
                .returning(Guide::as_returning())
                .get_result(conn)
                .optional()
        })
        .await
        .map_err(internal_error)?
        .map_err(internal_error)?
        .ok_or_else(|| not_found("no guide profile for this user"))?;

    Ok(Json(guide))
}

/// Guide row for the authenticated user, used by handlers scoped to the
/// guide's own data.
pub fn own_guide(conn: &mut PgConnection, user_id: i32) -> QueryResult<Option<Guide>> {
    guides::table
        .filter(guides::user_id.eq(user_id))
        .select(Guide::as_select())
        .first(conn)
        .optional()
}

// ---------------------------------------------------------------------------
// Availability windows
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct NewWindow {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_available: bool,
}

pub async fn declare_availability(
    Extension(user): Extension<AuthUser>,
    State(state): State<Context>,
    Json(body): Json<NewWindow>,
) -> Result<Json<Availability>, ApiError> {
    user.require(UserRole::Guide)?;
    if body.start_date > body.end_date {
        return Err(bad_request("start_date must not be after end_date"));
    }

    let conn = state.pool.get().await.map_err(internal_error)?;

    let window = conn
        .interact(move |conn| -> QueryResult<Option<Availability>> {
            let guide = match own_guide(conn, user.user_id)? {
                Some(g) => g,
                None => return Ok(None),
            };
            diesel::insert_into(guide_availability::table)
                .values((
                    guide_availability::guide_id.eq(guide.id),
                    guide_availability::start_date.eq(body.start_date),
                    guide_availability::end_date.eq(body.end_date),
                    guide_availability::is_available.eq(body.is_available),
                ))
                .returning(Availability::as_returning())
                .get_result(conn)
                .map(Some)
        })
        .await
        .map_err(internal_error)?
        .map_err(internal_error)?
        .ok_or_else(|| not_found("no guide profile for this user"))?;

    Ok(Json(window))
}

pub async fn get_availability(
    Extension(user): Extension<AuthUser>,
    State(state): State<Context>,
) -> Result<Json<Option<Availability>>, ApiError> {
    user.require(UserRole::Guide)?;

    let conn = state.pool.get().await.map_err(internal_error)?;

    let window = conn
        .interact(move |conn| -> QueryResult<Option<Availability>> {
            let guide = match own_guide(conn, user.user_id)? {
                Some(g) => g,
                None => return Ok(None),
            };
            Ok(latest_windows(conn, &[guide.id])?.remove(&guide.id))
        })
        .await
        .map_err(internal_error)?
        .map_err(internal_error)?;

    Ok(Json(window))
}

// ---------------------------------------------------------------------------
// Itineraries
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct NewItinerary {
    pub title: String,
    pub number_of_days: i32,
    pub price: f32,
    pub price_type: String,
}

pub async fn create_itinerary(
    Extension(user): Extension<AuthUser>,
    State(state): State<Context>,
    Json(body): Json<NewItinerary>,
) -> Result<Json<Itinerary>, ApiError> {
    user.require(UserRole::Guide)?;
    if body.title.trim().is_empty() {
        return Err(bad_request("title must not be empty"));
    }
    if body.number_of_days < 1 {
        return Err(bad_request("number_of_days must be at least 1"));
    }
    if !body.price.is_finite() || body.price <= 0.0 {
        return Err(bad_request("price must be positive"));
    }
    if !PRICE_TYPES.contains(&body.price_type.as_str()) {
        return Err(bad_request(format!(
            "price_type must be one of {PRICE_TYPES:?}"
        )));
    }

    let conn = state.pool.get().await.map_err(internal_error)?;

    let itinerary = conn
        .interact(move |conn| -> QueryResult<Option<Itinerary>> {
            let guide = match own_guide(conn, user.user_id)? {
                Some(g) => g,
                None => return Ok(None),
            };
            diesel::insert_into(guide_itineraries::table)
                .values((
                    guide_itineraries::guide_id.eq(guide.id),
                    guide_itineraries::title.eq(body.title.trim()),
                    guide_itineraries::number_of_days.eq(body.number_of_days),
                    guide_itineraries::price.eq(body.price),
                    guide_itineraries::price_type.eq(&body.price_type),
                ))
                .returning(Itinerary::as_returning())
                .get_result(conn)
                .map(Some)
        })
        .await
        .map_err(internal_error)?
        .map_err(internal_error)?
        .ok_or_else(|| not_found("no guide profile for this user"))?;

    Ok(Json(itinerary))
}

pub async fn list_own_itineraries(
    Extension(user): Extension<AuthUser>,
    State(state): State<Context>,
) -> Result<Json<Vec<Itinerary>>, ApiError> {
    user.require(UserRole::Guide)?;

    let conn = state.pool.get().await.map_err(internal_error)?;

    let rows = conn
        .interact(move |conn| -> QueryResult<Vec<Itinerary>> {
            let guide = match own_guide(conn, user.user_id)? {
                Some(g) => g,
                None => return Ok(Vec::new()),
            };
            guide_itineraries::table
                .filter(guide_itineraries::guide_id.eq(guide.id))
                .order(guide_itineraries::id.asc())
                .select(Itinerary::as_select())
                .load(conn)
        })
        .await
        .map_err(internal_error)?
        .map_err(internal_error)?;

    Ok(Json(rows))
}

pub async fn delete_itinerary(
    Extension(user): Extension<AuthUser>,
    State(state): State<Context>,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>, ApiError> {
    user.require(UserRole::Guide)?;

    let conn = state.pool.get().await.map_err(internal_error)?;

    let deleted = conn
        .interact(move |conn| -> QueryResult<usize> {
            let guide = match own_guide(conn, user.user_id)? {
                Some(g) => g,
                None => return Ok(0),
            };
            diesel::delete(
                guide_itineraries::table
                    .filter(guide_itineraries::id.eq(id))
                    .filter(guide_itineraries::guide_id.eq(guide.id)),
            )
            .execute(conn)
        })
        .await
        .map_err(internal_error)?
        .map_err(internal_error)?;

    if deleted == 0 {
        return Err(not_found("no such itinerary"));
    }
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}
