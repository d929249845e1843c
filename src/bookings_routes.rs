use chrono::{NaiveDate, Utc};

use crate::booking::{
    booking_price, party_may_transition, transition_allowed, validate_rebooking, window_covers,
    BookingParty, BookingStatus, GuideSnapshot, RebookCheck, WindowSnapshot,
};
use crate::models::{Availability, Booking, Guide, GuideStatus, Itinerary, UserRole};
use crate::notifications_routes::notify;
use crate::prelude::*;
use crate::profiles_routes::own_profile;
use crate::schema::{bookings, guide_availability, guide_itineraries, guides, tourist_profiles};

fn latest_window(conn: &mut PgConnection, guide_id: i32) -> QueryResult<Option<Availability>> {
    guide_availability::table
        .filter(guide_availability::guide_id.eq(guide_id))
        .order(guide_availability::id.desc())
        .select(Availability::as_select())
        .first(conn)
        .optional()
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct NewBooking {
    pub guide_id: i32,
    pub itinerary_id: i32,
    pub booking_date: NaiveDate,
}

/// Creates a `pending` booking. The guide, availability-window and
/// itinerary checks run in the same transaction as the insert, so a guide
/// going on leave between a client-side validation and this call cannot
/// produce a booking that violates the window rule.
pub async fn create_booking(
    Extension(user): Extension<AuthUser>,
    State(state): State<Context>,
    Json(body): Json<NewBooking>,
) -> Result<Json<Booking>, ApiError> {
    user.require(UserRole::Tourist)?;
    let today = Utc::now().date_naive();
    if body.booking_date < today {
        return Err(bad_request("booking_date must not be in the past"));
    }

    let conn = state.pool.get().await.map_err(internal_error)?;

    let booking = conn
        .interact(move |conn| {
            conn.transaction(|conn| -> Result<Booking, TxError> {
                let tourist = own_profile(conn, user.user_id)?
                    .ok_or_else(|| refuse(bad_request("create a tourist profile first")))?;

                let guide: Option<Guide> = guides::table
                    .find(body.guide_id)
                    .select(Guide::as_select())
                    .first(conn)
                    .optional()?;
                let guide = guide.ok_or_else(|| refuse(not_found("no such guide")))?;
                if GuideStatus::from_str(&guide.status) != Some(GuideStatus::Approved)
                    || guide.is_deactivated
                {
                    return Err(refuse(conflict("guide is not accepting bookings")));
                }

                let window = latest_window(conn, guide.id)?.ok_or_else(|| {
                    refuse(conflict("guide has not declared any availability"))
                })?;
                if !window_covers(
                    window.start_date,
                    window.end_date,
                    window.is_available,
                    body.booking_date,
                ) {
                    return Err(refuse(conflict("guide is not available on that date")));
                }

                let itinerary: Option<Itinerary> = guide_itineraries::table
                    .filter(guide_itineraries::id.eq(body.itinerary_id))
                    .filter(guide_itineraries::guide_id.eq(guide.id))
                    .select(Itinerary::as_select())
                    .first(conn)
                    .optional()?;
                let itinerary = itinerary
                    .ok_or_else(|| refuse(not_found("no such itinerary for this guide")))?;

                let price = booking_price(
                    itinerary.price,
                    &itinerary.price_type,
                    itinerary.number_of_days,
                );
                let booking: Booking = diesel::insert_into(bookings::table)
                    .values((
                        bookings::tourist_id.eq(tourist.id),
                        bookings::guide_id.eq(guide.id),
                        bookings::itinerary_id.eq(itinerary.id),
                        bookings::booking_date.eq(body.booking_date),
                        bookings::status.eq(BookingStatus::Pending.as_str()),
                        bookings::price.eq(price),
                    ))
                    .returning(Booking::as_returning())
                    .get_result(conn)?;

                notify(
                    conn,
                    guide.user_id,
                    "booking",
                    "New booking request",
                    format!(
                        "{} requested \"{}\" on {}.",
                        tourist.name, itinerary.title, booking.booking_date
                    ),
                )?;
                Ok(booking)
            })
        })
        .await
        .map_err(internal_error)?;
    let booking = unwrap_tx(booking)?;

    tracing::info!(booking_id = booking.id, guide_id = booking.guide_id, "booking created");
    Ok(Json(booking))
}

// ---------------------------------------------------------------------------
// Status transitions
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct StatusUpdate {
    pub booking_id: i32,
    pub status: String,
}

fn party_on_booking(
    conn: &mut PgConnection,
    user: AuthUser,
    booking: &Booking,
) -> Result<BookingParty, TxError> {
    if user.role == UserRole::Admin {
        return Ok(BookingParty::Admin);
    }
    if user.role == UserRole::Guide {
        let guide = crate::guides_routes::own_guide(conn, user.user_id)?;
        if guide.map(|g| g.id) == Some(booking.guide_id) {
            return Ok(BookingParty::Guide);
        }
    }
    if user.role == UserRole::Tourist {
        let profile = own_profile(conn, user.user_id)?;
        if profile.map(|p| p.id) == Some(booking.tourist_id) {
            return Ok(BookingParty::Tourist);
        }
    }
    Err(refuse(forbidden("not a party to this booking")))
}

/// Applies one transition of the booking state machine. The update is
/// guarded on the status the caller saw, so two racing transitions cannot
/// both win.
pub async fn update_booking_status(
    Extension(user): Extension<AuthUser>,
    State(state): State<Context>,
    Json(body): Json<StatusUpdate>,
) -> Result<Json<Booking>, ApiError> {
    let to = BookingStatus::from_str(&body.status)
        .ok_or_else(|| bad_request(format!("unknown booking status {:?}", body.status)))?;

    let conn = state.pool.get().await.map_err(internal_error)?;

    let booking = conn
        .interact(move |conn| {
            conn.transaction(|conn| -> Result<Booking, TxError> {
                let booking: Option<Booking> = bookings::table
                    .find(body.booking_id)
                    .select(Booking::as_select())
                    .first(conn)
                    .optional()?;
                let booking =
                    booking.ok_or_else(|| refuse(not_found("no such booking")))?;

                let from = BookingStatus::from_str(&booking.status)
                    .ok_or_else(|| refuse(conflict("booking is in an unknown state")))?;
                let party = party_on_booking(conn, user, &booking)?;

                if !transition_allowed(from, to) {
                    return Err(refuse(conflict(format!(
                        "cannot move a {} booking to {}",
                        from.as_str(),
                        to.as_str()
                    ))));
                }
                if !party_may_transition(party, from, to) {
                    return Err(refuse(forbidden(format!(
                        "your role cannot mark this booking {}",
                        to.as_str()
                    ))));
                }

                // Guarded on the status we just read.
                let updated: Option<Booking> = diesel::update(
                    bookings::table
                        .filter(bookings::id.eq(booking.id))
                        .filter(bookings::status.eq(from.as_str())),
                )
                .set((
                    bookings::status.eq(to.as_str()),
                    bookings::updated_at.eq(diesel::dsl::now),
                ))
                .returning(Booking::as_returning())
                .get_result(conn)
                .optional()?;
                let updated = updated.ok_or_else(|| {
                    refuse(conflict("booking changed state, reload and retry"))
                })?;

                notify_counterparty(conn, party, &updated, to)?;
                Ok(updated)
            })
        })
        .await
        .map_err(internal_error)?;
    let booking = unwrap_tx(booking)?;

    tracing::info!(
        booking_id = booking.id,
        status = booking.status.as_str(),
        "booking status updated"
    );
    Ok(Json(booking))
}

fn notify_counterparty(
    conn: &mut PgConnection,
    actor: BookingParty,
    booking: &Booking,
    to: BookingStatus,
) -> QueryResult<()> {
    // Archival is housekeeping, nobody needs a bell for it.
    if to == BookingStatus::Past {
        return Ok(());
    }

    let guide_user: i32 = guides::table
        .find(booking.guide_id)
        .select(guides::user_id)
        .first(conn)?;
    let tourist_user: i32 = tourist_profiles::table
        .find(booking.tourist_id)
        .select(tourist_profiles::user_id)
        .first(conn)?;

    let (title, message) = match to {
        BookingStatus::Accepted => (
            "Booking accepted",
            format!("Your booking for {} was accepted.", booking.booking_date),
        ),
        BookingStatus::Rejected => (
            "Booking rejected",
            format!("Your booking for {} was declined.", booking.booking_date),
        ),
        BookingStatus::Cancelled => (
            "Booking cancelled",
            format!("The booking for {} was cancelled.", booking.booking_date),
        ),
        BookingStatus::Completed => (
            "Trip completed",
            format!(
                "Your trip on {} was marked completed. You can now leave a review.",
                booking.booking_date
            ),
        ),
        _ => return Ok(()),
    };

    // Cancellations go to whichever side did not act; everything else is
    // guide-initiated and lands with the tourist.
    let recipient = match (to, actor) {
        (BookingStatus::Cancelled, BookingParty::Guide) => tourist_user,
        (BookingStatus::Cancelled, _) => guide_user,
        _ => tourist_user,
    };
    notify(conn, recipient, "booking", title, message)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct TouristBookingView {
    #[serde(flatten)]
    pub booking: Booking,
    pub guide_name: String,
    pub itinerary_title: String,
}

pub async fn get_tourist_bookings(
    Extension(user): Extension<AuthUser>,
    State(state): State<Context>,
) -> Result<Json<Vec<TouristBookingView>>, ApiError> {
    user.require(UserRole::Tourist)?;

    let conn = state.pool.get().await.map_err(internal_error)?;

    let rows = conn
        .interact(move |conn| -> QueryResult<Vec<(Booking, Guide, Itinerary)>> {
            let tourist = match own_profile(conn, user.user_id)? {
                Some(t) => t,
                None => return Ok(Vec::new()),
            };
            bookings::table
                .inner_join(guides::table)
                .inner_join(guide_itineraries::table)
                .filter(bookings::tourist_id.eq(tourist.id))
                .order(bookings::created_at.desc())
                .select((
                    Booking::as_select(),
                    Guide::as_select(),
                    Itinerary::as_select(),
                ))
                .load(conn)
        })
        .await
        .map_err(internal_error)?
        .map_err(internal_error)?;

    let views = rows
        .into_iter()
        .map(|(booking, guide, itinerary)| TouristBookingView {
            booking,
            guide_name: guide.full_name,
            itinerary_title: itinerary.title,
        })
        .collect();
    Ok(Json(views))
}

#[derive(Serialize)]
pub struct GuideBookingView {
    #[serde(flatten)]
    pub booking: Booking,
    pub tourist_name: String,
    pub itinerary_title: String,
}

pub async fn get_guide_bookings(
    Extension(user): Extension<AuthUser>,
    State(state): State<Context>,
) -> Result<Json<Vec<GuideBookingView>>, ApiError> {
    user.require(UserRole::Guide)?;

    let conn = state.pool.get().await.map_err(internal_error)?;

    let rows = conn
        .interact(
            move |conn| -> QueryResult<Vec<(Booking, String, Itinerary)>> {
                let guide = match crate::guides_routes::own_guide(conn, user.user_id)? {
                    Some(g) => g,
                    None => return Ok(Vec::new()),
                };
                bookings::table
                    .inner_join(tourist_profiles::table)
                    .inner_join(guide_itineraries::table)
                    .filter(bookings::guide_id.eq(guide.id))
                    .order(bookings::created_at.desc())
                    .select((
                        Booking::as_select(),
                        tourist_profiles::name,
                        Itinerary::as_select(),
                    ))
                    .load(conn)
            },
        )
        .await
        .map_err(internal_error)?
        .map_err(internal_error)?;

    let views = rows
        .into_iter()
        .map(|(booking, tourist_name, itinerary)| GuideBookingView {
            booking,
            tourist_name,
            itinerary_title: itinerary.title,
        })
        .collect();
    Ok(Json(views))
}

// ---------------------------------------------------------------------------
// Rebooking validation
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct RebookRequest {
    pub booking_id: i32,
    pub booking_date: NaiveDate,
}

/// Advisory staged validation of a prior booking's guide, availability and
/// itinerary for a new date. `create_booking` re-checks everything
/// transactionally, so a stale `success` here cannot corrupt anything.
pub async fn validate_rebook(
    Extension(user): Extension<AuthUser>,
    State(state): State<Context>,
    Json(body): Json<RebookRequest>,
) -> Result<Json<RebookCheck>, ApiError> {
    user.require(UserRole::Tourist)?;
    let today = Utc::now().date_naive();

    let conn = state.pool.get().await.map_err(internal_error)?;

    let check = conn
        .interact(move |conn| -> Result<RebookCheck, TxError> {
            let tourist = own_profile(conn, user.user_id)?
                .ok_or_else(|| refuse(bad_request("create a tourist profile first")))?;
            let prior: Option<Booking> = bookings::table
                .find(body.booking_id)
                .filter(bookings::tourist_id.eq(tourist.id))
                .select(Booking::as_select())
                .first(conn)
                .optional()?;
            let prior = prior.ok_or_else(|| refuse(not_found("no such booking")))?;

            let guide: Option<Guide> = guides::table
                .find(prior.guide_id)
                .select(Guide::as_select())
                .first(conn)
                .optional()?;
            let guide_snapshot = guide.as_ref().map(|g| GuideSnapshot {
                status: GuideStatus::from_str(&g.status),
                is_deactivated: g.is_deactivated,
            });

            let window_snapshot = latest_window(conn, prior.guide_id)?.map(|w| WindowSnapshot {
                start_date: w.start_date,
                end_date: w.end_date,
                is_available: w.is_available,
            });

            let itinerary_exists: bool = diesel::select(diesel::dsl::exists(
                guide_itineraries::table
                    .filter(guide_itineraries::id.eq(prior.itinerary_id))
                    .filter(guide_itineraries::guide_id.eq(prior.guide_id)),
            ))
            .get_result(conn)?;

            Ok(validate_rebooking(
                guide_snapshot.as_ref(),
                window_snapshot.as_ref(),
                itinerary_exists,
                body.booking_date,
                today,
            ))
        })
        .await
        .map_err(internal_error)?;
    let check = unwrap_tx(check)?;

    Ok(Json(check))
}

// ---------------------------------------------------------------------------
// Housekeeping
// ---------------------------------------------------------------------------

#[derive(Deserialize, Default)]
pub struct SyncTripsRequest {
    pub guide_id: Option<i32>,
}

/// Recounts completed and archived bookings into `guides.trips_completed`.
/// A guide syncs their own counter; an admin may name any guide.
pub async fn sync_trips_completed(
    Extension(user): Extension<AuthUser>,
    State(state): State<Context>,
    body: Option<Json<SyncTripsRequest>>,
) -> Result<Json<Guide>, ApiError> {
    let requested = body.and_then(|Json(b)| b.guide_id);

    let conn = state.pool.get().await.map_err(internal_error)?;

    let guide = conn
        .interact(move |conn| {
            conn.transaction(|conn| -> Result<Guide, TxError> {
                let guide_id = match (user.role, requested) {
                    (UserRole::Admin, Some(id)) => id,
                    (UserRole::Admin, None) => {
                        return Err(refuse(bad_request("guide_id is required for admins")))
                    }
                    (UserRole::Guide, _) => crate::guides_routes::own_guide(conn, user.user_id)?
                        .ok_or_else(|| refuse(not_found("no guide profile for this user")))?
                        .id,
                    _ => return Err(refuse(forbidden("requires the guide or admin role"))),
                };

                let done: i64 = bookings::table
                    .filter(bookings::guide_id.eq(guide_id))
                    .filter(bookings::status.eq_any([
                        BookingStatus::Completed.as_str(),
                        BookingStatus::Past.as_str(),
                    ]))
                    .count()
                    .get_result(conn)?;

                let guide: Option<Guide> = diesel::update(guides::table.find(guide_id))
                    .set(guides::trips_completed.eq(done as i32))
                    .returning(Guide::as_returning())
                    .get_result(conn)
                    .optional()?;
                guide.ok_or_else(|| refuse(not_found("no such guide")))
            })
        })
        .await
        .map_err(internal_error)?;
    let guide = unwrap_tx(guide)?;

    tracing::info!(
        guide_id = guide.id,
        trips_completed = guide.trips_completed,
        "trips counter synced"
    );
    Ok(Json(guide))
}

/// Time-based archival: `completed` bookings whose date has passed move to
/// `past`. Admin housekeeping, intended to be hit by a cron-like caller.
pub async fn archive_past_bookings(
    Extension(user): Extension<AuthUser>,
    State(state): State<Context>,
) -> Result<Json<serde_json::Value>, ApiError> {
    user.require(UserRole::Admin)?;
    let today = Utc::now().date_naive();

    let conn = state.pool.get().await.map_err(internal_error)?;

    let archived = conn
        .interact(move |conn| {
            diesel::update(
                bookings::table
                    .filter(bookings::status.eq(BookingStatus::Completed.as_str()))
                    .filter(bookings::booking_date.lt(today)),
            )
            .set((
                bookings::status.eq(BookingStatus::Past.as_str()),
                bookings::updated_at.eq(diesel::dsl::now),
            ))
            .execute(conn)
        })
        .await
        .map_err(internal_error)?
        .map_err(internal_error)?;

    tracing::info!(archived, "completed bookings archived");
    Ok(Json(serde_json::json!({ "archived": archived })))
}
