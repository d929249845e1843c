use crate::booking::{reviewable, BookingStatus};
use crate::models::{Booking, RatingReview, UserRole};
use crate::prelude::*;
use crate::profiles_routes::own_profile;
use crate::schema::{bookings, ratings_reviews, tourist_profiles};

#[derive(Deserialize)]
pub struct NewRating {
    pub booking_id: i32,
    pub rating: i32,
    pub review_text: Option<String>,
}

/// Creates the one rating a tourist may leave on their completed booking.
/// The completed-status and one-per-booking rules are checked in the same
/// transaction as the insert.
pub async fn create_rating(
    Extension(user): Extension<AuthUser>,
    State(state): State<Context>,
    Json(body): Json<NewRating>,
) -> Result<Json<RatingReview>, ApiError> {
    user.require(UserRole::Tourist)?;
    if !(1..=5).contains(&body.rating) {
        return Err(bad_request("rating must be between 1 and 5"));
    }

    let conn = state.pool.get().await.map_err(internal_error)?;

    let review = conn
        .interact(move |conn| {
            conn.transaction(|conn| -> Result<RatingReview, TxError> {
                let tourist = own_profile(conn, user.user_id)?
                    .ok_or_else(|| refuse(bad_request("create a tourist profile first")))?;

                let booking: Option<Booking> = bookings::table
                    .find(body.booking_id)
                    .filter(bookings::tourist_id.eq(tourist.id))
                    .select(Booking::as_select())
                    .first(conn)
                    .optional()?;
                let booking = booking.ok_or_else(|| refuse(not_found("no such booking")))?;

                let status = BookingStatus::from_str(&booking.status);
                if !status.map_or(false, reviewable) {
                    return Err(refuse(conflict("only completed trips can be reviewed")));
                }

                let already: bool = diesel::select(diesel::dsl::exists(
                    ratings_reviews::table.filter(ratings_reviews::booking_id.eq(booking.id)),
                ))
                .get_result(conn)?;
                if already {
                    return Err(refuse(conflict("this booking has already been reviewed")));
                }

                let review: RatingReview = diesel::insert_into(ratings_reviews::table)
                    .values((
                        ratings_reviews::booking_id.eq(booking.id),
                        ratings_reviews::guide_id.eq(booking.guide_id),
                        ratings_reviews::rating.eq(body.rating),
                        ratings_reviews::review_text.eq(body.review_text),
                    ))
                    .returning(RatingReview::as_returning())
                    .get_result(conn)?;
                Ok(review)
            })
        })
        .await
        .map_err(internal_error)?;
    let review = unwrap_tx(review)?;

    tracing::info!(
        booking_id = review.booking_id,
        guide_id = review.guide_id,
        rating = review.rating,
        "rating created"
    );
    Ok(Json(review))
}

#[derive(Serialize)]
pub struct ReviewEntry {
    #[serde(flatten)]
    pub review: RatingReview,
    pub tourist_name: String,
}

#[derive(Serialize)]
pub struct GuideReviews {
    pub average_rating: Option<f32>,
    pub count: usize,
    pub reviews: Vec<ReviewEntry>,
}

pub async fn list_guide_reviews(
    State(state): State<Context>,
    Path(guide_id): Path<i32>,
) -> Result<Json<GuideReviews>, ApiError> {
    let conn = state.pool.get().await.map_err(internal_error)?;

    let rows = conn
        .interact(move |conn| {
            ratings_reviews::table
                .inner_join(bookings::table.inner_join(tourist_profiles::table))
                .filter(ratings_reviews::guide_id.eq(guide_id))
                .order(ratings_reviews::created_at.desc())
                .select((RatingReview::as_select(), tourist_profiles::name))
                .load::<(RatingReview, String)>(conn)
        })
        .await
        .map_err(internal_error)?
        .map_err(internal_error)?;

    let count = rows.len();
    let average_rating = if count == 0 {
        None
    } else {
        Some(rows.iter().map(|(r, _)| r.rating as f32).sum::<f32>() / count as f32)
    };
    let reviews = rows
        .into_iter()
        .map(|(review, tourist_name)| ReviewEntry {
            review,
            tourist_name,
        })
        .collect();

    Ok(Json(GuideReviews {
        average_rating,
        count,
        reviews,
    }))
}
