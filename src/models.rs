use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, Selectable, Queryable)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: i32,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Serialize, Selectable, Queryable)]
#[diesel(table_name = crate::schema::guides)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Guide {
    pub id: i32,
    pub user_id: i32,
    pub full_name: String,
    pub bio: Option<String>,
    pub languages: Vec<String>,
    pub document_path: Option<String>,
    pub status: String,
    pub is_deactivated: bool,
    pub trips_completed: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize, Selectable, Queryable)]
#[diesel(table_name = crate::schema::tourist_profiles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TouristProfile {
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    pub location: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize, Selectable, Queryable)]
#[diesel(table_name = crate::schema::guide_availability)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Availability {
    pub id: i32,
    pub guide_id: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_available: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize, Selectable, Queryable)]
#[diesel(table_name = crate::schema::guide_itineraries)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Itinerary {
    pub id: i32,
    pub guide_id: i32,
    pub title: String,
    pub number_of_days: i32,
    pub price: f32,
    pub price_type: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize, Selectable, Queryable)]
#[diesel(table_name = crate::schema::bookings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Booking {
    pub id: i32,
    pub tourist_id: i32,
    pub guide_id: i32,
    pub itinerary_id: i32,
    pub booking_date: NaiveDate,
    pub status: String,
    pub price: f32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Serialize, Selectable, Queryable)]
#[diesel(table_name = crate::schema::ratings_reviews)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RatingReview {
    pub id: i32,
    pub booking_id: i32,
    pub guide_id: i32,
    pub rating: i32,
    pub review_text: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize, Selectable, Queryable)]
#[diesel(table_name = crate::schema::notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Notification {
    pub id: i32,
    pub user_id: i32,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: NaiveDateTime,
}

/// Account role, stored as text on the `users` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserRole {
    Admin,
    Guide,
    Tourist,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Guide => "guide",
            UserRole::Tourist => "tourist",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(UserRole::Admin),
            "guide" => Some(UserRole::Guide),
            "tourist" => Some(UserRole::Tourist),
            _ => None,
        }
    }
}

/// Verification state of a guide, stored as text on the `guides` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuideStatus {
    Pending,
    Approved,
    Rejected,
}

impl GuideStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuideStatus::Pending => "pending",
            GuideStatus::Approved => "approved",
            GuideStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(GuideStatus::Pending),
            "approved" => Some(GuideStatus::Approved),
            "rejected" => Some(GuideStatus::Rejected),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_role_is_rejected() {
        assert_eq!(UserRole::from_str("superuser"), None);
        assert_eq!(UserRole::from_str("guide"), Some(UserRole::Guide));
    }

    #[test]
    fn guide_status_text_is_stable() {
        for status in [
            GuideStatus::Pending,
            GuideStatus::Approved,
            GuideStatus::Rejected,
        ] {
            assert_eq!(GuideStatus::from_str(status.as_str()), Some(status));
        }
    }
}
