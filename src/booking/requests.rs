//! Request DTOs for booking API endpoints.

use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use super::models::{ReservationPeriod, StayRequest};

/// Request to quote or book a stay.
///
/// Dates may be sent with a time of day; only the calendar date is kept.
#[derive(Debug, Deserialize)]
pub struct BookingRequest {
    pub rental_id: Uuid,
    #[serde(with = "super::calendar::calendar_date")]
    pub date_start: NaiveDate,
    #[serde(with = "super::calendar::calendar_date")]
    pub date_end: NaiveDate,
    pub adults: i32,
    #[serde(default)]
    pub kids: i32,
    /// Client a back-office user books for; ignored by quotes
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

impl BookingRequest {
    pub fn into_stay(self) -> StayRequest {
        StayRequest {
            rental_id: self.rental_id,
            date_start: self.date_start,
            date_end: self.date_end,
            adults: self.adults,
            kids: self.kids,
        }
    }
}

/// Query string of the back-office listing
#[derive(Debug, Deserialize)]
pub struct ReservationListQuery {
    #[serde(default = "default_period")]
    pub period: ReservationPeriod,
}

fn default_period() -> ReservationPeriod {
    ReservationPeriod::Upcoming
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_datetime_inputs_keep_only_the_date() {
        let rental_id = Uuid::new_v4();
        let request: BookingRequest = serde_json::from_value(json!({
            "rental_id": rental_id,
            "date_start": "2025-04-01T18:45:00",
            "date_end": "2025-04-05T09:00:00+02:00",
            "adults": 2
        }))
        .unwrap();

        let stay = request.into_stay();
        assert_eq!(stay.rental_id, rental_id);
        assert_eq!(stay.date_start, NaiveDate::from_ymd_opt(2025, 4, 1).unwrap());
        assert_eq!(stay.date_end, NaiveDate::from_ymd_opt(2025, 4, 5).unwrap());
        assert_eq!(stay.kids, 0);
    }

    #[test]
    fn test_on_behalf_of_user() {
        let client = Uuid::new_v4();
        let request: BookingRequest = serde_json::from_value(json!({
            "rental_id": Uuid::new_v4(),
            "date_start": "2025-04-01",
            "date_end": "2025-04-05",
            "adults": 1,
            "user_id": client
        }))
        .unwrap();
        assert_eq!(request.user_id, Some(client));
    }

    #[test]
    fn test_invalid_date_is_rejected() {
        let result: Result<BookingRequest, _> = serde_json::from_value(json!({
            "rental_id": Uuid::new_v4(),
            "date_start": "01/04/2025",
            "date_end": "2025-04-05",
            "adults": 2,
            "kids": 1
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_list_query_defaults_to_upcoming() {
        let query: ReservationListQuery = serde_json::from_value(json!({})).unwrap();
        assert_eq!(query.period, ReservationPeriod::Upcoming);

        let query: ReservationListQuery =
            serde_json::from_value(json!({ "period": "past" })).unwrap();
        assert_eq!(query.period, ReservationPeriod::Past);
    }
}
