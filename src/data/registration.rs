use chrono::{Local, NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A user's seat in a course. At most one exists per (user, course).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Registration {
    pub reg_id: String,
    pub user_id: String,
    pub course_id: String,
    #[serde(with = "crate::util::local_date_time")]
    #[schema(value_type = String, example = "2024-09-01 10:15:00")]
    pub registration_date: NaiveDateTime,
}

impl Registration {
    pub fn new(user_id: impl ToString, course_id: impl ToString) -> Registration {
        Registration {
            reg_id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            course_id: course_id.to_string(),
            registration_date: Local::now().naive_local().trunc_subsecs(0),
        }
    }

    pub fn matches(&self, user_id: &str, course_id: &str) -> bool {
        self.user_id == user_id && self.course_id == course_id
    }
}
