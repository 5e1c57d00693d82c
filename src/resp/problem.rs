use std::fmt::{Display, Formatter};
use std::io::Cursor;

use rocket::http::{ContentType, Status};
use rocket::response::Responder;
use rocket::{response, Request, Response};
use serde::Serialize;
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::data::course::CourseError;
use crate::data::user::AccountError;
use crate::enrollment::EnrollmentError;
use crate::error::{ServiceError, StoreError};

/// Implements [RFC7807](https://tools.ietf.org/html/rfc7807).
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Problem {
    #[serde(skip)]
    pub status: Status,
    pub type_uri: String,
    pub title: String,

    pub detail: Option<String>,
    pub instance_uri: Option<String>,

    #[schema(value_type = Object)]
    pub body: Map<String, Value>,
}

impl Default for Problem {
    fn default() -> Self {
        Problem {
            status: Status::InternalServerError,
            type_uri: "about:blank".to_string(),
            title: "Problem".to_string(),
            detail: None,
            instance_uri: None,
            body: Map::new(),
        }
    }
}

impl Problem {
    pub fn new(status: Status, type_uri: impl ToString, title: impl ToString) -> Problem {
        Problem {
            status,
            type_uri: type_uri.to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    pub fn new_untyped(status: Status, title: impl ToString) -> Problem {
        Problem {
            status,
            type_uri: "about:blank".to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    pub fn detail(&mut self, value: impl ToString) -> &mut Problem {
        self.detail = Some(value.to_string());
        self
    }

    pub fn instance_uri(&mut self, value: String) -> &mut Problem {
        self.instance_uri = Some(value);
        self
    }

    pub fn insert<V: Serialize>(&mut self, key: impl ToString, value: V) -> &mut Problem {
        match serde_json::to_value(value) {
            Ok(value) => {
                self.body.insert(key.to_string(), value);
            }
            Err(err) => tracing::warn!("Unable to attach problem member: {}", err),
        }
        self
    }

    pub fn insert_str(&mut self, key: impl ToString, value: impl ToString) -> &mut Problem {
        self.body
            .insert(key.to_string(), Value::String(value.to_string()));
        self
    }

    /// Problem kind name used as `type` for problems raised by the backend.
    fn typed(status: Status, kind: &str, title: impl ToString) -> Problem {
        Problem::new(status, format!("/problems/{}", kind), title)
    }
}

impl Display for Problem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.title)
    }
}

impl std::error::Error for Problem {}

impl<'r> Responder<'r, 'static> for Problem {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let mut body = self.body;

        // Following are required by rfc7807
        body.insert(String::from("type"), Value::from(self.type_uri));
        body.insert(String::from("title"), Value::from(self.title));

        // Optional parameters as specified by rfc7807
        if let Some(detail) = self.detail {
            body.insert(String::from("detail"), Value::from(detail));
        }
        body.insert(String::from("status"), Value::from(self.status.code));
        if let Some(instance) = self.instance_uri {
            body.insert(String::from("instance"), Value::from(instance));
        }

        let body_string = Value::Object(body).to_string();

        Response::build()
            .status(self.status)
            .header(ContentType::new("application", "problem+json"))
            .raw_header("Content-Language", "en")
            .sized_body(body_string.len(), Cursor::new(body_string))
            .ok()
    }
}

pub mod problems {
    use crate::resp::problem::Problem;
    use rocket::http::Status;

    #[inline]
    pub fn not_found(what: impl ToString) -> Problem {
        Problem::new_untyped(Status::NotFound, "Resource doesn't exist.")
            .detail(what)
            .clone()
    }

    #[inline]
    pub fn forbidden(detail: impl ToString) -> Problem {
        Problem::new_untyped(Status::Forbidden, "Insufficient privileges.")
            .detail(detail)
            .clone()
    }
}

impl From<EnrollmentError> for Problem {
    fn from(e: EnrollmentError) -> Self {
        let detail = e.to_string();
        let mut problem = match &e {
            EnrollmentError::NotFound(id) => {
                Problem::typed(Status::NotFound, "course-not-found", "Course doesn't exist.")
                    .insert_str("course_id", id)
                    .clone()
            }
            EnrollmentError::AlreadyRegistered(id) => Problem::typed(
                Status::Conflict,
                "already-registered",
                "Already registered for this course.",
            )
            .insert_str("course_id", id)
            .clone(),
            EnrollmentError::NotRegistered(id) => Problem::typed(
                Status::Conflict,
                "not-registered",
                "Not registered for this course.",
            )
            .insert_str("course_id", id)
            .clone(),
            EnrollmentError::CapacityExceeded {
                course_id,
                capacity,
            } => Problem::typed(Status::Conflict, "capacity-exceeded", "Course is full.")
                .insert_str("course_id", course_id)
                .insert("capacity", capacity)
                .clone(),
            EnrollmentError::ScheduleConflict {
                course_id,
                conflicting,
            } => Problem::typed(
                Status::Conflict,
                "schedule-conflict",
                "Course overlaps a registered course.",
            )
            .insert_str("course_id", course_id)
            .insert_str("conflicting_course_id", conflicting)
            .clone(),
            EnrollmentError::PrerequisitesNotMet { course_id, missing } => Problem::typed(
                Status::Conflict,
                "prerequisites-not-met",
                "Course prerequisites aren't met.",
            )
            .insert_str("course_id", course_id)
            .insert("missing", missing)
            .clone(),
        };
        problem.detail(detail);
        problem
    }
}

impl From<CourseError> for Problem {
    fn from(e: CourseError) -> Self {
        match &e {
            CourseError::NotFound(id) => {
                Problem::typed(Status::NotFound, "course-not-found", "Course doesn't exist.")
                    .insert_str("course_id", id)
                    .clone()
            }
            CourseError::EmptyTitle | CourseError::InvalidSlot { .. } => {
                Problem::typed(Status::BadRequest, "invalid-course", "Bad course.")
                    .detail(e.to_string())
                    .clone()
            }
        }
    }
}

impl From<AccountError> for Problem {
    fn from(e: AccountError) -> Self {
        let status = match &e {
            AccountError::NotFound(_) => Status::NotFound,
            AccountError::UsernameTaken(_) => Status::Conflict,
            AccountError::PasswordMismatch | AccountError::InvalidInput(_) => Status::BadRequest,
            AccountError::WrongPassword => Status::Unauthorized,
            AccountError::Hashing => Status::InternalServerError,
        };
        Problem::typed(status, "account", "Unable to process account request.")
            .detail(e.to_string())
            .clone()
    }
}

impl From<StoreError> for Problem {
    fn from(e: StoreError) -> Self {
        tracing::error!("Store failure: {}", e);
        Problem::new_untyped(Status::InternalServerError, "Unable to store data.")
            .detail("Submitted data might not be properly stored.")
            .clone()
    }
}

impl From<ServiceError> for Problem {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Enrollment(e) => e.into(),
            ServiceError::Course(e) => e.into(),
            ServiceError::Account(e) => e.into(),
            ServiceError::Store(e) => e.into(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for Problem {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match e.into_kind() {
            ErrorKind::ExpiredSignature => {
                Problem::new_untyped(Status::Unauthorized, "Expired JWT signature.")
            }
            _ => Problem::new_untyped(Status::Unauthorized, "Error while handling JWT."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_refusals_are_conflicts() {
        let problem = Problem::from(EnrollmentError::CapacityExceeded {
            course_id: "CS101".to_string(),
            capacity: 1,
        });

        assert_eq!(problem.status, Status::Conflict);
        assert_eq!(problem.type_uri, "/problems/capacity-exceeded");
        assert_eq!(problem.body["course_id"], "CS101");
        assert_eq!(problem.body["capacity"], 1);
        assert!(problem.detail.is_some());
    }

    #[test]
    fn missing_course_is_not_found() {
        let from_rules = Problem::from(EnrollmentError::NotFound("x".to_string()));
        let from_edit = Problem::from(ServiceError::Course(CourseError::NotFound("x".to_string())));

        assert_eq!(from_rules.status, Status::NotFound);
        assert_eq!(from_edit.status, Status::NotFound);
    }

    #[test]
    fn store_failures_are_internal() {
        let problem = Problem::from(StoreError::Io {
            collection: "courses",
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        });
        assert_eq!(problem.status, Status::InternalServerError);
    }
}
