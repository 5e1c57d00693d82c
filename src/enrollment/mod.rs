//! Registration rules.
//!
//! Everything here is pure: functions take snapshots of the collections and
//! return either a refusal or the records to write back. Loading, locking and
//! saving is done by [`registrar::Registrar`].

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::data::course::{find_course, Course, TimeSlot};
use crate::data::registration::Registration;
use crate::data::user::User;
use crate::role::Role;

pub mod registrar;

/// Reasons a registration request is refused. Each is a normal business
/// outcome the caller reports back to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnrollmentError {
    #[error("course '{0}' doesn't exist")]
    NotFound(String),
    #[error("already registered for course '{0}'")]
    AlreadyRegistered(String),
    #[error("not registered for course '{0}'")]
    NotRegistered(String),
    #[error("course '{course_id}' is full ({capacity} seats)")]
    CapacityExceeded { course_id: String, capacity: u32 },
    #[error("course '{course_id}' overlaps registered course '{conflicting}'")]
    ScheduleConflict {
        course_id: String,
        conflicting: String,
    },
    #[error("course '{course_id}' requires {missing:?}")]
    PrerequisitesNotMet {
        course_id: String,
        missing: Vec<String>,
    },
}

pub type Outcome<T> = Result<T, EnrollmentError>;

/// Half-open overlap of two slots on the same day.
fn slots_overlap(a: &TimeSlot, b: &TimeSlot) -> bool {
    if a.day != b.day {
        return false;
    }

    match (a.span(), b.span()) {
        (Some((start_a, end_a)), Some((start_b, end_b))) => {
            start_a.max(start_b) < end_a.min(end_b)
        }
        _ => {
            tracing::warn!("Ignoring unparsable time slot while checking '{}' against '{}'", a, b);
            false
        }
    }
}

/// Whether any slot of `a` overlaps any slot of `b`.
///
/// Slots only overlap on the same day token; touching endpoints
/// (`10:00-11:00` and `11:00-12:00`) don't overlap.
pub fn conflicts(a: &[TimeSlot], b: &[TimeSlot]) -> bool {
    a.iter().any(|x| b.iter().any(|y| slots_overlap(x, y)))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RulesEngine {
    /// When unset, prerequisites are listed on courses but never checked.
    pub enforce_prerequisites: bool,
}

impl RulesEngine {
    pub fn new(enforce_prerequisites: bool) -> RulesEngine {
        RulesEngine {
            enforce_prerequisites,
        }
    }

    /// Checks, in order: the course exists, the user isn't registered yet,
    /// there's a free seat, no registered course overlaps, prerequisites.
    /// The first failing check decides the outcome.
    ///
    /// `registrations` is the whole collection, not only the user's.
    pub fn evaluate_registration(
        &self,
        user_id: &str,
        course_id: &str,
        courses: &[Course],
        registrations: &[Registration],
    ) -> Outcome<Registration> {
        let course = find_course(courses, course_id)
            .ok_or_else(|| EnrollmentError::NotFound(course_id.to_string()))?;

        if registrations.iter().any(|it| it.matches(user_id, course_id)) {
            return Err(EnrollmentError::AlreadyRegistered(course_id.to_string()));
        }

        let taken = registrations
            .iter()
            .filter(|it| it.course_id == course_id)
            .count();
        if taken >= course.capacity as usize {
            return Err(EnrollmentError::CapacityExceeded {
                course_id: course_id.to_string(),
                capacity: course.capacity,
            });
        }

        let registered: Vec<&Course> = registrations
            .iter()
            .filter(|it| it.user_id == user_id)
            .filter_map(|it| find_course(courses, &it.course_id))
            .collect();

        if let Some(other) = registered
            .iter()
            .find(|other| conflicts(&other.schedule, &course.schedule))
        {
            return Err(EnrollmentError::ScheduleConflict {
                course_id: course_id.to_string(),
                conflicting: other.course_id.clone(),
            });
        }

        self.check_prerequisites(course, &registered)?;

        Ok(Registration::new(user_id, course_id))
    }

    fn check_prerequisites(&self, course: &Course, registered: &[&Course]) -> Outcome<()> {
        if !self.enforce_prerequisites {
            return Ok(());
        }

        let missing: Vec<String> = course
            .prerequisites
            .iter()
            .filter(|required| !registered.iter().any(|it| &it.course_id == *required))
            .cloned()
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(EnrollmentError::PrerequisitesNotMet {
                course_id: course.course_id.clone(),
                missing,
            })
        }
    }
}

/// Returns `registrations` without the user's registration(s) for the course.
/// On failure the input is left as it was.
pub fn evaluate_unregistration(
    user_id: &str,
    course_id: &str,
    registrations: &[Registration],
) -> Outcome<Vec<Registration>> {
    let remaining: Vec<Registration> = registrations
        .iter()
        .filter(|it| !it.matches(user_id, course_id))
        .cloned()
        .collect();

    if remaining.len() == registrations.len() {
        return Err(EnrollmentError::NotRegistered(course_id.to_string()));
    }

    Ok(remaining)
}

#[derive(Debug, Clone, PartialEq)]
pub struct CourseRemoval {
    pub removed: Course,
    pub courses: Vec<Course>,
    pub registrations: Vec<Registration>,
}

/// Removes a course together with every registration referencing it.
pub fn remove_course(
    course_id: &str,
    courses: &[Course],
    registrations: &[Registration],
) -> Outcome<CourseRemoval> {
    let removed = find_course(courses, course_id)
        .cloned()
        .ok_or_else(|| EnrollmentError::NotFound(course_id.to_string()))?;

    Ok(CourseRemoval {
        removed,
        courses: courses
            .iter()
            .filter(|it| it.course_id != course_id)
            .cloned()
            .collect(),
        registrations: registrations
            .iter()
            .filter(|it| it.course_id != course_id)
            .cloned()
            .collect(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CourseStats {
    pub course_id: String,
    pub title: String,
    pub registered: usize,
    pub capacity: u32,
    /// Share of seats taken, rounded down; 0 for courses without seats.
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Dashboard {
    pub students_count: usize,
    pub courses_count: usize,
    pub registrations_count: usize,
    pub course_stats: Vec<CourseStats>,
}

pub fn enrollment_stats(
    users: &[User],
    courses: &[Course],
    registrations: &[Registration],
) -> Dashboard {
    let course_stats = courses
        .iter()
        .map(|course| {
            let registered = registrations
                .iter()
                .filter(|it| it.course_id == course.course_id)
                .count();
            let percentage = if course.capacity > 0 {
                (registered as u64 * 100 / course.capacity as u64) as u32
            } else {
                0
            };

            CourseStats {
                course_id: course.course_id.clone(),
                title: course.title.clone(),
                registered,
                capacity: course.capacity,
                percentage,
            }
        })
        .collect();

    Dashboard {
        students_count: users.iter().filter(|it| it.role == Role::Student).count(),
        courses_count: courses.len(),
        registrations_count: registrations.len(),
        course_stats,
    }
}
