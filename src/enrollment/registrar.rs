use chrono::NaiveDateTime;
use serde::Serialize;
use utoipa::ToSchema;

use super::{enrollment_stats, evaluate_unregistration, remove_course, Dashboard, RulesEngine};
use crate::action_log::ActionLogger;
use crate::data::course::{find_course, Course};
use crate::data::registration::Registration;
use crate::data::store::{Collection, Database};
use crate::data::user::{Identity, User};
use crate::error::ServiceError;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CourseListing {
    #[serde(flatten)]
    pub course: Course,
    pub registered: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: Course,
    pub is_registered: bool,
    pub current_registrations: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScheduledCourse {
    #[serde(flatten)]
    pub course: Course,
    #[serde(with = "crate::util::local_date_time")]
    #[schema(value_type = String)]
    pub registration_date: NaiveDateTime,
}

/// Runs the rules engine inside load → evaluate → save cycles.
///
/// The collections a cycle touches stay locked until it's written back, so
/// two requests racing for the last seat can't both get it.
#[derive(Debug, Clone)]
pub struct Registrar {
    db: Database,
    engine: RulesEngine,
    log: ActionLogger,
}

impl Registrar {
    pub fn new(db: Database, engine: RulesEngine, log: ActionLogger) -> Registrar {
        Registrar { db, engine, log }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn register(&self, who: &Identity, course_id: &str) -> Result<Registration, ServiceError> {
        let _lock = self
            .db
            .lock(&[Collection::Courses, Collection::Registrations]);
        let courses: Vec<Course> = self.db.load(Collection::Courses);
        let mut registrations: Vec<Registration> = self.db.load(Collection::Registrations);

        let registration =
            self.engine
                .evaluate_registration(&who.user_id, course_id, &courses, &registrations)?;

        registrations.push(registration.clone());
        self.db.save(Collection::Registrations, &registrations)?;

        let title = find_course(&courses, course_id)
            .map(|it| it.title.as_str())
            .unwrap_or(course_id);
        self.log.record(
            "Course Registration",
            format!("User {} registered for course {}", who.username, title),
        );

        Ok(registration)
    }

    pub fn unregister(&self, who: &Identity, course_id: &str) -> Result<(), ServiceError> {
        let _lock = self
            .db
            .lock(&[Collection::Courses, Collection::Registrations]);
        let registrations: Vec<Registration> = self.db.load(Collection::Registrations);

        let remaining = evaluate_unregistration(&who.user_id, course_id, &registrations)?;
        self.db.save(Collection::Registrations, &remaining)?;

        let courses: Vec<Course> = self.db.load(Collection::Courses);
        let title = find_course(&courses, course_id)
            .map(|it| it.title.as_str())
            .unwrap_or("Unknown Course");
        self.log.record(
            "Course Unregistration",
            format!("User {} unregistered from course {}", who.username, title),
        );

        Ok(())
    }

    /// Deletes the course and every registration for it.
    pub fn delete_course(&self, who: &Identity, course_id: &str) -> Result<Course, ServiceError> {
        let _lock = self
            .db
            .lock(&[Collection::Courses, Collection::Registrations]);
        let courses: Vec<Course> = self.db.load(Collection::Courses);
        let registrations: Vec<Registration> = self.db.load(Collection::Registrations);

        let removal = remove_course(course_id, &courses, &registrations)?;
        self.db.save(Collection::Courses, &removal.courses)?;
        self.db
            .save(Collection::Registrations, &removal.registrations)?;

        self.log.record(
            "Course Deleted",
            format!("Admin {} deleted course: {}", who.username, removal.removed.title),
        );

        Ok(removal.removed)
    }

    pub fn courses_for(&self, who: &Identity) -> Vec<CourseListing> {
        let courses: Vec<Course> = self.db.load(Collection::Courses);
        let registrations: Vec<Registration> = self.db.load(Collection::Registrations);

        courses
            .into_iter()
            .map(|course| CourseListing {
                registered: registrations
                    .iter()
                    .any(|it| it.matches(&who.user_id, &course.course_id)),
                course,
            })
            .collect()
    }

    pub fn course_detail(&self, who: &Identity, course_id: &str) -> Option<CourseDetail> {
        let courses: Vec<Course> = self.db.load(Collection::Courses);
        let course = find_course(&courses, course_id)?.clone();
        let registrations: Vec<Registration> = self.db.load(Collection::Registrations);

        Some(CourseDetail {
            is_registered: registrations
                .iter()
                .any(|it| it.matches(&who.user_id, course_id)),
            current_registrations: registrations
                .iter()
                .filter(|it| it.course_id == course_id)
                .count(),
            course,
        })
    }

    /// The user's courses in registration order.
    pub fn schedule(&self, who: &Identity) -> Vec<ScheduledCourse> {
        let courses: Vec<Course> = self.db.load(Collection::Courses);
        let registrations: Vec<Registration> = self.db.load(Collection::Registrations);

        registrations
            .into_iter()
            .filter(|it| it.user_id == who.user_id)
            .filter_map(|registration| {
                find_course(&courses, &registration.course_id).map(|course| ScheduledCourse {
                    course: course.clone(),
                    registration_date: registration.registration_date,
                })
            })
            .collect()
    }

    pub fn dashboard(&self) -> Dashboard {
        let users: Vec<User> = self.db.load(Collection::Users);
        let courses: Vec<Course> = self.db.load(Collection::Courses);
        let registrations: Vec<Registration> = self.db.load(Collection::Registrations);

        enrollment_stats(&users, &courses, &registrations)
    }
}
