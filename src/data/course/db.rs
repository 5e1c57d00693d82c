use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{find_course, parse_schedule, Course, CourseError, TimeSlot};
use crate::data::store::{Collection, Database};
use crate::error::ServiceError;

/// Schedule as submitted: a list of slots, or the text form accepted by
/// [`parse_schedule`].
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum ScheduleInput {
    Slots(Vec<TimeSlot>),
    Text(String),
}

impl Default for ScheduleInput {
    fn default() -> Self {
        ScheduleInput::Slots(vec![])
    }
}

impl ScheduleInput {
    pub fn into_slots(self) -> Vec<TimeSlot> {
        match self {
            ScheduleInput::Slots(slots) => slots,
            ScheduleInput::Text(text) => parse_schedule(&text),
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CourseData {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub schedule: ScheduleInput,
    pub capacity: u32,
    #[serde(default)]
    pub prerequisites: Vec<String>,
}

impl CourseData {
    fn into_course(self, course_id: String) -> Result<Course, CourseError> {
        let course = Course {
            course_id,
            title: self.title.trim().to_string(),
            description: self.description,
            schedule: self.schedule.into_slots(),
            capacity: self.capacity,
            prerequisites: self
                .prerequisites
                .iter()
                .map(|it| it.trim())
                .filter(|it| !it.is_empty())
                .map(str::to_string)
                .collect(),
        };
        course.validate()?;
        Ok(course)
    }
}

pub trait CourseDbExt {
    fn list_courses(&self) -> Vec<Course>;
    fn get_course(&self, id: &str) -> Option<Course>;

    /// Validates and appends a course with a fresh identifier.
    fn add_course(&self, data: CourseData) -> Result<Course, ServiceError>;
    /// Replaces every field but the identifier.
    fn edit_course(&self, id: &str, data: CourseData) -> Result<Course, ServiceError>;
}

impl CourseDbExt for Database {
    fn list_courses(&self) -> Vec<Course> {
        self.load(Collection::Courses)
    }

    fn get_course(&self, id: &str) -> Option<Course> {
        find_course(&self.list_courses(), id).cloned()
    }

    fn add_course(&self, data: CourseData) -> Result<Course, ServiceError> {
        let course = data.into_course(Uuid::new_v4().to_string())?;

        let _lock = self.lock(&[Collection::Courses]);
        let mut courses: Vec<Course> = self.load(Collection::Courses);
        courses.push(course.clone());
        self.save(Collection::Courses, &courses)?;

        tracing::info!("Created course '{}' ({})", course.title, course.course_id);
        Ok(course)
    }

    fn edit_course(&self, id: &str, data: CourseData) -> Result<Course, ServiceError> {
        let updated = data.into_course(id.to_string())?;

        let _lock = self.lock(&[Collection::Courses]);
        let mut courses: Vec<Course> = self.load(Collection::Courses);
        let existing = courses
            .iter_mut()
            .find(|it| it.course_id == id)
            .ok_or_else(|| CourseError::NotFound(id.to_string()))?;
        *existing = updated.clone();
        self.save(Collection::Courses, &courses)?;

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(title: &str, schedule: ScheduleInput) -> CourseData {
        CourseData {
            title: title.to_string(),
            description: "An introduction.".to_string(),
            schedule,
            capacity: 30,
            prerequisites: vec![" CS100 ".to_string(), "".to_string()],
        }
    }

    #[test]
    fn schedule_input_accepts_both_forms() {
        let slots: ScheduleInput =
            serde_json::from_str(r#"[{"day": "Mon", "start_time": "10:00", "end_time": "11:00"}]"#)
                .unwrap();
        let text: ScheduleInput = serde_json::from_str(r#""Mon 10:00-11:00""#).unwrap();

        assert_eq!(slots.into_slots(), text.into_slots());
    }

    #[test]
    fn add_course_assigns_id_and_normalizes() {
        let db = Database::in_memory();
        let course = db
            .add_course(data(" Algorithms ", ScheduleInput::Text("Mon 10:00-11:00".into())))
            .expect("unable to add course");

        assert!(!course.course_id.is_empty());
        assert_eq!(course.title, "Algorithms");
        assert_eq!(course.prerequisites, vec!["CS100".to_string()]);
        assert_eq!(db.get_course(&course.course_id), Some(course));
    }

    #[test]
    fn add_course_rejects_inverted_slot() {
        let db = Database::in_memory();
        let result = db.add_course(data("Algorithms", ScheduleInput::Text("Mon 11:00-10:00".into())));

        assert!(matches!(
            result,
            Err(ServiceError::Course(CourseError::InvalidSlot { .. }))
        ));
        assert!(db.list_courses().is_empty());
    }

    #[test]
    fn edit_course_keeps_id() {
        let db = Database::in_memory();
        let course = db
            .add_course(data("Algorithms", ScheduleInput::default()))
            .unwrap();

        let mut changed = data("Advanced Algorithms", ScheduleInput::default());
        changed.capacity = 5;
        let edited = db.edit_course(&course.course_id, changed).unwrap();

        assert_eq!(edited.course_id, course.course_id);
        assert_eq!(db.list_courses(), vec![edited]);
    }

    #[test]
    fn edit_unknown_course_fails() {
        let db = Database::in_memory();
        let result = db.edit_course("missing", data("Algorithms", ScheduleInput::default()));

        assert!(matches!(
            result,
            Err(ServiceError::Course(CourseError::NotFound(id))) if id == "missing"
        ));
    }
}
