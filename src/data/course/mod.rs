use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

pub mod db;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CourseError {
    #[error("course '{0}' doesn't exist")]
    NotFound(String),
    #[error("course title can't be empty")]
    EmptyTitle,
    #[error("invalid time slot '{slot}': {reason}")]
    InvalidSlot { slot: String, reason: &'static str },
}

/// Splits `HH:MM` (or `H:MM`) into hours and minutes without range checks.
fn clock_parts(time: &str) -> Option<(u32, u32)> {
    let (hours, minutes) = time.trim().split_once(':')?;
    if hours.is_empty()
        || minutes.is_empty()
        || !hours.bytes().all(|b| b.is_ascii_digit())
        || !minutes.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    Some((hours.parse().ok()?, minutes.parse().ok()?))
}

/// Minutes since midnight, or `None` unless the time is a valid clock time
/// (hour 0-23, minute 0-59).
pub fn minutes_since_midnight(time: &str) -> Option<u32> {
    clock_parts(time)
        .filter(|(h, m)| *h <= 23 && *m <= 59)
        .map(|(h, m)| h * 60 + m)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct TimeSlot {
    /// Day token, compared verbatim.
    #[schema(example = "Monday")]
    pub day: String,
    #[schema(example = "10:00")]
    pub start_time: String,
    #[schema(example = "12:00")]
    pub end_time: String,
}

impl TimeSlot {
    pub fn new(day: impl ToString, start_time: impl ToString, end_time: impl ToString) -> TimeSlot {
        TimeSlot {
            day: day.to_string(),
            start_time: start_time.to_string(),
            end_time: end_time.to_string(),
        }
    }

    /// Start and end in minutes since midnight, or `None` if either can't be
    /// parsed.
    pub fn span(&self) -> Option<(u32, u32)> {
        Some((
            minutes_since_midnight(&self.start_time)?,
            minutes_since_midnight(&self.end_time)?,
        ))
    }

    pub fn validate(&self) -> Result<(), CourseError> {
        let invalid = |reason| CourseError::InvalidSlot {
            slot: self.to_string(),
            reason,
        };

        if self.day.trim().is_empty() {
            return Err(invalid("missing day"));
        }

        let start = clock_parts(&self.start_time).ok_or_else(|| invalid("start isn't HH:MM"))?;
        let end = clock_parts(&self.end_time).ok_or_else(|| invalid("end isn't HH:MM"))?;

        for (h, m) in [start, end] {
            if h > 23 || m > 59 {
                return Err(invalid("time out of range"));
            }
        }

        if start >= end {
            return Err(invalid("start must be before end"));
        }

        Ok(())
    }
}

impl std::fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}-{}", self.day, self.start_time, self.end_time)
    }
}

/// Parses the text form of a schedule, e.g. `Monday 10:00-12:00, Wednesday 10:00-12:00`.
///
/// Entries without a day and a `start-end` range are skipped; times aren't
/// checked here.
pub fn parse_schedule(schedule: &str) -> Vec<TimeSlot> {
    schedule
        .split(',')
        .map(str::trim)
        .filter(|it| !it.is_empty())
        .filter_map(|slot| {
            let mut parts = slot.split_whitespace();
            let day = parts.next()?;
            let (start, end) = parts.next()?.split_once('-')?;
            Some(TimeSlot::new(day, start, end))
        })
        .collect()
}

pub fn format_schedule(schedule: &[TimeSlot]) -> String {
    schedule
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Course {
    pub course_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub schedule: Vec<TimeSlot>,
    pub capacity: u32,
    #[serde(default)]
    pub prerequisites: Vec<String>,
}

impl Course {
    pub fn validate(&self) -> Result<(), CourseError> {
        if self.title.trim().is_empty() {
            return Err(CourseError::EmptyTitle);
        }
        self.schedule.iter().try_for_each(TimeSlot::validate)
    }
}

pub fn find_course<'a>(courses: &'a [Course], course_id: &str) -> Option<&'a Course> {
    courses.iter().find(|it| it.course_id == course_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_schedule() {
        let schedule = parse_schedule("Monday 10:00-12:00, Wednesday 9:30-11:00,, ");
        assert_eq!(
            schedule,
            vec![
                TimeSlot::new("Monday", "10:00", "12:00"),
                TimeSlot::new("Wednesday", "9:30", "11:00"),
            ]
        );
        assert_eq!(
            format_schedule(&schedule),
            "Monday 10:00-12:00, Wednesday 9:30-11:00"
        );
    }

    #[test]
    fn skips_incomplete_entries() {
        assert!(parse_schedule("").is_empty());
        assert_eq!(
            parse_schedule("Monday, Tuesday 10:00, Friday 08:00-09:00"),
            vec![TimeSlot::new("Friday", "08:00", "09:00")]
        );
    }

    #[test]
    fn span_is_minutes_since_midnight() {
        assert_eq!(TimeSlot::new("Mon", "09:00", "10:30").span(), Some((540, 630)));
        assert_eq!(TimeSlot::new("Mon", "9:5", "10").span(), None);
        assert_eq!(TimeSlot::new("Mon", "ab:cd", "10:00").span(), None);
        assert_eq!(TimeSlot::new("Mon", "24:00", "25:00").span(), None);
        assert_eq!(TimeSlot::new("Mon", "10:00", "10:75").span(), None);
        assert_eq!(
            TimeSlot::new("Mon", "99999999:00", "99999999:30").span(),
            None
        );
    }

    #[test]
    fn validation_rejects_malformed_slots() {
        assert!(TimeSlot::new("Mon", "10:00", "11:00").validate().is_ok());

        for slot in [
            TimeSlot::new("Mon", "11:00", "10:00"),
            TimeSlot::new("Mon", "10:00", "10:00"),
            TimeSlot::new("Mon", "24:00", "25:00"),
            TimeSlot::new("Mon", "10:60", "11:00"),
            TimeSlot::new("Mon", "ten", "11:00"),
            TimeSlot::new(" ", "10:00", "11:00"),
        ] {
            assert!(
                matches!(slot.validate(), Err(CourseError::InvalidSlot { .. })),
                "{} should be rejected",
                slot
            );
        }
    }

    #[test]
    fn course_requires_title() {
        let course = Course {
            course_id: "CS101".to_string(),
            title: "  ".to_string(),
            description: String::new(),
            schedule: vec![],
            capacity: 10,
            prerequisites: vec![],
        };
        assert_eq!(course.validate(), Err(CourseError::EmptyTitle));
    }
}
