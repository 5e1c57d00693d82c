use rocket::serde::json::Json;
use rocket::State;

use crate::data::registration::Registration;
use crate::enrollment::registrar::{CourseDetail, CourseListing, Registrar, ScheduledCourse};
use crate::resp::jwt::UserRoleToken;
use crate::resp::problem::{problems, Problem};
use crate::route::blocking;

/// List all courses
#[utoipa::path(
    responses(
        (status = 200, description = "Courses, flagged if the caller is registered", body = Vec<CourseListing>),
        (status = 401, description = "Missing/expired token", body = Problem),
    ),
    security(("auth_token" = []))
)]
#[get("/course")]
#[tracing::instrument(skip_all, fields(user = %auth.user))]
pub async fn course_list(
    auth: UserRoleToken,
    registrar: &State<Registrar>,
) -> Result<Json<Vec<CourseListing>>, Problem> {
    let (registrar, who) = (registrar.inner().clone(), auth.identity());
    blocking(move || Ok(Json(registrar.courses_for(&who)))).await
}

/// Get course information
#[utoipa::path(
    params(
        ("id", description = "course ID")
    ),
    responses(
        (status = 200, description = "Course with its current registration count", body = CourseDetail),
        (status = 401, description = "Missing/expired token", body = Problem),
        (status = 404, description = "Queried course doesn't exist", body = Problem),
    ),
    security(("auth_token" = []))
)]
#[get("/course/<id>")]
#[tracing::instrument(skip_all, fields(user = %auth.user, course = %id))]
pub async fn course_info(
    id: &str,
    auth: UserRoleToken,
    registrar: &State<Registrar>,
) -> Result<Json<CourseDetail>, Problem> {
    let (registrar, who, id) = (registrar.inner().clone(), auth.identity(), id.to_string());
    blocking(move || {
        registrar
            .course_detail(&who, &id)
            .map(Json)
            .ok_or_else(|| problems::not_found(format!("course '{}'", id)))
    })
    .await
}

/// Register for a course
#[utoipa::path(
    params(
        ("id", description = "course ID")
    ),
    responses(
        (status = 200, description = "Created registration", body = Registration),
        (status = 401, description = "Missing/expired token", body = Problem),
        (status = 404, description = "Course doesn't exist", body = Problem),
        (status = 409, description = "Already registered, course full, schedule conflict or missing prerequisites", body = Problem),
    ),
    security(("auth_token" = []))
)]
#[post("/course/<id>/registration")]
#[tracing::instrument(skip_all, fields(user = %auth.user, course = %id))]
pub async fn course_register(
    id: &str,
    auth: UserRoleToken,
    registrar: &State<Registrar>,
) -> Result<Json<Registration>, Problem> {
    let (registrar, who, id) = (registrar.inner().clone(), auth.identity(), id.to_string());
    blocking(move || Ok(Json(registrar.register(&who, &id)?))).await
}

/// Unregister from a course
#[utoipa::path(
    params(
        ("id", description = "course ID")
    ),
    responses(
        (status = 200, description = "ID of the course the caller left", body = String),
        (status = 401, description = "Missing/expired token", body = Problem),
        (status = 409, description = "Caller isn't registered for the course", body = Problem),
    ),
    security(("auth_token" = []))
)]
#[delete("/course/<id>/registration")]
#[tracing::instrument(skip_all, fields(user = %auth.user, course = %id))]
pub async fn course_unregister(
    id: &str,
    auth: UserRoleToken,
    registrar: &State<Registrar>,
) -> Result<String, Problem> {
    let (registrar, who, id) = (registrar.inner().clone(), auth.identity(), id.to_string());
    blocking(move || {
        registrar.unregister(&who, &id)?;
        Ok(id)
    })
    .await
}

/// Own weekly schedule
#[utoipa::path(
    responses(
        (status = 200, description = "Courses the caller is registered for", body = Vec<ScheduledCourse>),
        (status = 401, description = "Missing/expired token", body = Problem),
    ),
    security(("auth_token" = []))
)]
#[get("/schedule")]
#[tracing::instrument(skip_all, fields(user = %auth.user))]
pub async fn schedule(
    auth: UserRoleToken,
    registrar: &State<Registrar>,
) -> Result<Json<Vec<ScheduledCourse>>, Problem> {
    let (registrar, who) = (registrar.inner().clone(), auth.identity());
    blocking(move || Ok(Json(registrar.schedule(&who)))).await
}

///////////////////////
//       TESTS
///////////////////////

#[cfg(test)]
mod course_endpoints {
    use rocket::http::{ContentType, Status};
    use serde_json::Value;

    use crate::data::course::db::{CourseData, CourseDbExt, ScheduleInput};
    use crate::data::store::Database;
    use crate::data::user::db::{UserDbExt, UserSignupData};
    use crate::data::user::User;
    use crate::route::test_support::{auth_cookie, test_client};

    fn student(db: &Database, name: &str) -> User {
        db.create_user(
            UserSignupData {
                username: name.to_string(),
                password: "password".to_string(),
                confirm_password: "password".to_string(),
                name: name.to_string(),
            },
            &[],
        )
        .expect("unable to create student")
    }

    fn add_course(db: &Database, title: &str, capacity: u32, schedule: &str) -> String {
        db.add_course(CourseData {
            title: title.to_string(),
            description: String::new(),
            schedule: ScheduleInput::Text(schedule.to_string()),
            capacity,
            prerequisites: vec![],
        })
        .expect("unable to add course")
        .course_id
    }

    #[rocket::async_test]
    async fn register_until_full() {
        let (client, _dir) = test_client().await;
        let db: &Database = client.rocket().state().unwrap();
        let cs101 = add_course(db, "CS101", 1, "Mon 10:00-11:00");
        let u1 = student(db, "u1");
        let u2 = student(db, "u2");
        let uri = format!("/api/v1/course/{}/registration", cs101);

        let response = client
            .post(uri.as_str())
            .cookie(auth_cookie(&client, &u1))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let response = client
            .post(uri.as_str())
            .cookie(auth_cookie(&client, &u2))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Conflict);
        let problem: Value = response.into_json().await.expect("invalid problem json");
        assert_eq!(problem["type"], "/problems/capacity-exceeded");
        assert_eq!(problem["status"], 409);

        let response = client
            .get(format!("/api/v1/course/{}", cs101))
            .cookie(auth_cookie(&client, &u2))
            .dispatch()
            .await;
        let detail: Value = response.into_json().await.expect("invalid detail json");
        assert_eq!(detail["current_registrations"], 1);
        assert_eq!(detail["is_registered"], false);
        assert_eq!(detail["title"], "CS101");
    }

    #[rocket::async_test]
    async fn conflicting_registration_is_refused() {
        let (client, _dir) = test_client().await;
        let db: &Database = client.rocket().state().unwrap();
        let a = add_course(db, "A", 10, "Mon 09:00-10:30");
        let b = add_course(db, "B", 10, "Mon 10:00-11:00");
        let u1 = student(db, "u1");

        let response = client
            .post(format!("/api/v1/course/{}/registration", a))
            .cookie(auth_cookie(&client, &u1))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let response = client
            .post(format!("/api/v1/course/{}/registration", b))
            .cookie(auth_cookie(&client, &u1))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Conflict);
        let problem: Value = response.into_json().await.unwrap();
        assert_eq!(problem["conflicting_course_id"], a.as_str());
    }

    #[rocket::async_test]
    async fn unregister_and_schedule() {
        let (client, _dir) = test_client().await;
        let db: &Database = client.rocket().state().unwrap();
        let a = add_course(db, "A", 10, "Tue 09:00-10:00");
        let u1 = student(db, "u1");
        let registration = format!("/api/v1/course/{}/registration", a);

        client
            .post(registration.as_str())
            .cookie(auth_cookie(&client, &u1))
            .dispatch()
            .await;

        let response = client
            .get("/api/v1/schedule")
            .cookie(auth_cookie(&client, &u1))
            .dispatch()
            .await;
        let schedule: Vec<Value> = response.into_json().await.unwrap();
        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule[0]["course_id"], a.as_str());
        assert!(schedule[0]["registration_date"].is_string());

        let response = client
            .delete(registration.as_str())
            .cookie(auth_cookie(&client, &u1))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let response = client
            .delete(registration.as_str())
            .cookie(auth_cookie(&client, &u1))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Conflict);
    }

    #[rocket::async_test]
    async fn unknown_course_is_not_found() {
        let (client, _dir) = test_client().await;
        let db: &Database = client.rocket().state().unwrap();
        let u1 = student(db, "u1");

        for response in [
            client
                .get("/api/v1/course/missing")
                .cookie(auth_cookie(&client, &u1))
                .dispatch()
                .await,
            client
                .post("/api/v1/course/missing/registration")
                .cookie(auth_cookie(&client, &u1))
                .dispatch()
                .await,
        ] {
            assert_eq!(response.status(), Status::NotFound);
            assert_eq!(
                response.content_type(),
                Some(ContentType::new("application", "problem+json"))
            );
        }
    }

    #[rocket::async_test]
    async fn course_list_flags_registrations() {
        let (client, _dir) = test_client().await;
        let db: &Database = client.rocket().state().unwrap();
        add_course(db, "A", 10, "");
        let b = add_course(db, "B", 10, "");
        let u1 = student(db, "u1");

        client
            .post(format!("/api/v1/course/{}/registration", b))
            .cookie(auth_cookie(&client, &u1))
            .dispatch()
            .await;

        let response = client
            .get("/api/v1/course")
            .cookie(auth_cookie(&client, &u1))
            .dispatch()
            .await;
        let courses: Vec<Value> = response.into_json().await.unwrap();
        let flags: Vec<_> = courses.iter().map(|it| it["registered"].clone()).collect();
        assert_eq!(flags, vec![Value::Bool(false), Value::Bool(true)]);
    }
}
