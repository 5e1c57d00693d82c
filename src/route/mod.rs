use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Build, Catcher, Request, Rocket, Route};

pub mod admin;
pub mod courses;
pub mod users;

#[cfg(test)]
pub(crate) mod test_support;

use admin::*;
use courses::*;
use users::*;

use utoipa::OpenApi;

use crate::{
    data::{
        course::{
            db::{CourseData, ScheduleInput},
            Course, TimeSlot,
        },
        registration::Registration,
        user::db::{ProfileUpdateData, UserLoginData, UserSignupData},
        user::UserResponse,
    },
    enrollment::{
        registrar::{CourseDetail, CourseListing, ScheduledCourse},
        CourseStats, Dashboard,
    },
    resp::{
        jwt::{auth_problem, doc::CookieAuth},
        problem::{problems, Problem},
    },
    role::Role,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        user_create,
        login_submit,
        logout,
        user_me,
        profile_update,
        course_list,
        course_info,
        course_register,
        course_unregister,
        schedule,
        admin_dashboard,
        admin_users,
        course_create,
        course_update,
        course_delete
    ),
    components(schemas(
        Role,
        Course,
        TimeSlot,
        Registration,
        CourseData,
        ScheduleInput,
        CourseListing,
        CourseDetail,
        ScheduledCourse,
        CourseStats,
        Dashboard,
        UserResponse,
        UserLoginData,
        UserSignupData,
        ProfileUpdateData,
        Problem
    )),
    modifiers(&CookieAuth, &V1_PREFIX)
)]
pub struct ApiDocV1;

pub struct PathPrefix(pub &'static str);
static V1_PREFIX: PathPrefix = PathPrefix("/api/v1");

impl utoipa::Modify for PathPrefix {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.paths.paths = std::mem::take(&mut openapi.paths.paths)
            .into_iter()
            .map(|(path, item)| (self.0.to_string() + path.as_ref(), item))
            .collect();
    }
}

/// OpenAPI document of the v1 API
#[get("/openapi.json")]
pub fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDocV1::openapi())
}

/// Runs store and password hashing work on the blocking thread pool, keeping
/// collection locks and file I/O off the async workers.
pub(crate) async fn blocking<T, F>(work: F) -> Result<T, Problem>
where
    F: FnOnce() -> Result<T, Problem> + Send + 'static,
    T: Send + 'static,
{
    match rocket::tokio::task::spawn_blocking(work).await {
        Ok(result) => result,
        Err(err) => {
            tracing::error!("Blocking request work failed: {}", err);
            Err(Problem::new_untyped(
                Status::InternalServerError,
                "Request couldn't be completed.",
            ))
        }
    }
}

#[catch(401)]
fn unauthorized() -> Problem {
    auth_problem("Missing, expired or malformed auth token cookie.")
}

#[catch(404)]
fn not_found(req: &Request) -> Problem {
    problems::not_found(req.uri())
}

#[catch(422)]
fn unprocessable(req: &Request) -> Problem {
    Problem::new_untyped(Status::UnprocessableEntity, "Malformed request data.")
        .instance_uri(req.uri().to_string())
        .clone()
}

pub fn api_v1() -> Vec<Route> {
    routes![
        user_create,
        login_submit,
        logout,
        user_me,
        profile_update,
        course_list,
        course_info,
        course_register,
        course_unregister,
        schedule,
        admin_dashboard,
        admin_users,
        course_create,
        course_update,
        course_delete,
        openapi_json
    ]
}

pub fn problem_catchers() -> Vec<Catcher> {
    catchers![unauthorized, not_found, unprocessable]
}

pub fn mount_api(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/api/v1", api_v1())
        .register("/", problem_catchers())
}
