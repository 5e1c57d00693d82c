use rocket::serde::json::Json;
use rocket::State;

use crate::action_log::ActionLogger;
use crate::data::course::db::{CourseData, CourseDbExt};
use crate::data::course::Course;
use crate::data::store::Database;
use crate::data::user::db::UserDbExt;
use crate::data::user::UserResponse;
use crate::enrollment::registrar::Registrar;
use crate::enrollment::Dashboard;
use crate::resp::jwt::UserRoleToken;
use crate::resp::problem::{problems, Problem};
use crate::route::blocking;

fn require_admin(auth: &UserRoleToken) -> Result<(), Problem> {
    if !auth.role.is_admin() {
        return Err(problems::forbidden("Only administrators can access this resource."));
    }
    Ok(())
}

/// Enrollment statistics
#[utoipa::path(
    responses(
        (status = 200, description = "Counts and per-course fill", body = Dashboard),
        (status = 401, description = "Missing/expired token", body = Problem),
        (status = 403, description = "Caller isn't an admin", body = Problem),
    ),
    security(("auth_token" = []))
)]
#[get("/admin/dashboard")]
#[tracing::instrument(skip_all, fields(user = %auth.user))]
pub async fn admin_dashboard(
    auth: UserRoleToken,
    registrar: &State<Registrar>,
) -> Result<Json<Dashboard>, Problem> {
    require_admin(&auth)?;
    let registrar = registrar.inner().clone();
    blocking(move || Ok(Json(registrar.dashboard()))).await
}

/// List all users
#[utoipa::path(
    responses(
        (status = 200, description = "Every account", body = Vec<UserResponse>),
        (status = 401, description = "Missing/expired token", body = Problem),
        (status = 403, description = "Caller isn't an admin", body = Problem),
    ),
    security(("auth_token" = []))
)]
#[get("/admin/users")]
#[tracing::instrument(skip_all, fields(user = %auth.user))]
pub async fn admin_users(
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<Vec<UserResponse>>, Problem> {
    require_admin(&auth)?;
    let db = db.inner().clone();
    blocking(move || {
        Ok(Json(
            db.list_users().into_iter().map(UserResponse::from).collect(),
        ))
    })
    .await
}

/// Add a course
#[utoipa::path(
    request_body = CourseData,
    responses(
        (status = 200, description = "Created course", body = Course),
        (status = 400, description = "Empty title or malformed time slot", body = Problem),
        (status = 401, description = "Missing/expired token", body = Problem),
        (status = 403, description = "Caller isn't an admin", body = Problem),
    ),
    security(("auth_token" = []))
)]
#[post("/admin/course", format = "json", data = "<data>")]
#[tracing::instrument(skip_all, fields(user = %auth.user))]
pub async fn course_create(
    data: Json<CourseData>,
    auth: UserRoleToken,
    db: &State<Database>,
    log: &State<ActionLogger>,
) -> Result<Json<Course>, Problem> {
    require_admin(&auth)?;

    let (db, data) = (db.inner().clone(), data.into_inner());
    let course = blocking(move || Ok(db.add_course(data)?)).await?;
    log.record(
        "Course Added",
        format!("Admin {} added new course: {}", auth.username, course.title),
    );

    Ok(Json(course))
}

/// Replace a course's details
#[utoipa::path(
    request_body = CourseData,
    params(
        ("id", description = "course ID")
    ),
    responses(
        (status = 200, description = "Updated course", body = Course),
        (status = 400, description = "Empty title or malformed time slot", body = Problem),
        (status = 401, description = "Missing/expired token", body = Problem),
        (status = 403, description = "Caller isn't an admin", body = Problem),
        (status = 404, description = "Course doesn't exist", body = Problem),
    ),
    security(("auth_token" = []))
)]
#[put("/admin/course/<id>", format = "json", data = "<data>")]
#[tracing::instrument(skip_all, fields(user = %auth.user, course = %id))]
pub async fn course_update(
    id: &str,
    data: Json<CourseData>,
    auth: UserRoleToken,
    db: &State<Database>,
    log: &State<ActionLogger>,
) -> Result<Json<Course>, Problem> {
    require_admin(&auth)?;

    let (db, id, data) = (db.inner().clone(), id.to_string(), data.into_inner());
    let course = blocking(move || Ok(db.edit_course(&id, data)?)).await?;
    log.record(
        "Course Updated",
        format!("Admin {} updated course: {}", auth.username, course.title),
    );

    Ok(Json(course))
}

/// Delete a course along with its registrations
#[utoipa::path(
    params(
        ("id", description = "course ID")
    ),
    responses(
        (status = 200, description = "Removed course", body = Course),
        (status = 401, description = "Missing/expired token", body = Problem),
        (status = 403, description = "Caller isn't an admin", body = Problem),
        (status = 404, description = "Course doesn't exist", body = Problem),
    ),
    security(("auth_token" = []))
)]
#[delete("/admin/course/<id>")]
#[tracing::instrument(skip_all, fields(user = %auth.user, course = %id))]
pub async fn course_delete(
    id: &str,
    auth: UserRoleToken,
    registrar: &State<Registrar>,
) -> Result<Json<Course>, Problem> {
    require_admin(&auth)?;
    let (registrar, who, id) = (registrar.inner().clone(), auth.identity(), id.to_string());
    blocking(move || Ok(Json(registrar.delete_course(&who, &id)?))).await
}

///////////////////////
//       TESTS
///////////////////////
