use rocket::form::Form;
use rocket::http::{Cookie, CookieJar, Status};
use rocket::serde::json::Json;
use rocket::State;

use crate::action_log::ActionLogger;
use crate::config::Config;
use crate::data::store::Database;
use crate::data::user::db::{ProfileUpdateData, UserDbExt, UserLoginData, UserSignupData};
use crate::data::user::{AccountError, UserResponse};
use crate::resp::jwt::{UserRoleToken, AUTH_COOKIE_NAME};
use crate::resp::problem::Problem;
use crate::route::blocking;
use crate::security::Security;

fn bad_login() -> Problem {
    Problem::new_untyped(Status::Unauthorized, "Bad username or password.")
}

/// Sign up as a student
#[utoipa::path(
    request_body(content = UserSignupData, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Created user; auth cookie is set", body = UserResponse),
        (status = 400, description = "Invalid signup data", body = Problem),
        (status = 409, description = "Username already used", body = Problem),
    )
)]
#[post("/user", data = "<signup>")]
#[tracing::instrument(skip_all, fields(username = %signup.username))]
pub async fn user_create(
    signup: Form<UserSignupData>,
    cookies: &CookieJar<'_>,
    db: &State<Database>,
    c: &State<Config>,
    security: &State<Security>,
    log: &State<ActionLogger>,
) -> Result<Json<UserResponse>, Problem> {
    let (db, admins, signup) = (
        db.inner().clone(),
        c.admin_usernames.clone(),
        signup.into_inner(),
    );
    let user = blocking(move || Ok(db.create_user(signup, &admins)?)).await?;

    cookies.add(UserRoleToken::new(&user).cookie(&security.token_secret)?);
    log.record("Registration", format!("New user {} registered", user.username));

    Ok(Json(UserResponse::from(user)))
}

/// Log in
#[utoipa::path(
    request_body(content = UserLoginData, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Logged in user; auth cookie is set", body = UserResponse),
        (status = 401, description = "Bad username or password", body = Problem),
    )
)]
#[post("/login", data = "<login_user>")]
#[tracing::instrument(skip_all, fields(username = %login_user.username))]
pub async fn login_submit(
    login_user: Form<UserLoginData>,
    cookies: &CookieJar<'_>,
    db: &State<Database>,
    security: &State<Security>,
    log: &State<ActionLogger>,
) -> Result<Json<UserResponse>, Problem> {
    let db = db.inner().clone();
    let UserLoginData { username, password } = login_user.into_inner();
    let user = blocking(move || db.login(&username, &password).ok_or_else(bad_login)).await?;

    cookies.add(UserRoleToken::new(&user).cookie(&security.token_secret)?);
    log.record("Login", format!("User {} logged in", user.username));

    Ok(Json(UserResponse::from(user)))
}

/// Log out
#[utoipa::path(responses((status = 204, description = "Auth cookie removed")))]
#[post("/logout")]
#[tracing::instrument(skip_all)]
pub fn logout(
    auth: Option<UserRoleToken>,
    cookies: &CookieJar<'_>,
    log: &State<ActionLogger>,
) -> Status {
    if let Some(auth) = auth {
        log.record("Logout", format!("User {} logged out", auth.username));
    }
    cookies.remove(Cookie::from(AUTH_COOKIE_NAME));
    Status::NoContent
}

/// Own profile
#[utoipa::path(
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Missing/expired token", body = Problem),
    ),
    security(("auth_token" = []))
)]
#[get("/user/me")]
#[tracing::instrument(skip_all, fields(user = %auth.user))]
pub async fn user_me(
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<UserResponse>, Problem> {
    let (db, id) = (db.inner().clone(), auth.user.clone());
    blocking(move || {
        db.get_user(&id)
            .map(|user| Json(UserResponse::from(user)))
            .ok_or_else(|| Problem::from(AccountError::NotFound(id.clone())))
    })
    .await
}

/// Update own name and/or password
#[utoipa::path(
    request_body(content = ProfileUpdateData, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 400, description = "New passwords don't match", body = Problem),
        (status = 401, description = "Missing token or wrong current password", body = Problem),
    ),
    security(("auth_token" = []))
)]
#[post("/user/me", data = "<update>")]
#[tracing::instrument(skip_all, fields(user = %auth.user))]
pub async fn profile_update(
    update: Form<ProfileUpdateData>,
    auth: UserRoleToken,
    db: &State<Database>,
    log: &State<ActionLogger>,
) -> Result<Json<UserResponse>, Problem> {
    let (db, id, update) = (db.inner().clone(), auth.user.clone(), update.into_inner());
    let user = blocking(move || Ok(db.update_profile(&id, update)?)).await?;
    log.record(
        "Profile Update",
        format!("User {} updated their profile", auth.username),
    );

    Ok(Json(UserResponse::from(user)))
}

///////////////////////
//       TESTS
///////////////////////

#[cfg(test)]
mod user_endpoints {
    use rocket::http::{ContentType, Status};

    use crate::data::store::Database;
    use crate::data::user::db::UserDbExt;
    use crate::data::user::UserResponse;
    use crate::resp::jwt::AUTH_COOKIE_NAME;
    use crate::role::Role;
    use crate::route::test_support::{auth_cookie, test_client};

    fn signup_form(user: &str) -> String {
        format!(
            "username={0}&password={0}_pass&confirm_password={0}_pass&name={0}",
            user
        )
    }

    #[rocket::async_test]
    async fn v1_user_create_works() {
        let (client, _dir) = test_client().await;

        let response = client
            .post("/api/v1/user")
            .header(ContentType::Form)
            .body(signup_form("v1_user_create_works"))
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok, "an ok response");
        assert_eq!(response.content_type(), Some(ContentType::JSON));
        assert!(
            response.cookies().get(AUTH_COOKIE_NAME).is_some(),
            "auth cookie wasn't present"
        );

        let created: UserResponse = response.into_json().await.expect("invalid response json");
        assert_eq!(created.username, "v1_user_create_works");
        assert_eq!(created.role, Role::Student);
    }

    #[rocket::async_test]
    async fn v1_user_create_rejects_taken_username() {
        let (client, _dir) = test_client().await;

        for expected in [Status::Ok, Status::Conflict] {
            let response = client
                .post("/api/v1/user")
                .header(ContentType::Form)
                .body(signup_form("taken"))
                .dispatch()
                .await;
            assert_eq!(response.status(), expected);
        }
    }

    #[rocket::async_test]
    async fn v1_login_submit_works() {
        let (client, _dir) = test_client().await;

        let response = client
            .post("/api/v1/login")
            .header(ContentType::Form)
            .body("username=admin&password=admin_password")
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok, "an ok response");
        assert!(response.cookies().get(AUTH_COOKIE_NAME).is_some());

        let user: UserResponse = response.into_json().await.expect("invalid response json");
        assert_eq!(user.role, Role::Admin);
    }

    #[rocket::async_test]
    async fn v1_login_submit_rejects_bad_password() {
        let (client, _dir) = test_client().await;

        let response = client
            .post("/api/v1/login")
            .header(ContentType::Form)
            .body("username=admin&password=guess")
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Unauthorized);
        assert!(response.cookies().get(AUTH_COOKIE_NAME).is_none());
    }

    #[rocket::async_test]
    async fn v1_user_me_requires_token() {
        let (client, _dir) = test_client().await;

        let response = client.get("/api/v1/user/me").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
        assert_eq!(
            response.content_type(),
            Some(ContentType::new("application", "problem+json"))
        );
    }

    #[rocket::async_test]
    async fn v1_profile_update_changes_name() {
        let (client, _dir) = test_client().await;
        let db: &Database = client.rocket().state().expect("database not managed");
        let admin = db.find_user_by_username("admin").expect("admin wasn't seeded");

        let response = client
            .post("/api/v1/user/me")
            .header(ContentType::Form)
            .cookie(auth_cookie(&client, &admin))
            .body("name=Registrar")
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);
        let user: UserResponse = response.into_json().await.expect("invalid response json");
        assert_eq!(user.name, "Registrar");
        assert!(db.login("admin", "admin_password").is_some());
    }
}
