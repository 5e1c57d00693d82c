use rocket::http::Cookie;
use rocket::local::asynchronous::Client;
use tempfile::TempDir;

use crate::config::Config;
use crate::data::user::User;
use crate::resp::jwt::UserRoleToken;
use crate::security::Security;

/// Client for a backend keeping all of its files in a fresh temporary
/// directory. The seeded admin is `admin`/`admin_password`.
pub async fn test_client() -> (Client, TempDir) {
    let dir = tempfile::tempdir().expect("unable to create temp dir");
    let rocket = crate::build(Config::rooted(dir.path())).expect("unable to build backend");
    let client = Client::tracked(rocket)
        .await
        .expect("valid rocket instance");
    (client, dir)
}

pub fn auth_cookie(client: &Client, user: &User) -> Cookie<'static> {
    let security: &Security = client.rocket().state().expect("security not managed");
    UserRoleToken::new(user)
        .cookie(&security.token_secret)
        .expect("unable to encode token")
}
