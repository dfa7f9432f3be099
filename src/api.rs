use rocket::{http::Status, serde::json::Json, Catcher, Request, Route};

use crate::error::{AuthFailure, ErrorBody};

mod candidates;
mod elections;
mod recommendations;
mod results;
mod votes;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(elections::routes());
    routes.extend(recommendations::routes());
    routes.extend(candidates::routes());
    routes.extend(votes::routes());
    routes.extend(results::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![json_error]
}

/// Render every unhandled failure as an [`ErrorBody`], using the rejected
/// request guard's error where there was one.
#[catch(default)]
fn json_error(status: Status, req: &Request<'_>) -> (Status, Json<ErrorBody>) {
    let body = req
        .local_cache(AuthFailure::default)
        .0
        .clone()
        .unwrap_or_else(|| ErrorBody::for_status(status));
    (status, Json(body))
}


#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Header, Status},
        local::asynchronous::Client,
    };

    use super::test_support::{error, login};
    use crate::config::Config;
    use crate::model::{api::auth::Claims, db::user::User};
    use crate::store::MemoryStore;

    #[backend_test]
    async fn unknown_routes_are_json(client: Client) {
        let response = client.get("/no/such/route").dispatch().await;
        error(response, Status::NotFound, "NOT_FOUND").await;
    }

    #[backend_test]
    async fn missing_tokens_are_unauthorized(client: Client) {
        let response = client.get("/elections").dispatch().await;
        error(response, Status::Unauthorized, "AUTH_UNAUTHORIZED").await;
    }

    #[backend_test]
    async fn forged_tokens_are_unauthorized(client: Client) {
        let response = client
            .get("/elections")
            .header(Header::new("Authorization", "Bearer not.a.token"))
            .dispatch()
            .await;
        error(response, Status::Unauthorized, "AUTH_INVALID_TOKEN").await;
    }

    #[backend_test]
    async fn unknown_users_are_unauthorized(client: Client) {
        let config = client.rocket().state::<Config>().unwrap();
        let stranger = User::member();
        let response = client
            .get("/elections")
            .header(Claims::for_user(&stranger).bearer(config))
            .dispatch()
            .await;
        error(response, Status::Unauthorized, "AUTH_UNAUTHORIZED").await;
    }

    #[backend_test]
    async fn inactive_users_are_forbidden(client: Client, store: MemoryStore) {
        let auth = login(&client, &store, &User::inactive()).await;
        let response = client.get("/elections").header(auth).dispatch().await;
        error(response, Status::Forbidden, "USER_INACTIVE").await;
    }

    #[backend_test]
    async fn members_cannot_administer(client: Client, store: MemoryStore) {
        let auth = login(&client, &store, &User::member()).await;
        let response = client
            .put("/elections/000000000000000000000000/active")
            .header(auth)
            .header(ContentType::JSON)
            .body(r#"{"isActive": false}"#)
            .dispatch()
            .await;
        error(response, Status::Forbidden, "AUTH_FORBIDDEN").await;
    }
}
