use rocket::{serde::json::Json, Route, State};

use crate::error::Result;
use crate::model::{
    api::{
        auth::{Admin, AuthToken, Member, Overseer, Rights},
        election::{ActiveChange, ElectionDescription, ElectionSpec, ElectionUpdate, StatusChange},
        pagination::{Paginated, Pagination},
    },
    common::election::ElectionStatus,
    mongodb::Id,
};
use crate::service::ElectionRegistry;
use crate::store::ElectionFilter;

pub fn routes() -> Vec<Route> {
    routes![
        list_elections,
        get_election,
        create_election,
        update_election,
        change_status,
        change_active,
    ]
}

/// List elections. Disabled elections are only listed for admins and auditors.
#[get("/elections?<status>&<page..>")]
async fn list_elections(
    token: AuthToken<Member>,
    status: Option<ElectionStatus>,
    page: Pagination,
    registry: &State<ElectionRegistry>,
) -> Result<Json<Paginated<ElectionDescription>>> {
    let filter = ElectionFilter {
        status,
        include_inactive: Overseer::permits(token.role),
    };
    let found = registry
        .list(&filter, page.skip(), page.page_size())
        .await?;
    let items = found.items.into_iter().map(Into::into).collect();
    Ok(Json(page.wrap(items, found.total)))
}

#[get("/elections/<election_id>")]
async fn get_election(
    _token: AuthToken<Member>,
    election_id: Id,
    registry: &State<ElectionRegistry>,
) -> Result<Json<ElectionDescription>> {
    Ok(Json(registry.get(election_id).await?.into()))
}

#[post("/elections", data = "<spec>", format = "json")]
async fn create_election(
    _token: AuthToken<Admin>,
    spec: Json<ElectionSpec>,
    registry: &State<ElectionRegistry>,
) -> Result<Json<ElectionDescription>> {
    Ok(Json(registry.create(spec.0).await?.into()))
}

#[put("/elections/<election_id>", data = "<changes>", format = "json")]
async fn update_election(
    _token: AuthToken<Admin>,
    election_id: Id,
    changes: Json<ElectionUpdate>,
    registry: &State<ElectionRegistry>,
) -> Result<Json<ElectionDescription>> {
    Ok(Json(registry.update(election_id, &changes).await?.into()))
}

#[put("/elections/<election_id>/status", data = "<change>", format = "json")]
async fn change_status(
    _token: AuthToken<Admin>,
    election_id: Id,
    change: Json<StatusChange>,
    registry: &State<ElectionRegistry>,
) -> Result<Json<ElectionDescription>> {
    let election = registry.transition(election_id, change.status).await?;
    Ok(Json(election.into()))
}

#[put("/elections/<election_id>/active", data = "<change>", format = "json")]
async fn change_active(
    _token: AuthToken<Admin>,
    election_id: Id,
    change: Json<ActiveChange>,
    registry: &State<ElectionRegistry>,
) -> Result<Json<ElectionDescription>> {
    let election = registry.set_active(election_id, change.is_active).await?;
    Ok(Json(election.into()))
}
