use rocket::{serde::json::Json, Route, State};

use crate::error::Result;
use crate::model::{
    api::{
        auth::{AuthToken, Member},
        vote::{BallotSpec, VoteReceipt, VoteStatus},
    },
    mongodb::Id,
};
use crate::service::VoteEngine;

pub fn routes() -> Vec<Route> {
    routes![cast_votes, vote_status]
}

#[post("/elections/<election_id>/votes", data = "<ballot>", format = "json")]
async fn cast_votes(
    token: AuthToken<Member>,
    election_id: Id,
    ballot: Json<BallotSpec>,
    engine: &State<VoteEngine>,
) -> Result<Json<VoteReceipt>> {
    let roles = engine.cast(election_id, token.id, &ballot).await?;
    Ok(Json(VoteReceipt {
        election_id: election_id.into(),
        roles,
    }))
}

#[get("/elections/<election_id>/votes/status")]
async fn vote_status(
    token: AuthToken<Member>,
    election_id: Id,
    engine: &State<VoteEngine>,
) -> Result<Json<VoteStatus>> {
    Ok(Json(engine.status(election_id, token.id).await?))
}
