use rocket::{serde::json::Json, Route, State};

use crate::error::Result;
use crate::model::{
    api::{
        auth::{Admin, AuthToken, Member, Overseer},
        candidate::{CandidateReply, CandidateView, InvitationSpec},
    },
    mongodb::Id,
};
use crate::service::CandidateDesk;

pub fn routes() -> Vec<Route> {
    routes![
        accepted_candidates,
        all_candidates,
        invite_candidates,
        respond,
        withdraw,
    ]
}

/// The ballot: everyone who has accepted their candidacy.
#[get("/elections/<election_id>/candidates")]
async fn accepted_candidates(
    _token: AuthToken<Member>,
    election_id: Id,
    desk: &State<CandidateDesk>,
) -> Result<Json<Vec<CandidateView>>> {
    let candidates = desk.accepted(election_id).await?;
    Ok(Json(desk.views(election_id, candidates).await?))
}

#[get("/elections/<election_id>/candidates/all")]
async fn all_candidates(
    _token: AuthToken<Overseer>,
    election_id: Id,
    desk: &State<CandidateDesk>,
) -> Result<Json<Vec<CandidateView>>> {
    let candidates = desk.all(election_id).await?;
    Ok(Json(desk.views(election_id, candidates).await?))
}

/// Invite the most-recommended nominees for a role. Returns only those
/// newly invited.
#[post("/elections/<election_id>/candidates/invitations", data = "<spec>", format = "json")]
async fn invite_candidates(
    _token: AuthToken<Admin>,
    election_id: Id,
    spec: Json<InvitationSpec>,
    desk: &State<CandidateDesk>,
) -> Result<Json<Vec<CandidateView>>> {
    let invited = desk.invite(election_id, spec.0).await?;
    Ok(Json(desk.views(election_id, invited).await?))
}

#[put("/candidates/<candidate_id>/response", data = "<reply>", format = "json")]
async fn respond(
    token: AuthToken<Member>,
    candidate_id: Id,
    reply: Json<CandidateReply>,
    desk: &State<CandidateDesk>,
) -> Result<Json<CandidateView>> {
    let candidate = desk.respond(candidate_id, token.id, &reply).await?;
    Ok(Json(desk.view(candidate).await?))
}

#[put("/candidates/<candidate_id>/withdrawal")]
async fn withdraw(
    token: AuthToken<Member>,
    candidate_id: Id,
    desk: &State<CandidateDesk>,
) -> Result<Json<CandidateView>> {
    let candidate = desk.withdraw(candidate_id, token.id).await?;
    Ok(Json(desk.view(candidate).await?))
}
