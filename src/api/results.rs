use rocket::{serde::json::Json, Route, State};

use crate::error::Result;
use crate::model::{
    api::{
        auth::{AuthToken, Member, Overseer},
        election::{ElectionProgress, ResultDetail, ResultSummary},
    },
    mongodb::Id,
};
use crate::service::ResultsAggregator;

pub fn routes() -> Vec<Route> {
    routes![result_summary, result_detail, election_progress]
}

#[get("/elections/<election_id>/results/summary")]
async fn result_summary(
    _token: AuthToken<Member>,
    election_id: Id,
    results: &State<ResultsAggregator>,
) -> Result<Json<ResultSummary>> {
    Ok(Json(results.summary(election_id).await?))
}

#[get("/elections/<election_id>/results/detail")]
async fn result_detail(
    _token: AuthToken<Overseer>,
    election_id: Id,
    results: &State<ResultsAggregator>,
) -> Result<Json<ResultDetail>> {
    Ok(Json(results.detail(election_id).await?))
}

/// Participation so far. Unlike the results, available in any status.
#[get("/elections/<election_id>/progress")]
async fn election_progress(
    _token: AuthToken<Overseer>,
    election_id: Id,
    results: &State<ResultsAggregator>,
) -> Result<Json<ElectionProgress>> {
    Ok(Json(results.progress(election_id).await?))
}
