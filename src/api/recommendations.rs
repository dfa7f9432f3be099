use rocket::{serde::json::Json, Route, State};

use crate::error::Result;
use crate::model::{
    api::{
        auth::{AuthToken, Member, Overseer},
        recommendation::{RecommendationReceipt, RecommendationSpec, RecommendationStats},
    },
    mongodb::Id,
};
use crate::service::RecommendationEngine;

pub fn routes() -> Vec<Route> {
    routes![recommend, recommendation_stats]
}

#[post("/elections/<election_id>/recommendations", data = "<spec>", format = "json")]
async fn recommend(
    token: AuthToken<Member>,
    election_id: Id,
    spec: Json<RecommendationSpec>,
    engine: &State<RecommendationEngine>,
) -> Result<Json<RecommendationReceipt>> {
    let recommendation = engine.recommend(election_id, token.id, &spec).await?;
    Ok(Json(recommendation.into()))
}

#[get("/elections/<election_id>/recommendations/stats")]
async fn recommendation_stats(
    _token: AuthToken<Overseer>,
    election_id: Id,
    engine: &State<RecommendationEngine>,
) -> Result<Json<RecommendationStats>> {
    Ok(Json(engine.stats(election_id).await?))
}
