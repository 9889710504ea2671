use std::collections::HashMap;

use serde_json::Value;
use warp::{
    filters::BoxedFilter, http::StatusCode, reject, reply::Response, Filter, Rejection,
};

use super::{
    json_body, partial_update,
    rejection::{json_reply, no_content},
};
use crate::{
    actions::recipes::{self, RecipeInput},
    jwt::SessionData,
    middleware::{with_context, with_session},
    schema::{Id, RecipeFilter},
    state::AppContext,
};

async fn list(
    query: HashMap<String, String>,
    session: SessionData,
    ctx: AppContext,
) -> Result<Response, Rejection> {
    let filter = RecipeFilter::from_query(&query).map_err(reject::custom)?;
    let rows = recipes::list_recipes(&session, &filter, &*ctx.store)
        .await
        .map_err(reject::custom)?;

    Ok(json_reply(&rows, StatusCode::OK))
}

async fn create(session: SessionData, data: Value, ctx: AppContext) -> Result<Response, Rejection> {
    let input = RecipeInput::parse(data, false).map_err(reject::custom)?;
    let recipe = recipes::create_recipe(&session, input, &*ctx.store)
        .await
        .map_err(reject::custom)?;

    Ok(json_reply(&recipe, StatusCode::CREATED))
}

async fn retrieve(id: Id, session: SessionData, ctx: AppContext) -> Result<Response, Rejection> {
    let recipe = recipes::get_recipe(&session, id, &*ctx.store)
        .await
        .map_err(reject::custom)?;

    Ok(json_reply(&recipe, StatusCode::OK))
}

async fn update(
    id: Id,
    partial: bool,
    session: SessionData,
    data: Value,
    ctx: AppContext,
) -> Result<Response, Rejection> {
    let input = RecipeInput::parse(data, partial).map_err(reject::custom)?;
    let recipe = recipes::update_recipe(&session, id, input, &*ctx.store)
        .await
        .map_err(reject::custom)?;

    Ok(json_reply(&recipe, StatusCode::OK))
}

async fn destroy(id: Id, session: SessionData, ctx: AppContext) -> Result<Response, Rejection> {
    recipes::delete_recipe(&session, id, &*ctx.store)
        .await
        .map_err(reject::custom)?;

    Ok(no_content())
}

pub fn routes(ctx: AppContext) -> BoxedFilter<(Response,)> {
    let list = warp::path!("recipes" / "recipes")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx.clone()))
        .and_then(list);

    let create = warp::path!("recipes" / "recipes")
        .and(warp::post())
        .and(with_session(ctx.clone()))
        .and(json_body())
        .and(with_context(ctx.clone()))
        .and_then(create);

    let retrieve = warp::path!("recipes" / "recipes" / Id)
        .and(warp::get())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx.clone()))
        .and_then(retrieve);

    let update = warp::path!("recipes" / "recipes" / Id)
        .and(partial_update())
        .and(with_session(ctx.clone()))
        .and(json_body())
        .and(with_context(ctx.clone()))
        .and_then(update);

    let destroy = warp::path!("recipes" / "recipes" / Id)
        .and(warp::delete())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx))
        .and_then(destroy);

    list.or(create)
        .unify()
        .or(retrieve)
        .unify()
        .or(update)
        .unify()
        .or(destroy)
        .unify()
        .boxed()
}
