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
    actions::labels,
    error::ApiError,
    jwt::SessionData,
    middleware::{with_context, with_session},
    schema::{Id, LabelData, LabelKind},
    state::AppContext,
};

/// `assigned_only=1` keeps labels used by at least one recipe.
fn assigned_only(query: &HashMap<String, String>) -> Result<bool, ApiError> {
    match query.get("assigned_only").map(|v| v.trim()) {
        None | Some("") => Ok(false),
        Some(value) => value
            .parse::<i64>()
            .map(|v| v != 0)
            .map_err(|_| ApiError::invalid("assigned_only", "A valid integer is required.")),
    }
}

async fn list(
    kind: LabelKind,
    query: HashMap<String, String>,
    session: SessionData,
    ctx: AppContext,
) -> Result<Response, Rejection> {
    let assigned_only = assigned_only(&query).map_err(reject::custom)?;
    let rows: Vec<LabelData> = labels::list_labels(kind, &session, assigned_only, &*ctx.store)
        .await
        .map_err(reject::custom)?
        .into_iter()
        .map(LabelData::from)
        .collect();

    Ok(json_reply(&rows, StatusCode::OK))
}

async fn create(
    kind: LabelKind,
    session: SessionData,
    data: Value,
    ctx: AppContext,
) -> Result<Response, Rejection> {
    let label = labels::create_label(kind, &session, data, &*ctx.store)
        .await
        .map_err(reject::custom)?;

    Ok(json_reply(&LabelData::from(label), StatusCode::CREATED))
}

async fn retrieve(
    kind: LabelKind,
    id: Id,
    session: SessionData,
    ctx: AppContext,
) -> Result<Response, Rejection> {
    let label = labels::get_label(kind, &session, id, &*ctx.store)
        .await
        .map_err(reject::custom)?;

    Ok(json_reply(&LabelData::from(label), StatusCode::OK))
}

async fn update(
    kind: LabelKind,
    id: Id,
    partial: bool,
    session: SessionData,
    data: Value,
    ctx: AppContext,
) -> Result<Response, Rejection> {
    let label = labels::update_label(kind, &session, id, data, partial, &*ctx.store)
        .await
        .map_err(reject::custom)?;

    Ok(json_reply(&LabelData::from(label), StatusCode::OK))
}

async fn destroy(
    kind: LabelKind,
    id: Id,
    session: SessionData,
    ctx: AppContext,
) -> Result<Response, Rejection> {
    labels::delete_label(kind, &session, id, &*ctx.store)
        .await
        .map_err(reject::custom)?;

    Ok(no_content())
}

/// CRUD routes for one kind under `/recipes/<segment>/`.
fn kind_routes(kind: LabelKind, segment: &'static str, ctx: AppContext) -> BoxedFilter<(Response,)> {
    let collection = warp::path("recipes")
        .and(warp::path(segment))
        .and(warp::path::end())
        .map(move || kind);
    let item = warp::path("recipes")
        .and(warp::path(segment))
        .and(warp::path::param::<Id>())
        .and(warp::path::end())
        .map(move |id: Id| (kind, id))
        .untuple_one();

    let list = collection
        .clone()
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx.clone()))
        .and_then(list);

    let create = collection
        .and(warp::post())
        .and(with_session(ctx.clone()))
        .and(json_body())
        .and(with_context(ctx.clone()))
        .and_then(create);

    let retrieve = item
        .clone()
        .and(warp::get())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx.clone()))
        .and_then(retrieve);

    let update = item
        .clone()
        .and(partial_update())
        .and(with_session(ctx.clone()))
        .and(json_body())
        .and(with_context(ctx.clone()))
        .and_then(update);

    let destroy = item
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

pub fn routes(ctx: AppContext) -> BoxedFilter<(Response,)> {
    kind_routes(LabelKind::Tag, "tags", ctx.clone())
        .or(kind_routes(LabelKind::Ingredient, "ingredients", ctx))
        .unify()
        .boxed()
}
