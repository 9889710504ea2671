pub mod labels;
pub mod recipes;
pub mod rejection;
pub mod users;

use std::convert::Infallible;

use serde_json::{json, Value};
use warp::{filters::BoxedFilter, http::StatusCode, reply::Response, Filter, Reply};

use crate::state::AppContext;
use rejection::{handle_rejection, json_reply};

const MAX_BODY_BYTES: u64 = 1024 * 64;

pub(crate) fn json_body() -> BoxedFilter<(Value,)> {
    warp::body::content_length_limit(MAX_BODY_BYTES)
        .and(warp::body::json())
        .boxed()
}

/// PATCH updates only the keys sent, PUT replaces the resource.
pub(crate) fn partial_update() -> BoxedFilter<(bool,)> {
    warp::patch()
        .map(|| true)
        .or(warp::put().map(|| false))
        .unify()
        .boxed()
}

fn health() -> BoxedFilter<(Response,)> {
    warp::path!("health")
        .and(warp::get())
        .map(|| json_reply(&json!({ "status": "ok" }), StatusCode::OK))
        .boxed()
}

/// The whole HTTP surface, with errors rendered as JSON and every request
/// logged.
pub fn routes(
    ctx: AppContext,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    health()
        .or(users::routes(ctx.clone()))
        .unify()
        .or(recipes::routes(ctx.clone()))
        .unify()
        .or(labels::routes(ctx))
        .unify()
        .recover(handle_rejection)
        .unify()
        .with(warp::log::custom(|info| {
            log::info!(
                "{} {} {} {:?}",
                info.method(),
                info.path(),
                info.status().as_u16(),
                info.elapsed()
            );
        }))
}
