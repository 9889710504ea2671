use serde_json::Value;
use warp::{
    filters::BoxedFilter, http::StatusCode, reject, reply::Response, Filter, Rejection,
};

use super::{json_body, partial_update, rejection::json_reply};
use crate::{
    actions::{profiles, users},
    jwt::SessionData,
    middleware::{with_context, with_session},
    queue::{jobs::Job, queue::JobQueue},
    schema::{Id, ProfileData, UserData},
    state::AppContext,
};

async fn signup(data: Value, ctx: AppContext) -> Result<Response, Rejection> {
    let user = users::register_user(data, &*ctx.store)
        .await
        .map_err(reject::custom)?;

    enqueue_welcome(&*ctx.queue, &user.email).await;
    Ok(json_reply(&UserData::from(&user), StatusCode::CREATED))
}

/// Queues the welcome mail. The account already exists at this point, so a
/// queue failure is logged and the signup still succeeds.
async fn enqueue_welcome(queue: &dyn JobQueue, email: &str) {
    let job = Job::welcome(email);
    match queue.push(&job).await {
        Ok(()) => log::debug!("Queued welcome mail {} for {email}", job.id),
        Err(e) => log::error!("Could not queue welcome mail for {email}: {e}"),
    }
}

async fn token(data: Value, ctx: AppContext) -> Result<Response, Rejection> {
    let pair = users::login_user(data, &ctx.tokens, &*ctx.store)
        .await
        .map_err(reject::custom)?;

    Ok(json_reply(&pair, StatusCode::OK))
}

async fn token_refresh(data: Value, ctx: AppContext) -> Result<Response, Rejection> {
    let access = users::refresh_token(data, &ctx.tokens, &*ctx.store)
        .await
        .map_err(reject::custom)?;

    Ok(json_reply(&access, StatusCode::OK))
}

async fn me(session: SessionData, ctx: AppContext) -> Result<Response, Rejection> {
    let user = users::get_me(&session, &*ctx.store)
        .await
        .map_err(reject::custom)?;

    Ok(json_reply(&UserData::from(&user), StatusCode::OK))
}

async fn update_me(
    partial: bool,
    session: SessionData,
    data: Value,
    ctx: AppContext,
) -> Result<Response, Rejection> {
    let user = users::update_me(&session, data, partial, &*ctx.store)
        .await
        .map_err(reject::custom)?;

    Ok(json_reply(&UserData::from(&user), StatusCode::OK))
}

async fn profile(id: Id, session: SessionData, ctx: AppContext) -> Result<Response, Rejection> {
    let profile = profiles::get_profile(&session, id, &*ctx.store)
        .await
        .map_err(reject::custom)?;

    Ok(json_reply(&ProfileData::from(profile), StatusCode::OK))
}

async fn update_profile(
    id: Id,
    partial: bool,
    session: SessionData,
    data: Value,
    ctx: AppContext,
) -> Result<Response, Rejection> {
    let profile = profiles::update_profile(&session, id, data, partial, &*ctx.store)
        .await
        .map_err(reject::custom)?;

    Ok(json_reply(&ProfileData::from(profile), StatusCode::OK))
}

pub fn routes(ctx: AppContext) -> BoxedFilter<(Response,)> {
    let signup = warp::path!("users")
        .and(warp::post())
        .and(json_body())
        .and(with_context(ctx.clone()))
        .and_then(signup);

    let token = warp::path!("users" / "token")
        .and(warp::post())
        .and(json_body())
        .and(with_context(ctx.clone()))
        .and_then(token);

    let token_refresh = warp::path!("users" / "token" / "refresh")
        .and(warp::post())
        .and(json_body())
        .and(with_context(ctx.clone()))
        .and_then(token_refresh);

    let me_get = warp::path!("users" / "me")
        .and(warp::get())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx.clone()))
        .and_then(me);

    let me_update = warp::path!("users" / "me")
        .and(partial_update())
        .and(with_session(ctx.clone()))
        .and(json_body())
        .and(with_context(ctx.clone()))
        .and_then(update_me);

    let profile_get = warp::path!("users" / "profile" / Id)
        .and(warp::get())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx.clone()))
        .and_then(profile);

    let profile_update = warp::path!("users" / "profile" / Id)
        .and(partial_update())
        .and(with_session(ctx.clone()))
        .and(json_body())
        .and(with_context(ctx))
        .and_then(update_profile);

    signup
        .or(token)
        .unify()
        .or(token_refresh)
        .unify()
        .or(me_get)
        .unify()
        .or(me_update)
        .unify()
        .or(profile_get)
        .unify()
        .or(profile_update)
        .unify()
        .boxed()
}
