use std::convert::Infallible;

use warp::{reject::Rejection, Filter};

use super::jwt::{SessionData, TokenType};
use crate::{error::ApiError, state::AppContext};

pub fn with_context(
    ctx: AppContext,
) -> impl Filter<Extract = (AppContext,), Error = Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}

/// Resolves the caller from an `Authorization: Bearer <access token>` header.
pub fn with_session(
    ctx: AppContext,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_context(ctx))
        .and_then(|header: Option<String>, ctx: AppContext| async move {
            authenticate(header.as_deref(), &ctx)
                .await
                .map_err(warp::reject::custom)
        })
}

fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();

    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

pub async fn authenticate(header: Option<&str>, ctx: &AppContext) -> Result<SessionData, ApiError> {
    let header = header.ok_or_else(|| {
        ApiError::unauthorized("Authentication credentials were not provided.")
    })?;
    let token = bearer_token(header)
        .ok_or_else(|| ApiError::unauthorized("Given token not valid for any token type"))?;

    let claims = ctx.tokens.verify(token, TokenType::Access)?;

    let mut tx = ctx.store.begin().await?;
    let user = tx.get_user(claims.user_id).await?;
    tx.commit().await?;

    match user {
        Some(user) if user.is_active => Ok(SessionData::from(&user)),
        Some(_) => Err(ApiError::unauthorized("User is inactive")),
        None => Err(ApiError::unauthorized("User not found")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_scheme_is_required() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer   abc"), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("abc"), None);
    }
}
