use serde_json::Value;

use super::image_filepath;
use crate::{
    constants::{BIO_FIELD, IMAGE_FIELD, SHORT_DESC_FIELD},
    error::ApiError,
    form::Form,
    jwt::SessionData,
    permissions::ActionType,
    schema::{Id, Profile},
    store::Store,
};

pub async fn get_profile(
    session: &SessionData,
    id: Id,
    store: &dyn Store,
) -> Result<Profile, ApiError> {
    session.authorize(ActionType::ViewProfiles)?;

    let mut tx = store.begin().await?;
    let profile = tx.get_profile(id).await?;
    tx.commit().await?;

    profile.ok_or(ApiError::NotFound)
}

/// Updates bio, short description and image of a profile the caller owns.
/// An image is given as the uploaded file name and stored under a fresh path.
pub async fn update_profile(
    session: &SessionData,
    id: Id,
    data: Value,
    partial: bool,
    store: &dyn Store,
) -> Result<Profile, ApiError> {
    let mut form = Form::from_data(data, partial)?;
    let bio = form.string("bio", BIO_FIELD);
    let short_desc = form.string("short_desc", SHORT_DESC_FIELD);
    let image = form.nullable_string("image", IMAGE_FIELD);
    form.finish()?;

    let mut tx = store.begin().await?;
    let mut profile = tx.get_profile(id).await?.ok_or(ApiError::NotFound)?;
    session.authorize(ActionType::EditProfile {
        owner_id: profile.user_id,
    })?;

    if let Some(bio) = bio {
        profile.bio = bio;
    }
    if let Some(short_desc) = short_desc {
        profile.short_desc = short_desc;
    }
    match image {
        Some(Some(filename)) if !filename.is_empty() => {
            profile.image = Some(image_filepath("profile", &filename))
        }
        Some(_) => profile.image = None,
        None => {}
    }

    tx.update_profile(&profile).await?;
    tx.commit().await?;

    Ok(profile)
}
