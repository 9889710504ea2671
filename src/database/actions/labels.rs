use serde_json::Value;

use crate::{
    constants::LABEL_NAME_FIELD,
    error::{ApiError, StoreError},
    form::Form,
    jwt::SessionData,
    schema::{Id, Label, LabelKind},
    store::{Store, StoreTx},
};

/// Returns the caller's tag or ingredient called `name`, creating it if
/// needed. Losing an insert race to a concurrent request is not an error:
/// the row the other request created is read back and used.
pub async fn get_or_create_label(
    kind: LabelKind,
    user_id: Id,
    name: &str,
    tx: &mut dyn StoreTx,
) -> Result<Label, ApiError> {
    if let Some(label) = tx.find_label_by_name(kind, user_id, name).await? {
        return Ok(label);
    }
    if let Some(label) = tx.insert_label(kind, user_id, name).await? {
        return Ok(label);
    }

    log::debug!(
        "Lost insert race for {} {name:?} of user {user_id}, reading the winner",
        kind.display_name()
    );
    tx.find_label_by_name(kind, user_id, name)
        .await?
        .ok_or_else(|| {
            ApiError::Internal(format!(
                "{} {name:?} vanished after a conflicting insert",
                kind.display_name()
            ))
        })
}

fn parse_name(data: Value, partial: bool) -> Result<Option<String>, ApiError> {
    let mut form = Form::from_data(data, partial)?;
    let name = form.string("name", LABEL_NAME_FIELD);
    form.finish()?;

    Ok(name)
}

/// Ordered by name, descending.
pub async fn list_labels(
    kind: LabelKind,
    session: &SessionData,
    assigned_only: bool,
    store: &dyn Store,
) -> Result<Vec<Label>, ApiError> {
    let mut tx = store.begin().await?;
    let labels = tx.list_labels(kind, session.user_id, assigned_only).await?;
    tx.commit().await?;

    Ok(labels)
}

pub async fn create_label(
    kind: LabelKind,
    session: &SessionData,
    data: Value,
    store: &dyn Store,
) -> Result<Label, ApiError> {
    let name = crate::actions::required(parse_name(data, false)?, "name")?;

    let mut tx = store.begin().await?;
    let label = get_or_create_label(kind, session.user_id, &name, &mut *tx).await?;
    tx.commit().await?;

    Ok(label)
}

pub async fn get_label(
    kind: LabelKind,
    session: &SessionData,
    id: Id,
    store: &dyn Store,
) -> Result<Label, ApiError> {
    let mut tx = store.begin().await?;
    let label = tx.get_label(kind, session.user_id, id).await?;
    tx.commit().await?;

    label.ok_or(ApiError::NotFound)
}

pub async fn update_label(
    kind: LabelKind,
    session: &SessionData,
    id: Id,
    data: Value,
    partial: bool,
    store: &dyn Store,
) -> Result<Label, ApiError> {
    let name = parse_name(data, partial)?;

    let mut tx = store.begin().await?;
    let mut label = tx
        .get_label(kind, session.user_id, id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let Some(name) = name else {
        return Ok(label);
    };

    let taken = format!("{} with this name already exists.", kind.display_name());
    if let Some(other) = tx.find_label_by_name(kind, session.user_id, &name).await? {
        if other.id != label.id {
            return Err(ApiError::invalid("name", &taken));
        }
    }

    label.name = name;
    tx.rename_label(kind, &label).await.map_err(|e| match e {
        StoreError::UniqueViolation(_) => ApiError::invalid("name", &taken),
        e => e.into(),
    })?;
    tx.commit().await?;

    Ok(label)
}

pub async fn delete_label(
    kind: LabelKind,
    session: &SessionData,
    id: Id,
    store: &dyn Store,
) -> Result<(), ApiError> {
    let mut tx = store.begin().await?;
    if !tx.delete_label(kind, session.user_id, id).await? {
        return Err(ApiError::NotFound);
    }
    tx.commit().await?;

    Ok(())
}
