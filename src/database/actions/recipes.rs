//! Recipe reads and the nested write path.
//!
//! A recipe payload may carry `tags: [{name}]` and
//! `ingredients: [{ingredient: {name}, amount, amount_type}]`. Every nested
//! name is resolved to a row owned by the acting user (created on first use),
//! so a recipe only ever links to its owner's tags and ingredients.
//!
//! On update a present `tags` or `ingredients` key replaces the whole set,
//! even when empty, and an absent key leaves it alone. The payload is fully
//! validated before the transaction starts and every write of one request
//! commits or rolls back together.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde_json::Value;

use super::{image_filepath, labels::get_or_create_label, required};
use crate::{
    constants::{
        AMOUNT_FIELD, AMOUNT_TYPE_FIELD, DESCRIPTION_FIELD, IMAGE_FIELD, LABEL_NAME_FIELD,
        LINK_FIELD, PRICE_FIELD, TITLE_FIELD,
    },
    error::ApiError,
    form::{parse_id_list, Form},
    jwt::SessionData,
    schema::{Id, LabelKind, NewRecipe, Recipe, RecipeData, RecipeFilter},
    store::{Store, StoreTx},
};

#[derive(Debug, Clone, PartialEq)]
pub struct LineItemInput {
    pub ingredient: String,
    pub amount: Decimal,
    pub amount_type: String,
}

/// A validated recipe payload. `None` means the key was absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub time_minutes: Option<i32>,
    pub price: Option<Decimal>,
    pub link: Option<String>,
    pub image: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub ingredients: Option<Vec<LineItemInput>>,
}

impl RecipeInput {
    /// `partial` skips the required-field checks (PATCH). Any `user` key is
    /// ignored, a recipe's owner never changes through the payload.
    pub fn parse(data: Value, partial: bool) -> Result<Self, ApiError> {
        let mut form = Form::from_data(data, partial)?;

        let mut input = RecipeInput {
            title: form.string("title", TITLE_FIELD),
            description: form.string("description", DESCRIPTION_FIELD),
            time_minutes: form.integer("time_minutes", true),
            price: form.decimal("price", PRICE_FIELD, true),
            link: form.string("link", LINK_FIELD),
            image: form.nullable_string("image", IMAGE_FIELD),
            ..Default::default()
        };

        if let Some(items) = form.list("tags") {
            let mut tags = Vec::with_capacity(items.len());
            for (index, item) in items.into_iter().enumerate() {
                let Some(mut entry) = form.element("tags", index, item) else {
                    continue;
                };
                if let Some(name) = entry.string("name", LABEL_NAME_FIELD) {
                    tags.push(name);
                }
                form.absorb(entry);
            }
            input.tags = Some(tags);
        }

        if let Some(items) = form.list("ingredients") {
            let mut parts = Vec::with_capacity(items.len());
            for (index, item) in items.into_iter().enumerate() {
                let Some(mut entry) = form.element("ingredients", index, item) else {
                    continue;
                };
                let name = entry.object("ingredient", true).and_then(|mut ingredient| {
                    let name = ingredient.string("name", LABEL_NAME_FIELD);
                    entry.absorb(ingredient);
                    name
                });
                let amount = entry.decimal("amount", AMOUNT_FIELD, true);
                let amount_type = entry.string("amount_type", AMOUNT_TYPE_FIELD);

                if let (Some(ingredient), Some(amount), Some(amount_type)) =
                    (name, amount, amount_type)
                {
                    parts.push(LineItemInput {
                        ingredient,
                        amount,
                        amount_type,
                    });
                }
                form.absorb(entry);
            }
            input.ingredients = Some(parts);
        }

        form.finish()?;
        Ok(input)
    }
}

impl RecipeFilter {
    /// Reads `tags=1,2` and `ingredients=3,4` from a query string. Empty
    /// values do not filter.
    pub fn from_query(query: &HashMap<String, String>) -> Result<Self, ApiError> {
        let ids = |key: &str| -> Result<Option<Vec<Id>>, ApiError> {
            match query.get(key) {
                None => Ok(None),
                Some(text) => {
                    let ids = parse_id_list(text).map_err(|e| ApiError::invalid(key, &e))?;
                    Ok(if ids.is_empty() { None } else { Some(ids) })
                }
            }
        };

        Ok(Self {
            tags: ids("tags")?,
            ingredients: ids("ingredients")?,
        })
    }
}

fn stored_image(image: Option<String>) -> Option<String> {
    image
        .filter(|filename| !filename.is_empty())
        .map(|filename| image_filepath("recipe", &filename))
}

async fn write_tags(
    user_id: Id,
    recipe_id: Id,
    names: &[String],
    tx: &mut dyn StoreTx,
) -> Result<(), ApiError> {
    for name in names {
        let tag = get_or_create_label(LabelKind::Tag, user_id, name, tx).await?;
        tx.attach_tag(recipe_id, tag.id).await?;
    }
    Ok(())
}

async fn write_line_items(
    user_id: Id,
    recipe_id: Id,
    items: &[LineItemInput],
    tx: &mut dyn StoreTx,
) -> Result<(), ApiError> {
    for item in items {
        let ingredient =
            get_or_create_label(LabelKind::Ingredient, user_id, &item.ingredient, tx).await?;
        tx.insert_recipe_ingredient(recipe_id, ingredient.id, item.amount, &item.amount_type)
            .await?;
    }
    Ok(())
}

async fn load(recipe: Recipe, tx: &mut dyn StoreTx) -> Result<RecipeData, ApiError> {
    let tags = tx.list_recipe_tags(recipe.id).await?;
    let parts = tx.list_recipe_parts(recipe.id).await?;

    Ok(RecipeData::from_parts(recipe, tags, parts))
}

pub async fn list_recipes(
    session: &SessionData,
    filter: &RecipeFilter,
    store: &dyn Store,
) -> Result<Vec<RecipeData>, ApiError> {
    let mut tx = store.begin().await?;
    let recipes = tx.list_recipes(session.user_id, filter).await?;

    let mut rows = Vec::with_capacity(recipes.len());
    for recipe in recipes {
        rows.push(load(recipe, &mut *tx).await?);
    }
    tx.commit().await?;

    Ok(rows)
}

pub async fn get_recipe(
    session: &SessionData,
    id: Id,
    store: &dyn Store,
) -> Result<RecipeData, ApiError> {
    let mut tx = store.begin().await?;
    let recipe = tx
        .get_recipe(session.user_id, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    let data = load(recipe, &mut *tx).await?;
    tx.commit().await?;

    Ok(data)
}

pub async fn create_recipe(
    session: &SessionData,
    input: RecipeInput,
    store: &dyn Store,
) -> Result<RecipeData, ApiError> {
    let new_recipe = NewRecipe {
        user_id: session.user_id,
        title: required(input.title, "title")?,
        description: input.description.unwrap_or_default(),
        time_minutes: required(input.time_minutes, "time_minutes")?,
        price: required(input.price, "price")?,
        link: input.link.unwrap_or_default(),
        image: stored_image(input.image.flatten()),
    };

    let mut tx = store.begin().await?;
    let recipe = tx.insert_recipe(&new_recipe).await?;
    write_tags(
        session.user_id,
        recipe.id,
        &input.tags.unwrap_or_default(),
        &mut *tx,
    )
    .await?;
    write_line_items(
        session.user_id,
        recipe.id,
        &input.ingredients.unwrap_or_default(),
        &mut *tx,
    )
    .await?;
    let data = load(recipe, &mut *tx).await?;
    tx.commit().await?;

    log::debug!("User {} created recipe {}", session.user_id, data.id);
    Ok(data)
}

/// Applies the keys present in `input` to one of the caller's recipes.
pub async fn update_recipe(
    session: &SessionData,
    id: Id,
    input: RecipeInput,
    store: &dyn Store,
) -> Result<RecipeData, ApiError> {
    let mut tx = store.begin().await?;
    let mut recipe = tx
        .get_recipe(session.user_id, id)
        .await?
        .ok_or(ApiError::NotFound)?;

    if let Some(title) = input.title {
        recipe.title = title;
    }
    if let Some(description) = input.description {
        recipe.description = description;
    }
    if let Some(time_minutes) = input.time_minutes {
        recipe.time_minutes = time_minutes;
    }
    if let Some(price) = input.price {
        recipe.price = price;
    }
    if let Some(link) = input.link {
        recipe.link = link;
    }
    if let Some(image) = input.image {
        recipe.image = stored_image(image);
    }
    tx.update_recipe(&recipe).await?;

    if let Some(tags) = input.tags {
        tx.clear_tags(recipe.id).await?;
        write_tags(session.user_id, recipe.id, &tags, &mut *tx).await?;
    }
    if let Some(items) = input.ingredients {
        tx.clear_recipe_ingredients(recipe.id).await?;
        write_line_items(session.user_id, recipe.id, &items, &mut *tx).await?;
    }

    let data = load(recipe, &mut *tx).await?;
    tx.commit().await?;

    Ok(data)
}

pub async fn delete_recipe(
    session: &SessionData,
    id: Id,
    store: &dyn Store,
) -> Result<(), ApiError> {
    let mut tx = store.begin().await?;
    if !tx.delete_recipe(session.user_id, id).await? {
        return Err(ApiError::NotFound);
    }
    tx.commit().await?;

    Ok(())
}
