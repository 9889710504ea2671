use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type Id = i64;

#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct User {
    pub id: Id,
    pub email: String,
    pub name: String,
    pub password: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub date_joined: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserRole {
    User,
    Superuser,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct Profile {
    pub id: Id,
    pub user_id: Id,
    pub bio: String,
    pub short_desc: String,
    pub image: Option<String>,
}

/// Tags and ingredients share one shape: a name owned by a user.
#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub id: Id,
    pub user_id: Id,
    pub name: String,
}

pub type Tag = Label;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LabelKind {
    Tag,
    Ingredient,
}

impl LabelKind {
    pub fn table(&self) -> &'static str {
        match self {
            LabelKind::Tag => "tags",
            LabelKind::Ingredient => "ingredients",
        }
    }

    /// Join table linking recipes to this kind, and its foreign key column.
    pub fn link(&self) -> (&'static str, &'static str) {
        match self {
            LabelKind::Tag => ("recipe_tags", "tag_id"),
            LabelKind::Ingredient => ("recipe_ingredients", "ingredient_id"),
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            LabelKind::Tag => "tag",
            LabelKind::Ingredient => "ingredient",
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct Recipe {
    pub id: Id,
    pub user_id: Id,
    pub title: String,
    pub description: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub user_id: Id,
    pub title: String,
    pub description: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    pub image: Option<String>,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct RecipeIngredient {
    pub id: Id,
    pub recipe_id: Id,
    pub ingredient_id: Id,
    pub amount: Decimal,
    pub amount_type: String,
}

/// A recipe line item joined with its ingredient name.
#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct RecipePart {
    pub id: Id,
    pub recipe_id: Id,
    pub ingredient_id: Id,
    pub ingredient_name: String,
    pub amount: Decimal,
    pub amount_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub tags: Option<Vec<Id>>,
    pub ingredients: Option<Vec<Id>>,
}

// Representations returned by the API

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserData {
    pub email: String,
    pub name: String,
}

impl From<&User> for UserData {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.to_owned(),
            name: user.name.to_owned(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProfileData {
    pub bio: String,
    pub image: Option<String>,
    pub short_desc: String,
}

impl From<Profile> for ProfileData {
    fn from(profile: Profile) -> Self {
        Self {
            bio: profile.bio,
            image: profile.image,
            short_desc: profile.short_desc,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LabelData {
    pub id: Id,
    pub name: String,
}

impl From<Label> for LabelData {
    fn from(label: Label) -> Self {
        Self {
            id: label.id,
            name: label.name,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RecipePartData {
    pub id: Id,
    pub ingredient: LabelData,
    pub amount: Decimal,
    pub amount_type: String,
}

impl From<RecipePart> for RecipePartData {
    fn from(part: RecipePart) -> Self {
        Self {
            id: part.id,
            ingredient: LabelData {
                id: part.ingredient_id,
                name: part.ingredient_name,
            },
            amount: part.amount,
            amount_type: part.amount_type,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RecipeData {
    pub id: Id,
    pub title: String,
    pub description: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    pub image: Option<String>,
    pub tags: Vec<LabelData>,
    pub ingredients: Vec<RecipePartData>,
}

impl RecipeData {
    pub fn from_parts(recipe: Recipe, tags: Vec<Tag>, parts: Vec<RecipePart>) -> Self {
        Self {
            id: recipe.id,
            title: recipe.title,
            description: recipe.description,
            time_minutes: recipe.time_minutes,
            price: recipe.price,
            link: recipe.link,
            image: recipe.image,
            tags: tags.into_iter().map(LabelData::from).collect(),
            ingredients: parts.into_iter().map(RecipePartData::from).collect(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub access: String,
}
