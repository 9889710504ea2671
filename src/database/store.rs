use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::{
    error::StoreError,
    schema::{
        Id, Label, LabelKind, NewRecipe, NewUser, Profile, Recipe, RecipeFilter, RecipeIngredient,
        RecipePart, Tag, User,
    },
};

/// Entry point to a storage backend. Every unit of work runs inside a
/// transaction obtained from [`Store::begin`].
#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;
}

/// One all-or-nothing unit of work. Dropping a transaction without calling
/// [`StoreTx::commit`] discards every write made through it.
#[async_trait]
pub trait StoreTx: Send {
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    // Users

    /// Fails with [`StoreError::UniqueViolation`] when the email is taken.
    async fn insert_user(&mut self, user: &NewUser) -> Result<User, StoreError>;
    async fn get_user(&mut self, id: Id) -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError>;
    async fn update_user(&mut self, user: &User) -> Result<(), StoreError>;
    async fn count_logins_since(&mut self, since: DateTime<Utc>) -> Result<i64, StoreError>;
    async fn list_superuser_emails(&mut self) -> Result<Vec<String>, StoreError>;

    // Profiles

    async fn insert_profile(&mut self, user_id: Id) -> Result<Profile, StoreError>;
    async fn get_profile(&mut self, id: Id) -> Result<Option<Profile>, StoreError>;
    async fn update_profile(&mut self, profile: &Profile) -> Result<(), StoreError>;

    // Tags and ingredients

    /// Returns `None` when `(user_id, name)` already exists.
    async fn insert_label(
        &mut self,
        kind: LabelKind,
        user_id: Id,
        name: &str,
    ) -> Result<Option<Label>, StoreError>;
    async fn find_label_by_name(
        &mut self,
        kind: LabelKind,
        user_id: Id,
        name: &str,
    ) -> Result<Option<Label>, StoreError>;
    async fn get_label(
        &mut self,
        kind: LabelKind,
        user_id: Id,
        id: Id,
    ) -> Result<Option<Label>, StoreError>;
    async fn list_labels(
        &mut self,
        kind: LabelKind,
        user_id: Id,
        assigned_only: bool,
    ) -> Result<Vec<Label>, StoreError>;
    async fn rename_label(&mut self, kind: LabelKind, label: &Label) -> Result<(), StoreError>;
    async fn delete_label(&mut self, kind: LabelKind, user_id: Id, id: Id)
        -> Result<bool, StoreError>;

    // Recipes

    async fn insert_recipe(&mut self, recipe: &NewRecipe) -> Result<Recipe, StoreError>;
    async fn get_recipe(&mut self, user_id: Id, id: Id) -> Result<Option<Recipe>, StoreError>;
    async fn list_recipes(
        &mut self,
        user_id: Id,
        filter: &RecipeFilter,
    ) -> Result<Vec<Recipe>, StoreError>;
    async fn update_recipe(&mut self, recipe: &Recipe) -> Result<(), StoreError>;
    async fn delete_recipe(&mut self, user_id: Id, id: Id) -> Result<bool, StoreError>;

    async fn attach_tag(&mut self, recipe_id: Id, tag_id: Id) -> Result<(), StoreError>;
    async fn clear_tags(&mut self, recipe_id: Id) -> Result<(), StoreError>;
    async fn list_recipe_tags(&mut self, recipe_id: Id) -> Result<Vec<Tag>, StoreError>;

    async fn insert_recipe_ingredient(
        &mut self,
        recipe_id: Id,
        ingredient_id: Id,
        amount: Decimal,
        amount_type: &str,
    ) -> Result<RecipeIngredient, StoreError>;
    async fn clear_recipe_ingredients(&mut self, recipe_id: Id) -> Result<(), StoreError>;
    async fn list_recipe_parts(&mut self, recipe_id: Id) -> Result<Vec<RecipePart>, StoreError>;
}
