//! Store wrapper for unit tests that injects the failures a single-process
//! `MemoryStore` cannot produce on its own.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::{
    error::{QueryError, StoreError},
    memory::MemoryStore,
    schema::{
        Id, Label, LabelKind, NewRecipe, NewUser, Profile, Recipe, RecipeFilter, RecipeIngredient,
        RecipePart, Tag, User,
    },
    store::{Store, StoreTx},
};

#[derive(Debug, Default)]
pub struct Faults {
    /// `insert_label` writes the row as a concurrent request would, then
    /// reports the conflict.
    pub lose_label_races: bool,
    /// `insert_recipe_ingredient` fails once this many line items are written.
    pub fail_line_item_after: Option<usize>,
    pub lost_races: AtomicUsize,
    pub(crate) line_items: AtomicUsize,
}

#[derive(Clone)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    pub faults: Arc<Faults>,
}

impl FaultyStore {
    pub fn new(inner: MemoryStore, faults: Faults) -> Self {
        Self {
            inner,
            faults: Arc::new(faults),
        }
    }
}

#[async_trait]
impl Store for FaultyStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        Ok(Box::new(FaultyTx {
            inner: self.inner.begin().await?,
            faults: self.faults.clone(),
        }))
    }
}

struct FaultyTx {
    inner: Box<dyn StoreTx>,
    faults: Arc<Faults>,
}

#[async_trait]
impl StoreTx for FaultyTx {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.commit().await
    }

    async fn insert_user(&mut self, user: &NewUser) -> Result<User, StoreError> {
        self.inner.insert_user(user).await
    }

    async fn get_user(&mut self, id: Id) -> Result<Option<User>, StoreError> {
        self.inner.get_user(id).await
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError> {
        self.inner.find_user_by_email(email).await
    }

    async fn update_user(&mut self, user: &User) -> Result<(), StoreError> {
        self.inner.update_user(user).await
    }

    async fn count_logins_since(&mut self, since: DateTime<Utc>) -> Result<i64, StoreError> {
        self.inner.count_logins_since(since).await
    }

    async fn list_superuser_emails(&mut self) -> Result<Vec<String>, StoreError> {
        self.inner.list_superuser_emails().await
    }

    async fn insert_profile(&mut self, user_id: Id) -> Result<Profile, StoreError> {
        self.inner.insert_profile(user_id).await
    }

    async fn get_profile(&mut self, id: Id) -> Result<Option<Profile>, StoreError> {
        self.inner.get_profile(id).await
    }

    async fn update_profile(&mut self, profile: &Profile) -> Result<(), StoreError> {
        self.inner.update_profile(profile).await
    }

    async fn insert_label(
        &mut self,
        kind: LabelKind,
        user_id: Id,
        name: &str,
    ) -> Result<Option<Label>, StoreError> {
        let inserted = self.inner.insert_label(kind, user_id, name).await?;
        if self.faults.lose_label_races {
            self.faults.lost_races.fetch_add(1, Ordering::SeqCst);
            return Ok(None);
        }
        Ok(inserted)
    }

    async fn find_label_by_name(
        &mut self,
        kind: LabelKind,
        user_id: Id,
        name: &str,
    ) -> Result<Option<Label>, StoreError> {
        self.inner.find_label_by_name(kind, user_id, name).await
    }

    async fn get_label(
        &mut self,
        kind: LabelKind,
        user_id: Id,
        id: Id,
    ) -> Result<Option<Label>, StoreError> {
        self.inner.get_label(kind, user_id, id).await
    }

    async fn list_labels(
        &mut self,
        kind: LabelKind,
        user_id: Id,
        assigned_only: bool,
    ) -> Result<Vec<Label>, StoreError> {
        self.inner.list_labels(kind, user_id, assigned_only).await
    }

    async fn rename_label(&mut self, kind: LabelKind, label: &Label) -> Result<(), StoreError> {
        self.inner.rename_label(kind, label).await
    }

    async fn delete_label(
        &mut self,
        kind: LabelKind,
        user_id: Id,
        id: Id,
    ) -> Result<bool, StoreError> {
        self.inner.delete_label(kind, user_id, id).await
    }

    async fn insert_recipe(&mut self, recipe: &NewRecipe) -> Result<Recipe, StoreError> {
        self.inner.insert_recipe(recipe).await
    }

    async fn get_recipe(&mut self, user_id: Id, id: Id) -> Result<Option<Recipe>, StoreError> {
        self.inner.get_recipe(user_id, id).await
    }

    async fn list_recipes(
        &mut self,
        user_id: Id,
        filter: &RecipeFilter,
    ) -> Result<Vec<Recipe>, StoreError> {
        self.inner.list_recipes(user_id, filter).await
    }

    async fn update_recipe(&mut self, recipe: &Recipe) -> Result<(), StoreError> {
        self.inner.update_recipe(recipe).await
    }

    async fn delete_recipe(&mut self, user_id: Id, id: Id) -> Result<bool, StoreError> {
        self.inner.delete_recipe(user_id, id).await
    }

    async fn attach_tag(&mut self, recipe_id: Id, tag_id: Id) -> Result<(), StoreError> {
        self.inner.attach_tag(recipe_id, tag_id).await
    }

    async fn clear_tags(&mut self, recipe_id: Id) -> Result<(), StoreError> {
        self.inner.clear_tags(recipe_id).await
    }

    async fn list_recipe_tags(&mut self, recipe_id: Id) -> Result<Vec<Tag>, StoreError> {
        self.inner.list_recipe_tags(recipe_id).await
    }

    async fn insert_recipe_ingredient(
        &mut self,
        recipe_id: Id,
        ingredient_id: Id,
        amount: Decimal,
        amount_type: &str,
    ) -> Result<RecipeIngredient, StoreError> {
        let written = self.faults.line_items.fetch_add(1, Ordering::SeqCst);
        if self.faults.fail_line_item_after == Some(written) {
            return Err(QueryError::new(String::from("connection reset")).into());
        }
        self.inner
            .insert_recipe_ingredient(recipe_id, ingredient_id, amount, amount_type)
            .await
    }

    async fn clear_recipe_ingredients(&mut self, recipe_id: Id) -> Result<(), StoreError> {
        self.inner.clear_recipe_ingredients(recipe_id).await
    }

    async fn list_recipe_parts(&mut self, recipe_id: Id) -> Result<Vec<RecipePart>, StoreError> {
        self.inner.list_recipe_parts(recipe_id).await
    }
}
