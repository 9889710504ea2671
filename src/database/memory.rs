use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{
    error::StoreError,
    schema::{
        Id, Label, LabelKind, NewRecipe, NewUser, Profile, Recipe, RecipeFilter, RecipeIngredient,
        RecipePart, Tag, User,
    },
    store::{Store, StoreTx},
};

#[derive(Default, Clone, Debug)]
struct Sequences {
    users: Id,
    profiles: Id,
    tags: Id,
    ingredients: Id,
    recipes: Id,
    recipe_ingredients: Id,
}

fn next(seq: &mut Id) -> Id {
    *seq += 1;
    *seq
}

#[derive(Default, Clone, Debug)]
struct State {
    seq: Sequences,
    users: BTreeMap<Id, User>,
    profiles: BTreeMap<Id, Profile>,
    tags: BTreeMap<Id, Label>,
    ingredients: BTreeMap<Id, Label>,
    recipes: BTreeMap<Id, Recipe>,
    recipe_tags: BTreeSet<(Id, Id)>,
    recipe_ingredients: BTreeMap<Id, RecipeIngredient>,
}

impl State {
    fn labels(&self, kind: LabelKind) -> &BTreeMap<Id, Label> {
        match kind {
            LabelKind::Tag => &self.tags,
            LabelKind::Ingredient => &self.ingredients,
        }
    }

    fn labels_mut(&mut self, kind: LabelKind) -> &mut BTreeMap<Id, Label> {
        match kind {
            LabelKind::Tag => &mut self.tags,
            LabelKind::Ingredient => &mut self.ingredients,
        }
    }

    fn is_assigned(&self, kind: LabelKind, label_id: Id) -> bool {
        match kind {
            LabelKind::Tag => self.recipe_tags.iter().any(|(_, tag)| *tag == label_id),
            LabelKind::Ingredient => self
                .recipe_ingredients
                .values()
                .any(|part| part.ingredient_id == label_id),
        }
    }

    fn recipe_has_tag(&self, recipe_id: Id, ids: &[Id]) -> bool {
        ids.iter()
            .any(|tag_id| self.recipe_tags.contains(&(recipe_id, *tag_id)))
    }

    fn recipe_has_ingredient(&self, recipe_id: Id, ids: &[Id]) -> bool {
        self.recipe_ingredients
            .values()
            .any(|part| part.recipe_id == recipe_id && ids.contains(&part.ingredient_id))
    }
}

/// Process-local store. Transactions are serialized on one async mutex and
/// write to a working copy that only replaces the shared state on commit.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();

        Ok(Box::new(MemoryTx { guard, working }))
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<State>,
    working: State,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;

        Ok(())
    }

    async fn insert_user(&mut self, user: &NewUser) -> Result<User, StoreError> {
        let state = &mut self.working;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::UniqueViolation(String::from("users_email_key")));
        }

        let row = User {
            id: next(&mut state.seq.users),
            email: user.email.to_owned(),
            name: user.name.to_owned(),
            password: user.password.to_owned(),
            is_active: true,
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
            last_login: None,
            date_joined: Utc::now(),
        };
        state.users.insert(row.id, row.clone());

        Ok(row)
    }

    async fn get_user(&mut self, id: Id) -> Result<Option<User>, StoreError> {
        Ok(self.working.users.get(&id).cloned())
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .working
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn update_user(&mut self, user: &User) -> Result<(), StoreError> {
        let state = &mut self.working;
        if state
            .users
            .values()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(StoreError::UniqueViolation(String::from("users_email_key")));
        }
        state.users.insert(user.id, user.clone());

        Ok(())
    }

    async fn count_logins_since(&mut self, since: DateTime<Utc>) -> Result<i64, StoreError> {
        Ok(self
            .working
            .users
            .values()
            .filter(|u| u.last_login.map(|at| at >= since).unwrap_or(false))
            .count() as i64)
    }

    async fn list_superuser_emails(&mut self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .working
            .users
            .values()
            .filter(|u| u.is_superuser)
            .map(|u| u.email.to_owned())
            .collect())
    }

    async fn insert_profile(&mut self, user_id: Id) -> Result<Profile, StoreError> {
        let state = &mut self.working;
        if state.profiles.values().any(|p| p.user_id == user_id) {
            return Err(StoreError::UniqueViolation(String::from(
                "profiles_user_id_key",
            )));
        }

        let row = Profile {
            id: next(&mut state.seq.profiles),
            user_id,
            bio: String::new(),
            short_desc: String::new(),
            image: None,
        };
        state.profiles.insert(row.id, row.clone());

        Ok(row)
    }

    async fn get_profile(&mut self, id: Id) -> Result<Option<Profile>, StoreError> {
        Ok(self.working.profiles.get(&id).cloned())
    }

    async fn update_profile(&mut self, profile: &Profile) -> Result<(), StoreError> {
        self.working.profiles.insert(profile.id, profile.clone());
        Ok(())
    }

    async fn insert_label(
        &mut self,
        kind: LabelKind,
        user_id: Id,
        name: &str,
    ) -> Result<Option<Label>, StoreError> {
        let state = &mut self.working;
        if state
            .labels(kind)
            .values()
            .any(|l| l.user_id == user_id && l.name == name)
        {
            return Ok(None);
        }

        let id = match kind {
            LabelKind::Tag => next(&mut state.seq.tags),
            LabelKind::Ingredient => next(&mut state.seq.ingredients),
        };
        let row = Label {
            id,
            user_id,
            name: name.to_owned(),
        };
        state.labels_mut(kind).insert(id, row.clone());

        Ok(Some(row))
    }

    async fn find_label_by_name(
        &mut self,
        kind: LabelKind,
        user_id: Id,
        name: &str,
    ) -> Result<Option<Label>, StoreError> {
        Ok(self
            .working
            .labels(kind)
            .values()
            .find(|l| l.user_id == user_id && l.name == name)
            .cloned())
    }

    async fn get_label(
        &mut self,
        kind: LabelKind,
        user_id: Id,
        id: Id,
    ) -> Result<Option<Label>, StoreError> {
        Ok(self
            .working
            .labels(kind)
            .get(&id)
            .filter(|l| l.user_id == user_id)
            .cloned())
    }

    async fn list_labels(
        &mut self,
        kind: LabelKind,
        user_id: Id,
        assigned_only: bool,
    ) -> Result<Vec<Label>, StoreError> {
        let state = &self.working;
        let mut rows: Vec<Label> = state
            .labels(kind)
            .values()
            .filter(|l| l.user_id == user_id)
            .filter(|l| !assigned_only || state.is_assigned(kind, l.id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.name.cmp(&a.name));

        Ok(rows)
    }

    async fn rename_label(&mut self, kind: LabelKind, label: &Label) -> Result<(), StoreError> {
        let labels = self.working.labels_mut(kind);
        if labels
            .values()
            .any(|l| l.id != label.id && l.user_id == label.user_id && l.name == label.name)
        {
            return Err(StoreError::UniqueViolation(format!(
                "{}_user_id_name_key",
                kind.table()
            )));
        }
        labels.insert(label.id, label.clone());

        Ok(())
    }

    async fn delete_label(
        &mut self,
        kind: LabelKind,
        user_id: Id,
        id: Id,
    ) -> Result<bool, StoreError> {
        let state = &mut self.working;
        let owned = state
            .labels(kind)
            .get(&id)
            .map(|l| l.user_id == user_id)
            .unwrap_or(false);
        if !owned {
            return Ok(false);
        }

        state.labels_mut(kind).remove(&id);
        match kind {
            LabelKind::Tag => state.recipe_tags.retain(|(_, tag)| *tag != id),
            LabelKind::Ingredient => state
                .recipe_ingredients
                .retain(|_, part| part.ingredient_id != id),
        }

        Ok(true)
    }

    async fn insert_recipe(&mut self, recipe: &NewRecipe) -> Result<Recipe, StoreError> {
        let state = &mut self.working;
        let row = Recipe {
            id: next(&mut state.seq.recipes),
            user_id: recipe.user_id,
            title: recipe.title.to_owned(),
            description: recipe.description.to_owned(),
            time_minutes: recipe.time_minutes,
            price: recipe.price,
            link: recipe.link.to_owned(),
            image: recipe.image.to_owned(),
        };
        state.recipes.insert(row.id, row.clone());

        Ok(row)
    }

    async fn get_recipe(&mut self, user_id: Id, id: Id) -> Result<Option<Recipe>, StoreError> {
        Ok(self
            .working
            .recipes
            .get(&id)
            .filter(|r| r.user_id == user_id)
            .cloned())
    }

    async fn list_recipes(
        &mut self,
        user_id: Id,
        filter: &RecipeFilter,
    ) -> Result<Vec<Recipe>, StoreError> {
        let state = &self.working;
        Ok(state
            .recipes
            .values()
            .rev()
            .filter(|r| r.user_id == user_id)
            .filter(|r| match &filter.tags {
                Some(ids) => state.recipe_has_tag(r.id, ids),
                None => true,
            })
            .filter(|r| match &filter.ingredients {
                Some(ids) => state.recipe_has_ingredient(r.id, ids),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn update_recipe(&mut self, recipe: &Recipe) -> Result<(), StoreError> {
        self.working.recipes.insert(recipe.id, recipe.clone());
        Ok(())
    }

    async fn delete_recipe(&mut self, user_id: Id, id: Id) -> Result<bool, StoreError> {
        let state = &mut self.working;
        let owned = state
            .recipes
            .get(&id)
            .map(|r| r.user_id == user_id)
            .unwrap_or(false);
        if !owned {
            return Ok(false);
        }

        state.recipes.remove(&id);
        state.recipe_tags.retain(|(recipe, _)| *recipe != id);
        state
            .recipe_ingredients
            .retain(|_, part| part.recipe_id != id);

        Ok(true)
    }

    async fn attach_tag(&mut self, recipe_id: Id, tag_id: Id) -> Result<(), StoreError> {
        self.working.recipe_tags.insert((recipe_id, tag_id));
        Ok(())
    }

    async fn clear_tags(&mut self, recipe_id: Id) -> Result<(), StoreError> {
        self.working
            .recipe_tags
            .retain(|(recipe, _)| *recipe != recipe_id);
        Ok(())
    }

    async fn list_recipe_tags(&mut self, recipe_id: Id) -> Result<Vec<Tag>, StoreError> {
        let state = &self.working;
        Ok(state
            .recipe_tags
            .iter()
            .filter(|(recipe, _)| *recipe == recipe_id)
            .filter_map(|(_, tag)| state.tags.get(tag).cloned())
            .collect())
    }

    async fn insert_recipe_ingredient(
        &mut self,
        recipe_id: Id,
        ingredient_id: Id,
        amount: Decimal,
        amount_type: &str,
    ) -> Result<RecipeIngredient, StoreError> {
        let state = &mut self.working;
        let row = RecipeIngredient {
            id: next(&mut state.seq.recipe_ingredients),
            recipe_id,
            ingredient_id,
            amount,
            amount_type: amount_type.to_owned(),
        };
        state.recipe_ingredients.insert(row.id, row.clone());

        Ok(row)
    }

    async fn clear_recipe_ingredients(&mut self, recipe_id: Id) -> Result<(), StoreError> {
        self.working
            .recipe_ingredients
            .retain(|_, part| part.recipe_id != recipe_id);
        Ok(())
    }

    async fn list_recipe_parts(&mut self, recipe_id: Id) -> Result<Vec<RecipePart>, StoreError> {
        let state = &self.working;
        Ok(state
            .recipe_ingredients
            .values()
            .filter(|part| part.recipe_id == recipe_id)
            .filter_map(|part| {
                state.ingredients.get(&part.ingredient_id).map(|i| RecipePart {
                    id: part.id,
                    recipe_id: part.recipe_id,
                    ingredient_id: part.ingredient_id,
                    ingredient_name: i.name.to_owned(),
                    amount: part.amount,
                    amount_type: part.amount_type.to_owned(),
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn uncommitted_writes_are_discarded() {
        let store = MemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.insert_label(LabelKind::Tag, 1, "Vegan").await.unwrap();
        drop(tx);

        let mut tx = store.begin().await.unwrap();
        assert!(tx.list_labels(LabelKind::Tag, 1, false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn committed_writes_are_visible() {
        let store = MemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.insert_label(LabelKind::Ingredient, 1, "Salt").await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let rows = tx.list_labels(LabelKind::Ingredient, 1, false).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Salt");
    }

    #[tokio::test]
    async fn duplicate_label_insert_reports_conflict() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        assert!(tx.insert_label(LabelKind::Tag, 1, "Dinner").await.unwrap().is_some());
        assert!(tx.insert_label(LabelKind::Tag, 1, "Dinner").await.unwrap().is_none());
        assert!(tx.insert_label(LabelKind::Tag, 2, "Dinner").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn deleting_recipe_removes_its_links() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        let recipe = tx
            .insert_recipe(&NewRecipe {
                user_id: 1,
                title: String::from("Soup"),
                description: String::new(),
                time_minutes: 10,
                price: Decimal::new(500, 2),
                link: String::new(),
                image: None,
            })
            .await
            .unwrap();
        let tag = tx.insert_label(LabelKind::Tag, 1, "Warm").await.unwrap().unwrap();
        tx.attach_tag(recipe.id, tag.id).await.unwrap();

        assert!(!tx.delete_recipe(2, recipe.id).await.unwrap());
        assert!(tx.delete_recipe(1, recipe.id).await.unwrap());
        assert!(tx.list_recipe_tags(recipe.id).await.unwrap().is_empty());
        assert!(tx.list_labels(LabelKind::Tag, 1, true).await.unwrap().is_empty());
    }
}
