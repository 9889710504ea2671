use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres, Transaction};

use super::{
    error::{QueryError, StoreError},
    schema::{
        Id, Label, LabelKind, NewRecipe, NewUser, Profile, Recipe, RecipeFilter, RecipeIngredient,
        RecipePart, Tag, User,
    },
    store::{Store, StoreTx},
};

pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Connects and brings the schema up to date.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, QueryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| QueryError::new(format!("Migration failed: {e}")))?;

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|_| QueryError::new("Could not start transaction".to_owned()))?;

        Ok(Box::new(PgTx { tx }))
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|_| QueryError::new("Could not commit transaction".to_owned()))?;

        Ok(())
    }

    async fn insert_user(&mut self, user: &NewUser) -> Result<User, StoreError> {
        let row: User = sqlx::query_as(
            "
            INSERT INTO users (email, name, password, is_staff, is_superuser)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
        ",
        )
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password)
        .bind(user.is_staff)
        .bind(user.is_superuser)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row)
    }

    async fn get_user(&mut self, id: Id) -> Result<Option<User>, StoreError> {
        let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row)
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError> {
        let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row)
    }

    async fn update_user(&mut self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            "
            UPDATE users SET
            email = $1,
            name = $2,
            password = $3,
            is_active = $4,
            is_staff = $5,
            is_superuser = $6,
            last_login = $7
            WHERE id = $8
        ",
        )
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password)
        .bind(user.is_active)
        .bind(user.is_staff)
        .bind(user.is_superuser)
        .bind(user.last_login)
        .bind(user.id)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn count_logins_since(&mut self, since: DateTime<Utc>) -> Result<i64, StoreError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE last_login >= $1")
            .bind(since)
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(count.0)
    }

    async fn list_superuser_emails(&mut self) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT email FROM users WHERE is_superuser ORDER BY id")
                .fetch_all(&mut *self.tx)
                .await?;

        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn insert_profile(&mut self, user_id: Id) -> Result<Profile, StoreError> {
        let row: Profile = sqlx::query_as("INSERT INTO profiles (user_id) VALUES ($1) RETURNING *")
            .bind(user_id)
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(row)
    }

    async fn get_profile(&mut self, id: Id) -> Result<Option<Profile>, StoreError> {
        let row: Option<Profile> = sqlx::query_as("SELECT * FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row)
    }

    async fn update_profile(&mut self, profile: &Profile) -> Result<(), StoreError> {
        sqlx::query("UPDATE profiles SET bio = $1, short_desc = $2, image = $3 WHERE id = $4")
            .bind(&profile.bio)
            .bind(&profile.short_desc)
            .bind(&profile.image)
            .bind(profile.id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn insert_label(
        &mut self,
        kind: LabelKind,
        user_id: Id,
        name: &str,
    ) -> Result<Option<Label>, StoreError> {
        let table = kind.table();
        let row: Option<Label> = sqlx::query_as(&format!(
            "INSERT INTO {table} (user_id, name) VALUES ($1, $2) ON CONFLICT (user_id, name) DO NOTHING RETURNING *"
        ))
        .bind(user_id)
        .bind(name)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row)
    }

    async fn find_label_by_name(
        &mut self,
        kind: LabelKind,
        user_id: Id,
        name: &str,
    ) -> Result<Option<Label>, StoreError> {
        let table = kind.table();
        let row: Option<Label> = sqlx::query_as(&format!(
            "SELECT * FROM {table} WHERE user_id = $1 AND name = $2"
        ))
        .bind(user_id)
        .bind(name)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row)
    }

    async fn get_label(
        &mut self,
        kind: LabelKind,
        user_id: Id,
        id: Id,
    ) -> Result<Option<Label>, StoreError> {
        let table = kind.table();
        let row: Option<Label> = sqlx::query_as(&format!(
            "SELECT * FROM {table} WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row)
    }

    async fn list_labels(
        &mut self,
        kind: LabelKind,
        user_id: Id,
        assigned_only: bool,
    ) -> Result<Vec<Label>, StoreError> {
        let table = kind.table();
        let (link, column) = kind.link();
        let rows: Vec<Label> = sqlx::query_as(&format!(
            "
            SELECT t.* FROM {table} t
            WHERE t.user_id = $1
            AND ($2 = FALSE OR EXISTS (SELECT 1 FROM {link} l WHERE l.{column} = t.id))
            ORDER BY t.name DESC
        "
        ))
        .bind(user_id)
        .bind(assigned_only)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows)
    }

    async fn rename_label(&mut self, kind: LabelKind, label: &Label) -> Result<(), StoreError> {
        let table = kind.table();
        sqlx::query(&format!(
            "UPDATE {table} SET name = $1 WHERE id = $2 AND user_id = $3"
        ))
        .bind(&label.name)
        .bind(label.id)
        .bind(label.user_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn delete_label(
        &mut self,
        kind: LabelKind,
        user_id: Id,
        id: Id,
    ) -> Result<bool, StoreError> {
        let table = kind.table();
        let result = sqlx::query(&format!(
            "DELETE FROM {table} WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_recipe(&mut self, recipe: &NewRecipe) -> Result<Recipe, StoreError> {
        let row: Recipe = sqlx::query_as(
            "
            INSERT INTO recipes (user_id, title, description, time_minutes, price, link, image)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
        ",
        )
        .bind(recipe.user_id)
        .bind(&recipe.title)
        .bind(&recipe.description)
        .bind(recipe.time_minutes)
        .bind(recipe.price)
        .bind(&recipe.link)
        .bind(&recipe.image)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row)
    }

    async fn get_recipe(&mut self, user_id: Id, id: Id) -> Result<Option<Recipe>, StoreError> {
        let row: Option<Recipe> =
            sqlx::query_as("SELECT * FROM recipes WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .fetch_optional(&mut *self.tx)
                .await?;

        Ok(row)
    }

    async fn list_recipes(
        &mut self,
        user_id: Id,
        filter: &RecipeFilter,
    ) -> Result<Vec<Recipe>, StoreError> {
        let rows: Vec<Recipe> = sqlx::query_as(
            "
            SELECT r.* FROM recipes r
            WHERE r.user_id = $1
            AND ($2::BIGINT[] IS NULL OR EXISTS (
                SELECT 1 FROM recipe_tags rt WHERE rt.recipe_id = r.id AND rt.tag_id = ANY($2)
            ))
            AND ($3::BIGINT[] IS NULL OR EXISTS (
                SELECT 1 FROM recipe_ingredients ri WHERE ri.recipe_id = r.id AND ri.ingredient_id = ANY($3)
            ))
            ORDER BY r.id DESC
        ",
        )
        .bind(user_id)
        .bind(&filter.tags)
        .bind(&filter.ingredients)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows)
    }

    async fn update_recipe(&mut self, recipe: &Recipe) -> Result<(), StoreError> {
        sqlx::query(
            "
            UPDATE recipes SET
            title = $1,
            description = $2,
            time_minutes = $3,
            price = $4,
            link = $5,
            image = $6
            WHERE id = $7 AND user_id = $8
        ",
        )
        .bind(&recipe.title)
        .bind(&recipe.description)
        .bind(recipe.time_minutes)
        .bind(recipe.price)
        .bind(&recipe.link)
        .bind(&recipe.image)
        .bind(recipe.id)
        .bind(recipe.user_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn delete_recipe(&mut self, user_id: Id, id: Id) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM recipes WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn attach_tag(&mut self, recipe_id: Id, tag_id: Id) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO recipe_tags (recipe_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(recipe_id)
        .bind(tag_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn clear_tags(&mut self, recipe_id: Id) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
            .bind(recipe_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn list_recipe_tags(&mut self, recipe_id: Id) -> Result<Vec<Tag>, StoreError> {
        let rows: Vec<Tag> = sqlx::query_as(
            "
            SELECT t.* FROM recipe_tags rt
            INNER JOIN tags t ON t.id = rt.tag_id
            WHERE rt.recipe_id = $1
            ORDER BY t.id
        ",
        )
        .bind(recipe_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows)
    }

    async fn insert_recipe_ingredient(
        &mut self,
        recipe_id: Id,
        ingredient_id: Id,
        amount: Decimal,
        amount_type: &str,
    ) -> Result<RecipeIngredient, StoreError> {
        let row: RecipeIngredient = sqlx::query_as(
            "
            INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount, amount_type)
            VALUES ($1, $2, $3, $4)
            RETURNING *
        ",
        )
        .bind(recipe_id)
        .bind(ingredient_id)
        .bind(amount)
        .bind(amount_type)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row)
    }

    async fn clear_recipe_ingredients(&mut self, recipe_id: Id) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
            .bind(recipe_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn list_recipe_parts(&mut self, recipe_id: Id) -> Result<Vec<RecipePart>, StoreError> {
        let rows: Vec<RecipePart> = sqlx::query_as(
            "
            SELECT ri.id AS id, ri.recipe_id AS recipe_id, i.id AS ingredient_id, i.name AS ingredient_name,
                ri.amount AS amount, ri.amount_type AS amount_type
            FROM recipe_ingredients ri
            INNER JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE ri.recipe_id = $1
            ORDER BY ri.id
        ",
        )
        .bind(recipe_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows)
    }
}
