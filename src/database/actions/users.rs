use chrono::Utc;
use serde_json::Value;

use crate::{
    authentication::{
        cryptography::{hash_password, verify_dummy_password, verify_password},
        jwt::{SessionData, TokenService, TokenType},
    },
    constants::{EMAIL_FIELD, NAME_FIELD, PASSWORD_MIN_LENGTH},
    error::{ApiError, StoreError, ValidationErrors},
    form::{CharField, Form, NOT_BLANK},
    schema::{AccessToken, Id, NewUser, TokenPair, User, UserRole},
    store::{Store, StoreTx},
};

const PASSWORD_FIELD: CharField = CharField::required(128);
const DUPLICATE_EMAIL: &str = "user with this email already exists.";
const BAD_CREDENTIALS: &str = "No active account found with the given credentials";

/// Lowercases the domain part of an address. The local part is left alone.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{local}@{}", domain.to_lowercase()),
        None => email.to_owned(),
    }
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.rsplit_once('@') else {
        return false;
    };
    if local.is_empty() || email.chars().any(char::is_whitespace) {
        return false;
    }

    domain == "localhost"
        || (domain.contains('.') && domain.split('.').all(|part| !part.is_empty()))
}

fn check_email(email: &str, errors: &mut ValidationErrors) {
    if email.is_empty() {
        errors.add("email", NOT_BLANK);
    } else if !is_valid_email(email) {
        errors.add("email", "Enter a valid email address.");
    }
}

fn check_password(password: &str, errors: &mut ValidationErrors) {
    if password.chars().count() < PASSWORD_MIN_LENGTH {
        errors.add(
            "password",
            &format!("Ensure this field has at least {PASSWORD_MIN_LENGTH} characters."),
        );
    }
}

fn blocking_failed(e: tokio::task::JoinError) -> ApiError {
    ApiError::Internal(format!("Password task failed: {e}"))
}

/// Hashes on the blocking pool. Callers do this before opening a transaction.
async fn hash(password: &str) -> Result<String, ApiError> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(blocking_failed)?
        .map_err(|e| ApiError::Internal(format!("Could not hash password: {e}")))
}

/// Verifies on the blocking pool. An unknown account is checked against a
/// dummy hash so both failures take the same time.
async fn verify(password: String, stored: Option<(Id, String)>) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || match stored {
        Some((user_id, hash)) => verify_password(&password, &hash).unwrap_or_else(|e| {
            log::error!("Stored password hash for user {user_id} is unreadable: {e}");
            false
        }),
        None => verify_dummy_password(&password),
    })
    .await
    .map_err(blocking_failed)
}

async fn ensure_email_free(
    email: &str,
    current: Option<&User>,
    tx: &mut dyn StoreTx,
) -> Result<(), ApiError> {
    match tx.find_user_by_email(email).await? {
        Some(existing) if current.map(|u| u.id) != Some(existing.id) => {
            Err(ApiError::invalid("email", DUPLICATE_EMAIL))
        }
        _ => Ok(()),
    }
}

fn duplicate_email(e: StoreError) -> ApiError {
    match e {
        StoreError::UniqueViolation(_) => ApiError::invalid("email", DUPLICATE_EMAIL),
        e => e.into(),
    }
}

/// Creates a user and their empty profile in one transaction.
pub async fn create_user(
    email: &str,
    password: &str,
    name: &str,
    role: UserRole,
    store: &dyn Store,
) -> Result<User, ApiError> {
    let email = normalize_email(email);

    let mut errors = ValidationErrors::new();
    check_email(&email, &mut errors);
    check_password(password, &mut errors);
    if !errors.is_empty() {
        return Err(errors.into());
    }

    let superuser = role == UserRole::Superuser;
    let new_user = NewUser {
        email,
        name: name.to_owned(),
        password: hash(password).await?,
        is_staff: superuser,
        is_superuser: superuser,
    };

    let mut tx = store.begin().await?;
    ensure_email_free(&new_user.email, None, &mut *tx).await?;
    let user = tx.insert_user(&new_user).await.map_err(duplicate_email)?;
    tx.insert_profile(user.id).await?;
    tx.commit().await?;

    log::info!("Created user {} ({})", user.id, user.email);
    Ok(user)
}

pub async fn create_superuser(
    email: &str,
    password: &str,
    store: &dyn Store,
) -> Result<User, ApiError> {
    create_user(email, password, "", UserRole::Superuser, store).await
}

/// Creates the configured superuser unless the email is already taken.
pub async fn ensure_superuser(
    email: &str,
    password: &str,
    store: &dyn Store,
) -> Result<Option<User>, ApiError> {
    let mut tx = store.begin().await?;
    let existing = tx.find_user_by_email(&normalize_email(email)).await?;
    tx.commit().await?;

    if existing.is_some() {
        return Ok(None);
    }
    create_superuser(email, password, store).await.map(Some)
}

/// Parses a signup payload and creates a regular user.
pub async fn register_user(data: Value, store: &dyn Store) -> Result<User, ApiError> {
    let mut form = Form::from_data(data, false)?;
    let email = form.string("email", EMAIL_FIELD);
    let password = form.string("password", PASSWORD_FIELD);
    let name = form.string("name", NAME_FIELD);
    form.finish()?;

    let email = crate::actions::required(email, "email")?;
    let password = crate::actions::required(password, "password")?;

    create_user(
        &email,
        &password,
        &name.unwrap_or_default(),
        UserRole::User,
        store,
    )
    .await
}

/// Checks credentials and hands out a token pair, recording the login time.
pub async fn login_user(
    data: Value,
    tokens: &TokenService,
    store: &dyn Store,
) -> Result<TokenPair, ApiError> {
    let mut form = Form::from_data(data, false)?;
    let email = form.string("email", EMAIL_FIELD);
    let password = form.string("password", PASSWORD_FIELD);
    form.finish()?;

    let email = normalize_email(&crate::actions::required(email, "email")?);
    let password = crate::actions::required(password, "password")?;

    let mut tx = store.begin().await?;
    let found = tx.find_user_by_email(&email).await?;
    tx.commit().await?;

    let stored = found.as_ref().map(|u| (u.id, u.password.clone()));
    let authenticated = verify(password, stored).await?;
    let Some(user) = found.filter(|u| authenticated && u.is_active) else {
        return Err(ApiError::unauthorized(BAD_CREDENTIALS));
    };

    let mut tx = store.begin().await?;
    let Some(mut user) = tx.get_user(user.id).await?.filter(|u| u.is_active) else {
        return Err(ApiError::unauthorized(BAD_CREDENTIALS));
    };
    user.last_login = Some(Utc::now());
    tx.update_user(&user).await?;
    tx.commit().await?;

    tokens.issue_pair(&user)
}

pub async fn refresh_token(
    data: Value,
    tokens: &TokenService,
    store: &dyn Store,
) -> Result<AccessToken, ApiError> {
    let mut form = Form::from_data(data, false)?;
    let refresh = form.string("refresh", CharField::required(4096));
    form.finish()?;

    let refresh = crate::actions::required(refresh, "refresh")?;
    let claims = tokens.verify(&refresh, TokenType::Refresh)?;

    let mut tx = store.begin().await?;
    let user = tx.get_user(claims.user_id).await?;
    tx.commit().await?;

    match user {
        Some(user) if user.is_active => Ok(AccessToken {
            access: tokens.issue_access(&user)?,
        }),
        _ => Err(ApiError::unauthorized("Token is invalid or expired")),
    }
}

pub async fn get_me(session: &SessionData, store: &dyn Store) -> Result<User, ApiError> {
    let mut tx = store.begin().await?;
    let user = tx.get_user(session.user_id).await?;
    tx.commit().await?;

    user.ok_or(ApiError::NotFound)
}

/// Updates the caller's name, email and password. `partial` updates leave
/// missing keys untouched.
pub async fn update_me(
    session: &SessionData,
    data: Value,
    partial: bool,
    store: &dyn Store,
) -> Result<User, ApiError> {
    let mut form = Form::from_data(data, partial)?;
    let name = form.string("name", NAME_FIELD);
    let email = form.string("email", EMAIL_FIELD).map(|e| normalize_email(&e));
    let password = form.string("password", PASSWORD_FIELD);
    form.finish()?;

    let mut errors = ValidationErrors::new();
    if let Some(email) = &email {
        check_email(email, &mut errors);
    }
    if let Some(password) = &password {
        check_password(password, &mut errors);
    }
    if !errors.is_empty() {
        return Err(errors.into());
    }

    let password = match password {
        Some(password) => Some(hash(&password).await?),
        None => None,
    };

    let mut tx = store.begin().await?;
    let mut user = tx
        .get_user(session.user_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    if let Some(name) = name {
        user.name = name;
    }
    if let Some(email) = email {
        ensure_email_free(&email, Some(&user), &mut *tx).await?;
        user.email = email;
    }
    if let Some(password) = password {
        user.password = password;
    }

    tx.update_user(&user).await.map_err(duplicate_email)?;
    tx.commit().await?;

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    #[test]
    fn email_domain_is_lowercased() {
        assert_eq!(normalize_email("Test2@Example.com"), "Test2@example.com");
        assert_eq!(normalize_email("TEST3@EXAMPLE.COM"), "TEST3@example.com");
        assert_eq!(normalize_email("  test4@example.COM "), "test4@example.com");
        assert_eq!(normalize_email("odd@name@Host.ORG"), "odd@name@host.org");
    }

    #[test]
    fn email_shape_is_checked() {
        assert!(is_valid_email("cook@example.com"));
        assert!(is_valid_email("cook@localhost"));
        assert!(!is_valid_email("cook"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("cook@example"));
        assert!(!is_valid_email("cook@example..com"));
        assert!(!is_valid_email("co ok@example.com"));
    }

    #[tokio::test]
    async fn empty_email_is_rejected_and_nothing_stored() {
        let store = MemoryStore::new();

        let result = create_user("", "testpass", "", UserRole::User, &store).await;
        match result {
            Err(ApiError::Validation(errors)) => assert!(errors.get("email").is_some()),
            other => panic!("expected validation error, got {other:?}"),
        }

        let mut tx = store.begin().await.unwrap();
        assert!(tx.find_user_by_email("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn user_gets_profile_and_hashed_password() {
        let store = MemoryStore::new();
        let user = create_user("Cook@Example.COM", "secret1", "Cook", UserRole::User, &store)
            .await
            .unwrap();

        assert_eq!(user.email, "Cook@example.com");
        assert_ne!(user.password, "secret1");
        assert!(user.is_active);
        assert!(!user.is_staff);

        let mut tx = store.begin().await.unwrap();
        let profile = tx.get_profile(1).await.unwrap().unwrap();
        assert_eq!(profile.user_id, user.id);
        assert_eq!(profile.bio, "");
    }

    #[tokio::test]
    async fn superuser_has_both_flags() {
        let store = MemoryStore::new();
        let user = create_superuser("root@example.com", "secret1", &store)
            .await
            .unwrap();

        assert!(user.is_staff);
        assert!(user.is_superuser);
        assert!(ensure_superuser("root@example.com", "secret1", &store)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn duplicate_email_and_short_password_are_rejected() {
        let store = MemoryStore::new();
        create_user("a@example.com", "secret1", "", UserRole::User, &store)
            .await
            .unwrap();

        let dup = create_user("a@EXAMPLE.com", "secret1", "", UserRole::User, &store).await;
        assert!(matches!(dup, Err(ApiError::Validation(e)) if e.get("email").is_some()));

        let short = create_user("b@example.com", "pw", "", UserRole::User, &store).await;
        assert!(matches!(short, Err(ApiError::Validation(e)) if e.get("password").is_some()));
    }

    #[tokio::test]
    async fn unknown_email_is_checked_against_dummy_hash() {
        let store = MemoryStore::new();
        let tokens = TokenService::new(
            "test-secret",
            chrono::Duration::minutes(60),
            chrono::Duration::hours(24),
        )
        .unwrap();

        let result = login_user(
            serde_json::json!({ "email": "ghost@example.com", "password": "secret1" }),
            &tokens,
            &store,
        )
        .await;

        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
        assert!(crate::cryptography::DUMMY_HASH.get().is_some());
    }
}
