use anyhow::Context;
use bytes::Bytes;
use tracing::{info, warn};

use crate::{
    auth::{
        repo_types::{Gender, NewUser, Role, User},
        services::hash_password,
    },
    config::AdminSeed,
    state::AppState,
    storage::{avatar_key, is_avatar_of, ImageType},
};

const AVATAR_URL_TTL_SECS: u64 = 10 * 60;

/// Stores a new avatar and points the user at it; the previous object, if
/// any, is removed afterwards.
pub async fn replace_avatar(
    st: &AppState,
    user: &User,
    body: Bytes,
    image: ImageType,
) -> anyhow::Result<String> {
    let key = avatar_key(user.id, image);

    st.storage.put(&key, body, image.mime()).await?;
    User::set_avatar_key(&st.db, user.id, Some(&key)).await?;

    if let Some(old) = user.avatar_key.as_deref().filter(|k| is_avatar_of(k, user.id)) {
        // best effort
        if let Err(e) = st.storage.delete(old).await {
            warn!(error = %e, key = old, "failed to delete previous avatar");
        }
    }
    Ok(key)
}

pub async fn remove_avatar(st: &AppState, user: &User) -> anyhow::Result<()> {
    if let Some(key) = user.avatar_key.as_deref() {
        User::set_avatar_key(&st.db, user.id, None).await?;
        if is_avatar_of(key, user.id) {
            st.storage.delete(key).await?;
        } else {
            warn!(user_id = %user.id, key, "avatar key outside the user folder; not deleted");
        }
    }
    Ok(())
}

pub async fn avatar_url(st: &AppState, key: &str) -> anyhow::Result<String> {
    st.storage
        .presign_get(key, AVATAR_URL_TTL_SECS)
        .await
        .with_context(|| format!("presign avatar {}", key))
}

/// Creates the configured admin account unless the email is already taken.
pub async fn seed_admin(st: &AppState, seed: &AdminSeed) -> anyhow::Result<()> {
    let email = seed.email.trim().to_lowercase();
    if User::find_by_email(&st.db, &email).await?.is_some() {
        return Ok(());
    }
    let user = User::create(
        &st.db,
        &NewUser {
            email,
            password_hash: hash_password(&seed.password)?,
            full_name: "Administrator".into(),
            gender: Gender::D,
            phone: "00000000".into(),
            address: "-".into(),
            role: Role::Admin,
        },
    )
    .await?;
    info!(user_id = %user.id, email = %user.email, "admin account created");
    Ok(())
}
