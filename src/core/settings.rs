//! Runtime settings stored in the `settings` key-value table.
//!
//! Values here can be changed while the worker is running; readers fetch them once per
//! batch run and fall back to the static default from `config.toml` when absent.

use crate::{
    entities::{AdPlatform, Setting, setting},
    errors::Result,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{Set, prelude::*};
use std::str::FromStr;
use tracing::warn;

/// Global auto-pause threshold key
pub const AUTO_PAUSE_THRESHOLD_KEY: &str = "auto_pause_threshold";

/// Reads a raw setting value.
pub async fn get_setting<C>(db: &C, key: &str) -> Result<Option<String>>
where
    C: ConnectionTrait,
{
    let state = Setting::find()
        .filter(setting::Column::Key.eq(key))
        .one(db)
        .await?;
    Ok(state.map(|s| s.value))
}

/// Inserts or updates a setting value.
pub async fn set_setting<C>(db: &C, key: &str, value: &str) -> Result<()>
where
    C: ConnectionTrait,
{
    let now = Utc::now().naive_utc();

    let existing = Setting::find()
        .filter(setting::Column::Key.eq(key))
        .one(db)
        .await?;

    if let Some(state) = existing {
        let mut active_model: setting::ActiveModel = state.into();
        active_model.value = Set(value.to_string());
        active_model.updated_at = Set(now);
        active_model.update(db).await?;
    } else {
        setting::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value.to_string()),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    Ok(())
}

/// Reads a decimal setting, falling back to `default` when absent or malformed.
pub async fn get_decimal_setting<C>(db: &C, key: &str, default: Decimal) -> Result<Decimal>
where
    C: ConnectionTrait,
{
    let Some(raw) = get_setting(db, key).await? else {
        return Ok(default);
    };

    match Decimal::from_str(raw.trim()) {
        Ok(value) => Ok(value),
        Err(e) => {
            warn!(key, value = %raw, error = %e, "Malformed decimal setting, using default");
            Ok(default)
        }
    }
}

/// Setting key for a platform-specific auto-pause threshold.
#[must_use]
pub fn platform_threshold_key(platform: AdPlatform) -> String {
    format!("{AUTO_PAUSE_THRESHOLD_KEY}_{}", platform.as_str())
}

/// Current auto-pause threshold for `platform`.
///
/// Lookup order: `auto_pause_threshold_<platform>`, then `auto_pause_threshold`, then
/// `default`.
pub async fn pause_threshold<C>(db: &C, platform: AdPlatform, default: Decimal) -> Result<Decimal>
where
    C: ConnectionTrait,
{
    let global = get_decimal_setting(db, AUTO_PAUSE_THRESHOLD_KEY, default).await?;
    get_decimal_setting(db, &platform_threshold_key(platform), global).await
}
