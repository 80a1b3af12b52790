//! [`SqliteStore`] — the SQLite implementation of [`AppRecordStore`].

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use webapk_core::{
  app::{AppId, InstalledAppRecord, NewApp, ShellVersion},
  lifecycle::UpdateCompletion,
  manifest::FetchedManifestData,
  store::AppRecordStore,
};

use crate::{
  Error, Result,
  encode::{APP_COLUMNS, RawApp, encode_dt, encode_icon_hashes, encode_path},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An installed-app registry backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a single-row `UPDATE` and map "no row touched" to
  /// [`Error::AppNotFound`].
  async fn update_one(
    &self,
    id: &AppId,
    sql: &'static str,
    params: Vec<Box<dyn rusqlite::ToSql + Send>>,
  ) -> Result<()> {
    let id_str = id.as_str().to_owned();

    let changed = self
      .conn
      .call(move |conn| {
        let mut bound: Vec<&dyn rusqlite::ToSql> =
          params.iter().map(|p| p.as_ref() as &dyn rusqlite::ToSql).collect();
        bound.push(&id_str);
        Ok(conn.execute(sql, bound.as_slice())?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::AppNotFound(id.clone()));
    }
    Ok(())
  }
}

// ─── AppRecordStore impl ─────────────────────────────────────────────────────

impl AppRecordStore for SqliteStore {
  type Error = Error;

  async fn register(
    &self,
    app: NewApp,
    now: DateTime<Utc>,
  ) -> Result<InstalledAppRecord> {
    let record = app.into_record(now);

    let id_str        = record.app_id.as_str().to_owned();
    let manifest_url  = record.manifest_url.clone();
    let scope         = record.scope.clone();
    let start_url     = record.start_url.clone();
    let name          = record.name.clone();
    let short_name    = record.short_name.clone();
    let display       = record.display.as_str().to_owned();
    let orientation   = record.orientation.as_str().to_owned();
    let theme         = record.theme_color;
    let background    = record.background_color;
    let icon_hashes   = encode_icon_hashes(&record.icon_hashes)?;
    let shell_version = record.shell_version;
    let registered_at = encode_dt(record.registered_at);
    let last_check_at = record.last_check_at.map(encode_dt);
    let succeeded     = record.last_update_succeeded;

    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT INTO apps (
             app_id, manifest_url, scope, start_url, name, short_name,
             display, orientation, theme_color, background_color,
             icon_hashes, shell_version, registered_at, last_check_at,
             last_update_succeeded
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
           ON CONFLICT (app_id) DO NOTHING",
          rusqlite::params![
            id_str,
            manifest_url,
            scope,
            start_url,
            name,
            short_name,
            display,
            orientation,
            theme,
            background,
            icon_hashes,
            shell_version,
            registered_at,
            last_check_at,
            succeeded,
          ],
        )?)
      })
      .await?;

    if inserted == 0 {
      return Err(Error::AlreadyRegistered(record.app_id));
    }
    tracing::info!(app_id = %record.app_id, "registered app");
    Ok(record)
  }

  async fn get(&self, id: &AppId) -> Result<Option<InstalledAppRecord>> {
    let id_str = id.as_str().to_owned();

    let raw: Option<RawApp> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {APP_COLUMNS} FROM apps WHERE app_id = ?1"),
            rusqlite::params![id_str],
            RawApp::from_row,
          )
          .optional()?)
      })
      .await?;

    Ok(raw.map(RawApp::into_record))
  }

  async fn list(&self) -> Result<Vec<InstalledAppRecord>> {
    let raws: Vec<RawApp> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {APP_COLUMNS} FROM apps ORDER BY app_id"))?;
        let rows = stmt
          .query_map([], RawApp::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(raws.into_iter().map(RawApp::into_record).collect())
  }

  async fn record_check(&self, id: &AppId, at: DateTime<Utc>) -> Result<()> {
    self
      .update_one(
        id,
        "UPDATE apps SET last_check_at = ?1 WHERE app_id = ?2",
        vec![Box::new(encode_dt(at))],
      )
      .await
  }

  async fn record_update_completion(
    &self,
    id: &AppId,
    completion: UpdateCompletion,
  ) -> Result<()> {
    let id_str       = id.as_str().to_owned();
    let completed_at = encode_dt(completion.completed_at);

    let changed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(
          "UPDATE apps SET
             last_update_completed_at     = ?1,
             last_update_succeeded        = ?2,
             relaxed_updates              = ?3,
             last_requested_shell_version = ?4
           WHERE app_id = ?5",
          rusqlite::params![
            completed_at,
            completion.succeeded,
            completion.relax_updates,
            completion.requested_shell_version,
            id_str,
          ],
        )?;
        tx.commit()?;
        Ok(changed)
      })
      .await?;

    if changed == 0 {
      return Err(Error::AppNotFound(id.clone()));
    }
    Ok(())
  }

  async fn set_pending_update(&self, id: &AppId, path: Option<PathBuf>) -> Result<()> {
    self
      .update_one(
        id,
        "UPDATE apps SET pending_update_path = ?1 WHERE app_id = ?2",
        vec![Box::new(encode_path(path))],
      )
      .await
  }

  async fn set_dismissed_disclosure(&self, id: &AppId, dismissed: bool) -> Result<()> {
    self
      .update_one(
        id,
        "UPDATE apps SET dismissed_disclosure = ?1 WHERE app_id = ?2",
        vec![Box::new(dismissed)],
      )
      .await
  }

  async fn apply_manifest(
    &self,
    id: &AppId,
    manifest: &FetchedManifestData,
    shell_version: ShellVersion,
  ) -> Result<()> {
    let icon_hashes = encode_icon_hashes(&manifest.icon_hashes)?;

    self
      .update_one(
        id,
        "UPDATE apps SET
           manifest_url     = ?1,
           scope            = ?2,
           start_url        = ?3,
           name             = ?4,
           short_name       = ?5,
           display          = ?6,
           orientation      = ?7,
           theme_color      = ?8,
           background_color = ?9,
           icon_hashes      = ?10,
           shell_version    = ?11
         WHERE app_id = ?12",
        vec![
          Box::new(manifest.manifest_url.clone()),
          Box::new(manifest.scope.clone()),
          Box::new(manifest.start_url.clone()),
          Box::new(manifest.name.clone()),
          Box::new(manifest.short_name.clone()),
          Box::new(manifest.display.as_str().to_owned()),
          Box::new(manifest.orientation.as_str().to_owned()),
          Box::new(manifest.theme_color),
          Box::new(manifest.background_color),
          Box::new(icon_hashes),
          Box::new(shell_version),
        ],
      )
      .await
  }

  async fn remove(&self, id: &AppId) -> Result<bool> {
    let id_str = id.as_str().to_owned();

    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM apps WHERE app_id = ?1", rusqlite::params![id_str])?)
      })
      .await?;

    if removed > 0 {
      tracing::info!(app_id = %id, "removed app");
    }
    Ok(removed > 0)
  }
}
