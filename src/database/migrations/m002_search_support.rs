//! Search indexes, the `search_images` stored function and owner consistency.
//!
//! Everything here is backend specific. Postgres gets GIN indexes, the ranked
//! search function, an owner-check trigger and (on Supabase, where `auth.uid()`
//! exists) row-level security policies. SQLite only gets the owner-check
//! triggers; search is evaluated in-process there.

use sea_orm::{ConnectionTrait, DatabaseBackend};
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

const POSTGRES_UP: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_image_metadata_tags ON image_metadata USING GIN (tags)",
    "CREATE INDEX IF NOT EXISTS idx_image_metadata_colors ON image_metadata USING GIN (colors)",
    "CREATE INDEX IF NOT EXISTS idx_image_metadata_description_fts ON image_metadata \
     USING GIN (to_tsvector('english', coalesce(description, '')))",
    r#"CREATE OR REPLACE FUNCTION search_images(search_term text, user_id_param text)
RETURNS TABLE (
    id integer,
    filename text,
    original_path text,
    thumbnail_path text,
    description text,
    tags jsonb,
    colors jsonb,
    uploaded_at timestamptz,
    rank real
)
LANGUAGE sql STABLE AS $$
    SELECT i.id,
           i.filename::text,
           i.original_path::text,
           i.thumbnail_path::text,
           m.description::text,
           m.tags,
           m.colors,
           i.uploaded_at,
           ts_rank(doc.document, plainto_tsquery('english', search_term)) AS rank
    FROM images i
    JOIN image_metadata m ON m.image_id = i.id
    CROSS JOIN LATERAL (
        SELECT to_tsvector(
            'english',
            coalesce(m.description, '') || ' ' ||
            coalesce((SELECT string_agg(t, ' ') FROM jsonb_array_elements_text(m.tags) AS t), '')
        ) AS document
    ) doc
    WHERE i.user_id = user_id_param
      AND (
          doc.document @@ plainto_tsquery('english', search_term)
          OR m.tags ?| regexp_split_to_array(btrim(search_term), '\s+')
      )
    ORDER BY rank DESC, i.uploaded_at DESC
$$"#,
    r#"CREATE OR REPLACE FUNCTION image_metadata_owner_check() RETURNS trigger
LANGUAGE plpgsql AS $$
BEGIN
    IF NOT EXISTS (SELECT 1 FROM images WHERE id = NEW.image_id AND user_id = NEW.user_id) THEN
        RAISE EXCEPTION 'image_metadata.user_id must match the owning image';
    END IF;
    RETURN NEW;
END
$$"#,
    "DROP TRIGGER IF EXISTS trg_image_metadata_owner ON image_metadata",
    "CREATE TRIGGER trg_image_metadata_owner BEFORE INSERT OR UPDATE OF image_id, user_id \
     ON image_metadata FOR EACH ROW EXECUTE FUNCTION image_metadata_owner_check()",
    r#"DO $$
BEGIN
    IF EXISTS (
        SELECT 1 FROM pg_proc p JOIN pg_namespace n ON n.oid = p.pronamespace
        WHERE n.nspname = 'auth' AND p.proname = 'uid'
    ) THEN
        ALTER TABLE images ENABLE ROW LEVEL SECURITY;
        ALTER TABLE image_metadata ENABLE ROW LEVEL SECURITY;
        DROP POLICY IF EXISTS images_owner ON images;
        CREATE POLICY images_owner ON images
            USING (user_id = auth.uid()::text) WITH CHECK (user_id = auth.uid()::text);
        DROP POLICY IF EXISTS image_metadata_owner ON image_metadata;
        CREATE POLICY image_metadata_owner ON image_metadata
            USING (user_id = auth.uid()::text) WITH CHECK (user_id = auth.uid()::text);
    END IF;
END
$$"#,
];

const POSTGRES_DOWN: &[&str] = &[
    "DROP POLICY IF EXISTS image_metadata_owner ON image_metadata",
    "DROP POLICY IF EXISTS images_owner ON images",
    "ALTER TABLE image_metadata DISABLE ROW LEVEL SECURITY",
    "ALTER TABLE images DISABLE ROW LEVEL SECURITY",
    "DROP TRIGGER IF EXISTS trg_image_metadata_owner ON image_metadata",
    "DROP FUNCTION IF EXISTS image_metadata_owner_check()",
    "DROP FUNCTION IF EXISTS search_images(text, text)",
    "DROP INDEX IF EXISTS idx_image_metadata_description_fts",
    "DROP INDEX IF EXISTS idx_image_metadata_colors",
    "DROP INDEX IF EXISTS idx_image_metadata_tags",
];

const SQLITE_UP: &[&str] = &[
    "CREATE TRIGGER IF NOT EXISTS trg_image_metadata_owner_insert \
     BEFORE INSERT ON image_metadata FOR EACH ROW \
     WHEN NOT EXISTS (SELECT 1 FROM images WHERE id = NEW.image_id AND user_id = NEW.user_id) \
     BEGIN SELECT RAISE(ABORT, 'image_metadata.user_id must match the owning image'); END",
    "CREATE TRIGGER IF NOT EXISTS trg_image_metadata_owner_update \
     BEFORE UPDATE OF image_id, user_id ON image_metadata FOR EACH ROW \
     WHEN NOT EXISTS (SELECT 1 FROM images WHERE id = NEW.image_id AND user_id = NEW.user_id) \
     BEGIN SELECT RAISE(ABORT, 'image_metadata.user_id must match the owning image'); END",
];

const SQLITE_DOWN: &[&str] = &[
    "DROP TRIGGER IF EXISTS trg_image_metadata_owner_update",
    "DROP TRIGGER IF EXISTS trg_image_metadata_owner_insert",
];

async fn run_all(manager: &SchemaManager<'_>, statements: &[&str]) -> Result<(), DbErr> {
    let db = manager.get_connection();
    for sql in statements {
        db.execute_unprepared(sql).await?;
    }
    Ok(())
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        match manager.get_database_backend() {
            DatabaseBackend::Postgres => run_all(manager, POSTGRES_UP).await,
            DatabaseBackend::Sqlite => run_all(manager, SQLITE_UP).await,
            DatabaseBackend::MySql => Err(DbErr::Migration(
                "MySQL is not supported by the gallery schema".to_string(),
            )),
        }
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        match manager.get_database_backend() {
            DatabaseBackend::Postgres => run_all(manager, POSTGRES_DOWN).await,
            DatabaseBackend::Sqlite => run_all(manager, SQLITE_DOWN).await,
            DatabaseBackend::MySql => Ok(()),
        }
    }
}
