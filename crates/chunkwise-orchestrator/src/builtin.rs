//! Migrations compiled into the binary.
//!
//! Every chunk guards its DDL with `IF NOT EXISTS` so an operator can re-run
//! it after a partial failure. The orchestrator itself does not check this.

use crate::registry::MigrationDef;

pub const INSTAGRAM_SCRAPER_SCHEMA: &str = "instagram_scraper_schema";

pub const INSTAGRAM_TABLES: [&str; 4] = [
    "instagram_hashtags",
    "instagram_posts",
    "instagram_post_hashtags",
    "instagram_scrape_jobs",
];

pub(crate) fn migrations() -> Vec<MigrationDef> {
    vec![instagram_scraper_schema()]
}

fn instagram_scraper_schema() -> MigrationDef {
    MigrationDef::new(INSTAGRAM_SCRAPER_SCHEMA)
        .chunk(
            "hashtags",
            "Create hashtags table",
            "CREATE TABLE IF NOT EXISTS instagram_hashtags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                post_count INTEGER NOT NULL DEFAULT 0,
                last_scraped_at TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
        .chunk(
            "posts",
            "Create posts table",
            "CREATE TABLE IF NOT EXISTS instagram_posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                shortcode TEXT NOT NULL UNIQUE,
                owner_username TEXT,
                caption TEXT,
                media_url TEXT,
                like_count INTEGER NOT NULL DEFAULT 0,
                comment_count INTEGER NOT NULL DEFAULT 0,
                posted_at TEXT,
                scraped_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
        .chunk(
            "post_hashtags",
            "Create post/hashtag link table",
            "CREATE TABLE IF NOT EXISTS instagram_post_hashtags (
                post_id INTEGER NOT NULL REFERENCES instagram_posts(id) ON DELETE CASCADE,
                hashtag_id INTEGER NOT NULL REFERENCES instagram_hashtags(id) ON DELETE CASCADE,
                PRIMARY KEY (post_id, hashtag_id)
            );",
        )
        .chunk(
            "scrape_jobs",
            "Create scrape jobs table",
            "CREATE TABLE IF NOT EXISTS instagram_scrape_jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                keyword TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending'
                    CHECK (status IN ('pending', 'running', 'completed', 'failed')),
                posts_found INTEGER NOT NULL DEFAULT 0,
                error_message TEXT,
                started_at TEXT,
                finished_at TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
        .chunk(
            "indexes",
            "Create lookup indexes",
            "CREATE INDEX IF NOT EXISTS idx_instagram_posts_owner
                ON instagram_posts(owner_username);
            CREATE INDEX IF NOT EXISTS idx_instagram_posts_posted_at
                ON instagram_posts(posted_at);
            CREATE INDEX IF NOT EXISTS idx_instagram_post_hashtags_hashtag
                ON instagram_post_hashtags(hashtag_id);
            CREATE INDEX IF NOT EXISTS idx_instagram_scrape_jobs_status
                ON instagram_scrape_jobs(status, created_at);",
        )
        .chunk(
            "triggers",
            "Create updated_at trigger",
            "CREATE TRIGGER IF NOT EXISTS trg_instagram_hashtags_updated_at
                AFTER UPDATE ON instagram_hashtags
                FOR EACH ROW WHEN NEW.updated_at = OLD.updated_at
            BEGIN
                UPDATE instagram_hashtags SET updated_at = datetime('now') WHERE id = NEW.id;
            END;",
        )
        .rollback(
            "DROP TRIGGER IF EXISTS trg_instagram_hashtags_updated_at;
            DROP INDEX IF EXISTS idx_instagram_scrape_jobs_status;
            DROP INDEX IF EXISTS idx_instagram_post_hashtags_hashtag;
            DROP INDEX IF EXISTS idx_instagram_posts_posted_at;
            DROP INDEX IF EXISTS idx_instagram_posts_owner;
            DROP TABLE IF EXISTS instagram_scrape_jobs;
            DROP TABLE IF EXISTS instagram_post_hashtags;
            DROP TABLE IF EXISTS instagram_posts;
            DROP TABLE IF EXISTS instagram_hashtags;",
        )
        .expected_tables(INSTAGRAM_TABLES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ChunkRegistry;
    use chunkwise_common::SqlExecutor;
    use chunkwise_db::{ExecutorOptions, SqliteExecutor};

    #[test]
    fn builtin_registry_is_well_formed() {
        let registry = ChunkRegistry::builtin();
        let chunks = registry.chunks_for(INSTAGRAM_SCRAPER_SCHEMA).unwrap();
        assert_eq!(chunks.len(), 6);
        assert_eq!(chunks[0].id, "hashtags");
        assert!(registry.rollback_sql(INSTAGRAM_SCRAPER_SCHEMA).unwrap().is_some());
        assert_eq!(
            registry.expected_tables(INSTAGRAM_SCRAPER_SCHEMA).unwrap().len(),
            INSTAGRAM_TABLES.len()
        );
    }

    #[tokio::test]
    async fn builtin_chunks_apply_twice_and_roll_back_on_sqlite() {
        let exec = SqliteExecutor::in_memory(ExecutorOptions::default()).unwrap();
        let registry = ChunkRegistry::builtin();
        let def = registry.migration(INSTAGRAM_SCRAPER_SCHEMA).unwrap();

        for _ in 0..2 {
            for chunk in &def.chunks {
                exec.execute(&chunk.sql)
                    .await
                    .unwrap_or_else(|e| panic!("chunk {} failed: {e}", chunk.id));
            }
        }

        let rollback = def.rollback_sql.as_deref().unwrap();
        exec.execute(rollback).await.unwrap();
        exec.execute(rollback).await.unwrap();
    }
}
