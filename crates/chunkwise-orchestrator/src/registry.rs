use std::collections::{HashMap, HashSet};

use chunkwise_common::{ChunkSummary, Error, MigrationChunk, Result};

/// A named migration: its ordered chunks plus the hand-written script that
/// reverses all of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationDef {
    pub name: String,
    pub chunks: Vec<MigrationChunk>,
    pub rollback_sql: Option<String>,
    pub expected_tables: Vec<String>,
}

impl MigrationDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chunks: Vec::new(),
            rollback_sql: None,
            expected_tables: Vec::new(),
        }
    }

    pub fn chunk(
        mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        sql: impl Into<String>,
    ) -> Self {
        self.chunks.push(MigrationChunk::new(id, name, sql));
        self
    }

    pub fn rollback(mut self, sql: impl Into<String>) -> Self {
        self.rollback_sql = Some(sql.into());
        self
    }

    pub fn expected_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected_tables = tables.into_iter().map(Into::into).collect();
        self
    }

    fn check(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Config("migration name cannot be empty".into()));
        }
        if self.chunks.is_empty() {
            return Err(Error::Config(format!("migration {} has no chunks", self.name)));
        }
        let mut seen = HashSet::new();
        for chunk in &self.chunks {
            if !seen.insert(chunk.id.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate chunk id {} in migration {}",
                    chunk.id, self.name
                )));
            }
        }
        Ok(())
    }
}

/// Immutable set of migrations known to this deployment.
#[derive(Debug, Clone, Default)]
pub struct ChunkRegistry {
    migrations: Vec<MigrationDef>,
    by_name: HashMap<String, usize>,
}

impl ChunkRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Registry holding only the migrations that ship with the binary.
    pub fn builtin() -> Self {
        RegistryBuilder::with_builtins().build()
    }

    pub fn migration(&self, name: &str) -> Result<&MigrationDef> {
        self.by_name
            .get(name)
            .map(|&idx| &self.migrations[idx])
            .ok_or_else(|| Error::UnknownMigration(name.to_string()))
    }

    /// Chunks of `name` in execution order.
    pub fn chunks_for(&self, name: &str) -> Result<&[MigrationChunk]> {
        Ok(&self.migration(name)?.chunks)
    }

    pub fn chunk_for(&self, name: &str, chunk_id: &str) -> Result<&MigrationChunk> {
        self.chunks_for(name)?
            .iter()
            .find(|c| c.id == chunk_id)
            .ok_or_else(|| Error::UnknownChunk {
                migration: name.to_string(),
                chunk: chunk_id.to_string(),
            })
    }

    pub fn summaries(&self, name: &str) -> Result<Vec<ChunkSummary>> {
        Ok(self.chunks_for(name)?.iter().map(MigrationChunk::summary).collect())
    }

    pub fn rollback_sql(&self, name: &str) -> Result<Option<&str>> {
        Ok(self.migration(name)?.rollback_sql.as_deref())
    }

    pub fn expected_tables(&self, name: &str) -> Result<&[String]> {
        Ok(&self.migration(name)?.expected_tables)
    }

    /// Names in registration order.
    pub fn migration_names(&self) -> Vec<&str> {
        self.migrations.iter().map(|m| m.name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    migrations: Vec<MigrationDef>,
}

impl RegistryBuilder {
    pub fn with_builtins() -> Self {
        Self {
            migrations: crate::builtin::migrations(),
        }
    }

    pub fn register(&mut self, def: MigrationDef) -> Result<()> {
        def.check()?;
        if self.migrations.iter().any(|m| m.name == def.name) {
            return Err(Error::Config(format!(
                "migration {} is already registered",
                def.name
            )));
        }
        self.migrations.push(def);
        Ok(())
    }

    pub fn build(self) -> ChunkRegistry {
        let by_name = self
            .migrations
            .iter()
            .enumerate()
            .map(|(idx, m)| (m.name.clone(), idx))
            .collect();
        ChunkRegistry {
            migrations: self.migrations,
            by_name,
        }
    }
}
