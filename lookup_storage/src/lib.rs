#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

//! Durable [`UserStore`] backed by sea-orm.
//!
//! Each structure the engine reads and writes is kept as one JSON document
//! in the `bot_documents` table:
//! - `delegates`, `banned`, `known_users`: user id sets
//! - `subscriptions`: user id -> subscription record
//! - `counters`: aggregate and per-day lookup counters
//! - `flags`: maintenance switch
//! - `history:<user id>`: per-user lookup history

pub mod entity;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use lookup_core::{BotFlags, Counters, HistoryEntry, Subscription, UserId, UserSet, UserStore};
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema,
    Set,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

use crate::entity::documents;

const SUBSCRIPTIONS_KEY: &str = "subscriptions";
const COUNTERS_KEY: &str = "counters";
const FLAGS_KEY: &str = "flags";

const fn set_key(set: UserSet) -> &'static str {
    match set {
        UserSet::Delegates => "delegates",
        UserSet::Banned => "banned",
        UserSet::Known => "known_users",
    }
}

fn history_key(user: &UserId) -> String {
    format!("history:{user}")
}

fn is_table_already_exists_error(err: &DbErr) -> bool {
    err.to_string().contains("already exists")
}

pub struct DocumentStore {
    db: DatabaseConnection,
}

impl DocumentStore {
    /// Connect and make sure the document table exists.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        info!("Connecting to document store");
        let db = Database::connect(database_url).await?;

        let backend = db.get_database_backend();
        let schema = Schema::new(backend);
        let mut stmt = schema.create_table_from_entity(documents::Entity);
        stmt.if_not_exists();
        match db
            .execute_unprepared(&backend.build(&stmt).to_string())
            .await
        {
            Ok(_) => {}
            Err(e) if is_table_already_exists_error(&e) => {
                info!("Table already exists, skipping creation");
            }
            Err(e) => return Err(e.into()),
        }

        info!("DocumentStore initialized");
        Ok(Self { db })
    }

    /// Get a reference to the database connection.
    #[must_use]
    pub const fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn load<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: DeserializeOwned + Default,
    {
        let Some(model) = documents::Entity::find_by_id(key.to_owned())
            .one(&self.db)
            .await?
        else {
            return Ok(T::default());
        };
        serde_json::from_str(&model.body)
            .with_context(|| format!("Corrupt document {key:?} in bot_documents"))
    }

    async fn save<T>(&self, key: &str, value: &T) -> anyhow::Result<()>
    where
        T: Serialize + Sync,
    {
        let body = serde_json::to_string(value)?;
        let now = Utc::now();

        let exists = documents::Entity::find_by_id(key.to_owned())
            .one(&self.db)
            .await?
            .is_some();

        let model = documents::ActiveModel {
            doc_key: Set(key.to_owned()),
            body: Set(body),
            updated_at: Set(now),
        };
        if exists {
            model.update(&self.db).await?;
        } else {
            model.insert(&self.db).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for DocumentStore {
    async fn get_user_set(&self, set: UserSet) -> anyhow::Result<BTreeSet<UserId>> {
        self.load(set_key(set)).await
    }

    async fn set_user_set(&self, set: UserSet, users: &BTreeSet<UserId>) -> anyhow::Result<()> {
        self.save(set_key(set), users).await
    }

    async fn get_subscriptions(&self) -> anyhow::Result<BTreeMap<UserId, Subscription>> {
        self.load(SUBSCRIPTIONS_KEY).await
    }

    async fn set_subscriptions(
        &self,
        subscriptions: &BTreeMap<UserId, Subscription>,
    ) -> anyhow::Result<()> {
        self.save(SUBSCRIPTIONS_KEY, subscriptions).await
    }

    async fn get_counters(&self) -> anyhow::Result<Counters> {
        self.load(COUNTERS_KEY).await
    }

    async fn set_counters(&self, counters: &Counters) -> anyhow::Result<()> {
        self.save(COUNTERS_KEY, counters).await
    }

    async fn get_history(&self, user: &UserId) -> anyhow::Result<Vec<HistoryEntry>> {
        self.load(&history_key(user)).await
    }

    async fn set_history(&self, user: &UserId, entries: &[HistoryEntry]) -> anyhow::Result<()> {
        self.save(&history_key(user), &entries).await
    }

    async fn get_flags(&self) -> anyhow::Result<BotFlags> {
        self.load(FLAGS_KEY).await
    }

    async fn set_flags(&self, flags: &BotFlags) -> anyhow::Result<()> {
        self.save(FLAGS_KEY, flags).await
    }
}
