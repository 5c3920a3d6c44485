//! CRUD helper for a single table

use crate::builder::{Criteria, Fields, Limit, QueryBuilder, Select};
use crate::error::Result;
use crate::mysql::Row;
use crate::traits::Executor;
use crate::value::Value;

/// Shortcuts for the trivial queries against one table.
///
/// Works with any [`Executor`]: a client, a tagged client or a
/// transaction.
///
/// # Example
///
/// ```ignore
/// let foobar = client.table("foobar", "id");
///
/// let id = foobar
///     .insert(&Fields::new().set("title", "Quux").set("ct", 1438168960))
///     .await?;
/// foobar.set(id, &Fields::new().set("title", "new title")).await?;
/// let row = foobar.get(id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Table<E> {
    executor: E,
    name: String,
    pk: String,
}

impl<E: Executor> Table<E> {
    pub fn new(executor: E, name: impl Into<String>, pk: impl Into<String>) -> Self {
        Self {
            executor,
            name: name.into(),
            pk: pk.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn primary_key(&self) -> &str {
        &self.pk
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Row by primary key.
    pub async fn get(&self, id: impl Into<Value>) -> Result<Option<Row>> {
        self.select_one(self.by_pk(id)).await
    }

    /// Update the row with this primary key. Returns the affected row count.
    pub async fn set(&self, id: impl Into<Value>, fields: &Fields) -> Result<u64> {
        self.update(&self.by_pk(id), fields).await
    }

    /// Delete the row with this primary key. Returns the affected row count.
    pub async fn rm(&self, id: impl Into<Value>) -> Result<u64> {
        self.delete(&self.by_pk(id)).await
    }

    pub async fn select(&self, select: &Select) -> Result<Vec<Row>> {
        let statement = QueryBuilder::new().select(&self.name, select);
        Ok(self.executor.execute(&statement).await?.into_rows())
    }

    /// First row matching `criteria`.
    pub async fn select_one(&self, criteria: Criteria) -> Result<Option<Row>> {
        let select = Select::new().filter(criteria).limit(Limit::new(1));
        Ok(self.select(&select).await?.into_iter().next())
    }

    /// Insert one row and return its generated id.
    pub async fn insert(&self, fields: &Fields) -> Result<Option<u64>> {
        let statement = QueryBuilder::new().insert(&self.name, fields)?;
        Ok(self.executor.execute(&statement).await?.inserted_id())
    }

    /// Insert several rows and return the id generated for the first.
    pub async fn insert_many<C: AsRef<str> + Sync>(
        &self,
        columns: &[C],
        rows: Vec<Vec<Value>>,
    ) -> Result<Option<u64>> {
        let statement = QueryBuilder::new().insert_many(&self.name, columns, rows)?;
        Ok(self.executor.execute(&statement).await?.inserted_id())
    }

    /// Returns the affected row count.
    pub async fn update(&self, criteria: &Criteria, fields: &Fields) -> Result<u64> {
        let statement = QueryBuilder::new().update(&self.name, fields, criteria)?;
        Ok(self.executor.execute(&statement).await?.affected_rows())
    }

    /// Returns the affected row count.
    pub async fn delete(&self, criteria: &Criteria) -> Result<u64> {
        let statement = QueryBuilder::new().delete(&self.name, criteria);
        Ok(self.executor.execute(&statement).await?.affected_rows())
    }

    fn by_pk(&self, id: impl Into<Value>) -> Criteria {
        Criteria::new().eq(self.pk.as_str(), id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::mysql::AsyncResult;
    use crate::query::{substitute, Params};
    use crate::result::QueryResult;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Records the final SQL instead of talking to a server.
    #[derive(Default)]
    struct Recorder {
        sql: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.sql.lock().unwrap())
        }
    }

    #[async_trait]
    impl Executor for Recorder {
        async fn query(&self, sql: &str, params: &Params) -> Result<QueryResult> {
            let sql = substitute(sql, params)?;
            self.sql.lock().unwrap().push(sql.clone());
            let columns: Arc<[String]> = vec!["id".to_string()].into();
            let rows = vec![Row::new(columns, vec![Some("3".to_string())])];
            Ok(QueryResult::new(sql, rows, 1, Some(7)))
        }

        async fn async_query(&self, sql: &str, _params: &Params) -> Result<AsyncResult> {
            Err(Error::query(sql, "not supported"))
        }
    }

    #[tokio::test]
    async fn test_primary_key_shortcuts() {
        let recorder = Recorder::default();
        let table = Table::new(&recorder, "foobar", "id");

        let row = table.get(3).await.unwrap().unwrap();
        assert_eq!(row.get::<u32>("id").unwrap(), 3);
        table.set(3, &Fields::new().set("title", "new title")).await.unwrap();
        table.rm(3).await.unwrap();

        assert_eq!(
            recorder.take(),
            vec![
                "select * from `foobar` where `id` = 3 limit 1",
                "update `foobar` set `title` = 'new title' where `id` = 3",
                "delete from `foobar` where `id` = 3",
            ]
        );
    }

    #[tokio::test]
    async fn test_insert_returns_generated_id() {
        let recorder = Recorder::default();
        let table = Table::new(&recorder, "foobar", "id");

        let id = table
            .insert(&Fields::new().set("title", "Quux").set("ct", 1438168960))
            .await
            .unwrap();
        assert_eq!(id, Some(7));

        let first = table
            .insert_many(
                &["title", "ct"],
                vec![
                    vec!["qux".into(), 1.into()],
                    vec!["quux".into(), 2.into()],
                ],
            )
            .await
            .unwrap();
        assert_eq!(first, Some(7));

        assert_eq!(
            recorder.take(),
            vec![
                "insert into `foobar` set `title` = 'Quux', `ct` = 1438168960",
                "insert into `foobar` (`title`, `ct`) values ('qux', 1), ('quux', 2)",
            ]
        );
    }

    #[tokio::test]
    async fn test_select_with_custom_key() {
        let recorder = Recorder::default();
        let table = Table::new(&recorder, "users", "user_id");
        assert_eq!(table.primary_key(), "user_id");

        let affected = table
            .update(&Criteria::new().gt("age", 17), &Fields::new().set("adult", true))
            .await
            .unwrap();
        assert_eq!(affected, 1);
        table.get("alice").await.unwrap();

        assert_eq!(
            recorder.take(),
            vec![
                "update `users` set `adult` = true where `age` > 17",
                "select * from `users` where `user_id` = 'alice' limit 1",
            ]
        );
    }
}
