//! The live-schema loader contract (§4.4): the narrow capability the core
//! depends on to ingest the current state of a database, without knowing
//! anything about how that introspection actually happens.

use async_trait::async_trait;

use crate::model::DatabaseModel;

/// Returns the current schema of a namespace as a [`DatabaseModel`].
///
/// Implementors normalize vendor metadata into the canonical lattice before
/// returning: `int`/`bigint`/`bit`/`datetime`/`datetime2`/`date`/`time` lose
/// their precision, `money`/`smallmoney` become fixed-precision `decimal`,
/// and `text`/`ntext` become `(n)varchar(max)` (§4.4). The core trusts that
/// this normalization has already happened; it performs none of its own.
#[async_trait]
pub trait SchemaLoader: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn load(&self, schema: &str) -> Result<DatabaseModel, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TableModel;
    use crate::test_support::{int_pk, nvarchar, single_table_model, FakeSchemaLoader};

    #[tokio::test]
    async fn fake_loader_hands_back_its_canned_model_verbatim() {
        let mut user = TableModel::new("User");
        user.fields.push(int_pk("User"));
        user.fields.push(nvarchar("Username", 100));
        let loader = FakeSchemaLoader::new(single_table_model(user));

        let loaded = loader.load("dbo").await.expect("fake loader never fails");
        assert_eq!(loaded.table_count(), 1);
        assert!(loaded.table("User").unwrap().field("Username").is_some());
    }

    #[tokio::test]
    async fn empty_fake_loader_round_trips_an_empty_model() {
        let loaded = FakeSchemaLoader::empty().load("dbo").await.unwrap();
        assert_eq!(loaded.table_count(), 0);
    }
}
