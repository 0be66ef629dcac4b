mod common;

use async_trait::async_trait;
use bson::{Bson, Document};
use docmodel::{memory::InMemoryStore, prelude::*};

use common::Example;

/// A backend whose store never answers.
#[derive(Debug)]
struct UnreachableStore;

fn unreachable() -> DocumentStoreError {
    DocumentStoreError::Backend("connection refused".into())
}

#[async_trait]
impl StoreBackend for UnreachableStore {
    async fn ping(&self) -> DocumentStoreResult<()> {
        Err(unreachable())
    }

    async fn insert_one(&self, _: &str, _: Document) -> DocumentStoreResult<Bson> {
        Err(unreachable())
    }

    async fn find_one(&self, _: &str, _: &Expr) -> DocumentStoreResult<Option<Document>> {
        Err(unreachable())
    }

    async fn find(&self, _: &str, _: &Expr) -> DocumentStoreResult<Box<dyn DocumentCursor>> {
        Err(unreachable())
    }

    async fn update_one(&self, _: &str, _: &Expr, _: Document) -> DocumentStoreResult<UpdateOutcome> {
        Err(unreachable())
    }

    async fn update_many(&self, _: &str, _: &Expr, _: Document) -> DocumentStoreResult<UpdateOutcome> {
        Err(unreachable())
    }

    async fn delete_one(&self, _: &str, _: &Expr) -> DocumentStoreResult<u64> {
        Err(unreachable())
    }

    async fn delete_many(&self, _: &str, _: &Expr) -> DocumentStoreResult<u64> {
        Err(unreachable())
    }
}

#[tokio::test]
async fn binding_requires_a_live_store() {
    let err = StoreHandle::bind(Example::NAME, UnreachableStore)
        .await
        .unwrap_err();

    match err {
        ModelError::Connection(message) => assert!(message.contains("Example"), "{message}"),
        other => panic!("expected a connection error, got {other:?}"),
    }
}

#[tokio::test]
async fn invalid_definitions_are_rejected_at_define_time() {
    struct Nameless;

    impl ModelDefinition for Nameless {
        const NAME: &'static str = "Nameless";

        fn collection_name() -> &'static str {
            ""
        }

        fn fields() -> Vec<FieldSpec> {
            vec![FieldSpec::new("foo", false)]
        }
    }

    struct Repeated;

    impl ModelDefinition for Repeated {
        const NAME: &'static str = "Repeated";

        fn collection_name() -> &'static str {
            "repeated"
        }

        fn fields() -> Vec<FieldSpec> {
            vec![FieldSpec::new("foo", false), FieldSpec::new("foo", true)]
        }
    }

    let store = StoreHandle::bind("Test", InMemoryStore::new()).await.unwrap();

    assert!(matches!(
        Model::define::<Nameless>(store.clone()),
        Err(ModelError::Schema(SchemaError::MissingCollection))
    ));
    assert!(matches!(
        Model::define::<Repeated>(store),
        Err(ModelError::Schema(SchemaError::DuplicateField(ref name))) if name == "foo"
    ));
}

#[tokio::test]
async fn models_share_one_store() {
    let store = StoreHandle::bind("Shared", InMemoryStore::new()).await.unwrap();

    let example = Model::define::<Example>(store.clone()).unwrap();
    let other = Model::new(
        "Other",
        Schema::builder("other").unique_field("bar").build().unwrap(),
        store.clone(),
    );

    // Same field name, different collections: separate registries.
    example.create(bson::doc! { "bar": "v" }).await.unwrap();
    other.create(bson::doc! { "bar": "v" }).await.unwrap();

    store.ping().await.unwrap();
    store.shutdown().await.unwrap();
}

#[test]
fn configuration_names_the_database_after_the_model() {
    let config = StoreConfig::from_yaml_str("host: localhost\nport: 27017\n").unwrap();
    let settings = config.resolve(Example::NAME).unwrap();

    assert_eq!(settings.database, "example");
    assert_eq!(settings.port, 27017);
}
