mod common;

use bson::{Bson, Uuid, doc};
use docmodel::prelude::*;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use common::example_model;

#[tokio::test]
async fn create_update_destroy_roundtrip() {
    let (model, _) = example_model().await;

    let created = model
        .create(doc! { "foo": "Foo", "bar": "Bar1" })
        .await
        .unwrap();
    let id1 = created.identity().unwrap();

    match model.create(doc! { "foo": "X", "bar": "Bar1" }).await {
        Err(ModelError::DuplicateValue { field, value }) => {
            assert_eq!(field, "bar");
            assert_eq!(value, Bson::String("Bar1".into()));
        }
        other => panic!("expected a duplicate value error, got {other:?}"),
    }

    let outcome = model
        .update_one(&Filter::id(id1), doc! { "foo": "Foo2" })
        .await
        .unwrap();
    assert_eq!(outcome, UpdateOutcome { matched: 1, modified: 1 });

    let read = model.read_one(&Filter::id(id1)).await.unwrap().unwrap();
    assert_eq!(read.get_as::<String>("foo").unwrap().as_deref(), Some("Foo2"));
    assert_eq!(read.get_as::<String>("bar").unwrap().as_deref(), Some("Bar1"));

    assert_eq!(model.destroy(&Filter::id(id1)).await.unwrap(), 1);
    assert!(model.read_one(&Filter::id(id1)).await.unwrap().is_none());
}

#[tokio::test]
async fn losing_create_leaves_no_document() {
    let (model, _) = example_model().await;

    model.create(doc! { "foo": "first", "bar": "B" }).await.unwrap();
    let err = model
        .create(doc! { "foo": "second", "bar": "B" })
        .await
        .unwrap_err();

    assert!(err.is_duplicate_of("bar"));
    assert!(
        model
            .read_one(&Filter::eq("foo", "second"))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn read_one_returns_created_values() {
    let (model, _) = example_model().await;
    let values = doc! { "foo": "Foo", "bar": "Bar" };

    let created = model.create(values.clone()).await.unwrap();
    let read = model
        .read_one(&Filter::id(created.identity().unwrap()))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(read.values(), &values);
    assert_eq!(read.identity(), created.identity());
    assert_eq!(read.state(), InstanceState::Persisted);
}

#[tokio::test]
async fn missing_fields_are_stored_as_null() {
    let (model, backend) = example_model().await;

    let created = model.create(doc! { "foo": "only" }).await.unwrap();
    let raw = model
        .raw_collection()
        .find_one(&Filter::id(created.identity().unwrap()))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(raw.get("bar"), Some(&Bson::Null));
    // No unique value, so no reservation.
    assert_eq!(backend.collection_names().await, vec!["example"]);
}

#[tokio::test]
async fn unknown_keys_are_rejected() {
    let (model, backend) = example_model().await;

    let err = model.instance(doc! { "foo": 1, "baz": 2 }).unwrap_err();
    assert!(matches!(
        err,
        ModelError::Schema(SchemaError::UnknownField(ref field, _)) if field == "baz"
    ));

    let err = model.create(doc! { "baz": 2 }).await.unwrap_err();
    assert!(matches!(err, ModelError::Schema(_)));

    let err = model
        .update_many(&Filter::all(), doc! { "_id": Uuid::new() })
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::Schema(_)));

    assert_eq!(backend.count("example").await, 0);
}

#[tokio::test]
async fn read_all_batches_and_repeats() {
    let (model, _) = example_model().await;
    for n in 0..5 {
        model
            .create(doc! { "foo": "batch", "bar": format!("b{n}") })
            .await
            .unwrap();
    }
    model.create(doc! { "foo": "other" }).await.unwrap();

    let mut reader = model.read_all(Filter::eq("foo", "batch"), 2);
    let mut sizes = Vec::new();
    while let Some(batch) = reader.next_batch().await.unwrap() {
        sizes.push(batch.len());
    }
    assert_eq!(sizes, vec![2, 2, 1]);
    assert!(reader.next_batch().await.unwrap().is_none());

    let ids = |instances: Vec<ModelInstance>| {
        let mut ids = instances
            .iter()
            .map(|i| i.identity().unwrap().to_string())
            .collect::<Vec<_>>();
        ids.sort();
        ids
    };

    let first = model
        .read_all(Filter::eq("foo", "batch"), 2)
        .try_collect()
        .await
        .unwrap();
    let second = model
        .read_all(Filter::eq("foo", "batch"), 4)
        .into_stream()
        .try_collect::<Vec<_>>()
        .await
        .unwrap();

    assert_eq!(first.len(), 5);
    assert_eq!(ids(first), ids(second));
}

#[tokio::test]
async fn zero_page_size_reads_one_at_a_time() {
    let (model, _) = example_model().await;
    model.create(doc! { "foo": "a" }).await.unwrap();
    model.create(doc! { "foo": "b" }).await.unwrap();

    let mut reader = model.read_all(Filter::all(), 0);
    assert_eq!(reader.page_size(), 1);
    assert_eq!(reader.next_batch().await.unwrap().map(|b| b.len()), Some(1));
    assert_eq!(reader.next_batch().await.unwrap().map(|b| b.len()), Some(1));
    assert!(reader.next_batch().await.unwrap().is_none());
}

#[tokio::test]
async fn save_creates_then_writes_back() {
    let (model, _) = example_model().await;

    let mut instance = model.instance(doc! { "foo": "Foo", "bar": "Bar" }).unwrap();
    assert_eq!(instance.state(), InstanceState::Unpersisted);
    assert!(instance.identity().is_none());

    instance.save().await.unwrap();
    let id = instance.identity().unwrap();
    assert_eq!(instance.state(), InstanceState::Persisted);

    instance.set("foo", "changed").unwrap();
    instance.save().await.unwrap();

    let read = model.read_one(&Filter::id(id)).await.unwrap().unwrap();
    assert_eq!(read.get("foo"), Some(&Bson::String("changed".into())));
    assert_eq!(read.get("bar"), Some(&Bson::String("Bar".into())));
}

#[tokio::test]
async fn update_of_unsaved_instance_is_not_found() {
    let (model, _) = example_model().await;

    let mut unsaved = model.instance(doc! { "foo": "Foo" }).unwrap();
    let err = unsaved.update(doc! { "foo": "x" }).await.unwrap_err();
    assert!(matches!(err, ModelError::NotFound(_)));

    let mut orphan = model
        .instance(doc! { "_id": Uuid::new(), "foo": "Foo" })
        .unwrap();
    assert_eq!(orphan.state(), InstanceState::Persisted);
    let err = orphan.update(doc! { "foo": "x" }).await.unwrap_err();
    assert!(matches!(err, ModelError::NotFound(_)));
}

#[tokio::test]
async fn instance_update_merges_values() {
    let (model, _) = example_model().await;
    let mut instance = model.create(doc! { "foo": "Foo", "bar": "Bar" }).await.unwrap();

    let outcome = instance.update(doc! { "foo": "Foo2" }).await.unwrap();

    assert_eq!(outcome.matched, 1);
    assert_eq!(instance.get("foo"), Some(&Bson::String("Foo2".into())));
    assert_eq!(instance.get("bar"), Some(&Bson::String("Bar".into())));
}

#[tokio::test]
async fn deleted_instances_refuse_further_operations() {
    let (model, backend) = example_model().await;
    let mut instance = model.create(doc! { "foo": "Foo", "bar": "Bar" }).await.unwrap();

    instance.delete().await.unwrap();
    assert_eq!(instance.state(), InstanceState::Deleted);
    assert_eq!(backend.count("example").await, 0);

    assert!(matches!(instance.save().await, Err(ModelError::Deleted)));
    assert!(matches!(instance.set("foo", "x"), Err(ModelError::Deleted)));
    assert!(matches!(
        instance.update(doc! { "foo": "x" }).await,
        Err(ModelError::Deleted)
    ));
    assert!(matches!(instance.delete().await, Err(ModelError::Deleted)));
}

#[tokio::test]
async fn delete_requires_unchanged_document() {
    let (model, backend) = example_model().await;
    let mut instance = model.create(doc! { "foo": "Foo", "bar": "Bar" }).await.unwrap();
    let id = instance.identity().unwrap();

    model
        .update_one(&Filter::id(id), doc! { "foo": "elsewhere" })
        .await
        .unwrap();

    let err = instance.delete().await.unwrap_err();
    assert!(matches!(err, ModelError::NotFound(_)));
    assert_eq!(instance.state(), InstanceState::Deleted);
    assert_eq!(backend.count("example").await, 1);
}

#[tokio::test]
async fn destroy_many_and_counts() {
    let (model, _) = example_model().await;
    for foo in ["a", "a", "b"] {
        model.create(doc! { "foo": foo }).await.unwrap();
    }

    assert_eq!(model.destroy(&Filter::eq("foo", "a")).await.unwrap(), 1);
    assert_eq!(model.destroy_many(&Filter::all()).await.unwrap(), 2);
    assert_eq!(model.destroy(&Filter::all()).await.unwrap(), 0);
}

#[tokio::test]
async fn typed_values_in_and_out() {
    #[derive(Serialize)]
    struct NewExample {
        foo: String,
        bar: Option<String>,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct StoredExample {
        #[serde(rename = "_id")]
        id: Uuid,
        foo: String,
        bar: Option<String>,
    }

    let (model, _) = example_model().await;
    let created = model
        .create_from(&NewExample { foo: "Foo".into(), bar: None })
        .await
        .unwrap();

    let stored: StoredExample = created.deserialize().unwrap();
    assert_eq!(
        stored,
        StoredExample {
            id: created.identity().unwrap(),
            foo: "Foo".into(),
            bar: None,
        }
    );
}
