#![allow(dead_code)]

use docmodel::{memory::InMemoryStore, prelude::*};

/// `example` collection: `foo` plain, `bar` unique.
pub struct Example;

impl ModelDefinition for Example {
    const NAME: &'static str = "Example";

    fn collection_name() -> &'static str {
        "example"
    }

    fn fields() -> Vec<FieldSpec> {
        vec![FieldSpec::new("foo", false), FieldSpec::new("bar", true)]
    }
}

/// A bound `Example` model and the backend behind it.
pub async fn example_model() -> (Model, InMemoryStore) {
    let backend = InMemoryStore::new();
    let store = StoreHandle::bind(Example::NAME, backend.clone())
        .await
        .unwrap();

    (Model::define::<Example>(store).unwrap(), backend)
}

/// `account` collection: `name` plain, then `email`, `handle` and `phone` unique.
pub struct Account;

impl ModelDefinition for Account {
    const NAME: &'static str = "Account";

    fn collection_name() -> &'static str {
        "account"
    }

    fn fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::new("name", false),
            FieldSpec::new("email", true),
            FieldSpec::new("handle", true),
            FieldSpec::new("phone", true),
        ]
    }
}

pub async fn account_model() -> (Model, InMemoryStore) {
    let backend = InMemoryStore::new();
    let store = StoreHandle::bind(Account::NAME, backend.clone())
        .await
        .unwrap();

    (Model::define::<Account>(store).unwrap(), backend)
}
