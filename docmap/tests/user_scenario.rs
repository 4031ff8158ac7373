mod common;

use bson::{Bson, doc};
use docmap::prelude::*;

use common::memory_connection;

fn address_schema() -> Schema {
    Schema::new()
        .field("street", FieldRule::new(FieldKind::String).required())
        .field("zip_code", FieldRule::new(FieldKind::String).required())
}

fn user_schema() -> Schema {
    Schema::new()
        .field("first_name", FieldRule::new(FieldKind::String).required())
        .field("last_name", FieldRule::new(FieldKind::String).required())
        .field(
            "email_address",
            FieldRule::new(FieldKind::Array)
                .required()
                .validator(|value| match value {
                    Bson::Array(items) => items.iter().all(|item| matches!(item, Bson::String(_))),
                    _ => false,
                }),
        )
        .field(
            "street_addresses",
            FieldRule::new(FieldKind::Array)
                .required()
                .schema(address_schema())
                .elements_match_schema(),
        )
}

fn set_first_street(record: &mut Record, street: &str) {
    if let Some(Bson::Array(addresses)) = record.get_mut("street_addresses")
        && let Some(Bson::Document(first)) = addresses.first_mut()
    {
        first.insert("street", street);
    }
}

#[tokio::test]
async fn test_user_round_trip() {
    let (connection, connector) = memory_connection().await;
    let users = connection
        .declare("User", Some("users"), Some(user_schema()))
        .await
        .unwrap();

    let mut user = users
        .create(doc! {
            "first_name": "Evan",
            "last_name": "Svensson",
            "email_address": ["nisse@email.com", "nils.svensson@email.com"],
            "street_addresses": [
                { "street": "Storgatan 1", "zip_code": "12345" },
                { "street": "Storgatan 2", "zip_code": "12345" },
            ],
        })
        .unwrap();

    user.save().await.unwrap();

    let mut fetched = users
        .find([("first_name", "Evan")])
        .await
        .unwrap()
        .into_first()
        .unwrap();

    assert_eq!(fetched.id(), user.id());
    assert!(fetched.is_saved().await.unwrap());

    set_first_street(&mut fetched, "Storgatan 3");

    assert_eq!(
        fetched.changed_fields().await.unwrap(),
        vec!["street_addresses".to_string()]
    );

    fetched.save().await.unwrap();
    assert_eq!(connector.mutations(), 2);

    let stored = users.find_by_id(user.id().unwrap()).await.unwrap().unwrap();

    assert_eq!(
        stored["street_addresses"],
        Bson::from(vec![
            Bson::Document(doc! { "street": "Storgatan 3", "zip_code": "12345" }),
            Bson::Document(doc! { "street": "Storgatan 2", "zip_code": "12345" }),
        ])
    );
    assert_eq!(stored.get_str("first_name"), Some("Evan"));
    assert_eq!(stored.get_str("last_name"), Some("Svensson"));
    assert_eq!(stored["email_address"], user["email_address"]);
}

#[tokio::test]
async fn test_user_validators_reject_bad_nested_values() {
    let (connection, connector) = memory_connection().await;
    let users = connection
        .declare("User", Some("users"), Some(user_schema()))
        .await
        .unwrap();

    let mut bad_email = users
        .create(doc! {
            "first_name": "Evan",
            "last_name": "Svensson",
            "email_address": ["nisse@email.com", 42],
            "street_addresses": [],
        })
        .unwrap();

    assert!(matches!(
        bad_email.save().await,
        Err(DocumentStoreError::Field(FieldError::Invalid { ref field })) if field == "email_address"
    ));

    let mut bad_address = users
        .create(doc! {
            "first_name": "Evan",
            "last_name": "Svensson",
            "email_address": ["nisse@email.com"],
            "street_addresses": [{ "street": "Storgatan 1" }],
        })
        .unwrap();

    assert!(matches!(
        bad_address.save().await,
        Err(DocumentStoreError::Field(FieldError::Invalid { ref field })) if field == "street_addresses"
    ));

    assert_eq!(connector.mutations(), 0);
}
