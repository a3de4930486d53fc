mod common;

use common::{CannedClient, FailingClient, RecordingClient};
use kvmap_store::{
    Batch, Command, Expiry, KeyValueClient, MemoryStore, ModelError, Reply, SaveOptions,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn sorted(value: &Value) -> Vec<String> {
    let mut items: Vec<String> = value
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    items.sort();
    items
}

// ── Definition ───────────────────────────────────────────────────

#[test]
fn define_model_errors_surface() {
    let mapper = common::mapper(Arc::new(MemoryStore::new()));
    assert!(matches!(
        mapper.define_model("", vec![("$name", "string")]),
        Err(ModelError::InvalidModel)
    ));
    assert!(matches!(
        mapper.define_model("test", vec![("name", "string")]),
        Err(ModelError::NoPrimaryKey { .. })
    ));
    assert!(matches!(
        mapper.define_model_json("test", &json!({"$colors": ["string", "string"]})),
        Err(ModelError::InvalidArrayDefinition { .. })
    ));
    assert!(matches!(
        mapper.define_model("test", vec![("$id", "Whatever")]),
        Err(ModelError::InvalidType { .. })
    ));
}

#[test]
fn mapper_new_uses_shared_registry() {
    kvmap_store::register_type("model_tests_code", Some(kvmap_store::PrimitiveKind::String))
        .unwrap();
    let mapper = kvmap_store::Mapper::new(Arc::new(MemoryStore::new()));
    let model = mapper
        .define_model("coupon", vec![("$code", "model_tests_code")])
        .unwrap();
    assert!(model.create(json!({"code": "SAVE10"})).is_ok());
    assert!(model.create(json!({"code": 10})).is_err());
}

#[test]
fn model_exposes_keys() {
    let mapper = common::mapper(Arc::new(MemoryStore::new()));
    let vehicle = common::vehicle(&mapper);
    assert_eq!(vehicle.name(), "vehicle");
    assert_eq!(
        vehicle.key_fields(),
        ["date_of_production".to_string(), "production_line".to_string()]
    );
    assert_eq!(
        vehicle.key_for(&json!({"production_line": "76", "date_of_production": 5})),
        "vehicle:5__76:"
    );
}

// ── Create ───────────────────────────────────────────────────────

#[test]
fn create_rejects_mixed_array() {
    let mapper = common::mapper(Arc::new(MemoryStore::new()));
    let student = common::student(&mapper);
    let err = student
        .create(json!({"name": "Jorge Luis Borges", "teachers": ["Italo", 7]}))
        .unwrap_err();
    assert!(matches!(
        err,
        ModelError::InvalidValue { ref field, ref model } if field == "teachers" && model == "student"
    ));
}

#[test]
fn create_rejects_non_object() {
    let mapper = common::mapper(Arc::new(MemoryStore::new()));
    let student = common::student(&mapper);
    assert!(student.create(json!("Borges")).is_err());
}

#[test]
fn instance_accessors() {
    let mapper = common::mapper(Arc::new(MemoryStore::new()));
    let student = common::student(&mapper);
    let mut s = student
        .create(json!({"name": "Borges", "teachers": []}))
        .unwrap();
    assert_eq!(s.model_name(), "student");
    assert_eq!(s.get("name"), Some(&json!("Borges")));
    assert_eq!(s.key(), "student:Borges:");

    let previous = s.set("name", "Cortázar");
    assert_eq!(previous, Some(json!("Borges")));
    assert_eq!(s.key(), "student:Cortázar:");
    assert_eq!(
        serde_json::to_value(&s).unwrap(),
        json!({"name": "Cortázar", "teachers": []})
    );
}

// ── Save / get round trips ───────────────────────────────────────

#[tokio::test]
async fn save_then_get_numeric_key() {
    let mapper = common::mapper(Arc::new(MemoryStore::new()));
    let user = mapper.define_model("user", vec![("$id", "number")]).unwrap();

    let created = user.create(json!({"id": 7})).unwrap();
    let saved = created.save().await.unwrap();
    assert_eq!(saved.get("id"), Some(&json!(7)));

    let loaded = user.get(&json!({"id": 7})).await.unwrap().unwrap();
    assert_eq!(loaded.get("id"), Some(&json!(7)));
    assert_eq!(loaded.get("id").and_then(Value::as_i64), Some(7));
}

#[tokio::test]
async fn vehicle_round_trip() {
    let mapper = common::mapper(Arc::new(MemoryStore::new()));
    let vehicle = common::vehicle(&mapper);

    let tesla = vehicle
        .create(json!({
            "manufacturer": "Tesla",
            "model": "Model S",
            "date_of_production": 1_400_000_000_000i64,
            "production_line": "X2CDHA3",
            "colors": ["red", "green", "blue"],
        }))
        .unwrap();
    tesla.save().await.unwrap();

    let read = vehicle
        .get(&json!({"date_of_production": 1_400_000_000_000i64, "production_line": "X2CDHA3"}))
        .await
        .unwrap()
        .expect("vehicle should load");

    assert_eq!(read.get("manufacturer"), tesla.get("manufacturer"));
    assert_eq!(read.get("model"), tesla.get("model"));
    assert_eq!(read.get("date_of_production"), tesla.get("date_of_production"));
    assert_eq!(read.get("production_line"), tesla.get("production_line"));
    assert_eq!(
        sorted(read.get("colors").unwrap()),
        vec!["blue", "green", "red"]
    );
}

#[tokio::test]
async fn fractional_and_boolean_fields_round_trip() {
    let mapper = common::mapper(Arc::new(MemoryStore::new()));
    let reading = mapper
        .define_model(
            "reading",
            vec![("$sensor", "string"), ("value", "number"), ("ok", "boolean")],
        )
        .unwrap();
    reading
        .create(json!({"sensor": "t1", "value": 5.5, "ok": false}))
        .unwrap()
        .save()
        .await
        .unwrap();

    let loaded = reading.get(&json!({"sensor": "t1"})).await.unwrap().unwrap();
    assert_eq!(loaded.get("value"), Some(&json!(5.5)));
    assert_eq!(loaded.get("ok"), Some(&json!(false)));
}

#[tokio::test]
async fn collection_round_trip_has_set_semantics() {
    let mapper = common::mapper(Arc::new(MemoryStore::new()));
    let student = common::student(&mapper);
    student
        .create(json!({"name": "Borges", "teachers": ["Italo", "Calvino", "Italo"]}))
        .unwrap()
        .save()
        .await
        .unwrap();

    let loaded = student.get(&json!({"name": "Borges"})).await.unwrap().unwrap();
    assert_eq!(sorted(loaded.get("teachers").unwrap()), vec!["Calvino", "Italo"]);
}

#[tokio::test]
async fn numeric_collection_round_trip() {
    let mapper = common::mapper(Arc::new(MemoryStore::new()));
    let scores = mapper
        .define_model_json("scores", &json!({"$player": "string", "points": ["number"]}))
        .unwrap();
    scores
        .create(json!({"player": "p1", "points": [3, 1.5]}))
        .unwrap()
        .save()
        .await
        .unwrap();

    let loaded = scores.get(&json!({"player": "p1"})).await.unwrap().unwrap();
    let mut points: Vec<f64> = loaded
        .get("points")
        .unwrap()
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_f64().unwrap())
        .collect();
    points.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(points, vec![1.5, 3.0]);
}

#[tokio::test]
async fn composite_validator_field_round_trip() {
    let mapper = common::mapper(Arc::new(MemoryStore::new()));
    let account = mapper
        .define_model("account", vec![("$email", "Email | Lowercase")])
        .unwrap();
    assert!(account.create(json!({"email": "LOGIN@server.com"})).is_err());
    account
        .create(json!({"email": "login@server.com"}))
        .unwrap()
        .save()
        .await
        .unwrap();
    assert!(
        account
            .get(&json!({"email": "login@server.com"}))
            .await
            .unwrap()
            .is_some()
    );
}

// ── Not found ────────────────────────────────────────────────────

#[tokio::test]
async fn get_missing_is_none() {
    let mapper = common::mapper(Arc::new(MemoryStore::new()));
    let user = mapper.define_model("user", vec![("$id", "number")]).unwrap();
    assert!(user.get(&json!({"id": 404})).await.unwrap().is_none());
}

#[tokio::test]
async fn get_with_incomplete_key_is_none() {
    let mapper = common::mapper(Arc::new(MemoryStore::new()));
    let vehicle = common::vehicle(&mapper);
    assert!(
        vehicle
            .get(&json!({"production_line": "X2"}))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn get_of_schema_mismatched_data_is_none() {
    let store = Arc::new(MemoryStore::new());
    let mapper = common::mapper(store.clone());
    let user = mapper
        .define_model("user", vec![("$id", "number"), ("age", "number")])
        .unwrap();

    let mut batch = Batch::new();
    batch.set("user:1:id", "1").set("user:1:age", "old");
    store.exec(batch).await.unwrap();

    assert!(user.get(&json!({"id": 1})).await.unwrap().is_none());
}

#[tokio::test]
async fn get_with_scalar_under_collection_key_is_none() {
    let store = Arc::new(MemoryStore::new());
    let mapper = common::mapper(store.clone());
    let student = common::student(&mapper);

    let mut batch = Batch::new();
    batch
        .set("student:Borges:name", "Borges")
        .set("student:Borges:teachers", "Italo");
    store.exec(batch).await.unwrap();

    assert!(student.get(&json!({"name": "Borges"})).await.unwrap().is_none());
}

// ── Expiry ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn saved_with_px_expires() {
    let mapper = common::mapper(Arc::new(MemoryStore::new()));
    let vehicle = common::vehicle(&mapper);
    let mercedes = vehicle
        .create(json!({
            "manufacturer": "Mercedes",
            "model": "SLS",
            "date_of_production": 1_400_000_000_001i64,
            "production_line": "76",
            "colors": ["#ff0000", "#ffffff"],
        }))
        .unwrap();
    let id = json!({"date_of_production": 1_400_000_000_001i64, "production_line": "76"});

    mercedes.save_with(SaveOptions::px(200)).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    let read = vehicle.get(&id).await.unwrap().expect("still alive at +100ms");
    assert_eq!(read.get("manufacturer"), Some(&json!("Mercedes")));
    assert_eq!(sorted(read.get("colors").unwrap()), vec!["#ff0000", "#ffffff"]);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(vehicle.get(&id).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn saved_with_ex_expires() {
    let mapper = common::mapper(Arc::new(MemoryStore::new()));
    let student = common::student(&mapper);
    student
        .create(json!({"name": "Borges", "teachers": ["Italo"]}))
        .unwrap()
        .save_with(SaveOptions::ex(1))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(900)).await;
    assert!(student.get(&json!({"name": "Borges"})).await.unwrap().is_some());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(student.get(&json!({"name": "Borges"})).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn zero_px_falls_back_to_ex() {
    let mapper = common::mapper(Arc::new(MemoryStore::new()));
    let user = mapper.define_model("user", vec![("$id", "number")]).unwrap();
    let options: SaveOptions = serde_json::from_value(json!({"PX": 0, "EX": 10})).unwrap();

    user.create(json!({"id": 7}))
        .unwrap()
        .save_with(options)
        .await
        .unwrap();

    let loaded = user.get(&json!({"id": 7})).await.unwrap();
    assert_eq!(loaded.and_then(|u| u.get("id").cloned()), Some(json!(7)));

    tokio::time::sleep(Duration::from_secs(11)).await;
    assert!(user.get(&json!({"id": 7})).await.unwrap().is_none());
}

#[tokio::test]
async fn save_with_expiry_issues_expected_commands() {
    let client = Arc::new(RecordingClient::default());
    let mapper = common::mapper(client.clone());
    let student = common::student(&mapper);
    student
        .create(json!({"name": "Borges", "teachers": ["Italo"]}))
        .unwrap()
        .save_with(SaveOptions {
            px: Some(200),
            ex: Some(5),
        })
        .await
        .unwrap();

    let batch = client.last_batch().unwrap();
    assert_eq!(
        batch.commands().iter().map(Command::name).collect::<Vec<_>>(),
        vec!["SET", "SADD", "PEXPIRE"]
    );
    assert!(matches!(
        batch.commands()[0],
        Command::Set {
            expiry: Some(Expiry::Millis(200)),
            ..
        }
    ));
}

#[tokio::test]
async fn each_operation_is_one_round_trip() {
    let client = Arc::new(RecordingClient::default());
    let mapper = common::mapper(client.clone());
    let vehicle = common::vehicle(&mapper);
    let car = vehicle
        .create(json!({
            "manufacturer": "Fiat",
            "model": "500",
            "date_of_production": 1,
            "production_line": "A",
            "colors": ["white"],
        }))
        .unwrap();

    car.save().await.unwrap();
    vehicle
        .get(&json!({"date_of_production": 1, "production_line": "A"}))
        .await
        .unwrap();
    car.remove().await.unwrap();

    assert_eq!(client.batches().len(), 3);
}

// ── Mutation and re-validation ───────────────────────────────────

#[tokio::test]
async fn invalid_mutation_fails_save_without_writing() {
    let client = Arc::new(RecordingClient::default());
    let mapper = common::mapper(client.clone());
    let user = mapper.define_model("user", vec![("$id", "number")]).unwrap();

    let mut u = user.create(json!({"id": 7})).unwrap();
    u.set("id", "seven");

    let err = u.save().await.unwrap_err();
    assert!(matches!(
        err,
        ModelError::InvalidValue { ref field, ref model } if field == "id" && model == "user"
    ));
    assert!(client.batches().is_empty());
}

#[tokio::test]
async fn loaded_instance_can_be_changed_and_saved() {
    let mapper = common::mapper(Arc::new(MemoryStore::new()));
    let vehicle = common::vehicle(&mapper);
    let id = json!({"date_of_production": 2, "production_line": "B"});
    vehicle
        .create(json!({
            "manufacturer": "Fiat",
            "model": "Panda",
            "date_of_production": 2,
            "production_line": "B",
            "colors": [],
        }))
        .unwrap()
        .save()
        .await
        .unwrap();

    let mut loaded = vehicle.get(&id).await.unwrap().unwrap();
    loaded.set("model", "Panda 4x4");
    loaded.save().await.unwrap();

    let reloaded = vehicle.get(&id).await.unwrap().unwrap();
    assert_eq!(reloaded.get("model"), Some(&json!("Panda 4x4")));
}

// ── Remove ───────────────────────────────────────────────────────

#[tokio::test]
async fn remove_deletes_keys_and_keeps_local_instance() {
    let store = Arc::new(MemoryStore::new());
    let mapper = common::mapper(store.clone());
    let user = mapper
        .define_model("user", vec![("$id", "number"), ("name", "string")])
        .unwrap();
    let u = user.create(json!({"id": 3, "name": "Ada"})).unwrap();
    u.save().await.unwrap();
    assert_eq!(store.len().await, 2);

    u.remove().await.unwrap();
    assert!(store.is_empty().await);
    assert!(user.get(&json!({"id": 3})).await.unwrap().is_none());
    assert_eq!(u.get("name"), Some(&json!("Ada")));

    u.save().await.unwrap();
    assert!(user.get(&json!({"id": 3})).await.unwrap().is_some());
}

#[tokio::test]
async fn per_command_error_does_not_fail_save() {
    let store = Arc::new(MemoryStore::new());
    let mapper = common::mapper(store.clone());
    let student = common::student(&mapper);

    let mut batch = Batch::new();
    batch.set("student:Borges:teachers", "Italo");
    store.exec(batch).await.unwrap();

    student
        .create(json!({"name": "Borges", "teachers": ["Calvino"]}))
        .unwrap()
        .save()
        .await
        .unwrap();

    let mut batch = Batch::new();
    batch.get("student:Borges:name").get("student:Borges:teachers");
    let replies = store.exec(batch).await.unwrap();
    assert_eq!(
        replies,
        vec![Reply::Bulk("Borges".into()), Reply::Bulk("Italo".into())]
    );
}

// ── Store failures ───────────────────────────────────────────────

#[tokio::test]
async fn transport_failure_is_store_error() {
    let mapper = common::mapper(Arc::new(FailingClient));
    let user = mapper.define_model("user", vec![("$id", "number")]).unwrap();
    let u = user.create(json!({"id": 1})).unwrap();

    assert!(matches!(u.save().await, Err(ModelError::Store(_))));
    assert!(matches!(u.remove().await, Err(ModelError::Store(_))));
    let err = user.get(&json!({"id": 1})).await.unwrap_err();
    assert!(err.to_string().contains("connection refused"));
}

#[tokio::test]
async fn short_reply_list_is_store_error() {
    let mapper = common::mapper(Arc::new(CannedClient(vec![Reply::Ok])));
    let vehicle = common::vehicle(&mapper);
    let err = vehicle
        .get(&json!({"date_of_production": 1, "production_line": "A"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::Store(_)));
}
