use chrono::NaiveDateTime;
use sqlx::SqlitePool;
use vfarm_dashboard::db::models::{NewForecast, NewUser, ProfileUpdate, SensorRow};
use vfarm_dashboard::db::Repository;
use vfarm_dashboard::error::AppError;

/// One file stands in for the sensor, prediction and users databases.
async fn repo(pool: &SqlitePool) -> Repository {
    let repo = Repository::new(pool.clone(), pool.clone(), pool.clone());
    repo.run_migrations().await.expect("migrations failed");
    repo.ensure_source_tables()
        .await
        .expect("failed to create source tables");
    repo
}

fn sensor_row(timestamp: &str, tds: f64) -> SensorRow {
    SensorRow {
        timestamp: Some(timestamp.to_string()),
        humidity: Some(65.0),
        temp_envi: Some(24.5),
        temp_water: Some(22.0),
        tds: Some(tds),
        ph: Some(6.1),
        ..SensorRow::default()
    }
}

fn new_user(username: &str, email: &str) -> NewUser {
    NewUser {
        email: email.to_string(),
        username: username.to_string(),
        password: "$2b$10$notarealhashbutgoodenoughforstorage".to_string(),
        first_name: "Ana".to_string(),
        last_name: "Reyes".to_string(),
    }
}

#[sqlx::test]
async fn test_empty_tables_return_empty_lists(pool: SqlitePool) {
    let repo = repo(&pool).await;

    assert!(repo.latest_sensor_readings(50).await.unwrap().is_empty());
    assert!(repo.predictions().await.unwrap().is_empty());
}

/// ensure_source_tables must be safe to run against existing tables
#[sqlx::test]
async fn test_ensure_source_tables_is_idempotent(pool: SqlitePool) {
    let repo = repo(&pool).await;
    repo.insert_sensor_readings(&[sensor_row("2025-06-01 10:00:00", 700.0)])
        .await
        .unwrap();

    repo.ensure_source_tables().await.unwrap();

    assert_eq!(repo.latest_sensor_readings(50).await.unwrap().len(), 1);
}

#[sqlx::test]
async fn test_latest_sensor_readings_newest_first_and_limited(pool: SqlitePool) {
    let repo = repo(&pool).await;

    let rows: Vec<SensorRow> = (0..8)
        .map(|h| sensor_row(&format!("2025-06-01 {:02}:00:00", h), 600.0 + h as f64))
        .collect();
    let inserted = repo.insert_sensor_readings(&rows).await.unwrap();
    assert_eq!(inserted, 8);

    let latest = repo.latest_sensor_readings(5).await.unwrap();
    assert_eq!(latest.len(), 5);
    assert_eq!(latest[0].timestamp.as_deref(), Some("2025-06-01 07:00:00"));
    assert_eq!(latest[0].tds, Some(607.0));
    assert!(latest
        .windows(2)
        .all(|w| w[0].timestamp >= w[1].timestamp));
}

#[sqlx::test]
async fn test_pump_status_round_trips_as_optional(pool: SqlitePool) {
    let repo = repo(&pool).await;

    let mut with_pump = sensor_row("2025-06-01 11:00:00", 700.0);
    with_pump.pump_status = Some(true);
    let without_pump = sensor_row("2025-06-01 10:00:00", 700.0);
    repo.insert_sensor_readings(&[with_pump, without_pump])
        .await
        .unwrap();

    let rows = repo.latest_sensor_readings(10).await.unwrap();
    assert_eq!(rows[0].pump_status, Some(true));
    assert_eq!(rows[1].pump_status, None);
}

#[sqlx::test]
async fn test_sensor_history_since_oldest_first(pool: SqlitePool) {
    let repo = repo(&pool).await;

    repo.insert_sensor_readings(&[
        sensor_row("2025-06-01 12:00:00", 700.0),
        sensor_row("2025-05-31 08:00:00", 650.0),
        sensor_row("2025-06-01T09:30:00", 680.0),
        sensor_row("2025-05-30 23:59:59", 640.0),
    ])
    .await
    .unwrap();

    let since = NaiveDateTime::parse_from_str("2025-05-31 08:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
    let history = repo.sensor_history(since).await.unwrap();

    let tds: Vec<_> = history.iter().map(|r| r.tds).collect();
    assert_eq!(tds, vec![Some(650.0), Some(680.0), Some(700.0)]);
}

#[sqlx::test]
async fn test_predictions_ordered_with_payload_fallbacks(pool: SqlitePool) {
    let repo = repo(&pool).await;

    repo.insert_predictions(&[
        NewForecast {
            batch_start: Some("2025-06-01".to_string()),
            stage_name: Some("Harvesting".to_string()),
            stage_date: Some("2025-06-30".to_string()),
            yield_predicted: Some(42.4),
            status: Some("optimal".to_string()),
            notes: None,
        },
        NewForecast {
            batch_start: Some("2025-06-01".to_string()),
            stage_name: None,
            stage_date: Some("2025-06-01".to_string()),
            ..NewForecast::default()
        },
    ])
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO forecast_batches (stage_name, stage_date, yield_count, yield_status) \
         VALUES ('Vegetative', '2025-06-14', 30, 'warning')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let rows = repo.predictions().await.unwrap();
    let dates: Vec<_> = rows.iter().map(|r| r.stage_date.clone().unwrap()).collect();
    assert_eq!(dates, vec!["2025-06-01", "2025-06-14", "2025-06-30"]);

    let payloads: Vec<_> = rows
        .into_iter()
        .map(|r| r.into_payload("2025-06-05"))
        .collect();

    assert_eq!(payloads[0].stage_name, "Unknown");
    assert_eq!(payloads[0].yield_date.as_deref(), Some("2025-06-01"));
    assert_eq!(payloads[1].yield_predicted, Some(30.0));
    assert_eq!(payloads[1].status.as_deref(), Some("warning"));
    assert_eq!(payloads[2].prediction_date, "2025-06-05");
    assert_eq!(payloads[2].status.as_deref(), Some("optimal"));
}

#[sqlx::test]
async fn test_create_and_find_user(pool: SqlitePool) {
    let repo = repo(&pool).await;

    let id = repo
        .create_user(&new_user("grower", "grower@farm.test"))
        .await
        .expect("Failed to create user");
    assert!(id > 0);

    let by_name = repo.find_user_by_username("grower").await.unwrap().unwrap();
    assert_eq!(by_name.id, id);
    assert_eq!(by_name.profile_pic.as_deref(), Some("/profilepic.jpg"));
    assert!(by_name.created_at.is_some());

    let by_id = repo.find_user_by_id(id).await.unwrap().unwrap();
    assert_eq!(by_id.email, "grower@farm.test");

    assert!(repo.find_user_by_username("nobody").await.unwrap().is_none());
    assert!(repo.find_user_by_id(id + 100).await.unwrap().is_none());
}

#[sqlx::test]
async fn test_duplicate_user_is_conflict(pool: SqlitePool) {
    let repo = repo(&pool).await;

    repo.create_user(&new_user("grower", "grower@farm.test"))
        .await
        .unwrap();

    match repo.create_user(&new_user("grower", "other@farm.test")).await {
        Err(AppError::Conflict(msg)) => assert_eq!(msg, "Username or email already exists"),
        other => panic!("Expected Conflict, got: {:?}", other),
    }

    let same_email = repo.create_user(&new_user("other", "grower@farm.test")).await;
    assert!(matches!(same_email, Err(AppError::Conflict(_))));
}

#[sqlx::test]
async fn test_update_profile_is_partial(pool: SqlitePool) {
    let repo = repo(&pool).await;
    let id = repo
        .create_user(&new_user("grower", "grower@farm.test"))
        .await
        .unwrap();

    let update = ProfileUpdate {
        first_name: Some("Ana Maria".to_string()),
        profile_pic: Some("/avatars/ana.png".to_string()),
        ..ProfileUpdate::default()
    };
    assert!(repo.update_profile(id, &update).await.unwrap());

    let user = repo.find_user_by_id(id).await.unwrap().unwrap();
    assert_eq!(user.first_name, "Ana Maria");
    assert_eq!(user.last_name, "Reyes");
    assert_eq!(user.username, "grower");
    assert_eq!(user.profile_pic.as_deref(), Some("/avatars/ana.png"));

    assert!(!repo.update_profile(id + 100, &update).await.unwrap());
}

#[sqlx::test]
async fn test_update_password(pool: SqlitePool) {
    let repo = repo(&pool).await;
    let id = repo
        .create_user(&new_user("grower", "grower@farm.test"))
        .await
        .unwrap();

    repo.update_password(id, "new-hash").await.unwrap();

    let user = repo.find_user_by_id(id).await.unwrap().unwrap();
    assert_eq!(user.password, "new-hash");
}

/// Controller files carry only the wire columns; the optional ones read as NULL.
#[sqlx::test]
async fn test_source_tables_without_optional_columns(pool: SqlitePool) {
    sqlx::query(
        "CREATE TABLE lettuce_wavelet (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT, humidity REAL, temp_envi REAL, temp_water REAL,
            tds REAL, ec REAL, lux REAL, ppfd REAL,
            reflect_445 REAL, reflect_480 REAL, ph REAL
        )",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "CREATE TABLE forecast_batches (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            batch_start TEXT, stage_name TEXT, stage_date TEXT, yield_predicted REAL
        )",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO lettuce_wavelet (timestamp, tds, ph) VALUES
            ('2025-06-01 09:00:00', 650, 6.2),
            ('2025-06-01 10:00:00', 700, 6.0)",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO forecast_batches (batch_start, stage_name, stage_date, yield_predicted) VALUES
            ('2025-06-01', 'Harvesting', '2025-06-30', 42.0),
            ('2025-06-01', 'Germination', '2025-06-01', NULL)",
    )
    .execute(&pool)
    .await
    .unwrap();

    let repo = repo(&pool).await;

    let latest = repo.latest_sensor_readings(50).await.unwrap();
    assert_eq!(latest.len(), 2);
    assert_eq!(latest[0].tds, Some(700.0));
    assert_eq!(latest[0].pump_status, None);

    let since = NaiveDateTime::parse_from_str("2025-06-01 09:30:00", "%Y-%m-%d %H:%M:%S").unwrap();
    let history = repo.sensor_history(since).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].ph, Some(6.0));

    let rows = repo.predictions().await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].stage_name.as_deref(), Some("Germination"));
    assert_eq!(rows[0].yield_count, None);
    assert_eq!(rows[1].id, 1);

    let payload = rows[1].clone().into_payload("2025-06-05");
    assert_eq!(payload.yield_predicted, Some(42.0));
    assert_eq!(payload.status, None);
    assert_eq!(payload.notes, None);
}

#[sqlx::test(migrations = false)]
async fn test_legacy_users_table_is_adopted(pool: SqlitePool) {
    sqlx::query(
        "CREATE TABLE users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT UNIQUE NOT NULL,
            username TEXT UNIQUE NOT NULL,
            password TEXT NOT NULL,
            firstName TEXT NOT NULL,
            lastName TEXT NOT NULL,
            profilePic TEXT DEFAULT '/profilepic.jpg',
            createdAt DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO users (email, username, password, firstName, lastName)
         VALUES ('old@farm.test', 'veteran', 'hash', 'Lito', 'Santos')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let repo = repo(&pool).await;

    let user = repo.find_user_by_username("veteran").await.unwrap().unwrap();
    assert_eq!(user.first_name, "Lito");
    assert_eq!(user.profile_pic.as_deref(), Some("/profilepic.jpg"));

    let id = repo
        .create_user(&new_user("grower", "grower@farm.test"))
        .await
        .unwrap();
    assert!(id > user.id);

    // A second start finds nothing left to rename
    repo.run_migrations().await.unwrap();
    assert!(repo.find_user_by_id(id).await.unwrap().is_some());
}
