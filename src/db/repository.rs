use crate::db::models::{ForecastRow, NewForecast, NewUser, ProfileUpdate, SensorRow, User};
use crate::error::{AppError, Result};
use chrono::NaiveDateTime;
use sqlx::SqlitePool;
use tracing::{debug, info};

const SENSOR_COLUMNS: &[&str] = &[
    "timestamp",
    "humidity",
    "temp_envi",
    "temp_water",
    "tds",
    "ec",
    "lux",
    "ppfd",
    "reflect_445",
    "reflect_480",
    "ph",
    "pump_status",
];

const FORECAST_COLUMNS: &[&str] = &[
    "id",
    "batch_start",
    "stage_name",
    "stage_date",
    "yield_predicted",
    "yield_count",
    "status",
    "yield_status",
    "notes",
];

const USER_COLUMNS: &str =
    "id, email, username, password, first_name, last_name, profile_pic, created_at";

const LEGACY_USER_COLUMNS: [(&str, &str); 4] = [
    ("firstName", "first_name"),
    ("lastName", "last_name"),
    ("profilePic", "profile_pic"),
    ("createdAt", "created_at"),
];

/// Access to the three SQLite files behind the dashboard.
///
/// The same pool may be passed for all three when everything lives in one
/// file (tests, small deployments).
pub struct Repository {
    sensors: SqlitePool,
    predictions: SqlitePool,
    users: SqlitePool,
}

impl Repository {
    pub fn new(sensors: SqlitePool, predictions: SqlitePool, users: SqlitePool) -> Self {
        Self {
            sensors,
            predictions,
            users,
        }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running users database migrations...");
        sqlx::migrate!("./migrations").run(&self.users).await?;
        self.adopt_legacy_user_columns().await?;
        info!("Users database migrations completed");
        Ok(())
    }

    /// Rename the camelCase columns of a users table created by the earlier
    /// Node deployment. The migration is a no-op on such a file.
    async fn adopt_legacy_user_columns(&self) -> Result<()> {
        let present: Vec<String> =
            sqlx::query_scalar("SELECT name FROM pragma_table_info('users')")
                .fetch_all(&self.users)
                .await?;

        for (legacy, current) in LEGACY_USER_COLUMNS {
            if present.iter().any(|name| name == legacy) {
                info!("Renaming users.{} to {}", legacy, current);
                sqlx::query(&format!(
                    "ALTER TABLE users RENAME COLUMN \"{legacy}\" TO {current}"
                ))
                .execute(&self.users)
                .await?;
            }
        }

        Ok(())
    }

    /// Create the controller and forecast tables when they do not exist yet,
    /// so a fresh deployment serves empty arrays instead of errors.
    pub async fn ensure_source_tables(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS lettuce_wavelet (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp   TEXT,
                humidity    REAL,
                temp_envi   REAL,
                temp_water  REAL,
                tds         REAL,
                ec          REAL,
                lux         REAL,
                ppfd        REAL,
                reflect_445 REAL,
                reflect_480 REAL,
                ph          REAL,
                pump_status INTEGER
            )
            "#,
        )
        .execute(&self.sensors)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS forecast_batches (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                batch_start     TEXT,
                stage_name      TEXT,
                stage_date      TEXT,
                yield_predicted REAL,
                yield_count     REAL,
                status          TEXT,
                yield_status    TEXT,
                notes           TEXT
            )
            "#,
        )
        .execute(&self.predictions)
        .await?;

        Ok(())
    }

    /// Newest readings first.
    pub async fn latest_sensor_readings(&self, limit: u32) -> Result<Vec<SensorRow>> {
        let columns = projection(&self.sensors, "lettuce_wavelet", SENSOR_COLUMNS).await?;
        let rows = sqlx::query_as::<_, SensorRow>(&format!(
            "SELECT {columns} FROM lettuce_wavelet ORDER BY timestamp DESC LIMIT ?"
        ))
        .bind(limit as i64)
        .fetch_all(&self.sensors)
        .await?;

        debug!("Loaded {} latest sensor rows", rows.len());
        Ok(rows)
    }

    /// Readings at or after `since`, oldest first.
    ///
    /// The controller stores naive local timestamps, so `since` is compared
    /// in the same local time.
    pub async fn sensor_history(&self, since: NaiveDateTime) -> Result<Vec<SensorRow>> {
        let columns = projection(&self.sensors, "lettuce_wavelet", SENSOR_COLUMNS).await?;
        let rows = sqlx::query_as::<_, SensorRow>(&format!(
            "SELECT {columns} FROM lettuce_wavelet \
             WHERE julianday(timestamp) >= julianday(?) \
             ORDER BY julianday(timestamp) ASC"
        ))
        .bind(since.format("%Y-%m-%d %H:%M:%S").to_string())
        .fetch_all(&self.sensors)
        .await?;

        debug!("Loaded {} sensor history rows since {}", rows.len(), since);
        Ok(rows)
    }

    /// Every forecast row by stage date, ties in insertion order.
    pub async fn predictions(&self) -> Result<Vec<ForecastRow>> {
        let columns = projection(&self.predictions, "forecast_batches", FORECAST_COLUMNS).await?;
        let rows = sqlx::query_as::<_, ForecastRow>(&format!(
            "SELECT {columns} FROM forecast_batches \
             ORDER BY DATE(stage_date) ASC, rowid ASC"
        ))
        .fetch_all(&self.predictions)
        .await?;

        Ok(rows)
    }

    /// Batch insert readings in a single transaction. Expects the full
    /// column set created by [`Repository::ensure_source_tables`].
    pub async fn insert_sensor_readings(&self, rows: &[SensorRow]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        // SQLite caps bound parameters per statement
        const BATCH_SIZE: usize = 500;
        let mut total_rows_affected = 0;
        let mut tx = self.sensors.begin().await?;

        for chunk in rows.chunks(BATCH_SIZE) {
            let mut query_builder = sqlx::QueryBuilder::new(format!(
                "INSERT INTO lettuce_wavelet ({}) ",
                SENSOR_COLUMNS.join(", ")
            ));

            query_builder.push_values(chunk, |mut b, row| {
                b.push_bind(&row.timestamp)
                    .push_bind(row.humidity)
                    .push_bind(row.temp_envi)
                    .push_bind(row.temp_water)
                    .push_bind(row.tds)
                    .push_bind(row.ec)
                    .push_bind(row.lux)
                    .push_bind(row.ppfd)
                    .push_bind(row.reflect_445)
                    .push_bind(row.reflect_480)
                    .push_bind(row.ph)
                    .push_bind(row.pump_status);
            });

            let result = query_builder.build().execute(&mut *tx).await?;
            total_rows_affected += result.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(total_rows_affected)
    }

    pub async fn insert_predictions(&self, rows: &[NewForecast]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut query_builder = sqlx::QueryBuilder::new(
            "INSERT INTO forecast_batches \
             (batch_start, stage_name, stage_date, yield_predicted, status, notes) ",
        );

        query_builder.push_values(rows, |mut b, row| {
            b.push_bind(&row.batch_start)
                .push_bind(&row.stage_name)
                .push_bind(&row.stage_date)
                .push_bind(row.yield_predicted)
                .push_bind(&row.status)
                .push_bind(&row.notes);
        });

        let result = query_builder.build().execute(&self.predictions).await?;
        Ok(result.rows_affected() as usize)
    }

    /// Insert a user whose `password` is already hashed. Returns the new id.
    pub async fn create_user(&self, user: &NewUser) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO users (email, username, password, first_name, last_name) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .execute(&self.users)
        .await
        .map_err(map_unique_violation)?;

        Ok(result.last_insert_rowid())
    }

    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(&self.users)
        .await?;

        Ok(user)
    }

    pub async fn find_user_by_id(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.users)
            .await?;

        Ok(user)
    }

    /// Update the fields present in `update`. Returns false for an unknown id.
    pub async fn update_profile(&self, id: i64, update: &ProfileUpdate) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                email = COALESCE(?, email),
                username = COALESCE(?, username),
                first_name = COALESCE(?, first_name),
                last_name = COALESCE(?, last_name),
                profile_pic = COALESCE(?, profile_pic)
            WHERE id = ?
            "#,
        )
        .bind(&update.email)
        .bind(&update.username)
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(&update.profile_pic)
        .bind(id)
        .execute(&self.users)
        .await
        .map_err(map_unique_violation)?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn update_password(&self, id: i64, password_hash: &str) -> Result<()> {
        sqlx::query("UPDATE users SET password = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(&self.users)
            .await?;

        Ok(())
    }
}

/// Select list for `columns`, reading NULL for any the table lacks.
///
/// Controller databases predate `pump_status` and the forecast status and
/// notes columns, and `CREATE TABLE IF NOT EXISTS` never adds them.
async fn projection(pool: &SqlitePool, table: &str, columns: &[&str]) -> Result<String> {
    let present: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info(?)")
        .bind(table)
        .fetch_all(pool)
        .await?;

    let list = columns
        .iter()
        .map(|column| {
            if present.iter().any(|name| name.eq_ignore_ascii_case(column)) {
                column.to_string()
            } else if *column == "id" {
                "rowid AS id".to_string()
            } else {
                debug!("{} has no {} column, reading NULL", table, column);
                format!("NULL AS {}", column)
            }
        })
        .collect::<Vec<_>>()
        .join(", ");

    Ok(list)
}

fn map_unique_violation(e: sqlx::Error) -> AppError {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::Conflict("Username or email already exists".to_string())
        }
        _ => AppError::Database(e),
    }
}
