use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use utils::{
    pagination::Page,
    validation::{Validate, ValidationErrors, Validator},
};
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "training_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TrainingType {
    /// Site induction every new worker must attend
    #[default]
    Induction,
    Safety,
    Technical,
}

/// Training session (capacitación)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Training {
    pub id: Uuid,
    pub topic: String,
    pub training_type: TrainingType,
    pub obra_id: Option<Uuid>,
    pub date: NaiveDate,
    pub duration_hours: f64,
    pub instructor: Option<String>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct TrainingSummary {
    #[serde(flatten)]
    #[ts(flatten)]
    #[sqlx(flatten)]
    pub training: Training,
    pub attendee_count: i64,
    pub attended_count: i64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct TrainingAttendee {
    pub training_id: Uuid,
    pub worker_id: Uuid,
    pub worker_name: String,
    pub document_number: String,
    pub attended: bool,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct TrainingDetail {
    #[serde(flatten)]
    #[ts(flatten)]
    pub training: Training,
    pub attendees: Vec<TrainingAttendee>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateTraining {
    pub topic: String,
    pub training_type: Option<TrainingType>,
    pub obra_id: Option<Uuid>,
    pub date: NaiveDate,
    pub duration_hours: f64,
    pub instructor: Option<String>,
    pub location: Option<String>,
    /// Initial roster; ignored on update
    #[serde(default)]
    pub attendee_ids: Vec<Uuid>,
}

pub type UpdateTraining = CreateTraining;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct AddTrainingAttendee {
    pub worker_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdateTrainingAttendee {
    pub attended: bool,
    pub score: Option<f64>,
}

pub const MAX_SCORE: f64 = 20.0;

impl Validate for CreateTraining {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Validator::new()
            .required("topic", &self.topic)
            .max_len("topic", &self.topic, 200)
            .positive("duration_hours", self.duration_hours)
            .max_len_opt("instructor", self.instructor.as_deref(), 150)
            .max_len_opt("location", self.location.as_deref(), 200)
            .finish()
    }
}

impl Validate for UpdateTrainingAttendee {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        if let Some(score) = self.score {
            v.between("score", score, 0.0, MAX_SCORE);
        }
        v.finish()
    }
}

const TRAINING_COLUMNS: &str = "t.id, t.topic, t.training_type, t.obra_id, t.date, t.duration_hours, t.instructor, t.location, t.created_at, t.updated_at";

impl Training {
    pub async fn list(pool: &SqlitePool, page: &Page) -> Result<Vec<TrainingSummary>, sqlx::Error> {
        let query = format!(
            r#"SELECT {TRAINING_COLUMNS},
                      (SELECT COUNT(*) FROM training_attendees ta WHERE ta.training_id = t.id) AS attendee_count,
                      (SELECT COUNT(*) FROM training_attendees ta WHERE ta.training_id = t.id AND ta.attended = 1) AS attended_count
               FROM trainings t
               WHERE t.topic LIKE $1 ESCAPE '\' OR COALESCE(t.instructor, '') LIKE $1 ESCAPE '\'
               ORDER BY t.date DESC, t.created_at DESC
               LIMIT $2 OFFSET $3"#
        );
        sqlx::query_as::<_, TrainingSummary>(&query)
            .bind(page.like_pattern())
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(pool)
            .await
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        super::count_rows(pool, "trainings").await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {TRAINING_COLUMNS} FROM trainings t WHERE t.id = $1");
        sqlx::query_as::<_, Training>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_detail(
        pool: &SqlitePool,
        id: Uuid,
    ) -> Result<Option<TrainingDetail>, sqlx::Error> {
        let Some(training) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };
        let attendees = TrainingAttendee::find_by_training_id(pool, id).await?;
        Ok(Some(TrainingDetail {
            training,
            attendees,
        }))
    }

    pub async fn create<'e, E>(
        executor: E,
        data: &CreateTraining,
        id: Uuid,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Training>(
            r#"INSERT INTO trainings (id, topic, training_type, obra_id, date, duration_hours, instructor, location)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               RETURNING id, topic, training_type, obra_id, date, duration_hours, instructor, location, created_at, updated_at"#,
        )
        .bind(id)
        .bind(data.topic.trim())
        .bind(data.training_type.unwrap_or_default())
        .bind(data.obra_id)
        .bind(data.date)
        .bind(data.duration_hours)
        .bind(&data.instructor)
        .bind(&data.location)
        .fetch_one(executor)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateTraining,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Training>(
            r#"UPDATE trainings
               SET topic = $2, training_type = $3, obra_id = $4, date = $5, duration_hours = $6,
                   instructor = $7, location = $8, updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING id, topic, training_type, obra_id, date, duration_hours, instructor, location, created_at, updated_at"#,
        )
        .bind(id)
        .bind(data.topic.trim())
        .bind(data.training_type.unwrap_or_default())
        .bind(data.obra_id)
        .bind(data.date)
        .bind(data.duration_hours)
        .bind(&data.instructor)
        .bind(&data.location)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM trainings WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

impl TrainingAttendee {
    pub async fn find_by_training_id(
        pool: &SqlitePool,
        training_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, TrainingAttendee>(
            r#"SELECT ta.training_id, ta.worker_id,
                      w.first_name || ' ' || w.last_name AS worker_name,
                      w.document_number, ta.attended, ta.score
               FROM training_attendees ta
               JOIN workers w ON w.id = ta.worker_id
               WHERE ta.training_id = $1
               ORDER BY w.last_name ASC, w.first_name ASC"#,
        )
        .bind(training_id)
        .fetch_all(pool)
        .await
    }

    pub async fn is_enrolled(
        pool: &SqlitePool,
        training_id: Uuid,
        worker_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM training_attendees WHERE training_id = $1 AND worker_id = $2",
        )
        .bind(training_id)
        .bind(worker_id)
        .fetch_one(pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn add<'e, E>(executor: E, training_id: Uuid, worker_id: Uuid) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query("INSERT INTO training_attendees (training_id, worker_id) VALUES ($1, $2)")
            .bind(training_id)
            .bind(worker_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn update(
        pool: &SqlitePool,
        training_id: Uuid,
        worker_id: Uuid,
        data: &UpdateTrainingAttendee,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE training_attendees SET attended = $3, score = $4 WHERE training_id = $1 AND worker_id = $2",
        )
        .bind(training_id)
        .bind(worker_id)
        .bind(data.attended)
        .bind(data.score)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn remove(
        pool: &SqlitePool,
        training_id: Uuid,
        worker_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM training_attendees WHERE training_id = $1 AND worker_id = $2")
                .bind(training_id)
                .bind(worker_id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected())
    }
}
