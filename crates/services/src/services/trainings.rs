use db::models::training::{
    AddTrainingAttendee, CreateTraining, Training, TrainingAttendee, TrainingDetail,
    UpdateTraining, UpdateTrainingAttendee,
};
use sqlx::SqlitePool;
use thiserror::Error;
use utils::validation::{Validate, ValidationErrors};
use uuid::Uuid;

use super::references;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("training not found")]
    NotFound,
    #[error("attendee not found")]
    AttendeeNotFound,
}

#[derive(Clone)]
pub struct TrainingService {
    pool: SqlitePool,
}

impl TrainingService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn check(&self, data: &CreateTraining, with_roster: bool) -> Result<(), TrainingError> {
        let mut errors = data.validate().err().unwrap_or_default();
        references::check_obra(&self.pool, "obra_id", data.obra_id, &mut errors).await?;
        if with_roster {
            for (index, worker_id) in data.attendee_ids.iter().enumerate() {
                if data.attendee_ids[..index].contains(worker_id) {
                    errors.add(
                        &format!("attendee_ids.{index}"),
                        "The attendee_ids field has a duplicate value.",
                    );
                    continue;
                }
                references::check_worker(
                    &self.pool,
                    &format!("attendee_ids.{index}"),
                    *worker_id,
                    &mut errors,
                )
                .await?;
            }
        }
        Ok(errors.into_result()?)
    }

    async fn detail(&self, id: Uuid) -> Result<TrainingDetail, TrainingError> {
        Training::find_detail(&self.pool, id)
            .await?
            .ok_or(TrainingError::NotFound)
    }

    async fn ensure_exists(&self, id: Uuid) -> Result<(), TrainingError> {
        match Training::find_by_id(&self.pool, id).await? {
            Some(_) => Ok(()),
            None => Err(TrainingError::NotFound),
        }
    }

    /// Session and initial roster are written together
    pub async fn create(&self, data: &CreateTraining) -> Result<TrainingDetail, TrainingError> {
        self.check(data, true).await?;

        let mut tx = db::begin_write(&self.pool).await?;
        let training = Training::create(&mut *tx, data, Uuid::new_v4()).await?;
        for worker_id in &data.attendee_ids {
            TrainingAttendee::add(&mut *tx, training.id, *worker_id).await?;
        }
        tx.commit().await?;

        self.detail(training.id).await
    }

    /// The roster is managed through the attendee endpoints; `attendee_ids` is ignored here.
    pub async fn update(&self, id: Uuid, data: &UpdateTraining) -> Result<TrainingDetail, TrainingError> {
        self.ensure_exists(id).await?;
        self.check(data, false).await?;
        Training::update(&self.pool, id, data)
            .await?
            .ok_or(TrainingError::NotFound)?;
        self.detail(id).await
    }

    pub async fn attendees(&self, id: Uuid) -> Result<Vec<TrainingAttendee>, TrainingError> {
        self.ensure_exists(id).await?;
        Ok(TrainingAttendee::find_by_training_id(&self.pool, id).await?)
    }

    pub async fn add_attendee(
        &self,
        id: Uuid,
        data: &AddTrainingAttendee,
    ) -> Result<Vec<TrainingAttendee>, TrainingError> {
        self.ensure_exists(id).await?;
        let mut errors = ValidationErrors::new();
        references::check_worker(&self.pool, "worker_id", data.worker_id, &mut errors).await?;
        if errors.is_empty() && TrainingAttendee::is_enrolled(&self.pool, id, data.worker_id).await? {
            errors.add("worker_id", "The worker is already enrolled in this training.");
        }
        errors.into_result()?;

        TrainingAttendee::add(&self.pool, id, data.worker_id).await?;
        self.attendees(id).await
    }

    pub async fn update_attendee(
        &self,
        id: Uuid,
        worker_id: Uuid,
        data: &UpdateTrainingAttendee,
    ) -> Result<Vec<TrainingAttendee>, TrainingError> {
        self.ensure_exists(id).await?;
        data.validate()?;
        if TrainingAttendee::update(&self.pool, id, worker_id, data).await? == 0 {
            return Err(TrainingError::AttendeeNotFound);
        }
        self.attendees(id).await
    }

    pub async fn remove_attendee(&self, id: Uuid, worker_id: Uuid) -> Result<(), TrainingError> {
        self.ensure_exists(id).await?;
        if TrainingAttendee::remove(&self.pool, id, worker_id).await? == 0 {
            return Err(TrainingError::AttendeeNotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use db::models::training::TrainingType;

    use super::*;
    use crate::services::test_support::{db, seed_worker};

    fn payload(attendee_ids: Vec<Uuid>) -> CreateTraining {
        CreateTraining {
            topic: "Inducción de seguridad en obra".to_string(),
            training_type: Some(TrainingType::Induction),
            obra_id: None,
            date: NaiveDate::from_ymd_opt(2025, 7, 7).unwrap(),
            duration_hours: 4.0,
            instructor: None,
            location: Some("Caseta de obra".to_string()),
            attendee_ids,
        }
    }

    #[tokio::test]
    async fn roster_is_created_with_the_session() {
        let db = db().await;
        let ana = seed_worker(&db.pool, "47000001", 70.0).await;
        let luis = seed_worker(&db.pool, "47000002", 70.0).await;
        let service = TrainingService::new(db.pool.clone());

        let detail = service.create(&payload(vec![ana.id, luis.id])).await.unwrap();
        assert_eq!(detail.attendees.len(), 2);
        assert!(detail.attendees.iter().all(|a| !a.attended && a.score.is_none()));
    }

    #[tokio::test]
    async fn unknown_or_repeated_attendees_are_rejected() {
        let db = db().await;
        let ana = seed_worker(&db.pool, "47000003", 70.0).await;
        let service = TrainingService::new(db.pool.clone());

        let Err(TrainingError::Validation(errors)) = service
            .create(&payload(vec![ana.id, ana.id, Uuid::new_v4()]))
            .await
        else {
            panic!("expected validation error");
        };
        assert!(errors.fields().contains_key("attendee_ids.1"));
        assert!(errors.fields().contains_key("attendee_ids.2"));
        assert_eq!(Training::count(&db.pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn enrolling_twice_is_a_field_error() {
        let db = db().await;
        let ana = seed_worker(&db.pool, "47000004", 70.0).await;
        let service = TrainingService::new(db.pool.clone());
        let detail = service.create(&payload(vec![])).await.unwrap();
        let id = detail.training.id;

        let roster = service
            .add_attendee(id, &AddTrainingAttendee { worker_id: ana.id })
            .await
            .unwrap();
        assert_eq!(roster.len(), 1);

        let Err(TrainingError::Validation(errors)) = service
            .add_attendee(id, &AddTrainingAttendee { worker_id: ana.id })
            .await
        else {
            panic!("expected validation error");
        };
        assert!(errors.fields().contains_key("worker_id"));
    }

    #[tokio::test]
    async fn grading_and_removal() {
        let db = db().await;
        let ana = seed_worker(&db.pool, "47000005", 70.0).await;
        let service = TrainingService::new(db.pool.clone());
        let id = service.create(&payload(vec![ana.id])).await.unwrap().training.id;

        let roster = service
            .update_attendee(
                id,
                ana.id,
                &UpdateTrainingAttendee {
                    attended: true,
                    score: Some(18.5),
                },
            )
            .await
            .unwrap();
        assert!(roster[0].attended);
        assert_eq!(roster[0].score, Some(18.5));

        assert!(matches!(
            service
                .update_attendee(id, ana.id, &UpdateTrainingAttendee { attended: true, score: Some(25.0) })
                .await,
            Err(TrainingError::Validation(_))
        ));

        service.remove_attendee(id, ana.id).await.unwrap();
        assert!(matches!(
            service.remove_attendee(id, ana.id).await,
            Err(TrainingError::AttendeeNotFound)
        ));
    }
}
