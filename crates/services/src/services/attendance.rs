use db::models::{
    attendance::{
        Attendance, AttendanceDiscount, AttendanceStatus, CreateAttendance,
        CreateAttendanceDiscount, UpdateAttendance,
    },
    worker::Worker,
};
use sqlx::SqlitePool;
use thiserror::Error;
use utils::{
    money::round2,
    validation::{Validate, ValidationErrors},
};
use uuid::Uuid;

use super::references;

#[derive(Debug, Error)]
pub enum AttendanceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("attendance not found")]
    NotFound,
    #[error("discount not found")]
    DiscountNotFound,
}

#[derive(Clone)]
pub struct AttendanceService {
    pool: SqlitePool,
}

impl AttendanceService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn check(&self, data: &CreateAttendance, except: Option<Uuid>) -> Result<(), AttendanceError> {
        let mut errors = data.validate().err().unwrap_or_default();
        references::check_worker(&self.pool, "worker_id", data.worker_id, &mut errors).await?;
        references::check_obra(&self.pool, "obra_id", Some(data.obra_id), &mut errors).await?;
        if Attendance::exists_for_day(&self.pool, data.worker_id, data.date, except).await? {
            errors.add("date", "The worker already has an attendance record for this date.");
        }
        Ok(errors.into_result()?)
    }

    pub async fn create(&self, data: &CreateAttendance) -> Result<Attendance, AttendanceError> {
        self.check(data, None).await?;
        Ok(Attendance::create(&self.pool, data, Uuid::new_v4()).await?)
    }

    pub async fn update(
        &self,
        id: Uuid,
        data: &UpdateAttendance,
    ) -> Result<Attendance, AttendanceError> {
        if Attendance::find_by_id(&self.pool, id).await?.is_none() {
            return Err(AttendanceError::NotFound);
        }
        self.check(data, Some(id)).await?;
        Attendance::update(&self.pool, id, data)
            .await?
            .ok_or(AttendanceError::NotFound)
    }

    pub async fn discounts(&self, attendance_id: Uuid) -> Result<Vec<AttendanceDiscount>, AttendanceError> {
        if Attendance::find_by_id(&self.pool, attendance_id).await?.is_none() {
            return Err(AttendanceError::NotFound);
        }
        Ok(AttendanceDiscount::find_by_attendance_id(&self.pool, attendance_id).await?)
    }

    /// Without an explicit amount an absence is charged one day of the worker's position rate.
    pub async fn add_discount(
        &self,
        attendance_id: Uuid,
        data: &CreateAttendanceDiscount,
    ) -> Result<AttendanceDiscount, AttendanceError> {
        let attendance = Attendance::find_by_id(&self.pool, attendance_id)
            .await?
            .ok_or(AttendanceError::NotFound)?;
        data.validate()?;

        let amount = match data.amount {
            Some(amount) => {
                let amount = round2(amount);
                // stored with two decimals, so the floor applies after rounding
                if amount <= 0.0 {
                    return Err(
                        ValidationErrors::single("amount", "The amount must be at least 0.01.").into(),
                    );
                }
                amount
            }
            None if attendance.status == AttendanceStatus::Absent => {
                let worker = Worker::find_with_position(&self.pool, attendance.worker_id)
                    .await?
                    .ok_or(AttendanceError::NotFound)?;
                if round2(worker.daily_rate) <= 0.0 {
                    return Err(ValidationErrors::single(
                        "amount",
                        "The amount field is required when the position has no daily rate.",
                    )
                    .into());
                }
                round2(worker.daily_rate)
            }
            None => {
                return Err(ValidationErrors::single(
                    "amount",
                    "The amount field is required unless the worker was absent.",
                )
                .into());
            }
        };

        Ok(AttendanceDiscount::create(&self.pool, attendance_id, amount, &data.reason).await?)
    }

    pub async fn remove_discount(&self, attendance_id: Uuid, discount_id: Uuid) -> Result<(), AttendanceError> {
        if AttendanceDiscount::delete(&self.pool, attendance_id, discount_id).await? == 0 {
            return Err(AttendanceError::DiscountNotFound);
        }
        Ok(())
    }
}
