use crate::db::{
    parse_json, parse_level, parse_status, parse_uuid, required_timestamp, RecomputeMode, Schedule,
    ScheduleClassification,
};
use crate::error::{Result, TiermarkError};
use rusqlite::{named_params, OptionalExtension, Row};
use uuid::Uuid;

const SCHEDULE_COLUMNS: &str = "id, org_id, name, include_paths, exclude_paths, created_at";

const CLASSIFICATION_COLUMNS: &str =
    "schedule_id, org_id, level, data_types, auto_classified, status, classified_at";

pub trait SchedulesDatabase {
    fn add_schedule(&mut self, schedule: &Schedule) -> Result<()>;
    fn get_schedule(&self, id: Uuid) -> Result<Option<Schedule>>;
    fn list_schedules_by_org(&self, org_id: Uuid) -> Result<Vec<Schedule>>;
    fn list_all_schedules(&self) -> Result<Vec<Schedule>>;
    fn update_schedule_paths(
        &mut self,
        id: Uuid,
        include_paths: &[String],
        exclude_paths: &[String],
    ) -> Result<()>;
    fn get_schedule_classification(&self, schedule_id: Uuid) -> Result<Option<ScheduleClassification>>;
    /// Atomic create-or-update keyed by schedule id. With
    /// `RecomputeMode::PreserveOverride` an existing manual override is left
    /// untouched and `false` is returned.
    fn upsert_schedule_classification(
        &mut self,
        classification: &ScheduleClassification,
        mode: RecomputeMode,
    ) -> Result<bool>;
    fn list_schedule_classifications_by_org(&self, org_id: Uuid) -> Result<Vec<ScheduleClassification>>;
}

impl SchedulesDatabase for crate::db::SqliteDatabase {
    fn add_schedule(&mut self, schedule: &Schedule) -> Result<()> {
        let conn = self.conn_mut();
        conn.execute(
            "INSERT INTO schedules (id, org_id, name, include_paths, exclude_paths, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            (
                schedule.id.to_string(),
                schedule.org_id.to_string(),
                &schedule.name,
                serde_json::to_string(&schedule.include_paths)?,
                serde_json::to_string(&schedule.exclude_paths)?,
                schedule.created_at.to_rfc3339(),
            ),
        )?;
        Ok(())
    }

    fn get_schedule(&self, id: Uuid) -> Result<Option<Schedule>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("SELECT {} FROM schedules WHERE id = ?1", SCHEDULE_COLUMNS))?;
        let schedule = stmt.query_row([id.to_string()], parse_schedule_row).optional()?;
        Ok(schedule)
    }

    fn list_schedules_by_org(&self, org_id: Uuid) -> Result<Vec<Schedule>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM schedules WHERE org_id = ?1 ORDER BY created_at, id",
            SCHEDULE_COLUMNS
        ))?;

        let schedules = stmt
            .query_map([org_id.to_string()], parse_schedule_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(schedules)
    }

    fn list_all_schedules(&self) -> Result<Vec<Schedule>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM schedules ORDER BY org_id, created_at, id",
            SCHEDULE_COLUMNS
        ))?;

        let schedules = stmt
            .query_map([], parse_schedule_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(schedules)
    }

    fn update_schedule_paths(
        &mut self,
        id: Uuid,
        include_paths: &[String],
        exclude_paths: &[String],
    ) -> Result<()> {
        let conn = self.conn_mut();
        let rows = conn.execute(
            "UPDATE schedules SET include_paths = ?1, exclude_paths = ?2 WHERE id = ?3",
            (
                serde_json::to_string(include_paths)?,
                serde_json::to_string(exclude_paths)?,
                id.to_string(),
            ),
        )?;
        if rows == 0 {
            return Err(TiermarkError::ScheduleNotFound(id));
        }
        Ok(())
    }

    fn get_schedule_classification(&self, schedule_id: Uuid) -> Result<Option<ScheduleClassification>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM schedule_classifications WHERE schedule_id = ?1",
            CLASSIFICATION_COLUMNS
        ))?;

        let classification = stmt
            .query_row([schedule_id.to_string()], parse_classification_row)
            .optional()?;

        Ok(classification)
    }

    fn upsert_schedule_classification(
        &mut self,
        classification: &ScheduleClassification,
        mode: RecomputeMode,
    ) -> Result<bool> {
        let conn = self.conn_mut();
        // The override check lives in the statement itself so a concurrent
        // manual override cannot be lost between a read and this write.
        let rows = conn.execute(
            "INSERT INTO schedule_classifications
                 (schedule_id, org_id, level, data_types, auto_classified, status, classified_at)
             VALUES (:schedule_id, :org_id, :level, :data_types, :auto_classified, :status, :classified_at)
             ON CONFLICT(schedule_id) DO UPDATE SET
                 org_id = excluded.org_id,
                 level = excluded.level,
                 data_types = excluded.data_types,
                 auto_classified = excluded.auto_classified,
                 status = excluded.status,
                 classified_at = excluded.classified_at
             WHERE :force = 1 OR schedule_classifications.auto_classified = 1",
            named_params! {
                ":schedule_id": classification.schedule_id.to_string(),
                ":org_id": classification.org_id.to_string(),
                ":level": classification.level.as_str(),
                ":data_types": serde_json::to_string(&classification.data_types)?,
                ":auto_classified": classification.auto_classified,
                ":status": classification.status.as_str(),
                ":classified_at": classification.classified_at.to_rfc3339(),
                ":force": mode == RecomputeMode::Reset,
            },
        )?;
        Ok(rows > 0)
    }

    fn list_schedule_classifications_by_org(&self, org_id: Uuid) -> Result<Vec<ScheduleClassification>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM schedule_classifications WHERE org_id = ?1 ORDER BY classified_at",
            CLASSIFICATION_COLUMNS
        ))?;

        let classifications = stmt
            .query_map([org_id.to_string()], parse_classification_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(classifications)
    }
}

fn parse_schedule_row(row: &Row) -> rusqlite::Result<Schedule> {
    Ok(Schedule {
        id: parse_uuid(0, &row.get::<_, String>(0)?)?,
        org_id: parse_uuid(1, &row.get::<_, String>(1)?)?,
        name: row.get(2)?,
        include_paths: parse_json(3, &row.get::<_, String>(3)?)?,
        exclude_paths: parse_json(4, &row.get::<_, String>(4)?)?,
        created_at: required_timestamp(5, &row.get::<_, String>(5)?)?,
    })
}

fn parse_classification_row(row: &Row) -> rusqlite::Result<ScheduleClassification> {
    Ok(ScheduleClassification {
        schedule_id: parse_uuid(0, &row.get::<_, String>(0)?)?,
        org_id: parse_uuid(1, &row.get::<_, String>(1)?)?,
        level: parse_level(2, &row.get::<_, String>(2)?)?,
        data_types: parse_json(3, &row.get::<_, String>(3)?)?,
        auto_classified: row.get(4)?,
        status: parse_status(5, &row.get::<_, String>(5)?)?,
        classified_at: required_timestamp(6, &row.get::<_, String>(6)?)?,
    })
}
