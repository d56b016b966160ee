use crate::db::{parse_json, parse_level, parse_optional_uuid, required_timestamp, ClassificationRule};
use crate::error::{Result, TiermarkError};
use chrono::Utc;
use rusqlite::{named_params, OptionalExtension, Row};
use uuid::Uuid;

const RULE_COLUMNS: &str = "id, org_id, name, pattern, level, data_types, description,
                            is_builtin, priority, enabled, created_at, updated_at";

pub trait RulesDatabase {
    fn create_rule(&mut self, rule: &ClassificationRule) -> Result<i64>;
    fn get_rule(&self, id: i64) -> Result<Option<ClassificationRule>>;
    fn update_rule(&mut self, rule: &ClassificationRule) -> Result<()>;
    fn delete_rule(&mut self, id: i64) -> Result<()>;
    fn set_rule_enabled(&mut self, id: i64, enabled: bool) -> Result<()>;
    /// Built-ins plus the organization's own rules. Disabled rules are
    /// included; callers filter on `enabled`.
    fn list_rules(&self, org_id: Uuid) -> Result<Vec<ClassificationRule>>;
    fn list_builtin_rules(&self) -> Result<Vec<ClassificationRule>>;
}

impl RulesDatabase for crate::db::SqliteDatabase {
    fn create_rule(&mut self, rule: &ClassificationRule) -> Result<i64> {
        let conn = self.conn_mut();
        conn.execute(
            "INSERT INTO classification_rules (org_id, name, pattern, level, data_types,
                                               description, is_builtin, priority, enabled,
                                               created_at, updated_at)
             VALUES (:org_id, :name, :pattern, :level, :data_types,
                     :description, :is_builtin, :priority, :enabled,
                     :created_at, :updated_at)",
            named_params! {
                ":org_id": rule.org_id.map(|id| id.to_string()),
                ":name": &rule.name,
                ":pattern": &rule.pattern,
                ":level": rule.level.as_str(),
                ":data_types": serde_json::to_string(&rule.data_types)?,
                ":description": &rule.description,
                ":is_builtin": rule.is_builtin,
                ":priority": rule.priority,
                ":enabled": rule.enabled,
                ":created_at": rule.created_at.to_rfc3339(),
                ":updated_at": rule.updated_at.to_rfc3339(),
            },
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn get_rule(&self, id: i64) -> Result<Option<ClassificationRule>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM classification_rules WHERE id = ?1",
            RULE_COLUMNS
        ))?;

        let rule = stmt.query_row([id], parse_rule_row).optional()?;
        Ok(rule)
    }

    fn update_rule(&mut self, rule: &ClassificationRule) -> Result<()> {
        let conn = self.conn_mut();
        let rows = conn.execute(
            "UPDATE classification_rules
             SET name = :name, pattern = :pattern, level = :level, data_types = :data_types,
                 description = :description, priority = :priority, enabled = :enabled,
                 updated_at = :updated_at
             WHERE id = :id",
            named_params! {
                ":id": rule.id,
                ":name": &rule.name,
                ":pattern": &rule.pattern,
                ":level": rule.level.as_str(),
                ":data_types": serde_json::to_string(&rule.data_types)?,
                ":description": &rule.description,
                ":priority": rule.priority,
                ":enabled": rule.enabled,
                ":updated_at": Utc::now().to_rfc3339(),
            },
        )?;
        if rows == 0 {
            return Err(TiermarkError::RuleNotFound(rule.id));
        }
        Ok(())
    }

    fn delete_rule(&mut self, id: i64) -> Result<()> {
        let conn = self.conn_mut();
        let rows = conn.execute("DELETE FROM classification_rules WHERE id = ?1", [id])?;
        if rows == 0 {
            return Err(TiermarkError::RuleNotFound(id));
        }
        Ok(())
    }

    fn set_rule_enabled(&mut self, id: i64, enabled: bool) -> Result<()> {
        let conn = self.conn_mut();
        let rows = conn.execute(
            "UPDATE classification_rules SET enabled = ?1, updated_at = ?2 WHERE id = ?3",
            (enabled, Utc::now().to_rfc3339(), id),
        )?;
        if rows == 0 {
            return Err(TiermarkError::RuleNotFound(id));
        }
        Ok(())
    }

    fn list_rules(&self, org_id: Uuid) -> Result<Vec<ClassificationRule>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM classification_rules
             WHERE org_id = ?1 OR is_builtin = 1
             ORDER BY priority DESC, id",
            RULE_COLUMNS
        ))?;

        let rules = stmt
            .query_map([org_id.to_string()], parse_rule_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rules)
    }

    fn list_builtin_rules(&self) -> Result<Vec<ClassificationRule>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM classification_rules WHERE is_builtin = 1 ORDER BY priority DESC, id",
            RULE_COLUMNS
        ))?;

        let rules = stmt
            .query_map([], parse_rule_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rules)
    }
}

fn parse_rule_row(row: &Row) -> rusqlite::Result<ClassificationRule> {
    Ok(ClassificationRule {
        id: row.get(0)?,
        org_id: parse_optional_uuid(1, row.get(1)?)?,
        name: row.get(2)?,
        pattern: row.get(3)?,
        level: parse_level(4, &row.get::<_, String>(4)?)?,
        data_types: parse_json(5, &row.get::<_, String>(5)?)?,
        description: row.get(6)?,
        is_builtin: row.get(7)?,
        priority: row.get(8)?,
        enabled: row.get(9)?,
        created_at: required_timestamp(10, &row.get::<_, String>(10)?)?,
        updated_at: required_timestamp(11, &row.get::<_, String>(11)?)?,
    })
}
