//! Cliff fact persistence. Facts are appended, never updated in place:
//! each computation is a new row keyed (family_id, computed_at).

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use patfam_core::cliff::{Adjustment, CliffFact, CliffStatus};
use patfam_core::errors::PatfamResult;

use crate::to_store_err;

fn status_str(status: CliffStatus) -> &'static str {
    match status {
        CliffStatus::Active => "active",
        CliffStatus::NearCliff => "near_cliff",
        CliffStatus::Expired => "expired",
    }
}

fn parse_status(raw: &str) -> PatfamResult<CliffStatus> {
    match raw {
        "active" => Ok(CliffStatus::Active),
        "near_cliff" => Ok(CliffStatus::NearCliff),
        "expired" => Ok(CliffStatus::Expired),
        other => Err(to_store_err(format!("unknown cliff status: {other}"))),
    }
}

/// Append one computed fact. Recomputing at the same instant replaces
/// the row (same computation, not a new one).
pub fn append(conn: &Connection, fact: &CliffFact) -> PatfamResult<()> {
    let adjustments_json = serde_json::to_string(&fact.adjustments)?;
    conn.execute(
        "INSERT INTO cliff_facts
            (family_id, base_term_end, adjustments, effective_expiry, status, as_of, computed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT (family_id, computed_at) DO UPDATE SET
            base_term_end = excluded.base_term_end,
            adjustments = excluded.adjustments,
            effective_expiry = excluded.effective_expiry,
            status = excluded.status,
            as_of = excluded.as_of",
        params![
            fact.family_id,
            fact.base_term_end.to_string(),
            adjustments_json,
            fact.effective_expiry.to_string(),
            status_str(fact.status),
            fact.as_of.to_string(),
            fact.computed_at.to_rfc3339(),
        ],
    )
    .map_err(|e| to_store_err(format!("cliff append: {e}")))?;
    Ok(())
}

/// The most recently computed fact for one family.
pub fn latest(conn: &Connection, family_id: &str) -> PatfamResult<Option<CliffFact>> {
    conn.query_row(
        "SELECT family_id, base_term_end, adjustments, effective_expiry, status, as_of, computed_at
         FROM cliff_facts WHERE family_id = ?1
         ORDER BY computed_at DESC LIMIT 1",
        params![family_id],
        row_to_fact,
    )
    .optional()
    .map_err(|e| to_store_err(format!("cliff latest: {e}")))?
    .transpose()
}

/// Full computation history for one family, oldest first.
pub fn history(conn: &Connection, family_id: &str) -> PatfamResult<Vec<CliffFact>> {
    let mut stmt = conn
        .prepare(
            "SELECT family_id, base_term_end, adjustments, effective_expiry, status, as_of, computed_at
             FROM cliff_facts WHERE family_id = ?1 ORDER BY computed_at",
        )
        .map_err(|e| to_store_err(format!("cliff history prepare: {e}")))?;
    let rows = stmt
        .query_map(params![family_id], row_to_fact)
        .map_err(|e| to_store_err(format!("cliff history query: {e}")))?;
    let mut facts = Vec::new();
    for row in rows {
        facts.push(row.map_err(|e| to_store_err(e.to_string()))??);
    }
    Ok(facts)
}

/// Latest fact per family, filtered to one status, soonest expiry first.
pub fn with_status(conn: &Connection, status: CliffStatus) -> PatfamResult<Vec<CliffFact>> {
    let mut stmt = conn
        .prepare(
            "SELECT family_id, base_term_end, adjustments, effective_expiry, status, as_of, computed_at
             FROM cliff_facts c
             WHERE c.computed_at = (SELECT MAX(computed_at) FROM cliff_facts
                                    WHERE family_id = c.family_id)
               AND c.status = ?1
             ORDER BY effective_expiry",
        )
        .map_err(|e| to_store_err(format!("cliff prepare: {e}")))?;
    let rows = stmt
        .query_map(params![status_str(status)], row_to_fact)
        .map_err(|e| to_store_err(format!("cliff query: {e}")))?;
    let mut facts = Vec::new();
    for row in rows {
        facts.push(row.map_err(|e| to_store_err(e.to_string()))??);
    }
    Ok(facts)
}

/// Remove all facts of an absorbed family.
pub fn delete(conn: &Connection, family_id: &str) -> PatfamResult<()> {
    conn.execute("DELETE FROM cliff_facts WHERE family_id = ?1", params![family_id])
        .map_err(|e| to_store_err(format!("cliff delete: {e}")))?;
    Ok(())
}

fn row_to_fact(row: &rusqlite::Row<'_>) -> rusqlite::Result<PatfamResult<CliffFact>> {
    let family_id: String = row.get(0)?;
    let base_term_end: String = row.get(1)?;
    let adjustments_json: String = row.get(2)?;
    let effective_expiry: String = row.get(3)?;
    let status: String = row.get(4)?;
    let as_of: String = row.get(5)?;
    let computed_at: String = row.get(6)?;
    Ok(build_fact(
        family_id,
        base_term_end,
        adjustments_json,
        effective_expiry,
        status,
        as_of,
        computed_at,
    ))
}

fn build_fact(
    family_id: String,
    base_term_end: String,
    adjustments_json: String,
    effective_expiry: String,
    status: String,
    as_of: String,
    computed_at: String,
) -> PatfamResult<CliffFact> {
    let parse_date = |raw: &str| {
        raw.parse::<NaiveDate>()
            .map_err(|e| to_store_err(format!("bad cliff date '{raw}': {e}")))
    };
    let adjustments: Vec<Adjustment> = serde_json::from_str(&adjustments_json)?;
    Ok(CliffFact {
        family_id,
        base_term_end: parse_date(&base_term_end)?,
        adjustments,
        effective_expiry: parse_date(&effective_expiry)?,
        status: parse_status(&status)?,
        as_of: parse_date(&as_of)?,
        computed_at: DateTime::parse_from_rfc3339(&computed_at)
            .map_err(|e| to_store_err(format!("bad computed_at: {e}")))?
            .with_timezone(&Utc),
    })
}
