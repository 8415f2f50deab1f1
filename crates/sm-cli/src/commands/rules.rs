//! Rules command for managing classification rules.

use std::io::Write;

use anyhow::{Context, Result};

use sm_core::{AppRule, Category};
use sm_db::Database;

pub fn list<W: Write>(writer: &mut W, db: &Database, json: bool) -> Result<()> {
    let rules = db.list_rules()?;
    if json {
        serde_json::to_writer_pretty(&mut *writer, &rules)?;
        writeln!(writer)?;
        return Ok(());
    }
    if rules.is_empty() {
        writeln!(writer, "No rules configured.")?;
        return Ok(());
    }
    for rule in rules {
        writeln!(writer, "{}: {}", rule.pkg_name_pattern, rule.category)?;
    }
    Ok(())
}

pub fn set<W: Write>(writer: &mut W, db: &Database, pattern: &str, category: &str) -> Result<()> {
    let category: Category = category
        .parse()
        .with_context(|| format!("invalid category '{category}' (expected work, distraction, or neutral)"))?;
    db.upsert_rule(&AppRule {
        pkg_name_pattern: pattern.to_string(),
        category,
    })?;
    writeln!(writer, "{pattern}: {category}")?;
    Ok(())
}
