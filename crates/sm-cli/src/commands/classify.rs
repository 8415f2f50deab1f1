//! Classify command for previewing how an app identity is treated.

use std::io::Write;

use anyhow::Result;

use sm_core::classify;
use sm_db::Database;

pub fn run<W: Write>(writer: &mut W, db: &Database, app: &str) -> Result<()> {
    let rules = db.list_rules()?;
    let category = classify(app, &rules);
    writeln!(writer, "{app}: {category}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;
    use sm_core::{AppRule, Category};

    use super::*;

    #[test]
    fn classify_reports_rule_match_and_fallback() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_rule(&AppRule {
            pkg_name_pattern: "com.twitter.android".to_string(),
            category: Category::Distraction,
        })
        .unwrap();

        let mut output = Vec::new();
        run(&mut output, &db, "com.twitter.android").unwrap();
        run(&mut output, &db, "com.example.unknown").unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        com.twitter.android: distraction
        com.example.unknown: neutral
        ");
    }
}
