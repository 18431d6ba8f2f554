//! Migrations embedded at compile time

pub struct Migration {
    pub id: &'static str,
    pub sql: &'static str,
}

/// All migrations in application order
pub fn get_migrations() -> Vec<Migration> {
    vec![
        Migration {
            id: "001_initial_schema",
            sql: include_str!("../../migrations/001_initial_schema.sql"),
        },
        Migration {
            id: "002_website_metadata_and_icons",
            sql: include_str!("../../migrations/002_website_metadata_and_icons.sql"),
        },
        Migration {
            id: "003_audit_log",
            sql: include_str!("../../migrations/003_audit_log.sql"),
        },
    ]
}
