// Copyright 2026 Tierdesk contributors
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use rusqlite::types::Value;
use rusqlite::{Connection, params, params_from_iter};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tierdesk_app::{
    Account, AccountId, CountQuery, RowQuery, SortField, Tier, UserId, UserRef,
};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

pub const APP_NAME: &str = "tierdesk";

const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[
    (
        "users",
        &["id", "name", "is_active", "created_at", "updated_at"],
    ),
    (
        "accounts",
        &[
            "id",
            "name",
            "phone",
            "tier",
            "owner_id",
            "last_modified_by_id",
            "created_at",
            "updated_at",
        ],
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RequiredIndex {
    name: &'static str,
    create_sql: &'static str,
}

const REQUIRED_INDEXES: &[RequiredIndex] = &[
    RequiredIndex {
        name: "idx_accounts_tier",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_accounts_tier ON accounts (tier);",
    },
    RequiredIndex {
        name: "idx_accounts_owner_id",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_accounts_owner_id ON accounts (owner_id);",
    },
    RequiredIndex {
        name: "idx_accounts_name",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_accounts_name ON accounts (name);",
    },
    RequiredIndex {
        name: "idx_accounts_updated_at",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_accounts_updated_at ON accounts (updated_at);",
    },
    RequiredIndex {
        name: "idx_users_is_active",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_users_is_active ON users (is_active);",
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub name: String,
    pub phone: String,
    pub tier: Tier,
    pub owner_id: Option<UserId>,
    pub last_modified_by_id: Option<UserId>,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    pub fn bootstrap(&self) -> Result<()> {
        if has_user_tables(&self.conn)? {
            validate_schema(&self.conn)?;
        } else {
            self.conn
                .execute_batch(include_str!("sql/schema.sql"))
                .context("create schema")?;
        }

        ensure_required_indexes(&self.conn)?;
        Ok(())
    }

    pub fn insert_user(&self, user: &NewUser) -> Result<UserId> {
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO users (name, is_active, created_at, updated_at)
                VALUES (?, ?, ?, ?)
                ",
                params![user.name, user.is_active, now, now],
            )
            .context("insert user")?;
        Ok(UserId::new(self.conn.last_insert_rowid()))
    }

    pub fn insert_account(&self, account: &NewAccount) -> Result<AccountId> {
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO accounts (
                  name, phone, tier, owner_id, last_modified_by_id,
                  created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                ",
                params![
                    account.name,
                    account.phone,
                    account.tier.as_str(),
                    account.owner_id.map(UserId::get),
                    account.last_modified_by_id.map(UserId::get),
                    now,
                    now,
                ],
            )
            .context("insert account")?;
        Ok(AccountId::new(self.conn.last_insert_rowid()))
    }

    pub fn list_active_users(&self) -> Result<Vec<UserRef>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT id, name
                FROM users
                WHERE is_active = 1
                ORDER BY name ASC, id ASC
                ",
            )
            .context("prepare active users query")?;
        let rows = stmt
            .query_map([], |row| {
                let id: i64 = row.get(0)?;
                let name: String = row.get(1)?;
                Ok(UserRef {
                    id: UserId::new(id),
                    name,
                })
            })
            .context("query active users")?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect active users")
    }

    pub fn query_accounts(&self, query: &RowQuery) -> Result<Vec<Account>> {
        let mut sql = String::from(
            "
            SELECT
              a.id, a.name, a.phone, a.tier,
              o.id, o.name, m.id, m.name, a.updated_at
            FROM accounts a
            LEFT JOIN users o ON o.id = a.owner_id
            LEFT JOIN users m ON m.id = a.last_modified_by_id
            WHERE a.tier = ?
            ",
        );
        let mut values: Vec<Value> = vec![Value::Text(query.tier.as_str().to_owned())];
        push_account_filters(
            &mut sql,
            &mut values,
            &query.name_filter,
            &query.phone_filter,
            query.owner_id,
        );

        sql.push_str(&format!(
            "ORDER BY {} {}, a.id DESC\nLIMIT ? OFFSET ?",
            sort_column(query.sort_field),
            query.sort_direction.as_str(),
        ));
        values.push(Value::Integer(i64::try_from(query.page_size)?));
        values.push(Value::Integer(i64::try_from(query.offset)?));

        let mut stmt = self.conn.prepare(&sql).context("prepare accounts query")?;
        let rows = stmt
            .query_map(params_from_iter(values), |row| {
                let tier_raw: String = row.get(3)?;
                let tier = Tier::parse(&tier_raw)
                    .ok_or_else(|| to_sql_error(anyhow!("unknown tier {tier_raw:?}")))?;
                let updated_at_raw: String = row.get(8)?;

                Ok(Account {
                    id: AccountId::new(row.get(0)?),
                    name: row.get(1)?,
                    phone: row.get(2)?,
                    tier,
                    owner: user_ref(row.get(4)?, row.get(5)?),
                    last_modified_by: user_ref(row.get(6)?, row.get(7)?),
                    updated_at: parse_datetime(&updated_at_raw).map_err(to_sql_error)?,
                })
            })
            .context("query accounts")?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect accounts")
    }

    pub fn count_accounts(&self, query: &CountQuery) -> Result<u64> {
        let mut sql = String::from("SELECT COUNT(*) FROM accounts a WHERE a.tier = ?\n");
        let mut values: Vec<Value> = vec![Value::Text(query.tier.as_str().to_owned())];
        push_account_filters(
            &mut sql,
            &mut values,
            &query.name_filter,
            &query.phone_filter,
            query.owner_id,
        );

        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(values), |row| row.get(0))
            .context("count accounts")?;
        Ok(u64::try_from(count)?)
    }

    /// Moves each account one tier up, saturating at tier 1. Runs as a single
    /// statement so a partial batch can never be observed.
    pub fn promote_accounts(&self, account_ids: &[AccountId]) -> Result<usize> {
        if account_ids.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; account_ids.len()].join(", ");
        let sql = format!(
            "
            UPDATE accounts
            SET
              tier = CASE tier
                WHEN '{tier_3}' THEN '{tier_2}'
                WHEN '{tier_2}' THEN '{tier_1}'
                ELSE tier
              END,
              updated_at = ?
            WHERE id IN ({placeholders})
            ",
            tier_1 = Tier::One.as_str(),
            tier_2 = Tier::Two.as_str(),
            tier_3 = Tier::Three.as_str(),
        );

        let now = now_rfc3339()?;
        let mut values: Vec<Value> = vec![now.into()];
        values.extend(account_ids.iter().map(|id| Value::Integer(id.get())));

        let rows_affected = self
            .conn
            .execute(&sql, params_from_iter(values))
            .context("promote accounts")?;
        Ok(rows_affected)
    }
}

fn push_account_filters(
    sql: &mut String,
    values: &mut Vec<Value>,
    name_filter: &str,
    phone_filter: &str,
    owner_id: Option<UserId>,
) {
    if !name_filter.is_empty() {
        sql.push_str("AND a.name LIKE ? ESCAPE '\\'\n");
        values.push(like_pattern(name_filter).into());
    }
    if !phone_filter.is_empty() {
        sql.push_str("AND a.phone LIKE ? ESCAPE '\\'\n");
        values.push(like_pattern(phone_filter).into());
    }
    if let Some(owner_id) = owner_id {
        sql.push_str("AND a.owner_id = ?\n");
        values.push(Value::Integer(owner_id.get()));
    }
}

fn sort_column(field: SortField) -> &'static str {
    match field {
        SortField::Name => "a.name",
        SortField::LastModifiedBy => "COALESCE(m.name, '')",
    }
}

/// Wraps a raw substring filter in `%` wildcards, escaping any wildcard
/// characters the user typed so they match literally.
fn like_pattern(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len() + 2);
    escaped.push('%');
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn user_ref(id: Option<i64>, name: Option<String>) -> Option<UserRef> {
    Some(UserRef {
        id: UserId::new(id?),
        name: name.unwrap_or_default(),
    })
}

pub fn default_db_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os("TIERDESK_DB_PATH") {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set TIERDESK_DB_PATH to a writable database path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("tierdesk.db"))
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "database path {path:?} looks like a URI ({scheme}://); pass a filesystem path instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!(
            "database path {path:?} contains '?'; remove query parameters and use a plain file path"
        );
    }

    Ok(())
}

fn has_user_tables(conn: &Connection) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "
            SELECT COUNT(*)
            FROM sqlite_master
            WHERE type = 'table'
              AND name NOT LIKE 'sqlite_%'
            ",
            [],
            |row| row.get(0),
        )
        .context("count user tables")?;
    Ok(count > 0)
}

fn validate_schema(conn: &Connection) -> Result<()> {
    for (table, required_columns) in REQUIRED_SCHEMA {
        if !table_exists(conn, table)? {
            bail!(
                "database is missing required table `{table}`; use a tierdesk-compatible database or migrate first"
            );
        }

        let columns = table_columns(conn, table)?;
        let missing: Vec<&str> = required_columns
            .iter()
            .copied()
            .filter(|column| !columns.contains(*column))
            .collect();

        if !missing.is_empty() {
            bail!(
                "table `{table}` is missing required columns: {}; run migration before launching",
                missing.join(", ")
            );
        }
    }

    Ok(())
}

fn ensure_required_indexes(conn: &Connection) -> Result<()> {
    for index in REQUIRED_INDEXES {
        conn.execute_batch(index.create_sql)
            .with_context(|| format!("ensure required index `{}`", index.name))?;
    }

    let existing_indexes = index_names(conn)?;
    let missing = REQUIRED_INDEXES
        .iter()
        .filter(|index| !existing_indexes.contains(index.name))
        .map(|index| index.name)
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        bail!(
            "database is missing required indexes: {}; run migration before launching",
            missing.join(", ")
        );
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "
            SELECT EXISTS(
              SELECT 1
              FROM sqlite_master
              WHERE type = 'table' AND name = ?
            )
            ",
            params![table],
            |row| row.get::<_, i64>(0),
        )
        .with_context(|| format!("check table existence for {table}"))?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .with_context(|| format!("inspect columns for {table}"))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .with_context(|| format!("query column info for {table}"))?;

    let names = rows
        .collect::<rusqlite::Result<BTreeSet<_>>>()
        .with_context(|| format!("collect columns for {table}"))?;
    Ok(names)
}

fn index_names(conn: &Connection) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(
            "
            SELECT name
            FROM sqlite_master
            WHERE type = 'index'
              AND name NOT LIKE 'sqlite_%'
            ORDER BY name ASC
            ",
        )
        .context("prepare index names query")?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .context("query index names")?;
    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .context("collect index names")
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("format current timestamp")
}

fn parse_datetime(raw: &str) -> Result<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(value);
    }

    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ) {
        return Ok(value.assume_utc());
    }

    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Ok(value.assume_utc());
    }

    bail!("unsupported datetime format {raw:?}")
}

fn to_sql_error(error: anyhow::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            error.to_string(),
        )),
    )
}

#[cfg(test)]
mod tests {
    use super::{NewAccount, NewUser, Store, like_pattern, validate_db_path};
    use tierdesk_app::{AccountId, SortDirection, SortField, Tier, TierPane, UserId};

    fn store() -> Store {
        let store = Store::open_memory().expect("open in-memory store");
        store.bootstrap().expect("bootstrap schema");
        store
    }

    fn user(store: &Store, name: &str, active: bool) -> UserId {
        store
            .insert_user(&NewUser {
                name: name.to_owned(),
                is_active: active,
            })
            .expect("insert user")
    }

    fn account(store: &Store, name: &str, phone: &str, tier: Tier, owner: Option<UserId>) -> AccountId {
        store
            .insert_account(&NewAccount {
                name: name.to_owned(),
                phone: phone.to_owned(),
                tier,
                owner_id: owner,
                last_modified_by_id: owner,
            })
            .expect("insert account")
    }

    fn tier_query(tier: Tier) -> tierdesk_app::RowQuery {
        TierPane::new(tier).derived_row_query(None)
    }

    #[test]
    fn open_on_disk_persists_between_sessions() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("tierdesk.db");

        {
            let store = Store::open(&path).expect("open on-disk store");
            store.bootstrap().expect("bootstrap");
            account(&store, "Persisted", "", Tier::One, None);
        }

        let store = Store::open(&path).expect("reopen store");
        store.bootstrap().expect("validate existing schema");
        let rows = store
            .query_accounts(&tier_query(Tier::One))
            .expect("query");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Persisted");
    }

    #[test]
    fn bootstrap_is_idempotent() {
        let store = store();
        store.bootstrap().expect("second bootstrap");
    }

    #[test]
    fn bootstrap_rejects_foreign_database() {
        let store = Store::open_memory().expect("open store");
        store
            .raw_connection()
            .execute_batch("CREATE TABLE unrelated (id INTEGER PRIMARY KEY);")
            .expect("create unrelated table");
        let err = store.bootstrap().expect_err("foreign schema must fail");
        assert!(err.to_string().contains("missing required table"));
    }

    #[test]
    fn query_accounts_filters_by_tier() {
        let store = store();
        account(&store, "Alpha", "", Tier::One, None);
        account(&store, "Beta", "", Tier::Two, None);

        let rows = store
            .query_accounts(&tier_query(Tier::One))
            .expect("query tier 1");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Alpha");
    }

    #[test]
    fn name_filter_is_a_case_sensitive_substring_match() {
        let store = store();
        account(&store, "Acme Widgets", "", Tier::One, None);
        account(&store, "Globex", "", Tier::One, None);

        let mut query = tier_query(Tier::One);
        query.name_filter = "Widget".to_owned();
        let rows = store.query_accounts(&query).expect("filtered query");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Acme Widgets");
    }

    #[test]
    fn like_wildcards_in_filters_match_literally() {
        let store = store();
        account(&store, "100% Juice Co", "", Tier::One, None);
        account(&store, "Regular Co", "", Tier::One, None);

        let mut query = tier_query(Tier::One);
        query.name_filter = "100%".to_owned();
        let rows = store.query_accounts(&query).expect("escaped query");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "100% Juice Co");
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("a_b%c\\d"), "%a\\_b\\%c\\\\d%");
    }

    #[test]
    fn owner_filter_restricts_rows() {
        let store = store();
        let robin = user(&store, "Robin Price", true);
        let kai = user(&store, "Kai Sato", true);
        account(&store, "Owned by Robin", "", Tier::Three, Some(robin));
        account(&store, "Owned by Kai", "", Tier::Three, Some(kai));
        account(&store, "Unowned", "", Tier::Three, None);

        let mut query = tier_query(Tier::Three);
        query.owner_id = Some(robin);
        let rows = store.query_accounts(&query).expect("owner query");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Owned by Robin");

        let count = store
            .count_accounts(&TierPane::new(Tier::Three).derived_count_query(Some(robin)))
            .expect("owner count");
        assert_eq!(count, 1);
    }

    #[test]
    fn sort_by_name_ascending() {
        let store = store();
        account(&store, "Zephyr", "", Tier::Two, None);
        account(&store, "Anvil", "", Tier::Two, None);

        let mut query = tier_query(Tier::Two);
        query.sort_field = SortField::Name;
        query.sort_direction = SortDirection::Asc;
        let rows = store.query_accounts(&query).expect("sorted query");
        assert_eq!(rows[0].name, "Anvil");
        assert_eq!(rows[1].name, "Zephyr");
    }

    #[test]
    fn pagination_windows_do_not_overlap() {
        let store = store();
        for index in 0..25 {
            account(&store, &format!("Account {index:02}"), "", Tier::One, None);
        }

        let mut pane = TierPane::new(Tier::One);
        pane.sort_field = SortField::Name;
        pane.sort_direction = SortDirection::Asc;
        pane.total_records = store
            .count_accounts(&pane.derived_count_query(None))
            .expect("count");
        assert_eq!(pane.total_records, 25);
        assert_eq!(pane.total_pages(), 3);

        pane.current_page = 3;
        let rows = store
            .query_accounts(&pane.derived_row_query(None))
            .expect("last page");
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].name, "Account 20");
    }

    #[test]
    fn query_decorates_owner_and_modifier_names() {
        let store = store();
        let robin = user(&store, "Robin Price", true);
        account(&store, "Decorated", "555-0100", Tier::One, Some(robin));

        let rows = store
            .query_accounts(&tier_query(Tier::One))
            .expect("query");
        let owner = rows[0].owner.as_ref().expect("owner present");
        assert_eq!(owner.name, "Robin Price");
        let modifier = rows[0].last_modified_by.as_ref().expect("modifier present");
        assert_eq!(modifier.name, "Robin Price");
    }

    #[test]
    fn list_active_users_excludes_inactive() {
        let store = store();
        user(&store, "Active One", true);
        user(&store, "Benched", false);

        let users = store.list_active_users().expect("list users");
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].name, "Active One");
    }

    #[test]
    fn promote_moves_accounts_up_one_tier() {
        let store = store();
        let a = account(&store, "Third", "", Tier::Three, None);
        let b = account(&store, "Second", "", Tier::Two, None);
        let c = account(&store, "Top", "", Tier::One, None);

        let affected = store.promote_accounts(&[a, b, c]).expect("promote");
        assert_eq!(affected, 3);

        let count = |tier: Tier| {
            store
                .count_accounts(&TierPane::new(tier).derived_count_query(None))
                .expect("count")
        };
        assert_eq!(count(Tier::One), 2);
        assert_eq!(count(Tier::Two), 1);
        assert_eq!(count(Tier::Three), 0);
    }

    #[test]
    fn promote_with_no_ids_is_a_no_op() {
        let store = store();
        assert_eq!(store.promote_accounts(&[]).expect("empty promote"), 0);
    }

    #[test]
    fn validate_db_path_rejects_uris() {
        assert!(validate_db_path(":memory:").is_ok());
        assert!(validate_db_path("/tmp/tierdesk.db").is_ok());
        assert!(validate_db_path("").is_err());
        assert!(validate_db_path("file:tierdesk.db").is_err());
        assert!(validate_db_path("https://example.com/db").is_err());
        assert!(validate_db_path("/tmp/db?mode=ro").is_err());
    }
}
