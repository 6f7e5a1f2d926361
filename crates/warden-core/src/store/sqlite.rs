//! SQLite storage backend
//!
//! Persistent storage using SQLite with WAL mode. The pool is capped at a
//! single connection: every mutating operation flows through one write
//! path, and each status transition runs its check-then-set plus audit row
//! inside one transaction on that connection.

use super::{Store, SYSTEM_ACTOR};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::info;
use warden_common::{
    Address, AddressPatch, AddressStatus, AddressWithSubnet, Assignment, Error, ExportRecord,
    HistoryAction, HistoryEntry, NewAddress, NewSubnet, Result, SearchFilter, StatusCounts,
    Subnet,
};

/// SQLite storage backend. See the module docs for the write-path model.
pub struct SqliteStore {
    pool: SqlitePool,
}

fn db_err(e: sqlx::Error) -> Error {
    if let sqlx::Error::Database(ref db) = e {
        if db.is_unique_violation() {
            return Error::Duplicate(db.message().to_string());
        }
    }
    Error::Storage(e.to_string())
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Storage(format!("bad timestamp {text:?}: {e}")))
}

fn parse_status(text: &str) -> Result<AddressStatus> {
    AddressStatus::parse(text).ok_or_else(|| Error::Storage(format!("bad status {text:?}")))
}

fn subnet_from_row(row: &SqliteRow) -> Result<Subnet> {
    Ok(Subnet {
        id: row.get("id"),
        cidr: row.get("cidr"),
        description: row.get("description"),
        gateway: row.get("gateway"),
        dns_server: row.get("dns_server"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
    })
}

fn address_from_row(row: &SqliteRow) -> Result<Address> {
    let allocated_at = match row.get::<Option<String>, _>("allocated_at") {
        Some(text) => Some(parse_timestamp(&text)?),
        None => None,
    };
    Ok(Address {
        id: row.get("id"),
        ip: row.get("ip"),
        subnet_id: row.get("subnet_id"),
        status: parse_status(&row.get::<String, _>("status"))?,
        allocated_to: row.get("allocated_to"),
        mac: row.get("mac"),
        device_type: row.get("device_type"),
        allocated_at,
        notes: row.get("notes"),
        last_updated: parse_timestamp(&row.get::<String, _>("last_updated"))?,
    })
}

fn counts_from_row(row: &SqliteRow) -> StatusCounts {
    let as_u64 = |v: i64| u64::try_from(v).unwrap_or(0);
    StatusCounts {
        total: as_u64(row.get("total")),
        used: as_u64(row.get("used")),
        free: as_u64(row.get("free")),
        reserved: as_u64(row.get("reserved")),
    }
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path_str))
            .map_err(|e| Error::Storage(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .create_if_missing(true)
            .busy_timeout(std::time::Duration::from_secs(5));

        // One connection: the single write path. Transitions run inside a
        // transaction on this connection and can never interleave.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;

        let store = Self { pool };
        store.create_tables().await?;
        info!("sqlite store opened at {}", path_str);
        Ok(store)
    }

    async fn create_tables(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subnets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                cidr TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL DEFAULT '',
                gateway TEXT NOT NULL DEFAULT '',
                dns_server TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS addresses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ip TEXT NOT NULL UNIQUE,
                subnet_id INTEGER NOT NULL,
                status TEXT NOT NULL CHECK (status IN ('free', 'used', 'reserved')) DEFAULT 'free',
                allocated_to TEXT,
                mac TEXT,
                device_type TEXT,
                allocated_at TEXT,
                notes TEXT,
                last_updated TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_addresses_subnet ON addresses(subnet_id)")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_addresses_status ON addresses(status)")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ip TEXT NOT NULL,
                action TEXT NOT NULL,
                old_status TEXT,
                new_status TEXT NOT NULL,
                actor TEXT NOT NULL,
                notes TEXT,
                changed_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_history_ip ON history(ip)")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(())
    }
}

#[async_trait]
impl Store for SqliteStore {
    // === Subnet operations ===

    async fn insert_subnet(&self, subnet: &NewSubnet, addresses: &[NewAddress]) -> Result<Subnet> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let result = sqlx::query(
            "INSERT INTO subnets (cidr, description, gateway, dns_server, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&subnet.cidr)
        .bind(&subnet.description)
        .bind(&subnet.gateway)
        .bind(&subnet.dns_server)
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        let subnet_id = result.last_insert_rowid();

        for address in addresses {
            sqlx::query(
                "INSERT INTO addresses (ip, subnet_id, status, notes, last_updated) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&address.ip)
            .bind(subnet_id)
            .bind(address.status.as_str())
            .bind(&address.notes)
            .bind(now.to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;

        Ok(Subnet {
            id: subnet_id,
            cidr: subnet.cidr.clone(),
            description: subnet.description.clone(),
            gateway: subnet.gateway.clone(),
            dns_server: subnet.dns_server.clone(),
            created_at: now,
        })
    }

    async fn get_subnet(&self, cidr: &str) -> Result<Option<Subnet>> {
        let row = sqlx::query(
            "SELECT id, cidr, description, gateway, dns_server, created_at \
             FROM subnets WHERE cidr = ?",
        )
        .bind(cidr)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        match row {
            Some(row) => Ok(Some(subnet_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_subnets(&self) -> Result<Vec<Subnet>> {
        let rows = sqlx::query(
            "SELECT id, cidr, description, gateway, dns_server, created_at FROM subnets",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut subnets = Vec::with_capacity(rows.len());
        for row in rows {
            subnets.push(subnet_from_row(&row)?);
        }
        Ok(subnets)
    }

    async fn remove_subnet(&self, cidr: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let row = sqlx::query("SELECT id FROM subnets WHERE cidr = ?")
            .bind(cidr)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;
        let Some(row) = row else {
            return Err(Error::NotFound(format!("subnet {cidr}")));
        };
        let subnet_id: i64 = row.get("id");

        // Owned addresses first, then the subnet, inside one transaction.
        let removed = sqlx::query("DELETE FROM addresses WHERE subnet_id = ?")
            .bind(subnet_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected();

        sqlx::query("DELETE FROM subnets WHERE id = ?")
            .bind(subnet_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(removed)
    }

    async fn subnet_counts(&self, subnet_id: i64) -> Result<StatusCounts> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total, \
             COALESCE(SUM(CASE WHEN status = 'used' THEN 1 ELSE 0 END), 0) AS used, \
             COALESCE(SUM(CASE WHEN status = 'free' THEN 1 ELSE 0 END), 0) AS free, \
             COALESCE(SUM(CASE WHEN status = 'reserved' THEN 1 ELSE 0 END), 0) AS reserved \
             FROM addresses WHERE subnet_id = ?",
        )
        .bind(subnet_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(counts_from_row(&row))
    }

    async fn list_subnet_counts(&self) -> Result<Vec<(Subnet, StatusCounts)>> {
        let rows = sqlx::query(
            "SELECT s.id, s.cidr, s.description, s.gateway, s.dns_server, s.created_at, \
             COUNT(a.id) AS total, \
             COALESCE(SUM(CASE WHEN a.status = 'used' THEN 1 ELSE 0 END), 0) AS used, \
             COALESCE(SUM(CASE WHEN a.status = 'free' THEN 1 ELSE 0 END), 0) AS free, \
             COALESCE(SUM(CASE WHEN a.status = 'reserved' THEN 1 ELSE 0 END), 0) AS reserved \
             FROM subnets s \
             LEFT JOIN addresses a ON s.id = a.subnet_id \
             GROUP BY s.id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            result.push((subnet_from_row(&row)?, counts_from_row(&row)));
        }
        Ok(result)
    }

    // === Address operations ===

    async fn get_address(&self, ip: &str) -> Result<Option<Address>> {
        let row = sqlx::query(
            "SELECT id, ip, subnet_id, status, allocated_to, mac, device_type, allocated_at, \
             notes, last_updated FROM addresses WHERE ip = ?",
        )
        .bind(ip)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        match row {
            Some(row) => Ok(Some(address_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_addresses(
        &self,
        subnet_id: i64,
        status: Option<AddressStatus>,
    ) -> Result<Vec<Address>> {
        let mut sql = String::from(
            "SELECT id, ip, subnet_id, status, allocated_to, mac, device_type, allocated_at, \
             notes, last_updated FROM addresses WHERE subnet_id = ?",
        );
        if status.is_some() {
            sql.push_str(" AND status = ?");
        }

        let mut query = sqlx::query(&sql).bind(subnet_id);
        if let Some(status) = status {
            query = query.bind(status.as_str());
        }

        let rows = query.fetch_all(&self.pool).await.map_err(db_err)?;
        let mut addresses = Vec::with_capacity(rows.len());
        for row in rows {
            addresses.push(address_from_row(&row)?);
        }
        Ok(addresses)
    }

    async fn search_addresses(&self, filter: &SearchFilter) -> Result<Vec<AddressWithSubnet>> {
        let mut sql = String::from(
            "SELECT a.id, a.ip, a.subnet_id, a.status, a.allocated_to, a.mac, a.device_type, \
             a.allocated_at, a.notes, a.last_updated, \
             s.cidr AS subnet_cidr, s.description AS subnet_description \
             FROM addresses a \
             LEFT JOIN subnets s ON a.subnet_id = s.id \
             WHERE 1 = 1",
        );
        let mut params: Vec<String> = Vec::new();

        if let Some(subnet) = filter.subnet.as_deref() {
            sql.push_str(" AND s.cidr = ?");
            params.push(subnet.to_string());
        }
        if let Some(status) = filter.status {
            sql.push_str(" AND a.status = ?");
            params.push(status.as_str().to_string());
        }
        let keyword = filter.keyword.as_deref().map(str::trim).filter(|k| !k.is_empty());
        if let Some(keyword) = keyword {
            sql.push_str(
                " AND (a.ip LIKE ? OR a.allocated_to LIKE ? OR a.mac LIKE ? \
                 OR a.device_type LIKE ? OR a.notes LIKE ? OR s.cidr LIKE ? \
                 OR s.description LIKE ?)",
            );
            let pattern = format!("%{}%", keyword);
            for _ in 0..7 {
                params.push(pattern.clone());
            }
        }

        let mut query = sqlx::query(&sql);
        for param in &params {
            query = query.bind(param);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(db_err)?;
        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            result.push(AddressWithSubnet {
                address: address_from_row(&row)?,
                subnet_cidr: row.get("subnet_cidr"),
                subnet_description: row.get("subnet_description"),
            });
        }
        Ok(result)
    }

    async fn count_addresses(&self) -> Result<StatusCounts> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total, \
             COALESCE(SUM(CASE WHEN status = 'used' THEN 1 ELSE 0 END), 0) AS used, \
             COALESCE(SUM(CASE WHEN status = 'free' THEN 1 ELSE 0 END), 0) AS free, \
             COALESCE(SUM(CASE WHEN status = 'reserved' THEN 1 ELSE 0 END), 0) AS reserved \
             FROM addresses",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(counts_from_row(&row))
    }

    // === Status transitions ===

    async fn allocate_address(&self, ip: &str, assignment: &Assignment) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let row = sqlx::query("SELECT status FROM addresses WHERE ip = ?")
            .bind(ip)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;
        let Some(row) = row else {
            return Err(Error::NotFound(format!("address {ip}")));
        };
        let status = parse_status(&row.get::<String, _>("status"))?;
        if status != AddressStatus::Free {
            return Err(Error::InvalidTransition(format!(
                "address {ip} is {status}, cannot allocate"
            )));
        }

        let now = Utc::now();
        sqlx::query(
            "UPDATE addresses SET status = 'used', allocated_to = ?, mac = ?, device_type = ?, \
             allocated_at = ?, notes = ?, last_updated = ? WHERE ip = ?",
        )
        .bind(&assignment.allocated_to)
        .bind(&assignment.mac)
        .bind(&assignment.device_type)
        .bind(now.to_rfc3339())
        .bind(&assignment.notes)
        .bind(now.to_rfc3339())
        .bind(ip)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query(
            "INSERT INTO history (ip, action, old_status, new_status, actor, notes, changed_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(ip)
        .bind(HistoryAction::Allocate.as_str())
        .bind(AddressStatus::Free.as_str())
        .bind(AddressStatus::Used.as_str())
        .bind(&assignment.allocated_to)
        .bind(&assignment.notes)
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn release_address(&self, ip: &str, notes: Option<&str>) -> Result<AddressStatus> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let row = sqlx::query("SELECT status FROM addresses WHERE ip = ?")
            .bind(ip)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;
        let Some(row) = row else {
            return Err(Error::NotFound(format!("address {ip}")));
        };
        let prior = parse_status(&row.get::<String, _>("status"))?;

        let now = Utc::now();
        sqlx::query(
            "UPDATE addresses SET status = 'free', allocated_to = NULL, mac = NULL, \
             device_type = NULL, allocated_at = NULL, notes = NULL, last_updated = ? \
             WHERE ip = ?",
        )
        .bind(now.to_rfc3339())
        .bind(ip)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query(
            "INSERT INTO history (ip, action, old_status, new_status, actor, notes, changed_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(ip)
        .bind(HistoryAction::Release.as_str())
        .bind(prior.as_str())
        .bind(AddressStatus::Free.as_str())
        .bind(SYSTEM_ACTOR)
        .bind(notes)
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(prior)
    }

    async fn reserve_address(&self, ip: &str, notes: Option<&str>) -> Result<AddressStatus> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let row = sqlx::query("SELECT status FROM addresses WHERE ip = ?")
            .bind(ip)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;
        let Some(row) = row else {
            return Err(Error::NotFound(format!("address {ip}")));
        };
        let prior = parse_status(&row.get::<String, _>("status"))?;

        let now = Utc::now();
        sqlx::query(
            "UPDATE addresses SET status = 'reserved', notes = ?, last_updated = ? WHERE ip = ?",
        )
        .bind(notes)
        .bind(now.to_rfc3339())
        .bind(ip)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query(
            "INSERT INTO history (ip, action, old_status, new_status, actor, notes, changed_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(ip)
        .bind(HistoryAction::Reserve.as_str())
        .bind(prior.as_str())
        .bind(AddressStatus::Reserved.as_str())
        .bind(SYSTEM_ACTOR)
        .bind(notes)
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(prior)
    }

    async fn apply_patch(&self, ip: &str, patch: &AddressPatch) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let row = sqlx::query("SELECT id FROM addresses WHERE ip = ?")
            .bind(ip)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;
        if row.is_none() {
            return Err(Error::NotFound(format!("address {ip}")));
        }

        let now = Utc::now();
        match &patch.assignment {
            Some(assignment) => {
                sqlx::query(
                    "UPDATE addresses SET status = ?, allocated_to = ?, mac = ?, \
                     device_type = ?, notes = ?, last_updated = ? WHERE ip = ?",
                )
                .bind(patch.status.as_str())
                .bind(&assignment.allocated_to)
                .bind(&assignment.mac)
                .bind(&assignment.device_type)
                .bind(&assignment.notes)
                .bind(now.to_rfc3339())
                .bind(ip)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            }
            None => {
                sqlx::query("UPDATE addresses SET status = ?, last_updated = ? WHERE ip = ?")
                    .bind(patch.status.as_str())
                    .bind(now.to_rfc3339())
                    .bind(ip)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
            }
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    // === History ===

    async fn history_for_ip(&self, ip: &str) -> Result<Vec<HistoryEntry>> {
        let rows = sqlx::query(
            "SELECT id, ip, action, old_status, new_status, actor, notes, changed_at \
             FROM history WHERE ip = ? ORDER BY id DESC",
        )
        .bind(ip)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let action_text: String = row.get("action");
            let action = HistoryAction::parse(&action_text)
                .ok_or_else(|| Error::Storage(format!("bad history action {action_text:?}")))?;
            let old_status = match row.get::<Option<String>, _>("old_status") {
                Some(text) => Some(parse_status(&text)?),
                None => None,
            };
            entries.push(HistoryEntry {
                id: row.get("id"),
                ip: row.get("ip"),
                action,
                old_status,
                new_status: parse_status(&row.get::<String, _>("new_status"))?,
                actor: row.get("actor"),
                notes: row.get("notes"),
                changed_at: parse_timestamp(&row.get::<String, _>("changed_at"))?,
            });
        }
        Ok(entries)
    }

    // === Export ===

    async fn export_records(&self) -> Result<Vec<ExportRecord>> {
        let rows = sqlx::query(
            "SELECT s.id, s.cidr, s.description, s.gateway, s.dns_server, s.created_at, \
             a.id AS address_id, a.ip, a.subnet_id, a.status, a.allocated_to, a.mac, \
             a.device_type, a.allocated_at, a.notes, a.last_updated \
             FROM subnets s \
             LEFT JOIN addresses a ON s.id = a.subnet_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let subnet = subnet_from_row(&row)?;
            let address = match row.get::<Option<i64>, _>("address_id") {
                Some(address_id) => {
                    let allocated_at = match row.get::<Option<String>, _>("allocated_at") {
                        Some(text) => Some(parse_timestamp(&text)?),
                        None => None,
                    };
                    Some(Address {
                        id: address_id,
                        ip: row.get("ip"),
                        subnet_id: row.get("subnet_id"),
                        status: parse_status(&row.get::<String, _>("status"))?,
                        allocated_to: row.get("allocated_to"),
                        mac: row.get("mac"),
                        device_type: row.get("device_type"),
                        allocated_at,
                        notes: row.get("notes"),
                        last_updated: parse_timestamp(&row.get::<String, _>("last_updated"))?,
                    })
                }
                None => None,
            };
            records.push(ExportRecord { subnet, address });
        }
        Ok(records)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
