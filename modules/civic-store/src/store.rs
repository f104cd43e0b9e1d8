// Postgres persistence for civic entries, representatives, proposals and localities.

use chrono::{DateTime, Utc};
use civic_common::{
    CivicEntry, ContactDetail, DataType, EntryData, IngestStats, Link, Locality, LocationKey,
    Proposal, Representative, SourceApi,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Result, StoreError};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

/// A row from the civic_entries table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct EntryRow {
    unique_id: String,
    data_type: String,
    source_api: String,
    source_url: Option<String>,
    jurisdiction_id: String,
    name: String,
    description: Option<String>,
    classification: Option<String>,
    start_date: Option<DateTime<Utc>>,
    location_name: Option<String>,
    raw_data: serde_json::Value,
    last_ingested_at: DateTime<Utc>,
}

impl TryFrom<EntryRow> for CivicEntry {
    type Error = StoreError;

    fn try_from(row: EntryRow) -> Result<Self> {
        let data_type = DataType::parse(&row.data_type).ok_or_else(|| StoreError::Corrupt {
            id: row.unique_id.clone(),
            reason: format!("unknown data_type {:?}", row.data_type),
        })?;
        let source_api = SourceApi::parse(&row.source_api).ok_or_else(|| StoreError::Corrupt {
            id: row.unique_id.clone(),
            reason: format!("unknown source_api {:?}", row.source_api),
        })?;

        Ok(CivicEntry {
            unique_id: row.unique_id,
            data_type,
            source_api,
            source_url: row.source_url,
            jurisdiction_id: row.jurisdiction_id,
            data: EntryData {
                name: row.name,
                description: row.description,
                classification: row.classification,
                start_date: row.start_date,
                location_name: row.location_name,
            },
            raw_data: row.raw_data,
            last_ingested_at: row.last_ingested_at,
        })
    }
}

/// A row from the representatives table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct RepresentativeRow {
    ocd_id: String,
    name: String,
    party: String,
    role: String,
    image: Option<String>,
    links: Json<Vec<Link>>,
    contact_details: Json<Vec<ContactDetail>>,
    location_keys: Vec<String>,
    last_updated_at: DateTime<Utc>,
}

impl From<RepresentativeRow> for Representative {
    fn from(row: RepresentativeRow) -> Self {
        Representative {
            ocd_id: row.ocd_id,
            name: row.name,
            party: row.party,
            role: row.role,
            image: row.image,
            links: row.links.0,
            contact_details: row.contact_details.0,
            location_keys: row.location_keys.into_iter().map(LocationKey::from_raw).collect(),
            last_updated_at: row.last_updated_at,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct ProposalRow {
    id: Uuid,
    title: String,
    description: String,
    category: String,
    creator_id: String,
    supporters: Vec<String>,
    supporter_count: i32,
    created_at: DateTime<Utc>,
}

impl From<ProposalRow> for Proposal {
    fn from(row: ProposalRow) -> Self {
        Proposal {
            id: row.id,
            title: row.title,
            description: row.description,
            category: row.category,
            creator_id: row.creator_id,
            supporters: row.supporters,
            supporter_count: row.supporter_count,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct LocalityRow {
    city: String,
    state: String,
    zip: Option<String>,
    street: Option<String>,
}

impl From<LocalityRow> for Locality {
    fn from(row: LocalityRow) -> Self {
        Locality {
            city: row.city,
            state: row.state,
            zip: row.zip,
            street: row.street,
        }
    }
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    // --- Civic entries ---

    /// Insert-or-replace every entry by `unique_id` in one transaction.
    pub async fn upsert_entries(&self, entries: &[CivicEntry]) -> Result<IngestStats> {
        let mut stats = IngestStats::default();
        if entries.is_empty() {
            return Ok(stats);
        }

        let mut tx = self.pool.begin().await?;
        for e in entries {
            let inserted = sqlx::query_scalar::<_, bool>(
                r#"
                INSERT INTO civic_entries
                    (unique_id, data_type, source_api, source_url, jurisdiction_id,
                     name, description, classification, start_date, location_name,
                     raw_data, last_ingested_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                ON CONFLICT (unique_id) DO UPDATE SET
                    data_type = EXCLUDED.data_type,
                    source_api = EXCLUDED.source_api,
                    source_url = EXCLUDED.source_url,
                    jurisdiction_id = EXCLUDED.jurisdiction_id,
                    name = EXCLUDED.name,
                    description = EXCLUDED.description,
                    classification = EXCLUDED.classification,
                    start_date = EXCLUDED.start_date,
                    location_name = EXCLUDED.location_name,
                    raw_data = EXCLUDED.raw_data,
                    last_ingested_at = EXCLUDED.last_ingested_at
                RETURNING (xmax = 0) AS inserted
                "#,
            )
            .bind(&e.unique_id)
            .bind(e.data_type.as_str())
            .bind(e.source_api.as_str())
            .bind(&e.source_url)
            .bind(&e.jurisdiction_id)
            .bind(&e.data.name)
            .bind(&e.data.description)
            .bind(&e.data.classification)
            .bind(e.data.start_date)
            .bind(&e.data.location_name)
            .bind(&e.raw_data)
            .bind(e.last_ingested_at)
            .fetch_one(&mut *tx)
            .await?;

            if inserted {
                stats.ingested += 1;
            } else {
                stats.updated += 1;
            }
        }
        tx.commit().await?;

        info!(ingested = stats.ingested, updated = stats.updated, "Upserted civic entries");
        Ok(stats)
    }

    /// Events starting within `[start, end]`, earliest first. No `end` means open-ended.
    pub async fn events_between(
        &self,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<CivicEntry>> {
        let rows = sqlx::query_as::<_, EntryRow>(
            r#"
            SELECT * FROM civic_entries
            WHERE data_type = 'event'
              AND start_date >= $1
              AND ($2::timestamptz IS NULL OR start_date <= $2)
            ORDER BY start_date ASC
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CivicEntry::try_from).collect()
    }

    pub async fn entry_by_id(&self, unique_id: &str) -> Result<Option<CivicEntry>> {
        let row = sqlx::query_as::<_, EntryRow>("SELECT * FROM civic_entries WHERE unique_id = $1")
            .bind(unique_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(CivicEntry::try_from).transpose()
    }

    // --- Representatives ---

    /// Insert-or-replace by `ocd_id`. Location keys and timestamp are overwritten.
    pub async fn upsert_representatives(&self, reps: &[Representative]) -> Result<u64> {
        if reps.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        for rep in reps {
            let keys: Vec<String> = rep.location_keys.iter().map(|k| k.to_string()).collect();
            sqlx::query(
                r#"
                INSERT INTO representatives
                    (ocd_id, name, party, role, image, links, contact_details,
                     location_keys, last_updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (ocd_id) DO UPDATE SET
                    name = EXCLUDED.name,
                    party = EXCLUDED.party,
                    role = EXCLUDED.role,
                    image = EXCLUDED.image,
                    links = EXCLUDED.links,
                    contact_details = EXCLUDED.contact_details,
                    location_keys = EXCLUDED.location_keys,
                    last_updated_at = EXCLUDED.last_updated_at
                "#,
            )
            .bind(&rep.ocd_id)
            .bind(&rep.name)
            .bind(&rep.party)
            .bind(&rep.role)
            .bind(&rep.image)
            .bind(Json(&rep.links))
            .bind(Json(&rep.contact_details))
            .bind(&keys)
            .bind(rep.last_updated_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        debug!(count = reps.len(), "Upserted representatives");
        Ok(reps.len() as u64)
    }

    /// Representatives tagged with ANY of `keys` and updated at or after `since`.
    pub async fn fresh_representatives(
        &self,
        keys: &[LocationKey],
        since: DateTime<Utc>,
    ) -> Result<Vec<Representative>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();

        let rows = sqlx::query_as::<_, RepresentativeRow>(
            r#"
            SELECT * FROM representatives
            WHERE location_keys && $1::text[]
              AND last_updated_at >= $2
            ORDER BY name ASC
            "#,
        )
        .bind(&keys)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Representative::from).collect())
    }

    // --- Proposals ---

    pub async fn append_proposal(&self, p: &Proposal) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO proposals
                (id, title, description, category, creator_id, supporters,
                 supporter_count, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(p.id)
        .bind(&p.title)
        .bind(&p.description)
        .bind(&p.category)
        .bind(&p.creator_id)
        .bind(&p.supporters)
        .bind(p.supporter_count)
        .bind(p.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Most supported first, then newest.
    pub async fn list_proposals(&self) -> Result<Vec<Proposal>> {
        let rows = sqlx::query_as::<_, ProposalRow>(
            "SELECT * FROM proposals ORDER BY supporter_count DESC, created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Proposal::from).collect())
    }

    // --- Localities ---

    /// Returns false when the city/state pair was already registered.
    pub async fn register_locality(&self, locality: &Locality) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO localities (city, state, zip, street)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(locality.city.trim())
        .bind(locality.state.trim())
        .bind(&locality.zip)
        .bind(&locality.street)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn localities(&self) -> Result<Vec<Locality>> {
        let rows = sqlx::query_as::<_, LocalityRow>(
            "SELECT city, state, zip, street FROM localities ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Locality::from).collect())
    }
}
