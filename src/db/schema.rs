//! PostgreSQL schema for players and inventory

use sqlx::PgPool;

pub const CREATE_PLAYERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS players (
    player_id           BIGINT PRIMARY KEY,
    player_name         TEXT NOT NULL DEFAULT '',
    player_money_amount NUMERIC NOT NULL DEFAULT 0
        CHECK (player_money_amount >= 0)
)
"#;

pub const CREATE_INVENTORY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS inventory (
    player_id BIGINT NOT NULL REFERENCES players (player_id),
    item_id   BIGINT NOT NULL,
    quantity  BIGINT NOT NULL DEFAULT 0 CHECK (quantity >= 0),
    PRIMARY KEY (player_id, item_id)
)
"#;

/// Create the tables if they do not exist yet
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Ensuring players/inventory schema");

    sqlx::query(CREATE_PLAYERS_TABLE).execute(pool).await?;
    sqlx::query(CREATE_INVENTORY_TABLE).execute(pool).await?;

    Ok(())
}
