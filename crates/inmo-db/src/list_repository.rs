use inmo_core::error::AppError;
use inmo_core::models::ListValue;
use sqlx::SqlitePool;

use crate::error::map_db_err;

const DISPOSITION: &[&str] = &["frente", "contrafrente", "interno", "lateral"];
const ORIENTATION: &[&str] = &[
    "norte", "sur", "este", "oeste", "noreste", "noroeste", "sureste", "suroeste",
];
const STATUS: &[&str] = &["a estrenar", "a reciclar", "en construcción", "refaccionado", "excelente"];
const OPERATION: &[&str] = &["venta", "alquiler", "alquiler temporario"];
const CONDITION: &[&str] = &["vacía", "ocupada", "en sucesión"];

/// Named value lists for filter pickers.
#[derive(Clone)]
pub struct ListRepository {
    pool: SqlitePool,
}

impl ListRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Values of the named list. Lists without stored rows fall back to the
    /// built-in defaults; unknown names yield an empty list.
    pub async fn values(&self, name: &str) -> Result<Vec<ListValue>, AppError> {
        let rows: Vec<(i64, String, String, i64)> = sqlx::query_as(
            r#"
            SELECT v.id, v.value, v.display_name, v.sort_order
            FROM list_values v
            JOIN lists l ON l.id = v.list_id
            WHERE l.name = ?
            ORDER BY v.sort_order, v.display_name
            "#,
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;

        if rows.is_empty() {
            return Ok(default_values(name));
        }

        Ok(rows
            .into_iter()
            .map(|(id, value, display_name, sort_order)| ListValue {
                id,
                value,
                display_name,
                sort_order,
            })
            .collect())
    }
}

/// Built-in values for the known lists.
pub fn default_values(name: &str) -> Vec<ListValue> {
    let values = match name {
        "disposition" => DISPOSITION,
        "orientation" => ORIENTATION,
        "status" => STATUS,
        "operation" => OPERATION,
        "condition" => CONDITION,
        _ => &[],
    };

    values
        .iter()
        .zip(1i64..)
        .map(|(value, id)| ListValue {
            id,
            value: (*value).to_string(),
            display_name: title_case(value),
            sort_order: id,
        })
        .collect()
}

fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
