use sqlx::PgConnection;

/// Stored-procedure call with named arguments.
///
/// The result is rendered as JSON the way the data API does it: rows of a
/// set-returning function become an array, a scalar result is returned as is.
#[derive(Debug, Clone)]
pub struct RpcCall {
    function: String,
    args: Vec<(String, String, Option<String>)>,
}

impl RpcCall {
    pub fn new(function: &str) -> Self {
        Self {
            function: function.to_string(),
            args: Vec::new(),
        }
    }

    /// Adds `name => $n::cast`. `None` is bound as SQL NULL.
    pub fn arg(mut self, name: &str, cast: &str, value: Option<String>) -> Self {
        self.args.push((name.to_string(), cast.to_string(), value));
        self
    }

    pub fn sql(&self) -> String {
        let args: Vec<String> = self
            .args
            .iter()
            .enumerate()
            .map(|(i, (name, cast, _))| format!("{} => ${}::{}", name, i + 1, cast))
            .collect();
        format!(
            "SELECT COALESCE(jsonb_agg(to_jsonb(r)), '[]'::jsonb)::text FROM {}({}) AS r",
            self.function,
            args.join(", ")
        )
    }

    async fn fetch_rows(&self, conn: &mut PgConnection) -> Result<serde_json::Value, sqlx::Error> {
        let sql = self.sql();
        let mut query = sqlx::query_scalar::<_, String>(&sql);
        for (_, _, value) in &self.args {
            query = query.bind(value.as_deref());
        }
        let text = query.fetch_one(conn).await?;
        serde_json::from_str(&text).map_err(|e| sqlx::Error::Decode(Box::new(e)))
    }

    /// All rows; a single scalar array result is unwrapped.
    pub async fn fetch_many(&self, conn: &mut PgConnection) -> Result<Vec<serde_json::Value>, sqlx::Error> {
        tracing::debug!("rpc {} (many)", self.function);
        Ok(flatten_rows(self.fetch_rows(conn).await?))
    }

    /// First row (or the scalar result), `Null` when the function returned nothing.
    pub async fn fetch_one(&self, conn: &mut PgConnection) -> Result<serde_json::Value, sqlx::Error> {
        tracing::debug!("rpc {} (one)", self.function);
        Ok(first_row(self.fetch_rows(conn).await?))
    }
}

fn flatten_rows(value: serde_json::Value) -> Vec<serde_json::Value> {
    match value {
        serde_json::Value::Array(mut rows) => {
            if rows.len() == 1 && rows[0].is_array() {
                match rows.remove(0) {
                    serde_json::Value::Array(inner) => inner,
                    other => vec![other],
                }
            } else if rows.len() == 1 && rows[0].is_null() {
                Vec::new()
            } else {
                rows
            }
        }
        serde_json::Value::Null => Vec::new(),
        other => vec![other],
    }
}

fn first_row(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Array(mut rows) if !rows.is_empty() => rows.remove(0),
        serde_json::Value::Array(_) => serde_json::Value::Null,
        other => other,
    }
}
