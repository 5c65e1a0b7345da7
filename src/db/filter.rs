use serde::{Deserialize, Serialize};

/// Sort direction for list queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    #[default]
    Desc,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// Builds a dynamic WHERE clause with numbered placeholders.
///
/// Every parameter is bound as text and cast in SQL, so callers only ever
/// bind `String`s in the order returned by [`WhereClause::params`].
#[derive(Debug, Default, Clone)]
pub struct WhereClause {
    conditions: Vec<String>,
    params: Vec<String>,
}

impl WhereClause {
    pub fn new() -> Self {
        Self::default()
    }

    fn placeholder(&mut self, value: String, cast: &str) -> String {
        self.params.push(value);
        format!("${}::{}", self.params.len(), cast)
    }

    /// `column = $n::cast`
    pub fn eq(&mut self, column: &str, cast: &str, value: impl Into<String>) -> &mut Self {
        self.compare(column, "=", cast, value)
    }

    /// `column <op> $n::cast`
    pub fn compare(
        &mut self,
        column: &str,
        op: &str,
        cast: &str,
        value: impl Into<String>,
    ) -> &mut Self {
        let p = self.placeholder(value.into(), cast);
        self.conditions.push(format!("{} {} {}", column, op, p));
        self
    }

    /// A condition without parameters, e.g. `nuevo_hasta > NOW()`.
    pub fn raw(&mut self, condition: &str) -> &mut Self {
        self.conditions.push(condition.to_string());
        self
    }

    /// Case-insensitive substring match on any of `columns`. Blank terms add nothing.
    pub fn search(&mut self, columns: &[&str], term: &str) -> &mut Self {
        let term = term.trim();
        if term.is_empty() || columns.is_empty() {
            return self;
        }
        let p = self.placeholder(like_pattern(term), "text");
        let alternatives: Vec<String> = columns
            .iter()
            .map(|c| format!("{} ILIKE {}", c, p))
            .collect();
        self.conditions.push(format!("({})", alternatives.join(" OR ")));
        self
    }

    /// `(a = $n OR b = $m)` over `(column, cast, value)` triples.
    pub fn any_eq(&mut self, alternatives: &[(&str, &str, String)]) -> &mut Self {
        if alternatives.is_empty() {
            return self;
        }
        let mut parts = Vec::with_capacity(alternatives.len());
        for (column, cast, value) in alternatives {
            let p = self.placeholder(value.clone(), cast);
            parts.push(format!("{} = {}", column, p));
        }
        self.conditions.push(format!("({})", parts.join(" OR ")));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// `WHERE a AND b`, or an empty string when there are no conditions.
    pub fn sql(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }
}

/// `%term%` with LIKE metacharacters escaped.
pub fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_clause() {
        let clause = WhereClause::new();
        assert!(clause.is_empty());
        assert_eq!(clause.sql(), "");
        assert!(clause.params().is_empty());
    }

    #[test]
    fn test_placeholders_are_numbered_in_order() {
        let mut clause = WhereClause::new();
        clause
            .eq("id_localizacion", "bigint", "7")
            .search(&["nombre", "referencia"], "filtro")
            .eq("descontinuado", "boolean", "false")
            .raw("nuevo_hasta > NOW()");

        assert_eq!(
            clause.sql(),
            "WHERE id_localizacion = $1::bigint \
             AND (nombre ILIKE $2::text OR referencia ILIKE $2::text) \
             AND descontinuado = $3::boolean \
             AND nuevo_hasta > NOW()"
        );
        assert_eq!(clause.params(), &["7", "%filtro%", "false"]);
    }

    #[test]
    fn test_blank_search_is_ignored() {
        let mut clause = WhereClause::new();
        clause.search(&["nombre"], "   ");
        assert!(clause.is_empty());
    }

    #[test]
    fn test_any_eq_group() {
        let mut clause = WhereClause::new();
        clause.any_eq(&[
            ("id_usuario", "uuid", "u-1".to_string()),
            ("id_localizacion", "bigint", "3".to_string()),
        ]);
        assert_eq!(
            clause.sql(),
            "WHERE (id_usuario = $1::uuid OR id_localizacion = $2::bigint)"
        );
    }

    #[test]
    fn test_like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("filtro"), "%filtro%");
    }

    #[test]
    fn test_direction_sql() {
        assert_eq!(Direction::Asc.as_sql(), "ASC");
        assert_eq!(Direction::default().as_sql(), "DESC");
    }
}
