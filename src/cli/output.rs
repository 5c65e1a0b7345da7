//! Table rendering for list commands

use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::models::Page;

pub const EMPTY: &str = "Sin resultados";

pub fn print_table<T: Tabled>(rows: Vec<T>) {
    if rows.is_empty() {
        println!("{}", EMPTY);
        return;
    }
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);
}

/// Table followed by the pagination footer.
pub fn print_page<T, R, F>(page: &Page<T>, to_row: F)
where
    R: Tabled,
    F: Fn(&T) -> R,
{
    print_table(page.items.iter().map(to_row).collect());
    println!("{}", page_footer(page));
}

pub fn page_footer<T>(page: &Page<T>) -> String {
    let (first, last) = page.display_range();
    let mut footer = format!(
        "Mostrando {} a {} de {} registros",
        first, last, page.total_count
    );
    if page.page_count > 1 {
        footer.push_str(&format!(" (página {} de {})", page.page, page.page_count));
    }
    footer
}

pub fn opt(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| "-".to_string())
}

/// `YYYY-MM-DD` part of a timestamp rendered as text.
pub fn day(value: &Option<String>) -> String {
    match value.as_deref() {
        Some(v) => v.get(..10).unwrap_or(v).to_string(),
        None => "-".to_string(),
    }
}

pub fn yes_no(value: bool) -> &'static str {
    if value {
        "sí"
    } else {
        "no"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PageRequest;

    #[test]
    fn test_footer() {
        let page = Page::new(vec![1; 10], 35, PageRequest::new(2, 10));
        assert_eq!(
            page_footer(&page),
            "Mostrando 11 a 20 de 35 registros (página 2 de 4)"
        );

        let empty: Page<u8> = Page::empty(PageRequest::default());
        assert_eq!(page_footer(&empty), "Mostrando 0 a 0 de 0 registros");
    }

    #[test]
    fn test_day() {
        assert_eq!(day(&Some("2024-05-01 10:22:00+00".to_string())), "2024-05-01");
        assert_eq!(day(&None), "-");
    }
}
