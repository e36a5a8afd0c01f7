//! Markup adapter for Naver Finance market summary pages.

use scraper::{ElementRef, Html, Selector};
use url::Url;
use valuerank_core::{
    ColumnMap, FieldSet, ListingPage, Market, MetricField, Result, ScreenError, Site,
    SiteAdapter, Stage, Table,
};

/// Pagination link pointing at the last listing page.
const LAST_PAGE_LINK: &str = "td.pgRR > a";

/// Origin the listing's relative links resolve against.
const LINK_BASE: &str = "https://finance.naver.com/sise/";

/// Container of the metric filter form.
const FIELD_FORM: &str = "div.subcnt_sise_item_top";

/// The listing table.
const LISTING_TABLE: &str = "table.type_2";

/// Headers of the daily change columns; their cells never yield a value.
const EXCLUDED_HEADERS: [&str; 2] = ["전일비", "등락률"];

/// Class of the sequence-number cell that starts every data row.
const SEQUENCE_CLASS: &str = "no";

/// Parses Naver Finance market summary markup.
#[derive(Clone, Copy, Debug, Default)]
pub struct NaverAdapter;

impl NaverAdapter {
    /// Create a new adapter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Site for NaverAdapter {
    fn name(&self) -> &str {
        "Naver Finance"
    }

    fn description(&self) -> &str {
        "Naver Finance market summary table adapter"
    }

    fn supported_markets(&self) -> &[Market] {
        &[Market::Primary, Market::Secondary]
    }
}

impl SiteAdapter for NaverAdapter {
    fn discover_page_count(&self, page: &ListingPage) -> Result<u32> {
        page_count(&page.markup)
    }

    fn discover_fields(&self, page: &ListingPage) -> Result<FieldSet> {
        field_set(&page.markup)
    }

    fn parse_table(&self, page: &ListingPage) -> Result<Table> {
        listing_table(&page.markup, Stage::Page(page.page))
    }

    fn column_map(&self) -> ColumnMap {
        ColumnMap {
            name: "종목명".to_string(),
            price: "현재가".to_string(),
            per: "PER".to_string(),
            pbr: "PBR".to_string(),
            debt_total: "부채총계".to_string(),
            asset_total: "자산총계".to_string(),
        }
    }
}

fn selector(css: &str, stage: Stage) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| ScreenError::parse(stage, format!("invalid selector '{css}': {e}")))
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Returns the value of `key` in the query string of `href`, which may be
/// relative to the listing page.
fn query_param(href: &str, key: &str) -> Option<String> {
    let url = Url::parse(LINK_BASE).ok()?.join(href).ok()?;
    url.query_pairs()
        .find(|(k, _)| k.as_ref() == key)
        .map(|(_, v)| v.into_owned())
}

fn page_count(markup: &str) -> Result<u32> {
    let stage = Stage::PageCount;
    let doc = Html::parse_document(markup);

    let link = doc
        .select(&selector(LAST_PAGE_LINK, stage)?)
        .next()
        .ok_or_else(|| ScreenError::parse(stage, format!("'{LAST_PAGE_LINK}' not found")))?;
    let href = link
        .value()
        .attr("href")
        .ok_or_else(|| ScreenError::parse(stage, "last page link has no href"))?;
    let value = query_param(href, "page").ok_or_else(|| {
        ScreenError::parse(stage, format!("no page parameter in last page link '{href}'"))
    })?;

    let count: u32 = value
        .parse()
        .map_err(|_| ScreenError::parse(stage, format!("invalid page number '{value}'")))?;
    if count == 0 {
        return Err(ScreenError::parse(stage, "last page number is 0"));
    }

    Ok(count)
}

fn field_set(markup: &str) -> Result<FieldSet> {
    let stage = Stage::FieldSelection;
    let doc = Html::parse_document(markup);

    let form = doc
        .select(&selector(FIELD_FORM, stage)?)
        .next()
        .ok_or_else(|| ScreenError::parse(stage, format!("'{FIELD_FORM}' not found")))?;

    Ok(form
        .select(&selector("input", stage)?)
        .filter_map(|input| input.value().attr("value"))
        .filter_map(MetricField::from_id)
        .collect())
}

/// Extracts the value of one body cell, or `None` if the cell is skipped.
///
/// Only cells holding a link or carrying a class contribute. A cell with a
/// child element yields that element's text when it is a link and nothing
/// otherwise; a text-only cell yields its text without thousands separators.
fn cell_value(cell: ElementRef<'_>, link: &Selector) -> Option<String> {
    let has_link = cell.select(link).next().is_some();
    let has_class = cell.value().classes().next().is_some();
    if !has_link && !has_class {
        return None;
    }

    match cell.children().find_map(ElementRef::wrap) {
        Some(child) => child
            .value()
            .attr("href")
            .filter(|href| !href.is_empty())
            .map(|_| element_text(child)),
        None => Some(element_text(cell).replace(',', "")),
    }
}

fn listing_table(markup: &str, stage: Stage) -> Result<Table> {
    let doc = Html::parse_document(markup);

    let table = doc
        .select(&selector(LISTING_TABLE, stage)?)
        .next()
        .ok_or_else(|| ScreenError::parse(stage, format!("'{LISTING_TABLE}' not found")))?;

    let header_row = table
        .select(&selector("thead tr", stage)?)
        .next()
        .ok_or_else(|| ScreenError::parse(stage, "listing table has no header row"))?;
    let mut columns: Vec<String> = header_row
        .select(&selector("th", stage)?)
        .map(element_text)
        .filter(|text| !EXCLUDED_HEADERS.contains(&text.as_str()))
        .collect();
    // Trailing column is the discussion board link.
    if columns.pop().is_none() {
        return Err(ScreenError::parse(stage, "listing table has no header cells"));
    }

    let td = selector("td", stage)?;
    let link = selector("a", stage)?;
    let mut values = Vec::new();
    let mut sequence_cells = 0;

    // First body row repeats the header layout.
    for row in table.select(&selector("tbody tr", stage)?).skip(1) {
        let cells: Vec<ElementRef<'_>> = row.select(&td).collect();
        sequence_cells += cells
            .iter()
            .filter(|cell| cell.value().classes().any(|class| class == SEQUENCE_CLASS))
            .count();

        let Some((_, data_cells)) = cells.split_last() else {
            continue;
        };
        values.extend(data_cells.iter().filter_map(|cell| cell_value(*cell, &link)));
    }

    Table::from_flat(columns, values, sequence_cells, stage)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIRST_PAGE: &str = r#"
        <html><body>
        <div class="subcnt_sise_item_top">
          <table><tr>
            <td><input type="checkbox" name="fieldIds" value="quant" checked></td>
            <td><input type="checkbox" name="fieldIds" value="per" checked></td>
            <td><input type="checkbox" name="fieldIds" value="roe"></td>
            <td><input type="checkbox" name="fieldIds" value="frgn_rate"></td>
            <td><input type="checkbox" name="fieldIds" value="pbr"></td>
            <td><input type="checkbox" name="fieldIds" value="per"></td>
          </tr></table>
        </div>
        <table class="Nnavi"><tr>
          <td class="on"><a href="/sise/sise_market_sum.naver?sosok=0&amp;page=1">1</a></td>
          <td class="pgR"><a href="/sise/sise_market_sum.naver?sosok=0&amp;page=11">다음</a></td>
          <td class="pgRR"><a href="/sise/sise_market_sum.naver?sosok=0&amp;page=48">맨뒤</a></td>
        </tr></table>
        </body></html>
    "#;

    fn data_row(no: u32, name: &str, price: &str, per: &str, pbr: &str) -> String {
        format!(
            r#"<tr onMouseOver="mouseOver(this)">
              <td class="no">{no}</td>
              <td><a href="/item/main.naver?code=00{no}" class="tltle">{name}</a></td>
              <td class="number">{price}</td>
              <td class="number"><img src="ico_up.gif" alt="상승"><span class="tah red02">500</span></td>
              <td class="number"><span class="tah p11 red01">+0.71%</span></td>
              <td class="number">{per}</td>
              <td class="number">{pbr}</td>
              <td class="number">1,234</td>
              <td class="center"><a href="/item/board.naver?code=00{no}"><img src="ico_board.gif"></a></td>
            </tr>
            <tr><td class="division_line" colspan="9"></td></tr>"#
        )
    }

    fn table_page(rows: &str) -> String {
        format!(
            r#"<html><body>
            <table class="type_2">
              <thead><tr>
                <th>N</th><th>종목명</th><th>현재가</th><th>전일비</th><th>등락률</th>
                <th>PER</th><th>PBR</th><th>거래량</th><th>토론실</th>
              </tr></thead>
              <tbody>
                <tr><td class="blank_08" colspan="9"></td></tr>
                {rows}
                <tr><td class="blank_08" colspan="9"></td></tr>
              </tbody>
            </table>
            </body></html>"#
        )
    }

    fn page(markup: impl Into<String>) -> ListingPage {
        ListingPage::new(Market::Primary, 1, markup)
    }

    #[test]
    fn test_query_param() {
        assert_eq!(query_param("/a?sosok=0&page=48", "page").as_deref(), Some("48"));
        assert_eq!(query_param("sise_market_sum.nhn?page=7", "page").as_deref(), Some("7"));
        assert_eq!(query_param("/a?sosok=0&page=48#pagination", "page").as_deref(), Some("48"));
        assert_eq!(query_param("/a?sosok=0", "page"), None);
        assert_eq!(query_param("/a", "page"), None);
    }

    #[test]
    fn test_discover_page_count() {
        let count = NaverAdapter.discover_page_count(&page(FIRST_PAGE)).unwrap();
        assert_eq!(count, 48);
    }

    #[test]
    fn test_discover_page_count_link_with_fragment() {
        let markup = r#"<table><tr><td class="pgRR">
            <a href="/sise/sise_market_sum.naver?sosok=0&amp;page=48#pagination">맨뒤</a>
        </td></tr></table>"#;
        assert_eq!(NaverAdapter.discover_page_count(&page(markup)).unwrap(), 48);
    }

    #[test]
    fn test_discover_page_count_absolute_link() {
        let markup = r#"<td class="pgRR"><a href="https://finance.naver.com/sise/sise_market_sum.naver?page=31&amp;sosok=1">맨뒤</a></td>"#;
        let markup = format!("<table><tr>{markup}</tr></table>");
        assert_eq!(NaverAdapter.discover_page_count(&page(markup)).unwrap(), 31);
    }

    #[test]
    fn test_discover_page_count_missing_link() {
        let err = NaverAdapter
            .discover_page_count(&page("<html><body><p>점검중</p></body></html>"))
            .unwrap_err();

        assert!(matches!(
            err,
            ScreenError::Parse {
                stage: Stage::PageCount,
                ..
            }
        ));
    }

    #[test]
    fn test_discover_page_count_rejects_garbage() {
        let markup = r#"<table><tr><td class="pgRR"><a href="/x?page=last">맨뒤</a></td></tr></table>"#;
        assert!(NaverAdapter.discover_page_count(&page(markup)).is_err());
    }

    #[test]
    fn test_discover_fields_only_allow_list() {
        let fields = NaverAdapter.discover_fields(&page(FIRST_PAGE)).unwrap();

        assert_eq!(fields.ids().collect::<Vec<_>>(), vec!["per", "roe", "pbr"]);
        assert!(!fields.ids().any(|id| id == "quant" || id == "frgn_rate"));
    }

    #[test]
    fn test_discover_fields_missing_form() {
        let err = NaverAdapter
            .discover_fields(&page("<html><body></body></html>"))
            .unwrap_err();
        assert!(matches!(
            err,
            ScreenError::Parse {
                stage: Stage::FieldSelection,
                ..
            }
        ));
    }

    #[test]
    fn test_discover_fields_empty_form() {
        let markup = r#"<div class="subcnt_sise_item_top"><input value="quant"></div>"#;
        let fields = NaverAdapter.discover_fields(&page(markup)).unwrap();
        assert!(fields.is_empty());
    }

    #[test]
    fn test_parse_table() {
        let rows = [
            data_row(1, "삼성전자", "71,000", "13.55", "1.32"),
            data_row(2, "SK하이닉스", "182,300", "N/A", "2.10"),
        ]
        .concat();
        let table = NaverAdapter.parse_table(&page(table_page(&rows))).unwrap();

        assert_eq!(
            table.columns(),
            &["N", "종목명", "현재가", "PER", "PBR", "거래량"]
        );
        assert_eq!(table.height(), 2);
        assert_eq!(table.get(0, "종목명"), Some("삼성전자"));
        assert_eq!(table.get(0, "현재가"), Some("71000"));
        assert_eq!(table.get(1, "N"), Some("2"));
        assert_eq!(table.get(1, "PER"), Some("N/A"));
        assert_eq!(table.get(1, "PBR"), Some("2.10"));
    }

    #[test]
    fn test_parse_table_ignores_plain_cells() {
        let row = r#"<tr>
              <td class="no">1</td>
              <td><a href="/item/main.naver?code=005930" class="tltle">삼성전자</a></td>
              <td class="number">71,000</td>
              <td class="number"><img src="ico_up.gif"><span class="tah">500</span></td>
              <td class="number"><span class="tah">+0.71%</span></td>
              <td>메모</td>
              <td class="number">13.55</td>
              <td class="number">1.32</td>
              <td class="number">1,234</td>
              <td class="center"><a href="/item/board.naver?code=005930">토론</a></td>
            </tr>"#;
        let table = NaverAdapter.parse_table(&page(table_page(row))).unwrap();

        assert_eq!(table.height(), 1);
        assert_eq!(table.get(0, "PER"), Some("13.55"));
        assert_eq!(table.get(0, "거래량"), Some("1234"));
    }

    #[test]
    fn test_parse_table_empty_body() {
        let table = NaverAdapter.parse_table(&page(table_page(""))).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns().len(), 6);
    }

    #[test]
    fn test_parse_table_row_count_mismatch() {
        let rows = format!(
            "{}<tr><td class=\"no\">2</td><td class=\"number\">1</td><td></td></tr>",
            data_row(1, "삼성전자", "71,000", "13.55", "1.32")
        );
        let err = NaverAdapter
            .parse_table(&ListingPage::new(Market::Primary, 4, table_page(&rows)))
            .unwrap_err();

        assert!(matches!(
            err,
            ScreenError::Parse {
                stage: Stage::Page(4),
                ..
            }
        ));
    }

    #[test]
    fn test_parse_table_missing_table() {
        assert!(NaverAdapter.parse_table(&page(FIRST_PAGE)).is_err());
    }
}
