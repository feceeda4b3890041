use tablelink_core::{Bookmark, OrderKey, Page, Result, SortOrder, StatementBuffer};

use crate::names::RemoteTableNameCache;

pub const ROW_NUMBER_ALIAS: &str = "row_num";
const ROW_ID_ALIAS: &str = "row_id";
const OUTER_SELECT: &str = "SELECT * FROM ( ";

/// Column used to order the row numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderTerm<'a> {
    Column {
        index: usize,
        order: SortOrder,
        alias: &'a str,
    },
    /// An already rendered expression such as `a."id"`.
    Raw { text: &'a str, order: SortOrder },
}

impl<'a> OrderTerm<'a> {
    #[must_use]
    pub fn from_keys(keys: &[OrderKey], alias: &'a str) -> Vec<Self> {
        keys.iter()
            .map(|key| Self::Column {
                index: key.column,
                order: key.order,
                alias,
            })
            .collect()
    }
}

/// Appends the ordering list; every term carries its own direction.
pub fn append_order_terms(
    buf: &mut StatementBuffer,
    terms: &[OrderTerm<'_>],
    names: &RemoteTableNameCache,
) -> Result<()> {
    if terms.is_empty() {
        return buf.append("ROWID");
    }
    for (index, term) in terms.iter().enumerate() {
        if index > 0 {
            buf.append(", ")?;
        }
        let order = match term {
            OrderTerm::Column {
                index,
                order,
                alias,
            } => {
                names.append_column_name(buf, *index, alias)?;
                *order
            }
            OrderTerm::Raw { text, order } => {
                buf.append(text)?;
                *order
            }
        };
        if order == SortOrder::Desc {
            buf.append(" DESC")?;
        }
    }
    Ok(())
}

/// Wraps a built SELECT in the row-numbering subquery.
///
/// The statement must carry [`Bookmark::From`] at its ` FROM` keyword. Its
/// WHERE and ORDER BY text stays in place inside the subquery; every bookmark
/// moves with the text it marks. Returns `false` when the page is unbounded
/// and nothing was changed.
pub fn apply_to_select(
    buf: &mut StatementBuffer,
    page: Page,
    terms: &[OrderTerm<'_>],
    names: &RemoteTableNameCache,
) -> Result<bool> {
    if page.is_unbounded() {
        return Ok(false);
    }

    let mut numbering = StatementBuffer::new();
    numbering.append(", ROW_NUMBER() OVER (ORDER BY ")?;
    append_order_terms(&mut numbering, terms, names)?;
    numbering.append(") ")?;
    numbering.append(ROW_NUMBER_ALIAS)?;

    let from = buf.require(Bookmark::From)?;
    buf.insert_at(from, numbering.as_str())?;
    buf.insert_at(0, OUTER_SELECT)?;
    buf.bookmark(Bookmark::Limit);
    append_row_number_tail(buf, page)?;
    Ok(true)
}

/// Replaces only the text after [`Bookmark::Limit`] of a wrapped SELECT with the tail for `page`.
pub fn reappend_limit(buf: &mut StatementBuffer, page: Page) -> Result<()> {
    buf.truncate_to(Bookmark::Limit)?;
    append_row_number_tail(buf, page)
}

/// Limits an UPDATE or DELETE by row identifier.
///
/// The WHERE text after [`Bookmark::Where`] moves into a row-numbered
/// subquery over `link`'s table and is replaced by a `ROWID IN (...)` filter.
pub fn apply_to_dml(
    buf: &mut StatementBuffer,
    page: Page,
    terms: &[OrderTerm<'_>],
    names: &RemoteTableNameCache,
    link: usize,
) -> Result<bool> {
    if page.is_unbounded() {
        return Ok(false);
    }

    let where_pos = buf.require(Bookmark::Where)?;
    let condition = buf.tail(where_pos)?.to_string();

    let mut filter = StatementBuffer::with_capacity(condition.len() + 192)?;
    filter.append(" WHERE ROWID IN (SELECT ")?;
    filter.append(ROW_ID_ALIAS)?;
    filter.append(" FROM (SELECT ROWID ")?;
    filter.append(ROW_ID_ALIAS)?;
    filter.append(", ROW_NUMBER() OVER (ORDER BY ")?;
    append_order_terms(&mut filter, terms, names)?;
    filter.append(") ")?;
    filter.append(ROW_NUMBER_ALIAS)?;
    filter.append(" FROM ")?;
    names.append_table_name(&mut filter, link)?;
    filter.append(&condition)?;
    let limit_offset = filter.len();
    append_row_number_tail(&mut filter, page)?;
    filter.append_char(')')?;

    let end = buf.len();
    buf.splice(where_pos..end, filter.as_str())?;
    buf.set_bookmark(Bookmark::Limit, where_pos + limit_offset)?;
    Ok(true)
}

fn append_row_number_tail(buf: &mut StatementBuffer, page: Page) -> Result<()> {
    buf.append(" )")?;
    match (page.offset, page.limit) {
        (0, None) => Ok(()),
        (0, Some(limit)) => buf.append_fmt(format_args!(" WHERE {ROW_NUMBER_ALIAS} <= {limit}")),
        (offset, Some(limit)) => buf.append_fmt(format_args!(
            " WHERE {ROW_NUMBER_ALIAS} BETWEEN {} AND {}",
            offset + 1,
            offset.saturating_add(limit)
        )),
        (offset, None) => buf.append_fmt(format_args!(" WHERE {ROW_NUMBER_ALIAS} > {offset}")),
    }
}

#[cfg(test)]
mod tests {
    use tablelink_core::{
        Bookmark, ColumnDef, HostType, LinkTarget, OrderKey, Page, StatementBuffer, TableDef,
    };

    use super::{OrderTerm, apply_to_dml, apply_to_select, reappend_limit};
    use crate::names::RemoteTableNameCache;

    fn names() -> RemoteTableNameCache {
        let table = TableDef::new(vec![
            ColumnDef::new("A", HostType::Int),
            ColumnDef::new("B", HostType::Int),
        ]);
        RemoteTableNameCache::new(&[LinkTarget::new("S", "T")], &table, false).expect("names")
    }

    fn base_select(names: &RemoteTableNameCache) -> StatementBuffer {
        let mut buf = StatementBuffer::new();
        buf.append("SELECT ").expect("append");
        buf.bookmark(Bookmark::SelectList);
        buf.append("\"A\", \"B\"").expect("append");
        buf.bookmark(Bookmark::From);
        names
            .append_from_with_adjusted_table_name(&mut buf, 0)
            .expect("from");
        buf.bookmark(Bookmark::Where);
        buf.append(" WHERE \"A\" > 1").expect("append");
        buf.bookmark(Bookmark::Order);
        buf.append(" ORDER BY \"A\", \"B\" DESC").expect("append");
        buf
    }

    #[test]
    fn offset_page_wraps_and_keeps_where_text() {
        let names = names();
        let mut buf = base_select(&names);
        let keys = [OrderKey::asc(0), OrderKey::desc(1)];
        let terms = OrderTerm::from_keys(&keys, "");

        assert!(apply_to_select(&mut buf, Page::new(2, Some(3)), &terms, &names).expect("apply"));

        assert_eq!(
            buf.as_str(),
            "SELECT * FROM ( SELECT \"A\", \"B\", ROW_NUMBER() OVER (ORDER BY \"A\", \"B\" DESC) row_num \
             FROM \"S\".\"T\" WHERE \"A\" > 1 ORDER BY \"A\", \"B\" DESC ) WHERE row_num BETWEEN 3 AND 5"
        );
        let where_pos = buf.position(Bookmark::Where).expect("where");
        let order_pos = buf.position(Bookmark::Order).expect("order");
        assert_eq!(buf.slice(where_pos..order_pos).expect("slice"), " WHERE \"A\" > 1");
        let table_pos = buf.position(Bookmark::TableName).expect("table");
        assert!(buf.tail(table_pos).expect("tail").starts_with("\"S\".\"T\" WHERE"));
    }

    #[test]
    fn limit_only_and_offset_only_tails() {
        let names = names();
        let mut buf = base_select(&names);
        apply_to_select(&mut buf, Page::new(0, Some(10)), &[], &names).expect("apply");
        assert!(buf.as_str().ends_with(" ) WHERE row_num <= 10"));
        assert!(buf.as_str().contains("ROW_NUMBER() OVER (ORDER BY ROWID) row_num"));

        reappend_limit(&mut buf, Page::new(4, None)).expect("reappend");
        assert!(buf.as_str().ends_with(" ) WHERE row_num > 4"));
    }

    #[test]
    fn unbounded_page_leaves_statement_alone() {
        let names = names();
        let mut buf = base_select(&names);
        let before = buf.clone();
        assert!(!apply_to_select(&mut buf, Page::UNBOUNDED, &[], &names).expect("apply"));
        assert_eq!(buf, before);
    }

    #[test]
    fn dml_limit_uses_row_identifiers() {
        let names = names();
        let mut buf = StatementBuffer::new();
        buf.append("DELETE FROM ").expect("append");
        names
            .append_table_name_with_adjusting(&mut buf, 0)
            .expect("table");
        buf.bookmark(Bookmark::Where);
        buf.append(" WHERE \"B\" IS NULL").expect("append");

        apply_to_dml(&mut buf, Page::new(0, Some(1)), &[], &names, 0).expect("apply");

        assert_eq!(
            buf.as_str(),
            "DELETE FROM \"S\".\"T\" WHERE ROWID IN (SELECT row_id FROM (SELECT ROWID row_id, \
             ROW_NUMBER() OVER (ORDER BY ROWID) row_num FROM \"S\".\"T\" WHERE \"B\" IS NULL ) \
             WHERE row_num <= 1)"
        );
    }
}
