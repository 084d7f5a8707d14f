//! Table façade: the single hardcoded table backing one database file.
//!
//! There is no multi-table or multi-database layer here — one file, one
//! schema, one B+-tree rooted at page 0. Everything above this module
//! (the shell) only ever talks to a `Table`.
use tracing::{debug, info};

use super::btree;
use super::cursor::Cursor;
use super::node::{self, NodeType, INVALID_PAGE_NUM};
use super::pager::Pager;
use super::row::Row;
use crate::errors::Error;
use std::path::Path;

/// Page number of the table's root. Fixed for the table's lifetime: there
/// is no vacuum or page-relocation pass that would ever move it.
pub const ROOT_PAGE_NUM: u32 = 0;

pub struct Table {
    pager: Pager,
}

impl Table {
    /// Opens `path`, creating and initializing a fresh root leaf if the
    /// file is empty.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let mut pager = Pager::open(path)?;
        if pager.num_pages() == 0 {
            let root = pager.get_mut(ROOT_PAGE_NUM)?;
            node::initialize_leaf(root);
            node::set_is_root(root, true);
            info!("initialized new table at root page 0");
        }
        Ok(Table { pager })
    }

    pub fn root_page_num(&self) -> u32 {
        ROOT_PAGE_NUM
    }

    pub(super) fn pager_mut(&mut self) -> &mut Pager {
        &mut self.pager
    }

    /// Flushes every dirty page to disk. Called explicitly by `.exit`;
    /// also run implicitly when the table is dropped.
    pub fn close(&mut self) -> Result<(), Error> {
        self.pager.flush_all()?;
        debug!("table flushed and closed");
        Ok(())
    }

    /// Finds the cursor position for `key`, for both lookups and inserts.
    pub fn find(&mut self, key: u32) -> Result<Cursor<'_>, Error> {
        Cursor::find(self, key)
    }

    /// A cursor positioned at the first row, for a full scan.
    pub fn start(&mut self) -> Result<Cursor<'_>, Error> {
        Cursor::start(self)
    }

    /// A cursor positioned one past the last row.
    pub fn end(&mut self) -> Result<Cursor<'_>, Error> {
        Cursor::end(self)
    }

    /// Inserts `row`, rejecting a key that's already present.
    pub fn insert_row(&mut self, row: &Row) -> Result<(), Error> {
        let root_page_num = self.root_page_num();
        let (page_num, cell_num) = btree::find_leaf_cell(&mut self.pager, root_page_num, row.id)?;
        let page = self.pager.get(page_num)?;
        if cell_num < node::leaf_num_cells(page) && node::leaf_key(page, cell_num) == row.id {
            return Err(Error::DuplicateKey(row.id));
        }
        btree::leaf_insert(&mut self.pager, page_num, cell_num, row.id, row)
    }

    /// Returns every row in key order, via a full leaf-chain scan.
    pub fn select_rows(&mut self) -> Result<Vec<Row>, Error> {
        let mut rows = Vec::new();
        let mut cursor = self.start()?;
        while !cursor.end_of_table() {
            rows.push(cursor.value()?);
            cursor.advance()?;
        }
        Ok(rows)
    }

    /// Renders the tree structure for the `.btree` meta-command: one line
    /// per node, indented by depth, leaves listing their keys and internal
    /// nodes listing their routing keys.
    pub fn render_btree(&mut self) -> Result<String, Error> {
        let mut out = String::new();
        self.render_node(self.root_page_num(), 0, &mut out)?;
        Ok(out)
    }

    fn render_node(&mut self, page_num: u32, depth: usize, out: &mut String) -> Result<(), Error> {
        let indent = "  ".repeat(depth);
        let page = self.pager.get(page_num)?;
        match node::node_type(page)? {
            NodeType::Leaf => {
                let num_cells = node::leaf_num_cells(page);
                out.push_str(&format!("{}- leaf (size {})\n", indent, num_cells));
                for i in 0..num_cells {
                    out.push_str(&format!(
                        "{}  - {}\n",
                        indent,
                        node::leaf_key(self.pager.get(page_num)?, i)
                    ));
                }
            }
            NodeType::Internal => {
                let num_keys = node::internal_num_keys(page);
                out.push_str(&format!("{}- internal (size {})\n", indent, num_keys));
                for i in 0..num_keys {
                    let child = node::internal_child(self.pager.get(page_num)?, i)?;
                    self.render_node(child, depth + 1, out)?;
                    out.push_str(&format!(
                        "{}  - key {}\n",
                        indent,
                        node::internal_key(self.pager.get(page_num)?, i)
                    ));
                }
                let last_child = node::internal_last_child(self.pager.get(page_num)?);
                if last_child != INVALID_PAGE_NUM {
                    self.render_node(last_child, depth + 1, out)?;
                }
            }
        }
        Ok(())
    }

    /// Renders the fixed storage constants for the `.print` meta-command.
    pub fn render_constants() -> String {
        format!(
            "ROW_SIZE = {}\nCOMMON_NODE_HEADER_SIZE = {}\nLEAF_NODE_HEADER_SIZE = {}\nLEAF_NODE_CELL_SIZE = {}\nLEAF_NODE_SPACE_FOR_CELLS = {}\nLEAF_NODE_MAX_CELLS = {}\nINTERNAL_NODE_MAX_KEYS = {}\nPAGE_SIZE = {}\nTABLE_MAX_PAGES = {}",
            super::row::ROW_SIZE,
            node::COMMON_HEADER_SIZE,
            node::LEAF_HEADER_SIZE,
            node::LEAF_CELL_SIZE,
            node::LEAF_SPACE_FOR_CELLS,
            node::LEAF_NODE_MAX_CELLS,
            node::INTERNAL_NODE_MAX_KEYS,
            super::pager::PAGE_SIZE,
            super::pager::TABLE_MAX_PAGES,
        )
    }
}

impl Drop for Table {
    fn drop(&mut self) {
        let _ = self.pager.flush_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_select_round_trips() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut table = Table::open(tmp.path()).unwrap();
        table
            .insert_row(&Row::new(1, "alice", "alice@example.com").unwrap())
            .unwrap();
        table
            .insert_row(&Row::new(2, "bob", "bob@example.com").unwrap())
            .unwrap();
        let rows = table.select_rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].username, "alice");
        assert_eq!(rows[1].username, "bob");
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut table = Table::open(tmp.path()).unwrap();
        table
            .insert_row(&Row::new(1, "alice", "alice@example.com").unwrap())
            .unwrap();
        let err = table
            .insert_row(&Row::new(1, "eve", "eve@example.com").unwrap())
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(1)));
    }

    #[test]
    fn inserting_in_reverse_order_still_selects_sorted() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut table = Table::open(tmp.path()).unwrap();
        for id in (1..=30u32).rev() {
            table
                .insert_row(&Row::new(id, "u", "e@x.com").unwrap())
                .unwrap();
        }
        let rows = table.select_rows().unwrap();
        let ids: Vec<u32> = rows.iter().map(|r| r.id).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
        assert_eq!(ids.len(), 30);
    }

    #[test]
    fn many_inserts_split_into_internal_root() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut table = Table::open(tmp.path()).unwrap();
        for id in 1..=14u32 {
            table
                .insert_row(&Row::new(id, "u", "e@x.com").unwrap())
                .unwrap();
        }
        let page = table.pager.get(table.root_page_num()).unwrap();
        assert_eq!(node::node_type(page).unwrap(), NodeType::Internal);
        let rows = table.select_rows().unwrap();
        assert_eq!(rows.len(), 14);
    }

    #[test]
    fn data_survives_close_and_reopen() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        {
            let mut table = Table::open(tmp.path()).unwrap();
            for id in 1..=30u32 {
                table
                    .insert_row(&Row::new(id, "u", "e@x.com").unwrap())
                    .unwrap();
            }
            table.close().unwrap();
        }
        {
            let mut table = Table::open(tmp.path()).unwrap();
            let rows = table.select_rows().unwrap();
            assert_eq!(rows.len(), 30);
        }
    }
}
