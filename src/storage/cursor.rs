//! Cursor: a position within the table, usable for both point lookups and
//! in-order scans.
//!
//! A cursor always points at a leaf cell (or one past the last cell of the
//! table, when `end_of_table` is set). Advancing it off the end of a page
//! follows the leaf's `next_leaf` sibling pointer rather than walking back
//! up through the tree, since leaves are threaded for exactly this.
use super::btree;
use super::node::{leaf_num_cells, leaf_value, leaf_value_mut, INVALID_PAGE_NUM};
use super::row::{self, Row};
use super::table::Table;
use crate::errors::Error;

pub struct Cursor<'a> {
    table: &'a mut Table,
    page_num: u32,
    cell_num: u32,
    end_of_table: bool,
}

impl<'a> Cursor<'a> {
    /// Positions a cursor at the first row of the table (the leftmost cell
    /// of the leftmost leaf).
    pub fn start(table: &'a mut Table) -> Result<Self, Error> {
        let root_page_num = table.root_page_num();
        let page_num = btree::find_leaf(table.pager_mut(), root_page_num, 0)?;
        let num_cells = leaf_num_cells(table.pager_mut().get(page_num)?);
        Ok(Cursor {
            table,
            page_num,
            cell_num: 0,
            end_of_table: num_cells == 0,
        })
    }

    /// Positions a cursor one past the last row of the table (the rightmost
    /// leaf's `num_cells` slot), for scanning backwards or marking the tail.
    pub fn end(table: &'a mut Table) -> Result<Self, Error> {
        let root_page_num = table.root_page_num();
        let page_num = btree::find_rightmost_leaf(table.pager_mut(), root_page_num)?;
        let num_cells = leaf_num_cells(table.pager_mut().get(page_num)?);
        Ok(Cursor {
            table,
            page_num,
            cell_num: num_cells,
            end_of_table: true,
        })
    }

    /// Positions a cursor at the cell matching `key`, or where it would be
    /// inserted if absent.
    pub fn find(table: &'a mut Table, key: u32) -> Result<Self, Error> {
        let root_page_num = table.root_page_num();
        let (page_num, cell_num) = btree::find_leaf_cell(table.pager_mut(), root_page_num, key)?;
        let num_cells = leaf_num_cells(table.pager_mut().get(page_num)?);
        Ok(Cursor {
            table,
            page_num,
            cell_num,
            end_of_table: cell_num >= num_cells,
        })
    }

    pub fn page_num(&self) -> u32 {
        self.page_num
    }

    pub fn cell_num(&self) -> u32 {
        self.cell_num
    }

    pub fn end_of_table(&self) -> bool {
        self.end_of_table
    }

    /// Reads and deserializes the row at the current position.
    pub fn value(&mut self) -> Result<Row, Error> {
        let page = self.table.pager_mut().get(self.page_num)?;
        row::deserialize(leaf_value(page, self.cell_num))
    }

    /// Mutable access to the raw serialized row bytes at the current position.
    pub fn value_mut(&mut self) -> Result<&mut [u8], Error> {
        let page = self.table.pager_mut().get_mut(self.page_num)?;
        Ok(leaf_value_mut(page, self.cell_num))
    }

    /// Moves to the next cell, following the leaf's sibling pointer across
    /// page boundaries, and setting `end_of_table` once the last leaf is
    /// exhausted.
    pub fn advance(&mut self) -> Result<(), Error> {
        let page = self.table.pager_mut().get(self.page_num)?;
        let num_cells = leaf_num_cells(page);
        self.cell_num += 1;
        if self.cell_num >= num_cells {
            let next_leaf = super::node::leaf_next_leaf(page);
            if next_leaf == 0 || next_leaf == INVALID_PAGE_NUM {
                self.end_of_table = true;
            } else {
                self.page_num = next_leaf;
                self.cell_num = 0;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::table::Table;

    #[test]
    fn start_on_empty_table_is_end_of_table() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut table = Table::open(tmp.path()).unwrap();
        let cursor = Cursor::start(&mut table).unwrap();
        assert!(cursor.end_of_table());
    }

    #[test]
    fn find_on_empty_table_points_at_insertion_slot() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut table = Table::open(tmp.path()).unwrap();
        let cursor = Cursor::find(&mut table, 5).unwrap();
        assert_eq!(cursor.cell_num(), 0);
    }

    #[test]
    fn end_on_empty_table_is_end_of_table_at_cell_zero() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut table = Table::open(tmp.path()).unwrap();
        let cursor = Cursor::end(&mut table).unwrap();
        assert!(cursor.end_of_table());
        assert_eq!(cursor.cell_num(), 0);
    }

    #[test]
    fn end_points_one_past_the_last_row() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut table = Table::open(tmp.path()).unwrap();
        for id in 1..=5u32 {
            table
                .insert_row(&Row::new(id, "u", "e@x.com").unwrap())
                .unwrap();
        }
        let cursor = Cursor::end(&mut table).unwrap();
        assert!(cursor.end_of_table());
        assert_eq!(cursor.cell_num(), 5);
    }

    #[test]
    fn advance_walks_every_row_in_order() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut table = Table::open(tmp.path()).unwrap();
        for id in [3u32, 1, 2] {
            table
                .insert_row(&Row::new(id, "u", "e@x.com").unwrap())
                .unwrap();
        }
        let mut cursor = Cursor::start(&mut table).unwrap();
        let mut seen = Vec::new();
        while !cursor.end_of_table() {
            seen.push(cursor.value().unwrap().id);
            cursor.advance().unwrap();
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }
}
