//! Typed accessors over a raw page buffer.
//!
//! A node is a byte view, not an owning struct: the pager owns every page
//! buffer, and these functions only borrow it for the duration of a single
//! operation. This mirrors the pointer-heavy C original, where every
//! cross-node reference is a page number rather than a machine pointer.
use super::pager::PAGE_SIZE;
use super::row::ROW_SIZE;
use crate::err;
use crate::errors::Error;

/// Sentinel meaning "no child here". `u32::MAX` is never a real page number
/// because the file would need to be 16 exabytes to reach it.
pub const INVALID_PAGE_NUM: u32 = u32::MAX;

/// Small on purpose, to exercise splits in a handful of inserts. A
/// production build would use `(PAGE_SIZE - INTERNAL_NODE_HEADER_SIZE) /
/// INTERNAL_NODE_CELL_SIZE` instead.
pub const INTERNAL_NODE_MAX_KEYS: usize = 3;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum NodeType {
    Internal = 0,
    Leaf = 1,
}

// --- Common header ---
const NODE_TYPE_OFFSET: usize = 0;
const NODE_TYPE_SIZE: usize = 1;
const IS_ROOT_OFFSET: usize = NODE_TYPE_OFFSET + NODE_TYPE_SIZE;
const IS_ROOT_SIZE: usize = 1;
const PARENT_OFFSET: usize = IS_ROOT_OFFSET + IS_ROOT_SIZE;
const PARENT_SIZE: usize = 4;
pub const COMMON_HEADER_SIZE: usize = PARENT_OFFSET + PARENT_SIZE;

// --- Leaf header ---
const LEAF_NUM_CELLS_OFFSET: usize = COMMON_HEADER_SIZE;
const LEAF_NUM_CELLS_SIZE: usize = 4;
const LEAF_NEXT_LEAF_OFFSET: usize = LEAF_NUM_CELLS_OFFSET + LEAF_NUM_CELLS_SIZE;
const LEAF_NEXT_LEAF_SIZE: usize = 4;
pub const LEAF_HEADER_SIZE: usize = LEAF_NEXT_LEAF_OFFSET + LEAF_NEXT_LEAF_SIZE;

// --- Leaf body ---
const LEAF_KEY_SIZE: usize = 4;
pub const LEAF_CELL_SIZE: usize = LEAF_KEY_SIZE + ROW_SIZE;
pub const LEAF_SPACE_FOR_CELLS: usize = PAGE_SIZE - LEAF_HEADER_SIZE;

/// Maximum number of cells that fit in a leaf, derived from the page size
/// and the fixed row size.
pub const LEAF_NODE_MAX_CELLS: usize = LEAF_SPACE_FOR_CELLS / LEAF_CELL_SIZE;

// --- Internal header ---
const INTERNAL_NUM_KEYS_OFFSET: usize = COMMON_HEADER_SIZE;
const INTERNAL_NUM_KEYS_SIZE: usize = 4;
const INTERNAL_LAST_CHILD_OFFSET: usize = INTERNAL_NUM_KEYS_OFFSET + INTERNAL_NUM_KEYS_SIZE;
const INTERNAL_LAST_CHILD_SIZE: usize = 4;
const INTERNAL_HEADER_SIZE: usize = INTERNAL_LAST_CHILD_OFFSET + INTERNAL_LAST_CHILD_SIZE;

// --- Internal body ---
const INTERNAL_CHILD_SIZE: usize = 4;
const INTERNAL_KEY_SIZE: usize = 4;
const INTERNAL_CELL_SIZE: usize = INTERNAL_CHILD_SIZE + INTERNAL_KEY_SIZE;

pub type Page = [u8; PAGE_SIZE];

fn u32_at(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap())
}

fn set_u32_at(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

pub fn node_type(page: &Page) -> Result<NodeType, Error> {
    match page[NODE_TYPE_OFFSET] {
        0 => Ok(NodeType::Internal),
        1 => Ok(NodeType::Leaf),
        other => Err(err!("invalid node type byte: {}", other)),
    }
}

pub fn set_node_type(page: &mut Page, ty: NodeType) {
    page[NODE_TYPE_OFFSET] = ty as u8;
}

pub fn is_root(page: &Page) -> bool {
    page[IS_ROOT_OFFSET] == 1
}

pub fn set_is_root(page: &mut Page, value: bool) {
    page[IS_ROOT_OFFSET] = value as u8;
}

pub fn parent(page: &Page) -> u32 {
    u32_at(page, PARENT_OFFSET)
}

pub fn set_parent(page: &mut Page, page_num: u32) {
    set_u32_at(page, PARENT_OFFSET, page_num);
}

/// Zeroes the page and sets it up as an empty leaf with no siblings.
pub fn initialize_leaf(page: &mut Page) {
    page.fill(0);
    set_node_type(page, NodeType::Leaf);
    set_is_root(page, false);
    set_leaf_num_cells(page, 0);
    set_leaf_next_leaf(page, 0);
}

/// Zeroes the page and sets it up as an empty internal node.
///
/// `last_child` starts at [`INVALID_PAGE_NUM`] rather than `0`: page 0 is
/// the root, and leaving this as the default `0` would make a freshly
/// initialized internal node look like a parent of the root.
pub fn initialize_internal(page: &mut Page) {
    page.fill(0);
    set_node_type(page, NodeType::Internal);
    set_is_root(page, false);
    set_internal_num_keys(page, 0);
    set_internal_last_child(page, INVALID_PAGE_NUM);
}

// --- Leaf accessors ---

pub fn leaf_num_cells(page: &Page) -> u32 {
    u32_at(page, LEAF_NUM_CELLS_OFFSET)
}

pub fn set_leaf_num_cells(page: &mut Page, n: u32) {
    set_u32_at(page, LEAF_NUM_CELLS_OFFSET, n);
}

pub fn leaf_next_leaf(page: &Page) -> u32 {
    u32_at(page, LEAF_NEXT_LEAF_OFFSET)
}

pub fn set_leaf_next_leaf(page: &mut Page, page_num: u32) {
    set_u32_at(page, LEAF_NEXT_LEAF_OFFSET, page_num);
}

fn leaf_cell_offset(cell_num: u32) -> usize {
    LEAF_HEADER_SIZE + cell_num as usize * LEAF_CELL_SIZE
}

pub fn leaf_key(page: &Page, cell_num: u32) -> u32 {
    u32_at(page, leaf_cell_offset(cell_num))
}

pub fn set_leaf_key(page: &mut Page, cell_num: u32, key: u32) {
    let offset = leaf_cell_offset(cell_num);
    set_u32_at(page, offset, key);
}

pub fn leaf_value(page: &Page, cell_num: u32) -> &[u8] {
    let offset = leaf_cell_offset(cell_num) + LEAF_KEY_SIZE;
    &page[offset..offset + ROW_SIZE]
}

pub fn leaf_value_mut(page: &mut Page, cell_num: u32) -> &mut [u8] {
    let offset = leaf_cell_offset(cell_num) + LEAF_KEY_SIZE;
    &mut page[offset..offset + ROW_SIZE]
}

pub fn leaf_cell(page: &Page, cell_num: u32) -> &[u8] {
    let offset = leaf_cell_offset(cell_num);
    &page[offset..offset + LEAF_CELL_SIZE]
}

/// Shifts cells `[from, num_cells)` one slot to the right, making room at `from`.
pub fn leaf_shift_cells_right(page: &mut Page, from: u32, num_cells: u32) {
    for i in (from..num_cells).rev() {
        let src_offset = leaf_cell_offset(i);
        let dst_offset = leaf_cell_offset(i + 1);
        let mut tmp = [0u8; LEAF_CELL_SIZE];
        tmp.copy_from_slice(&page[src_offset..src_offset + LEAF_CELL_SIZE]);
        page[dst_offset..dst_offset + LEAF_CELL_SIZE].copy_from_slice(&tmp);
    }
}

pub fn set_leaf_cell(page: &mut Page, cell_num: u32, key: u32, value: &[u8]) {
    debug_assert_eq!(value.len(), ROW_SIZE);
    let offset = leaf_cell_offset(cell_num);
    set_u32_at(page, offset, key);
    page[offset + LEAF_KEY_SIZE..offset + LEAF_CELL_SIZE].copy_from_slice(value);
}

// --- Internal accessors ---

pub fn internal_num_keys(page: &Page) -> u32 {
    u32_at(page, INTERNAL_NUM_KEYS_OFFSET)
}

pub fn set_internal_num_keys(page: &mut Page, n: u32) {
    set_u32_at(page, INTERNAL_NUM_KEYS_OFFSET, n);
}

pub fn internal_last_child(page: &Page) -> u32 {
    u32_at(page, INTERNAL_LAST_CHILD_OFFSET)
}

pub fn set_internal_last_child(page: &mut Page, page_num: u32) {
    set_u32_at(page, INTERNAL_LAST_CHILD_OFFSET, page_num);
}

fn internal_cell_offset(cell_num: u32) -> usize {
    INTERNAL_HEADER_SIZE + cell_num as usize * INTERNAL_CELL_SIZE
}

pub fn internal_child_at_cell(page: &Page, cell_num: u32) -> u32 {
    u32_at(page, internal_cell_offset(cell_num))
}

pub fn set_internal_child_at_cell(page: &mut Page, cell_num: u32, child: u32) {
    let offset = internal_cell_offset(cell_num);
    set_u32_at(page, offset, child);
}

pub fn internal_key(page: &Page, cell_num: u32) -> u32 {
    u32_at(page, internal_cell_offset(cell_num) + INTERNAL_CHILD_SIZE)
}

pub fn set_internal_key(page: &mut Page, cell_num: u32, key: u32) {
    let offset = internal_cell_offset(cell_num) + INTERNAL_CHILD_SIZE;
    set_u32_at(page, offset, key);
}

pub fn set_internal_cell(page: &mut Page, cell_num: u32, child: u32, key: u32) {
    set_internal_child_at_cell(page, cell_num, child);
    set_internal_key(page, cell_num, key);
}

/// Returns the child at index `i`: `last_child` when `i == num_keys`,
/// otherwise `cells[i].child`. `i > num_keys` is an invariant violation.
pub fn internal_child(page: &Page, i: u32) -> Result<u32, Error> {
    let num_keys = internal_num_keys(page);
    if i > num_keys {
        return Err(err!(
            "internal_child: index {} exceeds num_keys {}",
            i,
            num_keys
        ));
    }
    if i == num_keys {
        Ok(internal_last_child(page))
    } else {
        Ok(internal_child_at_cell(page, i))
    }
}

/// Shifts internal cells `[from, num_keys)` one slot to the right.
pub fn internal_shift_cells_right(page: &mut Page, from: u32, num_keys: u32) {
    for i in (from..num_keys).rev() {
        let child = internal_child_at_cell(page, i);
        let key = internal_key(page, i);
        set_internal_cell(page, i + 1, child, key);
    }
}

/// Finds the smallest cell index `i` such that `key <= cells[i].key`, using
/// binary search over the internal node's keys. Returns `num_keys` if no
/// such cell exists (the key belongs under `last_child`).
pub fn internal_find_child_index(page: &Page, key: u32) -> u32 {
    let num_keys = internal_num_keys(page);
    let mut min_index = 0u32;
    let mut max_index = num_keys;
    while min_index != max_index {
        let mid = (min_index + max_index) / 2;
        if key <= internal_key(page, mid) {
            max_index = mid;
        } else {
            min_index = mid + 1;
        }
    }
    min_index
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_leaf() -> Page {
        let mut p = [0u8; PAGE_SIZE];
        initialize_leaf(&mut p);
        p
    }

    fn empty_internal() -> Page {
        let mut p = [0u8; PAGE_SIZE];
        initialize_internal(&mut p);
        p
    }

    #[test]
    fn leaf_starts_empty_and_not_root() {
        let p = empty_leaf();
        assert_eq!(node_type(&p).unwrap(), NodeType::Leaf);
        assert!(!is_root(&p));
        assert_eq!(leaf_num_cells(&p), 0);
        assert_eq!(leaf_next_leaf(&p), 0);
    }

    #[test]
    fn internal_starts_with_invalid_last_child() {
        let p = empty_internal();
        assert_eq!(node_type(&p).unwrap(), NodeType::Internal);
        assert_eq!(internal_last_child(&p), INVALID_PAGE_NUM);
        assert_eq!(internal_num_keys(&p), 0);
    }

    #[test]
    fn leaf_cell_round_trip() {
        let mut p = empty_leaf();
        let value = [7u8; ROW_SIZE];
        set_leaf_cell(&mut p, 0, 42, &value);
        assert_eq!(leaf_key(&p, 0), 42);
        assert_eq!(leaf_value(&p, 0), &value[..]);
    }

    #[test]
    fn leaf_shift_preserves_order() {
        let mut p = empty_leaf();
        set_leaf_cell(&mut p, 0, 1, &[1u8; ROW_SIZE]);
        set_leaf_cell(&mut p, 1, 2, &[2u8; ROW_SIZE]);
        leaf_shift_cells_right(&mut p, 1, 2);
        set_leaf_cell(&mut p, 1, 99, &[9u8; ROW_SIZE]);
        assert_eq!(leaf_key(&p, 0), 1);
        assert_eq!(leaf_key(&p, 1), 99);
        assert_eq!(leaf_key(&p, 2), 2);
    }

    #[test]
    fn internal_child_uses_last_child_at_num_keys() {
        let mut p = empty_internal();
        set_internal_num_keys(&mut p, 1);
        set_internal_cell(&mut p, 0, 5, 10);
        set_internal_last_child(&mut p, 6);
        assert_eq!(internal_child(&p, 0).unwrap(), 5);
        assert_eq!(internal_child(&p, 1).unwrap(), 6);
        assert!(internal_child(&p, 2).is_err());
    }

    #[test]
    fn internal_find_child_index_binary_searches() {
        let mut p = empty_internal();
        set_internal_num_keys(&mut p, 3);
        set_internal_cell(&mut p, 0, 1, 10);
        set_internal_cell(&mut p, 1, 2, 20);
        set_internal_cell(&mut p, 2, 3, 30);
        assert_eq!(internal_find_child_index(&p, 5), 0);
        assert_eq!(internal_find_child_index(&p, 15), 1);
        assert_eq!(internal_find_child_index(&p, 25), 2);
        assert_eq!(internal_find_child_index(&p, 35), 3);
    }
}
