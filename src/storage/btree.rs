//! B+-tree engine: descent, insertion, node splits and root promotion.
//!
//! Leaves hold rows; internal nodes hold routing keys and child page
//! numbers. Every key lookup walks down from the root; every insert may
//! bubble a split back up to the root, which is the only node allowed to
//! grow the tree's height.
use tracing::{debug, trace};

use super::node::{
    self, internal_child, internal_find_child_index, internal_key, internal_last_child,
    internal_num_keys, internal_shift_cells_right, initialize_internal, initialize_leaf, is_root,
    leaf_key, leaf_num_cells, leaf_shift_cells_right, parent, set_internal_cell,
    set_internal_last_child, set_internal_num_keys, set_is_root, set_leaf_cell,
    set_leaf_next_leaf, set_leaf_num_cells, set_parent, NodeType, INTERNAL_NODE_MAX_KEYS,
    LEAF_NODE_MAX_CELLS,
};
use super::pager::Pager;
use super::row::{serialize, Row};
use crate::err;
use crate::errors::Error;

/// The largest key stored under `page_num`, following the last child of
/// internal nodes down to the rightmost leaf.
pub fn get_node_max_key(pager: &mut Pager, page_num: u32) -> Result<u32, Error> {
    let page = pager.get(page_num)?;
    match node::node_type(page)? {
        NodeType::Leaf => {
            let num_cells = leaf_num_cells(page);
            if num_cells == 0 {
                return Err(err!("leaf page {} has no cells", page_num));
            }
            Ok(leaf_key(page, num_cells - 1))
        }
        NodeType::Internal => {
            let last_child = internal_last_child(page);
            get_node_max_key(pager, last_child)
        }
    }
}

/// Descends from `page_num` to the rightmost leaf, following `last_child`
/// at every internal node.
pub fn find_rightmost_leaf(pager: &mut Pager, page_num: u32) -> Result<u32, Error> {
    let page = pager.get(page_num)?;
    match node::node_type(page)? {
        NodeType::Leaf => Ok(page_num),
        NodeType::Internal => {
            let last_child = internal_last_child(page);
            find_rightmost_leaf(pager, last_child)
        }
    }
}

/// Descends from `page_num` to the leaf that would contain `key`.
pub fn find_leaf(pager: &mut Pager, page_num: u32, key: u32) -> Result<u32, Error> {
    let page = pager.get(page_num)?;
    match node::node_type(page)? {
        NodeType::Leaf => Ok(page_num),
        NodeType::Internal => {
            let index = internal_find_child_index(page, key);
            let child = internal_child(page, index)?;
            find_leaf(pager, child, key)
        }
    }
}

/// Returns the leaf page and cell index at which `key` belongs: an
/// existing cell if present, or the insertion point if not.
pub fn find_leaf_cell(pager: &mut Pager, page_num: u32, key: u32) -> Result<(u32, u32), Error> {
    let leaf_page_num = find_leaf(pager, page_num, key)?;
    let page = pager.get(leaf_page_num)?;
    let num_cells = leaf_num_cells(page);
    let mut min_index = 0u32;
    let mut max_index = num_cells;
    while min_index != max_index {
        let mid = (min_index + max_index) / 2;
        let mid_key = leaf_key(page, mid);
        if key == mid_key {
            return Ok((leaf_page_num, mid));
        }
        if key < mid_key {
            max_index = mid;
        } else {
            min_index = mid + 1;
        }
    }
    Ok((leaf_page_num, min_index))
}

/// Inserts `row` at `cell_num` in `page_num`, splitting the leaf first if
/// it is already full.
pub fn leaf_insert(
    pager: &mut Pager,
    page_num: u32,
    cell_num: u32,
    key: u32,
    row: &Row,
) -> Result<(), Error> {
    let num_cells = leaf_num_cells(pager.get(page_num)?);
    if num_cells as usize >= LEAF_NODE_MAX_CELLS {
        return leaf_split_and_insert(pager, page_num, cell_num, key, row);
    }

    let page = pager.get_mut(page_num)?;
    if cell_num < num_cells {
        leaf_shift_cells_right(page, cell_num, num_cells);
    }
    set_leaf_num_cells(page, num_cells + 1);
    let mut value_buf = [0u8; super::row::ROW_SIZE];
    serialize(row, &mut value_buf);
    set_leaf_cell(page, cell_num, key, &value_buf);
    trace!(page_num, cell_num, key, "leaf_insert");
    Ok(())
}

/// Splits a full leaf into itself and a new right sibling, distributing
/// the old cells plus the new one roughly in half, then inserts the new
/// cell's key into the parent (creating a new root if the leaf was root).
fn leaf_split_and_insert(
    pager: &mut Pager,
    old_page_num: u32,
    new_cell_num: u32,
    new_key: u32,
    row: &Row,
) -> Result<(), Error> {
    let new_page_num = pager.get_unused_page_num();
    pager.get_mut(new_page_num)?;
    let new_page = pager.get_mut(new_page_num)?;
    initialize_leaf(new_page);

    let old_was_root = is_root(pager.get(old_page_num)?);
    let old_parent = parent(pager.get(old_page_num)?);
    let old_next = node::leaf_next_leaf(pager.get(old_page_num)?);
    let old_max_before_split = leaf_key(pager.get(old_page_num)?, LEAF_NODE_MAX_CELLS as u32 - 1);

    // Collect the LEAF_NODE_MAX_CELLS + 1 cells (old cells plus the new
    // one) into a scratch buffer, sorted by key, then redistribute.
    let total_cells = LEAF_NODE_MAX_CELLS + 1;
    let split_point = (total_cells + 1) / 2;
    let mut keys = Vec::with_capacity(total_cells);
    let mut values = Vec::with_capacity(total_cells);
    {
        let old_page = pager.get(old_page_num)?;
        for i in 0..LEAF_NODE_MAX_CELLS as u32 {
            if i == new_cell_num {
                keys.push(new_key);
                let mut buf = [0u8; super::row::ROW_SIZE];
                serialize(row, &mut buf);
                values.push(buf);
            }
            keys.push(leaf_key(old_page, i));
            let mut buf = [0u8; super::row::ROW_SIZE];
            buf.copy_from_slice(node::leaf_value(old_page, i));
            values.push(buf);
        }
        if new_cell_num as usize == LEAF_NODE_MAX_CELLS {
            keys.push(new_key);
            let mut buf = [0u8; super::row::ROW_SIZE];
            serialize(row, &mut buf);
            values.push(buf);
        }
    }

    {
        let old_page = pager.get_mut(old_page_num)?;
        initialize_leaf(old_page);
        set_is_root(old_page, false);
        for i in 0..split_point {
            set_leaf_cell(old_page, i as u32, keys[i], &values[i]);
        }
        set_leaf_num_cells(old_page, split_point as u32);
        set_leaf_next_leaf(old_page, new_page_num);
    }
    {
        let new_page = pager.get_mut(new_page_num)?;
        for i in split_point..total_cells {
            set_leaf_cell(new_page, (i - split_point) as u32, keys[i], &values[i]);
        }
        set_leaf_num_cells(new_page, (total_cells - split_point) as u32);
        set_leaf_next_leaf(new_page, old_next);
        set_parent(new_page, old_parent);
    }

    debug!(old_page_num, new_page_num, "leaf split");

    if old_was_root {
        create_new_root(pager, old_page_num, new_page_num)
    } else {
        let parent_page_num = old_parent;
        set_parent(pager.get_mut(old_page_num)?, parent_page_num);
        let new_old_max = keys[split_point - 1];
        update_internal_node_key(pager, parent_page_num, old_max_before_split, new_old_max)?;
        internal_insert(pager, parent_page_num, new_page_num)
    }
}

/// Promotes a freshly split root. `left_page_num` is the root page and
/// already holds the left half of the split; since the root's page
/// number must stay fixed, its contents are copied out to a new page and
/// the root page is rebuilt as an internal node pointing at the two
/// halves.
fn create_new_root(pager: &mut Pager, left_page_num: u32, right_page_num: u32) -> Result<(), Error> {
    let new_left_page_num = pager.get_unused_page_num();
    pager.get_mut(new_left_page_num)?;
    let left_copy = *pager.get(left_page_num)?;
    *pager.get_mut(new_left_page_num)? = left_copy;
    set_is_root(pager.get_mut(new_left_page_num)?, false);
    set_parent(pager.get_mut(new_left_page_num)?, left_page_num);
    set_parent(pager.get_mut(right_page_num)?, left_page_num);

    // Fix up children of the moved internal node, if any, to point at its
    // new home.
    if node::node_type(pager.get(new_left_page_num)?)? == NodeType::Internal {
        let num_keys = internal_num_keys(pager.get(new_left_page_num)?);
        for i in 0..=num_keys {
            let child = internal_child(pager.get(new_left_page_num)?, i)?;
            set_parent(pager.get_mut(child)?, new_left_page_num);
        }
    }
    // Same fixup if the right half is internal (it never is right after a
    // leaf split, but is after an internal split).
    if node::node_type(pager.get(right_page_num)?)? == NodeType::Internal {
        let num_keys = internal_num_keys(pager.get(right_page_num)?);
        for i in 0..=num_keys {
            let child = internal_child(pager.get(right_page_num)?, i)?;
            set_parent(pager.get_mut(child)?, right_page_num);
        }
    }

    let left_max_key = get_node_max_key(pager, new_left_page_num)?;

    let root = pager.get_mut(left_page_num)?;
    initialize_internal(root);
    set_is_root(root, true);
    set_internal_num_keys(root, 1);
    set_internal_cell(root, 0, new_left_page_num, left_max_key);
    set_internal_last_child(root, right_page_num);

    debug!(left_page_num, new_left_page_num, right_page_num, "new root created");
    Ok(())
}

/// Inserts a new child (identified by its max key) into an internal
/// node, splitting it first if it is already at [`INTERNAL_NODE_MAX_KEYS`].
fn internal_insert(pager: &mut Pager, page_num: u32, child_page_num: u32) -> Result<(), Error> {
    let child_max_key = get_node_max_key(pager, child_page_num)?;
    let num_keys = internal_num_keys(pager.get(page_num)?);

    if num_keys as usize >= INTERNAL_NODE_MAX_KEYS {
        return internal_split_and_insert(pager, page_num, child_page_num);
    }

    let index = internal_find_child_index(pager.get(page_num)?, child_max_key);
    let right_child_page_num = internal_last_child(pager.get(page_num)?);
    let right_child_max_key = get_node_max_key(pager, right_child_page_num)?;

    let page = pager.get_mut(page_num)?;
    if child_max_key > right_child_max_key {
        // The new child becomes the rightmost; the old last_child moves
        // into a regular cell.
        set_internal_cell(page, num_keys, right_child_page_num, right_child_max_key);
        set_internal_last_child(page, child_page_num);
    } else {
        internal_shift_cells_right(page, index, num_keys);
        set_internal_cell(page, index, child_page_num, child_max_key);
    }
    set_internal_num_keys(page, num_keys + 1);
    set_parent(pager.get_mut(child_page_num)?, page_num);
    trace!(page_num, child_page_num, child_max_key, "internal_insert");
    Ok(())
}

/// Splits a full internal node by dividing its original
/// `INTERNAL_NODE_MAX_KEYS + 1` children evenly across itself and a new
/// sibling, then routes the new child into whichever of the two resulting
/// nodes its key range falls under. Final occupancy is therefore 2/2 for
/// even `INTERNAL_NODE_MAX_KEYS + 1`, or an uneven split otherwise — the
/// new child does not automatically land on a fixed side.
fn internal_split_and_insert(
    pager: &mut Pager,
    old_page_num: u32,
    new_child_page_num: u32,
) -> Result<(), Error> {
    let new_child_max_key = get_node_max_key(pager, new_child_page_num)?;

    // Snapshot the original MAX_KEYS + 1 entries (keyed cells plus the
    // trailing last_child), already sorted by key per the node invariant.
    // The new child is routed in separately once both halves exist.
    let mut entries: Vec<(u32, u32)> = Vec::with_capacity(INTERNAL_NODE_MAX_KEYS + 1);
    {
        let old_page = pager.get(old_page_num)?;
        let num_keys = internal_num_keys(old_page);
        for i in 0..num_keys {
            entries.push((node::internal_child_at_cell(old_page, i), internal_key(old_page, i)));
        }
        let last_child = internal_last_child(old_page);
        let last_key = get_node_max_key(pager, last_child)?;
        entries.push((last_child, last_key));
    }

    let old_was_root = is_root(pager.get(old_page_num)?);
    let old_parent = parent(pager.get(old_page_num)?);
    // Max key before old_page_num's contents are overwritten below, so the
    // stale routing entry in the parent (if any) can be corrected.
    let old_max_before_split = get_node_max_key(pager, old_page_num)?;

    let split_point = entries.len() / 2;
    let left_entries = &entries[..split_point];
    let right_entries = &entries[split_point..];

    let new_page_num = pager.get_unused_page_num();
    pager.get_mut(new_page_num)?;

    {
        let old_page = pager.get_mut(old_page_num)?;
        initialize_internal(old_page);
        set_is_root(old_page, false);
        let (left_last_child, _) = left_entries.last().unwrap();
        for (i, (child, key)) in left_entries[..left_entries.len() - 1].iter().enumerate() {
            set_internal_cell(old_page, i as u32, *child, *key);
        }
        set_internal_num_keys(old_page, (left_entries.len() - 1) as u32);
        set_internal_last_child(old_page, *left_last_child);
    }
    {
        let new_page = pager.get_mut(new_page_num)?;
        initialize_internal(new_page);
        let (right_last_child, _) = right_entries.last().unwrap();
        for (i, (child, key)) in right_entries[..right_entries.len() - 1].iter().enumerate() {
            set_internal_cell(new_page, i as u32, *child, *key);
        }
        set_internal_num_keys(new_page, (right_entries.len() - 1) as u32);
        set_internal_last_child(new_page, *right_last_child);
        set_parent(new_page, old_parent);
    }

    // Reparent every child now living under either half.
    for page_num in [old_page_num, new_page_num] {
        let num_keys = internal_num_keys(pager.get(page_num)?);
        for i in 0..=num_keys {
            let child = internal_child(pager.get(page_num)?, i)?;
            set_parent(pager.get_mut(child)?, page_num);
        }
    }

    debug!(old_page_num, new_page_num, "internal split");

    // The new child's key range decides which resulting sibling it routes
    // into; `old_page_num`'s max is unaffected by this insert when the new
    // child lands there, since it's then strictly less than that max.
    let old_new_max = get_node_max_key(pager, old_page_num)?;
    let destination = if new_child_max_key <= old_new_max {
        old_page_num
    } else {
        new_page_num
    };
    internal_insert(pager, destination, new_child_page_num)?;

    if old_was_root {
        create_new_root(pager, old_page_num, new_page_num)
    } else {
        update_internal_node_key(pager, old_parent, old_max_before_split, old_new_max)?;
        internal_insert(pager, old_parent, new_page_num)
    }
}

/// If `child_page_num`'s old max key no longer matches the routing key
/// stored for it in `parent_page_num`, updates that cell. Called after an
/// insert grows the rightmost leaf under a non-last child.
pub fn update_internal_node_key(
    pager: &mut Pager,
    parent_page_num: u32,
    old_key: u32,
    new_key: u32,
) -> Result<(), Error> {
    let index = internal_find_child_index(pager.get(parent_page_num)?, old_key);
    let page = pager.get_mut(parent_page_num)?;
    let num_keys = internal_num_keys(page);
    if index < num_keys {
        node::set_internal_key(page, index, new_key);
    }
    Ok(())
}
