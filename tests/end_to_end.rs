//! End-to-end scenarios driven straight through `Table`, covering
//! spec.md §8's worked examples.

use meinsql::errors;
use meinsql::storage::row::Row;
use meinsql::storage::Table;

fn open_tmp() -> (tempfile::TempPath, Table) {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let path = tmp.into_temp_path();
    let table = Table::open(&path).unwrap();
    (path, table)
}

#[test]
fn basic_insert_and_select() {
    let (_path, mut table) = open_tmp();
    table
        .insert_row(&Row::new(1, "alice", "alice@example.com").unwrap())
        .unwrap();
    let rows = table.select_rows().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, 1);
    assert_eq!(rows[0].username, "alice");
    assert_eq!(rows[0].email, "alice@example.com");
}

#[test]
fn sorted_key_insert_stays_sorted() {
    let (_path, mut table) = open_tmp();
    for id in 1..=5u32 {
        table
            .insert_row(&Row::new(id, "u", "e@x.com").unwrap())
            .unwrap();
    }
    let ids: Vec<u32> = table.select_rows().unwrap().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
}

#[test]
fn fourteen_row_insert_splits_leaf_and_promotes_root() {
    let (_path, mut table) = open_tmp();
    for id in 1..=14u32 {
        table
            .insert_row(&Row::new(id, "u", "e@x.com").unwrap())
            .unwrap();
    }
    let dump = table.render_btree().unwrap();
    assert!(dump.contains("internal"));
    assert!(dump.contains("key 7"));
    let ids: Vec<u32> = table.select_rows().unwrap().iter().map(|r| r.id).collect();
    assert_eq!(ids, (1..=14).collect::<Vec<_>>());
}

#[test]
fn duplicate_key_is_rejected_without_mutating_the_table() {
    let (_path, mut table) = open_tmp();
    table
        .insert_row(&Row::new(1, "alice", "alice@example.com").unwrap())
        .unwrap();
    let err = table
        .insert_row(&Row::new(1, "mallory", "mallory@example.com").unwrap())
        .unwrap_err();
    assert!(matches!(err, errors::Error::DuplicateKey(1)));
    assert_eq!(table.select_rows().unwrap().len(), 1);
}

#[test]
fn thirty_rows_survive_close_and_reopen() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let path = tmp.into_temp_path();
    {
        let mut table = Table::open(&path).unwrap();
        for id in 1..=30u32 {
            table
                .insert_row(&Row::new(id, "u", "e@x.com").unwrap())
                .unwrap();
        }
        table.close().unwrap();
    }
    {
        let mut table = Table::open(&path).unwrap();
        let ids: Vec<u32> = table.select_rows().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, (1..=30).collect::<Vec<_>>());
    }
}

#[test]
fn reverse_order_insert_preserves_sorted_order_and_leaf_chain() {
    let (_path, mut table) = open_tmp();
    for id in (1..=30u32).rev() {
        table
            .insert_row(&Row::new(id, "u", "e@x.com").unwrap())
            .unwrap();
    }
    let ids: Vec<u32> = table.select_rows().unwrap().iter().map(|r| r.id).collect();
    assert_eq!(ids, (1..=30).collect::<Vec<_>>());
}
