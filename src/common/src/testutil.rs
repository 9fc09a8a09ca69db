use crate::database::Database;
use crate::table::Table;
use crate::{DataType, Field, Tuple};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use std::env;
use std::path::PathBuf;

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Catalog with the Person/Eats/Serves/Frequents relations.
pub fn pizza_db() -> Database {
    let mut db = Database::new("pizza");
    db.add_table(Table::new(
        "Person",
        vec![
            ("name", DataType::String),
            ("age", DataType::Int),
            ("gender", DataType::String),
        ],
    ));
    db.add_table(Table::new(
        "Eats",
        vec![("name", DataType::String), ("pizza", DataType::String)],
    ));
    db.add_table(Table::new(
        "Serves",
        vec![
            ("pizzeria", DataType::String),
            ("pizza", DataType::String),
            ("price", DataType::Float),
        ],
    ));
    db.add_table(Table::new(
        "Frequents",
        vec![("name", DataType::String), ("pizzeria", DataType::String)],
    ));
    db
}

/// Catalog of integer-only relations.
///
/// # Arguments
///
/// * `tables` - Relation names with their column names.
pub fn int_db(tables: &[(&str, &[&str])]) -> Database {
    let mut db = Database::new("ints");
    for (name, cols) in tables {
        db.add_table(Table::new(
            name,
            cols.iter().map(|c| (*c, DataType::Int)).collect(),
        ));
    }
    db
}

/// Converts an int vector to a Tuple.
///
/// # Argument
///
/// * `data` - Data to put into tuple.
pub fn int_vec_to_tuple(data: Vec<i64>) -> Tuple {
    Tuple::new(data.into_iter().map(Field::IntField).collect())
}

/// Creates a Vec of tuples containing IntFields given a 2D Vec of i64 's
pub fn create_tuple_list(tuple_data: Vec<Vec<i64>>) -> Vec<Tuple> {
    tuple_data.into_iter().map(int_vec_to_tuple).collect()
}

/// Random rows of `width` integers in `0..max`.
pub fn gen_random_int_rows(n: usize, width: usize, max: i64) -> Vec<Vec<i64>> {
    let mut rng = thread_rng();
    (0..n)
        .map(|_| (0..width).map(|_| rng.gen_range(0..max)).collect())
        .collect()
}

pub fn gen_rand_string(n: usize) -> String {
    thread_rng()
        .sample_iter(Alphanumeric)
        .take(n)
        .map(char::from)
        .collect()
}

pub fn gen_random_dir() -> PathBuf {
    init();
    let mut dir = env::temp_dir();
    dir.push(String::from("ramr"));
    let rand_string = gen_rand_string(10);
    dir.push(rand_string);
    dir
}

/// Multiset equality of two lists.
pub fn compare_unordered<T: PartialEq>(a: &[T], mut b: Vec<T>) -> bool {
    // Quick check
    if a.len() != b.len() {
        return false;
    }
    for x in a {
        match b.iter().position(|y| y == x) {
            None => return false,
            Some(idx) => {
                b.swap_remove(idx);
            }
        }
    }
    b.is_empty()
}
