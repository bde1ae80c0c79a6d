//! `match` versus `if` chains over a small dynamic value type.
//!
//! Run with `cargo run --release --example bench_match -- --fast`, or narrow
//! the set with `--mb-filter guard complex`.

use microbench::{bench, configure};
use std::hint::black_box;

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Int(i64),
    Str(String),
    List(Vec<Value>),
}

fn sample_values() -> Vec<Value> {
    vec![
        Value::Int(1),
        Value::Int(10),
        Value::Str("hello".to_string()),
        Value::Str("world".to_string()),
        Value::List(vec![]),
        Value::List(vec![Value::Int(1), Value::Int(2)]),
        Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
    ]
}

fn classify_match(value: &Value) -> u8 {
    match value {
        Value::Int(1) => 1,
        Value::Int(_) => 2,
        Value::Str(s) if s == "hello" => 3,
        Value::Str(_) => 4,
        Value::List(items) if items.is_empty() => 5,
        Value::List(items) => match items.as_slice() {
            [Value::Int(a), Value::Int(b)] if a < b => 6,
            [first, .., last] if first != last => 7,
            _ => 8,
        },
    }
}

fn classify_if(value: &Value) -> u8 {
    if let Value::Int(n) = value {
        if *n == 1 { 1 } else { 2 }
    } else if let Value::Str(s) = value {
        if s == "hello" { 3 } else { 4 }
    } else if let Value::List(items) = value {
        if items.is_empty() {
            5
        } else if items.len() == 2 {
            match (&items[0], &items[1]) {
                (Value::Int(a), Value::Int(b)) if a < b => 6,
                _ => 8,
            }
        } else if items.first() != items.last() {
            7
        } else {
            8
        }
    } else {
        0
    }
}

#[bench]
fn bench_int_match() {
    'init: {
        let n: i64 = 7;
    }
    'bench: {
        match black_box(n) {
            0 => 'a',
            1..=5 => 'b',
            6 | 7 => 'c',
            _ => 'd',
        }
    }
}

#[bench]
fn bench_int_if() {
    'init: {
        let n: i64 = 7;
    }
    'bench: {
        let n = black_box(n);
        if n == 0 {
            'a'
        } else if (1..=5).contains(&n) {
            'b'
        } else if n == 6 || n == 7 {
            'c'
        } else {
            'd'
        }
    }
}

#[bench]
fn bench_str_match() {
    'init: {
        let word = String::from("delete");
    }
    'bench: {
        match black_box(word.as_str()) {
            "create" => 1,
            "read" => 2,
            "update" => 3,
            "delete" => 4,
            _ => 0,
        }
    }
}

#[bench]
fn bench_str_if() {
    'init: {
        let word = String::from("delete");
    }
    'bench: {
        let word = black_box(word.as_str());
        if word == "create" {
            1
        } else if word == "read" {
            2
        } else if word == "update" {
            3
        } else if word == "delete" {
            4
        } else {
            0
        }
    }
}

#[bench]
fn bench_slice_match() {
    'init: {
        let items = vec![3, 1, 4, 1, 5];
    }
    'bench: {
        match black_box(items.as_slice()) {
            [] => 0,
            [x] => *x,
            [first, .., last] => first + last,
        }
    }
}

#[bench]
fn bench_slice_if() {
    'init: {
        let items = vec![3, 1, 4, 1, 5];
    }
    'bench: {
        let items = black_box(items.as_slice());
        if items.is_empty() {
            0
        } else if items.len() == 1 {
            items[0]
        } else {
            items[0] + items[items.len() - 1]
        }
    }
}

#[bench]
#[configure(name = "guards (match)")]
fn bench_guard_match() {
    'init: {
        let point = (3_i32, -3_i32);
    }
    'bench: {
        match black_box(point) {
            (0, 0) => "origin",
            (x, y) if x == y => "diagonal",
            (x, y) if x == -y => "anti-diagonal",
            (x, _) if x > 0 => "right",
            _ => "left",
        }
    }
}

#[bench]
#[configure(name = "guards (if)")]
fn bench_guard_if() {
    'init: {
        let point = (3_i32, -3_i32);
    }
    'bench: {
        let (x, y) = black_box(point);
        if x == 0 && y == 0 {
            "origin"
        } else if x == y {
            "diagonal"
        } else if x == -y {
            "anti-diagonal"
        } else if x > 0 {
            "right"
        } else {
            "left"
        }
    }
}

#[bench]
#[configure(iterations = 10)]
fn bench_complex_match() {
    'init: {
        let values = sample_values();
    }
    'bench: {
        let classes: Vec<u8> = black_box(&values).iter().map(classify_match).collect();
    }
    'verify: {
        assert_eq!(classes, [1, 2, 3, 4, 5, 6, 7]);
    }
}

#[bench]
#[configure(iterations = 10)]
fn bench_complex_if() {
    'init: {
        let values = sample_values();
    }
    'bench: {
        let classes: Vec<u8> = black_box(&values).iter().map(classify_if).collect();
    }
    'verify: {
        assert_eq!(classes, [1, 2, 3, 4, 5, 6, 7]);
    }
}

fn main() -> anyhow::Result<()> {
    microbench::run()
}
