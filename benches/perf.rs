// Copyright 2019-2020 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

#[macro_use]
extern crate bencher;
extern crate spla;

use bencher::Bencher;
use spla::{Descriptor, Expression, Matrix, Value, Vector, BOOL, INT};

/// Deterministic xorshift so repeated benchmark runs see the same inputs
/// without pulling in a dependency the rest of the crate doesn't use.
struct Xorshift(u64);

impl Xorshift {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
}

/// A random NxN adjacency with roughly `avg_degree` stored entries per row.
fn random_adjacency(n: usize, avg_degree: usize, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut rng = Xorshift(seed | 1);
    let mut rows = Vec::with_capacity(n * avg_degree);
    let mut cols = Vec::with_capacity(n * avg_degree);
    for r in 0..n {
        for _ in 0..avg_degree {
            rows.push(r);
            cols.push((rng.next() as usize) % n);
        }
    }
    (rows, cols)
}

fn mxv_csr_medium(bench: &mut Bencher) {
    let n = 2000;
    let (rows, cols) = random_adjacency(n, 8, 0xC0FFEE);
    let matrix = Matrix::new(INT.clone(), n, n);
    let values: Vec<Value> = (0..rows.len()).map(|i| Value::Int((i % 7) as i64)).collect();
    matrix.build(&rows, &cols, &values, None).unwrap();

    let input = Vector::new(INT.clone(), n);
    for i in (0..n).step_by(3) {
        input.set(i, Value::Int(1), None).unwrap();
    }
    let out = Vector::new(INT.clone(), n);

    bench.iter(|| {
        let expr = Expression::new();
        expr.mxv_node(
            out.clone(),
            None,
            matrix.clone(),
            input.clone(),
            spla::ops_builtin::times_int(),
            spla::ops_builtin::plus_int(),
            Descriptor::new(),
        );
        let submission = expr.submit().unwrap();
        submission.wait();
    });
    bench.bytes = (rows.len() as u64) * (std::mem::size_of::<i64>() as u64);
}

fn vxm_structural_bfs_step(bench: &mut Bencher) {
    let n = 2000;
    let (rows, cols) = random_adjacency(n, 4, 0xBEEF);
    let matrix = Matrix::new(BOOL.clone(), n, n);
    for (r, c) in rows.iter().zip(cols.iter()) {
        matrix.set(*r, *c, Value::Bool(true), None).unwrap();
    }
    let frontier = Vector::new(BOOL.clone(), n);
    frontier.set(0, Value::Bool(true), None).unwrap();
    let out = Vector::new(BOOL.clone(), n);

    bench.iter(|| {
        let expr = Expression::new();
        expr.vxm_node(
            out.clone(),
            None,
            matrix.clone(),
            frontier.clone(),
            spla::ops_builtin::and_bool(),
            spla::ops_builtin::or_bool(),
            Descriptor::new(),
        );
        let submission = expr.submit().unwrap();
        submission.wait();
    });
    bench.bytes = rows.len() as u64;
}

/// Every iteration rebuilds the vector from scratch, so each `read()` pays
/// the dok -> coo conversion cost fresh instead of hitting the cache.
fn vector_read_pays_conversion_each_time(bench: &mut Bencher) {
    let n = 5000;
    let mut rng = Xorshift(0xA5A5);
    let indices: Vec<usize> = (0..n / 4).map(|_| (rng.next() as usize) % n).collect();
    let values: Vec<Value> = (0..indices.len()).map(|i| Value::Int(i as i64)).collect();

    bench.iter(|| {
        let v = Vector::new(INT.clone(), n);
        v.build(&indices, &values, None).unwrap();
        let (out_indices, out_values) = v.read();
        assert_eq!(out_indices.len(), out_values.len());
    });
    bench.bytes = (indices.len() as u64) * (std::mem::size_of::<i64>() as u64);
}

/// Same data, but `read()` is called twice per iteration so the second
/// call hits the decoration cache's already-valid coo representation.
fn vector_read_hits_cached_conversion(bench: &mut Bencher) {
    let n = 5000;
    let mut rng = Xorshift(0xA5A5);
    let indices: Vec<usize> = (0..n / 4).map(|_| (rng.next() as usize) % n).collect();
    let values: Vec<Value> = (0..indices.len()).map(|i| Value::Int(i as i64)).collect();
    let v = Vector::new(INT.clone(), n);
    v.build(&indices, &values, None).unwrap();
    let _ = v.read();

    bench.iter(|| {
        let (out_indices, out_values) = v.read();
        assert_eq!(out_indices.len(), out_values.len());
    });
    bench.bytes = (indices.len() as u64) * (std::mem::size_of::<i64>() as u64);
}

benchmark_group!(
    benches,
    mxv_csr_medium,
    vxm_structural_bfs_step,
    vector_read_pays_conversion_each_time,
    vector_read_hits_cached_conversion
);
benchmark_main!(benches);
