//! `BigLinProb`: the real symmetric sparse engine used by magnetostatics
//! (DC), electrostatics, and heat flow.

use rayon::prelude::*;

use crate::arena::RowArena;
use crate::SolveError;

/// Row-linked symmetric sparse matrix plus RHS and CG scratch vectors.
/// Only the upper triangle (`col >= row`) is stored; `get`/`put` present a
/// symmetric view over it.
#[derive(Debug, Clone)]
pub struct BigLinProb {
    m: RowArena<f64>,
    /// Number of mesh-node unknowns; the remaining `n - num_nodes` rows are
    /// conductor unknowns appended by `create(n, bw, m)`.
    num_nodes: usize,
    bandwidth_hint: usize,
    pub b: Vec<f64>,
    pub v: Vec<f64>,
}

impl BigLinProb {
    /// `create(n, bw)`: allocate for `n` unknowns, all mesh nodes.
    pub fn create(n: usize, bandwidth_hint: usize) -> Self {
        Self::create_with_conductors(n, bandwidth_hint, n)
    }

    /// `create(n, bw, m)`: `n` total unknowns, the first `m` being mesh
    /// nodes and the rest conductor/circuit unknowns.
    pub fn create_with_conductors(n: usize, bandwidth_hint: usize, num_nodes: usize) -> Self {
        Self {
            m: RowArena::new(n),
            num_nodes,
            bandwidth_hint,
            b: vec![0.0; n],
            v: vec![0.0; n],
        }
    }

    pub fn len(&self) -> usize {
        self.m.len()
    }

    pub fn is_empty(&self) -> bool {
        self.m.len() == 0
    }

    pub fn num_mesh_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn bandwidth_hint(&self) -> usize {
        self.bandwidth_hint
    }

    /// `put(value, i, j)`: accumulate `value` into the symmetric slot
    /// `(i, j)`.
    pub fn put(&mut self, value: f64, i: usize, j: usize) {
        let (r, c) = if i <= j { (i, j) } else { (j, i) };
        self.m.add(r, c, value);
    }

    /// `get(i, j)`: 0.0 if absent.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        let (r, c) = if i <= j { (i, j) } else { (j, i) };
        self.m.get(r, c)
    }

    /// Zero the matrix and RHS without deallocating. `V` and the CG scratch
    /// are left alone: the outer loop needs the previous iterate's `V` for
    /// relaxation and to compute `|B|` from its gradient when updating
    /// nonlinear permeabilities, and the CG solver reinitializes its own
    /// scratch at the top of every `solve`.
    pub fn wipe(&mut self) {
        self.m.wipe();
        for x in &mut self.b {
            *x = 0.0;
        }
    }

    fn sym_get(&self, r: usize, c: usize) -> f64 {
        let (lo, hi) = if r <= c { (r, c) } else { (c, r) };
        self.m.get(lo, hi)
    }

    fn sym_add(&mut self, r: usize, c: usize, value: f64) {
        let (lo, hi) = if r <= c { (r, c) } else { (c, r) };
        self.m.add(lo, hi, value);
    }

    fn sym_remove(&mut self, r: usize, c: usize) {
        let (lo, hi) = if r <= c { (r, c) } else { (c, r) };
        self.m.remove(lo, hi);
    }

    fn sym_set(&mut self, r: usize, c: usize, value: f64) {
        let (lo, hi) = if r <= c { (r, c) } else { (c, r) };
        self.m.set(lo, hi, value);
    }

    /// `setValue(i, value)`: force `V[i] == value`. Every other row
    /// referencing column `i` is folded (its RHS absorbs the known value,
    /// its column-`i` entry drops); row `i` itself becomes the identity
    /// row.
    pub fn set_value(&mut self, i: usize, value: f64) {
        let n = self.m.len();
        for r in 0..i {
            let v = self.m.get(r, i);
            if v != 0.0 {
                self.b[r] -= v * value;
                self.m.remove(r, i);
            }
        }
        for c in (i + 1)..n {
            let v = self.m.get(i, c);
            if v != 0.0 {
                self.b[c] -= v * value;
            }
        }
        self.m.clear_row(i);
        self.m.set(i, i, 1.0);
        self.b[i] = value;
    }

    /// Couple `V[i]` and `V[j]` (`periodicity`/`antiPeriodicity`). `sign =
    /// 1.0` for periodic (`V[i] == V[j]`), `-1.0` for anti-periodic
    /// (`V[i] == -V[j]`). Folds column/row `j` into `i`, then
    /// rewrites the `(i, j)` slot and `j`'s diagonal into the constraint
    /// `V[j] - sign*V[i] = 0`.
    fn couple(&mut self, i: usize, j: usize, sign: f64) {
        let n = self.m.len();
        for r in 0..n {
            if r == i || r == j {
                continue;
            }
            let v = self.sym_get(r, j);
            if v != 0.0 {
                self.sym_add(r, i, sign * v);
                self.sym_remove(r, j);
            }
        }
        for c in 0..n {
            if c == j {
                continue;
            }
            let v = self.sym_get(j, c);
            if v != 0.0 {
                self.sym_add(i, c, sign * v);
            }
        }
        let bj = self.b[j];
        self.b[i] += sign * bj;

        self.sym_remove(i, j);
        self.m.clear_row(j);
        self.sym_set(i, j, -sign);
        self.m.set(j, j, 1.0);
        self.b[j] = 0.0;
    }

    pub fn periodicity(&mut self, i: usize, j: usize) {
        self.couple(i, j, 1.0);
    }

    pub fn anti_periodicity(&mut self, i: usize, j: usize) {
        self.couple(i, j, -1.0);
    }

    /// `mult(X, Y)`: `Y = M*X`, walking only the stored upper triangle and
    /// mirroring off-diagonal contributions.
    pub fn mult(&self, x: &[f64], y: &mut [f64]) {
        for v in y.iter_mut() {
            *v = 0.0;
        }
        let n = self.m.len();
        for row in 0..n {
            for (col, val) in self.m.row(row) {
                if col == row {
                    y[row] += val * x[row];
                } else {
                    y[row] += val * x[col];
                    y[col] += val * x[row];
                }
            }
        }
    }

    /// `multPC(X, Y)`: symmetric Gauss-Seidel preconditioner. Forward sweep
    /// pushes each row's own (upper) entries onto the not-yet-visited rows'
    /// accumulators -- exploiting the same upper-triangular-plus-mirroring
    /// trick as `mult` -- then a backward sweep pulls from the
    /// already-solved higher rows directly.
    pub fn mult_pc(&self, x: &[f64], y: &mut [f64]) {
        let n = self.m.len();
        let mut z = vec![0.0; n];
        let mut acc = x.to_vec();
        for row in 0..n {
            let diag = self.m.get(row, row);
            let d = if diag.abs() > 1e-300 { diag } else { 1.0 };
            z[row] = acc[row] / d;
            for (col, val) in self.m.row(row) {
                if col != row {
                    acc[col] -= val * z[row];
                }
            }
        }
        for row in 0..n {
            acc[row] = self.m.get(row, row) * z[row];
        }
        for row in (0..n).rev() {
            let diag = self.m.get(row, row);
            let d = if diag.abs() > 1e-300 { diag } else { 1.0 };
            let mut rhs = acc[row];
            for (col, val) in self.m.row(row) {
                if col != row {
                    rhs -= val * y[col];
                }
            }
            y[row] = rhs / d;
        }
    }

    /// CG spends most of its time in these two reductions; every iteration
    /// runs one `dot` against the preconditioned residual plus another
    /// against the search direction, so they're worth spreading across
    /// cores the way `residual.rs` spreads its elementwise force-vector
    /// pass.
    fn dot(a: &[f64], b: &[f64]) -> f64 {
        a.par_iter().zip(b).map(|(x, y)| x * y).sum()
    }

    fn norm(a: &[f64]) -> f64 {
        Self::dot(a, a).sqrt()
    }

    /// Preconditioned conjugate gradient: terminates when
    /// `||r|| / ||b|| < precision`. `warm_start = true` reuses `self.v` as
    /// the initial guess; otherwise `V` is zeroed first.
    pub fn pcg_solve(&mut self, precision: f64, warm_start: bool) -> Result<usize, SolveError> {
        let n = self.m.len();
        if !warm_start {
            for x in &mut self.v {
                *x = 0.0;
            }
        }
        let b_norm = Self::norm(&self.b);
        if b_norm < 1e-300 {
            return Ok(0);
        }
        let mut r = vec![0.0; n];
        let mut mv = vec![0.0; n];
        self.mult(&self.v, &mut mv);
        for i in 0..n {
            r[i] = self.b[i] - mv[i];
        }
        let mut z = vec![0.0; n];
        self.mult_pc(&r, &mut z);
        let mut p = z.clone();
        let mut rz_old = Self::dot(&r, &z);

        let max_iter = (10 * n + 1000).max(1000);
        for iter in 0..max_iter {
            if Self::norm(&r) / b_norm < precision {
                return Ok(iter);
            }
            let mut u = vec![0.0; n];
            self.mult(&p, &mut u);
            let pu = Self::dot(&p, &u);
            if pu.abs() < 1e-300 {
                return Err(SolveError::NonConvergence);
            }
            let alpha = rz_old / pu;
            for i in 0..n {
                self.v[i] += alpha * p[i];
                r[i] -= alpha * u[i];
            }
            self.mult_pc(&r, &mut z);
            let rz_new = Self::dot(&r, &z);
            let beta = rz_new / rz_old;
            for i in 0..n {
                p[i] = z[i] + beta * p[i];
            }
            rz_old = rz_new;
        }
        if Self::norm(&r) / b_norm < precision {
            Ok(max_iter)
        } else {
            Err(SolveError::NonConvergence)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_is_symmetric() {
        let mut mp = BigLinProb::create(3, 3);
        mp.put(5.0, 0, 2);
        assert_eq!(mp.get(0, 2), mp.get(2, 0));
    }

    #[test]
    fn set_value_pins_solution_exactly() {
        // 1D chain: -u'' = 0 discretized as a 3-node tridiagonal stiffness,
        // pin both ends, solve for the (trivially linear) middle node.
        let mut mp = BigLinProb::create(3, 3);
        mp.put(1.0, 0, 0);
        mp.put(-1.0, 0, 1);
        mp.put(2.0, 1, 1);
        mp.put(-1.0, 1, 2);
        mp.put(1.0, 2, 2);
        mp.set_value(0, 0.0);
        mp.set_value(2, 10.0);
        mp.pcg_solve(1e-10, false).unwrap();
        assert!((mp.v[0] - 0.0).abs() < 1e-8);
        assert!((mp.v[2] - 10.0).abs() < 1e-8);
        assert!((mp.v[1] - 5.0).abs() < 1e-6);
    }

    #[test]
    fn periodicity_ties_nodes_together() {
        // Two disconnected unit "resistors" to ground, tied together at
        // their free ends by periodicity; both free-end nodes must come
        // out equal.
        let mut mp = BigLinProb::create(4, 4);
        // node 0: grounded (fixed 0); node 1: free end of chain A
        mp.put(1.0, 0, 0);
        mp.put(-1.0, 0, 1);
        mp.put(1.0, 1, 1);
        // node 2: grounded; node 3: free end of chain B
        mp.put(1.0, 2, 2);
        mp.put(-1.0, 2, 3);
        mp.put(1.0, 3, 3);
        mp.b[1] = 1.0;
        mp.b[3] = 1.0;
        mp.set_value(0, 0.0);
        mp.set_value(2, 0.0);
        mp.periodicity(1, 3);
        mp.pcg_solve(1e-10, false).unwrap();
        assert!((mp.v[1] - mp.v[3]).abs() < 1e-8);
    }

    #[test]
    fn anti_periodicity_negates() {
        let mut mp = BigLinProb::create(2, 2);
        mp.put(1.0, 0, 0);
        mp.put(1.0, 1, 1);
        mp.b[0] = 3.0;
        mp.anti_periodicity(0, 1);
        mp.pcg_solve(1e-10, false).unwrap();
        assert!((mp.v[0] + mp.v[1]).abs() < 1e-6);
    }

    #[test]
    fn mult_matches_dense_reference() {
        let mut mp = BigLinProb::create(2, 2);
        mp.put(2.0, 0, 0);
        mp.put(3.0, 0, 1);
        mp.put(4.0, 1, 1);
        let x = [1.0, 2.0];
        let mut y = [0.0; 2];
        mp.mult(&x, &mut y);
        assert!((y[0] - (2.0 * 1.0 + 3.0 * 2.0)).abs() < 1e-12);
        assert!((y[1] - (3.0 * 1.0 + 4.0 * 2.0)).abs() < 1e-12);
    }

    #[test]
    fn wipe_clears_matrix_and_rhs_but_not_v() {
        let mut mp = BigLinProb::create(2, 2);
        mp.put(1.0, 0, 0);
        mp.b[0] = 2.0;
        mp.v[0] = 9.0;
        mp.wipe();
        assert_eq!(mp.get(0, 0), 0.0);
        assert_eq!(mp.b[0], 0.0);
        assert_eq!(mp.v[0], 9.0);
    }
}
