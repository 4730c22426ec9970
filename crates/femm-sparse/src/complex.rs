//! `BigComplexLinProb`: the complex sparse engine used by time-harmonic
//! (AC) magnetics. Carries the primary matrix plus, for Newton-mode
//! nonlinear assembly, three auxiliary structured matrices (`Mh`
//! Hermitian, `Ma` anti-Hermitian, `Ms` complex-symmetric) selected by
//! `put`/`get`'s `which` parameter.

use rayon::prelude::*;

use crate::arena::RowArena;
use crate::SolveError;
use femm_complex::Scalar;

/// Which of the four matrices a `put`/`get` call addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Which {
    Primary,
    Hermitian,
    AntiHermitian,
    ComplexSymmetric,
}

#[derive(Debug, Clone)]
pub struct BigComplexLinProb {
    primary: RowArena<Scalar>,
    mh: RowArena<Scalar>,
    ma: RowArena<Scalar>,
    ms: RowArena<Scalar>,
    num_nodes: usize,
    bandwidth_hint: usize,
    pub b: Vec<Scalar>,
    pub v: Vec<Scalar>,
}

fn zero() -> Scalar {
    Scalar::new(0.0, 0.0)
}

impl BigComplexLinProb {
    pub fn create(n: usize, bandwidth_hint: usize) -> Self {
        Self::create_with_conductors(n, bandwidth_hint, n)
    }

    pub fn create_with_conductors(n: usize, bandwidth_hint: usize, num_nodes: usize) -> Self {
        Self {
            primary: RowArena::new(n),
            mh: RowArena::new(n),
            ma: RowArena::new(n),
            ms: RowArena::new(n),
            num_nodes,
            bandwidth_hint,
            b: vec![zero(); n],
            v: vec![zero(); n],
        }
    }

    pub fn len(&self) -> usize {
        self.primary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.len() == 0
    }

    pub fn num_mesh_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn bandwidth_hint(&self) -> usize {
        self.bandwidth_hint
    }

    fn arena(&self, which: Which) -> &RowArena<Scalar> {
        match which {
            Which::Primary => &self.primary,
            Which::Hermitian => &self.mh,
            Which::AntiHermitian => &self.ma,
            Which::ComplexSymmetric => &self.ms,
        }
    }

    fn arena_mut(&mut self, which: Which) -> &mut RowArena<Scalar> {
        match which {
            Which::Primary => &mut self.primary,
            Which::Hermitian => &mut self.mh,
            Which::AntiHermitian => &mut self.ma,
            Which::ComplexSymmetric => &mut self.ms,
        }
    }

    pub fn put(&mut self, value: Scalar, i: usize, j: usize, which: Which) {
        let (r, c) = if i <= j { (i, j) } else { (j, i) };
        self.arena_mut(which).add(r, c, value);
    }

    pub fn get(&self, i: usize, j: usize, which: Which) -> Scalar {
        let (r, c) = if i <= j { (i, j) } else { (j, i) };
        self.arena(which).get(r, c)
    }

    /// Zero all four matrices and the RHS; `V` and CG scratch persist for
    /// the same reason as the real engine (see `real::BigLinProb::wipe`).
    pub fn wipe(&mut self) {
        self.primary.wipe();
        self.mh.wipe();
        self.ma.wipe();
        self.ms.wipe();
        for x in &mut self.b {
            *x = zero();
        }
    }

    fn sym_get(&self, r: usize, c: usize) -> Scalar {
        let (lo, hi) = if r <= c { (r, c) } else { (c, r) };
        self.primary.get(lo, hi)
    }

    fn sym_add(&mut self, r: usize, c: usize, value: Scalar) {
        let (lo, hi) = if r <= c { (r, c) } else { (c, r) };
        self.primary.add(lo, hi, value);
    }

    fn sym_remove(&mut self, r: usize, c: usize) {
        let (lo, hi) = if r <= c { (r, c) } else { (c, r) };
        self.primary.remove(lo, hi);
    }

    fn sym_set(&mut self, r: usize, c: usize, value: Scalar) {
        let (lo, hi) = if r <= c { (r, c) } else { (c, r) };
        self.primary.set(lo, hi, value);
    }

    /// `setValue` on the primary matrix. The three Newton auxiliaries are
    /// folded into the primary matrix and RHS by the assembler before
    /// Dirichlet folding runs, so only `primary` needs this.
    pub fn set_value(&mut self, i: usize, value: Scalar) {
        let n = self.primary.len();
        for r in 0..i {
            let v = self.primary.get(r, i);
            if v != zero() {
                self.b[r] -= v * value;
                self.primary.remove(r, i);
            }
        }
        for c in (i + 1)..n {
            let v = self.primary.get(i, c);
            if v != zero() {
                self.b[c] -= v * value;
            }
        }
        self.primary.clear_row(i);
        self.primary.set(i, i, Scalar::new(1.0, 0.0));
        self.b[i] = value;
    }

    fn couple(&mut self, i: usize, j: usize, sign: f64) {
        let n = self.primary.len();
        let sign = Scalar::new(sign, 0.0);
        for r in 0..n {
            if r == i || r == j {
                continue;
            }
            let v = self.sym_get(r, j);
            if v != zero() {
                self.sym_add(r, i, sign * v);
                self.sym_remove(r, j);
            }
        }
        for c in 0..n {
            if c == j {
                continue;
            }
            let v = self.sym_get(j, c);
            if v != zero() {
                self.sym_add(i, c, sign * v);
            }
        }
        let bj = self.b[j];
        self.b[i] += sign * bj;

        self.sym_remove(i, j);
        self.primary.clear_row(j);
        self.sym_set(i, j, -sign);
        self.primary.set(j, j, Scalar::new(1.0, 0.0));
        self.b[j] = zero();
    }

    pub fn periodicity(&mut self, i: usize, j: usize) {
        self.couple(i, j, 1.0);
    }

    pub fn anti_periodicity(&mut self, i: usize, j: usize) {
        self.couple(i, j, -1.0);
    }

    /// `mult(X, Y, which)`: matrix-vector product against the selected
    /// matrix, mirroring the stored upper triangle like the real engine.
    /// The Hermitian/anti-Hermitian/complex-symmetric auxiliaries are not
    /// themselves solved against (they only ever contribute to the primary
    /// matrix and RHS during assembly), but `mult` still supports them for
    /// testing the assembler's per-matrix bookkeeping.
    pub fn mult(&self, x: &[Scalar], y: &mut [Scalar], which: Which) {
        for v in y.iter_mut() {
            *v = zero();
        }
        let arena = self.arena(which);
        let n = arena.len();
        for row in 0..n {
            for (col, val) in arena.row(row) {
                if col == row {
                    y[row] += val * x[row];
                } else {
                    y[row] += val * x[col];
                    y[col] += val * x[row];
                }
            }
        }
    }

    /// Symmetric Gauss-Seidel preconditioner over the primary matrix, same
    /// push-forward/pull-backward construction as the real engine.
    pub fn mult_pc(&self, x: &[Scalar], y: &mut [Scalar]) {
        let n = self.primary.len();
        let mut z = vec![zero(); n];
        let mut acc = x.to_vec();
        for row in 0..n {
            let diag = self.primary.get(row, row);
            let d = if diag.norm() > 1e-300 { diag } else { Scalar::new(1.0, 0.0) };
            z[row] = acc[row] / d;
            for (col, val) in self.primary.row(row) {
                if col != row {
                    acc[col] -= val * z[row];
                }
            }
        }
        for row in 0..n {
            acc[row] = self.primary.get(row, row) * z[row];
        }
        for row in (0..n).rev() {
            let diag = self.primary.get(row, row);
            let d = if diag.norm() > 1e-300 { diag } else { Scalar::new(1.0, 0.0) };
            let mut rhs = acc[row];
            for (col, val) in self.primary.row(row) {
                if col != row {
                    rhs -= val * y[col];
                }
            }
            y[row] = rhs / d;
        }
    }

    fn dot(a: &[Scalar], b: &[Scalar]) -> Scalar {
        a.par_iter().zip(b).map(|(x, y)| x.conj() * (*y)).sum()
    }

    fn norm(a: &[Scalar]) -> f64 {
        a.par_iter().map(|x| x.norm_sqr()).sum::<f64>().sqrt()
    }

    /// Bi-conjugate-gradient-stabilized solve against the primary matrix.
    /// The complex engine uses BiCGSTAB rather than plain CG because
    /// Newton-mode auxiliaries fold in a non-symmetric remainder, so the
    /// primary matrix is no longer guaranteed symmetric once they've been
    /// absorbed into it.
    pub fn bicgstab_solve(&mut self, precision: f64, warm_start: bool) -> Result<usize, SolveError> {
        let n = self.primary.len();
        if !warm_start {
            for x in &mut self.v {
                *x = zero();
            }
        }
        let b_norm = Self::norm(&self.b);
        if b_norm < 1e-300 {
            return Ok(0);
        }
        let mut r = vec![zero(); n];
        let mut mv = vec![zero(); n];
        self.mult(&self.v, &mut mv, Which::Primary);
        for i in 0..n {
            r[i] = self.b[i] - mv[i];
        }
        let r_hat = r.clone();
        let mut rho_old = Scalar::new(1.0, 0.0);
        let mut alpha = Scalar::new(1.0, 0.0);
        let mut omega = Scalar::new(1.0, 0.0);
        let mut p = vec![zero(); n];
        let mut v_vec = vec![zero(); n];

        let max_iter = (10 * n + 1000).max(1000);
        for iter in 0..max_iter {
            if Self::norm(&r) / b_norm < precision {
                return Ok(iter);
            }
            let rho_new = Self::dot(&r_hat, &r);
            if rho_new.norm() < 1e-300 || omega.norm() < 1e-300 {
                return Err(SolveError::NonConvergence);
            }
            let beta = (rho_new / rho_old) * (alpha / omega);
            for i in 0..n {
                p[i] = r[i] + beta * (p[i] - omega * v_vec[i]);
            }
            let mut z = vec![zero(); n];
            self.mult_pc(&p, &mut z);
            self.mult(&z, &mut v_vec, Which::Primary);
            let r_hat_v = Self::dot(&r_hat, &v_vec);
            if r_hat_v.norm() < 1e-300 {
                return Err(SolveError::NonConvergence);
            }
            alpha = rho_new / r_hat_v;
            let mut s = vec![zero(); n];
            for i in 0..n {
                s[i] = r[i] - alpha * v_vec[i];
            }
            if Self::norm(&s) / b_norm < precision {
                for i in 0..n {
                    self.v[i] += alpha * z[i];
                }
                return Ok(iter);
            }
            let mut zs = vec![zero(); n];
            self.mult_pc(&s, &mut zs);
            let mut t = vec![zero(); n];
            self.mult(&zs, &mut t, Which::Primary);
            let tt = Self::dot(&t, &t);
            omega = if tt.norm() < 1e-300 {
                Scalar::new(0.0, 0.0)
            } else {
                Self::dot(&t, &s) / tt
            };
            for i in 0..n {
                self.v[i] += alpha * z[i] + omega * zs[i];
                r[i] = s[i] - omega * t[i];
            }
            rho_old = rho_new;
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
    fn which_selects_independent_matrices() {
        let mut mp = BigComplexLinProb::create(2, 2);
        mp.put(Scalar::new(1.0, 0.0), 0, 1, Which::Primary);
        mp.put(Scalar::new(2.0, 0.0), 0, 1, Which::Hermitian);
        assert_eq!(mp.get(0, 1, Which::Primary), Scalar::new(1.0, 0.0));
        assert_eq!(mp.get(0, 1, Which::Hermitian), Scalar::new(2.0, 0.0));
        assert_eq!(mp.get(1, 0, Which::AntiHermitian), zero());
    }

    #[test]
    fn set_value_pins_solution() {
        let mut mp = BigComplexLinProb::create(3, 3);
        mp.put(Scalar::new(1.0, 0.0), 0, 0, Which::Primary);
        mp.put(Scalar::new(-1.0, 0.0), 0, 1, Which::Primary);
        mp.put(Scalar::new(2.0, 0.0), 1, 1, Which::Primary);
        mp.put(Scalar::new(-1.0, 0.0), 1, 2, Which::Primary);
        mp.put(Scalar::new(1.0, 0.0), 2, 2, Which::Primary);
        mp.set_value(0, zero());
        mp.set_value(2, Scalar::new(10.0, 0.0));
        mp.bicgstab_solve(1e-10, false).unwrap();
        assert!((mp.v[0] - zero()).norm() < 1e-7);
        assert!((mp.v[2] - Scalar::new(10.0, 0.0)).norm() < 1e-7);
    }

    #[test]
    fn periodicity_ties_nodes_together() {
        let mut mp = BigComplexLinProb::create(4, 4);
        mp.put(Scalar::new(1.0, 0.0), 0, 0, Which::Primary);
        mp.put(Scalar::new(-1.0, 0.0), 0, 1, Which::Primary);
        mp.put(Scalar::new(1.0, 0.0), 1, 1, Which::Primary);
        mp.put(Scalar::new(1.0, 0.0), 2, 2, Which::Primary);
        mp.put(Scalar::new(-1.0, 0.0), 2, 3, Which::Primary);
        mp.put(Scalar::new(1.0, 0.0), 3, 3, Which::Primary);
        mp.b[1] = Scalar::new(1.0, 0.0);
        mp.b[3] = Scalar::new(1.0, 0.0);
        mp.set_value(0, zero());
        mp.set_value(2, zero());
        mp.periodicity(1, 3);
        mp.bicgstab_solve(1e-10, false).unwrap();
        assert!((mp.v[1] - mp.v[3]).norm() < 1e-6);
    }
}
