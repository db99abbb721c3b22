#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
//! The variable-order heap: a binary max-heap over variable activities with
//! support for decrease-key, in the style of Minisat's `mtl/Heap.h`.
//!
//! Activities live in the solver, not in the heap; every operation that
//! needs an ordering takes the activity slice as a parameter. The heap
//! tolerates lazy removal: variables that get assigned stay in the heap and
//! are simply skipped when popped, and a bulk [`VarOrderHeap::build`] path
//! re-densifies it after restarts or top-level propagation.

use crate::sat::literal::Var;

#[derive(Debug, Clone, Default)]
pub struct VarOrderHeap {
    /// Heap content, ordered so the highest activity is at the root.
    content: Vec<Var>,
    /// Position of each variable in `content`; -1 means absent.
    indices: Vec<i32>,
}

const fn left(i: usize) -> usize {
    i * 2 + 1
}
const fn right(i: usize) -> usize {
    (i + 1) * 2
}
const fn parent(i: usize) -> usize {
    (i - 1) >> 1
}

impl VarOrderHeap {
    /// A heap over all variables of `activity`.
    #[must_use]
    pub fn new(activity: &[f64]) -> Self {
        let mut q = Self {
            content: Vec::with_capacity(activity.len()),
            indices: Vec::new(),
        };
        for v in 0..activity.len() {
            #[allow(clippy::cast_possible_truncation)]
            q.insert(v as Var, activity);
        }
        q
    }

    fn lt(activity: &[f64], i: Var, j: Var) -> bool {
        activity[i as usize] > activity[j as usize]
    }

    fn percolate_up(&mut self, mut i: usize, activity: &[f64]) {
        let x = self.content[i];
        while i != 0 {
            let p = parent(i);
            if !Self::lt(activity, x, self.content[p]) {
                break;
            }
            self.content[i] = self.content[p];
            self.indices[self.content[p] as usize] = i as i32;
            i = p;
        }
        self.content[i] = x;
        self.indices[x as usize] = i as i32;
    }

    fn percolate_down(&mut self, mut i: usize, activity: &[f64]) {
        let x = self.content[i];
        while left(i) < self.content.len() {
            let child = if right(i) < self.content.len()
                && Self::lt(activity, self.content[right(i)], self.content[left(i)])
            {
                right(i)
            } else {
                left(i)
            };
            if !Self::lt(activity, self.content[child], x) {
                break;
            }
            self.content[i] = self.content[child];
            self.indices[self.content[i] as usize] = i as i32;
            i = child;
        }
        self.content[i] = x;
        self.indices[x as usize] = i as i32;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.content.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    #[must_use]
    pub fn contains(&self, v: Var) -> bool {
        (v as usize) < self.indices.len() && self.indices[v as usize] >= 0
    }

    /// Moves `v` towards the root after its activity increased.
    pub fn decrease(&mut self, v: Var, activity: &[f64]) {
        let i = self.indices[v as usize];
        debug_assert!(i >= 0, "decrease on a variable not in the heap");
        #[allow(clippy::cast_sign_loss)]
        self.percolate_up(i as usize, activity);
    }

    /// Inserts `v`. Must not already be present.
    pub fn insert(&mut self, v: Var, activity: &[f64]) {
        if self.indices.len() <= v as usize {
            self.indices.resize(v as usize + 1, -1);
        }
        debug_assert!(self.indices[v as usize] < 0);
        self.indices[v as usize] = self.content.len() as i32;
        self.content.push(v);
        #[allow(clippy::cast_sign_loss)]
        self.percolate_up(self.indices[v as usize] as usize, activity);
    }

    /// Pops the variable with the highest activity.
    ///
    /// # Panics
    ///
    /// Panics on an empty heap.
    pub fn remove_min(&mut self, activity: &[f64]) -> Var {
        let x = self.content[0];
        let last = self.content.len() - 1;
        self.content[0] = self.content[last];
        self.indices[self.content[0] as usize] = 0;
        self.indices[x as usize] = -1;
        self.content.truncate(last);
        if self.content.len() > 1 {
            self.percolate_down(0, activity);
        }
        x
    }

    /// Rebuilds the heap from scratch over exactly the variables in `vars`.
    pub fn build(&mut self, vars: &[Var], activity: &[f64]) {
        for &v in &self.content {
            self.indices[v as usize] = -1;
        }
        self.content.clear();
        for (i, &v) in vars.iter().enumerate() {
            self.indices[v as usize] = i as i32;
            self.content.push(v);
        }
        for i in (0..self.content.len() / 2).rev() {
            self.percolate_down(i, activity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_order() {
        let activity = [1.0, 5.0, 3.0, 4.0, 2.0];
        let mut q = VarOrderHeap::new(&activity);
        assert_eq!(q.len(), 5);
        let order: Vec<Var> = (0..5).map(|_| q.remove_min(&activity)).collect();
        assert_eq!(order, vec![1, 3, 2, 4, 0]);
        assert!(q.is_empty());
    }

    #[test]
    fn test_decrease_key() {
        let mut activity = [1.0, 2.0, 3.0];
        let mut q = VarOrderHeap::new(&activity);
        activity[0] = 10.0;
        q.decrease(0, &activity);
        assert_eq!(q.remove_min(&activity), 0);
    }

    #[test]
    fn test_contains_and_reinsert() {
        let activity = [1.0, 2.0];
        let mut q = VarOrderHeap::new(&activity);
        let v = q.remove_min(&activity);
        assert_eq!(v, 1);
        assert!(!q.contains(1));
        assert!(q.contains(0));
        q.insert(1, &activity);
        assert!(q.contains(1));
        assert_eq!(q.remove_min(&activity), 1);
    }

    #[test]
    fn test_build() {
        let activity = [4.0, 1.0, 3.0, 2.0];
        let mut q = VarOrderHeap::new(&activity);
        q.build(&[1, 3], &activity);
        assert_eq!(q.len(), 2);
        assert!(!q.contains(0));
        assert_eq!(q.remove_min(&activity), 3);
        assert_eq!(q.remove_min(&activity), 1);
    }
}
