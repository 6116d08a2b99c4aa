use crate::data::{DiffOp, DiffResult, DiffTag};
use std::iter::repeat_n;
use std::ops::{Index, IndexMut, Range};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edit {
    Equal,
    Delete,
    Insert,
}

/// Line diff of two texts.
pub fn diff_texts(original: &str, replacement: &str) -> DiffResult {
    let old: Vec<&str> = original.lines().collect();
    let new: Vec<&str> = replacement.lines().collect();
    diff_lines(&old, &new)
}

/// Computes a minimal line diff (Myers' O(ND) algorithm, linear-space
/// variant) and groups it into `equal | insert | delete | replace` ops.
///
/// The common prefix and suffix are stripped first so only the changed
/// middle goes through the edit-graph search. Memory stays proportional to
/// the input length.
pub fn diff_lines<S: AsRef<str>>(old: &[S], new: &[S]) -> DiffResult {
    let prefix = old
        .iter()
        .zip(new.iter())
        .take_while(|(a, b)| a.as_ref() == b.as_ref())
        .count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a.as_ref() == b.as_ref())
        .count();

    let mut edits = vec![Edit::Equal; prefix];
    edits.extend(shortest_edit(
        &old[prefix..old.len() - suffix],
        &new[prefix..new.len() - suffix],
    ));
    edits.extend(repeat_n(Edit::Equal, suffix));

    DiffResult {
        ops: group_edits(&edits, old, new),
    }
}

fn shortest_edit<S: AsRef<str>>(a: &[S], b: &[S]) -> Vec<Edit> {
    let mut edits = Vec::with_capacity(a.len() + b.len());
    let bound = max_d(a.len(), b.len());
    let mut forward = Frontier::new(bound);
    let mut backward = Frontier::new(bound);
    conquer(a, 0..a.len(), b, 0..b.len(), &mut forward, &mut backward, &mut edits);
    edits
}

fn max_d(n: usize, m: usize) -> usize {
    (n + m + 1) / 2 + 1
}

/// Furthest-reaching `x` per diagonal `k` for one search direction.
struct Frontier {
    offset: isize,
    xs: Vec<usize>,
}

impl Frontier {
    fn new(max_d: usize) -> Self {
        Self {
            offset: max_d as isize,
            xs: vec![0; 2 * max_d + 1],
        }
    }
}

impl Index<isize> for Frontier {
    type Output = usize;

    fn index(&self, k: isize) -> &usize {
        &self.xs[(k + self.offset) as usize]
    }
}

impl IndexMut<isize> for Frontier {
    fn index_mut(&mut self, k: isize) -> &mut usize {
        &mut self.xs[(k + self.offset) as usize]
    }
}

/// Linear-space divide and conquer: split at the middle snake, recurse on both halves.
fn conquer<S: AsRef<str>>(
    a: &[S],
    mut old: Range<usize>,
    b: &[S],
    mut new: Range<usize>,
    forward: &mut Frontier,
    backward: &mut Frontier,
    edits: &mut Vec<Edit>,
) {
    while !old.is_empty() && !new.is_empty() && a[old.start].as_ref() == b[new.start].as_ref() {
        edits.push(Edit::Equal);
        old.start += 1;
        new.start += 1;
    }
    let mut suffix = 0;
    while !old.is_empty() && !new.is_empty() && a[old.end - 1].as_ref() == b[new.end - 1].as_ref() {
        old.end -= 1;
        new.end -= 1;
        suffix += 1;
    }

    if old.is_empty() {
        edits.extend(repeat_n(Edit::Insert, new.len()));
    } else if new.is_empty() {
        edits.extend(repeat_n(Edit::Delete, old.len()));
    } else if let Some((x, y)) = middle_snake(a, old.clone(), b, new.clone(), forward, backward) {
        conquer(a, old.start..x, b, new.start..y, forward, backward, edits);
        conquer(a, x..old.end, b, y..new.end, forward, backward, edits);
    } else {
        edits.extend(repeat_n(Edit::Delete, old.len()));
        edits.extend(repeat_n(Edit::Insert, new.len()));
    }

    edits.extend(repeat_n(Edit::Equal, suffix));
}

/// Runs the forward and backward searches until they overlap and returns
/// the absolute start of the overlapping snake.
fn middle_snake<S: AsRef<str>>(
    a: &[S],
    old: Range<usize>,
    b: &[S],
    new: Range<usize>,
    vf: &mut Frontier,
    vb: &mut Frontier,
) -> Option<(usize, usize)> {
    let n = old.len();
    let m = new.len();
    let delta = n as isize - m as isize;
    let odd = delta & 1 == 1;

    vf[1] = 0;
    vb[1] = 0;

    for d in 0..max_d(n, m) as isize {
        let mut k = -d;
        while k <= d {
            let mut x = if k == -d || (k != d && vf[k - 1] < vf[k + 1]) {
                vf[k + 1]
            } else {
                vf[k - 1] + 1
            };
            let mut y = (x as isize - k) as usize;
            let (x0, y0) = (x, y);
            while x < n && y < m && a[old.start + x].as_ref() == b[new.start + y].as_ref() {
                x += 1;
                y += 1;
            }
            vf[k] = x;

            if odd && (k - delta).abs() <= d - 1 && vf[k] + vb[-(k - delta)] >= n {
                return Some((old.start + x0, new.start + y0));
            }
            k += 2;
        }

        let mut k = -d;
        while k <= d {
            let mut x = if k == -d || (k != d && vb[k - 1] < vb[k + 1]) {
                vb[k + 1]
            } else {
                vb[k - 1] + 1
            };
            let mut y = (x as isize - k) as usize;
            while x < n && y < m && a[old.end - 1 - x].as_ref() == b[new.end - 1 - y].as_ref() {
                x += 1;
                y += 1;
            }
            vb[k] = x;

            if !odd && (k - delta).abs() <= d && vb[k] + vf[-(k - delta)] >= n {
                return Some((old.start + n - x, new.start + m - y));
            }
            k += 2;
        }
    }

    None
}

fn group_edits<S: AsRef<str>>(edits: &[Edit], old: &[S], new: &[S]) -> Vec<DiffOp> {
    let mut ops = Vec::new();
    let (mut i, mut j) = (0usize, 0usize);
    let mut idx = 0;

    while idx < edits.len() {
        let (si, sj) = (i, j);

        let tag = if edits[idx] == Edit::Equal {
            while idx < edits.len() && edits[idx] == Edit::Equal {
                i += 1;
                j += 1;
                idx += 1;
            }
            DiffTag::Equal
        } else {
            while idx < edits.len() && edits[idx] != Edit::Equal {
                match edits[idx] {
                    Edit::Delete => i += 1,
                    Edit::Insert => j += 1,
                    Edit::Equal => {}
                }
                idx += 1;
            }
            if i > si && j > sj {
                DiffTag::Replace
            } else if i > si {
                DiffTag::Delete
            } else {
                DiffTag::Insert
            }
        };

        ops.push(DiffOp {
            tag,
            old: si..i,
            new: sj..j,
            old_lines: old[si..i].iter().map(|l| l.as_ref().to_string()).collect(),
            new_lines: new[sj..j].iter().map(|l| l.as_ref().to_string()).collect(),
        });
    }

    ops
}
